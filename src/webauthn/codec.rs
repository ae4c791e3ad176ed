//! Pure decoding of binary authenticator payloads.
//!
//! Attestation objects arrive as CBOR maps whose `authData` entry carries a
//! fixed-layout header followed by attested credential data and a COSE-encoded
//! public key. Authenticators return keys in that compact COSE form while
//! signature verification downstream needs an uncompressed SEC1 point, so the
//! decode here must be exact: every offset is bounds-checked and a short or
//! corrupt buffer is a decode error, never a panic.
//!
//! Layout of authenticator data:
//!
//! ```text
//! 32 bytes  SHA-256 of the relying-party id
//!  1 byte   flags (0x40 = attested credential data present)
//!  4 bytes  signature counter, big-endian
//! 16 bytes  AAGUID                  \
//!  2 bytes  credential id length     | only when the AT flag is set
//!  N bytes  credential id            |
//!  M bytes  COSE public key (CBOR)  /
//! ```

use super::error::WebauthnError;
use ciborium::value::Value;

/// Fixed header: RP-ID hash + flags + counter.
pub const AUTH_DATA_HEADER_LEN: usize = 37;

/// Attested credential data follows the header.
pub const FLAG_ATTESTED_CREDENTIAL_DATA: u8 = 0x40;
/// User presence was confirmed.
pub const FLAG_USER_PRESENT: u8 = 0x01;

const AAGUID_LEN: usize = 16;
const COSE_EC2_X: i128 = -2;
const COSE_EC2_Y: i128 = -3;
const EC_COORDINATE_LEN: usize = 32;

/// The structured result of decoding an attestation object.
#[derive(Debug, Clone)]
pub struct DecodedAttestation {
    /// Raw authenticator data bytes, as signed by the authenticator.
    pub auth_data: Vec<u8>,
    pub rp_id_hash: [u8; 32],
    pub flags: u8,
    pub sign_count: u32,
    pub credential_id: Vec<u8>,
    /// Uncompressed SEC1 point (`0x04 || x || y`) from the COSE key.
    pub public_key: Vec<u8>,
}

/// The fixed header shared by attestation and assertion authenticator data.
#[derive(Debug, Clone, Copy)]
pub struct AuthDataHeader {
    pub rp_id_hash: [u8; 32],
    pub flags: u8,
    pub sign_count: u32,
}

/// Decode a CBOR attestation object into credential id, public key, and the
/// authenticator-data header fields.
///
/// # Errors
/// `MalformedAttestation` if the CBOR decode fails, `authData` is absent, or
/// any length field points outside the buffer; `MalformedPublicKey` if the
/// embedded COSE key lacks its EC coordinates.
pub fn decode_attestation(bytes: &[u8]) -> Result<DecodedAttestation, WebauthnError> {
    let value: Value =
        ciborium::from_reader(bytes).map_err(|_| WebauthnError::MalformedAttestation)?;
    let Value::Map(entries) = value else {
        return Err(WebauthnError::MalformedAttestation);
    };

    let auth_data = entries
        .iter()
        .find_map(|(key, value)| match (key, value) {
            (Value::Text(name), Value::Bytes(bytes)) if name == "authData" => Some(bytes.clone()),
            _ => None,
        })
        .ok_or(WebauthnError::MalformedAttestation)?;

    let header = parse_auth_data_header(&auth_data)?;
    if header.flags & FLAG_ATTESTED_CREDENTIAL_DATA == 0 {
        // Registration payloads must carry attested credential data; without
        // the flag the remainder of the buffer has a different layout.
        return Err(WebauthnError::MalformedAttestation);
    }

    let attested = auth_data
        .get(AUTH_DATA_HEADER_LEN..)
        .ok_or(WebauthnError::MalformedAttestation)?;
    if attested.len() < AAGUID_LEN + 2 {
        return Err(WebauthnError::MalformedAttestation);
    }

    let credential_id_len =
        usize::from(u16::from_be_bytes([attested[AAGUID_LEN], attested[AAGUID_LEN + 1]]));
    let credential_id_start = AAGUID_LEN + 2;
    let cose_key_start = credential_id_start + credential_id_len;
    let credential_id = attested
        .get(credential_id_start..cose_key_start)
        .ok_or(WebauthnError::MalformedAttestation)?
        .to_vec();
    if credential_id.is_empty() {
        return Err(WebauthnError::MalformedAttestation);
    }

    let cose_key = attested
        .get(cose_key_start..)
        .ok_or(WebauthnError::MalformedAttestation)?;
    let public_key = decode_cose_key_to_raw(cose_key)?;

    Ok(DecodedAttestation {
        auth_data,
        rp_id_hash: header.rp_id_hash,
        flags: header.flags,
        sign_count: header.sign_count,
        credential_id,
        public_key,
    })
}

/// Parse the 37-byte fixed header of authenticator data.
///
/// # Errors
/// `MalformedAttestation` on short input.
pub fn parse_auth_data_header(auth_data: &[u8]) -> Result<AuthDataHeader, WebauthnError> {
    if auth_data.len() < AUTH_DATA_HEADER_LEN {
        return Err(WebauthnError::MalformedAttestation);
    }
    let mut rp_id_hash = [0u8; 32];
    rp_id_hash.copy_from_slice(&auth_data[..32]);
    let flags = auth_data[32];
    let sign_count = u32::from_be_bytes([
        auth_data[33],
        auth_data[34],
        auth_data[35],
        auth_data[36],
    ]);
    Ok(AuthDataHeader {
        rp_id_hash,
        flags,
        sign_count,
    })
}

/// Decode a COSE EC2 key map and reassemble the uncompressed point
/// `0x04 || x || y`.
///
/// # Errors
/// `MalformedPublicKey` if the map cannot be decoded or the `x`/`y`
/// coordinates are absent or not 32 bytes.
pub fn decode_cose_key_to_raw(cose_bytes: &[u8]) -> Result<Vec<u8>, WebauthnError> {
    let value: Value =
        ciborium::from_reader(cose_bytes).map_err(|_| WebauthnError::MalformedPublicKey)?;
    let Value::Map(entries) = value else {
        return Err(WebauthnError::MalformedPublicKey);
    };

    let coordinate = |label: i128| {
        entries.iter().find_map(|(key, value)| match (key, value) {
            (Value::Integer(int), Value::Bytes(bytes)) if i128::from(*int) == label => {
                Some(bytes.as_slice())
            }
            _ => None,
        })
    };

    let x = coordinate(COSE_EC2_X).ok_or(WebauthnError::MalformedPublicKey)?;
    let y = coordinate(COSE_EC2_Y).ok_or(WebauthnError::MalformedPublicKey)?;
    if x.len() != EC_COORDINATE_LEN || y.len() != EC_COORDINATE_LEN {
        return Err(WebauthnError::MalformedPublicKey);
    }

    let mut raw = Vec::with_capacity(1 + EC_COORDINATE_LEN * 2);
    raw.push(0x04);
    raw.extend_from_slice(x);
    raw.extend_from_slice(y);
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{encode_attestation_object, encode_auth_data, encode_cose_key};
    use super::*;

    fn sample_attestation() -> (Vec<u8>, [u8; 32], [u8; 32]) {
        let x = [0x11u8; 32];
        let y = [0x22u8; 32];
        let cose = encode_cose_key(&x, &y);
        let auth_data = encode_auth_data(
            &[7u8; 32],
            FLAG_USER_PRESENT | FLAG_ATTESTED_CREDENTIAL_DATA,
            5,
            b"cred-id-01",
            &cose,
        );
        (encode_attestation_object(&auth_data), x, y)
    }

    #[test]
    fn decodes_credential_id_key_and_counter() {
        let (attestation, x, y) = sample_attestation();
        let decoded = decode_attestation(&attestation).expect("decodes");
        assert_eq!(decoded.credential_id, b"cred-id-01");
        assert_eq!(decoded.sign_count, 5);
        assert_eq!(decoded.rp_id_hash, [7u8; 32]);
        assert_eq!(decoded.public_key[0], 0x04);
        assert_eq!(&decoded.public_key[1..33], &x);
        assert_eq!(&decoded.public_key[33..65], &y);
    }

    #[test]
    fn decode_is_deterministic() {
        let (attestation, _, _) = sample_attestation();
        let first = decode_attestation(&attestation).expect("decodes");
        let second = decode_attestation(&attestation).expect("decodes");
        assert_eq!(first.public_key, second.public_key);
        assert_eq!(first.credential_id, second.credential_id);
    }

    #[test]
    fn rejects_non_cbor_input() {
        assert!(matches!(
            decode_attestation(b"not cbor at all"),
            Err(WebauthnError::MalformedAttestation)
        ));
    }

    #[test]
    fn rejects_missing_auth_data_field() {
        let map = Value::Map(vec![(
            Value::Text("fmt".into()),
            Value::Text("none".into()),
        )]);
        let mut buf = Vec::new();
        ciborium::into_writer(&map, &mut buf).expect("encode");
        assert!(matches!(
            decode_attestation(&buf),
            Err(WebauthnError::MalformedAttestation)
        ));
    }

    #[test]
    fn rejects_auth_data_shorter_than_header() {
        // Scenario E: fewer than 37 bytes of authData is a decode error, not
        // a panic.
        let attestation = encode_attestation_object(&[0u8; 36]);
        assert!(matches!(
            decode_attestation(&attestation),
            Err(WebauthnError::MalformedAttestation)
        ));
    }

    #[test]
    fn rejects_missing_attested_credential_flag() {
        let cose = encode_cose_key(&[1u8; 32], &[2u8; 32]);
        let auth_data = encode_auth_data(&[0u8; 32], FLAG_USER_PRESENT, 0, b"id", &cose);
        let attestation = encode_attestation_object(&auth_data);
        assert!(matches!(
            decode_attestation(&attestation),
            Err(WebauthnError::MalformedAttestation)
        ));
    }

    #[test]
    fn rejects_credential_id_length_past_buffer() {
        let mut auth_data = Vec::new();
        auth_data.extend_from_slice(&[0u8; 32]);
        auth_data.push(FLAG_ATTESTED_CREDENTIAL_DATA);
        auth_data.extend_from_slice(&0u32.to_be_bytes());
        auth_data.extend_from_slice(&[0u8; 16]);
        auth_data.extend_from_slice(&1000u16.to_be_bytes()); // claims 1000 bytes
        auth_data.extend_from_slice(b"short");
        let attestation = encode_attestation_object(&auth_data);
        assert!(matches!(
            decode_attestation(&attestation),
            Err(WebauthnError::MalformedAttestation)
        ));
    }

    #[test]
    fn cose_key_round_trips_coordinates() {
        let x = [0xAAu8; 32];
        let y = [0xBBu8; 32];
        let raw = decode_cose_key_to_raw(&encode_cose_key(&x, &y)).expect("decodes");
        assert_eq!(raw.len(), 65);
        assert_eq!(raw[0], 0x04);
        assert_eq!(&raw[1..33], &x);
        assert_eq!(&raw[33..65], &y);
    }

    #[test]
    fn cose_key_missing_coordinate_is_rejected() {
        let map = Value::Map(vec![
            (Value::Integer(1.into()), Value::Integer(2.into())),
            (Value::Integer((-2).into()), Value::Bytes(vec![1u8; 32])),
            // y is absent
        ]);
        let mut buf = Vec::new();
        ciborium::into_writer(&map, &mut buf).expect("encode");
        assert!(matches!(
            decode_cose_key_to_raw(&buf),
            Err(WebauthnError::MalformedPublicKey)
        ));
    }

    #[test]
    fn cose_key_wrong_coordinate_width_is_rejected() {
        let map = Value::Map(vec![
            (Value::Integer((-2).into()), Value::Bytes(vec![1u8; 31])),
            (Value::Integer((-3).into()), Value::Bytes(vec![2u8; 32])),
        ]);
        let mut buf = Vec::new();
        ciborium::into_writer(&map, &mut buf).expect("encode");
        assert!(matches!(
            decode_cose_key_to_raw(&buf),
            Err(WebauthnError::MalformedPublicKey)
        ));
    }

    #[test]
    fn header_parse_reads_counter_big_endian() {
        let mut auth_data = vec![0u8; 37];
        auth_data[32] = FLAG_USER_PRESENT;
        auth_data[33..37].copy_from_slice(&513u32.to_be_bytes());
        let header = parse_auth_data_header(&auth_data).expect("parses");
        assert_eq!(header.sign_count, 513);
        assert_eq!(header.flags, FLAG_USER_PRESENT);
    }
}
