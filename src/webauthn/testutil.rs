//! Test helpers: CBOR payload builders and a software authenticator that
//! produces real signed attestations and assertions with a P-256 key.

use super::codec::{FLAG_ATTESTED_CREDENTIAL_DATA, FLAG_USER_PRESENT};
use super::service::{DEFAULT_CHALLENGE_TTL, PasskeyService, RpConfig};
use super::types::{self, AssertionResponse, AttestationResponse};
use crate::store::{MemoryCredentialStore, MemoryKv, MemoryUserStore, User, UserStore};
use ciborium::value::Value;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};

pub(crate) const TEST_RP_ID: &str = "example.com";
pub(crate) const TEST_ORIGIN: &str = "https://app.example.com";

pub(crate) type MemoryPasskeyService =
    PasskeyService<MemoryUserStore, MemoryCredentialStore, MemoryKv>;

pub(crate) fn test_service() -> MemoryPasskeyService {
    let config = RpConfig::new(TEST_RP_ID, "Example", TEST_ORIGIN, DEFAULT_CHALLENGE_TTL)
        .expect("valid test config");
    PasskeyService::new(
        config,
        MemoryUserStore::new(),
        MemoryCredentialStore::new(),
        MemoryKv::new(),
    )
}

pub(crate) async fn test_user(service: &MemoryPasskeyService, email: &str) -> User {
    let (user, _) = service
        .users
        .find_or_create(email)
        .await
        .expect("create test user");
    user
}

/// Run a full registration ceremony for the authenticator.
pub(crate) async fn register(
    service: &MemoryPasskeyService,
    user: &User,
    authenticator: &TestAuthenticator,
    sign_count: u32,
) {
    let options = service.register_begin(user).await.expect("register begin");
    let challenge = types::b64url_decode(&options.challenge).expect("challenge decodes");
    service
        .register_finish(
            user,
            &authenticator.attestation_response(&challenge, sign_count),
        )
        .await
        .expect("register finish");
}

pub(crate) fn encode_cose_key(x: &[u8; 32], y: &[u8; 32]) -> Vec<u8> {
    let map = Value::Map(vec![
        (Value::Integer(1.into()), Value::Integer(2.into())), // kty: EC2
        (Value::Integer(3.into()), Value::Integer((-7).into())), // alg: ES256
        (Value::Integer((-1).into()), Value::Integer(1.into())), // crv: P-256
        (Value::Integer((-2).into()), Value::Bytes(x.to_vec())),
        (Value::Integer((-3).into()), Value::Bytes(y.to_vec())),
    ]);
    let mut buf = Vec::new();
    ciborium::into_writer(&map, &mut buf).expect("cose encode");
    buf
}

pub(crate) fn encode_auth_data(
    rp_id_hash: &[u8; 32],
    flags: u8,
    sign_count: u32,
    credential_id: &[u8],
    cose_key: &[u8],
) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(rp_id_hash);
    out.push(flags);
    out.extend_from_slice(&sign_count.to_be_bytes());
    out.extend_from_slice(&[0u8; 16]); // AAGUID
    out.extend_from_slice(
        &u16::try_from(credential_id.len())
            .expect("credential id fits u16")
            .to_be_bytes(),
    );
    out.extend_from_slice(credential_id);
    out.extend_from_slice(cose_key);
    out
}

pub(crate) fn encode_attestation_object(auth_data: &[u8]) -> Vec<u8> {
    let map = Value::Map(vec![
        (Value::Text("fmt".into()), Value::Text("none".into())),
        (Value::Text("attStmt".into()), Value::Map(vec![])),
        (
            Value::Text("authData".into()),
            Value::Bytes(auth_data.to_vec()),
        ),
    ]);
    let mut buf = Vec::new();
    ciborium::into_writer(&map, &mut buf).expect("attestation encode");
    buf
}

/// A software authenticator holding one P-256 key pair.
pub(crate) struct TestAuthenticator {
    signing_key: SigningKey,
    credential_id: Vec<u8>,
    rp_id: String,
    origin: String,
}

impl TestAuthenticator {
    pub(crate) fn new() -> Self {
        Self::for_rp(TEST_RP_ID, TEST_ORIGIN)
    }

    pub(crate) fn for_rp(rp_id: &str, origin: &str) -> Self {
        let mut credential_id = vec![0u8; 16];
        OsRng.fill_bytes(&mut credential_id);
        Self {
            signing_key: SigningKey::random(&mut OsRng),
            credential_id,
            rp_id: rp_id.to_string(),
            origin: origin.to_string(),
        }
    }

    pub(crate) fn credential_id(&self) -> &[u8] {
        &self.credential_id
    }

    fn rp_id_hash(&self) -> [u8; 32] {
        Sha256::digest(self.rp_id.as_bytes()).into()
    }

    fn cose_key(&self) -> Vec<u8> {
        let point = self.signing_key.verifying_key().to_encoded_point(false);
        let x: [u8; 32] = point
            .x()
            .expect("x coordinate")
            .as_slice()
            .try_into()
            .expect("32-byte x");
        let y: [u8; 32] = point
            .y()
            .expect("y coordinate")
            .as_slice()
            .try_into()
            .expect("32-byte y");
        encode_cose_key(&x, &y)
    }

    fn client_data(&self, ceremony: &str, challenge: &[u8]) -> Vec<u8> {
        format!(
            r#"{{"type":"{}","challenge":"{}","origin":"{}"}}"#,
            ceremony,
            types::b64url_encode(challenge),
            self.origin
        )
        .into_bytes()
    }

    pub(crate) fn attestation_response(
        &self,
        challenge: &[u8],
        sign_count: u32,
    ) -> AttestationResponse {
        let auth_data = encode_auth_data(
            &self.rp_id_hash(),
            FLAG_USER_PRESENT | FLAG_ATTESTED_CREDENTIAL_DATA,
            sign_count,
            &self.credential_id,
            &self.cose_key(),
        );
        AttestationResponse {
            credential_id: types::b64url_encode(&self.credential_id),
            client_data_json: types::b64url_encode(&self.client_data("webauthn.create", challenge)),
            attestation_object: types::b64url_encode(&encode_attestation_object(&auth_data)),
            transports: Some(vec!["usb".to_string()]),
        }
    }

    pub(crate) fn assertion_response(
        &self,
        challenge: &[u8],
        sign_count: u32,
    ) -> AssertionResponse {
        let mut auth_data = Vec::new();
        auth_data.extend_from_slice(&self.rp_id_hash());
        auth_data.push(FLAG_USER_PRESENT);
        auth_data.extend_from_slice(&sign_count.to_be_bytes());

        let client_data = self.client_data("webauthn.get", challenge);
        let mut signed = auth_data.clone();
        signed.extend_from_slice(&Sha256::digest(&client_data));
        let signature: Signature = self.signing_key.sign(&signed);

        AssertionResponse {
            credential_id: types::b64url_encode(&self.credential_id),
            client_data_json: types::b64url_encode(&client_data),
            authenticator_data: types::b64url_encode(&auth_data),
            signature: types::b64url_encode(signature.to_der().as_bytes()),
        }
    }
}
