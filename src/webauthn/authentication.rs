//! Authentication flow: `Idle -> ChallengeIssued -> Verified | Rejected`.
//!
//! The signed-data buffer is `authenticator_data || SHA-256(client_data_json)`
//! in exactly that order; the layout is part of the wire contract the
//! authenticator signed over, not a server choice.

use super::challenge::ChallengePurpose;
use super::codec;
use super::counter;
use super::error::WebauthnError;
use super::service::{CEREMONY_TIMEOUT_MS, PasskeyService};
use super::types::{
    self, AssertionResponse, AuthenticationOptions, CredentialDescriptor,
};
use crate::store::{CredentialStore, KeyValueStore, User, UserStore};
use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{Signature, VerifyingKey};
use sha2::{Digest, Sha256};

impl<U, C, K> PasskeyService<U, C, K>
where
    U: UserStore,
    C: CredentialStore,
    K: KeyValueStore,
{
    /// Begin authentication: issue a challenge and return the request options
    /// with the allow-list of the identity's credential ids.
    ///
    /// # Errors
    /// `UnknownIdentity` when no user or no credentials exist for the email.
    /// Callers should render that as a generic failure to avoid identity
    /// enumeration.
    pub async fn auth_begin(&self, email: &str) -> Result<AuthenticationOptions, WebauthnError> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(WebauthnError::UnknownIdentity)?;
        let credentials = self.credentials.list_by_owner(user.id).await?;
        if credentials.is_empty() {
            return Err(WebauthnError::UnknownIdentity);
        }

        let challenge = self
            .challenges
            .issue(ChallengePurpose::Authentication, email)
            .await?;

        Ok(AuthenticationOptions {
            challenge: types::b64url_encode(&challenge),
            rp_id: self.config.rp_id().to_string(),
            timeout: CEREMONY_TIMEOUT_MS,
            user_verification: "preferred".to_string(),
            allow_credentials: credentials
                .into_iter()
                .map(|cred| CredentialDescriptor {
                    kind: "public-key".to_string(),
                    id: types::b64url_encode(&cred.credential_id),
                    transports: cred.transports,
                })
                .collect(),
        })
    }

    /// Finish authentication: consume the challenge, verify the assertion
    /// signature against the stored public key, enforce counter
    /// monotonicity, and persist the new counter.
    ///
    /// Steps 2-5 mutate nothing; the only writes are the challenge consume
    /// up front and the counter update after full success, so retries after
    /// any failure are safe.
    ///
    /// # Errors
    /// `ChallengeExpiredOrMissing`, `UnknownIdentity`, `UnknownCredential`,
    /// `ChallengeMismatch`, `MalformedAttestation`, `InvalidSignature`,
    /// `ReplayDetected`, or `Storage`.
    pub async fn auth_finish(
        &self,
        email: &str,
        response: &AssertionResponse,
    ) -> Result<User, WebauthnError> {
        let challenge = self
            .challenges
            .consume(ChallengePurpose::Authentication, email)
            .await?;

        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(WebauthnError::UnknownIdentity)?;

        let credential_id = response.credential_id_bytes()?;
        let credential = self
            .credentials
            .find_by_credential_id(&credential_id)
            .await?
            .filter(|cred| cred.user_id == user.id)
            .ok_or(WebauthnError::UnknownCredential)?;

        let client_data = response.client_data_bytes()?;
        self.verify_client_data(&client_data, "webauthn.get", &challenge)?;

        let auth_data = response.authenticator_data_bytes()?;
        let header = codec::parse_auth_data_header(&auth_data)?;
        if header.rp_id_hash != self.config.rp_id_hash() {
            return Err(WebauthnError::ChallengeMismatch);
        }

        verify_signature(
            &credential.public_key,
            &auth_data,
            &client_data,
            &response.signature_bytes()?,
        )?;

        let stored = u32::try_from(credential.sign_count).unwrap_or(u32::MAX);
        counter::check_counter(stored, header.sign_count)?;

        self.credentials
            .update_counter(&credential_id, i64::from(header.sign_count))
            .await?;
        Ok(user)
    }
}

/// Verify an ES256 signature over `auth_data || SHA-256(client_data)`.
///
/// Authenticators emit DER-encoded ECDSA signatures; the raw fixed-width form
/// is accepted as a fallback.
fn verify_signature(
    public_key: &[u8],
    auth_data: &[u8],
    client_data: &[u8],
    signature: &[u8],
) -> Result<(), WebauthnError> {
    let key =
        VerifyingKey::from_sec1_bytes(public_key).map_err(|_| WebauthnError::MalformedPublicKey)?;

    let mut signed = Vec::with_capacity(auth_data.len() + 32);
    signed.extend_from_slice(auth_data);
    signed.extend_from_slice(&Sha256::digest(client_data));

    let signature = Signature::from_der(signature)
        .or_else(|_| Signature::from_slice(signature))
        .map_err(|_| WebauthnError::InvalidSignature)?;

    key.verify(&signed, &signature)
        .map_err(|_| WebauthnError::InvalidSignature)
}
