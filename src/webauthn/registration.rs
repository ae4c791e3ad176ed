//! Registration flow: `Idle -> ChallengeIssued -> Verified | Failed`.

use super::codec;
use super::challenge::ChallengePurpose;
use super::error::WebauthnError;
use super::service::{CEREMONY_TIMEOUT_MS, COSE_ALG_ES256, PasskeyService};
use super::types::{
    self, AttestationResponse, AuthenticatorSelection, CredentialDescriptor,
    PublicKeyCredentialParam, RegistrationOptions, RelyingParty, UserEntity,
};
use crate::store::{Credential, CredentialStore, KeyValueStore, User, UserStore};
use anyhow::anyhow;
use chrono::Utc;

impl<U, C, K> PasskeyService<U, C, K>
where
    U: UserStore,
    C: CredentialStore,
    K: KeyValueStore,
{
    /// Begin registration: issue a fresh challenge and return the creation
    /// options, with the user's existing credentials as an exclude list so
    /// the same authenticator cannot be registered twice.
    ///
    /// # Errors
    /// `Storage` if a collaborator fails. No persistence side effect beyond
    /// the challenge write.
    pub async fn register_begin(
        &self,
        user: &User,
    ) -> Result<RegistrationOptions, WebauthnError> {
        let existing = self.credentials.list_by_owner(user.id).await?;
        let challenge = self
            .challenges
            .issue(ChallengePurpose::Registration, &user.email)
            .await?;

        Ok(RegistrationOptions {
            rp: RelyingParty {
                id: self.config.rp_id().to_string(),
                name: self.config.rp_name().to_string(),
            },
            user: UserEntity {
                id: types::b64url_encode(user.id.as_bytes()),
                name: user.email.clone(),
                display_name: user.email.clone(),
            },
            challenge: types::b64url_encode(&challenge),
            pub_key_cred_params: vec![PublicKeyCredentialParam {
                kind: "public-key".to_string(),
                alg: COSE_ALG_ES256,
            }],
            timeout: CEREMONY_TIMEOUT_MS,
            attestation: "none".to_string(),
            exclude_credentials: existing
                .into_iter()
                .map(|cred| CredentialDescriptor {
                    kind: "public-key".to_string(),
                    id: types::b64url_encode(&cred.credential_id),
                    transports: cred.transports,
                })
                .collect(),
            authenticator_selection: AuthenticatorSelection {
                resident_key: "discouraged".to_string(),
                user_verification: "preferred".to_string(),
            },
        })
    }

    /// Finish registration: consume the challenge, verify the client data and
    /// attestation, and persist the credential.
    ///
    /// Re-submitting an attestation for an already-registered credential id
    /// owned by the same user is an idempotent success. A failed finish
    /// leaves no credential row; the challenge is consumed either way, so the
    /// client restarts from `register_begin`.
    ///
    /// # Errors
    /// `ChallengeExpiredOrMissing`, `ChallengeMismatch`,
    /// `MalformedAttestation`, `MalformedPublicKey`, or `Storage`.
    pub async fn register_finish(
        &self,
        user: &User,
        response: &AttestationResponse,
    ) -> Result<Credential, WebauthnError> {
        let challenge = self
            .challenges
            .consume(ChallengePurpose::Registration, &user.email)
            .await?;

        let client_data = response.client_data_bytes()?;
        self.verify_client_data(&client_data, "webauthn.create", &challenge)?;

        let decoded = codec::decode_attestation(&response.attestation_object_bytes()?)?;
        if decoded.rp_id_hash != self.config.rp_id_hash() {
            return Err(WebauthnError::ChallengeMismatch);
        }
        if decoded.credential_id != response.credential_id_bytes()? {
            return Err(WebauthnError::MalformedAttestation);
        }

        if let Some(existing) = self
            .credentials
            .find_by_credential_id(&decoded.credential_id)
            .await?
        {
            if existing.user_id == user.id {
                return Ok(existing);
            }
            // credential_id is globally unique; the same id under another
            // user is an integrity anomaly, not a client-recoverable outcome.
            return Err(WebauthnError::Storage(anyhow!(
                "credential id already registered to another user"
            )));
        }

        let credential = Credential {
            credential_id: decoded.credential_id,
            user_id: user.id,
            public_key: decoded.public_key,
            sign_count: i64::from(decoded.sign_count),
            transports: response.transports.clone(),
            created_at: Utc::now(),
            last_used_at: None,
        };
        self.credentials.insert(&credential).await?;
        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{TestAuthenticator, test_service, test_user};
    use super::*;
    use crate::webauthn::types::b64url_decode;

    #[tokio::test]
    async fn register_begin_excludes_existing_credentials() {
        let service = test_service();
        let user = test_user(&service, "a@x.com").await;
        let authenticator = TestAuthenticator::new();

        let options = service.register_begin(&user).await.expect("begin");
        assert!(options.exclude_credentials.is_empty());
        assert_eq!(options.rp.id, "example.com");
        assert_eq!(b64url_decode(&options.challenge).expect("decodes").len(), 32);

        let challenge = b64url_decode(&options.challenge).expect("decodes");
        let response = authenticator.attestation_response(&challenge, 0);
        service
            .register_finish(&user, &response)
            .await
            .expect("finish");

        let options = service.register_begin(&user).await.expect("second begin");
        assert_eq!(options.exclude_credentials.len(), 1);
        assert_eq!(
            b64url_decode(&options.exclude_credentials[0].id).expect("decodes"),
            authenticator.credential_id()
        );
    }

    #[tokio::test]
    async fn register_finish_persists_credential_and_counter() {
        let service = test_service();
        let user = test_user(&service, "a@x.com").await;
        let authenticator = TestAuthenticator::new();

        let options = service.register_begin(&user).await.expect("begin");
        let challenge = b64url_decode(&options.challenge).expect("decodes");
        let credential = service
            .register_finish(&user, &authenticator.attestation_response(&challenge, 9))
            .await
            .expect("finish");

        assert_eq!(credential.user_id, user.id);
        assert_eq!(credential.sign_count, 9);
        assert_eq!(credential.public_key[0], 0x04);
        assert_eq!(credential.public_key.len(), 65);
    }

    #[tokio::test]
    async fn challenge_is_single_use() {
        let service = test_service();
        let user = test_user(&service, "a@x.com").await;
        let authenticator = TestAuthenticator::new();

        let options = service.register_begin(&user).await.expect("begin");
        let challenge = b64url_decode(&options.challenge).expect("decodes");
        let response = authenticator.attestation_response(&challenge, 0);

        service
            .register_finish(&user, &response)
            .await
            .expect("first finish");
        // Idempotent re-registration still requires a live challenge.
        let replay = service.register_finish(&user, &response).await;
        assert!(matches!(
            replay,
            Err(WebauthnError::ChallengeExpiredOrMissing)
        ));
    }

    #[tokio::test]
    async fn embedded_challenge_mismatch_is_rejected() {
        // Scenario A: attestation carries a challenge other than the issued
        // one.
        let service = test_service();
        let user = test_user(&service, "a@x.com").await;
        let authenticator = TestAuthenticator::new();

        service.register_begin(&user).await.expect("begin");
        let wrong = [9u8; 32];
        let response = authenticator.attestation_response(&wrong, 0);
        let result = service.register_finish(&user, &response).await;
        assert!(matches!(result, Err(WebauthnError::ChallengeMismatch)));
    }

    #[tokio::test]
    async fn failed_finish_leaves_no_credential() {
        let service = test_service();
        let user = test_user(&service, "a@x.com").await;
        let authenticator = TestAuthenticator::new();

        service.register_begin(&user).await.expect("begin");
        let response = authenticator.attestation_response(&[9u8; 32], 0);
        let _ = service.register_finish(&user, &response).await;

        let options = service.register_begin(&user).await.expect("begin again");
        assert!(options.exclude_credentials.is_empty());
    }

    #[tokio::test]
    async fn duplicate_registration_is_idempotent() {
        let service = test_service();
        let user = test_user(&service, "a@x.com").await;
        let authenticator = TestAuthenticator::new();

        let options = service.register_begin(&user).await.expect("begin");
        let challenge = b64url_decode(&options.challenge).expect("decodes");
        let first = service
            .register_finish(&user, &authenticator.attestation_response(&challenge, 0))
            .await
            .expect("first finish");

        let options = service.register_begin(&user).await.expect("second begin");
        let challenge = b64url_decode(&options.challenge).expect("decodes");
        let second = service
            .register_finish(&user, &authenticator.attestation_response(&challenge, 0))
            .await
            .expect("second finish");

        assert_eq!(first.credential_id, second.credential_id);

        let listed = service
            .register_begin(&user)
            .await
            .expect("list via begin")
            .exclude_credentials;
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn malformed_attestation_object_is_rejected() {
        let service = test_service();
        let user = test_user(&service, "a@x.com").await;
        let authenticator = TestAuthenticator::new();

        let options = service.register_begin(&user).await.expect("begin");
        let challenge = b64url_decode(&options.challenge).expect("decodes");
        let mut response = authenticator.attestation_response(&challenge, 0);
        response.attestation_object = types::b64url_encode(b"garbage");
        let result = service.register_finish(&user, &response).await;
        assert!(matches!(result, Err(WebauthnError::MalformedAttestation)));
    }
}
