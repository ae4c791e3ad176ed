//! Wire types for the passkey ceremonies.
//!
//! Binary fields travel as base64url (no padding) strings, the encoding
//! browsers produce for `ArrayBuffer` fields. Option structures serialize in
//! the camelCase shape `navigator.credentials` expects.

use super::error::WebauthnError;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub(crate) fn b64url_encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

pub(crate) fn b64url_decode(value: &str) -> Result<Vec<u8>, WebauthnError> {
    URL_SAFE_NO_PAD
        .decode(value.as_bytes())
        .map_err(|_| WebauthnError::MalformedAttestation)
}

/// The authenticator's response to a registration challenge.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttestationResponse {
    pub credential_id: String,
    pub client_data_json: String,
    pub attestation_object: String,
    #[serde(default)]
    pub transports: Option<Vec<String>>,
}

impl AttestationResponse {
    pub(crate) fn credential_id_bytes(&self) -> Result<Vec<u8>, WebauthnError> {
        b64url_decode(&self.credential_id)
    }

    pub(crate) fn client_data_bytes(&self) -> Result<Vec<u8>, WebauthnError> {
        b64url_decode(&self.client_data_json)
    }

    pub(crate) fn attestation_object_bytes(&self) -> Result<Vec<u8>, WebauthnError> {
        b64url_decode(&self.attestation_object)
    }
}

/// The authenticator's response to an authentication challenge.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssertionResponse {
    pub credential_id: String,
    pub client_data_json: String,
    pub authenticator_data: String,
    pub signature: String,
}

impl AssertionResponse {
    pub(crate) fn credential_id_bytes(&self) -> Result<Vec<u8>, WebauthnError> {
        b64url_decode(&self.credential_id)
    }

    pub(crate) fn client_data_bytes(&self) -> Result<Vec<u8>, WebauthnError> {
        b64url_decode(&self.client_data_json)
    }

    pub(crate) fn authenticator_data_bytes(&self) -> Result<Vec<u8>, WebauthnError> {
        b64url_decode(&self.authenticator_data)
    }

    pub(crate) fn signature_bytes(&self) -> Result<Vec<u8>, WebauthnError> {
        b64url_decode(&self.signature)
    }
}

/// The JSON the client signed over: ceremony type, challenge, and origin.
#[derive(Debug, Deserialize)]
pub struct CollectedClientData {
    #[serde(rename = "type")]
    pub ceremony: String,
    pub challenge: String,
    pub origin: String,
}

impl CollectedClientData {
    pub(crate) fn parse(bytes: &[u8]) -> Result<Self, WebauthnError> {
        serde_json::from_slice(bytes).map_err(|_| WebauthnError::MalformedAttestation)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RelyingParty {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserEntity {
    /// base64url of the user's UUID bytes.
    pub id: String,
    pub name: String,
    pub display_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PublicKeyCredentialParam {
    #[serde(rename = "type")]
    pub kind: String,
    pub alg: i64,
}

/// Identifies an already-registered credential in exclude/allow lists.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CredentialDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    /// base64url credential id.
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transports: Option<Vec<String>>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorSelection {
    pub resident_key: String,
    pub user_verification: String,
}

/// Options returned by begin-registration, relayed to
/// `navigator.credentials.create`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationOptions {
    pub rp: RelyingParty,
    pub user: UserEntity,
    /// base64url challenge bytes.
    pub challenge: String,
    pub pub_key_cred_params: Vec<PublicKeyCredentialParam>,
    pub timeout: u32,
    pub attestation: String,
    pub exclude_credentials: Vec<CredentialDescriptor>,
    pub authenticator_selection: AuthenticatorSelection,
}

/// Options returned by begin-authentication, relayed to
/// `navigator.credentials.get`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationOptions {
    /// base64url challenge bytes.
    pub challenge: String,
    pub rp_id: String,
    pub timeout: u32,
    pub user_verification: String,
    pub allow_credentials: Vec<CredentialDescriptor>,
}
