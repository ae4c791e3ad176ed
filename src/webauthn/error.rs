//! Protocol error taxonomy for the passkey flows.
//!
//! Every verification failure is a distinct, client-facing variant; callers
//! map them to user-visible outcomes. None are process-fatal and none are
//! retried internally: the client restarts from the matching `begin` call.
//! `Storage` wraps collaborator failures (database, key-value store) and is
//! the only variant that indicates a server-side problem.

use std::fmt;

#[derive(Debug)]
pub enum WebauthnError {
    /// The attestation or authenticator payload could not be decoded.
    /// Either a corrupt client payload or a codec bug; logged at high severity.
    MalformedAttestation,
    /// The COSE key map is missing its EC coordinates.
    MalformedPublicKey,
    /// No live challenge for this (purpose, identity): expired, never issued,
    /// or already consumed. The most common legitimate failure.
    ChallengeExpiredOrMissing,
    /// The embedded challenge, origin, relying-party id, or ceremony type did
    /// not match what the server issued.
    ChallengeMismatch,
    /// No user, or no credentials registered, for the given identity.
    UnknownIdentity,
    /// The asserted credential id is not on file or belongs to someone else.
    UnknownCredential,
    /// Signature verification over the signed-data buffer failed.
    InvalidSignature,
    /// The reported signature counter did not advance; possible cloned
    /// authenticator.
    ReplayDetected,
    /// A storage collaborator failed; not a protocol outcome.
    Storage(anyhow::Error),
}

impl fmt::Display for WebauthnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedAttestation => write!(f, "malformed authenticator payload"),
            Self::MalformedPublicKey => write!(f, "malformed public key"),
            Self::ChallengeExpiredOrMissing => write!(f, "challenge expired or missing"),
            Self::ChallengeMismatch => write!(f, "challenge mismatch"),
            Self::UnknownIdentity => write!(f, "unknown identity"),
            Self::UnknownCredential => write!(f, "unknown credential"),
            Self::InvalidSignature => write!(f, "invalid signature"),
            Self::ReplayDetected => write!(f, "replay detected"),
            Self::Storage(err) => write!(f, "storage failure: {err}"),
        }
    }
}

impl std::error::Error for WebauthnError {}

impl From<anyhow::Error> for WebauthnError {
    fn from(err: anyhow::Error) -> Self {
        Self::Storage(err)
    }
}
