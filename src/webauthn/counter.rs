//! Signature counter monotonicity guard.
//!
//! Authenticators increment a usage counter on every assertion. A verified
//! assertion whose counter has not advanced past the stored value means an
//! older signature is being replayed, typically from a cloned authenticator.
//! Authenticators without a counter report a constant zero on both sides,
//! which `WebAuthn` allows.

use super::error::WebauthnError;

/// Accept iff `reported > stored`, or both are zero.
///
/// # Errors
/// `ReplayDetected` when the counter failed to advance.
pub fn check_counter(stored: u32, reported: u32) -> Result<(), WebauthnError> {
    if reported > stored || (stored == 0 && reported == 0) {
        Ok(())
    } else {
        Err(WebauthnError::ReplayDetected)
    }
}
