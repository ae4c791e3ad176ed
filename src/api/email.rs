//! Outbound email abstraction.
//!
//! Login codes are handed to an `EmailSender`, which decides how to deliver
//! (SMTP, API, etc.). The default for local dev is `LogEmailSender`, which
//! logs the payload and returns `Ok(())` so the flow can be exercised without
//! a provider account.

use anyhow::Result;
use tracing::info;

#[derive(Clone, Debug)]
pub struct EmailMessage {
    pub to_email: String,
    pub subject: String,
    pub body: String,
}

/// Email delivery abstraction used by the auth handlers.
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error so the caller can surface it.
    fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Local dev sender that logs the payload instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            subject = %message.subject,
            body = %message.body,
            "email send stub"
        );
        Ok(())
    }
}

/// Build the login-code message sent on every login request.
#[must_use]
pub fn login_code_message(to_email: &str, code: &str, ttl_minutes: u64) -> EmailMessage {
    EmailMessage {
        to_email: to_email.to_string(),
        subject: "Your login code".to_string(),
        body: format!("Your login code is {code}. It expires in {ttl_minutes} minutes."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_code_message_includes_code_and_expiry() {
        let message = login_code_message("a@x.com", "123456", 15);
        assert_eq!(message.to_email, "a@x.com");
        assert!(message.body.contains("123456"));
        assert!(message.body.contains("15 minutes"));
    }

    #[test]
    fn log_sender_always_succeeds() {
        let message = login_code_message("a@x.com", "123456", 15);
        assert!(LogEmailSender.send(&message).is_ok());
    }
}
