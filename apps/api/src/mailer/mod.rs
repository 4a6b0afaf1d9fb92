//! Notification dispatcher.
//!
//! Delivers one-time codes out of band via the hosted email delivery API.
//! Dispatch is synchronous from the caller's perspective and failure is a
//! hard failure of the initiating step: an email that did not send means
//! the code was not delivered. No retry here; the user resubmits from step
//! one.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::auth::identity::CodePurpose;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Email API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

/// Code delivery seam. The production implementation posts to the email
/// API; tests substitute call-counting doubles.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_code(&self, to: &str, code: &str, purpose: CodePurpose)
        -> Result<(), MailError>;
}

/// Production mailer over the hosted email delivery API.
#[derive(Clone)]
pub struct EmailApiMailer {
    http: Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl EmailApiMailer {
    pub fn new(api_url: &str, api_key: &str, from: &str) -> Self {
        Self {
            http: Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            from: from.to_string(),
        }
    }
}

#[async_trait]
impl Mailer for EmailApiMailer {
    async fn send_code(
        &self,
        to: &str,
        code: &str,
        purpose: CodePurpose,
    ) -> Result<(), MailError> {
        let response = self
            .http
            .post(format!("{}/emails", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": self.from,
                "to": [to],
                "subject": subject(purpose),
                "text": body(code, purpose),
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(MailError::Api {
                status: status.as_u16(),
                message,
            });
        }

        debug!("Dispatched {} code email to {to}", purpose.as_str());
        Ok(())
    }
}

fn subject(purpose: CodePurpose) -> &'static str {
    match purpose {
        CodePurpose::Signup => "Your Lodestar verification code",
        CodePurpose::Recovery => "Your Lodestar password reset code",
    }
}

fn body(code: &str, purpose: CodePurpose) -> String {
    match purpose {
        CodePurpose::Signup => format!(
            "Welcome to Lodestar!\n\n\
             Your verification code is: {code}\n\n\
             Enter it on the signup page to activate your account. \
             The code expires in 15 minutes.\n\n\
             If you did not sign up, you can ignore this email."
        ),
        CodePurpose::Recovery => format!(
            "Your Lodestar password reset code is: {code}\n\n\
             Enter it on the reset page to continue. \
             The code expires in 15 minutes.\n\n\
             If you did not request a reset, you can ignore this email."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subjects_differ_by_purpose() {
        assert_ne!(subject(CodePurpose::Signup), subject(CodePurpose::Recovery));
    }

    #[test]
    fn test_body_carries_code_and_expiry() {
        for purpose in [CodePurpose::Signup, CodePurpose::Recovery] {
            let text = body("91748362", purpose);
            assert!(text.contains("91748362"));
            assert!(text.contains("15 minutes"));
        }
    }

    #[test]
    fn test_recovery_body_mentions_reset() {
        assert!(body("12345678", CodePurpose::Recovery).contains("reset"));
    }
}
