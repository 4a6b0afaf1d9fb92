//! Identity provider adapter.
//!
//! Two explicitly constructed clients with distinct credentials:
//!
//! - [`IdentityAdmin`] holds the service-role key and is used only for
//!   one-time code generation, which must work for an email that has no
//!   session yet.
//! - [`IdentitySession`] holds the publishable key and performs everything
//!   a user-scoped client may do: code verification (which mints a session
//!   on the provider side), password updates, OAuth code exchange, session
//!   introspection, and sign-out.
//!
//! The provider is the sole authority on code validity; nothing here
//! re-validates codes locally.

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodePurpose {
    Signup,
    Recovery,
}

impl CodePurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodePurpose::Signup => "signup",
            CodePurpose::Recovery => "recovery",
        }
    }
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{message}")]
    Provider { status: u16, message: String },

    /// The provider answered 2xx but returned no code payload. Surfaced as
    /// a configuration error; the flow must not proceed as if a code had
    /// been issued.
    #[error("Identity provider returned no one-time code")]
    MissingCode,
}

/// Result of a generate-link call: the identity the code is bound to plus
/// the code itself, ready for out-of-band delivery.
#[derive(Debug, Clone)]
pub struct GeneratedCode {
    pub user_id: Uuid,
    pub email: String,
    pub code: String,
}

/// Provider-issued session artifacts. The access token is opaque; it is
/// carried in a cookie and never parsed by this service.
#[derive(Debug, Clone)]
pub struct ProviderSession {
    pub access_token: String,
    pub expires_in: u64,
    pub user_id: Uuid,
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityUser {
    pub id: Uuid,
    pub email: String,
}

#[derive(Deserialize)]
struct GenerateLinkResponse {
    user: IdentityUser,
    email_otp: Option<String>,
}

#[derive(Deserialize)]
struct SessionResponse {
    access_token: String,
    expires_in: u64,
    user: IdentityUser,
}

/// Service-role client. Generation must bypass per-row access policies that
/// would otherwise block creating a credential for a session-less email.
#[derive(Clone)]
pub struct IdentityAdmin {
    http: Client,
    base_url: String,
    service_key: String,
}

impl IdentityAdmin {
    pub fn new(base_url: &str, service_key: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
        }
    }

    /// Requests a signup- or recovery-typed one-time code for `email`.
    ///
    /// Fails closed: a response without a code payload is an error, never a
    /// silent success. Generation failures keep the provider's message,
    /// since those are typically configuration or rate-limit problems worth
    /// surfacing verbatim.
    pub async fn generate_code(
        &self,
        email: &str,
        purpose: CodePurpose,
        password: Option<&str>,
    ) -> Result<GeneratedCode, IdentityError> {
        let mut body = json!({
            "type": purpose.as_str(),
            "email": email,
        });
        if let Some(password) = password {
            body["password"] = json!(password);
        }

        let response = self
            .http
            .post(format!("{}/auth/v1/admin/generate_link", self.base_url))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = read_provider_message(response).await;
            return Err(IdentityError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let payload: GenerateLinkResponse = response.json().await?;
        let code = payload.code().ok_or(IdentityError::MissingCode)?;
        Ok(GeneratedCode {
            user_id: payload.user.id,
            email: payload.user.email,
            code,
        })
    }
}

impl GenerateLinkResponse {
    fn code(&self) -> Option<String> {
        self.email_otp
            .as_deref()
            .filter(|c| !c.is_empty())
            .map(String::from)
    }
}

/// User-scoped client. Verification runs here because a successful verify
/// call mints a session as a side effect.
#[derive(Clone)]
pub struct IdentitySession {
    http: Client,
    base_url: String,
    publishable_key: String,
}

impl IdentitySession {
    pub fn new(base_url: &str, publishable_key: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            publishable_key: publishable_key.to_string(),
        }
    }

    /// Verifies a one-time code against the provider. On success the
    /// provider issues a live session.
    pub async fn verify_code(
        &self,
        email: &str,
        code: &str,
        purpose: CodePurpose,
    ) -> Result<ProviderSession, IdentityError> {
        let response = self
            .http
            .post(format!("{}/auth/v1/verify", self.base_url))
            .header("apikey", &self.publishable_key)
            .json(&json!({
                "type": purpose.as_str(),
                "email": email,
                "token": code,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = read_provider_message(response).await;
            return Err(IdentityError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let session: SessionResponse = response.json().await?;
        Ok(ProviderSession {
            access_token: session.access_token,
            expires_in: session.expires_in,
            user_id: session.user.id,
            email: session.user.email,
        })
    }

    /// Updates the password of the identity bound to `access_token`.
    pub async fn update_password(
        &self,
        access_token: &str,
        password: &str,
    ) -> Result<(), IdentityError> {
        let response = self
            .http
            .put(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.publishable_key)
            .bearer_auth(access_token)
            .json(&json!({ "password": password }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = read_provider_message(response).await;
            return Err(IdentityError::Provider {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }

    /// Resolves an access token into the identity it belongs to.
    pub async fn get_user(&self, access_token: &str) -> Result<IdentityUser, IdentityError> {
        let response = self
            .http
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.publishable_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = read_provider_message(response).await;
            return Err(IdentityError::Provider {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }

    /// Builds the provider consent URL for an OAuth login/signup.
    ///
    /// `redirect_uri` must be derived from the current runtime's origin,
    /// never hard-coded. Offline access with forced consent, so a refresh
    /// token is issued even on repeat sign-ins.
    pub fn authorize_url(&self, provider: &str, redirect_uri: &Url) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&format!("{}/auth/v1/authorize", self.base_url))?;
        url.query_pairs_mut()
            .append_pair("provider", provider)
            .append_pair("redirect_to", redirect_uri.as_str())
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent");
        Ok(url)
    }

    /// Exchanges a single-use OAuth callback code for a session.
    pub async fn exchange_oauth_code(&self, code: &str) -> Result<ProviderSession, IdentityError> {
        let response = self
            .http
            .post(format!(
                "{}/auth/v1/token?grant_type=authorization_code",
                self.base_url
            ))
            .header("apikey", &self.publishable_key)
            .json(&json!({ "code": code }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = read_provider_message(response).await;
            return Err(IdentityError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let session: SessionResponse = response.json().await?;
        Ok(ProviderSession {
            access_token: session.access_token,
            expires_in: session.expires_in,
            user_id: session.user.id,
            email: session.user.email,
        })
    }

    /// Best-effort provider-side session revocation.
    pub async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError> {
        let response = self
            .http
            .post(format!("{}/auth/v1/logout", self.base_url))
            .header("apikey", &self.publishable_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = read_provider_message(response).await;
            return Err(IdentityError::Provider {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }
}

/// Password update seam. Lets flow logic be exercised with a call-counting
/// double, proving that local validation failures never reach the provider.
#[async_trait::async_trait]
pub trait PasswordUpdater: Send + Sync {
    async fn update_password(&self, access_token: &str, password: &str)
        -> Result<(), IdentityError>;
}

#[async_trait::async_trait]
impl PasswordUpdater for IdentitySession {
    async fn update_password(
        &self,
        access_token: &str,
        password: &str,
    ) -> Result<(), IdentityError> {
        IdentitySession::update_password(self, access_token, password).await
    }
}

/// Pulls a human-readable message out of a provider error body. Providers
/// disagree on the field name, so several are tried before falling back to
/// the raw body.
async fn read_provider_message(response: reqwest::Response) -> String {
    let raw = response.text().await.unwrap_or_default();
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw) {
        for field in ["msg", "message", "error_description", "error"] {
            if let Some(message) = value.get(field).and_then(|v| v.as_str()) {
                return message.to_string();
            }
        }
    }
    if raw.is_empty() {
        "Identity provider request failed".to_string()
    } else {
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purpose_wire_values() {
        assert_eq!(CodePurpose::Signup.as_str(), "signup");
        assert_eq!(CodePurpose::Recovery.as_str(), "recovery");
    }

    #[test]
    fn test_generate_link_response_rejects_empty_code() {
        let with_code: GenerateLinkResponse = serde_json::from_value(json!({
            "user": {"id": "3fa85f64-5717-4562-b3fc-2c963f66afa6", "email": "a@x.com"},
            "email_otp": "91748362"
        }))
        .unwrap();
        assert_eq!(with_code.code().as_deref(), Some("91748362"));

        let empty: GenerateLinkResponse = serde_json::from_value(json!({
            "user": {"id": "3fa85f64-5717-4562-b3fc-2c963f66afa6", "email": "a@x.com"},
            "email_otp": ""
        }))
        .unwrap();
        assert!(empty.code().is_none());

        let missing: GenerateLinkResponse = serde_json::from_value(json!({
            "user": {"id": "3fa85f64-5717-4562-b3fc-2c963f66afa6", "email": "a@x.com"}
        }))
        .unwrap();
        assert!(missing.code().is_none());
    }

    #[test]
    fn test_authorize_url_carries_offline_consent_and_redirect() {
        let session = IdentitySession::new("https://id.example.com", "pk_test");
        let redirect = Url::parse("https://app.example.com/auth/callback").unwrap();
        let url = session.authorize_url("google", &redirect).unwrap();

        assert!(url.as_str().starts_with("https://id.example.com/auth/v1/authorize?"));
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("provider".into(), "google".into())));
        assert!(pairs.contains(&("redirect_to".into(), redirect.to_string())));
        assert!(pairs.contains(&("access_type".into(), "offline".into())));
        assert!(pairs.contains(&("prompt".into(), "consent".into())));
    }
}
