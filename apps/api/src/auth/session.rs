//! Session cookie plumbing.
//!
//! The provider-issued access token is opaque to this service: it is set,
//! extracted, and cleared, never parsed. `HttpOnly` keeps it away from
//! scripts; `SameSite=Lax` still allows the OAuth callback navigation to
//! carry it.

use axum::http::header::{InvalidHeaderValue, AUTHORIZATION, COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;

pub const SESSION_COOKIE_NAME: &str = "lodestar_session";

/// The identity bound to the current request's session cookie.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
}

/// Builds the `Set-Cookie` value establishing a session.
pub fn session_cookie(
    token: &str,
    max_age_secs: u64,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Builds the `Set-Cookie` value destroying the session.
pub fn clear_session_cookie(secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Pulls the session token out of the request: cookie first, bearer header
/// as a fallback for non-browser clients.
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(COOKIE).and_then(|v| v.to_str().ok()) {
        for pair in value.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            let key = parts.next()?.trim();
            let val = parts.next()?.trim();
            if key == SESSION_COOKIE_NAME && !val.is_empty() {
                return Some(val.to_string());
            }
        }
    }

    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value
        .trim()
        .strip_prefix("Bearer ")
        .or_else(|| value.trim().strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Resolves the request's session into a [`CurrentUser`], or rejects with
/// `Unauthorized`. The provider is the authority; no local token checks.
pub async fn require_session(
    headers: &HeaderMap,
    state: &AppState,
) -> Result<CurrentUser, AppError> {
    let token = extract_session_token(headers).ok_or(AppError::Unauthorized)?;
    let user = state
        .identity
        .get_user(&token)
        .await
        .map_err(|_| AppError::Unauthorized)?;
    Ok(CurrentUser {
        id: user.id,
        email: user.email,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie_format() {
        let cookie = session_cookie("tok_abc123", 3600, false).unwrap();
        assert_eq!(
            cookie.to_str().unwrap(),
            "lodestar_session=tok_abc123; Path=/; HttpOnly; SameSite=Lax; Max-Age=3600"
        );
    }

    #[test]
    fn test_secure_flag_appended_when_configured() {
        let cookie = session_cookie("tok", 60, true).unwrap();
        assert!(cookie.to_str().unwrap().ends_with("; Secure"));
    }

    #[test]
    fn test_clear_cookie_zeroes_max_age() {
        let cookie = clear_session_cookie(false).unwrap();
        assert!(cookie.to_str().unwrap().contains("Max-Age=0"));
        assert!(cookie.to_str().unwrap().starts_with("lodestar_session=;"));
    }

    #[test]
    fn test_extract_token_from_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; lodestar_session=tok_xyz; other=1"),
        );
        assert_eq!(extract_session_token(&headers).as_deref(), Some("tok_xyz"));
    }

    #[test]
    fn test_extract_token_from_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer tok_abc"));
        assert_eq!(extract_session_token(&headers).as_deref(), Some("tok_abc"));
    }

    #[test]
    fn test_missing_or_empty_token_is_none() {
        assert!(extract_session_token(&HeaderMap::new()).is_none());

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("lodestar_session="));
        assert!(extract_session_token(&headers).is_none());
    }
}
