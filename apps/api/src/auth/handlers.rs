use axum::{
    extract::{Path, Query, State},
    http::header::SET_COOKIE,
    http::{HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth::flow::{
    code_ready, passwords_match, CredentialFlow, FlowKind, FlowStep, INVALID_CODE_MESSAGE,
};
use crate::auth::identity::{CodePurpose, IdentityError, PasswordUpdater, ProviderSession};
use crate::auth::origin::callback_url;
use crate::auth::session::{clear_session_cookie, extract_session_token, session_cookie};
use crate::errors::AppError;
use crate::profiles;
use crate::state::AppState;

/// Fixed message for generation failures with no diagnosable provider
/// message (missing code payload, transport failure).
pub const GENERATE_FAILED_MESSAGE: &str = "Failed to generate security token";

const DEFAULT_POST_LOGIN_PATH: &str = "/dashboard";
const LOGIN_PATH: &str = "/auth/login";

/// Structured flow outcome returned to the UI. Flow-level failures are data,
/// not HTTP errors: the response stays 200 and carries `{error}`.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum FlowReply {
    Initiated {
        success: bool,
        flow_id: Uuid,
        email: String,
    },
    Completed {
        success: bool,
    },
    Failed {
        error: String,
    },
}

impl FlowReply {
    fn initiated(flow_id: Uuid, email: &str) -> Self {
        FlowReply::Initiated {
            success: true,
            flow_id,
            email: email.to_string(),
        }
    }

    fn ok() -> Self {
        FlowReply::Completed { success: true }
    }

    fn failed(message: impl Into<String>) -> Self {
        FlowReply::Failed {
            error: message.into(),
        }
    }

    #[cfg(test)]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            FlowReply::Failed { error } => Some(error),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub full_name: String,
}

#[derive(Debug, Deserialize)]
pub struct RecoveryRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub flow_id: Uuid,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordUpdateRequest {
    pub flow_id: Uuid,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
pub struct AbortRequest {
    pub flow_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct OAuthQuery {
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub next: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub user_id: Uuid,
    pub email: String,
    pub onboarding_completed: bool,
}

/// POST /api/v1/auth/signup
///
/// Collect identity → generate code → upsert minimal profile → dispatch
/// email → open the flow record. Email dispatch failure is a hard failure
/// of the whole step; no flow record is created for an undelivered code.
pub async fn signup_initiate(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<Json<FlowReply>, AppError> {
    let email = req.email.trim().to_lowercase();
    if !looks_like_email(&email) {
        return Ok(Json(FlowReply::failed("Enter a valid email address.")));
    }
    if req.full_name.trim().is_empty() {
        return Ok(Json(FlowReply::failed("Enter your full name.")));
    }
    // Local check first: a mismatch never costs a network round trip.
    if !passwords_match(&req.password, &req.confirm_password) {
        return Ok(Json(FlowReply::failed("Passwords do not match.")));
    }

    let generated = match state
        .identity_admin
        .generate_code(&email, CodePurpose::Signup, Some(&req.password))
        .await
    {
        Ok(generated) => generated,
        Err(err) => {
            warn!("Signup code generation failed for {email}: {err}");
            return Ok(Json(FlowReply::failed(dispatch_error_message(&err))));
        }
    };

    // Profile row exists before the identity is confirmed, keyed by the
    // provider-issued id. Requires elevated access; no session exists yet.
    profiles::bootstrap_profile(
        &state.db,
        generated.user_id,
        &generated.email,
        Some(req.full_name.trim()),
    )
    .await?;

    if let Err(err) = state
        .mailer
        .send_code(&generated.email, &generated.code, CodePurpose::Signup)
        .await
    {
        error!("Verification email dispatch failed for {email}: {err}");
        return Ok(Json(FlowReply::failed(
            "Failed to send the verification email. Please try again.",
        )));
    }

    let mut flow = CredentialFlow::signup(&email);
    flow.user_id = Some(generated.user_id);
    flow.code_dispatched()
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    state.flows.put(&flow).await?;

    info!("Signup flow {} opened for {}", flow.id, flow.email());
    Ok(Json(FlowReply::initiated(flow.id, flow.email())))
}

/// POST /api/v1/auth/signup/verify
///
/// Sets the session cookie on success; the provider mints the session as a
/// side effect of accepting the code.
pub async fn signup_verify(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> Result<Response, AppError> {
    let (reply, session) = verify_flow(&state, req.flow_id, &req.code, FlowKind::Signup).await?;
    respond_with_session(&state, reply, session)
}

/// POST /api/v1/auth/recovery
pub async fn recovery_initiate(
    State(state): State<AppState>,
    Json(req): Json<RecoveryRequest>,
) -> Result<Json<FlowReply>, AppError> {
    let email = req.email.trim().to_lowercase();
    if !looks_like_email(&email) {
        return Ok(Json(FlowReply::failed("Enter a valid email address.")));
    }

    let generated = match state
        .identity_admin
        .generate_code(&email, CodePurpose::Recovery, None)
        .await
    {
        Ok(generated) => generated,
        Err(err) => {
            warn!("Recovery code generation failed for {email}: {err}");
            return Ok(Json(FlowReply::failed(dispatch_error_message(&err))));
        }
    };

    if let Err(err) = state
        .mailer
        .send_code(&generated.email, &generated.code, CodePurpose::Recovery)
        .await
    {
        error!("Recovery email dispatch failed for {email}: {err}");
        return Ok(Json(FlowReply::failed(
            "Failed to send the recovery email. Please try again.",
        )));
    }

    let mut flow = CredentialFlow::recovery(&email);
    flow.user_id = Some(generated.user_id);
    flow.code_dispatched()
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    state.flows.put(&flow).await?;

    info!("Recovery flow {} opened for {}", flow.id, flow.email());
    Ok(Json(FlowReply::initiated(flow.id, flow.email())))
}

/// POST /api/v1/auth/recovery/verify
///
/// A correct recovery code establishes a live session before the new
/// password is chosen; recovery codes double as a sign-in mechanism.
pub async fn recovery_verify(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> Result<Response, AppError> {
    let (reply, session) = verify_flow(&state, req.flow_id, &req.code, FlowKind::Recovery).await?;
    respond_with_session(&state, reply, session)
}

/// POST /api/v1/auth/recovery/password
pub async fn recovery_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<PasswordUpdateRequest>,
) -> Result<Json<FlowReply>, AppError> {
    let Some(mut flow) = state.flows.get(req.flow_id).await? else {
        return Ok(Json(FlowReply::failed(
            "This reset flow has expired. Start again.",
        )));
    };
    if flow.kind != FlowKind::Recovery {
        return Ok(Json(FlowReply::failed(
            "This reset flow has expired. Start again.",
        )));
    }

    let token = extract_session_token(&headers);
    let reply = apply_password_update(
        &mut flow,
        token.as_deref(),
        &req.password,
        &req.confirm_password,
        &state.identity,
    )
    .await;

    if flow.step == FlowStep::Complete {
        state.flows.delete(flow.id).await?;
        info!("Recovery flow {} completed", flow.id);
    } else {
        state.flows.put(&flow).await?;
    }
    Ok(Json(reply))
}

/// POST /api/v1/auth/abort
///
/// Manual abort-and-restart. The stored record is deleted, so nothing of
/// the previous code entry survives; a new flow starts from the entry step.
pub async fn abort_flow(
    State(state): State<AppState>,
    Json(req): Json<AbortRequest>,
) -> Result<Json<FlowReply>, AppError> {
    if let Some(mut flow) = state.flows.get(req.flow_id).await? {
        flow.abort();
        state.flows.delete(flow.id).await?;
        info!("Flow {} aborted", flow.id);
    }
    Ok(Json(FlowReply::ok()))
}

/// GET /api/v1/auth/oauth/:provider
///
/// Single-shot: build the consent URL against the runtime-derived origin
/// and redirect. Failure surfaces inline; there is no retry.
pub async fn oauth_redirect(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<OAuthQuery>,
    headers: HeaderMap,
) -> Response {
    let mut callback = callback_url(&headers, state.config.public_base_url.as_deref());
    if let Some(next) = query.next.as_deref().filter(|n| is_safe_next(n)) {
        callback.query_pairs_mut().append_pair("next", next);
    }

    match state.identity.authorize_url(&provider, &callback) {
        Ok(url) => {
            debug!("OAuth redirect for provider {provider}: {url}");
            Redirect::to(url.as_str()).into_response()
        }
        Err(err) => {
            error!("Failed to build OAuth authorize URL: {err}");
            Json(FlowReply::failed("Could not start the sign-in flow.")).into_response()
        }
    }
}

/// GET /auth/callback?code=...&next=...
///
/// Terminal on failure: every branch redirects exactly once, either into
/// the app or back to the login page with an error parameter. Never loops.
pub async fn oauth_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let Some(code) = query.code.as_deref().map(str::trim).filter(|c| !c.is_empty()) else {
        // No exchange is attempted without a code.
        return login_redirect("Missing authorization code");
    };

    let session = match state.identity.exchange_oauth_code(code).await {
        Ok(session) => session,
        Err(err) => {
            error!("OAuth code exchange failed: {err}");
            return login_redirect("Could not complete sign-in. Please try again.");
        }
    };

    // First OAuth sign-in provisions the profile row like a signup does.
    if let Err(err) =
        profiles::bootstrap_profile(&state.db, session.user_id, &session.email, None).await
    {
        error!("Profile bootstrap failed after OAuth exchange: {err}");
        return login_redirect("Could not prepare your account. Please try again.");
    }

    let cookie = match session_cookie(
        &session.access_token,
        session.expires_in,
        state.config.session_cookie_secure,
    ) {
        Ok(cookie) => cookie,
        Err(err) => {
            error!("Session cookie construction failed: {err}");
            return login_redirect("Could not complete sign-in. Please try again.");
        }
    };

    let next = query
        .next
        .as_deref()
        .filter(|n| is_safe_next(n))
        .unwrap_or(DEFAULT_POST_LOGIN_PATH)
        .to_string();
    info!("OAuth session established for {}", session.email);
    (AppendHeaders([(SET_COOKIE, cookie)]), Redirect::to(&next)).into_response()
}

/// POST /api/v1/auth/logout
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    if let Some(token) = extract_session_token(&headers) {
        // Provider-side revocation is best effort; the cookie is cleared
        // regardless.
        if let Err(err) = state.identity.sign_out(&token).await {
            warn!("Provider session revocation failed: {err}");
        }
    }

    let cookie = clear_session_cookie(state.config.session_cookie_secure)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("cookie build failed: {e}")))?;
    Ok((AppendHeaders([(SET_COOKIE, cookie)]), Redirect::to(LOGIN_PATH)).into_response())
}

/// GET /api/v1/auth/session
pub async fn session_info(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let Some(token) = extract_session_token(&headers) else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };

    match state.identity.get_user(&token).await {
        Ok(user) => {
            let onboarding_completed =
                profiles::onboarding_completed(&state.db, user.id).await?;
            Ok(Json(SessionInfo {
                user_id: user.id,
                email: user.email,
                onboarding_completed,
            })
            .into_response())
        }
        Err(_) => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// Shared OTP verification path for both flow kinds.
///
/// Every failure reports the same fixed message; whether the email exists
/// or the code merely expired is not distinguishable from the outside.
async fn verify_flow(
    state: &AppState,
    flow_id: Uuid,
    code: &str,
    expected_kind: FlowKind,
) -> Result<(FlowReply, Option<ProviderSession>), AppError> {
    let Some(mut flow) = state.flows.get(flow_id).await? else {
        return Ok((FlowReply::failed(INVALID_CODE_MESSAGE), None));
    };
    if flow.kind != expected_kind || flow.step != FlowStep::Otp {
        return Ok((FlowReply::failed(INVALID_CODE_MESSAGE), None));
    }

    if let Err(err) = flow.begin_submit() {
        return Ok((FlowReply::failed(err.to_string()), None));
    }
    state.flows.put(&flow).await?;

    // Length gate: short or overlong entries never reach the provider.
    if !code_ready(code) {
        flow.end_submit();
        state.flows.put(&flow).await?;
        return Ok((FlowReply::failed(INVALID_CODE_MESSAGE), None));
    }

    let purpose = match flow.kind {
        FlowKind::Signup => CodePurpose::Signup,
        FlowKind::Recovery => CodePurpose::Recovery,
    };

    // Verification always runs against the pinned email, never client input.
    match state.identity.verify_code(flow.email(), code, purpose).await {
        Ok(session) => {
            flow.code_verified()
                .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
            if flow.step == FlowStep::Complete {
                state.flows.delete(flow.id).await?;
            } else {
                flow.end_submit();
                state.flows.put(&flow).await?;
            }
            info!("Flow {} verified for {}", flow.id, flow.email());
            Ok((FlowReply::ok(), Some(session)))
        }
        Err(err) => {
            debug!("Code rejected on flow {}: {err}", flow.id);
            flow.code_rejected();
            state.flows.put(&flow).await?;
            Ok((FlowReply::failed(INVALID_CODE_MESSAGE), None))
        }
    }
}

/// Password update step, factored for testability: local validation runs
/// before the updater is ever touched.
pub(crate) async fn apply_password_update(
    flow: &mut CredentialFlow,
    access_token: Option<&str>,
    password: &str,
    confirm: &str,
    updater: &dyn PasswordUpdater,
) -> FlowReply {
    if flow.step != FlowStep::Password {
        return FlowReply::failed("Verify your code before choosing a new password.");
    }
    if !passwords_match(password, confirm) {
        return FlowReply::failed("Passwords do not match.");
    }
    let Some(token) = access_token else {
        return FlowReply::failed("Your session has expired. Restart the reset flow.");
    };
    if let Err(err) = flow.begin_submit() {
        return FlowReply::failed(err.to_string());
    }

    match updater.update_password(token, password).await {
        Ok(()) => match flow.password_updated() {
            Ok(()) => FlowReply::ok(),
            Err(err) => {
                flow.end_submit();
                FlowReply::failed(err.to_string())
            }
        },
        Err(err) => {
            flow.end_submit();
            FlowReply::failed(err.to_string())
        }
    }
}

fn respond_with_session(
    state: &AppState,
    reply: FlowReply,
    session: Option<ProviderSession>,
) -> Result<Response, AppError> {
    match session {
        Some(session) => {
            let cookie = session_cookie(
                &session.access_token,
                session.expires_in,
                state.config.session_cookie_secure,
            )
            .map_err(|e| AppError::Internal(anyhow::anyhow!("cookie build failed: {e}")))?;
            Ok((AppendHeaders([(SET_COOKIE, cookie)]), Json(reply)).into_response())
        }
        None => Ok(Json(reply).into_response()),
    }
}

fn dispatch_error_message(err: &IdentityError) -> String {
    match err {
        // Provider messages are useful diagnostics on the generation path
        // (configuration, rate limits) and carry no code material.
        IdentityError::Provider { message, .. } => message.clone(),
        IdentityError::MissingCode | IdentityError::Http(_) => GENERATE_FAILED_MESSAGE.to_string(),
    }
}

fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

/// Only same-origin relative paths are accepted as post-login targets.
fn is_safe_next(next: &str) -> bool {
    next.starts_with('/') && !next.starts_with("//")
}

fn login_redirect(message: &str) -> Response {
    let query: String = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("error", message)
        .finish();
    Redirect::to(&format!("{LOGIN_PATH}?{query}")).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Call-counting double for the password update seam.
    struct CountingUpdater {
        calls: AtomicUsize,
        fail_with: Option<String>,
    }

    impl CountingUpdater {
        fn succeeding() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_with: None,
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_with: Some(message.to_string()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl PasswordUpdater for CountingUpdater {
        async fn update_password(
            &self,
            _access_token: &str,
            _password: &str,
        ) -> Result<(), IdentityError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.fail_with {
                Some(message) => Err(IdentityError::Provider {
                    status: 422,
                    message: message.clone(),
                }),
                None => Ok(()),
            }
        }
    }

    fn recovery_flow_at_password() -> CredentialFlow {
        let mut flow = CredentialFlow::recovery("a@x.com");
        flow.code_dispatched().unwrap();
        flow.code_verified().unwrap();
        flow
    }

    #[tokio::test]
    async fn test_mismatched_passwords_never_reach_the_updater() {
        let mut flow = recovery_flow_at_password();
        let updater = CountingUpdater::succeeding();
        let reply = apply_password_update(
            &mut flow,
            Some("tok"),
            "Secret1!",
            "Different1!",
            &updater,
        )
        .await;
        assert_eq!(reply.error_message(), Some("Passwords do not match."));
        assert_eq!(updater.calls(), 0);
        assert_eq!(flow.step, FlowStep::Password);
    }

    #[tokio::test]
    async fn test_wrong_step_never_reaches_the_updater() {
        let mut flow = CredentialFlow::recovery("a@x.com");
        flow.code_dispatched().unwrap(); // still at Otp
        let updater = CountingUpdater::succeeding();
        let reply =
            apply_password_update(&mut flow, Some("tok"), "Secret1!", "Secret1!", &updater).await;
        assert!(reply.error_message().is_some());
        assert_eq!(updater.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_session_never_reaches_the_updater() {
        let mut flow = recovery_flow_at_password();
        let updater = CountingUpdater::succeeding();
        let reply = apply_password_update(&mut flow, None, "Secret1!", "Secret1!", &updater).await;
        assert!(reply.error_message().is_some());
        assert_eq!(updater.calls(), 0);
    }

    #[tokio::test]
    async fn test_successful_update_completes_the_flow() {
        let mut flow = recovery_flow_at_password();
        let updater = CountingUpdater::succeeding();
        let reply =
            apply_password_update(&mut flow, Some("tok"), "Secret1!", "Secret1!", &updater).await;
        assert!(reply.error_message().is_none());
        assert_eq!(updater.calls(), 1);
        assert_eq!(flow.step, FlowStep::Complete);
    }

    #[tokio::test]
    async fn test_provider_rejection_keeps_password_step() {
        let mut flow = recovery_flow_at_password();
        let updater = CountingUpdater::failing("Password is too weak");
        let reply =
            apply_password_update(&mut flow, Some("tok"), "weak", "weak", &updater).await;
        assert_eq!(reply.error_message(), Some("Password is too weak"));
        assert_eq!(flow.step, FlowStep::Password);
        // The flow stays usable for a second attempt.
        let retry = apply_password_update(
            &mut flow,
            Some("tok"),
            "Stronger1!",
            "Stronger1!",
            &CountingUpdater::succeeding(),
        )
        .await;
        assert!(retry.error_message().is_none());
    }

    #[test]
    fn test_dispatch_error_message_policy() {
        let provider = IdentityError::Provider {
            status: 429,
            message: "rate limit exceeded".to_string(),
        };
        assert_eq!(dispatch_error_message(&provider), "rate limit exceeded");
        assert_eq!(
            dispatch_error_message(&IdentityError::MissingCode),
            GENERATE_FAILED_MESSAGE
        );
    }

    #[test]
    fn test_safe_next_paths() {
        assert!(is_safe_next("/dashboard"));
        assert!(is_safe_next("/profile?tab=skills"));
        assert!(!is_safe_next("//evil.example.com"));
        assert!(!is_safe_next("https://evil.example.com"));
        assert!(!is_safe_next(""));
    }

    #[test]
    fn test_looks_like_email() {
        assert!(looks_like_email("a@x.com"));
        assert!(!looks_like_email("ax.com"));
        assert!(!looks_like_email("a@"));
        assert!(!looks_like_email("a@x."));
    }

    #[test]
    fn test_login_redirect_encodes_error() {
        let response = login_redirect("Missing authorization code");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response
            .headers()
            .get(axum::http::header::LOCATION)
            .unwrap();
        assert_eq!(
            location.to_str().unwrap(),
            "/auth/login?error=Missing+authorization+code"
        );
    }

    #[test]
    fn test_flow_reply_shapes() {
        let id = Uuid::new_v4();
        let initiated = serde_json::to_value(FlowReply::initiated(id, "a@x.com")).unwrap();
        assert_eq!(initiated["success"], true);
        assert_eq!(initiated["email"], "a@x.com");

        let failed = serde_json::to_value(FlowReply::failed(INVALID_CODE_MESSAGE)).unwrap();
        assert_eq!(failed["error"], "Invalid or expired code.");
        assert!(failed.get("success").is_none());
    }
}
