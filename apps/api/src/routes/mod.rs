pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::auth::handlers as auth;
use crate::chat::handlers as chat;
use crate::intel::handlers as intel;
use crate::profiles::handlers as profile;
use crate::resume::handlers as resume;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Credential flows
        .route("/api/v1/auth/signup", post(auth::signup_initiate))
        .route("/api/v1/auth/signup/verify", post(auth::signup_verify))
        .route("/api/v1/auth/recovery", post(auth::recovery_initiate))
        .route("/api/v1/auth/recovery/verify", post(auth::recovery_verify))
        .route(
            "/api/v1/auth/recovery/password",
            post(auth::recovery_password),
        )
        .route("/api/v1/auth/abort", post(auth::abort_flow))
        .route("/api/v1/auth/oauth/:provider", get(auth::oauth_redirect))
        .route("/auth/callback", get(auth::oauth_callback))
        .route("/api/v1/auth/logout", post(auth::logout))
        .route("/api/v1/auth/session", get(auth::session_info))
        // Profile & onboarding
        .route(
            "/api/v1/profile",
            get(profile::handle_get_profile).put(profile::handle_update_profile),
        )
        .route("/api/v1/profile/avatar", post(profile::handle_upload_avatar))
        .route("/api/v1/onboarding", post(profile::handle_complete_onboarding))
        // AI chat
        .route(
            "/api/v1/chat",
            post(chat::handle_send_message).get(chat::handle_list_conversations),
        )
        .route("/api/v1/chat/:conversation_id", get(chat::handle_get_history))
        // Resume analysis
        .route("/api/v1/resume", post(resume::handle_upload_resume))
        .route("/api/v1/resume/latest", get(resume::handle_latest_analysis))
        // Market intel
        .route("/api/v1/intel", get(intel::handle_get_intel))
        .with_state(state)
}
