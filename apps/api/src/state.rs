use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;
use redis::Client as RedisClient;
use sqlx::PgPool;

use crate::auth::identity::{IdentityAdmin, IdentitySession};
use crate::auth::store::FlowStore;
use crate::config::Config;
use crate::intel::SearchClient;
use crate::llm_client::LlmClient;
use crate::mailer::Mailer;

/// Shared application state injected into all route handlers via Axum
/// extractors. Every provider client is constructed once at startup and
/// dependency-injected here; no module-level singletons.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Redis backs the credential flow store and the intel cache.
    pub redis: RedisClient,
    pub flows: FlowStore,
    pub s3: S3Client,
    pub llm: LlmClient,
    /// Service-role identity client; code generation only.
    pub identity_admin: IdentityAdmin,
    /// User-scoped identity client; verification, sessions, passwords.
    pub identity: IdentitySession,
    pub mailer: Arc<dyn Mailer>,
    pub search: SearchClient,
    pub config: Config,
}
