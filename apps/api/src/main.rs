mod auth;
mod chat;
mod config;
mod db;
mod errors;
mod intel;
mod llm_client;
mod mailer;
mod models;
mod profiles;
mod resume;
mod routes;
mod state;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::auth::identity::{IdentityAdmin, IdentitySession};
use crate::auth::store::FlowStore;
use crate::config::Config;
use crate::db::create_pool;
use crate::intel::SearchClient;
use crate::llm_client::LlmClient;
use crate::mailer::EmailApiMailer;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Lodestar API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Initialize Redis (credential flow store + intel cache)
    let redis = redis::Client::open(config.redis_url.clone())?;
    let flows = FlowStore::new(redis.clone());
    info!("Redis client initialized");

    // Initialize S3-compatible media storage
    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized");

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone());
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    // Identity provider clients: the service-role client generates codes,
    // the user-scoped client verifies them and owns sessions.
    let identity_admin = IdentityAdmin::new(&config.identity_base_url, &config.identity_service_key);
    let identity = IdentitySession::new(
        &config.identity_base_url,
        &config.identity_publishable_key,
    );
    info!("Identity clients initialized for {}", config.identity_base_url);

    // Outbound email for one-time codes
    let mailer = Arc::new(EmailApiMailer::new(
        &config.email_api_url,
        &config.email_api_key,
        &config.email_from,
    ));

    // Hosted search API for market intel
    let search = SearchClient::new(&config.search_api_url, &config.search_api_key);

    // Build app state
    let state = AppState {
        db,
        redis,
        flows,
        s3,
        llm,
        identity_admin,
        identity,
        mailer,
        search,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or a hosted media
/// endpoint (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "lodestar-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
