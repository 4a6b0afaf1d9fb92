use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::session::require_session;
use crate::errors::AppError;
use crate::intel::{self, IntelItem};
use crate::profiles;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IntelQuery {
    pub domain: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IntelResponse {
    pub domain: String,
    pub items: Vec<IntelItem>,
    pub cached: bool,
}

/// GET /api/v1/intel?domain=...
///
/// Falls back to the profile's target domain when none is given.
pub async fn handle_get_intel(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<IntelQuery>,
) -> Result<Json<IntelResponse>, AppError> {
    let user = require_session(&headers, &state).await?;

    let domain = match query.domain.filter(|d| !d.trim().is_empty()) {
        Some(domain) => domain.trim().to_string(),
        None => profiles::get_profile(&state.db, user.id)
            .await?
            .and_then(|p| p.target_domain)
            .ok_or_else(|| {
                AppError::Validation(
                    "No domain given and no target domain on the profile".to_string(),
                )
            })?,
    };

    if let Some(items) = intel::cached_intel(&state.redis, &domain).await {
        debug!("Intel cache hit for '{domain}'");
        return Ok(Json(IntelResponse {
            domain,
            items,
            cached: true,
        }));
    }

    let items = state
        .search
        .search(&intel::intel_query(&domain))
        .await
        .map_err(|e| AppError::Search(e.to_string()))?;
    intel::store_intel(&state.redis, &domain, &items).await;

    Ok(Json(IntelResponse {
        domain,
        items,
        cached: false,
    }))
}
