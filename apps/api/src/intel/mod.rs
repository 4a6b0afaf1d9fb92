//! Market intel: recent news for a target domain via the hosted search
//! API. Pure pass-through (no ranking of our own) with a short-lived
//! per-domain cache so a dashboard refresh does not re-bill the provider.

pub mod handlers;

use redis::AsyncCommands;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

const CACHE_TTL_SECS: u64 = 30 * 60;
const MAX_RESULTS: u32 = 8;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Search API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

/// One normalized intel item, provider shape flattened away.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntelItem {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub source: String,
    pub published: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    title: String,
    url: String,
    #[serde(default)]
    content: String,
    source: Option<String>,
    published_date: Option<String>,
}

/// Thin client over the hosted search API.
#[derive(Clone)]
pub struct SearchClient {
    http: Client,
    api_url: String,
    api_key: String,
}

impl SearchClient {
    pub fn new(api_url: &str, api_key: &str) -> Self {
        Self {
            http: Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub async fn search(&self, query: &str) -> Result<Vec<IntelItem>, SearchError> {
        let response = self
            .http
            .post(format!("{}/search", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "query": query,
                "max_results": MAX_RESULTS,
                "topic": "news",
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SearchError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let payload: SearchResponse = response.json().await?;
        Ok(payload.results.into_iter().map(normalize).collect())
    }
}

fn normalize(result: SearchResult) -> IntelItem {
    let source = result
        .source
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| host_of(&result.url));
    IntelItem {
        title: result.title,
        snippet: truncate_snippet(&result.content),
        url: result.url,
        source,
        published: result.published_date,
    }
}

fn host_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

fn truncate_snippet(content: &str) -> String {
    let trimmed = content.trim();
    let mut snippet: String = trimmed.chars().take(280).collect();
    if trimmed.chars().count() > 280 {
        snippet.push('…');
    }
    snippet
}

fn cache_key(domain: &str) -> String {
    format!("intel:{}", domain.to_lowercase().replace(' ', "_"))
}

pub async fn cached_intel(
    redis: &redis::Client,
    domain: &str,
) -> Option<Vec<IntelItem>> {
    let mut conn = redis.get_multiplexed_async_connection().await.ok()?;
    let raw: Option<String> = conn.get(cache_key(domain)).await.ok()?;
    serde_json::from_str(&raw?).ok()
}

/// Best effort: a cache write failure only costs a future provider call.
pub async fn store_intel(redis: &redis::Client, domain: &str, items: &[IntelItem]) {
    let Ok(payload) = serde_json::to_string(items) else {
        return;
    };
    match redis.get_multiplexed_async_connection().await {
        Ok(mut conn) => {
            let result: Result<(), redis::RedisError> =
                conn.set_ex(cache_key(domain), payload, CACHE_TTL_SECS).await;
            if let Err(err) = result {
                warn!("Intel cache write failed: {err}");
            } else {
                debug!("Cached intel for domain '{domain}'");
            }
        }
        Err(err) => warn!("Intel cache connection failed: {err}"),
    }
}

pub fn intel_query(domain: &str) -> String {
    format!("latest {domain} industry news and hiring trends for students")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_falls_back_to_url_host() {
        let item = normalize(SearchResult {
            title: "Hiring up".to_string(),
            url: "https://www.example.com/news/1".to_string(),
            content: "Hiring is up.".to_string(),
            source: None,
            published_date: Some("2026-08-01".to_string()),
        });
        assert_eq!(item.source, "example.com");
        assert_eq!(item.published.as_deref(), Some("2026-08-01"));
    }

    #[test]
    fn test_normalize_prefers_provider_source() {
        let item = normalize(SearchResult {
            title: "t".to_string(),
            url: "https://example.com/a".to_string(),
            content: String::new(),
            source: Some("Example Press".to_string()),
            published_date: None,
        });
        assert_eq!(item.source, "Example Press");
    }

    #[test]
    fn test_snippet_truncation() {
        let long = "x".repeat(400);
        let snippet = truncate_snippet(&long);
        assert_eq!(snippet.chars().count(), 281);
        assert!(snippet.ends_with('…'));
        assert_eq!(truncate_snippet("short"), "short");
    }

    #[test]
    fn test_cache_key_normalization() {
        assert_eq!(cache_key("Data Science"), "intel:data_science");
    }
}
