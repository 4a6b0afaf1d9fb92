use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeAnalysisRow {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Object key of the uploaded original in the media bucket.
    pub file_key: String,
    pub overall_score: i32,
    pub analysis: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Structured analysis returned by the LLM. Persisted verbatim in
/// `ResumeAnalysisRow::analysis`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeAnalysis {
    pub overall_score: i32,
    pub summary: String,
    pub strengths: Vec<String>,
    pub gaps: Vec<String>,
    pub suggested_roles: Vec<String>,
}
