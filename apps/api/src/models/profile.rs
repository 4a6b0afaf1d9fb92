use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One row per identity. `id` equals the provider-issued identity id; the
/// row is created at signup initiation with partial data and completed by
/// onboarding. Never deleted by this system.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProfileRow {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub college_name: Option<String>,
    pub degree: Option<String>,
    pub graduation_year: Option<i32>,
    pub current_semester: Option<i32>,
    pub target_domain: Option<String>,
    pub skills: Vec<String>,
    pub core_interests: Vec<String>,
    pub avatar_url: Option<String>,
    pub onboarding_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
