//! Profile records: provisioned at signup initiation, progressively
//! completed by onboarding, updated from the profile page. Rows are keyed
//! by the provider-issued identity id and never deleted.

pub mod handlers;

use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::profile::ProfileRow;

/// Guarantees a profile row exists for `user_id`, creating or refreshing a
/// minimal record. Runs before any session exists for the identity, so it
/// uses the service's own elevated database access rather than a
/// user-scoped path.
pub async fn bootstrap_profile(
    pool: &PgPool,
    user_id: Uuid,
    email: &str,
    full_name: Option<&str>,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO profiles (id, email, full_name)
        VALUES ($1, $2, $3)
        ON CONFLICT (id) DO UPDATE
            SET email = EXCLUDED.email,
                full_name = COALESCE(EXCLUDED.full_name, profiles.full_name),
                updated_at = now()
        "#,
    )
    .bind(user_id)
    .bind(email)
    .bind(full_name)
    .execute(pool)
    .await?;

    info!("Profile bootstrapped for {user_id}");
    Ok(())
}

pub async fn get_profile(pool: &PgPool, user_id: Uuid) -> Result<Option<ProfileRow>, AppError> {
    let row = sqlx::query_as("SELECT * FROM profiles WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Gate used by downstream pages to pick between onboarding and dashboard.
pub async fn onboarding_completed(pool: &PgPool, user_id: Uuid) -> Result<bool, AppError> {
    let completed: Option<(bool,)> =
        sqlx::query_as("SELECT onboarding_completed FROM profiles WHERE id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
    Ok(completed.map(|(c,)| c).unwrap_or(false))
}

pub struct OnboardingPayload<'a> {
    pub full_name: &'a str,
    pub college_name: &'a str,
    pub degree: &'a str,
    pub graduation_year: i32,
    pub current_semester: Option<i32>,
    pub target_domain: &'a str,
    pub skills: &'a [String],
    pub core_interests: &'a [String],
}

/// Full upsert at onboarding completion; flips the gate.
pub async fn complete_onboarding(
    pool: &PgPool,
    user_id: Uuid,
    email: &str,
    payload: &OnboardingPayload<'_>,
) -> Result<ProfileRow, AppError> {
    let row = sqlx::query_as(
        r#"
        INSERT INTO profiles
            (id, email, full_name, college_name, degree, graduation_year,
             current_semester, target_domain, skills, core_interests,
             onboarding_completed)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, TRUE)
        ON CONFLICT (id) DO UPDATE
            SET full_name = EXCLUDED.full_name,
                college_name = EXCLUDED.college_name,
                degree = EXCLUDED.degree,
                graduation_year = EXCLUDED.graduation_year,
                current_semester = EXCLUDED.current_semester,
                target_domain = EXCLUDED.target_domain,
                skills = EXCLUDED.skills,
                core_interests = EXCLUDED.core_interests,
                onboarding_completed = TRUE,
                updated_at = now()
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(email)
    .bind(payload.full_name)
    .bind(payload.college_name)
    .bind(payload.degree)
    .bind(payload.graduation_year)
    .bind(payload.current_semester)
    .bind(payload.target_domain)
    .bind(payload.skills)
    .bind(payload.core_interests)
    .fetch_one(pool)
    .await?;

    info!("Onboarding completed for {user_id}");
    Ok(row)
}

pub struct ProfilePatch {
    pub full_name: Option<String>,
    pub college_name: Option<String>,
    pub degree: Option<String>,
    pub graduation_year: Option<i32>,
    pub current_semester: Option<i32>,
    pub target_domain: Option<String>,
    pub skills: Option<Vec<String>>,
    pub core_interests: Option<Vec<String>>,
}

/// Partial update; absent fields keep their stored values.
pub async fn update_profile(
    pool: &PgPool,
    user_id: Uuid,
    patch: &ProfilePatch,
) -> Result<Option<ProfileRow>, AppError> {
    let row = sqlx::query_as(
        r#"
        UPDATE profiles
        SET full_name = COALESCE($2, full_name),
            college_name = COALESCE($3, college_name),
            degree = COALESCE($4, degree),
            graduation_year = COALESCE($5, graduation_year),
            current_semester = COALESCE($6, current_semester),
            target_domain = COALESCE($7, target_domain),
            skills = COALESCE($8, skills),
            core_interests = COALESCE($9, core_interests),
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(patch.full_name.as_deref())
    .bind(patch.college_name.as_deref())
    .bind(patch.degree.as_deref())
    .bind(patch.graduation_year)
    .bind(patch.current_semester)
    .bind(patch.target_domain.as_deref())
    .bind(patch.skills.as_deref())
    .bind(patch.core_interests.as_deref())
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn set_avatar_url(
    pool: &PgPool,
    user_id: Uuid,
    avatar_url: &str,
) -> Result<(), AppError> {
    sqlx::query("UPDATE profiles SET avatar_url = $2, updated_at = now() WHERE id = $1")
        .bind(user_id)
        .bind(avatar_url)
        .execute(pool)
        .await?;
    Ok(())
}
