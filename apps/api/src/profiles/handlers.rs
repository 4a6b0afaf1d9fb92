use axum::{
    extract::{Multipart, State},
    http::HeaderMap,
    Json,
};
use aws_sdk_s3::primitives::ByteStream;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::session::require_session;
use crate::errors::AppError;
use crate::models::profile::ProfileRow;
use crate::profiles;
use crate::state::AppState;

const MAX_AVATAR_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct OnboardingRequest {
    pub full_name: String,
    pub college_name: String,
    pub degree: String,
    pub graduation_year: i32,
    pub current_semester: Option<i32>,
    pub target_domain: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub core_interests: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub college_name: Option<String>,
    pub degree: Option<String>,
    pub graduation_year: Option<i32>,
    pub current_semester: Option<i32>,
    pub target_domain: Option<String>,
    pub skills: Option<Vec<String>>,
    pub core_interests: Option<Vec<String>>,
}

/// GET /api/v1/profile
pub async fn handle_get_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ProfileRow>, AppError> {
    let user = require_session(&headers, &state).await?;
    let profile = profiles::get_profile(&state.db, user.id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No profile for {}", user.id)))?;
    Ok(Json(profile))
}

/// PUT /api/v1/profile
pub async fn handle_update_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileRow>, AppError> {
    let user = require_session(&headers, &state).await?;
    if let Some(year) = req.graduation_year {
        validate_graduation_year(year)?;
    }

    let patch = profiles::ProfilePatch {
        full_name: req.full_name,
        college_name: req.college_name,
        degree: req.degree,
        graduation_year: req.graduation_year,
        current_semester: req.current_semester,
        target_domain: req.target_domain,
        skills: req.skills,
        core_interests: req.core_interests,
    };
    let profile = profiles::update_profile(&state.db, user.id, &patch)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No profile for {}", user.id)))?;
    Ok(Json(profile))
}

/// POST /api/v1/onboarding
pub async fn handle_complete_onboarding(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<OnboardingRequest>,
) -> Result<Json<ProfileRow>, AppError> {
    let user = require_session(&headers, &state).await?;
    if req.full_name.trim().is_empty() || req.college_name.trim().is_empty() {
        return Err(AppError::Validation(
            "full_name and college_name are required".to_string(),
        ));
    }
    validate_graduation_year(req.graduation_year)?;

    let payload = profiles::OnboardingPayload {
        full_name: req.full_name.trim(),
        college_name: req.college_name.trim(),
        degree: req.degree.trim(),
        graduation_year: req.graduation_year,
        current_semester: req.current_semester,
        target_domain: req.target_domain.trim(),
        skills: &req.skills,
        core_interests: &req.core_interests,
    };
    let profile = profiles::complete_onboarding(&state.db, user.id, &user.email, &payload).await?;
    Ok(Json(profile))
}

/// POST /api/v1/profile/avatar
///
/// Multipart upload; the image lands in the media bucket and the public
/// URL is stored on the profile.
pub async fn handle_upload_avatar(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<ProfileRow>, AppError> {
    let user = require_session(&headers, &state).await?;

    let mut upload: Option<(Vec<u8>, &'static str)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let extension = match field.content_type() {
            Some("image/png") => "png",
            Some("image/jpeg") => "jpg",
            Some("image/webp") => "webp",
            other => {
                return Err(AppError::Validation(format!(
                    "Unsupported avatar content type: {}",
                    other.unwrap_or("none")
                )))
            }
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read upload: {e}")))?;
        if bytes.len() > MAX_AVATAR_BYTES {
            return Err(AppError::Validation(format!(
                "Avatar exceeds {MAX_AVATAR_BYTES} bytes"
            )));
        }
        upload = Some((bytes.to_vec(), extension));
    }

    let (bytes, extension) =
        upload.ok_or_else(|| AppError::Validation("Missing 'file' field".to_string()))?;

    let key = format!("avatars/{}/{}.{extension}", user.id, Uuid::new_v4());
    state
        .s3
        .put_object()
        .bucket(&state.config.s3_bucket)
        .key(&key)
        .body(ByteStream::from(bytes))
        .send()
        .await
        .map_err(|e| AppError::Storage(format!("Avatar upload failed: {e}")))?;

    let avatar_url = public_object_url(&state.config.s3_endpoint, &state.config.s3_bucket, &key);
    profiles::set_avatar_url(&state.db, user.id, &avatar_url).await?;
    info!("Avatar updated for {}", user.id);

    let profile = profiles::get_profile(&state.db, user.id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No profile for {}", user.id)))?;
    Ok(Json(profile))
}

fn validate_graduation_year(year: i32) -> Result<(), AppError> {
    if !(1980..=2100).contains(&year) {
        return Err(AppError::Validation(format!(
            "graduation_year {year} is out of range"
        )));
    }
    Ok(())
}

fn public_object_url(endpoint: &str, bucket: &str, key: &str) -> String {
    format!("{}/{bucket}/{key}", endpoint.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graduation_year_bounds() {
        assert!(validate_graduation_year(2027).is_ok());
        assert!(validate_graduation_year(1979).is_err());
        assert!(validate_graduation_year(2101).is_err());
    }

    #[test]
    fn test_public_object_url_normalizes_endpoint() {
        assert_eq!(
            public_object_url("https://media.example.com/", "lodestar", "avatars/a/b.png"),
            "https://media.example.com/lodestar/avatars/a/b.png"
        );
    }
}
