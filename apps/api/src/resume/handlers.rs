use axum::{
    extract::{Multipart, State},
    http::HeaderMap,
    Json,
};
use aws_sdk_s3::primitives::ByteStream;
use tracing::info;
use uuid::Uuid;

use crate::auth::session::require_session;
use crate::errors::AppError;
use crate::llm_client::prompts::{RESUME_ANALYSIS_PROMPT, RESUME_ANALYSIS_SYSTEM};
use crate::models::resume::{ResumeAnalysis, ResumeAnalysisRow};
use crate::profiles;
use crate::resume;
use crate::state::AppState;

/// POST /api/v1/resume
pub async fn handle_upload_resume(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<ResumeAnalysisRow>, AppError> {
    let user = require_session(&headers, &state).await?;

    let mut pdf_bytes: Option<Vec<u8>> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        if field.content_type() != Some("application/pdf") {
            return Err(AppError::Validation(
                "Resume must be uploaded as application/pdf".to_string(),
            ));
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read upload: {e}")))?;
        if bytes.len() > resume::MAX_RESUME_BYTES {
            return Err(AppError::Validation(format!(
                "Resume exceeds {} bytes",
                resume::MAX_RESUME_BYTES
            )));
        }
        pdf_bytes = Some(bytes.to_vec());
    }

    let pdf_bytes =
        pdf_bytes.ok_or_else(|| AppError::Validation("Missing 'file' field".to_string()))?;

    let extracted = resume::extract_pdf_text(&pdf_bytes)?;
    let text = resume::validate_extracted_text(&extracted)?;

    let file_key = format!("resumes/{}/{}.pdf", user.id, Uuid::new_v4());
    state
        .s3
        .put_object()
        .bucket(&state.config.s3_bucket)
        .key(&file_key)
        .content_type("application/pdf")
        .body(ByteStream::from(pdf_bytes))
        .send()
        .await
        .map_err(|e| AppError::Storage(format!("Resume upload failed: {e}")))?;

    let target_domain = profiles::get_profile(&state.db, user.id)
        .await?
        .and_then(|p| p.target_domain)
        .unwrap_or_default();

    let prompt = RESUME_ANALYSIS_PROMPT
        .replace("{resume_text}", resume::clamp_for_prompt(text))
        .replace("{target_domain}", &target_domain);
    let analysis: ResumeAnalysis = state
        .llm
        .call_json(&prompt, RESUME_ANALYSIS_SYSTEM)
        .await
        .map_err(|e| AppError::Llm(format!("Resume analysis failed: {e}")))?;

    let row = resume::insert_analysis(&state.db, user.id, &file_key, &analysis).await?;
    info!(
        "Resume analyzed for {}: score {}",
        user.id, analysis.overall_score
    );
    Ok(Json(row))
}

/// GET /api/v1/resume/latest
pub async fn handle_latest_analysis(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ResumeAnalysisRow>, AppError> {
    let user = require_session(&headers, &state).await?;
    let row = resume::latest_analysis(&state.db, user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("No resume analysis yet".to_string()))?;
    Ok(Json(row))
}
