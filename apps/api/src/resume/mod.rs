//! Resume upload and analysis: extract text from the PDF, store the
//! original in the media bucket, run a structured LLM review, persist the
//! result.

pub mod handlers;

use std::io::Write;

use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::{ResumeAnalysis, ResumeAnalysisRow};

pub const MAX_RESUME_BYTES: usize = 5 * 1024 * 1024;

/// Extractions shorter than this are treated as unreadable (scanned images,
/// encrypted files, empty pages).
const MIN_EXTRACTED_CHARS: usize = 200;

/// Extracted text is clamped before prompting so a padded upload cannot
/// blow the context window.
const MAX_PROMPT_CHARS: usize = 20_000;

/// Writes the PDF bytes to a temp file and extracts its text.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String, AppError> {
    let mut file = tempfile::NamedTempFile::new()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("temp file creation failed: {e}")))?;
    file.write_all(bytes)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("temp file write failed: {e}")))?;

    let text = pdf_extract::extract_text(file.path())
        .map_err(|e| AppError::Validation(format!("Could not parse PDF: {e}")))?;
    Ok(text)
}

/// Rejects extractions that cannot plausibly be a resume.
pub fn validate_extracted_text(text: &str) -> Result<&str, AppError> {
    let trimmed = text.trim();
    if trimmed.chars().count() < MIN_EXTRACTED_CHARS {
        return Err(AppError::Validation(
            "Could not extract readable text from this PDF. Export a text-based PDF and try again."
                .to_string(),
        ));
    }
    Ok(trimmed)
}

/// Clamps extracted text to the prompt budget on a char boundary.
pub fn clamp_for_prompt(text: &str) -> &str {
    match text.char_indices().nth(MAX_PROMPT_CHARS) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

pub async fn insert_analysis(
    pool: &PgPool,
    user_id: Uuid,
    file_key: &str,
    analysis: &ResumeAnalysis,
) -> Result<ResumeAnalysisRow, AppError> {
    let payload = serde_json::to_value(analysis)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("analysis serialization failed: {e}")))?;
    let row = sqlx::query_as(
        "INSERT INTO resume_analyses (id, user_id, file_key, overall_score, analysis)
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(file_key)
    .bind(analysis.overall_score)
    .bind(payload)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn latest_analysis(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<ResumeAnalysisRow>, AppError> {
    let row = sqlx::query_as(
        "SELECT * FROM resume_analyses WHERE user_id = $1 ORDER BY created_at DESC LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_extraction_rejected() {
        assert!(validate_extracted_text("too short").is_err());
        assert!(validate_extracted_text("").is_err());
    }

    #[test]
    fn test_plausible_extraction_accepted_and_trimmed() {
        let text = format!("  {}  ", "experience with rust and sql ".repeat(20));
        let validated = validate_extracted_text(&text).unwrap();
        assert!(!validated.starts_with(' '));
        assert!(validated.chars().count() >= 200);
    }

    #[test]
    fn test_clamp_keeps_short_text_intact() {
        let text = "short resume text";
        assert_eq!(clamp_for_prompt(text), text);
    }

    #[test]
    fn test_clamp_cuts_on_char_boundary() {
        let text = "é".repeat(30_000);
        let clamped = clamp_for_prompt(&text);
        assert_eq!(clamped.chars().count(), 20_000);
    }
}
