//! Session-scoped AI chat. Conversations and turns live in Postgres; the
//! reply itself is a pass-through to the LLM client with the student's
//! profile folded into the system prompt.

pub mod handlers;

use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::llm_client::prompts::{advisor_profile_context, ADVISOR_SYSTEM};
use crate::llm_client::ChatTurn;
use crate::models::chat::{ChatMessageRow, ConversationRow};
use crate::models::profile::ProfileRow;

/// Turns carried to the LLM per request. Older history stays in Postgres
/// but is not replayed.
const HISTORY_WINDOW: i64 = 20;

pub async fn create_conversation(
    pool: &PgPool,
    user_id: Uuid,
    title: &str,
) -> Result<ConversationRow, AppError> {
    let row = sqlx::query_as(
        "INSERT INTO conversations (id, user_id, title) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(title)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn get_conversation(
    pool: &PgPool,
    user_id: Uuid,
    conversation_id: Uuid,
) -> Result<Option<ConversationRow>, AppError> {
    let row = sqlx::query_as("SELECT * FROM conversations WHERE id = $1 AND user_id = $2")
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn list_conversations(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<ConversationRow>, AppError> {
    let rows =
        sqlx::query_as("SELECT * FROM conversations WHERE user_id = $1 ORDER BY created_at DESC")
            .bind(user_id)
            .fetch_all(pool)
            .await?;
    Ok(rows)
}

pub async fn append_message(
    pool: &PgPool,
    conversation_id: Uuid,
    role: &str,
    content: &str,
) -> Result<ChatMessageRow, AppError> {
    let row = sqlx::query_as(
        "INSERT INTO chat_messages (id, conversation_id, role, content)
         VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(conversation_id)
    .bind(role)
    .bind(content)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn conversation_history(
    pool: &PgPool,
    conversation_id: Uuid,
) -> Result<Vec<ChatMessageRow>, AppError> {
    let rows = sqlx::query_as(
        "SELECT * FROM chat_messages WHERE conversation_id = $1 ORDER BY created_at ASC",
    )
    .bind(conversation_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// The most recent turns of a conversation, oldest first, ready to send.
pub async fn recent_turns(
    pool: &PgPool,
    conversation_id: Uuid,
) -> Result<Vec<ChatTurn>, AppError> {
    let rows: Vec<ChatMessageRow> = sqlx::query_as(
        "SELECT * FROM (
             SELECT * FROM chat_messages
             WHERE conversation_id = $1
             ORDER BY created_at DESC
             LIMIT $2
         ) recent ORDER BY created_at ASC",
    )
    .bind(conversation_id)
    .bind(HISTORY_WINDOW)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(row_to_turn).collect())
}

fn row_to_turn(row: &ChatMessageRow) -> ChatTurn {
    match row.role.as_str() {
        "assistant" => ChatTurn::assistant(row.content.clone()),
        _ => ChatTurn::user(row.content.clone()),
    }
}

/// Advisor system prompt, with profile context when one exists.
pub fn system_prompt(profile: Option<&ProfileRow>) -> String {
    match profile {
        Some(profile) => {
            let name = profile.full_name.as_deref().unwrap_or("(unknown)");
            format!(
                "{ADVISOR_SYSTEM}{}",
                advisor_profile_context(
                    name,
                    profile.degree.as_deref(),
                    profile.graduation_year,
                    profile.target_domain.as_deref(),
                    &profile.skills,
                )
            )
        }
        None => ADVISOR_SYSTEM.to_string(),
    }
}

/// First user message, truncated, becomes the conversation title.
pub fn derive_title(message: &str) -> String {
    let trimmed = message.trim();
    let mut title: String = trimmed.chars().take(60).collect();
    if trimmed.chars().count() > 60 {
        title.push('…');
    }
    if title.is_empty() {
        "New conversation".to_string()
    } else {
        title
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_title_truncates_long_messages() {
        let long = "a".repeat(100);
        let title = derive_title(&long);
        assert_eq!(title.chars().count(), 61);
        assert!(title.ends_with('…'));
    }

    #[test]
    fn test_derive_title_short_and_empty() {
        assert_eq!(derive_title("Help with internships"), "Help with internships");
        assert_eq!(derive_title("   "), "New conversation");
    }

    #[test]
    fn test_system_prompt_without_profile_is_base() {
        assert_eq!(system_prompt(None), ADVISOR_SYSTEM);
    }

    #[test]
    fn test_row_roles_map_to_turns() {
        let assistant = ChatMessageRow {
            id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
            role: "assistant".to_string(),
            content: "hi".to_string(),
            created_at: chrono::Utc::now(),
        };
        assert_eq!(row_to_turn(&assistant).role, "assistant");

        let user = ChatMessageRow {
            role: "user".to_string(),
            ..assistant
        };
        assert_eq!(row_to_turn(&user).role, "user");
    }
}
