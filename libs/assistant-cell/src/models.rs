use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use clinic_cell::ClinicError;
use marketplace_cell::MarketplaceError;
use shared_database::SupabaseError;
use shared_models::error::AppError;

pub const MAX_MESSAGE_CHARS: usize = 4000;
pub const HISTORY_LIMIT: usize = 20;
const TITLE_CHARS: usize = 60;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub conversation_id: Option<Uuid>,
}

impl ChatRequest {
    /// Trimmed message, 1..=4000 characters.
    pub fn validated_message(&self) -> Result<&str, AssistantError> {
        let message = self.message.trim();
        if message.is_empty() {
            return Err(AssistantError::Validation("Message cannot be empty".to_string()));
        }
        if message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(AssistantError::Validation(format!(
                "Message cannot exceed {} characters",
                MAX_MESSAGE_CHARS
            )));
        }
        Ok(message)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub conversation_id: Uuid,
    pub reply: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationDetail {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub messages: Vec<ChatMessage>,
}

/// Facts about the clinic given to the model with every request.
#[derive(Debug, Clone, PartialEq)]
pub struct ClinicContext {
    pub clinic_name: String,
    pub specialty: Option<String>,
    pub today_appointments: usize,
    pub patient_count: usize,
}

pub fn conversation_title(first_message: &str) -> String {
    let title: String = first_message.chars().take(TITLE_CHARS).collect();
    if first_message.chars().count() > TITLE_CHARS {
        format!("{}…", title.trim_end())
    } else {
        title
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("An active AI assistant subscription is required")]
    SubscriptionRequired,

    #[error("Conversation not found")]
    ConversationNotFound,

    #[error("AI assistant is not configured")]
    NotConfigured,

    #[error("AI service error: {0}")]
    Upstream(String),

    #[error("Invalid data: {0}")]
    Decode(String),

    #[error(transparent)]
    Marketplace(#[from] MarketplaceError),

    #[error(transparent)]
    Access(#[from] ClinicError),

    #[error("Database error: {0}")]
    Database(#[from] SupabaseError),
}

impl From<AssistantError> for AppError {
    fn from(error: AssistantError) -> Self {
        match error {
            AssistantError::Validation(msg) => AppError::ValidationError(msg),
            AssistantError::SubscriptionRequired => AppError::PaymentRequired(error.to_string()),
            AssistantError::ConversationNotFound => AppError::NotFound(error.to_string()),
            AssistantError::NotConfigured | AssistantError::Decode(_) => AppError::Internal(error.to_string()),
            AssistantError::Upstream(_) => AppError::ExternalService(error.to_string()),
            AssistantError::Marketplace(inner) => inner.into(),
            AssistantError::Access(inner) => inner.into(),
            AssistantError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}
