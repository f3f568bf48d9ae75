use chrono::Utc;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{
    conversation_title, AssistantError, ChatMessage, Conversation, ConversationDetail, MessageRole,
    HISTORY_LIMIT,
};

fn decode<T: serde::de::DeserializeOwned>(row: Value) -> Result<T, AssistantError> {
    serde_json::from_value(row).map_err(|e| AssistantError::Decode(e.to_string()))
}

/// Conversations are private to the user who started them within a clinic.
pub struct ConversationService {
    supabase: SupabaseClient,
}

impl ConversationService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn list(
        &self,
        clinic_id: Uuid,
        user_id: &str,
        auth_token: &str,
    ) -> Result<Vec<Conversation>, AssistantError> {
        let path = format!(
            "/rest/v1/ai_conversations?clinic_id=eq.{}&user_id=eq.{}&order=updated_at.desc",
            clinic_id, user_id
        );
        self.supabase
            .select(&path, Some(auth_token))
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    pub async fn get(
        &self,
        conversation_id: Uuid,
        clinic_id: Uuid,
        user_id: &str,
        auth_token: &str,
    ) -> Result<Conversation, AssistantError> {
        let path = format!(
            "/rest/v1/ai_conversations?id=eq.{}&clinic_id=eq.{}&user_id=eq.{}",
            conversation_id, clinic_id, user_id
        );
        let row = self
            .supabase
            .select_one(&path, Some(auth_token))
            .await?
            .ok_or(AssistantError::ConversationNotFound)?;
        decode(row)
    }

    pub async fn create(
        &self,
        clinic_id: Uuid,
        user_id: &str,
        first_message: &str,
        auth_token: &str,
    ) -> Result<Conversation, AssistantError> {
        let now = Utc::now().to_rfc3339();
        let row = self
            .supabase
            .insert_returning(
                "ai_conversations",
                json!({
                    "clinic_id": clinic_id,
                    "user_id": user_id,
                    "title": conversation_title(first_message),
                    "created_at": now,
                    "updated_at": now
                }),
                Some(auth_token),
            )
            .await?;
        decode(row)
    }

    /// Messages oldest first.
    pub async fn messages(
        &self,
        conversation_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<ChatMessage>, AssistantError> {
        let path = format!(
            "/rest/v1/ai_messages?conversation_id=eq.{}&order=created_at.asc",
            conversation_id
        );
        self.supabase
            .select(&path, Some(auth_token))
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    /// The latest messages sent to the model as history, oldest first.
    pub async fn recent_history(
        &self,
        conversation_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<ChatMessage>, AssistantError> {
        let path = format!(
            "/rest/v1/ai_messages?conversation_id=eq.{}&order=created_at.desc&limit={}",
            conversation_id, HISTORY_LIMIT
        );
        let mut history: Vec<ChatMessage> = self
            .supabase
            .select(&path, Some(auth_token))
            .await?
            .into_iter()
            .map(decode)
            .collect::<Result<_, _>>()?;
        history.reverse();
        debug!("Loaded {} history messages for {}", history.len(), conversation_id);
        Ok(history)
    }

    pub async fn detail(
        &self,
        conversation_id: Uuid,
        clinic_id: Uuid,
        user_id: &str,
        auth_token: &str,
    ) -> Result<ConversationDetail, AssistantError> {
        let conversation = self.get(conversation_id, clinic_id, user_id, auth_token).await?;
        let messages = self.messages(conversation_id, auth_token).await?;
        Ok(ConversationDetail { conversation, messages })
    }

    /// Store both turns of an exchange and bump the conversation.
    pub async fn record_exchange(
        &self,
        conversation_id: Uuid,
        user_message: &str,
        reply: &str,
        auth_token: &str,
    ) -> Result<(), AssistantError> {
        let now = Utc::now();
        // The assistant turn must sort after the user turn.
        let rows = json!([
            {
                "conversation_id": conversation_id,
                "role": MessageRole::User,
                "content": user_message,
                "created_at": now.to_rfc3339()
            },
            {
                "conversation_id": conversation_id,
                "role": MessageRole::Assistant,
                "content": reply,
                "created_at": (now + chrono::Duration::milliseconds(1)).to_rfc3339()
            }
        ]);
        self.supabase
            .insert_returning("ai_messages", rows, Some(auth_token))
            .await?;

        let filter = format!("id=eq.{}", conversation_id);
        self.supabase
            .patch_returning(
                "ai_conversations",
                &filter,
                json!({ "updated_at": Utc::now().to_rfc3339() }),
                Some(auth_token),
            )
            .await?;
        Ok(())
    }

    pub async fn delete(
        &self,
        conversation_id: Uuid,
        clinic_id: Uuid,
        user_id: &str,
        auth_token: &str,
    ) -> Result<(), AssistantError> {
        self.get(conversation_id, clinic_id, user_id, auth_token).await?;
        self.supabase
            .delete(
                &format!("/rest/v1/ai_messages?conversation_id=eq.{}", conversation_id),
                Some(auth_token),
            )
            .await?;
        self.supabase
            .delete(
                &format!("/rest/v1/ai_conversations?id=eq.{}", conversation_id),
                Some(auth_token),
            )
            .await?;
        Ok(())
    }
}
