use chrono::{DateTime, Local, Utc};
use tracing::{info, instrument};

use clinic_cell::ClinicAccess;
use marketplace_cell::{MarketplaceService, AI_ASSISTANT_APP};
use shared_config::AppConfig;

use crate::models::{AssistantError, ChatRequest, ChatResponse};
use crate::services::context::{system_instruction, ContextService};
use crate::services::conversation::ConversationService;
use crate::services::gemini::GeminiClient;

pub struct AssistantService {
    config: AppConfig,
    marketplace: MarketplaceService,
    conversations: ConversationService,
    context: ContextService,
}

impl AssistantService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            config: config.clone(),
            marketplace: MarketplaceService::new(config),
            conversations: ConversationService::new(config),
            context: ContextService::new(config),
        }
    }

    #[instrument(skip(self, access, request, auth_token), fields(clinic_id = %access.clinic_id))]
    pub async fn chat(
        &self,
        access: &ClinicAccess,
        request: &ChatRequest,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<ChatResponse, AssistantError> {
        let message = request.validated_message()?;

        if !self
            .marketplace
            .has_access(access.clinic_id, AI_ASSISTANT_APP, now, auth_token)
            .await?
        {
            return Err(AssistantError::SubscriptionRequired);
        }

        let gemini = GeminiClient::new(&self.config)?;

        let (conversation, history) = match request.conversation_id {
            Some(id) => {
                let conversation = self
                    .conversations
                    .get(id, access.clinic_id, &access.user_id, auth_token)
                    .await?;
                let history = self.conversations.recent_history(id, auth_token).await?;
                (conversation, history)
            }
            None => {
                let conversation = self
                    .conversations
                    .create(access.clinic_id, &access.user_id, message, auth_token)
                    .await?;
                (conversation, Vec::new())
            }
        };

        let today = now.with_timezone(&Local).date_naive();
        let context = self.context.load(access.clinic_id, today, auth_token).await?;
        let instruction = system_instruction(&context, today);

        let reply = gemini.generate(&instruction, &history, message).await?;

        self.conversations
            .record_exchange(conversation.id, message, &reply, auth_token)
            .await?;

        info!(conversation_id = %conversation.id, "Assistant replied");
        Ok(ChatResponse {
            conversation_id: conversation.id,
            reply,
        })
    }
}
