use serde_json::{json, Value};
use tracing::{info, instrument, warn};

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{DatabaseWebhook, NotificationError, NotificationRecord, PushOutcome};
use crate::services::onesignal::{OneSignalClient, PushMessage};

const DEFAULT_TITLE: &str = "Tabibi";

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Turns `notifications` inserts into push messages.
pub struct PushService {
    supabase: SupabaseClient,
    config: AppConfig,
}

impl PushService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            config: config.clone(),
        }
    }

    #[instrument(skip(self, webhook), fields(event = %webhook.event, table = %webhook.table))]
    pub async fn dispatch(&self, webhook: DatabaseWebhook) -> Result<PushOutcome, NotificationError> {
        if !webhook.is_notification_insert() {
            return Ok(PushOutcome::skipped(format!(
                "{} on {} is not dispatched",
                webhook.event, webhook.table
            )));
        }

        let record: NotificationRecord = webhook
            .record
            .ok_or_else(|| NotificationError::Validation("Webhook record is missing".to_string()))
            .and_then(|record| {
                serde_json::from_value(record)
                    .map_err(|e| NotificationError::Validation(format!("Invalid notification record: {}", e)))
            })?;

        let user_id = non_empty(&record.user_id)
            .ok_or_else(|| NotificationError::Validation("Notification has no user_id".to_string()))?;
        let message = non_empty(&record.message)
            .ok_or_else(|| NotificationError::Validation("Notification has no message".to_string()))?;
        let title = non_empty(&record.title).unwrap_or(DEFAULT_TITLE);

        let push = PushMessage {
            external_user_id: user_id,
            title,
            message,
            data: json!({
                "notification_id": record.id,
                "type": record.kind
            }),
        };
        let onesignal_id = OneSignalClient::new(&self.config)?.send(&push).await?;

        let filter = format!("id=eq.{}", record.id);
        if let Err(e) = self
            .supabase
            .patch_returning("notifications", &filter, json!({ "push_sent": true }), None)
            .await
        {
            warn!(notification_id = %record.id, "Push sent but push_sent flag not stored: {}", e);
        }

        info!(notification_id = %record.id, "Push notification dispatched");
        Ok(PushOutcome::sent(record.id, onesignal_id))
    }
}
