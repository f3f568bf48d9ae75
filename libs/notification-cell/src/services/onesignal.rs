use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::models::NotificationError;

/// A push message addressed to one external user id.
#[derive(Debug, Clone)]
pub struct PushMessage<'a> {
    pub external_user_id: &'a str,
    pub title: &'a str,
    pub message: &'a str,
    pub data: Value,
}

/// OneSignal REST client.
/// POST {base}/notifications
pub struct OneSignalClient {
    client: Client,
    base_url: String,
    app_id: String,
    api_key: String,
}

impl OneSignalClient {
    pub fn new(config: &AppConfig) -> Result<Self, NotificationError> {
        if !config.is_push_configured() {
            return Err(NotificationError::NotConfigured("Push notifications"));
        }

        Ok(Self {
            client: Client::new(),
            base_url: config.onesignal_base_url.trim_end_matches('/').to_string(),
            app_id: config.onesignal_app_id.clone(),
            api_key: config.onesignal_api_key.clone(),
        })
    }

    /// Returns the OneSignal notification id when one is reported.
    pub async fn send(&self, push: &PushMessage<'_>) -> Result<Option<String>, NotificationError> {
        let url = format!("{}/notifications", self.base_url);

        let request_body = json!({
            "app_id": self.app_id,
            "include_external_user_ids": [push.external_user_id],
            "headings": { "en": push.title, "ar": push.title },
            "contents": { "en": push.message, "ar": push.message },
            "data": push.data
        });

        debug!("Sending push notification to: {}", url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Basic {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| NotificationError::Upstream(e.to_string()))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| NotificationError::Upstream(e.to_string()))?;

        if !status.is_success() {
            error!("OneSignal request failed: {} - {}", status, response_text);
            return Err(NotificationError::Upstream(format!("HTTP {}: {}", status, response_text)));
        }

        let body: Value = serde_json::from_str(&response_text).unwrap_or(Value::Null);
        Ok(body.get("id").and_then(Value::as_str).map(str::to_string))
    }
}
