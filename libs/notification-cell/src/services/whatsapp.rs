use reqwest::{Client, Method};
use serde_json::{json, Value};
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::models::NotificationError;

/// WhatsApp gateway client. Every call carries
/// `Authorization: Bearer $WHATSAPP_API_TOKEN`.
pub struct WhatsAppClient {
    client: Client,
    base_url: String,
    api_token: String,
}

impl WhatsAppClient {
    pub fn new(config: &AppConfig) -> Result<Self, NotificationError> {
        if !config.is_whatsapp_configured() {
            return Err(NotificationError::NotConfigured("WhatsApp"));
        }

        Ok(Self {
            client: Client::new(),
            base_url: config.whatsapp_api_url.trim_end_matches('/').to_string(),
            api_token: config.whatsapp_api_token.clone(),
        })
    }

    async fn call(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, NotificationError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("WhatsApp {} {}", method, url);

        let mut request = self
            .client
            .request(method, &url)
            .header("Authorization", format!("Bearer {}", self.api_token));
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NotificationError::Upstream(e.to_string()))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| NotificationError::Upstream(e.to_string()))?;

        if !status.is_success() {
            error!("WhatsApp API error: {} - {}", status, response_text);
            return Err(NotificationError::Upstream(format!("HTTP {}: {}", status, response_text)));
        }

        if response_text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&response_text)
            .map_err(|e| NotificationError::Upstream(format!("Failed to parse WhatsApp response: {}", e)))
    }

    pub async fn create_instance(&self, instance_name: &str) -> Result<Value, NotificationError> {
        self.call(
            Method::POST,
            "/instance/create",
            Some(json!({ "instanceName": instance_name, "qrcode": true })),
        )
        .await
    }

    /// Pairing QR code for the instance, as returned by the gateway.
    pub async fn qr_code(&self, instance_name: &str) -> Result<Value, NotificationError> {
        self.call(Method::GET, &format!("/instance/connect/{}", instance_name), None)
            .await
    }

    /// Raw connection state (`open`, `connecting`, `close`, ...).
    pub async fn connection_state(&self, instance_name: &str) -> Result<String, NotificationError> {
        let body = self
            .call(Method::GET, &format!("/instance/connectionState/{}", instance_name), None)
            .await?;
        let state = body
            .pointer("/instance/state")
            .or_else(|| body.get("state"))
            .and_then(Value::as_str)
            .unwrap_or("close");
        Ok(state.to_string())
    }

    pub async fn logout(&self, instance_name: &str) -> Result<(), NotificationError> {
        self.call(Method::DELETE, &format!("/instance/logout/{}", instance_name), None)
            .await
            .map(|_| ())
    }

    pub async fn delete_instance(&self, instance_name: &str) -> Result<(), NotificationError> {
        self.call(Method::DELETE, &format!("/instance/delete/{}", instance_name), None)
            .await
            .map(|_| ())
    }

    pub async fn send_text(&self, instance_name: &str, number: &str, text: &str) -> Result<(), NotificationError> {
        self.call(
            Method::POST,
            &format!("/message/sendText/{}", instance_name),
            Some(json!({ "number": number, "text": text })),
        )
        .await
        .map(|_| ())
    }
}
