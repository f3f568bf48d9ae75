use reqwest::{header, Client};
use serde_json::{json, Value};
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::models::{AssistantError, ChatMessage, MessageRole};

/// Gemini `generateContent` client.
pub struct GeminiClient {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

/// Conversation history plus the new user turn, in Gemini's `contents` shape.
pub fn build_contents(history: &[ChatMessage], message: &str) -> Value {
    let mut contents: Vec<Value> = history
        .iter()
        .map(|m| {
            let role = match m.role {
                MessageRole::User => "user",
                MessageRole::Assistant => "model",
            };
            json!({ "role": role, "parts": [{ "text": m.content }] })
        })
        .collect();
    contents.push(json!({ "role": "user", "parts": [{ "text": message }] }));
    Value::Array(contents)
}

/// Concatenated text parts of the first candidate.
pub fn extract_reply(response: &Value) -> Option<String> {
    let parts = response["candidates"][0]["content"]["parts"].as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p["text"].as_str())
        .collect::<Vec<_>>()
        .join("");
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

impl GeminiClient {
    pub fn new(config: &AppConfig) -> Result<Self, AssistantError> {
        if !config.is_ai_configured() {
            return Err(AssistantError::NotConfigured);
        }

        Ok(Self {
            http_client: Client::new(),
            base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
            model: config.gemini_model.clone(),
            api_key: config.gemini_api_key.clone(),
        })
    }

    pub async fn generate(
        &self,
        system_instruction: &str,
        history: &[ChatMessage],
        message: &str,
    ) -> Result<String, AssistantError> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);
        debug!("Calling Gemini model {} with {} history messages", self.model, history.len());

        let prompt = json!({
            "systemInstruction": { "parts": [{ "text": system_instruction }] },
            "contents": build_contents(history, message),
            "generationConfig": {
                "temperature": 0.4,
                "maxOutputTokens": 1024
            }
        });

        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&prompt)
            .send()
            .await
            .map_err(|e| AssistantError::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("Gemini API error: {} - {}", status, error_text);
            return Err(AssistantError::Upstream(format!("HTTP {}: {}", status, error_text)));
        }

        let ai_response: Value = response
            .json()
            .await
            .map_err(|e| AssistantError::Upstream(e.to_string()))?;

        extract_reply(&ai_response)
            .ok_or_else(|| AssistantError::Upstream("Invalid Gemini response format".to_string()))
    }
}
