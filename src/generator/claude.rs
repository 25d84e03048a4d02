use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::generator::LanguageModel;

const CLAUDE_API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

pub struct ClaudeClient {
    client: Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl ClaudeClient {
    pub fn new(api_key: &str, model: &str, max_tokens: u32, temperature: f32) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            max_tokens,
            temperature,
        }
    }

    pub async fn send_message(&self, request: &MessagesRequest) -> Result<MessagesResponse> {
        let response = self
            .client
            .post(CLAUDE_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::Generation(format!("Claude request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Generation(format!(
                "Claude API returned {status}: {body}"
            )));
        }

        response
            .json::<MessagesResponse>()
            .await
            .map_err(|e| AppError::Generation(format!("Invalid Claude response: {e}")))
    }
}

#[async_trait]
impl LanguageModel for ClaudeClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system: system.to_string(),
            messages: vec![Message {
                role: "user".to_string(),
                content: user.to_string(),
            }],
        };

        let response = self.send_message(&request).await?;

        tracing::debug!(
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            stop_reason = ?response.stop_reason,
            "Claude response"
        );

        Ok(response.text())
    }
}

// --- Request types ---

#[derive(Debug, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub system: String,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

// --- Response types ---

#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    pub content: Vec<ContentBlock>,
    pub stop_reason: Option<String>,
    pub usage: Usage,
}

impl MessagesResponse {
    /// Concatenate the text blocks of the reply.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_text_skips_non_text_blocks() {
        let body = serde_json::json!({
            "id": "msg_1",
            "content": [
                {"type": "text", "text": "Hello Jane,"},
                {"type": "thinking", "thinking": "..."},
                {"type": "text", "text": "Let's talk."}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 5}
        });
        let response: MessagesResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.text(), "Hello Jane,\nLet's talk.");
    }

    #[test]
    fn test_request_shape() {
        let request = MessagesRequest {
            model: "m".to_string(),
            max_tokens: 256,
            temperature: 0.5,
            system: "sys".to_string(),
            messages: vec![Message {
                role: "user".to_string(),
                content: "hi".to_string(),
            }],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["system"], "sys");
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["max_tokens"], 256);
    }
}
