use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::generator::LanguageModel;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl GeminiClient {
    pub fn new(api_key: &str, model: &str, max_tokens: u32, temperature: f32) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            max_tokens,
            temperature,
        }
    }

    fn endpoint(&self) -> String {
        format!("{GEMINI_API_BASE}/{}:generateContent", self.model)
    }

    pub async fn generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::Generation(format!("Gemini request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Generation(format!(
                "Gemini API returned {status}: {body}"
            )));
        }

        response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| AppError::Generation(format!("Invalid Gemini response: {e}")))
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let request = GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part::text(system)],
            },
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part::text(user)],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_tokens,
            },
        };

        let response = self.generate_content(&request).await?;
        response.text().ok_or_else(|| {
            AppError::Generation("Gemini returned no candidate text".to_string())
        })
    }
}

// --- Request types ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub system_instruction: Content,
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Part {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

// --- Response types ---

#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    pub finish_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, parts joined.
    pub fn text(&self) -> Option<String> {
        let candidate = self.candidates.first()?;
        if let Some(reason) = &candidate.finish_reason {
            tracing::debug!(finish_reason = %reason, "Gemini response");
        }
        let parts: Vec<&str> = candidate
            .content
            .as_ref()?
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(""))
        }
    }
}
