pub mod claude;
pub mod gemini;
pub mod prompt;

use async_trait::async_trait;

use crate::config::{AppConfig, LlmProvider, PitchConfig};
use crate::error::{AppError, Result};

/// The kind of message written at each point of the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageStage {
    /// Connection request note.
    Sales,
    Discovery,
    Presentation,
    Objection,
    Closing,
}

/// Writes outreach text for a stage and a prospect.
#[async_trait]
pub trait MessageGenerator: Send + Sync {
    async fn generate(&self, stage: MessageStage, display_name: &str) -> Result<String>;
}

/// A chat model that turns a system prompt and a user prompt into text.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

#[async_trait]
impl LanguageModel for Box<dyn LanguageModel> {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        (**self).complete(system, user).await
    }
}

/// Message generator backed by the prompt templates in [`prompt`].
pub struct PromptedGenerator<M> {
    model: M,
    pitch: PitchConfig,
}

impl<M: LanguageModel> PromptedGenerator<M> {
    pub fn new(model: M, pitch: PitchConfig) -> Self {
        Self { model, pitch }
    }
}

#[async_trait]
impl<M: LanguageModel> MessageGenerator for PromptedGenerator<M> {
    async fn generate(&self, stage: MessageStage, display_name: &str) -> Result<String> {
        let system = prompt::system_prompt(&self.pitch);
        let user = prompt::user_prompt(stage, display_name, &self.pitch);

        let text = self.model.complete(&system, &user).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::Generation(format!(
                "model returned an empty {stage:?} message"
            )));
        }

        tracing::debug!(?stage, name = display_name, chars = text.len(), "Generated message");
        Ok(text.to_string())
    }
}

/// Build the language model selected in configuration.
pub fn model_from_config(config: &AppConfig) -> Result<Box<dyn LanguageModel>> {
    let api_key = config
        .llm_api_key()
        .ok_or_else(|| AppError::Config("missing LLM API key".to_string()))?;
    let model = config.llm.model();

    let client: Box<dyn LanguageModel> = match config.llm.provider {
        LlmProvider::Gemini => Box::new(gemini::GeminiClient::new(
            api_key,
            model,
            config.llm.max_tokens,
            config.llm.temperature,
        )),
        LlmProvider::Claude => Box::new(claude::ClaudeClient::new(
            api_key,
            model,
            config.llm.max_tokens,
            config.llm.temperature,
        )),
    };

    tracing::info!(provider = ?config.llm.provider, model = model, "Language model configured");
    Ok(client)
}
