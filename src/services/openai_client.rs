use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs},
    Client,
};
use async_trait::async_trait;
use thiserror::Error;

use crate::configuration::StructuringSettings;

#[derive(Debug, Error)]
pub enum StructuringError {
    #[error("structuring service error: {0}")]
    Api(#[from] OpenAIError),
    #[error("structuring service returned no content")]
    EmptyResponse,
}

/// Turns free page text into (ideally) a json document.
#[async_trait]
pub trait Structurer: Send + Sync {
    /// Returns the service's answer verbatim.
    async fn structure(&self, text: &str) -> Result<String, StructuringError>;
}

pub fn build_prompt(instruction: &str, text: &str) -> String {
    format!("{}\n\nText:\n{}", instruction.trim_end(), text)
}

pub struct OpenaiClient {
    client: Client<OpenAIConfig>,
    model: String,
    max_tokens: u32,
    instruction: String,
}

impl OpenaiClient {
    pub fn new(settings: &StructuringSettings) -> Self {
        let mut config = OpenAIConfig::new().with_api_key(settings.api_key.as_str());
        if let Some(api_base) = &settings.api_base {
            config = config.with_api_base(api_base.as_str());
        }

        OpenaiClient {
            client: Client::with_config(config),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            instruction: settings.instruction.clone(),
        }
    }
}

#[async_trait]
impl Structurer for OpenaiClient {
    async fn structure(&self, text: &str) -> Result<String, StructuringError> {
        log::info!(
            "Sending {} characters to {} for json conversion",
            text.chars().count(),
            self.model
        );

        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model.as_str())
            .messages([ChatCompletionRequestUserMessageArgs::default()
                .content(build_prompt(&self.instruction, text))
                .build()?
                .into()])
            .max_tokens(self.max_tokens)
            .build()?;

        let response = self.client.chat().create(request).await?;
        log::info!("Received response from {}", self.model);

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(StructuringError::EmptyResponse)
    }
}
