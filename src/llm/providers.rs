use super::openai_compat;
use super::{AiProvider, ChatResponse, ImageSize, LlmError, PromptMessage, ToolDefinition};
use async_openai::config::OpenAIConfig;
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use std::path::Path;
use tracing::instrument;

/// Azure OpenAI deployments
pub mod azure;

pub use azure::AzureOpenAiProvider;

/// LLM provider implementation for the public OpenAI API
pub struct OpenAiProvider {
    config: OpenAIConfig,
    http_client: HttpClient,
}

impl OpenAiProvider {
    /// Create a new OpenAI provider instance
    #[must_use]
    pub fn new(http_client: HttpClient, api_key: String, api_base: String) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base);
        Self {
            config,
            http_client,
        }
    }
}

#[async_trait]
impl AiProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    #[instrument(skip(self, messages, tools), fields(messages = messages.len(), tools = tools.len()))]
    async fn chat_with_tools(
        &self,
        model_id: &str,
        messages: &[PromptMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatResponse, LlmError> {
        openai_compat::chat_with_tools(&self.http_client, &self.config, model_id, messages, tools)
            .await
    }

    #[instrument(skip(self, prompt))]
    async fn generate_image(
        &self,
        model_id: &str,
        prompt: &str,
        size: ImageSize,
    ) -> Result<String, LlmError> {
        openai_compat::generate_image(&self.http_client, &self.config, model_id, prompt, size).await
    }

    #[instrument(skip(self, input))]
    async fn synthesize_speech(
        &self,
        model_id: &str,
        voice: &str,
        input: &str,
        destination: &Path,
    ) -> Result<(), LlmError> {
        openai_compat::synthesize_speech(
            &self.http_client,
            &self.config,
            model_id,
            voice,
            input,
            destination,
        )
        .await
    }

    #[instrument(skip(self))]
    async fn transcribe_audio(
        &self,
        model_id: &str,
        audio_path: &Path,
    ) -> Result<String, LlmError> {
        openai_compat::transcribe_audio(&self.http_client, &self.config, model_id, audio_path)
            .await
    }
}
