use crate::llm::openai_compat;
use crate::llm::{AiProvider, ChatResponse, ImageSize, LlmError, PromptMessage, ToolDefinition};
use async_openai::config::AzureConfig;
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use std::path::Path;
use tracing::instrument;

/// LLM provider implementation for Azure OpenAI.
///
/// Azure addresses models by deployment, so every call builds a config whose
/// deployment id is the requested model.
pub struct AzureOpenAiProvider {
    http_client: HttpClient,
    api_key: String,
    endpoint: String,
    api_version: String,
}

impl AzureOpenAiProvider {
    /// Create a new Azure OpenAI provider instance
    #[must_use]
    pub fn new(
        http_client: HttpClient,
        api_key: String,
        endpoint: String,
        api_version: String,
    ) -> Self {
        Self {
            http_client,
            api_key,
            endpoint,
            api_version,
        }
    }

    fn deployment(&self, model_id: &str) -> AzureConfig {
        AzureConfig::new()
            .with_api_base(self.endpoint.clone())
            .with_api_version(self.api_version.clone())
            .with_api_key(self.api_key.clone())
            .with_deployment_id(model_id)
    }
}

#[async_trait]
impl AiProvider for AzureOpenAiProvider {
    fn name(&self) -> &'static str {
        "azure"
    }

    #[instrument(skip(self, messages, tools), fields(messages = messages.len(), tools = tools.len()))]
    async fn chat_with_tools(
        &self,
        model_id: &str,
        messages: &[PromptMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatResponse, LlmError> {
        let config = self.deployment(model_id);
        openai_compat::chat_with_tools(&self.http_client, &config, model_id, messages, tools).await
    }

    #[instrument(skip(self, prompt))]
    async fn generate_image(
        &self,
        model_id: &str,
        prompt: &str,
        size: ImageSize,
    ) -> Result<String, LlmError> {
        let config = self.deployment(model_id);
        openai_compat::generate_image(&self.http_client, &config, model_id, prompt, size).await
    }

    #[instrument(skip(self, input))]
    async fn synthesize_speech(
        &self,
        model_id: &str,
        voice: &str,
        input: &str,
        destination: &Path,
    ) -> Result<(), LlmError> {
        let config = self.deployment(model_id);
        openai_compat::synthesize_speech(
            &self.http_client,
            &config,
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
        let config = self.deployment(model_id);
        openai_compat::transcribe_audio(&self.http_client, &config, model_id, audio_path).await
    }
}
