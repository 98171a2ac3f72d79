//! LLM providers and client types
//!
//! Provides a unified interface over the OpenAI and Azure OpenAI backends:
//! chat completion with tool calling, image generation, speech synthesis and
//! speech transcription.

mod http_utils;
mod openai_compat;
/// Implementations of specific LLM providers
pub mod providers;
/// Tool declarations offered to the model
pub mod tools;

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::{ProviderCredentials, Settings};

pub use http_utils::create_http_client;

/// Errors that can occur during LLM operations
#[derive(Debug, Error)]
pub enum LlmError {
    /// Error returned by the provider's API
    #[error("API error: {0}")]
    ApiError(String),
    /// Error during network communication
    #[error("Network error: {0}")]
    NetworkError(String),
    /// Error during JSON serialization or deserialization
    #[error("JSON error: {0}")]
    JsonError(String),
    /// Missing provider configuration or API key
    #[error("Missing client/API key: {0}")]
    MissingConfig(String),
    /// Local file error while staging media
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Any other unexpected error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// Role of a prompt message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt
    System,
    /// Human participant
    User,
    /// The model (or the bot speaking on its behalf)
    Assistant,
}

/// Image reference inside a multimodal message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrl {
    /// Remote URL or `data:` URI
    pub url: String,
}

/// One part of a multimodal message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Plain text
    Text {
        /// Text body
        text: String,
    },
    /// Embedded or linked image
    ImageUrl {
        /// Image location
        image_url: ImageUrl,
    },
}

/// Message content: either plain text or a list of parts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text content
    Text(String),
    /// Multimodal content
    Parts(Vec<ContentPart>),
}

/// A message in a provider prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    /// Author role
    pub role: Role,
    /// Message body
    pub content: MessageContent,
}

impl PromptMessage {
    /// Create a new system message
    #[must_use]
    pub fn system(content: &str) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(content.to_string()),
        }
    }

    /// Create a new user message
    #[must_use]
    pub fn user(content: &str) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(content.to_string()),
        }
    }

    /// Create a user message carrying text and one image
    #[must_use]
    pub fn user_with_image(text: &str, image_url: String) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Parts(vec![
                ContentPart::Text {
                    text: text.to_string(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl { url: image_url },
                },
            ]),
        }
    }

    /// Create a new assistant message
    #[must_use]
    pub fn assistant(content: &str) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(content.to_string()),
        }
    }
}

/// Tool definition for LLM function calling
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    /// Name of the tool
    pub name: String,
    /// Description of what the tool does
    pub description: String,
    /// JSON schema for tool parameters
    pub parameters: serde_json::Value,
}

/// Tool call from LLM response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for the tool call
    pub id: String,
    /// Function to be called
    pub function: ToolCallFunction,
}

impl ToolCall {
    /// Convenience constructor
    #[must_use]
    pub fn new(id: &str, name: &str, arguments: &str) -> Self {
        Self {
            id: id.to_string(),
            function: ToolCallFunction {
                name: name.to_string(),
                arguments: arguments.to_string(),
            },
        }
    }
}

/// Function details within a tool call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallFunction {
    /// Name of the function being called
    pub name: String,
    /// Arguments for the function call (JSON string)
    pub arguments: String,
}

/// Chat response that may include tool calls
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    /// Optional text content of the response
    pub content: Option<String>,
    /// List of tool calls requested by the model
    pub tool_calls: Vec<ToolCall>,
    /// Reason why the model stopped generating
    pub finish_reason: String,
}

/// Pixel dimensions accepted by the image generation endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageSize {
    /// 1024x1024
    #[default]
    Square,
    /// 1024x1792
    Portrait,
    /// 1792x1024
    Landscape,
}

impl ImageSize {
    /// Map a tool argument label to a size. Unknown or missing labels
    /// fall back to square.
    ///
    /// # Examples
    ///
    /// ```
    /// use multimodal_slack_bot::llm::ImageSize;
    /// assert_eq!(ImageSize::from_label(Some("portrait")).dimensions(), "1024x1792");
    /// assert_eq!(ImageSize::from_label(None).dimensions(), "1024x1024");
    /// ```
    #[must_use]
    pub fn from_label(label: Option<&str>) -> Self {
        match label {
            Some("portrait") => Self::Portrait,
            Some("landscape") => Self::Landscape,
            _ => Self::Square,
        }
    }

    /// Dimensions string sent to the provider
    #[must_use]
    pub const fn dimensions(self) -> &'static str {
        match self {
            Self::Square => "1024x1024",
            Self::Portrait => "1024x1792",
            Self::Landscape => "1792x1024",
        }
    }
}

/// Interface for all LLM providers
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait AiProvider: Send + Sync {
    /// Short provider name used in logs
    fn name(&self) -> &'static str;

    /// Chat completion with tool calling, `tool_choice` left to the model
    async fn chat_with_tools(
        &self,
        model_id: &str,
        messages: &[PromptMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatResponse, LlmError>;

    /// Generate one image and return its URL
    async fn generate_image(
        &self,
        model_id: &str,
        prompt: &str,
        size: ImageSize,
    ) -> Result<String, LlmError>;

    /// Stream synthesized speech into `destination`
    async fn synthesize_speech(
        &self,
        model_id: &str,
        voice: &str,
        input: &str,
        destination: &Path,
    ) -> Result<(), LlmError>;

    /// Transcribe the audio file at `audio_path` into plain text
    async fn transcribe_audio(&self, model_id: &str, audio_path: &Path)
        -> Result<String, LlmError>;
}

/// Create the provider matching the configured credentials.
///
/// # Errors
///
/// Returns `LlmError::MissingConfig` if no usable credentials are configured.
pub fn create_provider(settings: &Settings) -> Result<Arc<dyn AiProvider>, LlmError> {
    let credentials = settings
        .provider_credentials()
        .map_err(|e| LlmError::MissingConfig(e.to_string()))?;
    let http_client = http_utils::create_http_client(settings.http_timeout_secs);

    let provider: Arc<dyn AiProvider> = match credentials {
        ProviderCredentials::OpenAi { api_key, api_base } => {
            info!("Running with OpenAI");
            Arc::new(providers::OpenAiProvider::new(http_client, api_key, api_base))
        }
        ProviderCredentials::Azure {
            api_key,
            endpoint,
            api_version,
        } => {
            info!("Running with Azure OpenAI");
            Arc::new(providers::AzureOpenAiProvider::new(
                http_client,
                api_key,
                endpoint,
                api_version,
            ))
        }
    };
    Ok(provider)
}
