//! Configuration and settings management
//!
//! Loads settings from configuration files and environment variables and
//! resolves which LLM provider the process talks to.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Default OpenAI REST endpoint
pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
/// Default chat model
pub const DEFAULT_GPT_MODEL: &str = "gpt-4o";
/// Default image generation model
pub const DEFAULT_IMAGE_MODEL: &str = "dall-e-3";
/// Default text-to-speech model
pub const DEFAULT_TTS_MODEL: &str = "tts-1";
/// Default text-to-speech voice
pub const DEFAULT_TTS_VOICE: &str = "alloy";
/// Default speech-to-text model
pub const DEFAULT_STT_MODEL: &str = "whisper-1";
/// Default placeholder posted while a request is being processed
pub const DEFAULT_WAITING_MESSAGE: &str = ":hourglass_flowing_sand: Processing...";
/// Default system prompt
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";
/// Default folder for temporary media files
pub const DEFAULT_TEMP_FILES_FOLDER: &str = "temp_files";

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// App-level token used to open the Socket Mode connection
    pub slack_socket_token: String,
    /// Bot user token used for Web API calls and private file downloads
    pub slack_bot_user_token: String,

    /// OpenAI API key
    pub openai_key: Option<String>,
    /// OpenAI API base URL
    #[serde(default = "default_openai_api_base")]
    pub openai_api_base: String,
    /// Azure OpenAI API key
    pub azure_openai_key: Option<String>,
    /// Azure OpenAI resource endpoint
    pub azure_openai_endpoint: Option<String>,
    /// Azure OpenAI API version
    pub azure_openai_version: Option<String>,

    /// Enables the `generate_image` tool
    pub image_generation_enabled: Option<String>,
    /// Enables the `generate_tts` tool
    pub text_to_speech_enabled: Option<String>,
    /// Enables the `generate_stt` tool
    pub speech_to_text_enabled: Option<String>,

    /// Chat completion model (deployment name on Azure)
    #[serde(default = "default_gpt_model")]
    pub gpt_model: String,
    /// Image generation model
    #[serde(default = "default_image_model")]
    pub image_model: String,
    /// Text-to-speech model
    #[serde(default = "default_tts_model")]
    pub tts_model: String,
    /// Text-to-speech voice
    #[serde(default = "default_tts_voice")]
    pub tts_voice: String,
    /// Speech-to-text model
    #[serde(default = "default_stt_model")]
    pub stt_model: String,

    /// Placeholder text posted before the reply is ready
    #[serde(default = "default_waiting_message")]
    pub waiting_message: String,
    /// System prompt prepended to every conversation
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Folder used to stage downloaded and generated media
    #[serde(default = "default_temp_files_folder")]
    pub temp_files_folder: String,

    /// Optional timeout for provider and download HTTP requests
    pub http_timeout_secs: Option<u64>,
}

fn default_openai_api_base() -> String {
    DEFAULT_OPENAI_API_BASE.to_string()
}

fn default_gpt_model() -> String {
    DEFAULT_GPT_MODEL.to_string()
}

fn default_image_model() -> String {
    DEFAULT_IMAGE_MODEL.to_string()
}

fn default_tts_model() -> String {
    DEFAULT_TTS_MODEL.to_string()
}

fn default_tts_voice() -> String {
    DEFAULT_TTS_VOICE.to_string()
}

fn default_stt_model() -> String {
    DEFAULT_STT_MODEL.to_string()
}

fn default_waiting_message() -> String {
    DEFAULT_WAITING_MESSAGE.to_string()
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_temp_files_folder() -> String {
    DEFAULT_TEMP_FILES_FOLDER.to_string()
}

/// Credentials of the provider selected at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCredentials {
    /// Public OpenAI API
    OpenAi {
        /// API key
        api_key: String,
        /// Base URL, e.g. `https://api.openai.com/v1`
        api_base: String,
    },
    /// Azure-hosted OpenAI deployment
    Azure {
        /// API key
        api_key: String,
        /// Resource endpoint, e.g. `https://my-resource.openai.azure.com`
        endpoint: String,
        /// API version query parameter
        api_version: String,
    },
}

/// Build the layered configuration source.
///
/// # Errors
///
/// Returns a `ConfigError` if any source fails to load.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Local overrides, not checked into git
        .add_source(File::with_name("config/local").required(false))
        // Eg.. `APP__GPT_MODEL=gpt-4o-mini ./target/app`
        .add_source(Environment::with_prefix("APP").separator("__"))
        // Plain UPPER_SNAKE_CASE variables map onto snake_case fields
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use multimodal_slack_bot::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or a required key is missing.
    pub fn new() -> Result<Self, ConfigError> {
        build_config()?.try_deserialize()
    }

    /// Returns true if image generation is enabled
    #[must_use]
    pub fn image_generation_enabled(&self) -> bool {
        parse_flag(self.image_generation_enabled.as_deref())
    }

    /// Returns true if text-to-speech is enabled
    #[must_use]
    pub fn text_to_speech_enabled(&self) -> bool {
        parse_flag(self.text_to_speech_enabled.as_deref())
    }

    /// Returns true if speech-to-text is enabled
    #[must_use]
    pub fn speech_to_text_enabled(&self) -> bool {
        parse_flag(self.speech_to_text_enabled.as_deref())
    }

    /// Resolve which provider to use. OpenAI takes precedence over Azure.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if no provider key is configured or if the
    /// Azure endpoint or API version is missing.
    pub fn provider_credentials(&self) -> Result<ProviderCredentials, ConfigError> {
        if let Some(api_key) = non_empty(self.openai_key.as_deref()) {
            return Ok(ProviderCredentials::OpenAi {
                api_key: api_key.to_string(),
                api_base: self.openai_api_base.trim_end_matches('/').to_string(),
            });
        }

        if let Some(api_key) = non_empty(self.azure_openai_key.as_deref()) {
            let endpoint = non_empty(self.azure_openai_endpoint.as_deref())
                .ok_or_else(|| ConfigError::NotFound("azure_openai_endpoint".to_string()))?;
            let api_version = non_empty(self.azure_openai_version.as_deref())
                .ok_or_else(|| ConfigError::NotFound("azure_openai_version".to_string()))?;
            return Ok(ProviderCredentials::Azure {
                api_key: api_key.to_string(),
                endpoint: endpoint.trim_end_matches('/').to_string(),
                api_version: api_version.to_string(),
            });
        }

        Err(ConfigError::Message(
            "Missing both OPENAI_KEY and AZURE_OPENAI_KEY".to_string(),
        ))
    }
}

fn parse_flag(value: Option<&str>) -> bool {
    value.is_some_and(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1"))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
