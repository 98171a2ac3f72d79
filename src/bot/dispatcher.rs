//! Tool call dispatch
//!
//! Runs the capability the model asked for, delivers any artifact to the
//! originating thread and renders a one-line status for the user.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use super::platform::{ChatMessage, ChatPlatform};
use crate::llm::tools::ToolKind;
use crate::llm::{AiProvider, ImageSize, ToolCall};
use crate::media::MediaFile;

/// Title of uploaded speech files
pub const SPEECH_UPLOAD_TITLE: &str = "Text To Speech";

/// Extension used for downloaded generated images
const IMAGE_EXTENSION: &str = "jpg";
/// Extension used for synthesized speech
const SPEECH_EXTENSION: &str = "mp3";

/// Why a tool call did not succeed
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// Image generation, download or upload failed
    #[error("Problem generating image using DALL-E:\n {0}")]
    ImageGeneration(String),
    /// Speech synthesis or upload failed
    #[error("Problem converting from text to speech:\n {0}")]
    TextToSpeech(String),
    /// Attachment download or transcription failed
    #[error("Problem converting from speech to text:\n {0}")]
    SpeechToText(String),
    /// Transcription requested without an attachment
    #[error("No attached audio found in your message")]
    MissingAttachment,
    /// The model named a function that is not offered
    #[error("Invalid function")]
    UnknownTool(String),
}

/// Result of a successful tool call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    /// Generated image uploaded to the thread
    ImageUploaded,
    /// Synthesized speech uploaded to the thread
    SpeechUploaded,
    /// Transcript of the attached audio
    Transcript(String),
}

impl fmt::Display for ToolOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ImageUploaded => f.write_str("Image has been generated successfully"),
            Self::SpeechUploaded => f.write_str("Your text has been converted to speech"),
            Self::Transcript(text) => f.write_str(text),
        }
    }
}

/// Render a dispatch result as the status shown to the user
#[must_use]
pub fn render_status(result: &Result<ToolOutcome, DispatchError>) -> String {
    match result {
        Ok(outcome) => format!("[SUCCESS] {outcome}"),
        Err(e) => format!("[ERROR] {e}"),
    }
}

/// Model and voice ids used by the media tools
#[derive(Debug, Clone)]
pub struct MediaModels {
    /// Image generation model
    pub image_model: String,
    /// Speech synthesis model
    pub tts_model: String,
    /// Speech synthesis voice
    pub tts_voice: String,
    /// Transcription model
    pub stt_model: String,
}

#[derive(Debug, Deserialize)]
struct ImageArgs {
    description: String,
    #[serde(default)]
    size: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct SpeechArgs {
    input_text: String,
}

/// Executes tool calls against the provider and the chat platform
pub struct ToolDispatcher {
    provider: Arc<dyn AiProvider>,
    platform: Arc<dyn ChatPlatform>,
    http_client: HttpClient,
    models: MediaModels,
    temp_dir: PathBuf,
}

impl ToolDispatcher {
    /// Create a dispatcher staging media under `temp_dir`
    #[must_use]
    pub fn new(
        provider: Arc<dyn AiProvider>,
        platform: Arc<dyn ChatPlatform>,
        http_client: HttpClient,
        models: MediaModels,
        temp_dir: PathBuf,
    ) -> Self {
        Self {
            provider,
            platform,
            http_client,
            models,
            temp_dir,
        }
    }

    /// Run `call` for `origin` and return the rendered status
    pub async fn dispatch(&self, call: &ToolCall, origin: &ChatMessage) -> String {
        let result = self.run(call, origin).await;
        match &result {
            Ok(_) => info!(tool = %call.function.name, "Tool call succeeded"),
            Err(e) => warn!(tool = %call.function.name, error = %e, "Tool call failed"),
        }
        render_status(&result)
    }

    /// Run `call` for `origin`.
    ///
    /// # Errors
    ///
    /// Returns the `DispatchError` of the failing tool.
    pub async fn run(
        &self,
        call: &ToolCall,
        origin: &ChatMessage,
    ) -> Result<ToolOutcome, DispatchError> {
        let arguments = call.function.arguments.as_str();
        match ToolKind::from_name(&call.function.name) {
            Some(ToolKind::GenerateImage) => {
                let args: ImageArgs =
                    parse_arguments(arguments).map_err(DispatchError::ImageGeneration)?;
                let size = ImageSize::from_label(args.size.as_ref().and_then(|s| s.as_str()));
                self.generate_image(&args.description, size, origin)
                    .await
                    .map(|()| ToolOutcome::ImageUploaded)
                    .map_err(|e| DispatchError::ImageGeneration(format!("{e:#}")))
            }
            Some(ToolKind::GenerateTts) => {
                let args: SpeechArgs =
                    parse_arguments(arguments).map_err(DispatchError::TextToSpeech)?;
                self.generate_speech(&args.input_text, origin)
                    .await
                    .map(|()| ToolOutcome::SpeechUploaded)
                    .map_err(|e| DispatchError::TextToSpeech(format!("{e:#}")))
            }
            Some(ToolKind::GenerateStt) => {
                if origin.files.is_empty() {
                    return Err(DispatchError::MissingAttachment);
                }
                self.transcribe(origin)
                    .await
                    .map(ToolOutcome::Transcript)
                    .map_err(|e| DispatchError::SpeechToText(format!("{e:#}")))
            }
            None => Err(DispatchError::UnknownTool(call.function.name.clone())),
        }
    }

    async fn generate_image(
        &self,
        description: &str,
        size: ImageSize,
        origin: &ChatMessage,
    ) -> Result<()> {
        let url = self
            .provider
            .generate_image(&self.models.image_model, description, size)
            .await?;

        let bytes = self
            .http_client
            .get(&url)
            .send()
            .await
            .context("Failed to download generated image")?
            .error_for_status()?
            .bytes()
            .await?;

        let staged = MediaFile::reserve(&self.temp_dir, IMAGE_EXTENSION);
        staged.write(&bytes).await?;
        self.platform
            .upload_file(&origin.channel, &origin.ts, staged.path(), description)
            .await
    }

    async fn generate_speech(&self, input_text: &str, origin: &ChatMessage) -> Result<()> {
        let staged = MediaFile::reserve(&self.temp_dir, SPEECH_EXTENSION);
        self.provider
            .synthesize_speech(
                &self.models.tts_model,
                &self.models.tts_voice,
                input_text,
                staged.path(),
            )
            .await?;
        self.platform
            .upload_file(
                &origin.channel,
                &origin.ts,
                staged.path(),
                SPEECH_UPLOAD_TITLE,
            )
            .await
    }

    async fn transcribe(&self, origin: &ChatMessage) -> Result<String> {
        let file = origin
            .files
            .first()
            .context("No attached audio found in your message")?;
        let staged = MediaFile::reserve(&self.temp_dir, &file.filetype);
        self.platform.download_file(file, staged.path()).await?;
        let transcript = self
            .provider
            .transcribe_audio(&self.models.stt_model, staged.path())
            .await?;
        Ok(transcript)
    }
}

fn parse_arguments<T: DeserializeOwned>(arguments: &str) -> Result<T, String> {
    serde_json::from_str(arguments).map_err(|e| format!("Invalid tool arguments: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::platform::{AttachedFile, MockChatPlatform};
    use crate::llm::{LlmError, MockAiProvider};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn models() -> MediaModels {
        MediaModels {
            image_model: "dall-e-3".to_string(),
            tts_model: "tts-1".to_string(),
            tts_voice: "alloy".to_string(),
            stt_model: "whisper-1".to_string(),
        }
    }

    fn origin() -> ChatMessage {
        ChatMessage {
            channel: "D1".to_string(),
            ts: "1700000000.000100".to_string(),
            text: "hello".to_string(),
            client_msg_id: Some("c1".to_string()),
            ..ChatMessage::default()
        }
    }

    fn dispatcher(
        provider: MockAiProvider,
        platform: MockChatPlatform,
        temp_dir: &std::path::Path,
    ) -> ToolDispatcher {
        ToolDispatcher::new(
            Arc::new(provider),
            Arc::new(platform),
            HttpClient::new(),
            models(),
            temp_dir.to_path_buf(),
        )
    }

    fn dir_is_empty(dir: &std::path::Path) -> bool {
        std::fs::read_dir(dir).map(|mut d| d.next().is_none()).unwrap_or(false)
    }

    #[test]
    fn test_render_status_prefixes() {
        assert_eq!(
            render_status(&Ok(ToolOutcome::ImageUploaded)),
            "[SUCCESS] Image has been generated successfully"
        );
        assert_eq!(
            render_status(&Ok(ToolOutcome::Transcript("hello world".to_string()))),
            "[SUCCESS] hello world"
        );
        assert_eq!(
            render_status(&Err(DispatchError::TextToSpeech("boom".to_string()))),
            "[ERROR] Problem converting from text to speech:\n boom"
        );
        assert_eq!(
            render_status(&Err(DispatchError::UnknownTool("x".to_string()))),
            "[ERROR] Invalid function"
        );
    }

    #[tokio::test]
    async fn test_image_is_generated_downloaded_and_uploaded() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img/cat.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"JPEGDATA".to_vec()))
            .expect(1)
            .mount(&server)
            .await;
        let image_url = format!("{}/img/cat.png", server.uri());

        let mut provider = MockAiProvider::new();
        provider
            .expect_generate_image()
            .withf(|model, prompt, size| {
                model == "dall-e-3" && prompt == "a cat" && *size == ImageSize::Landscape
            })
            .times(1)
            .returning(move |_, _, _| Ok(image_url.clone()));

        let mut platform = MockChatPlatform::new();
        platform
            .expect_upload_file()
            .withf(|channel, thread_ts, path, title| {
                channel == "D1"
                    && thread_ts == "1700000000.000100"
                    && title == "a cat"
                    && path.extension().and_then(|e| e.to_str()) == Some("jpg")
                    && std::fs::read(path).map(|b| b == b"JPEGDATA").unwrap_or(false)
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let dir = tempfile::tempdir()?;
        let call = ToolCall::new(
            "c1",
            "generate_image",
            r#"{"description":"a cat","size":"landscape"}"#,
        );
        let status = dispatcher(provider, platform, dir.path())
            .dispatch(&call, &origin())
            .await;

        assert_eq!(status, "[SUCCESS] Image has been generated successfully");
        assert!(dir_is_empty(dir.path()));
        Ok(())
    }

    #[tokio::test]
    async fn test_image_size_defaults_to_square() -> Result<()> {
        let mut provider = MockAiProvider::new();
        provider
            .expect_generate_image()
            .withf(|_, _, size| *size == ImageSize::Square)
            .times(1)
            .returning(|_, _, _| Err(LlmError::ApiError("content policy".to_string())));

        let dir = tempfile::tempdir()?;
        let call = ToolCall::new("c1", "generate_image", r#"{"description":"a cat","size":42}"#);
        let result = dispatcher(provider, MockChatPlatform::new(), dir.path())
            .run(&call, &origin())
            .await;

        assert!(matches!(result, Err(DispatchError::ImageGeneration(msg)) if msg.contains("content policy")));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_description_is_an_image_error() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let call = ToolCall::new("c1", "generate_image", r#"{"size":"square"}"#);
        let status = dispatcher(MockAiProvider::new(), MockChatPlatform::new(), dir.path())
            .dispatch(&call, &origin())
            .await;

        assert!(status.starts_with("[ERROR] Problem generating image using DALL-E:\n "));
        Ok(())
    }

    #[tokio::test]
    async fn test_speech_is_uploaded_and_cleaned_up() -> Result<()> {
        let mut provider = MockAiProvider::new();
        provider
            .expect_synthesize_speech()
            .withf(|model, voice, input, _| model == "tts-1" && voice == "alloy" && input == "hi")
            .times(1)
            .returning(|_, _, _, destination| {
                std::fs::write(destination, b"ID3")?;
                Ok(())
            });

        let mut platform = MockChatPlatform::new();
        platform
            .expect_upload_file()
            .withf(|_, _, path, title| title == SPEECH_UPLOAD_TITLE && path.exists())
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let dir = tempfile::tempdir()?;
        let call = ToolCall::new("c1", "generate_tts", r#"{"input_text":"hi"}"#);
        let status = dispatcher(provider, platform, dir.path())
            .dispatch(&call, &origin())
            .await;

        assert_eq!(status, "[SUCCESS] Your text has been converted to speech");
        assert!(dir_is_empty(dir.path()));
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_upload_still_removes_speech_file() -> Result<()> {
        let mut provider = MockAiProvider::new();
        provider
            .expect_synthesize_speech()
            .returning(|_, _, _, destination| {
                std::fs::write(destination, b"ID3")?;
                Ok(())
            });
        let mut platform = MockChatPlatform::new();
        platform
            .expect_upload_file()
            .returning(|_, _, _, _| Err(anyhow::anyhow!("not_in_channel")));

        let dir = tempfile::tempdir()?;
        let call = ToolCall::new("c1", "generate_tts", r#"{"input_text":"hi"}"#);
        let result = dispatcher(provider, platform, dir.path())
            .run(&call, &origin())
            .await;

        assert_eq!(
            result,
            Err(DispatchError::TextToSpeech("not_in_channel".to_string()))
        );
        assert!(dir_is_empty(dir.path()));
        Ok(())
    }

    #[tokio::test]
    async fn test_transcription_without_attachment_skips_provider() -> Result<()> {
        let mut provider = MockAiProvider::new();
        provider.expect_transcribe_audio().times(0);

        let dir = tempfile::tempdir()?;
        let call = ToolCall::new("c1", "generate_stt", "{}");
        let status = dispatcher(provider, MockChatPlatform::new(), dir.path())
            .dispatch(&call, &origin())
            .await;

        assert_eq!(status, "[ERROR] No attached audio found in your message");
        Ok(())
    }

    #[tokio::test]
    async fn test_transcription_uses_first_attachment() -> Result<()> {
        let mut platform = MockChatPlatform::new();
        platform
            .expect_download_file()
            .withf(|file, destination| {
                file.id == "F1" && destination.extension().and_then(|e| e.to_str()) == Some("m4a")
            })
            .times(1)
            .returning(|_, destination| {
                std::fs::write(destination, b"AUDIO")?;
                Ok(())
            });
        let mut provider = MockAiProvider::new();
        provider
            .expect_transcribe_audio()
            .withf(|model, audio| model == "whisper-1" && audio.exists())
            .times(1)
            .returning(|_, _| Ok("hello world".to_string()));

        let dir = tempfile::tempdir()?;
        let message = ChatMessage {
            files: vec![
                AttachedFile {
                    id: "F1".to_string(),
                    url_private: "https://files.slack.com/F1".to_string(),
                    filetype: "m4a".to_string(),
                },
                AttachedFile {
                    id: "F2".to_string(),
                    url_private: "https://files.slack.com/F2".to_string(),
                    filetype: "mp3".to_string(),
                },
            ],
            ..origin()
        };
        let call = ToolCall::new("c1", "generate_stt", "{}");
        let status = dispatcher(provider, platform, dir.path())
            .dispatch(&call, &message)
            .await;

        assert_eq!(status, "[SUCCESS] hello world");
        assert!(dir_is_empty(dir.path()));
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_tool_is_rejected() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let call = ToolCall::new("c1", "generate_video", "{}");
        let result = dispatcher(MockAiProvider::new(), MockChatPlatform::new(), dir.path())
            .run(&call, &origin())
            .await;

        assert_eq!(
            result,
            Err(DispatchError::UnknownTool("generate_video".to_string()))
        );
        Ok(())
    }
}
