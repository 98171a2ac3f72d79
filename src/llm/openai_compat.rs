//! OpenAI-compatible provider utilities
//!
//! Shared implementation for the OpenAI and Azure OpenAI providers. Both speak
//! the same REST dialect; only the URL layout, query string and auth header
//! differ, and those come from the `async-openai` configuration types.

use super::http_utils::{send_checked, send_json_request};
use super::{ChatResponse, ImageSize, LlmError, PromptMessage, ToolCall, ToolCallFunction, ToolDefinition};
use async_openai::config::Config;
use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Client as HttpClient, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace};

/// Quality tier requested for generated images
const IMAGE_QUALITY: &str = "standard";

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<FunctionTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct FunctionTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: &'a ToolDefinition,
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    size: &'static str,
    quality: &'static str,
    n: u8,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
}

#[derive(Deserialize, Debug)]
struct LenientToolCallFunction {
    name: String,
    arguments: String,
}

#[derive(Deserialize, Debug)]
struct LenientToolCall {
    #[serde(default)]
    id: String,
    #[serde(rename = "type")]
    _type: Option<String>,
    function: LenientToolCallFunction,
}

#[derive(Deserialize, Debug)]
struct LenientMessage {
    content: Option<String>,
    tool_calls: Option<Vec<LenientToolCall>>,
}

#[derive(Deserialize, Debug)]
struct LenientChoice {
    message: LenientMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct LenientResponse {
    choices: Vec<LenientChoice>,
}

#[derive(Deserialize, Debug)]
struct ImageData {
    url: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ImageResponse {
    data: Vec<ImageData>,
}

fn post<C: Config>(http: &HttpClient, config: &C, path: &str) -> RequestBuilder {
    http.post(config.url(path))
        .query(&config.query())
        .headers(config.headers())
}

/// Build the chat completion body. Tools and `tool_choice` are omitted when
/// no tool is enabled.
pub(crate) fn build_chat_request<'a>(
    model_id: &'a str,
    messages: &'a [PromptMessage],
    tools: &'a [ToolDefinition],
) -> ChatRequest<'a> {
    ChatRequest {
        model: model_id,
        messages,
        tools: tools
            .iter()
            .map(|function| FunctionTool {
                kind: "function",
                function,
            })
            .collect(),
        tool_choice: (!tools.is_empty()).then_some("auto"),
    }
}

/// Convert the first choice of a completion response
pub(crate) fn parse_chat_response(response: LenientResponse) -> Result<ChatResponse, LlmError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::ApiError("Empty response".to_string()))?;

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| ToolCall {
            id: tc.id,
            function: ToolCallFunction {
                name: tc.function.name,
                arguments: tc.function.arguments,
            },
        })
        .collect();

    Ok(ChatResponse {
        content: choice.message.content,
        tool_calls,
        finish_reason: choice
            .finish_reason
            .unwrap_or_else(|| "unknown".to_string()),
    })
}

/// Perform a tool-enabled chat completion
pub async fn chat_with_tools<C: Config>(
    http: &HttpClient,
    config: &C,
    model_id: &str,
    messages: &[PromptMessage],
    tools: &[ToolDefinition],
) -> Result<ChatResponse, LlmError> {
    let body = build_chat_request(model_id, messages, tools);
    trace!(body = ?body, "Full LLM Request");

    let response: LenientResponse =
        send_json_request(post(http, config, "/chat/completions").json(&body)).await?;
    let parsed = parse_chat_response(response)?;

    debug!(
        model = model_id,
        tool_calls_count = parsed.tool_calls.len(),
        finish_reason = %parsed.finish_reason,
        "Received tool response from LLM"
    );
    Ok(parsed)
}

/// Generate a single image and return its URL
pub async fn generate_image<C: Config>(
    http: &HttpClient,
    config: &C,
    model_id: &str,
    prompt: &str,
    size: ImageSize,
) -> Result<String, LlmError> {
    let body = ImageRequest {
        model: model_id,
        prompt,
        size: size.dimensions(),
        quality: IMAGE_QUALITY,
        n: 1,
    };

    let response: ImageResponse =
        send_json_request(post(http, config, "/images/generations").json(&body)).await?;

    response
        .data
        .into_iter()
        .next()
        .and_then(|d| d.url)
        .ok_or_else(|| LlmError::ApiError("Image response contains no URL".to_string()))
}

/// Stream synthesized speech into `destination`
pub async fn synthesize_speech<C: Config>(
    http: &HttpClient,
    config: &C,
    model_id: &str,
    voice: &str,
    input: &str,
    destination: &Path,
) -> Result<(), LlmError> {
    let body = SpeechRequest {
        model: model_id,
        voice,
        input,
    };

    let response = send_checked(post(http, config, "/audio/speech").json(&body)).await?;

    let mut file = tokio::fs::File::create(destination).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0usize;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| LlmError::NetworkError(e.to_string()))?;
        written += chunk.len();
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    debug!(bytes = written, path = %destination.display(), "Speech written to file");
    Ok(())
}

/// Transcribe an audio file, returning plain text
pub async fn transcribe_audio<C: Config>(
    http: &HttpClient,
    config: &C,
    model_id: &str,
    audio_path: &Path,
) -> Result<String, LlmError> {
    let bytes = tokio::fs::read(audio_path).await?;
    let file_name = audio_path
        .file_name()
        .map_or_else(|| "audio".to_string(), |n| n.to_string_lossy().into_owned());

    let form = Form::new()
        .part("file", Part::bytes(bytes).file_name(file_name))
        .text("model", model_id.to_string())
        .text("response_format", "text");

    let response = send_checked(post(http, config, "/audio/transcriptions").multipart(form)).await?;
    let text = response
        .text()
        .await
        .map_err(|e| LlmError::NetworkError(e.to_string()))?;

    Ok(text.trim_end().to_string())
}
