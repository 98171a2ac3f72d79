//! HTTP utilities for LLM providers
//!
//! Common request/response handling shared by the OpenAI and Azure backends.

use crate::llm::LlmError;
use reqwest::{Client as HttpClient, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Maximum number of characters of an error body kept in an error message
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Creates an HTTP client, optionally bounded by a request timeout.
///
/// Without a timeout a slow provider simply delays the reply.
#[must_use]
pub fn create_http_client(timeout_secs: Option<u64>) -> HttpClient {
    let mut builder = HttpClient::builder();
    if let Some(secs) = timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    builder.build().unwrap_or_else(|_| HttpClient::new())
}

/// Sends a request and fails on non-success status codes.
///
/// # Errors
///
/// Returns `LlmError::NetworkError` on connectivity issues and
/// `LlmError::ApiError` on non-success status codes.
pub async fn send_checked(request: RequestBuilder) -> Result<Response, LlmError> {
    let response = request
        .send()
        .await
        .map_err(|e| LlmError::NetworkError(e.to_string()))?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        return Err(LlmError::ApiError(describe_error_body(status, &error_text)));
    }

    Ok(response)
}

/// Sends a request and parses the JSON response body.
///
/// # Errors
///
/// Returns the errors of [`send_checked`], or `LlmError::JsonError` if parsing fails.
pub async fn send_json_request<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, LlmError> {
    send_checked(request)
        .await?
        .json()
        .await
        .map_err(|e| LlmError::JsonError(e.to_string()))
}

fn describe_error_body(status: reqwest::StatusCode, error_text: &str) -> String {
    // Detect HTML error pages from proxies
    let trimmed = error_text.trim_start();
    let is_html = trimmed.starts_with("<!DOCTYPE")
        || trimmed.starts_with("<html")
        || trimmed.starts_with("<HTML");

    if is_html {
        return format!("{status} (Server returned HTML error page)");
    }

    if error_text.chars().count() > MAX_ERROR_BODY_CHARS {
        let truncated = crate::utils::truncate_str(error_text, MAX_ERROR_BODY_CHARS);
        format!("{status} - {truncated}... (truncated)")
    } else {
        format!("{status} - {error_text}")
    }
}
