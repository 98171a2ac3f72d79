//! Testing helpers and mock utilities.
//!
//! Provides convenient constructors for mocked providers and chat platforms.

use crate::bot::platform::{MessageHandle, MockChatPlatform};
use crate::llm::{ChatResponse, LlmError, MockAiProvider};

/// Create a mock provider whose chat model always answers with `text`.
///
/// Media operations return an error by default.
#[must_use]
pub fn mock_provider_text(text: &'static str) -> MockAiProvider {
    let mut mock = MockAiProvider::new();
    mock.expect_name().return_const("mock");
    mock.expect_chat_with_tools().returning(move |_, _, _| {
        Ok(ChatResponse {
            content: Some(text.to_string()),
            tool_calls: Vec::new(),
            finish_reason: "stop".to_string(),
        })
    });
    mock.expect_generate_image()
        .returning(|_, _, _| Err(LlmError::Unknown("Not implemented".to_string())));
    mock.expect_synthesize_speech()
        .returning(|_, _, _, _| Err(LlmError::Unknown("Not implemented".to_string())));
    mock.expect_transcribe_audio()
        .returning(|_, _| Err(LlmError::Unknown("Not implemented".to_string())));
    mock
}

/// Create a mock platform that accepts one placeholder post and answers
/// with the handle `(channel, ts)`.
///
/// Add an `update_message` expectation to complete it.
#[must_use]
pub fn mock_platform_placeholder(channel: &'static str, ts: &'static str) -> MockChatPlatform {
    let mut mock = MockChatPlatform::new();
    mock.expect_post_message().times(1).returning(move |_, _, _| {
        Ok(MessageHandle {
            channel: channel.to_string(),
            ts: ts.to_string(),
        })
    });
    mock
}
