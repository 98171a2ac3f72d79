use std::sync::Arc;

use tracing::{debug, warn};

use crate::llm::tools::ToolSet;
use crate::llm::{AiProvider, ChatResponse, PromptMessage, ToolCall};

/// Status returned when the model neither answered nor called a tool
pub const INVALID_RESPONSE: &str = "[ERROR] Invalid response from OpenAI";

/// What the model decided to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelReply {
    /// Free text to show the user
    Content(String),
    /// The first tool call of the response
    ToolCall(ToolCall),
}

/// Sends the assembled conversation to the chat model
pub struct ModelInvoker {
    provider: Arc<dyn AiProvider>,
    model_id: String,
    system_prompt: String,
    tools: Arc<ToolSet>,
}

impl ModelInvoker {
    /// Create an invoker bound to one model and tool set
    #[must_use]
    pub fn new(
        provider: Arc<dyn AiProvider>,
        model_id: String,
        system_prompt: String,
        tools: Arc<ToolSet>,
    ) -> Self {
        Self {
            provider,
            model_id,
            system_prompt,
            tools,
        }
    }

    /// Ask the model for a reply to `history`.
    ///
    /// Provider failures are folded into an error `Content` so the caller
    /// always has something to show.
    pub async fn invoke(&self, history: Vec<PromptMessage>) -> ModelReply {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(PromptMessage::system(&self.system_prompt));
        messages.extend(history);

        debug!(
            provider = self.provider.name(),
            model = %self.model_id,
            messages = messages.len(),
            tools = self.tools.definitions().len(),
            "Invoking chat model"
        );

        match self
            .provider
            .chat_with_tools(&self.model_id, &messages, self.tools.definitions())
            .await
        {
            Ok(response) => interpret(response),
            Err(e) => {
                warn!(error = %e, "Chat completion failed");
                ModelReply::Content(format!("[ERROR] Problem calling OpenAI API:\n {e}"))
            }
        }
    }
}

fn interpret(response: ChatResponse) -> ModelReply {
    if let Some(content) = response.content.filter(|c| !c.is_empty()) {
        return ModelReply::Content(content);
    }
    match response.tool_calls.into_iter().next() {
        Some(call) => ModelReply::ToolCall(call),
        None => ModelReply::Content(INVALID_RESPONSE.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, MockAiProvider, Role};

    fn invoker(provider: MockAiProvider, tools: ToolSet) -> ModelInvoker {
        ModelInvoker::new(
            Arc::new(provider),
            "gpt-4o".to_string(),
            "Be brief.".to_string(),
            Arc::new(tools),
        )
    }

    fn provider_returning(response: ChatResponse) -> MockAiProvider {
        let mut provider = MockAiProvider::new();
        provider.expect_name().return_const("mock");
        provider
            .expect_chat_with_tools()
            .times(1)
            .returning(move |_, _, _| Ok(response.clone()));
        provider
    }

    #[tokio::test]
    async fn test_system_prompt_comes_first() {
        let mut provider = MockAiProvider::new();
        provider.expect_name().return_const("mock");
        provider
            .expect_chat_with_tools()
            .withf(|model, messages, tools| {
                model == "gpt-4o"
                    && messages.len() == 2
                    && messages[0] == PromptMessage::system("Be brief.")
                    && messages[1].role == Role::User
                    && tools.len() == 1
            })
            .times(1)
            .returning(|_, _, _| {
                Ok(ChatResponse {
                    content: Some("hi".to_string()),
                    ..ChatResponse::default()
                })
            });

        let reply = invoker(provider, ToolSet::new(true, false, false))
            .invoke(vec![PromptMessage::user("hello")])
            .await;
        assert_eq!(reply, ModelReply::Content("hi".to_string()));
    }

    #[tokio::test]
    async fn test_content_wins_over_tool_calls() {
        let provider = provider_returning(ChatResponse {
            content: Some("Sure".to_string()),
            tool_calls: vec![ToolCall::new("c1", "generate_tts", "{}")],
            finish_reason: "stop".to_string(),
        });

        let reply = invoker(provider, ToolSet::default()).invoke(vec![]).await;
        assert_eq!(reply, ModelReply::Content("Sure".to_string()));
    }

    #[tokio::test]
    async fn test_first_tool_call_is_selected() {
        let provider = provider_returning(ChatResponse {
            content: Some(String::new()),
            tool_calls: vec![
                ToolCall::new("c1", "generate_image", r#"{"description":"a cat"}"#),
                ToolCall::new("c2", "generate_tts", "{}"),
            ],
            finish_reason: "tool_calls".to_string(),
        });

        let reply = invoker(provider, ToolSet::default()).invoke(vec![]).await;
        assert_eq!(
            reply,
            ModelReply::ToolCall(ToolCall::new(
                "c1",
                "generate_image",
                r#"{"description":"a cat"}"#
            ))
        );
    }

    #[tokio::test]
    async fn test_empty_response_is_invalid() {
        let provider = provider_returning(ChatResponse::default());
        let reply = invoker(provider, ToolSet::default()).invoke(vec![]).await;
        assert_eq!(reply, ModelReply::Content(INVALID_RESPONSE.to_string()));
    }

    #[tokio::test]
    async fn test_provider_error_becomes_error_content() {
        let mut provider = MockAiProvider::new();
        provider.expect_name().return_const("mock");
        provider
            .expect_chat_with_tools()
            .returning(|_, _, _| Err(LlmError::ApiError("429 Too Many Requests".to_string())));

        let reply = invoker(provider, ToolSet::default()).invoke(vec![]).await;
        let ModelReply::Content(text) = reply else {
            panic!("expected content");
        };
        assert!(text.starts_with("[ERROR] Problem calling OpenAI API:\n "));
        assert!(text.contains("429"));
    }
}
