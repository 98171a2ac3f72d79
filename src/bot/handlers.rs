use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, instrument};

use super::dispatcher::ToolDispatcher;
use super::history::assemble_history;
use super::invoker::{ModelInvoker, ModelReply};
use super::platform::{ChatMessage, ChatPlatform};

/// Everything a conversation task needs, shared read-only between tasks
pub struct BotContext {
    /// Chat platform client
    pub platform: Arc<dyn ChatPlatform>,
    /// Chat model invoker
    pub invoker: ModelInvoker,
    /// Tool call executor
    pub dispatcher: ToolDispatcher,
    /// Placeholder posted while the reply is prepared
    pub waiting_message: String,
    /// Staging directory for media
    pub temp_dir: PathBuf,
}

/// Handle one direct message or mention end to end.
///
/// Posts the placeholder into the message's thread, builds the reply and
/// overwrites the placeholder with it. Failures are logged; nothing is
/// returned to the event loop.
#[instrument(skip_all, fields(channel = %message.channel, ts = %message.ts))]
pub async fn handle_message(context: Arc<BotContext>, message: ChatMessage) {
    let placeholder = match context
        .platform
        .post_message(&message.channel, &message.ts, &context.waiting_message)
        .await
    {
        Ok(handle) => handle,
        Err(e) => {
            error!(error = %e, "Failed to post waiting message");
            return;
        }
    };

    let reply = process_conversation(&context, &message).await;

    if let Err(e) = context.platform.update_message(&placeholder, &reply).await {
        error!(error = %e, "Failed to update waiting message");
        return;
    }
    info!("Reply delivered");
}

/// Produce the reply text for `message`.
///
/// Always yields a string: content from the model, a tool status, or an
/// error status.
pub async fn process_conversation(context: &BotContext, message: &ChatMessage) -> String {
    let history = match assemble_history(
        context.platform.as_ref(),
        &context.temp_dir,
        &context.waiting_message,
        message,
    )
    .await
    {
        Ok(history) => history,
        Err(e) => {
            error!(error = %e, "Failed to assemble conversation");
            return format!("[ERROR] Problem processing conversation:\n {e:#}");
        }
    };

    match context.invoker.invoke(history).await {
        ModelReply::Content(text) => text,
        ModelReply::ToolCall(call) => context.dispatcher.dispatch(&call, message).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::dispatcher::MediaModels;
    use crate::bot::platform::{MessageHandle, MockChatPlatform};
    use crate::llm::tools::ToolSet;
    use crate::llm::{ChatResponse, LlmError, MockAiProvider, ToolCall};
    use crate::testing::{mock_platform_placeholder, mock_provider_text};

    const WAITING: &str = ":hourglass_flowing_sand: Processing...";

    fn context(
        provider: MockAiProvider,
        platform: MockChatPlatform,
        temp_dir: &std::path::Path,
    ) -> Arc<BotContext> {
        let provider: Arc<dyn crate::llm::AiProvider> = Arc::new(provider);
        let platform: Arc<dyn ChatPlatform> = Arc::new(platform);
        Arc::new(BotContext {
            platform: platform.clone(),
            invoker: ModelInvoker::new(
                provider.clone(),
                "gpt-4o".to_string(),
                "You are a helpful assistant.".to_string(),
                Arc::new(ToolSet::new(true, true, true)),
            ),
            dispatcher: ToolDispatcher::new(
                provider,
                platform,
                reqwest::Client::new(),
                MediaModels {
                    image_model: "dall-e-3".to_string(),
                    tts_model: "tts-1".to_string(),
                    tts_voice: "alloy".to_string(),
                    stt_model: "whisper-1".to_string(),
                },
                temp_dir.to_path_buf(),
            ),
            waiting_message: WAITING.to_string(),
            temp_dir: temp_dir.to_path_buf(),
        })
    }

    fn direct_message(text: &str) -> ChatMessage {
        ChatMessage {
            channel: "D1".to_string(),
            ts: "1700000000.000100".to_string(),
            text: text.to_string(),
            client_msg_id: Some("c1".to_string()),
            ..ChatMessage::default()
        }
    }

    #[tokio::test]
    async fn test_text_reply_replaces_placeholder() -> anyhow::Result<()> {
        let mut platform = mock_platform_placeholder("D1", "1700000000.000200");
        platform
            .expect_update_message()
            .withf(|handle, text| handle.ts == "1700000000.000200" && text == "Hello there")
            .times(1)
            .returning(|_, _| Ok(()));

        let dir = tempfile::tempdir()?;
        let ctx = context(mock_provider_text("Hello there"), platform, dir.path());
        handle_message(ctx, direct_message("hi")).await;
        Ok(())
    }

    #[tokio::test]
    async fn test_placeholder_goes_into_the_message_thread() -> anyhow::Result<()> {
        let mut platform = MockChatPlatform::new();
        platform
            .expect_post_message()
            .withf(|channel, thread_ts, text| {
                channel == "D1" && thread_ts == "1700000000.000100" && text == WAITING
            })
            .times(1)
            .returning(|channel, _, _| {
                Ok(MessageHandle {
                    channel: channel.to_string(),
                    ts: "2.0".to_string(),
                })
            });
        platform.expect_update_message().times(1).returning(|_, _| Ok(()));

        let dir = tempfile::tempdir()?;
        let ctx = context(mock_provider_text("ok"), platform, dir.path());
        handle_message(ctx, direct_message("hi")).await;
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_placeholder_skips_model_call() -> anyhow::Result<()> {
        let mut platform = MockChatPlatform::new();
        platform
            .expect_post_message()
            .returning(|_, _, _| Err(anyhow::anyhow!("channel_not_found")));
        platform.expect_update_message().times(0);
        let mut provider = MockAiProvider::new();
        provider.expect_chat_with_tools().times(0);

        let dir = tempfile::tempdir()?;
        handle_message(context(provider, platform, dir.path()), direct_message("hi")).await;
        Ok(())
    }

    #[tokio::test]
    async fn test_thread_fetch_failure_is_reported() -> anyhow::Result<()> {
        let mut platform = MockChatPlatform::new();
        platform
            .expect_fetch_thread()
            .returning(|_, _| Err(anyhow::anyhow!("ratelimited")));
        let mut provider = MockAiProvider::new();
        provider.expect_chat_with_tools().times(0);

        let dir = tempfile::tempdir()?;
        let ctx = context(provider, platform, dir.path());
        let message = ChatMessage {
            thread_ts: Some("1.0".to_string()),
            ..direct_message("again")
        };

        let reply = process_conversation(&ctx, &message).await;
        assert!(reply.starts_with("[ERROR] Problem processing conversation:\n "));
        assert!(reply.contains("ratelimited"));
        Ok(())
    }

    #[tokio::test]
    async fn test_tool_call_reply_is_a_status() -> anyhow::Result<()> {
        let mut provider = MockAiProvider::new();
        provider.expect_name().return_const("mock");
        provider.expect_chat_with_tools().returning(|_, _, _| {
            Ok(ChatResponse {
                content: None,
                tool_calls: vec![ToolCall::new("c1", "generate_tts", r#"{"input_text":"hi"}"#)],
                finish_reason: "tool_calls".to_string(),
            })
        });
        provider
            .expect_synthesize_speech()
            .returning(|_, _, _, _| Err(LlmError::NetworkError("connection reset".to_string())));

        let dir = tempfile::tempdir()?;
        let ctx = context(provider, MockChatPlatform::new(), dir.path());

        let reply = process_conversation(&ctx, &direct_message("say hi")).await;
        assert!(reply.starts_with("[ERROR] Problem converting from text to speech:\n "));
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
        Ok(())
    }
}
