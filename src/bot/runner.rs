use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use slack_morphism::prelude::{SlackClient, SlackClientHyperConnector};
use tracing::info;

use super::dispatcher::{MediaModels, ToolDispatcher};
use super::handlers::BotContext;
use super::invoker::ModelInvoker;
use super::platform::ChatPlatform;
use super::slack::{serve_socket_mode, SlackPlatform};
use crate::config::Settings;
use crate::llm::tools::ToolSet;
use crate::llm::{create_http_client, create_provider, AiProvider};
use crate::media::ensure_dir;

/// Build the shared bot context from settings and already created clients
#[must_use]
pub fn build_context(
    settings: &Settings,
    provider: Arc<dyn AiProvider>,
    platform: Arc<dyn ChatPlatform>,
    http_client: reqwest::Client,
    tools: Arc<ToolSet>,
) -> BotContext {
    let temp_dir = PathBuf::from(&settings.temp_files_folder);
    BotContext {
        platform: platform.clone(),
        invoker: ModelInvoker::new(
            provider.clone(),
            settings.gpt_model.clone(),
            settings.system_prompt.clone(),
            tools,
        ),
        dispatcher: ToolDispatcher::new(
            provider,
            platform,
            http_client,
            MediaModels {
                image_model: settings.image_model.clone(),
                tts_model: settings.tts_model.clone(),
                tts_voice: settings.tts_voice.clone(),
                stt_model: settings.stt_model.clone(),
            },
            temp_dir.clone(),
        ),
        waiting_message: settings.waiting_message.clone(),
        temp_dir,
    }
}

/// Start the bot and serve Slack events until Ctrl+C.
///
/// # Errors
///
/// Returns an error if the temp folder cannot be created, no provider is
/// configured, or the Slack connection cannot be established.
pub async fn run_bot(settings: Settings) -> Result<()> {
    let temp_dir = PathBuf::from(&settings.temp_files_folder);
    ensure_dir(&temp_dir)
        .await
        .with_context(|| format!("failed to create temp folder {}", temp_dir.display()))?;

    let provider = create_provider(&settings)?;
    let tools = Arc::new(ToolSet::from_settings(&settings));
    if tools.is_empty() {
        info!("No media tools enabled, the model will only answer with text");
    }
    let http_client = create_http_client(settings.http_timeout_secs);

    let slack_client = Arc::new(SlackClient::new(
        SlackClientHyperConnector::new().context("failed to create slack HTTP connector")?,
    ));
    let platform: Arc<dyn ChatPlatform> = Arc::new(SlackPlatform::new(
        slack_client,
        settings.slack_bot_user_token.clone(),
        http_client.clone(),
    ));

    let context = Arc::new(build_context(
        &settings,
        provider,
        platform,
        http_client,
        tools,
    ));

    info!("Starting bot...");
    serve_socket_mode(context, &settings.slack_socket_token, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    })
    .await?;
    info!("Bot stopped");
    Ok(())
}
