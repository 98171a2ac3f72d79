//! Slack adapter using slack-morphism.
//!
//! Implements [`ChatPlatform`] over the Slack Web API and receives events over
//! Socket Mode. Direct messages and `app_mention` events are handed to the
//! conversation handler, each on its own task.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use slack_morphism::prelude::*;
use tracing::{debug, info, warn};

use super::handlers::{handle_message, BotContext};
use super::platform::{AttachedFile, ChatMessage, ChatPlatform, MessageHandle};

/// Channel type Slack reports for direct messages
const DIRECT_MESSAGE_CHANNEL_TYPE: &str = "im";

/// Slack Web API client bound to the bot token
pub struct SlackPlatform {
    client: Arc<SlackHyperClient>,
    token: SlackApiToken,
    bot_token: String,
    http_client: HttpClient,
}

impl SlackPlatform {
    /// Create the adapter. `http_client` is used for private file downloads.
    #[must_use]
    pub fn new(client: Arc<SlackHyperClient>, bot_token: String, http_client: HttpClient) -> Self {
        let token = SlackApiToken::new(SlackApiTokenValue(bot_token.clone()));
        Self {
            client,
            token,
            bot_token,
            http_client,
        }
    }

    fn session(&self) -> SlackClientSession<'_, SlackClientHyperHttpsConnector> {
        self.client.open_session(&self.token)
    }
}

#[async_trait]
impl ChatPlatform for SlackPlatform {
    async fn post_message(
        &self,
        channel: &str,
        thread_ts: &str,
        text: &str,
    ) -> Result<MessageHandle> {
        let request = SlackApiChatPostMessageRequest::new(
            SlackChannelId(channel.to_string()),
            SlackMessageContent::new().with_text(text.to_string()),
        )
        .with_thread_ts(SlackTs(thread_ts.to_string()));

        let response = self
            .session()
            .chat_post_message(&request)
            .await
            .context("failed to post slack message")?;

        Ok(MessageHandle {
            channel: channel.to_string(),
            ts: response.ts.0,
        })
    }

    async fn update_message(&self, handle: &MessageHandle, text: &str) -> Result<()> {
        let request = SlackApiChatUpdateRequest::new(
            SlackChannelId(handle.channel.clone()),
            SlackMessageContent::new().with_text(text.to_string()),
            SlackTs(handle.ts.clone()),
        );
        self.session()
            .chat_update(&request)
            .await
            .context("failed to update slack message")?;
        Ok(())
    }

    async fn fetch_thread(&self, channel: &str, thread_ts: &str) -> Result<Vec<ChatMessage>> {
        let request = SlackApiConversationsRepliesRequest::new(
            SlackChannelId(channel.to_string()),
            SlackTs(thread_ts.to_string()),
        );
        let response = self
            .session()
            .conversations_replies(&request)
            .await
            .context("failed to fetch slack thread replies")?;

        Ok(response
            .messages
            .iter()
            .map(|message| chat_message_from_history(channel, message))
            .collect())
    }

    async fn download_file(&self, file: &AttachedFile, destination: &Path) -> Result<()> {
        let bytes = self
            .http_client
            .get(&file.url_private)
            .bearer_auth(&self.bot_token)
            .send()
            .await
            .context("failed to download slack file")?
            .error_for_status()?
            .bytes()
            .await?;

        tokio::fs::write(destination, &bytes)
            .await
            .with_context(|| format!("failed to write {}", destination.display()))?;
        debug!(file_id = %file.id, bytes = bytes.len(), "Downloaded slack file");
        Ok(())
    }

    async fn upload_file(
        &self,
        channel: &str,
        thread_ts: &str,
        path: &Path,
        title: &str,
    ) -> Result<()> {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let filename = path
            .file_name()
            .map_or_else(|| "upload".to_string(), |n| n.to_string_lossy().into_owned());
        let session = self.session();

        let upload_url_response = session
            .get_upload_url_external(&SlackApiFilesGetUploadUrlExternalRequest::new(
                filename,
                data.len(),
            ))
            .await
            .context("failed to get slack upload URL")?;

        session
            .files_upload_via_url(&SlackApiFilesUploadViaUrlRequest::new(
                upload_url_response.upload_url,
                data,
                upload_mime_type(path).to_string(),
            ))
            .await
            .context("failed to upload file to slack")?;

        let file_complete =
            SlackApiFilesComplete::new(upload_url_response.file_id).with_title(title.to_string());
        let complete_request = SlackApiFilesCompleteUploadExternalRequest::new(vec![file_complete])
            .with_channel_id(SlackChannelId(channel.to_string()))
            .with_thread_ts(SlackTs(thread_ts.to_string()));
        session
            .files_complete_upload_external(&complete_request)
            .await
            .context("failed to complete slack file upload")?;
        Ok(())
    }
}

fn upload_mime_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("mp3") => "audio/mpeg",
        _ => "application/octet-stream",
    }
}

fn attached_files(content: Option<&SlackMessageContent>) -> Vec<AttachedFile> {
    content
        .and_then(|c| c.files.as_ref())
        .map(|files| {
            files
                .iter()
                .map(|f| AttachedFile {
                    id: f.id.0.clone(),
                    url_private: f
                        .url_private
                        .as_ref()
                        .map(ToString::to_string)
                        .unwrap_or_default(),
                    filetype: f.filetype.as_ref().map(|t| t.0.clone()).unwrap_or_default(),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn origin_fields(origin: &SlackMessageOrigin) -> (String, Option<String>, Option<String>) {
    (
        origin.ts.0.clone(),
        origin.thread_ts.as_ref().map(|t| t.0.clone()),
        origin.client_msg_id.as_ref().map(|id| id.0.clone()),
    )
}

/// Convert a `message` event, keeping only human direct messages.
///
/// Edits, deletions and other subtypes are dropped, except file shares so
/// that audio and images sent in a DM still reach the bot.
#[must_use]
pub fn chat_message_from_event(event: &SlackMessageEvent) -> Option<ChatMessage> {
    if !matches!(event.subtype, None | Some(SlackMessageEventType::FileShare)) {
        return None;
    }
    if event.sender.bot_id.is_some() {
        return None;
    }
    let is_direct = event
        .origin
        .channel_type
        .as_ref()
        .is_some_and(|t| t.0 == DIRECT_MESSAGE_CHANNEL_TYPE);
    if !is_direct {
        return None;
    }

    let channel = event.origin.channel.as_ref()?.0.clone();
    let (ts, thread_ts, client_msg_id) = origin_fields(&event.origin);
    Some(ChatMessage {
        channel,
        ts,
        thread_ts,
        text: event
            .content
            .as_ref()
            .and_then(|c| c.text.clone())
            .unwrap_or_default(),
        files: attached_files(event.content.as_ref()),
        client_msg_id,
        bot_id: None,
    })
}

/// Convert an `app_mention` event
#[must_use]
pub fn chat_message_from_mention(event: &SlackAppMentionEvent) -> ChatMessage {
    let (ts, thread_ts, client_msg_id) = origin_fields(&event.origin);
    ChatMessage {
        channel: event.channel.0.clone(),
        ts,
        thread_ts,
        text: event.content.text.clone().unwrap_or_default(),
        files: attached_files(Some(&event.content)),
        client_msg_id,
        bot_id: None,
    }
}

fn chat_message_from_history(channel: &str, message: &SlackHistoryMessage) -> ChatMessage {
    let (ts, thread_ts, client_msg_id) = origin_fields(&message.origin);
    ChatMessage {
        channel: channel.to_string(),
        ts,
        thread_ts,
        text: message.content.text.clone().unwrap_or_default(),
        files: attached_files(Some(&message.content)),
        client_msg_id,
        bot_id: message.sender.bot_id.as_ref().map(|b| b.0.clone()),
    }
}

/// Handle push events from Socket Mode.
///
/// The envelope is acknowledged as soon as this returns; the conversation
/// itself runs on a spawned task.
async fn handle_push_events(
    event: SlackPushEventCallback,
    _client: Arc<SlackHyperClient>,
    states: SlackClientEventsUserState,
) -> UserCallbackResult<()> {
    let message = match &event.event {
        SlackEventCallbackBody::Message(msg) => chat_message_from_event(msg),
        SlackEventCallbackBody::AppMention(mention) => Some(chat_message_from_mention(mention)),
        _ => {
            debug!("Ignoring event callback type");
            None
        }
    };
    let Some(message) = message else {
        return Ok(());
    };

    let context = {
        let guard = states.read().await;
        guard
            .get_user_state::<Arc<BotContext>>()
            .cloned()
            .ok_or("missing bot context in user state")?
    };

    debug!(channel = %message.channel, ts = %message.ts, "Accepted slack event");
    tokio::spawn(handle_message(context, message));
    Ok(())
}

fn slack_error_handler(
    err: Box<dyn std::error::Error + Send + Sync>,
    _client: Arc<SlackHyperClient>,
    _states: SlackClientEventsUserState,
) -> HttpStatusCode {
    warn!(error = %err, "slack socket mode error");
    HttpStatusCode::OK
}

/// Connect over Socket Mode and serve events until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the HTTP connector cannot be created or the Socket
/// Mode connection cannot be opened.
pub async fn serve_socket_mode<F>(
    context: Arc<BotContext>,
    app_token: &str,
    shutdown: F,
) -> Result<()>
where
    F: std::future::Future<Output = ()>,
{
    // The listener owns its own client for the WebSocket connection
    let listener_client = Arc::new(SlackClient::new(
        SlackClientHyperConnector::new().context("failed to create slack socket mode connector")?,
    ));

    let callbacks = SlackSocketModeListenerCallbacks::new().with_push_events(handle_push_events);
    let listener_environment = Arc::new(
        SlackClientEventsListenerEnvironment::new(listener_client)
            .with_error_handler(slack_error_handler)
            .with_user_state(context),
    );
    let listener = SlackClientSocketModeListener::new(
        &SlackClientSocketModeConfig::new(),
        listener_environment,
        callbacks,
    );

    let app_token = SlackApiToken::new(SlackApiTokenValue(app_token.to_string()));
    listener
        .listen_for(&app_token)
        .await
        .context("failed to start slack socket mode listener")?;
    info!("Slack socket mode connected");

    tokio::select! {
        exit_code = listener.serve() => {
            info!(exit_code, "Slack socket mode listener stopped");
        }
        () = shutdown => {
            info!("Slack socket mode shutting down");
            listener.shutdown().await;
        }
    }
    Ok(())
}
