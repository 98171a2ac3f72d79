//! Conversation assembly
//!
//! Turns a chat message, or the thread it belongs to, into the prompt
//! messages sent to the model.

use std::path::Path;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tracing::debug;

use super::platform::{ChatMessage, ChatPlatform};
use crate::llm::PromptMessage;
use crate::media::MediaFile;
use crate::utils::image_mime_type;

/// Convert one chat message into a user prompt message.
///
/// Only the first attachment is inspected. When it is an image it is
/// downloaded, inlined as a base64 data URI and the staged copy removed.
///
/// # Errors
///
/// Returns an error if the image download or the staged read fails.
pub async fn normalize_message(
    platform: &dyn ChatPlatform,
    temp_dir: &Path,
    message: &ChatMessage,
) -> Result<PromptMessage> {
    let Some(file) = message.files.first() else {
        return Ok(PromptMessage::user(&message.text));
    };
    let Some(mime) = image_mime_type(&file.filetype) else {
        return Ok(PromptMessage::user(&message.text));
    };

    let staged = MediaFile::reserve(temp_dir, &file.filetype.to_lowercase());
    platform
        .download_file(file, staged.path())
        .await
        .with_context(|| format!("Failed to download attachment {}", file.id))?;
    let bytes = staged
        .read()
        .await
        .context("Failed to read downloaded attachment")?;
    drop(staged);

    debug!(file_id = %file.id, bytes = bytes.len(), mime, "Inlined image attachment");
    let data_uri = format!("data:{mime};base64,{}", BASE64.encode(&bytes));
    Ok(PromptMessage::user_with_image(&message.text, data_uri))
}

/// Build the chronological prompt history for a triggering message.
///
/// Threaded messages pull every reply of the thread. Human replies are
/// normalized, bot replies become assistant text unless they still hold the
/// waiting placeholder, everything else is skipped.
///
/// # Errors
///
/// Returns an error if the thread cannot be fetched or an image attachment
/// cannot be downloaded.
pub async fn assemble_history(
    platform: &dyn ChatPlatform,
    temp_dir: &Path,
    waiting_message: &str,
    message: &ChatMessage,
) -> Result<Vec<PromptMessage>> {
    let Some(thread_ts) = message.thread_ts.as_deref() else {
        return Ok(vec![normalize_message(platform, temp_dir, message).await?]);
    };

    let replies = platform
        .fetch_thread(&message.channel, thread_ts)
        .await
        .context("Failed to fetch thread replies")?;

    let mut history = Vec::with_capacity(replies.len());
    for reply in &replies {
        if reply.is_from_human() {
            history.push(normalize_message(platform, temp_dir, reply).await?);
        } else if reply.is_from_bot() && reply.text != waiting_message {
            history.push(PromptMessage::assistant(&reply.text));
        }
    }

    debug!(
        thread_ts,
        replies = replies.len(),
        kept = history.len(),
        "Assembled thread history"
    );
    Ok(history)
}
