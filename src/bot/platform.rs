use std::path::Path;

use anyhow::Result;

/// A file attached to a chat message
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AttachedFile {
    /// Platform file id
    pub id: String,
    /// Private download URL, requires the bot token
    pub url_private: String,
    /// Short file type such as `png` or `m4a`
    pub filetype: String,
}

/// A chat message as seen by the conversation logic.
///
/// Used both for the triggering event and for each reply of a thread.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatMessage {
    /// Channel (or DM conversation) id
    pub channel: String,
    /// Message timestamp, unique within the channel
    pub ts: String,
    /// Root timestamp when the message belongs to a thread
    pub thread_ts: Option<String>,
    /// Message text, empty when there is none
    pub text: String,
    /// Attached files in platform order
    pub files: Vec<AttachedFile>,
    /// Present on messages typed by a human in a client
    pub client_msg_id: Option<String>,
    /// Present on messages posted by a bot
    pub bot_id: Option<String>,
}

impl ChatMessage {
    /// True if the message was typed by a human participant
    #[must_use]
    pub fn is_from_human(&self) -> bool {
        self.client_msg_id.is_some()
    }

    /// True if the message was posted by a bot
    #[must_use]
    pub fn is_from_bot(&self) -> bool {
        self.bot_id.is_some()
    }
}

/// Reference to a posted message, used to edit it later
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHandle {
    /// Channel the message lives in
    pub channel: String,
    /// Timestamp of the posted message
    pub ts: String,
}

/// Operations the bot needs from the chat platform
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Post a message into the thread rooted at `thread_ts`
    async fn post_message(&self, channel: &str, thread_ts: &str, text: &str)
        -> Result<MessageHandle>;

    /// Replace the text of a previously posted message
    async fn update_message(&self, handle: &MessageHandle, text: &str) -> Result<()>;

    /// All replies of a thread, root first, in platform order
    async fn fetch_thread(&self, channel: &str, thread_ts: &str) -> Result<Vec<ChatMessage>>;

    /// Download a private attachment into `destination`
    async fn download_file(&self, file: &AttachedFile, destination: &Path) -> Result<()>;

    /// Upload a local file into the thread rooted at `thread_ts`
    async fn upload_file(
        &self,
        channel: &str,
        thread_ts: &str,
        path: &Path,
        title: &str,
    ) -> Result<()>;
}
