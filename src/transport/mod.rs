//! Chat transport.
//!
//! [`BotApi`] is the seam between the bot logic and the messaging service.
//! [`TelegramClient`] implements it over the Telegram Bot HTTP API, and
//! [`poll_documents`] turns incoming document messages into queue events.

mod poller;
mod telegram;
pub mod types;

pub use poller::poll_documents;
pub use telegram::TelegramClient;

use anyhow::Result;
use std::sync::Arc;

use types::Update;

/// Operations the bot needs from the messaging service.
#[async_trait::async_trait]
pub trait BotApi: Send + Sync {
    /// Long-polls for updates with `update_id >= offset`.
    async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>>;

    /// Sends an HTML-formatted message to `chat_id`.
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()>;

    /// Downloads the bytes of an uploaded file.
    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>>;
}

#[async_trait::async_trait]
impl<T: BotApi + ?Sized> BotApi for Arc<T> {
    async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>> {
        (**self).get_updates(offset, timeout_secs).await
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        (**self).send_message(chat_id, text).await
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>> {
        (**self).download_file(file_id).await
    }
}
