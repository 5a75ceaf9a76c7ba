use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use super::BotApi;
use super::types::{
    ApiResponse, File, GetFileRequest, GetUpdatesRequest, SendMessageRequest, Update,
};

const API_BASE: &str = "https://api.telegram.org";

/// Must stay above the long-poll timeout, or `getUpdates` is cut off client side.
const REQUEST_TIMEOUT_SECS: u64 = 90;

/// [`BotApi`] backed by the Telegram Bot HTTP API.
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    method_base: String,
    file_base: String,
}

impl TelegramClient {
    pub fn new(token: &str) -> Result<Self> {
        Self::with_base_url(API_BASE, token)
    }

    /// Points the client at a different API host, e.g. a local Bot API server.
    pub fn with_base_url(base_url: &str, token: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        let base_url = base_url.trim_end_matches('/');
        Ok(Self {
            http,
            method_base: format!("{base_url}/bot{token}"),
            file_base: format!("{base_url}/file/bot{token}"),
        })
    }

    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.method_base, method);

        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to send {method} request: {}", e.without_url()))?;

        let status = response.status();
        let envelope: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse {method} response (status {status}): {e}"))?;

        if !envelope.ok {
            let description = envelope.description.unwrap_or_default();
            return Err(anyhow!("{method} failed with status {status}: {description}"));
        }

        envelope
            .result
            .ok_or_else(|| anyhow!("{method} returned ok without a result"))
    }
}

#[async_trait]
impl BotApi for TelegramClient {
    async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>> {
        let request = GetUpdatesRequest {
            offset,
            timeout: timeout_secs,
            allowed_updates: &["message"],
        };
        self.call("getUpdates", &request).await
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let request = SendMessageRequest {
            chat_id,
            text,
            parse_mode: "HTML",
        };
        let _: serde_json::Value = self.call("sendMessage", &request).await?;
        debug!(chat_id, chars = text.chars().count(), "Message sent");
        Ok(())
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>> {
        let file: File = self.call("getFile", &GetFileRequest { file_id }).await?;
        let file_path = file
            .file_path
            .ok_or_else(|| anyhow!("getFile returned no file_path for '{file_id}'"))?;

        let url = format!("{}/{}", self.file_base, file_path);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to download file: {}", e.without_url()))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(anyhow!("File download failed with status {status}"));
        }

        let bytes = response
            .bytes()
            .await
            .context("reading file download body")?;
        debug!(bytes = bytes.len(), "File downloaded");
        Ok(bytes.to_vec())
    }
}
