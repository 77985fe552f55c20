//! Remote messaging through the Telegram Bot API.

use std::path::Path;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::{
    Client,
    multipart::{Form, Part},
};
use serde::Deserialize;
use url::Url;

use super::error::NotificationError;

/// Where a remote message goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub bot_token: String,
    pub chat_id: String,
}

/// Sends a photo with a caption to a remote chat.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RemoteMessenger: Send + Sync {
    /// Makes exactly one delivery attempt.
    async fn send_photo(
        &self,
        target: &RemoteTarget,
        caption: &str,
        image: &Path,
    ) -> Result<(), NotificationError>;
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// A [`RemoteMessenger`] backed by the `sendPhoto` Bot API method.
#[derive(Debug, Clone)]
pub struct TelegramMessenger {
    client: Client,
    api_url: Url,
}

impl TelegramMessenger {
    /// Creates a messenger talking to the API at `api_url`.
    pub fn new(client: Client, api_url: &str) -> Result<Self, NotificationError> {
        let api_url = Url::parse(api_url)
            .map_err(|e| NotificationError::InvalidApiUrl(format!("'{api_url}': {e}")))?;
        if api_url.cannot_be_a_base() {
            return Err(NotificationError::InvalidApiUrl(format!("'{api_url}' cannot be a base")));
        }
        Ok(Self { client, api_url })
    }

    fn method_url(&self, bot_token: &str, method: &str) -> Result<Url, NotificationError> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| NotificationError::InvalidApiUrl(format!("'{}' cannot be a base", self.api_url)))?
            .pop_if_empty()
            .push(&format!("bot{bot_token}"))
            .push(method);
        Ok(url)
    }
}

#[async_trait]
impl RemoteMessenger for TelegramMessenger {
    async fn send_photo(
        &self,
        target: &RemoteTarget,
        caption: &str,
        image: &Path,
    ) -> Result<(), NotificationError> {
        let bytes = tokio::fs::read(image).await?;
        let file_name = image
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "detection.jpg".to_string());

        let form = Form::new()
            .text("chat_id", target.chat_id.clone())
            .text("caption", caption.to_string())
            .part("photo", Part::bytes(bytes).file_name(file_name));

        let url = self.method_url(&target.bot_token, "sendPhoto")?;
        let response = self.client.post(url).multipart(form).send().await?;
        let status = response.status();
        let body: Option<TelegramResponse> = response.json().await.ok();

        match body {
            Some(TelegramResponse { ok: true, .. }) if status.is_success() => Ok(()),
            Some(TelegramResponse { description, .. }) => Err(NotificationError::Rejected(format!(
                "sendPhoto failed with status {status}: {}",
                description.unwrap_or_else(|| "no description".to_string())
            ))),
            None => Err(NotificationError::Rejected(format!("sendPhoto failed with status {status}"))),
        }
    }
}
