//! HTTP chat endpoint client

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{ChatClient, ChatRequest};
use crate::{Error, Result};

/// One element of the endpoint's reply array
#[derive(Deserialize)]
struct ReplyItem {
    text: String,
}

/// Posts form-encoded turns to the agent's chat endpoint
pub struct HttpChatClient {
    client: reqwest::Client,
    url: String,
}

impl HttpChatClient {
    /// Create a client for `url`
    ///
    /// # Errors
    ///
    /// Returns error if the URL is empty or the HTTP client cannot be built
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(Error::Config("chat endpoint URL required".to_string()));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }

    /// Endpoint URL
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ChatClient for HttpChatClient {
    async fn send(&self, request: &ChatRequest) -> Result<String> {
        let form = reqwest::multipart::Form::new()
            .text("text", request.text.clone())
            .text("userId", request.user_id.clone())
            .text("voice_mode", request.voice_mode.to_string());

        tracing::debug!(
            url = %self.url,
            voice_mode = request.voice_mode,
            anonymous = request.user_id.is_empty(),
            "sending chat request"
        );

        let response = self.client.post(&self.url).multipart(form).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::error!(
                status = status.as_u16(),
                reason = status.canonical_reason().unwrap_or_default(),
                url = %self.url,
                "chat endpoint returned error"
            );
            return Err(Error::Chat(format!("failed to send message: {status}")));
        }

        let body = response.text().await?;
        parse_reply(&body)
    }
}

/// Extract the reply text from the endpoint's `[{ "text": ... }, ...]` body
fn parse_reply(body: &str) -> Result<String> {
    let items: Vec<ReplyItem> = serde_json::from_str(body)
        .map_err(|e| Error::Chat(format!("malformed response: {e}")))?;

    items
        .into_iter()
        .next()
        .map(|item| item.text)
        .ok_or_else(|| Error::Chat("malformed response: empty reply array".to_string()))
}
