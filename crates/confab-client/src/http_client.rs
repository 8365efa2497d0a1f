//! HTTP transport for communicating with a remote confab proxy.

use std::time::Duration;

use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::stream::TryStreamExt;

use confab_core::{ChatError, ChatRequest, ChatResponse, ErrorBody, TextStream};

use crate::ChatTransport;

pub struct HttpChatTransport {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpChatTransport {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn post_chat(&self, request: &ChatRequest) -> Result<reqwest::Response, ChatError> {
        let chat_url = format!("{}/api/chat", self.base_url);
        let response = self
            .client
            .post(&chat_url)
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            // The proxy sends a structured body; fall back to the status line
            // when it does not parse.
            let detail = match response.json::<ErrorBody>().await {
                Ok(body) => body.error,
                Err(_) => status.to_string(),
            };
            return Err(ChatError::LLMError(format!(
                "chat endpoint returned {}: {}",
                status, detail
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    async fn send(&self, request: ChatRequest) -> Result<String, ChatError> {
        let response = self.post_chat(&request).await?;
        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ChatError::ParsingError(format!("malformed chat response: {}", e)))?;
        Ok(body.text)
    }

    async fn send_streaming(&self, request: ChatRequest) -> Result<TextStream, ChatError> {
        let response = self.post_chat(&request).await?;
        let mut bytes = response
            .bytes_stream()
            .map_err(|e| ChatError::StreamError(e.to_string()));

        let stream = try_stream! {
            while let Some(chunk) = bytes.try_next().await? {
                let text = String::from_utf8_lossy(&chunk).into_owned();
                if !text.is_empty() {
                    yield text;
                }
            }
        };

        Ok(Box::pin(stream))
    }

    async fn health_check(&self) -> Result<(), ChatError> {
        let health_url = format!("{}/api/health", self.base_url);
        let response = self
            .client
            .get(&health_url)
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ChatError::LLMError(format!(
                "health check failed: {}",
                response.status()
            )));
        }

        Ok(())
    }
}
