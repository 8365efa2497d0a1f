//! Client SDK for driving chat sessions against a confab proxy.
//!
//! The transport trait abstracts how a turn reaches the proxy (buffered JSON
//! or a chunked text stream) so front-ends can switch delivery modes without
//! touching session logic. The session orchestrator owns the one piece of
//! per-conversation state the system has: the transcript, the first-turn
//! flag, and the single-slot request lease.

use async_trait::async_trait;

use confab_core::{ChatError, ChatRequest, TextStream};

pub mod http_client;
pub mod session;

pub use http_client::HttpChatTransport;
pub use session::{
    ChatSession, RequestLease, Sender, SubmitOutcome, TranscriptEntry, FALLBACK_ERROR_TEXT,
};

/// Transport for one chat turn to the proxy.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send a turn and receive the complete response text.
    async fn send(&self, request: ChatRequest) -> Result<String, ChatError>;

    /// Send a turn and receive the response as incremental text chunks.
    async fn send_streaming(&self, request: ChatRequest) -> Result<TextStream, ChatError>;

    /// Check that the proxy is reachable and healthy.
    async fn health_check(&self) -> Result<(), ChatError>;
}

/// Factory for creating transports.
pub struct ChatTransportFactory;

impl ChatTransportFactory {
    /// Create an HTTP transport for a remote proxy.
    pub fn create_http_transport(base_url: String) -> Box<dyn ChatTransport> {
        Box::new(HttpChatTransport::new(base_url))
    }
}
