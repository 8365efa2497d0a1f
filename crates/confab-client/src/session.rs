//! Session orchestration: the visible transcript and one request/response
//! cycle per user submission.
//!
//! A session drives at most one outstanding request. The guard is a
//! single-slot lease acquired on submit and released on completion or
//! failure, which makes the "at most one in flight" invariant a property of
//! the type rather than a convention. There is no queue and no cancellation:
//! a rejected submission is simply a no-op the caller can retry.

use futures_util::StreamExt;

use confab_core::persona::Persona;
use confab_core::render::render;
use confab_core::ChatRequest;

use crate::ChatTransport;

/// Fixed user-visible text shown in place of a response when a turn fails.
pub const FALLBACK_ERROR_TEXT: &str =
    "Sorry, something went wrong while getting a response. Please try again.";

/// Placeholder body shown while a response is pending.
const PENDING_INDICATOR: &str = "●";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Assistant,
}

/// One entry in the append-only transcript. Entries are never removed; the
/// pending placeholder is the only entry ever mutated, and only to receive
/// its final body.
#[derive(Debug, Clone)]
pub struct TranscriptEntry {
    pub sender: Sender,
    pub body: String,
    pub pending: bool,
}

impl TranscriptEntry {
    fn user(body: String) -> Self {
        Self {
            sender: Sender::User,
            body,
            pending: false,
        }
    }

    fn pending_assistant() -> Self {
        Self {
            sender: Sender::Assistant,
            body: PENDING_INDICATOR.to_string(),
            pending: true,
        }
    }

    fn assistant(body: String) -> Self {
        Self {
            sender: Sender::Assistant,
            body,
            pending: false,
        }
    }
}

/// Single-slot lease over the one outstanding request.
#[derive(Debug, Default)]
pub struct RequestLease {
    held: bool,
}

impl RequestLease {
    /// Take the slot. Returns false when it is already held.
    pub fn try_acquire(&mut self) -> bool {
        if self.held {
            return false;
        }
        self.held = true;
        true
    }

    pub fn release(&mut self) {
        self.held = false;
    }

    pub fn is_held(&self) -> bool {
        self.held
    }
}

/// Result of a [`ChatSession::submit`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The turn completed and the placeholder holds the rendered response.
    Completed,
    /// The turn failed and the placeholder holds the fallback text.
    Failed,
    /// Empty input after trimming; nothing happened.
    RejectedEmpty,
    /// A request is already in flight; nothing happened.
    RejectedBusy,
}

pub struct ChatSession<T: ChatTransport> {
    transport: T,
    persona: Persona,
    first_message: bool,
    lease: RequestLease,
    transcript: Vec<TranscriptEntry>,
}

impl<T: ChatTransport> ChatSession<T> {
    pub fn new(transport: T, persona: Persona) -> Self {
        let greeting = render(persona.greeting()).into_string();
        Self {
            transport,
            persona,
            first_message: true,
            lease: RequestLease::default(),
            transcript: vec![TranscriptEntry::assistant(greeting)],
        }
    }

    pub fn persona(&self) -> Persona {
        self.persona
    }

    /// Switch the active persona. The new persona's greeting joins the
    /// transcript; the first-turn state is per session, not per persona.
    pub fn set_persona(&mut self, persona: Persona) {
        self.persona = persona;
        self.transcript
            .push(TranscriptEntry::assistant(render(persona.greeting()).into_string()));
    }

    pub fn is_first_message(&self) -> bool {
        self.first_message
    }

    pub fn is_busy(&self) -> bool {
        self.lease.is_held()
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    /// Submit one user message with buffered delivery.
    pub async fn submit(&mut self, text: &str) -> SubmitOutcome {
        let Some((request, placeholder)) = self.begin_turn(text) else {
            return self.rejected(text);
        };

        let outcome = match self.transport.send(request).await {
            Ok(response) => {
                self.transcript[placeholder] =
                    TranscriptEntry::assistant(render(&response).into_string());
                self.first_message = false;
                SubmitOutcome::Completed
            }
            Err(e) => {
                log::error!("chat turn failed: {}", e);
                self.transcript[placeholder] =
                    TranscriptEntry::assistant(FALLBACK_ERROR_TEXT.to_string());
                SubmitOutcome::Failed
            }
        };
        self.lease.release();
        outcome
    }

    /// Submit one user message with streamed delivery: chunks accumulate in
    /// the placeholder as they arrive, and the markdown pipeline runs once
    /// over the complete text at finalization.
    pub async fn submit_streaming(&mut self, text: &str) -> SubmitOutcome {
        let Some((request, placeholder)) = self.begin_turn(text) else {
            return self.rejected(text);
        };

        let outcome = match self.transport.send_streaming(request).await {
            Ok(mut stream) => {
                let mut accumulated = String::new();
                let mut failed = false;
                while let Some(chunk) = stream.next().await {
                    match chunk {
                        Ok(piece) => {
                            accumulated.push_str(&piece);
                            self.transcript[placeholder].body = accumulated.clone();
                        }
                        Err(e) => {
                            log::error!("chat stream failed: {}", e);
                            failed = true;
                            break;
                        }
                    }
                }

                if failed {
                    self.transcript[placeholder] =
                        TranscriptEntry::assistant(FALLBACK_ERROR_TEXT.to_string());
                    SubmitOutcome::Failed
                } else {
                    self.transcript[placeholder] =
                        TranscriptEntry::assistant(render(&accumulated).into_string());
                    self.first_message = false;
                    SubmitOutcome::Completed
                }
            }
            Err(e) => {
                log::error!("chat turn failed: {}", e);
                self.transcript[placeholder] =
                    TranscriptEntry::assistant(FALLBACK_ERROR_TEXT.to_string());
                SubmitOutcome::Failed
            }
        };
        self.lease.release();
        outcome
    }

    /// Shared submission preamble: trim, guard, append the user entry and
    /// the placeholder, build the request. Returns `None` when the
    /// submission is rejected (empty input or lease held).
    fn begin_turn(&mut self, text: &str) -> Option<(ChatRequest, usize)> {
        let trimmed = text.trim();
        if trimmed.is_empty() || !self.lease.try_acquire() {
            return None;
        }

        self.transcript.push(TranscriptEntry::user(trimmed.to_string()));
        let placeholder = self.transcript.len();
        self.transcript.push(TranscriptEntry::pending_assistant());

        let request = ChatRequest {
            message: trimmed.to_string(),
            is_first_message: self.first_message,
            agent_type: Some(self.persona.key().to_string()),
        };
        Some((request, placeholder))
    }

    fn rejected(&self, text: &str) -> SubmitOutcome {
        if text.trim().is_empty() {
            SubmitOutcome::RejectedEmpty
        } else {
            SubmitOutcome::RejectedBusy
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use confab_core::{ChatError, TextStream};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    enum StubReply {
        Text(String),
        Failure(ChatError),
        Chunks(Vec<Result<String, ChatError>>),
    }

    #[derive(Clone, Default)]
    struct StubTransport {
        replies: Arc<Mutex<VecDeque<StubReply>>>,
        requests: Arc<Mutex<Vec<ChatRequest>>>,
    }

    impl StubTransport {
        fn scripted(replies: Vec<StubReply>) -> Self {
            Self {
                replies: Arc::new(Mutex::new(VecDeque::from(replies))),
                requests: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn next_reply(&self) -> StubReply {
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("stub transport ran out of replies")
        }
    }

    #[async_trait]
    impl ChatTransport for StubTransport {
        async fn send(&self, request: ChatRequest) -> Result<String, ChatError> {
            self.requests.lock().unwrap().push(request);
            match self.next_reply() {
                StubReply::Text(text) => Ok(text),
                StubReply::Failure(e) => Err(e),
                StubReply::Chunks(_) => panic!("buffered send got a chunk reply"),
            }
        }

        async fn send_streaming(&self, request: ChatRequest) -> Result<TextStream, ChatError> {
            self.requests.lock().unwrap().push(request);
            match self.next_reply() {
                StubReply::Chunks(chunks) => {
                    Ok(Box::pin(futures_util::stream::iter(chunks)))
                }
                StubReply::Failure(e) => Err(e),
                StubReply::Text(_) => panic!("streaming send got a buffered reply"),
            }
        }

        async fn health_check(&self) -> Result<(), ChatError> {
            Ok(())
        }
    }

    fn failure() -> ChatError {
        ChatError::LLMError("boom".to_string())
    }

    #[test]
    fn lease_holds_one_slot() {
        let mut lease = RequestLease::default();
        assert!(lease.try_acquire());
        assert!(lease.is_held());
        assert!(!lease.try_acquire());
        lease.release();
        assert!(lease.try_acquire());
    }

    #[tokio::test]
    async fn session_opens_with_the_rendered_greeting() {
        let session = ChatSession::new(StubTransport::default(), Persona::SafetyCoach);
        let transcript = session.transcript();
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript[0].sender, Sender::Assistant);
        assert!(transcript[0].body.contains("<strong>Staying Safe AI</strong>"));
        assert!(transcript[0].body.contains("<ul><li>Password security tips</li>"));
    }

    #[tokio::test]
    async fn empty_submission_is_a_complete_no_op() {
        let transport = StubTransport::default();
        let mut session = ChatSession::new(transport.clone(), Persona::DefaultAssistant);

        let outcome = session.submit("   \n  ").await;
        assert_eq!(outcome, SubmitOutcome::RejectedEmpty);
        assert_eq!(session.transcript().len(), 1);
        assert!(transport.requests.lock().unwrap().is_empty());
        assert!(session.is_first_message());
    }

    #[tokio::test]
    async fn held_lease_rejects_a_second_submission() {
        let transport = StubTransport::default();
        let mut session = ChatSession::new(transport.clone(), Persona::DefaultAssistant);
        assert!(session.lease.try_acquire());

        let outcome = session.submit("hello").await;
        assert_eq!(outcome, SubmitOutcome::RejectedBusy);
        assert_eq!(session.transcript().len(), 1);
        assert!(transport.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn successful_turn_renders_and_flips_first_message() {
        let transport = StubTransport::scripted(vec![StubReply::Text(
            "**Overview**\nHEX is a token.".to_string(),
        )]);
        let mut session = ChatSession::new(transport.clone(), Persona::DefaultAssistant);

        let outcome = session.submit("  What is HEX?  ").await;
        assert_eq!(outcome, SubmitOutcome::Completed);
        assert!(!session.is_first_message());
        assert!(!session.is_busy());

        let transcript = session.transcript();
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript[1].sender, Sender::User);
        assert_eq!(transcript[1].body, "What is HEX?");
        assert_eq!(
            transcript[2].body,
            "<strong>Overview</strong><br><br>HEX is a token."
        );
        assert!(!transcript[2].pending);

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests[0].message, "What is HEX?");
        assert!(requests[0].is_first_message);
        assert_eq!(requests[0].agent_type.as_deref(), Some("hex"));
    }

    #[tokio::test]
    async fn failed_turn_keeps_first_message_and_stays_usable() {
        let transport = StubTransport::scripted(vec![
            StubReply::Failure(failure()),
            StubReply::Text("Recovered.".to_string()),
            StubReply::Failure(failure()),
        ]);
        let mut session = ChatSession::new(transport.clone(), Persona::DefaultAssistant);

        assert_eq!(session.submit("first try").await, SubmitOutcome::Failed);
        assert!(session.is_first_message());
        assert_eq!(session.transcript()[2].body, FALLBACK_ERROR_TEXT);
        assert!(!session.is_busy());

        assert_eq!(session.submit("second try").await, SubmitOutcome::Completed);
        assert!(!session.is_first_message());

        // A later failure does not resurrect the first-turn state.
        assert_eq!(session.submit("third try").await, SubmitOutcome::Failed);
        assert!(!session.is_first_message());

        let requests = transport.requests.lock().unwrap();
        assert!(requests[0].is_first_message);
        assert!(requests[1].is_first_message);
        assert!(!requests[2].is_first_message);
    }

    #[tokio::test]
    async fn streaming_turn_accumulates_then_renders_once() {
        let transport = StubTransport::scripted(vec![StubReply::Chunks(vec![
            Ok("**Bold".to_string()),
            Ok("** move".to_string()),
        ])]);
        let mut session = ChatSession::new(transport, Persona::DefaultAssistant);

        let outcome = session.submit_streaming("go").await;
        assert_eq!(outcome, SubmitOutcome::Completed);
        assert_eq!(
            session.transcript()[2].body,
            "<strong>Bold</strong> move"
        );
        assert!(!session.is_first_message());
    }

    #[tokio::test]
    async fn streaming_transport_failure_uses_the_fallback_text() {
        let transport = StubTransport::scripted(vec![StubReply::Chunks(vec![
            Ok("partial".to_string()),
            Err(failure()),
        ])]);
        let mut session = ChatSession::new(transport, Persona::DefaultAssistant);

        let outcome = session.submit_streaming("go").await;
        assert_eq!(outcome, SubmitOutcome::Failed);
        assert_eq!(session.transcript()[2].body, FALLBACK_ERROR_TEXT);
        assert!(session.is_first_message());
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn persona_switch_greets_without_resetting_turn_state() {
        let transport = StubTransport::scripted(vec![StubReply::Text("ok".to_string())]);
        let mut session = ChatSession::new(transport.clone(), Persona::DefaultAssistant);
        session.submit("hello").await;
        assert!(!session.is_first_message());

        session.set_persona(Persona::PositivityCoach);
        assert_eq!(session.persona(), Persona::PositivityCoach);
        assert!(!session.is_first_message());
        assert!(session
            .transcript()
            .last()
            .unwrap()
            .body
            .contains("Positive Vibes Only"));
    }
}
