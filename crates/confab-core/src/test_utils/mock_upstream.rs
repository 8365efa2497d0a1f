//! A mock Gemini-shaped upstream for exercising the provider client without
//! a network. Binds to an ephemeral local port, records every request body,
//! and replays scripted replies in order.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use tokio::net::TcpListener;

/// One scripted upstream reply.
pub enum MockReply {
    /// 200 with a JSON body (`generateContent` shape).
    Json(Value),
    /// 200 with a `text/event-stream` body (`streamGenerateContent` shape).
    Sse(String),
    /// An error status with a JSON error body.
    Error(u16, Value),
}

#[derive(Clone)]
struct MockState {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    requests: Arc<Mutex<Vec<Value>>>,
}

async fn model_handler(State(state): State<MockState>, Json(payload): Json<Value>) -> Response {
    state.requests.lock().unwrap().push(payload);

    match state.replies.lock().unwrap().pop_front() {
        Some(MockReply::Json(body)) => (StatusCode::OK, Json(body)).into_response(),
        Some(MockReply::Sse(body)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/event-stream")],
            body,
        )
            .into_response(),
        Some(MockReply::Error(code, body)) => (
            StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Json(body),
        )
            .into_response(),
        None => {
            log::error!("mock upstream ran out of scripted replies");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

pub struct MockUpstream {
    addr: SocketAddr,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
    requests: Arc<Mutex<Vec<Value>>>,
}

impl MockUpstream {
    pub async fn start(replies: Vec<MockReply>) -> Self {
        let state = MockState {
            replies: Arc::new(Mutex::new(VecDeque::from(replies))),
            requests: Arc::new(Mutex::new(Vec::new())),
        };
        let requests = state.requests.clone();

        let app = Router::new()
            .route("/models/{*rest}", post(model_handler))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock upstream");
        let addr = listener.local_addr().expect("mock upstream local addr");

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap_or_else(|e| log::error!("mock upstream error: {}", e));
        });

        Self {
            addr,
            shutdown_tx,
            requests,
        }
    }

    /// Base URL to hand to `GeminiClient::with_base_url`.
    pub fn address(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Request bodies recorded so far, in arrival order.
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
    }
}
