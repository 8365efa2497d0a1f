//! HTTP proxy translating persona chat turns into upstream model calls.
//!
//! The server is deliberately thin: one stateless POST endpoint that
//! validates a turn, composes the persona prompt, delegates to the upstream
//! client, and returns the text either as one buffered JSON body or as a
//! chunked plain-text stream. All shared state is read-only after startup,
//! so request handlers need no locking discipline at all.

pub mod error;

pub use error::{Result, ServerError};

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::{middleware, Router};
use bytes::Bytes;
use futures_util::StreamExt;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use confab_core::prompt::compose_turn;
use confab_core::{ChatResponse, ConfabConfig, Persona, ResponseDelivery, TextStream, LLM};

/// Fixed suffix appended to a streamed body when the upstream fails after
/// response headers were already sent.
pub const STREAM_ERROR_SUFFIX: &str =
    "\n\nError: Something went wrong while processing your request.";

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
}

/// Configuration for the proxy server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Enable CORS
    pub enable_cors: bool,
    /// CORS allowed origins (if None, allows any origin)
    pub cors_origins: Option<Vec<String>>,
    /// Enable request logging
    pub enable_logging: bool,
    /// How `/api/chat` delivers the model text
    pub delivery: ResponseDelivery,
    /// Include upstream error detail in 500 bodies
    pub verbose_errors: bool,
    /// Persona used when a request names none (or an unknown one)
    pub default_persona: Persona,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3001".parse().unwrap(),
            enable_cors: true,
            cors_origins: None, // Allow any origin
            enable_logging: true,
            delivery: ResponseDelivery::Buffered,
            verbose_errors: false,
            default_persona: Persona::DefaultAssistant,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the server configuration from the loaded config file.
    pub fn from_config(config: &ConfabConfig) -> Result<Self> {
        let bind_addr = config
            .server
            .bind_addr
            .parse()
            .map_err(|e| ServerError::config_error(format!("Invalid bind address: {}", e)))?;
        Ok(Self::default()
            .with_bind_addr(bind_addr)
            .with_delivery(config.server.delivery)
            .with_verbose_errors(config.server.verbose_errors)
            .with_default_persona(Persona::from_key_or_default(Some(
                config.default_persona.as_str(),
            ))))
    }

    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Parse and set the bind address from a string.
    pub fn with_bind_addr_str(mut self, addr: &str) -> Result<Self> {
        self.bind_addr = addr
            .parse()
            .map_err(|e| ServerError::config_error(format!("Invalid bind address: {}", e)))?;
        Ok(self)
    }

    pub fn with_cors(mut self, enable: bool) -> Self {
        self.enable_cors = enable;
        self
    }

    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    pub fn with_logging(mut self, enable: bool) -> Self {
        self.enable_logging = enable;
        self
    }

    pub fn with_delivery(mut self, delivery: ResponseDelivery) -> Self {
        self.delivery = delivery;
        self
    }

    pub fn with_verbose_errors(mut self, enable: bool) -> Self {
        self.verbose_errors = enable;
        self
    }

    pub fn with_default_persona(mut self, persona: Persona) -> Self {
        self.default_persona = persona;
        self
    }
}

/// Shared application state: the upstream client and the configuration.
/// Both are read-only for the life of the process.
#[derive(Clone)]
pub struct AppState {
    pub llm: Arc<dyn LLM>,
    pub config: ServerConfig,
}

fn error_body(config: &ServerConfig, err: &ServerError) -> (StatusCode, Json<Value>) {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = match err {
        ServerError::InvalidRequest(message) => json!({
            "error": message,
            "timestamp": chrono::Utc::now(),
        }),
        other => {
            let mut body = json!({
                "error": "Internal server error",
                "timestamp": chrono::Utc::now(),
            });
            if config.verbose_errors {
                body["message"] = json!(other.to_string());
            }
            body
        }
    };
    (status, Json(body))
}

/// Handler for the `GET /api/health` endpoint.
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handler for the `POST /api/chat` endpoint.
async fn chat_handler(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> std::result::Result<Response, (StatusCode, Json<Value>)> {
    let message = match payload.get("message").and_then(Value::as_str) {
        Some(message) if !message.is_empty() => message.to_string(),
        _ => {
            log::warn!("chat request rejected: missing or non-string message");
            return Err(error_body(
                &state.config,
                &ServerError::invalid_request("Message is required and must be a string"),
            ));
        }
    };
    let is_first_message = payload
        .get("isFirstMessage")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let persona = payload
        .get("agentType")
        .and_then(Value::as_str)
        .and_then(Persona::from_key)
        .unwrap_or(state.config.default_persona);

    log::info!(
        "chat turn: persona={} first={} delivery={:?}",
        persona.key(),
        is_first_message,
        state.config.delivery
    );

    let messages = compose_turn(persona, &message, is_first_message);
    let web_search = persona.web_search();

    match state.config.delivery {
        ResponseDelivery::Buffered => {
            match state.llm.generate(messages, web_search).await {
                Ok(response) => {
                    let text = response.content.unwrap_or_default();
                    Ok(Json(ChatResponse { text }).into_response())
                }
                Err(e) => {
                    log::error!("Chat API error: {}", e);
                    Err(error_body(&state.config, &ServerError::Upstream(e)))
                }
            }
        }
        ResponseDelivery::Streamed => match state.llm.generate_stream(messages, web_search).await {
            Ok(stream) => Ok(stream_response(stream)),
            Err(e) => {
                // Headers have not been sent yet, so a status code is still
                // the right failure shape.
                log::error!("Chat API error: {}", e);
                Err(error_body(&state.config, &ServerError::Upstream(e)))
            }
        },
    }
}

/// Turn an upstream chunk stream into a chunked `text/plain` response. A
/// mid-stream failure cannot change the status code any more, so it appends
/// a plain-text error suffix and ends the body.
fn stream_response(upstream: TextStream) -> Response {
    let body = async_stream::stream! {
        let mut upstream = upstream;
        while let Some(chunk) = upstream.next().await {
            match chunk {
                Ok(text) => yield Ok::<_, Infallible>(Bytes::from(text)),
                Err(e) => {
                    log::error!("upstream stream failed mid-response: {}", e);
                    yield Ok(Bytes::from(STREAM_ERROR_SUFFIX));
                    break;
                }
            }
        }
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(body))
        .unwrap_or_else(|e| {
            log::error!("failed to build stream response: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        })
}

/// Fallback for unmatched routes.
async fn not_found_handler() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": "Endpoint not found"})),
    )
}

/// The proxy server.
pub struct ProxyServer {
    llm: Arc<dyn LLM>,
    config: ServerConfig,
}

impl ProxyServer {
    /// Create a new server with the default configuration.
    pub fn new(llm: Arc<dyn LLM>) -> Self {
        Self {
            llm,
            config: ServerConfig::default(),
        }
    }

    /// Create a new server with custom configuration.
    pub fn with_config(llm: Arc<dyn LLM>, config: ServerConfig) -> Self {
        Self { llm, config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the Axum router with all routes and middleware.
    pub fn build_router(&self) -> Router {
        let state = AppState {
            llm: self.llm.clone(),
            config: self.config.clone(),
        };

        let mut router = Router::new()
            .route("/api/health", get(health_handler))
            .route("/api/chat", post(chat_handler))
            .fallback(not_found_handler)
            .with_state(state);

        if self.config.enable_logging {
            router = router.layer(middleware::from_fn(
                |request: axum::http::Request<Body>, next: axum::middleware::Next| async {
                    let request_id = uuid::Uuid::new_v4().to_string();
                    let method = request.method().clone();
                    let uri = request.uri().clone();
                    log::info!("Request {} {} {}", request_id, method, uri);

                    let start = std::time::Instant::now();
                    let response = next.run(request).await;
                    let duration = start.elapsed();
                    log::info!(
                        "Response {} {} completed in {:?}",
                        request_id,
                        response.status(),
                        duration
                    );

                    response
                },
            ));
        }

        router = router.layer(TraceLayer::new_for_http());

        if self.config.enable_cors {
            let cors_layer = if let Some(ref origins) = self.config.cors_origins {
                let origins: std::result::Result<Vec<_>, _> =
                    origins.iter().map(|s| s.parse()).collect();
                match origins {
                    Ok(origins) => CorsLayer::new()
                        .allow_origin(origins)
                        .allow_methods(Any)
                        .allow_headers(Any),
                    Err(_) => CorsLayer::permissive(),
                }
            } else {
                CorsLayer::permissive()
            };
            router = router.layer(cors_layer);
        }

        router
    }

    /// Start the server and listen for connections.
    ///
    /// This method will block until the server is shut down.
    pub async fn serve(self) -> Result<()> {
        let router = self.build_router();
        let listener = TcpListener::bind(self.config.bind_addr)
            .await
            .map_err(|e| {
                ServerError::config_error(format!(
                    "Failed to bind to {}: {}",
                    self.config.bind_addr, e
                ))
            })?;

        log::info!("proxy server starting on {}", self.config.bind_addr);
        log::info!("Chat endpoint: http://{}/api/chat", self.config.bind_addr);
        log::info!("Health check: http://{}/api/health", self.config.bind_addr);

        axum::serve(listener, router)
            .await
            .map_err(|e| ServerError::internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Start the server with graceful shutdown support.
    pub async fn serve_with_shutdown<F>(self, shutdown_signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let router = self.build_router();
        let listener = TcpListener::bind(self.config.bind_addr)
            .await
            .map_err(|e| {
                ServerError::config_error(format!(
                    "Failed to bind to {}: {}",
                    self.config.bind_addr, e
                ))
            })?;

        log::info!(
            "proxy server starting on {} with graceful shutdown",
            self.config.bind_addr
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ServerError::internal(format!("Server error: {}", e)))?;

        log::info!("proxy server shut down gracefully");
        Ok(())
    }
}

/// Utility function to create a shutdown signal from Ctrl+C / SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log::info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            log::info!("Received SIGTERM, shutting down...");
        },
    }
}
