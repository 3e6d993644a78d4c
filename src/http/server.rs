//! Router assembly and serve loop.

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use super::handler::{self, AppState};

/// Build the gateway router. Split out from [`HttpServer`] so tests can
/// drive handlers without binding a socket.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handler::index_handler))
        .route("/ask", get(handler::ask_handler))
        .route("/reset", post(handler::reset_handler))
        .route("/schema", get(handler::schema_handler))
        .route("/health", get(handler::health_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// HTTP server for the question-answering API.
pub struct HttpServer {
    state: Arc<AppState>,
    bind_addr: String,
    port: u16,
}

impl HttpServer {
    pub fn new(state: Arc<AppState>, bind_addr: String, port: u16) -> Self {
        Self { state, bind_addr, port }
    }

    /// Bind and serve until the process is stopped.
    pub async fn start(&self) -> std::io::Result<()> {
        let app = router(Arc::clone(&self.state));
        let addr = format!("{}:{}", self.bind_addr, self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        info!("gateway listening on http://{}", addr);

        axum::serve(listener, app).await
    }
}
