//! HTTP service (feature `server`).
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | GET    | `/health` | [`handlers::health`] |
//! | POST   | `/process_document` | [`handlers::process_document`] |
//! | GET    | `/download/{filename}` | [`handlers::download`] |
//! | GET    | `/download/{batch_id}/{filename}` | [`handlers::download_batch`] |
//! | DELETE | `/split_documents` | [`handlers::cleanup`] |
//!
//! Any other GET is served from the static frontend directory when one is
//! configured, falling back to its `index.html` for client-side routes.

pub mod error;
pub mod handlers;

use crate::config::ProcessConfig;
use crate::error::DocSplitError;
use crate::process::resolve_classifier;
use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::ApiError;

/// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Shared, immutable state for every request.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Config with the classifier already resolved.
    pub config: ProcessConfig,
    /// Built frontend to serve at `/`, if any.
    pub static_dir: Option<PathBuf>,
}

impl AppState {
    /// Resolve the classifier once so a missing API key fails at start-up.
    pub fn new(mut config: ProcessConfig) -> Result<Self, DocSplitError> {
        let classifier = resolve_classifier(&config)?;
        config.classifier = Some(classifier);
        Ok(Self {
            config,
            static_dir: None,
        })
    }

    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(dir.into());
        self
    }
}

/// Build the router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let max_body_size = state
        .config
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD);

    let mut app = Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/process_document",
            post(handlers::process_document).layer(DefaultBodyLimit::max(max_body_size)),
        )
        .route("/download/{filename}", get(handlers::download))
        .route(
            "/download/{batch_id}/{filename}",
            get(handlers::download_batch),
        )
        .route("/split_documents", delete(handlers::cleanup));

    if let Some(ref dir) = state.static_dir {
        let spa = ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html")));
        app = app.fallback_service(spa);
    }

    app.layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutting down");
    }
}
