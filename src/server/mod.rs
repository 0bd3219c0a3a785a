//! HTTP server: axum router, SSE responses, and shared state.

pub mod error;
pub mod routes;
pub mod sse;
pub mod state;

pub use error::ApiError;
pub use sse::SseResponse;
pub use state::AppState;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ParleyConfig;
use crate::error::Result;

/// The full application router with CORS and request tracing.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    routes::configure(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve until the process is stopped.
pub async fn serve(config: &ParleyConfig) -> Result<()> {
    let state = AppState::from_config(config)?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    info!(addr = %listener.local_addr()?, "parley listening");
    axum::serve(listener, app).await?;
    Ok(())
}
