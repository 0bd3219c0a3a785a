//! HTTP routes.

pub mod approvals;
pub mod chat;
pub mod media;
pub mod models;

use axum::Router;

use super::state::AppState;

/// All API routes under `/api`.
pub fn configure(state: AppState) -> Router {
    Router::new()
        .merge(chat::routes(state.clone()))
        .merge(approvals::routes(state.clone()))
        .merge(media::routes(state))
        .merge(models::routes())
}
