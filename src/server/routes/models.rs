//! `GET /api/models`: the selectable model catalog.

use axum::routing::get;
use axum::{Json, Router};

use crate::models::{catalog, ModelInfo};

async fn list() -> Json<Vec<ModelInfo>> {
    Json(catalog())
}

pub fn routes() -> Router {
    Router::new().route("/api/models", get(list))
}
