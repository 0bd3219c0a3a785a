//! Speech synthesis and image generation endpoints.

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use tracing::error;

use crate::server::error::ApiError;
use crate::server::state::AppState;

/// Pull a non-empty string field out of a JSON body.
fn string_field(body: &[u8], field: &str) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    value
        .get(field)?
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

async fn tts(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let text = string_field(&body, "text").ok_or_else(|| ApiError::bad_request("Text is required"))?;

    let audio = state.speech.synthesize(&text).await.map_err(|err| {
        error!(error = %err, "TTS error");
        ApiError::internal("Failed to generate speech")
    })?;

    let headers = [
        (header::CONTENT_TYPE, audio.media_type.clone()),
        (header::CONTENT_LENGTH, audio.bytes.len().to_string()),
    ];
    Ok((headers, Body::from(audio.bytes)).into_response())
}

async fn generate_image(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let prompt =
        string_field(&body, "prompt").ok_or_else(|| ApiError::bad_request("Prompt is required"))?;

    let image = state.images.generate(&prompt).await.map_err(|err| {
        error!(error = %err, "image generation error");
        ApiError::internal("Failed to generate image")
    })?;

    Ok(Json(image).into_response())
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/tts", post(tts))
        .route("/api/generate-image", post(generate_image))
        .with_state(state)
}
