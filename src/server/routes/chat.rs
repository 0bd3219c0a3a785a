//! `POST /api/chat`: JSON or multipart in, SSE frames out.

use axum::body::to_bytes;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header;
use axum::routing::post;
use axum::Router;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::chat::{absorb_attachments, Attachment, ChatRequest, FeatureFlags};
use crate::server::error::ApiError;
use crate::server::sse::SseResponse;
use crate::server::state::AppState;

const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

async fn handler(State(state): State<AppState>, request: Request) -> Result<SseResponse, ApiError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));

    let chat = if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        parse_multipart(multipart).await?
    } else {
        let body = to_bytes(request.into_body(), MAX_BODY_BYTES)
            .await
            .map_err(|e| ApiError::bad_request(format!("failed to read body: {e}")))?;
        ChatRequest::from_json(&body)?
    };

    let flags = FeatureFlags {
        web_search: chat.web_search,
    };
    let cancel = CancellationToken::new();
    let stream = state.orchestrator.handle_with_cancel(
        &chat.messages,
        chat.model.as_deref(),
        flags,
        cancel.clone(),
    )?;

    Ok(SseResponse::new(stream, Some(cancel.drop_guard())))
}

async fn parse_multipart(mut multipart: Multipart) -> Result<ChatRequest, ApiError> {
    let mut messages = None;
    let mut model = None;
    let mut web_search = false;
    let mut attachments = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "messages" => {
                let raw = field.text().await.map_err(|e| ApiError::bad_request(e.body_text()))?;
                messages = Some(ChatRequest::messages_from_json(&raw)?);
            }
            "model" => {
                model = Some(field.text().await.map_err(|e| ApiError::bad_request(e.body_text()))?);
            }
            "webSearch" => {
                web_search = field.text().await.map_err(|e| ApiError::bad_request(e.body_text()))? == "true";
            }
            "files" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let media_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(|e| ApiError::bad_request(e.body_text()))?;
                debug!(filename = %filename, media_type = %media_type, size = bytes.len(), "attachment received");
                attachments.push(Attachment::new(filename, media_type, bytes));
            }
            other => debug!(field = other, "ignoring unknown form field"),
        }
    }

    let mut messages =
        messages.ok_or_else(|| ApiError::bad_request("missing messages field"))?;
    absorb_attachments(&mut messages, &attachments);

    Ok(ChatRequest {
        messages,
        model: model.filter(|m| !m.is_empty()),
        web_search,
    })
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(handler))
        .with_state(state)
}
