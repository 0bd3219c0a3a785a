//! HTTP surface tests driven through the router with `tower::ServiceExt`.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use futures::StreamExt;
use http_body_util::BodyExt;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::*;
use parley::protocol::{MessageAssembler, STREAM_PROTOCOL_HEADER};
use parley::server::{router, AppState};
use parley::types::{ContentPart, FinishReason};

struct Harness {
    app: Router,
    provider: Arc<ScriptedProvider>,
}

fn harness(scripts: Vec<Script>, failing_media: bool) -> Harness {
    let provider = ScriptedProvider::new(scripts);
    let state = AppState::new(
        orchestrator(provider.clone(), settings(), false),
        Arc::new(FakeImages {
            fail: failing_media,
        }),
        Arc::new(FakeSpeech {
            fail: failing_media,
        }),
    );
    Harness {
        app: router(state),
        provider,
    }
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn chat_body(text: &str) -> Value {
    json!({
        "messages": [
            {"id": "u1", "role": "user", "parts": [{"type": "text", "text": text}]}
        ]
    })
}

#[tokio::test]
async fn chat_streams_sse_frames_with_protocol_headers() {
    let h = harness(vec![text_step(&["Hello", " there"])], false);

    let response = h
        .app
        .oneshot(post_json("/api/chat", chat_body("hi")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "text/event-stream");
    assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
    assert_eq!(headers[STREAM_PROTOCOL_HEADER], "v1");

    let body = body_bytes(response).await;
    assert!(body.ends_with(b"data: [DONE]\n\n"));
    let assembler = MessageAssembler::from_sse(&body).unwrap();
    assert_eq!(assembler.message().text(), "Hello there");
    assert_eq!(assembler.finish_reason(), Some(FinishReason::Stop));
}

#[tokio::test]
async fn chat_honours_model_and_web_search_fields() {
    let h = harness(vec![text_step(&["ok"]), text_step(&["ok"])], false);

    let mut body = chat_body("hi");
    body["model"] = json!("xai/grok-3");
    let response = h.app.clone().oneshot(post_json("/api/chat", body)).await.unwrap();
    body_bytes(response).await;

    let mut body = chat_body("news?");
    body["model"] = json!("xai/grok-3");
    body["webSearch"] = json!(true);
    let response = h.app.oneshot(post_json("/api/chat", body)).await.unwrap();
    body_bytes(response).await;

    let requests = h.provider.requests();
    assert_eq!(requests[0].model, "xai/grok-3");
    assert_eq!(requests[1].model, "perplexity/sonar");
}

#[tokio::test]
async fn malformed_chat_bodies_are_rejected_with_400() {
    let h = harness(vec![], false);

    for body in [
        json!({"messages": []}),
        json!({"messages": "nope"}),
        json!({"model": "openai/gpt-4o"}),
        json!({"messages": [{"id": "u1", "role": "user", "parts": []}]}),
    ] {
        let response = h
            .app
            .clone()
            .oneshot(post_json("/api/chat", body.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {body}");
        let json = body_json(response).await;
        assert!(json["error"].is_string());
    }

    let response = h
        .app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/chat")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{ not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(h.provider.requests().is_empty());
}

#[tokio::test]
async fn multipart_chat_inlines_text_files_and_attaches_images() {
    let h = harness(vec![text_step(&["Got them."])], false);

    let boundary = "parleyboundary";
    let messages = chat_body("Summarise these")["messages"].to_string();
    let body = format!(
        "--{b}\r\n\
         Content-Disposition: form-data; name=\"messages\"\r\n\r\n\
         {messages}\r\n\
         --{b}\r\n\
         Content-Disposition: form-data; name=\"model\"\r\n\r\n\
         anthropic/claude-3.5-sonnet\r\n\
         --{b}\r\n\
         Content-Disposition: form-data; name=\"files\"; filename=\"notes.txt\"\r\n\
         Content-Type: text/plain\r\n\r\n\
         buy milk\r\n\
         --{b}\r\n\
         Content-Disposition: form-data; name=\"files\"; filename=\"dot.png\"\r\n\
         Content-Type: image/png\r\n\r\n\
         PNG\r\n\
         --{b}--\r\n",
        b = boundary
    );

    let response = h
        .app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/chat")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_bytes(response).await;

    let request = &h.provider.requests()[0];
    assert_eq!(request.model, "anthropic/claude-3.5-sonnet");
    let content = &request.messages.last().unwrap().content;
    assert!(content.iter().any(|part| matches!(
        part,
        ContentPart::Text { text } if text.contains("--- Content of notes.txt ---\nbuy milk")
    )));
    assert!(content.iter().any(|part| matches!(
        part,
        ContentPart::Image { url } if url == "data:image/png;base64,UE5H"
    )));
}

#[tokio::test]
async fn unknown_approval_is_404() {
    let h = harness(vec![], false);

    let response = h
        .app
        .oneshot(post_json(
            "/api/approvals/appr_missing",
            json!({"approved": true}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(response).await,
        json!({"error": "Unknown or expired approval"})
    );
}

#[tokio::test]
async fn approval_endpoint_resolves_a_pending_confirmation() {
    let h = harness(
        vec![
            tool_step("call_c", "askForConfirmation", r#"{"message":"Proceed?"}"#),
            text_step(&["Done."]),
        ],
        false,
    );

    let response = h
        .app
        .clone()
        .oneshot(post_json("/api/chat", chat_body("please confirm")))
        .await
        .unwrap();
    let mut body = response.into_body().into_data_stream();

    let mut seen = Vec::new();
    let approval_id = loop {
        let bytes = tokio::time::timeout(std::time::Duration::from_secs(5), body.next())
            .await
            .expect("no approval request")
            .expect("body ended early")
            .unwrap();
        seen.extend_from_slice(&bytes);
        let text = String::from_utf8_lossy(&seen).to_string();
        if let Some(start) = text.find("\"approvalId\":\"") {
            let rest = &text[start + 14..];
            if let Some(end) = rest.find('"') {
                break rest[..end].to_string();
            }
        }
    };

    let decision = h
        .app
        .oneshot(post_json(
            &format!("/api/approvals/{approval_id}"),
            json!({"approved": false, "reason": "changed my mind"}),
        ))
        .await
        .unwrap();
    assert_eq!(decision.status(), StatusCode::OK);
    assert_eq!(
        body_json(decision).await,
        json!({"approvalId": approval_id, "toolCallId": "call_c", "approved": false})
    );

    let rest = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        StreamExt::collect::<Vec<_>>(body),
    )
        .await
        .unwrap();
    for bytes in rest {
        seen.extend_from_slice(&bytes.unwrap());
    }
    let message = MessageAssembler::from_sse(&seen).unwrap().into_message();
    assert_eq!(
        message.tool_invocation("call_c").unwrap().kind(),
        parley::invocation::ToolStateKind::Rejected
    );
}

#[tokio::test]
async fn tts_requires_text() {
    let h = harness(vec![], false);

    for body in [json!({}), json!({"text": ""}), json!({"text": 42})] {
        let response = h.app.clone().oneshot(post_json("/api/tts", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({"error": "Text is required"}));
    }
}

#[tokio::test]
async fn tts_returns_audio_with_length() {
    let h = harness(vec![], false);

    let response = h
        .app
        .oneshot(post_json("/api/tts", json!({"text": "hello"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/wav");
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "9");
    assert_eq!(body_bytes(response).await, b"RIFFhello".to_vec());
}

#[tokio::test]
async fn tts_failure_is_500() {
    let h = harness(vec![], true);

    let response = h
        .app
        .oneshot(post_json("/api/tts", json!({"text": "hello"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await,
        json!({"error": "Failed to generate speech"})
    );
}

#[tokio::test]
async fn image_endpoint_validates_and_generates() {
    let h = harness(vec![], false);

    let missing = h
        .app
        .clone()
        .oneshot(post_json("/api/generate-image", json!({"prompt": "  "})))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(missing).await, json!({"error": "Prompt is required"}));

    let ok = h
        .app
        .oneshot(post_json("/api/generate-image", json!({"prompt": "a cat"})))
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);
    assert_eq!(
        body_json(ok).await,
        json!({"url": "https://images.example/5.png", "mediaType": "image/png"})
    );
}

#[tokio::test]
async fn image_failure_is_500() {
    let h = harness(vec![], true);

    let response = h
        .app
        .oneshot(post_json("/api/generate-image", json!({"prompt": "a cat"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await,
        json!({"error": "Failed to generate image"})
    );
}

#[tokio::test]
async fn models_endpoint_lists_the_catalog() {
    let h = harness(vec![], false);

    let response = h
        .app
        .oneshot(
            Request::builder()
                .uri("/api/models")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let models = body_json(response).await;
    let values: Vec<&str> = models
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["value"].as_str().unwrap())
        .collect();
    assert!(values.contains(&"openai/gpt-4o"));
    assert!(values.contains(&"perplexity/sonar"));
}
