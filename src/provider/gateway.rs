//! OpenAI-compatible chat completions through the AI gateway.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{ParleyError, Result};
use crate::types::*;

use super::http::{bearer_headers, parse_sse_data, shared_client, status_to_error, trim_trailing_slash};
use super::{ModelProvider, ModelRequest};

pub const DEFAULT_BASE_URL: &str = "https://ai-gateway.vercel.sh/v1";

/// Streams chat completions from any OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct GatewayProvider {
    api_key: String,
    base_url: String,
}

impl GatewayProvider {
    pub fn new(api_key: impl Into<String>, base_url: Option<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }

    fn build_request_body(&self, request: &ModelRequest) -> Value {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.extend(request.messages.iter().map(message_to_openai));

        let mut body = json!({
            "model": request.model,
            "messages": messages,
            "stream": true,
            "stream_options": { "include_usage": true },
        });

        if let Some(obj) = body.as_object_mut() {
            if let Some(max) = request.settings.max_tokens {
                obj.insert("max_tokens".into(), max.into());
            }
            if let Some(temp) = request.settings.temperature {
                obj.insert("temperature".into(), temp.into());
            }
            if let Some(top_p) = request.settings.top_p {
                obj.insert("top_p".into(), top_p.into());
            }
            if let Some(ref user) = request.settings.user {
                obj.insert("user".into(), user.clone().into());
            }
            if !request.tools.is_empty() {
                let tool_defs: Vec<Value> = request
                    .tools
                    .iter()
                    .map(|t| {
                        json!({
                            "type": "function",
                            "function": {
                                "name": t.name,
                                "description": t.description,
                                "parameters": t.parameters,
                            }
                        })
                    })
                    .collect();
                obj.insert("tools".into(), tool_defs.into());
            }
        }

        body
    }
}

#[async_trait]
impl ModelProvider for GatewayProvider {
    fn provider_name(&self) -> &str {
        "gateway"
    }

    async fn stream(
        &self,
        request: &ModelRequest,
    ) -> Result<BoxStream<'static, Result<ModelStreamEvent>>> {
        let body = self.build_request_body(request);
        let url = format!("{}/chat/completions", trim_trailing_slash(&self.base_url));

        debug!(model = %request.model, tools = request.tools.len(), "gateway stream");

        let resp = shared_client()
            .post(&url)
            .headers(bearer_headers(&self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }

        let byte_stream = resp.bytes_stream();

        let stream = async_stream::stream! {
            let mut buffer = String::new();
            let mut state = StreamState::default();
            futures::pin_mut!(byte_stream);

            while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(ParleyError::Network(e));
                        return;
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim().to_string();
                    buffer.drain(..=line_end);

                    if line.is_empty() || line.starts_with(':') {
                        continue;
                    }

                    let Some(data) = parse_sse_data(&line) else { continue };
                    if let Some(message) = stream_error_message(data) {
                        yield Err(ParleyError::upstream("gateway", message));
                        return;
                    }
                    let Ok(parsed) = serde_json::from_str::<StreamChunk>(data) else {
                        continue;
                    };
                    for event in state.absorb(parsed) {
                        yield Ok(event);
                    }
                }
            }

            for event in state.finish() {
                yield Ok(event);
            }
        };

        Ok(Box::pin(stream))
    }
}

#[derive(Default)]
struct PendingToolCall {
    id: Option<String>,
    name: Option<String>,
    started: bool,
    ended: bool,
    buffered_args: String,
}

/// Accumulates per-stream state: tool call fragments by index, seen
/// citations, the finish reason, and usage.
#[derive(Default)]
struct StreamState {
    tool_calls: BTreeMap<u32, PendingToolCall>,
    seen_sources: HashSet<String>,
    saw_tool_call: bool,
    finish_reason: Option<FinishReason>,
    usage: Option<Usage>,
}

impl StreamState {
    fn absorb(&mut self, chunk: StreamChunk) -> Vec<ModelStreamEvent> {
        let mut events = Vec::new();

        for url in chunk.citations.unwrap_or_default() {
            self.source(url, None, &mut events);
        }
        if let Some(usage) = chunk.usage {
            self.usage = Some(usage.into());
        }

        let Some(choice) = chunk.choices.into_iter().next() else {
            return events;
        };
        let delta = choice.delta;

        if let Some(reasoning) = delta.reasoning.or(delta.reasoning_content) {
            if !reasoning.is_empty() {
                events.push(ModelStreamEvent::ReasoningDelta { text: reasoning });
            }
        }
        if let Some(text) = delta.content {
            if !text.is_empty() {
                events.push(ModelStreamEvent::TextDelta { text });
            }
        }
        for annotation in delta.annotations.unwrap_or_default() {
            if let Some(citation) = annotation.url_citation {
                self.source(citation.url, citation.title, &mut events);
            }
        }
        for call in delta.tool_calls.unwrap_or_default() {
            // Calls arrive in index order, so a fragment for a later index
            // means every earlier call has all of its arguments.
            self.close_calls(|index| index < call.index, &mut events);
            let pending = self.tool_calls.entry(call.index).or_default();
            if pending.id.is_none() {
                pending.id = call.id;
            }
            if let Some(function) = call.function {
                if pending.name.is_none() {
                    pending.name = function.name;
                }
                if let Some(args) = function.arguments {
                    pending.buffered_args.push_str(&args);
                }
            }
            if let (false, Some(id), Some(name)) = (pending.started, &pending.id, &pending.name) {
                events.push(ModelStreamEvent::ToolInputStart {
                    id: id.clone(),
                    name: name.clone(),
                });
                pending.started = true;
                self.saw_tool_call = true;
            }
            if pending.started && !pending.buffered_args.is_empty() {
                if let Some(id) = &pending.id {
                    events.push(ModelStreamEvent::ToolInputDelta {
                        id: id.clone(),
                        delta: std::mem::take(&mut pending.buffered_args),
                    });
                }
            }
        }
        if let Some(reason) = choice.finish_reason {
            self.close_calls(|_| true, &mut events);
            self.finish_reason = Some(FinishReason::from_provider(&reason));
        }

        events
    }

    fn close_calls(&mut self, mut select: impl FnMut(u32) -> bool, events: &mut Vec<ModelStreamEvent>) {
        for (index, call) in self.tool_calls.iter_mut() {
            if call.ended || !call.started || !select(*index) {
                continue;
            }
            if let Some(id) = &call.id {
                events.push(ModelStreamEvent::ToolInputEnd { id: id.clone() });
                call.ended = true;
            }
        }
    }

    fn source(&mut self, url: String, title: Option<String>, events: &mut Vec<ModelStreamEvent>) {
        if self.seen_sources.insert(url.clone()) {
            events.push(ModelStreamEvent::Source { url, title });
        }
    }

    fn finish(mut self) -> Vec<ModelStreamEvent> {
        let mut events = Vec::new();
        self.close_calls(|_| true, &mut events);
        let reason = if self.saw_tool_call {
            FinishReason::ToolCalls
        } else {
            self.finish_reason.unwrap_or(FinishReason::Stop)
        };
        events.push(ModelStreamEvent::Finish {
            reason,
            usage: self.usage,
        });
        events
    }
}

fn stream_error_message(data: &str) -> Option<String> {
    let value: Value = serde_json::from_str(data).ok()?;
    let error = value.get("error").filter(|e| !e.is_null())?;
    Some(
        error
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string()),
    )
}

fn message_to_openai(msg: &ModelMessage) -> Value {
    let role = match msg.role {
        ModelRole::System => "system",
        ModelRole::User => "user",
        ModelRole::Assistant => "assistant",
        ModelRole::Tool => "tool",
    };

    if let [ContentPart::ToolResult(tr)] = msg.content.as_slice() {
        return json!({
            "role": "tool",
            "tool_call_id": tr.tool_call_id,
            "content": tr.result.to_string(),
        });
    }

    let tool_calls = msg.tool_calls();
    if !tool_calls.is_empty() {
        let tc_json: Vec<Value> = tool_calls
            .iter()
            .map(|tc| {
                json!({
                    "id": tc.id,
                    "type": "function",
                    "function": {
                        "name": tc.name,
                        "arguments": tc.arguments.to_string(),
                    }
                })
            })
            .collect();
        let text = msg.text();
        return json!({
            "role": role,
            "content": if text.is_empty() { Value::Null } else { Value::String(text) },
            "tool_calls": tc_json,
        });
    }

    if let [ContentPart::Text { text }] = msg.content.as_slice() {
        return json!({ "role": role, "content": text });
    }

    let parts: Vec<Value> = msg
        .content
        .iter()
        .filter_map(|part| match part {
            ContentPart::Text { text } => Some(json!({ "type": "text", "text": text })),
            ContentPart::Image { url } => Some(json!({
                "type": "image_url",
                "image_url": { "url": url },
            })),
            ContentPart::File {
                url,
                media_type,
                filename,
            } => Some(json!({
                "type": "file",
                "file": {
                    "file_data": url,
                    "filename": filename,
                    "media_type": media_type,
                },
            })),
            ContentPart::ToolCall(_) | ContentPart::ToolResult(_) => None,
        })
        .collect();

    json!({ "role": role, "content": parts })
}

// Chat completions stream types (internal)

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    usage: Option<ApiUsage>,
    citations: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    content: Option<String>,
    reasoning: Option<String>,
    reasoning_content: Option<String>,
    tool_calls: Option<Vec<ToolCallDelta>>,
    annotations: Option<Vec<Annotation>>,
}

#[derive(Deserialize)]
struct ToolCallDelta {
    #[serde(default)]
    index: u32,
    id: Option<String>,
    function: Option<FunctionDelta>,
}

#[derive(Deserialize)]
struct FunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Deserialize)]
struct Annotation {
    url_citation: Option<UrlCitation>,
}

#[derive(Deserialize)]
struct UrlCitation {
    url: String,
    title: Option<String>,
}

#[derive(Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
    completion_tokens_details: Option<CompletionTokensDetails>,
}

#[derive(Deserialize)]
struct CompletionTokensDetails {
    reasoning_tokens: Option<u32>,
}

impl From<ApiUsage> for Usage {
    fn from(u: ApiUsage) -> Self {
        Usage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
            reasoning_tokens: u.completion_tokens_details.and_then(|d| d.reasoning_tokens),
        }
    }
}
