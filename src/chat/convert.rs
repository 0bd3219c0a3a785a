//! Conversion of client transcripts into provider messages.

use crate::stream::tool_result;
use crate::types::{ContentPart, ModelMessage, ModelRole, Part, Role, ToolCall, UiMessage};

/// Convert a client transcript into provider-facing messages.
///
/// Reasoning and source parts are dropped. Terminal tool parts become an
/// assistant tool call followed by a tool result message; tool parts that
/// never finished are dropped.
pub fn to_model_messages(messages: &[UiMessage]) -> Vec<ModelMessage> {
    let mut out = Vec::with_capacity(messages.len());
    for message in messages {
        match message.role {
            Role::System => {
                let text = message.text();
                if !text.is_empty() {
                    out.push(ModelMessage::system(text));
                }
            }
            Role::User => {
                let content: Vec<ContentPart> =
                    message.parts.iter().filter_map(user_content).collect();
                if !content.is_empty() {
                    out.push(ModelMessage {
                        role: ModelRole::User,
                        content,
                    });
                }
            }
            Role::Assistant => out.extend(assistant_messages(message)),
        }
    }
    out
}

fn user_content(part: &Part) -> Option<ContentPart> {
    match part {
        Part::Text(t) => Some(ContentPart::Text {
            text: t.text.clone(),
        }),
        Part::Image(image) => Some(ContentPart::Image {
            url: image.image.clone(),
        }),
        Part::File(file) if file.media_type.starts_with("image/") => Some(ContentPart::Image {
            url: file.url.clone(),
        }),
        Part::File(file) => Some(ContentPart::File {
            url: file.url.clone(),
            media_type: file.media_type.clone(),
            filename: file.filename.clone(),
        }),
        Part::Reasoning(_) | Part::SourceUrl(_) | Part::Tool(_) => None,
    }
}

fn assistant_messages(message: &UiMessage) -> Vec<ModelMessage> {
    let mut content = Vec::new();
    let mut results = Vec::new();

    for part in &message.parts {
        match part {
            Part::Text(t) if !t.text.is_empty() => match content.last_mut() {
                Some(ContentPart::Text { text }) => text.push_str(&t.text),
                _ => content.push(ContentPart::Text {
                    text: t.text.clone(),
                }),
            },
            Part::Tool(invocation) if invocation.is_terminal() => {
                content.push(ContentPart::ToolCall(ToolCall {
                    id: invocation.tool_call_id.clone(),
                    name: invocation.tool_name.clone(),
                    arguments: invocation
                        .state
                        .input()
                        .cloned()
                        .unwrap_or_else(|| serde_json::json!({})),
                }));
                results.push(ModelMessage::tool_result(tool_result(invocation)));
            }
            _ => {}
        }
    }

    if content.is_empty() {
        return Vec::new();
    }
    let mut messages = vec![ModelMessage {
        role: ModelRole::Assistant,
        content,
    }];
    messages.extend(results);
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::{ToolInvocation, ToolInvocationState};
    use crate::types::{ImagePart, SourceUrlPart};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn user_images_and_text_pass_through() {
        let mut user = UiMessage::user_text("u1", "Look");
        user.parts.push(Part::Image(ImagePart {
            image: "data:image/png;base64,AA==".into(),
            media_type: Some("image/png".into()),
        }));

        let converted = to_model_messages(&[user]);
        assert_eq!(
            converted,
            vec![ModelMessage {
                role: ModelRole::User,
                content: vec![
                    ContentPart::Text {
                        text: "Look".into()
                    },
                    ContentPart::Image {
                        url: "data:image/png;base64,AA==".into()
                    },
                ],
            }]
        );
    }

    #[test]
    fn finished_tool_parts_become_call_and_result() {
        let mut assistant = UiMessage::new("a1", Role::Assistant);
        assistant.parts.push(Part::reasoning("thinking"));
        assistant.parts.push(Part::Tool(ToolInvocation {
            tool_name: "getWeather".into(),
            tool_call_id: "call_1".into(),
            state: ToolInvocationState::OutputAvailable {
                input: json!({"location": "Paris"}),
                output: json!({"temperature": "18°C"}),
                approval: None,
            },
        }));
        assistant.parts.push(Part::text("It is 18°C."));
        assistant.parts.push(Part::SourceUrl(SourceUrlPart {
            source_id: "source-0".into(),
            url: "https://example.com".into(),
            title: None,
        }));

        let converted = to_model_messages(&[assistant]);
        assert_eq!(converted.len(), 2);
        assert_eq!(converted[0].tool_calls()[0].name, "getWeather");
        assert_eq!(converted[0].text(), "It is 18°C.");
        assert_eq!(converted[1].role, ModelRole::Tool);
    }

    #[test]
    fn unfinished_tool_parts_are_dropped() {
        let mut assistant = UiMessage::new("a1", Role::Assistant);
        assistant
            .parts
            .push(Part::Tool(ToolInvocation::new("call_1", "askForConfirmation")));
        assert!(to_model_messages(&[assistant]).is_empty());
    }
}
