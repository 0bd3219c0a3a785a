//! Client-facing message model: a message is an ordered list of typed parts.

use serde::de::Error as _;
use serde::ser::{Error as _, SerializeMap};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum::{Display, EnumString};

use crate::invocation::state::ToolInvocation;

/// Conversation role of a UI message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One turn of a conversation as the client sees it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UiMessage {
    #[serde(default)]
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl UiMessage {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
            parts: Vec::new(),
        }
    }

    /// A user message holding a single text part.
    pub fn user_text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::User,
            parts: vec![Part::text(text)],
        }
    }

    /// Concatenate every text part.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text(t) => Some(t.text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Iterate over the tool invocations of this message in emission order.
    pub fn tool_invocations(&self) -> impl Iterator<Item = &ToolInvocation> {
        self.parts.iter().filter_map(|part| match part {
            Part::Tool(inv) => Some(inv),
            _ => None,
        })
    }

    /// Find a tool invocation by its call identifier.
    pub fn tool_invocation(&self, tool_call_id: &str) -> Option<&ToolInvocation> {
        self.tool_invocations()
            .find(|inv| inv.tool_call_id == tool_call_id)
    }

    /// Iterate over the source citations of this message.
    pub fn sources(&self) -> impl Iterator<Item = &SourceUrlPart> {
        self.parts.iter().filter_map(|part| match part {
            Part::SourceUrl(s) => Some(s),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextPart {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReasoningPart {
    pub text: String,
}

/// A citation attached to a search-augmented answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceUrlPart {
    pub source_id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// A media reference, either a remote URL or a `data:` URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FilePart {
    pub media_type: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// An inline image, usually a `data:image/...;base64,` URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImagePart {
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

/// One typed fragment of a message.
///
/// On the wire every part is an object tagged by `type`; tool parts use
/// `tool-<toolName>` and carry their invocation state inline.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(TextPart),
    Reasoning(ReasoningPart),
    SourceUrl(SourceUrlPart),
    File(FilePart),
    Image(ImagePart),
    Tool(ToolInvocation),
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(TextPart { text: text.into() })
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        Self::Reasoning(ReasoningPart { text: text.into() })
    }

    /// The wire `type` tag of this part.
    pub fn type_tag(&self) -> String {
        match self {
            Self::Text(_) => "text".to_string(),
            Self::Reasoning(_) => "reasoning".to_string(),
            Self::SourceUrl(_) => "source-url".to_string(),
            Self::File(_) => "file".to_string(),
            Self::Image(_) => "image".to_string(),
            Self::Tool(inv) => format!("{TOOL_PART_PREFIX}{}", inv.tool_name),
        }
    }
}

const TOOL_PART_PREFIX: &str = "tool-";

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum StaticPartRef<'a> {
    Text(&'a TextPart),
    Reasoning(&'a ReasoningPart),
    SourceUrl(&'a SourceUrlPart),
    File(&'a FilePart),
    Image(&'a ImagePart),
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum StaticPart {
    Text(TextPart),
    Reasoning(ReasoningPart),
    SourceUrl(SourceUrlPart),
    File(FilePart),
    Image(ImagePart),
}

impl Serialize for Part {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let plain = match self {
            Self::Text(p) => StaticPartRef::Text(p),
            Self::Reasoning(p) => StaticPartRef::Reasoning(p),
            Self::SourceUrl(p) => StaticPartRef::SourceUrl(p),
            Self::File(p) => StaticPartRef::File(p),
            Self::Image(p) => StaticPartRef::Image(p),
            Self::Tool(inv) => {
                let state = serde_json::to_value(&inv.state).map_err(S::Error::custom)?;
                let mut map = serializer.serialize_map(None)?;
                map.serialize_entry("type", &self.type_tag())?;
                map.serialize_entry("toolCallId", &inv.tool_call_id)?;
                if let serde_json::Value::Object(fields) = state {
                    for (key, value) in &fields {
                        map.serialize_entry(key, value)?;
                    }
                }
                return map.end();
            }
        };
        plain.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Part {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        let type_tag = value
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| D::Error::missing_field("type"))?;

        if let Some(tool_name) = type_tag.strip_prefix(TOOL_PART_PREFIX) {
            let tool_call_id = value
                .get("toolCallId")
                .and_then(|v| v.as_str())
                .ok_or_else(|| D::Error::missing_field("toolCallId"))?
                .to_string();
            let state = serde_json::from_value(value.clone()).map_err(D::Error::custom)?;
            return Ok(Self::Tool(ToolInvocation {
                tool_name: tool_name.to_string(),
                tool_call_id,
                state,
            }));
        }

        let part = serde_json::from_value::<StaticPart>(value).map_err(D::Error::custom)?;
        Ok(match part {
            StaticPart::Text(p) => Self::Text(p),
            StaticPart::Reasoning(p) => Self::Reasoning(p),
            StaticPart::SourceUrl(p) => Self::SourceUrl(p),
            StaticPart::File(p) => Self::File(p),
            StaticPart::Image(p) => Self::Image(p),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::state::ToolInvocationState;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn text_part_round_trips_through_type_tag() {
        let part: Part = serde_json::from_value(json!({"type": "text", "text": "hi"})).unwrap();
        assert_eq!(part, Part::text("hi"));
        assert_eq!(serde_json::to_value(&part).unwrap(), json!({"type": "text", "text": "hi"}));
    }

    #[test]
    fn tool_part_flattens_state_into_the_part_object() {
        let part = Part::Tool(ToolInvocation {
            tool_name: "getWeather".into(),
            tool_call_id: "call_1".into(),
            state: ToolInvocationState::OutputAvailable {
                input: json!({"location": "Paris"}),
                output: json!({"conditions": "Clear sky"}),
                approval: None,
            },
        });

        let value = serde_json::to_value(&part).unwrap();
        assert_eq!(value["type"], "tool-getWeather");
        assert_eq!(value["toolCallId"], "call_1");
        assert_eq!(value["state"], "output-available");
        assert_eq!(value["output"]["conditions"], "Clear sky");

        let back: Part = serde_json::from_value(value).unwrap();
        assert_eq!(back, part);
    }

    #[test]
    fn source_url_uses_camel_case_fields() {
        let part: Part = serde_json::from_value(json!({
            "type": "source-url",
            "sourceId": "src_1",
            "url": "https://example.com",
        }))
        .unwrap();
        match part {
            Part::SourceUrl(source) => {
                assert_eq!(source.source_id, "src_1");
                assert_eq!(source.title, None);
            }
            other => panic!("unexpected part: {other:?}"),
        }
    }

    #[test]
    fn unknown_part_type_is_rejected() {
        let result = serde_json::from_value::<Part>(json!({"type": "hologram"}));
        assert!(result.is_err());
    }

    #[test]
    fn message_helpers_collect_text_and_tools() {
        let mut message = UiMessage::new("m1", Role::Assistant);
        message.parts.push(Part::text("Hello "));
        message.parts.push(Part::Tool(ToolInvocation::new("call_9", "generateImage")));
        message.parts.push(Part::text("world"));

        assert_eq!(message.text(), "Hello world");
        assert!(message.tool_invocation("call_9").is_some());
        assert_eq!(message.tool_invocations().count(), 1);
    }
}
