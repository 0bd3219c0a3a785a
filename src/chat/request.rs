//! Inbound chat request bodies and file attachments.

use base64::Engine;
use bytes::Bytes;
use serde::Deserialize;

use crate::error::{ParleyError, Result};
use crate::types::{ImagePart, Part, Role, UiMessage};

/// JSON body of `POST /api/chat`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub messages: Vec<UiMessage>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub web_search: bool,
}

impl ChatRequest {
    /// Parse a JSON body; any shape error is the client's fault.
    pub fn from_json(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body)
            .map_err(|e| ParleyError::MalformedRequest(format!("invalid chat request: {e}")))
    }

    /// Parse the `messages` form field of a multipart request.
    pub fn messages_from_json(raw: &str) -> Result<Vec<UiMessage>> {
        serde_json::from_str(raw)
            .map_err(|e| ParleyError::MalformedRequest(format!("invalid messages field: {e}")))
    }
}

/// An uploaded file from a multipart chat request.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub media_type: String,
    pub bytes: Bytes,
}

impl Attachment {
    pub fn new(filename: impl Into<String>, media_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            media_type: media_type.into(),
            bytes: bytes.into(),
        }
    }

    fn is_text(&self) -> bool {
        self.media_type == "text/plain" || self.filename.ends_with(".txt")
    }

    fn is_image(&self) -> bool {
        self.media_type.starts_with("image/")
    }

    fn data_url(&self) -> String {
        let payload = base64::engine::general_purpose::STANDARD.encode(&self.bytes);
        format!("data:{};base64,{payload}", self.media_type)
    }
}

/// Fold uploaded files into the final user message.
///
/// Text files are appended as one framed text part, images become inline
/// image parts, and every `file` part is then dropped from that message.
/// Nothing happens unless the conversation ends with a user message.
pub fn absorb_attachments(messages: &mut [UiMessage], attachments: &[Attachment]) {
    let Some(last) = messages.last_mut() else {
        return;
    };
    if last.role != Role::User {
        return;
    }

    let mut additional = String::new();
    for file in attachments.iter().filter(|f| f.is_text()) {
        let content = String::from_utf8_lossy(&file.bytes);
        additional.push_str(&format!(
            "\n\n--- Content of {name} ---\n{content}\n--- End of {name} ---\n",
            name = file.filename
        ));
    }
    if !additional.is_empty() {
        last.parts.push(Part::text(additional));
    }

    for file in attachments.iter().filter(|f| f.is_image()) {
        last.parts.push(Part::Image(ImagePart {
            image: file.data_url(),
            media_type: Some(file.media_type.clone()),
        }));
    }

    last.parts.retain(|part| !matches!(part, Part::File(_)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FilePart;
    use pretty_assertions::assert_eq;

    fn user_with_file() -> UiMessage {
        let mut message = UiMessage::user_text("u1", "Summarize this");
        message.parts.push(Part::File(FilePart {
            media_type: "text/plain".into(),
            url: "blob:notes".into(),
            filename: Some("notes.txt".into()),
        }));
        message
    }

    #[test]
    fn parses_camel_case_body_with_defaults() {
        let request = ChatRequest::from_json(
            br#"{"messages":[{"id":"m1","role":"user","parts":[{"type":"text","text":"hi"}]}],"webSearch":true}"#,
        )
        .unwrap();
        assert!(request.web_search);
        assert_eq!(request.model, None);
        assert_eq!(request.messages[0].text(), "hi");
    }

    #[test]
    fn message_without_role_is_malformed() {
        let err = ChatRequest::from_json(br#"{"messages":[{"id":"m1","parts":[]}]}"#).unwrap_err();
        assert!(matches!(err, ParleyError::MalformedRequest(_)));
    }

    #[test]
    fn text_files_are_framed_and_file_parts_removed() {
        let mut messages = vec![user_with_file()];
        absorb_attachments(
            &mut messages,
            &[Attachment::new("notes.txt", "application/octet-stream", "line one")],
        );

        let parts = &messages[0].parts;
        assert_eq!(parts.len(), 2);
        assert_eq!(
            parts[1],
            Part::text("\n\n--- Content of notes.txt ---\nline one\n--- End of notes.txt ---\n")
        );
    }

    #[test]
    fn images_become_data_urls() {
        let mut messages = vec![UiMessage::user_text("u1", "What is this?")];
        absorb_attachments(
            &mut messages,
            &[Attachment::new("dot.png", "image/png", vec![1u8, 2, 3])],
        );

        match &messages[0].parts[1] {
            Part::Image(image) => assert_eq!(image.image, "data:image/png;base64,AQID"),
            other => panic!("unexpected part: {other:?}"),
        }
    }

    #[test]
    fn non_user_final_message_is_left_alone() {
        let mut assistant = user_with_file();
        assistant.role = Role::Assistant;
        let mut messages = vec![assistant.clone()];
        absorb_attachments(&mut messages, &[Attachment::new("a.txt", "text/plain", "x")]);
        assert_eq!(messages[0], assistant);
    }
}
