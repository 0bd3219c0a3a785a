//! Server-Sent Events framing for UI chunks.

use bytes::Bytes;

use super::chunk::UiChunk;
use crate::error::Result;

/// Header announcing the stream protocol version to clients.
pub const STREAM_PROTOCOL_HEADER: &str = "x-vercel-ai-ui-message-stream";
pub const STREAM_PROTOCOL_VERSION: &str = "v1";

const DONE_MARKER: &str = "[DONE]";

/// Encode one chunk as an SSE `data:` frame.
pub fn encode_sse(chunk: &UiChunk) -> Result<Bytes> {
    let json = serde_json::to_string(chunk)?;
    Ok(Bytes::from(format!("data: {json}\n\n")))
}

/// The frame that terminates the stream.
pub fn done_frame() -> Bytes {
    Bytes::from(format!("data: {DONE_MARKER}\n\n"))
}

/// What one SSE event decoded to.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Chunk(UiChunk),
    Done,
}

/// Incremental SSE parser: feed arbitrary byte slices, get whole frames.
#[derive(Debug, Default)]
pub struct FrameParser {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume bytes and return every frame they complete.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(bytes);
        let mut frames = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if let Some(frame) = self.dispatch()? {
                    frames.push(frame);
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }
            if let Some(data) = line.strip_prefix("data:") {
                self.data.push(data.strip_prefix(' ').unwrap_or(data).to_string());
            }
        }

        Ok(frames)
    }

    /// Flush a trailing event that was not followed by a blank line.
    pub fn finish(&mut self) -> Result<Option<Frame>> {
        self.dispatch()
    }

    fn dispatch(&mut self) -> Result<Option<Frame>> {
        if self.data.is_empty() {
            return Ok(None);
        }
        let payload = std::mem::take(&mut self.data).join("\n");
        if payload == DONE_MARKER {
            return Ok(Some(Frame::Done));
        }
        Ok(Some(Frame::Chunk(serde_json::from_str(&payload)?)))
    }
}

/// Parse a complete SSE body into chunks, stopping at the done marker.
pub fn parse_sse_body(body: &[u8]) -> Result<Vec<UiChunk>> {
    let mut parser = FrameParser::new();
    let mut frames = parser.push(body)?;
    frames.extend(parser.finish()?);

    let mut chunks = Vec::new();
    for frame in frames {
        match frame {
            Frame::Chunk(chunk) => chunks.push(chunk),
            Frame::Done => break,
        }
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(delta: &str, offset: usize) -> UiChunk {
        UiChunk::TextDelta {
            id: "t0".into(),
            delta: delta.into(),
            offset,
        }
    }

    #[test]
    fn encoded_frame_is_a_data_line_and_blank_line() {
        let bytes = encode_sse(&UiChunk::StartStep).unwrap();
        assert_eq!(&bytes[..], b"data: {\"type\":\"start-step\"}\n\n");
        assert_eq!(&done_frame()[..], b"data: [DONE]\n\n");
    }

    #[test]
    fn parser_reassembles_frames_split_across_reads() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&encode_sse(&text("Hel", 0)).unwrap());
        wire.extend_from_slice(&encode_sse(&text("lo", 3)).unwrap());
        wire.extend_from_slice(&done_frame());

        let mut parser = FrameParser::new();
        let mut frames = Vec::new();
        for piece in wire.chunks(7) {
            frames.extend(parser.push(piece).unwrap());
        }

        assert_eq!(
            frames,
            vec![
                Frame::Chunk(text("Hel", 0)),
                Frame::Chunk(text("lo", 3)),
                Frame::Done
            ]
        );
    }

    #[test]
    fn parser_ignores_comments_and_handles_crlf() {
        let mut parser = FrameParser::new();
        let frames = parser
            .push(b": keep-alive\r\n\r\ndata: {\"type\":\"finish-step\"}\r\n\r\n")
            .unwrap();
        assert_eq!(frames, vec![Frame::Chunk(UiChunk::FinishStep)]);
    }

    #[test]
    fn body_parsing_stops_at_done() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&encode_sse(&UiChunk::StartStep).unwrap());
        wire.extend_from_slice(&done_frame());
        wire.extend_from_slice(&encode_sse(&UiChunk::FinishStep).unwrap());

        assert_eq!(parse_sse_body(&wire).unwrap(), vec![UiChunk::StartStep]);
    }
}
