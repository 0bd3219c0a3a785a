//! Wire protocol: frames, SSE encoding, and client-side decoding.

pub mod chunk;
pub mod decoder;
pub mod encoder;

pub use chunk::UiChunk;
pub use decoder::MessageAssembler;
pub use encoder::{
    done_frame, encode_sse, parse_sse_body, Frame, FrameParser, STREAM_PROTOCOL_HEADER,
    STREAM_PROTOCOL_VERSION,
};
