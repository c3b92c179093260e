//! Protocol module - greeting, wire format, and framing.
//!
//! - Length-prefixed `GBXRemote 2` greeting
//! - 8-byte header encoding/decoding
//! - Frame buffer for accumulating partial reads

mod frame;
mod frame_buffer;
pub mod handshake;
mod wire_format;

pub use frame::{build_frame, Frame};
pub use frame_buffer::FrameBuffer;
pub use handshake::{read_greeting, DEFAULT_HANDSHAKE_TIMEOUT, GREETING};
pub use wire_format::{
    is_callback_handle, Header, CLIENT_HANDLE_BIT, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE,
};
