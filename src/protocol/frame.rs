//! A complete GBXRemote message: header plus XML payload.
//!
//! Uses `bytes::Bytes` for zero-copy payload sharing.
//!
//! # Example
//!
//! ```
//! use gbxremote::protocol::{Frame, Header};
//! use bytes::Bytes;
//!
//! let frame = Frame::new(Header::new(5, 0x8000_0000), Bytes::from_static(b"hello"));
//! assert_eq!(frame.handle(), 0x8000_0000);
//! assert!(!frame.is_callback());
//! ```

use bytes::Bytes;

use super::wire_format::{Header, HEADER_SIZE};

/// A complete protocol frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Decoded header.
    pub header: Header,
    /// Payload bytes (zero-copy via `bytes::Bytes`).
    pub payload: Bytes,
}

impl Frame {
    pub fn new(header: Header, payload: Bytes) -> Self {
        Self { header, payload }
    }

    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[inline]
    pub fn handle(&self) -> u32 {
        self.header.handle
    }

    /// Check if the server initiated this frame.
    #[inline]
    pub fn is_callback(&self) -> bool {
        self.header.is_callback()
    }
}

/// Build a complete frame as a single byte vector.
///
/// The writer uses scatter/gather I/O instead; this is for tests and
/// one-off writes.
///
/// ```
/// use gbxremote::protocol::{build_frame, HEADER_SIZE};
///
/// let bytes = build_frame(0x8000_0000, b"<x/>");
/// assert_eq!(bytes.len(), HEADER_SIZE + 4);
/// ```
pub fn build_frame(handle: u32, payload: &[u8]) -> Vec<u8> {
    let header = Header::new(payload.len() as u32, handle);
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(payload);
    buf
}
