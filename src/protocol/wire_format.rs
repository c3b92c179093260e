//! Wire format encoding and decoding.
//!
//! Every message after the greeting starts with an 8-byte header:
//! ```text
//! ┌──────────┬──────────┐
//! │ Length   │ Handle   │
//! │ 4 bytes  │ 4 bytes  │
//! │ uint32 LE│ uint32 LE│
//! └──────────┴──────────┘
//! ```
//!
//! `Length` counts only the XML payload that follows. The high bit of
//! `Handle` marks client-originated calls and their responses; server
//! callbacks carry handles with the bit clear.

use crate::error::{GbxError, Result};

/// Header size in bytes (fixed, exactly 8).
pub const HEADER_SIZE: usize = 8;

/// Default maximum payload size (4 MiB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 4 * 1024 * 1024;

/// Marker bit carried by every client-originated handle.
pub const CLIENT_HANDLE_BIT: u32 = 0x8000_0000;

/// `true` if `handle` belongs to a server-initiated callback.
#[inline]
pub fn is_callback_handle(handle: u32) -> bool {
    handle & CLIENT_HANDLE_BIT == 0
}

/// Decoded header from wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Payload length in bytes.
    pub payload_length: u32,
    /// Correlation handle.
    pub handle: u32,
}

impl Header {
    pub fn new(payload_length: u32, handle: u32) -> Self {
        Self {
            payload_length,
            handle,
        }
    }

    /// Encode header to bytes (Little Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use gbxremote::protocol::Header;
    ///
    /// let bytes = Header::new(100, 0x8000_0001).encode();
    /// assert_eq!(bytes, [100, 0, 0, 0, 1, 0, 0, 0x80]);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.payload_length.to_le_bytes());
        buf[4..8].copy_from_slice(&self.handle.to_le_bytes());
        buf
    }

    /// Decode header from bytes (Little Endian).
    ///
    /// Returns `None` if buffer is too short.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            payload_length: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            handle: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
        })
    }

    /// Reject payloads larger than `max_payload_size`.
    pub fn validate(&self, max_payload_size: u32) -> Result<()> {
        if self.payload_length > max_payload_size {
            return Err(GbxError::Protocol(format!(
                "Payload size {} exceeds maximum {}",
                self.payload_length, max_payload_size
            )));
        }
        Ok(())
    }

    /// Check if this frame is a server callback.
    #[inline]
    pub fn is_callback(&self) -> bool {
        is_callback_handle(self.handle)
    }
}
