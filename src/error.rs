//! Error types for gbxremote.

use std::fmt::Display;
use std::time::Duration;

use thiserror::Error;

/// Main error type for all GBXRemote operations.
#[derive(Debug, Error)]
pub enum GbxError {
    /// I/O error on the socket.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The server greeting was missing, malformed, or timed out.
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// The connection closed while the call was pending (or before it was sent).
    #[error("Connection closed")]
    ConnectionClosed,

    /// The server rejected the call with an XML-RPC fault.
    #[error("Fault {code}: {message}")]
    Fault { code: i32, message: String },

    /// A wire value did not fit the requested native shape (or vice versa).
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// The call did not complete within the caller's deadline.
    #[error("Call to {method} timed out after {timeout:?}")]
    Timeout { method: String, timeout: Duration },

    /// Protocol error (oversized frame, unexpected message kind, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Malformed XML-RPC document.
    #[error("XML error: {0}")]
    Xml(String),
}

impl GbxError {
    /// `true` if the server answered with a fault.
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Fault { .. })
    }

    /// `true` for transport-level failures shared by every pending call.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::ConnectionClosed | Self::Io(_))
    }

    /// `true` if the caller's deadline fired before completion.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl serde::ser::Error for GbxError {
    fn custom<T: Display>(msg: T) -> Self {
        Self::TypeMismatch(msg.to_string())
    }
}

impl serde::de::Error for GbxError {
    fn custom<T: Display>(msg: T) -> Self {
        Self::TypeMismatch(msg.to_string())
    }
}

impl From<quick_xml::Error> for GbxError {
    fn from(e: quick_xml::Error) -> Self {
        Self::Xml(e.to_string())
    }
}

/// Result type alias using GbxError.
pub type Result<T> = std::result::Result<T, GbxError>;
