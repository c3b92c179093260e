//! Connection greeting.
//!
//! Right after accepting a connection the server sends a length-prefixed
//! ASCII banner naming the protocol revision. Only revision 2 carries
//! handles in its frame headers, so anything else is refused.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{GbxError, Result};

/// The only greeting this client accepts.
pub const GREETING: &str = "GBXRemote 2";

/// Greeting of the handle-less first revision.
const LEGACY_GREETING: &str = "GBXRemote 1";

/// Upper bound on the announced greeting length.
pub const MAX_GREETING_LENGTH: u32 = 64;

/// Default time allowed for the server to send its greeting.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Read and check the greeting, bounded by `timeout`.
pub async fn read_greeting<R>(reader: &mut R, timeout: Duration) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let greeting = tokio::time::timeout(timeout, read_banner(reader))
        .await
        .map_err(|_| GbxError::Handshake(format!("no greeting within {timeout:?}")))??;

    match greeting.as_str() {
        GREETING => Ok(()),
        LEGACY_GREETING => Err(GbxError::Handshake(
            "unsupported protocol version GBXRemote 1".to_string(),
        )),
        other => Err(GbxError::Handshake(format!("unexpected greeting {other:?}"))),
    }
}

async fn read_banner<R>(reader: &mut R) -> Result<String>
where
    R: AsyncRead + Unpin,
{
    let length = reader.read_u32_le().await.map_err(handshake_io)?;
    if length == 0 || length > MAX_GREETING_LENGTH {
        return Err(GbxError::Handshake(format!(
            "invalid greeting length {length}"
        )));
    }

    let mut banner = vec![0u8; length as usize];
    reader.read_exact(&mut banner).await.map_err(handshake_io)?;
    String::from_utf8(banner).map_err(|_| GbxError::Handshake("greeting is not ASCII".to_string()))
}

fn handshake_io(e: std::io::Error) -> GbxError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        GbxError::Handshake("connection closed during handshake".to_string())
    } else {
        GbxError::Handshake(format!("read failed: {e}"))
    }
}

/// Encode a greeting the way a server sends it.
pub fn encode_greeting(text: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + text.len());
    buf.extend_from_slice(&(text.len() as u32).to_le_bytes());
    buf.extend_from_slice(text.as_bytes());
    buf
}
