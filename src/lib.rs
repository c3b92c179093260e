//! # gbxremote
//!
//! Async client for the GBXRemote protocol, the XML-RPC-over-TCP control
//! interface of dedicated racing-game servers.
//!
//! ## Architecture
//!
//! - **Handshake**: the server greets with `GBXRemote 2`
//! - **Framing**: `[length][handle][XML]`, both integers little-endian `u32`
//! - **Calls**: concurrent, correlated by handle, answered in any order
//! - **Callbacks**: server-initiated calls, delivered in order to listeners
//!
//! ## Example
//!
//! ```no_run
//! use gbxremote::{events, GbxClient};
//!
//! #[tokio::main]
//! async fn main() -> gbxremote::Result<()> {
//!     let client = GbxClient::connect("127.0.0.1", 5000).await?;
//!     client.authenticate("SuperAdmin", "SuperAdmin").await?;
//!     client.enable_callbacks(true).await?;
//!
//!     client.on(events::PLAYER_CONNECT, |args: events::PlayerArgs| async move {
//!         println!("{} connected", args.login);
//!         Ok(())
//!     });
//!
//!     let ratio = client.get_call_vote_ratio().await?;
//!     println!("vote ratio {ratio}");
//!
//!     client.closed().await;
//!     Ok(())
//! }
//! ```

pub mod callbacks;
pub mod codec;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod fault;
pub mod methods;
pub mod protocol;
pub mod value;
pub mod writer;

mod client;

pub use callbacks::Notification;
pub use client::{ClientBuilder, ClientConfig, ConnectionState, GbxClient};
pub use codec::{CurrentNextValue, Params};
pub use error::{GbxError, Result};
pub use fault::Fault;
pub use value::Value;
