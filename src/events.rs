//! Callback names and their argument shapes.
//!
//! Argument structs decode positionally from the callback's parameter list,
//! so field order matters and trailing parameters are ignored:
//!
//! ```no_run
//! use gbxremote::events::{self, PlayerConnectArgs};
//!
//! # fn run(client: &gbxremote::GbxClient) {
//! client.on(events::PLAYER_CONNECT, |args: PlayerConnectArgs| async move {
//!     println!("{} joined", args.login);
//!     Ok(())
//! });
//! # }
//! ```

use serde::Deserialize;

pub const PLAYER_CONNECT: &str = "ManiaPlanet.PlayerConnect";
pub const PLAYER_DISCONNECT: &str = "ManiaPlanet.PlayerDisconnect";
pub const PLAYER_CHAT: &str = "ManiaPlanet.PlayerChat";
pub const PLAYER_INFO_CHANGED: &str = "ManiaPlanet.PlayerInfoChanged";
pub const BEGIN_MAP: &str = "ManiaPlanet.BeginMap";
pub const END_MAP: &str = "ManiaPlanet.EndMap";
pub const MODE_SCRIPT_CALLBACK_ARRAY: &str = "ManiaPlanet.ModeScriptCallbackArray";

/// Any player callback, reduced to the login it starts with.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlayerArgs {
    /// Login name/id of the player.
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlayerConnectArgs {
    pub login: String,
    pub is_spectator: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlayerDisconnectArgs {
    pub login: String,
    pub disconnection_reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlayerChatArgs {
    /// Zero for messages sent by the server itself.
    pub player_uid: i32,
    pub login: String,
    pub text: String,
    pub is_registred_cmd: bool,
}

/// Script-mode callback: a name and its string arguments.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModeScriptCallbackArgs {
    pub name: String,
    pub data: Vec<String>,
}
