//! Print player join/leave and chat callbacks until the server goes away.
//!
//! ```text
//! RUST_LOG=gbxremote=debug cargo run --example player_events
//! ```

use gbxremote::events::{self, PlayerChatArgs, PlayerConnectArgs, PlayerDisconnectArgs};
use gbxremote::{GbxClient, Notification};
use tracing_subscriber::EnvFilter;

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let host = env_or("GBX_HOST", "127.0.0.1");
    let port: u16 = env_or("GBX_PORT", "5000").parse()?;

    let client = GbxClient::connect(&host, port).await?;
    client
        .authenticate(&env_or("GBX_LOGIN", "SuperAdmin"), &env_or("GBX_PASSWORD", "SuperAdmin"))
        .await?;
    client.set_api_version("2013-04-16").await?;
    client.enable_callbacks(true).await?;

    client.on(events::PLAYER_CONNECT, |args: PlayerConnectArgs| async move {
        let role = if args.is_spectator { "spectator" } else { "player" };
        tracing::info!(login = %args.login, role, "joined");
        Ok(())
    });
    client.on(events::PLAYER_DISCONNECT, |args: PlayerDisconnectArgs| async move {
        tracing::info!(login = %args.login, reason = %args.disconnection_reason, "left");
        Ok(())
    });
    client.on(events::PLAYER_CHAT, |args: PlayerChatArgs| async move {
        if args.player_uid != 0 {
            println!("<{}> {}", args.login, args.text);
        }
        Ok(())
    });
    client.on_any(|n: Notification| async move {
        tracing::debug!(callback = %n.name, params = n.params.len(), "callback");
        Ok(())
    });

    tokio::select! {
        _ = client.closed() => tracing::warn!("server closed the connection"),
        _ = tokio::signal::ctrl_c() => client.close(),
    }
    Ok(())
}
