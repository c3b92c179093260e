//! Inspect and adjust call-vote settings on a running server.
//!
//! ```text
//! GBX_HOST=127.0.0.1 GBX_PORT=5000 GBX_PASSWORD=SuperAdmin cargo run --example votes
//! ```

use std::time::Duration;

use gbxremote::methods::{CallVoteRatio, MultiCall};
use gbxremote::GbxClient;
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

    let client = GbxClient::builder()
        .call_timeout(Duration::from_secs(10))
        .connect(&host, port)
        .await?;
    client
        .authenticate(&env_or("GBX_LOGIN", "SuperAdmin"), &env_or("GBX_PASSWORD", "SuperAdmin"))
        .await?;

    let ratio = client.get_call_vote_ratio().await?;
    let timeout = client.get_call_vote_time_out().await?;
    println!(
        "default ratio {ratio}, timeout {} ms (next map: {} ms)",
        timeout.current_value, timeout.next_value
    );

    for entry in client.get_call_vote_ratios().await? {
        println!("  {:<24} {}", entry.command, entry.ratio);
    }

    client
        .set_call_vote_ratios(&[CallVoteRatio::new("RestartMap", 0.6)])
        .await?;

    let batch = MultiCall::new()
        .add("GetCallVoteRatio", ())?
        .add("GetCurrentCallVote", ())?;
    for (i, result) in client.multicall(batch).await?.into_iter().enumerate() {
        match result {
            Ok(value) => println!("multicall[{i}] = {value:?}"),
            Err(fault) => println!("multicall[{i}] failed: {fault}"),
        }
    }

    client.close();
    Ok(())
}
