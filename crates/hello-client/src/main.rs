//! Reference client for the NKN overlay.
//!
//! Connects under the given public key, logs every event it receives, and
//! answers each inbound message with an echo. With a destination argument it
//! also sends one greeting whenever a session becomes active.
//!
//! Usage:
//!   NKN_PUBLIC_KEY=02ab... nkn-hello-client [dest] [message]
//!
//! Env vars:
//!   NKN_PUBLIC_KEY   hex public key (required)
//!   NKN_IDENTIFIER   address prefix (default: none)
//!   NKN_CONFIG       path to a TOML file with `ClientConfig` fields
//!   NKN_SEED_RPC     seed RPC URL, overrides the config file

use anyhow::Context;
use nkn_client::{Client, ClientConfig, Event, Identity};
use tracing_subscriber::EnvFilter;

const MAX_HOLDING_SECONDS: u32 = 60;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_config()?;
    let public_key = std::env::var("NKN_PUBLIC_KEY").context("NKN_PUBLIC_KEY is not set")?;
    let identity = Identity::from_hex(&public_key)?;
    let identifier = std::env::var("NKN_IDENTIFIER").unwrap_or_default();

    let mut args = std::env::args().skip(1);
    let dest = args.next();
    let greeting = args.next().unwrap_or_else(|| "hello".into());

    tracing::info!(seed = %config.seed_rpc_server_addr, "connecting");
    let client = Client::connect(&identity, &identifier, config).await?;
    tracing::info!(address = %client.address(), "client started");

    tokio::select! {
        _ = run(&client, dest.as_deref(), &greeting) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted");
        }
    }

    client.shutdown().await;
    tracing::info!("client exiting");
    Ok(())
}

fn load_config() -> anyhow::Result<ClientConfig> {
    let mut config = match std::env::var("NKN_CONFIG") {
        Ok(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config {path}"))?;
            toml::from_str(&text).with_context(|| format!("parsing config {path}"))?
        }
        Err(_) => ClientConfig::default(),
    };
    if let Ok(seed) = std::env::var("NKN_SEED_RPC") {
        config.seed_rpc_server_addr = seed;
    }
    Ok(config)
}

async fn run(client: &Client, dest: Option<&str>, greeting: &str) {
    while let Some(mut generation) = client.next_generation().await {
        let id = generation.id();
        while let Some(event) = generation.recv().await {
            match event {
                Event::Connected => {
                    tracing::info!(generation = id, "connected");
                    if let Some(dest) = dest {
                        if let Err(e) = client
                            .send([dest], greeting.as_bytes(), MAX_HOLDING_SECONDS)
                            .await
                        {
                            tracing::warn!(error = %e, "greeting failed");
                        }
                    }
                }
                Event::Message(msg) => {
                    tracing::info!(
                        src = %msg.src,
                        payload = %String::from_utf8_lossy(&msg.payload),
                        "received message"
                    );
                    if let Err(e) = client
                        .send([msg.src], msg.payload, MAX_HOLDING_SECONDS)
                        .await
                    {
                        tracing::warn!(error = %e, "echo failed");
                    }
                }
                Event::Block(block) => {
                    tracing::debug!(height = ?block.height(), "received block");
                }
            }
        }
        tracing::info!(generation = id, "session ended");
    }
}
