//! Connects to a remote debugger proxy and runs a bundle.
//!
//! Usage:
//!
//! ```text
//! cargo run --example remote_debug -- ws://localhost:8081/debugger-proxy?role=client \
//!     http://localhost:8081/index.bundle [--debug]
//! ```

// ============================================================================
// Imports
// ============================================================================

use anyhow::Context;
use js_bridge::{BridgeClient, CancellationToken};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

const DEFAULT_PROXY: &str = "ws://localhost:8081/debugger-proxy?role=client";
const DEFAULT_BUNDLE: &str = "http://localhost:8081/index.bundle?platform=tizen&dev=true";

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let debug = args.iter().any(|a| a == "--debug");
    let mut positional = args.iter().filter(|a| !a.starts_with("--"));
    let proxy = positional.next().map_or(DEFAULT_PROXY, String::as_str);
    let bundle = positional.next().map_or(DEFAULT_BUNDLE, String::as_str);

    let filter = if debug { "js_bridge=debug" } else { "js_bridge=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let client = BridgeClient::new();

    // Ctrl-C aborts a connect that is still retrying.
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });

    client
        .connect(proxy, &cancel)
        .await
        .with_context(|| format!("connecting to {proxy}"))?;

    client.set_global_variable("__DEV__", &json!(true));
    client
        .run_script(bundle)
        .await
        .with_context(|| format!("running {bundle}"))?;

    let queue = client
        .call_function("AppRegistry", "runApplication", json!(["App", {"rootTag": 1, "initialProps": {}}]))
        .await
        .context("runApplication")?;
    info!(queue = %queue, "Application started");

    let queue = client.flushed_queue().await.context("flushedQueue")?;
    info!(queue = %queue, "Flushed queue");

    client.dispose();
    Ok(())
}
