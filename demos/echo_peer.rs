//! Two peers talking over a local WebSocket.
//!
//! Demonstrates:
//! - Binding a server and connecting a client to it
//! - Calling the peer with `waiter` and `send`
//! - Calls in the other direction (server → client)
//! - One-shot handlers
//! - Status listeners and `disconnect_async`
//!
//! Usage:
//!   cargo run --example echo_peer
//!   cargo run --example echo_peer -- --debug
//!   RUST_LOG=wsrpc=trace cargo run --example echo_peer

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use anyhow::Context;
use serde_json::Value;
use tracing_subscriber::EnvFilter;
use wsrpc::{Connection, ConnectionEvent, EventKind, Listener, PendingServer};

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let debug = std::env::args().any(|a| a == "--debug");
    init_logging(debug);

    if let Err(e) = run().await {
        eprintln!("\n[ERROR] {e:#}");
        std::process::exit(1);
    }
}

fn init_logging(debug: bool) {
    let default = if debug { "wsrpc=debug" } else { "wsrpc=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn run() -> anyhow::Result<()> {
    println!("=== Echo Peer ===\n");

    // ========================================================================
    // Connect
    // ========================================================================

    println!("[1] Binding server and connecting client...");
    let server = PendingServer::bind_localhost().await?;
    let url = server.ws_url();

    let client_builder = Connection::builder()
        .waiter_timeout(Duration::from_secs(5))
        .on_error(|err| eprintln!("        client error: {err}"))
        .listener(
            EventKind::StatusChange,
            Listener::new(|event| {
                if let ConnectionEvent::StatusChange(status) = event {
                    println!("        client status → {status}");
                }
            }),
        );

    let (server_side, client) = tokio::join!(server.accept(), client_builder.connect(&url));
    let server_side = server_side.context("accept failed")?;
    let client = client.context("connect failed")?;
    println!("        ✓ Connected to {url}\n");

    // ========================================================================
    // Handlers
    // ========================================================================

    server_side.set_message_handler("echo", |args: Vec<Value>| async move {
        format!("{}!", args.first().and_then(Value::as_str).unwrap_or_default())
    });

    server_side.set_message_handler("add", |args: Vec<Value>| async move {
        args.iter().filter_map(Value::as_i64).sum::<i64>()
    });

    server_side.set_message_handler("log", |args: Vec<Value>| async move {
        println!("        server log: {args:?}");
    });

    client.once_message_handler("whoami", |_| async { "client" });

    // ========================================================================
    // Client → Server
    // ========================================================================

    println!("[2] Client calls server...");
    let echoed: String = client.waiter("echo", ("hi",)).await?;
    println!("        echo(\"hi\") = {echoed}");

    let sum: i64 = client.waiter("add", (1, 2, 3)).await?;
    println!("        add(1, 2, 3) = {sum}");

    client.send("log", ("fire", "and", "forget"))?;
    println!("        ✓ Sent log message\n");

    // ========================================================================
    // Server → Client
    // ========================================================================

    println!("[3] Server calls client...");
    let name: String = server_side.waiter("whoami", ()).await?;
    println!("        whoami() = {name}");

    let second = server_side
        .waiter_with_timeout::<_, Value>("whoami", (), Duration::from_millis(200))
        .await;
    match second {
        Err(e) if e.is_timeout() => println!("        ✓ One-shot handler answered only once"),
        other => println!("        unexpected second answer: {other:?}"),
    }
    println!();

    // ========================================================================
    // Disconnect
    // ========================================================================

    println!("[4] Disconnecting...");
    client.disconnect_async().await?;
    println!("        client: {}", client.status());

    tokio::time::sleep(Duration::from_millis(50)).await;
    println!("        server: {}", server_side.status());

    println!("\n=== Done ===");
    Ok(())
}
