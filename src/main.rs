//! Room chat over QUIC
//!
//! Usage:
//!   cargo run -- server                    # Run the chat server
//!   cargo run -- server --port 4433        # Run on specific port
//!   cargo run -- client                    # Interactive client on localhost

use roomchat::{ChatConfig, ChatEngine, ChatServer, Console, ConsoleConfig, DEFAULT_ROOM};
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return Ok(());
    }

    match args[1].as_str() {
        "server" => run_server(&args).await?,
        "client" => run_client(&args).await?,
        "help" | "--help" | "-h" => print_usage(),
        _ => {
            eprintln!("Unknown command: {}", args[1]);
            print_usage();
        }
    }

    Ok(())
}

fn print_usage() {
    println!("roomchat - Multi-room QUIC Chat");
    println!();
    println!("USAGE:");
    println!("    cargo run -- server [OPTIONS]");
    println!("    cargo run -- client [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("    server              Start the chat server");
    println!("    client              Start the interactive console client");
    println!("    help                Show this help message");
    println!();
    println!("SERVER OPTIONS:");
    println!("    --port <PORT>       Port to listen on (default: 4433)");
    println!("    --max-conn <NUM>    Maximum connections (default: 1000)");
    println!("    --room <NAME>       Default room (default: {})", DEFAULT_ROOM);
    println!();
    println!("CLIENT OPTIONS:");
    println!("    --server <ADDR>     Server address (default: 127.0.0.1:4433)");
    println!("    --poll-ms <MS>      Poll interval in milliseconds (default: 1000)");
    println!("    --room <NAME>       Default room (default: {})", DEFAULT_ROOM);
    println!();
    println!("EXAMPLES:");
    println!("    cargo run -- server --port 5000");
    println!("    cargo run -- client --server 127.0.0.1:5000");
    println!("    RUST_LOG=debug cargo run -- server");
}

/// Value following `flag`, if present and parseable
fn parse_flag<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.windows(2)
        .find(|pair| pair[0] == flag)
        .and_then(|pair| pair[1].parse().ok())
}

async fn run_server(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let defaults = ChatConfig::default();
    let port = parse_flag(args, "--port").unwrap_or(defaults.bind_addr.port());

    let config = ChatConfig {
        bind_addr: SocketAddr::from(([0, 0, 0, 0], port)),
        max_connections: parse_flag(args, "--max-conn").unwrap_or(defaults.max_connections),
        default_room: parse_flag(args, "--room").unwrap_or(defaults.default_room.clone()),
        ..defaults
    };

    info!("Configuration:");
    info!("  - Bind address: {}", config.bind_addr);
    info!("  - Max connections: {}", config.max_connections);
    info!("  - Default room: {}", config.default_room);

    let mut server = ChatServer::new(config, Arc::new(ChatEngine::default()));

    // Start server (this will run indefinitely)
    if let Err(e) = server.start().await {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}

async fn run_client(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = ConsoleConfig::default();

    if let Some(server_addr) = parse_flag(args, "--server") {
        config.client.server_addr = server_addr;
    }
    if let Some(millis) = parse_flag(args, "--poll-ms") {
        config.poll_interval = Duration::from_millis(millis);
    }
    if let Some(room) = parse_flag(args, "--room") {
        config.default_room = room;
    }

    Console::new(config).run().await?;
    Ok(())
}
