//! Loopback server and client helpers shared by the integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use roomchat::{ChatClient, ChatClientConfig, ChatConfig, ChatEngine, ChatServer};

/// Bind a server on a free loopback port and serve it in the background
pub async fn start_server(config: ChatConfig) -> (Arc<ChatServer>, SocketAddr) {
    let config = ChatConfig {
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        ..config
    };

    let mut server = ChatServer::new(config, Arc::new(ChatEngine::default()));
    let addr = server.bind().await.unwrap();

    let server = Arc::new(server);
    let serving = Arc::clone(&server);
    tokio::spawn(async move { serving.serve().await });

    (server, addr)
}

pub fn client_config(addr: SocketAddr) -> ChatClientConfig {
    ChatClientConfig {
        server_addr: addr,
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        connect_timeout_secs: 5,
        ..ChatClientConfig::default()
    }
}

pub async fn connect(addr: SocketAddr, username: &str) -> roomchat::Result<ChatClient> {
    let mut client = ChatClient::new(client_config(addr));
    client.connect(username).await?;
    Ok(client)
}
