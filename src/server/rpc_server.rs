//! QUIC RPC server
//!
//! Accepts QUIC connections and serves one request per bidirectional stream:
//! the client writes a single request frame and finishes its side, the server
//! answers with a single reply frame and finishes its own. Streams of one
//! connection are served concurrently.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use quinn::{Connection, Endpoint, RecvStream, SendStream};
use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio::sync::{RwLock, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::engine::{ChatEngine, EngineStats};
use crate::error::{ChatError, Result};
use crate::protocol::{Encodable, ErrorReply, Frame, Reply, Request};
use crate::server::dispatcher::Dispatcher;
use crate::{ALPN_PROTOCOL, ChatConfig, current_timestamp};

/// Maximum number of concurrent request streams per connection
const MAX_CONCURRENT_STREAMS: u32 = 100;

/// Connection information for a connected client
#[derive(Debug, Clone)]
pub struct ClientConnection {
    pub remote_addr: SocketAddr,
    pub connected_at: u64,
}

/// Server state shared between connection tasks
#[derive(Debug)]
struct ServerState {
    /// Routes requests to the engine
    dispatcher: Dispatcher,
    /// Connected clients indexed by connection ID
    connections: RwLock<HashMap<String, ClientConnection>>,
    /// One permit per allowed connection, taken at accept time
    slots: Arc<Semaphore>,
    /// Server configuration
    config: ChatConfig,
}

impl ServerState {
    fn new(config: ChatConfig, engine: Arc<ChatEngine>) -> Self {
        Self {
            dispatcher: Dispatcher::with_reply_limit(engine, config.max_reply_size),
            connections: RwLock::new(HashMap::new()),
            slots: Arc::new(Semaphore::new(config.max_connections)),
            config,
        }
    }

    async fn add_connection(&self, conn_id: &str, client: ClientConnection) {
        self.connections
            .write()
            .await
            .insert(conn_id.to_string(), client);
    }

    async fn remove_connection(&self, conn_id: &str) {
        if let Some(client) = self.connections.write().await.remove(conn_id) {
            info!(
                "Connection {} from {} closed after {} ms",
                conn_id,
                client.remote_addr,
                current_timestamp().saturating_sub(client.connected_at)
            );
        }
    }

    async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Decode one request frame and run it against the engine.
    ///
    /// Undecodable input never reaches the engine; it gets an error reply.
    async fn handle_request(&self, conn_id: &str, data: &[u8]) -> Reply {
        let frame = match Frame::decode_complete(data) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Invalid frame on {}: {}", conn_id, e);
                return Reply::Error(ErrorReply::invalid_frame(e.to_string()));
            }
        };

        let request = match Request::decode(&frame) {
            Ok(request) => request,
            Err(e) => {
                warn!("Invalid request on {}: {}", conn_id, e);
                return Reply::Error(ErrorReply::invalid_request(e.to_string()));
            }
        };

        debug!("{} on {}", request.operation(), conn_id);
        self.dispatcher.dispatch(request).await
    }
}

/// QUIC-based chat RPC server
pub struct ChatServer {
    state: Arc<ServerState>,
    endpoint: Option<Endpoint>,
}

impl ChatServer {
    /// Create a server around an engine
    pub fn new(config: ChatConfig, engine: Arc<ChatEngine>) -> Self {
        Self {
            state: Arc::new(ServerState::new(config, engine)),
            endpoint: None,
        }
    }

    /// Get the engine this server dispatches to
    pub fn engine(&self) -> Arc<ChatEngine> {
        self.state.dispatcher.engine()
    }

    /// Create the default room and bind the QUIC endpoint.
    ///
    /// Returns the bound address, which differs from the configured one when
    /// port 0 was requested.
    pub async fn bind(&mut self) -> Result<SocketAddr> {
        let config = &self.state.config;
        info!("Starting chat server on {}", config.bind_addr);

        self.engine().ensure_room(&config.default_room).await;

        let quic_config = build_server_config(config)?;
        let endpoint = Endpoint::server(quic_config, config.bind_addr)
            .map_err(|e| ChatError::network(format!("Failed to create endpoint: {}", e)))?;

        let local_addr = endpoint.local_addr()?;
        info!("Chat server listening on {}", local_addr);

        self.endpoint = Some(endpoint);
        Ok(local_addr)
    }

    /// Accept connections until the endpoint is closed
    pub async fn serve(&self) -> Result<()> {
        let endpoint = self
            .endpoint
            .clone()
            .ok_or_else(|| ChatError::internal("Server is not bound"))?;

        loop {
            match endpoint.accept().await {
                Some(incoming) => {
                    // The slot is held until the connection task ends, handshake included
                    let Ok(slot) = Arc::clone(&self.state.slots).try_acquire_owned() else {
                        warn!("Connection limit reached, refusing {}", incoming.remote_address());
                        incoming.refuse();
                        continue;
                    };

                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        let _slot = slot;
                        if let Err(e) = Self::handle_connection(state, incoming).await {
                            error!("Connection handling failed: {}", e);
                        }
                    });
                }
                None => {
                    info!("Endpoint stopped accepting connections");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Bind and serve
    pub async fn start(&mut self) -> Result<()> {
        self.bind().await?;
        self.serve().await
    }

    /// Handle a single client connection
    async fn handle_connection(state: Arc<ServerState>, incoming: quinn::Incoming) -> Result<()> {
        let connection = incoming.await?;
        let remote_addr = connection.remote_address();
        let conn_id = Uuid::new_v4().to_string();

        info!("New connection {} from {}", conn_id, remote_addr);
        state
            .add_connection(
                &conn_id,
                ClientConnection {
                    remote_addr,
                    connected_at: current_timestamp(),
                },
            )
            .await;

        let result = Self::serve_streams(Arc::clone(&state), &conn_id, connection).await;
        state.remove_connection(&conn_id).await;
        result
    }

    /// Accept request streams until the peer goes away
    async fn serve_streams(
        state: Arc<ServerState>,
        conn_id: &str,
        connection: Connection,
    ) -> Result<()> {
        loop {
            let (send_stream, recv_stream) = match connection.accept_bi().await {
                Ok(streams) => streams,
                Err(
                    quinn::ConnectionError::ApplicationClosed(_)
                    | quinn::ConnectionError::LocallyClosed
                    | quinn::ConnectionError::TimedOut,
                ) => {
                    debug!("Connection {} finished", conn_id);
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };

            let state = Arc::clone(&state);
            let conn_id = conn_id.to_string();
            tokio::spawn(async move {
                if let Err(e) = Self::handle_stream(state, &conn_id, send_stream, recv_stream).await
                {
                    warn!("Request on {} failed: {}", conn_id, e);
                }
            });
        }
    }

    /// Read one request frame, answer with one reply frame
    async fn handle_stream(
        state: Arc<ServerState>,
        conn_id: &str,
        mut send_stream: SendStream,
        mut recv_stream: RecvStream,
    ) -> Result<()> {
        let max_request_size = state.config.max_request_size;

        let reply = match recv_stream.read_to_end(max_request_size).await {
            Ok(data) => state.handle_request(conn_id, &data).await,
            Err(quinn::ReadToEndError::TooLong) => {
                warn!("Oversized request on {}", conn_id);
                Reply::Error(ErrorReply::request_too_large(max_request_size))
            }
            Err(e) => return Err(e.into()),
        };

        let data = encode_reply(&reply).or_else(|e| {
            error!("Failed to encode reply on {}: {}", conn_id, e);
            encode_reply(&Reply::Error(ErrorReply::server_error(
                "Failed to encode reply",
            )))
        })?;

        send_stream.write_all(&data).await?;
        send_stream.finish()?;
        Ok(())
    }

    /// Get server statistics
    pub async fn get_stats(&self) -> ServerStats {
        ServerStats {
            connected_clients: self.state.connection_count().await,
            bind_address: self
                .endpoint
                .as_ref()
                .and_then(|endpoint| endpoint.local_addr().ok()),
            max_connections: self.state.config.max_connections,
            engine: self.engine().stats().await,
        }
    }

    /// Close the endpoint; `serve` returns once it notices
    pub async fn shutdown(&mut self) -> Result<()> {
        if let Some(endpoint) = self.endpoint.take() {
            endpoint.close(0u32.into(), b"Server shutdown");
            info!("Chat server shutdown completed");
        }
        Ok(())
    }
}

/// Server statistics
#[derive(Debug, Clone)]
pub struct ServerStats {
    pub connected_clients: usize,
    pub bind_address: Option<SocketAddr>,
    pub max_connections: usize,
    pub engine: EngineStats,
}

fn encode_reply(reply: &Reply) -> std::io::Result<Bytes> {
    reply.encode_frame()?.encode_to_bytes()
}

/// TLS + QUIC settings with a freshly generated self-signed certificate
fn build_server_config(config: &ChatConfig) -> Result<quinn::ServerConfig> {
    let rcgen::CertifiedKey { cert, key_pair } =
        rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
            .map_err(|e| ChatError::config(format!("Failed to generate certificate: {}", e)))?;

    let cert_der = cert.der().clone();
    let key_der = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut server_config = rustls::ServerConfig::builder_with_provider(provider)
        .with_protocol_versions(&[&rustls::version::TLS13])?
        .with_no_client_auth()
        .with_single_cert(vec![cert_der], key_der)
        .map_err(|e| ChatError::config(format!("Failed to configure TLS: {}", e)))?;

    server_config.alpn_protocols = vec![ALPN_PROTOCOL.to_vec()];
    server_config.max_early_data_size = 0;

    let idle_timeout: quinn::IdleTimeout = Duration::from_secs(config.idle_timeout_secs)
        .try_into()
        .map_err(|e| ChatError::config(format!("Invalid idle timeout: {}", e)))?;

    let mut transport_config = quinn::TransportConfig::default();
    transport_config.max_concurrent_bidi_streams(MAX_CONCURRENT_STREAMS.into());
    transport_config.max_concurrent_uni_streams(0u32.into());
    transport_config.max_idle_timeout(Some(idle_timeout));

    let mut quic_config = quinn::ServerConfig::with_crypto(Arc::new(
        quinn::crypto::rustls::QuicServerConfig::try_from(server_config)
            .map_err(|e| ChatError::config(format!("Failed to create QUIC config: {}", e)))?,
    ));
    quic_config.transport_config(Arc::new(transport_config));

    Ok(quic_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{FrameType, JoinRoom, ReceiveMessage, SendMessage};

    fn state() -> ServerState {
        ServerState::new(ChatConfig::default(), Arc::new(ChatEngine::default()))
    }

    fn request_bytes(request: Request) -> Vec<u8> {
        request
            .encode_frame()
            .unwrap()
            .encode_to_bytes()
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn test_server_creation() {
        let config = ChatConfig::default();
        let server = ChatServer::new(config.clone(), Arc::new(ChatEngine::default()));

        assert!(server.endpoint.is_none());
        assert_eq!(server.state.config.bind_addr, config.bind_addr);

        let stats = server.get_stats().await;
        assert_eq!(stats.connected_clients, 0);
        assert!(stats.bind_address.is_none());
        assert_eq!(stats.engine, EngineStats::default());
    }

    #[tokio::test]
    async fn test_serve_requires_bind() {
        let server = ChatServer::new(ChatConfig::default(), Arc::new(ChatEngine::default()));
        assert!(matches!(server.serve().await, Err(ChatError::Internal(_))));
    }

    #[tokio::test]
    async fn test_handle_request_dispatches() {
        let state = state();

        let data = request_bytes(Request::SendMessage(SendMessage {
            username: "alice".to_string(),
            text: "hi".to_string(),
            room: "general".to_string(),
        }));
        let reply = state.handle_request("conn", &data).await;
        assert_eq!(reply.frame_type(), FrameType::SendMessageReply);

        let data = request_bytes(Request::ReceiveMessage(ReceiveMessage {
            room: "general".to_string(),
            from_index: 0,
        }));
        match state.handle_request("conn", &data).await {
            Reply::ReceiveMessage(reply) => assert_eq!(reply.messages[0].text, "hi"),
            other => panic!("Unexpected reply: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_handle_request_rejects_garbage() {
        let state = state();

        let reply = state.handle_request("conn", &[0xFE, 0, 0, 0, 0]).await;
        match reply {
            Reply::Error(err) => assert_eq!(err.code, ErrorReply::INVALID_FRAME),
            other => panic!("Unexpected reply: {:?}", other),
        }

        let frame = Frame::new(FrameType::JoinRoom, r#"{"username":"bob"}"#);
        let reply = state
            .handle_request("conn", &frame.encode_to_bytes().unwrap())
            .await;
        match reply {
            Reply::Error(err) => assert_eq!(err.code, ErrorReply::INVALID_REQUEST),
            other => panic!("Unexpected reply: {:?}", other),
        }

        // Nothing reached the engine
        assert_eq!(
            state.dispatcher.engine().stats().await,
            EngineStats::default()
        );
    }

    #[tokio::test]
    async fn test_reply_frames_are_not_requests() {
        let state = state();
        let frame = Reply::Error(ErrorReply::invalid_frame("x"))
            .encode_frame()
            .unwrap();

        let reply = state
            .handle_request("conn", &frame.encode_to_bytes().unwrap())
            .await;
        assert!(reply.is_error());
    }

    #[tokio::test]
    async fn test_connection_tracking() {
        let state = state();
        state
            .add_connection(
                "c1",
                ClientConnection {
                    remote_addr: "127.0.0.1:5000".parse().unwrap(),
                    connected_at: current_timestamp(),
                },
            )
            .await;
        assert_eq!(state.connection_count().await, 1);

        state.remove_connection("c1").await;
        state.remove_connection("c1").await;
        assert_eq!(state.connection_count().await, 0);

        let data = request_bytes(Request::JoinRoom(JoinRoom {
            username: "bob".to_string(),
            room: "tech".to_string(),
        }));
        assert!(!state.handle_request("c2", &data).await.is_error());
    }

    #[test]
    fn test_connection_slots_are_exclusive() {
        let config = ChatConfig {
            max_connections: 2,
            ..ChatConfig::default()
        };
        let state = ServerState::new(config, Arc::new(ChatEngine::default()));

        let first = Arc::clone(&state.slots).try_acquire_owned().unwrap();
        let _second = Arc::clone(&state.slots).try_acquire_owned().unwrap();
        assert!(Arc::clone(&state.slots).try_acquire_owned().is_err());

        drop(first);
        assert!(Arc::clone(&state.slots).try_acquire_owned().is_ok());
    }
}
