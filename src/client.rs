//! QUIC-based chat client implementation
//!
//! This module provides a client for the chat RPC server. Each call opens a
//! fresh bidirectional stream on the shared connection, writes one request
//! frame and waits for the single reply frame.

use crate::error::{ChatError, Result};
use crate::protocol::messages::*;
use crate::protocol::{Encodable, FRAME_HEADER_SIZE, Frame, MAX_FRAME_SIZE, Reply, Request};
use crate::{ALPN_PROTOCOL, Message, RoomInfo};
use quinn::{ClientConfig as QuinnClientConfig, Connection, Endpoint};
use rustls::crypto::CryptoProvider;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Chat client configuration
#[derive(Clone, Debug)]
pub struct ChatClientConfig {
    /// Server address to connect to
    pub server_addr: SocketAddr,
    /// Client bind address (use 0.0.0.0:0 for auto)
    pub bind_addr: SocketAddr,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Keep-alive interval in seconds
    pub keep_alive_secs: u64,
    /// Maximum reply size in bytes, frame header included
    pub max_reply_size: usize,
}

impl Default for ChatClientConfig {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([127, 0, 0, 1], 4433)),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 0)),
            connect_timeout_secs: 10,
            keep_alive_secs: 5,
            max_reply_size: FRAME_HEADER_SIZE + MAX_FRAME_SIZE,
        }
    }
}

/// QUIC-based chat client
pub struct ChatClient {
    config: ChatClientConfig,
    username: Option<String>,
    connection: Option<Connection>,
    endpoint: Option<Endpoint>,
}

impl ChatClient {
    /// Create a new chat client with the given configuration
    pub fn new(config: ChatClientConfig) -> Self {
        Self {
            config,
            username: None,
            connection: None,
            endpoint: None,
        }
    }

    /// Connect to the chat server; requests are made as `username`
    pub async fn connect(&mut self, username: impl Into<String>) -> Result<()> {
        info!("Connecting to chat server at {}", self.config.server_addr);

        let client_config = self.configure_client()?;

        let mut endpoint = Endpoint::client(self.config.bind_addr)
            .map_err(|e| ChatError::network(format!("Failed to create endpoint: {}", e)))?;
        endpoint.set_default_client_config(client_config);

        let connecting = endpoint
            .connect(self.config.server_addr, "localhost")
            .map_err(|e| ChatError::connection(format!("Failed to initiate connection: {}", e)))?;

        let connection = tokio::time::timeout(
            Duration::from_secs(self.config.connect_timeout_secs),
            connecting,
        )
        .await
        .map_err(|_| ChatError::timeout("Connection timeout"))?
        .map_err(|e| ChatError::connection(format!("Failed to connect: {}", e)))?;

        info!("Successfully connected to server");
        self.endpoint = Some(endpoint);
        self.connection = Some(connection);
        self.username = Some(username.into());
        Ok(())
    }

    /// Configure the QUIC client
    fn configure_client(&self) -> Result<QuinnClientConfig> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());

        // The server presents a fresh self-signed certificate on every start,
        // so there is no chain to validate against.
        let mut crypto = rustls::ClientConfig::builder_with_provider(Arc::clone(&provider))
            .with_protocol_versions(&[&rustls::version::TLS13])?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate(provider)))
            .with_no_client_auth();

        crypto.alpn_protocols = vec![ALPN_PROTOCOL.to_vec()];

        let mut transport_config = quinn::TransportConfig::default();
        transport_config.keep_alive_interval(Some(Duration::from_secs(
            self.config.keep_alive_secs,
        )));

        let mut client_config = QuinnClientConfig::new(Arc::new(
            quinn::crypto::rustls::QuicClientConfig::try_from(crypto)
                .map_err(|e| ChatError::config(format!("Failed to create QUIC config: {}", e)))?,
        ));
        client_config.transport_config(Arc::new(transport_config));

        Ok(client_config)
    }

    fn connection(&self) -> Result<&Connection> {
        self.connection
            .as_ref()
            .ok_or_else(|| ChatError::connection("Not connected to server"))
    }

    fn username_owned(&self) -> Result<String> {
        self.username
            .clone()
            .ok_or_else(|| ChatError::internal("Username not set"))
    }

    /// Send one request and wait for its reply.
    ///
    /// An error reply from the server becomes [`ChatError::Server`].
    pub async fn call(&self, request: Request) -> Result<Reply> {
        let connection = self.connection()?;
        let operation = request.operation();

        let data = request.encode_frame()?.encode_to_bytes()?;

        let (mut send_stream, mut recv_stream) = connection.open_bi().await?;
        send_stream.write_all(&data).await?;
        send_stream.finish()?;

        let reply_data = recv_stream.read_to_end(self.config.max_reply_size).await?;
        let frame = Frame::decode_complete(&reply_data)
            .map_err(|e| ChatError::protocol(format!("Invalid reply frame: {}", e)))?;
        let reply = Reply::decode(&frame)
            .map_err(|e| ChatError::protocol(format!("Invalid reply: {}", e)))?;

        debug!("{} answered with {:?}", operation, reply.frame_type());

        match reply {
            Reply::Error(err) => Err(ChatError::server(format!(
                "{} (code {})",
                err.message, err.code
            ))),
            reply => Ok(reply),
        }
    }

    /// Post `text` to `room` as the connected user
    pub async fn send_message(&self, room: &str, text: &str) -> Result<bool> {
        let request = Request::SendMessage(SendMessage {
            username: self.username_owned()?,
            text: text.to_string(),
            room: room.to_string(),
        });

        match self.call(request).await? {
            Reply::SendMessage(reply) => Ok(reply.success),
            other => Err(unexpected_reply("SendMessage", &other)),
        }
    }

    /// Fetch messages of `room` from index `from_index` onwards.
    ///
    /// A long backlog comes back in pages: advance the cursor by the number of
    /// messages returned and ask again until the reply is empty.
    pub async fn receive_messages(&self, room: &str, from_index: i64) -> Result<Vec<Message>> {
        let request = Request::ReceiveMessage(ReceiveMessage {
            room: room.to_string(),
            from_index,
        });

        match self.call(request).await? {
            Reply::ReceiveMessage(reply) => Ok(reply.messages),
            other => Err(unexpected_reply("ReceiveMessage", &other)),
        }
    }

    /// List every room on the server
    pub async fn list_rooms(&self) -> Result<Vec<RoomInfo>> {
        match self.call(Request::ListRooms(ListRooms {})).await? {
            Reply::ListRooms(reply) => Ok(reply.rooms),
            other => Err(unexpected_reply("ListRooms", &other)),
        }
    }

    /// Join `room`, creating it if needed
    pub async fn join_room(&self, room: &str) -> Result<JoinRoomReply> {
        let request = Request::JoinRoom(JoinRoom {
            username: self.username_owned()?,
            room: room.to_string(),
        });

        match self.call(request).await? {
            Reply::JoinRoom(reply) => Ok(reply),
            other => Err(unexpected_reply("JoinRoom", &other)),
        }
    }

    /// Leave `room`
    pub async fn leave_room(&self, room: &str) -> Result<LeaveRoomReply> {
        let request = Request::LeaveRoom(LeaveRoom {
            username: self.username_owned()?,
            room: room.to_string(),
        });

        match self.call(request).await? {
            Reply::LeaveRoom(reply) => Ok(reply),
            other => Err(unexpected_reply("LeaveRoom", &other)),
        }
    }

    /// Disconnect from the chat server
    pub async fn disconnect(&mut self) -> Result<()> {
        if let Some(connection) = self.connection.take() {
            connection.close(0u32.into(), b"Client disconnect");
            info!("Disconnected from chat server");
        }

        if let Some(endpoint) = self.endpoint.take() {
            endpoint.wait_idle().await;
        }

        self.username = None;
        Ok(())
    }

    /// Get the connected username
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Check if connected to server
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }
}

fn unexpected_reply(operation: &str, reply: &Reply) -> ChatError {
    ChatError::protocol(format!(
        "Unexpected reply to {}: {:?}",
        operation,
        reply.frame_type()
    ))
}

/// Certificate verifier that trusts any server certificate but still checks
/// handshake signatures against it
#[derive(Debug)]
struct AcceptAnyCertificate(Arc<CryptoProvider>);

impl rustls::client::danger::ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
