//! Chat server: request dispatch and the QUIC RPC transport
//!
//! ## Stream Layout
//!
//! Every request travels on its own bidirectional stream. The client writes
//! one request frame and finishes; the server writes one reply frame and
//! finishes. There is no server push: clients poll with `ReceiveMessage`.

pub mod dispatcher;
pub mod rpc_server;

pub use dispatcher::Dispatcher;
pub use rpc_server::{ChatServer, ClientConnection, ServerStats};
