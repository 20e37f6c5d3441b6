//! Embedded-grade, single-connection WebSocket core for the Tokio stack.
//!
//! This crate implements the server side of [RFC 6455](https://datatracker.ietf.org/doc/html/rfc6455)
//! against a pair of fixed-size, caller-owned buffers: one HTTP upgrade
//! handshake, then masked data/control frames, with no allocation on the
//! steady-state read/write path. It deliberately does not implement
//! fragmentation, permessage-deflate, HTTP keep-alive, or multiplexing of
//! more than one connection within a single protocol instance — see
//! [`connection::WsConnection`] for the type that ties the pieces together,
//! and [`server`] for the accept-loop glue that drives one instance per
//! accepted socket.

pub mod byteutil;
pub mod config;
mod connection;
pub mod error;
pub mod frame;
pub mod handshake;
mod read;
pub mod server;
pub mod transport;
mod write;

pub use config::{BufferConfig, FetchPage, HandshakeConfig, ServerConfig};
pub use connection::WsConnection;
pub use error::Error;
pub use frame::OpCode;
pub use read::ReadEvent;
pub use transport::Transport;
