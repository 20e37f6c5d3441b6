use std::sync::Arc;

use rustls::ServerConfig as RustlsServerConfig;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Error;
use crate::transport::Transport;

/// Minimum send buffer size required by the zero-copy framing contract: two
/// header bytes plus a two-byte extended length reservation, with headroom
/// for the smallest useful payload. Mirrors spec.md's `send_cap >= 128`
/// invariant.
pub const MIN_SEND_BUF: usize = 128;

/// Default buffer sizes. Large enough to hold a typical HTTP upgrade
/// request/response and comfortably above [`MIN_SEND_BUF`].
const DEFAULT_BUF_SIZE: usize = 4096;

/// Sizes of the fixed recv/send buffers a [`Transport`](crate::transport::Transport)
/// allocates once at connection setup. Not resized afterwards: steady-state
/// reads and writes never allocate.
#[derive(Debug, Clone, Copy)]
pub struct BufferConfig {
    pub recv_size: usize,
    pub send_size: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            recv_size: DEFAULT_BUF_SIZE,
            send_size: DEFAULT_BUF_SIZE,
        }
    }
}

/// A callback invoked for `GET <path>` requests that did not carry a
/// `Sec-WebSocket-Key`, used to serve a static page stored on the device.
/// The analog of `MSFetchPage` / `WssProtocolHandshake::fetchPage`.
///
/// Returns `Ok(true)` if a response was written to `transport` (the
/// handshake then reports [`Error::NotWebSocket`]), `Ok(false)` if the
/// callback declined to handle the path (the handshake falls through to a
/// 404), or `Err` to abort the connection.
#[async_trait::async_trait]
pub trait FetchPage<S>: Send + Sync
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn fetch(&self, transport: &mut Transport<S>, path: &str) -> Result<bool, Error>;
}

/// Configuration for one handshake: optional HTTP Basic credential check
/// and an optional static-page fetch callback. The Rust analog of
/// `WssProtocolHandshake`'s in-parameters.
#[derive(Clone)]
pub struct HandshakeConfig<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Base64-encoded `username:password`. When set, every non-matching
    /// request is answered with 401 before the upgrade/static-GET/404
    /// branches are considered.
    pub b64_credentials: Option<String>,
    /// Realm string for the `WWW-Authenticate` challenge. Defaults to
    /// `SharkSSL`, matching the original source's fallback.
    pub realm: String,
    /// Optional static-page callback for non-upgrade `GET` requests.
    pub fetch_page: Option<Arc<dyn FetchPage<S>>>,
}

impl<S> Default for HandshakeConfig<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn default() -> Self {
        Self {
            b64_credentials: None,
            realm: "SharkSSL".to_string(),
            fetch_page: None,
        }
    }
}

impl<S> std::fmt::Debug for HandshakeConfig<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandshakeConfig")
            .field("b64_credentials", &self.b64_credentials.as_ref().map(|_| "<redacted>"))
            .field("realm", &self.realm)
            .field("fetch_page", &self.fetch_page.is_some())
            .finish()
    }
}

/// Top-level server configuration: buffer sizing plus an optional TLS
/// acceptor configuration. The Rust analog of the C source's `#ifdef
/// MS_SEC` compile-time switch between secure and non-secure `MST`.
#[derive(Clone, Default)]
pub struct ServerConfig {
    pub buffers: BufferConfig,
    pub tls_config: Option<Arc<RustlsServerConfig>>,
}
