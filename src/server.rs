//! Accept-loop glue: bind a listener, optionally negotiate TLS, run the
//! handshake, and hand the caller a [`WsConnection`] per accepted socket.
//! Unlike the teacher's `server.rs`, there is no `mpsc`/`EventStream`
//! multiplexing layer — each accepted connection is cooperatively driven
//! by its own independently owned `WsConnection<S>`, matching this core's
//! one-connection-per-instance invariant (spec.md §5).

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{error, info};
use rustls::ServerConfig as RustlsServerConfig;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;

use crate::config::{BufferConfig, HandshakeConfig};
use crate::connection::WsConnection;
use crate::error::Error;

/// Accept plain-TCP connections on `addr`, spawning `handler` for each one
/// that completes the WebSocket handshake.
pub async fn serve_tcp<F, Fut>(
    addr: SocketAddr,
    buffers: BufferConfig,
    handshake_config: HandshakeConfig<TcpStream>,
    handler: F,
) -> std::io::Result<()>
where
    F: Fn(WsConnection<TcpStream>) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    info!("listening on {}", addr);
    loop {
        let (stream, peer) = listener.accept().await?;
        let handshake_config = handshake_config.clone();
        let handler = handler.clone();
        tokio::spawn(async move {
            match WsConnection::accept(stream, buffers, false, &handshake_config).await {
                Ok(conn) => handler(conn).await,
                Err(err) => error!("handshake with {} failed: {}", peer, err),
            }
        });
    }
}

/// Accept TLS connections on `addr` using `tls_config`, spawning `handler`
/// for each one that completes the TLS negotiation and the WebSocket
/// handshake.
pub async fn serve_tls<F, Fut>(
    addr: SocketAddr,
    buffers: BufferConfig,
    tls_config: Arc<RustlsServerConfig>,
    handshake_config: HandshakeConfig<TlsStream<TcpStream>>,
    handler: F,
) -> std::io::Result<()>
where
    F: Fn(WsConnection<TlsStream<TcpStream>>) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    let acceptor = TlsAcceptor::from(tls_config);
    info!("listening on {} (tls)", addr);
    loop {
        let (stream, peer) = listener.accept().await?;
        let acceptor = acceptor.clone();
        let handshake_config = handshake_config.clone();
        let handler = handler.clone();
        tokio::spawn(async move {
            let tls_stream = match acceptor.accept(stream).await {
                Ok(s) => s,
                Err(source) => {
                    let err = Error::SslHandshake;
                    error!("TLS handshake with {} failed: {} ({})", peer, err, source);
                    return;
                }
            };
            match WsConnection::accept(tls_stream, buffers, true, &handshake_config).await {
                Ok(conn) => handler(conn).await,
                Err(err) => error!("handshake with {} failed: {}", peer, err),
            }
        });
    }
}
