//! HTTP-to-WebSocket upgrade handshake: header accumulation/parsing
//! ([`parser`]) followed by the 401/101/static-GET/404 response decision
//! ([`responder`]). Together the Rust analog of `MS_webServer`.

pub mod parser;
pub mod responder;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::config::HandshakeConfig;
use crate::error::Error;
use crate::transport::Transport;

/// Run one full handshake attempt over `transport`: parse the HTTP
/// request, then answer it. Returns `Ok(())` once a `101 Switching
/// Protocols` response has been sent and the connection is ready to speak
/// the WebSocket framing protocol.
pub async fn perform<S>(transport: &mut Transport<S>, config: &HandshakeConfig<S>) -> Result<(), Error>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let parsed = parser::parse_request(transport).await?;
    responder::respond(transport, config, &parsed).await
}
