//! `WsConnection<S>`: one accepted socket carried through the handshake
//! and into the WebSocket framing phase. The Rust analog of `MS` — a
//! `Transport` plus its `ReadState`, with no further collaborators.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::config::{BufferConfig, HandshakeConfig};
use crate::error::Error;
use crate::frame::{OpCode, ReadState};
use crate::handshake;
use crate::read::{self, ReadEvent};
use crate::transport::Transport;
use crate::write;

pub struct WsConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    transport: Transport<S>,
    state: ReadState,
}

impl<S> WsConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Run the handshake over `stream` and, on success, return a
    /// connection ready to exchange WebSocket frames. `is_secure` only
    /// affects what [`Transport::is_secure`] reports — `stream` must
    /// already be past any TLS handshake.
    pub async fn accept(
        stream: S,
        buffers: BufferConfig,
        is_secure: bool,
        config: &HandshakeConfig<S>,
    ) -> Result<Self, Error> {
        let mut transport = Transport::new(stream, buffers, is_secure)?;
        handshake::perform(&mut transport, config).await?;
        Ok(Self { transport, state: ReadState::new() })
    }

    /// Read the next data-frame payload chunk, blocking up to `deadline`
    /// (`None` blocks indefinitely). Ping/Pong/Close are handled
    /// transparently and never surface here.
    pub async fn read(&mut self, deadline: Option<Duration>) -> Result<ReadEvent<'_>, Error> {
        read::read(&mut self.transport, &mut self.state, deadline).await
    }

    pub async fn send_text(&mut self, text: &str) -> Result<(), Error> {
        write::write(&mut self.transport, OpCode::Text, text.as_bytes()).await
    }

    pub async fn send_binary(&mut self, data: &[u8]) -> Result<(), Error> {
        write::write(&mut self.transport, OpCode::Binary, data).await
    }

    /// Send a Close frame with `status_code` and report the connection as
    /// terminated. The Rust analog of `MS_close`.
    pub async fn close(&mut self, status_code: u16) -> Error {
        write::close(&mut self.transport, status_code).await
    }

    pub fn is_secure(&self) -> bool {
        self.transport.is_secure()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HandshakeConfig;
    use sha1::{Digest, Sha1};
    use tokio::io::duplex;

    fn accept_key(client_key: &str) -> String {
        let mut hasher = Sha1::new();
        hasher.update(client_key.as_bytes());
        hasher.update(crate::byteutil::WS_GUID.as_bytes());
        base64::Engine::encode(&base64::engine::general_purpose::STANDARD, hasher.finalize())
    }

    #[tokio::test]
    async fn accept_completes_handshake_and_exchanges_a_frame() {
        let (mut client, server) = duplex(8192);
        let request = b"GET /ws HTTP/1.1\r\nHost: localhost\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n";
        tokio::io::AsyncWriteExt::write_all(&mut client, request).await.unwrap();

        let config = HandshakeConfig::<tokio::io::DuplexStream>::default();
        let mut conn = WsConnection::accept(server, BufferConfig::default(), false, &config)
            .await
            .unwrap();

        let mut resp = [0u8; 256];
        let n = tokio::io::AsyncReadExt::read(&mut client, &mut resp).await.unwrap();
        let resp_text = String::from_utf8_lossy(&resp[..n]);
        assert!(resp_text.starts_with("HTTP/1.1 101 Switching Protocols"));
        assert!(resp_text.contains(&accept_key("dGhlIHNhbXBsZSBub25jZQ==")));

        let text_frame = [0x81u8, 0x83, 1, 2, 3, 4, b'a' ^ 1, b'b' ^ 2, b'c' ^ 3];
        tokio::io::AsyncWriteExt::write_all(&mut client, &text_frame).await.unwrap();

        match conn.read(None).await.unwrap() {
            ReadEvent::Data { opcode, payload } => {
                assert_eq!(opcode, OpCode::Text);
                assert_eq!(payload, b"abc");
            }
            ReadEvent::Timeout => panic!("expected data"),
        }
    }
}
