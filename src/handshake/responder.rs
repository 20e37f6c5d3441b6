//! Assembles the HTTP response for one handshake: 401 challenge, 101
//! upgrade, static-GET via the [`FetchPage`](crate::config::FetchPage)
//! callback, or 404. A direct port of the credential check and four-way
//! branch in `MS_webServer`, plus `msRespCT`.

use std::time::Duration;

use log::{info, warn};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::byteutil::{websocket_accept_value, Cursor};
use crate::config::HandshakeConfig;
use crate::error::Error;
use crate::handshake::parser::ParsedRequest;
use crate::transport::Transport;

/// Default close headers appended to 401/404 responses and to the
/// static-GET helper's header block (`msRespCT`'s `httpEOR`). The 101
/// upgrade response does not use this — see [`UPGRADE_EOR`].
const HTTP_EOR: &[u8] = b"\r\nConnection: Close\r\nServer: SharkSSL WebSocket Server\r\n\r\n";
/// Plain header-block terminator used only by the 101 Switching Protocols
/// response, which stays open as a WebSocket connection rather than closing.
const UPGRADE_EOR: &[u8] = b"\r\n\r\n";
const SAFARI_DRAIN_TIMEOUT: Duration = Duration::from_millis(300);

/// Check `Authorization: Basic <creds>` against the configured
/// credentials. `None` configured credentials means no check is
/// performed. The Rust analog of `wssCheckCredentials`.
fn credentials_match(configured: &str, auth_header: Option<&[u8]>) -> bool {
    let Some(auth) = auth_header else { return false };
    let Some(space) = auth.iter().position(|&b| b == b' ') else { return false };
    let rest = &auth[space..];
    let creds = rest.trim_ascii_start();
    creds == configured.as_bytes()
}

/// Assemble an `HTTP/1.0 200 OK` response with a `Content-Length` header
/// and optional extra header bytes directly into `transport`'s send
/// buffer, for use by a [`FetchPage`](crate::config::FetchPage)
/// implementation. The Rust analog of `MS_respCT`/`msRespCT`.
pub fn write_ok_with_content_length<S>(
    transport: &mut Transport<S>,
    content_len: usize,
    extra_header: Option<&[u8]>,
) -> Result<usize, Error>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let mut cursor = Cursor::new(transport.send_buf());
    cursor.write(b"HTTP/1.0 200 OK\r\nContent-Length: ")?;
    cursor.write_decimal(content_len as u32)?;
    if let Some(extra) = extra_header {
        cursor.write(extra)?;
    }
    cursor.write(HTTP_EOR)?;
    Ok(cursor.len())
}

/// Run the four-way handshake decision (401 / 101 upgrade / static GET /
/// 404) and write the chosen response. Returns `Ok(())` when an upgrade
/// response (101) was sent — the connection is now in WebSocket mode —
/// or `Err(Error::NotWebSocket)` when a non-upgrade response (401/static
/// GET/404) was sent and the connection should remain plain HTTP (or
/// close). The Rust analog of the body of `MS_webServer` after header
/// parsing.
pub async fn respond<S>(
    transport: &mut Transport<S>,
    config: &HandshakeConfig<S>,
    parsed: &ParsedRequest,
) -> Result<(), Error>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let request_line = parsed.slice(transport.buffered(), &parsed.request_line).to_vec();
    let auth = parsed.auth.as_ref().map(|r| parsed.slice(transport.buffered(), r).to_vec());
    let key = parsed.key.as_ref().map(|r| parsed.slice(transport.buffered(), r).to_vec());
    let delay_on_send = parsed.safari_user_agent;

    if let Some(configured) = &config.b64_credentials {
        if !credentials_match(configured, auth.as_deref()) {
            write_unauthorized(transport, &config.realm).await?;
            return Err(Error::Authentication);
        }
    }

    if let Some(key) = key {
        write_upgrade(transport, &key).await?;
        return Ok(());
    }

    // Not a WebSocket request: try a GET-path static response, else 404.
    let mut served = false;
    if request_line.len() >= 4 && &request_line[..3] == b"GET" {
        let mut path_start = 3;
        while path_start < request_line.len() && request_line[path_start] == b' ' {
            path_start += 1;
        }
        let mut path_end = path_start;
        while path_end < request_line.len() && request_line[path_end] != b' ' {
            path_end += 1;
        }
        if path_end > path_start {
            if let Some(fetch_page) = &config.fetch_page {
                let path = String::from_utf8_lossy(&request_line[path_start..path_end]).into_owned();
                served = fetch_page.fetch(transport, &path).await?;
                if served && delay_on_send {
                    // Safari workaround: best-effort drain read, ignore the
                    // outcome either way.
                    let _ = transport.read(Some(SAFARI_DRAIN_TIMEOUT)).await;
                }
            }
        }
    }

    if !served {
        write_not_found(transport).await?;
    }
    Err(Error::NotWebSocket)
}

async fn write_unauthorized<S>(transport: &mut Transport<S>, realm: &str) -> Result<(), Error>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    warn!("handshake rejected: bad credentials");
    let len = {
        let mut cursor = Cursor::new(transport.send_buf());
        cursor.write(b"HTTP/1.0 401 Unauthorized\r\nContent-Length: 21\r\nWWW-Authenticate: Basic realm=\"")?;
        cursor.write(realm.as_bytes())?;
        cursor.write(b"\"")?;
        cursor.write(HTTP_EOR)?;
        cursor.write(b"<h1>Unauthorized</h1>")?;
        cursor.len()
    };
    transport.write_send_buf(len).await
}

async fn write_upgrade<S>(transport: &mut Transport<S>, key: &[u8]) -> Result<(), Error>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    info!("WebSocket upgrade accepted");
    let len = {
        let mut cursor = Cursor::new(transport.send_buf());
        cursor.write(b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: ")?;
        websocket_accept_value(key, &mut cursor)?;
        cursor.write(UPGRADE_EOR)?;
        cursor.len()
    };
    transport.write_send_buf(len).await
}

async fn write_not_found<S>(transport: &mut Transport<S>) -> Result<(), Error>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let len = {
        let mut cursor = Cursor::new(transport.send_buf());
        cursor.write(b"HTTP/1.0 404 Not Found\r\nContent-Length: 18")?;
        cursor.write(HTTP_EOR)?;
        cursor.write(b"<h1>Not Found</h1>")?;
        cursor.len()
    };
    transport.write_send_buf(len).await
}
