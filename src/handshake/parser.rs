//! HTTP request-line/header accumulation ahead of the WebSocket upgrade
//! decision. A port of the header-accumulation loop at the top of
//! `MS_webServer`, adapted to this crate's append-into-recv-buffer
//! `Transport::read` instead of the original's per-call buffer overwrite
//! (so the send-buffer-as-scratch spill the C source uses to survive a
//! header spanning more than one socket read is unnecessary here — see
//! DESIGN.md).

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::byteutil::find;
use crate::error::Error;
use crate::transport::Transport;

/// Maximum number of `key: value` header lines kept, beyond the request
/// line. Matches `MAX_HTTP_H_SIZE` in the original source.
pub const MAX_HEADERS: usize = 20;

const HTTP_END_MARKER: &[u8] = b"\r\n\r\n";
const HANDSHAKE_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// A `key: value` header line, as a byte range into the transport's recv
/// buffer.
#[derive(Clone, Copy)]
pub struct HeaderRange {
    pub key: std::ops::Range<usize>,
    pub value: std::ops::Range<usize>,
}

/// The request line plus extracted header ranges, all indices into
/// whatever `transport.buffered()` holds at the moment parsing finished.
/// Valid only until the next call to `Transport::read`/`consume` — callers
/// must finish using it (typically to build the handshake response)
/// before reading again.
pub struct ParsedRequest {
    pub request_line: std::ops::Range<usize>,
    pub headers: [HeaderRange; MAX_HEADERS],
    pub header_count: usize,
    pub origin: Option<std::ops::Range<usize>>,
    pub key: Option<std::ops::Range<usize>>,
    pub auth: Option<std::ops::Range<usize>>,
    pub safari_user_agent: bool,
}

impl ParsedRequest {
    pub fn slice<'a>(&self, buf: &'a [u8], range: &std::ops::Range<usize>) -> &'a [u8] {
        &buf[range.clone()]
    }
}

/// Read and accumulate HTTP request bytes into the transport's recv
/// buffer until the blank-line header terminator is found, then split it
/// into a request line and up to [`MAX_HEADERS`] header lines. The Rust
/// analog of `MS_webServer`'s header-accumulation loop plus its
/// `\r\n`-splitting pass.
pub async fn parse_request<S>(transport: &mut Transport<S>) -> Result<ParsedRequest, Error>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let end = loop {
        if let Some(end) = find(transport.buffered(), HTTP_END_MARKER) {
            break end;
        }
        let before = transport.buffered().len();
        let buf = transport.read(Some(HANDSHAKE_READ_TIMEOUT)).await?;
        if buf.len() == before {
            return Err(Error::ReadTimeout);
        }
    };
    let header_end = end + HTTP_END_MARKER.len();

    let mut headers: [HeaderRange; MAX_HEADERS] = [HeaderRange { key: 0..0, value: 0..0 }; MAX_HEADERS];
    let mut header_count = 0usize;
    let mut request_line: Option<std::ops::Range<usize>> = None;
    let mut origin = None;
    let mut key = None;
    let mut auth = None;
    let mut safari_user_agent = false;

    let buf = transport.buffered();
    let mut pos = 0usize;
    while pos < header_end {
        let rest = &buf[pos..header_end];
        let Some(nl) = find(rest, b"\r\n") else { break };
        let line = pos..pos + nl;
        pos += nl + 2;

        if request_line.is_none() {
            request_line = Some(line);
            continue;
        }
        if line.is_empty() {
            break;
        }
        let Some(colon) = find(&buf[line.clone()], b":") else { continue };
        let key_range = line.start..line.start + colon;
        let mut val_start = line.start + colon + 1;
        while val_start < line.end && buf[val_start] == b' ' {
            val_start += 1;
        }
        let value_range = val_start..line.end;
        if header_count == MAX_HEADERS {
            return Err(Error::HttpHeaderOverflow);
        }
        headers[header_count] = HeaderRange { key: key_range.clone(), value: value_range.clone() };
        header_count += 1;

        let key_bytes = &buf[key_range];
        if key.is_none() && crate::byteutil::starts_with_ci(key_bytes, b"sec-websocket-key") {
            key = Some(value_range.clone());
        } else if origin.is_none() && crate::byteutil::starts_with_ci(key_bytes, b"origin") {
            origin = Some(value_range.clone());
        } else if crate::byteutil::starts_with_ci(key_bytes, b"authorization") {
            auth = Some(value_range.clone());
        } else if crate::byteutil::starts_with_ci(key_bytes, b"user-agent")
            && find(&buf[value_range.clone()], b"Safari").is_some()
        {
            safari_user_agent = true;
        }
    }

    let Some(request_line) = request_line else {
        return Err(Error::InvalidHttp);
    };

    Ok(ParsedRequest {
        request_line,
        headers,
        header_count,
        origin,
        key,
        auth,
        safari_user_agent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BufferConfig;
    use tokio::io::duplex;

    #[tokio::test]
    async fn parses_request_line_and_websocket_key() {
        let (mut client, server) = duplex(4096);
        let mut transport = Transport::new(server, BufferConfig::default(), false).unwrap();
        let request = b"GET /chat HTTP/1.1\r\nHost: example.com\r\nSec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\nUpgrade: websocket\r\n\r\n";
        tokio::io::AsyncWriteExt::write_all(&mut client, request).await.unwrap();

        let parsed = parse_request(&mut transport).await.unwrap();
        let buf = transport.buffered();
        assert_eq!(parsed.slice(buf, &parsed.request_line), b"GET /chat HTTP/1.1");
        let key = parsed.key.expect("key header found");
        assert_eq!(parsed.slice(buf, &key), b"dGhlIHNhbXBsZSBub25jZQ==");
        assert_eq!(parsed.header_count, 3);
    }

    #[tokio::test]
    async fn flags_safari_user_agent() {
        let (mut client, server) = duplex(4096);
        let mut transport = Transport::new(server, BufferConfig::default(), false).unwrap();
        let request = b"GET / HTTP/1.1\r\nUser-Agent: Mozilla/5.0 Safari/605\r\n\r\n";
        tokio::io::AsyncWriteExt::write_all(&mut client, request).await.unwrap();

        let parsed = parse_request(&mut transport).await.unwrap();
        assert!(parsed.safari_user_agent);
    }

    #[tokio::test]
    async fn empty_request_line_is_accepted_as_empty() {
        // An empty first line before the terminator parses without error;
        // it's the upgrade/static-GET decision downstream that rejects it.
        let (mut client, server) = duplex(4096);
        let mut transport = Transport::new(server, BufferConfig::default(), false).unwrap();
        tokio::io::AsyncWriteExt::write_all(&mut client, b"\r\n\r\n").await.unwrap();

        let parsed = parse_request(&mut transport).await.unwrap();
        let buf = transport.buffered();
        assert_eq!(parsed.slice(buf, &parsed.request_line), b"");
    }
}
