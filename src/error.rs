use std::io;
use std::str::Utf8Error;
use thiserror::Error;

/// Negative-integer error taxonomy from the Minnow Server API boundary
/// (`MS_ERR_*` in the original C source), expressed as a Rust enum instead
/// of signed return codes.
#[derive(Error, Debug)]
pub enum Error {
    /// The send buffer was too small to assemble a handshake response or a
    /// frame header. Corresponds to `MS_ERR_ALLOC`.
    #[error("send buffer too small to assemble response")]
    Alloc,

    /// `Authorization: Basic` did not match the configured credentials.
    /// Corresponds to `MS_ERR_AUTHENTICATION`.
    #[error("HTTP basic authentication failed")]
    Authentication,

    /// More than 20 headers, or the header block overflowed the scratch
    /// buffer. Corresponds to `MS_ERR_HTTP_HEADER_OVERFLOW`.
    #[error("HTTP header count or size exceeded the scratch buffer")]
    HttpHeaderOverflow,

    /// No request line could be found in the accumulated header block.
    /// Corresponds to `MS_ERR_INVALID_HTTP`.
    #[error("invalid or missing HTTP request line")]
    InvalidHttp,

    /// The HTTP request was answered successfully but did not upgrade to a
    /// WebSocket connection (static GET or 404). Corresponds to
    /// `MS_ERR_NOT_WEBSOCKET`.
    #[error("request handled but did not upgrade to WebSocket")]
    NotWebSocket,

    /// Transport read failed outright (not a timeout). Corresponds to
    /// `MS_ERR_READ`.
    #[error("transport read failed: {source}")]
    Read {
        #[from]
        source: io::Error,
    },

    /// Transport read exceeded its deadline during the handshake.
    /// Corresponds to `MS_ERR_READ_TMO`.
    #[error("transport read timed out")]
    ReadTimeout,

    /// TLS negotiation failed before any HTTP bytes were parsed.
    /// Corresponds to `MS_ERR_SSL_HANDSHAKE`.
    #[error("TLS handshake failed")]
    SslHandshake,

    /// Transport write failed. Corresponds to `MS_ERR_WRITE`.
    #[error("transport write failed")]
    Write,

    /// `send`'s `len` exceeded what the header form reserved by `prep_send`
    /// can represent. Corresponds to `MS_ERR_BUF_OVERFLOW`.
    #[error("frame payload length {0} overflows the reserved header form")]
    BufOverflow(usize),

    /// `send`'s `len` was too small for the extended header form reserved by
    /// `prep_send`. Corresponds to `MS_ERR_BUF_UNDERFLOW`.
    #[error("frame payload length {0} underflows the reserved extended header form")]
    BufUnderflow(usize),

    /// A text frame's payload was not valid UTF-8. Checked in place against
    /// the borrowed payload slice, so this never allocates to validate.
    #[error("text frame payload was not valid UTF-8: {source}")]
    InvalidUtf8 {
        #[from]
        source: Utf8Error,
    },

    /// The peer's Close frame (or our own emitted Close), carrying the
    /// negated status code that terminates the connection. Surfaced as an
    /// error so callers unwind their read loop the same way they would on
    /// any other error, matching `MS_close`'s inverted-status-code return.
    #[error("WebSocket connection closed with status code {0}")]
    Closed(i32),
}
