//! The single-connection I/O core: one socket, one fixed recv buffer, one
//! fixed send buffer, reused for the whole lifetime of the connection.
//!
//! This is the Rust shape of the original C source's `MST` plus the
//! `MS_rawRead`/`MS_write` pair — generic over the underlying stream so the
//! same code serves plain TCP and TLS (`tokio_rustls::server::TlsStream`)
//! without a compile-time `MS_SEC` switch.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use crate::config::{BufferConfig, MIN_SEND_BUF};
use crate::error::Error;

/// One socket plus its fixed recv/send buffers. Allocates exactly twice,
/// at construction, and never again: `read`/`write` only move bytes within
/// the buffers already owned.
pub struct Transport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    stream: S,
    recv: Box<[u8]>,
    send: Box<[u8]>,
    /// Start of unconsumed bytes within `recv`.
    recv_pos: usize,
    /// End of valid bytes within `recv` (exclusive).
    recv_len: usize,
    is_secure: bool,
}

impl<S> Transport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, buffers: BufferConfig, is_secure: bool) -> Result<Self, Error> {
        if buffers.send_size < MIN_SEND_BUF {
            return Err(Error::Alloc);
        }
        Ok(Self {
            stream,
            recv: vec![0u8; buffers.recv_size].into_boxed_slice(),
            send: vec![0u8; buffers.send_size].into_boxed_slice(),
            recv_pos: 0,
            recv_len: 0,
            is_secure,
        })
    }

    pub fn is_secure(&self) -> bool {
        self.is_secure
    }

    /// The whole send buffer, for frame headers to be written in place
    /// before the payload that follows them.
    pub fn send_buf(&mut self) -> &mut [u8] {
        &mut self.send
    }

    pub fn send_buf_size(&self) -> usize {
        self.send.len()
    }

    /// Unconsumed bytes already sitting in the recv buffer from a previous
    /// socket read (frame-boundary overflow carried across `read` calls).
    pub fn buffered(&self) -> &[u8] {
        &self.recv[self.recv_pos..self.recv_len]
    }

    pub fn consume(&mut self, n: usize) {
        debug_assert!(self.recv_pos + n <= self.recv_len);
        self.recv_pos += n;
    }

    /// XOR-unmask the first `take` bytes of the buffered region in place
    /// with `mask`, cycling from `mask_offset` (RFC 6455 Section 5.3:
    /// `orig-octet-i = masked-octet-i XOR mask[i mod 4]`), consume them,
    /// and return the decoded slice.
    pub fn unmask_front(&mut self, take: usize, mask: [u8; 4], mask_offset: usize) -> &[u8] {
        let start = self.recv_pos;
        for i in 0..take {
            self.recv[start + i] ^= mask[(mask_offset + i) & 3];
        }
        self.recv_pos += take;
        &self.recv[start..start + take]
    }

    /// Discard the consumed prefix, pull more bytes from the socket, and
    /// return every unconsumed byte now available (including whatever was
    /// already buffered). A `deadline` of `None` blocks indefinitely (used
    /// inside an established WebSocket connection); `Some(d)` bounds the
    /// wait (used during the handshake). A deadline elapsing with no bytes
    /// read is not an error: it returns the buffer unchanged, mirroring
    /// the original "zero-length return means timeout" contract.
    pub async fn read(&mut self, deadline: Option<Duration>) -> Result<&[u8], Error> {
        if self.recv_pos > 0 {
            self.recv.copy_within(self.recv_pos..self.recv_len, 0);
            self.recv_len -= self.recv_pos;
            self.recv_pos = 0;
        }
        if self.recv_len == self.recv.len() {
            return Err(Error::HttpHeaderOverflow);
        }
        let read_fut = self.stream.read(&mut self.recv[self.recv_len..]);
        let n = match deadline {
            Some(d) => match timeout(d, read_fut).await {
                Ok(result) => Some(result?),
                Err(_) => None,
            },
            None => Some(read_fut.await?),
        };
        match n {
            Some(0) => {
                return Err(Error::Read {
                    source: std::io::Error::from(std::io::ErrorKind::UnexpectedEof),
                })
            }
            Some(n) => self.recv_len += n,
            None => {}
        }
        Ok(&self.recv[self.recv_pos..self.recv_len])
    }

    /// Flush the first `len` bytes of `send_buf()` to the socket. Callers
    /// assemble a header (and, for the handshake, a whole HTTP response)
    /// directly into `send_buf()` and pass the total length here, so a send
    /// never copies through an intermediate buffer — the Rust analog of
    /// `MST_write(&o->mst, 0, len)`'s zero-copy path.
    pub async fn write_send_buf(&mut self, len: usize) -> Result<(), Error> {
        debug_assert!(len <= self.send.len());
        self.stream.write_all(&self.send[..len]).await.map_err(|_| Error::Write)?;
        self.stream.flush().await.map_err(|_| Error::Write)?;
        Ok(())
    }
}
