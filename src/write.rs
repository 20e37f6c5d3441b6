//! Zero-copy frame assembly and send. A direct port of `MS_prepSend`,
//! `MS_send`, `MS_write` and `MS_close` from the original C source: the
//! frame header is written into the same buffer the caller fills the
//! payload into, and `Transport::write_send_buf` flushes header and
//! payload in one syscall.

use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Error;
use crate::frame::{OpCode, MAX_FRAME_LEN};
use crate::transport::Transport;

/// Reserve header space at the front of the send buffer and return the
/// offset the payload should be written at, plus the maximum payload size
/// that still fits. `ext_size` requests the 4-byte extended-length header
/// (needed once the payload exceeds 125 bytes); the short 2-byte header is
/// used otherwise. The Rust analog of `MS_prepSend`.
pub fn prep_send<S>(transport: &mut Transport<S>, ext_size: bool) -> (usize, usize)
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let total = transport.send_buf_size();
    let buf = transport.send_buf();
    if ext_size {
        buf[1] = 126;
        (4, total.saturating_sub(4))
    } else {
        buf[1] = 0;
        (2, total.saturating_sub(2))
    }
}

/// Finalize the header reserved by [`prep_send`] for `len` bytes of
/// payload already written at its returned offset, then flush header and
/// payload together. The Rust analog of `MS_send`.
pub async fn send<S>(transport: &mut Transport<S>, opcode: OpCode, len: usize) -> Result<(), Error>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let header_len = {
        let buf = transport.send_buf();
        buf[0] = 0x80 | opcode.as_nibble(); // FIN always set: this core never fragments.
        if buf[1] == 126 {
            if len < 126 {
                return Err(Error::BufUnderflow(len));
            }
            if len > MAX_FRAME_LEN {
                return Err(Error::BufOverflow(len));
            }
            buf[2] = (len >> 8) as u8;
            buf[3] = len as u8;
            4
        } else {
            if len > 125 {
                return Err(Error::BufOverflow(len));
            }
            buf[1] = len as u8;
            2
        }
    };
    transport.write_send_buf(header_len + len).await
}

/// Write `data` as one or more complete frames with opcode `opcode`,
/// chunking across multiple frames when `data` is larger than one send
/// buffer can hold. The Rust analog of `MS_write`. Since this core never
/// fragments data frames, a message split across chunks here is a caller
/// that exceeded the buffer, not a protocol-level fragmented message —
/// every chunk goes out as its own independent complete frame.
pub async fn write<S>(transport: &mut Transport<S>, opcode: OpCode, data: &[u8]) -> Result<(), Error>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let mut remaining = data;
    loop {
        let (offset, max_len) = prep_send(transport, remaining.len() > 125);
        let chunk_len = remaining.len().min(max_len);
        transport.send_buf()[offset..offset + chunk_len].copy_from_slice(&remaining[..chunk_len]);
        send(transport, opcode, chunk_len).await?;
        remaining = &remaining[chunk_len..];
        if remaining.is_empty() {
            break;
        }
    }
    Ok(())
}

/// Send a Close frame with `status_code` (RFC 6455 Section 5.5.1, a 2-byte
/// big-endian code) and report the connection as closed. `status_code ==
/// 0` still sends a zero-value 2-byte code, matching the original source's
/// unconditional close-frame send. Returns the negated status code as an
/// [`Error::Closed`], the Rust analog of `MS_close`'s inverted-sign return
/// used by callers as a terminal error.
pub async fn close<S>(transport: &mut Transport<S>, status_code: u16) -> Error
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let (offset, _) = prep_send(transport, false);
    transport.send_buf()[offset] = (status_code >> 8) as u8;
    transport.send_buf()[offset + 1] = status_code as u8;
    let _ = send(transport, OpCode::Close, 2).await;
    Error::Closed(-(status_code as i32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BufferConfig;
    use tokio::io::duplex;

    #[tokio::test]
    async fn write_assembles_short_header_frame() {
        let (client, mut server) = duplex(4096);
        let mut transport = Transport::new(client, BufferConfig::default(), false).unwrap();
        write(&mut transport, OpCode::Text, b"hello").await.unwrap();

        let mut out = [0u8; 16];
        let n = tokio::io::AsyncReadExt::read(&mut server, &mut out).await.unwrap();
        assert_eq!(&out[..n], &[0x81, 5, b'h', b'e', b'l', b'l', b'o']);
    }

    #[tokio::test]
    async fn write_uses_extended_length_header_past_125_bytes() {
        let (client, mut server) = duplex(8192);
        let mut transport = Transport::new(client, BufferConfig::default(), false).unwrap();
        let payload = vec![0x42u8; 200];
        write(&mut transport, OpCode::Binary, &payload).await.unwrap();

        let mut out = [0u8; 8192];
        let n = tokio::io::AsyncReadExt::read(&mut server, &mut out).await.unwrap();
        assert_eq!(out[0], 0x82);
        assert_eq!(out[1], 126);
        assert_eq!(u16::from_be_bytes([out[2], out[3]]), 200);
        assert_eq!(&out[4..4 + 200], payload.as_slice());
        assert_eq!(n, 4 + 200);
    }

    #[tokio::test]
    async fn close_sends_zero_code_for_status_zero() {
        let (client, mut server) = duplex(4096);
        let mut transport = Transport::new(client, BufferConfig::default(), false).unwrap();
        let err = close(&mut transport, 0).await;
        assert!(matches!(err, Error::Closed(0)));

        let mut out = [0u8; 16];
        let n = tokio::io::AsyncReadExt::read(&mut server, &mut out).await.unwrap();
        assert_eq!(&out[..n], &[0x88, 2, 0, 0]);
    }
}
