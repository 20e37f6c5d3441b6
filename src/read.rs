//! Frame-header state machine and masked-payload decoding. A direct port
//! of `MS_rawRead` + `MS_read` from the original C source: header bytes
//! accumulate across however many socket reads it takes, payload is
//! unmasked in place as it arrives, and control frames (Close/Ping/Pong)
//! are fully handled here without ever surfacing to the caller.

use std::time::Duration;

use log::{debug, trace, warn};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Error;
use crate::frame::{OpCode, ReadState};
use crate::transport::Transport;
use crate::write;

/// One payload chunk delivered to the caller, or an idle timeout. A single
/// Text/Binary frame may be delivered across several `Data` events if its
/// payload arrives in more than one socket read; `state.frame_complete()`
/// marks the last chunk.
pub enum ReadEvent<'a> {
    Data { opcode: OpCode, payload: &'a [u8] },
    Timeout,
}

impl ReadState {
    /// `true` once every payload byte of the frame in progress has been
    /// delivered to the caller.
    pub fn frame_complete(&self) -> bool {
        self.bytes_read >= self.frame_len
    }
}

/// Accumulate header bytes until a full frame header is in hand (or the
/// deadline elapses). On completion, validates FIN and the length form and
/// populates `state.frame_len`/`state.bytes_read`. Returns `true` on
/// timeout. The header-accumulation half of `MS_rawRead`.
async fn accumulate_header<S>(
    transport: &mut Transport<S>,
    state: &mut ReadState,
    deadline: Option<Duration>,
) -> Result<bool, Error>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    state.is_timeout = false;
    let mut started_new_frame = false;

    while state.header_ix < state.header_target() {
        if transport.buffered().is_empty() {
            let available = match transport.read(deadline).await {
                Ok(available) => available,
                Err(err) => {
                    // A read failure (as opposed to a benign deadline
                    // elapsing) while a header is partway accumulated is
                    // connection loss, not a timeout.
                    if state.header_ix > 0 {
                        state.is_timeout = false;
                        let opcode_was_close = state.opcode_nibble() == OpCode::Close.as_nibble();
                        state.header_ix = 0;
                        if opcode_was_close {
                            return Err(close_with(transport, 1000).await);
                        }
                    }
                    return Err(err);
                }
            };
            if available.is_empty() {
                state.is_timeout = true;
                return Ok(true);
            }
        }
        let byte = transport.buffered()[0];
        transport.consume(1);
        state.header[state.header_ix] = byte;
        state.header_ix += 1;
        started_new_frame = true;
    }

    if started_new_frame {
        if !state.fin() {
            return Err(close_with(transport, 1008).await);
        }
        if !state.masked() {
            return Err(close_with(transport, 1002).await);
        }
        state.bytes_read = 0;
        if state.header_ix == 6 {
            state.frame_len = (state.header[1] & 0x7F) as usize;
        } else {
            debug_assert_eq!(state.header_ix, 8);
            if (state.header[1] & 0x7F) > 126 {
                // Only the 16-bit extended-length form is supported.
                return Err(close_with(transport, 1009).await);
            }
            state.frame_len = ((state.header[2] as usize) << 8) | state.header[3] as usize;
        }
        trace!(
            "frame header decoded: opcode={:#x} len={}",
            state.opcode_nibble(),
            state.frame_len
        );
    }
    Ok(false)
}

/// Unmask and return the next available chunk of the frame's payload
/// (possibly the whole thing), blocking up to `deadline` if none is
/// buffered yet. Returns `Ok(&[])` immediately if the frame has no more
/// payload to deliver. Sets `state.is_timeout` on an elapsed deadline. The
/// payload half of `MS_rawRead`.
async fn read_payload_chunk<'t, S>(
    transport: &'t mut Transport<S>,
    state: &mut ReadState,
    deadline: Option<Duration>,
) -> Result<&'t [u8], Error>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    state.is_timeout = false;
    if state.frame_complete() {
        state.header_ix = 0;
        return Ok(&[]);
    }
    if transport.buffered().is_empty() {
        let available = transport.read(deadline).await?;
        if available.is_empty() {
            state.is_timeout = true;
            return Ok(&[]);
        }
    }
    let mask = state.mask();
    let mask_offset = state.bytes_read;
    let take = transport.buffered().len().min(state.frame_len - state.bytes_read);
    let payload = transport.unmask_front(take, mask, mask_offset);
    state.bytes_read += take;
    if state.frame_complete() {
        state.header_ix = 0;
    }
    Ok(payload)
}

async fn close_with<S>(transport: &mut Transport<S>, code: u16) -> Error
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    write::close(transport, code).await
}

/// Read the next data-frame payload chunk, transparently answering Ping
/// frames with Pong and absorbing Close/Pong frames. The Rust analog of
/// `MS_read`.
pub async fn read<'t, S>(
    transport: &'t mut Transport<S>,
    state: &mut ReadState,
    deadline: Option<Duration>,
) -> Result<ReadEvent<'t>, Error>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    loop {
        if accumulate_header(transport, state, deadline).await? {
            return Ok(ReadEvent::Timeout);
        }

        let opcode_nibble = state.opcode_nibble();
        let opcode = match OpCode::from_nibble(opcode_nibble) {
            Some(op) => op,
            None => {
                warn!("unknown opcode {:#x}, closing", opcode_nibble);
                return Err(close_with(transport, 1002).await);
            }
        };

        match opcode {
            OpCode::Text | OpCode::Binary => {
                let payload = read_payload_chunk(transport, state, deadline).await?;
                if state.is_timeout {
                    return Ok(ReadEvent::Timeout);
                }
                if opcode == OpCode::Text {
                    // A chunk boundary may land mid-character; only a
                    // definite encoding error (not an incomplete trailing
                    // sequence) is rejected here.
                    if let Err(source) = std::str::from_utf8(payload) {
                        if source.error_len().is_some() {
                            warn!("text frame payload was not valid UTF-8, closing");
                            let _ = close_with(transport, 1007).await;
                            return Err(Error::InvalidUtf8 { source });
                        }
                    }
                }
                return Ok(ReadEvent::Data { opcode, payload });
            }
            OpCode::Close => {
                let mut code = None;
                if state.frame_len >= 2 {
                    let payload = read_payload_chunk(transport, state, deadline).await?;
                    if state.is_timeout {
                        return Ok(ReadEvent::Timeout);
                    }
                    if payload.len() >= 2 {
                        code = Some(u16::from_be_bytes([payload[0], payload[1]]));
                    }
                }
                let _ = write::close(transport, 1000).await;
                return Err(match code {
                    Some(code) => Error::Closed(-(code as i32)),
                    None => Error::Closed(-1000),
                });
            }
            OpCode::Ping | OpCode::Pong => {
                if state.frame_len > 125 {
                    return Err(close_with(transport, 1002).await);
                }
                loop {
                    let payload = read_payload_chunk(transport, state, deadline).await?;
                    if state.is_timeout {
                        return Ok(ReadEvent::Timeout);
                    }
                    let start = state.bytes_read - payload.len();
                    let len = payload.len();
                    state.ctrl_buf[start..start + len].copy_from_slice(payload);
                    if state.frame_complete() {
                        break;
                    }
                }
                if opcode == OpCode::Ping {
                    debug!("responding to ping with pong, len={}", state.frame_len);
                    let len = state.frame_len;
                    write::write(transport, OpCode::Pong, &state.ctrl_buf[..len]).await?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BufferConfig;
    use tokio::io::duplex;

    fn mask_payload(payload: &mut [u8], mask: [u8; 4]) {
        for (i, b) in payload.iter_mut().enumerate() {
            *b ^= mask[i % 4];
        }
    }

    fn masked_frame(opcode: u8, fin: bool, mask: [u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = vec![(if fin { 0x80 } else { 0 }) | opcode];
        assert!(payload.len() <= 125);
        out.push(0x80 | payload.len() as u8);
        out.extend_from_slice(&mask);
        let mut masked = payload.to_vec();
        mask_payload(&mut masked, mask);
        out.extend_from_slice(&masked);
        out
    }

    #[tokio::test]
    async fn decodes_a_masked_text_frame() {
        let (mut client, server) = duplex(4096);
        let mut transport = Transport::new(server, BufferConfig::default(), false).unwrap();
        let mut state = ReadState::new();

        let frame = masked_frame(0x1, true, [1, 2, 3, 4], b"hi");
        tokio::io::AsyncWriteExt::write_all(&mut client, &frame).await.unwrap();

        match read(&mut transport, &mut state, None).await.unwrap() {
            ReadEvent::Data { opcode, payload } => {
                assert_eq!(opcode, OpCode::Text);
                assert_eq!(payload, b"hi");
            }
            ReadEvent::Timeout => panic!("expected data"),
        }
    }

    #[tokio::test]
    async fn ping_triggers_automatic_pong() {
        let (mut client, server) = duplex(4096);
        let mut transport = Transport::new(server, BufferConfig::default(), false).unwrap();
        let mut state = ReadState::new();

        let ping = masked_frame(0x9, true, [9, 8, 7, 6], b"ping-data");
        tokio::io::AsyncWriteExt::write_all(&mut client, &ping).await.unwrap();

        let deadline = Some(Duration::from_millis(50));
        match read(&mut transport, &mut state, deadline).await.unwrap() {
            ReadEvent::Timeout => {}
            ReadEvent::Data { .. } => panic!("ping should not surface as data"),
        }

        let mut out = [0u8; 64];
        let n = tokio::io::AsyncReadExt::read(&mut client, &mut out).await.unwrap();
        assert_eq!(out[0], 0x8A);
        assert_eq!(&out[2..n], b"ping-data");
    }

    #[tokio::test]
    async fn close_frame_reports_negated_status_code() {
        let (mut client, server) = duplex(4096);
        let mut transport = Transport::new(server, BufferConfig::default(), false).unwrap();
        let mut state = ReadState::new();

        let close = masked_frame(0x8, true, [1, 1, 1, 1], &1000u16.to_be_bytes());
        tokio::io::AsyncWriteExt::write_all(&mut client, &close).await.unwrap();

        let err = read(&mut transport, &mut state, None).await.unwrap_err();
        assert!(matches!(err, Error::Closed(-1000)));
    }

    #[tokio::test]
    async fn unmasked_client_frame_closes_with_1002() {
        let (mut client, server) = duplex(4096);
        let mut transport = Transport::new(server, BufferConfig::default(), false).unwrap();
        let mut state = ReadState::new();

        // A hand-built text frame with the mask bit (0x80 on the length
        // byte) cleared, which a compliant client never sends.
        let frame = vec![0x81u8, 0x02, b'h', b'i'];
        tokio::io::AsyncWriteExt::write_all(&mut client, &frame).await.unwrap();

        let err = read(&mut transport, &mut state, None).await.unwrap_err();
        assert!(matches!(err, Error::Closed(-1002)));
    }

    #[tokio::test]
    async fn invalid_utf8_text_frame_is_rejected() {
        let (mut client, server) = duplex(4096);
        let mut transport = Transport::new(server, BufferConfig::default(), false).unwrap();
        let mut state = ReadState::new();

        let frame = masked_frame(0x1, true, [1, 2, 3, 4], &[0xFF, 0xFE]);
        tokio::io::AsyncWriteExt::write_all(&mut client, &frame).await.unwrap();

        let err = read(&mut transport, &mut state, None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidUtf8 { .. }));
    }

    #[tokio::test]
    async fn unknown_opcode_closes_with_1002() {
        let (mut client, server) = duplex(4096);
        let mut transport = Transport::new(server, BufferConfig::default(), false).unwrap();
        let mut state = ReadState::new();

        // opcode 0x3 is reserved/unknown under this core's accepted set.
        let frame = masked_frame(0x3, true, [0, 0, 0, 0], b"");
        tokio::io::AsyncWriteExt::write_all(&mut client, &frame).await.unwrap();

        let err = read(&mut transport, &mut state, None).await.unwrap_err();
        assert!(matches!(err, Error::Closed(-1002)));
    }

    #[tokio::test]
    async fn frame_boundary_is_preserved_across_arbitrary_chunking() {
        let (mut client, server) = duplex(4096);
        let mut transport = Transport::new(server, BufferConfig::default(), false).unwrap();
        let mut state = ReadState::new();

        let frame = masked_frame(0x1, true, [5, 6, 7, 8], b"chunked-body");
        // Dribble the frame in byte by byte to exercise header accumulation
        // across many socket reads.
        for byte in &frame {
            tokio::io::AsyncWriteExt::write_all(&mut client, &[*byte]).await.unwrap();
        }

        match read(&mut transport, &mut state, None).await.unwrap() {
            ReadEvent::Data { opcode, payload } => {
                assert_eq!(opcode, OpCode::Text);
                assert_eq!(payload, b"chunked-body");
            }
            ReadEvent::Timeout => panic!("expected data"),
        }
    }

    #[tokio::test]
    async fn connection_loss_mid_close_header_reports_clean_close() {
        let (mut client, server) = duplex(4096);
        let mut transport = Transport::new(server, BufferConfig::default(), false).unwrap();
        let mut state = ReadState::new();

        // Only the opcode byte of a Close frame arrives before the peer
        // vanishes.
        tokio::io::AsyncWriteExt::write_all(&mut client, &[0x88]).await.unwrap();
        drop(client);

        let err = read(&mut transport, &mut state, None).await.unwrap_err();
        assert!(matches!(err, Error::Closed(-1000)));
    }

    #[tokio::test]
    async fn connection_loss_mid_text_header_propagates_read_error() {
        let (mut client, server) = duplex(4096);
        let mut transport = Transport::new(server, BufferConfig::default(), false).unwrap();
        let mut state = ReadState::new();

        tokio::io::AsyncWriteExt::write_all(&mut client, &[0x81]).await.unwrap();
        drop(client);

        let err = read(&mut transport, &mut state, None).await.unwrap_err();
        assert!(matches!(err, Error::Read { .. }));
        assert_eq!(state.header_ix, 0);
    }
}
