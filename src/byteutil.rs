//! Small bounded byte helpers used by the handshake and frame code.
//!
//! These mirror the `ms*` helper functions in the original MinnowServer C
//! source (`msstrstrn`, `msCpAndInc`, `msi2a`, `msB64Encode`): every write
//! goes through a [`Cursor`] over a caller-owned `&mut [u8]`, so assembling
//! an HTTP response or a frame header never allocates.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use sha1::{Digest, Sha1};

use crate::error::Error;

/// RFC 6455 Section 1.3 handshake GUID.
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// A bounded, allocation-free write cursor over a borrowed byte buffer.
///
/// Every `write_*` method advances the cursor and returns
/// [`Error::Alloc`] instead of panicking or growing the buffer when the
/// remaining capacity is too small, matching `msCpAndInc`'s `NULL`-on-
/// overflow contract.
pub struct Cursor<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos == 0
    }

    /// Remaining capacity in the underlying buffer.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Copy `src` in and advance, the Rust analog of `msCpAndInc`.
    pub fn write(&mut self, src: &[u8]) -> Result<(), Error> {
        if src.len() > self.remaining() {
            return Err(Error::Alloc);
        }
        self.buf[self.pos..self.pos + src.len()].copy_from_slice(src);
        self.pos += src.len();
        Ok(())
    }

    /// Format `n` as decimal ASCII and write it, the analog of `msi2a`.
    pub fn write_decimal(&mut self, n: u32) -> Result<(), Error> {
        let mut digits = [0u8; 10];
        let mut i = digits.len();
        let mut rest = n;
        loop {
            i -= 1;
            digits[i] = b'0' + (rest % 10) as u8;
            rest /= 10;
            if rest == 0 {
                break;
            }
        }
        self.write(&digits[i..])
    }

    /// Base64-encode `src` directly into the buffer, the analog of
    /// `msB64Encode`.
    pub fn write_base64(&mut self, src: &[u8]) -> Result<(), Error> {
        let needed = base64_encoded_len(src.len());
        if needed > self.remaining() {
            return Err(Error::Alloc);
        }
        let written = BASE64_STANDARD
            .encode_slice(src, &mut self.buf[self.pos..self.pos + needed])
            .map_err(|_| Error::Alloc)?;
        self.pos += written;
        Ok(())
    }

    /// Consume the cursor, returning the written prefix.
    pub fn finish(self) -> &'a [u8] {
        &self.buf[..self.pos]
    }

    /// Borrow the written prefix without consuming the cursor.
    pub fn written(&self) -> &[u8] {
        &self.buf[..self.pos]
    }
}

const fn base64_encoded_len(input_len: usize) -> usize {
    (input_len + 2) / 3 * 4
}

/// Case-insensitive substring search over byte slices, the analog of
/// `msstrstrn`. Unlike `str::find`, this never requires the haystack to be
/// valid UTF-8 (HTTP header bytes are not guaranteed to be).
pub fn find_ci(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}

/// `true` if `haystack` starts with `needle`, case-insensitively.
pub fn starts_with_ci(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.len() >= needle.len() && haystack[..needle.len()].eq_ignore_ascii_case(needle)
}

/// Exact-match substring search, the analog of `msstrstrn` used for literal
/// delimiters (`\r\n`, `\r\n\r\n`) rather than header-name matching.
pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}

/// Compute the `Sec-WebSocket-Accept` value for client key `key`:
/// `base64(sha1(key ++ GUID))`.
pub fn websocket_accept_value(key: &[u8], out: &mut Cursor<'_>) -> Result<(), Error> {
    let mut hasher = Sha1::new();
    hasher.update(key);
    hasher.update(WS_GUID.as_bytes());
    let digest = hasher.finalize();
    out.write_base64(&digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_ci_matches_regardless_of_case() {
        let haystack = b"Sec-WebSocket-Key: abc\r\n";
        assert_eq!(find_ci(haystack, b"sec-websocket-key"), Some(0));
        assert_eq!(find_ci(haystack, b"MISSING"), None);
    }

    #[test]
    fn cursor_reports_alloc_error_on_overflow() {
        let mut buf = [0u8; 4];
        let mut cur = Cursor::new(&mut buf);
        assert!(cur.write(b"abcd").is_ok());
        assert!(matches!(cur.write(b"e"), Err(Error::Alloc)));
    }

    #[test]
    fn write_decimal_matches_display() {
        let mut buf = [0u8; 16];
        let mut cur = Cursor::new(&mut buf);
        cur.write_decimal(1024).unwrap();
        assert_eq!(cur.written(), b"1024");
    }

    #[test]
    fn write_decimal_handles_zero() {
        let mut buf = [0u8; 16];
        let mut cur = Cursor::new(&mut buf);
        cur.write_decimal(0).unwrap();
        assert_eq!(cur.written(), b"0");
    }

    #[test]
    fn accept_value_matches_rfc6455_example() {
        // RFC 6455 Section 1.3 worked example.
        let mut buf = [0u8; 64];
        let mut cur = Cursor::new(&mut buf);
        websocket_accept_value(b"dGhlIHNhbXBsZSBub25jZQ==", &mut cur).unwrap();
        assert_eq!(cur.written(), b"s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }
}
