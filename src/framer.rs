//! Byte-stream framer: extracts whole NMEA sentences and RTCM3 messages
//! from a raw, interleaved byte stream.
//!
//! A single scanner handles both protocols because the GNSS receiver
//! multiplexes them on the same UART, and a length-prefixed RTCM frame
//! cannot be split across consumers without corrupting its CRC. See
//! [`Framer::next`] for the scan algorithm.

use bytes::{Buf, Bytes, BytesMut};

use crate::error::{NtripError, Result};

/// Buffer never retains more than this many bytes; exceeding it resets
/// the framer and reports [`NtripError::Overflow`].
const MAX_BUFFER: usize = 2048;

/// Once the parse cursor passes this offset, the consumed prefix is
/// dropped from the buffer to keep steady-state memory bounded.
const COMPACT_THRESHOLD: usize = 512;

/// Maximum length of a complete NMEA 0183 sentence, `$...*XX\r\n` included.
const NMEA_MAX_LEN: usize = 82;

/// Maximum RTCM3 payload length (10-bit length field).
const RTCM_MAX_PAYLOAD: usize = 1023;

/// An immutable, whole frame extracted by [`Framer`]. Consumers may read
/// but not mutate the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A complete `$...*XX\r\n` NMEA 0183 sentence.
    Nmea(Bytes),
    /// A complete RTCM3 message: preamble, length header, payload and CRC.
    Rtcm3(Bytes),
}

impl Frame {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Frame::Nmea(b) => b,
            Frame::Rtcm3(b) => b,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    pub fn is_nmea(&self) -> bool {
        matches!(self, Frame::Nmea(_))
    }

    pub fn is_rtcm3(&self) -> bool {
        matches!(self, Frame::Rtcm3(_))
    }
}

/// Append-only byte buffer plus a parse cursor. One [`Framer`] is owned
/// by whichever component feeds it bytes (one per byte stream).
pub struct Framer {
    buf: BytesMut,
    cursor: usize,
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

impl Framer {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(256),
            cursor: 0,
        }
    }

    /// Append `bytes` to the internal buffer.
    ///
    /// Fails with [`NtripError::Overflow`] when appending would exceed
    /// [`MAX_BUFFER`]; the framer resets its buffer and cursor in that
    /// case so the caller can keep feeding it fresh data.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<()> {
        if self.buf.len() + bytes.len() > MAX_BUFFER {
            #[cfg(feature = "log")]
            tracing::warn!(
                buffered = self.buf.len(),
                incoming = bytes.len(),
                "framer overflow, discarding buffered state"
            );
            self.buf.clear();
            self.cursor = 0;
            return Err(NtripError::Overflow);
        }
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Pull the next whole frame out of the buffer, or `None` if more
    /// bytes are needed.
    pub fn next(&mut self) -> Option<Frame> {
        loop {
            let remaining = self.buf.len().checked_sub(self.cursor)?;
            if remaining == 0 {
                return None;
            }

            match self.buf[self.cursor] {
                b'$' => match self.try_take_nmea(remaining) {
                    ScanResult::Frame(frame) => {
                        self.maybe_compact();
                        return Some(frame);
                    }
                    ScanResult::Noise => continue,
                    ScanResult::NeedMore => return None,
                },
                0xD3 => match self.try_take_rtcm3(remaining) {
                    ScanResult::Frame(frame) => {
                        self.maybe_compact();
                        return Some(frame);
                    }
                    ScanResult::Noise => continue,
                    ScanResult::NeedMore => return None,
                },
                _ => {
                    self.cursor += 1;
                    continue;
                }
            }
        }
    }

    fn try_take_nmea(&mut self, remaining: usize) -> ScanResult {
        let window = &self.buf[self.cursor..];
        match find_crlf(window) {
            Some(rel) => {
                let frame_len = rel + 2;
                if frame_len > NMEA_MAX_LEN {
                    // Sentence too long to be real NMEA; the '$' was noise.
                    self.cursor += 1;
                    return ScanResult::Noise;
                }
                let frame = Bytes::copy_from_slice(&window[..frame_len]);
                self.cursor += frame_len;
                ScanResult::Frame(Frame::Nmea(frame))
            }
            None if remaining > NMEA_MAX_LEN => {
                // No terminator within the allowed sentence length: noise.
                self.cursor += 1;
                ScanResult::Noise
            }
            None => ScanResult::NeedMore,
        }
    }

    fn try_take_rtcm3(&mut self, remaining: usize) -> ScanResult {
        if remaining < 3 {
            return ScanResult::NeedMore;
        }
        let h0 = self.buf[self.cursor + 1];
        let h1 = self.buf[self.cursor + 2];
        let payload_len = (((h0 & 0x03) as usize) << 8) | h1 as usize;
        if payload_len == 0 || payload_len > RTCM_MAX_PAYLOAD {
            self.cursor += 1;
            return ScanResult::Noise;
        }
        let frame_len = 3 + payload_len + 3;
        if remaining < frame_len {
            return ScanResult::NeedMore;
        }
        let frame =
            Bytes::copy_from_slice(&self.buf[self.cursor..self.cursor + frame_len]);
        self.cursor += frame_len;
        ScanResult::Frame(Frame::Rtcm3(frame))
    }

    fn maybe_compact(&mut self) {
        if self.cursor > COMPACT_THRESHOLD {
            self.buf.advance(self.cursor);
            self.cursor = 0;
        }
    }

    /// Bytes currently buffered, including the already-scanned prefix.
    /// Exposed for tests asserting the 2,048-byte bound.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }
}

enum ScanResult {
    Frame(Frame),
    Noise,
    NeedMore,
}

fn find_crlf(window: &[u8]) -> Option<usize> {
    window.windows(2).position(|pair| pair == b"\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rtcm_frame(payload: &[u8]) -> Vec<u8> {
        assert!(payload.len() <= RTCM_MAX_PAYLOAD);
        let mut out = vec![0xD3, (payload.len() >> 8) as u8, (payload.len() & 0xFF) as u8];
        out.extend_from_slice(payload);
        out.extend_from_slice(&[0, 0, 0]); // unvalidated CRC
        out
    }

    #[test]
    fn interleaved_nmea_then_rtcm() {
        let rtcm = rtcm_frame(b"ABCD");
        let mut input = b"junk$GNRMC,120000.00,A,*7F\r\n".to_vec();
        input.extend_from_slice(&rtcm);

        let mut framer = Framer::new();
        framer.feed(&input).unwrap();

        let first = framer.next().unwrap();
        assert!(first.is_nmea());
        assert_eq!(first.as_bytes(), b"$GNRMC,120000.00,A,*7F\r\n");

        let second = framer.next().unwrap();
        assert!(second.is_rtcm3());
        assert_eq!(second.as_bytes(), rtcm.as_slice());

        assert!(framer.next().is_none());
    }

    #[test]
    fn split_rtcm_frame_across_feeds() {
        let rtcm = rtcm_frame(b"hello world");
        let mut framer = Framer::new();

        framer.feed(&rtcm[..4]).unwrap();
        assert!(framer.next().is_none());

        framer.feed(&rtcm[4..]).unwrap();
        let frame = framer.next().unwrap();
        assert_eq!(frame.as_bytes(), rtcm.as_slice());
    }

    #[test]
    fn zero_length_payload_is_noise() {
        let mut framer = Framer::new();
        // 0xD3 with payload_len 0, followed by real data starting with $.
        framer.feed(&[0xD3, 0x00, 0x00]).unwrap();
        framer.feed(b"$A*00\r\n").unwrap();
        let frame = framer.next().unwrap();
        assert_eq!(frame.as_bytes(), b"$A*00\r\n");
    }

    #[test]
    fn oversized_payload_length_is_noise() {
        let mut framer = Framer::new();
        framer.feed(&[0xD3, 0xFF, 0xFF]).unwrap();
        framer.feed(b"$A*00\r\n").unwrap();
        let frame = framer.next().unwrap();
        assert_eq!(frame.as_bytes(), b"$A*00\r\n");
    }

    #[test]
    fn overlong_nmea_candidate_is_noise() {
        let mut framer = Framer::new();
        let mut input = vec![b'$'];
        input.extend(std::iter::repeat(b'x').take(100));
        input.extend_from_slice(b"\r\n");
        framer.feed(&input).unwrap();
        // No valid sentence should come out of that noise.
        assert!(framer.next().is_none());
    }

    #[test]
    fn feed_overflow_resets_state() {
        let mut framer = Framer::new();
        let chunk = vec![b'n'; MAX_BUFFER];
        framer.feed(&chunk).unwrap();
        let err = framer.feed(&[0u8; 10]).unwrap_err();
        assert!(matches!(err, NtripError::Overflow));
        assert_eq!(framer.buffered_len(), 0);
    }

    #[test]
    fn compaction_bounds_growth() {
        let mut framer = Framer::new();
        let sentence = b"$A*00\r\n";
        for _ in 0..200 {
            framer.feed(sentence).unwrap();
            framer.next().unwrap();
        }
        assert!(framer.buffered_len() <= MAX_BUFFER);
    }
}
