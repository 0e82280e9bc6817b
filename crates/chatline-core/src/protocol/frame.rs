//! Newline-delimited framing (panic-free).
//!
//! One envelope per line. Bytes accumulate in the codec buffer until a `\n`
//! arrives; a read that returns half a document never reaches the decoder.
//!
//! Lines longer than `max_frame_bytes` are skipped up to the next newline and
//! surfaced as [`InboundFrame::Oversized`] so the reader can report them and
//! keep going. A trailing `\r` is tolerated and blank lines are ignored.

use std::io;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Frame delimiter.
pub const FRAME_DELIMITER: u8 = b'\n';

/// Default cap for a single frame, excluding the delimiter.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024;

/// One decoded line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// A full envelope, delimiter stripped.
    Complete(Bytes),
    /// A line over the size cap was dropped; `len` bytes were discarded.
    Oversized { len: usize },
}

#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_bytes: usize,
    /// Resume offset for the newline scan.
    next_index: usize,
    /// Bytes dropped so far while skipping an oversized line.
    discarding: Option<usize>,
}

impl FrameCodec {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            max_frame_bytes,
            next_index: 0,
            discarding: None,
        }
    }

    pub fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }

    fn find_delimiter(&self, buf: &BytesMut) -> Option<usize> {
        buf.iter()
            .skip(self.next_index)
            .position(|b| *b == FRAME_DELIMITER)
            .map(|i| self.next_index + i)
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl Decoder for FrameCodec {
    type Item = InboundFrame;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> io::Result<Option<InboundFrame>> {
        loop {
            let newline = self.find_delimiter(buf);

            match (self.discarding, newline) {
                (Some(dropped), Some(pos)) => {
                    buf.advance(pos + 1);
                    self.discarding = None;
                    self.next_index = 0;
                    return Ok(Some(InboundFrame::Oversized { len: dropped + pos }));
                }
                (Some(dropped), None) => {
                    let n = buf.len();
                    buf.advance(n);
                    self.discarding = Some(dropped + n);
                    self.next_index = 0;
                    return Ok(None);
                }
                (None, Some(pos)) => {
                    self.next_index = 0;
                    let mut line = buf.split_to(pos + 1);
                    line.truncate(pos);
                    if line.last() == Some(&b'\r') {
                        line.truncate(line.len() - 1);
                    }
                    if line.len() > self.max_frame_bytes {
                        return Ok(Some(InboundFrame::Oversized { len: line.len() }));
                    }
                    if line.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    return Ok(Some(InboundFrame::Complete(line.freeze())));
                }
                (None, None) => {
                    if buf.len() > self.max_frame_bytes {
                        self.discarding = Some(buf.len());
                        buf.clear();
                        self.next_index = 0;
                    } else {
                        self.next_index = buf.len();
                    }
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> io::Result<Option<InboundFrame>> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }
        if let Some(dropped) = self.discarding.take() {
            return Ok(Some(InboundFrame::Oversized { len: dropped }));
        }
        if !buf.is_empty() {
            tracing::warn!(len = buf.len(), "discarding unterminated frame at eof");
            buf.clear();
            self.next_index = 0;
        }
        Ok(None)
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, frame: Bytes, dst: &mut BytesMut) -> io::Result<()> {
        if frame.len() > self.max_frame_bytes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("frame of {} bytes exceeds {}", frame.len(), self.max_frame_bytes),
            ));
        }
        if frame.contains(&FRAME_DELIMITER) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "frame contains a delimiter",
            ));
        }
        dst.reserve(frame.len() + 1);
        dst.put_slice(&frame);
        dst.put_u8(FRAME_DELIMITER);
        Ok(())
    }
}
