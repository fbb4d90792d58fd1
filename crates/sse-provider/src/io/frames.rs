use std::char::REPLACEMENT_CHARACTER;
use std::collections::VecDeque;
use std::mem;

use bytes::{Buf, BytesMut};

use super::{Chunks, ChunksError};

const FRAME_SEPARATOR: &str = "\n\n";

/// Splits a byte stream into server-sent event frames.
///
/// A frame is the text between two blank-line separators, without the
/// separator itself. Bytes are decoded as UTF-8 incrementally, so a
/// character split across two reads is reassembled; invalid sequences
/// become U+FFFD.
///
/// When the stream ends in the middle of a frame, the fragment is dropped
/// unless [`FrameReader::with_flush_trailing_frame`] is enabled.
#[derive(Debug)]
pub struct FrameReader {
    chunks: Chunks,
    // Bytes of a character whose encoding hasn't fully arrived yet.
    undecoded: BytesMut,
    buf: String,
    // Bytes of `buf` already known to contain no separator.
    scanned: usize,
    ready: VecDeque<String>,
    flush_trailing_frame: bool,
    finished: bool,
}

impl FrameReader {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            chunks,
            undecoded: BytesMut::new(),
            buf: String::new(),
            scanned: 0,
            ready: VecDeque::new(),
            flush_trailing_frame: false,
            finished: false,
        }
    }

    /// Delivers an unterminated frame at the end of the stream instead of
    /// dropping it.
    #[inline]
    pub fn with_flush_trailing_frame(mut self, flush: bool) -> Self {
        self.flush_trailing_frame = flush;
        self
    }

    /// Waits for the next complete frame. `Ok(None)` means the stream has
    /// ended and every complete frame has been delivered.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. Bytes already read stay buffered and
    /// are delivered by the next call.
    pub async fn next_frame(&mut self) -> Result<Option<String>, ChunksError> {
        loop {
            if let Some(frame) = self.ready.pop_front() {
                return Ok(Some(frame));
            }
            if self.finished {
                return Ok(None);
            }

            match self.chunks.next_chunk().await? {
                Some(bytes) => {
                    self.decode(&bytes);
                    self.split_frames();
                }
                None => self.finish(),
            }
        }
    }

    fn decode(&mut self, bytes: &[u8]) {
        self.undecoded.extend_from_slice(bytes);
        loop {
            let err = match str::from_utf8(&self.undecoded) {
                Ok(s) => {
                    self.buf.push_str(s);
                    self.undecoded.clear();
                    return;
                }
                Err(err) => err,
            };

            let valid_len = err.valid_up_to();
            self.buf
                .push_str(&String::from_utf8_lossy(&self.undecoded[..valid_len]));
            let Some(invalid_len) = err.error_len() else {
                // The tail is an incomplete character, wait for more bytes.
                self.undecoded.advance(valid_len);
                return;
            };
            self.buf.push(REPLACEMENT_CHARACTER);
            self.undecoded.advance(valid_len + invalid_len);
        }
    }

    fn split_frames(&mut self) {
        while let Some(offset) = self.buf[self.scanned..].find(FRAME_SEPARATOR) {
            let idx = self.scanned + offset;
            let rest = self.buf.split_off(idx + FRAME_SEPARATOR.len());
            let mut frame = mem::replace(&mut self.buf, rest);
            frame.truncate(idx);
            self.scanned = 0;
            self.push_frame(frame);
        }

        // Keep the last byte, it may be the first half of a separator.
        let mut scanned = self.buf.len().saturating_sub(FRAME_SEPARATOR.len() - 1);
        while !self.buf.is_char_boundary(scanned) {
            scanned -= 1;
        }
        self.scanned = scanned;
    }

    fn push_frame(&mut self, frame: String) {
        if frame.trim().is_empty() {
            return;
        }
        self.ready.push_back(frame);
    }

    fn finish(&mut self) {
        self.finished = true;

        if !self.undecoded.is_empty() {
            self.undecoded.clear();
            self.buf.push(REPLACEMENT_CHARACTER);
        }

        self.scanned = 0;
        let trailing = mem::take(&mut self.buf);
        if trailing.trim().is_empty() {
            return;
        }
        if self.flush_trailing_frame {
            debug!("flushing an unterminated frame at the end of stream");
            self.push_frame(trailing);
        } else {
            warn!(
                "stream ended inside a frame, dropped {} bytes",
                trailing.len()
            );
        }
    }
}
