//! Inbound line framing.
//!
//! Splits the byte stream on `\n` and decodes each line lossily, so a
//! peer sending bytes that are not UTF-8 gets a garbled line (which the
//! dispatcher ignores) instead of a dropped connection. A trailing `\r`
//! is stripped. Lines longer than the limit are skipped up to the next
//! newline.

use std::{cmp, io};

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;
use tracing::warn;

#[derive(Debug, Clone)]
pub(crate) struct LossyLineCodec {
    max_length: usize,
    // Where to resume the newline search in the buffer.
    next_index: usize,
    discarding: bool,
}

impl LossyLineCodec {
    pub(crate) fn new(max_length: usize) -> Self {
        LossyLineCodec {
            max_length: max_length.max(1),
            next_index: 0,
            discarding: false,
        }
    }
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

impl Decoder for LossyLineCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> io::Result<Option<String>> {
        loop {
            let read_to = cmp::min(self.max_length.saturating_add(1), buf.len());
            let newline = buf[self.next_index..read_to]
                .iter()
                .position(|b| *b == b'\n')
                .map(|i| i + self.next_index);

            match (self.discarding, newline) {
                (true, Some(i)) => {
                    buf.advance(i + 1);
                    self.discarding = false;
                    self.next_index = 0;
                }
                (true, None) => {
                    buf.advance(read_to);
                    self.next_index = 0;
                    if buf.is_empty() {
                        return Ok(None);
                    }
                }
                (false, Some(i)) => {
                    let line = buf.split_to(i + 1);
                    self.next_index = 0;
                    return Ok(Some(decode_line(&line[..i])));
                }
                (false, None) if buf.len() > self.max_length => {
                    warn!(max_length = self.max_length, "line too long, skipping it");
                    self.discarding = true;
                    self.next_index = 0;
                }
                (false, None) => {
                    self.next_index = read_to;
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> io::Result<Option<String>> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }

        // Unterminated last line.
        self.next_index = 0;
        if self.discarding || buf.is_empty() {
            buf.clear();
            self.discarding = false;
            return Ok(None);
        }
        let line = buf.split_to(buf.len());
        Ok(Some(decode_line(&line)))
    }
}
