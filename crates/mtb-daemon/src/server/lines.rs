//! Bounded line framing.
//!
//! Reads newline-terminated requests without ever buffering more than the
//! configured maximum. Longer lines are skipped up to their newline and
//! reported as [`Line::TooLong`]; lines that are not UTF-8 are reported as
//! [`Line::InvalidUtf8`]. Both leave the stream positioned at the next line.
//!
//! All progress is kept in the reader, so [`LineReader::next_line`] can be
//! cancelled in `select!` without losing data.

use std::io;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

/// One framed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Text(String),
    /// Total length of the skipped line, newline excluded.
    TooLong(usize),
    InvalidUtf8,
    Eof,
}

pub struct LineReader<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
    max_len: usize,
    /// Bytes thrown away from the current oversized line.
    discarded: usize,
    discarding: bool,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(reader: R, max_len: usize) -> Self {
        Self {
            reader: BufReader::new(reader),
            buf: Vec::new(),
            max_len,
            discarded: 0,
            discarding: false,
        }
    }

    pub async fn next_line(&mut self) -> io::Result<Line> {
        loop {
            // One extra byte for the newline of a line of exactly `max_len`.
            let limit = (self.max_len + 1 - self.buf.len()) as u64;
            let read = (&mut self.reader)
                .take(limit)
                .read_until(b'\n', &mut self.buf)
                .await?;

            let terminated = self.buf.last() == Some(&b'\n');
            if read == 0 && !terminated {
                return Ok(self.finish_at_eof());
            }

            if terminated {
                self.buf.pop();
                if self.buf.last() == Some(&b'\r') {
                    self.buf.pop();
                }
                let line = std::mem::take(&mut self.buf);
                if self.discarding {
                    let total = self.discarded + line.len();
                    self.discarding = false;
                    self.discarded = 0;
                    return Ok(Line::TooLong(total));
                }
                return Ok(match String::from_utf8(line) {
                    Ok(text) => Line::Text(text),
                    Err(_) => Line::InvalidUtf8,
                });
            }

            if self.buf.len() > self.max_len {
                self.discarding = true;
                self.discarded += self.buf.len();
                self.buf.clear();
            }
        }
    }

    fn finish_at_eof(&mut self) -> Line {
        if self.discarding {
            let total = self.discarded + self.buf.len();
            self.discarding = false;
            self.discarded = 0;
            self.buf.clear();
            return Line::TooLong(total);
        }
        if self.buf.is_empty() {
            return Line::Eof;
        }
        // Unterminated last line.
        match String::from_utf8(std::mem::take(&mut self.buf)) {
            Ok(text) => Line::Text(text),
            Err(_) => Line::InvalidUtf8,
        }
    }
}
