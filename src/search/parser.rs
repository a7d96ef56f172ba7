//! Line reassembly and decoding of ripgrep's streamed output
//!
//! Output arrives in arbitrary chunks: a chunk may end in the middle of a
//! line or even in the middle of a multi-byte character, so bytes are
//! buffered until a full `\n`-terminated line is available.

use super::protocol::RgMessage;

/// Byte accumulation buffer that yields complete lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
    /// Start of the unconsumed region of `buf`
    start: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        if self.start > 0 {
            self.buf.drain(..self.start);
            self.start = 0;
        }
        self.buf.extend_from_slice(chunk);
    }

    /// Next complete line without its terminator, if one is buffered.
    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        let rest = &self.buf[self.start..];
        let eol = rest.iter().position(|&b| b == b'\n')?;

        let mut line = &rest[..eol];
        if let Some(stripped) = line.strip_suffix(b"\r") {
            line = stripped;
        }
        let line = line.to_vec();

        self.start += eol + 1;
        Some(line)
    }

    /// Number of bytes still waiting for a line terminator.
    pub fn pending(&self) -> usize {
        self.buf.len() - self.start
    }
}

/// Decode one line. Blank lines decode to `None`.
pub fn decode_line(line: &[u8]) -> Result<Option<RgMessage>, serde_json::Error> {
    if line.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(line).map(Some)
}

/// Turns raw output chunks into decoded messages.
///
/// A line that fails to decode is logged and skipped so one corrupt line
/// does not abort the search.
#[derive(Debug, Default)]
pub struct StreamParser {
    lines: LineBuffer,
    skipped: usize,
}

impl StreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.lines.push(chunk);
    }

    /// Next decoded message from the buffered data.
    pub fn next_message(&mut self) -> Option<RgMessage> {
        while let Some(line) = self.lines.next_line() {
            match decode_line(&line) {
                Ok(Some(message)) => return Some(message),
                Ok(None) => {}
                Err(e) => {
                    self.skipped += 1;
                    log::warn!(
                        "Skipping malformed ripgrep output line ({}): {}",
                        e,
                        String::from_utf8_lossy(&line)
                    );
                }
            }
        }
        None
    }

    /// Count of lines dropped because they could not be decoded.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn pending(&self) -> usize {
        self.lines.pending()
    }
}
