use crate::{Chunks, FrameError};

/// A type for reading newline-delimited records from a chunk stream.
#[derive(Debug)]
pub struct Ndjson {
    buf: Vec<u8>,
    chunks: Chunks,
    eof: bool,
}

impl Ndjson {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: Vec::new(),
            chunks,
            eof: false,
        }
    }

    /// Returns the next non-blank line, or `None` at the end of the stream.
    /// A final line without a terminator is still returned.
    pub async fn next_line(&mut self) -> Result<Option<String>, FrameError> {
        loop {
            if let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = self.buf.drain(..=pos).collect();
                if let Some(line) = decode_line(&line)? {
                    return Ok(Some(line));
                }
                continue;
            }
            if self.eof {
                let rest = std::mem::take(&mut self.buf);
                return decode_line(&rest);
            }

            match self.chunks.next_chunk().await.map_err(FrameError::Chunks)? {
                Some(bytes) => self.buf.extend_from_slice(&bytes),
                None => self.eof = true,
            }
        }
    }
}

fn decode_line(line: &[u8]) -> Result<Option<String>, FrameError> {
    let Ok(line) = std::str::from_utf8(line) else {
        return Err(FrameError::InvalidPayload);
    };
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    Ok(Some(line.to_owned()))
}
