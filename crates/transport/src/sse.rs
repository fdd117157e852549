use crate::{Chunks, FrameError};

/// One dispatched server-sent event.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SseEvent {
    /// The `event` field, if present.
    pub event: Option<String>,
    /// The `data` lines, joined with line feeds.
    pub data: String,
}

/// A type for reading server-sent events from a chunk stream.
///
/// Bytes are buffered until a whole event is available, so multi-byte
/// characters may be split across chunks.
#[derive(Debug)]
pub struct Sse {
    buf: Vec<u8>,
    chunks: Chunks,
    eof: bool,
}

impl Sse {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: Vec::new(),
            chunks,
            eof: false,
        }
    }

    /// Returns the next event, or `None` at the end of the stream. An
    /// unterminated event at the end of the stream is discarded.
    pub async fn next_event(&mut self) -> Result<Option<SseEvent>, FrameError> {
        loop {
            // Drain what is already buffered before reading more.
            if let Some(event) = self.try_parse_event()? {
                return Ok(Some(event));
            }
            if self.eof {
                if !self.buf.is_empty() {
                    debug!("discarding {} trailing bytes", self.buf.len());
                    self.buf.clear();
                }
                return Ok(None);
            }

            match self.chunks.next_chunk().await.map_err(FrameError::Chunks)? {
                Some(bytes) => self.buf.extend_from_slice(&bytes),
                None => self.eof = true,
            }
        }
    }

    fn try_parse_event(&mut self) -> Result<Option<SseEvent>, FrameError> {
        // event         = *( comment / field ) end-of-line
        // comment       = colon *any-char end-of-line
        // field         = 1*name-char [ colon [ space ] *any-char ] end-of-line
        // end-of-line   = ( cr lf / cr / lf )
        while let Some(block_end) = self.find_block_end() {
            let block: Vec<u8> = self.buf.drain(..block_end).collect();
            if let Some(event) = parse_block(&block)? {
                return Ok(Some(event));
            }
        }
        Ok(None)
    }

    /// Finds the end of the first block terminated by an empty line.
    fn find_block_end(&self) -> Option<usize> {
        let mut pos = 0;
        loop {
            let (line_end, next) = next_line(&self.buf, pos, self.eof)?;
            if line_end == pos {
                return Some(next);
            }
            pos = next;
        }
    }
}

/// Returns the end of the line starting at `start` and the start of the
/// line after it.
fn next_line(buf: &[u8], start: usize, eof: bool) -> Option<(usize, usize)> {
    for idx in start..buf.len() {
        match buf[idx] {
            b'\n' => return Some((idx, idx + 1)),
            b'\r' => {
                return match buf.get(idx + 1) {
                    Some(b'\n') => Some((idx, idx + 2)),
                    Some(_) => Some((idx, idx + 1)),
                    // A trailing CR may be the first half of a CRLF.
                    None if eof => Some((idx, idx + 1)),
                    None => None,
                };
            }
            _ => {}
        }
    }
    None
}

fn parse_block(block: &[u8]) -> Result<Option<SseEvent>, FrameError> {
    let Ok(text) = std::str::from_utf8(block) else {
        return Err(FrameError::InvalidPayload);
    };

    let mut event = None;
    let mut data: Option<String> = None;
    for line in text.split(['\n', '\r']) {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (name, value) = match line.split_once(':') {
            Some((name, value)) => {
                (name, value.strip_prefix(' ').unwrap_or(value))
            }
            None => (line, ""),
        };
        match name {
            "data" => match &mut data {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => data = Some(value.to_owned()),
            },
            "event" => event = Some(value.to_owned()),
            "id" | "retry" => {}
            _ => trace!("ignoring sse field `{name}`"),
        }
    }

    // Blocks without data (comments, keep-alives) are not dispatched.
    Ok(data.map(|data| SseEvent { event, data }))
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn sse(chunks: &[&'static [u8]]) -> Sse {
        let chunks = chunks.iter().copied().map(Bytes::from_static).collect();
        Sse::new(Chunks::from_vec_deque(chunks))
    }

    fn data(data: &str) -> SseEvent {
        SseEvent {
            event: None,
            data: data.to_owned(),
        }
    }

    #[tokio::test]
    async fn test_normal_events() {
        let mut sse = sse(&[b"data: hello\n\n", b"data: bye\n\n"]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), data("hello"));
        assert_eq!(sse.next_event().await.unwrap().unwrap(), data("bye"));
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_quirk_streaming() {
        let mut sse = sse(&[b"data:", b" hello\n", b"\n"]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), data("hello"));
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_split_multibyte_char() {
        let mut sse = sse(&[b"data: caf\xc3", b"\xa9\n\n"]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), data("café"));
    }

    #[tokio::test]
    async fn test_fields_and_comments() {
        let mut sse = sse(&[
            b": keep-alive\n\n",
            b"event: content_block_delta\r\nid: 7\r\ndata: {\"a\":\r\ndata: 1}\r\n\r\n",
            b"retry: 100\ndata:no-space\r\r",
        ]);
        assert_eq!(
            sse.next_event().await.unwrap().unwrap(),
            SseEvent {
                event: Some("content_block_delta".to_owned()),
                data: "{\"a\":\n1}".to_owned(),
            }
        );
        assert_eq!(sse.next_event().await.unwrap().unwrap(), data("no-space"));
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unknown_fields_are_ignored() {
        let mut sse = sse(&[b"data: one\nx-trace: abc\n\n", b"data: two\n\n"]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), data("one"));
        assert_eq!(sse.next_event().await.unwrap().unwrap(), data("two"));

        let mut sse = self::sse(&[b"xxxxxx\n\n", b"data: three\n\n"]);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), data("three"));
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_data() {
        let mut sse = self::sse(&[b"xxxxxx\n"]);
        assert_eq!(sse.next_event().await.unwrap(), None);

        let mut sse = self::sse(&[b"data: hello\n", b"data: bye\n"]);
        assert_eq!(sse.next_event().await.unwrap(), None);

        let mut sse = self::sse(&[b"data: \xff\n\n"]);
        assert_eq!(
            sse.next_event().await.unwrap_err(),
            FrameError::InvalidPayload
        );
    }
}
