//! Server-Sent Events (SSE) decoding for streaming responses.
//!
//! This module turns the raw byte chunks of a streaming HTTP body into the
//! payloads of its `data: ` lines.  Chunk boundaries are arbitrary: bytes are
//! buffered until a complete `\n`-terminated line is available, so a frame
//! split across reads is never processed half-received.

use bytes::BytesMut;
use futures::stream::{self, Stream, StreamExt};

use crate::error::{Error, Result};
use crate::observability::STREAM_BYTES;

/// Prefix of a line that carries an event payload.
const DATA_PREFIX: &[u8] = b"data: ";

/// Payload that marks the normal end of a stream.
const DONE_SENTINEL: &str = "[DONE]";

/// An event decoded from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// The payload of a `data: ` line.
    Data(String),

    /// The `[DONE]` sentinel; nothing follows it.
    Done,
}

/// Incremental, line-oriented SSE decoder.
///
/// Feed chunks with [`push`](Self::push), drain events with
/// [`next_event`](Self::next_event), and signal end-of-input with
/// [`finish`](Self::finish).  A decoder is not restartable: once it has seen
/// `[DONE]` or end-of-input it yields nothing further.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: BytesMut,
    done: bool,
    eof: bool,
}

impl SseDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw chunk to the buffer.
    ///
    /// Chunks pushed after `[DONE]` are discarded.
    pub fn push(&mut self, chunk: &[u8]) {
        if self.done || self.eof {
            return;
        }
        self.buffer.extend_from_slice(chunk);
    }

    /// Mark the end of input.
    ///
    /// An unterminated final line can no longer grow once the connection has
    /// closed, so it is treated as complete.
    pub fn finish(&mut self) {
        if self.eof {
            return;
        }
        self.eof = true;
        if !self.buffer.is_empty() && !self.buffer.ends_with(b"\n") {
            self.buffer.extend_from_slice(b"\n");
        }
    }

    /// Stop decoding immediately, discarding anything buffered.
    pub fn close(&mut self) {
        self.eof = true;
        self.buffer.clear();
    }

    /// Returns true once `[DONE]` has been decoded.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Returns true when no further events can be produced.
    pub fn is_finished(&self) -> bool {
        self.done || (self.eof && self.buffer.is_empty())
    }

    /// Number of bytes waiting for a line terminator.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Extract the next event from the complete lines in the buffer.
    ///
    /// Returns `None` when more input is needed or the stream is finished.
    pub fn next_event(&mut self) -> Option<SseEvent> {
        while !self.done {
            let newline = self.buffer.iter().position(|&b| b == b'\n')?;
            let mut line = self.buffer.split_to(newline + 1);
            line.truncate(newline);
            if line.ends_with(b"\r") {
                line.truncate(newline - 1);
            }
            if let Some(event) = parse_line(&line) {
                if event == SseEvent::Done {
                    self.done = true;
                    self.buffer.clear();
                }
                return Some(event);
            }
        }
        None
    }
}

/// Interpret one complete line; lines other than `data: ` are ignored.
fn parse_line(line: &[u8]) -> Option<SseEvent> {
    let payload = line.strip_prefix(DATA_PREFIX)?;
    let payload = String::from_utf8_lossy(payload);
    if payload == DONE_SENTINEL {
        Some(SseEvent::Done)
    } else {
        Some(SseEvent::Data(payload.into_owned()))
    }
}

/// Decode a stream of byte chunks into a stream of SSE events.
///
/// The returned stream ends after `[DONE]`, at end of input, or right after
/// yielding a transport error.
///
/// ```
/// use futures::{StreamExt, stream};
/// use threadchat::sse::{SseEvent, sse_events};
///
/// # tokio_test::block_on(async {
/// let chunks: Vec<Result<&'static [u8], std::io::Error>> =
///     vec![Ok(b"data: {\"a\"".as_slice()), Ok(b":1}\n\ndata: [DONE]\n".as_slice())];
/// let events: Vec<_> = sse_events(stream::iter(chunks)).collect().await;
/// assert_eq!(events.len(), 2);
/// assert_eq!(events[0].as_ref().unwrap(), &SseEvent::Data("{\"a\":1}".to_string()));
/// assert_eq!(events[1].as_ref().unwrap(), &SseEvent::Done);
/// # });
/// ```
pub fn sse_events<S, B, E>(byte_stream: S) -> impl Stream<Item = Result<SseEvent>> + Send
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: std::error::Error + Send + Sync + 'static,
{
    let stream = Box::pin(byte_stream);
    stream::unfold(
        (stream, SseDecoder::new()),
        |(mut stream, mut decoder)| async move {
            loop {
                if let Some(event) = decoder.next_event() {
                    return Some((Ok(event), (stream, decoder)));
                }
                if decoder.is_finished() {
                    return None;
                }
                match stream.next().await {
                    Some(Ok(chunk)) => {
                        let chunk = chunk.as_ref();
                        STREAM_BYTES.count(chunk.len() as u64);
                        decoder.push(chunk);
                    }
                    Some(Err(e)) => {
                        decoder.close();
                        let err = Error::streaming(
                            format!("Error in HTTP stream: {e}"),
                            Some(Box::new(e)),
                        );
                        return Some((Err(err), (stream, decoder)));
                    }
                    None => decoder.finish(),
                }
            }
        },
    )
    .fuse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::io;

    const TRANSCRIPT: &str = concat!(
        ": OPENROUTER PROCESSING\n",
        "\n",
        "data: {\"choices\":[{\"delta\":{\"reasoning\":\"Thinking\"}}]}\n",
        "\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"h\u{e9}llo \u{1F600}\"}}]}\r\n",
        "\r\n",
        "event: message\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"!\"},\"finish_reason\":\"stop\"}]}\n",
        "\n",
        "data: [DONE]\n",
        "\n",
    );

    fn decode_all(chunks: &[&[u8]]) -> Vec<SseEvent> {
        let mut decoder = SseDecoder::new();
        let mut events = Vec::new();
        for chunk in chunks {
            decoder.push(chunk);
            while let Some(event) = decoder.next_event() {
                events.push(event);
            }
        }
        decoder.finish();
        while let Some(event) = decoder.next_event() {
            events.push(event);
        }
        events
    }

    #[test]
    fn decodes_data_lines_and_done() {
        let events = decode_all(&[TRANSCRIPT.as_bytes()]);
        assert_eq!(events.len(), 4);
        let expected = "{\"choices\":[{\"delta\":{\"content\":\"h\u{e9}llo \u{1F600}\"}}]}";
        assert_eq!(events[1], SseEvent::Data(expected.to_string()));
        assert_eq!(events[3], SseEvent::Done);
    }

    #[test]
    fn chunk_boundaries_do_not_matter() {
        let bytes = TRANSCRIPT.as_bytes();
        let expected = decode_all(&[bytes]);
        for split in 0..=bytes.len() {
            let (head, tail) = bytes.split_at(split);
            assert_eq!(decode_all(&[head, tail]), expected, "split at {split}");
        }
        let singles: Vec<&[u8]> = bytes.chunks(1).collect();
        assert_eq!(decode_all(&singles), expected);
        let sevens: Vec<&[u8]> = bytes.chunks(7).collect();
        assert_eq!(decode_all(&sevens), expected);
    }

    #[test]
    fn partial_line_waits_for_terminator() {
        let mut decoder = SseDecoder::new();
        decoder.push(b"data: {\"cho");
        assert_eq!(decoder.next_event(), None);
        assert_eq!(decoder.buffered(), 11);
        decoder.push(b"ices\":[]}\n");
        assert_eq!(
            decoder.next_event(),
            Some(SseEvent::Data("{\"choices\":[]}".to_string()))
        );
    }

    #[test]
    fn done_stops_decoding_even_with_buffered_frames() {
        let mut decoder = SseDecoder::new();
        decoder.push(b"data: [DONE]\ndata: {\"choices\":[]}\n");
        assert_eq!(decoder.next_event(), Some(SseEvent::Done));
        assert_eq!(decoder.next_event(), None);
        assert!(decoder.is_done());
        assert!(decoder.is_finished());
        decoder.push(b"data: more\n");
        assert_eq!(decoder.next_event(), None);
    }

    #[test]
    fn unterminated_final_line_is_flushed_at_eof() {
        assert_eq!(
            decode_all(&[b"data: {}\ndata: [DONE]".as_slice()]),
            vec![SseEvent::Data("{}".to_string()), SseEvent::Done]
        );
    }

    #[test]
    fn data_prefix_requires_space() {
        assert_eq!(decode_all(&[b"data:{}\nid: 7\nretry: 10\n".as_slice()]), Vec::new());
    }

    #[tokio::test]
    async fn stream_adapter_ends_after_done() {
        let chunks: Vec<std::result::Result<Bytes, io::Error>> = vec![
            Ok(Bytes::from_static(b"data: one\n\nda")),
            Ok(Bytes::from_static(b"ta: two\n\ndata: [DONE]\n\ndata: three\n")),
        ];
        let events: Vec<_> = sse_events(stream::iter(chunks)).collect().await;
        let events: Vec<SseEvent> = events.into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(
            events,
            vec![
                SseEvent::Data("one".to_string()),
                SseEvent::Data("two".to_string()),
                SseEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn stream_adapter_ends_at_eof_without_done() {
        let chunks: Vec<std::result::Result<Bytes, io::Error>> =
            vec![Ok(Bytes::from_static(b"data: one\n\n"))];
        let events: Vec<_> = sse_events(stream::iter(chunks)).collect().await;
        assert_eq!(events.len(), 1);
        assert_eq!(*events[0].as_ref().unwrap(), SseEvent::Data("one".to_string()));
    }

    #[tokio::test]
    async fn transport_error_terminates_stream() {
        let chunks: Vec<std::result::Result<Bytes, io::Error>> = vec![
            Ok(Bytes::from_static(b"data: one\n")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer")),
            Ok(Bytes::from_static(b"data: two\n")),
        ];
        let mut events = Box::pin(sse_events(stream::iter(chunks)));
        assert_eq!(
            events.next().await.unwrap().unwrap(),
            SseEvent::Data("one".to_string())
        );
        let err = events.next().await.unwrap().unwrap_err();
        assert!(err.is_streaming());
        assert!(err.to_string().contains("reset by peer"));
        assert!(events.next().await.is_none());
    }
}
