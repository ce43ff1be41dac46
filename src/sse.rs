//! Server-Sent Events (SSE) processing for streamed chat completions.
//!
//! This module turns the raw byte stream of an OpenAI-compatible
//! `/v1/chat/completions` response into content deltas.  Events are delimited
//! by blank lines; each carries one or more `data:` lines and the stream ends
//! with `data: [DONE]`.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;

use crate::error::{Error, Result};

/// One decoded event from a completion stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SseFrame {
    /// A content delta.  May be empty for role-only or finish frames.
    Delta(String),
    /// The terminating `[DONE]` marker.
    Done,
}

#[derive(Deserialize)]
struct ChunkFrame {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    error: Option<ChunkError>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Default, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChunkError {
    message: String,
}

/// Process a stream of bytes into a stream of completion frames.
///
/// Bytes are buffered until a full event is available, so multi-byte UTF-8
/// sequences split across chunks decode correctly.
pub(crate) fn process_sse<S>(byte_stream: S) -> impl Stream<Item = Result<SseFrame>> + Send
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Unpin + Send + 'static,
{
    let stream = byte_stream.fuse();
    let buffer: Vec<u8> = Vec::new();

    stream::unfold(
        (stream, buffer),
        move |(mut stream, mut buffer)| async move {
            loop {
                while let Some(event) = take_event(&mut buffer) {
                    if let Some(frame) = parse_event(&event) {
                        return Some((frame, (stream, buffer)));
                    }
                }

                match stream.next().await {
                    // CR is never significant inside an event; dropping it makes
                    // CRLF-delimited servers look like LF-delimited ones.
                    Some(Ok(bytes)) => buffer.extend(bytes.iter().filter(|b| **b != b'\r')),
                    Some(Err(e)) => {
                        return Some((
                            Err(Error::generation(
                                format!("Error in HTTP stream: {e}"),
                                Some(Box::new(e)),
                            )),
                            (stream, buffer),
                        ));
                    }
                    None => {
                        if buffer.is_empty() {
                            return None;
                        }
                        let event = std::mem::take(&mut buffer);
                        return parse_event(&event).map(|frame| (frame, (stream, buffer)));
                    }
                }
            }
        },
    )
}

/// Split the first complete event off the front of `buffer`.
fn take_event(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let end = buffer.windows(2).position(|w| w == b"\n\n")?;
    let event = buffer[..end].to_vec();
    buffer.drain(..end + 2);
    Some(event)
}

/// Parse one event.  Returns `None` for events without data (comments, keep-alives).
fn parse_event(event: &[u8]) -> Option<Result<SseFrame>> {
    let text = match std::str::from_utf8(event) {
        Ok(text) => text,
        Err(e) => return Some(Err(e.into())),
    };

    let mut data = String::new();
    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }

    if data.is_empty() {
        return None;
    }
    if data.trim() == "[DONE]" {
        return Some(Ok(SseFrame::Done));
    }
    Some(parse_chunk(&data))
}

fn parse_chunk(data: &str) -> Result<SseFrame> {
    let frame: ChunkFrame = serde_json::from_str(data).map_err(|e| {
        Error::generation(
            format!("Malformed completion frame '{data}': {e}"),
            Some(Box::new(e)),
        )
    })?;
    if let Some(error) = frame.error {
        return Err(Error::generation(error.message, None));
    }
    let content = frame
        .choices
        .into_iter()
        .filter_map(|choice| choice.delta.content)
        .collect::<String>();
    Ok(SseFrame::Delta(content))
}
