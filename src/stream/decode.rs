//! SSE framing: raw bytes → [`StreamEvent`]s.
//!
//! Splits the byte stream on the frame delimiter, strips the `data: `
//! prefix, and assigns each frame a monotonically increasing sequence
//! number. Transport failures and premature EOF are surfaced in-band as a
//! terminal error event, so the produced sequence is always finite and
//! always ends with a done or error event.

use crate::types::{EventKind, StreamEvent};
use crate::{BoxStream, Error};
use bytes::{Buf, Bytes, BytesMut};
use futures::{stream, Stream, StreamExt};
use std::pin::Pin;

/// Finite, ordered sequence of raw stream events.
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send + 'static>>;

pub struct SseFrameDecoder {
    delimiter: String,
    prefix: String,
    done_signal: String,
}

impl Default for SseFrameDecoder {
    fn default() -> Self {
        Self {
            delimiter: "\n\n".to_string(),
            prefix: "data: ".to_string(),
            done_signal: "[DONE]".to_string(),
        }
    }
}

struct DecodeState {
    // Raw bytes, not a String: a multibyte character may arrive split
    // across transport chunks, so decoding happens per complete frame only.
    input: stream::Fuse<BoxStream<'static, Bytes>>,
    buf: BytesMut,
    next_seq: u64,
    finished: bool,
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

impl SseFrameDecoder {
    /// Decode a raw byte stream into a finite event sequence.
    pub fn decode(&self, input: BoxStream<'static, Bytes>) -> EventStream {
        let delimiter = self.delimiter.clone();
        let prefix = self.prefix.clone();
        let done_signal = self.done_signal.clone();

        let state = DecodeState {
            input: input.fuse(),
            buf: BytesMut::new(),
            next_seq: 0,
            finished: false,
        };

        let stream = stream::unfold(state, move |mut st| {
            let delimiter = delimiter.clone();
            let prefix = prefix.clone();
            let done_signal = done_signal.clone();
            async move {
                if st.finished {
                    return None;
                }

                let strip = |frame: &str| -> String {
                    let trimmed = frame.trim();
                    if let Some(rest) = trimmed.strip_prefix(&prefix) {
                        rest.to_string()
                    } else if let Some(rest) = trimmed.strip_prefix("data:") {
                        rest.trim_start().to_string()
                    } else {
                        trimmed.to_string()
                    }
                };

                loop {
                    // Emit every complete frame already buffered. The
                    // delimiter is ASCII, so the split can never land inside
                    // a UTF-8 sequence of the frame text.
                    if let Some(idx) = find_subslice(&st.buf, delimiter.as_bytes()) {
                        let frame = st.buf.split_to(idx);
                        st.buf.advance(delimiter.len());

                        let payload = strip(&String::from_utf8_lossy(&frame));
                        // Skip blanks and SSE comment lines.
                        if payload.is_empty() || payload.starts_with(':') {
                            continue;
                        }

                        let seq = st.next_seq;
                        st.next_seq += 1;
                        if payload == done_signal {
                            st.finished = true;
                            return Some((StreamEvent::done(seq), st));
                        }
                        return Some((StreamEvent::data(seq, payload), st));
                    }

                    // Need more bytes.
                    match st.input.next().await {
                        Some(Ok(bytes)) => {
                            st.buf.extend_from_slice(&bytes);
                        }
                        Some(Err(e)) => {
                            let seq = st.next_seq;
                            st.finished = true;
                            let detail = match e {
                                Error::StreamInterrupted(d) => d,
                                other => other.to_string(),
                            };
                            return Some((
                                StreamEvent::error(seq, format!("stream interrupted: {detail}")),
                                st,
                            ));
                        }
                        None => {
                            // EOF. A leftover partial frame may still hold
                            // the done marker (no trailing delimiter).
                            let payload = strip(&String::from_utf8_lossy(&st.buf));
                            st.buf.clear();
                            let seq = st.next_seq;
                            st.next_seq += 1;
                            st.finished = true;
                            if payload == done_signal {
                                return Some((StreamEvent::done(seq), st));
                            }
                            if !payload.is_empty() && !payload.starts_with(':') {
                                // A dangling data frame at EOF still means
                                // the upstream never sent its done marker;
                                // deliver the frame, then fail on the next
                                // poll.
                                st.finished = false;
                                return Some((StreamEvent::data(seq, payload), st));
                            }
                            return Some((StreamEvent::error(
                                seq,
                                "stream interrupted: connection closed before done marker"
                                    .to_string(),
                            ), st));
                        }
                    }
                }
            }
        });

        Box::pin(stream)
    }
}

/// True when an event terminates the session's event sequence.
pub fn is_terminal_event(event: &StreamEvent) -> bool {
    matches!(event.kind, EventKind::Done | EventKind::Error)
}
