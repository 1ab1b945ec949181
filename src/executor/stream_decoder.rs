use std::io::{self, Write};

use futures::{Stream, StreamExt};
use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;

use crate::executor::chat::ChatChunk;
use crate::executor::ExecutorError;
use crate::output::is_consumer_closed;

pub const DATA_PREFIX: &str = "data: ";
pub const DONE_MARKER: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolEvent {
    pub payload: String,
    pub done: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// Blank keep-alive or a line without the `data: ` prefix.
    Ignored,
    /// Payload is not JSON at all.
    Malformed,
    /// Payload is JSON but not shaped like a chunk.
    Unexpected(String),
    Event(ProtocolEvent),
}

/// Classifies one raw line of the event stream.
pub fn decode_line(line: &str) -> LineOutcome {
    let Some(data) = line.strip_prefix(DATA_PREFIX) else {
        return LineOutcome::Ignored;
    };

    if data.trim_end() == DONE_MARKER {
        return LineOutcome::Event(ProtocolEvent {
            payload: String::new(),
            done: true,
        });
    }

    let value: Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(_) => return LineOutcome::Malformed,
    };

    match ChatChunk::deserialize(value).and_then(ChatChunk::first_content) {
        Ok(content) => LineOutcome::Event(ProtocolEvent {
            payload: content.unwrap_or_default(),
            done: false,
        }),
        Err(err) => LineOutcome::Unexpected(err.to_string()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    DoneMarker,
    EndOfStream,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Completed {
        fragments: usize,
        termination: Termination,
    },
    ConsumerClosed {
        fragments: usize,
    },
}

/// Turns an ordered source of event-stream lines into text fragments.
///
/// The source is never polled again once `[DONE]` is seen, the source ends,
/// or it yields an error.
pub struct StreamDecoder<S> {
    lines: S,
    termination: Option<Termination>,
    fragments: usize,
}

impl<S> StreamDecoder<S>
where
    S: Stream<Item = io::Result<String>> + Unpin,
{
    pub fn new(lines: S) -> Self {
        Self {
            lines,
            termination: None,
            fragments: 0,
        }
    }

    pub fn termination(&self) -> Option<Termination> {
        self.termination
    }

    pub fn fragments(&self) -> usize {
        self.fragments
    }

    pub async fn next_fragment(&mut self, diag: &mut impl Write) -> Option<Result<String, ExecutorError>> {
        if self.termination.is_some() {
            return None;
        }

        loop {
            let line = match self.lines.next().await {
                Some(Ok(line)) => line,
                Some(Err(err)) => {
                    self.termination = Some(Termination::Aborted);
                    return Some(Err(ExecutorError::StreamInterrupted(err)));
                }
                None => {
                    debug!("Stream ended without a done marker");
                    self.termination = Some(Termination::EndOfStream);
                    return None;
                }
            };

            match decode_line(&line) {
                LineOutcome::Ignored => {}
                LineOutcome::Malformed => {
                    debug!("Skipping malformed chunk: {line}");
                }
                LineOutcome::Unexpected(detail) => {
                    if let Err(err) = writeln!(diag, "[Parse Error: {detail}]") {
                        warn!("Could not write diagnostic: {err}");
                    }
                }
                LineOutcome::Event(event) if event.done => {
                    debug!("Done marker after {} fragments", self.fragments);
                    self.termination = Some(Termination::DoneMarker);
                    return None;
                }
                LineOutcome::Event(event) => {
                    if !event.payload.is_empty() {
                        self.fragments += 1;
                        return Some(Ok(event.payload));
                    }
                }
            }
        }
    }

    /// Writes every fragment to `out` as it arrives, then one newline.
    pub async fn render(&mut self, out: &mut impl Write, diag: &mut impl Write) -> Result<RenderOutcome, ExecutorError> {
        while let Some(fragment) = self.next_fragment(diag).await {
            let fragment = fragment?;

            let written = out.write_all(fragment.as_bytes()).and_then(|_| out.flush());
            if let Some(outcome) = self.check_written(written)? {
                return Ok(outcome);
            }
        }

        let written = out.write_all(b"\n").and_then(|_| out.flush());
        if let Some(outcome) = self.check_written(written)? {
            return Ok(outcome);
        }

        Ok(RenderOutcome::Completed {
            fragments: self.fragments,
            termination: self.termination.unwrap_or(Termination::EndOfStream),
        })
    }

    pub async fn collect(&mut self, diag: &mut impl Write) -> Result<String, ExecutorError> {
        let mut result = String::new();

        while let Some(fragment) = self.next_fragment(diag).await {
            result.push_str(&fragment?);
        }

        Ok(result)
    }

    fn check_written(&self, written: io::Result<()>) -> Result<Option<RenderOutcome>, ExecutorError> {
        match written {
            Ok(()) => Ok(None),
            Err(err) if is_consumer_closed(&err) => {
                debug!("Output closed after {} fragments", self.fragments);
                Ok(Some(RenderOutcome::ConsumerClosed {
                    fragments: self.fragments,
                }))
            }
            Err(err) => Err(ExecutorError::Output(err)),
        }
    }
}
