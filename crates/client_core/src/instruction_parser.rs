//! Incremental parser for AI search streams.
//!
//! A stream is a sequence of text frames: free-form reasoning, an
//! end-of-thoughts marker, the JSON filter instruction (possibly split over
//! several frames), and a terminating stream-end marker.

use anyhow::Result;
use async_trait::async_trait;
use shared::protocol::{FilterInstructionWire, StreamMarker};
use tracing::{debug, warn};

use crate::{error::InstructionError, filter::filter_state_from_map, types::FilterState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    Thinking,
    AwaitingJson,
    Done,
}

/// Effect of a single frame on the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    ThoughtAppended,
    InstructionAppended,
    ThoughtsEnded,
    Ignored,
    Finished(Result<FilterState, InstructionError>),
}

#[derive(Debug)]
pub struct InstructionParser {
    state: ParserState,
    thoughts: String,
    json_buffer: String,
}

impl Default for InstructionParser {
    fn default() -> Self {
        Self::new()
    }
}

impl InstructionParser {
    pub fn new() -> Self {
        Self {
            state: ParserState::Thinking,
            thoughts: String::new(),
            json_buffer: String::new(),
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    pub fn thoughts(&self) -> &str {
        &self.thoughts
    }

    pub fn is_done(&self) -> bool {
        self.state == ParserState::Done
    }

    pub fn feed(&mut self, frame: &str) -> FrameOutcome {
        if self.state == ParserState::Done {
            return FrameOutcome::Ignored;
        }

        match StreamMarker::recognize(frame) {
            Some(StreamMarker::StreamEnd) => {
                let outcome = self.finish();
                self.state = ParserState::Done;
                FrameOutcome::Finished(outcome)
            }
            Some(StreamMarker::EndOfThoughts) => {
                if self.state == ParserState::Thinking {
                    self.state = ParserState::AwaitingJson;
                    FrameOutcome::ThoughtsEnded
                } else {
                    debug!("instruction: repeated end-of-thoughts marker ignored");
                    FrameOutcome::Ignored
                }
            }
            None if self.state == ParserState::Thinking => {
                self.thoughts.push_str(frame);
                FrameOutcome::ThoughtAppended
            }
            None => {
                self.json_buffer.push_str(frame);
                FrameOutcome::InstructionAppended
            }
        }
    }

    /// Ends the stream with a transport failure, discarding partial buffers.
    pub fn fail_transport(&mut self, reason: impl Into<String>) -> InstructionError {
        self.state = ParserState::Done;
        self.thoughts.clear();
        self.json_buffer.clear();
        InstructionError::Transport(reason.into())
    }

    fn finish(&mut self) -> Result<FilterState, InstructionError> {
        let raw = std::mem::take(&mut self.json_buffer);
        let raw = raw.trim();
        if self.state != ParserState::AwaitingJson || raw.is_empty() {
            return Err(InstructionError::EmptyInstruction);
        }

        let wire: FilterInstructionWire =
            serde_json::from_str(raw).map_err(|err| InstructionError::Parse(err.to_string()))?;
        Ok(wire
            .filters
            .map(|filters| filter_state_from_map(&filters))
            .unwrap_or_default())
    }
}

/// Ordered supply of stream frames, such as an open server-sent events body.
#[async_trait]
pub trait FrameSource: Send {
    /// `None` once the underlying stream has ended.
    async fn next_frame(&mut self) -> Option<Result<String>>;
    async fn close(&mut self);
}

/// Feeds frames from `source` into `parser` until the stream is done,
/// reporting the accumulated thoughts after every reasoning frame. The source
/// is closed on every exit path.
pub async fn drive<F>(
    source: &mut (dyn FrameSource + '_),
    parser: &mut InstructionParser,
    mut on_thoughts: F,
) -> Result<FilterState, InstructionError>
where
    F: FnMut(&str) + Send,
{
    let outcome = loop {
        let frame = match source.next_frame().await {
            Some(Ok(frame)) => frame,
            Some(Err(err)) => {
                warn!(error = %format!("{err:#}"), "instruction: stream failed");
                break Err(parser.fail_transport(format!("{err:#}")));
            }
            None => {
                warn!("instruction: stream ended before end marker");
                break Err(parser.fail_transport("stream ended before end marker"));
            }
        };
        match parser.feed(&frame) {
            FrameOutcome::ThoughtAppended => on_thoughts(parser.thoughts()),
            FrameOutcome::Finished(outcome) => break outcome,
            _ => {}
        }
    };
    source.close().await;
    outcome
}

#[cfg(test)]
#[path = "tests/instruction_parser_tests.rs"]
mod tests;
