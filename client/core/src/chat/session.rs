//! Chat Stream Session
//!
//! The incremental state machine for one streamed chat reply. Network
//! chunks go in; text deltas come out. The session owns its frame decoder
//! and buffer exclusively for the lifetime of one response.
//!
//! The service resends the full reply-so-far in every frame, so the session
//! diffs each decoded message against the byte length it has already seen
//! and emits only the new tail. Cancellation is handled by the driver at
//! chunk boundaries; this type only records enough state (the last fully
//! decoded message) for a cancelled turn to be persisted to history.

use super::decoder::ChatMessageDecoder;
use super::ChatError;
use crate::transport::{FrameDecoder, FrameEvent};

/// Consecutive payload-decode failures tolerated before the session aborts
pub const MAX_CONSECUTIVE_DECODE_FAILURES: u32 = 2;

/// What one network chunk produced
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChunkOutcome {
    /// New reply tails, one per frame that extended the text
    pub deltas: Vec<String>,
    /// Whether the stream's terminal frame was seen
    pub finished: bool,
}

/// State machine for one streamed chat reply
pub struct ChatStreamSession<D: ChatMessageDecoder> {
    frames: FrameDecoder,
    decoder: D,
    /// Byte length of the reply text already emitted as deltas
    seen_bytes: usize,
    /// Last fully decoded message, kept for history persistence
    last_text: Option<String>,
    consecutive_failures: u32,
    finished: bool,
}

impl<D: ChatMessageDecoder> ChatStreamSession<D> {
    /// Create a session around a payload decoder
    pub fn new(decoder: D) -> Self {
        Self {
            frames: FrameDecoder::new(),
            decoder,
            seen_bytes: 0,
            last_text: None,
            consecutive_failures: 0,
            finished: false,
        }
    }

    /// Feed one network chunk and collect the deltas it completes
    ///
    /// A chunk may complete zero, one, or many frames. After the terminal
    /// frame, further chunks are ignored.
    ///
    /// # Errors
    ///
    /// Transport errors (unsupported encoding, oversized frame) and the
    /// third consecutive payload-decode failure abort the session.
    pub fn process_chunk(&mut self, chunk: &[u8]) -> Result<ChunkOutcome, ChatError> {
        let mut outcome = ChunkOutcome {
            finished: self.finished,
            ..ChunkOutcome::default()
        };
        if self.finished {
            return Ok(outcome);
        }

        self.frames.push(chunk);
        while let Some(frame) = self.frames.next_frame()? {
            match frame {
                FrameEvent::End => {
                    self.finished = true;
                    outcome.finished = true;
                    break;
                }
                FrameEvent::Message(payload) => match self.decoder.decode(&payload) {
                    Ok(message) => {
                        self.consecutive_failures = 0;
                        if let Some(delta) = self.advance(&message.text) {
                            outcome.deltas.push(delta);
                        }
                    }
                    Err(e) => {
                        self.consecutive_failures += 1;
                        if self.consecutive_failures > MAX_CONSECUTIVE_DECODE_FAILURES {
                            return Err(ChatError::Decode {
                                failures: self.consecutive_failures,
                                last: e.to_string(),
                            });
                        }
                        tracing::warn!(
                            failures = self.consecutive_failures,
                            error = %e,
                            "skipping undecodable chat frame"
                        );
                    }
                },
            }
        }

        Ok(outcome)
    }

    /// Compute the new tail of a full-so-far message, if it extends what
    /// was already emitted
    fn advance(&mut self, text: &str) -> Option<String> {
        let tail = text
            .get(self.seen_bytes..)
            .filter(|tail| !tail.is_empty())
            .map(str::to_string);
        if tail.is_some() {
            self.seen_bytes = text.len();
        }
        // The latest decoded message is authoritative for history even when
        // it contributed no delta.
        self.last_text = Some(text.to_string());
        tail
    }

    /// Last fully decoded message, if any frame decoded
    #[must_use]
    pub fn last_text(&self) -> Option<&str> {
        self.last_text.as_deref()
    }

    /// Whether the terminal frame was seen
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}
