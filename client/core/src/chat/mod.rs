//! Streaming Chat
//!
//! One chat exchange is one streaming POST: the request rides in a single
//! frame, the reply arrives as a frame sequence in the chunked response
//! body. [`session::ChatStreamSession`] is the pure incremental state
//! machine over those frames; the network driver lives with the host-side
//! orchestrator and reports through [`ChatEvent`]s.

pub mod decoder;
pub mod session;

pub use decoder::{ChatMessage, ChatMessageDecoder, WrappedTextDecoder};
pub use session::{ChatStreamSession, ChunkOutcome, MAX_CONSECUTIVE_DECODE_FAILURES};

use crate::registry::ConversationId;
use crate::transport::TransportError;

/// Errors that abort a chat session
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Transport-level failure (timeout, HTTP, framing)
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Too many consecutive frame payloads failed to decode
    #[error("frame payload failed to decode {failures} consecutive times: {last}")]
    Decode {
        /// How many consecutive failures were seen
        failures: u32,
        /// Description of the last failure
        last: String,
    },

    /// The output sink was closed while the stream was live
    #[error("output sink was closed mid-stream")]
    SinkInvalidated,
}

/// Worker-to-host events for one chat exchange
///
/// The streaming worker never touches the registry or a sink; it posts
/// these for the host loop to apply.
#[derive(Debug)]
pub enum ChatEvent {
    /// New reply text to append to the conversation's sink
    Delta {
        /// Conversation the text belongs to
        conversation_id: ConversationId,
        /// The new tail of the reply
        text: String,
    },
    /// The exchange ended; always sent exactly once, on every exit path
    Closed {
        /// Conversation the exchange belonged to
        conversation_id: ConversationId,
        /// Last fully decoded reply, if any frame decoded
        final_text: Option<String>,
        /// Whether the exchange ended by cancellation
        cancelled: bool,
        /// Failure description when the exchange ended in error
        error: Option<String>,
    },
}
