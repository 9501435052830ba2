//! Chat Payload Decoding
//!
//! Frame payloads carry a serialized domain message whose reply-text field
//! is wrapped as `marker + varint + utf8`. The decoder is a trait so the
//! payload format can change without touching the session state machine.

use crate::transport::{wire, TransportError};

/// One decoded chat message
///
/// The service resends the full reply-so-far in every frame; `text` is that
/// cumulative string, not a delta.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    /// Full reply text so far
    pub text: String,
}

/// Decodes one frame payload into a [`ChatMessage`]
pub trait ChatMessageDecoder: Send {
    /// Decode a payload
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Malformed`] when the payload does not hold
    /// a readable message.
    fn decode(&self, payload: &[u8]) -> Result<ChatMessage, TransportError>;
}

/// Default decoder for the wrapped reply-text payload format
#[derive(Clone, Copy, Debug, Default)]
pub struct WrappedTextDecoder;

impl ChatMessageDecoder for WrappedTextDecoder {
    fn decode(&self, payload: &[u8]) -> Result<ChatMessage, TransportError> {
        let text = wire::decode_wrapped_text(payload)?;
        Ok(ChatMessage {
            text: text.to_string(),
        })
    }
}
