//! Streaming Wire Transport
//!
//! Low-level pieces of the assistance service's streaming protocol:
//! - [`frame`]: length-prefixed frame reassembly over chunked HTTP bodies
//! - [`wire`]: varint helpers and the wrapped reply-text record
//!
//! # Design Philosophy
//!
//! The transport layer knows nothing about chat or completions. It turns raw
//! network chunks into complete frames and back, and nothing else. The
//! buffer backing a decoder is owned by exactly one session for the lifetime
//! of one streaming response.

pub mod frame;
pub mod wire;

// Re-exports for convenience
pub use frame::{FrameDecoder, FrameEvent, HEADER_SIZE, MAX_FRAME_SIZE, MIN_MESSAGE_SIZE};

/// Errors raised by the streaming transport
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The pending network operation did not complete in time
    #[error("request timed out")]
    Timeout,

    /// Network or HTTP-level failure
    #[error("http transport failed: {0}")]
    Http(String),

    /// A frame header carried a non-zero compression flag
    ///
    /// Compressed frames are not implemented. The remaining buffer is not
    /// interpreted after this error.
    #[error("unsupported frame encoding: compression flag {0:#04x}")]
    UnsupportedEncoding(u8),

    /// A frame declared a payload larger than the maximum frame size
    #[error("frame size {size} exceeds maximum {max}")]
    FrameTooLarge {
        /// Declared payload length
        size: usize,
        /// Enforced maximum
        max: usize,
    },

    /// Varint or wrapped-record data could not be parsed
    #[error("malformed wire data: {0}")]
    Malformed(String),
}
