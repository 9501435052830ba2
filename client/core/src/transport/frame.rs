//! Frame Protocol
//!
//! Wire format for the streaming chat call: length-prefixed frames carried in
//! a chunked HTTP response body.
//!
//! # Frame Format
//!
//! ```text
//! +----------+----------------+------------------------------------------+
//! | Flag (1) | Length (4)     | Payload (variable)                       |
//! | 0x00     | big-endian u32 | serialized domain message                |
//! +----------+----------------+------------------------------------------+
//! ```
//!
//! The Flag byte is a compression flag and must be zero; compressed frames
//! are not implemented and fail the stream. The Length field counts payload
//! bytes only.
//!
//! A frame is only ever materialized once `5 + length` bytes are buffered. A
//! declared length below [`MIN_MESSAGE_SIZE`] cannot hold a message and is
//! treated as the end-of-stream marker.
//!
//! # Security
//!
//! - Maximum frame size is enforced to prevent memory exhaustion
//! - Length field is validated before allocating a payload buffer

use super::TransportError;

/// Maximum frame size (10 MB)
///
/// This prevents memory exhaustion from malicious or corrupted frames.
pub const MAX_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Frame header size: 1 byte compression flag + 4 bytes length
pub const HEADER_SIZE: usize = 5;

/// Smallest payload that can hold a message (marker byte + one varint byte)
///
/// Frames declaring less are the stream terminator.
pub const MIN_MESSAGE_SIZE: usize = 2;

/// Minimum buffer capacity for decoder
const MIN_BUFFER_CAPACITY: usize = 4096;

/// Encode a payload into a single request frame
///
/// # Errors
///
/// Returns [`TransportError::FrameTooLarge`] if the payload exceeds
/// [`MAX_FRAME_SIZE`].
pub fn encode(payload: &[u8]) -> Result<Vec<u8>, TransportError> {
    if payload.len() > MAX_FRAME_SIZE {
        return Err(TransportError::FrameTooLarge {
            size: payload.len(),
            max: MAX_FRAME_SIZE,
        });
    }

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.push(0x00);
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// A decoded unit of the streaming protocol
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameEvent {
    /// One complete message payload
    Message(Vec<u8>),
    /// End-of-stream marker (a frame too short to hold a message)
    End,
}

/// Decoder state machine for streaming frame parsing
///
/// Buffers incoming bytes and yields complete frames. The buffer is mutated
/// only by appends and front-consumption; partial data never consumes bytes.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    /// Position where we've consumed up to
    read_pos: usize,
    /// Set once the end-of-stream marker was seen
    finished: bool,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Create a new decoder with default buffer capacity
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(MIN_BUFFER_CAPACITY),
            read_pos: 0,
            finished: false,
        }
    }

    /// Append bytes to the buffer
    pub fn push(&mut self, data: &[u8]) {
        // Compact buffer if we've consumed a lot
        if self.read_pos > self.buffer.len() / 2 && self.read_pos > MIN_BUFFER_CAPACITY {
            self.buffer.drain(..self.read_pos);
            self.read_pos = 0;
        }
        self.buffer.extend_from_slice(data);
    }

    /// Get the number of bytes available in the buffer
    #[must_use]
    pub fn available(&self) -> usize {
        self.buffer.len() - self.read_pos
    }

    /// Whether the end-of-stream marker was decoded
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Try to decode the next frame
    ///
    /// Returns:
    /// - `Ok(Some(FrameEvent::Message(payload)))` if a complete frame was decoded
    /// - `Ok(Some(FrameEvent::End))` on the end-of-stream marker
    /// - `Ok(None)` if more data is needed (no bytes are consumed)
    /// - `Err(TransportError::UnsupportedEncoding)` on a non-zero compression
    ///   flag; the length bytes are never interpreted in that case
    /// - `Err(TransportError::FrameTooLarge)` on an implausibly large length
    pub fn next_frame(&mut self) -> Result<Option<FrameEvent>, TransportError> {
        if self.finished {
            return Ok(None);
        }

        let available = self.available();
        if available == 0 {
            return Ok(None);
        }

        // The flag is checked before the length so a compressed frame never
        // has its remaining header bytes interpreted.
        let flag = self.buffer[self.read_pos];
        if flag != 0 {
            return Err(TransportError::UnsupportedEncoding(flag));
        }

        if available < HEADER_SIZE {
            return Ok(None);
        }

        let len_bytes = &self.buffer[self.read_pos + 1..self.read_pos + HEADER_SIZE];
        let len =
            u32::from_be_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;

        if len > MAX_FRAME_SIZE {
            return Err(TransportError::FrameTooLarge {
                size: len,
                max: MAX_FRAME_SIZE,
            });
        }

        if len < MIN_MESSAGE_SIZE {
            self.finished = true;
            return Ok(Some(FrameEvent::End));
        }

        if available < HEADER_SIZE + len {
            return Ok(None);
        }

        let payload_start = self.read_pos + HEADER_SIZE;
        let payload_end = payload_start + len;
        let payload = self.buffer[payload_start..payload_end].to_vec();

        // Advance read position
        self.read_pos = payload_end;

        Ok(Some(FrameEvent::Message(payload)))
    }

    /// Feed a chunk and collect every frame it completes
    ///
    /// A single network read may yield zero, one, or many frames.
    ///
    /// # Errors
    ///
    /// Propagates the first decode error; the buffer is not interpreted
    /// further after an error.
    pub fn feed(&mut self, data: &[u8]) -> Result<Vec<FrameEvent>, TransportError> {
        self.push(data);
        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame()? {
            let end = frame == FrameEvent::End;
            frames.push(frame);
            if end {
                break;
            }
        }
        Ok(frames)
    }

    /// Clear the buffer
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.read_pos = 0;
        self.finished = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_bytes(payload: &[u8]) -> Vec<u8> {
        encode(payload).unwrap()
    }

    #[test]
    fn test_decode_single_frame() {
        let mut decoder = FrameDecoder::new();
        decoder.push(&frame_bytes(b"hello"));

        let frame = decoder.next_frame().unwrap().unwrap();
        assert_eq!(frame, FrameEvent::Message(b"hello".to_vec()));
        assert!(decoder.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_decode_partial_header() {
        // Four header bytes, then the fifth. No frame may appear before the
        // full header (and payload) is buffered.
        let mut decoder = FrameDecoder::new();
        decoder.push(&[0, 0, 0, 0]);
        assert!(decoder.next_frame().unwrap().is_none());

        // Completing a zero-length header yields the terminal marker.
        decoder.push(&[0]);
        assert_eq!(decoder.next_frame().unwrap(), Some(FrameEvent::End));
    }

    #[test]
    fn test_decode_partial_payload() {
        let encoded = frame_bytes(b"split me");

        let mut decoder = FrameDecoder::new();
        decoder.push(&encoded[..encoded.len() / 2]);
        assert!(decoder.next_frame().unwrap().is_none());

        decoder.push(&encoded[encoded.len() / 2..]);
        let frame = decoder.next_frame().unwrap().unwrap();
        assert_eq!(frame, FrameEvent::Message(b"split me".to_vec()));
    }

    #[test]
    fn test_decode_multiple_frames_one_push() {
        let mut encoded = frame_bytes(b"first");
        encoded.extend(frame_bytes(b"second"));
        encoded.extend(frame_bytes(b"third"));

        let mut decoder = FrameDecoder::new();
        let frames = decoder.feed(&encoded).unwrap();
        assert_eq!(
            frames,
            vec![
                FrameEvent::Message(b"first".to_vec()),
                FrameEvent::Message(b"second".to_vec()),
                FrameEvent::Message(b"third".to_vec()),
            ]
        );
    }

    #[test]
    fn test_byte_at_a_time_matches_whole_stream() {
        let mut stream = frame_bytes(b"alpha");
        stream.extend(frame_bytes(b"beta"));
        stream.extend(frame_bytes("gamma \u{1F980}".as_bytes()));

        let mut whole = FrameDecoder::new();
        let expected = whole.feed(&stream).unwrap();

        let mut trickle = FrameDecoder::new();
        let mut got = Vec::new();
        for byte in &stream {
            got.extend(trickle.feed(std::slice::from_ref(byte)).unwrap());
        }

        assert_eq!(got, expected);
        assert_eq!(got.len(), 3);
    }

    #[test]
    fn test_unsupported_encoding_checked_before_length() {
        // A single flag byte is enough to fail: the length bytes that would
        // follow are never interpreted.
        let mut decoder = FrameDecoder::new();
        decoder.push(&[1]);

        let result = decoder.next_frame();
        assert!(matches!(
            result,
            Err(TransportError::UnsupportedEncoding(1))
        ));
    }

    #[test]
    fn test_frame_too_large() {
        let mut decoder = FrameDecoder::new();
        let mut header = vec![0u8];
        header.extend_from_slice(&((MAX_FRAME_SIZE as u32) + 1).to_be_bytes());
        decoder.push(&header);

        let result = decoder.next_frame();
        assert!(matches!(result, Err(TransportError::FrameTooLarge { .. })));
    }

    #[test]
    fn test_terminal_frame_stops_decoding() {
        // A zero-length frame ends the stream; a valid frame after it is
        // never surfaced.
        let mut stream = vec![0, 0, 0, 0, 0];
        stream.extend(frame_bytes(b"ignored"));

        let mut decoder = FrameDecoder::new();
        let frames = decoder.feed(&stream).unwrap();
        assert_eq!(frames, vec![FrameEvent::End]);
        assert!(decoder.is_finished());
        assert!(decoder.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_encode_layout() {
        let encoded = frame_bytes(b"abc");
        assert_eq!(encoded[0], 0x00);
        assert_eq!(encoded[1..5], 3u32.to_be_bytes());
        assert_eq!(&encoded[5..], b"abc");
    }

    #[test]
    fn test_encode_too_large() {
        let payload = vec![0u8; MAX_FRAME_SIZE + 1];
        assert!(matches!(
            encode(&payload),
            Err(TransportError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn test_clear_resets_terminal_state() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(&[0, 0, 0, 0, 0]).unwrap();
        assert!(decoder.is_finished());

        decoder.clear();
        assert!(!decoder.is_finished());
        let frames = decoder.feed(&frame_bytes(b"fresh")).unwrap();
        assert_eq!(frames, vec![FrameEvent::Message(b"fresh".to_vec())]);
    }
}
