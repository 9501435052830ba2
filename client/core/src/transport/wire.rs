//! Wrapped Reply-Text Record
//!
//! Inside a chat frame payload, the reply text is wrapped as
//!
//! ```text
//! +------------+------------------+--------------------+
//! | marker (1) | varint byte count| UTF-8 text          |
//! +------------+------------------+--------------------+
//! ```
//!
//! The marker byte has no documented meaning; it is skipped and never
//! interpreted. The varint is the standard base-128 little-endian-group
//! encoding and counts the UTF-8 bytes that follow.

use super::TransportError;

/// Maximum encoded varint width for a u64
const MAX_VARINT_BYTES: usize = 10;

/// Marker byte written when encoding a wrapped record
///
/// Readers skip the marker without interpreting it, so the value only
/// matters for symmetry in tests.
pub const TEXT_MARKER: u8 = 0x0a;

/// Decode a base-128 varint from the front of `buf`
///
/// Returns the value and the number of bytes consumed.
///
/// # Errors
///
/// Returns [`TransportError::Malformed`] if the buffer ends mid-varint or
/// the encoding exceeds the width of a u64.
pub fn decode_varint(buf: &[u8]) -> Result<(u64, usize), TransportError> {
    let mut value: u64 = 0;
    for (i, byte) in buf.iter().enumerate() {
        if i >= MAX_VARINT_BYTES {
            return Err(TransportError::Malformed("varint too long".into()));
        }
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(TransportError::Malformed("truncated varint".into()))
}

/// Encode `value` as a base-128 varint, appending to `out`
pub fn encode_varint(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Extract the wrapped reply text from a frame payload
///
/// Skips the marker byte, reads the varint byte count, and returns exactly
/// that many bytes as UTF-8. Trailing payload bytes are ignored.
///
/// # Errors
///
/// Returns [`TransportError::Malformed`] when the payload is too short, the
/// declared count overruns the payload, or the text is not valid UTF-8.
pub fn decode_wrapped_text(payload: &[u8]) -> Result<&str, TransportError> {
    if payload.len() < 2 {
        return Err(TransportError::Malformed(
            "payload too short for wrapped text".into(),
        ));
    }

    // Skip the marker byte; its meaning is undocumented.
    let (count, varint_len) = decode_varint(&payload[1..])?;
    let start = 1 + varint_len;
    let end = start
        + usize::try_from(count)
            .map_err(|_| TransportError::Malformed("text length overflows usize".into()))?;

    let bytes = payload
        .get(start..end)
        .ok_or_else(|| TransportError::Malformed("declared text length overruns payload".into()))?;

    std::str::from_utf8(bytes)
        .map_err(|e| TransportError::Malformed(format!("reply text is not UTF-8: {e}")))
}

/// Wrap `text` as a marker + varint + UTF-8 record
#[must_use]
pub fn encode_wrapped_text(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + text.len());
    out.push(TEXT_MARKER);
    encode_varint(text.len() as u64, &mut out);
    out.extend_from_slice(text.as_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_roundtrip() {
        for value in [0u64, 1, 127, 128, 300, 16_383, 16_384, u64::MAX] {
            let mut buf = Vec::new();
            encode_varint(value, &mut buf);
            let (decoded, consumed) = decode_varint(&buf).unwrap();
            assert_eq!(decoded, value);
            assert_eq!(consumed, buf.len());
        }
    }

    #[test]
    fn test_varint_known_encoding() {
        let mut buf = Vec::new();
        encode_varint(300, &mut buf);
        assert_eq!(buf, vec![0xac, 0x02]);
    }

    #[test]
    fn test_varint_truncated() {
        assert!(matches!(
            decode_varint(&[0x80]),
            Err(TransportError::Malformed(_))
        ));
        assert!(matches!(
            decode_varint(&[]),
            Err(TransportError::Malformed(_))
        ));
    }

    #[test]
    fn test_varint_too_long() {
        let buf = [0xff; 11];
        assert!(matches!(
            decode_varint(&buf),
            Err(TransportError::Malformed(_))
        ));
    }

    #[test]
    fn test_wrapped_text_roundtrip() {
        let payload = encode_wrapped_text("Hello, stream!");
        assert_eq!(decode_wrapped_text(&payload).unwrap(), "Hello, stream!");
    }

    #[test]
    fn test_wrapped_text_marker_value_is_opaque() {
        let mut payload = encode_wrapped_text("whatever");
        payload[0] = 0xf7;
        assert_eq!(decode_wrapped_text(&payload).unwrap(), "whatever");
    }

    #[test]
    fn test_wrapped_text_ignores_trailing_bytes() {
        let mut payload = encode_wrapped_text("kept");
        payload.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(decode_wrapped_text(&payload).unwrap(), "kept");
    }

    #[test]
    fn test_wrapped_text_overrun_count() {
        let mut payload = vec![TEXT_MARKER];
        encode_varint(99, &mut payload);
        payload.extend_from_slice(b"short");
        assert!(matches!(
            decode_wrapped_text(&payload),
            Err(TransportError::Malformed(_))
        ));
    }

    #[test]
    fn test_wrapped_text_invalid_utf8() {
        let mut payload = vec![TEXT_MARKER];
        encode_varint(2, &mut payload);
        payload.extend_from_slice(&[0xff, 0xfe]);
        assert!(matches!(
            decode_wrapped_text(&payload),
            Err(TransportError::Malformed(_))
        ));
    }

    #[test]
    fn test_wrapped_text_too_short() {
        assert!(matches!(
            decode_wrapped_text(&[TEXT_MARKER]),
            Err(TransportError::Malformed(_))
        ));
    }
}
