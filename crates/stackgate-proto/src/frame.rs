//! Frame type combining header and text payload.
//!
//! A `Frame` is one protocol message on the wire:
//! - 16-byte raw binary header (Big Endian)
//! - UTF-8 text payload of `header.payload_size()` bytes

use bytes::{BufMut, Bytes};

use crate::{
    FrameHeader,
    errors::{ProtocolError, Result},
};

/// Complete protocol frame
///
/// Layout on the wire:
/// `[FrameHeader: 16 bytes] + [payload: variable bytes]`
///
/// # Invariants
///
/// - Size Consistency: `payload.len()` MUST match `header.payload_size()`.
///   Enforced by [`Frame::new`] and verified by [`Frame::decode`].
/// - Size Limit: `payload.len()` MUST NOT exceed
///   [`FrameHeader::MAX_PAYLOAD_SIZE`]. Violations are rejected during
///   encoding and decoding.
///
/// The payload is kept as raw bytes. UTF-8 validity is checked when the text
/// is read with [`Frame::text`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame header (16 bytes)
    pub header: FrameHeader,

    /// Raw payload bytes
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame with automatic `payload_size` calculation
    ///
    /// Lengths above `u32::MAX` saturate, which later fails the size check in
    /// [`Frame::encode`].
    #[must_use]
    pub fn new(mut header: FrameHeader, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();

        let payload_len = u32::try_from(payload.len()).unwrap_or(u32::MAX);
        header.payload_size = payload_len.to_be_bytes();

        Self { header, payload }
    }

    /// Create a frame carrying `text`.
    #[must_use]
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new(FrameHeader::new(), Bytes::from(text.into()))
    }

    /// Payload as UTF-8 text.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::InvalidUtf8` if the payload is not UTF-8
    pub fn text(&self) -> Result<&str> {
        std::str::from_utf8(&self.payload).map_err(|_| ProtocolError::InvalidUtf8)
    }

    /// Consume the frame and return its payload as an owned `String`.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::InvalidUtf8` if the payload is not UTF-8
    pub fn into_text(self) -> Result<String> {
        String::from_utf8(self.payload.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
    }

    /// Total encoded size (header plus payload).
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        FrameHeader::SIZE + self.payload.len()
    }

    /// Encode frame into buffer
    ///
    /// Writes: `[header (16 bytes)] + [payload (variable)]`
    ///
    /// # Errors
    ///
    /// - `ProtocolError::PayloadTooLarge` if payload exceeds
    ///   `MAX_PAYLOAD_SIZE`
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        if self.payload.len() > FrameHeader::MAX_PAYLOAD_SIZE as usize {
            return Err(ProtocolError::PayloadTooLarge {
                size: self.payload.len(),
                max: FrameHeader::MAX_PAYLOAD_SIZE as usize,
            });
        }

        debug_assert_eq!(self.payload.len(), self.header.payload_size() as usize);

        dst.put_slice(&self.header.to_bytes());
        dst.put_slice(&self.payload);

        Ok(())
    }

    /// Decode frame from wire format
    ///
    /// Trailing bytes after the payload are ignored.
    ///
    /// # Errors
    ///
    /// - `ProtocolError` if header parsing fails (invalid magic, version, or
    ///   size limits)
    /// - `ProtocolError::FrameTruncated` if payload is truncated (fewer bytes
    ///   than header claims)
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header = FrameHeader::from_bytes(bytes)?;

        let payload_size = header.payload_size() as usize;
        let total_size = FrameHeader::SIZE + payload_size;

        let Some(payload) = bytes.get(FrameHeader::SIZE..total_size) else {
            return Err(ProtocolError::FrameTruncated {
                expected: payload_size,
                actual: bytes.len().saturating_sub(FrameHeader::SIZE),
            });
        };

        Ok(Self { header: *header, payload: Bytes::copy_from_slice(payload) })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn text_survives_encoding(text in ".{0,256}") {
            let frame = Frame::from_text(text.clone());
            let mut wire = Vec::new();
            frame.encode(&mut wire).expect("should encode");

            let parsed = Frame::decode(&wire).expect("should decode");
            prop_assert_eq!(parsed.text().expect("utf-8"), text.as_str());
        }
    }

    #[test]
    fn from_text_sets_payload_size() {
        let frame = Frame::from_text("lsimage");
        assert_eq!(frame.header.payload_size(), 7);
        assert_eq!(frame.encoded_len(), FrameHeader::SIZE + 7);
    }

    #[test]
    fn empty_frame_round_trips() {
        let frame = Frame::from_text("");
        let mut wire = Vec::new();
        frame.encode(&mut wire).unwrap();
        assert_eq!(wire.len(), FrameHeader::SIZE);

        let parsed = Frame::decode(&wire).unwrap();
        assert_eq!(parsed.text().unwrap(), "");
    }

    #[test]
    fn reject_truncated_frame() {
        let frame = Frame::from_text("AUTH SEQUENCE INITIATED BY SERVER . . . ");
        let mut wire = Vec::new();
        frame.encode(&mut wire).unwrap();

        let result = Frame::decode(&wire[..wire.len() - 3]);
        assert!(matches!(result, Err(ProtocolError::FrameTruncated { .. })));
    }

    #[test]
    fn reject_oversized_payload_on_encode() {
        let payload = vec![b'a'; FrameHeader::MAX_PAYLOAD_SIZE as usize + 1];
        let frame = Frame::new(FrameHeader::new(), payload);

        let mut wire = Vec::new();
        assert!(matches!(frame.encode(&mut wire), Err(ProtocolError::PayloadTooLarge { .. })));
        assert!(wire.is_empty());
    }

    #[test]
    fn non_utf8_payload_is_reported() {
        let frame = Frame::new(FrameHeader::new(), vec![0xff, 0xfe]);
        assert_eq!(frame.text(), Err(ProtocolError::InvalidUtf8));
        assert_eq!(frame.into_text(), Err(ProtocolError::InvalidUtf8));
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let mut wire = Vec::new();
        Frame::from_text("success").encode(&mut wire).unwrap();
        wire.extend_from_slice(b"garbage");

        let parsed = Frame::decode(&wire).unwrap();
        assert_eq!(parsed.text().unwrap(), "success");
    }
}
