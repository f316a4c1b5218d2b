//! Property-based tests for frame decoding
//!
//! Decoding runs on bytes straight off the network, so it must reject
//! garbage without panicking and must agree with encoding for every frame the
//! server can produce.

#![allow(clippy::expect_used)]

use proptest::prelude::*;
use stackgate_proto::{Frame, FrameHeader, ProtocolError};

proptest! {
    #[test]
    fn prop_decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..128)) {
        let _ = Frame::decode(&bytes);
    }

    #[test]
    fn prop_bad_magic_always_rejected(
        magic in any::<u32>().prop_filter("not STGW", |m| *m != FrameHeader::MAGIC),
        tail in prop::collection::vec(any::<u8>(), 12..64),
    ) {
        let mut bytes = magic.to_be_bytes().to_vec();
        bytes.extend_from_slice(&tail);

        prop_assert_eq!(Frame::decode(&bytes), Err(ProtocolError::InvalidMagic));
    }

    #[test]
    fn prop_streamed_frames_decode_in_order(texts in prop::collection::vec(".{0,64}", 1..8)) {
        let mut wire = Vec::new();
        for text in &texts {
            Frame::from_text(text.clone()).encode(&mut wire).expect("encode");
        }

        let mut offset = 0;
        for text in &texts {
            let frame = Frame::decode(&wire[offset..]).expect("decode");
            prop_assert_eq!(frame.text().expect("utf-8"), text.as_str());
            offset += frame.encoded_len();
        }
        prop_assert_eq!(offset, wire.len());
    }
}
