//! Fuzz target for Frame::decode
//!
//! Feeds arbitrary byte sequences to the decoder looking for:
//! - Parser crashes or panics
//! - Integer overflows in size calculations
//! - Buffer over-reads
//!
//! The decoder must never panic; every invalid input returns an error. A
//! frame that decodes must round-trip through `encode` to the same prefix.

#![no_main]

use libfuzzer_sys::fuzz_target;
use stackgate_proto::{Frame, FrameHeader};

fuzz_target!(|data: &[u8]| {
    let Ok(frame) = Frame::decode(data) else {
        return;
    };

    let consumed = FrameHeader::SIZE + frame.payload.len();
    assert_eq!(frame.encoded_len(), consumed);

    let mut encoded = Vec::with_capacity(consumed);
    frame.encode(&mut encoded).expect("decoded frame must re-encode");
    assert_eq!(&encoded[..], &data[..consumed]);

    // Payloads need not be UTF-8; text extraction reports that as an error
    let _ = frame.text();
});
