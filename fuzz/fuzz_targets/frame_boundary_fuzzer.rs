//! Fuzz target for frame header boundary conditions
//!
//! Malformed headers must be rejected before any payload is buffered.
//!
//! # Strategy
//!
//! - Magic bytes: Valid, off-by-one, all-zeros, all-ones, random
//! - Payload size: Zero, small, at-max, just-over-max, way-over-max, u32::MAX
//! - Version: Valid (0x01), zero, max, random
//! - Flags and reserved bytes: arbitrary
//!
//! # Invariants
//!
//! - `payload_size > MAX_PAYLOAD_SIZE` (1 MiB) MUST return
//!   `ProtocolError::PayloadTooLarge`
//! - Invalid magic bytes MUST return `ProtocolError::InvalidMagic`
//! - Flags and reserved bytes never affect acceptance
//! - All decode errors MUST be structured (never panic)
//! - Encoded size MUST equal 16 + payload_size

#![no_main]

use arbitrary::Arbitrary;
use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use stackgate_proto::{Frame, FrameHeader, ProtocolError};

const STACKGATE_MAGIC: [u8; 4] = [0x53, 0x54, 0x47, 0x57];
const MAX_PAYLOAD_SIZE: u32 = 1024 * 1024;

#[derive(Debug, Clone, Arbitrary)]
struct BoundaryFrame {
    magic: MagicBytes,
    version: VersionBytes,
    flags: u8,
    reserved: [u8; 2],
    payload_size: PayloadSize,
    reserved_tail: [u8; 4],
    text: String,
}

#[derive(Debug, Clone, Arbitrary)]
enum MagicBytes {
    Valid,
    OffByOne(u8),
    AllZeros,
    AllOnes,
    Random([u8; 4]),
}

#[derive(Debug, Clone, Arbitrary)]
enum VersionBytes {
    Valid,
    Zero,
    Max,
    Random(u8),
}

#[derive(Debug, Clone, Arbitrary)]
enum PayloadSize {
    Zero,
    Small(u8),
    AtMaxBoundary,
    JustOverMax,
    WayOverMax,
    MaxU32,
    Random(u32),
}

fuzz_target!(|boundary: BoundaryFrame| {
    let payload_size_value = match boundary.payload_size {
        PayloadSize::Zero => 0,
        PayloadSize::Small(s) => u32::from(s),
        PayloadSize::AtMaxBoundary => MAX_PAYLOAD_SIZE,
        PayloadSize::JustOverMax => MAX_PAYLOAD_SIZE.saturating_add(1),
        PayloadSize::WayOverMax => MAX_PAYLOAD_SIZE.saturating_add(1_000_000),
        PayloadSize::MaxU32 => u32::MAX,
        PayloadSize::Random(r) => r,
    };

    // Oversized claims are checked against a short buffer; the header alone
    // must be enough to reject them
    let actual_payload_size = payload_size_value.min(100_000) as usize;
    let mut buffer = vec![0u8; FrameHeader::SIZE + actual_payload_size];

    let valid_magic = match boundary.magic {
        MagicBytes::Valid => {
            buffer[0..4].copy_from_slice(&STACKGATE_MAGIC);
            true
        },
        MagicBytes::OffByOne(offset) => {
            buffer[0..4].copy_from_slice(&STACKGATE_MAGIC);
            let idx = (offset % 4) as usize;
            buffer[idx] = buffer[idx].wrapping_add(1);
            false
        },
        MagicBytes::AllZeros => {
            buffer[0..4].fill(0);
            false
        },
        MagicBytes::AllOnes => {
            buffer[0..4].fill(0xFF);
            false
        },
        MagicBytes::Random(bytes) => {
            buffer[0..4].copy_from_slice(&bytes);
            bytes == STACKGATE_MAGIC
        },
    };

    let version_value: u8 = match boundary.version {
        VersionBytes::Valid => FrameHeader::VERSION,
        VersionBytes::Zero => 0,
        VersionBytes::Max => u8::MAX,
        VersionBytes::Random(v) => v,
    };
    buffer[4] = version_value;
    buffer[5] = boundary.flags;
    buffer[6..8].copy_from_slice(&boundary.reserved);
    buffer[8..12].copy_from_slice(&payload_size_value.to_be_bytes());
    buffer[12..16].copy_from_slice(&boundary.reserved_tail);

    match Frame::decode(&buffer) {
        Ok(frame) => {
            assert!(valid_magic);
            assert_eq!(version_value, FrameHeader::VERSION);
            assert!(payload_size_value <= MAX_PAYLOAD_SIZE);
            assert_eq!(frame.header.payload_size(), payload_size_value);
            assert_eq!(frame.payload.len(), payload_size_value as usize);
        },
        Err(ProtocolError::InvalidMagic) => assert!(!valid_magic),
        Err(ProtocolError::UnsupportedVersion(v)) => {
            assert!(valid_magic);
            assert_eq!(v, version_value);
        },
        Err(ProtocolError::PayloadTooLarge { size, .. }) => {
            assert!(valid_magic);
            assert_eq!(size, payload_size_value as usize);
            assert!(payload_size_value > MAX_PAYLOAD_SIZE);
        },
        Err(ProtocolError::FrameTruncated { .. }) => {
            // Only claims larger than the bytes we supplied can truncate
            assert!(payload_size_value as usize > actual_payload_size);
        },
        Err(_) => {},
    }

    let frame = Frame::from_text(boundary.text.clone());
    let mut encoded = BytesMut::new();
    if frame.encode(&mut encoded).is_err() {
        assert!(boundary.text.len() > MAX_PAYLOAD_SIZE as usize);
        return;
    }

    assert_eq!(encoded.len(), FrameHeader::SIZE + boundary.text.len());

    let decoded = Frame::decode(&encoded).expect("encoded frame must decode");
    assert_eq!(decoded.text().ok(), Some(boundary.text.as_str()));
});
