//! Frame header implementation with zero-copy parsing.
//!
//! The `FrameHeader` is a fixed 16-byte structure serialized as raw binary
//! (Big Endian). It carries just enough to delimit one text message on a byte
//! stream: a magic number, a version, and the payload length.

use std::fmt;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::errors::{ProtocolError, Result};

/// Fixed 16-byte frame header (Big Endian network byte order)
///
/// Fields are stored as raw byte arrays so every 16-byte pattern is a valid
/// value and the struct can be cast directly from untrusted network bytes.
/// Validation of magic, version and size happens in [`FrameHeader::from_bytes`].
#[repr(C, packed)]
#[derive(Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct FrameHeader {
    magic: [u8; 4],   // 0x53544757 ("STGW" in ASCII)
    version: u8,      // 0x01
    flags: u8,        // reserved, zero
    reserved: [u8; 2],
    pub(crate) payload_size: [u8; 4],
    reserved_tail: [u8; 4],
}

impl FrameHeader {
    /// Size of the serialized header (16 bytes)
    pub const SIZE: usize = 16;

    /// Magic number: "STGW" in ASCII (0x53544757)
    pub const MAGIC: u32 = 0x5354_4757;

    /// Current protocol version
    pub const VERSION: u8 = 0x01;

    /// Maximum payload size (1 MiB)
    ///
    /// Resource listings are the largest frames the gateway produces; a
    /// megabyte holds tens of thousands of `<id> : <name>` lines.
    pub const MAX_PAYLOAD_SIZE: u32 = 1024 * 1024;

    /// Create a new header with zero payload size.
    #[must_use]
    pub fn new() -> Self {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&Self::MAGIC.to_be_bytes());
        bytes[4] = Self::VERSION;

        Self::from_bytes(&bytes)
            .ok()
            .copied()
            .unwrap_or_else(|| unreachable!("constructed valid header with correct magic/version"))
    }

    /// Parse header from network bytes (zero-copy, safe)
    ///
    /// Only the first [`FrameHeader::SIZE`] bytes are inspected; trailing
    /// bytes are ignored.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::FrameTooShort` if buffer is too short (< 16 bytes)
    /// - `ProtocolError::InvalidMagic` if magic number is invalid
    /// - `ProtocolError::UnsupportedVersion` if protocol version is unsupported
    /// - `ProtocolError::PayloadTooLarge` if payload size exceeds maximum
    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        let header = Self::ref_from_prefix(bytes)
            .map_err(|_| ProtocolError::FrameTooShort {
                expected: Self::SIZE,
                actual: bytes.len(),
            })?
            .0;

        if u32::from_be_bytes(header.magic) != Self::MAGIC {
            return Err(ProtocolError::InvalidMagic);
        }

        if header.version != Self::VERSION {
            return Err(ProtocolError::UnsupportedVersion(header.version));
        }

        let payload_size = u32::from_be_bytes(header.payload_size);
        if payload_size > Self::MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_size as usize,
                max: Self::MAX_PAYLOAD_SIZE as usize,
            });
        }

        Ok(header)
    }

    /// Serialize header to bytes (zero-copy)
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut arr = [0u8; Self::SIZE];
        arr.copy_from_slice(IntoBytes::as_bytes(self));
        arr
    }

    /// Protocol magic number (0x53544757 = "STGW").
    #[must_use]
    pub fn magic(&self) -> u32 {
        u32::from_be_bytes(self.magic)
    }

    /// Protocol version byte (currently 0x01).
    #[must_use]
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Length of the payload that follows this header.
    #[must_use]
    pub fn payload_size(&self) -> u32 {
        u32::from_be_bytes(self.payload_size)
    }
}

impl Default for FrameHeader {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FrameHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameHeader")
            .field("magic", &format_args!("{:#010x}", self.magic()))
            .field("version", &self.version())
            .field("payload_size", &self.payload_size())
            .finish()
    }
}
