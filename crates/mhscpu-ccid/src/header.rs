//! Wire headers
//!
//! Every bulk message starts with a fixed 10-byte header. Commands and
//! responses share the first seven bytes; the last three carry
//! message-specific fields.

use core::fmt;

use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::constants::HEADER_SIZE;

/// Header decoding errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Fewer than ten bytes available
    ShortPacket,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShortPacket => write!(f, "packet shorter than a CCID header"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// PC_to_RDR header
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned,
)]
#[repr(C)]
pub struct CommandHeader {
    /// bMessageType
    pub message_type: u8,
    /// dwLength, bytes following the header
    pub length: U32,
    /// bSlot
    pub slot: u8,
    /// bSeq
    pub seq: u8,
    /// Message-specific bytes (bPowerSelect, bBWI/wLevelParameter, abRFU, ...)
    pub params: [u8; 3],
}

impl CommandHeader {
    /// Decode the header at the start of `packet`
    pub fn parse(packet: &[u8]) -> Result<Self, Error> {
        Self::read_from_prefix(packet)
            .map(|(header, _)| header)
            .map_err(|_| Error::ShortPacket)
    }

    /// Declared payload length
    pub fn declared_len(&self) -> u32 {
        self.length.get()
    }
}

/// RDR_to_PC header
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned,
)]
#[repr(C)]
pub struct ResponseHeader {
    /// bMessageType
    pub message_type: u8,
    /// dwLength, bytes following the header
    pub length: U32,
    /// bSlot, copied from the command
    pub slot: u8,
    /// bSeq, copied from the command
    pub seq: u8,
    /// bStatus
    pub status: u8,
    /// bError
    pub error: u8,
    /// bChainParameter / bClockStatus / bProtocolNum / bRFU
    pub specific: u8,
}

impl ResponseHeader {
    /// Decode the header at the start of a response
    pub fn parse(bytes: &[u8]) -> Result<Self, Error> {
        Self::read_from_prefix(bytes)
            .map(|(header, _)| header)
            .map_err(|_| Error::ShortPacket)
    }
}

const _: () = assert!(core::mem::size_of::<CommandHeader>() == HEADER_SIZE);
const _: () = assert!(core::mem::size_of::<ResponseHeader>() == HEADER_SIZE);
