//! Error types for mhscpu-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate.

use core::fmt;

/// Details about an erase failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraseFailure {
    /// Erase command was not accepted by the controller
    CommandFailed {
        /// Address where erase was attempted
        addr: u32,
    },
    /// The device stayed busy past the deadline after the erase command
    Timeout {
        /// Address where erase was attempted
        addr: u32,
    },
}

/// Details about a program failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteFailure {
    /// A page window did not complete before the deadline
    ///
    /// Everything before `window` has been programmed; the caller restarts
    /// from this address.
    Timeout {
        /// Start address of the window that failed
        window: u32,
    },
    /// The controller rejected a transfer inside a window
    TransferFailed {
        /// Start address of the window that failed
        window: u32,
    },
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Bus errors
    /// The controller never reported command completion
    CommandTimeout {
        /// Opcode of the command that hung
        opcode: u8,
    },
    /// The device busy bit did not clear before the deadline
    BusyTimeout,
    /// More data was staged than the write FIFO can hold
    FifoOverflow,
    /// The controller cannot drive the requested bus mode
    BusModeNotSupported,

    // DMA errors
    /// The controller has no DMA path for the write FIFO
    DmaNotSupported,
    /// The DMA channel is already claimed
    DmaChannelBusy,
    /// A DMA transfer did not drain before the deadline
    DmaTimeout,

    // Operation errors
    /// Erase operation failed
    EraseError(EraseFailure),
    /// Write/program operation failed
    WriteError(WriteFailure),
    /// Read operation failed
    ReadError,

    // Address/size errors
    /// Address range is beyond the 24-bit flash address space
    AddressOutOfBounds,
    /// Operation requires aligned address or size
    InvalidAlignment,
    /// Provided buffer is too small for the operation
    BufferTooSmall,
}

impl fmt::Display for EraseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CommandFailed { addr } => {
                write!(f, "erase command failed at address 0x{:06X}", addr)
            }
            Self::Timeout { addr } => {
                write!(f, "erase timed out at address 0x{:06X}", addr)
            }
        }
    }
}

impl fmt::Display for WriteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout { window } => {
                write!(f, "program timed out in window at 0x{:06X}", window)
            }
            Self::TransferFailed { window } => {
                write!(f, "program transfer failed in window at 0x{:06X}", window)
            }
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CommandTimeout { opcode } => {
                write!(f, "command 0x{:02X} did not complete", opcode)
            }
            Self::BusyTimeout => write!(f, "flash stayed busy past the deadline"),
            Self::FifoOverflow => write!(f, "write FIFO overflow"),
            Self::BusModeNotSupported => write!(f, "bus mode not supported by controller"),
            Self::DmaNotSupported => write!(f, "DMA not supported by controller"),
            Self::DmaChannelBusy => write!(f, "DMA channel already in use"),
            Self::DmaTimeout => write!(f, "DMA transfer timed out"),
            Self::EraseError(failure) => write!(f, "{}", failure),
            Self::WriteError(failure) => write!(f, "{}", failure),
            Self::ReadError => write!(f, "read operation failed"),
            Self::AddressOutOfBounds => write!(f, "address out of bounds"),
            Self::InvalidAlignment => write!(f, "invalid alignment"),
            Self::BufferTooSmall => write!(f, "buffer too small"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    /// Whether this error means a bounded wait ran out
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::CommandTimeout { .. }
                | Self::BusyTimeout
                | Self::DmaTimeout
                | Self::EraseError(EraseFailure::Timeout { .. })
                | Self::WriteError(WriteFailure::Timeout { .. })
        )
    }
}
