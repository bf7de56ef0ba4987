//! QSPI controller trait definitions
//!
//! These traits use `maybe_async` to support both sync and async modes.
//! - By default, traits are async (suitable for Embassy executors)
//! - With the `is_sync` feature, traits become synchronous

use crate::error::{Error, Result};
use crate::qspi::FlashCommand;
use bitflags::bitflags;
use maybe_async::maybe_async;

bitflags! {
    /// QSPI controller feature flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BusFeatures: u32 {
        /// A DMA channel can feed the write FIFO
        const DMA  = 1 << 0;
        /// Can drive 1-1-2 and 1-2-2 transactions
        const DUAL = 1 << 1;
        /// Can drive 1-1-4 and 1-4-4 transactions
        const QUAD = 1 << 2;
    }
}

impl Default for BusFeatures {
    fn default() -> Self {
        BusFeatures::empty()
    }
}

/// Identifies one DMA channel of the system DMA controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DmaChannel(pub u8);

/// Register-level access to the QSPI controller (sync or async depending
/// on `is_sync` feature)
///
/// A transaction is started with [`issue`](Self::issue) and finishes when
/// [`poll_done`](Self::poll_done) returns `Some`. Data phases go through
/// the FIFOs: the read FIFO holds at most [`rx_fifo_depth`](Self::rx_fifo_depth)
/// bytes, the write FIFO [`tx_fifo_depth`](Self::tx_fifo_depth) bytes unless
/// a DMA channel is feeding it.
///
/// ## DMA
///
/// Controllers with [`BusFeatures::DMA`] implement the `dma_*` methods.
/// Callers never use them directly; [`DmaScope`](super::DmaScope) acquires a
/// channel for one chunk and releases it on every exit path.
#[maybe_async(AFIT)]
pub trait QspiBus {
    /// Get the features supported by this controller
    fn features(&self) -> BusFeatures;

    /// Depth of the read FIFO in bytes
    fn rx_fifo_depth(&self) -> usize {
        16
    }

    /// Depth of the write FIFO in bytes
    fn tx_fifo_depth(&self) -> usize {
        32
    }

    /// Bytes currently queued in the write FIFO
    fn tx_fifo_level(&self) -> usize;

    /// Write the device parameter register
    fn set_device_params(&mut self, value: u32);

    /// Discard the contents of both FIFOs
    fn flush_fifos(&mut self);

    /// Queue bytes in the write FIFO
    ///
    /// Fails with [`Error::FifoOverflow`] if `data` does not fit in the
    /// free space; nothing is queued in that case.
    fn write_fifo(&mut self, data: &[u8]) -> Result<()>;

    /// Drain `buf.len()` bytes from the read FIFO
    fn read_fifo(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Start one transaction
    async fn issue(&mut self, cmd: &FlashCommand) -> Result<()>;

    /// Check whether the last issued transaction has finished
    ///
    /// Returns the read register contents once done.
    fn poll_done(&mut self) -> Result<Option<u32>>;

    /// Claim a DMA channel for the write FIFO
    fn dma_acquire(&mut self, _channel: DmaChannel) -> Result<()> {
        Err(Error::DmaNotSupported)
    }

    /// Load a transfer descriptor for `data` and enable the channel
    fn dma_start(&mut self, _channel: DmaChannel, _data: &[u8]) -> Result<()> {
        Err(Error::DmaNotSupported)
    }

    /// Whether the channel has moved its whole block into the FIFO
    fn dma_idle(&self, _channel: DmaChannel) -> bool {
        true
    }

    /// Disable the channel and give it back
    fn dma_release(&mut self, _channel: DmaChannel) {}
}

/// Time source for bounded waits (sync or async depending on `is_sync`
/// feature)
#[maybe_async(AFIT)]
pub trait Clock {
    /// Monotonic time in microseconds
    fn now_us(&self) -> u64;

    /// Delay for the specified number of microseconds
    async fn delay_us(&mut self, us: u32);
}
