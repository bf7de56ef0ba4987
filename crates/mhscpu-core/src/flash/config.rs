//! Controller configuration

use crate::bus::{DeviceParams, DmaChannel};
use crate::protocol::PollPolicy;
use crate::qspi::BusMode;

/// Bytes staged per page-program transaction in register mode
pub const REG_WRITE_CHUNK: usize = 4;
/// Bytes staged per page-program transaction in DMA mode
pub const DMA_WRITE_CHUNK: usize = 256;
/// Bytes fetched per read transaction
pub const READ_CHUNK: usize = 16;
/// Wait after a software reset before the part accepts commands
///
/// The part needs at least 30 ms.
pub const RESET_SETTLE_US: u32 = 40_000;
/// Wait after leaving deep power down
pub const RELEASE_SETTLE_US: u32 = 100;

/// Settings for a [`FlashController`](super::FlashController)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ControllerConfig {
    /// Bounded wait used by every status poll
    pub poll: PollPolicy,
    /// Bus mode for page programs
    pub program_mode: BusMode,
    /// Bus mode for reads
    pub read_mode: BusMode,
    /// DMA channel feeding the write FIFO
    pub dma_channel: DmaChannel,
    /// Device parameter register contents applied by `init`
    pub device: DeviceParams,
}
