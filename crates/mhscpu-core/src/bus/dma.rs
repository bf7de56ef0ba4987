//! Scoped DMA channel ownership

use core::ops::{Deref, DerefMut};

use super::{DmaChannel, QspiBus};
use crate::error::{Error, Result};

/// Exclusive use of one DMA channel for one chunk transfer
///
/// The channel is claimed when the scope is opened and released when the
/// scope is dropped, including on early `?` returns. While the scope is
/// alive the bus is reachable through `Deref`.
pub struct DmaScope<'a, B: QspiBus + ?Sized> {
    bus: &'a mut B,
    channel: DmaChannel,
}

impl<'a, B: QspiBus + ?Sized> DmaScope<'a, B> {
    /// Claim `channel` on `bus`
    pub fn open(bus: &'a mut B, channel: DmaChannel) -> Result<Self> {
        if !bus.features().contains(super::BusFeatures::DMA) {
            return Err(Error::DmaNotSupported);
        }
        bus.dma_acquire(channel)?;
        log::trace!("DMA channel {} acquired", channel.0);
        Ok(Self { bus, channel })
    }

    /// The claimed channel
    pub fn channel(&self) -> DmaChannel {
        self.channel
    }

    /// Load `data` into the channel and enable it
    pub fn start(&mut self, data: &[u8]) -> Result<()> {
        log::trace!("DMA channel {}: {} byte block", self.channel.0, data.len());
        self.bus.dma_start(self.channel, data)
    }

    /// Whether the channel finished moving its block
    pub fn idle(&self) -> bool {
        self.bus.dma_idle(self.channel)
    }
}

impl<B: QspiBus + ?Sized> Deref for DmaScope<'_, B> {
    type Target = B;

    fn deref(&self) -> &B {
        self.bus
    }
}

impl<B: QspiBus + ?Sized> DerefMut for DmaScope<'_, B> {
    fn deref_mut(&mut self) -> &mut B {
        self.bus
    }
}

impl<B: QspiBus + ?Sized> Drop for DmaScope<'_, B> {
    fn drop(&mut self) {
        self.bus.dma_release(self.channel);
        log::trace!("DMA channel {} released", self.channel.0);
    }
}
