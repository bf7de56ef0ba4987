//! Controller abstraction
//!
//! [`QspiBus`] is the register-level view of the QSPI controller and
//! [`Clock`] supplies time for every bounded wait. Both are provided by the
//! platform (or by a simulator in tests).

mod clock;
mod dma;
mod params;
mod traits;

pub use clock::Deadline;
pub use dma::DmaScope;
pub use params::{DeviceParams, FreqSel, Protocol};
pub use traits::{BusFeatures, Clock, DmaChannel, QspiBus};
