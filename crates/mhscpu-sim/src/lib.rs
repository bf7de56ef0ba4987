//! mhscpu-sim - Simulated hardware for mhscpu
//!
//! [`SimFlash`] stands in for the QSPI controller and its serial NOR part,
//! [`SimClock`] for the time base and [`SimCard`] for the smart card behind
//! the CCID slot. Together they let both engines run end to end on a host,
//! including slow or unresponsive hardware.

pub mod card;
pub mod clock;
pub mod config;
pub mod error;
pub mod flash;

pub use card::SimCard;
pub use clock::SimClock;
pub use config::SimConfig;
pub use error::SimError;
pub use flash::{Faults, SimFlash};
