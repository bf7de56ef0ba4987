//! mhscpu-core - QSPI flash program/erase engine
//!
//! This crate drives an external serial NOR flash through the MHSCPU QSPI
//! controller: write-enable/busy-poll sequencing, page-bounded programming
//! with optional DMA offload and an inline block transform, bounded reads,
//! erase and power management. It is `no_std` and only needs `alloc`.
//!
//! The controller registers are reached through the [`bus::QspiBus`] trait
//! and every wait is bounded by a deadline taken from a [`bus::Clock`], so
//! the whole engine can run against a simulated device.
//!
//! # Features
//!
//! - `std` - Enable standard library support
//! - `is_sync` - Compile the async API as blocking code
//!
//! # Example
//!
//! ```ignore
//! use mhscpu_core::flash::{CipherMode, ControllerConfig, FlashController};
//!
//! let mut ctrl = FlashController::new(bus, clock, ControllerConfig::default());
//! let id = ctrl.read_id()?;
//! ctrl.erase_sector(0x1000)?;
//! ctrl.program_page(0x1000, &image, true, CipherMode::None)?;
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
// Allow async fn in traits - we use maybe-async for dual sync/async support
#![allow(async_fn_in_trait)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod bus;
pub mod error;
pub mod flash;
pub mod protocol;
pub mod qspi;

pub use error::{Error, Result};
