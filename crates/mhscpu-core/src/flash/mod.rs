//! High-level flash operations
//!
//! [`FlashController`] owns a [`QspiBus`](crate::bus::QspiBus) and a
//! [`Clock`](crate::bus::Clock) and turns erase, program and read requests
//! into controller transactions.

pub mod cipher;
mod config;
mod controller;
mod progress;
mod window;

pub use cipher::{decipher, encipher, CipherMode, Enciphered, CIPHER_BLOCK_SIZE};
pub use config::{
    ControllerConfig, DMA_WRITE_CHUNK, READ_CHUNK, REG_WRITE_CHUNK, RELEASE_SETTLE_US,
    RESET_SETTLE_US,
};
pub use controller::FlashController;
pub use progress::{NoProgress, ProgramProgress, ProgramStats};
pub use window::PageWindows;
