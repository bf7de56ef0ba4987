//! QSPI command types
//!
//! This module provides the controller command frame, bus modes, flash
//! geometry and the SPI-NOR opcode dictionary.

mod address;
mod bus_mode;
mod command;
mod jedec;
pub mod opcodes;

pub use address::{
    check_address, check_range, ADDRESS_SPACE, BLOCK32_SIZE, BLOCK64_SIZE, PAGE_SIZE,
    SECTOR_SIZE,
};
pub use bus_mode::{check_bus_mode_supported, BusMode};
pub use command::{CmdFormat, FlashCommand};
pub use jedec::{JedecId, Vendor};
