//! Protocol implementations
//!
//! This module contains the X25Q-style serial NOR command sequences built
//! on single controller transactions.

mod x25q;

pub use x25q::*;
