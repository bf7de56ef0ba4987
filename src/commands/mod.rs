//! CLI command implementations
//!
//! Flash commands take the [`Controller`](crate::Controller) built in
//! `main`; the CCID command sets up its own reassembler and card.

mod ccid;
mod erase;
mod id;
mod power;
mod read;
mod status;
mod write;

pub use ccid::run_ccid;
pub use erase::run_erase;
pub use id::run_id;
pub use power::{run_power_down, run_reset, run_wake};
pub use read::run_read;
pub use status::run_status;
pub use write::{run_write, WriteOptions};
