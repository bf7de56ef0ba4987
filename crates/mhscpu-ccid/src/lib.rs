//! mhscpu-ccid - CCID command channel
//!
//! Reassembles PC_to_RDR command messages from bulk-OUT packets, runs each
//! complete message through the CCID command table and holds the single
//! RDR_to_PC response for the bulk-IN endpoint. The interrupt-IN slot
//! change notification lives in [`interrupt`].
//!
//! The card itself (ATR, T=0/T=1 exchange) is reached through the
//! [`SmartCard`] trait. Everything here is `no_std` and allocation-free.
//!
//! # Example
//!
//! ```ignore
//! use mhscpu_ccid::{CcidBulkReassembler, PacketOutcome};
//!
//! let mut ccid = CcidBulkReassembler::new(card);
//! if let PacketOutcome::Dispatched(_) = ccid.on_bulk_out(&packet) {
//!     usb.write_bulk_in(ccid.pending_response().unwrap());
//! }
//! // later, from the bulk-IN completion event
//! ccid.on_bulk_in_complete();
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod card;
pub mod constants;
pub mod handlers;
pub mod header;
pub mod interrupt;
pub mod message;
pub mod params;
pub mod reassembler;
pub mod response;

pub use card::{CardError, SmartCard, Voltage};
pub use header::{CommandHeader, ResponseHeader};
pub use interrupt::SlotChangeNotifier;
pub use message::{BulkMessage, CommandType};
pub use params::ProtocolParams;
pub use reassembler::{BulkState, CcidBulkReassembler, PacketOutcome};
pub use response::{Echo, Response};
