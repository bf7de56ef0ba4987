//! Command types and the bulk-OUT message accumulator

use heapless::Vec;

use crate::constants::*;
use crate::header::CommandHeader;

/// PC_to_RDR command types understood by the reader
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CommandType {
    /// Activate the card and return its ATR
    PowerOn = PC_TO_RDR_ICC_POWER_ON,
    /// Deactivate the card
    PowerOff = PC_TO_RDR_ICC_POWER_OFF,
    /// Report slot status
    GetSlotStatus = PC_TO_RDR_GET_SLOT_STATUS,
    /// Exchange an APDU with the card
    XfrBlock = PC_TO_RDR_XFR_BLOCK,
    /// Report protocol parameters
    GetParameters = PC_TO_RDR_GET_PARAMETERS,
    /// Restore default protocol parameters
    ResetParameters = PC_TO_RDR_RESET_PARAMETERS,
    /// Change protocol parameters
    SetParameters = PC_TO_RDR_SET_PARAMETERS,
    /// Vendor command
    Escape = PC_TO_RDR_ESCAPE,
    /// Stop or restart the card clock
    IccClock = PC_TO_RDR_ICC_CLOCK,
    /// Change T=0 APDU level parameters
    T0Apdu = PC_TO_RDR_T0_APDU,
    /// PIN verification / modification
    Secure = PC_TO_RDR_SECURE,
    /// Mechanical slot control
    Mechanical = PC_TO_RDR_MECHANICAL,
    /// Abort the command with the same slot and sequence
    Abort = PC_TO_RDR_ABORT,
    /// Change clock frequency and data rate
    SetDataRateAndClockFrequency = PC_TO_RDR_SET_DATA_RATE_AND_CLOCK,
}

impl CommandType {
    /// Look up a command by its bMessageType byte
    pub const fn from_u8(code: u8) -> Option<Self> {
        Some(match code {
            PC_TO_RDR_ICC_POWER_ON => Self::PowerOn,
            PC_TO_RDR_ICC_POWER_OFF => Self::PowerOff,
            PC_TO_RDR_GET_SLOT_STATUS => Self::GetSlotStatus,
            PC_TO_RDR_XFR_BLOCK => Self::XfrBlock,
            PC_TO_RDR_GET_PARAMETERS => Self::GetParameters,
            PC_TO_RDR_RESET_PARAMETERS => Self::ResetParameters,
            PC_TO_RDR_SET_PARAMETERS => Self::SetParameters,
            PC_TO_RDR_ESCAPE => Self::Escape,
            PC_TO_RDR_ICC_CLOCK => Self::IccClock,
            PC_TO_RDR_T0_APDU => Self::T0Apdu,
            PC_TO_RDR_SECURE => Self::Secure,
            PC_TO_RDR_MECHANICAL => Self::Mechanical,
            PC_TO_RDR_ABORT => Self::Abort,
            PC_TO_RDR_SET_DATA_RATE_AND_CLOCK => Self::SetDataRateAndClockFrequency,
            _ => return None,
        })
    }
}

/// A command message being reassembled from bulk-OUT packets
///
/// Reset whenever a header-bearing packet arrives in the idle state and
/// consumed once `bytes_accumulated == declared_length + HEADER_SIZE`.
#[derive(Debug, Clone, Default)]
pub struct BulkMessage {
    /// bSlot of the command
    pub slot: u8,
    /// bSeq of the command
    pub sequence: u8,
    /// bMessageType of the command
    pub message_type: u8,
    /// dwLength of the command
    pub declared_length: u32,
    /// Message-specific header bytes
    pub params: [u8; 3],
    /// Whether the header has been captured
    pub header_received: bool,
    /// Bytes received so far, header included
    pub bytes_accumulated: u32,
    /// Payload received so far
    pub payload: Vec<u8, ABDATA_SIZE>,
}

impl BulkMessage {
    /// Drop everything and wait for a new header
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Start a new message from the header of `packet`
    ///
    /// Payload bytes beyond [`ABDATA_SIZE`] are not stored; the caller
    /// rejects such messages before dispatch.
    pub fn begin(&mut self, header: &CommandHeader, packet: &[u8]) {
        self.reset();
        self.slot = header.slot;
        self.sequence = header.seq;
        self.message_type = header.message_type;
        self.declared_length = header.declared_len();
        self.params = header.params;
        self.header_received = true;
        self.bytes_accumulated = packet.len() as u32;
        self.store(&packet[HEADER_SIZE..]);
    }

    /// Append a continuation packet
    pub fn append(&mut self, packet: &[u8]) {
        self.bytes_accumulated += packet.len() as u32;
        self.store(packet);
    }

    fn store(&mut self, data: &[u8]) {
        let room = ABDATA_SIZE - self.payload.len();
        let n = data.len().min(room);
        // Cannot fail: n is bounded by the free capacity.
        let _ = self.payload.extend_from_slice(&data[..n]);
    }

    /// Total bytes the complete message occupies on the wire
    pub fn expected_len(&self) -> u64 {
        self.declared_length as u64 + HEADER_SIZE as u64
    }

    /// Command type, if the message type byte is known
    pub fn command(&self) -> Option<CommandType> {
        CommandType::from_u8(self.message_type)
    }

    /// Whether the received payload matches dwLength
    pub fn length_consistent(&self) -> bool {
        self.declared_length as usize == self.payload.len()
            && self.bytes_accumulated as u64 == self.expected_len()
    }
}
