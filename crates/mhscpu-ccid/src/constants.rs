//! CCID class constants
//!
//! Message type codes and status values are a wire contract with USB hosts
//! and follow the USB CCID class specification rev 1.1.

// ============================================================================
// Transport
// ============================================================================

/// Bulk endpoint max packet size (full speed)
pub const PACKET_SIZE: usize = 64;
/// Interrupt endpoint max packet size
pub const INTR_PACKET_SIZE: usize = 8;
/// Size of every command and response header
pub const HEADER_SIZE: usize = 10;
/// Largest payload a command may carry (short APDU + Le)
pub const ABDATA_SIZE: usize = 261;
/// Largest complete message, header included
pub const MAX_MESSAGE_SIZE: usize = HEADER_SIZE + ABDATA_SIZE;
/// Only one slot is wired on MHSCPU readers
pub const NUM_SLOTS: u8 = 1;

// ============================================================================
// PC_to_RDR message types
// ============================================================================

/// PC_to_RDR_IccPowerOn
pub const PC_TO_RDR_ICC_POWER_ON: u8 = 0x62;
/// PC_to_RDR_IccPowerOff
pub const PC_TO_RDR_ICC_POWER_OFF: u8 = 0x63;
/// PC_to_RDR_GetSlotStatus
pub const PC_TO_RDR_GET_SLOT_STATUS: u8 = 0x65;
/// PC_to_RDR_XfrBlock
pub const PC_TO_RDR_XFR_BLOCK: u8 = 0x6F;
/// PC_to_RDR_GetParameters
pub const PC_TO_RDR_GET_PARAMETERS: u8 = 0x6C;
/// PC_to_RDR_ResetParameters
pub const PC_TO_RDR_RESET_PARAMETERS: u8 = 0x6D;
/// PC_to_RDR_SetParameters
pub const PC_TO_RDR_SET_PARAMETERS: u8 = 0x61;
/// PC_to_RDR_Escape
pub const PC_TO_RDR_ESCAPE: u8 = 0x6B;
/// PC_to_RDR_IccClock
pub const PC_TO_RDR_ICC_CLOCK: u8 = 0x6E;
/// PC_to_RDR_T0APDU
pub const PC_TO_RDR_T0_APDU: u8 = 0x6A;
/// PC_to_RDR_Secure
pub const PC_TO_RDR_SECURE: u8 = 0x69;
/// PC_to_RDR_Mechanical
pub const PC_TO_RDR_MECHANICAL: u8 = 0x71;
/// PC_to_RDR_Abort
pub const PC_TO_RDR_ABORT: u8 = 0x72;
/// PC_to_RDR_SetDataRateAndClockFrequency
pub const PC_TO_RDR_SET_DATA_RATE_AND_CLOCK: u8 = 0x73;

// ============================================================================
// RDR_to_PC message types
// ============================================================================

/// RDR_to_PC_DataBlock
pub const RDR_TO_PC_DATA_BLOCK: u8 = 0x80;
/// RDR_to_PC_SlotStatus
pub const RDR_TO_PC_SLOT_STATUS: u8 = 0x81;
/// RDR_to_PC_Parameters
pub const RDR_TO_PC_PARAMETERS: u8 = 0x82;
/// RDR_to_PC_Escape
pub const RDR_TO_PC_ESCAPE: u8 = 0x83;
/// RDR_to_PC_DataRateAndClockFrequency
pub const RDR_TO_PC_DATA_RATE_AND_CLOCK: u8 = 0x84;
/// RDR_to_PC_NotifySlotChange (interrupt IN)
pub const RDR_TO_PC_NOTIFY_SLOT_CHANGE: u8 = 0x50;

// ============================================================================
// bStatus
// ============================================================================

/// ICC present and active
pub const ICC_PRESENT_ACTIVE: u8 = 0x00;
/// ICC present, not activated
pub const ICC_PRESENT_INACTIVE: u8 = 0x01;
/// No ICC present
pub const ICC_NOT_PRESENT: u8 = 0x02;
/// bmCommandStatus: command failed, bError holds the reason
pub const COMMAND_STATUS_FAILED: u8 = 0x40;
/// bmCommandStatus: time extension requested
pub const COMMAND_STATUS_TIME_EXTENSION: u8 = 0x80;

// ============================================================================
// bError
//
// Values below 0x80 are the offset of the offending header field.
// ============================================================================

/// Handler finished without error (never sent on the wire)
pub const SLOT_NO_ERROR: u8 = 0x81;
/// Command not supported
pub const SLOTERROR_CMD_NOT_SUPPORTED: u8 = 0x00;
/// dwLength field (offset 1) inconsistent
pub const SLOTERROR_BAD_LENGTH: u8 = 0x01;
/// bSlot field (offset 5) invalid
pub const SLOTERROR_BAD_SLOT: u8 = 0x05;
/// bPowerSelect (offset 7) invalid
pub const SLOTERROR_BAD_POWERSELECT: u8 = 0x07;
/// bProtocolNum (offset 7) invalid
pub const SLOTERROR_BAD_PROTOCOLNUM: u8 = 0x07;
/// bClockCommand (offset 7) invalid
pub const SLOTERROR_BAD_CLOCKCOMMAND: u8 = 0x07;
/// abRFU (offset 7..10) not zero
pub const SLOTERROR_BAD_ABRFU_3B: u8 = 0x07;
/// abRFU (offset 8..10) not zero
pub const SLOTERROR_BAD_ABRFU_2B: u8 = 0x08;
/// wLevelParameter (offset 8) invalid
pub const SLOTERROR_BAD_LEVELPARAMETER: u8 = 0x08;
/// dwLength does not match the data received
pub const SLOTERROR_BAD_DWLENGTH: u8 = 0x08;
/// bmFindexDindex invalid
pub const SLOTERROR_BAD_FIDI: u8 = 0x0A;
/// bmTCCKS invalid
pub const SLOTERROR_BAD_T01CONVCHECKSUM: u8 = 0x0B;
/// bClockStop invalid
pub const SLOTERROR_BAD_CLOCKSTOP: u8 = 0x0E;
/// bIFSC invalid
pub const SLOTERROR_BAD_IFSC: u8 = 0x0F;
/// bNadValue invalid
pub const SLOTERROR_BAD_NAD: u8 = 0x10;
/// Command aborted
pub const SLOTERROR_CMD_ABORTED: u8 = 0xFF;
/// ICC did not answer
pub const SLOTERROR_ICC_MUTE: u8 = 0xFE;
/// Parity error during transfer
pub const SLOTERROR_XFR_PARITY_ERROR: u8 = 0xFD;
/// Buffer overrun during transfer
pub const SLOTERROR_XFR_OVERRUN: u8 = 0xFC;
/// Hardware error
pub const SLOTERROR_HW_ERROR: u8 = 0xFB;
/// ICC protocol not supported
pub const SLOTERROR_ICC_PROTOCOL_NOT_SUPPORTED: u8 = 0xF6;
/// Slot busy with another command
pub const SLOTERROR_CMD_SLOT_BUSY: u8 = 0xE0;

// ============================================================================
// Defaults reported to the host
// ============================================================================

/// Default ICC clock (3.58 MHz) in kHz
pub const DEFAULT_CLOCK_KHZ: u32 = 3580;
/// Default ICC data rate in bps
pub const DEFAULT_DATA_RATE_BPS: u32 = 9600;
