//! RDR_to_PC response messages

use core::ops::Deref;

use heapless::Vec;
use zerocopy::little_endian::U32;
use zerocopy::IntoBytes;

use crate::constants::*;
use crate::header::ResponseHeader;

/// One encoded bulk-IN response
#[derive(Clone, PartialEq, Eq)]
pub struct Response {
    header: ResponseHeader,
    raw: Vec<u8, MAX_MESSAGE_SIZE>,
}

/// Slot/sequence pair a response is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Echo {
    /// bSlot of the command
    pub slot: u8,
    /// bSeq of the command
    pub seq: u8,
}

// bStatus/bError pair for a handler result
fn status_fields(icc_status: u8, error: u8) -> (u8, u8) {
    if error == SLOT_NO_ERROR {
        (icc_status, 0)
    } else {
        (icc_status | COMMAND_STATUS_FAILED, error)
    }
}

impl Response {
    fn build(
        message_type: u8,
        echo: Echo,
        status: u8,
        error: u8,
        specific: u8,
        data: &[u8],
    ) -> Self {
        let data = &data[..data.len().min(ABDATA_SIZE)];
        let header = ResponseHeader {
            message_type,
            length: U32::new(data.len() as u32),
            slot: echo.slot,
            seq: echo.seq,
            status,
            error,
            specific,
        };
        let mut raw = Vec::new();
        // Cannot fail: header plus clamped data fits MAX_MESSAGE_SIZE.
        let _ = raw.extend_from_slice(header.as_bytes());
        let _ = raw.extend_from_slice(data);
        Self { header, raw }
    }

    /// RDR_to_PC_DataBlock; data is dropped on error
    pub fn data_block(echo: Echo, icc_status: u8, error: u8, data: &[u8]) -> Self {
        let (status, error) = status_fields(icc_status, error);
        let data: &[u8] = if error == 0 { data } else { &[] };
        Self::build(RDR_TO_PC_DATA_BLOCK, echo, status, error, 0, data)
    }

    /// RDR_to_PC_SlotStatus
    pub fn slot_status(echo: Echo, icc_status: u8, error: u8, clock_status: u8) -> Self {
        let (status, error) = status_fields(icc_status, error);
        Self::build(RDR_TO_PC_SLOT_STATUS, echo, status, error, clock_status, &[])
    }

    /// RDR_to_PC_Parameters carrying the protocol data structure
    pub fn parameters(echo: Echo, icc_status: u8, error: u8, protocol: u8, data: &[u8]) -> Self {
        let (status, error) = status_fields(icc_status, error);
        let data: &[u8] = if error == 0 { data } else { &[] };
        Self::build(RDR_TO_PC_PARAMETERS, echo, status, error, protocol, data)
    }

    /// RDR_to_PC_Escape
    pub fn escape(echo: Echo, icc_status: u8, error: u8) -> Self {
        let (status, error) = status_fields(icc_status, error);
        Self::build(RDR_TO_PC_ESCAPE, echo, status, error, 0, &[])
    }

    /// RDR_to_PC_DataRateAndClockFrequency
    pub fn data_rate_and_clock(
        echo: Echo,
        icc_status: u8,
        error: u8,
        clock_khz: u32,
        rate_bps: u32,
    ) -> Self {
        let (status, error) = status_fields(icc_status, error);
        let mut data = [0u8; 8];
        data[..4].copy_from_slice(&clock_khz.to_le_bytes());
        data[4..].copy_from_slice(&rate_bps.to_le_bytes());
        let data: &[u8] = if error == 0 { &data } else { &[] };
        Self::build(RDR_TO_PC_DATA_RATE_AND_CLOCK, echo, status, error, 0, data)
    }

    /// Decoded header
    pub fn header(&self) -> ResponseHeader {
        self.header
    }

    /// Bytes after the header
    pub fn data(&self) -> &[u8] {
        &self.raw[HEADER_SIZE..]
    }

    /// Whether bStatus reports a failed command
    pub fn failed(&self) -> bool {
        self.header.status & COMMAND_STATUS_FAILED != 0
    }
}

impl Deref for Response {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.raw
    }
}

impl core::fmt::Debug for Response {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let header = self.header();
        f.debug_struct("Response")
            .field("type", &format_args!("0x{:02X}", header.message_type))
            .field("slot", &header.slot)
            .field("seq", &header.seq)
            .field("status", &format_args!("0x{:02X}", header.status))
            .field("error", &format_args!("0x{:02X}", header.error))
            .field("len", &self.data().len())
            .finish()
    }
}
