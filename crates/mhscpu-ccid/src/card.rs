//! Smart-card collaborator
//!
//! The ISO7816 layer (activation, ATR, T=0/T=1 exchange) lives outside
//! this crate. Handlers reach it through [`SmartCard`].

use crate::constants::*;

/// Failures reported by the card interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardError {
    /// No answer from the card
    Mute,
    /// Parity error on the I/O line
    Parity,
    /// Response does not fit the buffer
    Overrun,
    /// Interface hardware fault
    Hardware,
    /// Card does not speak the requested protocol
    ProtocolNotSupported,
}

impl CardError {
    /// bError value reported to the host
    pub const fn slot_error(&self) -> u8 {
        match self {
            Self::Mute => SLOTERROR_ICC_MUTE,
            Self::Parity => SLOTERROR_XFR_PARITY_ERROR,
            Self::Overrun => SLOTERROR_XFR_OVERRUN,
            Self::Hardware => SLOTERROR_HW_ERROR,
            Self::ProtocolNotSupported => SLOTERROR_ICC_PROTOCOL_NOT_SUPPORTED,
        }
    }
}

/// Requested card supply voltage (bPowerSelect)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Voltage {
    /// Let the reader choose
    Auto,
    /// 5.0 V
    V5,
    /// 3.0 V
    V3,
    /// 1.8 V
    V1_8,
}

impl Voltage {
    /// Decode bPowerSelect
    pub const fn from_power_select(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Auto),
            1 => Some(Self::V5),
            2 => Some(Self::V3),
            3 => Some(Self::V1_8),
            _ => None,
        }
    }
}

/// Access to the card behind the slot
///
/// Calls come from USB event context and must return without waiting on
/// the host.
pub trait SmartCard {
    /// Whether a card is inserted
    fn is_present(&self) -> bool;

    /// Activate the card and write its ATR into `atr`
    ///
    /// Returns the ATR length.
    fn power_on(&mut self, voltage: Voltage, atr: &mut [u8]) -> Result<usize, CardError>;

    /// Deactivate the card
    fn power_off(&mut self);

    /// Send a command APDU and write the response into `response`
    ///
    /// Returns the response length.
    fn transmit(&mut self, apdu: &[u8], response: &mut [u8]) -> Result<usize, CardError>;

    /// Stop (`false`) or restart (`true`) the card clock
    fn set_clock(&mut self, _running: bool) -> Result<(), CardError> {
        Ok(())
    }

    /// Apply a new clock frequency and data rate
    ///
    /// Returns the values actually applied.
    fn set_rate(&mut self, clock_khz: u32, rate_bps: u32) -> Result<(u32, u32), CardError> {
        Ok((clock_khz, rate_bps))
    }
}
