//! QSPI bus modes

use crate::bus::BusFeatures;
use crate::error::{Error, Result};
use crate::qspi::opcodes;

/// Line usage of a QSPI transaction
///
/// The opcode phase is always single line; the address and data phases
/// widen depending on the mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum BusMode {
    /// 1-1-1
    #[default]
    Single,
    /// 1-1-2, data phase on 2 lines
    DualOut,
    /// 1-2-2, address and data on 2 lines
    DualIo,
    /// 1-1-4, data phase on 4 lines
    QuadOut,
    /// 1-4-4, address and data on 4 lines
    QuadIo,
}

impl BusMode {
    /// Returns the number of lines used for the address phase
    pub const fn addr_lines(&self) -> u8 {
        match self {
            Self::Single | Self::DualOut | Self::QuadOut => 1,
            Self::DualIo => 2,
            Self::QuadIo => 4,
        }
    }

    /// Returns the number of lines used for the data phase
    pub const fn data_lines(&self) -> u8 {
        match self {
            Self::Single => 1,
            Self::DualOut | Self::DualIo => 2,
            Self::QuadOut | Self::QuadIo => 4,
        }
    }

    /// Fast read opcode for this mode
    pub const fn read_opcode(&self) -> u8 {
        match self {
            Self::Single => opcodes::FAST_READ,
            Self::DualOut => opcodes::DOR,
            Self::DualIo => opcodes::DIOR,
            Self::QuadOut => opcodes::QOR,
            Self::QuadIo => opcodes::QIOR,
        }
    }

    /// Page program opcode for this mode
    ///
    /// Serial NOR parts only offer a quad-input program; dual modes program
    /// on a single line.
    pub const fn program_opcode(&self) -> u8 {
        match self {
            Self::Single | Self::DualOut | Self::DualIo => opcodes::PP,
            Self::QuadOut | Self::QuadIo => opcodes::QPP,
        }
    }

    /// Dummy cycles between address and data for [`Self::read_opcode`]
    pub const fn read_dummy_cycles(&self) -> u8 {
        match self {
            Self::Single | Self::DualOut | Self::QuadOut => 8,
            Self::DualIo => 4,
            Self::QuadIo => 6,
        }
    }

    /// Returns true if this mode requires dual I/O capability
    pub const fn requires_dual(&self) -> bool {
        matches!(self, Self::DualOut | Self::DualIo)
    }

    /// Returns true if this mode requires quad I/O capability
    pub const fn requires_quad(&self) -> bool {
        matches!(self, Self::QuadOut | Self::QuadIo)
    }
}

/// Check if a controller supports the requested bus mode
///
/// Returns `Ok(())` if the mode is supported, or `Err(BusModeNotSupported)` if not.
pub fn check_bus_mode_supported(mode: BusMode, features: BusFeatures) -> Result<()> {
    if mode.requires_dual() && !features.contains(BusFeatures::DUAL) {
        return Err(Error::BusModeNotSupported);
    }
    if mode.requires_quad() && !features.contains(BusFeatures::QUAD) {
        return Err(Error::BusModeNotSupported);
    }
    Ok(())
}
