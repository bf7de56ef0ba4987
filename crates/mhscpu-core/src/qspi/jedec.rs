//! JEDEC identification

use core::fmt;

/// Flash vendors recognised by their JEDEC manufacturer byte
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Vendor {
    /// GigaDevice (0xC8)
    GigaDevice,
    /// Winbond (0xEF)
    Winbond,
    /// Macronix (0xC2)
    Macronix,
    /// EON (0x1C)
    Eon,
    /// Zbit (0x5E)
    Zbit,
    /// Puya (0x85)
    Puya,
    /// Micron (0x20)
    Micron,
}

impl Vendor {
    /// Look up a vendor by manufacturer byte
    pub const fn from_manufacturer(id: u8) -> Option<Self> {
        match id {
            0xC8 => Some(Self::GigaDevice),
            0xEF => Some(Self::Winbond),
            0xC2 => Some(Self::Macronix),
            0x1C => Some(Self::Eon),
            0x5E => Some(Self::Zbit),
            0x85 => Some(Self::Puya),
            0x20 => Some(Self::Micron),
            _ => None,
        }
    }

    /// Whether the controller's command set works with this vendor's parts
    ///
    /// Micron parts use a different status/quad-enable layout.
    pub const fn is_supported(&self) -> bool {
        !matches!(self, Self::Micron)
    }

    /// Display name
    pub const fn name(&self) -> &'static str {
        match self {
            Self::GigaDevice => "GigaDevice",
            Self::Winbond => "Winbond",
            Self::Macronix => "Macronix",
            Self::Eon => "EON",
            Self::Zbit => "Zbit",
            Self::Puya => "Puya",
            Self::Micron => "Micron",
        }
    }
}

/// 24-bit JEDEC ID as returned by RDID
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct JedecId {
    /// Manufacturer byte
    pub manufacturer: u8,
    /// Memory type and capacity bytes
    pub device: u16,
}

impl JedecId {
    /// Decode the raw 24-bit value (manufacturer in bits 23..16)
    pub const fn from_raw(raw: u32) -> Self {
        Self {
            manufacturer: (raw >> 16) as u8,
            device: raw as u16,
        }
    }

    /// Raw 24-bit value
    pub const fn raw(&self) -> u32 {
        ((self.manufacturer as u32) << 16) | self.device as u32
    }

    /// Vendor for the manufacturer byte, if known
    pub const fn vendor(&self) -> Option<Vendor> {
        Vendor::from_manufacturer(self.manufacturer)
    }

    /// Capacity in bytes derived from the capacity byte (2^n)
    pub const fn capacity(&self) -> Option<u32> {
        let n = (self.device & 0xFF) as u32;
        if n >= 10 && n < 32 {
            Some(1 << n)
        } else {
            None
        }
    }

    /// True when the bus returned all ones or all zeros (nothing answered)
    pub const fn is_blank(&self) -> bool {
        let raw = self.raw();
        raw == 0 || raw == 0x00FF_FFFF
    }
}

impl fmt::Display for JedecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.vendor() {
            Some(v) => write!(f, "{} 0x{:06X}", v.name(), self.raw()),
            None => write!(f, "unknown 0x{:06X}", self.raw()),
        }
    }
}
