//! QSPI controller command structure

use super::BusMode;

/// Frame layout of a controller command
///
/// The controller encodes every transaction as one of these fixed formats;
/// the discriminants are the values written to the command format field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CmdFormat {
    /// Opcode only
    Opcode = 0x00,
    /// Opcode, read one register byte
    ReadReg8 = 0x01,
    /// Opcode, read two register bytes
    ReadReg16 = 0x02,
    /// Opcode, read three register bytes
    ReadReg24 = 0x03,
    /// Opcode, 24 dummy bits, read one register byte
    DummyReadReg8 = 0x04,
    /// Opcode, address, read one register byte
    AddrReadReg8 = 0x05,
    /// Opcode, address, read two register bytes
    AddrReadReg16 = 0x06,
    /// Opcode, write one register byte
    WriteReg8 = 0x07,
    /// Opcode, write two register bytes
    WriteReg16 = 0x08,
    /// Opcode, address (erase commands)
    Addr = 0x09,
    /// Opcode, address, read data into the read FIFO
    AddrReadData = 0x0A,
    /// Opcode, address, dummy cycles, read data into the read FIFO
    AddrDummyReadData = 0x0B,
    /// Opcode, address, mode byte, dummy cycles, read data
    AddrModeDummyReadData = 0x0C,
    /// Opcode, address, program data from the write FIFO
    AddrProgramData = 0x0D,
}

impl CmdFormat {
    /// Returns true if the frame carries a 24-bit address
    pub const fn has_address(&self) -> bool {
        matches!(
            self,
            Self::AddrReadReg8
                | Self::AddrReadReg16
                | Self::Addr
                | Self::AddrReadData
                | Self::AddrDummyReadData
                | Self::AddrModeDummyReadData
                | Self::AddrProgramData
        )
    }

    /// Number of bytes returned through the read register
    pub const fn reg_read_len(&self) -> u8 {
        match self {
            Self::ReadReg8 | Self::DummyReadReg8 | Self::AddrReadReg8 => 1,
            Self::ReadReg16 | Self::AddrReadReg16 => 2,
            Self::ReadReg24 => 3,
            _ => 0,
        }
    }

    /// Number of bytes sent from the write register
    pub const fn reg_write_len(&self) -> u8 {
        match self {
            Self::WriteReg8 => 1,
            Self::WriteReg16 => 2,
            _ => 0,
        }
    }

    /// Returns true if the data phase fills the read FIFO
    pub const fn reads_fifo(&self) -> bool {
        matches!(
            self,
            Self::AddrReadData | Self::AddrDummyReadData | Self::AddrModeDummyReadData
        )
    }

    /// Returns true if the data phase drains the write FIFO
    pub const fn writes_fifo(&self) -> bool {
        matches!(self, Self::AddrProgramData)
    }
}

/// A single controller transaction
///
/// Built fresh for every bus operation. `read_data` is zero when the command
/// is issued and holds the read register contents in the completed copy
/// returned by [`crate::protocol::transact`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlashCommand {
    /// The opcode byte
    pub opcode: u8,
    /// Lines used for address and data
    pub bus_mode: BusMode,
    /// Frame layout
    pub format: CmdFormat,
    /// 24-bit address (ignored unless the format has one)
    pub address: u32,
    /// Register value sent by `WriteReg*` formats
    pub write_data: u32,
    /// Register value returned by `*ReadReg*` formats
    pub read_data: u32,
    /// Length of a FIFO data phase in bytes
    pub data_len: u16,
    /// Dummy cycles before the data phase
    pub dummy_cycles: u8,
}

impl FlashCommand {
    const fn base(opcode: u8, format: CmdFormat) -> Self {
        Self {
            opcode,
            bus_mode: BusMode::Single,
            format,
            address: 0,
            write_data: 0,
            read_data: 0,
            data_len: 0,
            dummy_cycles: 0,
        }
    }

    /// Create an opcode-only command (e.g., WREN, RSTEN)
    pub const fn simple(opcode: u8) -> Self {
        Self::base(opcode, CmdFormat::Opcode)
    }

    /// Create a register read of `len` bytes (1..=3, e.g., RDSR, RDID)
    pub const fn read_reg(opcode: u8, len: u8) -> Self {
        let format = match len {
            0 | 1 => CmdFormat::ReadReg8,
            2 => CmdFormat::ReadReg16,
            _ => CmdFormat::ReadReg24,
        };
        Self::base(opcode, format)
    }

    /// Create a register write of one or two bytes (e.g., WRSR)
    pub const fn write_reg(opcode: u8, value: u16, len: u8) -> Self {
        let format = if len >= 2 {
            CmdFormat::WriteReg16
        } else {
            CmdFormat::WriteReg8
        };
        let mut cmd = Self::base(opcode, format);
        cmd.write_data = value as u32;
        cmd
    }

    /// Create an erase command with a 24-bit address
    pub const fn erase(opcode: u8, addr: u32) -> Self {
        let mut cmd = Self::base(opcode, CmdFormat::Addr);
        cmd.address = addr & 0x00FF_FFFF;
        cmd
    }

    /// Create a FIFO read of `len` bytes starting at `addr`
    pub const fn read_data(opcode: u8, addr: u32, len: u16, dummy_cycles: u8) -> Self {
        let format = if dummy_cycles == 0 {
            CmdFormat::AddrReadData
        } else {
            CmdFormat::AddrDummyReadData
        };
        let mut cmd = Self::base(opcode, format);
        cmd.address = addr & 0x00FF_FFFF;
        cmd.data_len = len;
        cmd.dummy_cycles = dummy_cycles;
        cmd
    }

    /// Create a page program of `len` bytes from the write FIFO
    pub const fn program(opcode: u8, addr: u32, len: u16) -> Self {
        let mut cmd = Self::base(opcode, CmdFormat::AddrProgramData);
        cmd.address = addr & 0x00FF_FFFF;
        cmd.data_len = len;
        cmd
    }

    /// Set the bus mode for this command
    pub const fn with_bus_mode(mut self, mode: BusMode) -> Self {
        self.bus_mode = mode;
        self
    }

    /// Completed copy carrying the read register contents
    pub const fn with_read_data(mut self, value: u32) -> Self {
        self.read_data = value;
        self
    }
}
