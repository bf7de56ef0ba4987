//! CLI argument parsing

use clap::{Args, Parser, Subcommand, ValueEnum};
use mhscpu_core::flash::CipherMode;
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a string as a hex or decimal u8
fn parse_hex_u8(s: &str) -> Result<u8, String> {
    let value = parse_hex_u32(s)?;
    u8::try_from(value).map_err(|_| format!("Value out of range: {}", s))
}

#[derive(Parser)]
#[command(name = "mhscpu")]
#[command(author, version, about = "MHSCPU QSPI flash and CCID tool", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Simulator configuration file (TOML format)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Flash image backing the simulated part; updated after write/erase
    #[arg(long, global = true)]
    pub image: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Page-program data transform
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CipherArg {
    /// Program data as-is
    #[default]
    None,
    /// First block transform
    ModeA,
    /// Second block transform
    ModeB,
}

impl From<CipherArg> for CipherMode {
    fn from(arg: CipherArg) -> Self {
        match arg {
            CipherArg::None => CipherMode::None,
            CipherArg::ModeA => CipherMode::ModeA,
            CipherArg::ModeB => CipherMode::ModeB,
        }
    }
}

/// Erase granularity; exactly one must be given
#[derive(Args, Debug, Clone, Copy)]
#[group(required = true, multiple = false)]
pub struct EraseTarget {
    /// Erase the 4KB sector containing this address
    #[arg(long, value_parser = parse_hex_u32)]
    pub sector: Option<u32>,

    /// Erase the 32KB block containing this address
    #[arg(long, value_parser = parse_hex_u32)]
    pub block32: Option<u32>,

    /// Erase the 64KB block containing this address
    #[arg(long, value_parser = parse_hex_u32)]
    pub block64: Option<u32>,

    /// Erase the whole chip
    #[arg(long)]
    pub chip: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read the JEDEC ID
    Id,

    /// Read flash contents to file
    Read {
        /// Start address (hex, e.g., 0x10000)
        #[arg(short, long, value_parser = parse_hex_u32, default_value = "0")]
        address: u32,

        /// Number of bytes to read (hex or decimal)
        #[arg(short, long, value_parser = parse_hex_u32)]
        length: u32,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Program a file into flash
    Write {
        /// Start address (hex, e.g., 0x10000)
        #[arg(short, long, value_parser = parse_hex_u32, default_value = "0")]
        address: u32,

        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Feed the write FIFO through DMA
        #[arg(long)]
        dma: bool,

        /// Transform applied to the data before programming
        #[arg(long, value_enum, default_value_t = CipherArg::None)]
        cipher: CipherArg,

        /// Erase the affected sectors first
        #[arg(long)]
        erase: bool,

        /// Read back and compare after writing
        #[arg(long)]
        verify: bool,
    },

    /// Erase a sector, block or the whole chip
    Erase {
        #[command(flatten)]
        target: EraseTarget,
    },

    /// Read a status register
    Status {
        /// Status register to read (1, 2 or 3)
        #[arg(short, long, default_value = "1", value_parser = clap::value_parser!(u8).range(1..=3))]
        register: u8,

        /// Write this value to the register instead of reading it
        #[arg(long, value_parser = parse_hex_u32)]
        write: Option<u32>,
    },

    /// Software reset (RSTEN + RST)
    Reset,

    /// Enter deep power down
    PowerDown,

    /// Release from deep power down
    Wake,

    /// Run APDUs through the CCID command channel against a simulated card
    Ccid {
        /// Answer-to-reset of the simulated card (hex)
        #[arg(long, default_value = "3B021450")]
        atr: String,

        /// bPowerSelect for PowerOn (0 = automatic)
        #[arg(long, value_parser = parse_hex_u8, default_value = "0")]
        voltage: u8,

        /// Command APDUs to send (hex, e.g., 00A4040000)
        apdus: Vec<String>,
    },
}
