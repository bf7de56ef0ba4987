//! Simulator configuration
//!
//! Loaded from TOML:
//!
//! ```toml
//! jedec_id = "0xC84018"
//! size = "16 MiB"
//! page_program_us = 700
//! sector_erase_us = 45000
//!
//! [controller]
//! program_mode = "quad-out"
//! dma_channel = 0
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use mhscpu_core::flash::ControllerConfig;
use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// Behaviour and geometry of the simulated part
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SimConfig {
    /// 24-bit JEDEC ID (manufacturer in bits 23..16)
    #[serde(deserialize_with = "deserialize_hex_u32")]
    pub jedec_id: u32,
    /// Array size in bytes
    #[serde(deserialize_with = "deserialize_size")]
    pub size: u32,
    /// Busy time of one page program
    pub page_program_us: u64,
    /// Busy time of a 4KB sector erase
    pub sector_erase_us: u64,
    /// Busy time of a 32KB block erase
    pub block32_erase_us: u64,
    /// Busy time of a 64KB block erase
    pub block64_erase_us: u64,
    /// Busy time of a chip erase
    pub chip_erase_us: u64,
    /// Busy time of a status register write
    pub write_status_us: u64,
    /// Time after RST during which commands are ignored
    pub reset_recovery_us: u64,
    /// Time after RDP during which commands are ignored
    pub release_us: u64,
    /// Read FIFO depth in bytes
    pub rx_fifo_depth: usize,
    /// Write FIFO depth in bytes
    pub tx_fifo_depth: usize,
    /// Number of DMA channels that can feed the write FIFO (0 = no DMA)
    pub dma_channels: u8,
    /// Controller drives dual I/O
    pub dual: bool,
    /// Controller drives quad I/O
    pub quad: bool,
    /// Initial array contents
    pub image: Option<PathBuf>,
    /// Controller settings used by the CLI
    pub controller: ControllerConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            jedec_id: 0xC8_4018, // GD25Q128
            size: 16 * 1024 * 1024,
            page_program_us: 700,
            sector_erase_us: 45_000,
            block32_erase_us: 120_000,
            block64_erase_us: 150_000,
            chip_erase_us: 5_000_000,
            write_status_us: 5_000,
            reset_recovery_us: 30_000,
            release_us: 20,
            rx_fifo_depth: 16,
            tx_fifo_depth: 32,
            dma_channels: 1,
            dual: true,
            quad: true,
            image: None,
            controller: ControllerConfig::default(),
        }
    }
}

impl SimConfig {
    /// Load a configuration file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| SimError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse a configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, SimError> {
        let config: SimConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), SimError> {
        if self.size == 0 || !self.size.is_power_of_two() || self.size > 1 << 24 {
            return Err(SimError::InvalidConfig(format!(
                "size 0x{:X} must be a power of two up to 16 MiB",
                self.size
            )));
        }
        if self.rx_fifo_depth == 0 || self.tx_fifo_depth == 0 {
            return Err(SimError::InvalidConfig("FIFO depths must be non-zero".into()));
        }
        Ok(())
    }
}

/// Deserialize a u32 that can be hex (0x...) or decimal
fn deserialize_hex_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match HexOrInt::deserialize(deserializer)? {
        HexOrInt::Int(n) => Ok(n),
        HexOrInt::Str(s) => parse_number(&s).map_err(serde::de::Error::custom),
    }
}

/// Deserialize a size that can be a number or a string like "16 MiB"
fn deserialize_size<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match HexOrInt::deserialize(deserializer)? {
        HexOrInt::Int(n) => Ok(n),
        HexOrInt::Str(s) => parse_size(&s).map_err(serde::de::Error::custom),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HexOrInt {
    Int(u32),
    Str(String),
}

/// Parse a number that can be hex (0x...) or decimal
pub fn parse_number(s: &str) -> Result<u32, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("invalid hex: {}", e))
    } else {
        s.parse().map_err(|e| format!("invalid number: {}", e))
    }
}

/// Parse a size string like "16 MiB", "4K" or "0x1000"
pub fn parse_size(s: &str) -> Result<u32, String> {
    let s = s.trim();
    if let Ok(n) = parse_number(s) {
        return Ok(n);
    }

    let lower = s.to_lowercase();
    let (num, multiplier) = if let Some(n) = lower.strip_suffix("mib") {
        (n, 1024 * 1024)
    } else if let Some(n) = lower.strip_suffix('m') {
        (n, 1024 * 1024)
    } else if let Some(n) = lower.strip_suffix("kib") {
        (n, 1024)
    } else if let Some(n) = lower.strip_suffix('k') {
        (n, 1024)
    } else {
        return Err(format!("invalid size: {}", s));
    };

    let num: u32 = num
        .trim()
        .parse()
        .map_err(|_| format!("invalid size: {}", s))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size too large: {}", s))
}
