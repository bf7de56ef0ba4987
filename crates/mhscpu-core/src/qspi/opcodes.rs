//! Serial NOR flash opcodes understood by the MHSCPU QSPI controller
//!
//! These values are the standard SPI-NOR command dictionary and are part of
//! the external contract with the flash part.

// ============================================================================
// Reset and mode control
// ============================================================================

/// Reset Enable - must directly precede [`RST`]
pub const RSTEN: u8 = 0x66;
/// Reset Memory
pub const RST: u8 = 0x99;
/// Enter QPI mode (4-4-4)
pub const EQPI: u8 = 0x38;
/// Exit QPI mode
pub const RSTQPI: u8 = 0xFF;

// ============================================================================
// Identification
// ============================================================================

/// Read Manufacturer / Device ID
pub const REMS: u8 = 0x90;
/// Read Manufacturer / Device ID, dual I/O
pub const REMS_DUAL: u8 = 0x92;
/// Read Manufacturer / Device ID, quad I/O
pub const REMS_QUAD: u8 = 0x94;
/// Read JEDEC ID (manufacturer + 16-bit device ID)
pub const RDID: u8 = 0x9F;

// ============================================================================
// Read operations
// ============================================================================

/// Read Data (no dummy cycles)
pub const READ: u8 = 0x03;
/// Fast Read (8 dummy cycles)
pub const FAST_READ: u8 = 0x0B;
/// Fast Read Dual Output (1-1-2)
pub const DOR: u8 = 0x3B;
/// Fast Read Dual I/O (1-2-2)
pub const DIOR: u8 = 0xBB;
/// Fast Read Quad Output (1-1-4)
pub const QOR: u8 = 0x6B;
/// Fast Read Quad I/O (1-4-4)
pub const QIOR: u8 = 0xEB;

// ============================================================================
// Write control
// ============================================================================

/// Write Enable - required before any program/erase/status write
pub const WREN: u8 = 0x06;
/// Write Disable - clears WEL
pub const WRDI: u8 = 0x04;

// ============================================================================
// Status register operations
// ============================================================================

/// Read Status Register 1
pub const RDSR: u8 = 0x05;
/// Read Status Register 2
pub const RDSR2: u8 = 0x35;
/// Read Status Register 3
pub const RDSR3: u8 = 0x15;
/// Write Status Register 1 (optionally followed by SR2)
pub const WRSR: u8 = 0x01;
/// Write Status Register 2
pub const WRSR2: u8 = 0x31;
/// Write Status Register 3
pub const WRSR3: u8 = 0x11;

// ============================================================================
// Program operations
// ============================================================================

/// Page Program (1-1-1)
pub const PP: u8 = 0x02;
/// Quad Input Page Program (1-1-4)
pub const QPP: u8 = 0x32;

// ============================================================================
// Erase operations
// ============================================================================

/// Sector Erase 4KB
pub const SE: u8 = 0x20;
/// Block Erase 32KB
pub const BE32: u8 = 0x52;
/// Block Erase 64KB
pub const BE64: u8 = 0xD8;
/// Chip Erase
pub const CE: u8 = 0xC7;

/// Program/Erase Suspend
pub const SUSPEND: u8 = 0x75;
/// Program/Erase Resume
pub const RESUME: u8 = 0x7A;
/// Set Burst with Wrap
pub const SET_BURST_WRAP: u8 = 0x77;

// ============================================================================
// Power management
// ============================================================================

/// Deep Power Down
pub const DP: u8 = 0xB9;
/// Release from Deep Power Down
pub const RDP: u8 = 0xAB;

// ============================================================================
// Status register bits
// ============================================================================

/// Write In Progress
pub const SR1_WIP: u8 = 0x01;
/// Write Enable Latch
pub const SR1_WEL: u8 = 0x02;
/// Quad Enable (SR2)
pub const SR2_QE: u8 = 0x02;
/// Program/erase suspended (SR2)
pub const SR2_SUS: u8 = 0x80;
