//! Flash geometry and address range checks

use crate::error::{Error, Result};

/// Size of the 24-bit flash address space (16 MiB)
pub const ADDRESS_SPACE: u32 = 1 << 24;
/// Program granularity of the flash part
pub const PAGE_SIZE: u32 = 0x100;
/// Smallest erase unit
pub const SECTOR_SIZE: u32 = 4 * 1024;
/// 32KB block erase unit
pub const BLOCK32_SIZE: u32 = 32 * 1024;
/// 64KB block erase unit
pub const BLOCK64_SIZE: u32 = 64 * 1024;

/// Check that `addr` is inside the address space
pub fn check_address(addr: u32) -> Result<()> {
    if addr >= ADDRESS_SPACE {
        return Err(Error::AddressOutOfBounds);
    }
    Ok(())
}

/// Check that `[addr, addr + len)` is inside the address space
pub fn check_range(addr: u32, len: usize) -> Result<()> {
    match (addr as u64).checked_add(len as u64) {
        Some(end) if addr < ADDRESS_SPACE && end <= ADDRESS_SPACE as u64 => Ok(()),
        _ => Err(Error::AddressOutOfBounds),
    }
}
