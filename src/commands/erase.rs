//! Erase command implementation

use indicatif::{ProgressBar, ProgressStyle};
use mhscpu_core::qspi::{BLOCK32_SIZE, BLOCK64_SIZE, SECTOR_SIZE};

use crate::cli::EraseTarget;
use crate::Controller;

/// Run the erase command
pub fn run_erase(
    ctrl: &mut Controller,
    target: &EraseTarget,
) -> Result<(), Box<dyn std::error::Error>> {
    if target.chip {
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
        pb.set_message("Erasing chip (this may take a while)...");
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        ctrl.erase_chip()?;

        pb.finish_with_message("Chip erase complete");
        return Ok(());
    }

    let (addr, size, name) = if let Some(addr) = target.sector {
        ctrl.erase_sector(addr)?;
        (addr, SECTOR_SIZE, "sector")
    } else if let Some(addr) = target.block32 {
        ctrl.erase_block32k(addr)?;
        (addr, BLOCK32_SIZE, "32KB block")
    } else if let Some(addr) = target.block64 {
        ctrl.erase_block64k(addr)?;
        (addr, BLOCK64_SIZE, "64KB block")
    } else {
        return Err("Nothing to erase".into());
    };

    let start = addr & !(size - 1);
    println!(
        "Erased {} 0x{:06X}-0x{:06X}",
        name,
        start,
        start + size - 1
    );
    Ok(())
}

/// Erase every sector touched by `[address, address + len)`
///
/// Uses 64KB block erases where a whole block is covered.
pub(crate) fn erase_range(
    ctrl: &mut Controller,
    address: u32,
    len: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let start = address & !(SECTOR_SIZE - 1);
    let end = (address as u64 + len as u64).next_multiple_of(SECTOR_SIZE as u64) as u32;

    let pb = ProgressBar::new(u64::from(end - start));
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta}) Erasing")?
            .progress_chars("#>-"),
    );

    let mut at = start;
    while at < end {
        let step = if at % BLOCK64_SIZE == 0 && end - at >= BLOCK64_SIZE {
            ctrl.erase_block64k(at)?;
            BLOCK64_SIZE
        } else {
            ctrl.erase_sector(at)?;
            SECTOR_SIZE
        };
        at += step;
        pb.set_position(u64::from(at - start));
    }

    pb.finish_with_message("Erase complete");
    Ok(())
}
