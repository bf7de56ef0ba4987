//! Write command implementation

use indicatif::{ProgressBar, ProgressStyle};
use mhscpu_core::flash::cipher::padded_len;
use mhscpu_core::flash::{decipher, CipherMode, ProgramProgress, ProgramStats, CIPHER_BLOCK_SIZE};
use mhscpu_core::qspi::check_range;
use std::fs;
use std::path::Path;

use super::erase::erase_range;
use super::read::read_with_progress;
use crate::Controller;

/// Options for [`run_write`]
#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    /// Feed the write FIFO through DMA
    pub use_dma: bool,
    /// Transform applied before programming
    pub cipher: CipherMode,
    /// Erase the covered sectors first
    pub erase: bool,
    /// Read back and compare afterwards
    pub verify: bool,
}

/// Progress bar driven by the program engine
struct BarProgress {
    pb: ProgressBar,
}

impl BarProgress {
    fn new() -> Self {
        Self {
            pb: ProgressBar::hidden(),
        }
    }
}

impl ProgramProgress for BarProgress {
    fn programming(&mut self, total_bytes: usize) {
        self.pb = ProgressBar::new(total_bytes as u64);
        if let Ok(style) = ProgressStyle::default_bar().template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta}) Writing",
        ) {
            self.pb.set_style(style.progress_chars("#>-"));
        }
    }

    fn programmed(&mut self, bytes_done: usize) {
        self.pb.set_position(bytes_done as u64);
    }

    fn complete(&mut self, _stats: &ProgramStats) {
        self.pb.finish_with_message("Write complete");
    }
}

/// Run the write command
pub fn run_write(
    ctrl: &mut Controller,
    address: u32,
    input: &Path,
    opts: WriteOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(input)?;
    println!("Read {} bytes from {:?}", data.len(), input);
    if data.is_empty() {
        return Err("Input file is empty".into());
    }

    let programmed_len = padded_len(data.len(), opts.cipher);
    check_range(address, programmed_len)?;
    if opts.cipher != CipherMode::None && address as usize % CIPHER_BLOCK_SIZE != 0 {
        return Err(format!(
            "Cipher programming needs a {}-byte aligned address",
            CIPHER_BLOCK_SIZE
        )
        .into());
    }

    if opts.erase {
        erase_range(ctrl, address, programmed_len)?;
    }

    let mut progress = BarProgress::new();
    let stats = ctrl.program_page_with_progress(
        address,
        &data,
        opts.use_dma,
        opts.cipher,
        &mut progress,
    )?;

    println!(
        "Programmed {} bytes at 0x{:06X}: {} windows, {} transfers{}",
        stats.bytes_programmed,
        address,
        stats.windows,
        stats.transfers,
        if stats.tail_transfers > 0 {
            " + padded tail block"
        } else {
            ""
        }
    );

    if opts.verify {
        let image = read_with_progress(ctrl, address, programmed_len)?;
        let plain = decipher(&image, opts.cipher);
        if let Some(offset) = plain.iter().zip(&data).position(|(a, b)| a != b) {
            return Err(format!(
                "Verification failed at 0x{:06X}: expected 0x{:02X}, got 0x{:02X}",
                address as usize + offset,
                data[offset],
                plain[offset]
            )
            .into());
        }
        println!("Verification passed!");
    }

    Ok(())
}
