//! mhscpu - MHSCPU QSPI flash and CCID tool
//!
//! Drives the flash program/erase engine and the CCID command channel
//! against simulated hardware. The simulated part is described by a TOML
//! configuration and can be backed by an image file, so a sequence of
//! invocations behaves like one persistent chip.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use mhscpu_core::flash::FlashController;
use mhscpu_sim::{SimClock, SimConfig, SimFlash};

/// Controller over the simulated part
pub type Controller = FlashController<SimFlash, SimClock>;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let mut config = match &cli.config {
        Some(path) => SimConfig::from_toml_file(path)?,
        None => SimConfig::default(),
    };
    if cli.image.is_some() {
        config.image = cli.image.clone();
    }
    let image = config.image.clone();

    let mut ctrl = open_controller(config)?;

    let modifies = matches!(
        cli.command,
        Commands::Write { .. } | Commands::Erase { .. } | Commands::Status { write: Some(_), .. }
    );

    let result = match cli.command {
        Commands::Id => commands::run_id(&mut ctrl),
        Commands::Read {
            address,
            length,
            output,
        } => commands::run_read(&mut ctrl, address, length, &output),
        Commands::Write {
            address,
            input,
            dma,
            cipher,
            erase,
            verify,
        } => commands::run_write(
            &mut ctrl,
            address,
            &input,
            commands::WriteOptions {
                use_dma: dma,
                cipher: cipher.into(),
                erase,
                verify,
            },
        ),
        Commands::Erase { target } => commands::run_erase(&mut ctrl, &target),
        Commands::Status { register, write } => commands::run_status(&mut ctrl, register, write),
        Commands::Reset => commands::run_reset(&mut ctrl),
        Commands::PowerDown => commands::run_power_down(&mut ctrl),
        Commands::Wake => commands::run_wake(&mut ctrl),
        Commands::Ccid {
            atr,
            voltage,
            apdus,
        } => commands::run_ccid(&atr, voltage, &apdus),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    if modifies {
        match image {
            Some(path) => {
                ctrl.bus().save_image(&path)?;
                log::info!("Saved flash image to {}", path.display());
            }
            None => log::warn!("No --image given; changes to the simulated part are discarded"),
        }
    }

    Ok(())
}

/// Build a controller over a fresh simulated part
fn open_controller(config: SimConfig) -> Result<Controller, Box<dyn std::error::Error>> {
    let clock = SimClock::new();
    let controller_config = config.controller;
    let flash = SimFlash::from_config(config, clock.clone())?;
    let mut ctrl = FlashController::new(flash, clock, controller_config);
    ctrl.init(None)?;
    Ok(ctrl)
}
