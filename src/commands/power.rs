//! Reset and power management commands

use mhscpu_core::qspi::BusMode;

use crate::Controller;

/// Software reset
pub fn run_reset(ctrl: &mut Controller) -> Result<(), Box<dyn std::error::Error>> {
    ctrl.soft_reset(BusMode::Single)?;
    println!("Flash reset");
    Ok(())
}

/// Enter deep power down
pub fn run_power_down(ctrl: &mut Controller) -> Result<(), Box<dyn std::error::Error>> {
    ctrl.deep_power_down()?;
    println!("Flash in deep power down");
    Ok(())
}

/// Release from deep power down and check the part answers again
pub fn run_wake(ctrl: &mut Controller) -> Result<(), Box<dyn std::error::Error>> {
    ctrl.release_deep_power_down()?;
    let id = ctrl.read_id()?;
    println!("Flash awake: {}", id);
    Ok(())
}
