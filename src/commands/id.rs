//! JEDEC ID command

use crate::Controller;

/// Read and describe the JEDEC ID
pub fn run_id(ctrl: &mut Controller) -> Result<(), Box<dyn std::error::Error>> {
    let id = ctrl.read_id()?;
    if id.is_blank() {
        return Err("No flash answered (blank JEDEC ID)".into());
    }

    println!("JEDEC ID:     0x{:06X}", id.raw());
    match id.vendor() {
        Some(vendor) => {
            println!("Manufacturer: {}", vendor.name());
            if !vendor.is_supported() {
                println!("Warning: {} parts are not supported by this controller", vendor.name());
            }
        }
        None => println!("Manufacturer: unknown (0x{:02X})", id.manufacturer),
    }
    match id.capacity() {
        Some(size) if size >= 1024 * 1024 => println!("Capacity:     {} MiB", size / (1024 * 1024)),
        Some(size) => println!("Capacity:     {} KiB", size / 1024),
        None => println!("Capacity:     unknown"),
    }
    Ok(())
}
