//! Status register command

use mhscpu_core::qspi::opcodes;

use crate::Controller;

/// Read or write status register 1, 2 or 3
pub fn run_status(
    ctrl: &mut Controller,
    register: u8,
    write: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (read_op, write_op) = match register {
        1 => (opcodes::RDSR, opcodes::WRSR),
        2 => (opcodes::RDSR2, opcodes::WRSR2),
        _ => (opcodes::RDSR3, opcodes::WRSR3),
    };

    if let Some(value) = write {
        let value = u16::try_from(value).map_err(|_| format!("Value 0x{:X} too large", value))?;
        ctrl.write_param(write_op, value)?;
        println!("Wrote 0x{:02X} to SR{}", value, register);
    }

    let status = ctrl.read_status(read_op)?;
    println!("SR{}: 0x{:02X} ({:08b})", register, status, status);
    if register == 1 {
        println!(
            "  WIP={} WEL={}",
            status & opcodes::SR1_WIP != 0,
            status & opcodes::SR1_WEL != 0
        );
    }
    if register == 2 {
        println!(
            "  QE={} SUS={}",
            status & opcodes::SR2_QE != 0,
            status & opcodes::SR2_SUS != 0
        );
    }
    Ok(())
}
