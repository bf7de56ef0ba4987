//! X25Q serial NOR command sequences
//!
//! Every sequence here is a handful of single controller transactions:
//! issue, then poll for completion against a [`Deadline`]. Status waits
//! poll RDSR until WIP clears. All waits share one [`PollPolicy`], and
//! running out of time is terminal for the call; nothing here retries.
//!
//! Uses `maybe_async` to support both sync and async modes:
//! - With `is_sync` feature: blocking/synchronous
//! - Without `is_sync` feature: async

use crate::bus::{Clock, Deadline, QspiBus};
use crate::error::{Error, Result};
use crate::qspi::{opcodes, BusMode, FlashCommand, JedecId};
use maybe_async::maybe_async;

/// Timeout and poll interval shared by every bounded wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PollPolicy {
    /// Give up after this many microseconds
    pub timeout_us: u64,
    /// Delay between two polls
    pub interval_us: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            timeout_us: 10_000_000,
            interval_us: 100,
        }
    }
}

/// Wait for the controller to finish the transaction in flight
///
/// Returns the read register contents.
#[maybe_async]
pub async fn wait_done<B, C>(
    bus: &mut B,
    clock: &mut C,
    opcode: u8,
    policy: &PollPolicy,
) -> Result<u32>
where
    B: QspiBus + ?Sized,
    C: Clock + ?Sized,
{
    let deadline = Deadline::after(&*clock, policy.timeout_us);
    loop {
        if let Some(value) = bus.poll_done()? {
            return Ok(value);
        }
        if deadline.expired(&*clock) {
            log::debug!("command 0x{:02X} did not complete", opcode);
            return Err(Error::CommandTimeout { opcode });
        }
        clock.delay_us(policy.interval_us).await;
    }
}

/// Issue one transaction and wait for it to complete
///
/// Returns the completed command with `read_data` filled in.
#[maybe_async]
pub async fn transact<B, C>(
    bus: &mut B,
    clock: &mut C,
    cmd: &FlashCommand,
    policy: &PollPolicy,
) -> Result<FlashCommand>
where
    B: QspiBus + ?Sized,
    C: Clock + ?Sized,
{
    log::trace!(
        "issue 0x{:02X} {:?} addr=0x{:06X} len={}",
        cmd.opcode,
        cmd.format,
        cmd.address,
        cmd.data_len
    );
    bus.issue(cmd).await?;
    let value = wait_done(bus, clock, cmd.opcode, policy).await?;
    Ok(cmd.with_read_data(value))
}

/// Read one status register (RDSR, RDSR2 or RDSR3)
#[maybe_async]
pub async fn read_status<B, C>(
    bus: &mut B,
    clock: &mut C,
    opcode: u8,
    policy: &PollPolicy,
) -> Result<u8>
where
    B: QspiBus + ?Sized,
    C: Clock + ?Sized,
{
    let done = transact(bus, clock, &FlashCommand::read_reg(opcode, 1), policy).await?;
    Ok(done.read_data as u8)
}

/// Send the Write Enable command
#[maybe_async]
pub async fn write_enable<B, C>(
    bus: &mut B,
    clock: &mut C,
    mode: BusMode,
    policy: &PollPolicy,
) -> Result<()>
where
    B: QspiBus + ?Sized,
    C: Clock + ?Sized,
{
    let cmd = FlashCommand::simple(opcodes::WREN).with_bus_mode(mode);
    transact(bus, clock, &cmd, policy).await?;
    Ok(())
}

/// Wait for the WIP (Write In Progress) bit to clear
///
/// Fails with [`Error::BusyTimeout`] when the deadline passes first.
#[maybe_async]
pub async fn wait_ready<B, C>(bus: &mut B, clock: &mut C, policy: &PollPolicy) -> Result<()>
where
    B: QspiBus + ?Sized,
    C: Clock + ?Sized,
{
    let deadline = Deadline::after(&*clock, policy.timeout_us);
    loop {
        let status = read_status(bus, clock, opcodes::RDSR, policy).await?;
        if status & opcodes::SR1_WIP == 0 {
            return Ok(());
        }
        if deadline.expired(&*clock) {
            log::debug!("WIP still set (SR1=0x{:02X}) at deadline", status);
            return Err(Error::BusyTimeout);
        }
        clock.delay_us(policy.interval_us).await;
    }
}

/// Read the JEDEC ID from the flash part
#[maybe_async]
pub async fn read_jedec_id<B, C>(
    bus: &mut B,
    clock: &mut C,
    policy: &PollPolicy,
) -> Result<JedecId>
where
    B: QspiBus + ?Sized,
    C: Clock + ?Sized,
{
    let done = transact(bus, clock, &FlashCommand::read_reg(opcodes::RDID, 3), policy).await?;
    Ok(JedecId::from_raw(done.read_data & 0x00FF_FFFF))
}

/// Write a status/parameter register
///
/// Sends WREN, the write command carrying `len` bytes of `value`, then
/// waits for WIP to clear.
#[maybe_async]
pub async fn write_status<B, C>(
    bus: &mut B,
    clock: &mut C,
    opcode: u8,
    value: u16,
    len: u8,
    policy: &PollPolicy,
) -> Result<()>
where
    B: QspiBus + ?Sized,
    C: Clock + ?Sized,
{
    write_enable(bus, clock, BusMode::Single, policy).await?;
    transact(bus, clock, &FlashCommand::write_reg(opcode, value, len), policy).await?;
    wait_ready(bus, clock, policy).await
}

/// Issue an opcode-only command in the given bus mode
#[maybe_async]
pub async fn single_command<B, C>(
    bus: &mut B,
    clock: &mut C,
    opcode: u8,
    mode: BusMode,
    policy: &PollPolicy,
) -> Result<()>
where
    B: QspiBus + ?Sized,
    C: Clock + ?Sized,
{
    let cmd = FlashCommand::simple(opcode).with_bus_mode(mode);
    transact(bus, clock, &cmd, policy).await?;
    Ok(())
}
