//! Flash program/erase engine

use alloc::vec;
use alloc::vec::Vec;

use super::cipher::{self, CipherMode, CIPHER_BLOCK_SIZE};
use super::config::{
    ControllerConfig, DMA_WRITE_CHUNK, READ_CHUNK, REG_WRITE_CHUNK, RELEASE_SETTLE_US,
    RESET_SETTLE_US,
};
use super::progress::{NoProgress, ProgramProgress, ProgramStats};
use super::window::PageWindows;
use crate::bus::{BusFeatures, Clock, Deadline, DeviceParams, DmaScope, QspiBus};
use crate::error::{EraseFailure, Error, Result, WriteFailure};
use crate::protocol;
use crate::qspi::{
    check_address, check_bus_mode_supported, check_range, opcodes, BusMode, FlashCommand,
    JedecId, PAGE_SIZE,
};
use maybe_async::maybe_async;

/// Drives one serial NOR part through a QSPI controller
///
/// Every operation is a fixed sequence of controller transactions. Waits
/// are bounded by the configured [`PollPolicy`](crate::protocol::PollPolicy)
/// and a timeout ends the call; nothing is retried.
pub struct FlashController<B, C> {
    bus: B,
    clock: C,
    config: ControllerConfig,
}

impl<B: QspiBus, C: Clock> FlashController<B, C> {
    /// Create a controller over `bus`, timing waits with `clock`
    pub fn new(bus: B, clock: C, config: ControllerConfig) -> Self {
        Self { bus, clock, config }
    }

    /// The underlying bus
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// The underlying bus, mutably
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// The clock used for deadlines
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Active configuration
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Give back the bus and clock
    pub fn into_parts(self) -> (B, C) {
        (self.bus, self.clock)
    }
}

#[maybe_async]
impl<B: QspiBus, C: Clock> FlashController<B, C> {
    /// Program the controller's device parameters
    ///
    /// `None` applies the parameters from the configuration.
    pub async fn init(&mut self, params: Option<DeviceParams>) -> Result<()> {
        let params = params.unwrap_or(self.config.device);
        self.config.device = params;
        let word = params.encode();
        log::debug!("QSPI device parameters 0x{:08X}", word);
        self.bus.set_device_params(word);
        self.bus.flush_fifos();
        Ok(())
    }

    /// Read the 24-bit JEDEC ID
    pub async fn read_id(&mut self) -> Result<JedecId> {
        let id = protocol::read_jedec_id(&mut self.bus, &mut self.clock, &self.config.poll).await?;
        log::debug!("JEDEC ID: {}", id);
        Ok(id)
    }

    /// Read a status register (RDSR, RDSR2 or RDSR3)
    pub async fn read_status(&mut self, opcode: u8) -> Result<u8> {
        protocol::read_status(&mut self.bus, &mut self.clock, opcode, &self.config.poll).await
    }

    /// Write a status or parameter register and wait for it to take effect
    ///
    /// Values above 0xFF are sent as two bytes.
    pub async fn write_param(&mut self, opcode: u8, value: u16) -> Result<()> {
        let len = if value > 0xFF { 2 } else { 1 };
        protocol::write_status(
            &mut self.bus,
            &mut self.clock,
            opcode,
            value,
            len,
            &self.config.poll,
        )
        .await
    }

    /// Issue one opcode-only command (QPI enter/exit, suspend, resume, ...)
    pub async fn single_command(&mut self, opcode: u8) -> Result<()> {
        protocol::single_command(
            &mut self.bus,
            &mut self.clock,
            opcode,
            BusMode::Single,
            &self.config.poll,
        )
        .await
    }

    /// Erase the 4KB sector containing `addr`
    pub async fn erase_sector(&mut self, addr: u32) -> Result<()> {
        check_address(addr)?;
        self.erase(opcodes::SE, Some(addr)).await
    }

    /// Erase the 32KB block containing `addr`
    pub async fn erase_block32k(&mut self, addr: u32) -> Result<()> {
        check_address(addr)?;
        self.erase(opcodes::BE32, Some(addr)).await
    }

    /// Erase the 64KB block containing `addr`
    pub async fn erase_block64k(&mut self, addr: u32) -> Result<()> {
        check_address(addr)?;
        self.erase(opcodes::BE64, Some(addr)).await
    }

    /// Erase the whole part
    pub async fn erase_chip(&mut self) -> Result<()> {
        // A chip erase is refused while anything else is still in flight.
        protocol::wait_ready(&mut self.bus, &mut self.clock, &self.config.poll)
            .await
            .map_err(|e| erase_error(e, 0))?;
        self.erase(opcodes::CE, None).await
    }

    async fn erase(&mut self, opcode: u8, addr: Option<u32>) -> Result<()> {
        let at = addr.unwrap_or(0);
        let cmd = match addr {
            Some(addr) => FlashCommand::erase(opcode, addr),
            None => FlashCommand::simple(opcode),
        };
        log::debug!("erase 0x{:02X} at 0x{:06X}", opcode, at);

        let poll = self.config.poll;
        protocol::write_enable(&mut self.bus, &mut self.clock, BusMode::Single, &poll)
            .await
            .map_err(|e| erase_error(e, at))?;
        protocol::transact(&mut self.bus, &mut self.clock, &cmd, &poll)
            .await
            .map_err(|e| erase_error(e, at))?;
        protocol::wait_ready(&mut self.bus, &mut self.clock, &poll)
            .await
            .map_err(|e| erase_error(e, at))
    }

    /// Program `payload` at `base`
    ///
    /// The range is split into page windows and each window is programmed
    /// in chunks of 4 bytes (register mode) or 256 bytes (DMA). With a
    /// cipher mode the payload is transformed first; a trailing partial
    /// block is padded and programmed as a separate 32-byte transfer after
    /// the whole blocks. Cipher programming needs a 32-byte aligned `base`.
    ///
    /// The whole range is validated before the first transaction. On a
    /// timeout the error names the window that failed; everything before
    /// it is programmed.
    pub async fn program_page(
        &mut self,
        base: u32,
        payload: &[u8],
        use_dma: bool,
        cipher: CipherMode,
    ) -> Result<ProgramStats> {
        self.program_page_with_progress(base, payload, use_dma, cipher, &mut NoProgress)
            .await
    }

    /// [`program_page`](Self::program_page) with a progress callback
    pub async fn program_page_with_progress<P: ProgramProgress>(
        &mut self,
        base: u32,
        payload: &[u8],
        use_dma: bool,
        cipher: CipherMode,
        progress: &mut P,
    ) -> Result<ProgramStats> {
        check_range(base, payload.len())?;
        if cipher != CipherMode::None {
            if base as usize % CIPHER_BLOCK_SIZE != 0 {
                return Err(Error::InvalidAlignment);
            }
            check_range(base, cipher::padded_len(payload.len(), cipher))?;
        }
        let features = self.bus.features();
        if use_dma && !features.contains(BusFeatures::DMA) {
            return Err(Error::DmaNotSupported);
        }
        check_bus_mode_supported(self.config.program_mode, features)?;

        let enciphered = cipher::encipher(payload, cipher);
        let body = &enciphered.body;
        let chunk = if use_dma {
            DMA_WRITE_CHUNK
        } else {
            REG_WRITE_CHUNK
        };

        log::info!(
            "programming {} bytes at 0x{:06X} ({}, cipher {:?})",
            payload.len(),
            base,
            if use_dma { "DMA" } else { "register" },
            cipher
        );
        progress.programming(enciphered.programmed_len());

        let mut stats = ProgramStats::default();
        for window in PageWindows::new(base, body.len())? {
            let offset = (window.start - base) as usize;
            let data = &body[offset..offset + window.len()];
            stats.transfers += self
                .program_window(window.start, data, use_dma, chunk)
                .await
                .map_err(|e| write_error(e, window.start))?;
            stats.windows += 1;
            stats.bytes_programmed += data.len();
            progress.programmed(stats.bytes_programmed);
        }

        if let Some(tail) = &enciphered.tail {
            let addr = base + body.len() as u32;
            log::debug!("cipher tail block at 0x{:06X}", addr);
            self.program_window(addr, tail, use_dma, CIPHER_BLOCK_SIZE)
                .await
                .map_err(|e| write_error(e, addr))?;
            stats.tail_transfers = 1;
            stats.bytes_programmed += tail.len();
            progress.programmed(stats.bytes_programmed);
        }

        progress.complete(&stats);
        Ok(stats)
    }

    // Program one page-bounded run of bytes; returns the transaction count.
    async fn program_window(
        &mut self,
        addr: u32,
        data: &[u8],
        use_dma: bool,
        chunk: usize,
    ) -> Result<usize> {
        let mut transfers = 0;
        let mut at = addr;
        for piece in data.chunks(chunk) {
            if use_dma {
                self.program_chunk_dma(at, piece).await?;
            } else {
                self.program_chunk(at, piece).await?;
            }
            at += piece.len() as u32;
            transfers += 1;
        }
        Ok(transfers)
    }

    async fn program_chunk(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        let poll = self.config.poll;
        let mode = self.config.program_mode;
        protocol::write_enable(&mut self.bus, &mut self.clock, BusMode::Single, &poll).await?;

        self.bus.flush_fifos();
        self.bus.write_fifo(data)?;
        let cmd = FlashCommand::program(mode.program_opcode(), addr, data.len() as u16)
            .with_bus_mode(mode);
        protocol::transact(&mut self.bus, &mut self.clock, &cmd, &poll).await?;
        protocol::wait_ready(&mut self.bus, &mut self.clock, &poll).await
    }

    async fn program_chunk_dma(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        let poll = self.config.poll;
        let mode = self.config.program_mode;
        protocol::write_enable(&mut self.bus, &mut self.clock, BusMode::Single, &poll).await?;

        {
            let mut dma = DmaScope::open(&mut self.bus, self.config.dma_channel)?;
            dma.flush_fifos();
            dma.start(data)?;
            let cmd = FlashCommand::program(mode.program_opcode(), addr, data.len() as u16)
                .with_bus_mode(mode);
            protocol::transact(&mut *dma, &mut self.clock, &cmd, &poll).await?;

            let deadline = Deadline::after(&self.clock, poll.timeout_us);
            while !dma.idle() {
                if deadline.expired(&self.clock) {
                    return Err(Error::DmaTimeout);
                }
                self.clock.delay_us(poll.interval_us).await;
            }
        }

        protocol::wait_ready(&mut self.bus, &mut self.clock, &poll).await
    }

    /// Program up to one page in a single streamed transaction
    ///
    /// The whole payload goes out under one page-program command while the
    /// write FIFO is topped up whenever it drains to half its depth, so no
    /// DMA channel is needed. `[addr, addr + payload.len())` must stay
    /// inside one page.
    pub async fn program_one_page(&mut self, addr: u32, payload: &[u8]) -> Result<()> {
        check_range(addr, payload.len())?;
        if (addr % PAGE_SIZE) as usize + payload.len() > PAGE_SIZE as usize {
            return Err(Error::InvalidAlignment);
        }
        if payload.is_empty() {
            return Ok(());
        }
        self.stream_page(addr, payload)
            .await
            .map_err(|e| write_error(e, addr))
    }

    async fn stream_page(&mut self, addr: u32, payload: &[u8]) -> Result<()> {
        let poll = self.config.poll;
        let mode = self.config.program_mode;
        check_bus_mode_supported(mode, self.bus.features())?;
        protocol::write_enable(&mut self.bus, &mut self.clock, BusMode::Single, &poll).await?;

        let depth = self.bus.tx_fifo_depth();
        self.bus.flush_fifos();
        let first = payload.len().min(depth);
        self.bus.write_fifo(&payload[..first])?;
        let cmd = FlashCommand::program(mode.program_opcode(), addr, payload.len() as u16)
            .with_bus_mode(mode);
        self.bus.issue(&cmd).await?;

        let mut sent = first;
        let deadline = Deadline::after(&self.clock, poll.timeout_us);
        while sent < payload.len() {
            let level = self.bus.tx_fifo_level();
            if level <= depth / 2 {
                let n = (depth - level).min(payload.len() - sent);
                self.bus.write_fifo(&payload[sent..sent + n])?;
                log::trace!("FIFO top-up {} bytes ({}/{})", n, sent + n, payload.len());
                sent += n;
            } else if deadline.expired(&self.clock) {
                return Err(Error::CommandTimeout { opcode: cmd.opcode });
            } else {
                self.clock.delay_us(poll.interval_us).await;
            }
        }

        protocol::wait_done(&mut self.bus, &mut self.clock, cmd.opcode, &poll).await?;
        protocol::wait_ready(&mut self.bus, &mut self.clock, &poll).await
    }

    /// Read `len` bytes starting at `addr`
    pub async fn read(&mut self, addr: u32, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_into(addr, &mut buf).await?;
        Ok(buf)
    }

    /// Fill `buf` from flash starting at `addr`
    ///
    /// Reads go out in chunks no larger than the read FIFO.
    pub async fn read_into(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        check_range(addr, buf.len())?;
        let mode = self.config.read_mode;
        check_bus_mode_supported(mode, self.bus.features())?;

        let poll = self.config.poll;
        let chunk = READ_CHUNK.min(self.bus.rx_fifo_depth()).max(1);
        let mut at = addr;
        for piece in buf.chunks_mut(chunk) {
            self.bus.flush_fifos();
            let cmd = FlashCommand::read_data(
                mode.read_opcode(),
                at,
                piece.len() as u16,
                mode.read_dummy_cycles(),
            )
            .with_bus_mode(mode);
            protocol::transact(&mut self.bus, &mut self.clock, &cmd, &poll).await?;
            self.bus.read_fifo(piece).map_err(|_| Error::ReadError)?;
            at += piece.len() as u32;
        }
        Ok(())
    }

    /// Reset the part (RSTEN, RST) and wait for it to come back
    pub async fn soft_reset(&mut self, mode: BusMode) -> Result<()> {
        check_bus_mode_supported(mode, self.bus.features())?;
        let poll = self.config.poll;
        protocol::single_command(&mut self.bus, &mut self.clock, opcodes::RSTEN, mode, &poll)
            .await?;
        protocol::single_command(&mut self.bus, &mut self.clock, opcodes::RST, mode, &poll)
            .await?;
        log::debug!("software reset, settling {}us", RESET_SETTLE_US);
        self.clock.delay_us(RESET_SETTLE_US).await;
        Ok(())
    }

    /// Put the part into deep power down
    pub async fn deep_power_down(&mut self) -> Result<()> {
        self.single_command(opcodes::DP).await
    }

    /// Wake the part from deep power down
    pub async fn release_deep_power_down(&mut self) -> Result<()> {
        self.single_command(opcodes::RDP).await?;
        self.clock.delay_us(RELEASE_SETTLE_US).await;
        Ok(())
    }
}

fn erase_error(e: Error, addr: u32) -> Error {
    match e {
        Error::BusyTimeout => Error::EraseError(EraseFailure::Timeout { addr }),
        Error::CommandTimeout { .. } => Error::EraseError(EraseFailure::CommandFailed { addr }),
        other => other,
    }
}

fn write_error(e: Error, window: u32) -> Error {
    match e {
        Error::BusyTimeout | Error::CommandTimeout { .. } | Error::DmaTimeout => {
            Error::WriteError(WriteFailure::Timeout { window })
        }
        Error::FifoOverflow | Error::DmaChannelBusy => {
            Error::WriteError(WriteFailure::TransferFailed { window })
        }
        other => other,
    }
}
