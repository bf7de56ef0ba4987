//! Simulated QSPI controller with an attached serial NOR part
//!
//! The model follows the part closely enough for the engine to be tested
//! end to end: programming can only clear bits, WEL is needed for every
//! program/erase/status write and is cleared by it, WIP stays set for the
//! configured time, and the read/write FIFOs have their real depths. Time
//! comes from a shared [`SimClock`].

use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use mhscpu_core::bus::{BusFeatures, DmaChannel, QspiBus};
use mhscpu_core::error::{Error, Result};
use mhscpu_core::qspi::{
    check_bus_mode_supported, opcodes, CmdFormat, FlashCommand, BLOCK32_SIZE, BLOCK64_SIZE,
    PAGE_SIZE, SECTOR_SIZE,
};

use crate::clock::SimClock;
use crate::config::SimConfig;
use crate::error::SimError;

/// Fault injection switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Faults {
    /// WIP never clears
    pub stuck_busy: bool,
    /// The controller never reports a transaction as done
    pub unresponsive: bool,
    /// DMA channels move their block but never report idle
    pub dma_stall: bool,
}

#[derive(Debug)]
enum Transaction {
    /// Finished; holds the read register value
    Done(u32),
    /// Page program waiting for more write FIFO data
    Streaming {
        addr: u32,
        expected: usize,
        data: Vec<u8>,
    },
}

#[derive(Debug)]
struct DmaState {
    channel: DmaChannel,
    block: VecDeque<u8>,
}

/// Simulated controller and flash part
pub struct SimFlash {
    config: SimConfig,
    clock: SimClock,
    data: Vec<u8>,
    status: [u8; 3],
    write_enabled: bool,
    reset_enabled: bool,
    powered_down: bool,
    busy_until: u64,
    deaf_until: u64,
    device_params: u32,
    rx: VecDeque<u8>,
    tx: VecDeque<u8>,
    dma: Option<DmaState>,
    transaction: Option<Transaction>,
    log: Vec<FlashCommand>,
    faults: Faults,
}

impl SimFlash {
    /// Create an erased part
    pub fn new(config: SimConfig, clock: SimClock) -> Self {
        let size = config.size as usize;
        Self {
            config,
            clock,
            data: vec![0xFF; size],
            status: [0; 3],
            write_enabled: false,
            reset_enabled: false,
            powered_down: false,
            busy_until: 0,
            deaf_until: 0,
            device_params: 0,
            rx: VecDeque::new(),
            tx: VecDeque::new(),
            dma: None,
            transaction: None,
            log: Vec::new(),
            faults: Faults::default(),
        }
    }

    /// Create a part and load `config.image` if one is set
    pub fn from_config(config: SimConfig, clock: SimClock) -> std::result::Result<Self, SimError> {
        let image = config.image.clone();
        let mut flash = Self::new(config, clock);
        if let Some(path) = image {
            flash.load_image(path)?;
        }
        Ok(flash)
    }

    /// Create a part holding `initial_data` at offset 0
    pub fn with_data(config: SimConfig, clock: SimClock, initial_data: &[u8]) -> Self {
        let mut flash = Self::new(config, clock);
        let len = initial_data.len().min(flash.data.len());
        flash.data[..len].copy_from_slice(&initial_data[..len]);
        flash
    }

    /// Replace the array contents with a file; the rest stays erased
    pub fn load_image(&mut self, path: impl AsRef<Path>) -> std::result::Result<(), SimError> {
        let path = path.as_ref();
        let image = fs::read(path).map_err(|source| SimError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if image.len() > self.data.len() {
            return Err(SimError::ImageTooLarge {
                len: image.len(),
                size: self.data.len(),
            });
        }
        self.data.fill(0xFF);
        self.data[..image.len()].copy_from_slice(&image);
        log::debug!("loaded {} byte image from {}", image.len(), path.display());
        Ok(())
    }

    /// Write the array contents to a file
    pub fn save_image(&self, path: impl AsRef<Path>) -> std::result::Result<(), SimError> {
        let path = path.as_ref();
        fs::write(path, &self.data).map_err(|source| SimError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Array contents
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Array contents, mutably
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Configuration the part was built with
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Fault injection switches
    pub fn faults_mut(&mut self) -> &mut Faults {
        &mut self.faults
    }

    /// Every transaction issued so far, oldest first
    pub fn transactions(&self) -> &[FlashCommand] {
        &self.log
    }

    /// Forget the transaction log
    pub fn clear_transactions(&mut self) {
        self.log.clear();
    }

    /// Number of logged transactions with `opcode`
    pub fn count(&self, opcode: u8) -> usize {
        self.log.iter().filter(|c| c.opcode == opcode).count()
    }

    /// Whether a DMA channel is currently claimed
    pub fn dma_claimed(&self) -> bool {
        self.dma.is_some()
    }

    /// Whether WEL is set
    pub fn write_enabled(&self) -> bool {
        self.write_enabled
    }

    /// Whether the part is in deep power down
    pub fn is_powered_down(&self) -> bool {
        self.powered_down
    }

    /// Last value written to the device parameter register
    pub fn device_params(&self) -> u32 {
        self.device_params
    }

    fn now(&self) -> u64 {
        self.clock.now()
    }

    fn busy(&self) -> bool {
        self.faults.stuck_busy || self.now() < self.busy_until
    }

    fn deaf(&self) -> bool {
        self.now() < self.deaf_until
    }

    fn busy_for(&mut self, us: u64) {
        self.busy_until = self.now() + us;
    }

    fn status1(&self) -> u8 {
        let mut sr = self.status[0] & !(opcodes::SR1_WIP | opcodes::SR1_WEL);
        if self.write_enabled {
            sr |= opcodes::SR1_WEL;
        }
        if self.busy() || self.deaf() {
            sr |= opcodes::SR1_WIP;
        }
        sr
    }

    // What the controller latches when nothing drives the data lines.
    fn float(&mut self, cmd: &FlashCommand) -> u32 {
        if cmd.format.reads_fifo() {
            self.rx.clear();
            self.rx.extend(std::iter::repeat(0xFF).take(cmd.data_len as usize));
        }
        match cmd.format.reg_read_len() {
            0 => 0,
            n => (1u32 << (8 * u32::from(n))) - 1,
        }
    }

    fn execute(&mut self, cmd: &FlashCommand) -> Result<Transaction> {
        if self.powered_down {
            if cmd.opcode == opcodes::RDP {
                log::debug!("sim: release from deep power down");
                self.powered_down = false;
                self.deaf_until = self.now() + self.config.release_us;
                return Ok(Transaction::Done(0));
            }
            return Ok(Transaction::Done(self.float(cmd)));
        }

        if self.deaf() {
            if cmd.opcode == opcodes::RDSR {
                return Ok(Transaction::Done(u32::from(self.status1())));
            }
            log::debug!("sim: 0x{:02X} ignored while recovering", cmd.opcode);
            return Ok(Transaction::Done(self.float(cmd)));
        }

        let reset_enabled = std::mem::take(&mut self.reset_enabled);
        let status_read = matches!(
            cmd.opcode,
            opcodes::RDSR | opcodes::RDSR2 | opcodes::RDSR3 | opcodes::SUSPEND
        );
        if self.busy() && !status_read {
            log::warn!("sim: 0x{:02X} ignored while busy", cmd.opcode);
            return Ok(Transaction::Done(self.float(cmd)));
        }

        let value = match cmd.opcode {
            opcodes::WREN => {
                self.write_enabled = true;
                0
            }
            opcodes::WRDI => {
                self.write_enabled = false;
                0
            }
            opcodes::RDSR => u32::from(self.status1()),
            opcodes::RDSR2 => u32::from(self.status[1]),
            opcodes::RDSR3 => u32::from(self.status[2]),
            opcodes::WRSR | opcodes::WRSR2 | opcodes::WRSR3 => {
                self.write_status(cmd);
                0
            }
            opcodes::RDID => self.config.jedec_id & 0x00FF_FFFF,
            opcodes::REMS => {
                let id = self.config.jedec_id;
                ((id >> 8) & 0xFF00) | ((id & 0xFF).wrapping_sub(1) & 0xFF)
            }
            opcodes::READ
            | opcodes::FAST_READ
            | opcodes::DOR
            | opcodes::DIOR
            | opcodes::QOR
            | opcodes::QIOR => {
                self.read(cmd)?;
                0
            }
            opcodes::PP | opcodes::QPP => return self.start_program(cmd),
            opcodes::SE => {
                self.erase(cmd.address, SECTOR_SIZE, self.config.sector_erase_us);
                0
            }
            opcodes::BE32 => {
                self.erase(cmd.address, BLOCK32_SIZE, self.config.block32_erase_us);
                0
            }
            opcodes::BE64 => {
                self.erase(cmd.address, BLOCK64_SIZE, self.config.block64_erase_us);
                0
            }
            opcodes::CE => {
                self.erase(0, self.config.size, self.config.chip_erase_us);
                0
            }
            opcodes::RSTEN => {
                self.reset_enabled = true;
                0
            }
            opcodes::RST => {
                if reset_enabled {
                    self.reset();
                } else {
                    log::warn!("sim: RST without RSTEN ignored");
                }
                0
            }
            opcodes::DP => {
                log::debug!("sim: deep power down");
                self.powered_down = true;
                0
            }
            opcodes::RDP
            | opcodes::SUSPEND
            | opcodes::RESUME
            | opcodes::EQPI
            | opcodes::RSTQPI
            | opcodes::SET_BURST_WRAP => 0,
            other => {
                log::warn!("sim: unknown opcode 0x{:02X}", other);
                0
            }
        };
        Ok(Transaction::Done(value))
    }

    fn write_status(&mut self, cmd: &FlashCommand) {
        if !self.write_enabled {
            log::warn!("sim: status write 0x{:02X} without WEL ignored", cmd.opcode);
            return;
        }
        let value = cmd.write_data;
        match cmd.opcode {
            opcodes::WRSR => {
                self.status[0] = value as u8 & !(opcodes::SR1_WIP | opcodes::SR1_WEL);
                if cmd.format.reg_write_len() >= 2 {
                    self.status[1] = (value >> 8) as u8;
                }
            }
            opcodes::WRSR2 => self.status[1] = value as u8,
            _ => self.status[2] = value as u8,
        }
        self.write_enabled = false;
        self.busy_for(self.config.write_status_us);
    }

    fn read(&mut self, cmd: &FlashCommand) -> Result<()> {
        let len = cmd.data_len as usize;
        if len > self.config.rx_fifo_depth {
            return Err(Error::FifoOverflow);
        }
        let size = self.data.len();
        let start = cmd.address as usize;
        self.rx.clear();
        self.rx
            .extend((0..len).map(|i| self.data[(start + i) % size]));
        Ok(())
    }

    fn start_program(&mut self, cmd: &FlashCommand) -> Result<Transaction> {
        if cmd.format != CmdFormat::AddrProgramData {
            log::warn!("sim: page program with format {:?}", cmd.format);
            return Ok(Transaction::Done(0));
        }
        let expected = cmd.data_len as usize;
        let mut data = Vec::with_capacity(expected);
        self.pull_data(&mut data, expected);
        if data.len() < expected {
            log::trace!("sim: streaming program {}/{}", data.len(), expected);
            return Ok(Transaction::Streaming {
                addr: cmd.address,
                expected,
                data,
            });
        }
        self.program(cmd.address, &data);
        Ok(Transaction::Done(0))
    }

    // Move write FIFO bytes, then DMA bytes, into a program buffer.
    fn pull_data(&mut self, data: &mut Vec<u8>, expected: usize) {
        let n = self.tx.len().min(expected - data.len());
        data.extend(self.tx.drain(..n));
        if let Some(dma) = &mut self.dma {
            let n = dma.block.len().min(expected - data.len());
            data.extend(dma.block.drain(..n));
        }
    }

    fn feed_stream(&mut self) {
        // Finished transactions keep their read value until the next issue.
        let Some(Transaction::Streaming {
            addr,
            expected,
            mut data,
        }) = self
            .transaction
            .take_if(|t| matches!(t, Transaction::Streaming { .. }))
        else {
            return;
        };
        self.pull_data(&mut data, expected);
        if data.len() < expected {
            self.transaction = Some(Transaction::Streaming {
                addr,
                expected,
                data,
            });
            return;
        }
        self.program(addr, &data);
        self.transaction = Some(Transaction::Done(0));
    }

    fn program(&mut self, addr: u32, data: &[u8]) {
        if !self.write_enabled {
            log::warn!("sim: page program at 0x{:06X} without WEL ignored", addr);
            return;
        }
        // Bytes past the end of the page wrap to its start.
        let page = addr & !(PAGE_SIZE - 1);
        let size = self.data.len();
        let mut offset = addr % PAGE_SIZE;
        for &byte in data {
            let at = (page + offset) as usize % size;
            self.data[at] &= byte;
            offset = (offset + 1) % PAGE_SIZE;
        }
        log::trace!("sim: programmed {} bytes at 0x{:06X}", data.len(), addr);
        self.write_enabled = false;
        self.busy_for(self.config.page_program_us);
    }

    fn erase(&mut self, addr: u32, len: u32, busy_us: u64) {
        if !self.write_enabled {
            log::warn!("sim: erase at 0x{:06X} without WEL ignored", addr);
            return;
        }
        let len = len.min(self.config.size) as usize;
        let start = (addr as usize % self.data.len()) & !(len - 1);
        self.data[start..start + len].fill(0xFF);
        log::trace!("sim: erased {} bytes at 0x{:06X}", len, start);
        self.write_enabled = false;
        self.busy_for(busy_us);
    }

    fn reset(&mut self) {
        log::debug!("sim: software reset");
        self.write_enabled = false;
        self.status[2] = 0;
        self.busy_until = 0;
        self.rx.clear();
        self.tx.clear();
        self.deaf_until = self.now() + self.config.reset_recovery_us;
    }
}

impl QspiBus for SimFlash {
    fn features(&self) -> BusFeatures {
        let mut features = BusFeatures::empty();
        if self.config.dma_channels > 0 {
            features |= BusFeatures::DMA;
        }
        if self.config.dual {
            features |= BusFeatures::DUAL;
        }
        if self.config.quad {
            features |= BusFeatures::QUAD;
        }
        features
    }

    fn rx_fifo_depth(&self) -> usize {
        self.config.rx_fifo_depth
    }

    fn tx_fifo_depth(&self) -> usize {
        self.config.tx_fifo_depth
    }

    fn tx_fifo_level(&self) -> usize {
        self.tx.len()
    }

    fn set_device_params(&mut self, value: u32) {
        log::trace!("sim: device params 0x{:08X}", value);
        self.device_params = value;
    }

    fn flush_fifos(&mut self) {
        self.rx.clear();
        self.tx.clear();
    }

    fn write_fifo(&mut self, data: &[u8]) -> Result<()> {
        let free = self.config.tx_fifo_depth - self.tx.len();
        if data.len() > free {
            return Err(Error::FifoOverflow);
        }
        self.tx.extend(data.iter().copied());
        self.feed_stream();
        Ok(())
    }

    fn read_fifo(&mut self, buf: &mut [u8]) -> Result<()> {
        if buf.len() > self.rx.len() {
            return Err(Error::ReadError);
        }
        let n = buf.len();
        for (dst, src) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *dst = src;
        }
        Ok(())
    }

    fn issue(&mut self, cmd: &FlashCommand) -> Result<()> {
        self.log.push(*cmd);
        check_bus_mode_supported(cmd.bus_mode, self.features())?;
        if let Some(Transaction::Streaming { addr, .. }) = &self.transaction {
            log::warn!("sim: streaming program at 0x{:06X} abandoned", addr);
        }
        self.transaction = None;
        self.transaction = Some(self.execute(cmd)?);
        Ok(())
    }

    fn poll_done(&mut self) -> Result<Option<u32>> {
        if self.faults.unresponsive {
            return Ok(None);
        }
        self.feed_stream();
        Ok(match &self.transaction {
            Some(Transaction::Done(value)) => Some(*value),
            Some(Transaction::Streaming { .. }) => None,
            None => Some(0),
        })
    }

    fn dma_acquire(&mut self, channel: DmaChannel) -> Result<()> {
        if channel.0 >= self.config.dma_channels {
            return Err(Error::DmaNotSupported);
        }
        if self.dma.is_some() {
            return Err(Error::DmaChannelBusy);
        }
        self.dma = Some(DmaState {
            channel,
            block: VecDeque::new(),
        });
        Ok(())
    }

    fn dma_start(&mut self, channel: DmaChannel, data: &[u8]) -> Result<()> {
        match &mut self.dma {
            Some(dma) if dma.channel == channel => {
                dma.block.clear();
                dma.block.extend(data.iter().copied());
            }
            _ => return Err(Error::DmaChannelBusy),
        }
        self.feed_stream();
        Ok(())
    }

    fn dma_idle(&self, channel: DmaChannel) -> bool {
        match &self.dma {
            Some(dma) if dma.channel == channel => {
                dma.block.is_empty() && !self.faults.dma_stall
            }
            _ => true,
        }
    }

    fn dma_release(&mut self, channel: DmaChannel) {
        if self.dma.as_ref().is_some_and(|d| d.channel == channel) {
            self.dma = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mhscpu_core::error::{EraseFailure, WriteFailure};
    use mhscpu_core::flash::{
        decipher, CipherMode, ControllerConfig, FlashController, ProgramProgress, ProgramStats,
    };
    use mhscpu_core::qspi::{BusMode, JedecId, Vendor};

    type Controller = FlashController<SimFlash, SimClock>;

    fn controller_with(sim: SimConfig, config: ControllerConfig) -> Controller {
        let _ = env_logger::builder().is_test(true).try_init();
        let clock = SimClock::new();
        let flash = SimFlash::new(sim, clock.clone());
        FlashController::new(flash, clock, config)
    }

    fn controller() -> Controller {
        controller_with(SimConfig::default(), ControllerConfig::default())
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 + 3) as u8).collect()
    }

    fn programs(flash: &SimFlash) -> Vec<FlashCommand> {
        flash
            .transactions()
            .iter()
            .filter(|c| c.format == CmdFormat::AddrProgramData)
            .copied()
            .collect()
    }

    #[test]
    fn test_read_jedec_id() {
        let mut ctrl = controller();
        let id = ctrl.read_id().unwrap();
        assert_eq!(id, JedecId::from_raw(0xC84018));
        assert_eq!(id.vendor(), Some(Vendor::GigaDevice));
        assert_eq!(id.capacity(), Some(16 * 1024 * 1024));
    }

    #[test]
    fn test_init_writes_device_params() {
        let mut ctrl = controller();
        ctrl.init(None).unwrap();
        assert_eq!(ctrl.bus().device_params() & 0xFF, 0x62);
    }

    #[test]
    fn test_program_windows() {
        let mut ctrl = controller();
        let payload = pattern(300);
        let stats = ctrl
            .program_page(0xF0, &payload, false, CipherMode::None)
            .unwrap();
        assert_eq!(stats.windows, 3);
        assert_eq!(stats.transfers, 4 + 64 + 7);
        assert_eq!(stats.tail_transfers, 0);
        assert_eq!(stats.bytes_programmed, 300);

        for pp in programs(ctrl.bus()) {
            assert!(pp.address % PAGE_SIZE + u32::from(pp.data_len) <= PAGE_SIZE);
        }
        assert_eq!(&ctrl.bus().data()[0xF0..0xF0 + 300], &payload[..]);
        assert_eq!(ctrl.bus().data()[0xEF], 0xFF);
        assert_eq!(ctrl.bus().data()[0x21C], 0xFF);
    }

    #[test]
    fn test_out_of_range_issues_nothing() {
        let mut ctrl = controller();
        let err = ctrl
            .program_page(0xFF_FF00, &[0u8; 0x101], false, CipherMode::None)
            .unwrap_err();
        assert_eq!(err, Error::AddressOutOfBounds);
        assert!(ctrl.bus().transactions().is_empty());

        let err = ctrl
            .program_page(0xFF_FFE0, &[0u8; 40], true, CipherMode::ModeA)
            .unwrap_err();
        assert_eq!(err, Error::AddressOutOfBounds);
        assert!(ctrl.bus().transactions().is_empty());
    }

    #[test]
    fn test_round_trip_register_mode() {
        let mut ctrl = controller();
        let payload = pattern(1000);
        ctrl.program_page(0x1_2345, &payload, false, CipherMode::None)
            .unwrap();
        assert_eq!(ctrl.read(0x1_2345, payload.len()).unwrap(), payload);
    }

    #[test]
    fn test_round_trip_dma() {
        let mut ctrl = controller();
        let payload = pattern(700);
        let stats = ctrl
            .program_page(0x300, &payload, true, CipherMode::None)
            .unwrap();
        assert_eq!(stats.windows, 3);
        assert_eq!(stats.transfers, 3);
        assert!(!ctrl.bus().dma_claimed());
        assert_eq!(ctrl.read(0x300, payload.len()).unwrap(), payload);
    }

    #[test]
    fn test_whole_blocks_need_no_tail() {
        let mut ctrl = controller();
        let payload = pattern(96);
        let stats = ctrl
            .program_page(0x2000, &payload, false, CipherMode::ModeA)
            .unwrap();
        assert_eq!(stats.tail_transfers, 0);
        assert_eq!(stats.bytes_programmed, 96);

        let image = ctrl.read(0x2000, 96).unwrap();
        assert_ne!(image, payload);
        assert_eq!(decipher(&image, CipherMode::ModeA), payload);
    }

    #[test]
    fn test_partial_block_adds_one_tail_transfer() {
        for use_dma in [false, true] {
            let mut ctrl = controller();
            let payload = pattern(70);
            let stats = ctrl
                .program_page(0x4000, &payload, use_dma, CipherMode::ModeB)
                .unwrap();
            assert_eq!(stats.tail_transfers, 1);
            assert_eq!(stats.bytes_programmed, 96);

            let last = *programs(ctrl.bus()).last().unwrap();
            assert_eq!(last.address, 0x4040);
            assert_eq!(last.data_len, 32);

            let image = ctrl.read(0x4000, 96).unwrap();
            let plain = decipher(&image, CipherMode::ModeB);
            assert_eq!(&plain[..70], &payload[..]);
            assert!(plain[70..].iter().all(|&b| b == 0xFF));
        }
    }

    #[test]
    fn test_cipher_needs_aligned_base() {
        let mut ctrl = controller();
        let err = ctrl
            .program_page(0x10, &[0u8; 32], false, CipherMode::ModeA)
            .unwrap_err();
        assert_eq!(err, Error::InvalidAlignment);
        assert!(ctrl.bus().transactions().is_empty());
    }

    #[test]
    fn test_dma_released_on_timeout() {
        let mut ctrl = controller();
        ctrl.bus_mut().faults_mut().dma_stall = true;
        let err = ctrl
            .program_page(0x100, &pattern(300), true, CipherMode::None)
            .unwrap_err();
        assert_eq!(
            err,
            Error::WriteError(WriteFailure::Timeout { window: 0x100 })
        );
        assert!(!ctrl.bus().dma_claimed());
    }

    #[test]
    fn test_dma_channel_busy() {
        let mut ctrl = controller();
        ctrl.bus_mut().dma_acquire(DmaChannel(0)).unwrap();
        let err = ctrl
            .program_page(0x0, &pattern(16), true, CipherMode::None)
            .unwrap_err();
        assert_eq!(
            err,
            Error::WriteError(WriteFailure::TransferFailed { window: 0 })
        );
    }

    #[test]
    fn test_dma_not_supported() {
        let sim = SimConfig {
            dma_channels: 0,
            ..SimConfig::default()
        };
        let mut ctrl = controller_with(sim, ControllerConfig::default());
        let err = ctrl
            .program_page(0x0, &pattern(16), true, CipherMode::None)
            .unwrap_err();
        assert_eq!(err, Error::DmaNotSupported);
        assert!(ctrl.bus().transactions().is_empty());
    }

    #[test]
    fn test_program_only_clears_bits() {
        let mut ctrl = controller();
        ctrl.program_page(0x0, &[0x0F], false, CipherMode::None)
            .unwrap();
        ctrl.program_page(0x0, &[0xF5], false, CipherMode::None)
            .unwrap();
        assert_eq!(ctrl.read(0x0, 1).unwrap(), vec![0x05]);
    }

    #[test]
    fn test_erase_sector() {
        let clock = SimClock::new();
        let flash = SimFlash::with_data(SimConfig::default(), clock.clone(), &[0u8; 0x3000]);
        let mut ctrl = FlashController::new(flash, clock, ControllerConfig::default());

        ctrl.erase_sector(0x1800).unwrap();
        let data = ctrl.bus().data();
        assert!(data[0x1000..0x2000].iter().all(|&b| b == 0xFF));
        assert_eq!(data[0x0FFF], 0x00);
        assert_eq!(data[0x2000], 0x00);
        assert!(!ctrl.bus().write_enabled());
    }

    #[test]
    fn test_erase_blocks_and_chip() {
        let clock = SimClock::new();
        let flash = SimFlash::with_data(SimConfig::default(), clock.clone(), &[0u8; 0x30000]);
        let mut ctrl = FlashController::new(flash, clock, ControllerConfig::default());

        ctrl.erase_block32k(0x8000).unwrap();
        assert_eq!(ctrl.bus().data()[0x7FFF], 0x00);
        assert_eq!(ctrl.bus().data()[0x8000], 0xFF);
        assert_eq!(ctrl.bus().data()[0x10000], 0x00);

        ctrl.erase_block64k(0x1_0000).unwrap();
        assert_eq!(ctrl.bus().data()[0x1FFFF], 0xFF);
        assert_eq!(ctrl.bus().data()[0x20000], 0x00);

        ctrl.erase_chip().unwrap();
        assert!(ctrl.bus().data().iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_erase_rejects_bad_address() {
        let mut ctrl = controller();
        assert_eq!(
            ctrl.erase_sector(0x0100_0000).unwrap_err(),
            Error::AddressOutOfBounds
        );
        assert!(ctrl.bus().transactions().is_empty());
    }

    #[test]
    fn test_stuck_busy_erase_times_out() {
        let mut ctrl = controller();
        ctrl.bus_mut().faults_mut().stuck_busy = true;
        let start = ctrl.clock().now();
        let err = ctrl.erase_sector(0x3000).unwrap_err();
        assert_eq!(
            err,
            Error::EraseError(EraseFailure::Timeout { addr: 0x3000 })
        );
        assert!(err.is_timeout());
        assert!(ctrl.clock().now() - start >= ctrl.config().poll.timeout_us);
    }

    #[test]
    fn test_unresponsive_controller() {
        let mut ctrl = controller();
        ctrl.bus_mut().faults_mut().unresponsive = true;
        assert_eq!(
            ctrl.read_id().unwrap_err(),
            Error::CommandTimeout {
                opcode: opcodes::RDID
            }
        );
        assert_eq!(
            ctrl.program_page(0x0, &[1, 2, 3], false, CipherMode::None)
                .unwrap_err(),
            Error::WriteError(WriteFailure::Timeout { window: 0 })
        );
    }

    #[test]
    fn test_streamed_page() {
        let mut ctrl = controller();
        let payload = pattern(256);
        ctrl.program_one_page(0x5000, &payload).unwrap();

        let pps = programs(ctrl.bus());
        assert_eq!(pps.len(), 1);
        assert_eq!(pps[0].data_len, 256);
        assert_eq!(&ctrl.bus().data()[0x5000..0x5100], &payload[..]);
    }

    #[test]
    fn test_streamed_page_must_fit_page() {
        let mut ctrl = controller();
        assert_eq!(
            ctrl.program_one_page(0x50F0, &[0u8; 32]).unwrap_err(),
            Error::InvalidAlignment
        );
        assert!(ctrl.bus().transactions().is_empty());
    }

    #[test]
    fn test_read_chunks_follow_fifo_depth() {
        let mut ctrl = controller();
        ctrl.read(0x10, 40).unwrap();
        let reads: Vec<u16> = ctrl
            .bus()
            .transactions()
            .iter()
            .filter(|c| c.format.reads_fifo())
            .map(|c| c.data_len)
            .collect();
        assert_eq!(reads, vec![16, 16, 8]);
    }

    #[test]
    fn test_quad_program_mode() {
        let config = ControllerConfig {
            program_mode: BusMode::QuadOut,
            read_mode: BusMode::QuadIo,
            ..ControllerConfig::default()
        };
        let mut ctrl = controller_with(SimConfig::default(), config);
        let payload = pattern(64);
        ctrl.program_page(0x0, &payload, false, CipherMode::None)
            .unwrap();
        assert!(ctrl.bus().count(opcodes::QPP) > 0);
        assert_eq!(ctrl.bus().count(opcodes::PP), 0);
        assert_eq!(ctrl.read(0x0, 64).unwrap(), payload);
        assert!(ctrl.bus().count(opcodes::QIOR) > 0);
    }

    #[test]
    fn test_quad_mode_unsupported() {
        let sim = SimConfig {
            quad: false,
            ..SimConfig::default()
        };
        let config = ControllerConfig {
            program_mode: BusMode::QuadOut,
            ..ControllerConfig::default()
        };
        let mut ctrl = controller_with(sim, config);
        assert_eq!(
            ctrl.program_page(0x0, &[0u8; 4], false, CipherMode::None)
                .unwrap_err(),
            Error::BusModeNotSupported
        );
        assert!(ctrl.bus().transactions().is_empty());
    }

    #[test]
    fn test_write_param() {
        let mut ctrl = controller();
        ctrl.write_param(opcodes::WRSR2, u16::from(opcodes::SR2_QE))
            .unwrap();
        assert_eq!(
            ctrl.read_status(opcodes::RDSR2).unwrap() & opcodes::SR2_QE,
            opcodes::SR2_QE
        );

        ctrl.write_param(opcodes::WRSR, 0x0000).unwrap();
        ctrl.write_param(opcodes::WRSR, 0x021C).unwrap();
        assert_eq!(ctrl.read_status(opcodes::RDSR).unwrap(), 0x1C);
        assert_eq!(ctrl.read_status(opcodes::RDSR2).unwrap(), 0x02);
    }

    #[test]
    fn test_soft_reset_waits_for_recovery() {
        let mut ctrl = controller();
        let start = ctrl.clock().now();
        ctrl.soft_reset(BusMode::Single).unwrap();
        assert!(ctrl.clock().now() - start >= 30_000);
        assert_eq!(ctrl.read_id().unwrap().raw(), 0xC84018);
    }

    #[test]
    fn test_reset_recovery_reports_busy() {
        let clock = SimClock::new();
        let mut flash = SimFlash::new(SimConfig::default(), clock.clone());
        flash.issue(&FlashCommand::simple(opcodes::RSTEN)).unwrap();
        flash.issue(&FlashCommand::simple(opcodes::RST)).unwrap();
        flash
            .issue(&FlashCommand::read_reg(opcodes::RDSR, 1))
            .unwrap();
        assert_eq!(
            flash.poll_done().unwrap(),
            Some(u32::from(opcodes::SR1_WIP))
        );

        clock.advance(30_000);
        flash
            .issue(&FlashCommand::read_reg(opcodes::RDSR, 1))
            .unwrap();
        assert_eq!(flash.poll_done().unwrap(), Some(0));
    }

    #[test]
    fn test_deep_power_down() {
        let mut ctrl = controller();
        ctrl.deep_power_down().unwrap();
        assert!(ctrl.bus().is_powered_down());
        assert!(ctrl.read_id().unwrap().is_blank());

        ctrl.release_deep_power_down().unwrap();
        assert!(!ctrl.bus().is_powered_down());
        assert_eq!(ctrl.read_id().unwrap().raw(), 0xC84018);
    }

    #[test]
    fn test_progress_reports() {
        #[derive(Default)]
        struct Recorder {
            total: usize,
            steps: Vec<usize>,
            done: Option<ProgramStats>,
        }

        impl ProgramProgress for Recorder {
            fn programming(&mut self, total_bytes: usize) {
                self.total = total_bytes;
            }
            fn programmed(&mut self, bytes_done: usize) {
                self.steps.push(bytes_done);
            }
            fn complete(&mut self, stats: &ProgramStats) {
                self.done = Some(*stats);
            }
        }

        let mut ctrl = controller();
        let mut recorder = Recorder::default();
        ctrl.program_page_with_progress(0x0, &pattern(80), false, CipherMode::ModeA, &mut recorder)
            .unwrap();
        assert_eq!(recorder.total, 96);
        assert_eq!(recorder.steps, vec![64, 96]);
        assert_eq!(recorder.done.unwrap().tail_transfers, 1);
    }

    #[test]
    fn test_fifo_overflow() {
        let mut flash = SimFlash::new(SimConfig::default(), SimClock::new());
        assert_eq!(flash.write_fifo(&[0u8; 33]), Err(Error::FifoOverflow));
        assert_eq!(flash.tx_fifo_level(), 0);
        flash.write_fifo(&[0u8; 32]).unwrap();
        assert_eq!(flash.write_fifo(&[0u8; 1]), Err(Error::FifoOverflow));
    }

    #[test]
    fn test_register_value_survives_fifo_activity() {
        let mut flash = SimFlash::new(SimConfig::default(), SimClock::new());
        flash
            .issue(&FlashCommand::read_reg(opcodes::RDID, 3))
            .unwrap();
        flash.write_fifo(&[0xAA, 0x55]).unwrap();
        flash.flush_fifos();
        assert_eq!(flash.poll_done().unwrap(), Some(0xC84018));
        assert_eq!(flash.poll_done().unwrap(), Some(0xC84018));
    }

    #[test]
    fn test_status_reports_busy_after_program() {
        let clock = SimClock::new();
        let mut flash = SimFlash::new(SimConfig::default(), clock.clone());
        flash.issue(&FlashCommand::simple(opcodes::WREN)).unwrap();
        flash.write_fifo(&[0x12, 0x34, 0x56, 0x78]).unwrap();
        flash
            .issue(&FlashCommand::program(opcodes::PP, 0x100, 4))
            .unwrap();
        assert_eq!(flash.poll_done().unwrap(), Some(0));

        flash
            .issue(&FlashCommand::read_reg(opcodes::RDSR, 1))
            .unwrap();
        assert_eq!(
            flash.poll_done().unwrap(),
            Some(u32::from(opcodes::SR1_WIP))
        );

        clock.advance(700);
        flash
            .issue(&FlashCommand::read_reg(opcodes::RDSR, 1))
            .unwrap();
        assert_eq!(flash.poll_done().unwrap(), Some(0));
        assert_eq!(&flash.data()[0x100..0x104], &[0x12, 0x34, 0x56, 0x78]);
    }

    #[test]
    fn test_read_fifo_drains_in_order() {
        let data: Vec<u8> = (1..=8).collect();
        let mut flash = SimFlash::with_data(SimConfig::default(), SimClock::new(), &data);
        flash
            .issue(&FlashCommand::read_data(opcodes::READ, 0, 8, 0))
            .unwrap();
        assert_eq!(flash.poll_done().unwrap(), Some(0));

        let mut head = [0u8; 3];
        flash.read_fifo(&mut head).unwrap();
        assert_eq!(head, [1, 2, 3]);
        let mut rest = [0u8; 5];
        flash.read_fifo(&mut rest).unwrap();
        assert_eq!(rest, [4, 5, 6, 7, 8]);
        assert_eq!(flash.read_fifo(&mut [0u8; 1]), Err(Error::ReadError));
    }

    #[test]
    fn test_image_round_trip() {
        let dir = std::env::temp_dir().join(format!("mhscpu-sim-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("image.bin");

        let sim = SimConfig {
            size: 4096,
            ..SimConfig::default()
        };
        let mut flash = SimFlash::with_data(sim, SimClock::new(), &[1, 2, 3]);
        flash.save_image(&path).unwrap();
        flash.data_mut()[0] = 9;
        flash.load_image(&path).unwrap();
        assert_eq!(&flash.data()[..4], &[1, 2, 3, 0xFF]);

        fs::remove_dir_all(&dir).unwrap();
    }
}
