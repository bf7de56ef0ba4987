//! Command table
//!
//! Every complete bulk-OUT message is handed to [`dispatch`], which runs the
//! handler for its message type and builds exactly one response addressed
//! to the command's slot and sequence number. Handlers never fail: bad
//! parameters turn into a bError value in the response.

use crate::card::{SmartCard, Voltage};
use crate::constants::*;
use crate::message::{BulkMessage, CommandType};
use crate::params::ProtocolParams;
use crate::response::{Echo, Response};

/// Longest ATR the card layer may return
pub const MAX_ATR_LEN: usize = 33;

/// Reader-side state of the slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    /// Card has been activated with PowerOn
    pub powered: bool,
    /// Card clock stopped with IccClock
    pub clock_stopped: bool,
    /// Current protocol parameters
    pub params: ProtocolParams,
    /// Current ICC clock in kHz
    pub clock_khz: u32,
    /// Current data rate in bps
    pub rate_bps: u32,
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            powered: false,
            clock_stopped: false,
            params: ProtocolParams::default(),
            clock_khz: DEFAULT_CLOCK_KHZ,
            rate_bps: DEFAULT_DATA_RATE_BPS,
        }
    }
}

impl Slot {
    /// bmICCStatus for the current card state
    pub fn icc_status<S: SmartCard + ?Sized>(&self, card: &S) -> u8 {
        if !card.is_present() {
            ICC_NOT_PRESENT
        } else if self.powered {
            ICC_PRESENT_ACTIVE
        } else {
            ICC_PRESENT_INACTIVE
        }
    }

    /// bClockStatus for SlotStatus responses
    pub fn clock_status(&self) -> u8 {
        if self.powered && self.clock_stopped {
            0x01
        } else {
            0x00
        }
    }

    /// Forget activation state (card removed or deactivated)
    pub fn deactivate(&mut self) {
        self.powered = false;
        self.clock_stopped = false;
    }
}

type HandlerResult<T = ()> = Result<T, u8>;

fn error_code<T>(result: &HandlerResult<T>) -> u8 {
    match result {
        Ok(_) => SLOT_NO_ERROR,
        Err(e) => *e,
    }
}

/// Run the handler for `msg` and build its response
pub fn dispatch<S: SmartCard + ?Sized>(
    msg: &BulkMessage,
    slot: &mut Slot,
    card: &mut S,
) -> Response {
    let echo = Echo {
        slot: msg.slot,
        seq: msg.sequence,
    };
    if !card.is_present() {
        slot.deactivate();
    }
    let command = msg.command();
    log::debug!(
        "CCID command 0x{:02X} ({:?}) seq={} len={}",
        msg.message_type,
        command,
        msg.sequence,
        msg.declared_length
    );

    let response = match command {
        Some(CommandType::PowerOn) => {
            let mut atr = [0u8; MAX_ATR_LEN];
            let result = power_on(msg, slot, card, &mut atr);
            let len = *result.as_ref().unwrap_or(&0);
            Response::data_block(echo, slot.icc_status(card), error_code(&result), &atr[..len])
        }
        Some(CommandType::PowerOff) => {
            let result = power_off(msg, slot, card);
            slot_status(echo, slot, card, &result)
        }
        Some(CommandType::GetSlotStatus) => {
            let result = get_slot_status(msg, card);
            slot_status(echo, slot, card, &result)
        }
        Some(CommandType::XfrBlock) => {
            let mut rsp = [0u8; ABDATA_SIZE];
            let result = xfr_block(msg, slot, card, &mut rsp);
            let len = *result.as_ref().unwrap_or(&0);
            Response::data_block(echo, slot.icc_status(card), error_code(&result), &rsp[..len])
        }
        Some(CommandType::GetParameters) => {
            let result = get_parameters(msg, card);
            parameters(echo, slot, card, &result)
        }
        Some(CommandType::ResetParameters) => {
            let result = reset_parameters(msg, slot, card);
            parameters(echo, slot, card, &result)
        }
        Some(CommandType::SetParameters) => {
            let result = set_parameters(msg, slot, card);
            parameters(echo, slot, card, &result)
        }
        Some(CommandType::Escape) => {
            let result = not_supported(msg);
            Response::escape(echo, slot.icc_status(card), error_code(&result))
        }
        Some(CommandType::IccClock) => {
            let result = icc_clock(msg, slot, card);
            slot_status(echo, slot, card, &result)
        }
        Some(CommandType::Abort) => {
            let result = abort(msg);
            slot_status(echo, slot, card, &result)
        }
        Some(CommandType::T0Apdu) | Some(CommandType::Mechanical) => {
            let result = not_supported(msg);
            slot_status(echo, slot, card, &result)
        }
        Some(CommandType::SetDataRateAndClockFrequency) => {
            let result = set_data_rate(msg, slot, card);
            Response::data_rate_and_clock(
                echo,
                slot.icc_status(card),
                error_code(&result),
                slot.clock_khz,
                slot.rate_bps,
            )
        }
        Some(CommandType::Secure) => {
            let result = not_supported(msg);
            Response::data_block(echo, slot.icc_status(card), error_code(&result), &[])
        }
        None => {
            log::warn!("unknown CCID message type 0x{:02X}", msg.message_type);
            Response::slot_status(
                echo,
                slot.icc_status(card),
                SLOTERROR_CMD_NOT_SUPPORTED,
                slot.clock_status(),
            )
        }
    };

    if response.failed() {
        log::debug!("CCID response {:?}", response);
    }
    response
}

fn slot_status<S: SmartCard + ?Sized>(
    echo: Echo,
    slot: &Slot,
    card: &S,
    result: &HandlerResult,
) -> Response {
    Response::slot_status(
        echo,
        slot.icc_status(card),
        error_code(result),
        slot.clock_status(),
    )
}

fn parameters<S: SmartCard + ?Sized>(
    echo: Echo,
    slot: &Slot,
    card: &S,
    result: &HandlerResult,
) -> Response {
    Response::parameters(
        echo,
        slot.icc_status(card),
        error_code(result),
        slot.params.protocol_num(),
        slot.params.as_bytes(),
    )
}

// ============================================================================
// Parameter checks
// ============================================================================

fn check_slot(msg: &BulkMessage) -> HandlerResult {
    if msg.slot >= NUM_SLOTS {
        return Err(SLOTERROR_BAD_SLOT);
    }
    Ok(())
}

fn check_no_data(msg: &BulkMessage) -> HandlerResult {
    if msg.declared_length != 0 {
        return Err(SLOTERROR_BAD_LENGTH);
    }
    Ok(())
}

fn check_data(msg: &BulkMessage) -> HandlerResult {
    if msg.declared_length as usize > ABDATA_SIZE || !msg.length_consistent() {
        return Err(SLOTERROR_BAD_DWLENGTH);
    }
    Ok(())
}

fn check_rfu3(msg: &BulkMessage) -> HandlerResult {
    if msg.params != [0; 3] {
        return Err(SLOTERROR_BAD_ABRFU_3B);
    }
    Ok(())
}

fn check_rfu2(msg: &BulkMessage) -> HandlerResult {
    if msg.params[1..] != [0; 2] {
        return Err(SLOTERROR_BAD_ABRFU_2B);
    }
    Ok(())
}

fn check_present<S: SmartCard + ?Sized>(card: &S) -> HandlerResult {
    if !card.is_present() {
        return Err(SLOTERROR_ICC_MUTE);
    }
    Ok(())
}

fn check_active(slot: &Slot) -> HandlerResult {
    if !slot.powered {
        return Err(SLOTERROR_ICC_MUTE);
    }
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

fn power_on<S: SmartCard + ?Sized>(
    msg: &BulkMessage,
    slot: &mut Slot,
    card: &mut S,
    atr: &mut [u8],
) -> HandlerResult<usize> {
    check_slot(msg)?;
    check_no_data(msg)?;
    let voltage = Voltage::from_power_select(msg.params[0]).ok_or(SLOTERROR_BAD_POWERSELECT)?;
    check_rfu2(msg)?;
    check_present(card)?;

    slot.deactivate();
    let len = card.power_on(voltage, atr).map_err(|e| e.slot_error())?;
    slot.powered = true;
    slot.params = ProtocolParams::default();
    Ok(len.min(atr.len()))
}

fn power_off<S: SmartCard + ?Sized>(
    msg: &BulkMessage,
    slot: &mut Slot,
    card: &mut S,
) -> HandlerResult {
    check_slot(msg)?;
    check_rfu3(msg)?;
    card.power_off();
    slot.deactivate();
    Ok(())
}

fn get_slot_status<S: SmartCard + ?Sized>(msg: &BulkMessage, card: &S) -> HandlerResult {
    check_slot(msg)?;
    check_rfu3(msg)?;
    check_present(card)
}

fn xfr_block<S: SmartCard + ?Sized>(
    msg: &BulkMessage,
    slot: &mut Slot,
    card: &mut S,
    rsp: &mut [u8],
) -> HandlerResult<usize> {
    check_slot(msg)?;
    check_present(card)?;
    check_active(slot)?;
    check_data(msg)?;
    // Only short APDU exchanges; wLevelParameter must be zero.
    if msg.params[1..] != [0; 2] {
        return Err(SLOTERROR_BAD_LEVELPARAMETER);
    }
    let len = card.transmit(&msg.payload, rsp).map_err(|e| e.slot_error())?;
    Ok(len.min(rsp.len()))
}

fn get_parameters<S: SmartCard + ?Sized>(msg: &BulkMessage, card: &S) -> HandlerResult {
    check_slot(msg)?;
    check_no_data(msg)?;
    check_rfu3(msg)?;
    check_present(card)
}

fn reset_parameters<S: SmartCard + ?Sized>(
    msg: &BulkMessage,
    slot: &mut Slot,
    card: &S,
) -> HandlerResult {
    get_parameters(msg, card)?;
    slot.params = ProtocolParams::default();
    Ok(())
}

fn set_parameters<S: SmartCard + ?Sized>(
    msg: &BulkMessage,
    slot: &mut Slot,
    card: &S,
) -> HandlerResult {
    check_slot(msg)?;
    check_present(card)?;
    check_rfu2(msg)?;
    check_data(msg)?;
    slot.params = ProtocolParams::parse(msg.params[0], &msg.payload)?;
    Ok(())
}

fn icc_clock<S: SmartCard + ?Sized>(
    msg: &BulkMessage,
    slot: &mut Slot,
    card: &mut S,
) -> HandlerResult {
    check_slot(msg)?;
    check_present(card)?;
    check_rfu2(msg)?;
    let running = match msg.params[0] {
        0x00 => true,
        0x01 => false,
        _ => return Err(SLOTERROR_BAD_CLOCKCOMMAND),
    };
    check_active(slot)?;
    card.set_clock(running).map_err(|e| e.slot_error())?;
    slot.clock_stopped = !running;
    Ok(())
}

fn abort(msg: &BulkMessage) -> HandlerResult {
    check_slot(msg)?;
    check_rfu3(msg)
}

fn set_data_rate<S: SmartCard + ?Sized>(
    msg: &BulkMessage,
    slot: &mut Slot,
    card: &mut S,
) -> HandlerResult {
    check_slot(msg)?;
    check_present(card)?;
    check_rfu3(msg)?;
    check_data(msg)?;
    let data: [u8; 8] = msg.payload[..]
        .try_into()
        .map_err(|_| SLOTERROR_BAD_DWLENGTH)?;
    let clock = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    let rate = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    let (clock, rate) = card.set_rate(clock, rate).map_err(|e| e.slot_error())?;
    slot.clock_khz = clock;
    slot.rate_bps = rate;
    Ok(())
}

fn not_supported(msg: &BulkMessage) -> HandlerResult {
    check_slot(msg)?;
    Err(SLOTERROR_CMD_NOT_SUPPORTED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::CardError;

    struct TestCard {
        present: bool,
        powered: bool,
        clock_running: bool,
    }

    impl TestCard {
        fn inserted() -> Self {
            Self {
                present: true,
                powered: false,
                clock_running: true,
            }
        }
    }

    impl SmartCard for TestCard {
        fn is_present(&self) -> bool {
            self.present
        }

        fn power_on(&mut self, _voltage: Voltage, atr: &mut [u8]) -> Result<usize, CardError> {
            self.powered = true;
            atr[..2].copy_from_slice(&[0x3B, 0x00]);
            Ok(2)
        }

        fn power_off(&mut self) {
            self.powered = false;
        }

        fn transmit(&mut self, apdu: &[u8], response: &mut [u8]) -> Result<usize, CardError> {
            if apdu.is_empty() {
                return Err(CardError::Parity);
            }
            response[..2].copy_from_slice(&[0x90, 0x00]);
            Ok(2)
        }

        fn set_clock(&mut self, running: bool) -> Result<(), CardError> {
            self.clock_running = running;
            Ok(())
        }
    }

    fn message(message_type: u8, seq: u8, params: [u8; 3], payload: &[u8]) -> BulkMessage {
        let mut msg = BulkMessage {
            message_type,
            sequence: seq,
            declared_length: payload.len() as u32,
            params,
            header_received: true,
            bytes_accumulated: (HEADER_SIZE + payload.len()) as u32,
            ..Default::default()
        };
        msg.payload.extend_from_slice(payload).unwrap();
        msg
    }

    fn powered() -> (Slot, TestCard) {
        let mut slot = Slot::default();
        let mut card = TestCard::inserted();
        let rsp = dispatch(&message(PC_TO_RDR_ICC_POWER_ON, 0, [0; 3], &[]), &mut slot, &mut card);
        assert!(!rsp.failed());
        (slot, card)
    }

    #[test]
    fn test_power_on_returns_atr() {
        let mut slot = Slot::default();
        let mut card = TestCard::inserted();
        let rsp = dispatch(&message(PC_TO_RDR_ICC_POWER_ON, 7, [1, 0, 0], &[]), &mut slot, &mut card);
        let h = rsp.header();
        assert_eq!(h.message_type, RDR_TO_PC_DATA_BLOCK);
        assert_eq!(h.seq, 7);
        assert_eq!(h.status, ICC_PRESENT_ACTIVE);
        assert_eq!(rsp.data(), &[0x3B, 0x00]);
        assert!(slot.powered);
    }

    #[test]
    fn test_power_on_bad_power_select() {
        let mut slot = Slot::default();
        let mut card = TestCard::inserted();
        let rsp = dispatch(&message(PC_TO_RDR_ICC_POWER_ON, 1, [9, 0, 0], &[]), &mut slot, &mut card);
        assert_eq!(rsp.header().error, SLOTERROR_BAD_POWERSELECT);
        assert!(!slot.powered);
    }

    #[test]
    fn test_no_card() {
        let mut slot = Slot::default();
        let mut card = TestCard::inserted();
        card.present = false;
        let rsp = dispatch(&message(PC_TO_RDR_GET_SLOT_STATUS, 2, [0; 3], &[]), &mut slot, &mut card);
        let h = rsp.header();
        assert_eq!(h.message_type, RDR_TO_PC_SLOT_STATUS);
        assert_eq!(h.status, ICC_NOT_PRESENT | COMMAND_STATUS_FAILED);
        assert_eq!(h.error, SLOTERROR_ICC_MUTE);
    }

    #[test]
    fn test_bad_slot() {
        let mut slot = Slot::default();
        let mut card = TestCard::inserted();
        let mut msg = message(PC_TO_RDR_GET_SLOT_STATUS, 2, [0; 3], &[]);
        msg.slot = 1;
        let rsp = dispatch(&msg, &mut slot, &mut card);
        assert_eq!(rsp.header().error, SLOTERROR_BAD_SLOT);
        assert_eq!(rsp.header().slot, 1);
    }

    #[test]
    fn test_xfr_block() {
        let (mut slot, mut card) = powered();
        let apdu = [0x00, 0xA4, 0x04, 0x00];
        let rsp = dispatch(&message(PC_TO_RDR_XFR_BLOCK, 3, [0; 3], &apdu), &mut slot, &mut card);
        assert_eq!(rsp.header().message_type, RDR_TO_PC_DATA_BLOCK);
        assert_eq!(rsp.data(), &[0x90, 0x00]);
    }

    #[test]
    fn test_xfr_block_inactive_card() {
        let mut slot = Slot::default();
        let mut card = TestCard::inserted();
        let rsp = dispatch(&message(PC_TO_RDR_XFR_BLOCK, 3, [0; 3], &[0x00]), &mut slot, &mut card);
        let h = rsp.header();
        assert_eq!(h.status, ICC_PRESENT_INACTIVE | COMMAND_STATUS_FAILED);
        assert_eq!(h.error, SLOTERROR_ICC_MUTE);
    }

    #[test]
    fn test_xfr_block_length_mismatch() {
        let (mut slot, mut card) = powered();
        let mut msg = message(PC_TO_RDR_XFR_BLOCK, 4, [0; 3], &[0x00, 0xB0]);
        msg.declared_length = 5;
        let rsp = dispatch(&msg, &mut slot, &mut card);
        assert_eq!(rsp.header().error, SLOTERROR_BAD_DWLENGTH);
        assert!(rsp.data().is_empty());
    }

    #[test]
    fn test_xfr_block_card_error() {
        let (mut slot, mut card) = powered();
        let rsp = dispatch(&message(PC_TO_RDR_XFR_BLOCK, 4, [0; 3], &[]), &mut slot, &mut card);
        assert_eq!(rsp.header().error, SLOTERROR_XFR_PARITY_ERROR);
    }

    #[test]
    fn test_set_parameters_t1() {
        let (mut slot, mut card) = powered();
        let t1 = [0x11, 0x10, 0x00, 0x4D, 0x00, 0x20, 0x00];
        let rsp = dispatch(&message(PC_TO_RDR_SET_PARAMETERS, 5, [1, 0, 0], &t1), &mut slot, &mut card);
        let h = rsp.header();
        assert_eq!(h.message_type, RDR_TO_PC_PARAMETERS);
        assert_eq!(h.specific, 1);
        assert_eq!(rsp.data(), &t1);
        assert_eq!(slot.params, ProtocolParams::default_t1());

        let rsp = dispatch(&message(PC_TO_RDR_RESET_PARAMETERS, 6, [0; 3], &[]), &mut slot, &mut card);
        assert_eq!(rsp.header().specific, 0);
        assert_eq!(slot.params, ProtocolParams::default());
    }

    #[test]
    fn test_icc_clock() {
        let (mut slot, mut card) = powered();
        let rsp = dispatch(&message(PC_TO_RDR_ICC_CLOCK, 8, [1, 0, 0], &[]), &mut slot, &mut card);
        assert_eq!(rsp.header().specific, 0x01);
        assert!(!card.clock_running);

        let rsp = dispatch(&message(PC_TO_RDR_ICC_CLOCK, 9, [5, 0, 0], &[]), &mut slot, &mut card);
        assert_eq!(rsp.header().error, SLOTERROR_BAD_CLOCKCOMMAND);
    }

    #[test]
    fn test_unsupported_commands() {
        let mut slot = Slot::default();
        let mut card = TestCard::inserted();

        let rsp = dispatch(&message(PC_TO_RDR_ESCAPE, 1, [0; 3], &[0xAA]), &mut slot, &mut card);
        assert_eq!(rsp.header().message_type, RDR_TO_PC_ESCAPE);
        assert_eq!(rsp.header().error, SLOTERROR_CMD_NOT_SUPPORTED);

        let rsp = dispatch(&message(0x99, 2, [0; 3], &[]), &mut slot, &mut card);
        assert_eq!(rsp.header().message_type, RDR_TO_PC_SLOT_STATUS);
        assert_eq!(rsp.header().error, SLOTERROR_CMD_NOT_SUPPORTED);
        assert_eq!(rsp.header().seq, 2);
    }

    #[test]
    fn test_set_data_rate() {
        let (mut slot, mut card) = powered();
        let mut data = [0u8; 8];
        data[..4].copy_from_slice(&4000u32.to_le_bytes());
        data[4..].copy_from_slice(&10752u32.to_le_bytes());
        let rsp = dispatch(
            &message(PC_TO_RDR_SET_DATA_RATE_AND_CLOCK, 3, [0; 3], &data),
            &mut slot,
            &mut card,
        );
        assert_eq!(rsp.header().message_type, RDR_TO_PC_DATA_RATE_AND_CLOCK);
        assert_eq!(rsp.data(), &data);
        assert_eq!(slot.clock_khz, 4000);

        let rsp = dispatch(
            &message(PC_TO_RDR_SET_DATA_RATE_AND_CLOCK, 4, [0; 3], &data[..4]),
            &mut slot,
            &mut card,
        );
        assert_eq!(rsp.header().error, SLOTERROR_BAD_DWLENGTH);
    }

    #[test]
    fn test_power_off() {
        let (mut slot, mut card) = powered();
        let rsp = dispatch(&message(PC_TO_RDR_ICC_POWER_OFF, 3, [0; 3], &[]), &mut slot, &mut card);
        assert_eq!(rsp.header().status, ICC_PRESENT_INACTIVE);
        assert!(!slot.powered);
        assert!(!card.powered);
    }
}
