//! Bulk-OUT reassembly state machine
//!
//! The host splits each command message into max-packet-size packets. A
//! packet shorter than [`PACKET_SIZE`] (or a full packet that completes the
//! declared length) ends the message. Once complete the message is handed
//! to the command table and exactly one response is held until the bulk-IN
//! transfer carrying it completes.
//!
//! All methods run from USB event context; nothing here blocks.

use crate::card::SmartCard;
use crate::constants::*;
use crate::handlers::{self, Slot};
use crate::header::CommandHeader;
use crate::message::{BulkMessage, CommandType};
use crate::response::{Echo, Response};

/// Reassembly state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BulkState {
    /// Waiting for a header-bearing packet
    #[default]
    Idle,
    /// Header seen, continuation packets expected
    ReceivingData,
    /// Message rejected; the next packet is dropped
    LengthError,
}

/// What a bulk-OUT packet did to the reassembler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketOutcome {
    /// Packet dropped, state unchanged
    Ignored,
    /// Packet stored, message still incomplete
    NeedMore,
    /// Message complete and handled; carries bMessageType
    Dispatched(u8),
    /// Message rejected before any handler ran
    Rejected,
    /// Packet dropped while leaving [`BulkState::LengthError`]
    Discarded,
}

/// CCID bulk endpoint pair for one reader
pub struct CcidBulkReassembler<S> {
    state: BulkState,
    message: BulkMessage,
    slot: Slot,
    card: S,
    response: Option<Response>,
}

impl<S: SmartCard> CcidBulkReassembler<S> {
    /// Create an idle reassembler driving `card`
    pub fn new(card: S) -> Self {
        Self {
            state: BulkState::Idle,
            message: BulkMessage::default(),
            slot: Slot::default(),
            card,
            response: None,
        }
    }

    /// Current reassembly state
    pub fn state(&self) -> BulkState {
        self.state
    }

    /// Reader-side slot state
    pub fn slot(&self) -> &Slot {
        &self.slot
    }

    /// The card collaborator
    pub fn card(&self) -> &S {
        &self.card
    }

    /// Mutable access to the card collaborator
    pub fn card_mut(&mut self) -> &mut S {
        &mut self.card
    }

    /// Response scheduled for the bulk-IN endpoint, if any
    pub fn pending_response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    /// The bulk-IN transfer carrying the pending response has completed
    pub fn on_bulk_in_complete(&mut self) -> Option<Response> {
        self.response.take()
    }

    /// Host-initiated abort: drop any partial message
    pub fn abort(&mut self) {
        if self.state != BulkState::Idle {
            log::debug!("CCID abort in {:?}", self.state);
        }
        self.message.reset();
        self.state = BulkState::Idle;
    }

    /// Endpoint torn down (configuration change or reset)
    pub fn deinit(&mut self) {
        self.abort();
        self.response = None;
    }

    /// Feed one bulk-OUT packet
    pub fn on_bulk_out(&mut self, packet: &[u8]) -> PacketOutcome {
        if packet.len() > PACKET_SIZE {
            log::warn!("oversized bulk-OUT packet ({} bytes)", packet.len());
            return PacketOutcome::Ignored;
        }

        match self.state {
            BulkState::LengthError => {
                log::debug!("discarding {}-byte packet after length error", packet.len());
                self.message.reset();
                self.state = BulkState::Idle;
                PacketOutcome::Discarded
            }
            _ if self.response.is_some() => {
                log::warn!("bulk-OUT packet while a response is pending, ignored");
                PacketOutcome::Ignored
            }
            BulkState::Idle => self.start(packet),
            BulkState::ReceivingData => self.resume(packet),
        }
    }

    fn start(&mut self, packet: &[u8]) -> PacketOutcome {
        if packet.is_empty() {
            return PacketOutcome::Ignored;
        }
        let header = match CommandHeader::parse(packet) {
            Ok(header) => header,
            Err(e) => {
                log::warn!("dropping {}-byte bulk-OUT packet: {}", packet.len(), e);
                return PacketOutcome::Ignored;
            }
        };
        self.message.begin(&header, packet);

        // No handler runs for a message the payload buffer cannot hold,
        // even when it arrives in a single short packet.
        if header.declared_len() as usize > ABDATA_SIZE {
            log::warn!(
                "dwLength {} exceeds the {}-byte payload buffer",
                header.declared_len(),
                ABDATA_SIZE
            );
            return self.reject();
        }

        if packet.len() < PACKET_SIZE {
            return self.dispatch();
        }

        let expected = self.message.expected_len();
        let received = self.message.bytes_accumulated as u64;
        if expected == received {
            self.dispatch()
        } else if expected < received {
            log::warn!("{} bytes received for a {}-byte message", received, expected);
            self.reject()
        } else {
            self.state = BulkState::ReceivingData;
            PacketOutcome::NeedMore
        }
    }

    fn resume(&mut self, packet: &[u8]) -> PacketOutcome {
        let expected = self.message.expected_len();
        let total = self.message.bytes_accumulated as u64 + packet.len() as u64;
        if total > expected {
            log::warn!("{} bytes received for a {}-byte message", total, expected);
            return self.reject();
        }

        self.message.append(packet);
        // A short packet ends the transfer even if the message came up short;
        // the handler reports the length mismatch.
        if packet.len() < PACKET_SIZE || total == expected {
            self.dispatch()
        } else {
            PacketOutcome::NeedMore
        }
    }

    fn dispatch(&mut self) -> PacketOutcome {
        let message_type = self.message.message_type;
        let response = handlers::dispatch(&self.message, &mut self.slot, &mut self.card);
        if self.message.command() == Some(CommandType::Abort) {
            log::debug!("CCID abort seq={}", self.message.sequence);
        }
        self.message.reset();
        self.state = BulkState::Idle;
        self.response = Some(response);
        PacketOutcome::Dispatched(message_type)
    }

    fn reject(&mut self) -> PacketOutcome {
        let echo = Echo {
            slot: self.message.slot,
            seq: self.message.sequence,
        };
        self.response = Some(Response::slot_status(
            echo,
            self.slot.icc_status(&self.card),
            SLOTERROR_BAD_DWLENGTH,
            self.slot.clock_status(),
        ));
        self.message.reset();
        self.state = BulkState::LengthError;
        PacketOutcome::Rejected
    }
}

impl<S: core::fmt::Debug> core::fmt::Debug for CcidBulkReassembler<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CcidBulkReassembler")
            .field("state", &self.state)
            .field("slot", &self.slot)
            .field("card", &self.card)
            .field("response", &self.response)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{CardError, Voltage};
    use std::vec::Vec;

    /// Card that answers every APDU with its length followed by 90 00
    #[derive(Debug, Default)]
    struct CountingCard {
        transmits: usize,
        last_apdu_len: usize,
    }

    impl SmartCard for CountingCard {
        fn is_present(&self) -> bool {
            true
        }

        fn power_on(&mut self, _voltage: Voltage, atr: &mut [u8]) -> Result<usize, CardError> {
            atr[0] = 0x3B;
            Ok(1)
        }

        fn power_off(&mut self) {}

        fn transmit(&mut self, apdu: &[u8], response: &mut [u8]) -> Result<usize, CardError> {
            self.transmits += 1;
            self.last_apdu_len = apdu.len();
            response[..3].copy_from_slice(&[apdu.len() as u8, 0x90, 0x00]);
            Ok(3)
        }
    }

    fn header(message_type: u8, len: u32, seq: u8) -> [u8; HEADER_SIZE] {
        let mut h = [0u8; HEADER_SIZE];
        h[0] = message_type;
        h[1..5].copy_from_slice(&len.to_le_bytes());
        h[6] = seq;
        h
    }

    /// Split a complete message into bulk packets the way a host does
    fn packets(message_type: u8, payload_len: usize, seq: u8) -> Vec<Vec<u8>> {
        let mut wire = header(message_type, payload_len as u32, seq).to_vec();
        wire.extend((0..payload_len).map(|i| i as u8));
        let mut out: Vec<Vec<u8>> = wire.chunks(PACKET_SIZE).map(|c| c.to_vec()).collect();
        if wire.len() % PACKET_SIZE == 0 {
            out.push(Vec::new());
        }
        out
    }

    fn powered() -> CcidBulkReassembler<CountingCard> {
        let mut r = CcidBulkReassembler::new(CountingCard::default());
        let outcome = r.on_bulk_out(&header(PC_TO_RDR_ICC_POWER_ON, 0, 0));
        assert_eq!(outcome, PacketOutcome::Dispatched(PC_TO_RDR_ICC_POWER_ON));
        r.on_bulk_in_complete().unwrap();
        r
    }

    #[test]
    fn test_single_short_packet_dispatches() {
        let mut r = CcidBulkReassembler::new(CountingCard::default());
        let outcome = r.on_bulk_out(&header(PC_TO_RDR_GET_SLOT_STATUS, 0, 0x42));
        assert_eq!(outcome, PacketOutcome::Dispatched(PC_TO_RDR_GET_SLOT_STATUS));
        assert_eq!(r.state(), BulkState::Idle);

        let rsp = r.on_bulk_in_complete().unwrap();
        let h = rsp.header();
        assert_eq!(h.message_type, RDR_TO_PC_SLOT_STATUS);
        assert_eq!(h.slot, 0);
        assert_eq!(h.seq, 0x42);
        assert!(r.pending_response().is_none());
    }

    #[test]
    fn test_multi_packet_dispatches_once_at_end() {
        let mut r = powered();
        let pkts = packets(PC_TO_RDR_XFR_BLOCK, 200, 7);
        assert_eq!(pkts.len(), 4);

        for p in &pkts[..pkts.len() - 1] {
            assert_eq!(r.on_bulk_out(p), PacketOutcome::NeedMore);
            assert_eq!(r.state(), BulkState::ReceivingData);
            assert!(r.pending_response().is_none());
        }
        let last = pkts.last().unwrap();
        assert_eq!(r.on_bulk_out(last), PacketOutcome::Dispatched(PC_TO_RDR_XFR_BLOCK));
        assert_eq!(r.card().transmits, 1);
        assert_eq!(r.card().last_apdu_len, 200);

        let rsp = r.on_bulk_in_complete().unwrap();
        assert_eq!(rsp.header().seq, 7);
        assert_eq!(rsp.data(), &[200, 0x90, 0x00]);
    }

    #[test]
    fn test_exact_full_packet_dispatches() {
        let mut r = powered();
        let pkts = packets(PC_TO_RDR_XFR_BLOCK, PACKET_SIZE - HEADER_SIZE, 1);
        assert_eq!(r.on_bulk_out(&pkts[0]), PacketOutcome::Dispatched(PC_TO_RDR_XFR_BLOCK));
        assert_eq!(r.card().last_apdu_len, 54);
    }

    #[test]
    fn test_full_packets_complete_without_zlp() {
        let mut r = powered();
        let pkts = packets(PC_TO_RDR_XFR_BLOCK, 2 * PACKET_SIZE - HEADER_SIZE, 2);
        assert_eq!(r.on_bulk_out(&pkts[0]), PacketOutcome::NeedMore);
        assert_eq!(r.on_bulk_out(&pkts[1]), PacketOutcome::Dispatched(PC_TO_RDR_XFR_BLOCK));
        assert_eq!(r.card().last_apdu_len, 118);
    }

    #[test]
    fn test_largest_message_accepted() {
        let mut r = powered();
        let pkts = packets(PC_TO_RDR_XFR_BLOCK, ABDATA_SIZE, 3);
        let outcomes: Vec<_> = pkts.iter().map(|p| r.on_bulk_out(p)).collect();
        assert_eq!(
            outcomes.last(),
            Some(&PacketOutcome::Dispatched(PC_TO_RDR_XFR_BLOCK))
        );
        assert_eq!(r.card().last_apdu_len, ABDATA_SIZE);
    }

    #[test]
    fn test_oversized_declared_length_rejected() {
        let mut r = powered();
        let pkts = packets(PC_TO_RDR_XFR_BLOCK, ABDATA_SIZE + 1, 9);
        assert_eq!(r.on_bulk_out(&pkts[0]), PacketOutcome::Rejected);
        assert_eq!(r.state(), BulkState::LengthError);
        assert_eq!(r.card().transmits, 0);

        let rsp = r.pending_response().unwrap();
        assert_eq!(rsp.header().seq, 9);
        assert_eq!(rsp.header().error, SLOTERROR_BAD_DWLENGTH);
        assert!(rsp.failed());

        assert_eq!(r.on_bulk_out(&pkts[1]), PacketOutcome::Discarded);
        assert_eq!(r.state(), BulkState::Idle);
        assert_eq!(r.card().transmits, 0);
    }

    #[test]
    fn test_short_packet_oversized_length_rejected() {
        let mut r = powered();
        assert!(r.slot().powered);

        let outcome = r.on_bulk_out(&header(PC_TO_RDR_ICC_POWER_OFF, 1000, 4));
        assert_eq!(outcome, PacketOutcome::Rejected);
        assert_eq!(r.state(), BulkState::LengthError);
        // The power-off handler never ran.
        assert!(r.slot().powered);

        let rsp = r.on_bulk_in_complete().unwrap();
        assert_eq!(rsp.header().message_type, RDR_TO_PC_SLOT_STATUS);
        assert_eq!(rsp.header().seq, 4);
        assert_eq!(rsp.header().error, SLOTERROR_BAD_DWLENGTH);
        assert!(rsp.failed());

        assert_eq!(r.on_bulk_out(&[]), PacketOutcome::Discarded);
        assert_eq!(r.state(), BulkState::Idle);
    }

    #[test]
    fn test_recovers_after_length_error() {
        let mut r = powered();
        let pkts = packets(PC_TO_RDR_XFR_BLOCK, 1000, 1);
        assert_eq!(r.on_bulk_out(&pkts[0]), PacketOutcome::Rejected);
        r.on_bulk_in_complete().unwrap();
        assert_eq!(r.on_bulk_out(&pkts[1]), PacketOutcome::Discarded);

        let next = packets(PC_TO_RDR_XFR_BLOCK, 5, 2);
        assert_eq!(r.on_bulk_out(&next[0]), PacketOutcome::Dispatched(PC_TO_RDR_XFR_BLOCK));
        assert_eq!(r.on_bulk_in_complete().unwrap().header().seq, 2);
    }

    #[test]
    fn test_full_packet_longer_than_declared() {
        let mut r = powered();
        let mut packet = [0u8; PACKET_SIZE];
        packet[..HEADER_SIZE].copy_from_slice(&header(PC_TO_RDR_XFR_BLOCK, 53, 4));
        assert_eq!(r.on_bulk_out(&packet), PacketOutcome::Rejected);
        assert_eq!(r.state(), BulkState::LengthError);
        assert_eq!(r.card().transmits, 0);
    }

    #[test]
    fn test_continuation_overflow_rejected() {
        let mut r = powered();
        let pkts = packets(PC_TO_RDR_XFR_BLOCK, 100, 5);
        assert_eq!(r.on_bulk_out(&pkts[0]), PacketOutcome::NeedMore);
        assert_eq!(r.on_bulk_out(&[0u8; PACKET_SIZE]), PacketOutcome::Rejected);
        assert_eq!(r.state(), BulkState::LengthError);
        assert_eq!(r.card().transmits, 0);
    }

    #[test]
    fn test_short_continuation_reports_bad_length() {
        let mut r = powered();
        let pkts = packets(PC_TO_RDR_XFR_BLOCK, 100, 6);
        assert_eq!(r.on_bulk_out(&pkts[0]), PacketOutcome::NeedMore);
        assert_eq!(r.on_bulk_out(&[0u8; 10]), PacketOutcome::Dispatched(PC_TO_RDR_XFR_BLOCK));
        let rsp = r.on_bulk_in_complete().unwrap();
        assert_eq!(rsp.header().error, SLOTERROR_BAD_DWLENGTH);
        assert_eq!(r.card().transmits, 0);
    }

    #[test]
    fn test_runt_and_empty_packets_ignored() {
        let mut r = CcidBulkReassembler::new(CountingCard::default());
        assert_eq!(r.on_bulk_out(&[]), PacketOutcome::Ignored);
        assert_eq!(r.on_bulk_out(&[PC_TO_RDR_ICC_POWER_ON, 0, 0]), PacketOutcome::Ignored);
        assert_eq!(r.state(), BulkState::Idle);
        assert!(r.pending_response().is_none());
    }

    #[test]
    fn test_packets_ignored_while_response_pending() {
        let mut r = CcidBulkReassembler::new(CountingCard::default());
        r.on_bulk_out(&header(PC_TO_RDR_GET_SLOT_STATUS, 0, 1));
        assert_eq!(
            r.on_bulk_out(&header(PC_TO_RDR_GET_SLOT_STATUS, 0, 2)),
            PacketOutcome::Ignored
        );
        assert_eq!(r.on_bulk_in_complete().unwrap().header().seq, 1);
        assert_eq!(
            r.on_bulk_out(&header(PC_TO_RDR_GET_SLOT_STATUS, 0, 3)),
            PacketOutcome::Dispatched(PC_TO_RDR_GET_SLOT_STATUS)
        );
    }

    #[test]
    fn test_abort_resets_partial_message() {
        let mut r = powered();
        let pkts = packets(PC_TO_RDR_XFR_BLOCK, 150, 1);
        r.on_bulk_out(&pkts[0]);
        assert_eq!(r.state(), BulkState::ReceivingData);

        r.abort();
        assert_eq!(r.state(), BulkState::Idle);
        assert_eq!(
            r.on_bulk_out(&header(PC_TO_RDR_ABORT, 0, 1)),
            PacketOutcome::Dispatched(PC_TO_RDR_ABORT)
        );
        let rsp = r.on_bulk_in_complete().unwrap();
        assert_eq!(rsp.header().message_type, RDR_TO_PC_SLOT_STATUS);
        assert!(!rsp.failed());
    }

    #[test]
    fn test_deinit_drops_pending_response() {
        let mut r = CcidBulkReassembler::new(CountingCard::default());
        r.on_bulk_out(&header(PC_TO_RDR_GET_SLOT_STATUS, 0, 1));
        r.deinit();
        assert!(r.pending_response().is_none());
        assert_eq!(r.state(), BulkState::Idle);
    }
}
