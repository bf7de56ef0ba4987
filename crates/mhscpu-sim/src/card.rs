//! Scripted smart card

use std::fmt;

use mhscpu_ccid::{CardError, SmartCard, Voltage};

/// Answers one command APDU
pub type Responder = Box<dyn FnMut(&[u8]) -> Result<Vec<u8>, CardError>>;

/// [`SmartCard`] with a fixed ATR and a scripted APDU responder
///
/// Without a responder every APDU is answered with `90 00`.
pub struct SimCard {
    present: bool,
    powered: bool,
    clock_running: bool,
    atr: Vec<u8>,
    responder: Option<Responder>,
    apdus: Vec<Vec<u8>>,
}

impl SimCard {
    /// ATR of a plain T=0 card
    pub const DEFAULT_ATR: [u8; 4] = [0x3B, 0x02, 0x14, 0x50];

    /// An inserted card with the default ATR
    pub fn new() -> Self {
        Self {
            present: true,
            powered: false,
            clock_running: true,
            atr: Self::DEFAULT_ATR.to_vec(),
            responder: None,
            apdus: Vec::new(),
        }
    }

    /// Use `atr` as the answer to reset
    pub fn with_atr(mut self, atr: &[u8]) -> Self {
        self.atr = atr.to_vec();
        self
    }

    /// Answer APDUs with `responder`
    pub fn with_responder(
        mut self,
        responder: impl FnMut(&[u8]) -> Result<Vec<u8>, CardError> + 'static,
    ) -> Self {
        self.responder = Some(Box::new(responder));
        self
    }

    /// Insert or remove the card
    pub fn set_present(&mut self, present: bool) {
        if !present {
            self.powered = false;
        }
        self.present = present;
    }

    /// Whether the card is activated
    pub fn is_powered(&self) -> bool {
        self.powered
    }

    /// Whether the card clock is running
    pub fn clock_running(&self) -> bool {
        self.clock_running
    }

    /// APDUs received so far
    pub fn apdus(&self) -> &[Vec<u8>] {
        &self.apdus
    }
}

impl Default for SimCard {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SimCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimCard")
            .field("present", &self.present)
            .field("powered", &self.powered)
            .field("atr", &self.atr)
            .field("apdus", &self.apdus.len())
            .finish()
    }
}

impl SmartCard for SimCard {
    fn is_present(&self) -> bool {
        self.present
    }

    fn power_on(&mut self, voltage: Voltage, atr: &mut [u8]) -> Result<usize, CardError> {
        if !self.present {
            return Err(CardError::Mute);
        }
        if self.atr.len() > atr.len() {
            return Err(CardError::Overrun);
        }
        log::debug!("card: power on at {:?}", voltage);
        self.powered = true;
        self.clock_running = true;
        atr[..self.atr.len()].copy_from_slice(&self.atr);
        Ok(self.atr.len())
    }

    fn power_off(&mut self) {
        self.powered = false;
    }

    fn transmit(&mut self, apdu: &[u8], response: &mut [u8]) -> Result<usize, CardError> {
        if !self.powered || !self.clock_running {
            return Err(CardError::Mute);
        }
        self.apdus.push(apdu.to_vec());
        let reply = match &mut self.responder {
            Some(responder) => responder(apdu)?,
            None => vec![0x90, 0x00],
        };
        if reply.len() > response.len() {
            return Err(CardError::Overrun);
        }
        response[..reply.len()].copy_from_slice(&reply);
        Ok(reply.len())
    }

    fn set_clock(&mut self, running: bool) -> Result<(), CardError> {
        self.clock_running = running;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mhscpu_ccid::constants::*;
    use mhscpu_ccid::{CcidBulkReassembler, PacketOutcome, SlotChangeNotifier};

    fn command(message_type: u8, seq: u8, params: [u8; 3], payload: &[u8]) -> Vec<u8> {
        let mut msg = vec![message_type];
        msg.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        msg.push(0);
        msg.push(seq);
        msg.extend_from_slice(&params);
        msg.extend_from_slice(payload);
        msg
    }

    fn send(ccid: &mut CcidBulkReassembler<SimCard>, msg: &[u8]) -> Vec<u8> {
        let mut chunks: Vec<&[u8]> = msg.chunks(PACKET_SIZE).collect();
        if msg.len() % PACKET_SIZE == 0 {
            chunks.push(&[]);
        }
        for chunk in chunks {
            ccid.on_bulk_out(chunk);
        }
        ccid.on_bulk_in_complete().unwrap().to_vec()
    }

    #[test]
    fn test_card_session() {
        let card = SimCard::new().with_responder(|apdu| {
            let mut reply = apdu.iter().rev().copied().collect::<Vec<_>>();
            reply.extend_from_slice(&[0x90, 0x00]);
            Ok(reply)
        });
        let mut ccid = CcidBulkReassembler::new(card);

        let rsp = send(&mut ccid, &command(PC_TO_RDR_ICC_POWER_ON, 1, [0; 3], &[]));
        assert_eq!(&rsp[10..], &SimCard::DEFAULT_ATR);

        let apdu: Vec<u8> = (0..150).map(|i| i as u8).collect();
        let rsp = send(&mut ccid, &command(PC_TO_RDR_XFR_BLOCK, 2, [0; 3], &apdu));
        assert_eq!(rsp[0], RDR_TO_PC_DATA_BLOCK);
        assert_eq!(rsp[6], 2);
        assert_eq!(rsp.len(), 10 + 152);
        assert_eq!(rsp[10], 149);
        assert_eq!(ccid.card().apdus().len(), 1);
    }

    #[test]
    fn test_card_removed() {
        let mut ccid = CcidBulkReassembler::new(SimCard::new());
        let mut notifier = SlotChangeNotifier::new(true);
        assert_eq!(notifier.poll(), Some([0x50, 0x03]));

        send(&mut ccid, &command(PC_TO_RDR_ICC_POWER_ON, 1, [0; 3], &[]));
        ccid.card_mut().set_present(false);
        notifier.on_slot_change(false);
        notifier.on_transfer_complete();
        assert_eq!(notifier.poll(), Some([0x50, 0x02]));

        let rsp = send(&mut ccid, &command(PC_TO_RDR_XFR_BLOCK, 2, [0; 3], &[0x00]));
        assert_eq!(rsp[7], ICC_NOT_PRESENT | COMMAND_STATUS_FAILED);
        assert_eq!(rsp[8], SLOTERROR_ICC_MUTE);
        assert!(!ccid.slot().powered);
    }

    #[test]
    fn test_exact_packet_multiple_with_zlp() {
        let mut ccid = CcidBulkReassembler::new(SimCard::new());
        send(&mut ccid, &command(PC_TO_RDR_ICC_POWER_ON, 1, [0; 3], &[]));

        let apdu = vec![0u8; 2 * PACKET_SIZE - HEADER_SIZE];
        let msg = command(PC_TO_RDR_XFR_BLOCK, 3, [0; 3], &apdu);
        assert_eq!(ccid.on_bulk_out(&msg[..PACKET_SIZE]), PacketOutcome::NeedMore);
        assert_eq!(
            ccid.on_bulk_out(&msg[PACKET_SIZE..]),
            PacketOutcome::Dispatched(PC_TO_RDR_XFR_BLOCK)
        );
        // The host's trailing zero-length packet is harmless once idle.
        ccid.on_bulk_in_complete().unwrap();
        assert_eq!(ccid.on_bulk_out(&[]), PacketOutcome::Ignored);
    }
}
