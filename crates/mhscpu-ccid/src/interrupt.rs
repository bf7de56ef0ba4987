//! Interrupt-IN slot change notification
//!
//! A change is latched when detected and reported by the next [`poll`]
//! once the previous interrupt transfer has retired. Changes detected while
//! a transfer is in flight coalesce into one message carrying the latest
//! presence state.
//!
//! [`poll`]: SlotChangeNotifier::poll

use crate::constants::RDR_TO_PC_NOTIFY_SLOT_CHANGE;

/// bmSlotICCState bit: card present
pub const SLOT_ICC_PRESENT: u8 = 0x01;
/// bmSlotICCState bit: state changed since the last notification
pub const SLOT_ICC_CHANGED: u8 = 0x02;

/// RDR_to_PC_NotifySlotChange source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotChangeNotifier {
    present: bool,
    changed: bool,
    transfer_complete: bool,
}

impl SlotChangeNotifier {
    /// Start with the current presence latched as a change, so the first
    /// poll after enumeration reports the slot state
    pub const fn new(present: bool) -> Self {
        Self {
            present,
            changed: true,
            transfer_complete: true,
        }
    }

    /// Card insertion or removal detected
    pub fn on_slot_change(&mut self, present: bool) {
        if present != self.present || !self.changed {
            log::debug!("slot change latched, present={}", present);
        }
        self.present = present;
        self.changed = true;
    }

    /// Message to queue on the interrupt-IN endpoint, if one is due
    pub fn poll(&mut self) -> Option<[u8; 2]> {
        if !self.changed || !self.transfer_complete {
            return None;
        }
        self.changed = false;
        self.transfer_complete = false;

        let mut state = SLOT_ICC_CHANGED;
        if self.present {
            state |= SLOT_ICC_PRESENT;
        }
        Some([RDR_TO_PC_NOTIFY_SLOT_CHANGE, state])
    }

    /// The interrupt-IN transfer has retired
    pub fn on_transfer_complete(&mut self) {
        self.transfer_complete = true;
    }

    /// Whether a change is waiting to be reported
    pub fn is_pending(&self) -> bool {
        self.changed
    }
}

impl Default for SlotChangeNotifier {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_reported_once() {
        let mut n = SlotChangeNotifier::new(true);
        assert_eq!(n.poll(), Some([0x50, 0x03]));
        assert_eq!(n.poll(), None);
        n.on_transfer_complete();
        assert_eq!(n.poll(), None);
    }

    #[test]
    fn test_not_resent_before_transfer_completes() {
        let mut n = SlotChangeNotifier::new(false);
        assert!(n.poll().is_some());

        n.on_slot_change(true);
        assert_eq!(n.poll(), None);
        assert!(n.is_pending());

        n.on_transfer_complete();
        assert_eq!(n.poll(), Some([0x50, SLOT_ICC_CHANGED | SLOT_ICC_PRESENT]));
    }

    #[test]
    fn test_changes_coalesce() {
        let mut n = SlotChangeNotifier::new(true);
        n.poll();

        n.on_slot_change(false);
        n.on_slot_change(true);
        n.on_slot_change(false);
        n.on_transfer_complete();

        assert_eq!(n.poll(), Some([0x50, SLOT_ICC_CHANGED]));
        n.on_transfer_complete();
        assert_eq!(n.poll(), None);
    }
}
