//! CCID command implementation
//!
//! Drives a simulated card through the bulk reassembler the way a host
//! driver would: PowerOn, one XfrBlock per APDU, then PowerOff.

use mhscpu_ccid::constants::*;
use mhscpu_ccid::{CcidBulkReassembler, PacketOutcome, SlotChangeNotifier};
use mhscpu_sim::SimCard;

/// Run the ccid command
pub fn run_ccid(
    atr: &str,
    voltage: u8,
    apdus: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let atr = parse_hex(atr)?;
    let apdus = apdus
        .iter()
        .map(|s| parse_hex(s))
        .collect::<Result<Vec<_>, _>>()?;

    let mut notifier = SlotChangeNotifier::new(true);
    if let Some(msg) = notifier.poll() {
        println!("Interrupt: {}", hex(&msg));
    }

    let mut ccid = CcidBulkReassembler::new(SimCard::new().with_atr(&atr));
    let mut seq = 0u8;

    let rsp = exchange(&mut ccid, PC_TO_RDR_ICC_POWER_ON, seq, [voltage, 0, 0], &[])?;
    println!("PowerOn  -> {}", hex(&rsp));
    if rsp[7] & COMMAND_STATUS_FAILED != 0 {
        return Err(format!("PowerOn failed with error 0x{:02X}", rsp[8]).into());
    }

    for apdu in &apdus {
        seq = seq.wrapping_add(1);
        let rsp = exchange(&mut ccid, PC_TO_RDR_XFR_BLOCK, seq, [0; 3], apdu)?;
        println!("APDU {} -> {}", hex(apdu), hex(&rsp[HEADER_SIZE..]));
        if rsp[7] & COMMAND_STATUS_FAILED != 0 {
            log::warn!("XfrBlock seq {} failed with error 0x{:02X}", seq, rsp[8]);
        }
    }

    seq = seq.wrapping_add(1);
    let rsp = exchange(&mut ccid, PC_TO_RDR_ICC_POWER_OFF, seq, [0; 3], &[])?;
    println!("PowerOff -> {}", hex(&rsp));

    Ok(())
}

/// Send one command split into bulk packets and collect the response
fn exchange(
    ccid: &mut CcidBulkReassembler<SimCard>,
    message_type: u8,
    seq: u8,
    params: [u8; 3],
    payload: &[u8],
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    if payload.len() > ABDATA_SIZE {
        return Err(format!(
            "payload of {} bytes exceeds {} byte limit",
            payload.len(),
            ABDATA_SIZE
        )
        .into());
    }

    let mut msg = Vec::with_capacity(HEADER_SIZE + payload.len());
    msg.push(message_type);
    msg.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    msg.push(0);
    msg.push(seq);
    msg.extend_from_slice(&params);
    msg.extend_from_slice(payload);

    let mut packets: Vec<&[u8]> = msg.chunks(PACKET_SIZE).collect();
    if msg.len() % PACKET_SIZE == 0 {
        packets.push(&[]);
    }
    for packet in packets {
        let outcome = ccid.on_bulk_out(packet);
        log::trace!("bulk out {} bytes: {:?}", packet.len(), outcome);
        if let PacketOutcome::Dispatched(_) | PacketOutcome::Rejected = outcome {
            break;
        }
    }

    ccid.on_bulk_in_complete()
        .map(|rsp| rsp.to_vec())
        .ok_or_else(|| "reader produced no response".into())
}

/// Parse a hex string, ignoring spaces
fn parse_hex(s: &str) -> Result<Vec<u8>, String> {
    let digits: Vec<u8> = s.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return Err(format!("odd number of hex digits: {}", s));
    }
    digits
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|p| u8::from_str_radix(p, 16).ok())
                .ok_or_else(|| format!("invalid hex: {}", s))
        })
        .collect()
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}
