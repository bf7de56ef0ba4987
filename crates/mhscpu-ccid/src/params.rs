//! Protocol parameter data structures (abProtocolDataStructure)

use crate::constants::*;

/// Length of the T=0 parameter block
pub const T0_PARAMS_LEN: usize = 5;
/// Length of the T=1 parameter block
pub const T1_PARAMS_LEN: usize = 7;

/// Current ICC protocol and its parameter block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolParams {
    /// T=0: Fi/Di, TCCKS, guard time, waiting integer, clock stop
    T0([u8; T0_PARAMS_LEN]),
    /// T=1: Fi/Di, TCCKS, guard time, BWI/CWI, clock stop, IFSC, NAD
    T1([u8; T1_PARAMS_LEN]),
}

impl Default for ProtocolParams {
    fn default() -> Self {
        Self::T0([0x11, 0x00, 0x00, 0x0A, 0x00])
    }
}

impl ProtocolParams {
    /// Default T=1 parameters
    pub const fn default_t1() -> Self {
        Self::T1([0x11, 0x10, 0x00, 0x4D, 0x00, 0x20, 0x00])
    }

    /// bProtocolNum
    pub const fn protocol_num(&self) -> u8 {
        match self {
            Self::T0(_) => 0,
            Self::T1(_) => 1,
        }
    }

    /// Parameter block bytes
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::T0(b) => b,
            Self::T1(b) => b,
        }
    }

    /// Validate a SetParameters request
    ///
    /// Returns the new parameters or the bError value to report.
    pub fn parse(protocol: u8, data: &[u8]) -> Result<Self, u8> {
        match protocol {
            0 => {
                let block: [u8; T0_PARAMS_LEN] =
                    data.try_into().map_err(|_| SLOTERROR_BAD_DWLENGTH)?;
                check_fidi(block[0])?;
                if block[1] & !0x02 != 0 {
                    return Err(SLOTERROR_BAD_T01CONVCHECKSUM);
                }
                if block[4] > 0x03 {
                    return Err(SLOTERROR_BAD_CLOCKSTOP);
                }
                Ok(Self::T0(block))
            }
            1 => {
                let block: [u8; T1_PARAMS_LEN] =
                    data.try_into().map_err(|_| SLOTERROR_BAD_DWLENGTH)?;
                check_fidi(block[0])?;
                if block[1] & !0x03 != 0x10 {
                    return Err(SLOTERROR_BAD_T01CONVCHECKSUM);
                }
                if block[4] > 0x03 {
                    return Err(SLOTERROR_BAD_CLOCKSTOP);
                }
                if block[5] == 0x00 || block[5] == 0xFF {
                    return Err(SLOTERROR_BAD_IFSC);
                }
                if block[6] != 0x00 {
                    return Err(SLOTERROR_BAD_NAD);
                }
                Ok(Self::T1(block))
            }
            _ => Err(SLOTERROR_BAD_PROTOCOLNUM),
        }
    }
}

// Fi index 0 and Di index 0 are reserved.
fn check_fidi(fidi: u8) -> Result<(), u8> {
    if fidi >> 4 == 0 || fidi & 0x0F == 0 {
        return Err(SLOTERROR_BAD_FIDI);
    }
    Ok(())
}
