//! Controller device parameters

/// SPI clock polarity/phase used towards the flash
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Protocol {
    /// CPOL=0, CPHA=0
    #[default]
    Mode0 = 0x00,
    /// CPOL=1, CPHA=1
    Mode3 = 0x03,
}

/// QSPI clock divider relative to HCLK
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum FreqSel {
    /// HCLK / 2
    Div2 = 0x01,
    /// HCLK / 3
    #[default]
    Div3 = 0x02,
    /// HCLK / 4
    Div4 = 0x03,
}

const SAMPLE_DLY_POS: u32 = 15;
const SAMPLE_PHA_POS: u32 = 14;
const PROTOCOL_POS: u32 = 8;
const DUMMY_CYCLE_POS: u32 = 4;
const LATENCY_POS: u32 = 16;

/// Contents of the controller's device parameter register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DeviceParams {
    /// Delay read sampling by half a cycle
    pub sample_delay: bool,
    /// Sample on the opposite clock edge
    pub sample_phase: bool,
    /// Clock polarity/phase
    pub protocol: Protocol,
    /// Dummy cycles for fast reads (0..=15)
    pub dummy_cycles: u8,
    /// Clock divider
    pub freq_sel: FreqSel,
    /// HCLK cycles per microsecond used for the controller's internal delays
    pub latency: u16,
}

impl Default for DeviceParams {
    fn default() -> Self {
        Self {
            sample_delay: false,
            sample_phase: true,
            protocol: Protocol::Mode0,
            dummy_cycles: 6,
            freq_sel: FreqSel::Div3,
            latency: 192,
        }
    }
}

impl DeviceParams {
    /// Encode as the register word
    pub fn encode(&self) -> u32 {
        ((self.latency as u32) << LATENCY_POS)
            | ((self.sample_delay as u32) << SAMPLE_DLY_POS)
            | ((self.sample_phase as u32) << SAMPLE_PHA_POS)
            | ((self.protocol as u32 & 0x03) << PROTOCOL_POS)
            | ((self.dummy_cycles as u32 & 0x0F) << DUMMY_CYCLE_POS)
            | (self.freq_sel as u32 & 0x03)
    }
}
