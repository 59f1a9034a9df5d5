//! Chip generation detection
//!
//! Two buffer-management generations exist across the supported family:
//! the original descriptor-ring BMU and the later list-element design.
//! Everything else in the engine branches on [`ChipGeneration`] instead of
//! raw device ids.

/// Buffer management generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChipGeneration {
    /// First generation, dual-port fiber: descriptor rings
    Genesis,
    /// Copper single/dual port: descriptor rings
    Yukon,
    /// Second generation: list-element tables with a status queue
    Yukon2,
}

impl ChipGeneration {
    /// Does this chip move frames through list-element tables?
    pub const fn uses_list_elements(&self) -> bool {
        matches!(self, Self::Yukon2)
    }

    /// Classify a PCI device id.
    pub const fn from_device_id(device_id: u16) -> Option<Self> {
        match device_id {
            0x4300 => Some(Self::Genesis),
            0x4320 => Some(Self::Yukon),
            0x4340..=0x435F => Some(Self::Yukon2),
            _ => None,
        }
    }
}
