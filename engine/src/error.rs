//! Engine error types

use core::fmt;

pub type Result<T> = core::result::Result<T, EngineError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    /// DMA region rejected or exhausted during setup
    Memory(dma_pool::DmaError),
    /// Ring or table sized zero or larger than its region
    BadRingSize,
    /// No free descriptor slot for a transmit
    RingFull,
    /// No free list elements for the requested fragment count
    TableFull,
    /// Completion index outside the outstanding window
    BadDoneIndex,
    /// Frame larger than a pool buffer
    FrameTooLarge,
    /// Frame shorter than an Ethernet header
    FrameTooShort,
    /// Packet or fragment pool exhausted
    PoolExhausted,
    /// Port index outside the adapter's port count
    BadPort,
    /// Operation requires a running adapter
    NotRunning,
    /// Adapter took the fatal error path and must be re-attached
    Failed,
}

impl From<dma_pool::DmaError> for EngineError {
    fn from(err: dma_pool::DmaError) -> Self {
        Self::Memory(err)
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory(err) => write!(f, "DMA memory error: {}", err),
            Self::BadRingSize => write!(f, "Invalid ring size"),
            Self::RingFull => write!(f, "Descriptor ring full"),
            Self::TableFull => write!(f, "List element table full"),
            Self::BadDoneIndex => write!(f, "Completion index out of window"),
            Self::FrameTooLarge => write!(f, "Frame exceeds buffer size"),
            Self::FrameTooShort => write!(f, "Frame below minimum size"),
            Self::PoolExhausted => write!(f, "Packet pool exhausted"),
            Self::BadPort => write!(f, "No such port"),
            Self::NotRunning => write!(f, "Adapter not running"),
            Self::Failed => write!(f, "Adapter failed"),
        }
    }
}
