//! RedLink DMA engine
//!
//! Transmit/receive core for dual-port gigabit adapters. The adapter moves
//! frames through descriptor rings (first-generation buffer management unit)
//! or list-element tables (second-generation), fed from fixed packet and
//! fragment pools carved out of one DMA-capable memory region.
//!
//! ```text
//!   +-----------------------------------------------------------+
//!   |                     AdapterContext                        |
//!   |                                                           |
//!   |  +----------+   +----------+      +--------------------+  |
//!   |  | port 0   |   | port 1   |      | slow path          |  |
//!   |  | rx/tx    |   | rx/tx    |      |  event queue       |  |
//!   |  | queues   |   | queues   |      |  link supervisor   |  |
//!   |  | pools    |   | pools    |      |  address filter    |  |
//!   |  +----+-----+   +----+-----+      +---------+----------+  |
//!   |       |              |                      |             |
//!   +-------|--------------|----------------------|-------------+
//!           v              v                      v
//!      HardwareIo     HardwareIo             HardwareIo
//! ```
//!
//! The interrupt path ([`dispatch`]) only ever takes one port lock at a
//! time and never requests the slow-path lock while holding one; the slow
//! path may take port locks in turn.

#![no_std]

pub mod addr;
pub mod chip;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod hw;
pub mod logger;
pub mod pool;
pub mod ring;

pub use addr::{AddressFilter, SoftFilter};
pub use chip::ChipGeneration;
pub use context::{AdapterConfig, AdapterContext, AdapterState, FrameSink, TxStatus};
pub use dispatch::{handle_interrupt, IsrOutcome};
pub use error::{EngineError, Result};
pub use event::{Event, EventQueue};
pub use hw::{HardwareIo, RingCommand, RingId, RingKind};
