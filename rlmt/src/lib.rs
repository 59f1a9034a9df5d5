//! Redundant Link Management
//!
//! A minimal, no_std failover state machine for dual-port network adapters.
//! Monitors the health of every physical port, keeps exactly one port active
//! per logical net and fails traffic over when the active link degrades.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     RLMT Structure                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌────────────┐  ┌────────────┐  ┌────────────┐                │
//! │  │   Types    │  │   Frames   │  │    Rlmt    │                │
//! │  │            │  │            │  │            │                │
//! │  │ MacAddress │  │ probe      │  │ per-port   │                │
//! │  │ PortState  │  │ bridge     │  │ states     │                │
//! │  │ RlmtConfig │  │ probes     │  │ selection  │                │
//! │  └────────────┘  └────────────┘  └────────────┘                │
//! │                                                                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use redlink_rlmt::{Rlmt, RlmtConfig, RlmtMode, ActionList};
//!
//! let mut rlmt = Rlmt::new(RlmtConfig::new(RlmtMode::CheckLocalPort), &macs);
//! let mut actions = ActionList::new();
//!
//! rlmt.start(now, &mut actions);
//! rlmt.link_up(PortNum(0), now, &mut actions);
//! // ... feed received frames and timer ticks, apply the returned actions ...
//! ```
//!
//! The crate owns no hardware: link events, received frames and a monotonic
//! millisecond clock come in, [`RlmtAction`] values come out. The embedding
//! driver applies them (sends probe frames, reprograms rings and filters).

#![no_std]
#![allow(clippy::needless_range_loop)]

pub mod types;
pub mod timer;
pub mod frames;
pub mod port;
pub mod select;
pub mod instance;

pub use types::{
    BridgeId, MacAddress, NetState, PortNum, PortState, RlmtConfig, RlmtMode, MAX_PORTS,
};
pub use timer::Timer;
pub use frames::{FrameError, FrameKind, ParsedFrame};
pub use port::Port;
pub use select::{select_active, PortSnapshot};
pub use instance::{ActionList, Rlmt, RlmtAction, SwitchKind};
