//! Descriptor rings and list-element tables
//!
//! Two frame-transport mechanisms, selected by chip generation:
//!
//! - [`DescRing`]: a circular array of self-describing descriptors with a
//!   hardware ownership bit per slot (first generation BMU).
//! - [`LeTable`]: a flat table of small list elements driven by put/done
//!   indices, with completions reported through a separate status table
//!   (second generation).

pub mod bmu;
pub mod descriptor;
pub mod le;

pub use bmu::{BufferRef, DescRing, Reclaimed};
pub use descriptor::{Descriptor, DESC_SIZE};
pub use le::{LeTable, ListElement, StatusEvent, StatusRing, LE_SIZE};
