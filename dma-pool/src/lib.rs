//! DMA-coherent memory carving for descriptor-ring drivers.
//!
//! This crate manages the contiguous, hardware-visible memory that a NIC
//! driver splits into descriptor rings, list-element tables and frame buffers.
//!
//! # Design Philosophy
//!
//! - **Zero firmware dependencies**: works on any platform
//! - **Caller-provided memory**: the host hands over one coherent region,
//!   carving never allocates behind the caller's back
//! - **Fixed at bring-up**: every carve happens once at adapter attach,
//!   nothing on the packet path touches this crate
//!
//! # Usage
//!
//! ```ignore
//! use dma_pool::{DmaArena, MemoryRegion};
//!
//! let region = MemoryRegion::new(base, size);
//! let mut arena = DmaArena::new(region)?;
//!
//! // Carve the RX descriptor ring, then its buffers
//! let ring = arena.carve(desc_count * 16, 4096)?;
//! let bufs = arena.carve(desc_count * 2048, 4096)?;
//! ```

#![no_std]

/// Page size (4KB).
pub const PAGE_SIZE: usize = 4096;

/// Descriptor alignment required by the BMU (8 bytes).
pub const DESC_ALIGN: usize = 8;

/// List-element table alignment (4KB, table must not cross a page pair).
pub const LE_TABLE_ALIGN: usize = 4096;

/// Minimum region worth carving: one page of descriptors plus one buffer.
pub const MIN_REGION_SIZE: usize = 2 * PAGE_SIZE;

// ============================================================================
// Utility functions
// ============================================================================

/// Align a value up to the given alignment.
#[inline]
pub const fn align_up(val: usize, align: usize) -> usize {
    (val + align - 1) & !(align - 1)
}

/// Align a value down to the given alignment.
#[inline]
pub const fn align_down(val: usize, align: usize) -> usize {
    val & !(align - 1)
}

// ============================================================================
// Error types
// ============================================================================

/// DMA carving errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaError {
    /// Requested 0 bytes.
    ZeroSize,
    /// Alignment is zero or not a power of two.
    BadAlign,
    /// Not enough memory left in the arena.
    OutOfMemory,
    /// Region is null, misaligned or too small to carve anything.
    InvalidRegion,
}

impl core::fmt::Display for DmaError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ZeroSize => write!(f, "Zero-size request"),
            Self::BadAlign => write!(f, "Bad alignment"),
            Self::OutOfMemory => write!(f, "Arena exhausted"),
            Self::InvalidRegion => write!(f, "Invalid memory region"),
        }
    }
}

/// Result type for DMA operations.
pub type Result<T> = core::result::Result<T, DmaError>;

// ============================================================================
// Memory regions
// ============================================================================

/// A contiguous memory region suitable for DMA.
///
/// `base` is both the bus address and the CPU address; the host guarantees
/// identity (or pre-translated) mapping for the whole region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRegion {
    /// Base address.
    pub base: usize,
    /// Size in bytes.
    pub size: usize,
}

impl MemoryRegion {
    /// Create a new memory region.
    pub const fn new(base: usize, size: usize) -> Self {
        Self { base, size }
    }

    /// Check if region can back at least one ring (page-aligned, large enough).
    pub fn is_usable(&self) -> bool {
        self.base != 0 && self.base % PAGE_SIZE == 0 && self.size >= MIN_REGION_SIZE
    }

    /// End address (exclusive).
    pub const fn end(&self) -> usize {
        self.base + self.size
    }

    /// Shrink to page-aligned bounds.
    pub fn aligned(&self) -> Self {
        let aligned_base = align_up(self.base, PAGE_SIZE);
        let adjustment = aligned_base - self.base;
        let aligned_size = align_down(self.size.saturating_sub(adjustment), PAGE_SIZE);
        Self {
            base: aligned_base,
            size: aligned_size,
        }
    }

    /// Check whether `self` fully contains `other`.
    pub fn contains(&self, other: &MemoryRegion) -> bool {
        other.base >= self.base && other.end() <= self.end()
    }
}

// ============================================================================
// Arena carving
// ============================================================================

/// Bump carver over one DMA-coherent region.
///
/// Every ring, LE table and buffer area of an adapter is carved from one
/// arena at attach time. Carves are never returned individually; the whole
/// arena is reclaimed when the adapter detaches.
pub struct DmaArena {
    region: MemoryRegion,
    offset: usize,
}

impl DmaArena {
    /// Wrap a region for carving.
    ///
    /// Fails if the region is null or too small to hold even one descriptor
    /// page. Callers are expected to pre-validate their sizing.
    pub fn new(region: MemoryRegion) -> Result<Self> {
        if !region.is_usable() {
            return Err(DmaError::InvalidRegion);
        }
        Ok(Self {
            region: region.aligned(),
            offset: 0,
        })
    }

    /// Carve `size` bytes at the given alignment.
    ///
    /// Returns the sub-region; its `base` is the bus-visible address.
    pub fn carve(&mut self, size: usize, align: usize) -> Result<MemoryRegion> {
        if size == 0 {
            return Err(DmaError::ZeroSize);
        }
        if align == 0 || !align.is_power_of_two() {
            return Err(DmaError::BadAlign);
        }

        let start = align_up(self.region.base + self.offset, align);
        let end = start.checked_add(size).ok_or(DmaError::OutOfMemory)?;
        if end > self.region.end() {
            return Err(DmaError::OutOfMemory);
        }

        self.offset = end - self.region.base;
        Ok(MemoryRegion::new(start, size))
    }

    /// Carve a descriptor ring area: `count` records of `record_size` bytes.
    pub fn carve_ring(&mut self, count: usize, record_size: usize) -> Result<MemoryRegion> {
        let size = count.checked_mul(record_size).ok_or(DmaError::OutOfMemory)?;
        self.carve(size, LE_TABLE_ALIGN)
    }

    /// Carve a buffer area: `count` buffers of `buffer_size` bytes each.
    pub fn carve_buffers(&mut self, count: usize, buffer_size: usize) -> Result<MemoryRegion> {
        let size = count.checked_mul(buffer_size).ok_or(DmaError::OutOfMemory)?;
        self.carve(size, DESC_ALIGN)
    }

    /// Remaining free space in bytes.
    pub fn remaining(&self) -> usize {
        self.region.size - self.offset
    }

    /// Total arena size in bytes.
    pub fn total_size(&self) -> usize {
        self.region.size
    }

    /// Arena base address.
    pub fn base_address(&self) -> usize {
        self.region.base
    }

    /// Forget all carves.
    ///
    /// # Safety
    ///
    /// All previously carved regions must no longer be referenced by hardware
    /// or software.
    pub unsafe fn reset(&mut self) {
        self.offset = 0;
    }
}

// ============================================================================
// Tests
// ============================================================================
