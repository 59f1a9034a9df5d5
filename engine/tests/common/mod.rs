//! Shared harness for the adapter integration tests: a register-file
//! hardware model, a recording frame sink and host-allocated DMA memory.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use dma_pool::MemoryRegion;
use redlink_engine::hw::REG_ISR;
use redlink_engine::{FrameSink, HardwareIo, RingCommand, RingId};
use redlink_rlmt::MacAddress;

pub const MAC_A: MacAddress = MacAddress::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x00]);
pub const MAC_B: MacAddress = MacAddress::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x01]);

#[derive(Default)]
pub struct HwInner {
    pub regs: HashMap<u32, u32>,
    pub commands: Vec<(RingId, RingCommand)>,
}

/// Register-file hardware model. Cloned handles share state so the test
/// can poke registers while the context owns its copy.
#[derive(Clone, Default)]
pub struct MockHw(pub Arc<Mutex<HwInner>>);

impl MockHw {
    pub fn set_reg(&self, offset: u32, value: u32) {
        self.0.lock().unwrap().regs.insert(offset, value);
    }

    pub fn reg(&self, offset: u32) -> u32 {
        *self.0.lock().unwrap().regs.get(&offset).unwrap_or(&0)
    }

    pub fn commands(&self) -> Vec<(RingId, RingCommand)> {
        self.0.lock().unwrap().commands.clone()
    }

    pub fn clear_commands(&self) {
        self.0.lock().unwrap().commands.clear();
    }
}

impl HardwareIo for MockHw {
    fn read_register(&self, offset: u32) -> u32 {
        *self.0.lock().unwrap().regs.get(&offset).unwrap_or(&0)
    }

    fn write_register(&mut self, offset: u32, value: u32) {
        self.0.lock().unwrap().regs.insert(offset, value);
    }

    fn issue_ring_command(&mut self, ring: RingId, cmd: RingCommand) {
        let mut inner = self.0.lock().unwrap();
        // Acknowledging a queue drops its level-triggered source bit.
        if cmd == RingCommand::ClearIrq {
            let isr = inner.regs.get(&REG_ISR).copied().unwrap_or(0);
            inner.regs.insert(REG_ISR, isr & !(1 << ring.index()));
        }
        inner.commands.push((ring, cmd));
    }
}

#[derive(Default)]
pub struct SinkInner {
    pub frames: Vec<(u8, Vec<u8>)>,
    pub link_reports: Vec<bool>,
}

/// Recording upward interface.
#[derive(Clone, Default)]
pub struct MockSink(pub Arc<Mutex<SinkInner>>);

impl MockSink {
    pub fn frames(&self) -> Vec<(u8, Vec<u8>)> {
        self.0.lock().unwrap().frames.clone()
    }

    pub fn link_reports(&self) -> Vec<bool> {
        self.0.lock().unwrap().link_reports.clone()
    }
}

impl FrameSink for MockSink {
    fn deliver_received(&mut self, port: u8, frame: &[u8]) {
        self.0.lock().unwrap().frames.push((port, frame.to_vec()));
    }

    fn report_link_status(&mut self, up: bool) {
        self.0.lock().unwrap().link_reports.push(up);
    }
}

/// Page-aligned host memory standing in for the DMA-coherent region.
pub struct DmaMem {
    _mem: Vec<u8>,
    pub region: MemoryRegion,
}

pub fn dma_mem(size: usize) -> DmaMem {
    let mut mem = vec![0u8; size + 4096];
    let base = (mem.as_mut_ptr() as usize + 4095) & !4095;
    DmaMem {
        _mem: mem,
        region: MemoryRegion::new(base, size),
    }
}

/// A minimal valid Ethernet frame (IPv4 ethertype, zero padded).
pub fn eth_frame(dst: [u8; 6], src: [u8; 6], len: usize) -> Vec<u8> {
    let mut frame = vec![0u8; len.max(60)];
    frame[0..6].copy_from_slice(&dst);
    frame[6..12].copy_from_slice(&src);
    frame[12] = 0x08;
    frame[13] = 0x00;
    frame
}
