//! Adapter context
//!
//! One [`AdapterContext`] owns everything a physical adapter needs: the
//! per-port queues and pools, the deferred event queue, the link supervisor
//! and the collaborator seams (hardware access, address filter, frame sink).
//!
//! Lock order, outermost first: `slow` -> port -> `hw`/`sink`. A port lock
//! is never taken while another port lock is held, and the slow-path lock
//! is never requested by code already holding a port lock.

use core::sync::atomic::{AtomicU8, Ordering};

use dma_pool::{DmaArena, MemoryRegion};
use redlink_rlmt::frames::{self, ProbeKind, ETH_HEADER_SIZE, MIN_FRAME_SIZE};
use redlink_rlmt::{
    ActionList, MacAddress, PortNum, Rlmt, RlmtAction, RlmtConfig, RlmtMode, SwitchKind,
};
use smoltcp::wire::EthernetFrame;
use spin::Mutex;

use crate::addr::AddressFilter;
use crate::chip::ChipGeneration;
use crate::error::{EngineError, Result};
use crate::event::{Event, EventCode, EventQueue};
use crate::hw::{HardwareIo, RingCommand, RingId};
use crate::pool::{PacketPool, NIL, POOL_PACKETS};
use crate::ring::bmu::{BufferRef, DescRing};
use crate::ring::le::{ring_distance, LeTable, StatusRing, ADDR64_OVERHEAD, LE_SIZE, OP_PACKET};
use crate::ring::DESC_SIZE;
use crate::{log_error, log_info, log_warn};

/// Ports an adapter can have
pub const MAX_PORTS: usize = redlink_rlmt::MAX_PORTS;

/// Size of one frame buffer
pub const BUF_SIZE: usize = 2048;

/// Largest frame accepted for transmit or delivery (untagged Ethernet)
pub const MAX_FRAME_LEN: usize = 1518;

/// Status ring size for second-generation chips
pub const STATUS_RING_SIZE: u16 = 64;

/// Outcome of a transmit submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    /// Frame copied and queued to hardware
    Accepted,
    /// No packet or ring slot free; retry after the next completion
    Backpressure,
}

/// Adapter lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AdapterState {
    /// Memory carved, rings laid out, interrupts masked
    Attached = 0,
    /// Traffic flowing
    Running = 1,
    /// Fatal hardware error; interrupts masked, needs re-attach
    Failed = 2,
}

impl AdapterState {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Running,
            2 => Self::Failed,
            _ => Self::Attached,
        }
    }
}

/// Upward interface: the host side of the engine.
pub trait FrameSink {
    /// A frame arrived on the active port.
    fn deliver_received(&mut self, port: u8, frame: &[u8]);

    /// The logical net changed state (carrier on/off for the host stack).
    fn report_link_status(&mut self, up: bool);
}

/// Static adapter parameters fixed at attach
#[derive(Debug, Clone, Copy)]
pub struct AdapterConfig {
    /// Buffer management generation
    pub chip: ChipGeneration,
    /// Number of physical ports (1 or 2)
    pub num_ports: usize,
    /// Permanent MAC address per port
    pub macs: [MacAddress; MAX_PORTS],
    /// Link supervisor configuration
    pub rlmt: RlmtConfig,
    /// RX descriptors / list elements per port
    pub rx_ring_size: u16,
    /// TX descriptors / list elements per port
    pub tx_ring_size: u16,
}

impl AdapterConfig {
    pub fn new(chip: ChipGeneration, num_ports: usize, macs: [MacAddress; MAX_PORTS]) -> Self {
        Self {
            chip,
            num_ports,
            macs,
            rlmt: RlmtConfig::new(RlmtMode::CheckLinkState),
            rx_ring_size: 32,
            tx_ring_size: 32,
        }
    }

    pub fn with_rlmt(mut self, rlmt: RlmtConfig) -> Self {
        self.rlmt = rlmt;
        self
    }

    pub fn with_ring_sizes(mut self, rx: u16, tx: u16) -> Self {
        self.rx_ring_size = rx;
        self.tx_ring_size = tx;
        self
    }
}

/// A carved buffer area: `count` fixed-size buffers
#[derive(Debug, Clone, Copy)]
struct BufArea {
    base: usize,
    count: u16,
}

impl BufArea {
    fn addr(&self, idx: u16) -> u64 {
        debug_assert!(idx < self.count);
        (self.base + idx as usize * BUF_SIZE) as u64
    }

    /// View one buffer as a byte slice.
    ///
    /// Sound because the area was carved from the caller-guaranteed DMA
    /// region and each index maps to a disjoint `BUF_SIZE` range.
    unsafe fn slice_mut(&self, idx: u16, len: usize) -> &mut [u8] {
        core::slice::from_raw_parts_mut(self.addr(idx) as *mut u8, len.min(BUF_SIZE))
    }
}

/// Transmit queue, generation-specific
enum TxQueue {
    Ring(DescRing),
    Table(LeTable),
}

/// Receive queue, generation-specific
enum RxQueue {
    Ring(DescRing),
    Table(LeTable),
}

/// Everything one port owns
struct PortIo {
    tx: TxQueue,
    rx: RxQueue,
    pool: PacketPool,
    tx_bufs: BufArea,
    rx_bufs: BufArea,
}

/// What one RX service step produced
pub(crate) enum RxTake {
    /// A complete frame of the given length was copied out and its buffer
    /// recycled
    Frame(usize),
    /// A malformed completion was discarded and its buffer recycled
    Skipped,
    /// Nothing completed
    Empty,
}

impl PortIo {
    /// Post RX buffers to hardware until the queue is full (initial fill).
    /// A list-element table of size N takes N - 1; the spare buffers stay
    /// unposted.
    fn fill_rx(&mut self) -> Result<()> {
        for i in 0..self.rx_bufs.count {
            let pkt = self.pool.alloc().ok_or(EngineError::PoolExhausted)?;
            let addr = self.rx_bufs.addr(i);
            self.pool
                .add_fragment(pkt, addr, BUF_SIZE as u16)
                .ok_or(EngineError::PoolExhausted)?;
            let posted = match &mut self.rx {
                RxQueue::Ring(ring) => ring.post_to_hardware(BufferRef {
                    addr,
                    len: BUF_SIZE as u16,
                    cookie: pkt,
                }),
                RxQueue::Table(table) => match table.reserve(1 + ADDR64_OVERHEAD) {
                    Ok(_) => table.commit(OP_PACKET, addr, BUF_SIZE as u16, true),
                    Err(err) => Err(err),
                },
            };
            match posted {
                Ok(()) => self.pool.push_working_rx(pkt),
                Err(EngineError::RingFull) | Err(EngineError::TableFull) => {
                    self.pool.release(pkt);
                    break;
                }
                Err(err) => {
                    self.pool.release(pkt);
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Take one completed RX frame into `buf` and recycle its buffer.
    /// Descriptor-ring path only; table completions arrive via the status
    /// ring instead.
    fn rx_take_one(&mut self, buf: &mut [u8]) -> RxTake {
        let RxQueue::Ring(ring) = &mut self.rx else {
            return RxTake::Empty;
        };

        let Some(done) = ring.reclaim_completed().next() else {
            return RxTake::Empty;
        };
        let Some(pkt) = self.pool.pop_working_rx() else {
            return RxTake::Empty;
        };
        debug_assert_eq!(pkt, done.cookie);

        let frag_idx = self.pool.packet(pkt).frag_head;
        debug_assert_ne!(frag_idx, NIL);
        let frag = *self.pool.fragment(frag_idx);

        let len = done.len as usize;
        let good = done.is_complete_frame() && len >= ETH_HEADER_SIZE && len <= MAX_FRAME_LEN;
        if good {
            // Identity-mapped DMA buffer, disjoint from every other buffer.
            let src =
                unsafe { core::slice::from_raw_parts(frag.phys as *const u8, len) };
            buf[..len].copy_from_slice(src);
        }

        // Recycle regardless of frame validity.
        let repost = ring.post_to_hardware(BufferRef {
            addr: frag.phys,
            len: BUF_SIZE as u16,
            cookie: pkt,
        });
        debug_assert!(repost.is_ok());
        self.pool.push_working_rx(pkt);

        if good {
            RxTake::Frame(len)
        } else {
            RxTake::Skipped
        }
    }

    /// Reclaim finished TX buffers, then feed waiting packets into the
    /// freed slots. Descriptor-ring path.
    fn tx_reclaim_and_kick(&mut self) -> usize {
        let TxQueue::Ring(ring) = &mut self.tx else {
            return 0;
        };

        let mut freed = 0;
        while let Some(done) = ring.reclaim_completed().next() {
            let Some(pkt) = self.pool.pop_working_tx() else {
                break;
            };
            debug_assert_eq!(pkt, done.cookie);
            self.pool.release(pkt);
            freed += 1;
        }

        // Slots opened up; move waiting packets onto the ring.
        while ring.free_slots() > 0 {
            let Some(pkt) = self.pool.pop_waiting() else {
                break;
            };
            let frag_idx = self.pool.packet(pkt).frag_head;
            let frag = *self.pool.fragment(frag_idx);
            let posted = ring.post_to_hardware(BufferRef {
                addr: frag.phys,
                len: frag.len,
                cookie: pkt,
            });
            debug_assert!(posted.is_ok());
            self.pool.push_working_tx(pkt);
        }
        freed
    }

    /// Release TX packets covered by a status-ring done report, then feed
    /// waiting packets into the freed slots. Table path.
    ///
    /// Returns the put index to ring when waiting packets were committed.
    fn tx_complete_to(&mut self, new_done: u16) -> Result<Option<u16>> {
        let TxQueue::Table(table) = &mut self.tx else {
            return Err(EngineError::BadDoneIndex);
        };

        let old_done = table.done_index();
        let size = table.size();
        table.mark_done(new_done)?;
        let advance = ring_distance(old_done, new_done, size);

        while let Some(pkt) = self.pool.working_tx.peek_front() {
            let next_le = self.pool.packet(pkt).next_le;
            let covered = ring_distance(old_done, next_le, size);
            if covered == 0 || covered > advance {
                break;
            }
            let pkt = match self.pool.pop_working_tx() {
                Some(p) => p,
                None => break,
            };
            self.pool.release(pkt);
        }

        // Freed slots take queued supervisor frames first.
        let mut flushed = false;
        while table.reserve(1 + ADDR64_OVERHEAD).is_ok() {
            let Some(pkt) = self.pool.pop_waiting() else {
                break;
            };
            let frag = *self.pool.fragment(self.pool.packet(pkt).frag_head);
            // Commit cannot fail after a successful reserve.
            let committed = table.commit(OP_PACKET, frag.phys, frag.len, true);
            debug_assert!(committed.is_ok());
            self.pool.packet_mut(pkt).next_le = table.put_index();
            self.pool.push_working_tx(pkt);
            flushed = true;
        }
        Ok(if flushed { Some(table.put_index()) } else { None })
    }
}

/// State shared by the slow paths, one lock around all of it
struct SlowPath<F: AddressFilter> {
    rlmt: Rlmt,
    events: EventQueue,
    filter: F,
}

/// One attached adapter
pub struct AdapterContext<H: HardwareIo, S: FrameSink, F: AddressFilter> {
    chip: ChipGeneration,
    num_ports: usize,
    state: AtomicU8,
    hw: Mutex<H>,
    sink: Mutex<S>,
    ports: [Mutex<Option<PortIo>>; MAX_PORTS],
    /// Second-generation completion reporting; `None` on ring chips
    status: Mutex<Option<StatusRing>>,
    slow: Mutex<SlowPath<F>>,
}

impl<H: HardwareIo, S: FrameSink, F: AddressFilter> AdapterContext<H, S, F> {
    /// Carve `region` into rings, tables and buffers and lay out the whole
    /// adapter. Interrupts stay masked until [`Self::start`].
    ///
    /// # Safety
    ///
    /// `region` must be valid, identity-mapped, DMA-coherent memory that
    /// outlives the context and is shared only with the device.
    pub unsafe fn attach(
        config: AdapterConfig,
        region: MemoryRegion,
        mut hw: H,
        mut filter: F,
        sink: S,
    ) -> Result<Self> {
        if config.num_ports == 0 || config.num_ports > MAX_PORTS {
            return Err(EngineError::BadPort);
        }

        hw.mask_all();
        let mut arena = DmaArena::new(region)?;
        let use_les = config.chip.uses_list_elements();

        let mut ports: [Option<PortIo>; MAX_PORTS] = [None, None];
        for (port, slot) in ports.iter_mut().enumerate().take(config.num_ports) {
            let record = if use_les { LE_SIZE } else { DESC_SIZE };
            let tx_area = arena.carve_ring(config.tx_ring_size as usize, record)?;
            let rx_area = arena.carve_ring(config.rx_ring_size as usize, record)?;
            let tx_bufs = arena.carve_buffers(POOL_PACKETS, BUF_SIZE)?;
            let rx_bufs = arena.carve_buffers(config.rx_ring_size as usize, BUF_SIZE)?;

            let (tx, rx) = if use_les {
                (
                    TxQueue::Table(LeTable::setup(tx_area, config.tx_ring_size)?),
                    RxQueue::Table(LeTable::setup(rx_area, config.rx_ring_size)?),
                )
            } else {
                (
                    TxQueue::Ring(DescRing::setup(tx_area, config.tx_ring_size)?),
                    RxQueue::Ring(DescRing::setup(rx_area, config.rx_ring_size)?),
                )
            };

            let mut io = PortIo {
                tx,
                rx,
                pool: PacketPool::new(),
                tx_bufs: BufArea {
                    base: tx_bufs.base,
                    count: POOL_PACKETS as u16,
                },
                rx_bufs: BufArea {
                    base: rx_bufs.base,
                    count: config.rx_ring_size,
                },
            };
            io.fill_rx()?;

            filter.override_unicast(port, config.macs[port]);
            filter.add_multicast(port, MacAddress::RLMT_MCAST, true);
            filter.update_hardware_filters(port);

            *slot = Some(io);
        }

        let status = if use_les {
            let area = arena.carve_ring(STATUS_RING_SIZE as usize, LE_SIZE)?;
            Some(StatusRing::setup(area, STATUS_RING_SIZE)?)
        } else {
            None
        };

        let rlmt = Rlmt::new(config.rlmt, &config.macs[..config.num_ports]);
        let [p0, p1] = ports;

        log_info!("adapter attached", config.num_ports);
        Ok(Self {
            chip: config.chip,
            num_ports: config.num_ports,
            state: AtomicU8::new(AdapterState::Attached as u8),
            hw: Mutex::new(hw),
            sink: Mutex::new(sink),
            ports: [Mutex::new(p0), Mutex::new(p1)],
            status: Mutex::new(status),
            slow: Mutex::new(SlowPath {
                rlmt,
                events: EventQueue::new(),
                filter,
            }),
        })
    }

    pub fn state(&self) -> AdapterState {
        AdapterState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn chip(&self) -> ChipGeneration {
        self.chip
    }

    pub fn num_ports(&self) -> usize {
        self.num_ports
    }

    /// Currently active port, if the supervisor picked one.
    pub fn active_port(&self) -> Option<u8> {
        self.slow.lock().rlmt.active().map(|p| p.index() as u8)
    }

    /// Start traffic: rings running, supervisor started, interrupts open.
    pub fn start(&self, now: u64) -> Result<()> {
        if self.state() == AdapterState::Failed {
            return Err(EngineError::Failed);
        }

        {
            let mut hw = self.hw.lock();
            for port in 0..self.num_ports as u8 {
                hw.issue_ring_command(RingId::rx(port), RingCommand::Start);
                hw.issue_ring_command(RingId::tx(port), RingCommand::Start);
            }
        }

        {
            let mut slow = self.slow.lock();
            let mut actions = ActionList::new();
            slow.rlmt.start(now, &mut actions);
            self.apply_actions(&mut slow, &actions);
        }

        self.hw.lock().unmask(crate::hw::IRQ_ALL_MASK);
        self.state
            .store(AdapterState::Running as u8, Ordering::Release);
        log_info!("adapter started");
        Ok(())
    }

    /// Stop traffic and mask interrupts; memory layout survives.
    pub fn stop(&self) {
        self.hw.lock().mask_all();
        {
            let mut slow = self.slow.lock();
            let mut actions = ActionList::new();
            slow.rlmt.stop(&mut actions);
        }
        {
            let mut hw = self.hw.lock();
            for port in 0..self.num_ports as u8 {
                hw.issue_ring_command(RingId::rx(port), RingCommand::Stop);
                hw.issue_ring_command(RingId::tx(port), RingCommand::Stop);
            }
        }
        if self.state() != AdapterState::Failed {
            self.state
                .store(AdapterState::Attached as u8, Ordering::Release);
        }
        log_info!("adapter stopped");
    }

    /// Mark the adapter dead after an unrecoverable hardware error.
    pub(crate) fn enter_failed(&self, detail: u32) {
        self.hw.lock().mask_all();
        self.state
            .store(AdapterState::Failed as u8, Ordering::Release);
        log_error!("fatal hardware error", detail);
        self.sink.lock().report_link_status(false);
    }

    // ========================================================================
    // Transmit
    // ========================================================================

    /// Copy `frame` into a pool buffer and hand it to hardware.
    ///
    /// [`TxStatus::Backpressure`] means the pool or the ring is full; the
    /// caller retries after the next completion interrupt.
    pub fn submit_for_transmit(&self, port: u8, frame: &[u8]) -> Result<TxStatus> {
        if self.state() != AdapterState::Running {
            return Err(EngineError::NotRunning);
        }
        if port as usize >= self.num_ports {
            return Err(EngineError::BadPort);
        }
        if frame.len() > MAX_FRAME_LEN {
            return Err(EngineError::FrameTooLarge);
        }
        EthernetFrame::new_checked(frame).map_err(|_| EngineError::FrameTooShort)?;

        let mut guard = self.ports[port as usize].lock();
        let io = guard.as_mut().ok_or(EngineError::BadPort)?;

        let Some(pkt) = io.pool.alloc() else {
            return Ok(TxStatus::Backpressure);
        };

        let buf = unsafe { io.tx_bufs.slice_mut(pkt, frame.len()) };
        buf[..frame.len()].copy_from_slice(frame);
        let addr = io.tx_bufs.addr(pkt);

        if io
            .pool
            .add_fragment(pkt, addr, frame.len() as u16)
            .is_none()
        {
            io.pool.release(pkt);
            return Ok(TxStatus::Backpressure);
        }

        match &mut io.tx {
            TxQueue::Ring(ring) => {
                if ring
                    .post_to_hardware(BufferRef {
                        addr,
                        len: frame.len() as u16,
                        cookie: pkt,
                    })
                    .is_err()
                {
                    io.pool.release(pkt);
                    return Ok(TxStatus::Backpressure);
                }
                io.pool.push_working_tx(pkt);
                drop(guard);
                self.hw
                    .lock()
                    .issue_ring_command(RingId::tx(port), RingCommand::Start);
            }
            TxQueue::Table(table) => {
                if table.reserve(1 + ADDR64_OVERHEAD).is_err() {
                    io.pool.release(pkt);
                    return Ok(TxStatus::Backpressure);
                }
                table.commit(OP_PACKET, addr, frame.len() as u16, true)?;
                io.pool.packet_mut(pkt).next_le = table.put_index();
                let put = table.put_index();
                io.pool.push_working_tx(pkt);
                drop(guard);
                self.hw.lock().ring_doorbell(RingId::tx(port), put);
            }
        }

        Ok(TxStatus::Accepted)
    }

    /// Transmit an engine-internal frame (supervisor probe).
    ///
    /// Unlike host submissions these must not be dropped on a full ring;
    /// they wait on the pool's waiting queue and ride out with the next
    /// completion.
    fn internal_send(&self, port: u8, frame: &[u8]) {
        if port as usize >= self.num_ports {
            return;
        }
        let mut guard = self.ports[port as usize].lock();
        let Some(io) = guard.as_mut() else {
            return;
        };

        let Some(pkt) = io.pool.alloc() else {
            log_warn!("probe dropped, pool empty", port);
            return;
        };
        let buf = unsafe { io.tx_bufs.slice_mut(pkt, frame.len()) };
        buf[..frame.len()].copy_from_slice(frame);
        let addr = io.tx_bufs.addr(pkt);
        if io
            .pool
            .add_fragment(pkt, addr, frame.len() as u16)
            .is_none()
        {
            io.pool.release(pkt);
            log_warn!("probe dropped, fragments exhausted", port);
            return;
        }

        match &mut io.tx {
            TxQueue::Ring(ring) => {
                if ring
                    .post_to_hardware(BufferRef {
                        addr,
                        len: frame.len() as u16,
                        cookie: pkt,
                    })
                    .is_ok()
                {
                    io.pool.push_working_tx(pkt);
                    drop(guard);
                    self.hw
                        .lock()
                        .issue_ring_command(RingId::tx(port), RingCommand::Start);
                } else {
                    io.pool.push_waiting(pkt);
                }
            }
            TxQueue::Table(table) => {
                if table.reserve(1 + ADDR64_OVERHEAD).is_ok() {
                    // Commit cannot fail after a successful reserve.
                    let committed =
                        table.commit(OP_PACKET, addr, frame.len() as u16, true);
                    debug_assert!(committed.is_ok());
                    io.pool.packet_mut(pkt).next_le = table.put_index();
                    let put = table.put_index();
                    io.pool.push_working_tx(pkt);
                    drop(guard);
                    self.hw.lock().ring_doorbell(RingId::tx(port), put);
                } else {
                    io.pool.push_waiting(pkt);
                }
            }
        }
    }

    /// Service TX completions on one port (fast interrupt path).
    pub(crate) fn service_tx(&self, port: u8) {
        let freed = {
            let mut guard = self.ports[port as usize].lock();
            match guard.as_mut() {
                Some(io) => io.tx_reclaim_and_kick(),
                None => 0,
            }
        };
        if freed > 0 {
            self.hw
                .lock()
                .issue_ring_command(RingId::tx(port), RingCommand::ClearIrq);
        }
    }

    /// Service RX completions on one port (fast interrupt path).
    ///
    /// Returns the number of frames taken off the ring (delivered or
    /// discarded), so the dispatcher can decide whether another pass is
    /// worth it.
    pub(crate) fn service_rx(&self, port: u8, now: u64) -> usize {
        let mut taken = 0;
        loop {
            let mut frame_buf = [0u8; MAX_FRAME_LEN];
            let take = {
                let mut guard = self.ports[port as usize].lock();
                match guard.as_mut() {
                    Some(io) => io.rx_take_one(&mut frame_buf),
                    None => RxTake::Empty,
                }
            };
            match take {
                RxTake::Empty => break,
                RxTake::Skipped => {
                    taken += 1;
                    log_warn!("malformed rx frame discarded", port);
                }
                RxTake::Frame(len) => {
                    taken += 1;
                    self.handle_rx_frame(port, &frame_buf[..len], now);
                }
            }
        }
        if taken > 0 {
            self.hw
                .lock()
                .issue_ring_command(RingId::rx(port), RingCommand::ClearIrq);
        }
        taken
    }

    /// Run one received frame past the supervisor, then deliver it upward
    /// unless the supervisor consumed it or the port is standby.
    fn handle_rx_frame(&self, port: u8, frame: &[u8], now: u64) {
        let deliver = {
            let mut slow = self.slow.lock();
            let mut actions = ActionList::new();
            slow.rlmt
                .rx_frame(PortNum(port), frame, now, &mut actions);
            let consumed = Self::supervisor_consumes(&slow.rlmt, frame);
            let standby = slow.rlmt.is_running()
                && slow.rlmt.active() != Some(PortNum(port));
            self.apply_actions(&mut slow, &actions);
            !consumed && !standby
        };

        if deliver {
            self.sink.lock().deliver_received(port, frame);
        }
    }

    /// Frames the supervisor owns: its own probe multicast and, when the
    /// segmentation check is on, spanning-tree BPDUs.
    fn supervisor_consumes(rlmt: &Rlmt, frame: &[u8]) -> bool {
        let Ok(parsed) = frames::parse(frame) else {
            return false;
        };
        match parsed.kind {
            redlink_rlmt::FrameKind::Probe { .. } => true,
            redlink_rlmt::FrameKind::Bpdu { .. } => rlmt.mode().checks_segmentation(),
            redlink_rlmt::FrameKind::Other => parsed.da == MacAddress::RLMT_MCAST,
        }
    }

    // ========================================================================
    // Status ring (second generation)
    // ========================================================================

    /// Drain the status ring: TX done indices and RX frame reports.
    /// Returns the number of status elements consumed.
    pub(crate) fn drain_status(&self, now: u64) -> usize {
        let mut consumed = 0;
        loop {
            let event = self.status.lock().as_mut().and_then(|s| s.poll());
            let Some(event) = event else {
                break;
            };
            consumed += 1;
            match event {
                crate::ring::StatusEvent::TxDone { port, done } => {
                    if (port as usize) < self.num_ports {
                        let mut guard = self.ports[port as usize].lock();
                        if let Some(io) = guard.as_mut() {
                            match io.tx_complete_to(done) {
                                Err(_) => {
                                    drop(guard);
                                    log_error!("corrupt tx done index", done as u64);
                                }
                                Ok(flushed_put) => {
                                    drop(guard);
                                    let mut hw = self.hw.lock();
                                    if let Some(put) = flushed_put {
                                        hw.ring_doorbell(RingId::tx(port), put);
                                    }
                                    hw.issue_ring_command(RingId::tx(port), RingCommand::ClearIrq);
                                }
                            }
                        }
                    }
                }
                crate::ring::StatusEvent::RxFrame { port, len, ok } => {
                    self.status_rx_frame(port, len, ok, now);
                    if (port as usize) < self.num_ports {
                        self.hw
                            .lock()
                            .issue_ring_command(RingId::rx(port), RingCommand::ClearIrq);
                    }
                }
                crate::ring::StatusEvent::Unknown { opcode } => {
                    log_warn!("unknown status opcode", opcode);
                }
            }
        }
        consumed
    }

    /// One frame landed in the oldest posted RX buffer of `port`.
    fn status_rx_frame(&self, port: u8, len: u16, ok: bool, now: u64) {
        if port as usize >= self.num_ports {
            return;
        }
        let mut frame_buf = [0u8; MAX_FRAME_LEN];
        let taken = {
            let mut guard = self.ports[port as usize].lock();
            let Some(io) = guard.as_mut() else {
                return;
            };
            let RxQueue::Table(table) = &mut io.rx else {
                return;
            };

            let Some(pkt) = io.pool.pop_working_rx() else {
                return;
            };
            let frag = *io.pool.fragment(io.pool.packet(pkt).frag_head);
            let size = table.size();
            let next = (table.done_index() + 1) % size;
            if table.mark_done(next).is_err() {
                io.pool.push_working_rx(pkt);
                return;
            }

            let len = len as usize;
            let good = ok && len >= ETH_HEADER_SIZE && len <= MAX_FRAME_LEN;
            if good {
                let src =
                    unsafe { core::slice::from_raw_parts(frag.phys as *const u8, len) };
                frame_buf[..len].copy_from_slice(src);
            }

            // Recycle the buffer: new list element, back on working RX.
            if table.reserve(1 + ADDR64_OVERHEAD).is_ok() {
                let committed = table.commit(OP_PACKET, frag.phys, BUF_SIZE as u16, true);
                debug_assert!(committed.is_ok());
            }
            io.pool.push_working_rx(pkt);
            if good {
                Some(len)
            } else {
                None
            }
        };

        if let Some(len) = taken {
            self.handle_rx_frame(port, &frame_buf[..len], now);
        } else {
            log_warn!("bad rx status discarded", port);
        }
    }

    // ========================================================================
    // Register helpers for the dispatcher
    // ========================================================================

    pub(crate) fn read_isr(&self) -> u32 {
        self.hw.lock().read_register(crate::hw::REG_ISR)
    }

    pub(crate) fn hw_error_detail(&self) -> u32 {
        self.hw.lock().read_register(crate::hw::REG_HW_ERR)
    }

    pub(crate) fn link_status(&self, port: u8) -> u32 {
        self.hw
            .lock()
            .read_register(crate::hw::REG_LINK_STATUS_BASE + port as u32 * 4)
    }

    pub(crate) fn mask_irqs(&self) {
        self.hw.lock().mask_all();
    }

    pub(crate) fn unmask_irqs(&self) {
        self.hw.lock().unmask(crate::hw::IRQ_ALL_MASK);
    }

    // ========================================================================
    // Events and the slow path
    // ========================================================================

    /// Queue a deferred event (interrupt context safe).
    pub(crate) fn post_event(&self, event: Event) {
        self.slow.lock().events.post(event);
    }

    /// Drain and act on every queued event. Never reentered; the caller
    /// serializes on the slow-path lock acquisition inside.
    pub(crate) fn process_events(&self, now: u64) {
        loop {
            let mut slow = self.slow.lock();
            let Some(event) = slow.events.pop() else {
                break;
            };

            let mut actions = ActionList::new();
            match event.code {
                EventCode::LinkUp => {
                    log_info!("link up", event.port);
                    slow.rlmt.link_up(PortNum(event.port), now, &mut actions);
                }
                EventCode::LinkDown => {
                    log_info!("link down", event.port);
                    slow.rlmt.link_down(PortNum(event.port), now, &mut actions);
                }
                EventCode::Timer => {
                    slow.rlmt.tick(now, &mut actions);
                }
                EventCode::QueueKick => {
                    drop(slow);
                    self.service_tx(event.port);
                    continue;
                }
                EventCode::AddressOverride => {
                    slow.filter.update_hardware_filters(event.port as usize);
                }
                EventCode::HardwareError => {
                    drop(slow);
                    self.enter_failed(event.param);
                    continue;
                }
            }
            self.apply_actions(&mut slow, &actions);
        }
    }

    /// Report a carrier change observed by the PHY.
    pub fn link_event(&self, port: u8, up: bool, now: u64) {
        let code = if up {
            EventCode::LinkUp
        } else {
            EventCode::LinkDown
        };
        self.post_event(Event::new(code, port, 0));
        self.process_events(now);
    }

    /// Record the autonegotiation outcome for a port.
    pub fn set_autoneg(&self, port: u8, ok: bool) {
        self.slow.lock().rlmt.set_autoneg(PortNum(port), ok);
    }

    /// Host timer tick; drives the supervisor's timers.
    pub fn timer_tick(&self, now: u64) {
        self.post_event(Event::new(EventCode::Timer, 0, 0));
        self.process_events(now);
    }

    /// Perform the work the supervisor asked for.
    fn apply_actions(&self, slow: &mut SlowPath<F>, actions: &ActionList) {
        for action in actions.iter() {
            match *action {
                RlmtAction::SendProbe { port } => {
                    self.send_probe(&slow.rlmt, port, ProbeKind::Alive, MacAddress::RLMT_MCAST);
                }
                RlmtAction::SendLineCheck { port, to } => {
                    self.send_probe(&slow.rlmt, port, ProbeKind::LineCheck, to);
                }
                RlmtAction::SendLineCheckAck { port, to } => {
                    self.send_probe(&slow.rlmt, port, ProbeKind::LineCheckAck, to);
                }
                RlmtAction::SendBridgeProbe { port } => {
                    let Some(p) = slow.rlmt.port(port) else {
                        continue;
                    };
                    let mut buf = [0u8; MIN_FRAME_SIZE];
                    let root = redlink_rlmt::BridgeId::new([0; 8]);
                    if let Ok(len) = frames::build_bridge_probe(&mut buf, p.mac, root) {
                        self.internal_send(port.index() as u8, &buf[..len]);
                    }
                }
                RlmtAction::Switch { from, to, kind } => {
                    self.apply_switch(&mut slow.filter, from, to, kind);
                }
                RlmtAction::NetUp => {
                    log_info!("net up");
                    self.sink.lock().report_link_status(true);
                }
                RlmtAction::NetDown => {
                    log_warn!("net down");
                    self.sink.lock().report_link_status(false);
                }
                RlmtAction::SegmentationDetected => {
                    log_warn!("network segmentation detected");
                }
                RlmtAction::DuplicateMac { port } => {
                    log_warn!("duplicate mac address seen", port.index() as u64);
                }
                RlmtAction::ConsistencyError => {
                    log_error!("no usable port after link event");
                }
            }
        }
    }

    fn send_probe(&self, rlmt: &Rlmt, port: PortNum, kind: ProbeKind, da: MacAddress) {
        let Some(p) = rlmt.port(port) else {
            return;
        };
        let mut buf = [0u8; MIN_FRAME_SIZE];
        if let Ok(len) = frames::build_probe(&mut buf, da, p.mac, kind, p.nonce) {
            self.internal_send(port.index() as u8, &buf[..len]);
        }
    }

    /// Move traffic from one port to another: exchange unicast addresses,
    /// reprogram filters, restart the incoming port's queues on a hard
    /// switch.
    fn apply_switch(
        &self,
        filter: &mut F,
        from: Option<PortNum>,
        to: PortNum,
        kind: SwitchKind,
    ) {
        let to_idx = to.index();
        if let Some(from) = from {
            filter.swap(from.index(), to_idx);
            filter.update_hardware_filters(from.index());
        }
        filter.update_hardware_filters(to_idx);

        let mut hw = self.hw.lock();
        if kind == SwitchKind::Hard {
            hw.issue_ring_command(RingId::rx(to_idx as u8), RingCommand::Stop);
            hw.issue_ring_command(RingId::tx(to_idx as u8), RingCommand::Stop);
            hw.issue_ring_command(RingId::rx(to_idx as u8), RingCommand::Start);
            hw.issue_ring_command(RingId::tx(to_idx as u8), RingCommand::Start);
        }
        drop(hw);

        match kind {
            SwitchKind::Hard => log_info!("hard switch to port", to_idx as u64),
            SwitchKind::Soft => log_info!("soft switch to port", to_idx as u64),
        }
    }
}
