// Copyright (C) 2026 Mudskipper Project
//
// MIT License

//! Bit-exact simulated SWD target.
//!
//! [`TargetSim`] implements [`SwdIo`] as a SW-DP state machine fed by clock
//! edges: it parses request bytes off the wire, answers acknowledges, runs
//! the 33-bit data phases, and models an AHB-AP in front of a small RAM plus
//! the Cortex-M core debug block.  Knobs allow WAIT/FAULT/parity injection,
//! and counters let tests assert exactly what reached the wire.

#![allow(dead_code)]

use std::cell::{Ref, RefCell, RefMut};
use std::collections::BTreeMap;
use std::rc::Rc;

use mudskipper_bin::{CMD_CONNECT, MAX_COMMAND_SIZE, RC_OK};
use mudskipper_swd::CommandProcessor;
use mudskipper_swd::protocol::SwdIo;

/// Cortex-M4 SW-DP IDCODE
pub const SIM_IDCODE: u32 = 0x2BA01477;

/// Reset value of AP.CSW; the top byte is the device-dependent part the
/// probe samples.
pub const SIM_CSW_RESET: u32 = 0x23000040;

/// Device-dependent top byte of [`SIM_CSW_RESET`].
pub const SIM_CSW_DEVICE_BITS: u8 = 0x23;

const ACK_OK: u8 = 0b001;
const ACK_WAIT: u8 = 0b010;
const ACK_FAULT: u8 = 0b100;
const ACK_NONE: u8 = 0b111;

const DHCSR: u32 = 0xE000_EDF0;
const DCRSR: u32 = 0xE000_EDF4;
const DCRDR: u32 = 0xE000_EDF8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Request {
    ap: bool,
    read: bool,
    a: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Watching for a start bit (and the reset/switch sequences).
    Idle,
    /// Collecting the remaining request bits.
    Request { bits: u8, count: u8 },
    /// Waiting for the host's turnaround edge before the acknowledge.
    AckTurn { req: Request },
    /// Driving the three acknowledge bits.
    Ack { req: Request, ack: u8, sent: u8 },
    /// Driving 32 data bits plus parity.
    ReadData { bits: u64, remaining: u8 },
    /// Waiting for the host's turnaround edge before its data phase.
    WriteTurn { req: Request },
    /// Collecting 32 host data bits plus parity.
    WriteData { req: Request, bits: u64, count: u8 },
    /// Waiting for the turnaround edge that follows a non-OK acknowledge.
    ErrorTurn,
}

pub struct TargetSim {
    // Pin state
    swclk: bool,
    host_level: bool,
    host_drives: bool,
    sim_bit: bool,

    // Wire protocol state
    state: State,
    ones_run: u32,
    seq: u16,
    reset_armed: bool,
    switch_seen: bool,
    swd_active: bool,

    // DP/AP state
    idcode: u32,
    ctrl_stat: u32,
    select: u32,
    rdbuff: u32,
    csw: u32,
    tar: u32,
    sticky_err: bool,

    // Target memory and core debug block
    mem: BTreeMap<u32, u32>,
    core_regs: BTreeMap<u8, u32>,
    dhcsr_ctrl: u32,
    dcrdr: u32,
    regrdy: bool,

    // Injection knobs
    pub present: bool,
    pub wait_responses: u32,
    pub fault_next: bool,
    pub corrupt_next_parity: bool,
    pub regrdy_stuck: bool,

    // Observability
    pub rising_edges: u64,
    pub drw_reads: u32,
    pub rdbuff_reads: u32,
    pub write_parity_errors: u32,
    pub csw_writes: Vec<u32>,
    pub select_writes: Vec<u32>,
    pub abort_writes: Vec<u32>,
    pub dhcsr_writes: Vec<u32>,
    pub dcrsr_writes: Vec<u32>,
}

impl TargetSim {
    pub fn new() -> Self {
        TargetSim {
            swclk: false,
            host_level: false,
            host_drives: false,
            sim_bit: true,
            state: State::Idle,
            ones_run: 0,
            seq: 0,
            reset_armed: false,
            switch_seen: false,
            swd_active: false,
            idcode: SIM_IDCODE,
            ctrl_stat: 0,
            select: 0,
            rdbuff: 0,
            csw: SIM_CSW_RESET,
            tar: 0,
            sticky_err: false,
            mem: BTreeMap::new(),
            core_regs: BTreeMap::new(),
            dhcsr_ctrl: 0,
            dcrdr: 0,
            regrdy: false,
            present: true,
            wait_responses: 0,
            fault_next: false,
            corrupt_next_parity: false,
            regrdy_stuck: false,
            rising_edges: 0,
            drw_reads: 0,
            rdbuff_reads: 0,
            write_parity_errors: 0,
            csw_writes: Vec::new(),
            select_writes: Vec::new(),
            abort_writes: Vec::new(),
            dhcsr_writes: Vec::new(),
            dcrsr_writes: Vec::new(),
        }
    }

    /// SWCLK high with SWDIO released by the host: the resting line state.
    pub fn line_idle(&self) -> bool {
        self.swclk && !self.host_drives
    }

    pub fn swd_active(&self) -> bool {
        self.swd_active
    }

    pub fn sticky_err(&self) -> bool {
        self.sticky_err
    }

    /// Target memory word at an aligned address (no wire side effects).
    pub fn mem_word(&self, addr: u32) -> u32 {
        self.mem.get(&(addr & !3)).copied().unwrap_or(0)
    }

    pub fn set_mem_word(&mut self, addr: u32, value: u32) {
        self.mem.insert(addr & !3, value);
    }

    pub fn core_reg(&self, reg: u8) -> u32 {
        self.core_regs.get(&reg).copied().unwrap_or(0)
    }

    pub fn set_core_reg(&mut self, reg: u8, value: u32) {
        self.core_regs.insert(reg, value);
    }

    /// Preload the DHCSR control bits (e.g. C_MASKINTS) before a test.
    pub fn set_dhcsr_ctrl(&mut self, ctrl: u32) {
        self.dhcsr_ctrl = ctrl;
    }

    pub fn dhcsr_ctrl(&self) -> u32 {
        self.dhcsr_ctrl
    }

    fn on_rising_edge(&mut self) {
        self.rising_edges += 1;
        let host_bit = self.host_level;

        match self.state {
            State::Idle => {
                if self.host_drives {
                    self.track_sequences(host_bit);
                    if host_bit {
                        // Possible start bit; collect the rest of the byte
                        self.state = State::Request { bits: 1, count: 1 };
                    }
                }
            }

            State::Request { mut bits, mut count } => {
                self.track_sequences(host_bit);
                if host_bit {
                    bits |= 1 << count;
                }
                count += 1;
                if count < 8 {
                    self.state = State::Request { bits, count };
                } else if let Some(req) = decode_request(bits) {
                    self.state = State::AckTurn { req };
                } else {
                    // Not a request (reset sequence traffic or noise)
                    self.state = State::Idle;
                }
            }

            State::AckTurn { req } => {
                let ack = self.decide_ack(req);
                self.sim_bit = ack & 1 != 0;
                self.state = State::Ack { req, ack, sent: 1 };
            }

            State::Ack { req, ack, sent } => {
                if sent < 3 {
                    self.sim_bit = (ack >> sent) & 1 != 0;
                    self.state = State::Ack {
                        req,
                        ack,
                        sent: sent + 1,
                    };
                } else if ack == ACK_OK && req.read {
                    let value = self.transact_read(req);
                    let mut parity = (value.count_ones() % 2 == 1) as u64;
                    if self.corrupt_next_parity {
                        self.corrupt_next_parity = false;
                        parity ^= 1;
                    }
                    let bits = value as u64 | (parity << 32);
                    self.sim_bit = bits & 1 != 0;
                    self.state = State::ReadData {
                        bits: bits >> 1,
                        remaining: 32,
                    };
                } else if ack == ACK_OK {
                    self.state = State::WriteTurn { req };
                } else {
                    self.state = State::ErrorTurn;
                }
            }

            State::ReadData { mut bits, remaining } => {
                if remaining > 0 {
                    self.sim_bit = bits & 1 != 0;
                    bits >>= 1;
                    self.state = State::ReadData {
                        bits,
                        remaining: remaining - 1,
                    };
                } else {
                    self.sim_bit = true;
                    self.state = State::Idle;
                }
            }

            State::WriteTurn { req } => {
                self.state = State::WriteData {
                    req,
                    bits: 0,
                    count: 0,
                };
            }

            State::WriteData {
                req,
                mut bits,
                mut count,
            } => {
                if host_bit {
                    bits |= 1 << count;
                }
                count += 1;
                if count < 33 {
                    self.state = State::WriteData { req, bits, count };
                } else {
                    let value = bits as u32;
                    let parity = (bits >> 32) & 1;
                    if (value.count_ones() % 2 == 1) as u64 != parity {
                        self.write_parity_errors += 1;
                    }
                    self.transact_write(req, value);
                    self.state = State::Idle;
                }
            }

            State::ErrorTurn => {
                self.sim_bit = true;
                self.state = State::Idle;
            }
        }
    }

    // Line reset and JTAG->SWD switch detection, fed every host-driven bit
    // regardless of what the request parser thinks is happening.
    fn track_sequences(&mut self, bit: bool) {
        if bit {
            self.ones_run += 1;
        } else {
            self.ones_run = 0;
        }
        self.seq = (self.seq >> 1) | ((bit as u16) << 15);

        if self.reset_armed && self.seq == 0xE79E {
            self.switch_seen = true;
        }
        if self.ones_run >= 50 {
            self.reset_armed = true;
            if self.switch_seen {
                // Line reset after the switch word: SWD selected
                self.swd_active = true;
                self.switch_seen = false;
                self.select = 0;
                self.rdbuff = 0;
                self.state = State::Idle;
            }
        }
    }

    fn decide_ack(&mut self, req: Request) -> u8 {
        if !self.present || !self.swd_active {
            return ACK_NONE;
        }
        if self.wait_responses > 0 {
            self.wait_responses -= 1;
            return ACK_WAIT;
        }
        if self.fault_next {
            self.fault_next = false;
            self.sticky_err = true;
            return ACK_FAULT;
        }
        // A latched sticky error faults AP traffic until ABORT clears it
        if self.sticky_err && req.ap {
            return ACK_FAULT;
        }
        ACK_OK
    }

    fn transact_read(&mut self, req: Request) -> u32 {
        if req.ap {
            // Posted: hand back the previous result, bank the new one
            let previous = self.rdbuff;
            let current = self.ap_read(req.a);
            self.rdbuff = current;
            previous
        } else {
            self.dp_read(req.a)
        }
    }

    fn transact_write(&mut self, req: Request, value: u32) {
        if req.ap {
            self.ap_write(req.a, value);
        } else {
            self.dp_write(req.a, value);
        }
    }

    fn dp_read(&mut self, a: u8) -> u32 {
        match a {
            0 => self.idcode,
            1 => {
                let mut value = self.ctrl_stat;
                if self.sticky_err {
                    value |= 1 << 5;
                }
                value
            }
            2 => self.rdbuff,
            _ => {
                self.rdbuff_reads += 1;
                self.rdbuff
            }
        }
    }

    fn dp_write(&mut self, a: u8, value: u32) {
        match a {
            0 => {
                self.abort_writes.push(value);
                if value & (1 << 2) != 0 {
                    self.sticky_err = false;
                }
            }
            1 => self.ctrl_stat = value,
            2 => {
                self.select = value;
                self.select_writes.push(value);
            }
            _ => {}
        }
    }

    fn ap_read(&mut self, a: u8) -> u32 {
        if (self.select >> 24) != 0 || (self.select >> 4) & 0xF != 0 {
            return 0;
        }
        match a {
            0 => self.csw,
            1 => self.tar,
            3 => {
                self.drw_reads += 1;
                let value = self.mem_mapped_read(self.tar & !3);
                self.advance_tar();
                value
            }
            _ => 0,
        }
    }

    fn ap_write(&mut self, a: u8, value: u32) {
        if (self.select >> 24) != 0 || (self.select >> 4) & 0xF != 0 {
            return;
        }
        match a {
            0 => {
                self.csw_writes.push(value);
                // Top byte is fixed by the device implementation
                self.csw = (value & 0x00FF_FFFF) | (SIM_CSW_RESET & 0xFF00_0000);
            }
            1 => self.tar = value,
            3 => {
                self.drw_write(value);
                self.advance_tar();
            }
            _ => {}
        }
    }

    fn advance_tar(&mut self) {
        if (self.csw >> 4) & 0x3 == 0b01 {
            self.tar = self.tar.wrapping_add(self.transfer_bytes());
        }
    }

    fn transfer_bytes(&self) -> u32 {
        match self.csw & 0x7 {
            0b000 => 1,
            0b001 => 2,
            _ => 4,
        }
    }

    fn drw_write(&mut self, value: u32) {
        let aligned = self.tar & !3;
        match self.csw & 0x7 {
            0b000 => {
                let shift = 8 * (self.tar & 3);
                let old = self.mem_mapped_read(aligned);
                let new = (old & !(0xFF << shift)) | (value & (0xFF << shift));
                self.mem_mapped_write(aligned, new);
            }
            0b001 => {
                let shift = 8 * (self.tar & 2);
                let old = self.mem_mapped_read(aligned);
                let new = (old & !(0xFFFF << shift)) | (value & (0xFFFF << shift));
                self.mem_mapped_write(aligned, new);
            }
            _ => self.mem_mapped_write(aligned, value),
        }
    }

    fn mem_mapped_read(&self, addr: u32) -> u32 {
        match addr {
            DHCSR => {
                let mut value = self.dhcsr_ctrl;
                if self.regrdy {
                    value |= 1 << 16;
                }
                if self.dhcsr_ctrl & 0x2 != 0 {
                    value |= 1 << 17;
                }
                value
            }
            DCRSR => 0,
            DCRDR => self.dcrdr,
            _ => self.mem.get(&addr).copied().unwrap_or(0),
        }
    }

    fn mem_mapped_write(&mut self, addr: u32, value: u32) {
        match addr {
            DHCSR => {
                self.dhcsr_writes.push(value);
                if (value >> 16) & 0xFFFF == 0xA05F {
                    self.dhcsr_ctrl = value & 0x3F;
                }
            }
            DCRSR => {
                self.dcrsr_writes.push(value);
                if self.regrdy_stuck {
                    self.regrdy = false;
                } else {
                    let reg = (value & 0x7F) as u8;
                    if value & (1 << 16) != 0 {
                        self.core_regs.insert(reg, self.dcrdr);
                    } else {
                        self.dcrdr = self.core_regs.get(&reg).copied().unwrap_or(0);
                    }
                    self.regrdy = true;
                }
            }
            DCRDR => self.dcrdr = value,
            _ => {
                self.mem.insert(addr, value);
            }
        }
    }
}

fn decode_request(bits: u8) -> Option<Request> {
    let start = bits & 1 != 0;
    let stop = bits & (1 << 6) != 0;
    let park = bits & (1 << 7) != 0;
    let field = (bits >> 1) & 0x0F;
    let parity = (bits >> 5) & 1;
    if !start || stop || !park || (field.count_ones() + parity as u32) % 2 != 0 {
        return None;
    }
    Some(Request {
        ap: bits & (1 << 1) != 0,
        read: bits & (1 << 2) != 0,
        a: (bits >> 3) & 0x3,
    })
}

/// Cloneable [`SwdIo`] handle to a shared [`TargetSim`], so tests can keep
/// inspecting the target while the probe stack owns the "pins".
#[derive(Clone)]
pub struct SimHandle(Rc<RefCell<TargetSim>>);

impl SimHandle {
    pub fn new() -> Self {
        init_logs();
        SimHandle(Rc::new(RefCell::new(TargetSim::new())))
    }

    pub fn sim(&self) -> Ref<'_, TargetSim> {
        self.0.borrow()
    }

    pub fn sim_mut(&self) -> RefMut<'_, TargetSim> {
        self.0.borrow_mut()
    }
}

impl SwdIo for SimHandle {
    fn swclk_high(&mut self) {
        let mut sim = self.0.borrow_mut();
        if !sim.swclk {
            sim.swclk = true;
            sim.on_rising_edge();
        }
    }

    fn swclk_low(&mut self) {
        self.0.borrow_mut().swclk = false;
    }

    fn swdio_high(&mut self) {
        self.0.borrow_mut().host_level = true;
    }

    fn swdio_low(&mut self) {
        self.0.borrow_mut().host_level = false;
    }

    fn swdio_output(&mut self) {
        self.0.borrow_mut().host_drives = true;
    }

    fn swdio_input(&mut self) {
        self.0.borrow_mut().host_drives = false;
    }

    fn read_swdio(&mut self) -> bool {
        let sim = self.0.borrow();
        if sim.host_drives {
            sim.host_level
        } else {
            sim.sim_bit
        }
    }

    fn delay(&mut self, _cycles: u32) {}
}

pub fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Run one host command against the processor using a full-size buffer.
/// Returns the reply length and the reply bytes.
pub fn exec(processor: &mut CommandProcessor<SimHandle>, request: &[u8]) -> (usize, Vec<u8>) {
    let mut buf = [0u8; MAX_COMMAND_SIZE];
    buf[..request.len()].copy_from_slice(request);
    let length = processor.process(&mut buf);
    (length, buf[..length].to_vec())
}

/// A sim plus a command processor already connected to it.
pub fn connected() -> (SimHandle, CommandProcessor<SimHandle>) {
    let sim = SimHandle::new();
    let mut processor = CommandProcessor::from_io(sim.clone());
    let (length, reply) = exec(&mut processor, &[CMD_CONNECT]);
    assert_eq!((length, reply[0]), (1, RC_OK), "connect failed");
    (sim, processor)
}
