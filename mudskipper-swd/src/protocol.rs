// Copyright (C) 2026 Mudskipper Project
//
// MIT License

//! ARM SWD Wire Protocol Implementation
//!
//! This module implements the SWD line protocol: framing of the command,
//! acknowledge, data and parity phases, turnaround cycles, WAIT retry and
//! the JTAG→SWD switch sequence.  It provides [`SwdProtocol`] for low-level
//! SWD transactions over any [`SwdIo`] pin implementation.

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::SwdError;

// JTAG-to-SWD sequence as documented: 0111100111100111
const JTAG_TO_SWD_DOCUMENTED: u16 = 0b0111_1001_1110_0111; // 0x79E7

// Reversed for SWD LSB-first transmission
const JTAG_TO_SWD_SEQUENCE: u16 = JTAG_TO_SWD_DOCUMENTED.reverse_bits(); // 0xE79E

// Clock cycles with SWDIO high either side of the switch sequence.  The
// specification requires at least 50; 64 is generous and keeps the loop a
// whole number of bytes.
const LINE_RESET_CYCLES: u32 = 64;

/// Idle clocks driven after the switch sequence and after each data phase.
pub const IDLE_CLOCKS: u32 = 8;

/// Number of times a command is resent after a WAIT acknowledge before the
/// transaction is abandoned with [`SwdError::AckTimeout`].
pub const WAIT_RETRIES: u32 = 20;

// 3-bit acknowledge values, LSB received first
const ACK_OK: u8 = 0b001;
const ACK_WAIT: u8 = 0b010;

// Default half-bit spin count; conservative enough for slow targets.  The
// outer firmware picks the real rate via `set_bit_delay`.
const DEFAULT_BIT_DELAY: u32 = 8;

/// Pin-level hardware access used by [`SwdProtocol`].
///
/// Firmware supplies an implementation driving the real SWCLK/SWDIO pins
/// (GPIO, or a half-duplex SPI block hanging off `swdio_output` /
/// `swdio_input`).  Tests substitute a fake that records the bit stream and
/// plays a simulated target.
///
/// Data written by the probe changes while SWCLK is low and is sampled by
/// the target on the rising edge; the probe samples target data while SWCLK
/// is low, before raising it.
pub trait SwdIo {
    /// Drive SWCLK high.
    fn swclk_high(&mut self);

    /// Drive SWCLK low.
    fn swclk_low(&mut self);

    /// Drive SWDIO high (only meaningful while output).
    fn swdio_high(&mut self);

    /// Drive SWDIO low (only meaningful while output).
    fn swdio_low(&mut self);

    /// Take ownership of SWDIO and drive it.
    fn swdio_output(&mut self);

    /// Release SWDIO to the target (tri-state).  Hardware implementations
    /// also disable their transmit peripheral here.
    fn swdio_input(&mut self);

    /// Sample the SWDIO level.
    fn read_swdio(&mut self) -> bool;

    /// Spin for `cycles` half-bit time units.
    fn delay(&mut self, cycles: u32);
}

/// SWD line driver.
///
/// This is used by [`crate::SwdInterface`] to run individual SWD
/// transactions.  Each operation leaves the line idle (SWCLK high, SWDIO
/// tri-state), including on every error path; no line state is carried
/// between calls.
///
/// Create using `SwdProtocol::new()` passing in an [`SwdIo`] implementation:
///
/// ```rust,ignore
/// use mudskipper_swd::SwdProtocol;
///
/// let mut swd = SwdProtocol::new(probe_pins);
/// swd.init();
/// swd.jtag_to_swd_sequence();
/// ```
#[derive(Debug)]
pub struct SwdProtocol<IO: SwdIo> {
    io: IO,
    bit_delay: u32,
}

impl<IO: SwdIo> SwdProtocol<IO> {
    /// Creates a new SWD line driver over the given pins.
    pub fn new(io: IO) -> Self {
        Self {
            io,
            bit_delay: DEFAULT_BIT_DELAY,
        }
    }

    /// Sets the half-bit spin count, controlling the SWCLK rate.
    ///
    /// Can be changed at any time; the bit rate the target tolerates is
    /// board dependent.
    pub fn set_bit_delay(&mut self, bit_delay: u32) {
        trace!("Exec:  Set bit delay {bit_delay}");
        self.bit_delay = bit_delay;
    }

    /// Gets the configured half-bit spin count.
    pub fn bit_delay(&self) -> u32 {
        self.bit_delay
    }

    /// Consume the driver and return the pin implementation.
    pub fn release(self) -> IO {
        self.io
    }

    /// Puts the pins in their resting configuration.  Idempotent.
    pub fn init(&mut self) {
        self.idle();
    }

    /// Returns the line to idle: SWDIO tri-state, SWCLK high.
    pub fn idle(&mut self) {
        self.io.swdio_input();
        self.io.swclk_high();
    }

    #[inline]
    fn delay(&mut self) {
        self.io.delay(self.bit_delay);
    }

    #[inline]
    fn write_bit(&mut self, bit: bool) {
        if bit {
            self.io.swdio_high();
        } else {
            self.io.swdio_low();
        }
        self.io.swclk_low();
        self.delay();
        self.io.swclk_high();
        self.delay();
    }

    #[inline]
    fn read_bit(&mut self) -> bool {
        self.io.swclk_low();
        self.delay();

        // Sample before the rising edge; the target shifts its next bit out
        // on the edge.
        let bit = self.io.read_swdio();

        self.io.swclk_high();
        self.delay();
        bit
    }

    #[inline]
    fn clock(&mut self, cycles: u32) {
        for _ in 0..cycles {
            self.io.swclk_low();
            self.delay();
            self.io.swclk_high();
            self.delay();
        }
    }

    #[inline]
    fn write_bits(&mut self, count: u32, data: u64) {
        let mut data = data;
        for _ in 0..count {
            self.write_bit(data & 1 == 1);
            data >>= 1;
        }
    }

    /// Emits the JTAG→SWD switch sequence: 64 clocks with SWDIO high, the
    /// 16-bit selection word LSB-first, then another 64 clocks with SWDIO
    /// high.
    ///
    /// The interface is reset even if it was already in SWD mode, so IDCODE
    /// must be read afterwards to re-enable it.
    pub fn jtag_to_swd_sequence(&mut self) {
        trace!("Exec:  JTAG to SWD sequence");
        self.io.swdio_output();
        self.io.swdio_high();
        self.clock(LINE_RESET_CYCLES);
        self.write_bits(16, JTAG_TO_SWD_SEQUENCE as u64);
        self.io.swdio_high();
        self.clock(LINE_RESET_CYCLES);
    }

    /// Emits `cycles` clocks with SWDIO driven low, then leaves the line
    /// idle.
    pub fn tx_idle(&mut self, cycles: u32) {
        self.io.swdio_output();
        self.io.swdio_low();
        self.clock(cycles);
        self.idle();
    }

    /// Command phase: writes the 8-bit command and receives the 3-bit
    /// acknowledge.  Retries on WAIT up to [`WAIT_RETRIES`] times, with one
    /// turnaround clock before each resend.
    ///
    /// A turnaround clock is inserted after every non-OK acknowledge, and
    /// the line is returned to idle before an error is reported.
    ///
    /// On success the line is mid-transaction: SWDIO is tri-state and the
    /// caller must continue with [`Self::rx_data`] (reads) or
    /// [`Self::tx_data`] (writes).
    pub fn send_command(&mut self, command: u8) -> Result<(), SwdError> {
        for _ in 0..=WAIT_RETRIES {
            self.io.swdio_output();
            self.write_bits(8, command as u64);

            // Turnaround, then the target drives the acknowledge
            self.io.swdio_input();
            self.clock(1);

            let mut ack = 0u8;
            for bit in 0..3 {
                if self.read_bit() {
                    ack |= 1 << bit;
                }
            }

            match ack {
                ACK_OK => return Ok(()),
                ACK_WAIT => {
                    // Turnaround so the target releases the line, then resend
                    self.clock(1);
                }
                _ => {
                    self.clock(1);
                    self.idle();
                    let err = SwdError::from_ack(ack);
                    trace!("Error: command 0x{command:02X} ack {ack:03b}: {err}");
                    return Err(err);
                }
            }
        }

        self.idle();
        warn!("Error: command 0x{command:02X} exhausted WAIT retries");
        Err(SwdError::AckTimeout)
    }

    /// Write data phase, after an OK acknowledge to a write command:
    /// turnaround, 32 data bits, odd parity bit, then 8 idle clocks.  Leaves
    /// the line idle.
    pub fn tx_data(&mut self, data: u32) {
        self.clock(1);
        self.io.swdio_output();

        let bits = if calculate_parity(data) {
            data as u64 | (1 << 32)
        } else {
            data as u64
        };
        self.write_bits(33, bits);

        self.tx_idle(IDLE_CLOCKS);
    }

    /// Read data phase, after an OK acknowledge to a read command: 32 data
    /// bits, parity bit, turnaround, then 8 idle clocks.  Leaves the line
    /// idle.
    ///
    /// A parity mismatch still completes the turnaround and idle clocks (the
    /// target does not know the read went bad) before reporting
    /// [`SwdError::ReadParity`].
    pub fn rx_data(&mut self) -> Result<u32, SwdError> {
        let mut data = 0u32;
        for bit in 0..32 {
            if self.read_bit() {
                data |= 1 << bit;
            }
        }
        let parity = self.read_bit();

        self.clock(1);
        self.tx_idle(IDLE_CLOCKS);

        if calculate_parity(data) != parity {
            debug!("Error: read parity mismatch, data 0x{data:08X} parity {parity}");
            return Err(SwdError::ReadParity);
        }

        Ok(data)
    }

    /// One complete write transaction: command phase then data phase.
    pub fn write_reg(&mut self, command: u8, data: u32) -> Result<(), SwdError> {
        self.send_command(command)?;
        self.tx_data(data);
        Ok(())
    }

    /// One complete read transaction: command phase then data phase.
    pub fn read_reg(&mut self, command: u8) -> Result<u32, SwdError> {
        self.send_command(command)?;
        self.rx_data()
    }
}

/// Calculate SWD parity - true for an odd number of bits set.
pub(crate) fn calculate_parity(value: u32) -> bool {
    value.count_ones() % 2 == 1
}

/// Build an SWD command byte for the given port, direction and 2-bit
/// register index (the A[3:2] field).
///
/// Layout, LSB transmitted first:
/// `{Start=1, APnDP, RnW, A[2], A[3], Parity, Stop=0, Park=1}` with odd
/// parity over `APnDP | RnW | A[3:2]`.
pub(crate) const fn request(ap: bool, read: bool, a: u8) -> u8 {
    let mut req: u8 = (1 << 0) | (1 << 7); // Start + Park
    if ap {
        req |= 1 << 1;
    }
    if read {
        req |= 1 << 2;
    }
    req |= (a & 0x3) << 3;
    if ((req >> 1) & 0x0F).count_ones() % 2 == 1 {
        req |= 1 << 5;
    }
    req
}
