// Copyright (C) 2026 Mudskipper Project
//
// MIT License

//! ARM SWD Interface
//!
//! This module implements DP/AP register access and memory transfers over
//! the SWD line driver.  It provides [`SwdInterface`] for performing
//! individual SWD operations against a connected target.

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use mudskipper_core::arm::dp::{Abort, IdCode, Select};
use mudskipper_core::arm::map::Csw;

use crate::SwdError;
use crate::protocol::{IDLE_CLOCKS, SwdIo, SwdProtocol, request};

// Precomputed command bytes for every legal DP/AP access, indexed by the
// 2-bit register field.  IDCODE read works out to the familiar 0xA5.
const DP_READ: [u8; 4] = [
    request(false, true, 0), // IDCODE
    request(false, true, 1), // CTRL/STAT
    request(false, true, 2), // RESEND
    request(false, true, 3), // RDBUFF
];
const DP_WRITE: [u8; 3] = [
    request(false, false, 0), // ABORT
    request(false, false, 1), // CTRL/STAT
    request(false, false, 2), // SELECT
];
const AP_READ: [u8; 4] = [
    request(true, true, 0),
    request(true, true, 1),
    request(true, true, 2),
    request(true, true, 3),
];
const AP_WRITE: [u8; 4] = [
    request(true, false, 0),
    request(true, false, 1),
    request(true, false, 2),
    request(true, false, 3),
];

// AP number of the AHB-AP on the target
const AHB_AP: u8 = 0;

// AHB-AP bank 0 register indices (A[3:2])
const AP_CSW: usize = 0; // 0x00
const AP_TAR: usize = 1; // 0x04
const AP_DRW: usize = 3; // 0x0C

/// Debug Port registers legal to read, by their 2-bit register index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DpRead {
    IdCode = 0,
    Status = 1,
    Resend = 2,
    RdBuff = 3,
}

impl DpRead {
    pub fn from_index(index: u8) -> Self {
        match index & 0x03 {
            0 => DpRead::IdCode,
            1 => DpRead::Status,
            2 => DpRead::Resend,
            _ => DpRead::RdBuff,
        }
    }
}

/// Debug Port registers legal to write, by their 2-bit register index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DpWrite {
    Abort = 0,
    Control = 1,
    Select = 2,
}

impl DpWrite {
    /// Index 3 has no writable DP register.
    pub fn from_index(index: u8) -> Option<Self> {
        match index & 0x03 {
            0 => Some(DpWrite::Abort),
            1 => Some(DpWrite::Control),
            2 => Some(DpWrite::Select),
            _ => None,
        }
    }
}

/// Memory transfer element size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementSize {
    Byte = 1,
    Half = 2,
    Word = 4,
}

impl ElementSize {
    /// Decode the host's element-size byte (1, 2 or 4).
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            1 => Some(ElementSize::Byte),
            2 => Some(ElementSize::Half),
            4 => Some(ElementSize::Word),
            _ => None,
        }
    }

    pub fn bytes(self) -> usize {
        self as usize
    }

    fn csw_size(self) -> u32 {
        match self {
            ElementSize::Byte => Csw::SIZE_BYTE,
            ElementSize::Half => Csw::SIZE_HALFWORD,
            ElementSize::Word => Csw::SIZE_WORD,
        }
    }
}

/// SWD Interface object
///
/// One `SwdInterface` represents one connection to a target: it owns the
/// line driver plus the per-connection state (the sampled CSW device byte),
/// which [`Self::connect()`] initialises and [`Self::off()`] discards.
///
/// Most firmware will use [`crate::DebugInterface`] (which adds core
/// register access and run control) or [`crate::CommandProcessor`] (which
/// adds host command dispatch) rather than this type directly.
#[derive(Debug)]
pub struct SwdInterface<IO: SwdIo> {
    protocol: SwdProtocol<IO>,

    // Device-dependent top byte of AP.CSW, sampled from the target on the
    // first block transfer of each connection.
    csw_defaults: Option<u8>,
}

impl<IO: SwdIo> SwdInterface<IO> {
    /// Creates a new SWD interface using the given [`SwdProtocol`] instance.
    pub fn new(protocol: SwdProtocol<IO>) -> Self {
        Self {
            protocol,
            csw_defaults: None,
        }
    }

    /// Creates a new SWD interface directly from a pin implementation.
    pub fn from_io(io: IO) -> Self {
        Self::new(SwdProtocol::new(io))
    }

    /// Returns a mutable reference to the underlying line driver, for
    /// bit-rate control or raw transactions.
    pub fn protocol(&mut self) -> &mut SwdProtocol<IO> {
        &mut self.protocol
    }

    /// Puts the line in its resting state.  Idempotent.
    pub fn init(&mut self) {
        self.protocol.init();
    }

    /// Connects to the target: emits the JTAG→SWD switch sequence, eight
    /// idle clocks, reads IDCODE and clears any sticky errors.
    ///
    /// All per-connection state is reset, so the CSW device byte is
    /// re-sampled by the next block transfer.
    pub fn connect(&mut self) -> Result<IdCode, SwdError> {
        trace!("Exec:  SWD connect");
        self.csw_defaults = None;

        self.protocol.jtag_to_swd_sequence();
        self.protocol.tx_idle(IDLE_CLOCKS);

        // The target must answer an IDCODE read immediately after the
        // switch sequence
        let result = self.read_dp(DpRead::IdCode).map(IdCode::from);

        // Clear sticky errors regardless of the outcome; idempotent on the
        // target
        let _ = self.clear_sticky();

        match &result {
            Ok(idcode) => debug!("Value: IDCODE {idcode}"),
            Err(e) => warn!("Error: SWD connect failed: {e}"),
        }
        result
    }

    /// Turns the interface off: the line returns to idle and per-connection
    /// state is forgotten.
    pub fn off(&mut self) {
        trace!("Exec:  SWD off");
        self.csw_defaults = None;
        self.protocol.idle();
    }

    /// The CSW device byte sampled from the target this connection, if any.
    pub fn csw_defaults(&self) -> Option<u8> {
        self.csw_defaults
    }

    /// Read a Debug Port register.
    pub fn read_dp(&mut self, reg: DpRead) -> Result<u32, SwdError> {
        trace!("Exec:  Read DP {reg:?}");
        self.protocol.read_reg(DP_READ[reg as usize])
    }

    /// Write a Debug Port register.
    pub fn write_dp(&mut self, reg: DpWrite, value: u32) -> Result<(), SwdError> {
        trace!("Exec:  Write DP {reg:?} 0x{value:08X}");
        self.protocol.write_reg(DP_WRITE[reg as usize], value)
    }

    /// Read an Access Port register.
    ///
    /// The 16-bit address packs the AP number (bits 15:8), the bank within
    /// the AP (bits 7:4) and the register within the bank (bits 3:2).  The
    /// AP read is posted, so the true result is fetched from DP.RDBUFF.
    pub fn read_ap(&mut self, addr: u16) -> Result<u32, SwdError> {
        trace!("Exec:  Read AP 0x{addr:04X}");
        self.select_ap(addr)?;

        // Initiate the read; the data returned belongs to the previous
        // posted read
        let index = ((addr >> 2) & 0x03) as usize;
        let _ = self.protocol.read_reg(AP_READ[index])?;

        // The true result
        self.protocol.read_reg(DP_READ[DpRead::RdBuff as usize])
    }

    /// Write an Access Port register.  See [`Self::read_ap`] for the
    /// address layout.
    ///
    /// DP.RDBUFF is read afterwards so the target can surface a stall or
    /// status response before the next access.
    pub fn write_ap(&mut self, addr: u16, value: u32) -> Result<(), SwdError> {
        trace!("Exec:  Write AP 0x{addr:04X} 0x{value:08X}");
        self.select_ap(addr)?;

        let index = ((addr >> 2) & 0x03) as usize;
        self.protocol.write_reg(AP_WRITE[index], value)?;

        let _ = self.protocol.read_reg(DP_READ[DpRead::RdBuff as usize])?;
        Ok(())
    }

    /// Clear every DP sticky error by writing the ABORT register.
    ///
    /// Always writes the full clear mask; reading STATUS first to see
    /// whether a clear is needed would cost a round trip for nothing.
    pub fn clear_sticky(&mut self) -> Result<(), SwdError> {
        trace!("Exec:  Clear sticky errors");
        self.write_dp(DpWrite::Abort, Abort::clear_errors().into())
    }

    // Latch DP.SELECT for an AP access by composite address.
    fn select_ap(&mut self, addr: u16) -> Result<(), SwdError> {
        let mut select = Select::default();
        select.set_apsel((addr >> 8) as u8);
        select.set_apbanksel(((addr >> 4) & 0x0F) as u8);
        self.write_dp(DpWrite::Select, select.into())
    }
}

/// Memory engine: single-word and block transfers through the AHB-AP.
impl<IO: SwdIo> SwdInterface<IO> {
    /// Writes a 32-bit word to target memory.
    pub fn write_word(&mut self, addr: u32, data: u32) -> Result<(), SwdError> {
        trace!("Exec:  Write word 0x{addr:08X} = 0x{data:08X}");
        self.single_setup(addr)?;
        self.protocol.write_reg(AP_WRITE[AP_DRW], data)
    }

    /// Reads a 32-bit word from target memory.
    ///
    /// The DRW read is posted: its result is discarded and the true data is
    /// taken from DP.RDBUFF.
    pub fn read_word(&mut self, addr: u32) -> Result<u32, SwdError> {
        trace!("Exec:  Read word 0x{addr:08X}");
        self.single_setup(addr)?;

        let _ = self.protocol.read_reg(AP_READ[AP_DRW])?;
        self.protocol.read_reg(DP_READ[DpRead::RdBuff as usize])
    }

    /// Writes a block of memory at the given element size.
    ///
    /// `data` holds the payload in ascending address order; its length is
    /// the byte count.  Trailing bytes short of a whole element are ignored,
    /// and the address must suit the element size (the dispatcher rejects
    /// odd halfword addresses before calling in).
    pub fn write_block(
        &mut self,
        size: ElementSize,
        addr: u32,
        data: &[u8],
    ) -> Result<(), SwdError> {
        trace!("Exec:  Write block 0x{addr:08X} {size:?} x{}", data.len());
        if data.is_empty() {
            return Ok(());
        }
        self.block_setup(size, addr)?;

        // Low two address bits select the DRW byte lane.  The lane buffer is
        // reused across elements; unaddressed lanes carry stale bytes the
        // target ignores.
        let mut lane = addr as u8;
        let mut word = 0u32;
        match size {
            ElementSize::Byte => {
                for &value in data {
                    let shift = 8 * (lane & 3) as u32;
                    word = (word & !(0xFF << shift)) | ((value as u32) << shift);
                    self.protocol.write_reg(AP_WRITE[AP_DRW], word)?;
                    lane = lane.wrapping_add(1);
                }
            }
            ElementSize::Half => {
                for pair in data.chunks_exact(2) {
                    let shift = 8 * (lane & 2) as u32;
                    let half = u16::from_le_bytes([pair[0], pair[1]]) as u32;
                    word = (word & !(0xFFFF << shift)) | (half << shift);
                    self.protocol.write_reg(AP_WRITE[AP_DRW], word)?;
                    lane = lane.wrapping_add(2);
                }
            }
            ElementSize::Word => {
                for quad in data.chunks_exact(4) {
                    word = u32::from_le_bytes([quad[0], quad[1], quad[2], quad[3]]);
                    self.protocol.write_reg(AP_WRITE[AP_DRW], word)?;
                }
            }
        }
        Ok(())
    }

    /// Reads a block of memory at the given element size into `out`, in
    /// ascending address order.
    ///
    /// For `n` elements the engine performs `n + 1` wire reads: the first
    /// DRW read is discarded (posted), each further DRW read returns the
    /// previous element, and the final element comes from DP.RDBUFF.
    ///
    /// A parity error abandons the block; bytes beyond the last completed
    /// element are unspecified.
    pub fn read_block(
        &mut self,
        size: ElementSize,
        addr: u32,
        out: &mut [u8],
    ) -> Result<(), SwdError> {
        trace!("Exec:  Read block 0x{addr:08X} {size:?} x{}", out.len());
        let element_count = out.len() / size.bytes();
        if element_count == 0 {
            return Ok(());
        }
        self.block_setup(size, addr)?;

        // Prime the posted-read pipeline; dummy data back
        let _ = self.protocol.read_reg(AP_READ[AP_DRW])?;

        let mut lane = addr as u8;
        for (i, chunk) in out.chunks_exact_mut(size.bytes()).enumerate() {
            let value = if i + 1 == element_count {
                // Final element from RDBUFF so no further read is posted
                self.protocol.read_reg(DP_READ[DpRead::RdBuff as usize])?
            } else {
                self.protocol.read_reg(AP_READ[AP_DRW])?
            };

            match size {
                ElementSize::Byte => {
                    chunk[0] = (value >> (8 * (lane & 3) as u32)) as u8;
                    lane = lane.wrapping_add(1);
                }
                ElementSize::Half => {
                    let shift = 8 * (lane & 2) as u32;
                    chunk.copy_from_slice(&((value >> shift) as u16).to_le_bytes());
                    lane = lane.wrapping_add(2);
                }
                ElementSize::Word => {
                    chunk.copy_from_slice(&value.to_le_bytes());
                }
            }
        }
        Ok(())
    }

    // Latch DP.SELECT onto AHB-AP bank 0, home of CSW/TAR/DRW.
    fn select_mem_bank(&mut self) -> Result<(), SwdError> {
        let mut select = Select::default();
        select.set_apsel(AHB_AP);
        self.write_dp(DpWrite::Select, select.into())
    }

    // The device-dependent top byte of CSW, sampled once per connection the
    // first time a block transfer needs it.
    fn csw_baseline(&mut self) -> Result<u8, SwdError> {
        if let Some(device_bits) = self.csw_defaults {
            return Ok(device_bits);
        }

        // Posted read; dummy data back
        let _ = self.protocol.read_reg(AP_READ[AP_CSW])?;
        let csw = Csw::from(self.protocol.read_reg(DP_READ[DpRead::RdBuff as usize])?);

        let device_bits = csw.device_bits();
        debug!("Value: CSW device byte 0x{device_bits:02X}");
        self.csw_defaults = Some(device_bits);
        Ok(device_bits)
    }

    // CSW/TAR setup for a single word access: no auto-increment, and the
    // cached device byte is used as-is (zero before the first block op
    // samples it).
    fn single_setup(&mut self, addr: u32) -> Result<(), SwdError> {
        self.select_mem_bank()?;

        let csw = Csw::assemble(
            self.csw_defaults.unwrap_or(0),
            Csw::single_control(Csw::SIZE_WORD),
        );
        self.protocol.write_reg(AP_WRITE[AP_CSW], csw.into())?;
        self.protocol.write_reg(AP_WRITE[AP_TAR], addr)
    }

    // CSW/TAR setup for a block transfer: sized, auto-incrementing access
    // with the sampled device byte.
    fn block_setup(&mut self, size: ElementSize, addr: u32) -> Result<(), SwdError> {
        self.select_mem_bank()?;

        let device_bits = self.csw_baseline()?;
        let csw = Csw::assemble(device_bits, Csw::block_control(size.csw_size()));
        self.protocol.write_reg(AP_WRITE[AP_CSW], csw.into())?;
        self.protocol.write_reg(AP_WRITE[AP_TAR], addr)
    }
}
