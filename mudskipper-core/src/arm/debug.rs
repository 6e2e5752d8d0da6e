// Copyright (C) 2026 Mudskipper Project
//
// MIT License

//! Cortex-M core debug block.
//!
//! Memory-mapped registers from the Armv7-M Architecture Reference Manual,
//! part 3 (Debug Architecture).  The probe reaches these through ordinary
//! AHB-AP memory transactions.

use bitflags::bitflags;
use core::fmt;

use crate::register_data;

/// Debug Core Register Selector Register address (write-only)
pub const DCRSR: u32 = 0xE000_EDF4;

/// Debug Core Register Data Register address
pub const DCRDR: u32 = 0xE000_EDF8;

bitflags! {
    /// Debug Halting Control and Status Register (0xE000EDF0).
    ///
    /// Several bits read as status but write as control; the DBGKEY value in
    /// the top half-word gates every control write.
    #[derive(Debug, PartialEq, Eq, Copy, Clone)]
    pub struct Dhcsr: u32 {
        // At least one reset since the last DHCSR read; clear on read.
        const S_RESET_ST = 1 << 25;
        const S_RETIRE_ST = 1 << 24;
        const S_LOCKUP = 1 << 19;
        const S_SLEEP = 1 << 18;
        const S_HALT = 1 << 17;
        const S_REGRDY = 1 << 16;

        // Magic number allowing the C_* bits to be set.
        const DBGKEY = 0xA05F << 16;

        const C_SNAPSTALL = 1 << 5;
        const C_MASKINTS = 1 << 3;
        const C_STEP = 1 << 2;
        const C_HALT = 1 << 1;
        const C_DEBUGEN = 1 << 0;
        const _ = !0;
    }
}

impl From<u32> for Dhcsr {
    fn from(v: u32) -> Self {
        Self::from_bits_retain(v)
    }
}

impl Dhcsr {
    /// Memory-mapped address
    pub const ADDRESS: u32 = 0xE000_EDF0;

    /// Halt the core while keeping debug enabled.
    pub fn halt() -> Self {
        Self::DBGKEY | Self::C_HALT | Self::C_DEBUGEN
    }

    /// Clear C_HALT while keeping debug control.
    pub fn resume() -> Self {
        Self::DBGKEY | Self::C_DEBUGEN
    }

    /// Single-step request.  Only C_MASKINTS survives from the previous
    /// register value; everything else is rebuilt.
    pub fn step_preserving(previous: Self) -> Self {
        Self::DBGKEY | (previous & Self::C_MASKINTS) | Self::C_STEP | Self::C_DEBUGEN
    }

    pub fn is_halted(self) -> bool {
        self.contains(Self::S_HALT)
    }

    pub fn is_regrdy(self) -> bool {
        self.contains(Self::S_REGRDY)
    }
}

/// Debug Core Register Selector Register data (write-only)
///
/// Bit 16 selects the transfer direction, bits 6:0 the core register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dcrsr(u32);

register_data!(Dcrsr);

impl Dcrsr {
    const REGWNR: u32 = 1 << 16;
    const REGSEL_MASK: u32 = 0x7F;

    /// Transfer the selected core register into DCRDR.
    pub const fn read(reg: u8) -> Self {
        Dcrsr(reg as u32 & Self::REGSEL_MASK)
    }

    /// Transfer DCRDR into the selected core register.
    pub const fn write(reg: u8) -> Self {
        Dcrsr(Self::REGWNR | (reg as u32 & Self::REGSEL_MASK))
    }

    pub fn regsel(&self) -> u8 {
        (self.0 & Self::REGSEL_MASK) as u8
    }

    pub fn is_write(&self) -> bool {
        self.0 & Self::REGWNR != 0
    }
}

/// Core register selector values (Armv7-M C1.6.3, REGSEL).
///
/// r0-r12 map directly; the rest have dedicated encodings.
pub mod reg {
    /// Stack pointer (current)
    pub const SP: u8 = 0b0001101;
    /// Link register
    pub const LR: u8 = 0b0001110;
    /// Debug return address - the PC at the point the core halted
    pub const PC: u8 = 0b0001111;
    /// Program status register
    pub const XPSR: u8 = 0b0010000;
    /// Main stack pointer
    pub const MSP: u8 = 0b0010001;
    /// Process stack pointer
    pub const PSP: u8 = 0b0010010;
    /// CONTROL/FAULTMASK/BASEPRI/PRIMASK
    pub const CFBP: u8 = 0b0010100;
}
