// Copyright (C) 2026 Mudskipper Project
//
// MIT License

//! Cortex-M run control and core register access.
//!
//! The debug block is memory mapped, so everything here is built from
//! ordinary word transfers: DCRSR selects the register and direction, DCRDR
//! carries the data, and DHCSR.S_REGRDY says when the transfer has landed.

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use mudskipper_core::arm::debug::{DCRDR, DCRSR, Dcrsr, Dhcsr};
use mudskipper_core::arm::dp::IdCode;

use crate::SwdError;
use crate::interface::SwdInterface;
use crate::protocol::SwdIo;

/// Number of DHCSR polls allowed for S_REGRDY before a core register
/// transfer is abandoned with [`SwdError::AccessTimeout`].
pub const REGRDY_RETRIES: u32 = 40;

/// ARM Debug Interface object
///
/// Wraps an [`SwdInterface`] with Cortex-M specifics: halting, resuming and
/// single-stepping the core, and moving values in and out of its integer
/// registers.
///
/// ```rust,ignore
/// use mudskipper_swd::DebugInterface;
/// use mudskipper_core::arm::debug::reg;
///
/// let mut debug = DebugInterface::from_io(probe_pins);
/// debug.connect()?;
/// debug.halt()?;
/// let pc = debug.read_core_reg(reg::PC)?;
/// ```
#[derive(Debug)]
pub struct DebugInterface<IO: SwdIo> {
    swd: SwdInterface<IO>,
}

impl<IO: SwdIo> DebugInterface<IO> {
    /// Creates a new `DebugInterface` over the given [`SwdInterface`].
    pub fn new(swd: SwdInterface<IO>) -> Self {
        Self { swd }
    }

    /// Creates a new `DebugInterface` directly from a pin implementation.
    pub fn from_io(io: IO) -> Self {
        Self::new(SwdInterface::from_io(io))
    }

    /// Returns a mutable reference to the underlying [`SwdInterface`] for
    /// lower-level SWD operations.
    pub fn swd_if(&mut self) -> &mut SwdInterface<IO> {
        &mut self.swd
    }

    /// Connects to the target.  See [`SwdInterface::connect`].
    pub fn connect(&mut self) -> Result<IdCode, SwdError> {
        self.swd.connect()
    }

    /// Reads a Cortex-M core register (r0-r15, xPSR, and the special
    /// registers - selector values in `mudskipper_core::arm::debug::reg`).
    pub fn read_core_reg(&mut self, reg: u8) -> Result<u32, SwdError> {
        trace!("Exec:  Read core register {reg}");
        self.core_register_op(Dcrsr::read(reg))?;
        self.swd.read_word(DCRDR)
    }

    /// Writes a Cortex-M core register.
    pub fn write_core_reg(&mut self, reg: u8, value: u32) -> Result<(), SwdError> {
        trace!("Exec:  Write core register {reg} = 0x{value:08X}");
        self.swd.write_word(DCRDR, value)?;
        self.core_register_op(Dcrsr::write(reg))
    }

    /// Halts the core, enabling debug.
    pub fn halt(&mut self) -> Result<(), SwdError> {
        trace!("Exec:  Target halt");
        self.swd.write_word(Dhcsr::ADDRESS, Dhcsr::halt().bits())
    }

    /// Resumes execution, keeping debug enabled.
    pub fn go(&mut self) -> Result<(), SwdError> {
        trace!("Exec:  Target go");
        self.swd.write_word(Dhcsr::ADDRESS, Dhcsr::resume().bits())
    }

    /// Steps one instruction.
    ///
    /// DHCSR is read first so the interrupt-masking choice (C_MASKINTS)
    /// survives the step request; everything else is rebuilt.
    pub fn step(&mut self) -> Result<(), SwdError> {
        trace!("Exec:  Target step");
        let dhcsr = Dhcsr::from(self.swd.read_word(Dhcsr::ADDRESS)?);
        self.swd
            .write_word(Dhcsr::ADDRESS, Dhcsr::step_preserving(dhcsr).bits())
    }

    // Kick off a core register transfer and poll DHCSR until the core
    // reports it complete.
    fn core_register_op(&mut self, dcrsr: Dcrsr) -> Result<(), SwdError> {
        self.swd.write_word(DCRSR, dcrsr.into())?;

        for _ in 0..REGRDY_RETRIES {
            let dhcsr = Dhcsr::from(self.swd.read_word(Dhcsr::ADDRESS)?);
            if dhcsr.is_regrdy() {
                return Ok(());
            }
        }

        warn!("Error: core register {} never became ready", dcrsr.regsel());
        Err(SwdError::AccessTimeout)
    }
}
