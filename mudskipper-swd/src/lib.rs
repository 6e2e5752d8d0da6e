// Copyright (C) 2026 Mudskipper Project
//
// MIT License

//! mudskipper-swd library
//!
//! ARM Serial Wire Debug (SWD) command processor for the mudskipper
//! background-debug probe.
//!
//! The probe firmware hands each host command buffer to this crate, which
//! unmarshals it, performs the requested debug operation against the target
//! over the
//! [ARM SWD protocol](https://developer.arm.com/documentation/ihi0031/latest/),
//! and marshals the reply.
//!
//! The following diagram shows the key `mudskipper-swd` concepts.
//!
//! ```text
//!      USB dispatcher      |  command buffer  ==  USB  ==  Host software
//! -----------------------                                 --------------
//!     CommandProcessor      \
//! -----------------------    \
//!      DebugInterface         |--  SwdError
//! -----------------------    /
//!      SwdInterface          /
//! -----------------------   /
//!      SwdProtocol         /                             e.g. STM32/Kinetis
//! -----------------------                               -------------------
//!     SwdIo (pins/SPI)    >=========================<       SWD Target
//!                              SWDIO/SWCLK/GND
//! ```
//!
//! * [`CommandProcessor`] dispatches host command buffers (the command set
//!   lives in `mudskipper-bin`).
//! * [`DebugInterface`] provides core-register access and run control.
//! * [`SwdInterface`] performs individual DP/AP and memory operations.
//! * [`SwdProtocol`] implements the SWD wire protocol over a pin-level
//!   [`protocol::SwdIo`] implementation supplied by the firmware.
//!
//! The engine is strictly request/response: every wait is bounded by a retry
//! counter and each command runs to completion before the next is accepted.
//!
//! This crate is `no_std` and allocation free.

#![no_std]

pub mod command;
pub mod debug;
pub mod interface;
pub mod protocol;

#[doc(inline)]
pub use crate::command::CommandProcessor;
#[doc(inline)]
pub use crate::debug::DebugInterface;
#[doc(inline)]
pub use crate::interface::SwdInterface;
#[doc(inline)]
pub use crate::protocol::SwdProtocol;

use core::fmt;

use mudskipper_bin::{
    RC_ACK_TIMEOUT, RC_ARM_ACCESS_ERROR, RC_ARM_FAULT_ERROR, RC_ARM_PARITY_ERROR,
    RC_ILLEGAL_PARAMS, RC_NO_CONNECTION,
};

/// Core error type used by all mudskipper-swd objects.
///
/// Every failure surfaces to the host as a status byte; see
/// [`SwdError::status_code()`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwdError {
    /// Represents a fault condition on the target, signalled by a FAULT
    /// acknowledge.  The DP latches a sticky error which the host clears by
    /// writing the ABORT register when it is ready to resume.
    FaultAck,

    /// Represents no acknowledgement from the target.  The value received is
    /// included - 7 means the SWDIO line was high for the entire acknowledge
    /// cycle, which is the most common case (nothing driving the line).
    NoAck(u8),

    /// The target answered WAIT for more consecutive attempts than the retry
    /// budget allows ([`protocol::WAIT_RETRIES`]).
    AckTimeout,

    /// A parity error was detected while reading from the target, so the
    /// data cannot be trusted.  Repeated parity errors suggest noise on the
    /// SWD lines or a bit rate the target cannot sustain.
    ReadParity,

    /// A core-register transfer did not complete: DHCSR.S_REGRDY stayed
    /// clear for the whole poll budget ([`debug::REGRDY_RETRIES`]).
    AccessTimeout,

    /// The command buffer held arguments the engine refuses: a count that
    /// overflows the buffer, an element size other than 1/2/4, a misaligned
    /// halfword address, or reserved AP address bits set.  Nothing was sent
    /// on the wire.
    IllegalParams,
}

impl SwdError {
    /// Map a non-OK, non-WAIT acknowledge value to an error.
    pub fn from_ack(ack: u8) -> Self {
        match ack {
            4 => SwdError::FaultAck,
            _ => SwdError::NoAck(ack),
        }
    }

    /// Returns a string representation of the error.
    pub fn as_str(&self) -> &'static str {
        match self {
            SwdError::FaultAck => "Fault ACK",
            SwdError::NoAck(_) => "No ACK",
            SwdError::AckTimeout => "ACK Timeout",
            SwdError::ReadParity => "Read Parity Error",
            SwdError::AccessTimeout => "Core Register Access Timeout",
            SwdError::IllegalParams => "Illegal Parameters",
        }
    }

    /// The status byte reported to the host for this error.
    pub fn status_code(&self) -> u8 {
        match self {
            SwdError::FaultAck => RC_ARM_FAULT_ERROR,
            SwdError::NoAck(_) => RC_NO_CONNECTION,
            SwdError::AckTimeout => RC_ACK_TIMEOUT,
            SwdError::ReadParity => RC_ARM_PARITY_ERROR,
            SwdError::AccessTimeout => RC_ARM_ACCESS_ERROR,
            SwdError::IllegalParams => RC_ILLEGAL_PARAMS,
        }
    }
}

impl fmt::Display for SwdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwdError::NoAck(ack) => write!(f, "{}: {ack}", self.as_str()),
            _ => write!(f, "{}", self.as_str()),
        }
    }
}
