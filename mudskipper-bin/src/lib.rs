// Copyright (C) 2026 Mudskipper Project
//
// MIT License

//! mudskipper-bin - shared host/probe command protocol constants and types
//!
//! The mudskipper probe exchanges fixed-layout command buffers with the host
//! over USB.  Each command is identified by a single byte at `buf[0]`;
//! `buf[1]` carries a sub-code consumed by the outer dispatcher.  The probe
//! replies with a status byte at `buf[0]` followed by command-specific data
//! from `buf[1]`.
//!
//! This crate is `no_std` and platform agnostic.  It is used by the probe
//! firmware to decode commands, and by host tooling to build them.

#![no_std]

use core::fmt;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Size of the shared command buffer, in bytes.
///
/// A memory read returns `count` data bytes after the status byte, so the
/// largest legal byte count is `MAX_COMMAND_SIZE - 1`.
pub const MAX_COMMAND_SIZE: usize = 254;

/// Status codes returned in `buf[0]` of every reply.
pub const RC_OK: u8 = 0;
pub const RC_ILLEGAL_PARAMS: u8 = 1;
pub const RC_ILLEGAL_COMMAND: u8 = 4;
pub const RC_NO_CONNECTION: u8 = 5;
pub const RC_ACK_TIMEOUT: u8 = 30;
pub const RC_ARM_PARITY_ERROR: u8 = 51;
pub const RC_ARM_FAULT_ERROR: u8 = 52;
pub const RC_ARM_ACCESS_ERROR: u8 = 53;

/// Command bytes understood by the SWD command processor.
pub const CMD_CONNECT: u8 = 0x10;
pub const CMD_WRITE_DREG: u8 = 0x20;
pub const CMD_READ_DREG: u8 = 0x21;
pub const CMD_WRITE_CREG: u8 = 0x22;
pub const CMD_READ_CREG: u8 = 0x23;
pub const CMD_WRITE_MEM: u8 = 0x30;
pub const CMD_READ_MEM: u8 = 0x31;
pub const CMD_READ_REG: u8 = 0x40;
pub const CMD_WRITE_REG: u8 = 0x41;
pub const CMD_TARGET_HALT: u8 = 0x50;
pub const CMD_TARGET_GO: u8 = 0x51;
pub const CMD_TARGET_STEP: u8 = 0x52;

/// Single byte commands, with their input layouts.
///
/// Multi-byte fields travel MSB first.  Register values and memory addresses
/// are 4 bytes; memory block payloads are raw byte streams in ascending
/// address order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Command {
    /// JTAG→SWD switch, read IDCODE, clear sticky errors.  No arguments.
    Connect = CMD_CONNECT,

    /// `buf[3]` = 2-bit DP register index, `buf[4..8]` = value.
    WriteDReg = CMD_WRITE_DREG,

    /// `buf[3]` = 2-bit DP register index.  Replies `buf[1..5]` = value.
    ReadDReg = CMD_READ_DREG,

    /// `buf[2..4]` = 16-bit AP address, `buf[4..8]` = value.
    WriteCReg = CMD_WRITE_CREG,

    /// `buf[2..4]` = 16-bit AP address.  Replies `buf[1..5]` = value.
    ReadCReg = CMD_READ_CREG,

    /// `buf[2]` = element size (1/2/4), `buf[3]` = byte count,
    /// `buf[4..8]` = address, `buf[8..8+count]` = data.
    WriteMem = CMD_WRITE_MEM,

    /// `buf[2]` = element size, `buf[3]` = byte count, `buf[4..8]` = address.
    /// Replies `buf[1..1+count]` = data.
    ReadMem = CMD_READ_MEM,

    /// `buf[3]` = core register number.  Replies `buf[1..5]` = value.
    ReadReg = CMD_READ_REG,

    /// `buf[3]` = core register number, `buf[4..8]` = value.
    WriteReg = CMD_WRITE_REG,

    /// Halt the core.  No arguments.
    TargetHalt = CMD_TARGET_HALT,

    /// Resume execution.  No arguments.
    TargetGo = CMD_TARGET_GO,

    /// Step one instruction, preserving interrupt masking.  No arguments.
    TargetStep = CMD_TARGET_STEP,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Connect => write!(f, "Connect"),
            Command::WriteDReg => write!(f, "Write DP Register"),
            Command::ReadDReg => write!(f, "Read DP Register"),
            Command::WriteCReg => write!(f, "Write AP Register"),
            Command::ReadCReg => write!(f, "Read AP Register"),
            Command::WriteMem => write!(f, "Write Memory"),
            Command::ReadMem => write!(f, "Read Memory"),
            Command::ReadReg => write!(f, "Read Core Register"),
            Command::WriteReg => write!(f, "Write Core Register"),
            Command::TargetHalt => write!(f, "Target Halt"),
            Command::TargetGo => write!(f, "Target Go"),
            Command::TargetStep => write!(f, "Target Step"),
        }
    }
}
