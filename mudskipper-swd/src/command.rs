// Copyright (C) 2026 Mudskipper Project
//
// MIT License

//! Host command dispatch.
//!
//! The outer USB dispatcher lends the probe's command buffer to
//! [`CommandProcessor::process`] for the duration of one command.  The
//! command byte sits at `buf[0]`; replies overwrite the buffer with a status
//! byte at `buf[0]` and data from `buf[1]`.  See `mudskipper-bin` for the
//! per-command layouts.
//!
//! Multi-byte fields travel MSB first; memory block payloads are raw byte
//! streams in ascending address order.

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use mudskipper_bin::{Command, MAX_COMMAND_SIZE, RC_ILLEGAL_COMMAND, RC_OK};

use crate::SwdError;
use crate::debug::DebugInterface;
use crate::interface::{DpRead, DpWrite, ElementSize};
use crate::protocol::SwdIo;

/// Command dispatcher facade.
///
/// Unmarshals one host command from the buffer, runs it against the
/// [`DebugInterface`], and marshals the reply.  Argument validation happens
/// before anything touches the wire.
#[derive(Debug)]
pub struct CommandProcessor<IO: SwdIo> {
    debug: DebugInterface<IO>,
}

impl<IO: SwdIo> CommandProcessor<IO> {
    /// Creates a new command processor over the given [`DebugInterface`].
    pub fn new(debug: DebugInterface<IO>) -> Self {
        Self { debug }
    }

    /// Creates a new command processor directly from a pin implementation.
    pub fn from_io(io: IO) -> Self {
        Self::new(DebugInterface::from_io(io))
    }

    /// Returns a mutable reference to the underlying [`DebugInterface`].
    pub fn debug_if(&mut self) -> &mut DebugInterface<IO> {
        &mut self.debug
    }

    /// Executes the command in `buf` and writes the reply over it.
    ///
    /// Returns the total reply length: at least 1 for the status byte at
    /// `buf[0]`, plus reply data from `buf[1]` on success.  On any error the
    /// reply is the status byte alone.
    pub fn process(&mut self, buf: &mut [u8]) -> usize {
        let Some(&command_byte) = buf.first() else {
            return 0;
        };

        let Ok(command) = Command::try_from(command_byte) else {
            warn!("Error: unknown command byte 0x{command_byte:02X}");
            buf[0] = RC_ILLEGAL_COMMAND;
            return 1;
        };

        trace!("Exec:  {command}");
        match self.handle(command, buf) {
            Ok(reply_length) => {
                buf[0] = RC_OK;
                reply_length
            }
            Err(e) => {
                warn!("Error: {command} failed: {e}");
                buf[0] = e.status_code();
                1
            }
        }
    }

    fn handle(&mut self, command: Command, buf: &mut [u8]) -> Result<usize, SwdError> {
        match command {
            Command::Connect => {
                self.debug.connect()?;
                Ok(1)
            }

            Command::WriteDReg => {
                let reg =
                    DpWrite::from_index(byte_at(buf, 3)?).ok_or(SwdError::IllegalParams)?;
                let value = word_at(buf, 4)?;
                self.debug.swd_if().write_dp(reg, value)?;
                Ok(1)
            }

            Command::ReadDReg => {
                let reg = DpRead::from_index(byte_at(buf, 3)?);
                reply_space(buf, 5)?;
                let value = self.debug.swd_if().read_dp(reg)?;
                put_word(buf, 1, value);
                Ok(5)
            }

            Command::WriteCReg => {
                let addr = ap_addr_at(buf, 2)?;
                let value = word_at(buf, 4)?;
                self.debug.swd_if().write_ap(addr, value)?;
                Ok(1)
            }

            Command::ReadCReg => {
                let addr = ap_addr_at(buf, 2)?;
                reply_space(buf, 5)?;
                let value = self.debug.swd_if().read_ap(addr)?;
                put_word(buf, 1, value);
                Ok(5)
            }

            Command::WriteMem => {
                let (size, count, addr) = mem_args(buf)?;
                let data = buf.get(8..8 + count).ok_or(SwdError::IllegalParams)?;
                self.debug.swd_if().write_block(size, addr, data)?;
                Ok(1)
            }

            Command::ReadMem => {
                let (size, count, addr) = mem_args(buf)?;
                // Requested block plus status byte must fit the buffer
                if count + 1 > MAX_COMMAND_SIZE {
                    return Err(SwdError::IllegalParams);
                }
                let out = buf.get_mut(1..1 + count).ok_or(SwdError::IllegalParams)?;
                self.debug.swd_if().read_block(size, addr, out)?;
                Ok(count + 1)
            }

            Command::ReadReg => {
                let reg = byte_at(buf, 3)?;
                reply_space(buf, 5)?;
                let value = self.debug.read_core_reg(reg)?;
                put_word(buf, 1, value);
                Ok(5)
            }

            Command::WriteReg => {
                let reg = byte_at(buf, 3)?;
                let value = word_at(buf, 4)?;
                self.debug.write_core_reg(reg, value)?;
                Ok(1)
            }

            Command::TargetHalt => {
                self.debug.halt()?;
                Ok(1)
            }

            Command::TargetGo => {
                self.debug.go()?;
                Ok(1)
            }

            Command::TargetStep => {
                self.debug.step()?;
                Ok(1)
            }
        }
    }
}

// Unmarshalling helpers.  Anything missing from the buffer is the host's
// fault and reported as IllegalParams before the wire is touched.

fn byte_at(buf: &[u8], offset: usize) -> Result<u8, SwdError> {
    buf.get(offset).copied().ok_or(SwdError::IllegalParams)
}

fn word_at(buf: &[u8], offset: usize) -> Result<u32, SwdError> {
    let bytes = buf.get(offset..offset + 4).ok_or(SwdError::IllegalParams)?;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn put_word(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}

fn reply_space(buf: &[u8], length: usize) -> Result<(), SwdError> {
    if buf.len() < length {
        return Err(SwdError::IllegalParams);
    }
    Ok(())
}

// 16-bit AP address; its two reserved low bits must be zero.
fn ap_addr_at(buf: &[u8], offset: usize) -> Result<u16, SwdError> {
    let bytes = buf.get(offset..offset + 2).ok_or(SwdError::IllegalParams)?;
    let addr = u16::from_be_bytes([bytes[0], bytes[1]]);
    if addr & 0x0003 != 0 {
        return Err(SwdError::IllegalParams);
    }
    Ok(addr)
}

// Common memory command arguments: element size, byte count, address.  The
// halfword lane tables leave odd addresses undefined, so those are rejected
// here.
fn mem_args(buf: &[u8]) -> Result<(ElementSize, usize, u32), SwdError> {
    let size = ElementSize::from_byte(byte_at(buf, 2)?).ok_or(SwdError::IllegalParams)?;
    let count = byte_at(buf, 3)? as usize;
    let addr = word_at(buf, 4)?;
    if size == ElementSize::Half && addr & 1 != 0 {
        return Err(SwdError::IllegalParams);
    }
    Ok((size, count, addr))
}
