//! TRAP service routines.
//!
//! The host implements the standard service vectors directly instead of
//! jumping through the trap vector table. R7 receives the return address
//! before the service runs, as the hardware does.
//!
//! | Vector | Service | Effect |
//! |--------|---------|--------|
//! | x20 | GETC  | R0 = next input char, no echo |
//! | x21 | OUT   | write R0[7:0] |
//! | x22 | PUTS  | write one char per word from mem[R0] until 0 |
//! | x23 | IN    | R0 = next input char, echoed |
//! | x24 | PUTSP | write two chars per word from mem[R0] until 0 |
//! | x25 | HALT  | flush and stop |
//!
//! End of input reads as `0xFFFF`. Unknown vectors are logged and skipped.

use crate::device::bus::Bus;
use crate::device::memory_map::MEMORY_MAX;
use crate::interpreter::state::{Registers, R7};
use crate::interpreter::traits::{ExecuteResult, VmError};

/// Value loaded into R0 when input is exhausted.
pub const INPUT_EOF: u16 = 0xFFFF;

/// Known trap vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TrapVector {
    Getc = 0x20,
    Out = 0x21,
    Puts = 0x22,
    In = 0x23,
    Putsp = 0x24,
    Halt = 0x25,
}

impl TrapVector {
    pub fn from_u8(vector: u8) -> Option<Self> {
        match vector {
            0x20 => Some(TrapVector::Getc),
            0x21 => Some(TrapVector::Out),
            0x22 => Some(TrapVector::Puts),
            0x23 => Some(TrapVector::In),
            0x24 => Some(TrapVector::Putsp),
            0x25 => Some(TrapVector::Halt),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TrapVector::Getc => "GETC",
            TrapVector::Out => "OUT",
            TrapVector::Puts => "PUTS",
            TrapVector::In => "IN",
            TrapVector::Putsp => "PUTSP",
            TrapVector::Halt => "HALT",
        }
    }
}

pub struct TrapUnit;

impl TrapUnit {
    pub fn execute(vector: u8, regs: &mut Registers, bus: &mut Bus) -> Result<ExecuteResult, VmError> {
        regs.set(R7, regs.pc);

        let Some(trap) = TrapVector::from_u8(vector) else {
            log::warn!("unknown trap vector x{:02X} at 0x{:04X}", vector, regs.pc.wrapping_sub(1));
            return Ok(ExecuteResult::Continue);
        };
        let service = trap.name();
        let io_err = |source| VmError::Console { service, source };

        match trap {
            TrapVector::Getc => {
                let c = bus.console_mut().read_char().map_err(io_err)?;
                regs.set_with_flags(0, c.map_or(INPUT_EOF, u16::from));
            }
            TrapVector::Out => {
                let console = bus.console_mut();
                console.write_bytes(&[regs.get(0) as u8]).map_err(io_err)?;
                console.flush().map_err(io_err)?;
            }
            TrapVector::Puts => {
                let bytes = Self::collect_string(bus, regs.get(0), false);
                let console = bus.console_mut();
                console.write_bytes(&bytes).map_err(io_err)?;
                console.flush().map_err(io_err)?;
            }
            TrapVector::In => {
                let console = bus.console_mut();
                let c = console.read_char().map_err(io_err)?;
                if let Some(c) = c {
                    console.write_bytes(&[c]).map_err(io_err)?;
                    console.flush().map_err(io_err)?;
                }
                regs.set_with_flags(0, c.map_or(INPUT_EOF, u16::from));
            }
            TrapVector::Putsp => {
                let bytes = Self::collect_string(bus, regs.get(0), true);
                let console = bus.console_mut();
                console.write_bytes(&bytes).map_err(io_err)?;
                console.flush().map_err(io_err)?;
            }
            TrapVector::Halt => {
                log::debug!("HALT at 0x{:04X}", regs.pc.wrapping_sub(1));
                bus.console_mut().flush().map_err(io_err)?;
                return Ok(ExecuteResult::Halt);
            }
        }

        Ok(ExecuteResult::Continue)
    }

    /// Gather a zero-terminated string starting at `addr`.
    ///
    /// Reads raw memory so a string crossing KBSR does not consume input.
    /// Stops after one full pass over memory if no terminator is found.
    fn collect_string(bus: &Bus, addr: u16, packed: bool) -> Vec<u8> {
        let mem = bus.memory();
        let mut out = Vec::new();
        let mut at = addr;

        for _ in 0..MEMORY_MAX {
            let word = mem.get(at);
            if word == 0 {
                break;
            }
            out.push(word as u8);
            if packed {
                let high = (word >> 8) as u8;
                if high != 0 {
                    out.push(high);
                }
            }
            at = at.wrapping_add(1);
        }
        out
    }
}
