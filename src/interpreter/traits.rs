//! Shared interpreter types.
//!
//! - [`CondFlag`]: the condition-code register, always exactly one of N/Z/P
//! - [`ExecuteResult`]: what an executed instruction asks of the run loop
//! - [`VmError`]: host-side failures that stop the interpreter

use std::io;

use thiserror::Error;

use super::decode::Opcode;

/// Condition code. Exactly one is set after any flag-defining instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u16)]
pub enum CondFlag {
    /// P: result greater than zero.
    #[default]
    Positive = 1 << 0,
    /// Z: result is zero.
    Zero = 1 << 1,
    /// N: result has bit 15 set.
    Negative = 1 << 2,
}

impl CondFlag {
    /// Derive the condition code from a register value.
    #[inline]
    pub fn from_value(value: u16) -> Self {
        if value == 0 {
            CondFlag::Zero
        } else if value >> 15 != 0 {
            CondFlag::Negative
        } else {
            CondFlag::Positive
        }
    }

    /// Bit pattern as stored in the condition register.
    #[inline]
    pub fn bits(self) -> u16 {
        self as u16
    }

    /// Whether a BR mask (`n << 2 | z << 1 | p`) selects this condition.
    #[inline]
    pub fn matches(self, mask: u16) -> bool {
        mask & self.bits() != 0
    }
}

/// Result of executing one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteResult {
    /// Fetch the next instruction.
    Continue,
    /// HALT trap: stop the loop normally.
    Halt,
    /// RTI or the reserved opcode: unrecoverable.
    Abort {
        /// Opcode that triggered the abort.
        opcode: Opcode,
    },
}

/// Errors that stop the interpreter.
#[derive(Debug, Error)]
pub enum VmError {
    /// Host console failed during a trap service.
    #[error("console I/O failed in {service}")]
    Console {
        /// Trap service that was running.
        service: &'static str,
        #[source]
        source: io::Error,
    },
}
