//! Processor state: register file, PC, condition code, run state.

use std::fmt;

use super::traits::CondFlag;

/// Number of general purpose registers.
pub const NUM_GPRS: usize = 8;

/// Link register written by JSR, JSRR and TRAP.
pub const R7: u8 = 7;

/// Lifecycle of the run loop. No transition leaves `Halted` or `Aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Running,
    /// Stopped by the HALT trap.
    Halted,
    /// Stopped by RTI or the reserved opcode.
    Aborted,
}

/// R0-R7, PC and the condition register.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Registers {
    gprs: [u16; NUM_GPRS],
    /// Program counter. Already points past the current instruction
    /// while it executes.
    pub pc: u16,
    cond: CondFlag,
}

impl Registers {
    /// Zeroed registers, PC at `pc`, condition P.
    pub fn new(pc: u16) -> Self {
        Self {
            pc,
            ..Self::default()
        }
    }

    /// Read R0-R7. Only the low three bits of `reg` are used.
    #[inline]
    pub fn get(&self, reg: u8) -> u16 {
        self.gprs[(reg & 0x7) as usize]
    }

    /// Write R0-R7 without touching the condition code.
    #[inline]
    pub fn set(&mut self, reg: u8, value: u16) {
        self.gprs[(reg & 0x7) as usize] = value;
    }

    /// Write a register and recompute the condition code from it.
    #[inline]
    pub fn set_with_flags(&mut self, reg: u8, value: u16) {
        self.set(reg, value);
        self.update_flags(reg);
    }

    /// Recompute the condition code from `reg`.
    #[inline]
    pub fn update_flags(&mut self, reg: u8) {
        self.cond = CondFlag::from_value(self.get(reg));
    }

    #[inline]
    pub fn cond(&self) -> CondFlag {
        self.cond
    }

    pub fn gprs(&self) -> &[u16; NUM_GPRS] {
        &self.gprs
    }
}

impl fmt::Debug for Registers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Registers {{ pc: 0x{:04X}, cond: {:?}", self.pc, self.cond)?;
        for (i, v) in self.gprs.iter().enumerate().filter(|(_, v)| **v != 0) {
            write!(f, ", r{}: 0x{:04X}", i, v)?;
        }
        write!(f, " }}")
    }
}
