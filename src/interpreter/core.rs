//! The CPU: fetch, decode, execute.
//!
//! One [`Cpu::step`] is one instruction:
//!
//! ```text
//!  fetch  word = bus.read(PC); PC += 1
//!  decode Instruction::decode(word)
//!  exec   Executor::execute -> Continue | Halt | Abort
//! ```
//!
//! The fetch goes through the bus like any other load, so fetching from
//! KBSR polls the keyboard. Once halted or aborted the CPU stays stopped
//! until [`Cpu::reset`].

use crate::device::bus::Bus;

use super::decode::{Instruction, Opcode};
use super::execute::Executor;
use super::state::{Registers, RunState};
use super::traits::{ExecuteResult, VmError};

/// Result of one [`Cpu::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// Instruction retired, keep going.
    Continue,
    /// The CPU is not running (now or already).
    Stopped(RunState),
}

/// Instruction that caused an abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault {
    pub opcode: Opcode,
    /// Address of the offending instruction.
    pub pc: u16,
}

/// Architectural state plus run bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct Cpu {
    regs: Registers,
    state: RunState,
    steps: u64,
    trace: bool,
    fault: Option<Fault>,
}

impl Cpu {
    /// CPU about to fetch from `pc_start`, condition code P.
    pub fn new(pc_start: u16) -> Self {
        Self {
            regs: Registers::new(pc_start),
            ..Self::default()
        }
    }

    /// Clear registers and counters and start again at `pc_start`.
    pub fn reset(&mut self, pc_start: u16) {
        let trace = self.trace;
        *self = Self::new(pc_start);
        self.trace = trace;
    }

    /// Log every retired instruction at `trace` level.
    pub fn set_trace(&mut self, trace: bool) {
        self.trace = trace;
    }

    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.regs
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    /// Instructions executed since the last reset.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn fault(&self) -> Option<Fault> {
        self.fault
    }

    /// Execute one instruction.
    pub fn step(&mut self, bus: &mut Bus) -> Result<StepResult, VmError> {
        if !self.is_running() {
            return Ok(StepResult::Stopped(self.state));
        }

        let pc = self.regs.pc;
        let word = bus.read(pc);
        self.regs.pc = pc.wrapping_add(1);

        let instr = Instruction::decode(word);
        if self.trace {
            log::trace!("0x{:04X}: {:04X}  {}", pc, word, instr);
        }

        let result = Executor::execute(instr, &mut self.regs, bus)?;
        self.steps += 1;

        match result {
            ExecuteResult::Continue => Ok(StepResult::Continue),
            ExecuteResult::Halt => {
                log::info!("halted at 0x{:04X} after {} instructions", pc, self.steps);
                self.state = RunState::Halted;
                Ok(StepResult::Stopped(self.state))
            }
            ExecuteResult::Abort { opcode } => {
                log::error!("bad opcode {:?} (0x{:04X}) at 0x{:04X}", opcode, word, pc);
                self.fault = Some(Fault { opcode, pc });
                self.state = RunState::Aborted;
                Ok(StepResult::Stopped(self.state))
            }
        }
    }
}
