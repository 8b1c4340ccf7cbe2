//! Execution units.
//!
//! | Unit | Instructions |
//! |------|--------------|
//! | [`AluUnit`] | ADD, AND, NOT |
//! | [`MemoryUnit`] | LD, LDI, LDR, LEA, ST, STI, STR |
//! | [`ControlUnit`] | BR, JMP, JSR, JSRR |
//! | [`TrapUnit`] | TRAP |
//!
//! RTI and the reserved opcode have no unit; [`Executor`] turns them into
//! [`ExecuteResult::Abort`].

mod alu;
mod control;
mod memory;
mod trap;

pub use alu::AluUnit;
pub use control::ControlUnit;
pub use memory::MemoryUnit;
pub use trap::{TrapUnit, TrapVector};

use crate::device::bus::Bus;
use crate::interpreter::decode::Instruction;
use crate::interpreter::state::Registers;
use crate::interpreter::traits::{ExecuteResult, VmError};

/// Routes a decoded instruction to the unit that implements it.
pub struct Executor;

impl Executor {
    /// Execute `instr`. PC must already point past it.
    pub fn execute(
        instr: Instruction,
        regs: &mut Registers,
        bus: &mut Bus,
    ) -> Result<ExecuteResult, VmError> {
        match instr {
            Instruction::Add { .. } | Instruction::And { .. } | Instruction::Not { .. } => {
                AluUnit::execute(instr, regs);
                Ok(ExecuteResult::Continue)
            }
            Instruction::Ld { .. }
            | Instruction::Ldi { .. }
            | Instruction::Ldr { .. }
            | Instruction::Lea { .. }
            | Instruction::St { .. }
            | Instruction::Sti { .. }
            | Instruction::Str { .. } => {
                MemoryUnit::execute(instr, regs, bus);
                Ok(ExecuteResult::Continue)
            }
            Instruction::Br { .. } | Instruction::Jmp { .. } | Instruction::Jsr { .. } => {
                ControlUnit::execute(instr, regs);
                Ok(ExecuteResult::Continue)
            }
            Instruction::Trap { vector } => TrapUnit::execute(vector, regs, bus),
            Instruction::Rti | Instruction::Reserved => Ok(ExecuteResult::Abort {
                opcode: instr.opcode(),
            }),
        }
    }
}
