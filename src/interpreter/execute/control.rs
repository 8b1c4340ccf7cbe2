//! Control flow: BR, JMP, JSR, JSRR.
//!
//! PC has already been incremented when these run, so PC-relative targets
//! are relative to the following instruction.

use crate::interpreter::decode::{Instruction, JsrTarget};
use crate::interpreter::state::{Registers, R7};

pub struct ControlUnit;

impl ControlUnit {
    /// Returns `true` if `instr` was a control-flow instruction.
    pub fn execute(instr: Instruction, regs: &mut Registers) -> bool {
        match instr {
            Instruction::Br { mask, offset } => {
                if regs.cond().matches(mask) {
                    regs.pc = regs.pc.wrapping_add(offset);
                }
                true
            }
            Instruction::Jmp { base } => {
                regs.pc = regs.get(base);
                true
            }
            Instruction::Jsr { target } => {
                // Read the base before R7 is overwritten (JSRR R7).
                let return_addr = regs.pc;
                let target = match target {
                    JsrTarget::Offset(offset) => return_addr.wrapping_add(offset),
                    JsrTarget::Reg(base) => regs.get(base),
                };
                regs.set(R7, return_addr);
                regs.pc = target;
                true
            }
            _ => false,
        }
    }
}
