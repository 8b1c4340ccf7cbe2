//! Loads and stores.
//!
//! Every access goes through the instrumented [`Bus`]: a load of KBSR
//! polls the keyboard, a store into the interrupt window kicks a device.
//! Address arithmetic wraps at 16 bits.
//!
//! | Form | Effective address |
//! |------|-------------------|
//! | LD / ST | `PC + offset9` |
//! | LDI / STI | `mem[PC + offset9]` |
//! | LDR / STR | `BaseR + offset6` |
//! | LEA | `PC + offset9` (no access) |

use crate::device::bus::Bus;
use crate::interpreter::decode::Instruction;
use crate::interpreter::state::Registers;

pub struct MemoryUnit;

impl MemoryUnit {
    /// Returns `true` if `instr` was a load, store or LEA.
    pub fn execute(instr: Instruction, regs: &mut Registers, bus: &mut Bus) -> bool {
        match instr {
            Instruction::Ld { dr, offset } => {
                let value = bus.read(regs.pc.wrapping_add(offset));
                regs.set_with_flags(dr, value);
                true
            }
            Instruction::Ldi { dr, offset } => {
                let pointer = bus.read(regs.pc.wrapping_add(offset));
                let value = bus.read(pointer);
                regs.set_with_flags(dr, value);
                true
            }
            Instruction::Ldr { dr, base, offset } => {
                let value = bus.read(regs.get(base).wrapping_add(offset));
                regs.set_with_flags(dr, value);
                true
            }
            Instruction::Lea { dr, offset } => {
                regs.set_with_flags(dr, regs.pc.wrapping_add(offset));
                true
            }
            Instruction::St { sr, offset } => {
                bus.write(regs.pc.wrapping_add(offset), regs.get(sr));
                true
            }
            Instruction::Sti { sr, offset } => {
                let pointer = bus.read(regs.pc.wrapping_add(offset));
                bus.write(pointer, regs.get(sr));
                true
            }
            Instruction::Str { sr, base, offset } => {
                bus.write(regs.get(base).wrapping_add(offset), regs.get(sr));
                true
            }
            _ => false,
        }
    }
}
