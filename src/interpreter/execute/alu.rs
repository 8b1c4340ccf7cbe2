//! ADD, AND, NOT. Arithmetic wraps modulo 2^16; all three set the
//! condition code from the destination.

use crate::interpreter::decode::{AluOperand, Instruction};
use crate::interpreter::state::Registers;

pub struct AluUnit;

impl AluUnit {
    /// Returns `true` if `instr` was an ALU instruction.
    pub fn execute(instr: Instruction, regs: &mut Registers) -> bool {
        match instr {
            Instruction::Add { dr, sr1, operand } => {
                let result = regs.get(sr1).wrapping_add(Self::operand(operand, regs));
                regs.set_with_flags(dr, result);
                true
            }
            Instruction::And { dr, sr1, operand } => {
                let result = regs.get(sr1) & Self::operand(operand, regs);
                regs.set_with_flags(dr, result);
                true
            }
            Instruction::Not { dr, sr } => {
                let result = !regs.get(sr);
                regs.set_with_flags(dr, result);
                true
            }
            _ => false,
        }
    }

    #[inline]
    fn operand(operand: AluOperand, regs: &Registers) -> u16 {
        match operand {
            AluOperand::Reg(r) => regs.get(r),
            AluOperand::Imm(imm) => imm,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::traits::CondFlag;

    fn exec(word: u16, regs: &mut Registers) {
        assert!(AluUnit::execute(Instruction::decode(word), regs));
    }

    #[test]
    fn test_add_wraps_to_zero() {
        let mut regs = Registers::new(0);
        regs.set(1, 0xFFFF);
        regs.set(2, 0x0001);
        exec(0x1042, &mut regs); // ADD R0, R1, R2
        assert_eq!(regs.get(0), 0);
        assert_eq!(regs.cond(), CondFlag::Zero);
    }

    #[test]
    fn test_add_immediate_negative() {
        let mut regs = Registers::new(0);
        exec(0x1025, &mut regs); // ADD R0, R0, #5
        exec(0x103E, &mut regs); // ADD R0, R0, #-2
        assert_eq!(regs.get(0), 3);
        assert_eq!(regs.cond(), CondFlag::Positive);

        exec(0x1038, &mut regs); // ADD R0, R0, #-8
        assert_eq!(regs.get(0), 0xFFFB);
        assert_eq!(regs.cond(), CondFlag::Negative);
    }

    #[test]
    fn test_and_register_and_immediate() {
        let mut regs = Registers::new(0);
        regs.set(1, 0b1100);
        regs.set(2, 0b1010);
        exec(0x5042, &mut regs); // AND R0, R1, R2
        assert_eq!(regs.get(0), 0b1000);

        exec(0x5020, &mut regs); // AND R0, R0, #0
        assert_eq!(regs.get(0), 0);
        assert_eq!(regs.cond(), CondFlag::Zero);

        regs.set(3, 0x8F0F);
        exec(0x56FF, &mut regs); // AND R3, R3, #-1
        assert_eq!(regs.get(3), 0x8F0F);
        assert_eq!(regs.cond(), CondFlag::Negative);
    }

    #[test]
    fn test_not() {
        let mut regs = Registers::new(0);
        regs.set(1, 0x00FF);
        exec(0x907F, &mut regs); // NOT R0, R1
        assert_eq!(regs.get(0), 0xFF00);
        assert_eq!(regs.cond(), CondFlag::Negative);

        regs.set(1, 0xFFFF);
        exec(0x907F, &mut regs);
        assert_eq!(regs.cond(), CondFlag::Zero);
    }

    #[test]
    fn test_not_an_alu_op() {
        let mut regs = Registers::new(0);
        assert!(!AluUnit::execute(Instruction::decode(0xF025), &mut regs));
    }
}
