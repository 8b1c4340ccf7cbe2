//! Instruction decoding.
//!
//! Every LC-3 instruction is one 16-bit word with the opcode in bits
//! 15..12. Operand fields sit at fixed positions:
//!
//! ```text
//! 15  12 11  9 8   6 5 4       0
//! ADD    DR    SR1   0 00  SR2
//! ADD    DR    SR1   1 imm5
//! BR     n z p PCoffset9
//! JSR    1 PCoffset11
//! JSRR   0 00  BaseR 000000
//! LDR    DR    BaseR offset6
//! TRAP   0000  trapvect8
//! ```
//!
//! Decoding is total: all sixteen opcode values map to an [`Instruction`].
//! Offsets are sign-extended here so executors only add.

use std::fmt;

/// Widen the low `bit_count` bits of `value` to 16 bits, two's complement.
///
/// Bits above `bit_count` in the input are ignored.
#[inline]
pub fn sign_extend(value: u16, bit_count: u32) -> u16 {
    if bit_count == 0 || bit_count >= 16 {
        return value;
    }
    let mask = (1u16 << bit_count) - 1;
    let value = value & mask;
    if (value >> (bit_count - 1)) & 1 != 0 {
        value | !mask
    } else {
        value
    }
}

/// The sixteen opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Br = 0,
    Add,
    Ld,
    St,
    Jsr,
    And,
    Ldr,
    Str,
    Rti,
    Not,
    Ldi,
    Sti,
    Jmp,
    Res,
    Lea,
    Trap,
}

impl Opcode {
    /// Opcode in the top four bits of `word`.
    pub fn from_word(word: u16) -> Self {
        match word >> 12 {
            0x0 => Opcode::Br,
            0x1 => Opcode::Add,
            0x2 => Opcode::Ld,
            0x3 => Opcode::St,
            0x4 => Opcode::Jsr,
            0x5 => Opcode::And,
            0x6 => Opcode::Ldr,
            0x7 => Opcode::Str,
            0x8 => Opcode::Rti,
            0x9 => Opcode::Not,
            0xA => Opcode::Ldi,
            0xB => Opcode::Sti,
            0xC => Opcode::Jmp,
            0xD => Opcode::Res,
            0xE => Opcode::Lea,
            _ => Opcode::Trap,
        }
    }
}

/// Second ALU operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOperand {
    Reg(u8),
    /// Sign-extended imm5.
    Imm(u16),
}

/// JSR target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsrTarget {
    /// JSR: sign-extended PCoffset11.
    Offset(u16),
    /// JSRR: base register.
    Reg(u8),
}

/// A decoded instruction. Offsets are already sign-extended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Br { mask: u16, offset: u16 },
    Add { dr: u8, sr1: u8, operand: AluOperand },
    Ld { dr: u8, offset: u16 },
    St { sr: u8, offset: u16 },
    Jsr { target: JsrTarget },
    And { dr: u8, sr1: u8, operand: AluOperand },
    Ldr { dr: u8, base: u8, offset: u16 },
    Str { sr: u8, base: u8, offset: u16 },
    Rti,
    Not { dr: u8, sr: u8 },
    Ldi { dr: u8, offset: u16 },
    Sti { sr: u8, offset: u16 },
    Jmp { base: u8 },
    Reserved,
    Lea { dr: u8, offset: u16 },
    Trap { vector: u8 },
}

#[inline]
fn field(word: u16, shift: u32) -> u8 {
    ((word >> shift) & 0x7) as u8
}

#[inline]
fn pc_offset9(word: u16) -> u16 {
    sign_extend(word & 0x1FF, 9)
}

#[inline]
fn offset6(word: u16) -> u16 {
    sign_extend(word & 0x3F, 6)
}

fn alu_operand(word: u16) -> AluOperand {
    if (word >> 5) & 1 != 0 {
        AluOperand::Imm(sign_extend(word & 0x1F, 5))
    } else {
        AluOperand::Reg(field(word, 0))
    }
}

impl Instruction {
    /// Decode one instruction word.
    pub fn decode(word: u16) -> Self {
        let dr = field(word, 9);
        let sr1 = field(word, 6);

        match Opcode::from_word(word) {
            Opcode::Br => Instruction::Br {
                mask: (word >> 9) & 0x7,
                offset: pc_offset9(word),
            },
            Opcode::Add => Instruction::Add { dr, sr1, operand: alu_operand(word) },
            Opcode::Ld => Instruction::Ld { dr, offset: pc_offset9(word) },
            Opcode::St => Instruction::St { sr: dr, offset: pc_offset9(word) },
            Opcode::Jsr => {
                let target = if (word >> 11) & 1 != 0 {
                    JsrTarget::Offset(sign_extend(word & 0x7FF, 11))
                } else {
                    JsrTarget::Reg(sr1)
                };
                Instruction::Jsr { target }
            }
            Opcode::And => Instruction::And { dr, sr1, operand: alu_operand(word) },
            Opcode::Ldr => Instruction::Ldr { dr, base: sr1, offset: offset6(word) },
            Opcode::Str => Instruction::Str { sr: dr, base: sr1, offset: offset6(word) },
            Opcode::Rti => Instruction::Rti,
            Opcode::Not => Instruction::Not { dr, sr: sr1 },
            Opcode::Ldi => Instruction::Ldi { dr, offset: pc_offset9(word) },
            Opcode::Sti => Instruction::Sti { sr: dr, offset: pc_offset9(word) },
            Opcode::Jmp => Instruction::Jmp { base: sr1 },
            Opcode::Res => Instruction::Reserved,
            Opcode::Lea => Instruction::Lea { dr, offset: pc_offset9(word) },
            Opcode::Trap => Instruction::Trap { vector: (word & 0xFF) as u8 },
        }
    }

    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::Br { .. } => Opcode::Br,
            Instruction::Add { .. } => Opcode::Add,
            Instruction::Ld { .. } => Opcode::Ld,
            Instruction::St { .. } => Opcode::St,
            Instruction::Jsr { .. } => Opcode::Jsr,
            Instruction::And { .. } => Opcode::And,
            Instruction::Ldr { .. } => Opcode::Ldr,
            Instruction::Str { .. } => Opcode::Str,
            Instruction::Rti => Opcode::Rti,
            Instruction::Not { .. } => Opcode::Not,
            Instruction::Ldi { .. } => Opcode::Ldi,
            Instruction::Sti { .. } => Opcode::Sti,
            Instruction::Jmp { .. } => Opcode::Jmp,
            Instruction::Reserved => Opcode::Res,
            Instruction::Lea { .. } => Opcode::Lea,
            Instruction::Trap { .. } => Opcode::Trap,
        }
    }
}

impl fmt::Display for AluOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AluOperand::Reg(r) => write!(f, "R{}", r),
            AluOperand::Imm(imm) => write!(f, "#{}", *imm as i16),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Instruction::Br { mask, offset } => {
                let n = if mask & 0b100 != 0 { "n" } else { "" };
                let z = if mask & 0b010 != 0 { "z" } else { "" };
                let p = if mask & 0b001 != 0 { "p" } else { "" };
                write!(f, "BR{}{}{} #{}", n, z, p, offset as i16)
            }
            Instruction::Add { dr, sr1, operand } => write!(f, "ADD R{}, R{}, {}", dr, sr1, operand),
            Instruction::Ld { dr, offset } => write!(f, "LD R{}, #{}", dr, offset as i16),
            Instruction::St { sr, offset } => write!(f, "ST R{}, #{}", sr, offset as i16),
            Instruction::Jsr { target: JsrTarget::Offset(offset) } => write!(f, "JSR #{}", offset as i16),
            Instruction::Jsr { target: JsrTarget::Reg(base) } => write!(f, "JSRR R{}", base),
            Instruction::And { dr, sr1, operand } => write!(f, "AND R{}, R{}, {}", dr, sr1, operand),
            Instruction::Ldr { dr, base, offset } => write!(f, "LDR R{}, R{}, #{}", dr, base, offset as i16),
            Instruction::Str { sr, base, offset } => write!(f, "STR R{}, R{}, #{}", sr, base, offset as i16),
            Instruction::Rti => write!(f, "RTI"),
            Instruction::Not { dr, sr } => write!(f, "NOT R{}, R{}", dr, sr),
            Instruction::Ldi { dr, offset } => write!(f, "LDI R{}, #{}", dr, offset as i16),
            Instruction::Sti { sr, offset } => write!(f, "STI R{}, #{}", sr, offset as i16),
            Instruction::Jmp { base } => write!(f, "JMP R{}", base),
            Instruction::Reserved => write!(f, "RESERVED"),
            Instruction::Lea { dr, offset } => write!(f, "LEA R{}, #{}", dr, offset as i16),
            Instruction::Trap { vector } => write!(f, "TRAP x{:02X}", vector),
        }
    }
}
