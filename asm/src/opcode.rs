//! Opcode classification (spec §4.5): maps an opcode byte stream (with its
//! `0F`/`0F 3A` escapes) plus any ModR/M-derived operands into a mnemonic
//! and operand list. No IL is produced here; [`Instruction`] is still a
//! pure decode-level artifact.

use crate::cc::ConditionCode;
use crate::error::DecodeError;
use crate::gpr::{Gpr, GprRef};
use crate::modrm::{decode_modrm, RegOrMem};
use crate::operand::Operand;
use crate::prefix::{AddressWidth, OperandWidth, PrefixRecord, Repeat, Segment};
use crate::reader::{ByteOracle, Reader};

/// The eight `ADD`-family ALU operations sharing one encoding table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Or,
    Adc,
    Sbb,
    And,
    Sub,
    Xor,
    Cmp,
}

/// The eight `Grp2` shift/rotate operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftOp {
    Rol,
    Ror,
    Rcl,
    Rcr,
    Shl,
    Shr,
    Sal,
    Sar,
}

/// The seven `Grp3` unary/test operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Test,
    Not,
    Neg,
    Mul,
    Imul,
    Div,
    Idiv,
}

/// `Grp5` (opcode `FF`) operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grp5Op {
    Inc,
    Dec,
    CallNear,
    JmpNear,
    Push,
}

/// `Grp8` (opcode `0F BA`) bit operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitOp {
    Bt,
    Bts,
    Btr,
    Btc,
}

/// A string-instruction family member; width is carried on [`Instruction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringOp {
    Movs,
    Cmps,
    Stos,
    Lods,
    Scas,
}

/// The recognized mnemonic for a decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Arith(ArithOp),
    Inc,
    Dec,
    Push,
    PushImm,
    Pop,
    Imul3,
    Imul2,
    Jcc(ConditionCode),
    Mov,
    Lea,
    Nop,
    StringOp(StringOp),
    Shift(ShiftOp),
    Ret,
    RetImm,
    Call,
    Jmp,
    Hlt,
    Unary(UnaryOp),
    Grp5(Grp5Op),
    Int3,
    Int,
    MovapsLoad,
    MovapsStore,
    MovdLoad,
    MovqLoad,
    MovdStore,
    MovqStore,
    Rdtsc,
    Sysenter,
    Palignr,
    Pshufd,
    Pcmpeq,
    SetCc(ConditionCode),
    Cpuid,
    Bt,
    BtGroup(BitOp),
    Shld,
    Shrd,
    Ldmxcsr,
    Stmxcsr,
    Cmpxchg,
    Cmpxchg8b,
    Movzx,
    Movsx,
    Bsf,
    Bsr,
    Xadd,
    Pmovmskb,
    Pxor,
}

/// A fully decoded instruction: mnemonic, operand list, and the total
/// number of bytes consumed including prefixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operands: Vec<Operand>,
    pub operand_width: OperandWidth,
    pub repeat: Option<Repeat>,
    pub segment: Option<Segment>,
    pub length: u64,
}

fn arith_op(group: u8) -> ArithOp {
    match group {
        0 => ArithOp::Add,
        1 => ArithOp::Or,
        2 => ArithOp::Adc,
        3 => ArithOp::Sbb,
        4 => ArithOp::And,
        5 => ArithOp::Sub,
        6 => ArithOp::Xor,
        _ => ArithOp::Cmp,
    }
}

fn reg_operand(index: u8, width_bits: u16) -> Operand {
    Operand::Reg(GprRef::from_index(index, width_bits))
}

fn rm_operand(rm: RegOrMem, width_bits: u16) -> Operand {
    match rm {
        RegOrMem::Reg(i) => reg_operand(i, width_bits),
        RegOrMem::Mem(ea) => Operand::Mem(ea, width_bits),
    }
}

fn shift_op(reg_field: u8) -> ShiftOp {
    match reg_field {
        0 => ShiftOp::Rol,
        1 => ShiftOp::Ror,
        2 => ShiftOp::Rcl,
        3 => ShiftOp::Rcr,
        4 => ShiftOp::Shl,
        5 => ShiftOp::Shr,
        6 => ShiftOp::Sal,
        _ => ShiftOp::Sar,
    }
}

fn unary_op(reg_field: u8) -> UnaryOp {
    match reg_field {
        0 | 1 => UnaryOp::Test,
        2 => UnaryOp::Not,
        3 => UnaryOp::Neg,
        4 => UnaryOp::Mul,
        5 => UnaryOp::Imul,
        6 => UnaryOp::Div,
        _ => UnaryOp::Idiv,
    }
}

fn bit_op(reg_field: u8) -> Option<BitOp> {
    match reg_field {
        4 => Some(BitOp::Bt),
        5 => Some(BitOp::Bts),
        6 => Some(BitOp::Btr),
        7 => Some(BitOp::Btc),
        _ => None,
    }
}

/// Classifies and fully decodes one instruction starting at `reader`'s
/// current position, given its already-scanned prefix record.
pub fn classify<O: ByteOracle + ?Sized>(
    reader: &mut Reader<'_, O>,
    prefixes: &PrefixRecord,
) -> Result<Instruction, DecodeError> {
    let start = reader.pos() - prefixes.consumed as u64;
    let address_width = prefixes.address_width();
    let operand_width = prefixes.operand_width();
    let w = operand_width.bits();

    let opcode_offset = reader.pos();
    let b0 = reader.u8();

    let (opcode, operands) = if b0 == 0x0F {
        decode_0f(reader, prefixes, address_width, w, opcode_offset)?
    } else {
        decode_one_byte(reader, b0, address_width, w, opcode_offset)?
    };

    Ok(Instruction {
        opcode,
        operands,
        operand_width,
        repeat: prefixes.repeat,
        segment: prefixes.segment,
        length: reader.pos() - start,
    })
}

fn decode_one_byte<O: ByteOracle + ?Sized>(
    reader: &mut Reader<'_, O>,
    b0: u8,
    address_width: AddressWidth,
    w: u16,
    opcode_offset: u64,
) -> Result<(Opcode, Vec<Operand>), DecodeError> {
    // Arithmetic family: groups of 8 opcodes starting at 0x00, 0x08, ..., 0x38.
    if b0 < 0x40 && (b0 & 0x07) <= 5 && (b0 & 0xC0) == 0 {
        let group = b0 >> 3;
        let form = b0 & 0x07;
        let op = arith_op(group);
        return Ok(match form {
            0 => {
                let m = decode_modrm(reader, address_width)?;
                (
                    Opcode::Arith(op),
                    vec![rm_operand(m.rm, 8), reg_operand(m.reg, 8)],
                )
            }
            1 => {
                let m = decode_modrm(reader, address_width)?;
                (
                    Opcode::Arith(op),
                    vec![rm_operand(m.rm, w), reg_operand(m.reg, w)],
                )
            }
            2 => {
                let m = decode_modrm(reader, address_width)?;
                (
                    Opcode::Arith(op),
                    vec![reg_operand(m.reg, 8), rm_operand(m.rm, 8)],
                )
            }
            3 => {
                let m = decode_modrm(reader, address_width)?;
                (
                    Opcode::Arith(op),
                    vec![reg_operand(m.reg, w), rm_operand(m.rm, w)],
                )
            }
            4 => {
                let imm = reader.u8() as i64;
                (
                    Opcode::Arith(op),
                    vec![reg_operand(0, 8), Operand::Imm(imm)],
                )
            }
            _ => {
                let imm = read_imm_z(reader, w);
                (
                    Opcode::Arith(op),
                    vec![reg_operand(0, w), Operand::Imm(imm)],
                )
            }
        });
    }

    match b0 {
        0x40..=0x47 => Ok((Opcode::Inc, vec![reg_operand(b0 - 0x40, w)])),
        0x48..=0x4F => Ok((Opcode::Dec, vec![reg_operand(b0 - 0x48, w)])),
        0x50..=0x57 => Ok((Opcode::Push, vec![reg_operand(b0 - 0x50, w)])),
        0x58..=0x5F => Ok((Opcode::Pop, vec![reg_operand(b0 - 0x58, w)])),
        0x68 => {
            let imm = read_imm_z(reader, w);
            Ok((Opcode::PushImm, vec![Operand::Imm(imm)]))
        }
        0x6A => {
            let imm = reader.i8_sext32() as i64;
            Ok((Opcode::PushImm, vec![Operand::Imm(imm)]))
        }
        0x69 => {
            let m = decode_modrm(reader, address_width)?;
            let rm = rm_operand(m.rm, w);
            let imm = read_imm_z(reader, w);
            Ok((
                Opcode::Imul3,
                vec![reg_operand(m.reg, w), rm, Operand::Imm(imm)],
            ))
        }
        0x6B => {
            let m = decode_modrm(reader, address_width)?;
            let rm = rm_operand(m.rm, w);
            let imm = reader.i8_sext32() as i64;
            Ok((
                Opcode::Imul3,
                vec![reg_operand(m.reg, w), rm, Operand::Imm(imm)],
            ))
        }
        0x70..=0x7F => {
            let cc = ConditionCode::from_nibble(b0 & 0x0F).ok_or(DecodeError::InvalidEncoding {
                offset: opcode_offset,
                detail: "undefined Jcc condition nibble",
            })?;
            let rel = reader.i8_sext32() as i64;
            Ok((Opcode::Jcc(cc), vec![Operand::Imm(rel)]))
        }
        0x80 => decode_grp1(reader, address_width, 8, true),
        0x81 => decode_grp1(reader, address_width, w, false),
        0x83 => decode_grp1(reader, address_width, w, true),
        0x88 => decode_mov(reader, address_width, 8, false),
        0x89 => decode_mov(reader, address_width, w, false),
        0x8A => decode_mov(reader, address_width, 8, true),
        0x8B => decode_mov(reader, address_width, w, true),
        0x8D => {
            let m = decode_modrm(reader, address_width)?;
            match m.rm {
                RegOrMem::Mem(ea) => Ok((
                    Opcode::Lea,
                    vec![reg_operand(m.reg, w), Operand::Mem(ea, w)],
                )),
                RegOrMem::Reg(_) => Err(DecodeError::InvalidEncoding {
                    offset: opcode_offset,
                    detail: "LEA requires a memory operand",
                }),
            }
        }
        0x90 => Ok((Opcode::Nop, vec![])),
        0xA4 => Ok((Opcode::StringOp(StringOp::Movs), vec![])),
        0xA5 => Ok((Opcode::StringOp(StringOp::Movs), vec![])),
        0xA6 => Ok((Opcode::StringOp(StringOp::Cmps), vec![])),
        0xA7 => Ok((Opcode::StringOp(StringOp::Cmps), vec![])),
        0xAA => Ok((Opcode::StringOp(StringOp::Stos), vec![])),
        0xAB => Ok((Opcode::StringOp(StringOp::Stos), vec![])),
        0xAC => Ok((Opcode::StringOp(StringOp::Lods), vec![])),
        0xAD => Ok((Opcode::StringOp(StringOp::Lods), vec![])),
        0xAE => Ok((Opcode::StringOp(StringOp::Scas), vec![])),
        0xAF => Ok((Opcode::StringOp(StringOp::Scas), vec![])),
        0xB0..=0xB7 => {
            let imm = reader.u8() as i64;
            Ok((Opcode::Mov, vec![reg_operand(b0 - 0xB0, 8), Operand::Imm(imm)]))
        }
        0xB8..=0xBF => {
            let imm = read_imm_z(reader, w);
            Ok((Opcode::Mov, vec![reg_operand(b0 - 0xB8, w), Operand::Imm(imm)]))
        }
        0xC0 => decode_shift(reader, address_width, 8, ShiftImm::Imm8),
        0xC1 => decode_shift(reader, address_width, w, ShiftImm::Imm8),
        0xC2 => {
            let imm = reader.u16() as i64;
            Ok((Opcode::RetImm, vec![Operand::Imm(imm)]))
        }
        0xC3 => Ok((Opcode::Ret, vec![])),
        0xC6 => {
            let m = decode_modrm(reader, address_width)?;
            let rm = rm_operand(m.rm, 8);
            let imm = reader.u8() as i64;
            Ok((Opcode::Mov, vec![rm, Operand::Imm(imm)]))
        }
        0xC7 => {
            let m = decode_modrm(reader, address_width)?;
            let rm = rm_operand(m.rm, w);
            let imm = read_imm_z(reader, w);
            Ok((Opcode::Mov, vec![rm, Operand::Imm(imm)]))
        }
        0xCC => Ok((Opcode::Int3, vec![])),
        0xCD => {
            let imm = reader.u8() as i64;
            Ok((Opcode::Int, vec![Operand::Imm(imm)]))
        }
        0xD0 => decode_shift(reader, address_width, 8, ShiftImm::One),
        0xD1 => decode_shift(reader, address_width, w, ShiftImm::One),
        0xD2 => decode_shift(reader, address_width, 8, ShiftImm::Cl),
        0xD3 => decode_shift(reader, address_width, w, ShiftImm::Cl),
        0xE8 => {
            let rel = reader.u32() as i32 as i64;
            Ok((Opcode::Call, vec![Operand::Imm(rel)]))
        }
        0xE9 => {
            let rel = reader.u32() as i32 as i64;
            Ok((Opcode::Jmp, vec![Operand::Imm(rel)]))
        }
        0xEB => {
            let rel = reader.i8_sext32() as i64;
            Ok((Opcode::Jmp, vec![Operand::Imm(rel)]))
        }
        0xF4 => Ok((Opcode::Hlt, vec![])),
        0xF6 => decode_grp3(reader, address_width, 8),
        0xF7 => decode_grp3(reader, address_width, w),
        0xFE => {
            let m = decode_modrm(reader, address_width)?;
            let rm = rm_operand(m.rm, 8);
            match m.reg {
                0 => Ok((Opcode::Inc, vec![rm])),
                1 => Ok((Opcode::Dec, vec![rm])),
                _ => Err(DecodeError::InvalidEncoding {
                    offset: opcode_offset,
                    detail: "Grp4 reg field out of range",
                }),
            }
        }
        0xFF => decode_grp5(reader, address_width, w, opcode_offset),
        _ => Err(DecodeError::UnsupportedOpcode {
            offset: opcode_offset,
            byte: b0,
        }),
    }
}

fn decode_mov<O: ByteOracle + ?Sized>(
    reader: &mut Reader<'_, O>,
    address_width: AddressWidth,
    width_bits: u16,
    reg_is_dest: bool,
) -> Result<(Opcode, Vec<Operand>), DecodeError> {
    let m = decode_modrm(reader, address_width)?;
    let rm = rm_operand(m.rm, width_bits);
    let reg = reg_operand(m.reg, width_bits);
    Ok((Opcode::Mov, if reg_is_dest { vec![reg, rm] } else { vec![rm, reg] }))
}

fn decode_grp1<O: ByteOracle + ?Sized>(
    reader: &mut Reader<'_, O>,
    address_width: AddressWidth,
    width_bits: u16,
    imm8: bool,
) -> Result<(Opcode, Vec<Operand>), DecodeError> {
    let m = decode_modrm(reader, address_width)?;
    let rm = rm_operand(m.rm, width_bits);
    let imm = if imm8 {
        reader.i8_sext32() as i64
    } else {
        read_imm_z(reader, width_bits)
    };
    Ok((Opcode::Arith(arith_op(m.reg)), vec![rm, Operand::Imm(imm)]))
}

enum ShiftImm {
    One,
    Cl,
    Imm8,
}

fn decode_shift<O: ByteOracle + ?Sized>(
    reader: &mut Reader<'_, O>,
    address_width: AddressWidth,
    width_bits: u16,
    kind: ShiftImm,
) -> Result<(Opcode, Vec<Operand>), DecodeError> {
    let m = decode_modrm(reader, address_width)?;
    let rm = rm_operand(m.rm, width_bits);
    let count = match kind {
        ShiftImm::One => Operand::Imm(1),
        ShiftImm::Cl => reg_operand(1, 8),
        ShiftImm::Imm8 => Operand::Imm(reader.u8() as i64),
    };
    Ok((Opcode::Shift(shift_op(m.reg)), vec![rm, count]))
}

fn decode_grp3<O: ByteOracle + ?Sized>(
    reader: &mut Reader<'_, O>,
    address_width: AddressWidth,
    width_bits: u16,
) -> Result<(Opcode, Vec<Operand>), DecodeError> {
    let m = decode_modrm(reader, address_width)?;
    let rm = rm_operand(m.rm, width_bits);
    let op = unary_op(m.reg);
    let operands = if matches!(op, UnaryOp::Test) {
        let imm = read_imm_z(reader, width_bits);
        vec![rm, Operand::Imm(imm)]
    } else {
        vec![rm]
    };
    Ok((Opcode::Unary(op), operands))
}

fn decode_grp5<O: ByteOracle + ?Sized>(
    reader: &mut Reader<'_, O>,
    address_width: AddressWidth,
    width_bits: u16,
    opcode_offset: u64,
) -> Result<(Opcode, Vec<Operand>), DecodeError> {
    let m = decode_modrm(reader, address_width)?;
    let rm = rm_operand(m.rm, width_bits);
    let op = match m.reg {
        0 => Grp5Op::Inc,
        1 => Grp5Op::Dec,
        2 => Grp5Op::CallNear,
        4 => Grp5Op::JmpNear,
        6 => Grp5Op::Push,
        _ => {
            return Err(DecodeError::InvalidEncoding {
                offset: opcode_offset,
                detail: "Grp5 reg field has no 32-bit-mode meaning here",
            })
        }
    };
    Ok((Opcode::Grp5(op), vec![rm]))
}

fn read_imm_z<O: ByteOracle + ?Sized>(reader: &mut Reader<'_, O>, width_bits: u16) -> i64 {
    if width_bits == 16 {
        reader.i16_sext32() as i64
    } else {
        reader.u32() as i32 as i64
    }
}

fn decode_0f<O: ByteOracle + ?Sized>(
    reader: &mut Reader<'_, O>,
    prefixes: &PrefixRecord,
    address_width: AddressWidth,
    w: u16,
    opcode_offset: u64,
) -> Result<(Opcode, Vec<Operand>), DecodeError> {
    let simd_w = prefixes.simd_operand_width();
    let b1 = reader.u8();

    match b1 {
        0x1F => {
            // Multi-byte NOP; still carries a ModR/M operand to size correctly.
            let _ = decode_modrm(reader, address_width)?;
            Ok((Opcode::Nop, vec![]))
        }
        0x28 => {
            let m = decode_modrm(reader, address_width)?;
            Ok((
                Opcode::MovapsLoad,
                vec![reg_operand(m.reg, 128), rm_operand(m.rm, 128)],
            ))
        }
        0x29 => {
            let m = decode_modrm(reader, address_width)?;
            Ok((
                Opcode::MovapsStore,
                vec![rm_operand(m.rm, 128), reg_operand(m.reg, 128)],
            ))
        }
        0x31 => Ok((Opcode::Rdtsc, vec![])),
        0x34 => Ok((Opcode::Sysenter, vec![])),
        0x3A => {
            let b2 = reader.u8();
            if b2 == 0x0F {
                let m = decode_modrm(reader, address_width)?;
                let rm = rm_operand(m.rm, simd_w);
                let imm = reader.u8() as i64;
                Ok((
                    Opcode::Palignr,
                    vec![reg_operand(m.reg, simd_w), rm, Operand::Imm(imm)],
                ))
            } else {
                Err(DecodeError::UnsupportedOpcode {
                    offset: opcode_offset,
                    byte: b2,
                })
            }
        }
        0x6E => {
            let m = decode_modrm(reader, address_width)?;
            Ok((
                Opcode::MovdLoad,
                vec![reg_operand(m.reg, simd_w), rm_operand(m.rm, w)],
            ))
        }
        0x6F => {
            let m = decode_modrm(reader, address_width)?;
            Ok((
                Opcode::MovqLoad,
                vec![reg_operand(m.reg, simd_w), rm_operand(m.rm, simd_w)],
            ))
        }
        0x70 => {
            let m = decode_modrm(reader, address_width)?;
            let rm = rm_operand(m.rm, simd_w);
            let imm = reader.u8() as i64;
            Ok((
                Opcode::Pshufd,
                vec![reg_operand(m.reg, simd_w), rm, Operand::Imm(imm)],
            ))
        }
        0x74..=0x76 => {
            let m = decode_modrm(reader, address_width)?;
            Ok((
                Opcode::Pcmpeq,
                vec![reg_operand(m.reg, simd_w), rm_operand(m.rm, simd_w)],
            ))
        }
        0x7E => {
            let m = decode_modrm(reader, address_width)?;
            Ok((
                Opcode::MovdStore,
                vec![rm_operand(m.rm, w), reg_operand(m.reg, simd_w)],
            ))
        }
        0x7F => {
            let m = decode_modrm(reader, address_width)?;
            Ok((
                Opcode::MovqStore,
                vec![rm_operand(m.rm, simd_w), reg_operand(m.reg, simd_w)],
            ))
        }
        0x80..=0x8F => {
            let cc = ConditionCode::from_nibble(b1 & 0x0F).ok_or(DecodeError::InvalidEncoding {
                offset: opcode_offset,
                detail: "undefined Jcc condition nibble",
            })?;
            let rel = reader.u32() as i32 as i64;
            Ok((Opcode::Jcc(cc), vec![Operand::Imm(rel)]))
        }
        0x90..=0x9F => {
            let cc = ConditionCode::from_nibble(b1 & 0x0F).ok_or(DecodeError::InvalidEncoding {
                offset: opcode_offset,
                detail: "undefined SETcc condition nibble",
            })?;
            let m = decode_modrm(reader, address_width)?;
            Ok((Opcode::SetCc(cc), vec![rm_operand(m.rm, 8)]))
        }
        0xA2 => Ok((Opcode::Cpuid, vec![])),
        0xA3 => {
            let m = decode_modrm(reader, address_width)?;
            Ok((Opcode::Bt, vec![rm_operand(m.rm, w), reg_operand(m.reg, w)]))
        }
        0xA4 => {
            let m = decode_modrm(reader, address_width)?;
            let rm = rm_operand(m.rm, w);
            let reg = reg_operand(m.reg, w);
            let imm = Operand::Imm(reader.u8() as i64);
            Ok((Opcode::Shld, vec![rm, reg, imm]))
        }
        0xA5 => {
            let m = decode_modrm(reader, address_width)?;
            Ok((
                Opcode::Shld,
                vec![rm_operand(m.rm, w), reg_operand(m.reg, w), reg_operand(1, 8)],
            ))
        }
        0xAC => {
            let m = decode_modrm(reader, address_width)?;
            let rm = rm_operand(m.rm, w);
            let reg = reg_operand(m.reg, w);
            let imm = Operand::Imm(reader.u8() as i64);
            Ok((Opcode::Shrd, vec![rm, reg, imm]))
        }
        0xAD => {
            let m = decode_modrm(reader, address_width)?;
            Ok((
                Opcode::Shrd,
                vec![rm_operand(m.rm, w), reg_operand(m.reg, w), reg_operand(1, 8)],
            ))
        }
        0xAE => {
            let m = decode_modrm(reader, address_width)?;
            match m.reg {
                2 => Ok((Opcode::Ldmxcsr, vec![rm_operand(m.rm, 32)])),
                3 => Ok((Opcode::Stmxcsr, vec![rm_operand(m.rm, 32)])),
                _ => Err(DecodeError::UnsupportedOpcode {
                    offset: opcode_offset,
                    byte: b1,
                }),
            }
        }
        0xAF => {
            let m = decode_modrm(reader, address_width)?;
            Ok((
                Opcode::Imul2,
                vec![reg_operand(m.reg, w), rm_operand(m.rm, w)],
            ))
        }
        0xB1 => {
            let m = decode_modrm(reader, address_width)?;
            Ok((
                Opcode::Cmpxchg,
                vec![rm_operand(m.rm, w), reg_operand(m.reg, w)],
            ))
        }
        0xB6 => {
            let m = decode_modrm(reader, address_width)?;
            Ok((
                Opcode::Movzx,
                vec![reg_operand(m.reg, w), rm_operand(m.rm, 8)],
            ))
        }
        0xB7 => {
            let m = decode_modrm(reader, address_width)?;
            Ok((
                Opcode::Movzx,
                vec![reg_operand(m.reg, w), rm_operand(m.rm, 16)],
            ))
        }
        0xBA => {
            let m = decode_modrm(reader, address_width)?;
            let rm = rm_operand(m.rm, w);
            let imm = Operand::Imm(reader.u8() as i64);
            let op = bit_op(m.reg).ok_or(DecodeError::InvalidEncoding {
                offset: opcode_offset,
                detail: "Grp8 reg field 0..3 has no bit-test meaning",
            })?;
            Ok((Opcode::BtGroup(op), vec![rm, imm]))
        }
        0xBC => {
            let m = decode_modrm(reader, address_width)?;
            Ok((
                Opcode::Bsf,
                vec![reg_operand(m.reg, w), rm_operand(m.rm, w)],
            ))
        }
        0xBD => {
            let m = decode_modrm(reader, address_width)?;
            Ok((
                Opcode::Bsr,
                vec![reg_operand(m.reg, w), rm_operand(m.rm, w)],
            ))
        }
        0xBE => {
            let m = decode_modrm(reader, address_width)?;
            Ok((
                Opcode::Movsx,
                vec![reg_operand(m.reg, w), rm_operand(m.rm, 8)],
            ))
        }
        0xBF => {
            let m = decode_modrm(reader, address_width)?;
            Ok((
                Opcode::Movsx,
                vec![reg_operand(m.reg, w), rm_operand(m.rm, 16)],
            ))
        }
        0xC1 => {
            let m = decode_modrm(reader, address_width)?;
            Ok((
                Opcode::Xadd,
                vec![rm_operand(m.rm, w), reg_operand(m.reg, w)],
            ))
        }
        0xC7 => {
            let m = decode_modrm(reader, address_width)?;
            match m.rm {
                RegOrMem::Mem(ea) if m.reg == 1 => {
                    Ok((Opcode::Cmpxchg8b, vec![Operand::Mem(ea, 64)]))
                }
                _ => Err(DecodeError::InvalidEncoding {
                    offset: opcode_offset,
                    detail: "CMPXCHG8B requires a memory destination and reg field 1",
                }),
            }
        }
        0xD7 => {
            let m = decode_modrm(reader, address_width)?;
            match m.rm {
                RegOrMem::Reg(i) => Ok((
                    Opcode::Pmovmskb,
                    vec![reg_operand(m.reg, 32), reg_operand(i, simd_w)],
                )),
                RegOrMem::Mem(_) => Err(DecodeError::InvalidEncoding {
                    offset: opcode_offset,
                    detail: "PMOVMSKB requires a register source",
                }),
            }
        }
        0xEF => {
            let m = decode_modrm(reader, address_width)?;
            Ok((
                Opcode::Pxor,
                vec![reg_operand(m.reg, simd_w), rm_operand(m.rm, simd_w)],
            ))
        }
        _ => Err(DecodeError::UnsupportedOpcode {
            offset: opcode_offset,
            byte: b1,
        }),
    }
}
