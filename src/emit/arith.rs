//! `ADD`/`OR`/`ADC`/`SBB`/`AND`/`SUB`/`XOR`/`CMP` (including the `Grp1`
//! immediate forms) and the `Grp3` unary ALU operations (`TEST`/`NOT`/
//! `NEG`/`MUL`/`IMUL`/`DIV`/`IDIV`).

use crate::emit::flags;
use crate::emit::lower::{operand_width, read_operand, write_operand};
use crate::error::LiftError;
use crate::expr::{BinOp, Expr, UnOp};
use crate::stmt::{Attrs, Statement};
use crate::ty::T;
use x86il_asm::{ArithOp, Instruction, Operand, Segment, UnaryOp};

fn width_of(instr: &Instruction, dst: &Operand, src: &Operand) -> u32 {
    let fallback = instr.operand_width.bits() as u32;
    let dw = operand_width(dst, fallback);
    let sw = operand_width(src, fallback);
    if dw != 0 {
        dw
    } else {
        sw
    }
}

/// Lowers an `ArithOp`-tagged instruction to its statement sequence.
pub fn emit_arith(
    instr: &Instruction,
    address: u64,
    segment: Option<Segment>,
) -> Result<Vec<Statement>, LiftError> {
    let op = match instr.opcode {
        x86il_asm::Opcode::Arith(op) => op,
        _ => unreachable!("emit_arith called with a non-Arith opcode"),
    };
    let [dst, src] = match instr.operands.as_slice() {
        [d, s] => [d.clone(), s.clone()],
        _ => {
            return Err(LiftError::UnsupportedOperandForm {
                address,
                detail: "arithmetic opcode requires exactly two operands",
            })
        }
    };

    let width_bits = width_of(instr, &dst, &src);
    let ty = T::Reg(width_bits);
    let a = read_operand(&dst, width_bits, segment);
    let b = read_operand(&src, width_bits, segment);

    let (result, flag_stmts): (Expr, Vec<Statement>) = match op {
        ArithOp::Add => {
            let r = Expr::BinOp(BinOp::Add, Box::new(a.clone()), Box::new(b.clone()));
            (r.clone(), flags::set_flags_add(&a, &b, &r, ty))
        }
        ArithOp::Adc => {
            let cf = Expr::Var(crate::vars::Var::Flag(crate::vars::Flag::Cf)).zext(ty);
            let partial = Expr::BinOp(BinOp::Add, Box::new(a.clone()), Box::new(b.clone()));
            let r = Expr::BinOp(BinOp::Add, Box::new(partial), Box::new(cf));
            (r.clone(), flags::set_flags_add(&a, &b, &r, ty))
        }
        ArithOp::Sub | ArithOp::Cmp => {
            let r = Expr::BinOp(BinOp::Sub, Box::new(a.clone()), Box::new(b.clone()));
            (r.clone(), flags::set_flags_sub(&a, &b, &r, ty))
        }
        ArithOp::Sbb => {
            let cf = Expr::Var(crate::vars::Var::Flag(crate::vars::Flag::Cf)).zext(ty);
            let partial = Expr::BinOp(BinOp::Sub, Box::new(a.clone()), Box::new(b.clone()));
            let r = Expr::BinOp(BinOp::Sub, Box::new(partial), Box::new(cf));
            (r.clone(), flags::set_flags_sub(&a, &b, &r, ty))
        }
        ArithOp::And => {
            let r = Expr::BinOp(BinOp::And, Box::new(a.clone()), Box::new(b.clone()));
            let mut fs = flags::set_pszf(&r, ty);
            fs.push(clear_flag(crate::vars::Flag::Cf));
            fs.push(clear_flag(crate::vars::Flag::Of));
            (r, fs)
        }
        ArithOp::Or => {
            let r = Expr::BinOp(BinOp::Or, Box::new(a.clone()), Box::new(b.clone()));
            let mut fs = flags::set_pszf(&r, ty);
            fs.push(clear_flag(crate::vars::Flag::Cf));
            fs.push(clear_flag(crate::vars::Flag::Of));
            (r, fs)
        }
        ArithOp::Xor => {
            let r = Expr::BinOp(BinOp::Xor, Box::new(a.clone()), Box::new(b.clone()));
            let mut fs = flags::set_pszf(&r, ty);
            fs.push(clear_flag(crate::vars::Flag::Cf));
            fs.push(clear_flag(crate::vars::Flag::Of));
            (r, fs)
        }
    };

    let mut stmts = flag_stmts;
    if !matches!(op, ArithOp::Cmp) {
        stmts.push(write_operand(&dst, result, Attrs::none(), segment));
    }
    Ok(stmts)
}

fn clear_flag(flag: crate::vars::Flag) -> Statement {
    Statement::Move(
        crate::vars::Var::Flag(flag),
        Expr::Int(0, T::BOOL),
        Attrs::none(),
    )
}

/// Lowers a `Grp3` unary instruction (`TEST`/`NOT`/`NEG`/`MUL`/`IMUL`/
/// `DIV`/`IDIV`).
pub fn emit_unary(
    instr: &Instruction,
    address: u64,
    segment: Option<Segment>,
) -> Result<Vec<Statement>, LiftError> {
    let op = match instr.opcode {
        x86il_asm::Opcode::Unary(op) => op,
        _ => unreachable!("emit_unary called with a non-Unary opcode"),
    };
    let width_bits = instr.operand_width.bits() as u32;
    let ty = T::Reg(width_bits);
    let dst = instr.operands.first().cloned().ok_or(LiftError::UnsupportedOperandForm {
        address,
        detail: "Grp3 instruction requires at least one operand",
    })?;
    let a = read_operand(&dst, width_bits, segment);

    match op {
        UnaryOp::Test => {
            let imm = instr.operands.get(1).cloned().ok_or(LiftError::UnsupportedOperandForm {
                address,
                detail: "TEST requires an immediate operand",
            })?;
            let b = read_operand(&imm, width_bits, segment);
            let r = Expr::BinOp(BinOp::And, Box::new(a), Box::new(b));
            let mut fs = flags::set_pszf(&r, ty);
            fs.push(clear_flag(crate::vars::Flag::Cf));
            fs.push(clear_flag(crate::vars::Flag::Of));
            Ok(fs)
        }
        UnaryOp::Not => {
            let r = Expr::UnOp(UnOp::Not, Box::new(a));
            Ok(vec![write_operand(&dst, r, Attrs::none(), segment)])
        }
        UnaryOp::Neg => {
            let zero = Expr::zero(ty);
            let r = Expr::BinOp(BinOp::Sub, Box::new(zero.clone()), Box::new(a.clone()));
            let mut fs = flags::set_flags_sub(&zero, &a, &r, ty);
            fs.push(write_operand(&dst, r, Attrs::none(), segment));
            Ok(fs)
        }
        UnaryOp::Mul | UnaryOp::Imul | UnaryOp::Div | UnaryOp::Idiv => {
            Err(LiftError::UnsupportedOperandForm {
                address,
                detail: "wide multiply/divide against the accumulator:edx pair is not lowered",
            })
        }
    }
}

/// Lowers `INC r/m` (both the single-byte `0x40..0x47` form and the
/// `Grp5 /0` form): identical to `ADD ..., 1` minus the carry flag, which
/// `INC` leaves untouched.
pub fn emit_inc(instr: &Instruction, address: u64, segment: Option<Segment>) -> Result<Vec<Statement>, LiftError> {
    let dst = instr.operands.first().cloned().ok_or(LiftError::UnsupportedOperandForm {
        address,
        detail: "INC requires one operand",
    })?;
    let width_bits = operand_width(&dst, instr.operand_width.bits() as u32);
    let ty = T::Reg(width_bits);
    let a = read_operand(&dst, width_bits, segment);
    let one = Expr::Int(1, ty);
    let r = Expr::BinOp(BinOp::Add, Box::new(a.clone()), Box::new(one.clone()));
    let mut stmts = flags::set_aopszf_add(&a, &one, &r, ty);
    stmts.push(write_operand(&dst, r, Attrs::none(), segment));
    Ok(stmts)
}

/// Lowers `DEC r/m` (both the single-byte `0x48..0x4F` form and the
/// `Grp5 /1` form): identical to `SUB ..., 1` minus the carry flag.
pub fn emit_dec(instr: &Instruction, address: u64, segment: Option<Segment>) -> Result<Vec<Statement>, LiftError> {
    let dst = instr.operands.first().cloned().ok_or(LiftError::UnsupportedOperandForm {
        address,
        detail: "DEC requires one operand",
    })?;
    let width_bits = operand_width(&dst, instr.operand_width.bits() as u32);
    let ty = T::Reg(width_bits);
    let a = read_operand(&dst, width_bits, segment);
    let one = Expr::Int(1, ty);
    let r = Expr::BinOp(BinOp::Sub, Box::new(a.clone()), Box::new(one.clone()));
    let mut stmts = flags::set_apszf_sub(&a, &one, &r, ty);
    stmts.push(write_operand(&dst, r, Attrs::none(), segment));
    Ok(stmts)
}

/// Lowers two-operand `IMUL r, r/m` (`0F AF`): the low half is written
/// back, `CF`/`OF` are set exactly (narrow sign-extended product equals
/// the wide one), the other four flags are left `Unknown` per the
/// architecture's "undefined" contract.
pub fn emit_imul2(instr: &Instruction, address: u64, segment: Option<Segment>) -> Result<Vec<Statement>, LiftError> {
    let [dst, src] = match instr.operands.as_slice() {
        [d, s] => [d.clone(), s.clone()],
        _ => {
            return Err(LiftError::UnsupportedOperandForm {
                address,
                detail: "IMUL r, r/m requires two operands",
            })
        }
    };
    let width_bits = width_of(instr, &dst, &src);
    let a = read_operand(&dst, width_bits, segment);
    let b = read_operand(&src, width_bits, segment);
    signed_multiply(&dst, a, b, width_bits, segment)
}

/// Lowers three-operand `IMUL r, r/m, imm` (`0x69`/`0x6B`).
pub fn emit_imul3(instr: &Instruction, address: u64, segment: Option<Segment>) -> Result<Vec<Statement>, LiftError> {
    let (dst, src, imm) = match instr.operands.as_slice() {
        [d, s, i] => (d.clone(), s.clone(), i.clone()),
        _ => {
            return Err(LiftError::UnsupportedOperandForm {
                address,
                detail: "IMUL r, r/m, imm requires three operands",
            })
        }
    };
    let width_bits = operand_width(&dst, instr.operand_width.bits() as u32);
    let a = read_operand(&src, width_bits, segment);
    let b = read_operand(&imm, width_bits, segment);
    signed_multiply(&dst, a, b, width_bits, segment)
}

/// Shared `IMUL` lowering: widens both factors, multiplies, narrows back,
/// and sets `CF`/`OF` from whether narrowing lost information. The other
/// four flags are architecturally undefined for `IMUL` and left `Unknown`.
fn signed_multiply(
    dst: &Operand,
    a: Expr,
    b: Expr,
    width_bits: u32,
    segment: Option<Segment>,
) -> Result<Vec<Statement>, LiftError> {
    let wide = T::Reg(width_bits * 2);
    let product = Expr::BinOp(
        BinOp::Mul,
        Box::new(Expr::Cast(crate::expr::CastKind::SignExtend, wide, Box::new(a))),
        Box::new(Expr::Cast(crate::expr::CastKind::SignExtend, wide, Box::new(b))),
    );
    let narrow = Expr::Cast(crate::expr::CastKind::Low, T::Reg(width_bits), Box::new(product.clone()));
    let resignextended = Expr::Cast(crate::expr::CastKind::SignExtend, wide, Box::new(narrow.clone()));
    let overflowed = Expr::BinOp(BinOp::Ne, Box::new(product), Box::new(resignextended));
    let mut stmts = vec![
        Statement::Move(crate::vars::Var::Flag(crate::vars::Flag::Cf), overflowed.clone(), Attrs::none()),
        Statement::Move(crate::vars::Var::Flag(crate::vars::Flag::Of), overflowed, Attrs::none()),
    ];
    for flag in [crate::vars::Flag::Pf, crate::vars::Flag::Af, crate::vars::Flag::Zf, crate::vars::Flag::Sf] {
        stmts.push(Statement::Move(
            crate::vars::Var::Flag(flag),
            Expr::Unknown("IMUL undefined flag", T::BOOL),
            Attrs::none(),
        ));
    }
    stmts.push(write_operand(dst, narrow, Attrs::none(), segment));
    Ok(stmts)
}
