//! `Jcc`/`JMP rel`/`HLT`/`INT`/`INT3`/`SYSENTER` (spec §4.6).

use crate::error::LiftError;
use crate::expr::Expr;
use crate::stmt::{Attrs, Statement};
use crate::ty::T;
use crate::vars::{Flag, Var};
use x86il_asm::{ConditionCode, Instruction, Operand};

/// Builds the boolean condition expression a `Jcc`/`SETcc` condition code
/// evaluates against the current flags.
pub fn condition_expr(cc: ConditionCode) -> Expr {
    use crate::expr::{BinOp, UnOp};
    let cf = || Expr::Var(Var::Flag(Flag::Cf));
    let zf = || Expr::Var(Var::Flag(Flag::Zf));
    let sf = || Expr::Var(Var::Flag(Flag::Sf));
    let of = || Expr::Var(Var::Flag(Flag::Of));
    let not = |e: Expr| Expr::UnOp(UnOp::Not, Box::new(e));
    let or = |a: Expr, b: Expr| Expr::BinOp(BinOp::Or, Box::new(a), Box::new(b));
    let xor = |a: Expr, b: Expr| Expr::BinOp(BinOp::Xor, Box::new(a), Box::new(b));
    let eq = |a: Expr, b: Expr| Expr::BinOp(BinOp::Eq, Box::new(a), Box::new(b));

    match cc {
        ConditionCode::Overflow => of(),
        ConditionCode::NotOverflow => not(of()),
        ConditionCode::Carry => cf(),
        ConditionCode::NotCarry => not(cf()),
        ConditionCode::Equal => zf(),
        ConditionCode::NotEqual => not(zf()),
        ConditionCode::BelowOrEqual => or(cf(), zf()),
        ConditionCode::Above => not(or(cf(), zf())),
        ConditionCode::Sign => sf(),
        ConditionCode::NotSign => not(sf()),
        ConditionCode::Less => xor(sf(), of()),
        ConditionCode::GreaterOrEqual => not(xor(sf(), of())),
        ConditionCode::LessOrEqual => or(zf(), xor(sf(), of())),
        ConditionCode::Greater => not(or(zf(), xor(sf(), of()))),
    }
}

/// Lowers `Jcc rel8`/`Jcc rel32`.
pub fn emit_jcc(instr: &Instruction, address: u64, cc: ConditionCode) -> Result<Vec<Statement>, LiftError> {
    let rel = match instr.operands.first() {
        Some(Operand::Imm(v)) => *v,
        _ => {
            return Err(LiftError::UnsupportedOperandForm {
                address,
                detail: "Jcc requires a relative-offset immediate operand",
            })
        }
    };
    let next = address + instr.length;
    let taken = (next as i64 + rel) as u64;
    Ok(vec![Statement::CJmp {
        cond: condition_expr(cc),
        then_target: Expr::Int(taken, T::DWORD),
        else_target: Expr::Int(next, T::DWORD),
        attrs: Attrs::none(),
    }])
}

/// Lowers unconditional relative `JMP rel8`/`JMP rel32`.
pub fn emit_jmp_rel(instr: &Instruction, address: u64) -> Result<Vec<Statement>, LiftError> {
    let rel = match instr.operands.first() {
        Some(Operand::Imm(v)) => *v,
        _ => {
            return Err(LiftError::UnsupportedOperandForm {
                address,
                detail: "JMP requires a relative-offset immediate operand",
            })
        }
    };
    let next = address + instr.length;
    let target = (next as i64 + rel) as u64;
    Ok(vec![Statement::Jmp(Expr::Int(target, T::DWORD), Attrs::none())])
}

/// Lowers `HLT`.
pub fn emit_hlt() -> Vec<Statement> {
    vec![Statement::Special("hlt", Attrs::none())]
}

/// Lowers `INT3`.
pub fn emit_int3() -> Vec<Statement> {
    vec![Statement::Special("int3", Attrs::none())]
}

/// Lowers `INT imm8`.
pub fn emit_int(instr: &Instruction, address: u64) -> Result<Vec<Statement>, LiftError> {
    match instr.operands.first() {
        Some(Operand::Imm(vector)) => Ok(vec![Statement::Special(
            int_tag(*vector),
            Attrs::none(),
        )]),
        _ => Err(LiftError::UnsupportedOperandForm {
            address,
            detail: "INT requires an immediate vector operand",
        }),
    }
}

fn int_tag(vector: i64) -> &'static str {
    match vector {
        0x80 => "int_0x80",
        _ => "int",
    }
}

/// Lowers `SYSENTER`.
pub fn emit_sysenter() -> Vec<Statement> {
    vec![Statement::Special("sysenter", Attrs::none())]
}
