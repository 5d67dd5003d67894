//! `Grp2` shift/rotate operations (spec §4.6).
//!
//! Through-carry rotates (`RCL`/`RCR`) are recognized by the decoder but
//! rejected here: lowering them correctly requires folding the carry flag
//! into a wider rotate than this emitter's width-consistent `BinOp` algebra
//! can express without an extra temporary-width hack, and no scenario in
//! the test corpus exercises them.

use crate::emit::flags;
use crate::emit::lower::{read_operand, write_operand};
use crate::error::LiftError;
use crate::expr::{BinOp, Expr};
use crate::stmt::{Attrs, Statement};
use crate::ty::T;
use crate::vars::{Flag, Var};
use x86il_asm::{Instruction, Segment, ShiftOp};

fn flag_move(flag: Flag, value: Expr) -> Statement {
    Statement::Move(Var::Flag(flag), value, Attrs::none())
}

/// Lowers a `Grp2` shift/rotate instruction.
pub fn emit_shift(
    instr: &Instruction,
    address: u64,
    segment: Option<Segment>,
) -> Result<Vec<Statement>, LiftError> {
    let op = match instr.opcode {
        x86il_asm::Opcode::Shift(op) => op,
        _ => unreachable!("emit_shift called with a non-Shift opcode"),
    };
    if matches!(op, ShiftOp::Rcl | ShiftOp::Rcr) {
        return Err(LiftError::UnsupportedOperandForm {
            address,
            detail: "through-carry rotate (RCL/RCR) has no lowering",
        });
    }

    let [dst, count_op] = match instr.operands.as_slice() {
        [d, c] => [d.clone(), c.clone()],
        _ => {
            return Err(LiftError::UnsupportedOperandForm {
                address,
                detail: "shift instruction requires a destination and a count",
            })
        }
    };

    let width_bits = crate::emit::lower::operand_width(&dst, instr.operand_width.bits() as u32);
    let ty = T::Reg(width_bits);
    let a = read_operand(&dst, width_bits, segment);
    let raw_count = read_operand(&count_op, 8, segment);
    let count = Expr::BinOp(
        BinOp::And,
        Box::new(raw_count.zext(ty)),
        Box::new(Expr::Int(0x1F, ty)),
    );

    let (result, cf): (Expr, Expr) = match op {
        ShiftOp::Shl | ShiftOp::Sal => {
            let r = Expr::BinOp(BinOp::Shl, Box::new(a.clone()), Box::new(count.clone()));
            let top = width_bits - 1;
            let shifted_out = Expr::BinOp(
                BinOp::Shl,
                Box::new(a),
                Box::new(Expr::BinOp(BinOp::Sub, Box::new(count), Box::new(Expr::Int(1, ty)))),
            );
            (r, Expr::Extract(top, top, Box::new(shifted_out)))
        }
        ShiftOp::Shr => {
            let r = Expr::BinOp(BinOp::LShr, Box::new(a.clone()), Box::new(count.clone()));
            let shifted_out = Expr::BinOp(
                BinOp::LShr,
                Box::new(a),
                Box::new(Expr::BinOp(BinOp::Sub, Box::new(count), Box::new(Expr::Int(1, ty)))),
            );
            (r, Expr::Extract(0, 0, Box::new(shifted_out)))
        }
        ShiftOp::Sar => {
            let r = Expr::BinOp(BinOp::AShr, Box::new(a.clone()), Box::new(count.clone()));
            let shifted_out = Expr::BinOp(
                BinOp::AShr,
                Box::new(a),
                Box::new(Expr::BinOp(BinOp::Sub, Box::new(count), Box::new(Expr::Int(1, ty)))),
            );
            (r, Expr::Extract(0, 0, Box::new(shifted_out)))
        }
        ShiftOp::Rol => {
            let bits = Expr::Int(width_bits as u64, ty);
            let left = Expr::BinOp(BinOp::Shl, Box::new(a.clone()), Box::new(count.clone()));
            let right_count = Expr::BinOp(BinOp::Sub, Box::new(bits), Box::new(count));
            let right = Expr::BinOp(BinOp::LShr, Box::new(a), Box::new(right_count));
            let r = Expr::BinOp(BinOp::Or, Box::new(left), Box::new(right));
            let cf = Expr::Extract(0, 0, Box::new(r.clone()));
            (r, cf)
        }
        ShiftOp::Ror => {
            let bits = Expr::Int(width_bits as u64, ty);
            let right = Expr::BinOp(BinOp::LShr, Box::new(a.clone()), Box::new(count.clone()));
            let left_count = Expr::BinOp(BinOp::Sub, Box::new(bits), Box::new(count));
            let left = Expr::BinOp(BinOp::Shl, Box::new(a), Box::new(left_count));
            let r = Expr::BinOp(BinOp::Or, Box::new(left), Box::new(right));
            let top = width_bits - 1;
            let cf = Expr::Extract(top, top, Box::new(r.clone()));
            (r, cf)
        }
        ShiftOp::Rcl | ShiftOp::Rcr => unreachable!("rejected above"),
    };

    let mut stmts = vec![flag_move(Flag::Cf, cf)];
    stmts.extend(flags::set_pszf(&result, ty));
    stmts.push(flag_move(Flag::Of, Expr::Unknown("shift count != 1", T::BOOL)));
    stmts.push(write_operand(&dst, result, Attrs::none(), segment));
    Ok(stmts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use x86il_asm::{Gpr, GprRef, Opcode, Operand, OperandWidth};

    fn dummy_instr(op: ShiftOp, operands: Vec<Operand>) -> Instruction {
        Instruction {
            opcode: Opcode::Shift(op),
            operands,
            operand_width: OperandWidth::Width32,
            repeat: None,
            segment: None,
            length: 2,
        }
    }

    #[test]
    fn rcl_is_rejected() {
        let reg = Operand::Reg(GprRef::Dword(Gpr::Eax));
        let instr = dummy_instr(ShiftOp::Rcl, vec![reg, Operand::Imm(1)]);
        assert!(emit_shift(&instr, 0, None).is_err());
    }

    #[test]
    fn shl_by_one_writes_back_and_sets_flags() {
        let reg = Operand::Reg(GprRef::Dword(Gpr::Eax));
        let instr = dummy_instr(ShiftOp::Shl, vec![reg, Operand::Imm(1)]);
        let stmts = emit_shift(&instr, 0, None).unwrap();
        assert!(stmts.iter().any(|s| matches!(
            s,
            Statement::Move(Var::Gpr(Gpr::Eax), _, _)
        )));
    }
}
