//! `NOP`, `MOV`, `LEA`, `MOVZX`/`MOVSX`, `SETcc`, `CPUID`, `RDTSC` (spec §4.6).

use crate::emit::control::condition_expr;
use crate::emit::lower::{effective_address, read_operand, write_operand};
use crate::error::LiftError;
use crate::expr::{CastKind, Expr};
use crate::stmt::{Attrs, Statement};
use crate::ty::T;
use crate::vars::Var;
use x86il_asm::{ConditionCode, Instruction, Operand, Segment};

/// Lowers `NOP`, including the multi-byte `0F 1F` forms: no statements.
pub fn emit_nop() -> Vec<Statement> {
    Vec::new()
}

/// Lowers `MOV` in all its register/memory/immediate forms: a plain read
/// of the source at the destination's width, written back unconditionally.
pub fn emit_mov(instr: &Instruction, address: u64, segment: Option<Segment>) -> Result<Vec<Statement>, LiftError> {
    let (dst, src) = match instr.operands.as_slice() {
        [d, s] => (d.clone(), s.clone()),
        _ => {
            return Err(LiftError::UnsupportedOperandForm {
                address,
                detail: "MOV requires a destination and a source",
            })
        }
    };
    let width_bits = crate::emit::lower::operand_width(&dst, instr.operand_width.bits() as u32);
    let value = read_operand(&src, width_bits, segment);
    Ok(vec![write_operand(&dst, value, Attrs::none(), segment)])
}

/// Lowers `LEA r32, m`: the destination register gets the *address*
/// itself, never a memory read.
pub fn emit_lea(instr: &Instruction, address: u64, segment: Option<Segment>) -> Result<Vec<Statement>, LiftError> {
    let (dst, src) = match instr.operands.as_slice() {
        [d, s] => (d.clone(), s.clone()),
        _ => {
            return Err(LiftError::UnsupportedOperandForm {
                address,
                detail: "LEA requires a register destination and a memory source",
            })
        }
    };
    let ea = match &src {
        Operand::Mem(ea, _) => ea,
        _ => {
            return Err(LiftError::UnsupportedOperandForm {
                address,
                detail: "LEA's source operand must be a memory reference",
            })
        }
    };
    let addr = effective_address(ea, segment);
    Ok(vec![write_operand(&dst, addr, Attrs::none(), segment)])
}

/// Lowers `MOVZX`/`MOVSX`: reads the (narrower) source at its own width,
/// then zero- or sign-extends into the (wider) destination's width.
pub fn emit_move_extend(
    instr: &Instruction,
    address: u64,
    segment: Option<Segment>,
    src_width_bits: u32,
    signed: bool,
) -> Result<Vec<Statement>, LiftError> {
    let (dst, src) = match instr.operands.as_slice() {
        [d, s] => (d.clone(), s.clone()),
        _ => {
            return Err(LiftError::UnsupportedOperandForm {
                address,
                detail: "MOVZX/MOVSX requires a destination and a source",
            })
        }
    };
    let dst_width_bits = crate::emit::lower::operand_width(&dst, 32);
    let value = read_operand(&src, src_width_bits, segment);
    let cast_kind = if signed { CastKind::SignExtend } else { CastKind::ZeroExtend };
    let extended = Expr::Cast(cast_kind, T::Reg(dst_width_bits), Box::new(value));
    Ok(vec![write_operand(&dst, extended, Attrs::none(), segment)])
}

/// Lowers `SETcc r/m8`: writes 1 or 0 to the byte destination depending
/// on the condition.
pub fn emit_setcc(
    instr: &Instruction,
    address: u64,
    cc: ConditionCode,
    segment: Option<Segment>,
) -> Result<Vec<Statement>, LiftError> {
    let dst = instr.operands.first().ok_or(LiftError::UnsupportedOperandForm {
        address,
        detail: "SETcc requires a byte destination",
    })?;
    let cond = condition_expr(cc);
    let value = Expr::Ite(
        Box::new(cond),
        Box::new(Expr::Int(1, T::BYTE)),
        Box::new(Expr::zero(T::BYTE)),
    );
    Ok(vec![write_operand(dst, value, Attrs::none(), segment)])
}

/// Lowers `CPUID`: every output register is left architecturally
/// undefined by this lifter (it depends on the host's actual CPU
/// identification data, which the IL has no model for).
pub fn emit_cpuid() -> Vec<Statement> {
    use x86il_asm::Gpr;
    ["CPUID:EAX", "CPUID:EBX", "CPUID:ECX", "CPUID:EDX"]
        .into_iter()
        .zip([Gpr::Eax, Gpr::Ebx, Gpr::Ecx, Gpr::Edx])
        .map(|(tag, reg)| Statement::Move(Var::Gpr(reg), Expr::Unknown(tag, T::DWORD), Attrs::none()))
        .collect()
}

/// Lowers `RDTSC`: `EDX:EAX` gets an opaque 64-bit timestamp split across
/// the two registers.
pub fn emit_rdtsc() -> Vec<Statement> {
    use x86il_asm::Gpr;
    vec![
        Statement::Move(Var::Gpr(Gpr::Eax), Expr::Unknown("RDTSC low", T::DWORD), Attrs::none()),
        Statement::Move(Var::Gpr(Gpr::Edx), Expr::Unknown("RDTSC high", T::DWORD), Attrs::none()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use x86il_asm::{AddressWidth, EffectiveAddress, Gpr, GprRef, Opcode, OperandWidth};

    fn dummy(opcode: Opcode, operands: Vec<Operand>) -> Instruction {
        Instruction {
            opcode,
            operands,
            operand_width: OperandWidth::Width32,
            repeat: None,
            segment: None,
            length: 3,
        }
    }

    #[test]
    fn mov_imm_to_reg_writes_a_constant() {
        let dst = Operand::Reg(GprRef::Dword(Gpr::Eax));
        let instr = dummy(Opcode::Mov, vec![dst, Operand::Imm(7)]);
        let stmts = emit_mov(&instr, 0, None).unwrap();
        match &stmts[0] {
            Statement::Move(Var::Gpr(Gpr::Eax), Expr::Int(7, T::Reg(32)), _) => {}
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn lea_writes_the_address_not_a_load() {
        let ea = EffectiveAddress {
            base: Some(Gpr::Ebx),
            index: None,
            disp: 4,
            address_width: AddressWidth::Width32,
        };
        let dst = Operand::Reg(GprRef::Dword(Gpr::Eax));
        let src = Operand::Mem(ea, 32);
        let instr = dummy(Opcode::Lea, vec![dst, src]);
        let stmts = emit_lea(&instr, 0, None).unwrap();
        match &stmts[0] {
            Statement::Move(Var::Gpr(Gpr::Eax), expr, _) => {
                assert!(!matches!(expr, Expr::Load { .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn movzx_byte_to_dword_zero_extends() {
        let dst = Operand::Reg(GprRef::Dword(Gpr::Eax));
        let src = Operand::Reg(GprRef::Byte { reg: Gpr::Ebx, hi: false });
        let instr = dummy(Opcode::Movzx, vec![dst, src]);
        let stmts = emit_move_extend(&instr, 0, None, 8, false).unwrap();
        match &stmts[0] {
            Statement::Move(_, Expr::Cast(CastKind::ZeroExtend, T::Reg(32), _), _) => {}
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn setcc_produces_a_boolean_byte() {
        let dst = Operand::Reg(GprRef::Byte { reg: Gpr::Eax, hi: false });
        let instr = dummy(Opcode::SetCc(ConditionCode::Equal), vec![dst]);
        let stmts = emit_setcc(&instr, 0, ConditionCode::Equal, None).unwrap();
        assert!(matches!(&stmts[0], Statement::Move(_, Expr::Ite(..), _)));
    }

    #[test]
    fn cpuid_covers_all_four_output_registers() {
        assert_eq!(emit_cpuid().len(), 4);
    }
}
