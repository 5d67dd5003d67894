//! Routes a decoded [`Instruction`] to its opcode-family emitter and
//! returns the resulting statement sequence (spec §4.6, C6).

pub mod arith;
pub mod bits;
pub mod control;
pub mod flags;
pub mod lower;
pub mod misc;
pub mod shift;
pub mod simd;
pub mod stack;
pub mod string_ops;

use crate::error::LiftError;
use crate::stmt::Statement;
use crate::temp::TempPool;
use x86il_asm::{Grp5Op, Instruction, Opcode};

/// Lowers one decoded instruction into its IL statement sequence.
///
/// `address` is the instruction's own address, used by relative-control-flow
/// and `Attrs` sources; `instr.length` is added by the caller to advance to
/// the next instruction. `pool` allocates the fresh temporaries the stack
/// emitters use to capture pre-`ESP`-update values.
pub fn emit(instr: &Instruction, address: u64, pool: &mut TempPool) -> Result<Vec<Statement>, LiftError> {
    let segment = instr.segment;
    match instr.opcode {
        Opcode::Arith(_) => arith::emit_arith(instr, address, segment),
        Opcode::Unary(_) => arith::emit_unary(instr, address, segment),
        Opcode::Inc => arith::emit_inc(instr, address, segment),
        Opcode::Dec => arith::emit_dec(instr, address, segment),
        Opcode::Imul2 => arith::emit_imul2(instr, address, segment),
        Opcode::Imul3 => arith::emit_imul3(instr, address, segment),

        Opcode::Mov => misc::emit_mov(instr, address, segment),
        Opcode::Lea => misc::emit_lea(instr, address, segment),
        Opcode::Nop => Ok(misc::emit_nop()),
        Opcode::Movzx => misc::emit_move_extend(instr, address, segment, src_width_of(instr), false),
        Opcode::Movsx => misc::emit_move_extend(instr, address, segment, src_width_of(instr), true),
        Opcode::SetCc(cc) => misc::emit_setcc(instr, address, cc, segment),
        Opcode::Cpuid => Ok(misc::emit_cpuid()),
        Opcode::Rdtsc => Ok(misc::emit_rdtsc()),

        Opcode::Shift(_) => shift::emit_shift(instr, address, segment),

        Opcode::Push | Opcode::PushImm => stack::emit_push(instr, segment, pool),
        Opcode::Pop => stack::emit_pop(instr, segment),
        Opcode::Ret | Opcode::RetImm => stack::emit_ret(instr, pool),
        Opcode::Call => stack::emit_call_rel(instr, address, pool),
        Opcode::Grp5(Grp5Op::Inc) => arith::emit_inc(instr, address, segment),
        Opcode::Grp5(Grp5Op::Dec) => arith::emit_dec(instr, address, segment),
        Opcode::Grp5(_) => stack::emit_grp5(instr, address, segment, pool),
        Opcode::Jmp => control::emit_jmp_rel(instr, address),

        Opcode::StringOp(_) => string_ops::emit_string_op(instr, instr.operand_width.bits() as u32),

        Opcode::Jcc(cc) => control::emit_jcc(instr, address, cc),
        Opcode::Hlt => Ok(control::emit_hlt()),
        Opcode::Int3 => Ok(control::emit_int3()),
        Opcode::Int => control::emit_int(instr, address),
        Opcode::Sysenter => Ok(control::emit_sysenter()),

        Opcode::Bt => bits::emit_bt(instr, address, segment),
        Opcode::BtGroup(_) => bits::emit_bt_group(instr, address, segment),
        Opcode::Bsf => bits::emit_bit_scan(instr, address, segment, true),
        Opcode::Bsr => bits::emit_bit_scan(instr, address, segment, false),
        Opcode::Shld => bits::emit_double_shift(instr, address, segment, true),
        Opcode::Shrd => bits::emit_double_shift(instr, address, segment, false),
        Opcode::Cmpxchg => bits::emit_cmpxchg(instr, address, segment),
        Opcode::Cmpxchg8b => bits::emit_cmpxchg8b(address),
        Opcode::Xadd => bits::emit_xadd(instr, address, segment),

        Opcode::MovapsLoad
        | Opcode::MovapsStore
        | Opcode::MovdLoad
        | Opcode::MovdStore
        | Opcode::MovqLoad
        | Opcode::MovqStore => simd::emit_simd_move(instr, address, segment),
        Opcode::Pxor => simd::emit_pxor(instr, address, segment),
        Opcode::Pshufd => simd::emit_pshufd(instr, address, segment),
        Opcode::Pcmpeq => simd::emit_pcmpeq(instr, address, segment),
        Opcode::Palignr => simd::emit_palignr(instr, address, segment),
        Opcode::Ldmxcsr => simd::emit_ldmxcsr(instr, address, segment),
        Opcode::Stmxcsr => simd::emit_stmxcsr(instr, address, segment),
        Opcode::Pmovmskb => simd::emit_pmovmskb(instr, address, segment),
    }
}

/// `MOVZX`/`MOVSX`'s narrow source width, carried implicitly by the
/// decoder's choice of `rm_operand` width (8 for the `B6`/`BE` forms, 16
/// for `B7`/`BF`) rather than on `Opcode` itself.
fn src_width_of(instr: &Instruction) -> u32 {
    match instr.operands.get(1) {
        Some(op) => lower::operand_width(op, instr.operand_width.bits() as u32),
        None => instr.operand_width.bits() as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use x86il_asm::{ArithOp, Gpr, GprRef, Operand, OperandWidth};

    fn dummy(opcode: Opcode, operands: Vec<Operand>) -> Instruction {
        Instruction {
            opcode,
            operands,
            operand_width: OperandWidth::Width32,
            repeat: None,
            segment: None,
            length: 2,
        }
    }

    #[test]
    fn nop_lowers_to_no_statements() {
        let instr = dummy(Opcode::Nop, vec![]);
        let mut pool = TempPool::new();
        assert!(emit(&instr, 0, &mut pool).unwrap().is_empty());
    }

    #[test]
    fn arith_dispatches_to_the_alu_emitter() {
        let reg = Operand::Reg(GprRef::Dword(Gpr::Eax));
        let instr = dummy(Opcode::Arith(ArithOp::Add), vec![reg.clone(), reg]);
        let mut pool = TempPool::new();
        assert!(!emit(&instr, 0, &mut pool).unwrap().is_empty());
    }

    #[test]
    fn grp5_inc_routes_to_the_arithmetic_emitter_not_stack() {
        let reg = Operand::Reg(GprRef::Dword(Gpr::Eax));
        let instr = dummy(Opcode::Grp5(Grp5Op::Inc), vec![reg]);
        let mut pool = TempPool::new();
        let stmts = emit(&instr, 0, &mut pool).unwrap();
        assert_eq!(stmts.len(), 6);
    }

    #[test]
    fn cmpxchg8b_surfaces_as_a_lift_error_not_a_panic() {
        let ea = x86il_asm::EffectiveAddress {
            base: Some(Gpr::Eax),
            index: None,
            disp: 0,
            address_width: x86il_asm::AddressWidth::Width32,
        };
        let instr = dummy(Opcode::Cmpxchg8b, vec![Operand::Mem(ea, 64)]);
        let mut pool = TempPool::new();
        assert!(matches!(
            emit(&instr, 0, &mut pool),
            Err(LiftError::UnsupportedOperandForm { .. })
        ));
    }
}
