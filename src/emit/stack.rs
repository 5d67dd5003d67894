//! `PUSH`/`POP`/`CALL`/`RET`, including the `Grp5` indirect `CALL`/`JMP`/
//! `PUSH` forms (spec §4.6).
//!
//! `PUSH` and `RET`/`CALL` capture the value they must carry across the
//! `ESP` update into a fresh temporary first: the pushed source (which may
//! itself be `ESP`) and the popped return address are both read from
//! pre-update state, then `ESP` is adjusted, then the temporary is stored
//! or jumped to. `POP` instead reorders its two statements so the
//! destination write happens while `ESP` still points at the popped slot,
//! then suppresses the increment outright when the destination is `ESP`
//! itself, per spec §8's "`POP ESP` must not emit the trailing increment".

use crate::emit::lower::{read_operand, write_operand};
use crate::error::LiftError;
use crate::expr::{BinOp, Expr};
use crate::stmt::{Attrs, LabelTarget, Statement};
use crate::temp::TempPool;
use crate::ty::T;
use crate::vars::Var;
use x86il_asm::{Gpr, GprRef, Grp5Op, Instruction, Operand, Segment};

fn esp() -> Expr {
    Expr::Var(Var::Gpr(Gpr::Esp))
}

fn width_bytes(width_bits: u32) -> u64 {
    (width_bits / 8) as u64
}

fn push_statements(value: Expr, width_bits: u32, segment: Option<Segment>, pool: &mut TempPool) -> Vec<Statement> {
    let _ = segment;
    let temp = pool.fresh(T::Reg(width_bits));
    let new_esp = Expr::BinOp(
        BinOp::Sub,
        Box::new(esp()),
        Box::new(Expr::Int(width_bytes(width_bits), T::DWORD)),
    );
    let store = Expr::Store {
        mem: Box::new(Expr::Var(Var::Mem)),
        addr: Box::new(esp()),
        value: Box::new(Expr::Var(temp)),
        endian: crate::expr::Endian::Little,
    };
    vec![
        // Capture the source before ESP moves, so `PUSH ESP` stores the
        // original value rather than the decremented one.
        Statement::Move(temp, value, Attrs::none()),
        Statement::Move(Var::Gpr(Gpr::Esp), new_esp, Attrs::none()),
        // `esp()` here reads the already-decremented ESP, which is the
        // pushed slot's address.
        Statement::Move(Var::Mem, store, Attrs::none()),
    ]
}

fn pop_value(width_bits: u32) -> Expr {
    Expr::Load {
        mem: Box::new(Expr::Var(Var::Mem)),
        addr: Box::new(esp()),
        endian: crate::expr::Endian::Little,
        width: T::Reg(width_bits),
    }
}

fn is_esp(operand: &Operand) -> bool {
    matches!(operand, Operand::Reg(GprRef::Dword(Gpr::Esp)))
}

fn pop_statements(dst: &Operand, width_bits: u32, segment: Option<Segment>) -> Vec<Statement> {
    // The value is read while ESP still points at the popped slot, so the
    // write must come first; an ESP destination would otherwise be
    // clobbered by the increment below.
    let value = pop_value(width_bits);
    let mut stmts = vec![write_operand(dst, value, Attrs::none(), segment)];
    if !is_esp(dst) {
        let new_esp = Expr::BinOp(
            BinOp::Add,
            Box::new(esp()),
            Box::new(Expr::Int(width_bytes(width_bits), T::DWORD)),
        );
        stmts.push(Statement::Move(Var::Gpr(Gpr::Esp), new_esp, Attrs::none()));
    }
    stmts
}

/// Lowers `PUSH r/m/imm`.
pub fn emit_push(
    instr: &Instruction,
    segment: Option<Segment>,
    pool: &mut TempPool,
) -> Result<Vec<Statement>, LiftError> {
    let src = instr.operands.first().cloned().ok_or(LiftError::UnsupportedOperandForm {
        address: 0,
        detail: "PUSH requires one operand",
    })?;
    let width_bits = crate::emit::lower::operand_width(&src, instr.operand_width.bits() as u32);
    let value = read_operand(&src, width_bits, segment);
    Ok(push_statements(value, width_bits, segment, pool))
}

/// Lowers `POP r/m`.
pub fn emit_pop(instr: &Instruction, segment: Option<Segment>) -> Result<Vec<Statement>, LiftError> {
    let dst = instr.operands.first().cloned().ok_or(LiftError::UnsupportedOperandForm {
        address: 0,
        detail: "POP requires one operand",
    })?;
    let width_bits = crate::emit::lower::operand_width(&dst, instr.operand_width.bits() as u32);
    Ok(pop_statements(&dst, width_bits, segment))
}

/// Lowers `RET` and `RET imm16`: pops the return address into `EIP`, then
/// optionally deallocates `imm16` extra bytes from the stack.
pub fn emit_ret(instr: &Instruction, pool: &mut TempPool) -> Result<Vec<Statement>, LiftError> {
    // Capture the return address before ESP moves, matching PUSH's
    // capture-then-adjust shape.
    let target = pool.fresh(T::DWORD);
    let mut stmts = vec![
        Statement::Move(target, pop_value(32), Attrs::none()),
        Statement::Move(
            Var::Gpr(Gpr::Esp),
            Expr::BinOp(BinOp::Add, Box::new(esp()), Box::new(Expr::Int(4, T::DWORD))),
            Attrs::none(),
        ),
    ];

    if let Some(Operand::Imm(n)) = instr.operands.first() {
        stmts.push(Statement::Move(
            Var::Gpr(Gpr::Esp),
            Expr::BinOp(BinOp::Add, Box::new(esp()), Box::new(Expr::Int(*n as u64, T::DWORD))),
            Attrs::none(),
        ));
    }

    stmts.push(Statement::Jmp(Expr::Var(target), Attrs::with_role("ret")));
    Ok(stmts)
}

/// Lowers `CALL rel32`: pushes the return address (the byte after this
/// instruction), then jumps to `address + length + rel`.
pub fn emit_call_rel(instr: &Instruction, address: u64, pool: &mut TempPool) -> Result<Vec<Statement>, LiftError> {
    let rel = match instr.operands.first() {
        Some(Operand::Imm(v)) => *v,
        _ => {
            return Err(LiftError::UnsupportedOperandForm {
                address,
                detail: "relative CALL requires an immediate operand",
            })
        }
    };
    let return_addr = address + instr.length;
    let target = (return_addr as i64 + rel) as u64;
    let mut stmts = push_statements(Expr::Int(return_addr, T::DWORD), 32, None, pool);
    stmts.push(Statement::Jmp(Expr::Int(target, T::DWORD), Attrs::with_role("call")));
    Ok(stmts)
}

/// Lowers the `Grp5` (`FF /2`, `/4`, `/6`) indirect `CALL`/`JMP`/`PUSH`
/// forms. `/0` and `/1` (`INC`/`DEC`) are handled by the arithmetic
/// emitter, not here.
pub fn emit_grp5(
    instr: &Instruction,
    address: u64,
    segment: Option<Segment>,
    pool: &mut TempPool,
) -> Result<Vec<Statement>, LiftError> {
    let op = match instr.opcode {
        x86il_asm::Opcode::Grp5(op) => op,
        _ => unreachable!("emit_grp5 called with a non-Grp5 opcode"),
    };
    let rm = instr.operands.first().cloned().ok_or(LiftError::UnsupportedOperandForm {
        address,
        detail: "Grp5 instruction requires one operand",
    })?;

    match op {
        Grp5Op::CallNear => {
            let target = read_operand(&rm, 32, segment);
            let return_addr = address + instr.length;
            let mut stmts = push_statements(Expr::Int(return_addr, T::DWORD), 32, None, pool);
            stmts.push(Statement::Jmp(target, Attrs::with_role("call")));
            Ok(stmts)
        }
        Grp5Op::JmpNear => {
            let target = read_operand(&rm, 32, segment);
            Ok(vec![Statement::Jmp(target, Attrs::none())])
        }
        Grp5Op::Push => {
            let value = read_operand(&rm, 32, segment);
            Ok(push_statements(value, 32, segment, pool))
        }
        Grp5Op::Inc | Grp5Op::Dec => Err(LiftError::UnsupportedOperandForm {
            address,
            detail: "Grp5 INC/DEC is lowered by the arithmetic emitter",
        }),
    }
}

#[allow(dead_code)]
fn resolve_label(name: &'static str) -> Statement {
    Statement::Label(LabelTarget::Name(name), Attrs::none())
}

#[cfg(test)]
mod tests {
    use super::*;
    use x86il_asm::{Gpr as AsmGpr, Opcode, OperandWidth};

    fn dummy_instr(opcode: Opcode, operands: Vec<Operand>, length: u64) -> Instruction {
        Instruction {
            opcode,
            operands,
            operand_width: OperandWidth::Width32,
            repeat: None,
            segment: None,
            length,
        }
    }

    #[test]
    fn push_captures_the_source_before_decrementing_esp() {
        let instr = dummy_instr(Opcode::Push, vec![Operand::Reg(GprRef::Dword(AsmGpr::Eax))], 1);
        let mut pool = TempPool::new();
        let stmts = emit_push(&instr, None, &mut pool).unwrap();
        assert_eq!(stmts.len(), 3);
        let temp = match &stmts[0] {
            Statement::Move(t @ Var::Temp(_, _), Expr::Var(Var::Gpr(Gpr::Eax)), _) => *t,
            other => panic!("expected the source captured into a temp first, got {other:?}"),
        };
        match &stmts[1] {
            Statement::Move(Var::Gpr(Gpr::Esp), Expr::BinOp(BinOp::Sub, _, _), _) => {}
            other => panic!("expected ESP decrement second, got {other:?}"),
        }
        match &stmts[2] {
            Statement::Move(Var::Mem, Expr::Store { addr, value, .. }, _) => {
                assert_eq!(**addr, esp());
                assert_eq!(**value, Expr::Var(temp));
            }
            other => panic!("expected a store addressed by the decremented ESP, got {other:?}"),
        }
    }

    #[test]
    fn push_esp_stores_the_original_value_not_the_decremented_one() {
        let instr = dummy_instr(Opcode::Push, vec![Operand::Reg(GprRef::Dword(AsmGpr::Esp))], 1);
        let mut pool = TempPool::new();
        let stmts = emit_push(&instr, None, &mut pool).unwrap();
        match &stmts[0] {
            Statement::Move(_, Expr::Var(Var::Gpr(Gpr::Esp)), _) => {}
            other => panic!("expected ESP's pre-decrement value captured, got {other:?}"),
        }
    }

    #[test]
    fn pop_reads_before_incrementing_esp() {
        let instr = dummy_instr(Opcode::Pop, vec![Operand::Reg(GprRef::Dword(AsmGpr::Eax))], 1);
        let stmts = emit_pop(&instr, None).unwrap();
        assert_eq!(stmts.len(), 2);
        match &stmts[0] {
            Statement::Move(Var::Gpr(Gpr::Eax), Expr::Load { .. }, _) => {}
            other => panic!("expected the popped value written first, got {other:?}"),
        }
        match &stmts[1] {
            Statement::Move(Var::Gpr(Gpr::Esp), Expr::BinOp(BinOp::Add, _, _), _) => {}
            other => panic!("expected the ESP increment second, got {other:?}"),
        }
    }

    #[test]
    fn pop_esp_suppresses_the_trailing_increment() {
        let instr = dummy_instr(Opcode::Pop, vec![Operand::Reg(GprRef::Dword(AsmGpr::Esp))], 1);
        let stmts = emit_pop(&instr, None).unwrap();
        assert_eq!(stmts.len(), 1);
        match &stmts[0] {
            Statement::Move(Var::Gpr(Gpr::Esp), Expr::Load { .. }, _) => {}
            other => panic!("expected the only statement to be the popped-value write, got {other:?}"),
        }
    }

    #[test]
    fn ret_captures_the_target_before_incrementing_esp_and_jumps_with_ret_role() {
        let instr = dummy_instr(Opcode::Ret, vec![], 1);
        let mut pool = TempPool::new();
        let stmts = emit_ret(&instr, &mut pool).unwrap();
        let temp = match &stmts[0] {
            Statement::Move(t @ Var::Temp(_, _), Expr::Load { .. }, _) => *t,
            other => panic!("expected the return address captured into a temp first, got {other:?}"),
        };
        match &stmts[1] {
            Statement::Move(Var::Gpr(Gpr::Esp), Expr::BinOp(BinOp::Add, _, _), _) => {}
            other => panic!("expected the ESP increment second, got {other:?}"),
        }
        let last = stmts.last().unwrap();
        assert_eq!(last.attrs().role, Some("ret"));
        match last {
            Statement::Jmp(Expr::Var(t), _) => assert_eq!(*t, temp),
            other => panic!("expected a jump through the captured temp, got {other:?}"),
        }
    }

    #[test]
    fn call_rel_pushes_return_address_after_the_call() {
        let instr = dummy_instr(Opcode::Call, vec![Operand::Imm(0)], 5);
        let mut pool = TempPool::new();
        let stmts = emit_call_rel(&instr, 0x1000, &mut pool).unwrap();
        match &stmts[0] {
            Statement::Move(_, Expr::Int(0x1005, T::Reg(32)), _) => {}
            other => panic!("expected the return address captured first, got {other:?}"),
        }
        match &stmts[2] {
            Statement::Move(Var::Mem, Expr::Store { addr, .. }, _) => {
                assert_eq!(**addr, esp());
            }
            other => panic!("expected return-address store, got {other:?}"),
        }
    }
}
