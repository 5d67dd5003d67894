//! `MOVS`/`CMPS`/`SCAS`/`STOS`/`LODS` and the `REP`/`REPZ`/`REPNZ` template
//! that wraps them (spec §4.6).
//!
//! Width is taken from the opcode's `b` suffix family: this decoder only
//! classifies the byte (`...SB`) and dword (`...SD`/`...SW` under `66`)
//! forms into one [`x86il_asm::StringOp`] tag, so the emitter infers width
//! from `instr.operand_width`/the fixed-8-bit convention per mnemonic byte.
//! Since the decoder does not currently distinguish the byte-suffixed
//! opcode (`A4`) from the wide-suffixed one (`A5`) once classified, callers
//! pass the access width in explicitly via `width_bits`.

use crate::emit::flags;
use crate::error::LiftError;
use crate::expr::{BinOp, Expr};
use crate::stmt::{Attrs, LabelTarget, Statement};
use crate::ty::T;
use crate::vars::{Flag, Var};
use x86il_asm::{Gpr, Instruction, Repeat, StringOp};

fn esi() -> Expr {
    Expr::Var(Var::Gpr(Gpr::Esi))
}
fn edi() -> Expr {
    Expr::Var(Var::Gpr(Gpr::Edi))
}
fn ecx() -> Expr {
    Expr::Var(Var::Gpr(Gpr::Ecx))
}
fn stride(width_bits: u32) -> Expr {
    let bytes = (width_bits / 8) as u64;
    Expr::BinOp(
        BinOp::Mul,
        Box::new(Expr::Var(Var::Dflag)),
        Box::new(Expr::Int(bytes, T::DWORD)),
    )
}

fn advance(reg: Gpr, width_bits: u32) -> Statement {
    Statement::Move(
        Var::Gpr(reg),
        Expr::BinOp(BinOp::Add, Box::new(Expr::Var(Var::Gpr(reg))), Box::new(stride(width_bits))),
        Attrs::none(),
    )
}

fn load_at(reg: Gpr, width_bits: u32) -> Expr {
    Expr::Load {
        mem: Box::new(Expr::Var(Var::Mem)),
        addr: Box::new(Expr::Var(Var::Gpr(reg))),
        endian: crate::expr::Endian::Little,
        width: T::Reg(width_bits),
    }
}

/// The statements one iteration of the string operation performs, not
/// counting the `REP` loop scaffolding.
fn body(op: StringOp, width_bits: u32) -> Vec<Statement> {
    let ty = T::Reg(width_bits);
    match op {
        StringOp::Movs => {
            let value = load_at(Gpr::Esi, width_bits);
            let store = Expr::Store {
                mem: Box::new(Expr::Var(Var::Mem)),
                addr: Box::new(edi()),
                value: Box::new(value),
                endian: crate::expr::Endian::Little,
            };
            vec![
                Statement::Move(Var::Mem, store, Attrs::none()),
                advance(Gpr::Esi, width_bits),
                advance(Gpr::Edi, width_bits),
            ]
        }
        StringOp::Cmps => {
            let a = load_at(Gpr::Esi, width_bits);
            let b = load_at(Gpr::Edi, width_bits);
            let r = Expr::BinOp(BinOp::Sub, Box::new(a.clone()), Box::new(b.clone()));
            let mut stmts = flags::set_flags_sub(&a, &b, &r, ty);
            stmts.push(advance(Gpr::Esi, width_bits));
            stmts.push(advance(Gpr::Edi, width_bits));
            stmts
        }
        StringOp::Scas => {
            let a = crate::vars::read_sub(a_index(), width_bits);
            let b = load_at(Gpr::Edi, width_bits);
            let r = Expr::BinOp(BinOp::Sub, Box::new(a.clone()), Box::new(b.clone()));
            let mut stmts = flags::set_flags_sub(&a, &b, &r, ty);
            stmts.push(advance(Gpr::Edi, width_bits));
            stmts
        }
        StringOp::Stos => {
            let value = crate::vars::read_sub(a_index(), width_bits);
            let store = Expr::Store {
                mem: Box::new(Expr::Var(Var::Mem)),
                addr: Box::new(edi()),
                value: Box::new(value),
                endian: crate::expr::Endian::Little,
            };
            vec![
                Statement::Move(Var::Mem, store, Attrs::none()),
                advance(Gpr::Edi, width_bits),
            ]
        }
        StringOp::Lods => {
            let value = load_at(Gpr::Esi, width_bits);
            let write = crate::vars::write_sub(a_index(), width_bits, value, Attrs::none());
            vec![write, advance(Gpr::Esi, width_bits)]
        }
    }
}

fn a_index() -> u8 {
    x86il_asm::Gpr::Eax.encoding()
}

/// Lowers a string-operation instruction, wrapping it in the `REP`
/// test-decrement-test loop template when a repeat prefix is present.
///
/// Plain (unprefixed) string operations lower to one iteration's worth of
/// statements with no loop scaffolding.
pub fn emit_string_op(instr: &Instruction, width_bits: u32) -> Result<Vec<Statement>, LiftError> {
    let op = match instr.opcode {
        x86il_asm::Opcode::StringOp(op) => op,
        _ => unreachable!("emit_string_op called with a non-StringOp opcode"),
    };

    let inner = body(op, width_bits);

    let repeat = match instr.repeat {
        Some(r) => r,
        None => return Ok(inner),
    };

    // REP template: while (ECX != 0) { body(); ECX -= 1; [if CMPS/SCAS: break unless ZF matches repeat sense] }
    let loop_start = LabelTarget::Name("rep_loop_start");
    let loop_test_zf = LabelTarget::Name("rep_loop_zf_test");
    let loop_end = LabelTarget::Name("rep_loop_end");

    let mut stmts = vec![Statement::Label(loop_start.clone(), Attrs::none())];

    stmts.push(Statement::CJmp {
        cond: Expr::BinOp(BinOp::Eq, Box::new(ecx()), Box::new(Expr::zero(T::DWORD))),
        then_target: Expr::Lab("rep_loop_end"),
        else_target: Expr::Lab("rep_loop_body"),
        attrs: Attrs::none(),
    });
    stmts.push(Statement::Label(LabelTarget::Name("rep_loop_body"), Attrs::none()));
    stmts.extend(inner);
    stmts.push(Statement::Move(
        Var::Gpr(Gpr::Ecx),
        Expr::BinOp(BinOp::Sub, Box::new(ecx()), Box::new(Expr::Int(1, T::DWORD))),
        Attrs::none(),
    ));

    if matches!(op, StringOp::Cmps | StringOp::Scas) {
        let continue_cond = match repeat {
            Repeat::RepZ => Expr::Var(Var::Flag(Flag::Zf)),
            Repeat::RepNz => Expr::UnOp(crate::expr::UnOp::Not, Box::new(Expr::Var(Var::Flag(Flag::Zf)))),
        };
        stmts.push(Statement::Label(loop_test_zf.clone(), Attrs::none()));
        stmts.push(Statement::CJmp {
            cond: continue_cond,
            then_target: Expr::Lab("rep_loop_start"),
            else_target: Expr::Lab("rep_loop_end"),
            attrs: Attrs::none(),
        });
    } else {
        stmts.push(Statement::Jmp(Expr::Lab("rep_loop_start"), Attrs::none()));
    }

    stmts.push(Statement::Label(loop_end, Attrs::none()));
    Ok(stmts)
}
