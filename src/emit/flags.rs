//! Flag-computation helpers shared by every arithmetic emitter.
//!
//! Each `set_*` function returns the `Move` statements that install the
//! flag bits only — callers still own the statement that commits the
//! result itself, so they can order "compute flags from a vs b" before or
//! after the destination write as they prefer.

use crate::expr::{BinOp, CastKind, Expr, UnOp};
use crate::stmt::{Attrs, Statement};
use crate::ty::T;
use crate::vars::{Flag, Var};

fn flag_move(flag: Flag, value: Expr) -> Statement {
    Statement::Move(Var::Flag(flag), value, Attrs::none())
}

/// Parity of the low 8 bits of `result`: `true` iff an even number of
/// those bits are set, computed as a cascade of pairwise XORs followed by
/// a final negation (so "even" reads as `true`, matching PF's definition).
pub fn parity(result: Expr) -> Expr {
    let byte = Expr::Extract(7, 0, Box::new(result));
    let mut acc = Expr::Extract(0, 0, Box::new(byte.clone()));
    for bit in 1..8u32 {
        let b = Expr::Extract(bit, bit, Box::new(byte.clone()));
        acc = Expr::BinOp(BinOp::Xor, Box::new(acc), Box::new(b));
    }
    Expr::UnOp(UnOp::Not, Box::new(acc))
}

/// `ZF = result == 0`.
pub fn zero(result: Expr, width: T) -> Expr {
    Expr::BinOp(
        BinOp::Eq,
        Box::new(result),
        Box::new(Expr::zero(width)),
    )
}

/// `SF = ` sign bit of `result`.
pub fn sign(result: Expr, width: T) -> Expr {
    let top = width.bits() - 1;
    Expr::Extract(top, top, Box::new(result))
}

/// Adjust flag for an addition: set iff bit 4 carries out of the low
/// nibble sum of `a` and `b`.
pub fn adjust_add(a: Expr, b: Expr) -> Expr {
    let an = Expr::Extract(3, 0, Box::new(a)).zext(T::Reg(5));
    let bn = Expr::Extract(3, 0, Box::new(b)).zext(T::Reg(5));
    let sum = Expr::BinOp(BinOp::Add, Box::new(an), Box::new(bn));
    Expr::Extract(4, 4, Box::new(sum))
}

/// Adjust flag for a subtraction: set iff the low-nibble subtraction of
/// `a - b` borrows.
pub fn adjust_sub(a: Expr, b: Expr) -> Expr {
    let an = Expr::Extract(3, 0, Box::new(a)).zext(T::Reg(5));
    let bn = Expr::Extract(3, 0, Box::new(b)).zext(T::Reg(5));
    Expr::BinOp(BinOp::ULt, Box::new(an), Box::new(bn))
}

/// Carry flag for an addition: the widened sum exceeds the operand width.
pub fn carry_add(a: Expr, b: Expr, width: T) -> Expr {
    let wide = T::Reg(width.bits() + 1);
    let aw = a.zext(wide);
    let bw = b.zext(wide);
    let sum = Expr::BinOp(BinOp::Add, Box::new(aw), Box::new(bw));
    let top = width.bits();
    Expr::Extract(top, top, Box::new(sum))
}

/// Carry (borrow) flag for a subtraction: `a < b` unsigned.
pub fn carry_sub(a: Expr, b: Expr) -> Expr {
    Expr::BinOp(BinOp::ULt, Box::new(a), Box::new(b))
}

/// Overflow flag for an addition: the operands share a sign and the
/// result's sign differs from it.
pub fn overflow_add(a: Expr, b: Expr, result: Expr, width: T) -> Expr {
    let top = width.bits() - 1;
    let sa = Expr::Extract(top, top, Box::new(a));
    let sb = Expr::Extract(top, top, Box::new(b));
    let sr = Expr::Extract(top, top, Box::new(result));
    let same_sign = Expr::BinOp(BinOp::Eq, Box::new(sa.clone()), Box::new(sb));
    let result_differs = Expr::BinOp(BinOp::Ne, Box::new(sa), Box::new(sr));
    Expr::BinOp(BinOp::And, Box::new(same_sign), Box::new(result_differs))
}

/// Overflow flag for a subtraction: the operands' signs differ and the
/// result's sign differs from the minuend's.
pub fn overflow_sub(a: Expr, b: Expr, result: Expr, width: T) -> Expr {
    let top = width.bits() - 1;
    let sa = Expr::Extract(top, top, Box::new(a));
    let sb = Expr::Extract(top, top, Box::new(b));
    let sr = Expr::Extract(top, top, Box::new(result));
    let differing_sign = Expr::BinOp(BinOp::Ne, Box::new(sa.clone()), Box::new(sb));
    let result_differs = Expr::BinOp(BinOp::Ne, Box::new(sa), Box::new(sr));
    Expr::BinOp(BinOp::And, Box::new(differing_sign), Box::new(result_differs))
}

/// Sets `PF`, `SF`, `ZF` from `result` alone, for bitwise operations
/// (`AND`/`OR`/`XOR`/`TEST`) that define only these three.
pub fn set_pszf(result: &Expr, width: T) -> Vec<Statement> {
    vec![
        flag_move(Flag::Pf, parity(result.clone())),
        flag_move(Flag::Sf, sign(result.clone(), width)),
        flag_move(Flag::Zf, zero(result.clone(), width)),
    ]
}

/// Sets all six arithmetic flags for an `ADD`/`ADC`-shaped operation.
pub fn set_flags_add(a: &Expr, b: &Expr, result: &Expr, width: T) -> Vec<Statement> {
    vec![
        flag_move(Flag::Cf, carry_add(a.clone(), b.clone(), width)),
        flag_move(Flag::Pf, parity(result.clone())),
        flag_move(Flag::Af, adjust_add(a.clone(), b.clone())),
        flag_move(Flag::Zf, zero(result.clone(), width)),
        flag_move(Flag::Sf, sign(result.clone(), width)),
        flag_move(Flag::Of, overflow_add(a.clone(), b.clone(), result.clone(), width)),
    ]
}

/// Sets all six arithmetic flags for a `SUB`/`SBB`/`CMP`-shaped operation.
pub fn set_flags_sub(a: &Expr, b: &Expr, result: &Expr, width: T) -> Vec<Statement> {
    vec![
        flag_move(Flag::Cf, carry_sub(a.clone(), b.clone())),
        flag_move(Flag::Pf, parity(result.clone())),
        flag_move(Flag::Af, adjust_sub(a.clone(), b.clone())),
        flag_move(Flag::Zf, zero(result.clone(), width)),
        flag_move(Flag::Sf, sign(result.clone(), width)),
        flag_move(Flag::Of, overflow_sub(a.clone(), b.clone(), result.clone(), width)),
    ]
}

/// Sets `AF`, `OF`, `PF`, `SF`, `ZF` for `INC`: identical to [`set_flags_add`]
/// against an implicit `+1`, minus `CF`, which `INC` leaves untouched.
pub fn set_aopszf_add(a: &Expr, one: &Expr, result: &Expr, width: T) -> Vec<Statement> {
    vec![
        flag_move(Flag::Af, adjust_add(a.clone(), one.clone())),
        flag_move(Flag::Of, overflow_add(a.clone(), one.clone(), result.clone(), width)),
        flag_move(Flag::Pf, parity(result.clone())),
        flag_move(Flag::Sf, sign(result.clone(), width)),
        flag_move(Flag::Zf, zero(result.clone(), width)),
    ]
}

/// Sets `AF`, `PF`, `SF`, `ZF` for `DEC`: identical to [`set_flags_sub`]
/// against an implicit `-1`, minus `CF`, which `DEC` leaves untouched.
pub fn set_apszf_sub(a: &Expr, one: &Expr, result: &Expr, width: T) -> Vec<Statement> {
    vec![
        flag_move(Flag::Af, adjust_sub(a.clone(), one.clone())),
        flag_move(Flag::Pf, parity(result.clone())),
        flag_move(Flag::Sf, sign(result.clone(), width)),
        flag_move(Flag::Zf, zero(result.clone(), width)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_flag_compares_against_zero_of_matching_width() {
        let e = zero(Expr::Int(0, T::DWORD), T::DWORD);
        assert!(matches!(e, Expr::BinOp(BinOp::Eq, _, _)));
    }

    #[test]
    fn sign_flag_extracts_top_bit() {
        let e = sign(Expr::Int(0, T::BYTE), T::BYTE);
        assert_eq!(e, Expr::Extract(7, 7, Box::new(Expr::Int(0, T::BYTE))));
    }

    #[test]
    fn set_flags_add_covers_all_six_flags() {
        let a = Expr::Int(1, T::DWORD);
        let b = Expr::Int(2, T::DWORD);
        let r = Expr::Int(3, T::DWORD);
        let stmts = set_flags_add(&a, &b, &r, T::DWORD);
        assert_eq!(stmts.len(), 6);
    }

    #[test]
    fn set_pszf_covers_three_flags() {
        let r = Expr::Int(0, T::DWORD);
        let stmts = set_pszf(&r, T::DWORD);
        assert_eq!(stmts.len(), 3);
    }

    #[test]
    fn inc_dec_helpers_omit_carry() {
        let a = Expr::Int(1, T::DWORD);
        let one = Expr::Int(1, T::DWORD);
        let r = Expr::Int(2, T::DWORD);
        assert_eq!(set_aopszf_add(&a, &one, &r, T::DWORD).len(), 5);
        assert_eq!(set_apszf_sub(&a, &one, &r, T::DWORD).len(), 4);
    }
}
