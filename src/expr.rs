//! The pure expression algebra (spec §3, §4.1).
//!
//! Every constructor is total and carries (or can derive) its result
//! width; [`infer_type`] recovers that width for an arbitrary expression
//! tree, which the emitter uses to sanity-check binary operands match
//! width before combining them.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::ty::T;
use crate::vars::Var;

/// A binary operator. Both operands must share one width; comparisons
/// always produce a 1-bit result regardless of operand width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    SDiv,
    UDiv,
    SMod,
    UMod,
    And,
    Or,
    Xor,
    Shl,
    LShr,
    AShr,
    Eq,
    Ne,
    SLt,
    ULt,
    SLe,
    ULe,
}

impl BinOp {
    /// `true` if this operator always yields a 1-bit result irrespective
    /// of its operands' width.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::SLt | BinOp::ULt | BinOp::SLe | BinOp::ULe
        )
    }
}

/// A unary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum UnOp {
    Neg,
    Not,
}

/// The kind of width conversion performed by [`Expr::Cast`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CastKind {
    /// Widen, filling new high bits with zero.
    ZeroExtend,
    /// Widen, filling new high bits by replicating the sign bit.
    SignExtend,
    /// Narrow to the low bits of the source.
    Low,
    /// Narrow to the high bits of the source, at the target width.
    High,
}

/// Byte order for a [`Expr::Load`]/[`Expr::Store`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Endian {
    Little,
}

/// A pure, side-effect-free expression.
///
/// `Store` is pure in the sense that it yields a *new* memory value rather
/// than mutating anything; only `Statement::Move(Var::Mem, ...)` commits a
/// freshly built memory value as the architectural state.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Expr {
    /// A literal, reduced modulo its width.
    Int(u64, T),
    /// A read of a named variable.
    Var(Var),
    /// A memory read at `addr`, `width` bits wide.
    Load {
        mem: Box<Expr>,
        addr: Box<Expr>,
        endian: Endian,
        width: T,
    },
    /// A memory write of `value` at `addr`; evaluates to the updated
    /// memory array.
    Store {
        mem: Box<Expr>,
        addr: Box<Expr>,
        value: Box<Expr>,
        endian: Endian,
    },
    BinOp(BinOp, Box<Expr>, Box<Expr>),
    UnOp(UnOp, Box<Expr>),
    Cast(CastKind, T, Box<Expr>),
    /// `Extract(hi, lo, a)`: bits `hi..=lo` of `a`, inclusive, zero-indexed
    /// from the LSB. Result width is `hi - lo + 1`.
    Extract(u32, u32, Box<Expr>),
    /// `Concat(hi, lo)`: `hi` placed above `lo`; result width is the sum
    /// of both operand widths.
    Concat(Box<Expr>, Box<Expr>),
    /// `Ite(cond, then, else)`: `cond` must be 1-bit; `then`/`else` must
    /// share one width, which becomes the result width.
    Ite(Box<Expr>, Box<Expr>, Box<Expr>),
    /// A value this crate cannot characterize precisely (e.g. flags after
    /// an opcode that leaves them architecturally undefined).
    Unknown(&'static str, T),
    /// A forward reference to a jump-target label, resolved by a later
    /// analysis stage.
    Lab(&'static str),
}

impl Expr {
    /// Builds a zero-valued constant of the given width.
    pub fn zero(ty: T) -> Expr {
        Expr::Int(0, ty)
    }

    /// Builds a constant, reducing `value` modulo the target width.
    pub fn constant(value: u64, ty: T) -> Expr {
        let bits = ty.bits();
        let masked = if bits >= 64 { value } else { value & ((1u64 << bits) - 1) };
        Expr::Int(masked, ty)
    }

    /// Zero-extends this expression to `ty`.
    pub fn zext(self, ty: T) -> Expr {
        Expr::Cast(CastKind::ZeroExtend, ty, Box::new(self))
    }

    /// Sign-extends this expression to `ty`.
    pub fn sext(self, ty: T) -> Expr {
        Expr::Cast(CastKind::SignExtend, ty, Box::new(self))
    }

    /// Narrows this expression to its low `ty` bits.
    pub fn low(self, ty: T) -> Expr {
        Expr::Cast(CastKind::Low, ty, Box::new(self))
    }

    /// The low byte of a wider expression (AL-style extraction).
    pub fn low_byte(self) -> Expr {
        Expr::Extract(7, 0, Box::new(self))
    }

    /// The second-lowest byte of a wider expression (AH-style extraction).
    pub fn high_byte(self) -> Expr {
        Expr::Extract(15, 8, Box::new(self))
    }
}

/// Recovers the static width of an expression.
///
/// Panics if the tree is internally inconsistent (mismatched `BinOp`
/// operand widths, an `Ite` with differently widthed arms) — those are
/// emitter bugs, never caused by input bytes, so this is deliberately a
/// hard assertion rather than a `Result`.
pub fn infer_type(e: &Expr) -> T {
    match e {
        Expr::Int(_, t) => *t,
        Expr::Var(v) => v.ty(),
        Expr::Load { width, .. } => *width,
        Expr::Store { mem, .. } => infer_type(mem),
        Expr::BinOp(op, a, b) => {
            let ta = infer_type(a);
            let tb = infer_type(b);
            assert_eq!(ta, tb, "BinOp operand width mismatch: {ta:?} vs {tb:?}");
            if op.is_comparison() {
                T::BOOL
            } else {
                ta
            }
        }
        Expr::UnOp(_, a) => infer_type(a),
        Expr::Cast(_, t, _) => *t,
        Expr::Extract(hi, lo, _) => {
            assert!(hi >= lo, "Extract high bit must be >= low bit");
            T::Reg(hi - lo + 1)
        }
        Expr::Concat(hi, lo) => {
            let bh = infer_type(hi).bits();
            let bl = infer_type(lo).bits();
            T::Reg(bh + bl)
        }
        Expr::Ite(_, a, b) => {
            let ta = infer_type(a);
            let tb = infer_type(b);
            assert_eq!(ta, tb, "Ite arm width mismatch: {ta:?} vs {tb:?}");
            ta
        }
        Expr::Unknown(_, t) => *t,
        Expr::Lab(_) => T::DWORD,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use x86il_asm::Gpr;

    #[test]
    fn constant_is_masked_to_width() {
        let c = Expr::constant(0x1FF, T::BYTE);
        assert_eq!(c, Expr::Int(0xFF, T::BYTE));
    }

    #[test]
    fn infer_type_of_int_is_its_own_type() {
        assert_eq!(infer_type(&Expr::Int(1, T::DWORD)), T::DWORD);
    }

    #[test]
    fn infer_type_of_comparison_is_bool() {
        let e = Expr::BinOp(
            BinOp::Eq,
            Box::new(Expr::Int(1, T::DWORD)),
            Box::new(Expr::Int(1, T::DWORD)),
        );
        assert_eq!(infer_type(&e), T::BOOL);
    }

    #[test]
    fn infer_type_of_extract_is_bit_span_width() {
        let e = Expr::Extract(15, 8, Box::new(Expr::Var(Var::Gpr(Gpr::Eax))));
        assert_eq!(infer_type(&e), T::Reg(8));
    }

    #[test]
    fn infer_type_of_concat_sums_widths() {
        let e = Expr::Concat(
            Box::new(Expr::Int(0, T::WORD)),
            Box::new(Expr::Int(0, T::WORD)),
        );
        assert_eq!(infer_type(&e), T::DWORD);
    }

    #[test]
    #[should_panic]
    fn infer_type_rejects_mismatched_binop_widths() {
        let e = Expr::BinOp(
            BinOp::Add,
            Box::new(Expr::Int(0, T::BYTE)),
            Box::new(Expr::Int(0, T::DWORD)),
        );
        let _ = infer_type(&e);
    }

    #[test]
    fn low_byte_and_high_byte_build_expected_extracts() {
        let base = Expr::Var(Var::Gpr(Gpr::Eax));
        assert_eq!(base.clone().low_byte(), Expr::Extract(7, 0, Box::new(Expr::Var(Var::Gpr(Gpr::Eax)))));
        assert_eq!(base.high_byte(), Expr::Extract(15, 8, Box::new(Expr::Var(Var::Gpr(Gpr::Eax)))));
    }
}
