//! The fixed architectural variable table and sub-register aliasing rules
//! (spec §3, §4.2).

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::expr::Expr;
use crate::stmt::{Attrs, Statement};
use crate::ty::T;
use x86il_asm::Gpr;

/// One of the flag bits, each carried as an independent 1-bit variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Flag {
    Cf,
    Pf,
    Af,
    Zf,
    Sf,
    Of,
}

impl Flag {
    /// All six arithmetic flags, in the conventional EFLAGS bit order.
    pub const ALL: [Flag; 6] = [Flag::Cf, Flag::Pf, Flag::Af, Flag::Zf, Flag::Sf, Flag::Of];
}

/// A named, typed storage cell: either a fixed architectural register or a
/// fresh temporary scoped to one instruction's emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Var {
    /// A 32-bit general-purpose register.
    Gpr(Gpr),
    /// The 32-bit instruction pointer.
    Eip,
    /// An arithmetic flag bit.
    Flag(Flag),
    /// The string-operation direction pseudo-register: +1 or -1.
    Dflag,
    /// `FS` segment base, width 32.
    FsBase,
    /// `GS` segment base, width 32.
    GsBase,
    /// A 128-bit XMM register, indexed 0..7.
    Xmm(u8),
    /// The x87 control word, width 16.
    FpuControl,
    /// The SSE control/status register, width 32.
    Mxcsr,
    /// The single global memory array.
    Mem,
    /// A fresh temporary, unique within the instruction that created it,
    /// carrying the width it was allocated at (see [`crate::temp::TempPool`]).
    Temp(u64, T),
}

impl Var {
    /// The static type of this variable.
    pub fn ty(self) -> T {
        match self {
            Var::Gpr(_) | Var::Eip | Var::Dflag | Var::FsBase | Var::GsBase | Var::Mxcsr => {
                T::DWORD
            }
            Var::Flag(_) => T::BOOL,
            Var::Xmm(_) => T::XMM,
            Var::FpuControl => T::WORD,
            Var::Mem => T::Mem(32),
            Var::Temp(_, t) => t,
        }
    }
}

/// Builds the IL statement that writes `value` into the sub-register
/// addressed by `(reg, width)`, preserving the untouched bits of the
/// enclosing 32-bit register (spec §4.2).
///
/// `reg_index` is the raw ModR/M-style 0..7 encoding; for `width == 8` bits
/// 4..7 select the legacy high-byte registers (AH/CH/DH/BH) which alias the
/// base register `reg_index & 3`.
pub fn write_sub(reg_index: u8, width: u32, value: Expr, attrs: Attrs) -> Statement {
    match width {
        32 => {
            let reg = Var::Gpr(Gpr::from_bits(reg_index));
            Statement::Move(reg, value, attrs)
        }
        16 => {
            let reg = Var::Gpr(Gpr::from_bits(reg_index));
            let preserved = Expr::BinOp(
                crate::expr::BinOp::And,
                Box::new(Expr::Var(reg)),
                Box::new(Expr::Int(0xFFFF_0000, T::DWORD)),
            );
            let widened = Expr::Cast(crate::expr::CastKind::ZeroExtend, T::DWORD, Box::new(value));
            let merged = Expr::BinOp(crate::expr::BinOp::Or, Box::new(preserved), Box::new(widened));
            Statement::Move(reg, merged, attrs)
        }
        8 if reg_index < 4 => {
            let reg = Var::Gpr(Gpr::from_bits(reg_index));
            let preserved = Expr::BinOp(
                crate::expr::BinOp::And,
                Box::new(Expr::Var(reg)),
                Box::new(Expr::Int(0xFFFF_FF00, T::DWORD)),
            );
            let widened = Expr::Cast(crate::expr::CastKind::ZeroExtend, T::DWORD, Box::new(value));
            let merged = Expr::BinOp(crate::expr::BinOp::Or, Box::new(preserved), Box::new(widened));
            Statement::Move(reg, merged, attrs)
        }
        8 => {
            let base = Var::Gpr(Gpr::from_bits(reg_index & 0x03));
            let preserved = Expr::BinOp(
                crate::expr::BinOp::And,
                Box::new(Expr::Var(base)),
                Box::new(Expr::Int(0xFFFF_00FF, T::DWORD)),
            );
            let widened = Expr::Cast(crate::expr::CastKind::ZeroExtend, T::DWORD, Box::new(value));
            let shifted = Expr::BinOp(
                crate::expr::BinOp::Shl,
                Box::new(widened),
                Box::new(Expr::Int(8, T::DWORD)),
            );
            let merged = Expr::BinOp(crate::expr::BinOp::Or, Box::new(preserved), Box::new(shifted));
            Statement::Move(base, merged, attrs)
        }
        128 => {
            let reg = Var::Xmm(reg_index & 0x07);
            Statement::Move(reg, value, attrs)
        }
        other => panic!("write_sub: unsupported sub-register width {other}"),
    }
}

/// Builds the expression that reads the sub-register addressed by
/// `(reg_index, width)`, mirroring [`write_sub`]'s aliasing rules.
pub fn read_sub(reg_index: u8, width: u32) -> Expr {
    match width {
        32 => Expr::Var(Var::Gpr(Gpr::from_bits(reg_index))),
        16 => Expr::Extract(15, 0, Box::new(Expr::Var(Var::Gpr(Gpr::from_bits(reg_index))))),
        8 if reg_index < 4 => {
            Expr::Extract(7, 0, Box::new(Expr::Var(Var::Gpr(Gpr::from_bits(reg_index)))))
        }
        8 => {
            let base = Var::Gpr(Gpr::from_bits(reg_index & 0x03));
            Expr::Extract(15, 8, Box::new(Expr::Var(base)))
        }
        128 => Expr::Var(Var::Xmm(reg_index & 0x07)),
        other => panic!("read_sub: unsupported sub-register width {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpr_and_segment_vars_are_dword() {
        assert_eq!(Var::Gpr(Gpr::Eax).ty(), T::DWORD);
        assert_eq!(Var::FsBase.ty(), T::DWORD);
        assert_eq!(Var::Dflag.ty(), T::DWORD);
    }

    #[test]
    fn flags_are_one_bit() {
        for f in Flag::ALL {
            assert_eq!(Var::Flag(f).ty(), T::BOOL);
        }
    }

    #[test]
    fn write_sub_32_is_a_plain_move() {
        let stmt = write_sub(0, 32, Expr::Int(1, T::DWORD), Attrs::default());
        match stmt {
            Statement::Move(Var::Gpr(Gpr::Eax), Expr::Int(1, _), _) => {}
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn write_sub_high_byte_aliases_base_register() {
        // index 4 means AH, which aliases EAX.
        let stmt = write_sub(4, 8, Expr::Int(0xAB, T::BYTE), Attrs::default());
        match stmt {
            Statement::Move(Var::Gpr(Gpr::Eax), expr, _) => {
                assert!(matches!(expr, Expr::BinOp(crate::expr::BinOp::Or, _, _)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn read_sub_low_byte_extracts_bits_7_0() {
        let e = read_sub(3, 8);
        assert!(matches!(e, Expr::Extract(7, 0, _)));
    }

    #[test]
    fn read_sub_high_byte_extracts_bits_15_8() {
        let e = read_sub(7, 8);
        assert!(matches!(e, Expr::Extract(15, 8, _)));
    }

    /// Evaluates the narrow set of `Expr` shapes `write_sub`/`read_sub`
    /// build against a single concrete EAX value, for the property tests
    /// below. Not a general IL interpreter: it panics on anything these two
    /// functions don't produce.
    fn eval_against_eax(expr: &Expr, eax: u32) -> u32 {
        match expr {
            Expr::Int(v, _) => *v as u32,
            Expr::Var(Var::Gpr(Gpr::Eax)) => eax,
            Expr::Cast(crate::expr::CastKind::ZeroExtend, _, inner) => eval_against_eax(inner, eax),
            Expr::Extract(15, 8, inner) => (eval_against_eax(inner, eax) >> 8) & 0xFF,
            Expr::BinOp(crate::expr::BinOp::And, a, b) => {
                eval_against_eax(a, eax) & eval_against_eax(b, eax)
            }
            Expr::BinOp(crate::expr::BinOp::Or, a, b) => {
                eval_against_eax(a, eax) | eval_against_eax(b, eax)
            }
            Expr::BinOp(crate::expr::BinOp::Shl, a, b) => {
                eval_against_eax(a, eax) << eval_against_eax(b, eax)
            }
            other => panic!("eval_against_eax: unhandled shape {other:?}"),
        }
    }

    #[quickcheck_macros::quickcheck]
    fn write_sub_byte_then_read_dword_preserves_the_upper_bits(eax: u32, b: u8) -> bool {
        // reg_index 0 is AL, aliasing the low byte of EAX.
        let stmt = write_sub(0, 8, Expr::Int(b as u64, T::BYTE), Attrs::default());
        let merged = match stmt {
            Statement::Move(Var::Gpr(Gpr::Eax), expr, _) => expr,
            other => panic!("unexpected {other:?}"),
        };
        let result = eval_against_eax(&merged, eax);
        result == (eax & 0xFFFF_FF00) | (b as u32)
    }

    #[quickcheck_macros::quickcheck]
    fn write_sub_high_byte_then_read_dword_preserves_the_other_bits(eax: u32, b: u8) -> bool {
        // reg_index 4 is AH, aliasing bits 8..15 of EAX.
        let stmt = write_sub(4, 8, Expr::Int(b as u64, T::BYTE), Attrs::default());
        let merged = match stmt {
            Statement::Move(Var::Gpr(Gpr::Eax), expr, _) => expr,
            other => panic!("unexpected {other:?}"),
        };
        let result = eval_against_eax(&merged, eax);
        result == (eax & 0xFFFF_00FF) | ((b as u32) << 8)
    }

    #[quickcheck_macros::quickcheck]
    fn write_sub_word_then_read_dword_preserves_the_upper_word(eax: u32, w: u16) -> bool {
        let stmt = write_sub(0, 16, Expr::Int(w as u64, T::WORD), Attrs::default());
        let merged = match stmt {
            Statement::Move(Var::Gpr(Gpr::Eax), expr, _) => expr,
            other => panic!("unexpected {other:?}"),
        };
        let result = eval_against_eax(&merged, eax);
        result == (eax & 0xFFFF_0000) | (w as u32)
    }

    #[quickcheck_macros::quickcheck]
    fn read_sub_high_byte_matches_the_written_byte(eax: u32) -> bool {
        let read = read_sub(4, 8);
        eval_against_eax(&read, eax) == (eax >> 8) & 0xFF
    }
}
