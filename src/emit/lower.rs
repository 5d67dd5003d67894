//! Converts decode-level [`Operand`]/[`EffectiveAddress`] values into IL
//! expressions and statements.
//!
//! This is the single point where the root crate's `Expr` algebra meets
//! `x86il-asm`'s decode-level types, keeping the dependency edge
//! single-directional (root depends on asm, never the reverse).

use crate::expr::{BinOp, Expr};
use crate::stmt::{Attrs, Statement};
use crate::ty::T;
use crate::vars::{read_sub, write_sub, Var};
use x86il_asm::{AddressWidth, EffectiveAddress, GprRef, Operand, Segment};

fn segment_base(segment: Option<Segment>) -> Option<Expr> {
    match segment? {
        Segment::Fs => Some(Expr::Var(Var::FsBase)),
        Segment::Gs => Some(Expr::Var(Var::GsBase)),
        Segment::Cs | Segment::Ss | Segment::Ds | Segment::Es => None,
    }
}

fn scale_shift(scale: u8) -> u32 {
    match scale {
        1 => 0,
        2 => 1,
        4 => 2,
        8 => 3,
        other => panic!("invalid SIB scale {other}"),
    }
}

/// Builds the 32-bit flat address expression for a decoded memory operand.
///
/// 16-bit addressing wraps its `base + index + disp` sum at 16 bits before
/// zero-extending into the flat 32-bit space, matching real segment:offset
/// wraparound; 32-bit addressing wraps natively at 32 bits.
pub fn effective_address(ea: &EffectiveAddress, segment: Option<Segment>) -> Expr {
    let (addr_ty, disp_mask) = match ea.address_width {
        AddressWidth::Width16 => (T::WORD, 0xFFFFu64),
        AddressWidth::Width32 => (T::DWORD, 0xFFFF_FFFFu64),
    };

    let mut acc = Expr::Int(ea.disp as u32 as u64 & disp_mask, addr_ty);

    if let Some(base) = ea.base {
        let bits = addr_ty.bits();
        let base_expr = read_sub(base.encoding(), bits);
        acc = Expr::BinOp(BinOp::Add, Box::new(acc), Box::new(base_expr));
    }

    if let Some((index, scale)) = ea.index {
        let bits = addr_ty.bits();
        let idx_expr = read_sub(index.encoding(), bits);
        let scaled = Expr::BinOp(
            BinOp::Shl,
            Box::new(idx_expr),
            Box::new(Expr::Int(scale_shift(scale) as u64, addr_ty)),
        );
        acc = Expr::BinOp(BinOp::Add, Box::new(acc), Box::new(scaled));
    }

    let flat = match ea.address_width {
        AddressWidth::Width16 => acc.zext(T::DWORD),
        AddressWidth::Width32 => acc,
    };

    match segment_base(segment) {
        Some(base) => Expr::BinOp(BinOp::Add, Box::new(flat), Box::new(base)),
        None => flat,
    }
}

fn gpr_ref_to_sub(reg: GprRef) -> (u8, u32) {
    match reg {
        GprRef::Byte { reg, hi } => (reg.encoding() + if hi { 4 } else { 0 }, 8),
        GprRef::Word(reg) => (reg.encoding(), 16),
        GprRef::Dword(reg) => (reg.encoding(), 32),
        GprRef::Xmm(i) => (i, 128),
    }
}

/// The access width of an operand, in bits. Needed by callers that must
/// size a companion immediate or validate a width match before combining
/// two operands.
pub fn operand_width(op: &Operand, imm_width_bits: u32) -> u32 {
    match op {
        Operand::Reg(r) => gpr_ref_to_sub(*r).1,
        Operand::Mem(_, bits) => *bits as u32,
        Operand::Imm(_) => imm_width_bits,
    }
}

/// Reads a decoded operand as an `Expr`. `imm_width_bits` sizes bare
/// immediates, whose own width isn't carried by `Operand::Imm`.
pub fn read_operand(op: &Operand, imm_width_bits: u32, segment: Option<Segment>) -> Expr {
    match op {
        Operand::Reg(r) => {
            let (idx, bits) = gpr_ref_to_sub(*r);
            read_sub(idx, bits)
        }
        Operand::Mem(ea, bits) => {
            let addr = effective_address(ea, segment);
            Expr::Load {
                mem: Box::new(Expr::Var(Var::Mem)),
                addr: Box::new(addr),
                endian: crate::expr::Endian::Little,
                width: T::Reg(*bits as u32),
            }
        }
        Operand::Imm(v) => Expr::constant(*v as u64, T::Reg(imm_width_bits)),
    }
}

/// Builds the statement(s) that write `value` into a decoded destination
/// operand. Memory destinations produce a single `Move(Var::Mem, Store(..))`.
pub fn write_operand(op: &Operand, value: Expr, attrs: Attrs, segment: Option<Segment>) -> Statement {
    match op {
        Operand::Reg(r) => {
            let (idx, bits) = gpr_ref_to_sub(*r);
            write_sub(idx, bits, value, attrs)
        }
        Operand::Mem(ea, _) => {
            let addr = effective_address(ea, segment);
            let store = Expr::Store {
                mem: Box::new(Expr::Var(Var::Mem)),
                addr: Box::new(addr),
                value: Box::new(value),
                endian: crate::expr::Endian::Little,
            };
            Statement::Move(Var::Mem, store, attrs)
        }
        Operand::Imm(_) => panic!("cannot write to an immediate operand"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use x86il_asm::Gpr;

    #[test]
    fn disp_only_address_uses_flat_32_bit_width() {
        let ea = EffectiveAddress {
            base: None,
            index: None,
            disp: 0x1000,
            address_width: AddressWidth::Width32,
        };
        let e = effective_address(&ea, None);
        assert_eq!(crate::expr::infer_type(&e), T::DWORD);
    }

    #[test]
    fn sixteen_bit_address_is_zero_extended() {
        let ea = EffectiveAddress {
            base: Some(Gpr::Ebx),
            index: Some((Gpr::Esi, 1)),
            disp: 0,
            address_width: AddressWidth::Width16,
        };
        let e = effective_address(&ea, None);
        assert!(matches!(e, Expr::Cast(crate::expr::CastKind::ZeroExtend, T::Reg(32), _)));
    }

    #[test]
    fn segment_override_adds_base() {
        let ea = EffectiveAddress {
            base: None,
            index: None,
            disp: 0,
            address_width: AddressWidth::Width32,
        };
        let e = effective_address(&ea, Some(Segment::Fs));
        match e {
            Expr::BinOp(BinOp::Add, _, rhs) => assert_eq!(*rhs, Expr::Var(Var::FsBase)),
            other => panic!("expected FS_BASE addition, got {other:?}"),
        }
    }

    #[test]
    fn write_to_immediate_panics() {
        let result = std::panic::catch_unwind(|| {
            write_operand(&Operand::Imm(1), Expr::Int(0, T::DWORD), Attrs::none(), None)
        });
        assert!(result.is_err());
    }
}
