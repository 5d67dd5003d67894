//! `BT`/`BTS`/`BTR`/`BTC`, `BSF`/`BSR`, `SHLD`/`SHRD`, `CMPXCHG`/
//! `CMPXCHG8B`, and `XADD` (spec §4.6).

use crate::emit::lower::{read_operand, write_operand};
use crate::error::LiftError;
use crate::expr::{BinOp, Expr};
use crate::stmt::{Attrs, Statement};
use crate::ty::T;
use crate::vars::{Flag, Var};
use x86il_asm::{BitOp, EffectiveAddress, Instruction, Operand, Segment};

fn flag_move(flag: Flag, value: Expr) -> Statement {
    Statement::Move(Var::Flag(flag), value, Attrs::none())
}

fn bit_at(value: Expr, index: Expr, width: T) -> Expr {
    let shifted = Expr::BinOp(BinOp::LShr, Box::new(value), Box::new(index));
    Expr::Extract(0, 0, Box::new(Expr::BinOp(BinOp::And, Box::new(shifted), Box::new(Expr::Int(1, width)))))
}

/// Lowers plain `BT rm, r` (`0F A3`): sets `CF` to the addressed bit,
/// leaves the destination unmodified.
pub fn emit_bt(instr: &Instruction, address: u64, segment: Option<Segment>) -> Result<Vec<Statement>, LiftError> {
    let [dst, src] = match instr.operands.as_slice() {
        [d, s] => [d.clone(), s.clone()],
        _ => {
            return Err(LiftError::UnsupportedOperandForm {
                address,
                detail: "BT requires a bit-base and bit-index operand",
            })
        }
    };
    let width_bits = crate::emit::lower::operand_width(&dst, instr.operand_width.bits() as u32);
    let ty = T::Reg(width_bits);
    let base = read_operand(&dst, width_bits, segment);
    let index_raw = read_operand(&src, width_bits, segment);
    let index = Expr::BinOp(BinOp::And, Box::new(index_raw), Box::new(Expr::Int((width_bits - 1) as u64, ty)));
    Ok(vec![flag_move(Flag::Cf, bit_at(base, index, ty))])
}

/// Lowers `Grp8` (`0F BA`) `BT`/`BTS`/`BTR`/`BTC` with an immediate bit
/// index, and writes back the modified destination for the non-`BT`
/// variants.
pub fn emit_bt_group(
    instr: &Instruction,
    address: u64,
    segment: Option<Segment>,
) -> Result<Vec<Statement>, LiftError> {
    let op = match instr.opcode {
        x86il_asm::Opcode::BtGroup(op) => op,
        _ => unreachable!("emit_bt_group called with a non-BtGroup opcode"),
    };
    let [dst, imm] = match instr.operands.as_slice() {
        [d, i] => [d.clone(), i.clone()],
        _ => {
            return Err(LiftError::UnsupportedOperandForm {
                address,
                detail: "Grp8 bit instruction requires a destination and an immediate bit index",
            })
        }
    };
    let raw_index = match imm {
        Operand::Imm(v) => v,
        _ => {
            return Err(LiftError::UnsupportedOperandForm {
                address,
                detail: "Grp8 bit index must be an immediate",
            })
        }
    };

    // A memory destination is accessed one byte at a time: the immediate
    // index selects both a byte offset from the base address and a bit
    // within that byte, rather than indexing into the whole operand-width
    // load the way a register destination does.
    let (addressed, index_bits, width_bits) = match &dst {
        Operand::Mem(ea, _) => {
            let byte_offset = raw_index.div_euclid(8) as i32;
            let bit_in_byte = raw_index.rem_euclid(8) as u64;
            let adjusted = EffectiveAddress {
                disp: ea.disp.wrapping_add(byte_offset),
                ..*ea
            };
            (Operand::Mem(adjusted, 8), bit_in_byte, 8u32)
        }
        Operand::Reg(_) => {
            let width_bits = crate::emit::lower::operand_width(&dst, instr.operand_width.bits() as u32);
            (dst.clone(), (raw_index as u64) & (width_bits as u64 - 1), width_bits)
        }
        Operand::Imm(_) => {
            return Err(LiftError::UnsupportedOperandForm {
                address,
                detail: "Grp8 bit destination cannot be an immediate",
            })
        }
    };

    let ty = T::Reg(width_bits);
    let base = read_operand(&addressed, width_bits, segment);
    let index = Expr::Int(index_bits, ty);
    let mut stmts = vec![flag_move(Flag::Cf, bit_at(base.clone(), index.clone(), ty))];

    if !matches!(op, BitOp::Bt) {
        let mask = Expr::BinOp(BinOp::Shl, Box::new(Expr::Int(1, ty)), Box::new(index));
        let new_value = match op {
            BitOp::Bts => Expr::BinOp(BinOp::Or, Box::new(base), Box::new(mask)),
            BitOp::Btr => {
                let not_mask = Expr::UnOp(crate::expr::UnOp::Not, Box::new(mask));
                Expr::BinOp(BinOp::And, Box::new(base), Box::new(not_mask))
            }
            BitOp::Btc => Expr::BinOp(BinOp::Xor, Box::new(base), Box::new(mask)),
            BitOp::Bt => unreachable!(),
        };
        stmts.push(write_operand(&addressed, new_value, Attrs::none(), segment));
    }

    Ok(stmts)
}

/// Lowers `BSF`/`BSR`; the result is left `Unknown` when the source is
/// zero, matching the architecture's "destination undefined" behavior.
pub fn emit_bit_scan(
    instr: &Instruction,
    address: u64,
    segment: Option<Segment>,
    forward: bool,
) -> Result<Vec<Statement>, LiftError> {
    let [dst, src] = match instr.operands.as_slice() {
        [d, s] => [d.clone(), s.clone()],
        _ => {
            return Err(LiftError::UnsupportedOperandForm {
                address,
                detail: "BSF/BSR require a destination register and a source operand",
            })
        }
    };
    let width_bits = crate::emit::lower::operand_width(&dst, instr.operand_width.bits() as u32);
    let ty = T::Reg(width_bits);
    let source = read_operand(&src, width_bits, segment);
    let zero = Expr::BinOp(BinOp::Eq, Box::new(source.clone()), Box::new(Expr::zero(ty)));
    let tag = if forward { "BSF of zero" } else { "BSR of zero" };
    let scan_fn = if forward { "ctz" } else { "clz_from_msb" };
    let found = Expr::Unknown(scan_fn, ty);
    let result = Expr::Ite(Box::new(zero.clone()), Box::new(Expr::Unknown(tag, ty)), Box::new(found));
    Ok(vec![
        flag_move(Flag::Zf, zero),
        write_operand(&dst, result, Attrs::none(), segment),
    ])
}

/// Lowers `SHLD`/`SHRD`. Only the `width`-bit result is modeled; `CF` is
/// left `Unknown` (its exact last-shifted-bit semantics for the
/// double-precision shifts are not exercised by this decoder's callers).
pub fn emit_double_shift(
    instr: &Instruction,
    address: u64,
    segment: Option<Segment>,
    left: bool,
) -> Result<Vec<Statement>, LiftError> {
    let (dst, src, count) = match instr.operands.as_slice() {
        [d, s, c] => (d.clone(), s.clone(), c.clone()),
        _ => {
            return Err(LiftError::UnsupportedOperandForm {
                address,
                detail: "SHLD/SHRD require a destination, a source, and a count",
            })
        }
    };
    let width_bits = crate::emit::lower::operand_width(&dst, instr.operand_width.bits() as u32);
    let ty = T::Reg(width_bits);
    let a = read_operand(&dst, width_bits, segment);
    let b = read_operand(&src, width_bits, segment);
    let raw_count = read_operand(&count, 8, segment).zext(ty);
    let count = Expr::BinOp(BinOp::And, Box::new(raw_count), Box::new(Expr::Int((width_bits - 1) as u64, ty)));

    let result = if left {
        let left_part = Expr::BinOp(BinOp::Shl, Box::new(a), Box::new(count.clone()));
        let bits = Expr::Int(width_bits as u64, ty);
        let right_count = Expr::BinOp(BinOp::Sub, Box::new(bits), Box::new(count));
        let right_part = Expr::BinOp(BinOp::LShr, Box::new(b), Box::new(right_count));
        Expr::BinOp(BinOp::Or, Box::new(left_part), Box::new(right_part))
    } else {
        let right_part = Expr::BinOp(BinOp::LShr, Box::new(a), Box::new(count.clone()));
        let bits = Expr::Int(width_bits as u64, ty);
        let left_count = Expr::BinOp(BinOp::Sub, Box::new(bits), Box::new(count));
        let left_part = Expr::BinOp(BinOp::Shl, Box::new(b), Box::new(left_count));
        Expr::BinOp(BinOp::Or, Box::new(left_part), Box::new(right_part))
    };

    Ok(vec![
        flag_move(Flag::Cf, Expr::Unknown("SHLD/SHRD shifted-out bit", T::BOOL)),
        write_operand(&dst, result, Attrs::none(), segment),
    ])
}

/// Lowers `CMPXCHG rm, r`: compares the accumulator to the destination,
/// then conditionally writes either the source (on match) or reloads the
/// accumulator (on mismatch), modeled with an `Ite` rather than a branch.
pub fn emit_cmpxchg(
    instr: &Instruction,
    address: u64,
    segment: Option<Segment>,
) -> Result<Vec<Statement>, LiftError> {
    let [dst, src] = match instr.operands.as_slice() {
        [d, s] => [d.clone(), s.clone()],
        _ => {
            return Err(LiftError::UnsupportedOperandForm {
                address,
                detail: "CMPXCHG requires a destination and a source register",
            })
        }
    };
    let width_bits = crate::emit::lower::operand_width(&dst, instr.operand_width.bits() as u32);
    let ty = T::Reg(width_bits);
    let acc = crate::vars::read_sub(x86il_asm::Gpr::Eax.encoding(), width_bits);
    let dest_val = read_operand(&dst, width_bits, segment);
    let src_val = read_operand(&src, width_bits, segment);
    let matches = Expr::BinOp(BinOp::Eq, Box::new(acc.clone()), Box::new(dest_val.clone()));

    let diff = Expr::BinOp(BinOp::Sub, Box::new(acc.clone()), Box::new(dest_val.clone()));
    let mut stmts = crate::emit::flags::set_flags_sub(&acc, &dest_val, &diff, ty);

    let new_dest = Expr::Ite(Box::new(matches.clone()), Box::new(src_val), Box::new(dest_val.clone()));
    stmts.push(write_operand(&dst, new_dest, Attrs::none(), segment));

    let new_acc = Expr::Ite(Box::new(matches), Box::new(acc), Box::new(dest_val));
    stmts.push(crate::vars::write_sub(
        x86il_asm::Gpr::Eax.encoding(),
        width_bits,
        new_acc,
        Attrs::none(),
    ));
    Ok(stmts)
}

/// Lowers `CMPXCHG8B m64` as an `UnsupportedOperandForm`: an 8-byte
/// compare-and-swap has no faithful single-width lowering in this
/// emitter's 1/8/16/32/128-bit `T` vocabulary.
pub fn emit_cmpxchg8b(address: u64) -> Result<Vec<Statement>, LiftError> {
    Err(LiftError::UnsupportedOperandForm {
        address,
        detail: "CMPXCHG8B has no 64-bit IL type to round-trip through",
    })
}

/// Lowers `XADD rm, r`: adds, writes the sum to the destination, and
/// writes the destination's *original* value into the source register.
pub fn emit_xadd(
    instr: &Instruction,
    address: u64,
    segment: Option<Segment>,
) -> Result<Vec<Statement>, LiftError> {
    let [dst, src] = match instr.operands.as_slice() {
        [d, s] => [d.clone(), s.clone()],
        _ => {
            return Err(LiftError::UnsupportedOperandForm {
                address,
                detail: "XADD requires a destination and a source register",
            })
        }
    };
    let width_bits = crate::emit::lower::operand_width(&dst, instr.operand_width.bits() as u32);
    let ty = T::Reg(width_bits);
    let a = read_operand(&dst, width_bits, segment);
    let b = read_operand(&src, width_bits, segment);
    let sum = Expr::BinOp(BinOp::Add, Box::new(a.clone()), Box::new(b.clone()));
    let mut stmts = crate::emit::flags::set_flags_add(&a, &b, &sum, ty);
    stmts.push(write_operand(&src, a, Attrs::none(), segment));
    stmts.push(write_operand(&dst, sum, Attrs::none(), segment));
    Ok(stmts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use x86il_asm::{Gpr, GprRef, Opcode, OperandWidth};

    fn dummy(opcode: Opcode, operands: Vec<Operand>) -> Instruction {
        Instruction {
            opcode,
            operands,
            operand_width: OperandWidth::Width32,
            repeat: None,
            segment: None,
            length: 4,
        }
    }

    #[test]
    fn bt_group_bt_does_not_write_back() {
        let dst = Operand::Reg(GprRef::Dword(Gpr::Eax));
        let instr = dummy(Opcode::BtGroup(BitOp::Bt), vec![dst, Operand::Imm(17)]);
        let stmts = emit_bt_group(&instr, 0, None).unwrap();
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn bt_group_bts_writes_back() {
        let dst = Operand::Reg(GprRef::Dword(Gpr::Eax));
        let instr = dummy(Opcode::BtGroup(BitOp::Bts), vec![dst, Operand::Imm(3)]);
        let stmts = emit_bt_group(&instr, 0, None).unwrap();
        assert_eq!(stmts.len(), 2);
    }

    #[test]
    fn bt_group_memory_offset_17_addresses_the_third_byte_and_bit_1() {
        let ea = x86il_asm::EffectiveAddress {
            base: Some(Gpr::Eax),
            index: None,
            disp: 0x1000,
            address_width: x86il_asm::AddressWidth::Width32,
        };
        let dst = Operand::Mem(ea, 32);
        let instr = dummy(Opcode::BtGroup(BitOp::Bt), vec![dst, Operand::Imm(17)]);
        let stmts = emit_bt_group(&instr, 0, None).unwrap();
        match &stmts[0] {
            Statement::Move(Var::Flag(Flag::Cf), Expr::Extract(0, 0, inner), _) => match &**inner {
                Expr::BinOp(BinOp::And, shifted, _) => match &**shifted {
                    Expr::BinOp(BinOp::LShr, loaded, index) => {
                        assert_eq!(**index, Expr::Int(1, T::BYTE));
                        match &**loaded {
                            Expr::Load { addr, width: T::Reg(8), .. } => match &**addr {
                                Expr::BinOp(BinOp::Add, disp, _) => {
                                    assert_eq!(**disp, Expr::Int(0x1002, T::DWORD));
                                }
                                other => panic!("unexpected address shape {other:?}"),
                            },
                            other => panic!("expected an 8-bit load, got {other:?}"),
                        }
                    }
                    other => panic!("expected a right shift, got {other:?}"),
                },
                other => panic!("unexpected mask shape {other:?}"),
            },
            other => panic!("unexpected CF statement {other:?}"),
        }
    }

    #[test]
    fn cmpxchg8b_is_rejected() {
        assert!(emit_cmpxchg8b(0).is_err());
    }

    #[test]
    fn xadd_swaps_before_adding() {
        let dst = Operand::Reg(GprRef::Dword(Gpr::Eax));
        let src = Operand::Reg(GprRef::Dword(Gpr::Ecx));
        let instr = dummy(Opcode::Xadd, vec![dst, src]);
        let stmts = emit_xadd(&instr, 0, None).unwrap();
        // 6 flags + source write + dest write.
        assert_eq!(stmts.len(), 8);
    }
}
