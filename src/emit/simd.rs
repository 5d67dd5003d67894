//! The minimal SSE subset this lifter understands: whole-register moves,
//! `PXOR`, `LDMXCSR`/`STMXCSR`, and opaque stand-ins for the lane-wise
//! instructions (`PSHUFD`/`PCMPEQ*`/`PALIGNR`/`PMOVMSKB`) that have no
//! faithful scalar `Expr` encoding in this emitter's algebra (spec §4.5,
//! "exhaustive SSE/AVX coverage" non-goal).

use crate::emit::lower::{read_operand, write_operand};
use crate::error::LiftError;
use crate::expr::{BinOp, Expr};
use crate::stmt::{Attrs, Statement};
use crate::ty::T;
use crate::vars::Var;
use x86il_asm::{Instruction, Operand, Segment};

fn binary_operands(instr: &Instruction, address: u64, what: &'static str) -> Result<(Operand, Operand), LiftError> {
    match instr.operands.as_slice() {
        [d, s] => Ok((d.clone(), s.clone())),
        _ => Err(LiftError::UnsupportedOperandForm { address, detail: what }),
    }
}

/// Lowers `MOVAPS`/`MOVD`/`MOVQ` in both load (register destination) and
/// store (memory destination) directions as a plain move, widening the
/// 32/64-bit forms by zero-extension when the destination is a wider XMM
/// register. The source's width is read directly off the decoded operand
/// rather than assumed, since `MOVQ`'s access width tracks the active
/// `66`-prefix SIMD operand size rather than a fixed constant.
pub fn emit_simd_move(instr: &Instruction, address: u64, segment: Option<Segment>) -> Result<Vec<Statement>, LiftError> {
    let (dst, src) = binary_operands(instr, address, "SSE move requires a destination and a source")?;
    let src_width = crate::emit::lower::operand_width(&src, instr.operand_width.bits() as u32);
    let dst_width = crate::emit::lower::operand_width(&dst, instr.operand_width.bits() as u32);
    let value = read_operand(&src, src_width, segment);
    let widened = if src_width < dst_width { value.zext(T::Reg(dst_width)) } else { value };
    Ok(vec![write_operand(&dst, widened, Attrs::none(), segment)])
}

/// Lowers `PXOR xmm, xmm/m128`.
pub fn emit_pxor(instr: &Instruction, address: u64, segment: Option<Segment>) -> Result<Vec<Statement>, LiftError> {
    let (dst, src) = binary_operands(instr, address, "PXOR requires a destination and a source")?;
    let a = read_operand(&dst, 128, segment);
    let b = read_operand(&src, 128, segment);
    let result = Expr::BinOp(BinOp::Xor, Box::new(a), Box::new(b));
    Ok(vec![write_operand(&dst, result, Attrs::none(), segment)])
}

/// Lowers `LDMXCSR m32`.
pub fn emit_ldmxcsr(instr: &Instruction, address: u64, segment: Option<Segment>) -> Result<Vec<Statement>, LiftError> {
    let src = instr.operands.first().ok_or(LiftError::UnsupportedOperandForm {
        address,
        detail: "LDMXCSR requires a memory source",
    })?;
    let value = read_operand(src, 32, segment);
    Ok(vec![Statement::Move(Var::Mxcsr, value, Attrs::none())])
}

/// Lowers `STMXCSR m32`.
pub fn emit_stmxcsr(
    instr: &Instruction,
    address: u64,
    segment: Option<Segment>,
) -> Result<Vec<Statement>, LiftError> {
    let dst = instr.operands.first().ok_or(LiftError::UnsupportedOperandForm {
        address,
        detail: "STMXCSR requires a memory destination",
    })?;
    Ok(vec![write_operand(dst, Expr::Var(Var::Mxcsr), Attrs::none(), segment)])
}

fn opaque_lane_op(
    instr: &Instruction,
    address: u64,
    tag: &'static str,
    segment: Option<Segment>,
) -> Result<Vec<Statement>, LiftError> {
    let dst = instr.operands.first().ok_or(LiftError::UnsupportedOperandForm {
        address,
        detail: "lane-wise SSE instruction requires a destination register",
    })?;
    Ok(vec![write_operand(dst, Expr::Unknown(tag, T::XMM), Attrs::none(), segment)])
}

/// Lowers `PSHUFD xmm, xmm/m128, imm8` as an opaque 128-bit result: the
/// permutation pattern is data, not control flow, so a symbolic `Unknown`
/// preserves the write-effect without claiming to model lane selection.
pub fn emit_pshufd(instr: &Instruction, address: u64, segment: Option<Segment>) -> Result<Vec<Statement>, LiftError> {
    opaque_lane_op(instr, address, "PSHUFD result", segment)
}

/// Lowers the `PCMPEQB`/`PCMPEQW`/`PCMPEQD` family as an opaque result.
pub fn emit_pcmpeq(instr: &Instruction, address: u64, segment: Option<Segment>) -> Result<Vec<Statement>, LiftError> {
    opaque_lane_op(instr, address, "PCMPEQ result", segment)
}

/// Lowers `PALIGNR xmm, xmm/m128, imm8` as an opaque result.
pub fn emit_palignr(instr: &Instruction, address: u64, segment: Option<Segment>) -> Result<Vec<Statement>, LiftError> {
    opaque_lane_op(instr, address, "PALIGNR result", segment)
}

/// Lowers `PMOVMSKB r32, xmm`: a 32-bit mask built from opaque per-byte
/// sign bits.
pub fn emit_pmovmskb(instr: &Instruction, address: u64, segment: Option<Segment>) -> Result<Vec<Statement>, LiftError> {
    let dst = instr.operands.first().ok_or(LiftError::UnsupportedOperandForm {
        address,
        detail: "PMOVMSKB requires a general-purpose destination",
    })?;
    Ok(vec![write_operand(
        dst,
        Expr::Unknown("PMOVMSKB mask", T::DWORD),
        Attrs::none(),
        segment,
    )])
}
