//! ModR/M and SIB decoding (spec §4.4).
//!
//! Produces an [`EffectiveAddress`] descriptor rather than an IL expression:
//! this crate has no notion of `Expr`, so memory operands are handed to the
//! root crate as `base + index*scale + disp` components for the emitter to
//! lower into `Load`/`Store` nodes.

use crate::error::DecodeError;
use crate::gpr::Gpr;
use crate::prefix::AddressWidth;
use crate::reader::{ByteOracle, Reader};

/// A decoded memory operand, prior to IL lowering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveAddress {
    /// Base register, if any.
    pub base: Option<Gpr>,
    /// Index register and scale factor (1, 2, 4, or 8), if any. Always
    /// scale 1 when `address_width` is [`AddressWidth::Width16`].
    pub index: Option<(Gpr, u8)>,
    /// Displacement, sign-extended to 32 bits.
    pub disp: i32,
    /// The addressing mode this operand was decoded under. 16-bit mode
    /// combines `base + index` with wrapping 16-bit arithmetic before
    /// zero-extension into the flat address space; 32-bit mode wraps at 32
    /// bits.
    pub address_width: AddressWidth,
}

/// The register-or-memory operand selected by a ModR/M byte's mod/rm
/// fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegOrMem {
    /// `mod == 11`: a register, named by its raw 3-bit encoding. The
    /// caller supplies the operand width to resolve this into a concrete
    /// [`crate::gpr::GprRef`].
    Reg(u8),
    /// Any other `mod` value: a memory reference.
    Mem(EffectiveAddress),
}

/// A fully decoded ModR/M byte, plus any trailing SIB/displacement bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModRm {
    /// The raw `mod` field (0..3).
    pub md: u8,
    /// The raw `reg` field (0..7): either a register operand or, for
    /// group opcodes, an opcode extension.
    pub reg: u8,
    /// The resolved `rm` operand.
    pub rm: RegOrMem,
}

/// Decodes one ModR/M byte (and any SIB/displacement it implies) from
/// `reader`, using `address_width` to select the 16-bit or 32-bit table.
pub fn decode_modrm<O: ByteOracle + ?Sized>(
    reader: &mut Reader<'_, O>,
    address_width: AddressWidth,
) -> Result<ModRm, DecodeError> {
    let offset = reader.pos();
    let byte = reader.u8();
    let md = (byte >> 6) & 0x03;
    let reg = (byte >> 3) & 0x07;
    let rm = byte & 0x07;

    if md == 0b11 {
        return Ok(ModRm {
            md,
            reg,
            rm: RegOrMem::Reg(rm),
        });
    }

    let ea = match address_width {
        AddressWidth::Width32 => decode_ea_32(reader, md, rm, offset)?,
        AddressWidth::Width16 => decode_ea_16(reader, md, rm),
    };

    Ok(ModRm {
        md,
        reg,
        rm: RegOrMem::Mem(ea),
    })
}

fn decode_ea_32<O: ByteOracle + ?Sized>(
    reader: &mut Reader<'_, O>,
    md: u8,
    rm: u8,
    modrm_offset: u64,
) -> Result<EffectiveAddress, DecodeError> {
    if rm == 0b100 {
        return decode_sib_32(reader, md, modrm_offset);
    }

    if md == 0b00 && rm == 0b101 {
        let disp = reader.u32() as i32;
        return Ok(EffectiveAddress {
            base: None,
            index: None,
            disp,
            address_width: AddressWidth::Width32,
        });
    }

    let base = Some(Gpr::from_bits(rm));
    let disp = read_disp_32(reader, md);
    Ok(EffectiveAddress {
        base,
        index: None,
        disp,
        address_width: AddressWidth::Width32,
    })
}

fn decode_sib_32<O: ByteOracle + ?Sized>(
    reader: &mut Reader<'_, O>,
    md: u8,
    modrm_offset: u64,
) -> Result<EffectiveAddress, DecodeError> {
    let sib = reader.u8();
    let scale_bits = (sib >> 6) & 0x03;
    let index_bits = (sib >> 3) & 0x07;
    let base_bits = sib & 0x07;
    let scale = 1u8 << scale_bits;

    let index = if index_bits == 0b100 {
        None
    } else {
        Some((Gpr::from_bits(index_bits), scale))
    };

    let (base, disp_from_no_base) = if base_bits == 0b101 && md == 0b00 {
        (None, true)
    } else {
        (Some(Gpr::from_bits(base_bits)), false)
    };

    let disp = if disp_from_no_base {
        reader.u32() as i32
    } else {
        read_disp_32(reader, md)
    };

    if base.is_none() && index.is_none() && !disp_from_no_base {
        return Err(DecodeError::InvalidEncoding {
            offset: modrm_offset,
            detail: "SIB byte selects neither base nor index with a non-zero mod",
        });
    }

    Ok(EffectiveAddress {
        base,
        index,
        disp,
        address_width: AddressWidth::Width32,
    })
}

fn read_disp_32<O: ByteOracle + ?Sized>(reader: &mut Reader<'_, O>, md: u8) -> i32 {
    match md {
        0b01 => reader.i8_sext32(),
        0b10 => reader.u32() as i32,
        _ => 0,
    }
}

/// `rm` field meaning under the legacy 16-bit addressing table (spec §4.4).
fn decode_ea_16<O: ByteOracle + ?Sized>(
    reader: &mut Reader<'_, O>,
    md: u8,
    rm: u8,
) -> EffectiveAddress {
    let (base, index) = match rm {
        0b000 => (Some(Gpr::Ebx), Some((Gpr::Esi, 1))),
        0b001 => (Some(Gpr::Ebx), Some((Gpr::Edi, 1))),
        0b010 => (Some(Gpr::Ebp), Some((Gpr::Esi, 1))),
        0b011 => (Some(Gpr::Ebp), Some((Gpr::Edi, 1))),
        0b100 => (Some(Gpr::Esi), None),
        0b101 => (Some(Gpr::Edi), None),
        0b110 => (Some(Gpr::Ebp), None),
        _ => (Some(Gpr::Ebx), None),
    };

    if md == 0b00 && rm == 0b110 {
        let disp = reader.i16_sext32();
        return EffectiveAddress {
            base: None,
            index: None,
            disp,
            address_width: AddressWidth::Width16,
        };
    }

    let disp = match md {
        0b01 => reader.i8_sext32(),
        0b10 => reader.i16_sext32(),
        _ => 0,
    };

    EffectiveAddress {
        base,
        index,
        disp,
        address_width: AddressWidth::Width16,
    }
}
