//! General-purpose register encoding.
//!
//! `Gpr` names the eight 32-bit registers by their ModR/M-field encoding
//! (0..7). Sub-register width is carried separately by [`GprRef`] so the
//! semantic emitter (which owns the actual `Var` table) can apply the
//! aliasing rules in isolation from decode.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One of the eight encodable 32-bit general-purpose registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Gpr {
    /// EAX / accumulator.
    Eax,
    /// ECX / counter.
    Ecx,
    /// EDX / data.
    Edx,
    /// EBX / base.
    Ebx,
    /// ESP / stack pointer.
    Esp,
    /// EBP / frame pointer.
    Ebp,
    /// ESI / source index.
    Esi,
    /// EDI / destination index.
    Edi,
}

impl Gpr {
    /// Decodes a 3-bit ModR/M register field (0..7) into a [`Gpr`].
    ///
    /// The input is masked to 3 bits, so this never fails.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0 => Gpr::Eax,
            1 => Gpr::Ecx,
            2 => Gpr::Edx,
            3 => Gpr::Ebx,
            4 => Gpr::Esp,
            5 => Gpr::Ebp,
            6 => Gpr::Esi,
            _ => Gpr::Edi,
        }
    }

    /// The 3-bit ModR/M encoding of this register.
    pub fn encoding(self) -> u8 {
        match self {
            Gpr::Eax => 0,
            Gpr::Ecx => 1,
            Gpr::Edx => 2,
            Gpr::Ebx => 3,
            Gpr::Esp => 4,
            Gpr::Ebp => 5,
            Gpr::Esi => 6,
            Gpr::Edi => 7,
        }
    }
}

/// Width at which a general-purpose register is referenced by an operand.
///
/// Byte-width references further distinguish the legacy low/high encoding
/// (AL vs AH, both carried by register index 0..3 vs 4..7 under byte width
/// with no REX prefix in this 32-bit-only decoder).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum GprRef {
    /// 8-bit reference. `hi` selects AH/CH/DH/BH (register index 4..7)
    /// over AL/CL/DL/BL (register index 0..3).
    Byte { reg: Gpr, hi: bool },
    /// 16-bit reference (AX, CX, ...).
    Word(Gpr),
    /// 32-bit reference (EAX, ECX, ...).
    Dword(Gpr),
    /// 128-bit XMM reference, indexed 0..7.
    Xmm(u8),
}

impl GprRef {
    /// Builds a register reference at the given ModR/M-style 3-bit index
    /// and operand width, applying the legacy 8-bit high-byte encoding.
    pub fn from_index(index: u8, width_bits: u16) -> Self {
        match width_bits {
            8 => {
                let base = Gpr::from_bits(index & 0x03);
                GprRef::Byte {
                    reg: base,
                    hi: index & 0x04 != 0,
                }
            }
            16 => GprRef::Word(Gpr::from_bits(index)),
            128 => GprRef::Xmm(index & 0x07),
            _ => GprRef::Dword(Gpr::from_bits(index)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_encoding() {
        for bits in 0..8u8 {
            let g = Gpr::from_bits(bits);
            assert_eq!(g.encoding(), bits);
        }
    }

    #[test]
    fn byte_high_encoding_maps_to_base_register() {
        // AH is index 4, which aliases EAX (index 0) with hi=true.
        match GprRef::from_index(4, 8) {
            GprRef::Byte { reg, hi } => {
                assert_eq!(reg, Gpr::Eax);
                assert!(hi);
            }
            other => panic!("expected Byte, got {other:?}"),
        }
    }

    #[test]
    fn byte_low_encoding_maps_to_base_register() {
        match GprRef::from_index(3, 8) {
            GprRef::Byte { reg, hi } => {
                assert_eq!(reg, Gpr::Ebx);
                assert!(!hi);
            }
            other => panic!("expected Byte, got {other:?}"),
        }
    }
}
