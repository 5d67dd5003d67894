//! Condition-code table shared by `Jcc`, `SETcc`, and `CMOVcc`-shaped
//! opcodes (only `Jcc`/`SETcc` are classified by this crate today).
//!
//! Encoded exactly as the spec's table: the low nibble of the opcode byte
//! selects a base condition on even values; odd values are the logical
//! negation of the preceding even value. Nibble `0xA` has no architectural
//! meaning and is rejected.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use strum::EnumIter;

/// A condition derived from the flags register, independent of whether it
/// was reached via a `Jcc`, `SETcc`, or similar opcode family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConditionCode {
    /// `O`: overflow flag set.
    Overflow,
    /// `NO`: overflow flag clear.
    NotOverflow,
    /// `B`/`C`: carry flag set.
    Carry,
    /// `AE`/`NC`: carry flag clear.
    NotCarry,
    /// `E`/`Z`: zero flag set.
    Equal,
    /// `NE`/`NZ`: zero flag clear.
    NotEqual,
    /// `BE`: carry or zero flag set.
    BelowOrEqual,
    /// `A`: carry and zero flags both clear.
    Above,
    /// `S`: sign flag set.
    Sign,
    /// `NS`: sign flag clear.
    NotSign,
    /// `L`: sign flag XOR overflow flag.
    Less,
    /// `GE`: sign flag equals overflow flag.
    GreaterOrEqual,
    /// `LE`: zero flag set, or sign XOR overflow set.
    LessOrEqual,
    /// `G`: zero flag clear and sign equals overflow.
    Greater,
}

impl ConditionCode {
    /// Decodes the low nibble of a `Jcc`/`SETcc` opcode byte.
    ///
    /// Returns `None` for nibble `0xA`, which is architecturally undefined
    /// for this family; callers should surface
    /// [`crate::error::DecodeError::InvalidEncoding`].
    pub fn from_nibble(nibble: u8) -> Option<Self> {
        use ConditionCode::*;
        Some(match nibble & 0x0F {
            0x0 => Overflow,
            0x1 => NotOverflow,
            0x2 => Carry,
            0x3 => NotCarry,
            0x4 => Equal,
            0x5 => NotEqual,
            0x6 => BelowOrEqual,
            0x7 => Above,
            0x8 => Sign,
            0x9 => NotSign,
            0xA => return None,
            0xB => return None,
            0xC => Less,
            0xD => GreaterOrEqual,
            0xE => LessOrEqual,
            0xF => Greater,
            _ => unreachable!(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn nibble_a_and_b_are_undefined() {
        assert_eq!(ConditionCode::from_nibble(0xA), None);
        assert_eq!(ConditionCode::from_nibble(0xB), None);
    }

    #[test]
    fn every_other_nibble_decodes() {
        let decoded: Vec<_> = (0..16u8)
            .filter(|n| *n != 0xA && *n != 0xB)
            .map(|n| ConditionCode::from_nibble(n).unwrap())
            .collect();
        assert_eq!(decoded.len(), 14);
        assert_eq!(ConditionCode::iter().count(), 14);
    }

    #[test]
    fn odd_nibble_is_negation_of_even_pair() {
        assert_eq!(
            ConditionCode::from_nibble(0x0),
            Some(ConditionCode::Overflow)
        );
        assert_eq!(
            ConditionCode::from_nibble(0x1),
            Some(ConditionCode::NotOverflow)
        );
    }
}
