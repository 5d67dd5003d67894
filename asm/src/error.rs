//! Decode-time error taxonomy (spec §7), scoped to what this crate can
//! detect on its own: malformed ModR/M-derived addressing and opcode bytes
//! with no recognized form. Semantic-level rejections (an operand shape the
//! emitter cannot lower) belong to `x86il::LiftError`, one layer up.

use thiserror::Error;

/// Failure to decode an instruction's bytes into asm-level structure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The opcode byte (after any `0F`/`0F 3A` escape) has no entry in the
    /// classification table.
    #[error("unsupported opcode at offset {offset}: {byte:#04x}")]
    UnsupportedOpcode {
        /// Offset of the opcode byte from the instruction start.
        offset: u64,
        /// The opcode byte itself.
        byte: u8,
    },
    /// A byte combination is syntactically well-formed but architecturally
    /// undefined (e.g. a `Jcc` condition nibble of `0xA`, or a SIB encoding
    /// with no valid base/index combination for the requested mode).
    #[error("invalid encoding at offset {offset}: {detail}")]
    InvalidEncoding {
        /// Offset of the offending byte from the instruction start.
        offset: u64,
        /// Human-readable detail, not matched on by callers.
        detail: &'static str,
    },
    /// The byte oracle ran out of declared bytes before the encoding was
    /// fully consumed.
    #[error("unexpected end of input at offset {offset}, needed {needed} more byte(s)")]
    UnexpectedEnd {
        /// Offset at which the read was attempted.
        offset: u64,
        /// Number of additional bytes the encoding required.
        needed: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_offset() {
        let e = DecodeError::UnsupportedOpcode {
            offset: 3,
            byte: 0x0F,
        };
        assert!(e.to_string().contains('3'));
    }
}
