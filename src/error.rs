//! Semantic-level error taxonomy (spec §7).
//!
//! Decode-level failures surface from `x86il-asm` as [`x86il_asm::DecodeError`]
//! and are wrapped here unchanged; everything the emitter itself can reject
//! (an operand shape it has no lowering for, a width it didn't expect) gets
//! its own variant, each carrying enough context to point back at the
//! offending bytes.

use thiserror::Error;
use x86il_asm::DecodeError;

/// Failure to lift a decoded instruction to IL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LiftError {
    /// The instruction failed to decode at the `x86il-asm` layer.
    #[error("decode failed at address {address:#010x}: {source}")]
    Decode {
        /// Address of the instruction being decoded.
        address: u64,
        #[source]
        source: DecodeError,
    },
    /// The instruction decoded to a recognized opcode, but with an operand
    /// combination this emitter has no lowering for (e.g. a through-carry
    /// rotate, or a register destination where the architecture requires
    /// memory).
    #[error("unsupported operand form for opcode at address {address:#010x}: {detail}")]
    UnsupportedOperandForm {
        /// Address of the instruction being lifted.
        address: u64,
        /// Human-readable detail, not matched on by callers.
        detail: &'static str,
    },
    /// A ModR/M-derived byte combination was syntactically decodable but
    /// has no architectural meaning for this opcode (distinct from
    /// `x86il_asm::DecodeError::InvalidEncoding`, which covers encodings
    /// invalid at the byte level rather than the semantic level).
    #[error("invalid encoding for opcode at address {address:#010x}: {detail}")]
    InvalidEncoding {
        /// Address of the instruction being lifted.
        address: u64,
        /// Human-readable detail, not matched on by callers.
        detail: &'static str,
    },
    /// Two operands that the emitter expected to share a width did not.
    #[error("width mismatch at address {address:#010x}: expected {expected} bits, got {actual} bits")]
    WidthMismatch {
        /// Address of the instruction being lifted.
        address: u64,
        /// The width the emitter required.
        expected: u32,
        /// The width it actually observed.
        actual: u32,
    },
}
