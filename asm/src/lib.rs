//! Prefix scanning, ModR/M/SIB decoding, and opcode classification for the
//! x86il lifter.
//!
//! This crate has no notion of the IL: it turns a byte stream into structured
//! decode-level facts (prefixes, operands, mnemonics) that the root `x86il`
//! crate's emitter consumes to build side-effect-free expressions and
//! state-updating statements.

pub mod cc;
pub mod error;
pub mod gpr;
pub mod modrm;
pub mod opcode;
pub mod operand;
pub mod prefix;
pub mod reader;

pub use cc::ConditionCode;
pub use error::DecodeError;
pub use gpr::{Gpr, GprRef};
pub use modrm::{decode_modrm, EffectiveAddress, ModRm, RegOrMem};
pub use opcode::{classify, ArithOp, BitOp, Grp5Op, Instruction, Opcode, ShiftOp, StringOp, UnaryOp};
pub use operand::Operand;
pub use prefix::{scan_prefixes, AddressWidth, OperandWidth, PrefixRecord, Repeat, Segment};
pub use reader::{ByteOracle, Reader};
