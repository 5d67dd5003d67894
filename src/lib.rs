//! A from-scratch x86 (IA-32) instruction decoder and semantic lifter.
//!
//! Decoding lives in the companion `x86il-asm` crate, which has no notion
//! of the intermediate language; this crate owns the typed expression and
//! statement algebra ([`expr`], [`stmt`]), the architectural state model
//! ([`vars`]), and the emitter that turns one decoded instruction into a
//! sequence of [`stmt::Statement`]s ([`emit`], [`driver`]).
//!
//! The entry point is [`driver::lift`].

pub mod driver;
pub mod emit;
pub mod error;
pub mod expr;
pub mod stmt;
pub mod temp;
pub mod ty;
pub mod vars;

pub use driver::{lift, LiftOptions};
pub use error::LiftError;
pub use expr::{BinOp, CastKind, Expr, UnOp};
pub use stmt::{Attrs, LabelTarget, Statement};
pub use ty::T;
pub use vars::{Flag, Var};
