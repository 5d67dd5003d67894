//! Statements: ordered, explicit state-updating effects (spec §3).

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::expr::Expr;
use crate::vars::Var;

/// The target of a [`Statement::Label`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LabelTarget {
    /// A label identifying the instruction starting at this address.
    Addr(u64),
    /// A named label, used for sub-instruction control flow (e.g. the
    /// repeat-loop test inside a string-operation template).
    Name(&'static str),
}

/// Free-form provenance tags attached to a statement. Never consulted for
/// correctness; purely descriptive for anyone reading the emitted IL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Attrs {
    /// The disassembled mnemonic text this statement originated from, if
    /// the caller asked for comments via `LiftOptions::attach_asm_comments`.
    pub asm_text: Option<&'static str>,
    /// Marks a statement as the call/return edge of a control-transfer
    /// instruction, for downstream CFG recovery.
    pub role: Option<&'static str>,
}

impl Attrs {
    /// No provenance information.
    pub fn none() -> Attrs {
        Attrs::default()
    }

    /// Tags this statement with a control-flow role (`"call"`, `"ret"`).
    pub fn with_role(role: &'static str) -> Attrs {
        Attrs {
            asm_text: None,
            role: Some(role),
        }
    }
}

/// One ordered IL effect.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Statement {
    /// Assigns `expr`'s value to `var`.
    Move(Var, Expr, Attrs),
    /// Unconditional transfer of control to `target`.
    Jmp(Expr, Attrs),
    /// Transfers control to `then_target` if `cond` holds, else falls
    /// through to `else_target`.
    CJmp {
        cond: Expr,
        then_target: Expr,
        else_target: Expr,
        attrs: Attrs,
    },
    /// Marks a position reachable by a jump.
    Label(LabelTarget, Attrs),
    /// Asserts `cond` holds; used for decode-time sanity checks the
    /// emitter wants visible in the IL rather than silently assumed.
    Assert(Expr, Attrs),
    /// An architectural effect with no IL-representable semantics (e.g.
    /// `CPUID`, `SYSENTER`), identified by `tag`.
    Special(&'static str, Attrs),
    /// A human-readable annotation with no semantic effect.
    Comment(String, Attrs),
}

impl Statement {
    /// The attributes carried by this statement.
    pub fn attrs(&self) -> &Attrs {
        match self {
            Statement::Move(_, _, a)
            | Statement::Jmp(_, a)
            | Statement::CJmp { attrs: a, .. }
            | Statement::Label(_, a)
            | Statement::Assert(_, a)
            | Statement::Special(_, a)
            | Statement::Comment(_, a) => a,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::T;
    use x86il_asm::Gpr;

    #[test]
    fn attrs_none_has_no_role_or_text() {
        let a = Attrs::none();
        assert!(a.asm_text.is_none());
        assert!(a.role.is_none());
    }

    #[test]
    fn move_carries_its_attrs() {
        let stmt = Statement::Move(
            Var::Gpr(Gpr::Eax),
            Expr::Int(0, T::DWORD),
            Attrs::with_role("ret"),
        );
        assert_eq!(stmt.attrs().role, Some("ret"));
    }
}
