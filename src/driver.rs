//! C7: the top-level `lift()` entry point, composing the decode-level
//! prefix scanner and opcode classifier with this crate's emitter
//! (spec §6, §10.1, §10.3).

use crate::error::LiftError;
use crate::stmt::{Attrs, Statement};
use tracing::{debug, trace, warn};
use x86il_asm::{classify, scan_prefixes, ByteOracle, Opcode, Reader};

/// Caller-visible decode-time configuration.
///
/// This is deliberately the only configuration surface the lifter exposes;
/// it does not grow into a general settings object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiftOptions {
    /// Attach the decoded mnemonic to the first statement of each
    /// instruction's output, as `Attrs::asm_text`. Defaults to `true`.
    pub attach_asm_comments: bool,
}

impl Default for LiftOptions {
    fn default() -> Self {
        LiftOptions {
            attach_asm_comments: true,
        }
    }
}

/// Lifts one instruction starting at `address` into its IL statement
/// sequence, returning the statements and the address of the next
/// instruction.
///
/// `oracle` supplies bytes on demand; the decoder never reads more than
/// the encoding requires.
pub fn lift<O: ByteOracle + ?Sized>(
    oracle: &O,
    address: u64,
    options: LiftOptions,
) -> Result<(Vec<Statement>, u64), LiftError> {
    let mut reader = Reader::new(oracle, address);
    let prefixes = scan_prefixes(&mut reader);
    trace!(
        address,
        segment = ?prefixes.segment,
        operand_size_override = prefixes.operand_size_override,
        address_size_override = prefixes.address_size_override,
        "prefixes scanned"
    );

    let instr = classify(&mut reader, &prefixes).map_err(|source| {
        warn!(address, window = ?byte_window(oracle, address, 16), %source, "decode failed");
        LiftError::Decode { address, source }
    })?;

    let next_address = address + instr.length;
    let mut pool = crate::temp::TempPool::new();
    let mut stmts = crate::emit::emit(&instr, address, &mut pool).map_err(|err| {
        warn!(address, %err, "emit failed");
        err
    })?;

    if options.attach_asm_comments {
        if let Some(first) = stmts.first_mut() {
            *first = with_asm_text(first.clone(), mnemonic(&instr.opcode));
        }
    }

    debug!(
        address,
        opcode = mnemonic(&instr.opcode),
        length = instr.length,
        statements = stmts.len(),
        "lifted instruction"
    );

    Ok((stmts, next_address))
}

/// Reads up to `len` bytes starting at `address`, for inclusion in a
/// decode-failure log line. Never fails: the oracle contract requires it
/// to be total over the address space it was constructed for.
fn byte_window<O: ByteOracle + ?Sized>(oracle: &O, address: u64, len: u64) -> Vec<u8> {
    (0..len).map(|i| oracle.byte_at(address + i)).collect()
}

/// Rebuilds `stmt` with `text` attached as `Attrs::asm_text`, for the
/// "attach a comment to the first statement of each instruction" option.
fn with_asm_text(stmt: Statement, text: &'static str) -> Statement {
    fn tagged(mut attrs: Attrs, text: &'static str) -> Attrs {
        attrs.asm_text = Some(text);
        attrs
    }
    match stmt {
        Statement::Move(var, expr, attrs) => Statement::Move(var, expr, tagged(attrs, text)),
        Statement::Jmp(target, attrs) => Statement::Jmp(target, tagged(attrs, text)),
        Statement::CJmp {
            cond,
            then_target,
            else_target,
            attrs,
        } => Statement::CJmp {
            cond,
            then_target,
            else_target,
            attrs: tagged(attrs, text),
        },
        Statement::Label(target, attrs) => Statement::Label(target, tagged(attrs, text)),
        Statement::Assert(cond, attrs) => Statement::Assert(cond, tagged(attrs, text)),
        Statement::Special(tag, attrs) => Statement::Special(tag, tagged(attrs, text)),
        Statement::Comment(text_body, attrs) => Statement::Comment(text_body, tagged(attrs, text)),
    }
}

/// A short, `'static` label for the opcode family, used in log lines and
/// `Attrs::asm_text`. Not a full disassembly; callers wanting operand text
/// should read the decoded [`x86il_asm::Instruction`] directly.
fn mnemonic(opcode: &Opcode) -> &'static str {
    match opcode {
        Opcode::Arith(_) => "arith",
        Opcode::Inc => "inc",
        Opcode::Dec => "dec",
        Opcode::Push => "push",
        Opcode::PushImm => "push",
        Opcode::Pop => "pop",
        Opcode::Imul3 => "imul",
        Opcode::Imul2 => "imul",
        Opcode::Jcc(_) => "jcc",
        Opcode::Mov => "mov",
        Opcode::Lea => "lea",
        Opcode::Nop => "nop",
        Opcode::StringOp(_) => "string-op",
        Opcode::Shift(_) => "shift",
        Opcode::Ret => "ret",
        Opcode::RetImm => "ret",
        Opcode::Call => "call",
        Opcode::Jmp => "jmp",
        Opcode::Hlt => "hlt",
        Opcode::Unary(_) => "unary",
        Opcode::Grp5(_) => "grp5",
        Opcode::Int3 => "int3",
        Opcode::Int => "int",
        Opcode::MovapsLoad | Opcode::MovapsStore => "movaps",
        Opcode::MovdLoad | Opcode::MovdStore => "movd",
        Opcode::MovqLoad | Opcode::MovqStore => "movq",
        Opcode::Rdtsc => "rdtsc",
        Opcode::Sysenter => "sysenter",
        Opcode::Palignr => "palignr",
        Opcode::Pshufd => "pshufd",
        Opcode::Pcmpeq => "pcmpeq",
        Opcode::SetCc(_) => "setcc",
        Opcode::Cpuid => "cpuid",
        Opcode::Bt => "bt",
        Opcode::BtGroup(_) => "bt-group",
        Opcode::Shld => "shld",
        Opcode::Shrd => "shrd",
        Opcode::Ldmxcsr => "ldmxcsr",
        Opcode::Stmxcsr => "stmxcsr",
        Opcode::Cmpxchg => "cmpxchg",
        Opcode::Cmpxchg8b => "cmpxchg8b",
        Opcode::Movzx => "movzx",
        Opcode::Movsx => "movsx",
        Opcode::Bsf => "bsf",
        Opcode::Bsr => "bsr",
        Opcode::Xadd => "xadd",
        Opcode::Pmovmskb => "pmovmskb",
        Opcode::Pxor => "pxor",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slice_oracle(bytes: &'static [u8]) -> impl Fn(u64) -> u8 {
        move |addr: u64| bytes.get(addr as usize).copied().unwrap_or(0)
    }

    #[test]
    fn lifts_a_nop_to_no_statements_and_advances_one_byte() {
        let oracle = slice_oracle(&[0x90]);
        let (stmts, next) = lift(&oracle, 0, LiftOptions::default()).unwrap();
        assert!(stmts.is_empty());
        assert_eq!(next, 1);
    }

    #[test]
    fn lifts_mov_eax_imm32_and_attaches_a_comment_by_default() {
        // B8 id: MOV EAX, imm32
        let oracle = slice_oracle(&[0xB8, 0x2A, 0x00, 0x00, 0x00]);
        let (stmts, next) = lift(&oracle, 0, LiftOptions::default()).unwrap();
        assert_eq!(next, 5);
        assert_eq!(stmts[0].attrs().asm_text, Some("mov"));
    }

    #[test]
    fn attach_asm_comments_false_leaves_attrs_empty() {
        let oracle = slice_oracle(&[0xB8, 0x2A, 0x00, 0x00, 0x00]);
        let options = LiftOptions {
            attach_asm_comments: false,
        };
        let (stmts, _) = lift(&oracle, 0, options).unwrap();
        assert_eq!(stmts[0].attrs().asm_text, None);
    }

    #[test]
    fn decode_failure_surfaces_as_a_lift_error_not_a_panic() {
        // 0F with an unrecognized second byte is rejected by the classifier.
        let oracle = slice_oracle(&[0x0F, 0xFF]);
        assert!(matches!(
            lift(&oracle, 0, LiftOptions::default()),
            Err(LiftError::Decode { .. })
        ));
    }

    /// Walks every `Expr` reachable from `stmt` through [`crate::expr::infer_type`],
    /// which panics on a BinOp/Ite width mismatch. Used to check the "every
    /// emitted expression has internally consistent widths" property against
    /// whatever the decoder+emitter actually produce for a byte sequence,
    /// rather than against hand-picked examples.
    fn check_statement_widths(stmt: &Statement) {
        match stmt {
            Statement::Move(_, e, _) | Statement::Jmp(e, _) | Statement::Assert(e, _) => {
                crate::expr::infer_type(e);
            }
            Statement::CJmp {
                cond,
                then_target,
                else_target,
                ..
            } => {
                crate::expr::infer_type(cond);
                crate::expr::infer_type(then_target);
                crate::expr::infer_type(else_target);
            }
            Statement::Label(_, _) | Statement::Special(_, _) | Statement::Comment(_, _) => {}
        }
    }

    fn vec_oracle(bytes: Vec<u8>) -> impl Fn(u64) -> u8 {
        move |addr: u64| bytes.get(addr as usize).copied().unwrap_or(0)
    }

    #[quickcheck_macros::quickcheck]
    fn every_lifted_expression_has_consistent_widths(bytes: Vec<u8>) -> quickcheck::TestResult {
        if bytes.is_empty() {
            return quickcheck::TestResult::discard();
        }
        let oracle = vec_oracle(bytes);
        match lift(&oracle, 0, LiftOptions::default()) {
            Ok((stmts, _)) => {
                for stmt in &stmts {
                    check_statement_widths(stmt);
                }
                quickcheck::TestResult::passed()
            }
            Err(_) => quickcheck::TestResult::discard(),
        }
    }

    #[quickcheck_macros::quickcheck]
    fn lifting_the_same_bytes_twice_yields_identical_output(bytes: Vec<u8>) -> quickcheck::TestResult {
        if bytes.is_empty() {
            return quickcheck::TestResult::discard();
        }
        let first = lift(&vec_oracle(bytes.clone()), 0, LiftOptions::default());
        let second = lift(&vec_oracle(bytes), 0, LiftOptions::default());
        match (first, second) {
            (Ok(a), Ok(b)) => quickcheck::TestResult::from_bool(a == b),
            (Err(_), Err(_)) => quickcheck::TestResult::passed(),
            _ => quickcheck::TestResult::failed(),
        }
    }
}
