//! §8 boundary/corner behaviors, driven end-to-end through [`x86il::lift`].

use x86il::{lift, Expr, LiftError, LiftOptions, Statement, Var, T};
use x86il_asm::Gpr;

fn oracle(bytes: &'static [u8]) -> impl Fn(u64) -> u8 {
    move |addr: u64| bytes.get(addr as usize).copied().unwrap_or(0)
}

#[test]
fn rep_movsb_leading_test_would_skip_the_body_when_ecx_is_zero() {
    // The template's first statement is the ECX==0 test, branching straight
    // to the loop end before any memory effect runs; whether it actually
    // skips depends on ECX's runtime value, which this decode-time lowering
    // has no access to. What's checked here is the loop-wrapper shape
    // itself: a leading CJmp gating every body statement that follows.
    let o = oracle(&[0xF3, 0xA4]);
    let (stmts, _) = lift(&o, 0, LiftOptions::default()).unwrap();
    match &stmts[1] {
        Statement::CJmp { cond, .. } => {
            assert_eq!(
                *cond,
                Expr::BinOp(
                    x86il::BinOp::Eq,
                    Box::new(Expr::Var(Var::Gpr(Gpr::Ecx))),
                    Box::new(Expr::zero(T::Reg(32)))
                )
            );
        }
        other => panic!("expected a leading ECX==0 test, got {other:?}"),
    }
}

#[test]
fn pop_esp_has_no_trailing_increment_after_the_write() {
    // 5C: POP ESP.
    let o = oracle(&[0x5C]);
    let (stmts, _) = lift(&o, 0, LiftOptions::default()).unwrap();
    assert_eq!(stmts.len(), 1);
    match &stmts[0] {
        Statement::Move(Var::Gpr(Gpr::Esp), Expr::Load { .. }, _) => {}
        other => panic!("expected the popped value to be ESP's only write, got {other:?}"),
    }
}

#[test]
fn xor_reg_reg_zeroes_and_clears_carry_and_overflow() {
    // 31 C0: XOR EAX, EAX.
    let o = oracle(&[0x31, 0xC0]);
    let (stmts, _) = lift(&o, 0, LiftOptions::default()).unwrap();
    let cf_cleared = stmts
        .iter()
        .any(|s| matches!(s, Statement::Move(Var::Flag(x86il::Flag::Cf), Expr::Int(0, _), _)));
    let of_cleared = stmts
        .iter()
        .any(|s| matches!(s, Statement::Move(Var::Flag(x86il::Flag::Of), Expr::Int(0, _), _)));
    assert!(cf_cleared && of_cleared);
    match stmts.last().unwrap() {
        Statement::Move(Var::Gpr(Gpr::Eax), Expr::BinOp(x86il::BinOp::Xor, a, b), _) => {
            assert_eq!(**a, Expr::Var(Var::Gpr(Gpr::Eax)));
            assert_eq!(**b, Expr::Var(Var::Gpr(Gpr::Eax)));
        }
        other => panic!("expected EAX := EAX ^ EAX, got {other:?}"),
    }
}

#[test]
fn bt_memory_offset_17_addresses_the_third_byte_and_bit_1() {
    // 0F BA /4 ib against a disp32-only operand: BT dword ptr [0x00112233], 17.
    let o = oracle(&[0x0F, 0xBA, 0x25, 0x33, 0x22, 0x11, 0x00, 17]);
    let (stmts, next) = lift(&o, 0, LiftOptions::default()).unwrap();
    assert_eq!(next, 8);
    match &stmts[0] {
        Statement::Move(Var::Flag(x86il::Flag::Cf), Expr::Extract(0, 0, inner), _) => match &**inner {
            Expr::BinOp(x86il::BinOp::And, shifted, _) => match &**shifted {
                Expr::BinOp(x86il::BinOp::LShr, loaded, index) => {
                    assert_eq!(**index, Expr::Int(1, T::BYTE));
                    match &**loaded {
                        Expr::Load { addr, width: T::Reg(8), .. } => {
                            assert_eq!(**addr, Expr::Int(0x00112235, T::DWORD));
                        }
                        other => panic!("expected an 8-bit load, got {other:?}"),
                    }
                }
                other => panic!("expected a right shift, got {other:?}"),
            },
            other => panic!("unexpected mask shape {other:?}"),
        },
        other => panic!("unexpected CF statement {other:?}"),
    }
}

#[test]
fn jcc_with_undefined_nibble_a_is_rejected_as_invalid_encoding() {
    // 0F 8A: Jcc with condition nibble 0xA, architecturally undefined.
    let o = oracle(&[0x0F, 0x8A, 0x00, 0x00, 0x00, 0x00]);
    let err = lift(&o, 0, LiftOptions::default()).unwrap_err();
    match err {
        LiftError::Decode { source, .. } => {
            assert!(matches!(source, x86il_asm::DecodeError::InvalidEncoding { .. }));
        }
        other => panic!("expected a wrapped decode error, got {other:?}"),
    }
}
