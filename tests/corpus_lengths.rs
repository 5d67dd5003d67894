//! §8 "instruction length" universal property: for a corpus of varied
//! encodings, `next_address - start_address` from [`x86il::lift`] matches
//! each encoding's independently known length.

use x86il::{lift, LiftOptions};

fn oracle_at(bytes: &'static [u8], base: u64) -> impl Fn(u64) -> u8 {
    move |addr: u64| bytes.get((addr - base) as usize).copied().unwrap_or(0)
}

const CORPUS: &[(&[u8], u64)] = &[
    (&[0x90], 1),                               // NOP
    (&[0xB8, 0x2A, 0x00, 0x00, 0x00], 5),        // MOV EAX, imm32
    (&[0x83, 0xC0, 0x01], 3),                    // ADD EAX, imm8
    (&[0x29, 0xC0], 2),                          // SUB EAX, EAX
    (&[0xF3, 0xA4], 2),                          // REP MOVSB
    (&[0xC3], 1),                                // RET
    (&[0x50], 1),                                // PUSH EAX
    (&[0x58], 1),                                // POP EAX
    (&[0x0F, 0xBA, 0x25, 0x44, 0x33, 0x22, 0x11, 17], 8), // BT dword ptr [disp32], imm8
];

#[test]
fn corpus_lengths_match_next_address_minus_start_address() {
    for (bytes, expected_len) in CORPUS {
        let o = oracle_at(bytes, 0);
        let (_, next) = lift(&o, 0, LiftOptions::default())
            .unwrap_or_else(|e| panic!("failed to lift {bytes:02x?}: {e}"));
        assert_eq!(
            next, *expected_len,
            "expected {bytes:02x?} to decode as {expected_len} bytes, got {next}"
        );
    }
}

#[test]
fn corpus_lengths_are_independent_of_start_address() {
    // Lifting the same bytes at a nonzero base address should not change the
    // decoded length, only the returned next address.
    for (bytes, expected_len) in CORPUS {
        let base = 0x0040_1000u64;
        let o = oracle_at(bytes, base);
        let (_, next) = lift(&o, base, LiftOptions::default())
            .unwrap_or_else(|e| panic!("failed to lift {bytes:02x?} at {base:#x}: {e}"));
        assert_eq!(next - base, *expected_len);
    }
}
