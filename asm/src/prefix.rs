//! Legacy prefix scanner (spec §4.3).
//!
//! Scans up to four legacy prefix bytes from the instruction head and folds
//! them into a [`PrefixRecord`]. Scanning stops at the first byte that is
//! not a recognized prefix; that byte is left unconsumed (it is the opcode
//! byte) by virtue of the `Reader` cursor only advancing on bytes actually
//! consumed as prefixes.

use crate::reader::{ByteOracle, Reader};

/// Segment override selected by a `2E/36/3E/26/64/65` prefix byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Segment {
    /// `2E`. Contributes no base in the flat memory model.
    Cs,
    /// `36`. Contributes no base in the flat memory model.
    Ss,
    /// `3E`. Contributes no base in the flat memory model.
    Ds,
    /// `26`. Contributes no base in the flat memory model.
    Es,
    /// `64`. Adds `FS_BASE` to the effective address.
    Fs,
    /// `65`. Adds `GS_BASE` to the effective address.
    Gs,
}

/// Repeat-prefix state, mutually exclusive between `REPZ`/`REPNZ`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Repeat {
    /// `F3` applied to a string opcode.
    RepZ,
    /// `F2` applied to a string opcode.
    RepNz,
}

/// Operand width selected by the `66` operand-size-override prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandWidth {
    /// Default 32-bit GPR operand size.
    Width32,
    /// `66` prefix present: 16-bit GPR operand size.
    Width16,
}

impl OperandWidth {
    /// The width in bits.
    pub fn bits(self) -> u16 {
        match self {
            OperandWidth::Width32 => 32,
            OperandWidth::Width16 => 16,
        }
    }
}

/// Address-size mode selected by the `67` address-size-override prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressWidth {
    /// Default 32-bit ModR/M addressing.
    Width32,
    /// `67` prefix present: 16-bit ModR/M addressing.
    Width16,
}

/// The folded result of scanning an instruction's legacy prefix bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrefixRecord {
    /// `true` if `F0` (LOCK) was seen. Accepted and otherwise ignored: the
    /// IL has no atomicity marker.
    pub lock: bool,
    /// The last-seen repeat prefix, if any. `REPZ`/`REPNZ` are mutually
    /// exclusive; the later one in the scan wins.
    pub repeat: Option<Repeat>,
    /// The last-seen segment override, if any.
    pub segment: Option<Segment>,
    /// `true` if `66` (operand-size override) was seen.
    pub operand_size_override: bool,
    /// `true` if `67` (address-size override) was seen.
    pub address_size_override: bool,
    /// Number of prefix bytes consumed (0..4 in practice, unbounded by the
    /// scanner itself — callers that want the "at most four" ceiling
    /// enforced should check `consumed`).
    pub consumed: u32,
}

impl Default for Repeat {
    fn default() -> Self {
        Repeat::RepZ
    }
}

impl PrefixRecord {
    /// The operand width implied by the `66` prefix.
    pub fn operand_width(&self) -> OperandWidth {
        if self.operand_size_override {
            OperandWidth::Width16
        } else {
            OperandWidth::Width32
        }
    }

    /// The MMX/SSE operand width implied by the `66` prefix: 64 bits (MMX)
    /// by default, 128 bits (XMM) when `66` selects the SSE packed form.
    pub fn simd_operand_width(&self) -> u16 {
        if self.operand_size_override {
            128
        } else {
            64
        }
    }

    /// The address-computation width implied by the `67` prefix.
    pub fn address_width(&self) -> AddressWidth {
        if self.address_size_override {
            AddressWidth::Width16
        } else {
            AddressWidth::Width32
        }
    }
}

/// Scans legacy prefix bytes starting at the reader's current position.
///
/// Stops at the first non-prefix byte, which remains unconsumed.
pub fn scan_prefixes<O: ByteOracle + ?Sized>(reader: &mut Reader<'_, O>) -> PrefixRecord {
    let mut record = PrefixRecord::default();

    loop {
        let b = reader.peek_u8();
        let matched = match b {
            0xF0 => {
                record.lock = true;
                true
            }
            0xF2 => {
                record.repeat = Some(Repeat::RepNz);
                true
            }
            0xF3 => {
                record.repeat = Some(Repeat::RepZ);
                true
            }
            0x2E => {
                record.segment = Some(Segment::Cs);
                true
            }
            0x36 => {
                record.segment = Some(Segment::Ss);
                true
            }
            0x3E => {
                record.segment = Some(Segment::Ds);
                true
            }
            0x26 => {
                record.segment = Some(Segment::Es);
                true
            }
            0x64 => {
                record.segment = Some(Segment::Fs);
                true
            }
            0x65 => {
                record.segment = Some(Segment::Gs);
                true
            }
            0x66 => {
                record.operand_size_override = true;
                true
            }
            0x67 => {
                record.address_size_override = true;
                true
            }
            _ => false,
        };

        if !matched {
            break;
        }

        reader.u8();
        record.consumed += 1;
    }

    record
}
