//! Instruction disassembly for the VR4300 instruction set.
//!
//! Rendering is for tracing and debug views only; execution never looks at
//! the text. General registers print as `rN`, floating-point registers as
//! `fN` and other coprocessor registers as `$N`.

#![allow(clippy::cast_possible_wrap)]

use crate::encoding::{long_code, trap_code};
use crate::instruction::{
    CopMoveOp, Coprocessor, GeneralRegister, ImmediateOp, Instruction, LoadStoreOp, RegisterOp,
};
use crate::memory::{Endianness, Memory};
use crate::Decoder;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Text rendered for words with no defined mnemonic.
pub const RESERVED_TEXT: &str = "reserved instruction";

/// A single disassembled instruction row.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DisassemblyRow {
    /// Address of the instruction.
    pub address: u64,
    /// Raw instruction word.
    pub raw_word: u32,
    /// Mnemonic (e.g. `addiu`, `bc1tl`), or `.word` for reserved encodings.
    pub mnemonic: String,
    /// Formatted operands (e.g. `r29, r29, -32`).
    pub operands: String,
    /// True when the word decodes as reserved.
    pub is_reserved: bool,
}

/// Decodes `word` and renders it in one call.
#[must_use]
pub fn disassemble(word: u32) -> (Instruction, String) {
    let instruction = Decoder::decode(word);
    let text = format_instruction(&instruction);
    (instruction, text)
}

/// Renders a decoded instruction as `mnemonic operands`.
#[must_use]
pub fn format_instruction(instruction: &Instruction) -> String {
    if instruction.is_reserved() {
        return RESERVED_TEXT.to_owned();
    }
    let mnemonic = instruction.mnemonic();
    let operands = format_operands(instruction);
    if operands.is_empty() {
        mnemonic
    } else {
        format!("{mnemonic} {operands}")
    }
}

/// Disassembles `before` words ahead of `center_pc`, the word at
/// `center_pc`, and `after` words past it.
///
/// Instructions are fixed at four bytes, so the window is walked directly.
/// It is clipped to the mapped range of `memory`, and addresses that still
/// cannot be fetched are left out of the result.
#[must_use]
pub fn disassemble_window(
    center_pc: u64,
    before: usize,
    after: usize,
    memory: &Memory,
    endianness: Endianness,
) -> Vec<DisassemblyRow> {
    // Word offsets relative to `center_pc`; wide enough that nothing overflows.
    let center = i128::from(center_pc);
    let origin = i128::from(memory.origin());
    let end = origin + i128::try_from(memory.len()).unwrap_or(0);
    let first = (-i128::try_from(before).unwrap_or(i128::MAX))
        .max(-(center - origin).div_euclid(4));
    let last = i128::try_from(after)
        .unwrap_or(i128::MAX)
        .min((end - 4 - center).div_euclid(4));

    (first..=last)
        .filter_map(|offset| {
            let address = u64::try_from(center + 4 * offset).ok()?;
            disassemble_one(address, memory, endianness)
        })
        .collect()
}

fn disassemble_one(
    address: u64,
    memory: &Memory,
    endianness: Endianness,
) -> Option<DisassemblyRow> {
    let raw_word = memory.fetch(address, endianness).ok()?;
    let instruction = Decoder::decode(raw_word);

    if instruction.is_reserved() {
        return Some(DisassemblyRow {
            address,
            raw_word,
            mnemonic: ".word".to_owned(),
            operands: format!("{raw_word:#010x} ; RESERVED"),
            is_reserved: true,
        });
    }

    Some(DisassemblyRow {
        address,
        raw_word,
        mnemonic: instruction.mnemonic(),
        operands: format_operands(&instruction),
        is_reserved: false,
    })
}

fn reg(register: GeneralRegister) -> String {
    format!("r{}", register.number())
}

const fn signed(value: u16) -> i16 {
    value as i16
}

/// Formats the operand list of `instruction`.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn format_operands(instruction: &Instruction) -> String {
    match *instruction {
        Instruction::Register {
            op,
            rs,
            rt,
            rd,
            sa,
            original,
        } => match op {
            RegisterOp::Sll
            | RegisterOp::Srl
            | RegisterOp::Sra
            | RegisterOp::Dsll
            | RegisterOp::Dsrl
            | RegisterOp::Dsra
            | RegisterOp::Dsll32
            | RegisterOp::Dsrl32
            | RegisterOp::Dsra32 => format!("{}, {}, {sa}", reg(rd), reg(rt)),
            RegisterOp::Sllv
            | RegisterOp::Srlv
            | RegisterOp::Srav
            | RegisterOp::Dsllv
            | RegisterOp::Dsrlv
            | RegisterOp::Dsrav => format!("{}, {}, {}", reg(rd), reg(rt), reg(rs)),
            RegisterOp::Mult
            | RegisterOp::Multu
            | RegisterOp::Div
            | RegisterOp::Divu
            | RegisterOp::Dmult
            | RegisterOp::Dmultu
            | RegisterOp::Ddiv
            | RegisterOp::Ddivu => format!("{}, {}", reg(rs), reg(rt)),
            RegisterOp::Tge
            | RegisterOp::Tgeu
            | RegisterOp::Tlt
            | RegisterOp::Tltu
            | RegisterOp::Teq
            | RegisterOp::Tne => match trap_code(original) {
                0 => format!("{}, {}", reg(rs), reg(rt)),
                code => format!("{}, {}, {code:#x}", reg(rs), reg(rt)),
            },
            RegisterOp::Mfhi | RegisterOp::Mflo => reg(rd),
            RegisterOp::Mthi | RegisterOp::Mtlo | RegisterOp::Jr => reg(rs),
            RegisterOp::Jalr => format!("{}, {}", reg(rd), reg(rs)),
            RegisterOp::Syscall | RegisterOp::Break => match long_code(original) {
                0 => String::new(),
                code => format!("{code:#x}"),
            },
            RegisterOp::Sync => String::new(),
            _ => format!("{}, {}, {}", reg(rd), reg(rs), reg(rt)),
        },
        Instruction::Immediate {
            op,
            rs,
            rt,
            immediate,
            ..
        } => match op {
            ImmediateOp::Lui => format!("{}, {immediate:#x}", reg(rt)),
            _ if op.zero_extends_immediate() => {
                format!("{}, {}, {immediate:#x}", reg(rt), reg(rs))
            }
            _ => format!("{}, {}, {}", reg(rt), reg(rs), signed(immediate)),
        },
        Instruction::Branch {
            op, rs, rt, offset, ..
        } => {
            if op.compares_rt() {
                format!("{}, {}, {}", reg(rs), reg(rt), signed(offset))
            } else {
                format!("{}, {}", reg(rs), signed(offset))
            }
        }
        Instruction::RegImm { rs, immediate, .. } => {
            format!("{}, {}", reg(rs), signed(immediate))
        }
        Instruction::Jump { target, .. } => format!("{:#x}", u64::from(target) << 2),
        Instruction::LoadStore {
            op,
            base,
            rt,
            offset,
            ..
        } => {
            let target = match op {
                LoadStoreOp::Cache => rt.number().to_string(),
                LoadStoreOp::Lwc(Coprocessor::Cp1)
                | LoadStoreOp::Ldc(Coprocessor::Cp1)
                | LoadStoreOp::Swc(Coprocessor::Cp1)
                | LoadStoreOp::Sdc(Coprocessor::Cp1) => format!("f{}", rt.number()),
                LoadStoreOp::Lwc(_)
                | LoadStoreOp::Ldc(_)
                | LoadStoreOp::Swc(_)
                | LoadStoreOp::Sdc(_) => format!("${}", rt.number()),
                _ => reg(rt),
            };
            format!("{target}, {}({})", signed(offset), reg(base))
        }
        Instruction::CopMove { op, cop, rt, rd, .. } => {
            let data_move = !matches!(op, CopMoveOp::Cf | CopMoveOp::Ct);
            if cop == Coprocessor::Cp1 && data_move {
                format!("{}, f{rd}", reg(rt))
            } else {
                format!("{}, ${rd}", reg(rt))
            }
        }
        Instruction::CopBranch { offset, .. } => signed(offset).to_string(),
        Instruction::Tlb { .. } | Instruction::Reserved { .. } => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{disassemble, disassemble_window, RESERVED_TEXT};
    use crate::instruction::Instruction;
    use crate::memory::{Endianness, Memory};

    #[rstest]
    #[case(0x27BD_FFE0, "addiu r29, r29, -32")]
    #[case(0x0022_1820, "add r3, r1, r2")]
    #[case(0x0002_1900, "sll r3, r2, 4")]
    #[case(0x0022_1814, "dsllv r3, r2, r1")]
    #[case(0x0022_001A, "div r1, r2")]
    #[case(0x0020_2809, "jalr r5, r1")]
    #[case(0x03E0_0008, "jr r31")]
    #[case(0x0000_040C, "syscall 0x10")]
    #[case(0x0000_000D, "break")]
    #[case(0x0022_0034, "teq r1, r2")]
    #[case(0x0022_01F4, "teq r1, r2, 0x7")]
    #[case(0x0022_FFF6, "tne r1, r2, 0x3ff")]
    #[case(0x3C05_1234, "lui r5, 0x1234")]
    #[case(0x3422_8000, "ori r2, r1, 0x8000")]
    #[case(0x8FA2_0010, "lw r2, 16(r29)")]
    #[case(0x8C22_FFFC, "lw r2, -4(r1)")]
    #[case(0xD424_0000, "ldc1 f4, 0(r1)")]
    #[case(0xBC20_7FFF, "cache 0, 32767(r1)")]
    #[case(0x1022_FFFF, "beq r1, r2, -1")]
    #[case(0x1820_0003, "blez r1, 3")]
    #[case(0x0431_0004, "bgezal r1, 4")]
    #[case(0x0C10_0010, "jal 0x400040")]
    #[case(0x4002_6000, "mfc0 r2, $12")]
    #[case(0x4482_1800, "mtc1 r2, f3")]
    #[case(0x4442_F800, "cfc1 r2, $31")]
    #[case(0x4503_0004, "bc1tl 4")]
    #[case(0x4200_0018, "eret")]
    fn renders_operands_in_assembler_order(#[case] word: u32, #[case] expected: &str) {
        let (instruction, text) = disassemble(word);
        assert_eq!(instruction.original(), word);
        assert_eq!(text, expected);
    }

    #[test]
    fn reserved_words_render_fixed_text() {
        let (instruction, text) = disassemble(0xEC00_0000);
        assert_eq!(
            instruction,
            Instruction::Reserved {
                original: 0xEC00_0000
            }
        );
        assert_eq!(text, RESERVED_TEXT);
    }

    fn program(words: &[u32]) -> Memory {
        let mut bytes = Vec::new();
        for word in words {
            bytes.extend_from_slice(&word.to_be_bytes());
        }
        Memory::from_bytes(bytes)
    }

    #[test]
    fn window_walks_fixed_width_words() {
        let memory = program(&[0x2408_0001, 0x2409_0002, 0x0109_5020, 0xEC00_0000]);
        let rows = disassemble_window(8, 2, 1, &memory, Endianness::Big);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].address, 0);
        assert_eq!(rows[0].mnemonic, "addiu");
        assert_eq!(rows[0].operands, "r8, r0, 1");
        assert_eq!(rows[2].address, 8);
        assert_eq!(rows[2].mnemonic, "add");
        assert_eq!(rows[2].operands, "r10, r8, r9");
        assert_eq!(rows[3].mnemonic, ".word");
        assert_eq!(rows[3].operands, "0xec000000 ; RESERVED");
        assert!(rows[3].is_reserved);
    }

    #[test]
    fn window_clips_at_memory_bounds() {
        let memory = program(&[0, 0]);
        let rows = disassemble_window(0, 3, 5, &memory, Endianness::Big);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].address, 4);
        assert_eq!(rows[0].mnemonic, "sll");
    }

    #[test]
    fn window_with_huge_bounds_covers_memory_once() {
        let memory = program(&[0x2408_0001, 0x2409_0002, 0x0109_5020]);
        let rows = disassemble_window(4, usize::MAX, usize::MAX, &memory, Endianness::Big);
        let addresses: Vec<u64> = rows.iter().map(|row| row.address).collect();
        assert_eq!(addresses, vec![0, 4, 8]);
    }

    #[test]
    fn window_centered_outside_memory_reaches_mapped_words() {
        let memory = program(&[0x2408_0001, 0x2409_0002]).with_origin(0x8000_0000);
        let rows = disassemble_window(0, 0, usize::MAX, &memory, Endianness::Big);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].address, 0x8000_0000);

        let rows = disassemble_window(u64::MAX - 3, usize::MAX, 4, &memory, Endianness::Big);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].address, 0x8000_0004);
    }

    #[test]
    fn window_respects_origin_and_byte_order() {
        let memory =
            Memory::from_bytes(0x2408_0001u32.to_le_bytes().to_vec()).with_origin(0x8000_0000);
        let rows = disassemble_window(0x8000_0000, 1, 1, &memory, Endianness::Little);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].address, 0x8000_0000);
        assert_eq!(rows[0].raw_word, 0x2408_0001);
    }
}
