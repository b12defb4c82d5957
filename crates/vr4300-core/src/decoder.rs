//! Instruction decoder for the VR4300 (MIPS III) instruction set.
//!
//! Decoding is total: every 32-bit word produces an [`Instruction`], and
//! encodings with no defined mnemonic produce [`Instruction::Reserved`].
//! Whether an instruction is legal in the current bit mode is decided at
//! execute time.

use crate::encoding::{
    classify_branch, classify_cop_move, classify_immediate, classify_jump, classify_load_store,
    classify_regimm, classify_special, classify_tlb, funct, imm16, is_cop_function, opcode, rd, rs,
    rt, sa, target26, OpcodeClass, COP_BRANCH_FORMAT,
};
use crate::instruction::{CopCondition, Coprocessor, GeneralRegister, Instruction};

/// Stateless decoder entry point.
pub struct Decoder;

impl Decoder {
    /// Decodes one instruction word.
    #[must_use]
    pub fn decode(word: u32) -> Instruction {
        match OpcodeClass::from_u6(opcode(word)) {
            OpcodeClass::Special => decode_special(word),
            OpcodeClass::RegImm => decode_regimm(word),
            OpcodeClass::Jump => classify_jump(opcode(word)).map_or(
                Instruction::Reserved { original: word },
                |op| Instruction::Jump {
                    op,
                    target: target26(word),
                    original: word,
                },
            ),
            OpcodeClass::Branch => classify_branch(opcode(word)).map_or(
                Instruction::Reserved { original: word },
                |op| Instruction::Branch {
                    op,
                    rs: reg(rs(word)),
                    rt: reg(rt(word)),
                    offset: imm16(word),
                    original: word,
                },
            ),
            OpcodeClass::Immediate => classify_immediate(opcode(word)).map_or(
                Instruction::Reserved { original: word },
                |op| Instruction::Immediate {
                    op,
                    rs: reg(rs(word)),
                    rt: reg(rt(word)),
                    immediate: imm16(word),
                    original: word,
                },
            ),
            OpcodeClass::Coprocessor(cop) => decode_coprocessor(cop, word),
            OpcodeClass::LoadStore => classify_load_store(opcode(word)).map_or(
                Instruction::Reserved { original: word },
                |op| Instruction::LoadStore {
                    op,
                    base: reg(rs(word)),
                    rt: reg(rt(word)),
                    offset: imm16(word),
                    original: word,
                },
            ),
            OpcodeClass::Reserved => Instruction::Reserved { original: word },
        }
    }
}

/// Decodes one instruction word; shorthand for [`Decoder::decode`].
#[must_use]
pub fn decode(word: u32) -> Instruction {
    Decoder::decode(word)
}

const fn reg(bits: u8) -> GeneralRegister {
    GeneralRegister::from_u5(bits)
}

fn decode_special(word: u32) -> Instruction {
    classify_special(funct(word)).map_or(Instruction::Reserved { original: word }, |op| {
        Instruction::Register {
            op,
            rs: reg(rs(word)),
            rt: reg(rt(word)),
            rd: reg(rd(word)),
            sa: sa(word),
            original: word,
        }
    })
}

fn decode_regimm(word: u32) -> Instruction {
    classify_regimm(rt(word)).map_or(Instruction::Reserved { original: word }, |op| {
        Instruction::RegImm {
            op,
            rs: reg(rs(word)),
            immediate: imm16(word),
            original: word,
        }
    })
}

fn decode_coprocessor(cop: Coprocessor, word: u32) -> Instruction {
    let reserved = Instruction::Reserved { original: word };

    if is_cop_function(word) {
        // Only CP0 function space (TLB, eret) is modeled; CP1 arithmetic is not.
        if cop != Coprocessor::Cp0 {
            return reserved;
        }
        return classify_tlb(funct(word)).map_or(reserved, |op| Instruction::Tlb {
            op,
            original: word,
        });
    }

    let format = rs(word);
    if format == COP_BRANCH_FORMAT {
        let condition = match rt(word) {
            0 => CopCondition::False,
            1 => CopCondition::True,
            2 => CopCondition::FalseLikely,
            3 => CopCondition::TrueLikely,
            _ => return reserved,
        };
        return Instruction::CopBranch {
            cop,
            condition,
            offset: imm16(word),
            original: word,
        };
    }

    classify_cop_move(cop, format).map_or(reserved, |op| Instruction::CopMove {
        op,
        cop,
        rt: reg(rt(word)),
        rd: rd(word),
        original: word,
    })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rstest::rstest;

    use super::{decode, Decoder};
    use crate::instruction::{
        BranchOp, CopCondition, CopMoveOp, Coprocessor, GeneralRegister, ImmediateOp, Instruction,
        JumpOp, LoadStoreOp, RegImmOp, RegisterOp, TlbOp,
    };

    #[test]
    fn addiu_stack_adjust_decodes_to_immediate_form() {
        assert_eq!(
            Decoder::decode(0x27BD_FFE0),
            Instruction::Immediate {
                op: ImmediateOp::Addiu,
                rs: GeneralRegister::SP,
                rt: GeneralRegister::SP,
                immediate: 0xFFE0,
                original: 0x27BD_FFE0,
            }
        );
    }

    #[test]
    fn register_form_extracts_all_fields() {
        assert_eq!(
            decode(0x0022_1820),
            Instruction::Register {
                op: RegisterOp::Add,
                rs: GeneralRegister::from_u5(1),
                rt: GeneralRegister::from_u5(2),
                rd: GeneralRegister::from_u5(3),
                sa: 0,
                original: 0x0022_1820,
            }
        );
        assert!(matches!(
            decode(0x0004_20BC),
            Instruction::Register {
                op: RegisterOp::Dsll32,
                sa: 2,
                ..
            }
        ));
    }

    #[rstest]
    #[case(0x0000_0001)]
    #[case(0x0000_0005)]
    #[case(0x0000_0028)]
    #[case(0x0000_0035)]
    #[case(0x0000_0039)]
    #[case(0x0414_0000)]
    #[case(0x7C00_0000)]
    #[case(0x4C00_0000)]
    #[case(0x4200_0003)]
    #[case(0x4600_0000)]
    #[case(0x4600_0018)]
    #[case(0x4A00_0001)]
    #[case(0x4A00_0008)]
    #[case(0x4060_0000)]
    #[case(0x4040_0000)]
    #[case(0x4820_0000)]
    #[case(0x4104_0000)]
    #[case(0xCC00_0000)]
    #[case(0xEC00_0000)]
    fn unmapped_patterns_decode_to_reserved(#[case] word: u32) {
        assert_eq!(decode(word), Instruction::Reserved { original: word });
    }

    #[rstest]
    #[case(0x0411_0004, RegImmOp::Bgezal)]
    #[case(0x0400_FFFF, RegImmOp::Bltz)]
    #[case(0x042E_0007, RegImmOp::Tnei)]
    #[case(0x0413_0000, RegImmOp::Bgezall)]
    fn regimm_dispatches_on_rt_field(#[case] word: u32, #[case] expected: RegImmOp) {
        let Instruction::RegImm { op, immediate, .. } = decode(word) else {
            panic!("expected REGIMM form for {word:#010x}");
        };
        assert_eq!(op, expected);
        assert_eq!(immediate, (word & 0xFFFF) as u16);
    }

    #[test]
    fn jump_and_branch_forms_carry_their_targets() {
        assert_eq!(
            decode(0x0C10_0010),
            Instruction::Jump {
                op: JumpOp::Jal,
                target: 0x0010_0010,
                original: 0x0C10_0010,
            }
        );
        assert!(matches!(
            decode(0x5022_FFFE),
            Instruction::Branch {
                op: BranchOp::Beql,
                offset: 0xFFFE,
                ..
            }
        ));
    }

    #[test]
    fn load_store_forms_embed_coprocessor_number() {
        assert!(matches!(
            decode(0xC7A2_0010),
            Instruction::LoadStore {
                op: LoadStoreOp::Lwc(Coprocessor::Cp1),
                offset: 0x0010,
                ..
            }
        ));
        assert!(matches!(
            decode(0xFBA2_0010),
            Instruction::LoadStore {
                op: LoadStoreOp::Sdc(Coprocessor::Cp2),
                ..
            }
        ));
        assert!(matches!(
            decode(0x8FA2_0010),
            Instruction::LoadStore {
                op: LoadStoreOp::Lw,
                ..
            }
        ));
    }

    #[test]
    fn coprocessor_space_splits_moves_branches_and_tlb() {
        assert_eq!(
            decode(0x4082_6000),
            Instruction::CopMove {
                op: CopMoveOp::Mt,
                cop: Coprocessor::Cp0,
                rt: GeneralRegister::from_u5(2),
                rd: 12,
                original: 0x4082_6000,
            }
        );
        assert!(matches!(
            decode(0x4442_F800),
            Instruction::CopMove {
                op: CopMoveOp::Cf,
                cop: Coprocessor::Cp1,
                rd: 31,
                ..
            }
        ));
        assert!(matches!(
            decode(0x4503_0004),
            Instruction::CopBranch {
                cop: Coprocessor::Cp1,
                condition: CopCondition::TrueLikely,
                offset: 4,
                ..
            }
        ));
        assert_eq!(
            decode(0x4200_0018),
            Instruction::Tlb {
                op: TlbOp::Eret,
                original: 0x4200_0018,
            }
        );
        assert!(matches!(
            decode(0x4200_0002),
            Instruction::Tlb {
                op: TlbOp::Tlbwi,
                ..
            }
        ));
    }

    proptest! {
        #[test]
        fn decode_is_total_and_preserves_original(word in any::<u32>()) {
            let decoded = decode(word);
            prop_assert_eq!(decoded.original(), word);
            prop_assert_eq!(decode(word), decoded);
        }
    }
}
