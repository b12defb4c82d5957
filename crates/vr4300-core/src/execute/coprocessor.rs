//! Coprocessor register moves and condition branches.
//!
//! CP0 is a bank of opaque 64-bit slots. CP1 exposes only its register file
//! and the two control registers; no floating-point arithmetic is modeled.
//! CP2 does not exist on this core.

use super::{
    mode_value, operand, require_64, reserved, resolve_branch, sign_extend_32, CopWrite, Effect,
};
use crate::fault::Exception;
use crate::instruction::{CopCondition, CopMoveOp, Coprocessor, GeneralRegister};
use crate::state::{RegisterFile, FCR31_CONDITION};

const LOW_WORD: u64 = 0xFFFF_FFFF;

pub(super) fn execute_move(
    op: CopMoveOp,
    cop: Coprocessor,
    rt: GeneralRegister,
    rd: u8,
    word: u32,
    registers: &RegisterFile,
) -> Result<Effect, Exception> {
    if op.is_doubleword() {
        require_64(registers, word)?;
    }

    let source = operand(registers, rt);
    let to_gpr = |value: u64| -> Result<Effect, Exception> { Ok(Effect::write(rt, value)) };

    match (cop, op) {
        (Coprocessor::Cp0, CopMoveOp::Mf) => to_gpr(sign_extend_32(registers.cp0(rd))),
        (Coprocessor::Cp0, CopMoveOp::Dmf) => to_gpr(registers.cp0(rd)),
        (Coprocessor::Cp0, CopMoveOp::Mt) => Ok(cop_write(CopWrite::Cp0 {
            index: rd,
            value: sign_extend_32(source),
        })),
        (Coprocessor::Cp0, CopMoveOp::Dmt) => Ok(cop_write(CopWrite::Cp0 {
            index: rd,
            value: source,
        })),

        (Coprocessor::Cp1, CopMoveOp::Mf) => to_gpr(sign_extend_32(registers.fpr(rd))),
        (Coprocessor::Cp1, CopMoveOp::Dmf) => to_gpr(registers.fpr(rd)),
        (Coprocessor::Cp1, CopMoveOp::Mt) => Ok(cop_write(CopWrite::Fpr {
            index: rd,
            value: (registers.fpr(rd) & !LOW_WORD) | (source & LOW_WORD),
        })),
        (Coprocessor::Cp1, CopMoveOp::Dmt) => Ok(cop_write(CopWrite::Fpr {
            index: rd,
            value: source,
        })),
        (Coprocessor::Cp1, CopMoveOp::Cf) => {
            let value = match rd {
                0 => registers.fcr0(),
                31 => registers.fcr31(),
                _ => 0,
            };
            to_gpr(mode_value(registers, sign_extend_32(u64::from(value))))
        }
        // FCR0 is read-only; the other control slots are unimplemented.
        (Coprocessor::Cp1, CopMoveOp::Ct) => Ok(if rd == 31 {
            cop_write(CopWrite::Fcr31(source as u32))
        } else {
            Effect::default()
        }),

        (Coprocessor::Cp0, CopMoveOp::Cf | CopMoveOp::Ct) | (Coprocessor::Cp2, _) => {
            Err(reserved(word))
        }
    }
}

pub(super) fn execute_branch(
    cop: Coprocessor,
    condition: CopCondition,
    offset: u16,
    word: u32,
    registers: &RegisterFile,
) -> Result<Effect, Exception> {
    let line = match cop {
        // No external condition input is wired to CP0.
        Coprocessor::Cp0 => false,
        Coprocessor::Cp1 => registers.fcr31() & FCR31_CONDITION != 0,
        Coprocessor::Cp2 => return Err(reserved(word)),
    };
    let taken = line == condition.branches_on();
    Ok(Effect {
        control: resolve_branch(registers, taken, condition.is_likely(), offset),
        ..Effect::default()
    })
}

const fn cop_write(write: CopWrite) -> Effect {
    Effect {
        gpr_write: None,
        hi: None,
        lo: None,
        ll_bit: None,
        load: None,
        store: None,
        cop_write: Some(write),
        control: super::Control::Sequential,
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::execute::{execute, Control, CopWrite, Effect};
    use crate::fault::Exception;
    use crate::instruction::GeneralRegister;
    use crate::memory::{Endianness, Memory};
    use crate::state::{BitMode, RegisterFile, FCR0_VR4300, FCR31_CONDITION};
    use crate::Decoder;

    fn run(word: u32, registers: &RegisterFile) -> Result<Effect, Exception> {
        execute(
            &Decoder::decode(word),
            registers,
            &Memory::new(0x10),
            Endianness::Big,
        )
    }

    #[test]
    fn cp0_moves_sign_extend_words() {
        let mut registers = RegisterFile::new(BitMode::Bit64);
        registers.set_cp0(12, 0x0000_0000_8000_0001);
        // mfc0 r2, $12
        let effect = run(0x4002_6000, &registers).expect("valid move");
        assert_eq!(
            effect.gpr_write,
            Some((GeneralRegister::from_u5(2), 0xFFFF_FFFF_8000_0001))
        );
        // dmfc0 r2, $12
        let effect = run(0x4022_6000, &registers).expect("valid move");
        assert_eq!(
            effect.gpr_write,
            Some((GeneralRegister::from_u5(2), 0x8000_0001))
        );

        registers.set_gpr(GeneralRegister::from_u5(2), 0x1_0000_0002);
        // mtc0 r2, $12
        let effect = run(0x4082_6000, &registers).expect("valid move");
        assert_eq!(effect.cop_write, Some(CopWrite::Cp0 { index: 12, value: 2 }));
    }

    #[test]
    fn mtc1_replaces_only_the_low_word() {
        let mut registers = RegisterFile::default();
        registers.set_fpr(3, 0xAAAA_AAAA_BBBB_BBBB);
        registers.set_gpr(GeneralRegister::from_u5(2), 0x1234_5678);
        // mtc1 r2, f3
        let effect = run(0x4482_1800, &registers).expect("valid move");
        assert_eq!(
            effect.cop_write,
            Some(CopWrite::Fpr {
                index: 3,
                value: 0xAAAA_AAAA_1234_5678,
            })
        );
    }

    #[test]
    fn doubleword_moves_need_64_bit_mode() {
        // dmtc1 r2, f3
        assert_eq!(
            run(0x44A2_1800, &RegisterFile::default()),
            Err(Exception::ReservedInstruction { word: 0x44A2_1800 })
        );
    }

    #[rstest]
    #[case(0, u64::from(FCR0_VR4300))]
    #[case(31, 0x0080_0000)]
    #[case(5, 0)]
    fn cfc1_reads_control_registers(#[case] fs: u8, #[case] expected: u64) {
        let mut registers = RegisterFile::default();
        registers.set_fcr31(FCR31_CONDITION);
        // cfc1 r2, fs
        let word = 0x4442_0000 | (u32::from(fs) << 11);
        let effect = run(word, &registers).expect("valid move");
        assert_eq!(
            effect.gpr_write,
            Some((GeneralRegister::from_u5(2), expected))
        );
    }

    #[test]
    fn ctc1_writes_fcr31_and_ignores_fcr0() {
        let mut registers = RegisterFile::default();
        registers.set_gpr(GeneralRegister::from_u5(2), 0x0080_0003);
        // ctc1 r2, $31
        let effect = run(0x44C2_F800, &registers).expect("valid move");
        assert_eq!(effect.cop_write, Some(CopWrite::Fcr31(0x0080_0003)));
        // ctc1 r2, $0
        let effect = run(0x44C2_0000, &registers).expect("valid move");
        assert_eq!(effect, Effect::default());
    }

    #[test]
    fn bc1_follows_fcr31_condition_bit() {
        let mut registers = RegisterFile::default();
        registers.set_pc(0x100);
        // bc1t +4
        let word = 0x4501_0004;
        assert_eq!(
            run(word, &registers).map(|effect| effect.control),
            Ok(Control::Sequential)
        );
        registers.set_fcr31(FCR31_CONDITION);
        assert_eq!(
            run(word, &registers).map(|effect| effect.control),
            Ok(Control::Branch { target: 0x114 })
        );
        // bc1fl +4 with the condition set: likely, not taken
        assert_eq!(
            run(0x4502_0004, &registers).map(|effect| effect.control),
            Ok(Control::NullifyDelaySlot)
        );
    }

    #[test]
    fn bc0f_is_always_taken() {
        // bc0f +1
        let effect = run(0x4100_0001, &RegisterFile::default()).expect("valid branch");
        assert_eq!(effect.control, Control::Branch { target: 8 });
    }

    #[rstest]
    // mfc2 r2, $3
    #[case(0x4802_1800)]
    // bc2t +1
    #[case(0x4901_0001)]
    fn cp2_is_reserved(#[case] word: u32) {
        assert_eq!(
            run(word, &RegisterFile::default()),
            Err(Exception::ReservedInstruction { word })
        );
    }
}
