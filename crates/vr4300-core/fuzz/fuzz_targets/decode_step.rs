#![no_main]

use libfuzzer_sys::fuzz_target;
use vr4300_core::{
    disassemble, BitMode, CoreConfig, Cpu, Endianness, GeneralRegister, ProgramImage,
};

fuzz_target!(|data: &[u8]| {
    if data.len() < 6 {
        return;
    }

    let word = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
    let (instruction, _) = disassemble(word);
    assert_eq!(instruction.original(), word);

    let config = CoreConfig {
        bit_mode: if data[4] & 1 == 0 {
            BitMode::Bit32
        } else {
            BitMode::Bit64
        },
        endianness: if data[4] & 2 == 0 {
            Endianness::Big
        } else {
            Endianness::Little
        },
        ..CoreConfig::default()
    };

    // Program text followed by the remaining input as data.
    let mut bytes = vec![0u8; 0x200];
    for (slot, byte) in bytes.iter_mut().zip(&data[..4]) {
        *slot = *byte;
    }
    for (slot, byte) in bytes[0x100..].iter_mut().zip(&data[5..]) {
        *slot = *byte;
    }
    let little_endian = config.endianness == Endianness::Little;
    let (mut cpu, mut memory) = Cpu::from_image(ProgramImage::new(bytes, 0, little_endian), config);

    let seed = u64::from(data[5]);
    for index in 1u8..32 {
        cpu.registers_mut()
            .set_gpr(GeneralRegister::from_u5(index), (seed * u64::from(index)) & 0x1FC);
    }

    let before = cpu.registers().clone();
    match cpu.step(&mut memory) {
        Ok(()) => {
            assert!(cpu.step_back());
            assert_eq!(cpu.registers(), &before);
        }
        Err(_) => assert_eq!(cpu.registers(), &before),
    }
});
