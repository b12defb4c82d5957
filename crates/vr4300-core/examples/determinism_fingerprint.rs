//! Deterministic execution fingerprint used for cross-host comparison.
//!
//! Runs a fixed summation loop to its closing `syscall` twice and prints an
//! FNV-1a hash of the resulting architectural state. Both runs must agree.

use log as _;
use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use serde_json as _;
use thiserror as _;
use vr4300_core::{CoreConfig, Cpu, GeneralRegister, ProgramImage};

const PROGRAM: [u32; 8] = [
    0x2401_000A, // addiu r1, r0, 10
    0x2402_0000, // addiu r2, r0, 0
    0x0041_1021, // addu r2, r2, r1
    0x2421_FFFF, // addiu r1, r1, -1
    0x1420_FFFD, // bne r1, r0, -3
    0x0000_0000, // nop
    0xAC02_0100, // sw r2, 256(r0)
    0x0000_000C, // syscall
];

fn hash_bytes(hash: &mut u64, bytes: &[u8]) {
    for byte in bytes {
        *hash ^= u64::from(*byte);
        *hash = hash.wrapping_mul(0x1000_0000_01B3);
    }
}

fn fingerprint() -> String {
    let mut bytes = vec![0u8; 0x200];
    for (slot, word) in bytes.chunks_exact_mut(4).zip(PROGRAM) {
        slot.copy_from_slice(&word.to_be_bytes());
    }
    let (mut cpu, mut memory) =
        Cpu::from_image(ProgramImage::new(bytes, 0, false), CoreConfig::default());
    let outcome = cpu.run(&mut memory, 1_000);

    let mut hash = 0xcbf2_9ce4_8422_2325_u64;
    hash_bytes(&mut hash, &outcome.steps.to_le_bytes());
    match outcome.stopped {
        Some(exception) => hash_bytes(&mut hash, &[0x10, exception.code().as_u8()]),
        None => hash_bytes(&mut hash, &[0x11]),
    }

    let registers = cpu.registers();
    for value in registers.gprs() {
        hash_bytes(&mut hash, &value.to_le_bytes());
    }
    hash_bytes(&mut hash, &registers.pc().to_le_bytes());
    hash_bytes(&mut hash, &registers.hi().to_le_bytes());
    hash_bytes(&mut hash, &registers.lo().to_le_bytes());
    hash_bytes(&mut hash, memory.as_bytes());

    assert_eq!(registers.gpr(GeneralRegister::from_u5(2)), 55);
    format!("{hash:016x}")
}

fn main() {
    let first = fingerprint();
    let second = fingerprint();
    assert_eq!(first, second, "repeated runs diverged");
    println!("{first}");
}
