//! Instruction execution pipeline for the VR4300 core.
//!
//! Execution is split in two phases so that exceptions are precise:
//! 1. [`execute`] reads operands, computes results and effective
//!    addresses, performs loads, and validates stores. It never mutates
//!    anything and either returns an [`Effect`] or an [`Exception`].
//! 2. [`commit_effect`] applies the effect: the store first, then
//!    journaled register writes, then the program-counter update.
//!
//! An instruction that raises leaves registers, memory and the undo log
//! exactly as they were.

#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::too_many_lines
)]

mod coprocessor;
mod helpers;
mod load_store;

pub use helpers::{
    checked_add_32, checked_add_64, checked_sub_32, checked_sub_64, merge_load_left,
    merge_load_right, merge_store_left, merge_store_right, sign_extend, sign_extend_16,
    sign_extend_32,
};

use crate::encoding::long_code;
use crate::fault::{AccessKind, Exception, TrapCause};
use crate::instruction::{
    BranchOp, GeneralRegister, ImmediateOp, Instruction, JumpOp, RegImmOp, RegisterOp,
};
use crate::memory::{AccessWidth, Endianness, Memory, MemoryError};
use crate::state::{RegisterFile, UndoLog};
use crate::Decoder;

/// Program-counter behaviour of a retired instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Control {
    /// Continue with the next sequential instruction.
    #[default]
    Sequential,
    /// Execute the delay slot, then continue at `target`.
    Branch {
        /// Address control transfers to after the delay slot.
        target: u64,
    },
    /// Likely branch not taken: the delay slot is skipped entirely.
    NullifyDelaySlot,
}

/// One data-memory access, as observed by tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryAccess {
    /// Aligned address of the access.
    pub address: u64,
    /// Width of the access.
    pub width: AccessWidth,
    /// Value read, or value to be written.
    pub value: u64,
}

/// Pending coprocessor-side register write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CopWrite {
    /// CP0 register slot.
    Cp0 {
        /// Register index.
        index: u8,
        /// New value.
        value: u64,
    },
    /// Floating-point register raw bits.
    Fpr {
        /// Register index.
        index: u8,
        /// New value.
        value: u64,
    },
    /// Floating-point control/status register.
    Fcr31(u32),
}

/// Side effects of one instruction, accumulated before anything commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Effect {
    /// Destination general-purpose register and its new value.
    pub gpr_write: Option<(GeneralRegister, u64)>,
    /// New `HI` value.
    pub hi: Option<u64>,
    /// New `LO` value.
    pub lo: Option<u64>,
    /// New load-linked bit.
    pub ll_bit: Option<bool>,
    /// Completed load, for tracing.
    pub load: Option<MemoryAccess>,
    /// Validated store to perform at commit.
    pub store: Option<MemoryAccess>,
    /// Coprocessor register write.
    pub cop_write: Option<CopWrite>,
    /// Program-counter update.
    pub control: Control,
}

impl Effect {
    const fn write(reg: GeneralRegister, value: u64) -> Self {
        Self {
            gpr_write: Some((reg, value)),
            hi: None,
            lo: None,
            ll_bit: None,
            load: None,
            store: None,
            cop_write: None,
            control: Control::Sequential,
        }
    }

    const fn hi_lo(hi: u64, lo: u64) -> Self {
        Self {
            gpr_write: None,
            hi: Some(hi),
            lo: Some(lo),
            ll_bit: None,
            load: None,
            store: None,
            cop_write: None,
            control: Control::Sequential,
        }
    }

    const fn control(control: Control) -> Self {
        Self {
            gpr_write: None,
            hi: None,
            lo: None,
            ll_bit: None,
            load: None,
            store: None,
            cop_write: None,
            control,
        }
    }
}

/// Computes the effect of `instr` against the current state.
///
/// # Errors
///
/// Returns the [`Exception`] the instruction raises. Nothing has been
/// mutated when this happens.
pub fn execute(
    instr: &Instruction,
    registers: &RegisterFile,
    memory: &Memory,
    endianness: Endianness,
) -> Result<Effect, Exception> {
    match *instr {
        Instruction::Register {
            op,
            rs,
            rt,
            rd,
            sa,
            original,
        } => execute_register(op, rs, rt, rd, sa, original, registers),
        Instruction::Immediate {
            op,
            rs,
            rt,
            immediate,
            original,
        } => execute_immediate(op, rs, rt, immediate, original, registers),
        Instruction::Branch {
            op, rs, rt, offset, ..
        } => Ok(execute_branch(op, rs, rt, offset, registers)),
        Instruction::RegImm {
            op,
            rs,
            immediate,
            ..
        } => execute_regimm(op, rs, immediate, registers),
        Instruction::Jump { op, target, .. } => Ok(execute_jump(op, target, registers)),
        Instruction::LoadStore {
            op,
            base,
            rt,
            offset,
            original,
        } => load_store::execute(op, base, rt, offset, original, registers, memory, endianness),
        Instruction::CopMove {
            op,
            cop,
            rt,
            rd,
            original,
        } => coprocessor::execute_move(op, cop, rt, rd, original, registers),
        Instruction::CopBranch {
            cop,
            condition,
            offset,
            original,
        } => coprocessor::execute_branch(cop, condition, offset, original, registers),
        // No TLB is modeled; the maintenance ops and eret retire as no-ops.
        Instruction::Tlb { .. } => Ok(Effect::default()),
        Instruction::Reserved { original } => Err(reserved(original)),
    }
}

/// Applies a computed effect to the register file and memory.
///
/// The store lands first since it is the only part that touches memory;
/// a step-back frame is then opened and every register write is journaled.
///
/// # Errors
///
/// Returns [`Exception::AddressError`] if the store target became invalid
/// between [`execute`] and commit. Nothing is mutated in that case.
pub fn commit_effect(
    effect: &Effect,
    registers: &mut RegisterFile,
    memory: &mut Memory,
    undo: &mut UndoLog,
    endianness: Endianness,
) -> Result<(), Exception> {
    if let Some(store) = effect.store {
        memory
            .write(store.address, store.width, store.value, endianness)
            .map_err(|error| address_error(error, AccessKind::Store))?;
    }

    undo.begin_step(registers.special_registers());

    if let Some((reg, value)) = effect.gpr_write {
        registers.write_gpr(reg, value, undo);
    }
    match effect.cop_write {
        Some(CopWrite::Cp0 { index, value }) => registers.write_cp0(index, value, undo),
        Some(CopWrite::Fpr { index, value }) => registers.write_fpr(index, value, undo),
        Some(CopWrite::Fcr31(value)) => registers.set_fcr31(value),
        None => {}
    }
    if let Some(hi) = effect.hi {
        registers.set_hi(hi);
    }
    if let Some(lo) = effect.lo {
        registers.set_lo(lo);
    }
    if let Some(ll_bit) = effect.ll_bit {
        registers.set_ll_bit(ll_bit);
    }

    let delay_slot = registers.next_pc();
    let (pc, next_pc) = match effect.control {
        Control::Sequential => (delay_slot, delay_slot.wrapping_add(4)),
        Control::Branch { target } => (delay_slot, target),
        Control::NullifyDelaySlot => {
            let after_slot = delay_slot.wrapping_add(4);
            (after_slot, after_slot.wrapping_add(4))
        }
    };
    let pc = registers.effective_address(pc);
    let next_pc = registers.effective_address(next_pc);
    registers.set_pc_pair(pc, next_pc);
    Ok(())
}

/// Fetches and decodes the instruction at `pc`.
///
/// # Errors
///
/// Returns [`Exception::AddressError`] with [`AccessKind::Fetch`] when `pc`
/// is unaligned or unmapped.
pub fn fetch_and_decode(
    pc: u64,
    memory: &Memory,
    endianness: Endianness,
) -> Result<Instruction, Exception> {
    memory
        .fetch(pc, endianness)
        .map(Decoder::decode)
        .map_err(|error| address_error(error, AccessKind::Fetch))
}

pub(crate) const fn reserved(word: u32) -> Exception {
    Exception::ReservedInstruction { word }
}

pub(crate) const fn address_error(error: MemoryError, access: AccessKind) -> Exception {
    Exception::AddressError {
        address: error.address(),
        access,
    }
}

pub(crate) const fn require_64(registers: &RegisterFile, word: u32) -> Result<(), Exception> {
    if registers.bit_mode().is_64() {
        Ok(())
    } else {
        Err(reserved(word))
    }
}

/// Reads a source operand; in 32-bit mode only the sign-extended low word
/// is visible.
pub(crate) const fn operand(registers: &RegisterFile, reg: GeneralRegister) -> u64 {
    mode_value(registers, registers.gpr(reg))
}

/// Narrows a result to the current mode: 32-bit mode keeps registers
/// sign-extended from bit 31.
pub(crate) const fn mode_value(registers: &RegisterFile, value: u64) -> u64 {
    if registers.bit_mode().is_64() {
        value
    } else {
        sign_extend_32(value)
    }
}

/// Delay-slot-relative branch resolution shared by every conditional branch.
pub(crate) const fn resolve_branch(
    registers: &RegisterFile,
    taken: bool,
    likely: bool,
    offset: u16,
) -> Control {
    if taken {
        let delay_slot = registers.pc().wrapping_add(4);
        Control::Branch {
            target: delay_slot.wrapping_add(sign_extend_16(offset) << 2),
        }
    } else if likely {
        Control::NullifyDelaySlot
    } else {
        Control::Sequential
    }
}

const fn link_value(registers: &RegisterFile) -> u64 {
    mode_value(registers, registers.pc().wrapping_add(8))
}

const fn trap_if(condition: bool) -> Result<Effect, Exception> {
    if condition {
        Err(Exception::Trap(TrapCause::Conditional))
    } else {
        Ok(Effect::control(Control::Sequential))
    }
}

#[allow(clippy::too_many_arguments)]
fn execute_register(
    op: RegisterOp,
    rs: GeneralRegister,
    rt: GeneralRegister,
    rd: GeneralRegister,
    sa: u8,
    word: u32,
    registers: &RegisterFile,
) -> Result<Effect, Exception> {
    if op.is_doubleword() {
        require_64(registers, word)?;
    }

    let a = operand(registers, rs);
    let b = operand(registers, rt);
    let word_b = b as u32;
    let write = |value: u64| -> Result<Effect, Exception> { Ok(Effect::write(rd, value)) };

    match op {
        RegisterOp::Sll => write(sign_extend_32(u64::from(word_b << sa))),
        RegisterOp::Srl => write(sign_extend_32(u64::from(word_b >> sa))),
        RegisterOp::Sra => write(sign_extend_32(((word_b as i32) >> sa) as u64)),
        RegisterOp::Sllv => write(sign_extend_32(u64::from(word_b << (a & 0x1F)))),
        RegisterOp::Srlv => write(sign_extend_32(u64::from(word_b >> (a & 0x1F)))),
        RegisterOp::Srav => write(sign_extend_32(((word_b as i32) >> (a & 0x1F)) as u64)),
        RegisterOp::Dsll => write(b << sa),
        RegisterOp::Dsrl => write(b >> sa),
        RegisterOp::Dsra => write(((b as i64) >> sa) as u64),
        RegisterOp::Dsll32 => write(b << (u32::from(sa) + 32)),
        RegisterOp::Dsrl32 => write(b >> (u32::from(sa) + 32)),
        RegisterOp::Dsra32 => write(((b as i64) >> (u32::from(sa) + 32)) as u64),
        RegisterOp::Dsllv => write(b << (a & 0x3F)),
        RegisterOp::Dsrlv => write(b >> (a & 0x3F)),
        RegisterOp::Dsrav => write(((b as i64) >> (a & 0x3F)) as u64),

        RegisterOp::Jr => Ok(Effect::control(Control::Branch { target: a })),
        RegisterOp::Jalr => Ok(Effect {
            gpr_write: Some((rd, link_value(registers))),
            control: Control::Branch { target: a },
            ..Effect::default()
        }),

        RegisterOp::Syscall => Err(Exception::Trap(TrapCause::Syscall {
            code: long_code(word),
        })),
        RegisterOp::Break => Err(Exception::Trap(TrapCause::Breakpoint {
            code: long_code(word),
        })),
        RegisterOp::Sync => Ok(Effect::default()),

        RegisterOp::Mfhi => write(registers.hi()),
        RegisterOp::Mflo => write(registers.lo()),
        RegisterOp::Mthi => Ok(Effect {
            hi: Some(a),
            ..Effect::default()
        }),
        RegisterOp::Mtlo => Ok(Effect {
            lo: Some(a),
            ..Effect::default()
        }),

        RegisterOp::Mult => {
            let product = i64::from(a as i32) * i64::from(word_b as i32);
            Ok(Effect::hi_lo(
                sign_extend_32((product >> 32) as u64),
                sign_extend_32(product as u64),
            ))
        }
        RegisterOp::Multu => {
            let product = u64::from(a as u32) * u64::from(word_b);
            Ok(Effect::hi_lo(
                sign_extend_32(product >> 32),
                sign_extend_32(product),
            ))
        }
        RegisterOp::Div => {
            let (dividend, divisor) = (a as i32, word_b as i32);
            let (quotient, remainder) = if divisor == 0 {
                (if dividend >= 0 { -1 } else { 1 }, dividend)
            } else {
                (
                    dividend.wrapping_div(divisor),
                    dividend.wrapping_rem(divisor),
                )
            };
            Ok(Effect::hi_lo(
                sign_extend_32(remainder as u64),
                sign_extend_32(quotient as u64),
            ))
        }
        RegisterOp::Divu => {
            let (dividend, divisor) = (a as u32, word_b);
            let (quotient, remainder) = if divisor == 0 {
                (u32::MAX, dividend)
            } else {
                (dividend / divisor, dividend % divisor)
            };
            Ok(Effect::hi_lo(
                sign_extend_32(u64::from(remainder)),
                sign_extend_32(u64::from(quotient)),
            ))
        }
        RegisterOp::Dmult => {
            let product = i128::from(a as i64) * i128::from(b as i64);
            Ok(Effect::hi_lo((product >> 64) as u64, product as u64))
        }
        RegisterOp::Dmultu => {
            let product = u128::from(a) * u128::from(b);
            Ok(Effect::hi_lo((product >> 64) as u64, product as u64))
        }
        RegisterOp::Ddiv => {
            let (dividend, divisor) = (a as i64, b as i64);
            let (quotient, remainder) = if divisor == 0 {
                (if dividend >= 0 { -1 } else { 1 }, dividend)
            } else {
                (
                    dividend.wrapping_div(divisor),
                    dividend.wrapping_rem(divisor),
                )
            };
            Ok(Effect::hi_lo(remainder as u64, quotient as u64))
        }
        RegisterOp::Ddivu => {
            let (quotient, remainder) = if b == 0 { (u64::MAX, a) } else { (a / b, a % b) };
            Ok(Effect::hi_lo(remainder, quotient))
        }

        RegisterOp::Add => checked_add_32(a, b)
            .ok_or(Exception::IntegerOverflow)
            .map(|value| Effect::write(rd, value)),
        RegisterOp::Addu => write(sign_extend_32(a.wrapping_add(b))),
        RegisterOp::Sub => checked_sub_32(a, b)
            .ok_or(Exception::IntegerOverflow)
            .map(|value| Effect::write(rd, value)),
        RegisterOp::Subu => write(sign_extend_32(a.wrapping_sub(b))),
        RegisterOp::Dadd => checked_add_64(a, b)
            .ok_or(Exception::IntegerOverflow)
            .map(|value| Effect::write(rd, value)),
        RegisterOp::Daddu => write(a.wrapping_add(b)),
        RegisterOp::Dsub => checked_sub_64(a, b)
            .ok_or(Exception::IntegerOverflow)
            .map(|value| Effect::write(rd, value)),
        RegisterOp::Dsubu => write(a.wrapping_sub(b)),
        RegisterOp::And => write(a & b),
        RegisterOp::Or => write(a | b),
        RegisterOp::Xor => write(a ^ b),
        RegisterOp::Nor => write(!(a | b)),
        RegisterOp::Slt => write(u64::from((a as i64) < (b as i64))),
        RegisterOp::Sltu => write(u64::from(a < b)),

        RegisterOp::Tge => trap_if((a as i64) >= (b as i64)),
        RegisterOp::Tgeu => trap_if(a >= b),
        RegisterOp::Tlt => trap_if((a as i64) < (b as i64)),
        RegisterOp::Tltu => trap_if(a < b),
        RegisterOp::Teq => trap_if(a == b),
        RegisterOp::Tne => trap_if(a != b),
    }
}

fn execute_immediate(
    op: ImmediateOp,
    rs: GeneralRegister,
    rt: GeneralRegister,
    immediate: u16,
    word: u32,
    registers: &RegisterFile,
) -> Result<Effect, Exception> {
    let a = operand(registers, rs);
    let signed = sign_extend_16(immediate);
    let unsigned = u64::from(immediate);

    let value = match op {
        ImmediateOp::Addi => checked_add_32(a, signed).ok_or(Exception::IntegerOverflow)?,
        ImmediateOp::Addiu => sign_extend_32(a.wrapping_add(signed)),
        ImmediateOp::Slti => u64::from((a as i64) < (signed as i64)),
        ImmediateOp::Sltiu => u64::from(a < signed),
        ImmediateOp::Andi => a & unsigned,
        ImmediateOp::Ori => a | unsigned,
        ImmediateOp::Xori => a ^ unsigned,
        ImmediateOp::Lui => sign_extend_32(unsigned << 16),
        ImmediateOp::Daddi => {
            require_64(registers, word)?;
            checked_add_64(a, signed).ok_or(Exception::IntegerOverflow)?
        }
        ImmediateOp::Daddiu => {
            require_64(registers, word)?;
            a.wrapping_add(signed)
        }
    };
    Ok(Effect::write(rt, value))
}

fn execute_branch(
    op: BranchOp,
    rs: GeneralRegister,
    rt: GeneralRegister,
    offset: u16,
    registers: &RegisterFile,
) -> Effect {
    let a = operand(registers, rs);
    let b = operand(registers, rt);
    let taken = match op {
        BranchOp::Beq | BranchOp::Beql => a == b,
        BranchOp::Bne | BranchOp::Bnel => a != b,
        BranchOp::Blez | BranchOp::Blezl => (a as i64) <= 0,
        BranchOp::Bgtz | BranchOp::Bgtzl => (a as i64) > 0,
    };
    Effect::control(resolve_branch(registers, taken, op.is_likely(), offset))
}

fn execute_regimm(
    op: RegImmOp,
    rs: GeneralRegister,
    immediate: u16,
    registers: &RegisterFile,
) -> Result<Effect, Exception> {
    let a = operand(registers, rs);
    let signed = sign_extend_16(immediate);

    let (taken, likely, link) = match op {
        RegImmOp::Tgei => return trap_if((a as i64) >= (signed as i64)),
        RegImmOp::Tgeiu => return trap_if(a >= signed),
        RegImmOp::Tlti => return trap_if((a as i64) < (signed as i64)),
        RegImmOp::Tltiu => return trap_if(a < signed),
        RegImmOp::Teqi => return trap_if(a == signed),
        RegImmOp::Tnei => return trap_if(a != signed),
        RegImmOp::Bltz => ((a as i64) < 0, false, false),
        RegImmOp::Bgez => ((a as i64) >= 0, false, false),
        RegImmOp::Bltzl => ((a as i64) < 0, true, false),
        RegImmOp::Bgezl => ((a as i64) >= 0, true, false),
        RegImmOp::Bltzal => ((a as i64) < 0, false, true),
        RegImmOp::Bgezal => ((a as i64) >= 0, false, true),
        RegImmOp::Bltzall => ((a as i64) < 0, true, true),
        RegImmOp::Bgezall => ((a as i64) >= 0, true, true),
    };

    // The link register is written whether or not the branch is taken.
    Ok(Effect {
        gpr_write: link.then(|| (GeneralRegister::RA, link_value(registers))),
        control: resolve_branch(registers, taken, likely, immediate),
        ..Effect::default()
    })
}

fn execute_jump(op: JumpOp, target: u32, registers: &RegisterFile) -> Effect {
    let region = registers.pc().wrapping_add(4) & !0x0FFF_FFFF;
    let control = Control::Branch {
        target: region | (u64::from(target) << 2),
    };
    match op {
        JumpOp::J => Effect::control(control),
        JumpOp::Jal => Effect {
            gpr_write: Some((GeneralRegister::RA, link_value(registers))),
            control,
            ..Effect::default()
        },
    }
}
