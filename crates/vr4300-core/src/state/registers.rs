use crate::instruction::{GeneralRegister, GENERAL_REGISTER_COUNT};
use crate::state::undo::{RegisterSlot, SpecialRegisters, UndoEntry, UndoLog};

/// Number of floating-point registers.
pub const FLOAT_REGISTER_COUNT: usize = 32;
/// Number of CP0 register slots.
pub const CP0_REGISTER_COUNT: usize = 32;
/// Reset value of `FCR0` (VR4300 implementation `0x0A`, revision `0x00`).
pub const FCR0_VR4300: u32 = 0x0000_0A00;
/// `FCR31` condition bit tested by `bc1f`/`bc1t`.
pub const FCR31_CONDITION: u32 = 1 << 23;

/// Register width the core currently executes with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum BitMode {
    /// 32-bit addressing and operations; doubleword ops are reserved.
    #[default]
    Bit32,
    /// Full MIPS III 64-bit mode.
    Bit64,
}

impl BitMode {
    /// True in 64-bit mode.
    #[must_use]
    pub const fn is_64(self) -> bool {
        matches!(self, Self::Bit64)
    }
}

/// Complete architectural register state of one VR4300 core.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RegisterFile {
    gpr: [u64; GENERAL_REGISTER_COUNT],
    fpr: [u64; FLOAT_REGISTER_COUNT],
    cp0: [u64; CP0_REGISTER_COUNT],
    pc: u64,
    next_pc: u64,
    hi: u64,
    lo: u64,
    ll_bit: bool,
    fcr0: u32,
    fcr31: u32,
    bit_mode: BitMode,
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new(BitMode::default())
    }
}

impl RegisterFile {
    /// Creates a zeroed register file with `PC = 0`.
    #[must_use]
    pub const fn new(bit_mode: BitMode) -> Self {
        Self {
            gpr: [0; GENERAL_REGISTER_COUNT],
            fpr: [0; FLOAT_REGISTER_COUNT],
            cp0: [0; CP0_REGISTER_COUNT],
            pc: 0,
            next_pc: 4,
            hi: 0,
            lo: 0,
            ll_bit: false,
            fcr0: FCR0_VR4300,
            fcr31: 0,
            bit_mode,
        }
    }

    /// Reads a general-purpose register; `r0` always reads as zero.
    #[must_use]
    pub const fn gpr(&self, reg: GeneralRegister) -> u64 {
        self.gpr[reg.index()]
    }

    /// All general-purpose registers in index order.
    #[must_use]
    pub const fn gprs(&self) -> &[u64; GENERAL_REGISTER_COUNT] {
        &self.gpr
    }

    /// Host-side register initialisation. Writes to `r0` are discarded and
    /// nothing is journaled.
    pub const fn set_gpr(&mut self, reg: GeneralRegister, value: u64) {
        if !reg.is_zero() {
            self.gpr[reg.index()] = value;
        }
    }

    /// Engine-side register write. Writes to `r0` are discarded; every other
    /// write records the previous value in `undo` before it lands.
    pub fn write_gpr(&mut self, reg: GeneralRegister, value: u64, undo: &mut UndoLog) {
        if reg.is_zero() {
            return;
        }
        undo.record(UndoEntry {
            register: RegisterSlot::Gpr(reg),
            previous: self.gpr[reg.index()],
        });
        self.gpr[reg.index()] = value;
    }

    /// Reads a floating-point register as raw bits.
    #[must_use]
    pub const fn fpr(&self, index: u8) -> u64 {
        self.fpr[(index & 0x1F) as usize]
    }

    /// Writes a floating-point register as raw bits without journaling.
    pub const fn set_fpr(&mut self, index: u8, value: u64) {
        self.fpr[(index & 0x1F) as usize] = value;
    }

    /// Engine-side floating-point register write, journaled in `undo`.
    pub fn write_fpr(&mut self, index: u8, value: u64, undo: &mut UndoLog) {
        let slot = (index & 0x1F) as usize;
        undo.record(UndoEntry {
            register: RegisterSlot::Fpr(index & 0x1F),
            previous: self.fpr[slot],
        });
        self.fpr[slot] = value;
    }

    /// Reads a CP0 register slot.
    #[must_use]
    pub const fn cp0(&self, index: u8) -> u64 {
        self.cp0[(index & 0x1F) as usize]
    }

    /// Writes a CP0 register slot without journaling.
    pub const fn set_cp0(&mut self, index: u8, value: u64) {
        self.cp0[(index & 0x1F) as usize] = value;
    }

    /// Engine-side CP0 write, journaled in `undo`.
    pub fn write_cp0(&mut self, index: u8, value: u64, undo: &mut UndoLog) {
        let slot = (index & 0x1F) as usize;
        undo.record(UndoEntry {
            register: RegisterSlot::Cp0(index & 0x1F),
            previous: self.cp0[slot],
        });
        self.cp0[slot] = value;
    }

    /// Address of the instruction executed next.
    #[must_use]
    pub const fn pc(&self) -> u64 {
        self.pc
    }

    /// Address of the instruction after `pc`; differs from `pc + 4` while a
    /// branch delay slot is pending.
    #[must_use]
    pub const fn next_pc(&self) -> u64 {
        self.next_pc
    }

    /// Jumps to `value` with no pending delay slot.
    pub const fn set_pc(&mut self, value: u64) {
        self.pc = value;
        self.next_pc = value.wrapping_add(4);
    }

    /// Sets both program counters directly.
    pub const fn set_pc_pair(&mut self, pc: u64, next_pc: u64) {
        self.pc = pc;
        self.next_pc = next_pc;
    }

    /// Reads `HI`.
    #[must_use]
    pub const fn hi(&self) -> u64 {
        self.hi
    }

    /// Writes `HI`.
    pub const fn set_hi(&mut self, value: u64) {
        self.hi = value;
    }

    /// Reads `LO`.
    #[must_use]
    pub const fn lo(&self) -> u64 {
        self.lo
    }

    /// Writes `LO`.
    pub const fn set_lo(&mut self, value: u64) {
        self.lo = value;
    }

    /// Reads the load-linked bit.
    #[must_use]
    pub const fn ll_bit(&self) -> bool {
        self.ll_bit
    }

    /// Writes the load-linked bit.
    pub const fn set_ll_bit(&mut self, value: bool) {
        self.ll_bit = value;
    }

    /// Reads `FCR0` (implementation/revision).
    #[must_use]
    pub const fn fcr0(&self) -> u32 {
        self.fcr0
    }

    /// Reads `FCR31` (control/status).
    #[must_use]
    pub const fn fcr31(&self) -> u32 {
        self.fcr31
    }

    /// Writes `FCR31`.
    pub const fn set_fcr31(&mut self, value: u32) {
        self.fcr31 = value;
    }

    /// Current bit mode.
    #[must_use]
    pub const fn bit_mode(&self) -> BitMode {
        self.bit_mode
    }

    /// Switches bit mode.
    pub const fn set_bit_mode(&mut self, bit_mode: BitMode) {
        self.bit_mode = bit_mode;
    }

    /// Truncates a computed address to the width of the current mode.
    #[must_use]
    pub const fn effective_address(&self, value: u64) -> u64 {
        match self.bit_mode {
            BitMode::Bit32 => value & 0xFFFF_FFFF,
            BitMode::Bit64 => value,
        }
    }

    /// Captures the registers that change on every step without journaling.
    #[must_use]
    pub const fn special_registers(&self) -> SpecialRegisters {
        SpecialRegisters {
            pc: self.pc,
            next_pc: self.next_pc,
            hi: self.hi,
            lo: self.lo,
            ll_bit: self.ll_bit,
            fcr31: self.fcr31,
        }
    }

    /// Replays one step's journal in reverse and restores its checkpoint.
    pub fn restore(&mut self, special: SpecialRegisters, entries: &[UndoEntry]) {
        for entry in entries.iter().rev() {
            match entry.register {
                RegisterSlot::Gpr(reg) => self.gpr[reg.index()] = entry.previous,
                RegisterSlot::Fpr(index) => self.set_fpr(index, entry.previous),
                RegisterSlot::Cp0(index) => self.set_cp0(index, entry.previous),
            }
        }
        self.pc = special.pc;
        self.next_pc = special.next_pc;
        self.hi = special.hi;
        self.lo = special.lo;
        self.ll_bit = special.ll_bit;
        self.fcr31 = special.fcr31;
    }
}
