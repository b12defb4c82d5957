//! Decoded instruction representation.
//!
//! One [`Instruction`] case exists per encoding format. Each case carries a
//! per-format operation enum so that execution can match exhaustively on
//! every mnemonic, and every case keeps the raw word it was decoded from.

/// Number of general-purpose registers.
pub const GENERAL_REGISTER_COUNT: usize = 32;

/// General-purpose register index (`r0..r31`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct GeneralRegister(u8);

impl GeneralRegister {
    /// Hardwired zero register.
    pub const ZERO: Self = Self(0);
    /// Stack pointer by convention (`r29`).
    pub const SP: Self = Self(29);
    /// Link register written by `jal` and the `*al` branches (`r31`).
    pub const RA: Self = Self(31);

    /// Builds a register from a 5-bit instruction field; upper bits are ignored.
    #[must_use]
    pub const fn from_u5(bits: u8) -> Self {
        Self(bits & 0x1F)
    }

    /// Builds a register from a full index, rejecting values above 31.
    #[must_use]
    pub const fn new(index: u8) -> Option<Self> {
        if index < 32 {
            Some(Self(index))
        } else {
            None
        }
    }

    /// Returns the array index for this register (`0..=31`).
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns the raw 5-bit register number.
    #[must_use]
    pub const fn number(self) -> u8 {
        self.0
    }

    /// True for `r0`.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

/// Coprocessor unit addressed by a `COPz` or `LWCz`-style opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Coprocessor {
    /// System control coprocessor.
    Cp0,
    /// Floating-point unit.
    Cp1,
    /// Reserved coprocessor; every operation on it is a reserved instruction.
    Cp2,
}

impl Coprocessor {
    /// Decodes the low two opcode bits; `3` has no coprocessor on this core.
    #[must_use]
    pub const fn from_u2(bits: u8) -> Option<Self> {
        match bits & 0x3 {
            0 => Some(Self::Cp0),
            1 => Some(Self::Cp1),
            2 => Some(Self::Cp2),
            _ => None,
        }
    }

    /// Returns the coprocessor number.
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Self::Cp0 => 0,
            Self::Cp1 => 1,
            Self::Cp2 => 2,
        }
    }
}

/// SPECIAL (`opcode == 0`) operations, selected by the function field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(missing_docs)]
pub enum RegisterOp {
    Sll,
    Srl,
    Sra,
    Sllv,
    Srlv,
    Srav,
    Jr,
    Jalr,
    Syscall,
    Break,
    Sync,
    Mfhi,
    Mthi,
    Mflo,
    Mtlo,
    Dsllv,
    Dsrlv,
    Dsrav,
    Mult,
    Multu,
    Div,
    Divu,
    Dmult,
    Dmultu,
    Ddiv,
    Ddivu,
    Add,
    Addu,
    Sub,
    Subu,
    And,
    Or,
    Xor,
    Nor,
    Slt,
    Sltu,
    Dadd,
    Daddu,
    Dsub,
    Dsubu,
    Tge,
    Tgeu,
    Tlt,
    Tltu,
    Teq,
    Tne,
    Dsll,
    Dsrl,
    Dsra,
    Dsll32,
    Dsrl32,
    Dsra32,
}

impl RegisterOp {
    /// Assembler mnemonic.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Sll => "sll",
            Self::Srl => "srl",
            Self::Sra => "sra",
            Self::Sllv => "sllv",
            Self::Srlv => "srlv",
            Self::Srav => "srav",
            Self::Jr => "jr",
            Self::Jalr => "jalr",
            Self::Syscall => "syscall",
            Self::Break => "break",
            Self::Sync => "sync",
            Self::Mfhi => "mfhi",
            Self::Mthi => "mthi",
            Self::Mflo => "mflo",
            Self::Mtlo => "mtlo",
            Self::Dsllv => "dsllv",
            Self::Dsrlv => "dsrlv",
            Self::Dsrav => "dsrav",
            Self::Mult => "mult",
            Self::Multu => "multu",
            Self::Div => "div",
            Self::Divu => "divu",
            Self::Dmult => "dmult",
            Self::Dmultu => "dmultu",
            Self::Ddiv => "ddiv",
            Self::Ddivu => "ddivu",
            Self::Add => "add",
            Self::Addu => "addu",
            Self::Sub => "sub",
            Self::Subu => "subu",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::Nor => "nor",
            Self::Slt => "slt",
            Self::Sltu => "sltu",
            Self::Dadd => "dadd",
            Self::Daddu => "daddu",
            Self::Dsub => "dsub",
            Self::Dsubu => "dsubu",
            Self::Tge => "tge",
            Self::Tgeu => "tgeu",
            Self::Tlt => "tlt",
            Self::Tltu => "tltu",
            Self::Teq => "teq",
            Self::Tne => "tne",
            Self::Dsll => "dsll",
            Self::Dsrl => "dsrl",
            Self::Dsra => "dsra",
            Self::Dsll32 => "dsll32",
            Self::Dsrl32 => "dsrl32",
            Self::Dsra32 => "dsra32",
        }
    }

    /// True for operations that only exist in 64-bit mode.
    #[must_use]
    pub const fn is_doubleword(self) -> bool {
        matches!(
            self,
            Self::Dsllv
                | Self::Dsrlv
                | Self::Dsrav
                | Self::Dmult
                | Self::Dmultu
                | Self::Ddiv
                | Self::Ddivu
                | Self::Dadd
                | Self::Daddu
                | Self::Dsub
                | Self::Dsubu
                | Self::Dsll
                | Self::Dsrl
                | Self::Dsra
                | Self::Dsll32
                | Self::Dsrl32
                | Self::Dsra32
        )
    }
}

/// Immediate ALU operations (`addi` through `daddiu`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(missing_docs)]
pub enum ImmediateOp {
    Addi,
    Addiu,
    Slti,
    Sltiu,
    Andi,
    Ori,
    Xori,
    Lui,
    Daddi,
    Daddiu,
}

impl ImmediateOp {
    /// Assembler mnemonic.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Addi => "addi",
            Self::Addiu => "addiu",
            Self::Slti => "slti",
            Self::Sltiu => "sltiu",
            Self::Andi => "andi",
            Self::Ori => "ori",
            Self::Xori => "xori",
            Self::Lui => "lui",
            Self::Daddi => "daddi",
            Self::Daddiu => "daddiu",
        }
    }

    /// Bitwise forms zero-extend their immediate; all others sign-extend.
    #[must_use]
    pub const fn zero_extends_immediate(self) -> bool {
        matches!(self, Self::Andi | Self::Ori | Self::Xori)
    }
}

/// PC-relative compare-and-branch operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(missing_docs)]
pub enum BranchOp {
    Beq,
    Bne,
    Blez,
    Bgtz,
    Beql,
    Bnel,
    Blezl,
    Bgtzl,
}

impl BranchOp {
    /// Assembler mnemonic.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Beq => "beq",
            Self::Bne => "bne",
            Self::Blez => "blez",
            Self::Bgtz => "bgtz",
            Self::Beql => "beql",
            Self::Bnel => "bnel",
            Self::Blezl => "blezl",
            Self::Bgtzl => "bgtzl",
        }
    }

    /// Likely forms nullify the delay slot when not taken.
    #[must_use]
    pub const fn is_likely(self) -> bool {
        matches!(self, Self::Beql | Self::Bnel | Self::Blezl | Self::Bgtzl)
    }

    /// True when the encoding compares against `rt`.
    #[must_use]
    pub const fn compares_rt(self) -> bool {
        matches!(self, Self::Beq | Self::Bne | Self::Beql | Self::Bnel)
    }
}

/// REGIMM (`opcode == 1`) operations, selected by the `rt` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(missing_docs)]
pub enum RegImmOp {
    Bltz,
    Bgez,
    Bltzl,
    Bgezl,
    Tgei,
    Tgeiu,
    Tlti,
    Tltiu,
    Teqi,
    Tnei,
    Bltzal,
    Bgezal,
    Bltzall,
    Bgezall,
}

impl RegImmOp {
    /// Assembler mnemonic.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Bltz => "bltz",
            Self::Bgez => "bgez",
            Self::Bltzl => "bltzl",
            Self::Bgezl => "bgezl",
            Self::Tgei => "tgei",
            Self::Tgeiu => "tgeiu",
            Self::Tlti => "tlti",
            Self::Tltiu => "tltiu",
            Self::Teqi => "teqi",
            Self::Tnei => "tnei",
            Self::Bltzal => "bltzal",
            Self::Bgezal => "bgezal",
            Self::Bltzall => "bltzall",
            Self::Bgezall => "bgezall",
        }
    }

    /// True for the trap-immediate family.
    #[must_use]
    pub const fn is_trap(self) -> bool {
        matches!(
            self,
            Self::Tgei | Self::Tgeiu | Self::Tlti | Self::Tltiu | Self::Teqi | Self::Tnei
        )
    }
}

/// Absolute jumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(missing_docs)]
pub enum JumpOp {
    J,
    Jal,
}

impl JumpOp {
    /// Assembler mnemonic.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::J => "j",
            Self::Jal => "jal",
        }
    }
}

/// Base-plus-offset loads, stores and `cache`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(missing_docs)]
pub enum LoadStoreOp {
    Lb,
    Lh,
    Lwl,
    Lw,
    Lbu,
    Lhu,
    Lwr,
    Lwu,
    Sb,
    Sh,
    Swl,
    Sw,
    Sdl,
    Sdr,
    Swr,
    Cache,
    Ll,
    Lld,
    Ld,
    Ldl,
    Ldr,
    Sc,
    Scd,
    Sd,
    /// Load word to coprocessor.
    Lwc(Coprocessor),
    /// Load doubleword to coprocessor.
    Ldc(Coprocessor),
    /// Store word from coprocessor.
    Swc(Coprocessor),
    /// Store doubleword from coprocessor.
    Sdc(Coprocessor),
}

impl LoadStoreOp {
    /// Assembler mnemonic.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Lb => "lb",
            Self::Lh => "lh",
            Self::Lwl => "lwl",
            Self::Lw => "lw",
            Self::Lbu => "lbu",
            Self::Lhu => "lhu",
            Self::Lwr => "lwr",
            Self::Lwu => "lwu",
            Self::Sb => "sb",
            Self::Sh => "sh",
            Self::Swl => "swl",
            Self::Sw => "sw",
            Self::Sdl => "sdl",
            Self::Sdr => "sdr",
            Self::Swr => "swr",
            Self::Cache => "cache",
            Self::Ll => "ll",
            Self::Lld => "lld",
            Self::Ld => "ld",
            Self::Ldl => "ldl",
            Self::Ldr => "ldr",
            Self::Sc => "sc",
            Self::Scd => "scd",
            Self::Sd => "sd",
            Self::Lwc(Coprocessor::Cp0) => "lwc0",
            Self::Lwc(Coprocessor::Cp1) => "lwc1",
            Self::Lwc(Coprocessor::Cp2) => "lwc2",
            Self::Ldc(Coprocessor::Cp0) => "ldc0",
            Self::Ldc(Coprocessor::Cp1) => "ldc1",
            Self::Ldc(Coprocessor::Cp2) => "ldc2",
            Self::Swc(Coprocessor::Cp0) => "swc0",
            Self::Swc(Coprocessor::Cp1) => "swc1",
            Self::Swc(Coprocessor::Cp2) => "swc2",
            Self::Sdc(Coprocessor::Cp0) => "sdc0",
            Self::Sdc(Coprocessor::Cp1) => "sdc1",
            Self::Sdc(Coprocessor::Cp2) => "sdc2",
        }
    }

    /// True for operations that only exist in 64-bit mode.
    #[must_use]
    pub const fn is_doubleword(self) -> bool {
        matches!(
            self,
            Self::Lwu
                | Self::Sdl
                | Self::Sdr
                | Self::Lld
                | Self::Ld
                | Self::Ldl
                | Self::Ldr
                | Self::Scd
                | Self::Sd
        )
    }
}

/// Coprocessor register-move operations, selected by bits 25..21.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum CopMoveOp {
    /// Move word from coprocessor register.
    Mf,
    /// Move doubleword from coprocessor register.
    Dmf,
    /// Move from coprocessor control register.
    Cf,
    /// Move word to coprocessor register.
    Mt,
    /// Move doubleword to coprocessor register.
    Dmt,
    /// Move to coprocessor control register.
    Ct,
}

impl CopMoveOp {
    /// Mnemonic prefix; the coprocessor number is appended when rendered.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Mf => "mfc",
            Self::Dmf => "dmfc",
            Self::Cf => "cfc",
            Self::Mt => "mtc",
            Self::Dmt => "dmtc",
            Self::Ct => "ctc",
        }
    }

    /// True for the doubleword moves.
    #[must_use]
    pub const fn is_doubleword(self) -> bool {
        matches!(self, Self::Dmf | Self::Dmt)
    }
}

/// Coprocessor condition-branch flavour, selected by bits 20..16.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum CopCondition {
    /// Branch when the condition line is false.
    False,
    /// Branch when the condition line is true.
    True,
    /// Likely form of [`CopCondition::False`].
    FalseLikely,
    /// Likely form of [`CopCondition::True`].
    TrueLikely,
}

impl CopCondition {
    /// Condition line value that makes the branch taken.
    #[must_use]
    pub const fn branches_on(self) -> bool {
        matches!(self, Self::True | Self::TrueLikely)
    }

    /// Likely forms nullify the delay slot when not taken.
    #[must_use]
    pub const fn is_likely(self) -> bool {
        matches!(self, Self::FalseLikely | Self::TrueLikely)
    }

    /// Mnemonic suffix after `bcN`.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::False => "f",
            Self::True => "t",
            Self::FalseLikely => "fl",
            Self::TrueLikely => "tl",
        }
    }
}

/// CP0 TLB maintenance operations and `eret`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(missing_docs)]
pub enum TlbOp {
    Tlbr,
    Tlbwi,
    Tlbwr,
    Tlbp,
    Eret,
}

impl TlbOp {
    /// Assembler mnemonic.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Tlbr => "tlbr",
            Self::Tlbwi => "tlbwi",
            Self::Tlbwr => "tlbwr",
            Self::Tlbp => "tlbp",
            Self::Eret => "eret",
        }
    }
}

/// A fully decoded instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(missing_docs)]
pub enum Instruction {
    /// R-type SPECIAL encoding.
    Register {
        op: RegisterOp,
        rs: GeneralRegister,
        rt: GeneralRegister,
        rd: GeneralRegister,
        sa: u8,
        original: u32,
    },
    /// I-type ALU encoding.
    Immediate {
        op: ImmediateOp,
        rs: GeneralRegister,
        rt: GeneralRegister,
        immediate: u16,
        original: u32,
    },
    /// I-type compare-and-branch encoding.
    Branch {
        op: BranchOp,
        rs: GeneralRegister,
        rt: GeneralRegister,
        offset: u16,
        original: u32,
    },
    /// REGIMM sign-branch or trap-immediate encoding.
    RegImm {
        op: RegImmOp,
        rs: GeneralRegister,
        immediate: u16,
        original: u32,
    },
    /// J-type encoding.
    Jump {
        op: JumpOp,
        target: u32,
        original: u32,
    },
    /// Base-plus-offset memory encoding.
    LoadStore {
        op: LoadStoreOp,
        base: GeneralRegister,
        rt: GeneralRegister,
        offset: u16,
        original: u32,
    },
    /// Coprocessor register move.
    CopMove {
        op: CopMoveOp,
        cop: Coprocessor,
        rt: GeneralRegister,
        /// Coprocessor-side register (`rd` or `fs`).
        rd: u8,
        original: u32,
    },
    /// Branch on coprocessor condition.
    CopBranch {
        cop: Coprocessor,
        condition: CopCondition,
        offset: u16,
        original: u32,
    },
    /// CP0 TLB maintenance or `eret`.
    Tlb { op: TlbOp, original: u32 },
    /// Any bit pattern with no defined mnemonic.
    Reserved { original: u32 },
}

impl Instruction {
    /// Returns the raw word this instruction was decoded from.
    #[must_use]
    pub const fn original(&self) -> u32 {
        match *self {
            Self::Register { original, .. }
            | Self::Immediate { original, .. }
            | Self::Branch { original, .. }
            | Self::RegImm { original, .. }
            | Self::Jump { original, .. }
            | Self::LoadStore { original, .. }
            | Self::CopMove { original, .. }
            | Self::CopBranch { original, .. }
            | Self::Tlb { original, .. }
            | Self::Reserved { original } => original,
        }
    }

    /// True when decode found no defined mnemonic.
    #[must_use]
    pub const fn is_reserved(&self) -> bool {
        matches!(self, Self::Reserved { .. })
    }

    /// True for every instruction that owns a delay slot.
    #[must_use]
    pub const fn has_delay_slot(&self) -> bool {
        match self {
            Self::Register { op, .. } => matches!(op, RegisterOp::Jr | RegisterOp::Jalr),
            Self::RegImm { op, .. } => !op.is_trap(),
            Self::Branch { .. } | Self::Jump { .. } | Self::CopBranch { .. } => true,
            _ => false,
        }
    }

    /// Assembler mnemonic, or `reserved` for undefined encodings.
    #[must_use]
    pub fn mnemonic(&self) -> String {
        match self {
            Self::Register { op, .. } => op.mnemonic().to_owned(),
            Self::Immediate { op, .. } => op.mnemonic().to_owned(),
            Self::Branch { op, .. } => op.mnemonic().to_owned(),
            Self::RegImm { op, .. } => op.mnemonic().to_owned(),
            Self::Jump { op, .. } => op.mnemonic().to_owned(),
            Self::LoadStore { op, .. } => op.mnemonic().to_owned(),
            Self::CopMove { op, cop, .. } => format!("{}{}", op.prefix(), cop.number()),
            Self::CopBranch { cop, condition, .. } => {
                format!("bc{}{}", cop.number(), condition.suffix())
            }
            Self::Tlb { op, .. } => op.mnemonic().to_owned(),
            Self::Reserved { .. } => "reserved".to_owned(),
        }
    }
}
