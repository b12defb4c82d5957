//! Bit-field extraction and opcode dispatch tables.
//!
//! Every table here is the single source of truth for its dispatch level.
//! Any key not present in a table is reserved by definition.

use crate::instruction::{
    BranchOp, CopMoveOp, Coprocessor, ImmediateOp, JumpOp, LoadStoreOp, RegImmOp, RegisterOp,
    TlbOp,
};

/// Primary opcode groups (bits 31..26).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpcodeClass {
    /// `0x00`: R-type, dispatched on the function field.
    Special,
    /// `0x01`: dispatched on the `rt` field.
    RegImm,
    /// `0x02..=0x03`: `j`/`jal`.
    Jump,
    /// `0x04..=0x07`, `0x14..=0x17`: compare-and-branch.
    Branch,
    /// `0x08..=0x0F`, `0x18..=0x19`: immediate ALU.
    Immediate,
    /// `0x10..=0x12`: coprocessor space.
    Coprocessor(Coprocessor),
    /// Base-plus-offset memory operations.
    LoadStore,
    /// No assignment on this core.
    Reserved,
}

impl OpcodeClass {
    /// Classifies a 6-bit primary opcode.
    #[must_use]
    pub fn from_u6(op: u8) -> Self {
        match op {
            0x00 => Self::Special,
            0x01 => Self::RegImm,
            0x02 | 0x03 => Self::Jump,
            0x04..=0x07 | 0x14..=0x17 => Self::Branch,
            0x08..=0x0F | 0x18 | 0x19 => Self::Immediate,
            0x10..=0x12 => Coprocessor::from_u2(op).map_or(Self::Reserved, Self::Coprocessor),
            _ if classify_load_store(op).is_some() => Self::LoadStore,
            _ => Self::Reserved,
        }
    }
}

/// Primary opcode, bits 31..26.
#[must_use]
pub const fn opcode(word: u32) -> u8 {
    (word >> 26) as u8
}

/// `rs`/`base`/coprocessor format field, bits 25..21.
#[must_use]
pub const fn rs(word: u32) -> u8 {
    ((word >> 21) & 0x1F) as u8
}

/// `rt` field, bits 20..16.
#[must_use]
pub const fn rt(word: u32) -> u8 {
    ((word >> 16) & 0x1F) as u8
}

/// `rd`/`fs` field, bits 15..11.
#[must_use]
pub const fn rd(word: u32) -> u8 {
    ((word >> 11) & 0x1F) as u8
}

/// Shift amount, bits 10..6.
#[must_use]
pub const fn sa(word: u32) -> u8 {
    ((word >> 6) & 0x1F) as u8
}

/// Function field, bits 5..0.
#[must_use]
pub const fn funct(word: u32) -> u8 {
    (word & 0x3F) as u8
}

/// 16-bit immediate or offset, bits 15..0.
#[must_use]
pub const fn imm16(word: u32) -> u16 {
    (word & 0xFFFF) as u16
}

/// 26-bit jump target, bits 25..0.
#[must_use]
pub const fn target26(word: u32) -> u32 {
    word & 0x03FF_FFFF
}

/// `syscall`/`break` code field, bits 25..6.
#[must_use]
pub const fn long_code(word: u32) -> u32 {
    (word >> 6) & 0x000F_FFFF
}

/// Register-compare trap code field, bits 15..6.
#[must_use]
pub const fn trap_code(word: u32) -> u32 {
    (word >> 6) & 0x03FF
}

/// True when bit 25 selects the CP0 function space (`CO` bit).
#[must_use]
pub const fn is_cop_function(word: u32) -> bool {
    word & (1 << 25) != 0
}

/// SPECIAL function-field table.
pub const SPECIAL_TABLE: &[(u8, RegisterOp)] = &[
    (0x00, RegisterOp::Sll),
    (0x02, RegisterOp::Srl),
    (0x03, RegisterOp::Sra),
    (0x04, RegisterOp::Sllv),
    (0x06, RegisterOp::Srlv),
    (0x07, RegisterOp::Srav),
    (0x08, RegisterOp::Jr),
    (0x09, RegisterOp::Jalr),
    (0x0C, RegisterOp::Syscall),
    (0x0D, RegisterOp::Break),
    (0x0F, RegisterOp::Sync),
    (0x10, RegisterOp::Mfhi),
    (0x11, RegisterOp::Mthi),
    (0x12, RegisterOp::Mflo),
    (0x13, RegisterOp::Mtlo),
    (0x14, RegisterOp::Dsllv),
    (0x16, RegisterOp::Dsrlv),
    (0x17, RegisterOp::Dsrav),
    (0x18, RegisterOp::Mult),
    (0x19, RegisterOp::Multu),
    (0x1A, RegisterOp::Div),
    (0x1B, RegisterOp::Divu),
    (0x1C, RegisterOp::Dmult),
    (0x1D, RegisterOp::Dmultu),
    (0x1E, RegisterOp::Ddiv),
    (0x1F, RegisterOp::Ddivu),
    (0x20, RegisterOp::Add),
    (0x21, RegisterOp::Addu),
    (0x22, RegisterOp::Sub),
    (0x23, RegisterOp::Subu),
    (0x24, RegisterOp::And),
    (0x25, RegisterOp::Or),
    (0x26, RegisterOp::Xor),
    (0x27, RegisterOp::Nor),
    (0x2A, RegisterOp::Slt),
    (0x2B, RegisterOp::Sltu),
    (0x2C, RegisterOp::Dadd),
    (0x2D, RegisterOp::Daddu),
    (0x2E, RegisterOp::Dsub),
    (0x2F, RegisterOp::Dsubu),
    (0x30, RegisterOp::Tge),
    (0x31, RegisterOp::Tgeu),
    (0x32, RegisterOp::Tlt),
    (0x33, RegisterOp::Tltu),
    (0x34, RegisterOp::Teq),
    (0x36, RegisterOp::Tne),
    (0x38, RegisterOp::Dsll),
    (0x3A, RegisterOp::Dsrl),
    (0x3B, RegisterOp::Dsra),
    (0x3C, RegisterOp::Dsll32),
    (0x3E, RegisterOp::Dsrl32),
    (0x3F, RegisterOp::Dsra32),
];

/// REGIMM `rt`-field table.
pub const REGIMM_TABLE: &[(u8, RegImmOp)] = &[
    (0x00, RegImmOp::Bltz),
    (0x01, RegImmOp::Bgez),
    (0x02, RegImmOp::Bltzl),
    (0x03, RegImmOp::Bgezl),
    (0x08, RegImmOp::Tgei),
    (0x09, RegImmOp::Tgeiu),
    (0x0A, RegImmOp::Tlti),
    (0x0B, RegImmOp::Tltiu),
    (0x0C, RegImmOp::Teqi),
    (0x0E, RegImmOp::Tnei),
    (0x10, RegImmOp::Bltzal),
    (0x11, RegImmOp::Bgezal),
    (0x12, RegImmOp::Bltzall),
    (0x13, RegImmOp::Bgezall),
];

/// Primary-opcode table for `j`/`jal`.
pub const JUMP_TABLE: &[(u8, JumpOp)] = &[(0x02, JumpOp::J), (0x03, JumpOp::Jal)];

/// Primary-opcode table for compare-and-branch.
pub const BRANCH_TABLE: &[(u8, BranchOp)] = &[
    (0x04, BranchOp::Beq),
    (0x05, BranchOp::Bne),
    (0x06, BranchOp::Blez),
    (0x07, BranchOp::Bgtz),
    (0x14, BranchOp::Beql),
    (0x15, BranchOp::Bnel),
    (0x16, BranchOp::Blezl),
    (0x17, BranchOp::Bgtzl),
];

/// Primary-opcode table for immediate ALU operations.
pub const IMMEDIATE_TABLE: &[(u8, ImmediateOp)] = &[
    (0x08, ImmediateOp::Addi),
    (0x09, ImmediateOp::Addiu),
    (0x0A, ImmediateOp::Slti),
    (0x0B, ImmediateOp::Sltiu),
    (0x0C, ImmediateOp::Andi),
    (0x0D, ImmediateOp::Ori),
    (0x0E, ImmediateOp::Xori),
    (0x0F, ImmediateOp::Lui),
    (0x18, ImmediateOp::Daddi),
    (0x19, ImmediateOp::Daddiu),
];

/// Primary-opcode table for memory operations.
///
/// `LWCz`/`LDCz`/`SWCz`/`SDCz` carry the coprocessor number in the low two
/// opcode bits. `z == 0` slots are `ll`/`lld`/`sc`/`scd` in MIPS III.
pub const LOAD_STORE_TABLE: &[(u8, LoadStoreOp)] = &[
    (0x1A, LoadStoreOp::Ldl),
    (0x1B, LoadStoreOp::Ldr),
    (0x20, LoadStoreOp::Lb),
    (0x21, LoadStoreOp::Lh),
    (0x22, LoadStoreOp::Lwl),
    (0x23, LoadStoreOp::Lw),
    (0x24, LoadStoreOp::Lbu),
    (0x25, LoadStoreOp::Lhu),
    (0x26, LoadStoreOp::Lwr),
    (0x27, LoadStoreOp::Lwu),
    (0x28, LoadStoreOp::Sb),
    (0x29, LoadStoreOp::Sh),
    (0x2A, LoadStoreOp::Swl),
    (0x2B, LoadStoreOp::Sw),
    (0x2C, LoadStoreOp::Sdl),
    (0x2D, LoadStoreOp::Sdr),
    (0x2E, LoadStoreOp::Swr),
    (0x2F, LoadStoreOp::Cache),
    (0x30, LoadStoreOp::Ll),
    (0x31, LoadStoreOp::Lwc(Coprocessor::Cp1)),
    (0x32, LoadStoreOp::Lwc(Coprocessor::Cp2)),
    (0x34, LoadStoreOp::Lld),
    (0x35, LoadStoreOp::Ldc(Coprocessor::Cp1)),
    (0x36, LoadStoreOp::Ldc(Coprocessor::Cp2)),
    (0x37, LoadStoreOp::Ld),
    (0x38, LoadStoreOp::Sc),
    (0x39, LoadStoreOp::Swc(Coprocessor::Cp1)),
    (0x3A, LoadStoreOp::Swc(Coprocessor::Cp2)),
    (0x3C, LoadStoreOp::Scd),
    (0x3D, LoadStoreOp::Sdc(Coprocessor::Cp1)),
    (0x3E, LoadStoreOp::Sdc(Coprocessor::Cp2)),
    (0x3F, LoadStoreOp::Sd),
];

/// Coprocessor format-field (bits 25..21) table for register moves.
pub const COP_MOVE_TABLE: &[(u8, CopMoveOp)] = &[
    (0x00, CopMoveOp::Mf),
    (0x01, CopMoveOp::Dmf),
    (0x02, CopMoveOp::Cf),
    (0x04, CopMoveOp::Mt),
    (0x05, CopMoveOp::Dmt),
    (0x06, CopMoveOp::Ct),
];

/// Coprocessor format-field value selecting the branch-on-condition space.
pub const COP_BRANCH_FORMAT: u8 = 0x08;

/// CP0 function-field table, valid only with bit 25 set.
pub const TLB_TABLE: &[(u8, TlbOp)] = &[
    (0x01, TlbOp::Tlbr),
    (0x02, TlbOp::Tlbwi),
    (0x06, TlbOp::Tlbwr),
    (0x08, TlbOp::Tlbp),
    (0x18, TlbOp::Eret),
];

fn lookup<T: Copy>(table: &[(u8, T)], key: u8) -> Option<T> {
    table
        .iter()
        .find_map(|(entry_key, value)| (*entry_key == key).then_some(*value))
}

/// Resolves a SPECIAL function field.
#[must_use]
pub fn classify_special(funct: u8) -> Option<RegisterOp> {
    lookup(SPECIAL_TABLE, funct)
}

/// Resolves a REGIMM `rt` field.
#[must_use]
pub fn classify_regimm(rt: u8) -> Option<RegImmOp> {
    lookup(REGIMM_TABLE, rt)
}

/// Resolves a jump primary opcode.
#[must_use]
pub fn classify_jump(op: u8) -> Option<JumpOp> {
    lookup(JUMP_TABLE, op)
}

/// Resolves a compare-and-branch primary opcode.
#[must_use]
pub fn classify_branch(op: u8) -> Option<BranchOp> {
    lookup(BRANCH_TABLE, op)
}

/// Resolves an immediate-ALU primary opcode.
#[must_use]
pub fn classify_immediate(op: u8) -> Option<ImmediateOp> {
    lookup(IMMEDIATE_TABLE, op)
}

/// Resolves a memory-operation primary opcode.
#[must_use]
pub fn classify_load_store(op: u8) -> Option<LoadStoreOp> {
    lookup(LOAD_STORE_TABLE, op)
}

/// Resolves a coprocessor move, honoring which units implement each move.
///
/// `dmf`/`dmt` exist only on CP0 and CP1; `cf`/`ct` only on CP1 and CP2.
#[must_use]
pub fn classify_cop_move(cop: Coprocessor, format: u8) -> Option<CopMoveOp> {
    let op = lookup(COP_MOVE_TABLE, format)?;
    let implemented = match op {
        CopMoveOp::Mf | CopMoveOp::Mt => true,
        CopMoveOp::Dmf | CopMoveOp::Dmt => matches!(cop, Coprocessor::Cp0 | Coprocessor::Cp1),
        CopMoveOp::Cf | CopMoveOp::Ct => matches!(cop, Coprocessor::Cp1 | Coprocessor::Cp2),
    };
    implemented.then_some(op)
}

/// Resolves a CP0 function field.
#[must_use]
pub fn classify_tlb(funct: u8) -> Option<TlbOp> {
    lookup(TLB_TABLE, funct)
}
