//! Decode and execution engine for the NEC VR4300 (MIPS III) CPU.

/// Exception taxonomy returned by the execution engine.
pub mod fault;
pub use fault::{AccessKind, Exception, ExceptionCode, TrapCause};

/// Bit-field extraction and opcode classification tables.
pub mod encoding;
pub use encoding::OpcodeClass;

/// Decoded instruction representation.
pub mod instruction;
pub use instruction::{
    BranchOp, CopCondition, CopMoveOp, Coprocessor, GeneralRegister, ImmediateOp, Instruction,
    JumpOp, LoadStoreOp, RegImmOp, RegisterOp, TlbOp, GENERAL_REGISTER_COUNT,
};

/// Total instruction decoder.
pub mod decoder;
pub use decoder::{decode, Decoder};

/// Instruction rendering for trace and debug views.
pub mod disasm;
pub use disasm::{disassemble, disassemble_window, format_instruction, DisassemblyRow};

/// Flat byte-addressable memory with explicit byte order.
pub mod memory;
pub use memory::{AccessWidth, Endianness, Memory, MemoryError, DEFAULT_MEMORY_BYTES};

/// Register file and step-back journal.
pub mod state;
pub use state::{
    BitMode, RegisterFile, RegisterSlot, SpecialRegisters, UndoEntry, UndoLog, DEFAULT_UNDO_DEPTH,
};

/// Two-phase instruction execution.
pub mod execute;
pub use execute::{commit_effect, execute, Control, Effect};

/// Host-facing configuration, loader hand-off and trace contracts.
pub mod api;
pub use api::{CoreConfig, ProgramImage, RunOutcome, TraceEvent, TraceSink};

/// Host-owned execution engine.
pub mod cpu;
pub use cpu::Cpu;

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
#[cfg(test)]
use serde_json as _;
