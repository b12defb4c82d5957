use core::fmt;

use thiserror::Error;

/// Kind of memory access that raised an address error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum AccessKind {
    /// Instruction fetch at `PC`.
    Fetch,
    /// Data load.
    Load,
    /// Data store.
    Store,
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Fetch => "fetch",
            Self::Load => "load",
            Self::Store => "store",
        };
        f.write_str(label)
    }
}

/// Source of a trap exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum TrapCause {
    /// A `t*`/`t*i` compare-and-trap condition held.
    Conditional,
    /// `syscall` with its 20-bit code field.
    Syscall {
        /// Bits 25..6 of the instruction word.
        code: u32,
    },
    /// `break` with its 20-bit code field.
    Breakpoint {
        /// Bits 25..6 of the instruction word.
        code: u32,
    },
}

impl fmt::Display for TrapCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conditional => f.write_str("conditional trap"),
            Self::Syscall { code } => write!(f, "syscall {code:#x}"),
            Self::Breakpoint { code } => write!(f, "break {code:#x}"),
        }
    }
}

/// Architectural `Cause.ExcCode` values for the exceptions this core raises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum ExceptionCode {
    /// `AdEL`: address error on load or instruction fetch.
    AddressErrorLoad = 4,
    /// `AdES`: address error on store.
    AddressErrorStore = 5,
    /// `Sys`: syscall.
    Syscall = 8,
    /// `Bp`: breakpoint.
    Breakpoint = 9,
    /// `RI`: reserved instruction.
    ReservedInstruction = 10,
    /// `Ov`: integer overflow.
    Overflow = 12,
    /// `Tr`: trap.
    Trap = 13,
}

impl ExceptionCode {
    /// Returns the 5-bit `ExcCode` value.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Converts an `ExcCode` value back into a code raised by this core.
    #[must_use]
    pub const fn from_u8(code: u8) -> Option<Self> {
        match code {
            4 => Some(Self::AddressErrorLoad),
            5 => Some(Self::AddressErrorStore),
            8 => Some(Self::Syscall),
            9 => Some(Self::Breakpoint),
            10 => Some(Self::ReservedInstruction),
            12 => Some(Self::Overflow),
            13 => Some(Self::Trap),
            _ => None,
        }
    }
}

/// Exceptions reported by the execution engine.
///
/// The core installs no handler vector. Every exception is returned to the
/// host with the architectural state left exactly as it was before the
/// faulting instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Exception {
    /// Two's-complement overflow from a checked add or subtract.
    #[error("integer overflow")]
    IntegerOverflow,
    /// Word decoded as reserved, or the operation is unavailable in the
    /// current bit mode or for the addressed coprocessor.
    #[error("reserved instruction {word:#010x}")]
    ReservedInstruction {
        /// Raw instruction word.
        word: u32,
    },
    /// Trap, syscall or breakpoint.
    #[error("{0}")]
    Trap(TrapCause),
    /// Unaligned or out-of-range memory access.
    #[error("address error on {access} at {address:#018x}")]
    AddressError {
        /// Virtual address of the access.
        address: u64,
        /// Access that faulted.
        access: AccessKind,
    },
}

impl Exception {
    /// Maps the exception to its `Cause.ExcCode`.
    #[must_use]
    pub const fn code(self) -> ExceptionCode {
        match self {
            Self::IntegerOverflow => ExceptionCode::Overflow,
            Self::ReservedInstruction { .. } => ExceptionCode::ReservedInstruction,
            Self::Trap(TrapCause::Conditional) => ExceptionCode::Trap,
            Self::Trap(TrapCause::Syscall { .. }) => ExceptionCode::Syscall,
            Self::Trap(TrapCause::Breakpoint { .. }) => ExceptionCode::Breakpoint,
            Self::AddressError {
                access: AccessKind::Store,
                ..
            } => ExceptionCode::AddressErrorStore,
            Self::AddressError { .. } => ExceptionCode::AddressErrorLoad,
        }
    }
}
