//! Architectural register state and its undo journal.

/// Register file storage and accessors.
pub mod registers;
/// Step-back journal.
pub mod undo;

pub use registers::{
    BitMode, RegisterFile, CP0_REGISTER_COUNT, FCR0_VR4300, FCR31_CONDITION, FLOAT_REGISTER_COUNT,
};
pub use undo::{RegisterSlot, SpecialRegisters, UndoEntry, UndoLog, DEFAULT_UNDO_DEPTH};
