//! Host-facing contracts for embedding the core: configuration, the loader
//! hand-off, batched-run results and trace hooks.

use crate::fault::Exception;
use crate::memory::{AccessWidth, Endianness, Memory};
use crate::state::{BitMode, DEFAULT_UNDO_DEPTH};

/// Top-level configuration for a core instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CoreConfig {
    /// Register width and availability of doubleword operations.
    pub bit_mode: BitMode,
    /// Byte order of every fetch, load and store.
    pub endianness: Endianness,
    /// Emits a `log::trace!` line per retired instruction.
    pub tracing_enabled: bool,
    /// Steps kept for `step_back`; the oldest are dropped past this.
    /// Zero turns journaling off.
    pub undo_depth: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            bit_mode: BitMode::Bit32,
            endianness: Endianness::Big,
            tracing_enabled: false,
            undo_depth: DEFAULT_UNDO_DEPTH,
        }
    }
}

/// Memory image produced by an external program loader.
///
/// `memory[0]` lives at virtual address `origin`; every byte not covered by
/// a loaded segment is expected to be zero.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ProgramImage {
    /// Flat byte image.
    pub memory: Vec<u8>,
    /// Virtual address of the first byte.
    pub origin: u64,
    /// Address of the first instruction to execute.
    pub entry_pc: u64,
    /// Byte order taken from the program header.
    pub little_endian: bool,
}

impl ProgramImage {
    /// Creates an image mapped at address zero.
    #[must_use]
    pub const fn new(memory: Vec<u8>, entry_pc: u64, little_endian: bool) -> Self {
        Self {
            memory,
            origin: 0,
            entry_pc,
            little_endian,
        }
    }

    /// Relocates the image so its first byte sits at `origin`.
    #[must_use]
    pub fn with_origin(mut self, origin: u64) -> Self {
        self.origin = origin;
        self
    }

    /// Byte order implied by the loader flag.
    #[must_use]
    pub const fn endianness(&self) -> Endianness {
        Endianness::from_little_endian_flag(self.little_endian)
    }

    /// Splits the image into backing memory, entry point and byte order.
    #[must_use]
    pub fn into_parts(self) -> (Memory, u64, Endianness) {
        let endianness = self.endianness();
        let memory = Memory::from_bytes(self.memory).with_origin(self.origin);
        (memory, self.entry_pc, endianness)
    }
}

/// Aggregated result of [`crate::Cpu::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunOutcome {
    /// Instructions retired during this call.
    pub steps: u64,
    /// Exception that ended the run; `None` when the step budget ran out.
    pub stopped: Option<Exception>,
}

/// Trace events emitted by [`crate::Cpu::step_traced`], in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceEvent {
    /// Instruction fetched and decoded.
    InstructionStart {
        /// Address of the instruction.
        pc: u64,
        /// Raw instruction word.
        word: u32,
    },
    /// Data access performed by the instruction.
    MemoryAccess {
        /// Aligned address of the access.
        address: u64,
        /// Access width.
        width: AccessWidth,
        /// Value read or written.
        value: u64,
        /// True for stores.
        is_write: bool,
    },
    /// Instruction committed.
    InstructionRetired {
        /// Address of the retired instruction.
        pc: u64,
        /// `PC` after commit.
        next_pc: u64,
    },
    /// Instruction raised instead of retiring.
    ExceptionRaised {
        /// Exception returned to the host.
        exception: Exception,
        /// Address of the faulting instruction.
        pc: u64,
    },
}

/// Receiver for [`TraceEvent`]s.
pub trait TraceSink {
    /// Records one event.
    fn on_event(&mut self, event: TraceEvent);
}

impl TraceSink for Vec<TraceEvent> {
    fn on_event(&mut self, event: TraceEvent) {
        self.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::{CoreConfig, ProgramImage, TraceEvent, TraceSink};
    use crate::memory::{AccessWidth, Endianness};
    use crate::state::{BitMode, DEFAULT_UNDO_DEPTH};

    #[test]
    fn default_config_is_32_bit_big_endian_untraced() {
        let config = CoreConfig::default();
        assert_eq!(config.bit_mode, BitMode::Bit32);
        assert_eq!(config.endianness, Endianness::Big);
        assert!(!config.tracing_enabled);
        assert_eq!(config.undo_depth, DEFAULT_UNDO_DEPTH);
    }

    #[test]
    fn image_parts_carry_origin_and_byte_order() {
        let image = ProgramImage::new(vec![0x11, 0x22, 0x33, 0x44], 0x8000_0000, true)
            .with_origin(0x8000_0000);
        assert_eq!(image.endianness(), Endianness::Little);

        let (memory, entry_pc, endianness) = image.into_parts();
        assert_eq!(entry_pc, 0x8000_0000);
        assert_eq!(memory.origin(), 0x8000_0000);
        assert_eq!(
            memory.read(0x8000_0000, AccessWidth::Word, endianness),
            Ok(0x4433_2211)
        );
        assert!(memory.read(0, AccessWidth::Byte, endianness).is_err());
    }

    #[test]
    fn vec_sink_records_in_order() {
        let mut sink: Vec<TraceEvent> = Vec::new();
        sink.on_event(TraceEvent::InstructionStart { pc: 0, word: 0 });
        sink.on_event(TraceEvent::InstructionRetired { pc: 0, next_pc: 4 });
        assert_eq!(sink.len(), 2);
        assert!(matches!(sink[0], TraceEvent::InstructionStart { .. }));
    }
}
