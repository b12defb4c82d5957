//! Reversible-stepping journal.
//!
//! Each retired instruction opens one step frame holding a checkpoint of the
//! per-step special registers. Register-file writes inside the frame push
//! [`UndoEntry`] values. Stepping back pops the frame and replays its
//! entries in reverse. Stores to memory are not journaled, so stepping back
//! restores registers only.
//!
//! History is bounded: once `max_depth` frames are held, opening a new one
//! evicts the oldest. A depth of zero turns journaling off.

use std::collections::VecDeque;

use crate::instruction::GeneralRegister;

/// Step frames kept by a default journal.
pub const DEFAULT_UNDO_DEPTH: usize = 0x1_0000;

/// Register slot a journal entry restores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum RegisterSlot {
    /// General-purpose register.
    Gpr(GeneralRegister),
    /// Floating-point register index.
    Fpr(u8),
    /// CP0 register index.
    Cp0(u8),
}

/// One committed register write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct UndoEntry {
    /// Register that was overwritten.
    pub register: RegisterSlot,
    /// Value it held before the write.
    pub previous: u64,
}

/// Registers that are checkpointed whole at the start of every step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(missing_docs)]
pub struct SpecialRegisters {
    pub pc: u64,
    pub next_pc: u64,
    pub hi: u64,
    pub lo: u64,
    pub ll_bit: bool,
    pub fcr31: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
struct StepFrame {
    first_entry: usize,
    special: SpecialRegisters,
}

/// Bounded stack of step frames and their register entries.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct UndoLog {
    entries: VecDeque<UndoEntry>,
    frames: VecDeque<StepFrame>,
    max_depth: usize,
    // Entries evicted so far; frame `first_entry` indices are absolute.
    evicted: usize,
}

impl Default for UndoLog {
    fn default() -> Self {
        Self::with_max_depth(DEFAULT_UNDO_DEPTH)
    }
}

impl UndoLog {
    /// Creates an empty journal holding at most `max_depth` steps.
    #[must_use]
    pub const fn with_max_depth(max_depth: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            frames: VecDeque::new(),
            max_depth,
            evicted: 0,
        }
    }

    /// Maximum number of steps kept.
    #[must_use]
    pub const fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// True when writes are being journaled.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.max_depth > 0
    }

    /// Opens the frame for a step that is about to commit.
    pub fn begin_step(&mut self, special: SpecialRegisters) {
        if !self.is_enabled() {
            return;
        }
        while self.frames.len() >= self.max_depth {
            self.evict_oldest();
        }
        self.frames.push_back(StepFrame {
            first_entry: self.evicted + self.entries.len(),
            special,
        });
    }

    /// Pushes one entry into the current frame.
    pub fn record(&mut self, entry: UndoEntry) {
        if self.is_enabled() {
            self.entries.push_back(entry);
        }
    }

    /// Pops the most recent frame, returning its checkpoint and entries in
    /// the order they were recorded.
    pub fn pop_step(&mut self) -> Option<(SpecialRegisters, Vec<UndoEntry>)> {
        let frame = self.frames.pop_back()?;
        let entries = self.entries.split_off(frame.first_entry - self.evicted);
        Some((frame.special, entries.into()))
    }

    fn evict_oldest(&mut self) {
        if self.frames.pop_front().is_none() {
            return;
        }
        let keep_from = self
            .frames
            .front()
            .map_or(self.evicted + self.entries.len(), |frame| frame.first_entry);
        let count = keep_from - self.evicted;
        self.entries.drain(..count);
        self.evicted = keep_from;
    }

    /// All entries currently held, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &UndoEntry> + '_ {
        self.entries.iter()
    }

    /// Number of steps that can be undone.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// True when nothing can be undone.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Drops all history. The depth limit is kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.frames.clear();
        self.evicted = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::{RegisterSlot, SpecialRegisters, UndoEntry, UndoLog, DEFAULT_UNDO_DEPTH};
    use crate::instruction::GeneralRegister;

    fn entry(reg: u8, previous: u64) -> UndoEntry {
        UndoEntry {
            register: RegisterSlot::Gpr(GeneralRegister::from_u5(reg)),
            previous,
        }
    }

    #[test]
    fn frames_pop_in_lifo_order_with_their_own_entries() {
        let mut log = UndoLog::default();
        log.begin_step(SpecialRegisters {
            pc: 0x100,
            ..SpecialRegisters::default()
        });
        log.record(entry(1, 10));
        log.begin_step(SpecialRegisters {
            pc: 0x104,
            ..SpecialRegisters::default()
        });
        log.record(entry(2, 20));
        log.record(entry(3, 30));
        log.begin_step(SpecialRegisters {
            pc: 0x108,
            ..SpecialRegisters::default()
        });

        assert_eq!(log.depth(), 3);

        let (special, entries) = log.pop_step().expect("third frame");
        assert_eq!(special.pc, 0x108);
        assert!(entries.is_empty());

        let (special, entries) = log.pop_step().expect("second frame");
        assert_eq!(special.pc, 0x104);
        assert_eq!(entries, vec![entry(2, 20), entry(3, 30)]);

        let (special, entries) = log.pop_step().expect("first frame");
        assert_eq!(special.pc, 0x100);
        assert_eq!(entries, vec![entry(1, 10)]);

        assert!(log.pop_step().is_none());
        assert!(log.entries().next().is_none());
    }

    #[test]
    fn full_journal_evicts_the_oldest_frame() {
        let mut log = UndoLog::with_max_depth(2);
        for step in 0u8..5 {
            log.begin_step(SpecialRegisters {
                pc: u64::from(step) * 4,
                ..SpecialRegisters::default()
            });
            log.record(entry(step + 1, u64::from(step)));
            log.record(entry(step + 10, u64::from(step)));
        }

        assert_eq!(log.depth(), 2);
        assert_eq!(log.entries().count(), 4);

        let (special, entries) = log.pop_step().expect("newest frame");
        assert_eq!(special.pc, 16);
        assert_eq!(entries, vec![entry(5, 4), entry(14, 4)]);

        let (special, entries) = log.pop_step().expect("second newest frame");
        assert_eq!(special.pc, 12);
        assert_eq!(entries, vec![entry(4, 3), entry(13, 3)]);

        assert!(log.pop_step().is_none());
        assert!(log.entries().next().is_none());
    }

    #[test]
    fn eviction_survives_interleaved_step_back() {
        let mut log = UndoLog::with_max_depth(2);
        log.begin_step(SpecialRegisters::default());
        log.record(entry(1, 1));
        log.begin_step(SpecialRegisters::default());
        log.record(entry(2, 2));
        log.begin_step(SpecialRegisters::default());
        log.record(entry(3, 3));
        let (_, entries) = log.pop_step().expect("third frame");
        assert_eq!(entries, vec![entry(3, 3)]);

        log.begin_step(SpecialRegisters::default());
        log.begin_step(SpecialRegisters::default());
        log.record(entry(4, 4));
        assert_eq!(log.depth(), 2);
        let (_, entries) = log.pop_step().expect("newest frame");
        assert_eq!(entries, vec![entry(4, 4)]);
        let (_, entries) = log.pop_step().expect("empty frame");
        assert!(entries.is_empty());
    }

    #[test]
    fn zero_depth_disables_journaling() {
        let mut log = UndoLog::with_max_depth(0);
        assert!(!log.is_enabled());
        log.begin_step(SpecialRegisters::default());
        log.record(entry(1, 1));
        assert_eq!(log.depth(), 0);
        assert!(log.entries().next().is_none());
        assert!(log.pop_step().is_none());
    }

    #[test]
    fn clear_drops_all_history() {
        let mut log = UndoLog::default();
        log.begin_step(SpecialRegisters::default());
        log.record(entry(4, 1));
        log.clear();
        assert!(log.is_empty());
        assert!(log.entries().next().is_none());
        assert_eq!(log.max_depth(), DEFAULT_UNDO_DEPTH);
    }
}
