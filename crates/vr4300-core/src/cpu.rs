//! Host-owned execution engine.
//!
//! A [`Cpu`] owns the register file and the undo journal. Memory stays with
//! the host and is lent to every call, so one image can be inspected or
//! patched between steps.

use crate::api::{CoreConfig, ProgramImage, RunOutcome, TraceEvent, TraceSink};
use crate::disasm::format_instruction;
use crate::execute::{commit_effect, execute, fetch_and_decode, Effect};
use crate::fault::Exception;
use crate::memory::Memory;
use crate::state::{RegisterFile, UndoLog};

/// Sink used by untraced stepping.
struct DiscardTrace;

impl TraceSink for DiscardTrace {
    fn on_event(&mut self, _event: TraceEvent) {}
}

/// VR4300 execution engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cpu {
    registers: RegisterFile,
    undo: UndoLog,
    config: CoreConfig,
    entry_pc: u64,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new(CoreConfig::default(), 0)
    }
}

impl Cpu {
    /// Creates a core that starts executing at `entry_pc`.
    #[must_use]
    pub fn new(config: CoreConfig, entry_pc: u64) -> Self {
        let mut cpu = Self {
            registers: RegisterFile::new(config.bit_mode),
            undo: UndoLog::with_max_depth(config.undo_depth),
            config,
            entry_pc,
        };
        cpu.reset();
        cpu
    }

    /// Builds a core and its memory from a loader image.
    ///
    /// The image's byte order overrides `config.endianness`.
    #[must_use]
    pub fn from_image(image: ProgramImage, config: CoreConfig) -> (Self, Memory) {
        let (memory, entry_pc, endianness) = image.into_parts();
        let config = CoreConfig {
            endianness,
            ..config
        };
        (Self::new(config, entry_pc), memory)
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Address `reset` returns to.
    #[must_use]
    pub const fn entry_pc(&self) -> u64 {
        self.entry_pc
    }

    /// Architectural register state.
    #[must_use]
    pub const fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    /// Mutable register access for host setup. Writes made here bypass the
    /// undo journal.
    pub fn registers_mut(&mut self) -> &mut RegisterFile {
        &mut self.registers
    }

    /// Step-back journal.
    #[must_use]
    pub const fn undo_log(&self) -> &UndoLog {
        &self.undo
    }

    /// Returns registers to their power-on values and `PC` to the entry point.
    ///
    /// Memory is not touched and the undo journal is cleared.
    pub fn reset(&mut self) {
        self.registers = RegisterFile::new(self.config.bit_mode);
        let entry = self.registers.effective_address(self.entry_pc);
        self.registers.set_pc(entry);
        self.undo.clear();
        log::debug!("reset to entry {entry:#x}");
    }

    /// Executes one instruction.
    ///
    /// # Errors
    ///
    /// Returns the [`Exception`] the instruction raised. Registers, memory
    /// and the undo journal are unchanged in that case, with `PC` still
    /// addressing the faulting instruction.
    pub fn step(&mut self, memory: &mut Memory) -> Result<(), Exception> {
        self.step_traced(memory, &mut DiscardTrace)
    }

    /// Executes one instruction, reporting its progress to `sink`.
    ///
    /// # Errors
    ///
    /// Same as [`Cpu::step`]; the exception is also sent to `sink`.
    pub fn step_traced(
        &mut self,
        memory: &mut Memory,
        sink: &mut dyn TraceSink,
    ) -> Result<(), Exception> {
        let pc = self.registers.pc();
        let result = self.retire_one(memory, sink);
        if let Err(exception) = result {
            log::debug!("exception at {pc:#x}: {exception}");
            sink.on_event(TraceEvent::ExceptionRaised { exception, pc });
        }
        result
    }

    fn retire_one(
        &mut self,
        memory: &mut Memory,
        sink: &mut dyn TraceSink,
    ) -> Result<(), Exception> {
        let pc = self.registers.pc();
        let endianness = self.config.endianness;
        let instruction = fetch_and_decode(pc, memory, endianness)?;
        sink.on_event(TraceEvent::InstructionStart {
            pc,
            word: instruction.original(),
        });

        let effect = execute(&instruction, &self.registers, memory, endianness)?;
        commit_effect(
            &effect,
            &mut self.registers,
            memory,
            &mut self.undo,
            endianness,
        )?;

        for (access, is_write) in [(effect.load, false), (effect.store, true)] {
            if let Some(access) = access {
                sink.on_event(TraceEvent::MemoryAccess {
                    address: access.address,
                    width: access.width,
                    value: access.value,
                    is_write,
                });
            }
        }
        sink.on_event(TraceEvent::InstructionRetired {
            pc,
            next_pc: self.registers.pc(),
        });

        if self.config.tracing_enabled {
            log::trace!(
                "{pc:#010x}: {:08x}  {}",
                instruction.original(),
                format_instruction(&instruction)
            );
        }
        Ok(())
    }

    /// Undoes the most recent retired step.
    ///
    /// Returns `false` when there is nothing left to undo. Memory written by
    /// the undone step keeps its new contents.
    pub fn step_back(&mut self) -> bool {
        let Some((special, entries)) = self.undo.pop_step() else {
            return false;
        };
        self.registers.restore(special, &entries);
        log::debug!("stepped back to {:#x}", self.registers.pc());
        true
    }

    /// Steps until an exception is raised or `max_steps` instructions retire.
    pub fn run(&mut self, memory: &mut Memory, max_steps: u64) -> RunOutcome {
        let mut steps = 0;
        while steps < max_steps {
            if let Err(exception) = self.step(memory) {
                return RunOutcome {
                    steps,
                    stopped: Some(exception),
                };
            }
            steps += 1;
        }
        RunOutcome {
            steps,
            stopped: None,
        }
    }

    /// Moves past the instruction that last raised, as if it had retired
    /// with no effect.
    ///
    /// A faulting delay-slot instruction still transfers control to its
    /// branch target. The skip is journaled like a normal step.
    ///
    /// # Errors
    ///
    /// None in practice: an empty effect performs no store.
    pub fn skip_faulting_instruction(&mut self, memory: &mut Memory) -> Result<(), Exception> {
        commit_effect(
            &Effect::default(),
            &mut self.registers,
            memory,
            &mut self.undo,
            self.config.endianness,
        )?;
        log::debug!("skipped to {:#x}", self.registers.pc());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Cpu;
    use crate::api::{CoreConfig, ProgramImage, TraceEvent};
    use crate::fault::{AccessKind, Exception, TrapCause};
    use crate::instruction::GeneralRegister;
    use crate::memory::{AccessWidth, Endianness, Memory};
    use crate::state::BitMode;

    fn r(index: u8) -> GeneralRegister {
        GeneralRegister::from_u5(index)
    }

    fn load(words: &[u32]) -> (Cpu, Memory) {
        load_with(words, CoreConfig::default())
    }

    fn load_with(words: &[u32], config: CoreConfig) -> (Cpu, Memory) {
        let mut bytes = vec![0; 0x100];
        for (slot, word) in bytes.chunks_exact_mut(4).zip(words) {
            slot.copy_from_slice(&word.to_be_bytes());
        }
        Cpu::from_image(ProgramImage::new(bytes, 0, false), config)
    }

    // addiu r8, r8, 1; j 0; nop
    const COUNTING_LOOP: [u32; 3] = [0x2508_0001, 0x0800_0000, 0x0000_0000];

    #[test]
    fn step_retires_and_advances() {
        // addiu r8, r0, 5; addiu r9, r8, 1
        let (mut cpu, mut memory) = load(&[0x2408_0005, 0x2509_0001]);
        cpu.step(&mut memory).expect("addiu");
        cpu.step(&mut memory).expect("addiu");
        assert_eq!(cpu.registers().gpr(r(8)), 5);
        assert_eq!(cpu.registers().gpr(r(9)), 6);
        assert_eq!(cpu.registers().pc(), 8);
        assert_eq!(cpu.undo_log().depth(), 2);
    }

    #[test]
    fn exception_leaves_state_untouched() {
        // lui r1, 0x7fff; ori r1, r1, 0xffff; add r2, r1, r1
        let (mut cpu, mut memory) = load(&[0x3C01_7FFF, 0x3421_FFFF, 0x0021_1020]);
        cpu.run(&mut memory, 2);
        let before = cpu.clone();
        assert_eq!(cpu.step(&mut memory), Err(Exception::IntegerOverflow));
        assert_eq!(cpu, before);
        assert_eq!(cpu.registers().pc(), 8);
    }

    #[test]
    fn traced_step_reports_access_and_retirement() {
        // sw r0, 0x40(r0)
        let (mut cpu, mut memory) = load(&[0xAC00_0040]);
        let mut events: Vec<TraceEvent> = Vec::new();
        cpu.step_traced(&mut memory, &mut events).expect("store");
        assert_eq!(
            events,
            vec![
                TraceEvent::InstructionStart {
                    pc: 0,
                    word: 0xAC00_0040,
                },
                TraceEvent::MemoryAccess {
                    address: 0x40,
                    width: AccessWidth::Word,
                    value: 0,
                    is_write: true,
                },
                TraceEvent::InstructionRetired { pc: 0, next_pc: 4 },
            ]
        );
    }

    #[test]
    fn traced_step_reports_exceptions() {
        // syscall
        let (mut cpu, mut memory) = load(&[0x0000_000C]);
        let mut events: Vec<TraceEvent> = Vec::new();
        let result = cpu.step_traced(&mut memory, &mut events);
        let exception = Exception::Trap(TrapCause::Syscall { code: 0 });
        assert_eq!(result, Err(exception));
        assert_eq!(
            events.last(),
            Some(&TraceEvent::ExceptionRaised { exception, pc: 0 })
        );
    }

    #[test]
    fn run_stops_at_first_exception_or_budget() {
        // addiu r8, r8, 1 (x2); break
        let (mut cpu, mut memory) = load(&[0x2508_0001, 0x2508_0001, 0x0000_000D]);
        let outcome = cpu.run(&mut memory, 1);
        assert_eq!(outcome.steps, 1);
        assert_eq!(outcome.stopped, None);

        let outcome = cpu.run(&mut memory, 10);
        assert_eq!(outcome.steps, 1);
        assert_eq!(
            outcome.stopped,
            Some(Exception::Trap(TrapCause::Breakpoint { code: 0 }))
        );
    }

    #[test]
    fn skip_resumes_after_host_serviced_syscall() {
        // syscall; addiu r2, r0, 7
        let (mut cpu, mut memory) = load(&[0x0000_000C, 0x2402_0007]);
        assert!(cpu.step(&mut memory).is_err());
        cpu.skip_faulting_instruction(&mut memory).expect("no store");
        cpu.step(&mut memory).expect("addiu");
        assert_eq!(cpu.registers().gpr(r(2)), 7);
    }

    #[test]
    fn skip_inside_delay_slot_still_branches() {
        // j 0x10; syscall (delay slot)
        let (mut cpu, mut memory) = load(&[0x0800_0004, 0x0000_000C]);
        cpu.step(&mut memory).expect("jump");
        assert!(cpu.step(&mut memory).is_err());
        cpu.skip_faulting_instruction(&mut memory).expect("no store");
        assert_eq!(cpu.registers().pc(), 0x10);
    }

    #[test]
    fn step_back_and_reset() {
        // addiu r8, r0, 1; addiu r8, r8, 1
        let (mut cpu, mut memory) = load(&[0x2408_0001, 0x2508_0001]);
        cpu.run(&mut memory, 2);
        assert_eq!(cpu.registers().gpr(r(8)), 2);
        assert!(cpu.step_back());
        assert_eq!(cpu.registers().gpr(r(8)), 1);
        assert_eq!(cpu.registers().pc(), 4);
        assert!(cpu.step_back());
        assert!(!cpu.step_back());

        cpu.run(&mut memory, 2);
        cpu.reset();
        assert_eq!(cpu.registers().gpr(r(8)), 0);
        assert_eq!(cpu.registers().pc(), 0);
        assert!(cpu.undo_log().is_empty());
    }

    #[test]
    fn long_run_keeps_only_the_newest_steps() {
        let config = CoreConfig {
            undo_depth: 4,
            ..CoreConfig::default()
        };
        let (mut cpu, mut memory) = load_with(&COUNTING_LOOP, config);
        let outcome = cpu.run(&mut memory, 30);
        assert_eq!(outcome.steps, 30);
        assert_eq!(cpu.undo_log().depth(), 4);
        assert_eq!(cpu.registers().gpr(r(8)), 10);

        let (mut shorter, mut shorter_memory) = load_with(&COUNTING_LOOP, config);
        shorter.run(&mut shorter_memory, 26);
        for _ in 0..4 {
            assert!(cpu.step_back());
        }
        assert!(!cpu.step_back());
        assert_eq!(cpu.registers(), shorter.registers());
    }

    #[test]
    fn zero_undo_depth_disables_step_back() {
        let config = CoreConfig {
            undo_depth: 0,
            ..CoreConfig::default()
        };
        let (mut cpu, mut memory) = load_with(&COUNTING_LOOP, config);
        cpu.run(&mut memory, 9);
        assert_eq!(cpu.registers().gpr(r(8)), 3);
        assert!(cpu.undo_log().is_empty());
        assert!(!cpu.step_back());

        cpu.reset();
        assert_eq!(cpu.undo_log().max_depth(), 0);
    }

    #[test]
    fn fetch_outside_image_is_reported() {
        let mut cpu = Cpu::new(CoreConfig::default(), 0x1000);
        let mut memory = Memory::new(0x10);
        assert_eq!(
            cpu.step(&mut memory),
            Err(Exception::AddressError {
                address: 0x1000,
                access: AccessKind::Fetch,
            })
        );
    }

    #[test]
    fn entry_point_is_truncated_in_32_bit_mode() {
        let cpu = Cpu::new(CoreConfig::default(), 0xFFFF_FFFF_8000_0000);
        assert_eq!(cpu.registers().pc(), 0x8000_0000);

        let config = CoreConfig {
            bit_mode: BitMode::Bit64,
            endianness: Endianness::Little,
            tracing_enabled: true,
            ..CoreConfig::default()
        };
        let cpu = Cpu::new(config, 0xFFFF_FFFF_8000_0000);
        assert_eq!(cpu.registers().pc(), 0xFFFF_FFFF_8000_0000);
    }
}
