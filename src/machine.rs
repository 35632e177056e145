use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, trace};

use crate::config::{EofPolicy, MachineConfig};
use crate::error::{Error, RuntimeError};
use crate::instruction::{Dialect, Instruction};
use crate::io::CharIo;
use crate::jump_table::JumpTable;
use crate::program::Program;
use crate::tape::Tape;

/// Controls for cooperative cancellation and step limiting.
#[derive(Clone, Default)]
pub struct StepControl {
    pub max_steps: Option<u64>,
    pub cancel_flag: Arc<AtomicBool>,
}

impl StepControl {
    pub fn new(max_steps: Option<u64>, cancel_flag: Arc<AtomicBool>) -> Self {
        Self { max_steps, cancel_flag }
    }

    pub fn with_max_steps(max_steps: u64) -> Self {
        Self { max_steps: Some(max_steps), ..Self::default() }
    }

    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    fn check(&self, steps: u64) -> Result<(), RuntimeError> {
        if self.cancel_flag.load(Ordering::Relaxed) {
            return Err(RuntimeError::Canceled);
        }
        match self.max_steps {
            Some(limit) if steps >= limit => Err(RuntimeError::StepLimitExceeded { limit }),
            _ => Ok(()),
        }
    }
}

/// Result of a single [`Machine::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// An instruction ran; more may follow.
    Continue,
    /// The instruction pointer is past the end of the program.
    Halted,
}

/// Dump of the start of the tape produced by `#`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub ip: usize,
    pub dp: usize,
    pub cells: Vec<u32>,
}

impl Snapshot {
    /// Human-readable dump: the cells between bars with a caret under the
    /// data pointer when it falls inside the window.
    pub fn render(&self) -> String {
        let width = self.cells.iter().map(|c| c.to_string().len()).max().unwrap_or(1);
        let mut out = format!("\n\nDEBUG INFO: pointer at {} (instruction {})\n|", self.dp, self.ip);
        for cell in &self.cells {
            let _ = write!(out, "{cell:>width$}|");
        }
        out.push_str("\n ");
        for index in 0..self.cells.len() {
            let mark = if index == self.dp { "^" } else { " " };
            let _ = write!(out, "{mark:>width$} ");
        }
        out.push('\n');
        out
    }
}

/// The tape machine: a validated program, its jump table, the tape and the
/// two pointers.
///
/// Construction rejects malformed programs, so a `Machine` only ever fails
/// at run time because of the pointer or end-of-input policies, the I/O
/// capability, or the caller's [`StepControl`].
#[derive(Debug, Clone)]
pub struct Machine {
    program: Program,
    jumps: JumpTable,
    tape: Tape,
    config: MachineConfig,
    ip: usize,
    dp: usize,
    steps: u64,
}

impl Machine {
    pub fn new(program: Program, config: MachineConfig) -> Result<Self, Error> {
        config.validate()?;
        let jumps = JumpTable::build(&program)?;
        debug!(
            instructions = program.len(),
            loops = jumps.len(),
            tape_length = config.tape_length,
            "machine ready"
        );
        Ok(Self {
            tape: Tape::new(config.tape_length, config.cell_bits),
            dp: config.initial_pointer,
            ip: 0,
            steps: 0,
            program,
            jumps,
            config,
        })
    }

    /// Filter `source` (recognising `#` when `config.inspect` is set) and
    /// build a machine for it.
    pub fn from_source(source: &str, config: MachineConfig) -> Result<Self, Error> {
        let dialect = if config.inspect { Dialect::WithInspect } else { Dialect::Standard };
        Self::new(Program::parse_with(source, dialect), config)
    }

    pub fn ip(&self) -> usize {
        self.ip
    }

    pub fn dp(&self) -> usize {
        self.dp
    }

    /// Instructions executed so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn tape(&self) -> &Tape {
        &self.tape
    }

    /// Mutable tape, e.g. to preload cells before running.
    pub fn tape_mut(&mut self) -> &mut Tape {
        &mut self.tape
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn jump_table(&self) -> &JumpTable {
        &self.jumps
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn current_cell(&self) -> u32 {
        self.tape.get(self.dp)
    }

    pub fn is_halted(&self) -> bool {
        self.ip >= self.program.len()
    }

    /// Zero the tape and rewind both pointers; the program is kept.
    pub fn reset(&mut self) {
        self.tape.clear();
        self.ip = 0;
        self.dp = self.config.initial_pointer;
        self.steps = 0;
    }

    /// Execute one instruction.
    pub fn step<I: CharIo>(&mut self, io: &mut I) -> Result<Step, RuntimeError> {
        let Some(op) = self.program.get(self.ip) else {
            return Ok(Step::Halted);
        };
        let ip = self.ip;
        let mut next = ip + 1;

        match op {
            Instruction::Right => self.shift(ip, op, 1)?,
            Instruction::Left => self.shift(ip, op, -1)?,
            Instruction::Increment => {
                self.tape.increment(self.dp);
            }
            Instruction::Decrement => {
                self.tape.decrement(self.dp);
            }
            Instruction::Output => {
                io.write_char(self.tape.get(self.dp))
                    .map_err(|source| RuntimeError::Io { ip, source })?;
            }
            Instruction::Input => self.input(ip, io)?,
            Instruction::LoopStart => {
                if self.tape.get(self.dp) == 0 {
                    next = self.jumps.close_for(ip).map_or(next, |close| close + 1);
                }
            }
            Instruction::LoopEnd => {
                if self.tape.get(self.dp) != 0 {
                    next = self.jumps.open_for(ip).unwrap_or(next);
                }
            }
            // Only dumps when the machine was configured for it, whatever
            // dialect the program was parsed with.
            Instruction::Inspect if !self.config.inspect => {}
            Instruction::Inspect => {
                io.inspect(&self.snapshot())
                    .map_err(|source| RuntimeError::Io { ip, source })?;
            }
        }

        trace!(
            step = self.steps,
            ip,
            dp = self.dp,
            cell = self.tape.get(self.dp),
            instr = %op,
            next,
            "step"
        );

        self.ip = next;
        self.steps += 1;
        Ok(if self.is_halted() { Step::Halted } else { Step::Continue })
    }

    /// Run until the instruction pointer passes the end of the program.
    /// Programs that never halt make this never return; use
    /// [`run_with_control`](Self::run_with_control) to bound them.
    pub fn run<I: CharIo>(&mut self, io: &mut I) -> Result<(), RuntimeError> {
        self.execute(io, None)
    }

    /// Run with cooperative cancellation and an optional step budget, both
    /// checked before every instruction.
    pub fn run_with_control<I: CharIo>(
        &mut self,
        io: &mut I,
        control: &StepControl,
    ) -> Result<(), RuntimeError> {
        self.execute(io, Some(control))
    }

    fn execute<I: CharIo>(&mut self, io: &mut I, control: Option<&StepControl>) -> Result<(), RuntimeError> {
        debug!(ip = self.ip, dp = self.dp, "run started");
        let result = self.drive(io, control);
        let flushed = io.flush().map_err(|source| RuntimeError::Io { ip: self.ip, source });
        match &result {
            Ok(()) => debug!(steps = self.steps, "run halted"),
            Err(err) => debug!(steps = self.steps, error = %err, "run aborted"),
        }
        result.and(flushed)
    }

    fn drive<I: CharIo>(&mut self, io: &mut I, control: Option<&StepControl>) -> Result<(), RuntimeError> {
        while !self.is_halted() {
            if let Some(ctrl) = control {
                ctrl.check(self.steps)?;
            }
            self.step(io)?;
        }
        Ok(())
    }

    fn shift(&mut self, ip: usize, op: Instruction, delta: isize) -> Result<(), RuntimeError> {
        self.dp = self
            .tape
            .shift(self.dp, delta, self.config.pointer_policy)
            .map_err(|ptr| RuntimeError::PointerOutOfBounds { ip, ptr, op })?;
        Ok(())
    }

    fn input<I: CharIo>(&mut self, ip: usize, io: &mut I) -> Result<(), RuntimeError> {
        // Pending output must be visible before blocking on input.
        io.flush().map_err(|source| RuntimeError::Io { ip, source })?;
        match io.read_char().map_err(|source| RuntimeError::Io { ip, source })? {
            Some(code) => self.tape.set(self.dp, code),
            None => match self.config.eof_policy {
                EofPolicy::Zero => self.tape.set(self.dp, 0),
                EofPolicy::Unchanged => {}
                EofPolicy::Error => return Err(RuntimeError::InputExhausted { ip }),
            },
        }
        Ok(())
    }

    /// At least five cells, and always enough to include the data pointer.
    fn snapshot(&self) -> Snapshot {
        let end = (self.dp + 1).max(5).min(self.tape.len());
        Snapshot {
            ip: self.ip,
            dp: self.dp,
            cells: self.tape.cells()[..end].to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PointerPolicy;
    use crate::error::{ProgramError, UnmatchedBracketKind};
    use crate::io::MemoryIo;

    fn small() -> MachineConfig {
        MachineConfig::default().with_tape_length(10)
    }

    fn run(code: &str, config: MachineConfig, input: &str) -> (Machine, Result<(), RuntimeError>, MemoryIo) {
        let mut machine = Machine::from_source(code, config).expect("well-formed program");
        let mut io = MemoryIo::new(input);
        let result = machine.run(&mut io);
        (machine, result, io)
    }

    #[test]
    fn comment_only_program_halts_without_io() {
        let (machine, result, io) = run("just words and spaces\n", small(), "xyz");
        assert!(result.is_ok());
        assert_eq!(machine.steps(), 0);
        assert!(io.output().is_empty());
        assert_eq!(io.remaining_input(), 3);
    }

    #[test]
    fn preset_cell_prints_its_character() {
        let mut machine = Machine::from_source(".", small()).unwrap();
        machine.tape_mut().set(0, 72);
        let mut io = MemoryIo::default();
        machine.run(&mut io).unwrap();
        assert_eq!(io.output_string(), "H");
    }

    #[test]
    fn hello_program_prints_hello() {
        let code = "++++++++[>++++[>++>+++>+++>+<<<<-]>+>+>->>+[<]<-]>>.>---.+++++++..+++.";
        let (_, result, io) = run(code, MachineConfig::default(), "");
        assert!(result.is_ok());
        assert_eq!(io.output_string(), "Hello");
    }

    #[test]
    fn read_then_write_echoes() {
        let (_, result, io) = run(",.", small(), "A");
        assert!(result.is_ok());
        assert_eq!(io.output_string(), "A");
        assert_eq!(io.remaining_input(), 0);
    }

    #[test]
    fn zeroing_loop_clears_cell() {
        let mut machine = Machine::from_source("[-]", small()).unwrap();
        machine.tape_mut().set(0, 5);
        machine.run(&mut MemoryIo::default()).unwrap();
        assert_eq!(machine.current_cell(), 0);
        // '[' entered, then 5 x ('-' ']') and the final fall-through, plus re-tests.
        assert!(machine.steps() > 5);
    }

    #[test]
    fn loop_end_jumps_back_to_reenter_the_loop() {
        // Moves the 3 from cell 0 to cell 1; needs three trips round the loop.
        let (machine, result, _) = run("+++[->+<]", small(), "");
        assert!(result.is_ok());
        assert_eq!(machine.tape().get(0), 0);
        assert_eq!(machine.tape().get(1), 3);
    }

    #[test]
    fn zero_cell_skips_loop_body() {
        let (machine, result, io) = run("[.+]+", small(), "");
        assert!(result.is_ok());
        assert!(io.output().is_empty());
        assert_eq!(machine.current_cell(), 1);
    }

    #[test]
    fn infinite_loop_is_bounded_by_step_limit() {
        let mut machine = Machine::from_source("+[]", small()).unwrap();
        let result = machine.run_with_control(&mut MemoryIo::default(), &StepControl::with_max_steps(50));
        assert!(matches!(result, Err(RuntimeError::StepLimitExceeded { limit: 50 })));
        assert_eq!(machine.steps(), 50);
        assert!(!machine.is_halted());
    }

    #[test]
    fn cancelled_control_stops_before_first_step() {
        let control = StepControl::default();
        control.cancel();
        let mut machine = Machine::from_source("+[]", small()).unwrap();
        let result = machine.run_with_control(&mut MemoryIo::default(), &control);
        assert!(matches!(result, Err(RuntimeError::Canceled)));
        assert_eq!(machine.steps(), 0);
    }

    #[test]
    fn malformed_program_never_builds() {
        let err = Machine::from_source("+]", small()).unwrap_err();
        assert!(matches!(
            err,
            Error::Program(ProgramError::UnmatchedBracket { ip: 1, kind: UnmatchedBracketKind::Close, .. })
        ));
        let err = Machine::from_source("[+", small()).unwrap_err();
        assert!(matches!(
            err,
            Error::Program(ProgramError::UnmatchedBracket { ip: 0, kind: UnmatchedBracketKind::Open, .. })
        ));
    }

    #[test]
    fn invalid_config_never_builds() {
        let err = Machine::from_source("+", small().with_initial_pointer(10)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn wrap_policy_moves_left_of_zero_to_the_end() {
        let (machine, result, _) = run("<+", small(), "");
        assert!(result.is_ok());
        assert_eq!(machine.dp(), 9);
        assert_eq!(machine.tape().get(9), 1);
    }

    #[test]
    fn wrap_policy_moves_right_of_end_to_zero() {
        let config = small().with_initial_pointer(9);
        let (machine, result, _) = run(">+", config, "");
        assert!(result.is_ok());
        assert_eq!(machine.dp(), 0);
        assert_eq!(machine.tape().get(0), 1);
    }

    #[test]
    fn strict_policy_reports_left_overrun() {
        let config = small().with_pointer_policy(PointerPolicy::Strict);
        let (machine, result, _) = run("+<", config, "");
        assert!(matches!(
            result,
            Err(RuntimeError::PointerOutOfBounds { ip: 1, ptr: -1, op: Instruction::Left })
        ));
        assert_eq!(machine.dp(), 0);
    }

    #[test]
    fn strict_policy_reports_right_overrun() {
        let config = MachineConfig::default()
            .with_tape_length(3)
            .with_pointer_policy(PointerPolicy::Strict);
        let (_, result, _) = run(">>>", config, "");
        assert!(matches!(
            result,
            Err(RuntimeError::PointerOutOfBounds { ip: 2, ptr: 3, op: Instruction::Right })
        ));
    }

    #[test]
    fn initial_pointer_is_honoured() {
        let (machine, result, _) = run("+", small().with_initial_pointer(4), "");
        assert!(result.is_ok());
        assert_eq!(machine.tape().get(4), 1);
    }

    #[test]
    fn eof_zero_clears_cell() {
        let (machine, result, _) = run("+++,", small(), "");
        assert!(result.is_ok());
        assert_eq!(machine.current_cell(), 0);
    }

    #[test]
    fn eof_unchanged_keeps_cell() {
        let config = small().with_eof_policy(EofPolicy::Unchanged);
        let (machine, result, _) = run("+++,", config, "");
        assert!(result.is_ok());
        assert_eq!(machine.current_cell(), 3);
    }

    #[test]
    fn eof_error_aborts() {
        let config = small().with_eof_policy(EofPolicy::Error);
        let (_, result, _) = run("+,", config, "");
        assert!(matches!(result, Err(RuntimeError::InputExhausted { ip: 1 })));
    }

    #[test]
    fn input_wider_than_cell_is_truncated() {
        let (machine, result, _) = run(",", small(), "€");
        assert!(result.is_ok());
        assert_eq!(machine.current_cell(), 0x20AC & 0xFF);

        let (machine, _, _) = run(",", small().with_cell_bits(16), "€");
        assert_eq!(machine.current_cell(), 0x20AC);
    }

    #[test]
    fn cell_wraps_under_eight_bits() {
        let (machine, _, _) = run("-", small(), "");
        assert_eq!(machine.current_cell(), 255);
        let (machine, _, _) = run(&"+".repeat(256), small(), "");
        assert_eq!(machine.current_cell(), 0);
    }

    #[test]
    fn inspect_hands_a_snapshot_to_io() {
        let config = small().with_inspect(true);
        let (_, result, io) = run("+>++>>>>>#", config, "");
        assert!(result.is_ok());
        let [snapshot] = io.snapshots() else { panic!("one snapshot expected") };
        assert_eq!(snapshot.dp, 6);
        assert_eq!(snapshot.ip, 9);
        assert_eq!(snapshot.cells, vec![1, 2, 0, 0, 0, 0, 0]);
        assert!(snapshot.render().contains("pointer at 6"));
    }

    #[test]
    fn inspect_ignored_when_config_disables_it() {
        let program = Program::parse_with("#+", Dialect::WithInspect);
        let mut machine = Machine::new(program, small()).unwrap();
        let mut io = MemoryIo::default();
        machine.run(&mut io).unwrap();
        assert!(io.snapshots().is_empty());
        assert_eq!(machine.current_cell(), 1);
        assert_eq!(machine.steps(), 2);
    }

    #[test]
    fn hash_is_inert_without_inspect() {
        let (machine, _, io) = run("#+", small(), "");
        assert!(io.snapshots().is_empty());
        assert_eq!(machine.program().len(), 1);
    }

    #[test]
    fn stepping_by_hand_reports_halt() {
        let mut machine = Machine::from_source("+.", small()).unwrap();
        let mut io = MemoryIo::default();
        assert_eq!(machine.step(&mut io).unwrap(), Step::Continue);
        assert_eq!(machine.step(&mut io).unwrap(), Step::Halted);
        assert_eq!(machine.step(&mut io).unwrap(), Step::Halted);
        assert_eq!(io.output(), &[1]);
    }

    #[test]
    fn reset_restores_fresh_state() {
        let config = small().with_initial_pointer(2);
        let (mut machine, _, _) = run("+>+", config, "");
        machine.reset();
        assert_eq!(machine.ip(), 0);
        assert_eq!(machine.dp(), 2);
        assert!(machine.tape().cells().iter().all(|&c| c == 0));
    }

    #[test]
    fn empty_program_halts_immediately() {
        let (machine, result, _) = run("", small(), "");
        assert!(result.is_ok());
        assert!(machine.is_halted());
    }
}
