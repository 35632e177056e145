//! A direct Brainfuck tape machine.
//!
//! Source text goes through three stages:
//! - [`Program::parse`] keeps the instruction characters `><+-.,[]` and drops
//!   everything else (comments).
//! - [`JumpTable::build`] pairs every `[` with its `]`; unbalanced brackets are
//!   rejected here, before anything runs.
//! - [`Machine`] runs the program over a fixed-length tape, talking to the
//!   outside world only through a [`CharIo`].
//!
//! Behaviour that varies between Brainfuck implementations is explicit in
//! [`MachineConfig`]:
//! - tape length (default 30,000 cells) and initial data pointer (default 0);
//! - cell width in bits (default 8), with wrapping `+` and `-`;
//! - [`PointerPolicy`]: wrap around the tape (default) or abort;
//! - [`EofPolicy`]: store 0 (default), leave the cell, or abort;
//! - `inspect`: treat `#` as a tape dump instead of a comment.
//!
//! Quick start:
//!
//! ```
//! use bf_tape::{Machine, MachineConfig, MemoryIo};
//!
//! let code = "++++++++[>++++[>++>+++>+++>+<<<<-]>+>+>->>+[<]<-]>>.>---.+++++++..+++.";
//! let mut machine = Machine::from_source(code, MachineConfig::default()).expect("balanced");
//! let mut io = MemoryIo::default();
//! machine.run(&mut io).expect("program should run");
//! assert_eq!(io.output_string(), "Hello");
//! ```

pub mod cli_util;
pub mod commands;
pub mod config;
pub mod error;
pub mod instruction;
pub mod io;
pub mod jump_table;
pub mod machine;
pub mod program;
pub mod repl;
pub mod tape;

pub use config::{EofPolicy, MachineConfig, PointerPolicy};
pub use error::{ConfigError, Error, ProgramError, RuntimeError, UnmatchedBracketKind};
pub use instruction::{Dialect, Instruction};
pub use io::{CharIo, MemoryIo, StdIo, StreamIo};
pub use jump_table::JumpTable;
pub use machine::{Machine, Snapshot, Step, StepControl};
pub use program::Program;
pub use tape::Tape;
