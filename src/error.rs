use std::fmt;
use std::path::PathBuf;

use crate::instruction::Instruction;

/// Which side of the loop was unmatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnmatchedBracketKind {
    Open,
    Close,
}

impl fmt::Display for UnmatchedBracketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnmatchedBracketKind::Open => write!(f, "'['"),
            UnmatchedBracketKind::Close => write!(f, "']'"),
        }
    }
}

/// A program rejected before it runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProgramError {
    /// Loops were not balanced. `ip` indexes the filtered program, `offset`
    /// the character in the original source.
    #[error("Unmatched bracket {kind} at instruction {ip}")]
    UnmatchedBracket {
        ip: usize,
        offset: usize,
        kind: UnmatchedBracketKind,
    },
}

/// Errors that stop a running machine.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Under the strict pointer policy the data pointer tried to leave the tape.
    #[error("Pointer out of bounds at instruction {ip} (ptr={ptr}, op='{op}')")]
    PointerOutOfBounds { ip: usize, ptr: isize, op: Instruction },

    /// `,` found no input under the erroring end-of-input policy.
    #[error("Input exhausted at instruction {ip}")]
    InputExhausted { ip: usize },

    /// The I/O capability failed.
    #[error("I/O error at instruction {ip}: {source}")]
    Io {
        ip: usize,
        #[source]
        source: std::io::Error,
    },

    /// Execution aborted due to step limit.
    #[error("Execution aborted: step limit exceeded ({limit})")]
    StepLimitExceeded { limit: u64 },

    /// Execution aborted due to cooperative cancellation (e.g., timeout)
    #[error("Execution aborted: cancelled")]
    Canceled,
}

impl RuntimeError {
    /// Instruction index the error occurred at, when it has one.
    pub fn ip(&self) -> Option<usize> {
        match self {
            RuntimeError::PointerOutOfBounds { ip, .. }
            | RuntimeError::InputExhausted { ip }
            | RuntimeError::Io { ip, .. } => Some(*ip),
            RuntimeError::StepLimitExceeded { .. } | RuntimeError::Canceled => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("tape length must be at least 1")]
    ZeroTapeLength,

    #[error("initial pointer {pointer} is outside a tape of {tape_length} cells")]
    InitialPointerOutOfRange { pointer: usize, tape_length: usize },

    #[error("cell width must be between 1 and 32 bits, got {0}")]
    CellBits(u32),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Any error the crate reports.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Program(#[from] ProgramError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
