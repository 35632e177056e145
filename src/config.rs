use std::fs;
use std::path::{Path, PathBuf};

use cross_xdg::BaseDirs;
use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_TAPE_LENGTH: usize = 30_000;
pub const DEFAULT_CELL_BITS: u32 = 8;

/// What happens when the data pointer is moved off either end of the tape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PointerPolicy {
    /// Wrap around modulo the tape length, in both directions.
    #[default]
    Wrap,
    /// Abort with a pointer-out-of-bounds error.
    Strict,
}

/// What `,` does once the input is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EofPolicy {
    /// Store 0 in the current cell.
    #[default]
    Zero,
    /// Leave the current cell as it is.
    Unchanged,
    /// Abort with an input-exhausted error.
    Error,
}

/// Machine parameters, fixed when a [`Machine`](crate::Machine) is built.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MachineConfig {
    pub tape_length: usize,
    pub initial_pointer: usize,
    pub cell_bits: u32,
    pub pointer_policy: PointerPolicy,
    pub eof_policy: EofPolicy,
    /// Recognise `#` as a tape dump instead of a comment.
    pub inspect: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            tape_length: DEFAULT_TAPE_LENGTH,
            initial_pointer: 0,
            cell_bits: DEFAULT_CELL_BITS,
            pointer_policy: PointerPolicy::default(),
            eof_policy: EofPolicy::default(),
            inspect: false,
        }
    }
}

impl MachineConfig {
    pub fn with_tape_length(mut self, tape_length: usize) -> Self {
        self.tape_length = tape_length;
        self
    }

    pub fn with_initial_pointer(mut self, initial_pointer: usize) -> Self {
        self.initial_pointer = initial_pointer;
        self
    }

    pub fn with_cell_bits(mut self, cell_bits: u32) -> Self {
        self.cell_bits = cell_bits;
        self
    }

    pub fn with_pointer_policy(mut self, policy: PointerPolicy) -> Self {
        self.pointer_policy = policy;
        self
    }

    pub fn with_eof_policy(mut self, policy: EofPolicy) -> Self {
        self.eof_policy = policy;
        self
    }

    pub fn with_inspect(mut self, inspect: bool) -> Self {
        self.inspect = inspect;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tape_length == 0 {
            return Err(ConfigError::ZeroTapeLength);
        }
        if self.initial_pointer >= self.tape_length {
            return Err(ConfigError::InitialPointerOutOfRange {
                pointer: self.initial_pointer,
                tape_length: self.tape_length,
            });
        }
        if !(1..=32).contains(&self.cell_bits) {
            return Err(ConfigError::CellBits(self.cell_bits));
        }
        Ok(())
    }

    /// Parse the `[machine]` table of a `bf.toml` document. Missing keys keep
    /// their defaults.
    pub fn from_toml_str(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(file.machine)
    }

    /// Load `path`, or fall back to defaults when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content, path)?;
        tracing::debug!(path = %path.display(), ?config, "loaded machine config");
        Ok(config)
    }

    /// Load `bf.toml` from the user's config home, defaults if absent.
    pub fn load() -> Result<Self, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    machine: MachineConfig,
}

/// `bf.toml` inside the XDG config home (`~/.config` on every platform).
pub fn config_path() -> Option<PathBuf> {
    let base_dirs = BaseDirs::new().ok()?;
    let mut path = PathBuf::from(base_dirs.config_home());
    path.push("bf.toml");
    Some(path)
}
