use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;
use std::{env, fs, thread};

use clap::Args;

use crate::cli_util::{init_logging, print_error};
use crate::config::{EofPolicy, MachineConfig, PointerPolicy};
use crate::error::{Error, RuntimeError};
use crate::io::StdIo;
use crate::machine::{Machine, StepControl};

#[derive(Args, Debug, Default)]
#[command(disable_help_flag = true)]
pub struct RunArgs {
    /// Read Brainfuck code from PATH instead of positional "<code>"
    #[arg(short = 'f', long = "file")]
    pub file: Option<String>,

    /// Concatenated Brainfuck code parts
    #[arg(value_name = "code", trailing_var_arg = true, allow_hyphen_values = true)]
    pub code: Vec<String>,

    #[command(flatten)]
    pub machine: MachineArgs,

    /// Wall-clock timeout in milliseconds (fallback BF_TIMEOUT_MS; default unlimited)
    #[arg(long = "timeout", value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Maximum interpreter steps before abort (fallback BF_MAX_STEPS; default unlimited)
    #[arg(long = "max-steps", value_name = "N")]
    pub max_steps: Option<u64>,

    /// Log every executed instruction to stderr
    #[arg(long = "trace")]
    pub trace: bool,

    /// Show this help
    #[arg(short = 'h', long = "help", action = clap::ArgAction::SetTrue)]
    pub help: bool,
}

/// Machine overrides shared by `run` and `repl`.
#[derive(Args, Debug, Default)]
pub struct MachineArgs {
    /// Number of cells on the tape (fallback BF_TAPE_LENGTH, then bf.toml)
    #[arg(long = "tape-length", value_name = "CELLS")]
    pub tape_length: Option<usize>,

    /// Cell the data pointer starts on
    #[arg(long = "initial-pointer", value_name = "CELL")]
    pub initial_pointer: Option<usize>,

    /// Cell width in bits (1-32)
    #[arg(long = "cell-bits", value_name = "BITS")]
    pub cell_bits: Option<u32>,

    /// Moving off either end of the tape wraps or aborts
    #[arg(long = "pointer", value_enum, value_name = "POLICY")]
    pub pointer_policy: Option<PointerPolicy>,

    /// What ',' stores once input is exhausted
    #[arg(long = "eof", value_enum, value_name = "POLICY")]
    pub eof_policy: Option<EofPolicy>,

    /// Treat '#' as a tape dump (written to stderr)
    #[arg(long = "inspect")]
    pub inspect: bool,
}

impl MachineArgs {
    /// Resolve flags -> env -> bf.toml -> defaults.
    pub fn resolve(&self) -> Result<MachineConfig, Error> {
        let mut config = MachineConfig::load()?;
        if let Some(len) = env_number::<usize>("BF_TAPE_LENGTH") {
            config.tape_length = len;
        }
        if let Some(len) = self.tape_length {
            config.tape_length = len;
        }
        if let Some(dp) = self.initial_pointer {
            config.initial_pointer = dp;
        }
        if let Some(bits) = self.cell_bits {
            config.cell_bits = bits;
        }
        if let Some(policy) = self.pointer_policy {
            config.pointer_policy = policy;
        }
        if let Some(policy) = self.eof_policy {
            config.eof_policy = policy;
        }
        config.inspect |= self.inspect;
        config.validate()?;
        Ok(config)
    }
}

fn env_number<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.trim().parse::<T>().ok())
}

pub fn run(program: &str, args: RunArgs) -> i32 {
    if args.help {
        usage_and_exit(program, 0);
    }

    let RunArgs {
        file,
        code,
        machine,
        timeout_ms,
        max_steps,
        trace,
        ..
    } = args;

    init_logging(trace);

    if file.is_none() && code.is_empty() {
        usage_and_exit(program, 2);
    }

    if file.is_some() && !code.is_empty() {
        eprintln!("{program}: cannot use positional code together with --file");
        usage_and_exit(program, 2);
    }

    let source = if let Some(path) = file {
        match fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("{program}: failed to read code file as UTF-8: {e}");
                let _ = io::stderr().flush();
                return 1;
            }
        }
    } else {
        code.join("")
    };

    // Malformed programs and bad settings are reported before anything runs.
    let built = machine
        .resolve()
        .and_then(|config| Machine::from_source(&source, config));
    let machine = match built {
        Ok(m) => m,
        Err(err) => {
            print_error(Some(program), &source, None, &err);
            return 1;
        }
    };
    let filtered = machine.program().clone();

    // Resolve limits: flags -> env -> unlimited
    let timeout_ms = timeout_ms.or_else(|| env_number("BF_TIMEOUT_MS"));
    let max_steps = max_steps.or_else(|| env_number("BF_MAX_STEPS"));

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        if let Err(e) = ctrlc::set_handler(move || cancel.store(true, Ordering::Relaxed)) {
            tracing::warn!("failed to set ctrl+c handler: {e}");
        }
    }

    // Execute on a worker thread with cooperative cancellation
    let (tx, rx) = mpsc::channel::<Result<(), RuntimeError>>();
    let control = StepControl::new(max_steps, cancel.clone());
    thread::spawn(move || {
        let mut machine = machine;
        let res = machine.run_with_control(&mut StdIo::stdio(), &control);
        let _ = tx.send(res);
    });

    let outcome = match timeout_ms {
        Some(ms) => rx.recv_timeout(Duration::from_millis(ms)),
        None => rx.recv().map_err(|_| mpsc::RecvTimeoutError::Disconnected),
    };

    let exit_code = match outcome {
        Ok(Ok(())) => 0,
        Ok(Err(RuntimeError::StepLimitExceeded { limit })) => {
            eprintln!("Execution aborted: step limit exceeded ({limit})");
            1
        }
        Ok(Err(RuntimeError::Canceled)) => {
            eprintln!("Execution aborted: cancelled");
            1
        }
        Ok(Err(other)) => {
            print_error(Some(program), &source, Some(&filtered), &Error::Runtime(other));
            1
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            cancel.store(true, Ordering::Relaxed);
            eprintln!(
                "Execution aborted: wall-clock timeout exceeded ({} ms)",
                timeout_ms.unwrap_or_default()
            );
            1
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => 1,
    };
    let _ = io::stderr().flush();

    // Keep the shell prompt on its own line when a person is watching.
    if io::stdout().is_terminal() {
        println!();
    }
    let _ = io::stdout().flush();
    exit_code
}

fn usage_and_exit(program: &str, code: i32) -> ! {
    eprintln!(
        r#"Usage:
  {0} run [OPTIONS] "<code>"
  {0} run [OPTIONS] --file <PATH>

Options:
  --file,  -f <PATH>        Read Brainfuck code from PATH instead of positional "<code>"
  --tape-length <CELLS>     Tape size (default 30000)
  --initial-pointer <CELL>  Starting data pointer (default 0)
  --cell-bits <BITS>        Cell width, 1-32 (default 8)
  --pointer wrap|strict     Wrap around the tape ends (default) or abort
  --eof zero|unchanged|error
                            What ',' does at end of input (default zero)
  --inspect                 Treat '#' as a tape dump to stderr
  --timeout <MS>            Abort after MS milliseconds
  --max-steps <N>           Abort after N instructions
  --trace                   Log every instruction to stderr
  --help,  -h               Show this help

Notes:
- Characters outside of ><+-.,[] are comments and are ignored.
- Input (`,`) reads one UTF-8 character from stdin.
- Defaults can be set in the [machine] table of ~/.config/bf.toml.

Examples:
- Load Brainfuck code from a file:
    {0} run --file ./program.bf
- Read characters from a file as stdin (`,` will consume file input):
    {0} run ",[.,]" < input.txt
"#,
        program
    );
    let _ = io::stderr().flush();
    std::process::exit(code);
}
