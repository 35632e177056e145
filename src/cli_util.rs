use std::io::{self, IsTerminal, Write};

use nu_ansi_term::Color;
use tracing_subscriber::filter::EnvFilter;

use crate::error::{Error, ProgramError, RuntimeError};
use crate::program::Program;

/// Install the stderr log subscriber. `RUST_LOG` wins when set; `trace`
/// additionally turns on the per-instruction log of this crate.
pub fn init_logging(trace: bool) {
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if trace {
        if let Ok(directive) = "bf_tape=trace".parse() {
            filter = filter.add_directive(directive);
        }
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

/// Pretty-print an [`Error`] with a caret under the offending source character.
/// If `program` is `Some("bf")`, prefix messages with "bf: ..." for CLI run mode.
/// `filtered` maps runtime instruction indices back to `source`.
pub fn print_error(program: Option<&str>, source: &str, filtered: Option<&Program>, err: &Error) {
    let prefix_program = |msg: &str| match program {
        Some(p) => format!("{p}: {msg}"),
        None => msg.to_string(),
    };

    match err {
        Error::Program(ProgramError::UnmatchedBracket { offset, kind, .. }) => {
            let msg = prefix_program(&format!("Parse error: unmatched bracket {kind}"));
            print_error_with_context(&msg, source, *offset);
        }
        Error::Runtime(runtime) => {
            let msg = prefix_program(&runtime_message(runtime));
            let offset = runtime
                .ip()
                .map(|ip| filtered.and_then(|p| p.source_offset(ip)).unwrap_or(ip));
            match offset {
                Some(offset) => print_error_with_context(&msg, source, offset),
                None => print_header(&msg),
            }
        }
        Error::Config(config) => print_header(&prefix_program(&format!("Config error: {config}"))),
    }
}

fn runtime_message(err: &RuntimeError) -> String {
    match err {
        RuntimeError::PointerOutOfBounds { ptr, op, .. } => {
            format!("Runtime error: pointer out of bounds (ptr={ptr}, op={op})")
        }
        RuntimeError::InputExhausted { .. } => "Runtime error: input exhausted".to_string(),
        RuntimeError::Io { source, .. } => format!("I/O error: {source}"),
        other => other.to_string(),
    }
}

fn print_header(msg: &str) {
    if io::stderr().is_terminal() {
        eprintln!("{}", Color::Red.bold().paint(msg));
    } else {
        eprintln!("{msg}");
    }
}

/// Print a concise error with the source position and a caret context window,
/// working with UTF-8 by slicing using char indices.
pub fn print_error_with_context(prefix: &str, code: &str, pos: usize) {
    print_header(&format!("{prefix} at position {pos}"));
    for line in context_lines(code, pos) {
        eprintln!("  {line}");
    }
    let _ = io::stderr().flush();
}

/// The source window around `pos` (newlines flattened) and the caret line.
fn context_lines(code: &str, pos: usize) -> [String; 2] {
    const WINDOW_CHARS: usize = 32;

    let start_char = pos.saturating_sub(WINDOW_CHARS);
    let slice: String = code
        .chars()
        .skip(start_char)
        .take(pos - start_char + WINDOW_CHARS + 1)
        .map(|c| if c == '\n' || c == '\r' || c == '\t' { ' ' } else { c })
        .collect();

    let caret = format!("{}^", " ".repeat(pos - start_char));
    [slice, caret]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caret_sits_under_the_position() {
        let [window, caret] = context_lines("++\n+]", 4);
        assert_eq!(window, "++ +]");
        assert_eq!(caret, "    ^");
    }

    #[test]
    fn long_sources_are_windowed() {
        let code = format!("{}]{}", "+".repeat(100), "-".repeat(100));
        let [window, caret] = context_lines(&code, 100);
        assert_eq!(window.chars().count(), 65);
        assert_eq!(window.chars().nth(32), Some(']'));
        assert_eq!(caret.len(), 33);
    }

    #[test]
    fn multibyte_characters_are_counted_once() {
        let [window, caret] = context_lines("éé]", 2);
        assert_eq!(window, "éé]");
        assert_eq!(caret, "  ^");
    }
}
