use std::env;
use std::io::{self, IsTerminal, Write};

use nu_ansi_term::Style;
use reedline::{DefaultPrompt, DefaultPromptSegment, Highlighter, HistoryItem, Signal, StyledText};

use crate::cli_util;
use crate::config::MachineConfig;
use crate::instruction::{Dialect, Instruction};
use crate::io::StdIo;
use crate::machine::Machine;
use crate::program::Program;

pub fn repl_loop(config: &MachineConfig) -> io::Result<()> {
    let mut editor = init_line_editor()?;

    loop {
        let Some(submission) = read_submission_interactive(&mut editor)? else {
            // EOF or editor closed. End the session cleanly to avoid hanging when stdin is closed
            println!();
            io::stdout().flush()?;
            return Ok(());
        };

        match submission.trim() {
            "" => continue,
            ":exit" => return Ok(()),
            ":help" => {
                print_meta_help();
                continue;
            }
            code => execute_submission(code, config),
        }

        // Test hook: if BF_REPL_ONCE=1, exit after one execution
        if env::var("BF_REPL_ONCE").ok().as_deref() == Some("1") {
            return Ok(());
        }
    }
}

fn print_meta_help() {
    eprintln!(":exit   leave the REPL");
    eprintln!(":help   show this list");
    eprintln!("Anything else is run as Brainfuck on a fresh tape; Ctrl+D submits.");
}

fn init_line_editor() -> io::Result<reedline::Reedline> {
    use reedline::{
        default_emacs_keybindings, EditCommand, Emacs, FileBackedHistory, KeyCode, KeyModifiers, Reedline,
        ReedlineEvent,
    };

    // Enter inserts a newline; Ctrl+D (Ctrl+Z on Windows) submits the buffer.
    let mut keybindings = default_emacs_keybindings();
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Enter, ReedlineEvent::Edit(vec![EditCommand::InsertNewline]));
    keybindings.add_binding(KeyModifiers::CONTROL, KeyCode::Char('d'), ReedlineEvent::Submit);
    keybindings.add_binding(KeyModifiers::CONTROL, KeyCode::Char('z'), ReedlineEvent::Submit);

    // Up/down move within the buffer; Alt/Ctrl+Up/Down browse history.
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Up, ReedlineEvent::Up);
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Down, ReedlineEvent::Down);
    keybindings.add_binding(KeyModifiers::ALT, KeyCode::Up, ReedlineEvent::PreviousHistory);
    keybindings.add_binding(KeyModifiers::CONTROL, KeyCode::Up, ReedlineEvent::PreviousHistory);
    keybindings.add_binding(KeyModifiers::ALT, KeyCode::Down, ReedlineEvent::NextHistory);
    keybindings.add_binding(KeyModifiers::CONTROL, KeyCode::Down, ReedlineEvent::NextHistory);

    let history = FileBackedHistory::new(1_000).map_err(|e| io::Error::other(e.to_string()))?;

    Ok(Reedline::create()
        .with_highlighter(Box::new(BrainfuckHighlighter::new_catppuccin_mocha()))
        .with_history(Box::new(history))
        .with_edit_mode(Box::new(Emacs::new(keybindings))))
}

pub fn read_submission<R: io::BufRead>(stdin: &mut R) -> Option<String> {
    let mut buffer = String::new();

    loop {
        let mut line = String::new();
        match stdin.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => buffer.push_str(&line),
            Err(_) => return None,
        }
    }

    if buffer.is_empty() { None } else { Some(buffer) }
}

fn read_submission_interactive(editor: &mut reedline::Reedline) -> io::Result<Option<String>> {
    let prompt = DefaultPrompt::new(DefaultPromptSegment::Basic("bf".to_string()), DefaultPromptSegment::Empty);

    match editor.read_line(&prompt) {
        Ok(Signal::Success(buffer)) => {
            if !buffer.trim().is_empty() {
                let _ = editor.history_mut().save(HistoryItem::from_command_line(buffer.clone()));
            }
            Ok(Some(buffer))
        }
        // Ctrl+C and Ctrl+D end the session
        Ok(_) => Ok(None),
        Err(e) => {
            eprintln!("repl: editor error: {e}");
            let _ = io::stderr().flush();
            Ok(None)
        }
    }
}

/// Runs one submission on a fresh machine.
/// - Program output goes to stdout.
/// - Errors are printed concisely to stderr.
/// - A newline is always written to stdout after execution (success or error)
///   so that the prompt begins at column 0 on the next iteration.
pub fn execute_submission(code: &str, config: &MachineConfig) {
    let dialect = if config.inspect { Dialect::WithInspect } else { Dialect::Standard };
    let program = Program::parse_with(code, dialect);
    if !program.is_empty() {
        let result = Machine::new(program.clone(), config.clone())
            .and_then(|mut machine| Ok(machine.run(&mut StdIo::stdio())?));
        if let Err(err) = result {
            cli_util::print_error(None, code, Some(&program), &err);
        }
    }
    println!();
    let _ = io::stdout().flush();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplMode {
    Bare,
    Editor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeFlagOverride {
    None,
    Bare,
    Editor,
}

/// Flags, then `BF_REPL_MODE`, then whether stdin is a terminal.
pub fn select_mode(flag: ModeFlagOverride) -> Result<ReplMode, String> {
    let stdin_is_tty = io::stdin().is_terminal();
    resolve_mode(flag, env::var("BF_REPL_MODE").ok().as_deref(), stdin_is_tty)
}

fn resolve_mode(flag: ModeFlagOverride, env_mode: Option<&str>, stdin_is_tty: bool) -> Result<ReplMode, String> {
    let requested = match flag {
        ModeFlagOverride::Bare => Some(ReplMode::Bare),
        ModeFlagOverride::Editor => Some(ReplMode::Editor),
        ModeFlagOverride::None => match env_mode.map(|v| v.trim().to_ascii_lowercase()) {
            None => None,
            Some(v) if v == "bare" => Some(ReplMode::Bare),
            Some(v) if v == "editor" => Some(ReplMode::Editor),
            Some(v) => return Err(format!("invalid BF_REPL_MODE value: {v}, must be 'bare' or 'editor'")),
        },
    };

    match requested {
        Some(ReplMode::Editor) if !stdin_is_tty => {
            Err("cannot start editor: stdin is not a TTY (use --bare or BF_REPL_MODE=bare)".to_string())
        }
        Some(mode) => Ok(mode),
        None if stdin_is_tty => Ok(ReplMode::Editor),
        None => Ok(ReplMode::Bare),
    }
}

/// Bare mode: read stdin to EOF and run it once.
pub fn execute_bare_once(config: &MachineConfig) -> io::Result<()> {
    let mut locked = io::BufReader::new(io::stdin().lock());
    if let Some(submission) = read_submission(&mut locked) {
        let trimmed = submission.trim();
        if !trimmed.is_empty() {
            execute_submission(trimmed, config);
        }
    }
    Ok(())
}

/// Catppuccin Mocha accents.
mod mocha {
    use nu_ansi_term::Color;

    pub const SURFACE2: Color = Color::Rgb(108, 112, 134);
    pub const RED: Color = Color::Rgb(243, 139, 168);
    pub const GREEN: Color = Color::Rgb(166, 227, 161);
    pub const YELLOW: Color = Color::Rgb(249, 226, 175);
    pub const BLUE: Color = Color::Rgb(137, 180, 250);
    pub const MAUVE: Color = Color::Rgb(203, 166, 247);
    pub const PEACH: Color = Color::Rgb(250, 179, 135);
    pub const TEAL: Color = Color::Rgb(148, 226, 213);
    pub const SKY: Color = Color::Rgb(137, 220, 235);
}

#[derive(Default)]
struct BrainfuckHighlighter {
    movement: (Style, Style),
    data: (Style, Style),
    io: (Style, Style),
    flow: Style,
    inspect: Style,
    other: Style,
}

impl BrainfuckHighlighter {
    fn new_catppuccin_mocha() -> Self {
        use self::mocha as P;

        // > <   => SKY/TEAL (movement)
        // + -   => GREEN/RED (data modification)
        // . ,   => YELLOW/PEACH (I/O)
        // [ ]   => MAUVE (flow control)
        Self {
            movement: (Style::new().fg(P::SKY).bold(), Style::new().fg(P::TEAL).bold()),
            data: (Style::new().fg(P::GREEN).bold(), Style::new().fg(P::RED).bold()),
            io: (Style::new().fg(P::YELLOW).bold(), Style::new().fg(P::PEACH).bold()),
            flow: Style::new().fg(P::MAUVE).bold(),
            inspect: Style::new().fg(P::BLUE).bold(),
            other: Style::new().fg(P::SURFACE2),
        }
    }

    fn style_for(&self, ch: char) -> Style {
        match Instruction::from_char(ch, Dialect::WithInspect) {
            Some(Instruction::Right) => self.movement.0,
            Some(Instruction::Left) => self.movement.1,
            Some(Instruction::Increment) => self.data.0,
            Some(Instruction::Decrement) => self.data.1,
            Some(Instruction::Output) => self.io.0,
            Some(Instruction::Input) => self.io.1,
            Some(Instruction::LoopStart | Instruction::LoopEnd) => self.flow,
            Some(Instruction::Inspect) => self.inspect,
            None => self.other,
        }
    }
}

impl Highlighter for BrainfuckHighlighter {
    fn highlight(&self, line: &str, _cursor: usize) -> StyledText {
        let mut out = StyledText::new();
        let mut current_style: Option<Style> = None;
        let mut buffer = String::new();

        for ch in line.chars() {
            let style = self.style_for(ch);
            match current_style {
                Some(s) if s != style => {
                    out.push((s, std::mem::take(&mut buffer)));
                }
                _ => {}
            }
            current_style = Some(style);
            buffer.push(ch);
        }

        if let Some(s) = current_style {
            if !buffer.is_empty() {
                out.push((s, buffer));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn read_submission_reads_until_eof_multiple_lines() {
        let input = b"+++\n>+.\n";
        let mut cursor = Cursor::new(&input[..]);
        let got = read_submission(&mut cursor);
        assert_eq!(got.as_deref(), Some("+++\n>+.\n"));
    }

    #[test]
    fn read_submission_empty_returns_none() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        let got = read_submission(&mut cursor);
        assert!(got.is_none());
    }

    #[test]
    fn flags_beat_environment() {
        assert_eq!(resolve_mode(ModeFlagOverride::Bare, Some("editor"), true), Ok(ReplMode::Bare));
    }

    #[test]
    fn environment_beats_detection() {
        assert_eq!(resolve_mode(ModeFlagOverride::None, Some(" BARE "), true), Ok(ReplMode::Bare));
        assert!(resolve_mode(ModeFlagOverride::None, Some("tui"), true).is_err());
    }

    #[test]
    fn editor_needs_a_terminal() {
        assert_eq!(resolve_mode(ModeFlagOverride::None, None, true), Ok(ReplMode::Editor));
        assert_eq!(resolve_mode(ModeFlagOverride::None, None, false), Ok(ReplMode::Bare));
        let err = resolve_mode(ModeFlagOverride::Editor, None, false).unwrap_err();
        assert!(err.contains("stdin is not a TTY"));
    }

    #[test]
    fn highlighter_groups_runs_of_the_same_style() {
        let highlighter = BrainfuckHighlighter::new_catppuccin_mocha();
        let styled = highlighter.highlight("++>ab", 0);
        let parts: Vec<&str> = styled.buffer.iter().map(|(_, text)| text.as_str()).collect();
        assert_eq!(parts, vec!["++", ">", "ab"]);
    }
}
