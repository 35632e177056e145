use std::env;
use std::io::{self, IsTerminal, Write};

use bf_tape::commands::{self, repl::ReplArgs, run::RunArgs};
use clap::{Parser, Subcommand};

fn print_top_usage_and_exit(program: &str, code: i32) -> ! {
    eprintln!(
        r#"Usage:
  {0} run  [OPTIONS] "<code>"        # Run Brainfuck code (args are concatenated)
  {0} run  [OPTIONS] --file <PATH>   # Run Brainfuck code loaded from file
  {0} repl [--bare|--editor]         # Start a Brainfuck REPL (read-eval-print loop)
  ... | {0}                          # Run a program piped on stdin once

Run "{0} <subcommand> --help" for more info.
"#,
        program
    );
    let _ = io::stderr().flush();
    std::process::exit(code);
}

#[derive(Parser, Debug)]
#[command(name = "bf", disable_help_flag = true, disable_help_subcommand = true)]
struct Cli {
    /// Show this help
    #[arg(short = 'h', long = "help", action = clap::ArgAction::SetTrue)]
    help: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    Run(RunArgs),
    Repl(ReplArgs),
}

fn main() {
    // We still pull the program name for help rendering consistency
    let program = env::args().next().unwrap_or_else(|| String::from("bf"));

    let cli = Cli::parse();

    let code = match cli.command {
        _ if cli.help => print_top_usage_and_exit(&program, 0),
        Some(Command::Run(args)) => commands::run::run(&program, args),
        Some(Command::Repl(args)) => commands::repl::run(&program, args),
        // Piped input without a subcommand behaves like `repl` in bare mode.
        None if !io::stdin().is_terminal() => commands::repl::run(&program, ReplArgs::default()),
        None => print_top_usage_and_exit(&program, 2),
    };

    std::process::exit(code);
}
