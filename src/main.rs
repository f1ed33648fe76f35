// ABOUTME: Command-line runner and REPL for httpscript scripts

use clap::Parser;
use httpscript::context::AssertMode;
use httpscript::{Interpreter, Value};
use log::LevelFilter;
use rustyline::error::ReadlineError;
use rustyline::{Config, DefaultEditor};
use simple_logger::SimpleLogger;
use std::path::PathBuf;
use std::process::ExitCode;

/// HTTP automation scripting language interpreter
#[derive(Parser, Debug)]
#[command(name = "httpscript")]
#[command(version)]
#[command(about = "Run readable HTTP automation scripts")]
#[command(long_about = "An interpreter for a small scripting language whose primitives are \
HTTP requests, response extraction, and lightweight control flow")]
struct CliArgs {
    /// Script file to execute (starts a REPL when omitted)
    #[arg(value_name = "FILE")]
    script: Option<PathBuf>,

    /// Positional arguments bound to $ARG1, $ARG2, ... with $ARGC
    #[arg(value_name = "ARGS")]
    args: Vec<String>,

    /// Print each log line and the final variable map
    #[arg(short, long)]
    verbose: bool,

    /// Abort at the first failed assertion instead of recording and continuing
    #[arg(long = "stop-on-failure")]
    stop_on_failure: bool,

    /// Parse the script and list recognized statements without executing
    #[arg(long = "dry-run")]
    dry_run: bool,

    /// Parse the script silently; the exit code reports validity
    #[arg(long)]
    validate: bool,
}

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let level = if args.verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    };
    if let Err(err) = SimpleLogger::new().with_level(level).init() {
        eprintln!("failed to initialize logging: {}", err);
    }

    match &args.script {
        Some(path) => run_script_file(path, &args),
        None => run_repl(),
    }
}

fn run_script_file(path: &PathBuf, args: &CliArgs) -> ExitCode {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("cannot read script file {}: {}", path.display(), err);
            return ExitCode::FAILURE;
        }
    };

    let mut interp = Interpreter::new();

    if args.validate || args.dry_run {
        return match interp.check_script(&source) {
            Ok(outline) => {
                if args.dry_run {
                    for (line, kind) in outline {
                        println!("line {}: {}", line, kind);
                    }
                }
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("{}", err);
                ExitCode::FAILURE
            }
        };
    }

    interp.set_assert_mode(if args.stop_on_failure {
        AssertMode::Halt
    } else {
        AssertMode::Record
    });
    interp.set_args(&args.args);

    let result = interp.parse_script(&source);

    if args.verbose {
        for line in interp.log_lines() {
            eprintln!("[log] {}", line);
        }
    }

    match result {
        Ok(_) => {}
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::FAILURE;
        }
    }

    if !interp.failures().is_empty() {
        for failure in interp.failures() {
            eprintln!("{}", failure);
        }
        eprintln!("{} assertion(s) failed", interp.failures().len());
        return ExitCode::FAILURE;
    }

    if args.verbose {
        match serde_json::to_string_pretty(interp.get_vars()) {
            Ok(rendered) => eprintln!("final variables: {}", rendered),
            Err(err) => eprintln!("cannot render variables: {}", err),
        }
    }

    ExitCode::SUCCESS
}

fn run_repl() -> ExitCode {
    let config = Config::builder().auto_add_history(true).build();
    let mut rl = match DefaultEditor::with_config(config) {
        Ok(rl) => rl,
        Err(err) => {
            eprintln!("failed to initialize REPL: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let history_file = ".httpscript_history";
    let _ = rl.load_history(history_file);

    println!("httpscript {}", env!("CARGO_PKG_VERSION"));
    println!("Type a statement, or 'exit' to leave.");

    let mut interp = Interpreter::new();

    loop {
        match rl.readline("httpscript> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "exit" || line == "quit" {
                    println!("Goodbye!");
                    break;
                }

                // Block-aware entry so single-line if/loop forms work too.
                match interp.parse_script(line) {
                    Ok(Value::Null) => {}
                    Ok(value) => println!("=> {}", value),
                    Err(err) => eprintln!("Error: {}", err),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                eprintln!("Error: {}", err);
                break;
            }
        }
    }

    let _ = rl.save_history(history_file);
    ExitCode::SUCCESS
}
