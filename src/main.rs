//! List-file CLI
//!
//! A small front end over the library for inspecting each pipeline
//! stage.
//!
//! # Usage
//!
//! ```text
//! listfile [OPTIONS] <COMMAND>
//!
//! Commands:
//!   lex    Tokenize a list file and display the token stream
//!   parse  Parse a list file and display the compiled programs
//!   eval   Parse and execute a list file through the reference engine
//!
//! Options:
//!   -v, --verbose              Enable debug logging
//!       --debug-mode <STAGE>   Per-stage debug events [default: disabled]
//!       --strict               Reject unknown escape sequences
//!   -h, --help                 Print help information
//!   -V, --version              Print version information
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context as _, Result};
use clap::{Args, Parser as ClapParser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use listfile::diagnostics::DiagnosticEmitter;
use listfile::lexer::{Scanner, TokenKind};
use listfile::parser::{DebugMode, Parser};
use listfile::ScriptEngine;

/// Parser and evaluator for the CMake list-file language.
#[derive(ClapParser)]
#[command(name = "listfile")]
#[command(version)]
#[command(about = "Parser and evaluator for the CMake list-file language", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Per-stage debug events
    #[arg(long, value_enum, default_value_t = DebugStage::Disabled, global = true)]
    debug_mode: DebugStage,

    /// Reject escape sequences outside the known set
    #[arg(long, global = true)]
    strict: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Tokenize a list file and display the token stream
    Lex(FileArgs),

    /// Parse a list file and display the compiled argument programs
    Parse(ParseArgs),

    /// Parse and execute a list file through the reference engine
    Eval(FileArgs),
}

#[derive(Args)]
struct FileArgs {
    /// List file to process
    #[arg(value_name = "FILE")]
    file: PathBuf,
}

#[derive(Args)]
struct ParseArgs {
    /// List file to process
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Dump the parse as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DebugStage {
    Disabled,
    Parser,
    Scanner,
    Full,
}

impl From<DebugStage> for DebugMode {
    fn from(stage: DebugStage) -> Self {
        match stage {
            DebugStage::Disabled => DebugMode::Disabled,
            DebugStage::Parser => DebugMode::Parser,
            DebugStage::Scanner => DebugMode::Scanner,
            DebugStage::Full => DebugMode::Full,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    let result = match &cli.command {
        Commands::Lex(args) => cmd_lex(args),
        Commands::Parse(args) => cmd_parse(args, cli.debug_mode.into(), cli.strict),
        Commands::Eval(args) => cmd_eval(args, cli.debug_mode.into(), cli.strict),
    };

    match result {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {:#}", error);
            ExitCode::FAILURE
        }
    }
}

fn read_source(path: &PathBuf) -> Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn cmd_lex(args: &FileArgs) -> Result<ExitCode> {
    let source = read_source(&args.file)?;
    let mut scanner = Scanner::new(&source);
    loop {
        match scanner.next_token() {
            Ok(token) => {
                println!(
                    "{:>4}:{:<3} {:?}",
                    token.span.line, token.span.col, token.kind
                );
                if token.kind == TokenKind::Eof {
                    return Ok(ExitCode::SUCCESS);
                }
            }
            Err(error) => {
                let filename = args.file.display().to_string();
                let emitter = DiagnosticEmitter::new(&filename, &source);
                emitter.emit(&error.into());
                return Ok(ExitCode::FAILURE);
            }
        }
    }
}

fn cmd_parse(args: &ParseArgs, debug_mode: DebugMode, strict: bool) -> Result<ExitCode> {
    let source = read_source(&args.file)?;
    let mut parser = Parser::new(&source);
    parser.set_debug_mode(debug_mode);
    parser.set_strict(strict);

    match parser.parse() {
        Ok(()) => {
            if args.json {
                let json = serde_json::to_string_pretty(parser.function_list())
                    .context("cannot serialize the parse")?;
                println!("{}", json);
            } else {
                for function in parser.function_list() {
                    println!("{:#?}", function);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(diagnostic) => {
            let filename = args.file.display().to_string();
            let emitter = DiagnosticEmitter::new(&filename, &source);
            emitter.emit(&diagnostic);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn cmd_eval(args: &FileArgs, debug_mode: DebugMode, strict: bool) -> Result<ExitCode> {
    let mut engine = ScriptEngine::new();
    engine.set_debug_mode(debug_mode);
    engine.set_strict(strict);

    match engine.run_file(&args.file) {
        Ok(()) => {
            for message in engine.messages() {
                println!("{}", message);
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(error) => {
            eprintln!("error: {}", error);
            Ok(ExitCode::FAILURE)
        }
    }
}
