//! KernelScript front end driver
//!
//! Lexes, parses and checks KernelScript sources.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use kernelscript::feedback::{CompilationFeedback, CompilationStats, ErrorReport, Severity};
use kernelscript::frontend::ast::{Node, NodeKind};
use kernelscript::frontend::lexer::tokenize;
use kernelscript::frontend::parser::Parser as KsParser;
use kernelscript::frontend::semantic::SemanticAnalyzer;
use kernelscript::frontend::token::Token;
use kernelscript::middle::{build, print_cfg};

/// KernelScript front end
#[derive(Parser, Debug)]
#[command(name = "ksc")]
#[command(version = "0.1.0")]
#[command(about = "KernelScript front end - lex, parse and check C-like sources")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input source file, checked when no subcommand is given
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the token stream
    Tokens {
        input: PathBuf,

        /// Emit tokens as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the syntax tree
    Parse {
        input: PathBuf,

        /// Report declarations skipped during error recovery
        #[arg(long)]
        debug: bool,
    },
    /// Check a source file for errors
    Check {
        input: PathBuf,

        /// Emit a JSON feedback report
        #[arg(long)]
        json: bool,
    },
    /// Print the control flow graph of one function
    Cfg {
        input: PathBuf,

        /// Function to build the graph for
        #[arg(short, long)]
        function: String,
    },
    /// Print version information
    Version,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match &cli.command {
        Some(Commands::Tokens { input, json }) => print_tokens(input, *json),
        Some(Commands::Parse { input, debug }) => print_tree(input, *debug),
        Some(Commands::Check { input, json }) => check_file(input, *json),
        Some(Commands::Cfg { input, function }) => print_function_cfg(input, function),
        Some(Commands::Version) => {
            println!("ksc 0.1.0");
            println!("KernelScript front end");
            println!("License: Apache-2.0");
            Ok(true)
        }
        None => match &cli.input {
            Some(input) => check_file(input, false),
            None => {
                eprintln!("Error: No input file specified");
                eprintln!("Usage: ksc <FILE> or ksc check <FILE>");
                process::exit(1);
            }
        },
    };

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

fn read_source(input: &Path) -> Result<String> {
    fs::read_to_string(input).with_context(|| format!("failed to read {}", input.display()))
}

fn file_name(input: &Path) -> String {
    input.display().to_string()
}

/// Lex the whole file, printing the error on failure
fn lex_file(input: &Path, source: &str) -> Option<Vec<Token>> {
    match tokenize(source, Some(file_name(input).as_str())) {
        Ok(tokens) => Some(tokens),
        Err(e) => {
            eprintln!("{}", e);
            None
        }
    }
}

fn print_tokens(input: &Path, json: bool) -> Result<bool> {
    let source = read_source(input)?;
    let Some(tokens) = lex_file(input, &source) else {
        return Ok(false);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&tokens).context("failed to serialize tokens")?);
    } else {
        for token in &tokens {
            println!(
                "{}\t{}\t{}",
                token.location,
                token.kind.category(),
                token.to_source()
            );
        }
    }
    Ok(true)
}

fn print_tree(input: &Path, debug: bool) -> Result<bool> {
    let source = read_source(input)?;
    let Some(tokens) = lex_file(input, &source) else {
        return Ok(false);
    };

    let mut parser = KsParser::new(tokens).with_debug(debug);
    let program = parser.parse();
    println!("{}", program.dump());

    let skipped = parser.recovered().len();
    if skipped > 0 && !debug {
        eprintln!("note: recovered from {} parse errors (rerun with --debug to list them)", skipped);
    }
    Ok(true)
}

fn check_file(input: &Path, json: bool) -> Result<bool> {
    let start = Instant::now();
    let source = read_source(input)?;
    let name = file_name(input);

    let tokens = match tokenize(&source, Some(name.as_str())) {
        Ok(tokens) => tokens,
        Err(e) => {
            if json {
                let report = ErrorReport::from_error(&e, &name);
                let feedback = CompilationFeedback::new(name, vec![report], CompilationStats::default());
                println!("{}", feedback.to_json());
            } else {
                eprintln!("{}", e);
            }
            return Ok(false);
        }
    };
    let token_count = tokens.len();

    let mut parser = KsParser::new(tokens);
    let program = parser.parse();
    let parse_time = start.elapsed();

    let mut analyzer = SemanticAnalyzer::new();
    let result = analyzer.analyze(&program);
    let total_time = start.elapsed();

    let mut diagnostics: Vec<ErrorReport> = parser
        .recovered()
        .iter()
        .map(|e| {
            let mut report = ErrorReport::from_error(e, &name);
            report.code = "W0002".to_string();
            report.severity = Severity::Warning;
            report
        })
        .collect();
    diagnostics.extend(analyzer.errors().iter().map(|e| ErrorReport::from_error(e, &name)));
    diagnostics.extend(analyzer.warnings().iter().map(|w| ErrorReport::from_warning(w, &name)));

    if json {
        let mut stats = CompilationStats::from_program(&program, &source);
        stats.token_count = token_count;
        stats.parse_time_ms = parse_time.as_millis() as u64;
        stats.semantic_time_ms = (total_time - parse_time).as_millis() as u64;
        stats.total_time_ms = total_time.as_millis() as u64;
        println!("{}", CompilationFeedback::new(name, diagnostics, stats).to_json());
    } else {
        for e in parser.recovered() {
            eprintln!("warning: skipped declaration: {}", e);
        }
        for warning in analyzer.warnings() {
            eprintln!("warning: {}", warning);
        }
        match &result {
            Ok(()) => println!("No errors found in {}", name),
            Err(e) => eprintln!("{}", e.clone().with_filename(name.as_str())),
        }
    }

    Ok(result.is_ok())
}

/// Last definition of `name` among the top-level declarations
fn find_function<'a>(program: &'a Node, name: &str) -> Option<&'a Node> {
    let NodeKind::Program { declarations } = &program.kind else {
        return None;
    };
    declarations.iter().rev().find(|decl| {
        matches!(&decl.kind, NodeKind::FunctionDecl { name: n, body: Some(_), .. } if n == name)
    })
}

fn print_function_cfg(input: &Path, function: &str) -> Result<bool> {
    let source = read_source(input)?;
    let Some(tokens) = lex_file(input, &source) else {
        return Ok(false);
    };

    let program = KsParser::new(tokens).parse();
    let Some(func) = find_function(&program, function) else {
        bail!("no definition of function '{}' in {}", function, input.display());
    };

    print!("{}", print_cfg(&build(func)));
    Ok(true)
}
