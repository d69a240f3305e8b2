use clap::Parser as ClapParser;
use env_logger::Env;
use std::{
    fs,
    io::{self, Write},
    process,
};

use cloister::{Error, Interpreter, Settings, Unit, Value, compile};
use parser::Span;

#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input source files to execute in order
    #[arg(required = false, help = "Source files to execute")]
    files: Vec<String>,

    /// Start REPL after executing files (default if no files)
    #[arg(long, help = "Force REPL mode after file execution")]
    repl: bool,

    /// Parse and bind only
    #[arg(long, help = "Report parse and scope errors without running")]
    check: bool,

    /// Print each class with its declared members and bound accessors
    #[arg(long, help = "Dump accessor bindings for inputs")]
    dump_bindings: bool,

    #[arg(long, default_value_t = Settings::default().max_call_depth)]
    max_depth: usize,

    /// Do not echo REPL results
    #[arg(long)]
    quiet: bool,
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let settings = Settings {
        max_call_depth: cli.max_depth,
        echo_results: !cli.quiet,
    };
    let mut interp = Interpreter::with_settings(settings);
    let static_only = cli.check || cli.dump_bindings;

    for filename in &cli.files {
        let source = match fs::read_to_string(filename) {
            Ok(content) => content,
            Err(err) => {
                eprintln!("Error reading file '{}': {}", filename, err);
                process::exit(1);
            }
        };

        if static_only {
            match compile(&source) {
                Ok(unit) => {
                    if cli.dump_bindings {
                        println!("== {} ==", filename);
                        dump_bindings(&unit);
                    }
                }
                Err(err) => {
                    eprintln!("{}", format_error(&source, &err));
                    process::exit(1);
                }
            }
            continue;
        }

        if let Err(err) = interp.run(&source) {
            eprintln!("Error executing {}:\n{}", filename, format_error(&source, &err));
            process::exit(1);
        }
    }

    if static_only {
        return;
    }

    if cli.repl || cli.files.is_empty() {
        run_repl(&mut interp);
    }
}

fn run_repl(interp: &mut Interpreter) {
    println!("Cloister REPL");
    println!("Type 'exit' to quit.");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut input_buffer = String::new();

    loop {
        print!("> ");
        if let Err(err) = stdout.flush() {
            eprintln!("Error flushing stdout: {}", err);
            break;
        }

        input_buffer.clear();
        match stdin.read_line(&mut input_buffer) {
            Ok(0) => break,
            Ok(_) => {
                let input = input_buffer.trim();
                if input == "exit" {
                    break;
                }
                if input.is_empty() {
                    continue;
                }

                match interp.run(input) {
                    Ok(Value::Undefined) => {}
                    Ok(value) => {
                        if interp.settings().echo_results {
                            println!("{:?}", value);
                        }
                    }
                    Err(err) => eprintln!("{}", format_error(input, &err)),
                }
            }
            Err(err) => {
                eprintln!("Error reading input: {}", err);
                break;
            }
        }
    }
}

fn dump_bindings(unit: &Unit) {
    for (_, info) in unit.bindings.constructs() {
        println!("class {} at {}", info.name, info.span.start);
        let private: Vec<&str> = info.private_names.iter().map(String::as_str).collect();
        let statics: Vec<&str> = info.static_names.iter().map(String::as_str).collect();
        println!("  private: [{}]", private.join(", "));
        println!("  static:  [{}]", statics.join(", "));
        println!("  accessor sites: {}", info.access_sites);
    }
}

fn format_error(source: &str, err: &Error) -> String {
    match err {
        Error::Parse(errors) => errors
            .iter()
            .map(|e| format_diagnostic(source, "Parse error", &e.message, e.span))
            .collect::<Vec<_>>()
            .join("\n"),
        Error::Scope(errors) => errors
            .iter()
            .map(|e| format_diagnostic(source, "Scope error", &e.message, e.span))
            .collect::<Vec<_>>()
            .join("\n"),
        Error::Runtime(err) => format!("Runtime error: {}", err),
    }
}

/// `kind: message` followed by the offending line with the span
/// underlined. Spans running past the end of their first line are cut off
/// there.
fn format_diagnostic(source: &str, kind: &str, message: &str, span: Span) -> String {
    let start = span.start.offset.min(source.len());
    let line_start = start - (span.start.column - 1).min(start);
    let line_end = source[line_start..]
        .find('\n')
        .map_or(source.len(), |i| line_start + i);
    let source_line = &source[line_start..line_end];

    let column = start - line_start;
    let width = span.len().min(line_end.saturating_sub(start)).max(1);

    let line_num = span.start.line.to_string();
    let pad = " ".repeat(line_num.len());

    format!(
        "{kind}: {message}\n\
         {pad}--> {}\n\
         {pad} |\n\
         {line_num} | {source_line}\n\
         {pad} | {}{}",
        span.start,
        " ".repeat(column),
        "^".repeat(width),
    )
}
