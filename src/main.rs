use clap::{value_parser, Arg, ArgAction, Command};
use sencillo::config::{Config, DEFAULT_MAX_CALL_DEPTH};
use sencillo::{logging, repl, runner, tokenize, Parser, ScriptError};
use std::fs;
use std::path::Path;
use std::process::ExitCode;

fn main() -> ExitCode {
    let matches = Command::new("sencillo")
        .about("Interpreter for a small imperative language with Spanish keywords")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("file")
                .help("The script file to execute")
                .value_name("FILE")
                .index(1),
        )
        .arg(
            Arg::new("interactive")
                .short('i')
                .long("interactive")
                .help("Start in interactive REPL mode")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("tokens")
                .long("tokens")
                .help("Print the token stream instead of running")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("ast")
                .long("ast")
                .help("Print the syntax tree instead of running")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-check")
                .long("no-check")
                .help("Skip semantic analysis before running")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("max-depth")
                .long("max-depth")
                .value_name("N")
                .help(format!("Maximum nesting of function calls [default: {}]", DEFAULT_MAX_CALL_DEPTH))
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Log pipeline stages to stderr")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    logging::init_tracing(matches.get_flag("verbose"));

    let mut config = Config::default();
    if matches.get_flag("no-check") {
        config = config.without_check();
    }
    if let Some(depth) = matches.get_one::<usize>("max-depth") {
        config = config.with_max_call_depth(*depth);
    }

    let Some(file_path) = matches.get_one::<String>("file") else {
        repl::start(&config);
        return ExitCode::SUCCESS;
    };

    let source = match read_source(file_path) {
        Ok(source) => source,
        Err(message) => {
            eprintln!("Error: {}", message);
            return ExitCode::FAILURE;
        }
    };

    let result = if matches.get_flag("tokens") {
        dump_tokens(&source, file_path)
    } else if matches.get_flag("ast") {
        dump_ast(&source, file_path)
    } else {
        runner::run(&source, Some(file_path), &config)
    };

    if matches.get_flag("interactive") {
        repl::start(&config);
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}

fn read_source(path: &str) -> Result<String, String> {
    let path = Path::new(path);

    if !path.exists() {
        return Err(format!("File '{}' not found", path.display()));
    }

    fs::read_to_string(path).map_err(|e| format!("Cannot read file '{}': {}", path.display(), e))
}

fn dump_tokens(source: &str, filename: &str) -> Result<(), ScriptError> {
    let tokens = tokenize(source).map_err(|e| report(e, source, filename))?;
    for token in tokens {
        println!("{:?} {:?} {}..{}", token.token_type, token.lexeme, token.span.start, token.span.end);
    }
    Ok(())
}

fn dump_ast(source: &str, filename: &str) -> Result<(), ScriptError> {
    let program = tokenize(source)
        .and_then(|tokens| Parser::new(tokens).parse())
        .map_err(|e| report(e, source, filename))?;
    println!("{:#?}", program);
    Ok(())
}

fn report(error: ScriptError, source: &str, filename: &str) -> ScriptError {
    if error.report(source, Some(filename)).is_err() {
        eprintln!("{}", error);
    }
    error
}
