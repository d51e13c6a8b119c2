use crate::analyzer::Analyzer;
use crate::ast::Program;
use crate::config::Config;
use crate::error::ScriptError;
use crate::interpreter::Interpreter;
use crate::lexer::tokenize;
use crate::output::{OutputSink, StdoutSink};
use crate::parser::Parser;
use crate::value::Value;

/// Lexes, parses and (when `config.check` is set) analyzes `source`.
pub fn compile(source: &str, config: &Config) -> Result<Program, ScriptError> {
    let tokens = tokenize(source)?;
    let program = Parser::new(tokens).parse()?;

    if config.check {
        Analyzer::new().analyze(&program)?;
    }

    Ok(program)
}

/// Runs the whole pipeline, sending every printed value to `output`.
///
/// Values printed before a runtime error stay in `output`.
#[tracing::instrument(level = "debug", skip_all, fields(check = config.check))]
pub fn run_source<O: OutputSink>(
    source: &str,
    output: O,
    config: &Config,
) -> Result<Option<Value>, ScriptError> {
    let program = compile(source, config)?;
    Interpreter::with_config(output, config).run(&program)
}

/// Runs `source` against stdout and reports any error as a diagnostic.
pub fn run(source: &str, filename: Option<&str>, config: &Config) -> Result<(), ScriptError> {
    match run_source(source, StdoutSink, config) {
        Ok(_) => Ok(()),
        Err(error) => {
            if let Err(io_error) = error.report(source, filename) {
                tracing::warn!(%io_error, "failed to render diagnostic");
                eprintln!("{}", error);
            }
            Err(error)
        }
    }
}
