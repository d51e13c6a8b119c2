use crate::analyzer::Analyzer;
use crate::ast::{Expr, Stmt};
use crate::config::Config;
use crate::error::ScriptError;
use crate::interpreter::Interpreter;
use crate::lexer::tokenize;
use crate::output::OutputSink;
use crate::parser::Parser;
use crate::value::Value;
use std::io::{self, BufRead, Write};

/// Interpreter state that survives between REPL lines.
pub struct Session<O: OutputSink> {
    analyzer: Analyzer,
    interpreter: Interpreter<O>,
    check: bool,
}

impl<O: OutputSink> Session<O> {
    pub fn new(output: O, config: &Config) -> Self {
        Self {
            analyzer: Analyzer::new(),
            interpreter: Interpreter::with_config(output, config),
            check: config.check,
        }
    }

    pub fn output(&self) -> &O {
        self.interpreter.output()
    }

    /// Runs one line. A line holding a single non-assignment expression
    /// yields its value so the caller can echo it.
    ///
    /// If the line fails, the analyzer forgets whatever the line declared,
    /// so names the interpreter never bound can be declared again.
    pub fn eval_line(&mut self, source: &str) -> Result<Option<Value>, ScriptError> {
        let tokens = tokenize(source)?;
        let program = Parser::new(tokens).parse()?;

        let checkpoint = self.analyzer.clone();
        if self.check {
            self.analyzer.analyze(&program)?;
        }

        let result = match program.statements.as_slice() {
            [Stmt::Expression { expr, .. }] if !matches!(expr, Expr::Assign { .. }) => {
                self.interpreter.evaluate_expression(expr).map(Some)
            }
            _ => self.interpreter.run(&program),
        };

        if result.is_err() {
            self.analyzer = checkpoint;
        }
        result
    }
}

pub fn start(config: &Config) {
    println!("sencillo v{}", env!("CARGO_PKG_VERSION"));
    println!("Type 'salir' or press Ctrl+D to quit");
    println!();

    let mut session = Session::new(crate::output::StdoutSink, config);
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        if io::stdout().flush().is_err() {
            break;
        }

        let line = match lines.next() {
            None => {
                println!();
                break;
            }
            Some(Ok(line)) => line,
            Some(Err(error)) => {
                eprintln!("Error reading input: {}", error);
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "salir" {
            println!("¡Adiós!");
            break;
        }

        match session.eval_line(line) {
            Ok(Some(Value::Nothing)) | Ok(None) => {}
            Ok(Some(value)) => println!("{}", value),
            Err(error) => {
                if error.report(line, None).is_err() {
                    eprintln!("{}", error);
                }
            }
        }
    }
}
