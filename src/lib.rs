// Sencillo Language Interpreter Library
//
// Front end and tree-walking evaluator for a small imperative scripting
// language with Spanish keywords (variable, imprimir, si/sino, mientras,
// para, funcion, retornar). Hosts supply source text and receive printed
// values through an `OutputSink`, or a structured `ScriptError`.

// Public modules
pub mod analyzer;
pub mod ast;
pub mod config;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod logging;
pub mod output;
pub mod parser;
pub mod repl;
pub mod runner;
pub mod value;

// Re-export commonly used items
pub use analyzer::Analyzer;
pub use ast::{Expr, Program, Stmt};
pub use config::Config;
pub use error::{ErrorKind, ScriptError, Span, Stage};
pub use interpreter::{Flow, Interpreter};
pub use lexer::{tokenize, Lexer, Token, TokenCategory, TokenType};
pub use output::{OutputSink, StdoutSink};
pub use parser::{parse, Parser};
pub use value::Value;

// Re-export main functions
pub use repl::start as start_repl;
pub use runner::{compile, run, run_source};
