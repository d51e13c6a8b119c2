use ariadne::{Color, Fmt, Label, Report, ReportKind, Source};
use std::fmt;

/// Character offsets into the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn single(pos: usize) -> Self {
        Self {
            start: pos,
            end: pos + 1,
        }
    }

    pub fn to(&self, other: &Span) -> Span {
        Span::new(self.start, other.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    LexError,
    SyntaxError,
    UnclosedBlock,
    SemanticError,
    RuntimeError,
}

/// The pipeline pass that raised an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Lex,
    Parse,
    Semantic,
    Runtime,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Stage::Lex => "lex",
            Stage::Parse => "parse",
            Stage::Semantic => "semantic",
            Stage::Runtime => "runtime",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ScriptError {
    pub kind: ErrorKind,
    pub span: Span,
    pub message: String,
    pub help: Option<String>,
}

impl ScriptError {
    pub fn new(kind: ErrorKind, span: Span, message: String) -> Self {
        Self {
            kind,
            span,
            message,
            help: None,
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn lex_error(span: Span, message: String) -> Self {
        Self::new(ErrorKind::LexError, span, message)
    }

    pub fn syntax_error(span: Span, message: String) -> Self {
        Self::new(ErrorKind::SyntaxError, span, message)
    }

    pub fn unclosed_block(span: Span) -> Self {
        Self::new(
            ErrorKind::UnclosedBlock,
            span,
            "Unclosed block: expected '}'".to_string(),
        )
        .with_help("Every '{' must be closed with a matching '}'.")
    }

    pub fn semantic_error(span: Span, message: String) -> Self {
        Self::new(ErrorKind::SemanticError, span, message)
    }

    pub fn runtime_error(span: Span, message: String) -> Self {
        Self::new(ErrorKind::RuntimeError, span, message)
    }

    pub fn stage(&self) -> Stage {
        match self.kind {
            ErrorKind::LexError => Stage::Lex,
            ErrorKind::SyntaxError | ErrorKind::UnclosedBlock => Stage::Parse,
            ErrorKind::SemanticError => Stage::Semantic,
            ErrorKind::RuntimeError => Stage::Runtime,
        }
    }

    /// Prints an annotated diagnostic for this error to stderr.
    pub fn report(&self, source: &str, filename: Option<&str>) -> std::io::Result<()> {
        let filename = filename.unwrap_or("<repl>");

        let color = match self.stage() {
            Stage::Lex => Color::Red,
            Stage::Parse => Color::Yellow,
            Stage::Semantic => Color::Blue,
            Stage::Runtime => Color::Magenta,
        };

        let kind_str = match self.kind {
            ErrorKind::LexError => "Lexical Error",
            ErrorKind::SyntaxError => "Syntax Error",
            ErrorKind::UnclosedBlock => "Syntax Error",
            ErrorKind::SemanticError => "Semantic Error",
            ErrorKind::RuntimeError => "Runtime Error",
        };

        let mut report_builder = Report::build(ReportKind::Error, filename, self.span.start)
            .with_message(format!("{}: {}", kind_str.fg(color), self.message))
            .with_label(
                Label::new((filename, self.span.start..self.span.end))
                    .with_message(&self.message)
                    .with_color(color),
            );

        if let Some(ref help_text) = self.help {
            report_builder =
                report_builder.with_note(format!("{}: {}", "help".fg(Color::Cyan), help_text));
        }

        report_builder
            .finish()
            .eprint((filename, Source::from(source)))
    }
}
