//! Static scope and arity checking.
//!
//! Function bodies see their own parameters and locals plus every function
//! declared in an enclosing scope. Variables declared outside the function,
//! globals included, are not visible inside it; the interpreter enforces the
//! same rule at runtime with one frame per call.
//!
//! Function names form a single program-wide namespace, mirroring the
//! interpreter's function table: a name may be declared as a function only
//! once, whatever block or function body the declaration sits in.

use crate::ast::{Expr, FunctionDecl, Program, Stmt};
use crate::error::{ScriptError, Span};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Symbol {
    Variable,
    Function { arity: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Global,
    Block,
    Function,
}

#[derive(Debug, Clone)]
struct Scope {
    kind: ScopeKind,
    symbols: HashMap<String, Symbol>,
}

impl Scope {
    fn new(kind: ScopeKind) -> Self {
        Self {
            kind,
            symbols: HashMap::new(),
        }
    }
}

/// Validates a program without touching it. The global scope persists
/// across calls to [`Analyzer::analyze`] so a REPL can check line by line.
#[derive(Debug, Clone)]
pub struct Analyzer {
    scopes: Vec<Scope>,
    /// Every function declared so far, by name, with its arity.
    functions: HashMap<String, usize>,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new(ScopeKind::Global)],
            functions: HashMap::new(),
        }
    }

    /// Checks every statement, failing on the first error. On failure the
    /// analyzer is restored to the state it had before the call.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn analyze(&mut self, program: &Program) -> Result<(), ScriptError> {
        let snapshot = self.clone();

        let result = program
            .statements
            .iter()
            .try_for_each(|stmt| self.check_statement(stmt));

        if let Err(ref error) = result {
            tracing::debug!(%error, "semantic analysis failed");
            *self = snapshot;
        }
        result
    }

    fn push_scope(&mut self, kind: ScopeKind) {
        self.scopes.push(Scope::new(kind));
    }

    fn pop_scope(&mut self) {
        // The global scope is never popped
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    fn with_scope<F>(&mut self, kind: ScopeKind, check: F) -> Result<(), ScriptError>
    where
        F: FnOnce(&mut Self) -> Result<(), ScriptError>,
    {
        self.push_scope(kind);
        let result = check(self);
        self.pop_scope();
        result
    }

    fn declare(&mut self, name: &str, symbol: Symbol, span: &Span) -> Result<(), ScriptError> {
        let Some(scope) = self.scopes.last_mut() else {
            unreachable!("analyzer always has a global scope");
        };

        if scope.symbols.contains_key(name) {
            let what = match symbol {
                Symbol::Variable => "Variable",
                Symbol::Function { .. } => "Function",
            };
            return Err(ScriptError::semantic_error(
                span.clone(),
                format!("{} '{}' is already declared in this scope", what, name),
            ));
        }

        scope.symbols.insert(name.to_string(), symbol);
        Ok(())
    }

    /// Walks from the innermost scope outwards. Variables stop being visible
    /// once a function boundary has been crossed; functions stay visible.
    fn resolve(&self, name: &str) -> Option<&Symbol> {
        let mut crossed_function = false;
        for scope in self.scopes.iter().rev() {
            match scope.symbols.get(name) {
                Some(Symbol::Variable) if crossed_function => {}
                Some(symbol) => return Some(symbol),
                None => {}
            }
            if scope.kind == ScopeKind::Function {
                crossed_function = true;
            }
        }
        None
    }

    fn check_statement(&mut self, stmt: &Stmt) -> Result<(), ScriptError> {
        match stmt {
            Stmt::VariableDeclaration { name, value, span } => {
                // The initializer cannot refer to the variable being declared
                self.check_expression(value)?;
                self.declare(name, Symbol::Variable, span)
            }
            Stmt::Print { expr, .. } | Stmt::Expression { expr, .. } => {
                self.check_expression(expr)
            }
            Stmt::Return { value, .. } => self.check_expression(value),
            Stmt::Block { statements, .. } => self.with_scope(ScopeKind::Block, |this| {
                statements.iter().try_for_each(|s| this.check_statement(s))
            }),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                self.check_expression(condition)?;
                self.check_statement(then_branch)?;
                if let Some(else_stmt) = else_branch {
                    self.check_statement(else_stmt)?;
                }
                Ok(())
            }
            Stmt::While {
                condition, body, ..
            } => {
                self.check_expression(condition)?;
                self.check_statement(body)
            }
            Stmt::For {
                initializer,
                condition,
                increment,
                body,
                ..
            } => self.with_scope(ScopeKind::Block, |this| {
                this.check_statement(initializer)?;
                this.check_expression(condition)?;
                this.check_expression(increment)?;
                this.check_statement(body)
            }),
            Stmt::FunctionDeclaration(decl) => self.check_function(decl),
        }
    }

    fn check_function(&mut self, decl: &FunctionDecl) -> Result<(), ScriptError> {
        if self.functions.contains_key(&decl.name) {
            return Err(ScriptError::semantic_error(
                decl.span.clone(),
                format!("Function '{}' is already declared", decl.name),
            )
            .with_help("Function names are shared by the whole program, even inside blocks and other functions."));
        }

        // Declared before the body is checked so recursion resolves
        self.declare(
            &decl.name,
            Symbol::Function {
                arity: decl.params.len(),
            },
            &decl.span,
        )?;
        self.functions.insert(decl.name.clone(), decl.params.len());

        self.with_scope(ScopeKind::Function, |this| {
            for param in &decl.params {
                this.declare(param, Symbol::Variable, &decl.span)?;
            }
            this.check_statement(&decl.body)
        })
    }

    fn check_expression(&mut self, expr: &Expr) -> Result<(), ScriptError> {
        match expr {
            Expr::Literal { .. } => Ok(()),
            Expr::Identifier { name, span } => self.check_identifier(name, span),
            Expr::Binary { left, right, .. } => {
                self.check_expression(left)?;
                self.check_expression(right)
            }
            Expr::Assign { name, value, span } => {
                self.check_identifier(name, span)?;
                self.check_expression(value)
            }
            Expr::Call { name, args, span } => {
                match self.resolve(name) {
                    Some(Symbol::Function { arity }) => {
                        if *arity != args.len() {
                            return Err(ScriptError::semantic_error(
                                span.clone(),
                                format!(
                                    "Function '{}' expects {} argument{}, but got {}",
                                    name,
                                    arity,
                                    if *arity == 1 { "" } else { "s" },
                                    args.len()
                                ),
                            ));
                        }
                    }
                    Some(Symbol::Variable) => {
                        return Err(ScriptError::semantic_error(
                            span.clone(),
                            format!("'{}' is a variable, not a function", name),
                        ));
                    }
                    None => {
                        return Err(ScriptError::semantic_error(
                            span.clone(),
                            format!("Function '{}' is not declared", name),
                        )
                        .with_help("Functions must be declared with 'funcion' before they are called."));
                    }
                }
                args.iter().try_for_each(|arg| self.check_expression(arg))
            }
        }
    }

    fn check_identifier(&self, name: &str, span: &Span) -> Result<(), ScriptError> {
        match self.resolve(name) {
            Some(Symbol::Variable) => Ok(()),
            Some(Symbol::Function { .. }) => Err(ScriptError::semantic_error(
                span.clone(),
                format!("'{}' is a function and cannot be used as a value", name),
            )),
            None => Err(ScriptError::semantic_error(
                span.clone(),
                format!("Variable '{}' is not declared", name),
            )
            .with_help("Declare it first with: variable nombre = valor;")),
        }
    }
}
