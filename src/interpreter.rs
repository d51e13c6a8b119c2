use crate::ast::{BinaryOp, Expr, FunctionDecl, Program, Stmt};
use crate::config::Config;
use crate::error::{ScriptError, Span};
use crate::output::{OutputSink, StdoutSink};
use crate::value::Value;
use std::collections::HashMap;
use std::rc::Rc;

/// Result of executing a statement: keep going, or unwind to the nearest
/// call boundary carrying a returned value.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal,
    Return(Value),
}

/// A declared function as stored in the function table.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub params: Vec<String>,
    pub body: Stmt,
}

impl From<&FunctionDecl> for FunctionDef {
    fn from(decl: &FunctionDecl) -> Self {
        Self {
            params: decl.params.clone(),
            body: (*decl.body).clone(),
        }
    }
}

type Frame = HashMap<String, Value>;

/// Stack left before a call grows the native stack.
const RED_ZONE: usize = 100 * 1024;

/// Size of each new stack segment.
const STACK_PER_CALL: usize = 1024 * 1024;

/// Tree-walking interpreter.
///
/// `frames[0]` is the global frame and is never popped. Each user-function
/// call pushes one frame; identifier reads and writes only ever touch the
/// topmost frame, so a function body cannot see its caller's variables or
/// the globals.
pub struct Interpreter<O: OutputSink = StdoutSink> {
    frames: Vec<Frame>,
    functions: HashMap<String, Rc<FunctionDef>>,
    output: O,
    max_call_depth: usize,
}

impl Default for Interpreter<StdoutSink> {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter<StdoutSink> {
    pub fn new() -> Self {
        Self::with_output(StdoutSink)
    }
}

impl<O: OutputSink> Interpreter<O> {
    pub fn with_output(output: O) -> Self {
        Self::with_config(output, &Config::default())
    }

    pub fn with_config(output: O, config: &Config) -> Self {
        Self {
            frames: vec![Frame::new()],
            functions: HashMap::new(),
            output,
            max_call_depth: config.max_call_depth,
        }
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn into_output(self) -> O {
        self.output
    }

    /// Looks up a variable in the global frame.
    pub fn global(&self, name: &str) -> Option<&Value> {
        self.frames[0].get(name)
    }

    pub fn call_depth(&self) -> usize {
        self.frames.len() - 1
    }

    /// Executes every statement in order. A top-level `retornar` ends the
    /// program early and its value is returned.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn run(&mut self, program: &Program) -> Result<Option<Value>, ScriptError> {
        for statement in &program.statements {
            if let Flow::Return(value) = self.execute_statement(statement)? {
                tracing::debug!(%value, "program returned early");
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    pub fn execute_statement(&mut self, stmt: &Stmt) -> Result<Flow, ScriptError> {
        match stmt {
            Stmt::VariableDeclaration { name, value, .. } => {
                let value = self.evaluate_expression(value)?;
                self.current_frame_mut().insert(name.clone(), value);
                Ok(Flow::Normal)
            }
            Stmt::Print { expr, .. } => {
                let value = self.evaluate_expression(expr)?;
                self.output.print(&value);
                Ok(Flow::Normal)
            }
            Stmt::Expression { expr, .. } => {
                self.evaluate_expression(expr)?;
                Ok(Flow::Normal)
            }
            Stmt::Return { value, .. } => Ok(Flow::Return(self.evaluate_expression(value)?)),
            Stmt::Block { statements, .. } => self.execute_block(statements),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                if self.evaluate_expression(condition)?.is_truthy() {
                    self.execute_statement(then_branch)
                } else if let Some(else_stmt) = else_branch {
                    self.execute_statement(else_stmt)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While {
                condition, body, ..
            } => {
                while self.evaluate_expression(condition)?.is_truthy() {
                    if let flow @ Flow::Return(_) = self.execute_statement(body)? {
                        return Ok(flow);
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::For {
                initializer,
                condition,
                increment,
                body,
                ..
            } => {
                if let flow @ Flow::Return(_) = self.execute_statement(initializer)? {
                    return Ok(flow);
                }

                while self.evaluate_expression(condition)?.is_truthy() {
                    // A return skips the increment
                    if let flow @ Flow::Return(_) = self.execute_statement(body)? {
                        return Ok(flow);
                    }
                    self.evaluate_expression(increment)?;
                }
                Ok(Flow::Normal)
            }
            Stmt::FunctionDeclaration(decl) => {
                tracing::trace!(name = %decl.name, arity = decl.params.len(), "declared function");
                self.functions
                    .insert(decl.name.clone(), Rc::new(FunctionDef::from(decl)));
                Ok(Flow::Normal)
            }
        }
    }

    fn execute_block(&mut self, statements: &[Stmt]) -> Result<Flow, ScriptError> {
        for statement in statements {
            if let flow @ Flow::Return(_) = self.execute_statement(statement)? {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    pub fn evaluate_expression(&mut self, expr: &Expr) -> Result<Value, ScriptError> {
        match expr {
            Expr::Literal { value, .. } => Ok(value.clone()),
            Expr::Identifier { name, span } => {
                self.current_frame().get(name).cloned().ok_or_else(|| {
                    ScriptError::runtime_error(
                        span.clone(),
                        format!("Undefined variable '{}'", name),
                    )
                })
            }
            Expr::Assign { name, value, .. } => {
                let value = self.evaluate_expression(value)?;
                self.current_frame_mut().insert(name.clone(), value.clone());
                Ok(value)
            }
            Expr::Binary {
                left,
                operator,
                right,
                span,
            } => {
                let left_val = self.evaluate_expression(left)?;
                let right_val = self.evaluate_expression(right)?;
                evaluate_binary_op(*operator, left_val, right_val, span)
            }
            Expr::Call { name, args, span } => self.call_function(name, args, span),
        }
    }

    fn call_function(&mut self, name: &str, args: &[Expr], span: &Span) -> Result<Value, ScriptError> {
        let function = match self.functions.get(name) {
            Some(function) => Rc::clone(function),
            None => {
                return Err(ScriptError::runtime_error(
                    span.clone(),
                    format!("Undefined function '{}'", name),
                ))
            }
        };

        if function.params.len() != args.len() {
            return Err(ScriptError::runtime_error(
                span.clone(),
                format!(
                    "Function '{}' expects {} arguments, but got {}",
                    name,
                    function.params.len(),
                    args.len()
                ),
            ));
        }

        if self.call_depth() >= self.max_call_depth {
            return Err(ScriptError::runtime_error(
                span.clone(),
                "Maximum call depth exceeded".to_string(),
            )
            .with_help(format!(
                "Calls may nest at most {} deep. Check for unbounded recursion.",
                self.max_call_depth
            )));
        }

        // Arguments are evaluated in the caller's frame
        let mut frame = Frame::with_capacity(args.len());
        for (param, arg) in function.params.iter().zip(args) {
            let value = self.evaluate_expression(arg)?;
            frame.insert(param.clone(), value);
        }

        tracing::trace!(name, depth = self.call_depth() + 1, "push frame");
        self.frames.push(frame);
        // Each nested call recurses on the native stack, grown on demand
        let result = stacker::maybe_grow(RED_ZONE, STACK_PER_CALL, || {
            self.execute_statement(&function.body)
        });
        self.frames.pop();
        tracing::trace!(name, depth = self.call_depth(), "pop frame");

        match result? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Nothing),
        }
    }

    fn current_frame(&self) -> &Frame {
        let top = self.frames.len() - 1;
        &self.frames[top]
    }

    fn current_frame_mut(&mut self) -> &mut Frame {
        let top = self.frames.len() - 1;
        &mut self.frames[top]
    }
}

fn evaluate_binary_op(
    operator: BinaryOp,
    left: Value,
    right: Value,
    span: &Span,
) -> Result<Value, ScriptError> {
    let mismatch = |verb: &str, l: &Value, r: &Value| {
        ScriptError::runtime_error(
            span.clone(),
            format!("Cannot {} {} and {}", verb, l.type_name(), r.type_name()),
        )
    };

    match operator {
        BinaryOp::Add => match (left, right) {
            (Value::Number(l), Value::Number(r)) => Ok(Value::Number(l + r)),
            (Value::String(l), r) => Ok(Value::String(format!("{}{}", l, r))),
            (l, Value::String(r)) => Ok(Value::String(format!("{}{}", l, r))),
            (l, r) => Err(mismatch("add", &l, &r)),
        },
        BinaryOp::Subtract => match (left, right) {
            (Value::Number(l), Value::Number(r)) => Ok(Value::Number(l - r)),
            (l, r) => Err(mismatch("subtract", &l, &r)),
        },
        BinaryOp::Multiply => match (left, right) {
            (Value::Number(l), Value::Number(r)) => Ok(Value::Number(l * r)),
            (l, r) => Err(mismatch("multiply", &l, &r)),
        },
        // Division by zero follows IEEE-754 and yields an infinity or NaN
        BinaryOp::Divide => match (left, right) {
            (Value::Number(l), Value::Number(r)) => Ok(Value::Number(l / r)),
            (l, r) => Err(mismatch("divide", &l, &r)),
        },
        BinaryOp::Equal => Ok(Value::Bool(left == right)),
        BinaryOp::NotEqual => Ok(Value::Bool(left != right)),
        BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => {
            let ordering = match (&left, &right) {
                (Value::Number(l), Value::Number(r)) => l.partial_cmp(r),
                (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
                _ => return Err(mismatch("compare", &left, &right)),
            };
            let result = match ordering {
                // NaN compares false with everything
                None => false,
                Some(ordering) => match operator {
                    BinaryOp::Less => ordering.is_lt(),
                    BinaryOp::LessEqual => ordering.is_le(),
                    BinaryOp::Greater => ordering.is_gt(),
                    _ => ordering.is_ge(),
                },
            };
            Ok(Value::Bool(result))
        }
    }
}
