// End-to-end behaviour of the pipeline: analysis, evaluation and output.

use pretty_assertions::assert_eq;
use sencillo::ast::{BinaryOp, Expr, Program, Stmt};
use sencillo::error::{ErrorKind, ScriptError, Span, Stage};
use sencillo::repl::Session;
use sencillo::config::DEFAULT_MAX_CALL_DEPTH;
use sencillo::{parse, run_source, tokenize, Analyzer, Config, Interpreter, OutputSink, Value};

fn run(source: &str) -> Result<Vec<String>, ScriptError> {
    run_with(source, &Config::default())
}

fn run_with(source: &str, config: &Config) -> Result<Vec<String>, ScriptError> {
    let mut output: Vec<String> = Vec::new();
    run_source(source, &mut output, config)?;
    Ok(output)
}

fn semantic_error(source: &str) -> ScriptError {
    let program = parse(tokenize(source).unwrap()).unwrap();
    Analyzer::new().analyze(&program).unwrap_err()
}

fn parse_source(source: &str) -> Program {
    parse(tokenize(source).unwrap()).unwrap()
}

// ============================================================================
// Front end
// ============================================================================

#[test]
fn tokens_reconstruct_the_source_without_whitespace() {
    let source = "variable x = 5;\nimprimir( x + 1 ) ;\nsi (x >= 2) { imprimir(\"ok\"); }";
    let joined: String = tokenize(source)
        .unwrap()
        .iter()
        .map(|token| token.lexeme.as_str())
        .collect();
    let expected: String = source.chars().filter(|c| !c.is_whitespace()).collect();
    assert_eq!(joined, expected);
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    let program = parse_source("1 + 2 * 3;");
    let literal = |n: f64, start: usize| Expr::Literal {
        value: Value::Number(n),
        span: Span::new(start, start + 1),
    };

    let expected = Program {
        statements: vec![Stmt::Expression {
            expr: Expr::Binary {
                left: Box::new(literal(1.0, 0)),
                operator: BinaryOp::Add,
                right: Box::new(Expr::Binary {
                    left: Box::new(literal(2.0, 4)),
                    operator: BinaryOp::Multiply,
                    right: Box::new(literal(3.0, 8)),
                    span: Span::new(4, 9),
                }),
                span: Span::new(0, 9),
            },
            span: Span::new(0, 10),
        }],
    };
    assert_eq!(program, expected);

    assert_eq!(run("imprimir(1 + 2 * 3);").unwrap(), vec!["7"]);
    assert_eq!(run("imprimir((1 + 2) * 3);").unwrap(), vec!["9"]);
}

#[test]
fn operators_are_left_associative() {
    assert_eq!(run("imprimir(10 - 4 - 3);").unwrap(), vec!["3"]);
    assert_eq!(run("imprimir(24 / 4 / 2);").unwrap(), vec!["3"]);
}

#[test]
fn assignment_is_right_associative() {
    let program = parse_source("x = y = 3;");
    match &program.statements[0] {
        Stmt::Expression {
            expr: Expr::Assign { name, value, .. },
            ..
        } => {
            assert_eq!(name, "x");
            assert!(matches!(value.as_ref(), Expr::Assign { name, .. } if name == "y"));
        }
        other => panic!("expected an assignment, got {:?}", other),
    }

    let output = run("variable x = 0; variable y = 0; x = y = 3; imprimir(x); imprimir(y);");
    assert_eq!(output.unwrap(), vec!["3", "3"]);
}

// ============================================================================
// End to end
// ============================================================================

#[test]
fn prints_declared_variable_plus_one() {
    assert_eq!(run("variable x = 5; imprimir(x + 1);").unwrap(), vec!["6"]);
}

#[test]
fn if_else_takes_only_the_true_branch() {
    let output = run(r#"si (1 < 2) { imprimir("a"); } sino { imprimir("b"); }"#);
    assert_eq!(output.unwrap(), vec!["a"]);

    let output = run(r#"si (2 < 1) { imprimir("a"); } sino { imprimir("b"); }"#);
    assert_eq!(output.unwrap(), vec!["b"]);
}

#[test]
fn while_and_for_loops() {
    let output = run("variable i = 0; mientras (i < 3) { imprimir(i); i = i + 1; }");
    assert_eq!(output.unwrap(), vec!["0", "1", "2"]);

    let output = run("para (variable i = 0; i < 3; i = i + 1) { imprimir(i * 10); }");
    assert_eq!(output.unwrap(), vec!["0", "10", "20"]);
}

#[test]
fn return_inside_while_stops_the_loop() {
    let source = r#"
        funcion parcial(n) {
            variable total = 0;
            variable i = 1;
            mientras (i <= n) {
                total = total + i;
                si (i == 3) {
                    retornar total;
                }
                i = i + 1;
            }
            retornar total;
        }
        imprimir(parcial(10));
        imprimir(parcial(2));
    "#;
    assert_eq!(run(source).unwrap(), vec!["6", "3"]);
}

#[test]
fn return_inside_for_skips_the_update() {
    let source = r#"
        funcion primero(limite) {
            para (variable i = 0; i < limite; i = i + 1) {
                si (i == 2) {
                    retornar i;
                }
            }
            retornar 99;
        }
        imprimir(primero(5));
        imprimir(primero(1));
    "#;
    assert_eq!(run(source).unwrap(), vec!["2", "99"]);
}

#[test]
fn recursion() {
    let source = r#"
        funcion factorial(n) {
            si (n < 2) {
                retornar 1;
            }
            retornar n * factorial(n - 1);
        }
        funcion fib(n) {
            si (n < 2) { retornar n; }
            retornar fib(n - 1) + fib(n - 2);
        }
        imprimir(factorial(5));
        imprimir(fib(10));
    "#;
    assert_eq!(run(source).unwrap(), vec!["120", "55"]);
}

#[test]
fn function_without_return_yields_nothing() {
    let output = run("funcion f() { variable x = 1; } imprimir(f());");
    assert_eq!(output.unwrap(), vec!["nada"]);
}

#[test]
fn top_level_return_ends_the_program() {
    let mut output: Vec<String> = Vec::new();
    let result = run_source("imprimir(1); retornar 2 + 2; imprimir(3);", &mut output, &Config::default());
    assert_eq!(result.unwrap(), Some(Value::Number(4.0)));
    assert_eq!(output, vec!["1"]);

    let result = run_source("variable x = 1;", Vec::<String>::new(), &Config::default());
    assert_eq!(result.unwrap(), None);
}

#[test]
fn value_rendering() {
    let source = r#"
        imprimir("hola " + "mundo");
        imprimir("n = " + 3);
        imprimir(7 / 2);
        imprimir(1 / 0);
        imprimir(2 > 1);
        imprimir(1 == "1");
        imprimir("abc" < "abd");
    "#;
    assert_eq!(
        run(source).unwrap(),
        vec!["hola mundo", "n = 3", "3.5", "Infinity", "verdadero", "falso", "verdadero"]
    );
}

// ============================================================================
// Semantic analysis
// ============================================================================

#[test]
fn block_variables_are_not_visible_after_the_block() {
    let error = semantic_error("si (1) { variable z = 1; } imprimir(z);");
    assert_eq!(error.kind, ErrorKind::SemanticError);
    assert_eq!(error.message, "Variable 'z' is not declared");

    let error = semantic_error("mientras (0) { variable w = 1; } imprimir(w);");
    assert_eq!(error.message, "Variable 'w' is not declared");

    let error = semantic_error("para (variable i = 0; i < 2; i = i + 1) { } imprimir(i);");
    assert_eq!(error.message, "Variable 'i' is not declared");
}

#[test]
fn arity_mismatch_never_reaches_the_interpreter() {
    for call in ["suma(1)", "suma(1, 2, 3)"] {
        let source = format!(
            "imprimir(0); funcion suma(a, b) {{ retornar a + b; }} imprimir({});",
            call
        );
        let mut output: Vec<String> = Vec::new();
        let error = run_source(&source, &mut output, &Config::default()).unwrap_err();
        assert_eq!(error.stage(), Stage::Semantic);
        assert!(error.message.contains("expects 2 arguments"), "{}", error.message);
        assert!(output.is_empty());
    }
}

#[test]
fn redeclaration_in_the_same_scope() {
    let error = semantic_error("variable x = 1; variable x = 2;");
    assert_eq!(error.message, "Variable 'x' is already declared in this scope");

    let error = semantic_error("funcion f() { } funcion f() { }");
    assert_eq!(error.message, "Function 'f' is already declared");

    let error = semantic_error("funcion f(a, a) { }");
    assert_eq!(error.message, "Variable 'a' is already declared in this scope");

    // Shadowing in a nested block is allowed
    let program = parse_source("variable x = 1; si (x) { variable x = 2; }");
    assert!(Analyzer::new().analyze(&program).is_ok());
}

#[test]
fn function_names_are_unique_across_the_program() {
    let sources = [
        r#"
            funcion f(a, b) { retornar a + b; }
            si (1 < 2) { funcion f(a) { retornar a; } }
            imprimir(f(1, 2));
        "#,
        r#"
            funcion g(a) { retornar a; }
            funcion h() { funcion g() { retornar 0; } retornar 1; }
            imprimir(h());
            imprimir(g(5));
        "#,
        r#"
            mientras (0) { funcion k() { } }
            funcion k() { }
        "#,
    ];

    for source in sources {
        let mut output: Vec<String> = Vec::new();
        let error = run_source(source, &mut output, &Config::default()).unwrap_err();
        assert_eq!(error.stage(), Stage::Semantic);
        assert!(error.message.ends_with("is already declared"), "{}", error.message);
        assert!(output.is_empty());
    }

    // A variable may still share its name with a function
    assert_eq!(run("funcion n() { retornar 2; } si (1) { variable n = 3; imprimir(n); }").unwrap(), vec!["3"]);
}

#[test]
fn functions_do_not_see_global_variables() {
    let source = "variable g = 1; funcion f() { retornar g; } imprimir(f());";
    let error = semantic_error(source);
    assert_eq!(error.message, "Variable 'g' is not declared");

    let error = run_with(source, &Config::default().without_check()).unwrap_err();
    assert_eq!(error.stage(), Stage::Runtime);
    assert_eq!(error.message, "Undefined variable 'g'");
}

#[test]
fn functions_see_other_functions() {
    let source = r#"
        funcion doble(x) { retornar x * 2; }
        funcion cuadruple(x) { retornar doble(doble(x)); }
        imprimir(cuadruple(3));
    "#;
    assert_eq!(run(source).unwrap(), vec!["12"]);
}

#[test]
fn names_must_be_used_as_declared() {
    let error = semantic_error("funcion f() { } imprimir(f);");
    assert_eq!(error.message, "'f' is a function and cannot be used as a value");

    let error = semantic_error("variable v = 1; v();");
    assert_eq!(error.message, "'v' is a variable, not a function");

    let error = semantic_error("g();");
    assert_eq!(error.message, "Function 'g' is not declared");

    let error = semantic_error("variable x = x;");
    assert_eq!(error.message, "Variable 'x' is not declared");

    let error = semantic_error("imprimir(f()); funcion f() { retornar 1; }");
    assert_eq!(error.message, "Function 'f' is not declared");
}

// ============================================================================
// Runtime
// ============================================================================

#[test]
fn output_before_a_runtime_error_is_kept() {
    let mut output: Vec<String> = Vec::new();
    let config = Config::default().without_check();
    let error = run_source("imprimir(1); imprimir(y); imprimir(2);", &mut output, &config).unwrap_err();
    assert_eq!(error.kind, ErrorKind::RuntimeError);
    assert_eq!(error.message, "Undefined variable 'y'");
    assert_eq!(output, vec!["1"]);
}

#[test]
fn runtime_checks_without_analysis() {
    let config = Config::default().without_check();

    let error = run_with("g();", &config).unwrap_err();
    assert_eq!(error.message, "Undefined function 'g'");

    let error = run_with("funcion f(a) { retornar a; } f(1, 2);", &config).unwrap_err();
    assert_eq!(error.message, "Function 'f' expects 1 arguments, but got 2");

    let error = run_with("imprimir(\"a\" - 1);", &config).unwrap_err();
    assert_eq!(error.message, "Cannot subtract cadena and numero");

    let error = run_with("imprimir(1 < \"a\");", &config).unwrap_err();
    assert_eq!(error.message, "Cannot compare numero and cadena");
}

#[test]
fn assignments_inside_functions_stay_local() {
    let source = "variable x = 1; funcion f() { x = 5; retornar x; } imprimir(f()); imprimir(x);";
    let output = run_with(source, &Config::default().without_check());
    assert_eq!(output.unwrap(), vec!["5", "1"]);
}

#[test]
fn unbounded_recursion_hits_the_call_depth_limit() {
    let config = Config::default().with_max_call_depth(50);
    let error = run_with("funcion f(n) { retornar f(n + 1); } f(0);", &config).unwrap_err();
    assert_eq!(error.stage(), Stage::Runtime);
    assert_eq!(error.message, "Maximum call depth exceeded");
}

#[test]
fn recursion_just_under_the_default_limit_completes() {
    let depth = DEFAULT_MAX_CALL_DEPTH - 1;
    let source = format!(
        "funcion f(n) {{ si (n < 1) {{ retornar 0; }} retornar 1 + f(n - 1); }} imprimir(f({}));",
        depth
    );
    assert_eq!(run(&source).unwrap(), vec![depth.to_string()]);

    let source = format!(
        "funcion f(n) {{ si (n < 1) {{ retornar 0; }} retornar 1 + f(n - 1); }} imprimir(f({}));",
        depth + 1
    );
    assert_eq!(run(&source).unwrap_err().message, "Maximum call depth exceeded");
}

#[test]
fn deep_recursion_with_a_raised_limit() {
    let config = Config::default().with_max_call_depth(20_000);
    let source = "funcion f(n) { si (n < 1) { retornar 0; } retornar 1 + f(n - 1); } imprimir(f(10000));";
    assert_eq!(run_with(source, &config).unwrap(), vec!["10000"]);
}

#[test]
fn interpreter_state_after_a_run() {
    let program = parse_source("variable total = 0; para (variable i = 1; i <= 4; i = i + 1) { total = total + i; }");
    let mut interpreter = Interpreter::with_output(Vec::<String>::new());
    assert_eq!(interpreter.run(&program).unwrap(), None);
    assert_eq!(interpreter.global("total"), Some(&Value::Number(10.0)));
    assert_eq!(interpreter.call_depth(), 0);
    assert!(interpreter.into_output().is_empty());
}

#[derive(Default)]
struct Recorder {
    values: Vec<Value>,
}

impl OutputSink for Recorder {
    fn print(&mut self, value: &Value) {
        self.values.push(value.clone());
    }
}

#[test]
fn custom_output_sink_receives_values() {
    let mut recorder = Recorder::default();
    run_source("imprimir(1); imprimir(\"dos\"); imprimir(1 != 1);", &mut recorder, &Config::default()).unwrap();
    assert_eq!(
        recorder.values,
        vec![
            Value::Number(1.0),
            Value::String("dos".to_string()),
            Value::Bool(false)
        ]
    );
}

#[test]
fn errors_report_their_stage() {
    assert_eq!(run("x = 1 @ 2;").unwrap_err().stage(), Stage::Lex);
    assert_eq!(run("x = ;").unwrap_err().stage(), Stage::Parse);
    assert_eq!(run("si (1) {").unwrap_err().stage(), Stage::Parse);
    assert_eq!(run("imprimir(x);").unwrap_err().stage(), Stage::Semantic);
    assert_eq!(run("imprimir(\"a\" * 2);").unwrap_err().stage(), Stage::Runtime);
}

// ============================================================================
// REPL session
// ============================================================================

#[test]
fn repl_session_keeps_state_between_lines() {
    let mut session = Session::new(Vec::<String>::new(), &Config::default());

    assert_eq!(session.eval_line("variable a = 1;").unwrap(), None);
    assert_eq!(session.eval_line("a + 1;").unwrap(), Some(Value::Number(2.0)));
    assert_eq!(session.eval_line("funcion doble(n) { retornar n * 2; }").unwrap(), None);
    assert_eq!(session.eval_line("doble(a + 1);").unwrap(), Some(Value::Number(4.0)));
    assert_eq!(session.eval_line("a = 7;").unwrap(), None);
    session.eval_line("imprimir(a);").unwrap();

    let error = session.eval_line("variable a = 5;").unwrap_err();
    assert_eq!(error.stage(), Stage::Semantic);

    // A line that fails analysis leaves no declarations behind
    assert!(session.eval_line("variable b = 1; variable b = 2;").is_err());
    assert_eq!(session.eval_line("variable b = 3;").unwrap(), None);

    // Nor does a line that fails while running
    let error = session.eval_line("variable x = \"a\" - 1;").unwrap_err();
    assert_eq!(error.stage(), Stage::Runtime);
    let error = session.eval_line("imprimir(x);").unwrap_err();
    assert_eq!(error.stage(), Stage::Semantic);
    assert_eq!(session.eval_line("variable x = 1;").unwrap(), None);
    session.eval_line("imprimir(x);").unwrap();

    assert_eq!(session.output(), &vec!["7".to_string(), "1".to_string()]);
}
