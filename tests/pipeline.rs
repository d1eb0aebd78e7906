//! End-to-end tests for the parse/evaluate pipeline.
//!
//! These tests exercise the complete path from source text through the
//! scanner, the parser's compiled argument programs, the evaluator, and
//! the reference engine's macro and meta-command handling.

use listfile::rpn::Expr;
use listfile::{Delim, EngineError, FunctionExpr, Parser, ScriptEngine};

/// Parse source and return the compiled invocations.
fn parse(source: &str) -> Vec<FunctionExpr> {
    let mut parser = Parser::new(source);
    parser.parse().expect("parse failed");
    parser.take_function_list()
}

/// Parse source and evaluate every invocation against the given engine,
/// returning the evaluated invocations.
fn evaluate(source: &str, engine: &mut ScriptEngine) -> Vec<FunctionExpr> {
    parse(source)
        .into_iter()
        .map(|mut function| {
            function.evaluate(engine).expect("evaluation failed");
            function
        })
        .collect()
}

/// Run a script through the engine, expecting success.
fn run(source: &str) -> ScriptEngine {
    let mut engine = ScriptEngine::new();
    engine.run_string(source, "script.cmake").expect("script failed");
    engine
}

/// Run a script through the engine, expecting failure.
fn run_err(source: &str) -> EngineError {
    let mut engine = ScriptEngine::new();
    engine
        .run_string(source, "script.cmake")
        .expect_err("expected the script to fail")
}

// ============================================================
// Scenario tests
// ============================================================

#[test]
fn test_quoted_argument_with_variable() {
    let mut engine = ScriptEngine::new();
    engine.set_variable("NAME", "world");
    let functions = evaluate(r#"message("hello ${NAME}")"#, &mut engine);

    assert_eq!(functions.len(), 1);
    assert_eq!(functions[0].name, "message");
    assert_eq!(functions[0].arguments.len(), 1);
    assert_eq!(functions[0].arguments[0].value, "hello world");
    assert_eq!(functions[0].arguments[0].delim, Delim::Quoted);
}

#[test]
fn test_unquoted_list_splitting() {
    let mut engine = ScriptEngine::new();
    let functions = evaluate("set(a b;c d)", &mut engine);

    assert_eq!(functions[0].name, "set");
    let values: Vec<&str> = functions[0]
        .arguments
        .iter()
        .map(|arg| arg.value.as_str())
        .collect();
    assert_eq!(values, vec!["a", "b", "c", "d"]);
}

#[test]
fn test_bracket_argument_is_verbatim() {
    let mut engine = ScriptEngine::new();
    let functions = evaluate("set(x [==[ raw ${not_expanded} ]==])", &mut engine);

    assert_eq!(functions[0].arguments.len(), 2);
    assert_eq!(functions[0].arguments[1].value, " raw ${not_expanded} ");
    assert_eq!(functions[0].arguments[1].delim, Delim::Bracket);
}

#[test]
fn test_macro_replay_substitutes_parameters() {
    let engine = run("macro(m p)\nmessage(${p})\nendmacro()\nm(hi)");
    assert_eq!(engine.messages(), ["hi"]);
}

#[test]
fn test_cmake_language_call() {
    let engine = run(r#"cmake_language(CALL message "x")"#);
    assert_eq!(engine.messages(), ["x"]);
}

#[test]
fn test_cmake_language_eval_code() {
    let engine = run("cmake_language(EVAL CODE set(a 1))");
    assert_eq!(engine.get_variable("a"), Some("1"));
}

// ============================================================
// Macro semantics
// ============================================================

#[test]
fn test_macro_argc_argv_argn() {
    let engine = run(
        "macro(m a b)\n\
         message(\"${ARGC}|${ARGV}|${ARGN}|${ARGV0}|${ARGV2}\")\n\
         endmacro()\n\
         m(one two three four)",
    );
    assert_eq!(engine.messages(), ["4|one;two;three;four|three;four|one|three"]);
}

#[test]
fn test_macro_with_too_few_arguments() {
    let error = run_err("macro(m a b)\nendmacro()\nm(one)");
    assert!(error
        .to_string()
        .contains("Macro invoked with incorrect arguments for macro named: m"));
}

#[test]
fn test_macro_substitution_is_not_relexed() {
    // The caller binds p to the literal text `${y}` (via escapes); the
    // substituted body must print that text, not resolve y.
    let engine = run(
        "set(y boom)\n\
         macro(m p)\n\
         message(${p})\n\
         endmacro()\n\
         m(\\${y\\})",
    );
    assert_eq!(engine.messages(), ["${y}"]);
}

#[test]
fn test_nested_macro_definitions() {
    // The inner macro is only defined when the outer one runs.
    let engine = run(
        "macro(outer)\n\
         macro(inner)\n\
         message(in)\n\
         endmacro()\n\
         endmacro()\n\
         outer()\n\
         inner()",
    );
    assert_eq!(engine.messages(), ["in"]);
}

#[test]
fn test_inner_macro_is_not_defined_before_outer_runs() {
    let error = run_err(
        "macro(outer)\n\
         macro(inner)\n\
         endmacro()\n\
         endmacro()\n\
         inner()",
    );
    assert!(error.to_string().contains("Unknown CMake command"));
}

#[test]
fn test_macro_body_sees_caller_variables_dynamically() {
    // Non-parameter references keep dynamic lookup against the caller's
    // scope at invocation time.
    let engine = run(
        "macro(show)\n\
         message(${current})\n\
         endmacro()\n\
         set(current first)\n\
         show()\n\
         set(current second)\n\
         show()",
    );
    assert_eq!(engine.messages(), ["first", "second"]);
}

#[test]
fn test_return_propagates_out_of_macro() {
    let engine = run(
        "macro(bail)\n\
         message(before)\n\
         return(done)\n\
         message(inside-after)\n\
         endmacro()\n\
         bail()\n\
         message(file-after)",
    );
    // The body stops at return, and the file scope consumes the flag.
    assert_eq!(engine.messages(), ["before"]);
}

#[test]
fn test_macro_error_is_reported_once() {
    let error = run_err(
        "macro(bad)\n\
         no_such_command()\n\
         endmacro()\n\
         bad()",
    );
    assert!(error.to_string().contains("Unknown CMake command"));
}

#[test]
fn test_macro_invocations_do_not_mutate_the_body() {
    let engine = run(
        "macro(m p)\n\
         message(${p})\n\
         endmacro()\n\
         m(first)\n\
         m(second)",
    );
    assert_eq!(engine.messages(), ["first", "second"]);
}

// ============================================================
// cmake_language error forms
// ============================================================

#[test]
fn test_cmake_language_without_arguments() {
    let error = run_err("cmake_language()");
    assert!(error
        .to_string()
        .contains("called with incorrect number of arguments"));
}

#[test]
fn test_cmake_language_call_rejects_flow_control() {
    let error = run_err("cmake_language(CALL macro m)");
    assert!(error.to_string().contains("invalid command specified: macro"));

    let error = run_err("cmake_language(CALL EndMacro)");
    assert!(error
        .to_string()
        .contains("invalid command specified: EndMacro"));
}

#[test]
fn test_cmake_language_eval_without_code() {
    let error = run_err("cmake_language(EVAL set(a 1))");
    assert!(error.to_string().contains("called without CODE argument"));
}

#[test]
fn test_cmake_language_eval_with_stray_arguments() {
    let error = run_err("cmake_language(EVAL x CODE set(a 1))");
    assert!(error
        .to_string()
        .contains("called with unsupported arguments between EVAL and CODE arguments"));
}

#[test]
fn test_cmake_language_unknown_operation() {
    let error = run_err("cmake_language(FROBNICATE)");
    assert!(error.to_string().contains("called with unknown meta-operation"));
}

#[test]
fn test_cmake_language_eval_parse_error_fails() {
    let error = run_err("cmake_language(EVAL CODE set\\()");
    assert!(matches!(error, EngineError::Execution(_)));
}

// ============================================================
// Pseudo-variables and references
// ============================================================

#[test]
fn test_current_list_line() {
    let engine = run("set(pad 1)\nset(pad 2)\nmessage(${CMAKE_CURRENT_LIST_LINE})");
    assert_eq!(engine.messages(), ["3"]);
}

#[test]
fn test_cache_and_environment_references() {
    std::env::set_var("LISTFILE_PIPELINE_TEST", "env-value");
    let mut engine = ScriptEngine::new();
    engine.set_cache_entry("CACHED", "cache-value");
    engine
        .run_string(
            "message($CACHE{CACHED})\nmessage($ENV{LISTFILE_PIPELINE_TEST})",
            "script.cmake",
        )
        .expect("script failed");
    assert_eq!(engine.messages(), ["cache-value", "env-value"]);
}

#[test]
fn test_undefined_reference_in_quoted_context_is_empty() {
    let engine = run(r#"message("[${UNDEFINED_NAME}]")"#);
    assert_eq!(engine.messages(), ["[]"]);
}

#[test]
fn test_escaped_semicolon_survives_list_splitting() {
    let mut engine = ScriptEngine::new();
    let functions = evaluate("m(a\\;b)", &mut engine);
    assert_eq!(functions[0].arguments.len(), 1);
    assert_eq!(functions[0].arguments[0].value, "a;b");
}

// ============================================================
// Program shape invariants
// ============================================================

/// Group-level stack effect of one node: (consumed, produced).
fn stack_effect(expr: &Expr) -> (usize, usize) {
    match expr {
        Expr::String { .. } | Expr::BracketArg { .. } | Expr::CommandRef => (0, 1),
        Expr::QuotedArg { arity, .. }
        | Expr::UnquotedArg { arity, .. }
        | Expr::NormalVarRef { arity, .. } => (*arity, 1),
        Expr::CacheVarRef { arity } | Expr::EnvVarRef { arity } => (*arity, 1),
        Expr::CommandCall { arity, .. } => (*arity, 0),
    }
}

#[test]
fn test_prefix_balance_of_compiled_programs() {
    let sources = [
        "set(a b)",
        r#"message("hello ${NAME} and $ENV{HOME}")"#,
        "m(${a${b}c} [[x]] \"\" a\\;b c${d}e)",
        "m()\nn(a b c d e)",
    ];
    for source in sources {
        for function in parse(source) {
            let mut balance = 0isize;
            for expr in function.rpn.nodes() {
                let (consumed, produced) = stack_effect(expr);
                balance -= consumed as isize;
                assert!(balance >= 0, "negative prefix balance in {:?}", source);
                balance += produced as isize;
            }
            assert_eq!(balance, 0, "unbalanced program for {:?}", source);
        }
    }
}

#[test]
fn test_every_evaluation_drains_the_stack() {
    // A successful evaluation implies both stacks emptied: leftovers are
    // reported as an error by the evaluator.
    let mut engine = ScriptEngine::new();
    engine.set_variable("list", "1;2;3");
    let source = "m(${list} \"${list}\" [[raw]] a${list}b)\nn()";
    for mut function in parse(source) {
        assert!(function.evaluate(&mut engine).is_ok());
    }
}

#[test]
fn test_parse_failure_keeps_partial_function_list() {
    let mut parser = Parser::new("set(a b)\nmessage(\"unterminated");
    assert!(parser.parse().is_err());
    assert_eq!(parser.function_list().len(), 1);
    assert!(parser.message().is_some());
}
