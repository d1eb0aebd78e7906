//! # listfile
//!
//! A parser and evaluator core for the CMake list-file language.
//!
//! The language has a non-trivial argument grammar — bracket arguments,
//! quoted arguments, unquoted arguments, nested variable references,
//! cache and environment references — whose evaluation must be
//! deferrable: a macro body is captured at definition time and replayed
//! at call time, with formal-parameter references substituted *before*
//! variable-lookup semantics apply. Each command invocation is therefore
//! compiled to a reverse-Polish program over a stack of argument values,
//! which makes both deferred replay and static parameter substitution a
//! program rewrite instead of a re-parse.
//!
//! ## Pipeline
//!
//! ```text
//! Source -> Scanner -> Parser -> FunctionExpr (RPN) -> Evaluator -> Arguments
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use listfile::{Parser, ScriptEngine};
//!
//! // Parse only:
//! let mut parser = Parser::new(r#"message("hello ${NAME}")"#);
//! parser.parse().expect("parse failed");
//! assert_eq!(parser.function_list().len(), 1);
//!
//! // Parse and evaluate through the reference engine:
//! let mut engine = ScriptEngine::new();
//! engine.set_variable("NAME", "world");
//! engine
//!     .run_string(r#"message("hello ${NAME}")"#, "<string>")
//!     .expect("evaluation failed");
//! assert_eq!(engine.messages(), ["hello world"]);
//! ```
//!
//! ## Module Overview
//!
//! - [`span`] - Source location tracking
//! - [`diagnostics`] - Error reporting infrastructure
//! - [`lexer`] - The modal scanner
//! - [`parser`] - Recursive descent parsing straight into RPN
//! - [`listfile`] - Arguments, invocations, execution contexts
//! - [`rpn`] - The postfix expression model and its evaluator
//! - [`status`] - Per-command execution status and flow-control flags
//! - [`makefile`] - The scope/executor capability traits
//! - [`commands`] - macro/endmacro, return, break, cmake_language
//! - [`engine`] - A minimal reference engine driving all of the above

pub mod commands;
pub mod diagnostics;
pub mod engine;
pub mod lexer;
pub mod listfile;
pub mod makefile;
pub mod parser;
pub mod rpn;
pub mod span;
pub mod status;

// Re-export commonly used types
pub use diagnostics::{Diagnostic, DiagnosticEmitter, ErrorCode, ParseError};
pub use engine::{EngineError, ScriptEngine};
pub use lexer::{Scanner, Token, TokenKind, VarRefKind};
pub use listfile::{Argument, Context, Delim, FunctionExpr};
pub use makefile::{FunctionBlocker, Makefile, PolicyMap, VarMap};
pub use parser::{DebugMode, Parser};
pub use rpn::{EvalError, Expr, RpnExpression};
pub use span::Span;
pub use status::ExecutionStatus;
