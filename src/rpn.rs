//! Reverse-Polish argument programs and their evaluation.
//!
//! The parser compiles each command invocation's argument list into a
//! postfix program over a runtime stack of [`Argument`] values. Running
//! the program against the ambient scope produces the concrete argument
//! vector for the command.
//!
//! Two parallel stacks are maintained: `results` holds the values, and
//! `group_sizes` holds one entry per logical production recording how
//! many values that production contributed. The second stack exists
//! because unquoted list expansion makes "one logical argument" and "one
//! value" diverge: an unquoted argument may contribute zero, one, or many
//! values.
//!
//! Macro replay rewrites a cloned program with
//! [`RpnExpression::resolve_normal_var_refs`] before evaluation, so
//! formal-parameter references are substituted lexically while every
//! other reference keeps its dynamic lookup against the caller's scope.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::listfile::{Argument, Delim, FunctionExpr};
use crate::makefile::{Makefile, VarMap};
use crate::status::ExecutionStatus;

/// The line-number pseudo-variable answered from the reference's own
/// position instead of the scope.
const CURRENT_LIST_LINE: &str = "CMAKE_CURRENT_LIST_LINE";

/// A single postfix expression node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expr {
    /// Push a literal string.
    String { text: String },
    /// Push a bracket argument's verbatim payload.
    BracketArg { text: String, line: u32 },
    /// Concatenate `arity` groups into one quoted value.
    QuotedArg { arity: usize, line: u32 },
    /// Concatenate `arity` groups, then list-split the result.
    UnquotedArg { arity: usize, line: u32 },
    /// Concatenate `arity` groups into a name and look it up in the
    /// variable scope.
    NormalVarRef { arity: usize, line: u32 },
    /// As above, against the cache.
    CacheVarRef { arity: usize },
    /// As above, against the process environment.
    EnvVarRef { arity: usize },
    /// Dispatch the enclosing invocation through the executor and push
    /// its return value.
    CommandRef,
    /// Pop `arity` groups; the first value names the command, the rest
    /// become its argument vector.
    CommandCall { arity: usize, line: u32 },
}

/// Evaluation failure.
#[derive(Debug, Clone, Error)]
pub enum EvalError {
    /// The executor reported a failure.
    #[error("{0}")]
    Execution(String),

    /// A node consumed more values than the program had produced.
    #[error("argument expression underflow at line {line}")]
    StackUnderflow { line: u32 },

    /// The program finished with values still on the stack.
    #[error("argument expression left {count} unconsumed values")]
    Unbalanced { count: usize },
}

/// Mutable state threaded through one program walk.
struct EvaluationContext<'a> {
    makefile: &'a mut dyn Makefile,
    function: &'a mut FunctionExpr,
    /// Stack of expression results.
    results: Vec<Argument>,
    /// Stack of group sizes, aligned to productions.
    group_sizes: Vec<usize>,
}

impl EvaluationContext<'_> {
    /// Concatenate the top `arity` groups into one unquoted value.
    ///
    /// With arity 1 the top value is left in place; with arity 0 an empty
    /// value is pushed so downstream nodes always find their operand.
    fn concat(&mut self, arity: usize, line: u32) -> Result<(), EvalError> {
        match arity {
            0 => {
                self.results.push(Argument::new("", Delim::Unquoted, line));
                self.group_sizes.push(1);
            }
            1 => {}
            _ => {
                if self.results.len() < arity || self.group_sizes.len() < arity {
                    return Err(EvalError::StackUnderflow { line });
                }
                let pieces = self.results.split_off(self.results.len() - arity);
                let mut text =
                    String::with_capacity(pieces.iter().map(|p| p.value.len()).sum());
                for piece in &pieces {
                    text.push_str(&piece.value);
                }
                self.group_sizes.truncate(self.group_sizes.len() - arity);
                self.results.push(Argument::new(text, Delim::Unquoted, line));
                self.group_sizes.push(1);
            }
        }
        Ok(())
    }

    /// Pop the concatenated name and push the looked-up value in its
    /// place.
    fn resolve_reference(
        &mut self,
        arity: usize,
        line: u32,
        lookup: impl FnOnce(&mut dyn Makefile, &str) -> String,
    ) -> Result<(), EvalError> {
        self.concat(arity, line)?;
        let name = self
            .results
            .pop()
            .ok_or(EvalError::StackUnderflow { line })?;
        let value = lookup(self.makefile, &name.value);
        self.results.push(Argument::new(value, Delim::Unquoted, line));
        if let Some(size) = self.group_sizes.last_mut() {
            *size = 1;
        }
        Ok(())
    }
}

impl Expr {
    fn evaluate(&self, context: &mut EvaluationContext) -> Result<(), EvalError> {
        match self {
            Expr::String { text } => {
                context
                    .results
                    .push(Argument::new(text.clone(), Delim::Unquoted, 0));
                context.group_sizes.push(1);
            }

            Expr::BracketArg { text, line } => {
                context
                    .results
                    .push(Argument::new(text.clone(), Delim::Bracket, *line));
                context.group_sizes.push(1);
            }

            Expr::QuotedArg { arity, line } => {
                context.concat(*arity, *line)?;
                let top = context
                    .results
                    .last_mut()
                    .ok_or(EvalError::StackUnderflow { line: *line })?;
                top.delim = Delim::Quoted;
                top.line = *line;
            }

            Expr::UnquotedArg { arity, line } => {
                context.concat(*arity, *line)?;
                let value = context
                    .results
                    .pop()
                    .ok_or(EvalError::StackUnderflow { line: *line })?;
                context
                    .group_sizes
                    .pop()
                    .ok_or(EvalError::StackUnderflow { line: *line })?;
                let fragments = expand_list(&value.value);
                context.group_sizes.push(fragments.len());
                for fragment in fragments {
                    context
                        .results
                        .push(Argument::new(fragment, Delim::Unquoted, *line));
                }
            }

            Expr::NormalVarRef { arity, line } => {
                let line = *line;
                context.resolve_reference(*arity, line, |makefile, name| {
                    if name == CURRENT_LIST_LINE {
                        line.to_string()
                    } else {
                        makefile.get_def(name).unwrap_or_default()
                    }
                })?;
            }

            Expr::CacheVarRef { arity } => {
                context.resolve_reference(*arity, 0, |makefile, name| {
                    makefile.get_cache_entry(name).unwrap_or_default()
                })?;
            }

            Expr::EnvVarRef { arity } => {
                context.resolve_reference(*arity, 0, |makefile, name| {
                    makefile.get_env(name)
                })?;
            }

            Expr::CommandRef => {
                let mut status = ExecutionStatus::new();
                if !context
                    .makefile
                    .execute_command(context.function, &mut status)
                {
                    let message = status
                        .error()
                        .map(str::to_string)
                        .unwrap_or_else(|| "error executing command".to_string());
                    return Err(EvalError::Execution(message));
                }
                context.results.push(Argument::new(
                    status.release_return_value(),
                    Delim::Unquoted,
                    0,
                ));
                context.group_sizes.push(1);
            }

            Expr::CommandCall { arity, line } => {
                let mut value_count = 0usize;
                for _ in 0..*arity {
                    value_count += context
                        .group_sizes
                        .pop()
                        .ok_or(EvalError::StackUnderflow { line: *line })?;
                }
                if context.results.len() < value_count || value_count == 0 {
                    return Err(EvalError::StackUnderflow { line: *line });
                }
                let mut values = context
                    .results
                    .split_off(context.results.len() - value_count)
                    .into_iter();
                let name = values
                    .next()
                    .ok_or(EvalError::StackUnderflow { line: *line })?;
                context.function.name = name.value;
                context.function.arguments = values.collect();
            }
        }
        Ok(())
    }
}

/// An ordered postfix program.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RpnExpression {
    exprs: Vec<Expr>,
}

impl RpnExpression {
    pub fn push(&mut self, expr: Expr) {
        self.exprs.push(expr);
    }

    pub fn clear(&mut self) {
        self.exprs.clear();
    }

    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    pub fn nodes(&self) -> &[Expr] {
        &self.exprs
    }

    /// Run the program. Each node executes in order; the first failure
    /// aborts the walk. A successful run consumes the whole stack: the
    /// terminal `CommandCall` leaves both stacks empty, and leftovers are
    /// reported as [`EvalError::Unbalanced`].
    pub fn evaluate(
        &self,
        makefile: &mut dyn Makefile,
        function: &mut FunctionExpr,
    ) -> Result<(), EvalError> {
        let mut context = EvaluationContext {
            makefile,
            function,
            results: Vec::new(),
            group_sizes: Vec::new(),
        };
        for expr in &self.exprs {
            expr.evaluate(&mut context)?;
        }
        if !context.results.is_empty() || !context.group_sizes.is_empty() {
            return Err(EvalError::Unbalanced {
                count: context.results.len(),
            });
        }
        Ok(())
    }

    /// Substitute formal macro parameters.
    ///
    /// Every adjacent pair (`String(name)`, `NormalVarRef { arity: 1 }`)
    /// whose name is bound in `vars` collapses to a single `String` with
    /// the bound value. Scanning resumes *after* the inserted node, so a
    /// formal bound to its own reference text never re-substitutes.
    pub fn resolve_normal_var_refs(&mut self, vars: &VarMap) {
        let mut out = Vec::with_capacity(self.exprs.len());
        let mut iter = std::mem::take(&mut self.exprs).into_iter().peekable();
        while let Some(expr) = iter.next() {
            if let Expr::String { text } = &expr {
                let followed_by_ref =
                    matches!(iter.peek(), Some(Expr::NormalVarRef { arity: 1, .. }));
                if followed_by_ref {
                    if let Some(value) = vars.get(text) {
                        iter.next();
                        out.push(Expr::String {
                            text: value.clone(),
                        });
                        continue;
                    }
                }
            }
            out.push(expr);
        }
        self.exprs = out;
    }
}

impl FunctionExpr {
    /// Evaluate this invocation's program, filling `name` and
    /// `arguments`.
    ///
    /// The program is detached for the duration of the walk so that
    /// `CommandRef` nodes can hand the invocation itself to the executor.
    pub fn evaluate(&mut self, makefile: &mut dyn Makefile) -> Result<(), EvalError> {
        let rpn = std::mem::take(&mut self.rpn);
        let result = rpn.evaluate(makefile, self);
        self.rpn = rpn;
        result
    }
}

/// Split a value on unescaped `;`, dropping empty fragments. `\;` is
/// retained as a literal `;`.
fn expand_list(value: &str) -> Vec<String> {
    let mut fragments = Vec::new();
    let mut current = String::new();
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&';') => {
                chars.next();
                current.push(';');
            }
            ';' => {
                if !current.is_empty() {
                    fragments.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        fragments.push(current);
    }
    fragments
}
