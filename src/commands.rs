//! The language's own commands.
//!
//! Everything here consumes the [`Makefile`] capability rather than
//! engine internals: macro capture installs a function blocker, macro
//! replay re-executes captured invocations with formal parameters
//! statically substituted, `return`/`break` raise status flags, and
//! `cmake_language` routes `CALL` and `EVAL CODE` back through the
//! executor.

use crate::listfile::{Argument, Context, FunctionExpr};
use crate::makefile::{FunctionBlocker, Makefile, PolicyMap, VarMap};
use crate::status::ExecutionStatus;

/// Flow-control commands `cmake_language(CALL ...)` refuses to invoke.
const INVALID_CALL_COMMANDS: [&str; 12] = [
    "function",
    "endfunction",
    "macro",
    "endmacro",
    "if",
    "elseif",
    "else",
    "endif",
    "while",
    "endwhile",
    "foreach",
    "endforeach",
];

fn join_values(args: &[Argument]) -> String {
    args.iter()
        .map(|arg| arg.value.as_str())
        .collect::<Vec<_>>()
        .join(";")
}

// ============================================================
// macro / endmacro
// ============================================================

/// `macro(name p1 ... pk)` — install a blocker that captures the body
/// until the matching `endmacro()`.
pub fn macro_command(
    makefile: &mut dyn Makefile,
    args: &[Argument],
    status: &mut ExecutionStatus,
) -> bool {
    if args.is_empty() {
        status.set_error("called with incorrect number of arguments");
        return false;
    }
    let blocker = MacroFunctionBlocker {
        args: args.iter().map(|arg| arg.value.clone()).collect(),
        starting_context: makefile.execution_context(),
    };
    makefile.add_function_blocker(Box::new(blocker));
    true
}

/// An `endmacro` that reaches dispatch has no open definition to close.
pub fn endmacro_command(
    _makefile: &mut dyn Makefile,
    _args: &[Argument],
    status: &mut ExecutionStatus,
) -> bool {
    status.set_error(
        "An ENDMACRO command was found outside of a proper MACRO ENDMACRO structure. \
         Or its arguments did not match the opening MACRO command.",
    );
    false
}

/// Captures the command stream between `macro` and `endmacro`.
pub struct MacroFunctionBlocker {
    /// The macro name followed by its formal parameter names.
    args: Vec<String>,
    starting_context: Context,
}

impl FunctionBlocker for MacroFunctionBlocker {
    fn start_command_name(&self) -> &'static str {
        "macro"
    }

    fn end_command_name(&self) -> &'static str {
        "endmacro"
    }

    fn arguments_match(&self, function: &FunctionExpr) -> bool {
        function.arguments.is_empty() || function.arguments[0].value == self.args[0]
    }

    fn replay(
        &mut self,
        makefile: &mut dyn Makefile,
        functions: Vec<FunctionExpr>,
        _status: &mut ExecutionStatus,
    ) -> bool {
        makefile.append_property("MACROS", &self.args[0]);
        let command = MacroHelperCommand {
            args: std::mem::take(&mut self.args),
            functions,
            policies: makefile.record_policies(),
            file_path: self.starting_context.file_path.clone(),
        };
        let name = command.args[0].clone();
        makefile.add_scripted_command(&name, command);
        true
    }
}

// ============================================================
// Macro replay
// ============================================================

/// A closed macro definition, stored in the command table.
///
/// The captured body is shared across invocations and never mutated:
/// replay clones each invocation, rewrites the clone, and evaluates that.
#[derive(Debug, Clone)]
pub struct MacroHelperCommand {
    /// The macro name followed by its formal parameter names.
    pub args: Vec<String>,
    /// The captured body.
    pub functions: Vec<FunctionExpr>,
    /// Policy snapshot from definition time.
    pub policies: PolicyMap,
    /// File the definition started in.
    pub file_path: String,
}

impl MacroHelperCommand {
    /// Replay the captured body with the given actual arguments.
    pub fn invoke(
        &self,
        makefile: &mut dyn Makefile,
        args: &[Argument],
        status: &mut ExecutionStatus,
    ) -> bool {
        let formal_count = self.args.len().saturating_sub(1);
        if args.len() < formal_count {
            status.set_error(format!(
                "Macro invoked with incorrect arguments for macro named: {}",
                self.args[0]
            ));
            return false;
        }

        // First binding wins, so a formal shadows the implicit names.
        let mut vars = VarMap::new();
        for (i, arg) in args.iter().enumerate() {
            vars.entry(format!("ARGV{}", i))
                .or_insert_with(|| arg.value.clone());
            if i + 1 < self.args.len() {
                vars.entry(self.args[i + 1].clone())
                    .or_insert_with(|| arg.value.clone());
            }
        }
        vars.entry("ARGC".to_string())
            .or_insert_with(|| args.len().to_string());
        vars.entry("ARGV".to_string())
            .or_insert_with(|| join_values(args));
        vars.entry("ARGN".to_string())
            .or_insert_with(|| join_values(&args[formal_count..]));

        makefile.push_macro_scope(&self.file_path, &self.policies);
        let (result, quiet) = self.replay_body(makefile, &vars, status);
        makefile.pop_macro_scope(quiet);
        result
    }

    fn replay_body(
        &self,
        makefile: &mut dyn Makefile,
        vars: &VarMap,
        status: &mut ExecutionStatus,
    ) -> (bool, bool) {
        for function in &self.functions {
            let mut copy = function.clone();
            copy.rpn.resolve_normal_var_refs(vars);
            let mut nested = ExecutionStatus::new();
            if !makefile.execute_command(&mut copy, &mut nested) || nested.nested_error() {
                // The inner report already carries the call stack.
                status.set_nested_error();
                return (false, true);
            }
            if nested.return_invoked() {
                status.set_return_invoked();
                status.set_return_value(nested.release_return_value());
                return (true, false);
            }
            if nested.break_invoked() {
                status.set_break_invoked();
                return (true, false);
            }
        }
        (true, false)
    }
}

// ============================================================
// return / break
// ============================================================

/// `return(args...)` — joins its arguments into the status return value
/// and raises the return flag. The enclosing function or macro boundary
/// consumes it.
pub fn return_command(args: &[Argument], status: &mut ExecutionStatus) -> bool {
    status.set_return_value(join_values(args));
    status.set_return_invoked();
    true
}

/// `break()` — raises the break flag for the enclosing loop boundary.
pub fn break_command(_args: &[Argument], status: &mut ExecutionStatus) -> bool {
    status.set_break_invoked();
    true
}

// ============================================================
// cmake_language
// ============================================================

/// `cmake_language(CALL <cmd> <args...>)` and
/// `cmake_language(EVAL CODE <tokens...>)`.
pub fn cmake_language_command(
    makefile: &mut dyn Makefile,
    args: &[Argument],
    status: &mut ExecutionStatus,
) -> bool {
    if args.is_empty() {
        status.set_error("called with incorrect number of arguments");
        return false;
    }

    let context = makefile.execution_context();

    match args[0].value.as_str() {
        "CALL" => {
            if args.len() == 1 {
                status.set_error("called with incorrect number of arguments");
                return false;
            }

            let call_command = &args[1].value;
            let lowered = call_command.to_lowercase();
            if INVALID_CALL_COMMANDS.contains(&lowered.as_str()) {
                status.set_error(format!("invalid command specified: {}", call_command));
                return false;
            }

            let mut function = FunctionExpr::new(call_command.clone(), context.line);
            function.arguments = args[2..]
                .iter()
                .map(|arg| Argument::new(arg.value.clone(), arg.delim, context.line))
                .collect();
            let ok = makefile.execute_command(&mut function, status);
            if !ok {
                // The dispatched command already reported.
                status.set_nested_error();
            }
            ok
        }

        "EVAL" => {
            if args.len() < 2 {
                status.set_error("called with incorrect number of arguments");
                return false;
            }

            if args[1].value != "CODE" {
                if args[2..].iter().any(|arg| arg.value == "CODE") {
                    status.set_error(
                        "called with unsupported arguments between EVAL and CODE arguments",
                    );
                } else {
                    status.set_error("called without CODE argument");
                }
                return false;
            }

            let code = args[2..]
                .iter()
                .map(|arg| arg.value.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            let ok = makefile.read_list_file_as_string(
                &code,
                &format!("{}:{}:EVAL", context.file_path, context.line),
            );
            if !ok {
                // The nested read already reported.
                status.set_nested_error();
            }
            ok
        }

        _ => {
            status.set_error("called with unknown meta-operation");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listfile::Delim;

    fn arg(value: &str) -> Argument {
        Argument::new(value, Delim::Unquoted, 1)
    }

    #[test]
    fn test_return_joins_with_semicolons() {
        let mut status = ExecutionStatus::new();
        assert!(return_command(&[arg("a"), arg("b")], &mut status));
        assert!(status.return_invoked());
        assert_eq!(status.release_return_value(), "a;b");
    }

    #[test]
    fn test_return_with_no_arguments() {
        let mut status = ExecutionStatus::new();
        assert!(return_command(&[], &mut status));
        assert!(status.return_invoked());
        assert_eq!(status.release_return_value(), "");
    }

    #[test]
    fn test_break_sets_flag() {
        let mut status = ExecutionStatus::new();
        assert!(break_command(&[], &mut status));
        assert!(status.break_invoked());
    }

    #[test]
    fn test_blocker_end_arguments_match() {
        let blocker = MacroFunctionBlocker {
            args: vec!["m".to_string(), "p".to_string()],
            starting_context: Context::default(),
        };
        let mut bare_end = FunctionExpr::new("endmacro", 1);
        assert!(blocker.arguments_match(&bare_end));
        bare_end.arguments.push(arg("m"));
        assert!(blocker.arguments_match(&bare_end));
        bare_end.arguments[0] = arg("other");
        assert!(!blocker.arguments_match(&bare_end));
    }
}
