//! Capability traits consumed by the evaluator and the commands.
//!
//! The evaluator never owns state: variable, cache and environment
//! lookups, command dispatch, and function-blocker registration all go
//! through [`Makefile`]. The reference implementation lives in
//! [`crate::engine`]; tests substitute their own.

use std::collections::{BTreeMap, HashMap};

use crate::commands::MacroHelperCommand;
use crate::listfile::{Context, FunctionExpr};
use crate::status::ExecutionStatus;

/// Snapshot of policy settings, ordered by policy id.
pub type PolicyMap = BTreeMap<String, String>;

/// Parameter-name to literal-value bindings for one macro invocation.
pub type VarMap = HashMap<String, String>;

/// The ambient scope and executor a list file evaluates against.
pub trait Makefile {
    /// Look up a variable in the current scope.
    fn get_def(&self, name: &str) -> Option<String>;

    /// Look up a cache entry.
    fn get_cache_entry(&self, name: &str) -> Option<String>;

    /// Look up a process environment variable; empty string on miss.
    fn get_env(&self, name: &str) -> String;

    /// Whether execution is currently inside a macro body.
    fn is_in_macro_scope(&self) -> bool;

    /// Evaluate and dispatch a single command invocation.
    ///
    /// Returns false on failure; the status carries the error message and
    /// any flow-control flags the command raised.
    fn execute_command(&mut self, function: &mut FunctionExpr, status: &mut ExecutionStatus)
        -> bool;

    /// Parse and execute a list file given as a string, under a virtual
    /// file name.
    fn read_list_file_as_string(&mut self, code: &str, virtual_file_name: &str) -> bool;

    /// Install a function blocker; it intercepts every command until its
    /// matching end command closes it.
    fn add_function_blocker(&mut self, blocker: Box<dyn FunctionBlocker>);

    /// Register a scripted command (a closed macro) under its name.
    fn add_scripted_command(&mut self, name: &str, command: MacroHelperCommand);

    /// Append a value to a `;`-list property.
    fn append_property(&mut self, name: &str, value: &str);

    /// Snapshot the current policy settings.
    fn record_policies(&self) -> PolicyMap;

    /// The current execution context (file path and line).
    fn execution_context(&self) -> Context;

    /// Enter a macro scope: the given file path and policy snapshot apply
    /// until the matching pop.
    fn push_macro_scope(&mut self, file_path: &str, policies: &PolicyMap);

    /// Leave the innermost macro scope. `quiet` suppresses scope-teardown
    /// reporting when a nested error was already surfaced.
    fn pop_macro_scope(&mut self, quiet: bool);
}

/// Intercepts the command stream between a start/end keyword pair.
///
/// The driver counts nested occurrences of the start command and hands
/// the blocker the captured body when the matching end arrives.
pub trait FunctionBlocker {
    /// The command that opens another nesting level (e.g. `macro`).
    fn start_command_name(&self) -> &'static str;

    /// The command that closes a nesting level (e.g. `endmacro`).
    fn end_command_name(&self) -> &'static str;

    /// Whether the end command's evaluated arguments match this blocker.
    fn arguments_match(&self, function: &FunctionExpr) -> bool;

    /// Consume the captured body when the blocker closes.
    fn replay(
        &mut self,
        makefile: &mut dyn Makefile,
        functions: Vec<FunctionExpr>,
        status: &mut ExecutionStatus,
    ) -> bool;
}
