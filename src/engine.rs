//! A minimal script engine.
//!
//! The reference implementation of the [`Makefile`] capabilities: an
//! in-memory variable scope, cache, policy and property maps, a
//! case-insensitive command table, and the function-blocker driver that
//! makes macro capture work. It exists so the pipeline is drivable end
//! to end — the `eval` subcommand and the integration tests run through
//! it — and makes no attempt to be a complete interpreter.
//!
//! Execution of one command:
//!
//! 1. evaluate the invocation's argument program (filling name and
//!    arguments);
//! 2. offer the evaluated invocation to the innermost function blocker,
//!    which may absorb it into a captured body;
//! 3. otherwise dispatch through the command table.
//!
//! Failures are reported once, at the frame that produced them; the
//! nested-error flag keeps outer frames from repeating the report.

use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use thiserror::Error;

use crate::commands::{self, MacroHelperCommand};
use crate::listfile::{Argument, Context, Delim, FunctionExpr};
use crate::makefile::{FunctionBlocker, Makefile, PolicyMap};
use crate::parser::{DebugMode, Parser};
use crate::status::ExecutionStatus;

/// Engine-level failure.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    Parse(String),

    #[error("{0}")]
    Execution(String),

    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

type BuiltinFn = fn(&mut ScriptEngine, &[Argument], &mut ExecutionStatus) -> bool;

#[derive(Clone)]
enum EngineCommand {
    Builtin(BuiltinFn),
    Macro(Rc<MacroHelperCommand>),
}

struct BlockerEntry {
    blocker: Box<dyn FunctionBlocker>,
    /// Open nested start/end pairs inside the captured region.
    depth: u32,
    functions: Vec<FunctionExpr>,
}

struct MacroScope {
    saved_policies: PolicyMap,
    file_path: String,
}

/// The reference scope/executor implementation.
pub struct ScriptEngine {
    variables: HashMap<String, String>,
    cache: HashMap<String, String>,
    properties: HashMap<String, String>,
    policies: PolicyMap,
    commands: HashMap<String, EngineCommand>,
    blockers: Vec<BlockerEntry>,
    contexts: Vec<Context>,
    macro_scopes: Vec<MacroScope>,
    messages: Vec<String>,
    errors: Vec<String>,
    debug_mode: DebugMode,
    strict: bool,
}

impl ScriptEngine {
    pub fn new() -> Self {
        let mut engine = Self {
            variables: HashMap::new(),
            cache: HashMap::new(),
            properties: HashMap::new(),
            policies: PolicyMap::new(),
            commands: HashMap::new(),
            blockers: Vec::new(),
            contexts: Vec::new(),
            macro_scopes: Vec::new(),
            messages: Vec::new(),
            errors: Vec::new(),
            debug_mode: DebugMode::Disabled,
            strict: false,
        };
        engine.add_builtin("set", builtin_set);
        engine.add_builtin("unset", builtin_unset);
        engine.add_builtin("message", builtin_message);
        engine.add_builtin("macro", cmd_macro);
        engine.add_builtin("endmacro", cmd_endmacro);
        engine.add_builtin("return", cmd_return);
        engine.add_builtin("break", cmd_break);
        engine.add_builtin("cmake_language", cmd_cmake_language);
        engine
    }

    fn add_builtin(&mut self, name: &str, builtin: BuiltinFn) {
        self.commands
            .insert(name.to_string(), EngineCommand::Builtin(builtin));
    }

    pub fn set_debug_mode(&mut self, mode: DebugMode) {
        self.debug_mode = mode;
    }

    pub fn set_strict(&mut self, strict: bool) {
        self.strict = strict;
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(name.into(), value.into());
    }

    pub fn get_variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    pub fn set_cache_entry(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.cache.insert(name.into(), value.into());
    }

    pub fn set_policy(&mut self, id: impl Into<String>, behavior: impl Into<String>) {
        self.policies.insert(id.into(), behavior.into());
    }

    /// Everything `message` has printed so far, in order.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Errors reported so far, in order.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    /// Parse and execute a list file from disk (binary read; the scanner
    /// works on the decoded text).
    pub fn run_file(&mut self, path: &Path) -> Result<(), EngineError> {
        let bytes = std::fs::read(path).map_err(|source| EngineError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let source = String::from_utf8_lossy(&bytes).into_owned();
        self.run_string(&source, &path.display().to_string())
    }

    /// Parse and execute a list file given as a string, under a virtual
    /// file name.
    pub fn run_string(&mut self, source: &str, file_name: &str) -> Result<(), EngineError> {
        let mut parser = Parser::new(source);
        parser.set_debug_mode(self.debug_mode);
        parser.set_strict(self.strict);
        if let Err(diagnostic) = parser.parse() {
            return Err(EngineError::Parse(diagnostic.message));
        }
        let functions = parser.take_function_list();

        self.contexts.push(Context::new(file_name, 0));
        let open_blockers = self.blockers.len();
        let result = self.run_functions(functions);
        let unclosed = self.blockers.len() > open_blockers;
        self.blockers.truncate(open_blockers);
        self.contexts.pop();

        result?;
        if unclosed {
            let message = "A logical block of type MACRO is not closed.".to_string();
            self.errors.push(message.clone());
            return Err(EngineError::Execution(message));
        }
        Ok(())
    }

    fn run_functions(&mut self, functions: Vec<FunctionExpr>) -> Result<(), EngineError> {
        for mut function in functions {
            let mut status = ExecutionStatus::new();
            if !self.execute_command(&mut function, &mut status) {
                let message = self
                    .errors
                    .last()
                    .cloned()
                    .unwrap_or_else(|| "command failed".to_string());
                return Err(EngineError::Execution(message));
            }
            if status.return_invoked() {
                // `return` at file scope stops the file.
                break;
            }
        }
        Ok(())
    }

    /// Offer an evaluated invocation to the innermost blocker. Returns
    /// `None` when no blocker claims it.
    fn try_function_blocker(
        &mut self,
        function: &FunctionExpr,
        status: &mut ExecutionStatus,
    ) -> Option<bool> {
        let (start, end) = match self.blockers.last() {
            Some(entry) => (
                entry.blocker.start_command_name(),
                entry.blocker.end_command_name(),
            ),
            None => return None,
        };
        let name = function.name.to_lowercase();

        if name == end {
            let closes = self
                .blockers
                .last()
                .map(|entry| entry.depth == 0)
                .unwrap_or(false);
            if closes {
                let mut entry = self.blockers.pop()?;
                if !entry.blocker.arguments_match(function) {
                    status.set_error(format!(
                        "arguments of `{}` do not match the opening `{}` command",
                        end, start
                    ));
                    self.report_error(function, status);
                    return Some(false);
                }
                let functions = std::mem::take(&mut entry.functions);
                let ok = entry.blocker.replay(self, functions, status);
                if !ok && !status.nested_error() {
                    self.report_error(function, status);
                }
                return Some(ok);
            }
        }

        if let Some(entry) = self.blockers.last_mut() {
            if name == start {
                entry.depth += 1;
            } else if name == end {
                entry.depth -= 1;
            }
            entry.functions.push(function.clone());
        }
        Some(true)
    }

    /// Report a failed command once, with its execution context.
    fn report_error(&mut self, function: &FunctionExpr, status: &mut ExecutionStatus) {
        let context = self.execution_context();
        let detail = status.error().unwrap_or("unknown error").to_string();
        let message = if function.name.is_empty() {
            format!("{}:{}: {}", context.file_path, function.line, detail)
        } else {
            format!(
                "{}:{} ({}): {}",
                context.file_path, function.line, function.name, detail
            )
        };
        tracing::error!(target: "listfile::engine", "{}", message);
        self.errors.push(message);
    }
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Makefile for ScriptEngine {
    fn get_def(&self, name: &str) -> Option<String> {
        self.variables.get(name).cloned()
    }

    fn get_cache_entry(&self, name: &str) -> Option<String> {
        self.cache.get(name).cloned()
    }

    fn get_env(&self, name: &str) -> String {
        std::env::var(name).unwrap_or_default()
    }

    fn is_in_macro_scope(&self) -> bool {
        !self.macro_scopes.is_empty()
    }

    fn execute_command(
        &mut self,
        function: &mut FunctionExpr,
        status: &mut ExecutionStatus,
    ) -> bool {
        if let Err(error) = function.evaluate(self) {
            status.set_error(error.to_string());
            self.report_error(function, status);
            return false;
        }

        if let Some(handled) = self.try_function_blocker(function, status) {
            return handled;
        }

        if let Some(context) = self.contexts.last_mut() {
            context.line = function.line;
        }

        let Some(command) = self.commands.get(&function.name.to_lowercase()).cloned() else {
            status.set_error(format!("Unknown CMake command \"{}\".", function.name));
            self.report_error(function, status);
            return false;
        };

        tracing::trace!(
            target: "listfile::engine",
            command = %function.name,
            line = function.line,
            args = function.arguments.len(),
        );

        let ok = match command {
            EngineCommand::Builtin(builtin) => builtin(self, &function.arguments, status),
            EngineCommand::Macro(helper) => helper.invoke(self, &function.arguments, status),
        };
        if !ok && !status.nested_error() {
            self.report_error(function, status);
        }
        ok
    }

    fn read_list_file_as_string(&mut self, code: &str, virtual_file_name: &str) -> bool {
        match self.run_string(code, virtual_file_name) {
            Ok(()) => true,
            Err(EngineError::Parse(message)) => {
                let message = format!("{}: {}", virtual_file_name, message);
                tracing::error!(target: "listfile::engine", "{}", message);
                self.errors.push(message);
                false
            }
            // Execution errors were already reported at their frame.
            Err(_) => false,
        }
    }

    fn add_function_blocker(&mut self, blocker: Box<dyn FunctionBlocker>) {
        self.blockers.push(BlockerEntry {
            blocker,
            depth: 0,
            functions: Vec::new(),
        });
    }

    fn add_scripted_command(&mut self, name: &str, command: MacroHelperCommand) {
        self.commands
            .insert(name.to_lowercase(), EngineCommand::Macro(Rc::new(command)));
    }

    fn append_property(&mut self, name: &str, value: &str) {
        let entry = self.properties.entry(name.to_string()).or_default();
        if !entry.is_empty() {
            entry.push(';');
        }
        entry.push_str(value);
    }

    fn record_policies(&self) -> PolicyMap {
        self.policies.clone()
    }

    fn execution_context(&self) -> Context {
        self.contexts.last().cloned().unwrap_or_default()
    }

    fn push_macro_scope(&mut self, file_path: &str, policies: &PolicyMap) {
        self.macro_scopes.push(MacroScope {
            saved_policies: std::mem::replace(&mut self.policies, policies.clone()),
            file_path: file_path.to_string(),
        });
    }

    fn pop_macro_scope(&mut self, quiet: bool) {
        if let Some(scope) = self.macro_scopes.pop() {
            self.policies = scope.saved_policies;
            if quiet {
                tracing::debug!(
                    target: "listfile::engine",
                    file = %scope.file_path,
                    "macro scope closed quietly after nested error",
                );
            }
        }
    }
}

// ============================================================
// Built-in commands
// ============================================================

fn join_values(args: &[Argument]) -> String {
    args.iter()
        .map(|arg| arg.value.as_str())
        .collect::<Vec<_>>()
        .join(";")
}

/// `set(<name> <values>...)`, `set(<name>)` to unset, and
/// `set(<name> <values>... CACHE <type> <docstring>)`.
fn builtin_set(
    engine: &mut ScriptEngine,
    args: &[Argument],
    status: &mut ExecutionStatus,
) -> bool {
    if args.is_empty() {
        status.set_error("called with incorrect number of arguments");
        return false;
    }
    let name = args[0].value.clone();

    let cache_pos = args
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, arg)| arg.value == "CACHE" && arg.delim == Delim::Unquoted)
        .map(|(i, _)| i);

    if let Some(pos) = cache_pos {
        // CACHE mode needs a type and a docstring after the keyword.
        if args.len() < pos + 3 {
            status.set_error("given invalid arguments for CACHE mode");
            return false;
        }
        engine.cache.insert(name, join_values(&args[1..pos]));
        return true;
    }

    if args.len() == 1 {
        engine.variables.remove(&name);
    } else {
        engine.variables.insert(name, join_values(&args[1..]));
    }
    true
}

/// `unset(<name>)` or `unset(<name> CACHE)`.
fn builtin_unset(
    engine: &mut ScriptEngine,
    args: &[Argument],
    status: &mut ExecutionStatus,
) -> bool {
    if args.is_empty() {
        status.set_error("called with incorrect number of arguments");
        return false;
    }
    if args.len() > 1 && args[1].value == "CACHE" {
        engine.cache.remove(&args[0].value);
    } else {
        engine.variables.remove(&args[0].value);
    }
    true
}

/// `message(<args>...)` — concatenates its arguments and records the
/// result.
fn builtin_message(
    engine: &mut ScriptEngine,
    args: &[Argument],
    status: &mut ExecutionStatus,
) -> bool {
    if args.is_empty() {
        status.set_error("called with incorrect number of arguments");
        return false;
    }
    let text: String = args.iter().map(|arg| arg.value.as_str()).collect();
    tracing::info!(target: "listfile::engine", "{}", text);
    engine.messages.push(text);
    true
}

fn cmd_macro(
    engine: &mut ScriptEngine,
    args: &[Argument],
    status: &mut ExecutionStatus,
) -> bool {
    commands::macro_command(engine, args, status)
}

fn cmd_endmacro(
    engine: &mut ScriptEngine,
    args: &[Argument],
    status: &mut ExecutionStatus,
) -> bool {
    commands::endmacro_command(engine, args, status)
}

fn cmd_return(
    _engine: &mut ScriptEngine,
    args: &[Argument],
    status: &mut ExecutionStatus,
) -> bool {
    commands::return_command(args, status)
}

fn cmd_break(
    _engine: &mut ScriptEngine,
    args: &[Argument],
    status: &mut ExecutionStatus,
) -> bool {
    commands::break_command(args, status)
}

fn cmd_cmake_language(
    engine: &mut ScriptEngine,
    args: &[Argument],
    status: &mut ExecutionStatus,
) -> bool {
    commands::cmake_language_command(engine, args, status)
}
