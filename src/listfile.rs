//! Data model for compiled list-file commands.
//!
//! A parsed list file is a sequence of [`FunctionExpr`]: one per command
//! invocation, each carrying the compiled RPN program for its argument
//! list. Evaluating the program fills in the command name and the
//! argument vector.

use serde::{Deserialize, Serialize};

use crate::rpn::RpnExpression;

/// How an argument was delimited in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Delim {
    /// Whitespace-delimited; subject to list splitting on `;`.
    Unquoted,
    /// A `"..."` argument; always exactly one value.
    Quoted,
    /// A `[=*[ ... ]=*]` argument; content taken verbatim.
    Bracket,
}

/// A single evaluated argument value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argument {
    pub value: String,
    pub delim: Delim,
    /// Source line, or 0 when synthesized.
    pub line: u32,
}

impl Argument {
    pub fn new(value: impl Into<String>, delim: Delim, line: u32) -> Self {
        Self {
            value: value.into(),
            delim,
            line,
        }
    }
}

/// A compiled command invocation.
///
/// `name` and `arguments` are empty until the RPN program is evaluated;
/// the terminal `CommandCall` node fills both. Each `FunctionExpr`
/// exclusively owns its program, so structural copies (macro capture)
/// never alias.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionExpr {
    pub name: String,
    pub line: u32,
    pub arguments: Vec<Argument>,
    pub rpn: RpnExpression,
}

impl FunctionExpr {
    pub fn new(name: impl Into<String>, line: u32) -> Self {
        Self {
            name: name.into(),
            line,
            arguments: Vec::new(),
            rpn: RpnExpression::default(),
        }
    }
}

/// The execution context a command runs in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    pub file_path: String,
    pub line: u32,
}

impl Context {
    pub fn new(file_path: impl Into<String>, line: u32) -> Self {
        Self {
            file_path: file_path.into(),
            line,
        }
    }
}
