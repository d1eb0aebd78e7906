//! Parser for the list-file language.
//!
//! This module implements a hand-written recursive descent parser with
//! one-token lookahead over the modal scanner. There is no syntax tree:
//! every reduction point appends directly to the in-progress command's
//! postfix program, in the order the evaluator expects:
//!
//! - the command name is pushed first as a `String`;
//! - each argument pushes its pieces, then its combining node
//!   (`QuotedArg`, `UnquotedArg`, or nothing for a bracket argument);
//! - a reference pushes its name pieces, then its `*VarRef` node;
//! - the command closes with `CommandCall(arity = 1 + argcount)`.
//!
//! Parsing stops at the first error. The partial `function_list` stays
//! available so a caller can report how far it got.

use crate::diagnostics::{Diagnostic, ParseError};
use crate::lexer::{decode_escape, Scanner, Token, TokenKind, VarRefKind};
use crate::listfile::FunctionExpr;
use crate::rpn::Expr;

/// Which pipeline stages emit debug events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebugMode {
    #[default]
    Disabled,
    Parser,
    Scanner,
    Full,
}

/// The list-file parser.
pub struct Parser<'src> {
    scanner: Scanner<'src>,
    lookahead: Option<Token>,
    function: FunctionExpr,
    function_list: Vec<FunctionExpr>,
    message: Option<String>,
    debug_parser: bool,
}

impl<'src> Parser<'src> {
    /// Create a new parser for the given source.
    pub fn new(source: &'src str) -> Self {
        Self {
            scanner: Scanner::new(source),
            lookahead: None,
            function: FunctionExpr::default(),
            function_list: Vec::new(),
            message: None,
            debug_parser: false,
        }
    }

    /// Route per-stage debug events to `tracing`.
    pub fn set_debug_mode(&mut self, mode: DebugMode) {
        self.debug_parser = matches!(mode, DebugMode::Parser | DebugMode::Full);
        self.scanner
            .set_debug(matches!(mode, DebugMode::Scanner | DebugMode::Full));
    }

    /// Reject escape sequences outside the known set.
    pub fn set_strict(&mut self, strict: bool) {
        self.scanner.set_strict(strict);
    }

    /// The commands parsed so far; defined (possibly partial) even after
    /// a failed parse.
    pub fn function_list(&self) -> &[FunctionExpr] {
        &self.function_list
    }

    /// Take ownership of the parsed commands.
    pub fn take_function_list(&mut self) -> Vec<FunctionExpr> {
        std::mem::take(&mut self.function_list)
    }

    /// The diagnostic text of a failed parse.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Parse the whole input. On failure the first error is returned as
    /// a diagnostic and also retained as [`Parser::message`].
    pub fn parse(&mut self) -> Result<(), Diagnostic> {
        match self.parse_file() {
            Ok(()) => Ok(()),
            Err(error) => {
                let diagnostic: Diagnostic = error.into();
                self.message = Some(diagnostic.message.clone());
                Err(diagnostic)
            }
        }
    }

    // ============================================================
    // Token handling
    // ============================================================

    fn peek(&mut self) -> Result<&Token, ParseError> {
        if self.lookahead.is_none() {
            self.lookahead = Some(self.scanner.next_token()?);
        }
        match self.lookahead.as_ref() {
            Some(token) => Ok(token),
            None => unreachable!("lookahead was just filled"),
        }
    }

    fn bump(&mut self) -> Result<Token, ParseError> {
        match self.lookahead.take() {
            Some(token) => Ok(token),
            None => self.scanner.next_token(),
        }
    }

    // ============================================================
    // Grammar
    // ============================================================

    fn parse_file(&mut self) -> Result<(), ParseError> {
        loop {
            let token = self.bump()?;
            match token.kind {
                TokenKind::Identifier(name) => self.parse_command(name, token.span.line)?,
                TokenKind::Eof => return Ok(()),
                other => {
                    return Err(ParseError::ExpectedCommandName {
                        found: other.description(),
                        span: token.span,
                    })
                }
            }
        }
    }

    fn parse_command(&mut self, name: String, line: u32) -> Result<(), ParseError> {
        self.function = FunctionExpr::default();
        self.function.line = line;
        self.function.rpn.push(Expr::String { text: name.clone() });

        let open = self.bump()?;
        if open.kind != TokenKind::LeftParen {
            return Err(ParseError::ExpectedLeftParen {
                name,
                span: open.span,
            });
        }

        // Parenthesized groups inside an argument list pass the parens
        // through as literal unquoted arguments.
        let mut depth = 0usize;
        let mut argcount = 0usize;
        loop {
            let token = self.bump()?;
            match token.kind {
                TokenKind::Separation => continue,
                TokenKind::LeftParen => {
                    self.push_paren_argument("(", token.span.line);
                    argcount += 1;
                    depth += 1;
                }
                TokenKind::RightParen if depth > 0 => {
                    self.push_paren_argument(")", token.span.line);
                    argcount += 1;
                    depth -= 1;
                }
                TokenKind::RightParen => break,
                TokenKind::BracketArgument(text) => {
                    self.function.rpn.push(Expr::BracketArg {
                        text,
                        line: token.span.line,
                    });
                    argcount += 1;
                }
                TokenKind::QuotedOpen => {
                    self.parse_quoted(token.span.line)?;
                    argcount += 1;
                }
                TokenKind::Text(_) | TokenKind::Escape(_) | TokenKind::VarOpen(_) => {
                    self.parse_unquoted(token)?;
                    argcount += 1;
                }
                TokenKind::Eof => {
                    return Err(ParseError::UnexpectedEof { span: token.span })
                }
                other => {
                    return Err(ParseError::UnexpectedToken {
                        expected: "an argument or `)`".to_string(),
                        found: other.description(),
                        span: token.span,
                    })
                }
            }
        }

        self.function.rpn.push(Expr::CommandCall {
            arity: argcount + 1,
            line,
        });

        if self.debug_parser {
            tracing::debug!(
                target: "listfile::parser",
                command = %name,
                line,
                args = argcount,
                nodes = self.function.rpn.len(),
            );
        }

        self.function_list.push(std::mem::take(&mut self.function));
        Ok(())
    }

    fn push_paren_argument(&mut self, text: &str, line: u32) {
        self.function.rpn.push(Expr::String {
            text: text.to_string(),
        });
        self.function.rpn.push(Expr::UnquotedArg { arity: 1, line });
    }

    /// `"` already consumed; pieces until the closing `"`.
    fn parse_quoted(&mut self, line: u32) -> Result<(), ParseError> {
        let mut arity = 0usize;
        loop {
            let token = self.bump()?;
            match token.kind {
                TokenKind::Text(text) => {
                    self.function.rpn.push(Expr::String { text });
                    arity += 1;
                }
                TokenKind::Escape(c) => {
                    self.function.rpn.push(Expr::String {
                        text: decode_argument_escape(c),
                    });
                    arity += 1;
                }
                TokenKind::VarOpen(kind) => {
                    self.parse_reference(kind, token.span.line)?;
                    arity += 1;
                }
                TokenKind::QuotedClose => break,
                TokenKind::Eof => {
                    return Err(ParseError::UnexpectedEof { span: token.span })
                }
                other => {
                    return Err(ParseError::UnexpectedToken {
                        expected: "quoted argument content".to_string(),
                        found: other.description(),
                        span: token.span,
                    })
                }
            }
        }
        if arity == 0 {
            // `""` still yields one (empty) value.
            self.function.rpn.push(Expr::String {
                text: String::new(),
            });
            arity = 1;
        }
        self.function.rpn.push(Expr::QuotedArg { arity, line });
        Ok(())
    }

    /// `first` is the already-consumed initial piece; further pieces are
    /// taken while they are adjacent (no separation).
    fn parse_unquoted(&mut self, first: Token) -> Result<(), ParseError> {
        let line = first.span.line;
        let mut arity = 0usize;
        let mut token = first;
        loop {
            match token.kind {
                TokenKind::Text(text) => {
                    self.function.rpn.push(Expr::String { text });
                    arity += 1;
                }
                TokenKind::Escape(c) => {
                    self.function.rpn.push(Expr::String {
                        text: decode_argument_escape(c),
                    });
                    arity += 1;
                }
                TokenKind::VarOpen(kind) => {
                    self.parse_reference(kind, token.span.line)?;
                    arity += 1;
                }
                other => {
                    return Err(ParseError::UnexpectedToken {
                        expected: "unquoted argument content".to_string(),
                        found: other.description(),
                        span: token.span,
                    })
                }
            }
            match self.peek()?.kind {
                TokenKind::Text(_) | TokenKind::Escape(_) | TokenKind::VarOpen(_) => {
                    token = self.bump()?;
                }
                _ => break,
            }
        }
        self.function.rpn.push(Expr::UnquotedArg { arity, line });
        Ok(())
    }

    /// Opener already consumed; name pieces until the matching `}`.
    fn parse_reference(&mut self, kind: VarRefKind, line: u32) -> Result<(), ParseError> {
        let mut arity = 0usize;
        loop {
            let token = self.bump()?;
            match token.kind {
                TokenKind::Text(text) => {
                    self.function.rpn.push(Expr::String { text });
                    arity += 1;
                }
                TokenKind::Escape(c) => {
                    // `;` cannot divide a name, so references decode fully.
                    self.function.rpn.push(Expr::String {
                        text: decode_escape(c).to_string(),
                    });
                    arity += 1;
                }
                TokenKind::VarOpen(inner) => {
                    self.parse_reference(inner, token.span.line)?;
                    arity += 1;
                }
                TokenKind::VarClose => break,
                TokenKind::Eof => {
                    return Err(ParseError::UnexpectedEof { span: token.span })
                }
                other => {
                    return Err(ParseError::UnexpectedToken {
                        expected: "variable reference content".to_string(),
                        found: other.description(),
                        span: token.span,
                    })
                }
            }
        }
        if arity == 0 {
            self.function.rpn.push(Expr::String {
                text: String::new(),
            });
            arity = 1;
        }
        self.function.rpn.push(match kind {
            VarRefKind::Normal => Expr::NormalVarRef { arity, line },
            VarRefKind::Cache => Expr::CacheVarRef { arity },
            VarRefKind::Env => Expr::EnvVarRef { arity },
        });
        Ok(())
    }
}

/// Decode an escape in quoted or unquoted argument context. `\;` keeps
/// its backslash so list expansion can tell it from a separator.
fn decode_argument_escape(c: char) -> String {
    if c == ';' {
        "\\;".to_string()
    } else {
        decode_escape(c).to_string()
    }
}
