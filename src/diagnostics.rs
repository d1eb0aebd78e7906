//! Diagnostic reporting infrastructure.
//!
//! This module provides error reporting with source locations,
//! suggestions, and pretty-printed output.
//!
//! # Error Codes
//!
//! Error codes are organized by category:
//!
//! - **E0001-E0099**: Scanner errors (unterminated arguments, stray characters)
//! - **E0100-E0199**: Parser errors (unexpected tokens, unbalanced parentheses)

use crate::span::Span;
use ariadne::{Color, Label, Report, ReportKind, Source};
use thiserror::Error;

/// Error codes for scanner and parser failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // ============================================================
    // Scanner errors (E0001-E0099)
    // ============================================================
    /// Unexpected character in source.
    UnexpectedCharacter = 1,
    /// Bracket argument not closed before end of file.
    UnterminatedBracket = 2,
    /// Quoted argument not closed before end of file.
    UnterminatedQuoted = 3,
    /// Variable reference not closed before end of line or file.
    UnterminatedVariableReference = 4,
    /// `}` with no open variable reference.
    UnmatchedCloseBrace = 5,
    /// Invalid escape sequence (strict mode only).
    InvalidEscape = 6,

    // ============================================================
    // Parser errors (E0100-E0199)
    // ============================================================
    /// Unexpected token.
    UnexpectedToken = 100,
    /// Unexpected end of file.
    UnexpectedEof = 101,
    /// Expected a command name.
    ExpectedCommandName = 102,
    /// Expected `(` after a command name.
    ExpectedLeftParen = 103,
}

impl ErrorCode {
    /// Get the formatted error code string (e.g., "E0001").
    pub fn as_str(&self) -> String {
        format!("E{:04}", *self as u16)
    }

    /// Get a help message suggesting how to fix the error.
    pub fn help(&self) -> Option<&'static str> {
        match self {
            ErrorCode::UnterminatedBracket => {
                Some("close the bracket argument with `]` followed by the same number of `=` and `]`")
            }
            ErrorCode::UnterminatedQuoted => Some("add a closing `\"` to complete the argument"),
            ErrorCode::UnterminatedVariableReference => {
                Some("add a closing `}` to complete the variable reference")
            }
            ErrorCode::UnmatchedCloseBrace => {
                Some("escape a literal brace as `\\}` or open a reference with `${`")
            }
            ErrorCode::InvalidEscape => {
                Some("valid escape sequences are: \\\\, \\\", \\n, \\r, \\t, \\;, \\ , \\#, \\(, \\), \\$, \\@, \\^, \\0")
            }
            ErrorCode::ExpectedLeftParen => Some("every command invocation is `name(...)`"),
            _ => None,
        }
    }
}

/// The kind of diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// An error that stops processing of the file.
    Error,
    /// A warning that does not stop processing.
    Warning,
}

impl DiagnosticKind {
    fn to_report_kind(self) -> ReportKind<'static> {
        match self {
            DiagnosticKind::Error => ReportKind::Error,
            DiagnosticKind::Warning => ReportKind::Warning,
        }
    }

    fn color(self) -> Color {
        match self {
            DiagnosticKind::Error => Color::Red,
            DiagnosticKind::Warning => Color::Yellow,
        }
    }
}

/// A diagnostic with location, labels and suggestions.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// The kind of diagnostic.
    pub kind: DiagnosticKind,
    /// The error code (e.g., "E0001").
    pub code: Option<String>,
    /// The main error message.
    pub message: String,
    /// The primary span where the error occurred.
    pub span: Span,
    /// Additional labels pointing to relevant source.
    pub labels: Vec<DiagnosticLabel>,
    /// Suggestions for fixing the error.
    pub suggestions: Vec<String>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub fn error(message: impl Into<String>, span: Span) -> Self {
        Self {
            kind: DiagnosticKind::Error,
            code: None,
            message: message.into(),
            span,
            labels: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    /// Set the error code, adding its help message if available.
    pub fn with_error_code(mut self, code: ErrorCode) -> Self {
        self.code = Some(code.as_str());
        if let Some(help) = code.help() {
            self.suggestions.push(help.to_string());
        }
        self
    }

    /// Add a secondary label pointing at related source.
    pub fn with_note(mut self, span: Span, message: impl Into<String>) -> Self {
        self.labels.push(DiagnosticLabel {
            span,
            message: message.into(),
        });
        self
    }

    /// Add a suggestion.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }
}

/// A secondary label in a diagnostic.
#[derive(Debug, Clone)]
pub struct DiagnosticLabel {
    /// The span this label points to.
    pub span: Span,
    /// The label message.
    pub message: String,
}

/// Diagnostic emitter that prints diagnostics to stderr.
pub struct DiagnosticEmitter<'a> {
    filename: &'a str,
    source: &'a str,
}

impl<'a> DiagnosticEmitter<'a> {
    pub fn new(filename: &'a str, source: &'a str) -> Self {
        Self { filename, source }
    }

    /// Emit a diagnostic to stderr.
    pub fn emit(&self, diagnostic: &Diagnostic) {
        let mut builder = Report::build(
            diagnostic.kind.to_report_kind(),
            self.filename,
            diagnostic.span.start,
        );

        let message = if let Some(code) = &diagnostic.code {
            format!("[{}] {}", code, diagnostic.message)
        } else {
            diagnostic.message.clone()
        };
        builder = builder.with_message(&message);

        builder = builder.with_label(
            Label::new((self.filename, diagnostic.span.start..diagnostic.span.end))
                .with_color(diagnostic.kind.color())
                .with_message(&diagnostic.message),
        );

        for label in &diagnostic.labels {
            builder = builder.with_label(
                Label::new((self.filename, label.span.start..label.span.end))
                    .with_color(Color::Blue)
                    .with_message(&label.message),
            );
        }

        if !diagnostic.suggestions.is_empty() {
            builder = builder.with_help(diagnostic.suggestions.join("\n"));
        }

        let report = builder.finish();
        if report
            .eprint((self.filename, Source::from(self.source)))
            .is_err()
        {
            eprintln!("{}", message);
        }
    }
}

/// Scanner and parser errors. Processing stops at the first one.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    #[error("unterminated bracket argument")]
    UnterminatedBracket { span: Span },

    #[error("unterminated quoted argument")]
    UnterminatedQuoted { span: Span },

    #[error("unterminated variable reference")]
    UnterminatedVariableReference { span: Span },

    #[error("unmatched `}}` in argument")]
    UnmatchedCloseBrace { span: Span },

    #[error("unexpected character `{found}`")]
    UnexpectedCharacter { found: char, span: Span },

    #[error("invalid escape sequence `\\{found}`")]
    InvalidEscape { found: char, span: Span },

    #[error("unexpected token: expected {expected}, found {found}")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("unexpected end of file")]
    UnexpectedEof { span: Span },

    #[error("expected a command name, found {found}")]
    ExpectedCommandName { found: String, span: Span },

    #[error("expected `(` after command name `{name}`")]
    ExpectedLeftParen { name: String, span: Span },
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::UnterminatedBracket { span }
            | ParseError::UnterminatedQuoted { span }
            | ParseError::UnterminatedVariableReference { span }
            | ParseError::UnmatchedCloseBrace { span }
            | ParseError::UnexpectedCharacter { span, .. }
            | ParseError::InvalidEscape { span, .. }
            | ParseError::UnexpectedToken { span, .. }
            | ParseError::UnexpectedEof { span }
            | ParseError::ExpectedCommandName { span, .. }
            | ParseError::ExpectedLeftParen { span, .. } => *span,
        }
    }

    fn error_code(&self) -> ErrorCode {
        match self {
            ParseError::UnterminatedBracket { .. } => ErrorCode::UnterminatedBracket,
            ParseError::UnterminatedQuoted { .. } => ErrorCode::UnterminatedQuoted,
            ParseError::UnterminatedVariableReference { .. } => {
                ErrorCode::UnterminatedVariableReference
            }
            ParseError::UnmatchedCloseBrace { .. } => ErrorCode::UnmatchedCloseBrace,
            ParseError::UnexpectedCharacter { .. } => ErrorCode::UnexpectedCharacter,
            ParseError::InvalidEscape { .. } => ErrorCode::InvalidEscape,
            ParseError::UnexpectedToken { .. } => ErrorCode::UnexpectedToken,
            ParseError::UnexpectedEof { .. } => ErrorCode::UnexpectedEof,
            ParseError::ExpectedCommandName { .. } => ErrorCode::ExpectedCommandName,
            ParseError::ExpectedLeftParen { .. } => ErrorCode::ExpectedLeftParen,
        }
    }
}

impl From<ParseError> for Diagnostic {
    fn from(error: ParseError) -> Self {
        let span = error.span();
        let code = error.error_code();
        let message = format!(
            "{} at line {}, column {}",
            error, span.line, span.col
        );
        Diagnostic::error(message, span).with_error_code(code)
    }
}
