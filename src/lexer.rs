//! Lexical analysis for the CMake list-file language.
//!
//! This module tokenizes list-file source into a stream of tokens. The
//! grammar is modal: between commands only identifiers, parentheses and
//! comments exist; inside an argument list the scanner recognizes
//! bracket arguments with counted `=` delimiters, quoted arguments with
//! escape sequences and line continuations, unquoted runs, and nested
//! variable references (`${...}`, `$CACHE{...}`, `$ENV{...}`). Quoted and
//! unquoted arguments are therefore not single tokens: the scanner emits
//! open/close markers with text, escape and reference sub-tokens between
//! them, and the parser assembles the pieces.
//!
//! # Example
//!
//! ```rust
//! use listfile::lexer::{Scanner, TokenKind};
//!
//! let mut scanner = Scanner::new("set(a b)");
//! let token = scanner.next_token().unwrap();
//! assert_eq!(token.kind, TokenKind::Identifier("set".to_string()));
//! ```

use crate::diagnostics::ParseError;
use crate::span::Span;

/// Which map a variable reference resolves against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarRefKind {
    /// `${name}` — the ambient variable scope.
    Normal,
    /// `$CACHE{name}` — the cache.
    Cache,
    /// `$ENV{name}` — the process environment.
    Env,
}

/// Token kinds for the list-file scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    LeftParen,
    RightParen,
    /// A command name at top level.
    Identifier(String),
    /// A bracket argument's decoded payload, byte-for-byte.
    BracketArgument(String),
    QuotedOpen,
    QuotedClose,
    /// A literal text segment inside a quoted, unquoted, or reference
    /// context.
    Text(String),
    /// The character following a backslash, undecoded.
    Escape(char),
    /// Opens a variable reference of the given kind.
    VarOpen(VarRefKind),
    /// Closes the innermost open variable reference.
    VarClose,
    /// A run of whitespace or newlines inside an argument list.
    Separation,
    Eof,
}

impl TokenKind {
    /// Human-readable description for error messages.
    pub fn description(&self) -> String {
        match self {
            TokenKind::LeftParen => "`(`".to_string(),
            TokenKind::RightParen => "`)`".to_string(),
            TokenKind::Identifier(name) => format!("identifier `{}`", name),
            TokenKind::BracketArgument(_) => "bracket argument".to_string(),
            TokenKind::QuotedOpen | TokenKind::QuotedClose => "`\"`".to_string(),
            TokenKind::Text(text) => format!("`{}`", text),
            TokenKind::Escape(c) => format!("`\\{}`", c),
            TokenKind::VarOpen(VarRefKind::Normal) => "`${`".to_string(),
            TokenKind::VarOpen(VarRefKind::Cache) => "`$CACHE{`".to_string(),
            TokenKind::VarOpen(VarRefKind::Env) => "`$ENV{`".to_string(),
            TokenKind::VarClose => "`}`".to_string(),
            TokenKind::Separation => "whitespace".to_string(),
            TokenKind::Eof => "end of file".to_string(),
        }
    }
}

/// A token with its kind and source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Decode the character of an escape sequence.
///
/// `\n`, `\r` and `\t` decode to the control character; everything else
/// decodes to itself. The parser layers the `\;` rule on top: in quoted
/// and unquoted argument contexts the backslash is preserved so that
/// list expansion can tell an escaped `;` from a separator.
pub(crate) fn decode_escape(c: char) -> char {
    match c {
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        _ => c,
    }
}

fn is_valid_escape(c: char) -> bool {
    matches!(
        c,
        '\\' | '"' | ' ' | '#' | '(' | ')' | '$' | '@' | '^' | ';' | 't' | 'n' | 'r' | '0'
    )
}

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n')
}

fn is_identifier_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_identifier_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Which top-level region the scanner is in. Variable references are a
/// separate depth-counted sub-state tracked by `ref_stack`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Between commands.
    Main,
    /// Inside `(` ... `)`.
    Args,
    /// Inside `"` ... `"`.
    Quoted,
}

/// The list-file scanner.
pub struct Scanner<'src> {
    src: &'src str,
    bytes: &'src [u8],
    pos: usize,
    line: u32,
    col: u32,
    mode: Mode,
    /// Nested parenthesis depth inside an argument list.
    paren_depth: u32,
    /// Open variable references, innermost last.
    ref_stack: Vec<(VarRefKind, Span)>,
    /// Span of the opening `"` for unterminated-quote reporting.
    quote_open: Span,
    strict: bool,
    debug: bool,
}

impl<'src> Scanner<'src> {
    /// Create a new scanner for the given source.
    pub fn new(source: &'src str) -> Self {
        Self {
            src: source,
            bytes: source.as_bytes(),
            pos: 0,
            line: 1,
            col: 1,
            mode: Mode::Main,
            paren_depth: 0,
            ref_stack: Vec::new(),
            quote_open: Span::dummy(),
            strict: false,
            debug: false,
        }
    }

    /// Reject escape sequences outside the known set instead of decoding
    /// them as identity.
    pub fn set_strict(&mut self, strict: bool) {
        self.strict = strict;
    }

    /// Log every produced token.
    pub fn set_debug(&mut self, enable: bool) {
        self.debug = enable;
    }

    /// Produce the next token, or the first scan error.
    pub fn next_token(&mut self) -> Result<Token, ParseError> {
        let token = self.scan()?;
        if self.debug {
            tracing::debug!(
                target: "listfile::scanner",
                line = token.span.line,
                col = token.span.col,
                token = ?token.kind,
            );
        }
        Ok(token)
    }

    fn scan(&mut self) -> Result<Token, ParseError> {
        if !self.ref_stack.is_empty() {
            return self.scan_in_reference();
        }
        match self.mode {
            Mode::Main => self.scan_main(),
            Mode::Args => self.scan_args(),
            Mode::Quoted => self.scan_quoted(),
        }
    }

    // ============================================================
    // Byte-level helpers
    // ============================================================

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(b)
    }

    /// Consume and return the char at the current position.
    fn bump_char(&mut self) -> Option<char> {
        let c = self.src[self.pos..].chars().next()?;
        for _ in 0..c.len_utf8() {
            self.bump();
        }
        Some(c)
    }

    fn here(&self) -> (usize, u32, u32) {
        (self.pos, self.line, self.col)
    }

    fn span_from(&self, start: (usize, u32, u32)) -> Span {
        Span::new(start.0, self.pos, start.1, start.2)
    }

    fn token_from(&self, start: (usize, u32, u32), kind: TokenKind) -> Token {
        Token::new(kind, self.span_from(start))
    }

    /// Length of the `=` run if a bracket-open sequence (`[` `=`* `[`)
    /// starts at `at`.
    fn bracket_open_len(&self, at: usize) -> Option<usize> {
        if self.bytes.get(at).copied() != Some(b'[') {
            return None;
        }
        let mut i = at + 1;
        while self.bytes.get(i).copied() == Some(b'=') {
            i += 1;
        }
        if self.bytes.get(i).copied() == Some(b'[') {
            Some(i - at - 1)
        } else {
            None
        }
    }

    /// Whether a matching bracket-close sequence (`]` `=`{eq} `]`) starts
    /// at `at`.
    fn bracket_close_at(&self, at: usize, eq: usize) -> bool {
        if self.bytes.get(at).copied() != Some(b']') {
            return false;
        }
        for i in 0..eq {
            if self.bytes.get(at + 1 + i).copied() != Some(b'=') {
                return false;
            }
        }
        self.bytes.get(at + 1 + eq).copied() == Some(b']')
    }

    /// The reference opener starting at `at`, if any: `${`, `$CACHE{`, or
    /// `$ENV{`.
    fn reference_open_at(&self, at: usize) -> Option<(VarRefKind, usize)> {
        let rest = &self.src[at..];
        if rest.starts_with("${") {
            Some((VarRefKind::Normal, 2))
        } else if rest.starts_with("$ENV{") {
            Some((VarRefKind::Env, 5))
        } else if rest.starts_with("$CACHE{") {
            Some((VarRefKind::Cache, 7))
        } else {
            None
        }
    }

    // ============================================================
    // Top level
    // ============================================================

    fn scan_main(&mut self) -> Result<Token, ParseError> {
        loop {
            let start = self.here();
            match self.peek() {
                None => return Ok(self.token_from(start, TokenKind::Eof)),
                Some(b) if is_space(b) => {
                    self.bump();
                }
                Some(b'#') => self.skip_comment()?,
                Some(b'(') => {
                    self.bump();
                    self.mode = Mode::Args;
                    return Ok(self.token_from(start, TokenKind::LeftParen));
                }
                Some(b')') => {
                    self.bump();
                    return Ok(self.token_from(start, TokenKind::RightParen));
                }
                Some(b) if is_identifier_start(b) => {
                    while self.peek().is_some_and(is_identifier_continue) {
                        self.bump();
                    }
                    let text = self.src[start.0..self.pos].to_string();
                    return Ok(self.token_from(start, TokenKind::Identifier(text)));
                }
                Some(_) => {
                    let found = self.src[self.pos..].chars().next().unwrap_or('\0');
                    self.bump_char();
                    return Err(ParseError::UnexpectedCharacter {
                        found,
                        span: self.span_from(start),
                    });
                }
            }
        }
    }

    /// Consume a `#` comment: bracket form if a bracket-open sequence
    /// follows, line form otherwise. The trailing newline is left for the
    /// caller so it still counts as separation in argument context.
    fn skip_comment(&mut self) -> Result<(), ParseError> {
        let start = self.here();
        self.bump(); // '#'
        if let Some(eq) = self.bracket_open_len(self.pos) {
            self.scan_bracket_payload(eq, start)?;
        } else {
            while self.peek().is_some_and(|b| b != b'\n') {
                self.bump();
            }
        }
        Ok(())
    }

    /// Consume a bracket argument or bracket comment starting at the
    /// opening `[` and return the verbatim payload between the
    /// delimiters.
    fn scan_bracket_payload(
        &mut self,
        eq: usize,
        open: (usize, u32, u32),
    ) -> Result<String, ParseError> {
        for _ in 0..eq + 2 {
            self.bump();
        }
        let content_start = self.pos;
        loop {
            if self.pos >= self.bytes.len() {
                return Err(ParseError::UnterminatedBracket {
                    span: self.span_from(open),
                });
            }
            if self.bracket_close_at(self.pos, eq) {
                let content = self.src[content_start..self.pos].to_string();
                for _ in 0..eq + 2 {
                    self.bump();
                }
                return Ok(content);
            }
            self.bump();
        }
    }

    // ============================================================
    // Argument list
    // ============================================================

    fn scan_args(&mut self) -> Result<Token, ParseError> {
        loop {
            let start = self.here();
            match self.peek() {
                None => return Ok(self.token_from(start, TokenKind::Eof)),
                Some(b) if is_space(b) => {
                    while self.peek().is_some_and(is_space) {
                        self.bump();
                    }
                    return Ok(self.token_from(start, TokenKind::Separation));
                }
                Some(b'#') => self.skip_comment()?,
                Some(b'(') => {
                    self.bump();
                    self.paren_depth += 1;
                    return Ok(self.token_from(start, TokenKind::LeftParen));
                }
                Some(b')') => {
                    self.bump();
                    if self.paren_depth > 0 {
                        self.paren_depth -= 1;
                    } else {
                        self.mode = Mode::Main;
                    }
                    return Ok(self.token_from(start, TokenKind::RightParen));
                }
                Some(b'"') => {
                    self.bump();
                    self.mode = Mode::Quoted;
                    self.quote_open = self.span_from(start);
                    return Ok(self.token_from(start, TokenKind::QuotedOpen));
                }
                Some(b'[') if self.bracket_open_len(self.pos).is_some() => {
                    let eq = self.bracket_open_len(self.pos).unwrap_or(0);
                    let content = self.scan_bracket_payload(eq, start)?;
                    return Ok(self.token_from(start, TokenKind::BracketArgument(content)));
                }
                Some(b'}') => {
                    self.bump();
                    return Err(ParseError::UnmatchedCloseBrace {
                        span: self.span_from(start),
                    });
                }
                Some(b'\\') => {
                    if let Some(token) = self.scan_escape(start)? {
                        return Ok(token);
                    }
                }
                Some(b'$') if self.reference_open_at(self.pos).is_some() => {
                    return Ok(self.open_reference(start));
                }
                Some(_) => return Ok(self.scan_unquoted_run(start)),
            }
        }
    }

    fn open_reference(&mut self, start: (usize, u32, u32)) -> Token {
        let (kind, len) = self
            .reference_open_at(self.pos)
            .unwrap_or((VarRefKind::Normal, 2));
        for _ in 0..len {
            self.bump();
        }
        let span = self.span_from(start);
        self.ref_stack.push((kind, span));
        Token::new(TokenKind::VarOpen(kind), span)
    }

    /// A maximal run of ordinary unquoted characters. Stops at
    /// whitespace, `(`, `)`, `#`, `"`, `}`, backslash, a bracket-open
    /// sequence, or a reference opener; a `$` that opens nothing is
    /// ordinary.
    fn scan_unquoted_run(&mut self, start: (usize, u32, u32)) -> Token {
        loop {
            match self.peek() {
                None => break,
                Some(b)
                    if is_space(b)
                        || matches!(b, b'(' | b')' | b'#' | b'"' | b'}' | b'\\') =>
                {
                    break
                }
                Some(b'[') if self.bracket_open_len(self.pos).is_some() => break,
                Some(b'$') => {
                    if self.reference_open_at(self.pos).is_some() {
                        break;
                    }
                    self.bump();
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
        let text = self.src[start.0..self.pos].to_string();
        self.token_from(start, TokenKind::Text(text))
    }

    /// An escape sequence in any argument context. Returns `None` for a
    /// line continuation (backslash-newline), which produces no token.
    fn scan_escape(
        &mut self,
        start: (usize, u32, u32),
    ) -> Result<Option<Token>, ParseError> {
        self.bump(); // backslash
        match self.peek() {
            None => Ok(Some(self.token_from(start, TokenKind::Text("\\".to_string())))),
            Some(b'\n') => {
                self.bump();
                Ok(None)
            }
            Some(b'\r') if self.peek_at(1) == Some(b'\n') => {
                self.bump();
                self.bump();
                Ok(None)
            }
            Some(_) => {
                let c = self.bump_char().unwrap_or('\\');
                if self.strict && !is_valid_escape(c) {
                    return Err(ParseError::InvalidEscape {
                        found: c,
                        span: self.span_from(start),
                    });
                }
                Ok(Some(self.token_from(start, TokenKind::Escape(c))))
            }
        }
    }

    // ============================================================
    // Quoted argument
    // ============================================================

    fn scan_quoted(&mut self) -> Result<Token, ParseError> {
        loop {
            let start = self.here();
            match self.peek() {
                None => {
                    return Err(ParseError::UnterminatedQuoted {
                        span: self.quote_open,
                    })
                }
                Some(b'"') => {
                    self.bump();
                    self.mode = Mode::Args;
                    return Ok(self.token_from(start, TokenKind::QuotedClose));
                }
                Some(b'\\') => {
                    if let Some(token) = self.scan_escape(start)? {
                        return Ok(token);
                    }
                }
                Some(b'$') if self.reference_open_at(self.pos).is_some() => {
                    return Ok(self.open_reference(start));
                }
                Some(_) => {
                    // Literal run; newlines are content here.
                    loop {
                        match self.peek() {
                            None => break,
                            Some(b'"') | Some(b'\\') => break,
                            Some(b'$') => {
                                if self.reference_open_at(self.pos).is_some() {
                                    break;
                                }
                                self.bump();
                            }
                            Some(_) => {
                                self.bump();
                            }
                        }
                    }
                    let text = self.src[start.0..self.pos].to_string();
                    return Ok(self.token_from(start, TokenKind::Text(text)));
                }
            }
        }
    }

    // ============================================================
    // Variable reference
    // ============================================================

    fn scan_in_reference(&mut self) -> Result<Token, ParseError> {
        let open_span = self
            .ref_stack
            .last()
            .map(|(_, span)| *span)
            .unwrap_or_default();
        let start = self.here();
        match self.peek() {
            None | Some(b'\n') => Err(ParseError::UnterminatedVariableReference {
                span: open_span,
            }),
            Some(b'}') => {
                self.bump();
                self.ref_stack.pop();
                Ok(self.token_from(start, TokenKind::VarClose))
            }
            Some(b'\\') => match self.scan_escape(start)? {
                Some(token) => Ok(token),
                // Line continuation inside a reference: scan on.
                None => self.scan_in_reference(),
            },
            Some(b'$') if self.reference_open_at(self.pos).is_some() => {
                Ok(self.open_reference(start))
            }
            Some(_) => {
                loop {
                    match self.peek() {
                        None => break,
                        Some(b'}') | Some(b'\\') | Some(b'\n') => break,
                        Some(b'$') => {
                            if self.reference_open_at(self.pos).is_some() {
                                break;
                            }
                            self.bump();
                        }
                        Some(_) => {
                            self.bump();
                        }
                    }
                }
                let text = self.src[start.0..self.pos].to_string();
                Ok(self.token_from(start, TokenKind::Text(text)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<TokenKind> {
        let mut scanner = Scanner::new(source);
        let mut kinds = Vec::new();
        loop {
            let token = scanner.next_token().expect("scan failed");
            let done = token.kind == TokenKind::Eof;
            kinds.push(token.kind);
            if done {
                break;
            }
        }
        kinds
    }

    fn lex_err(source: &str) -> ParseError {
        let mut scanner = Scanner::new(source);
        loop {
            match scanner.next_token() {
                Ok(token) if token.kind == TokenKind::Eof => panic!("expected a scan error"),
                Ok(_) => continue,
                Err(err) => return err,
            }
        }
    }

    fn text(s: &str) -> TokenKind {
        TokenKind::Text(s.to_string())
    }

    #[test]
    fn test_simple_command() {
        assert_eq!(lex("set(a b)"), vec![
            TokenKind::Identifier("set".to_string()),
            TokenKind::LeftParen,
            text("a"),
            TokenKind::Separation,
            text("b"),
            TokenKind::RightParen,
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn test_separation_coalesces() {
        assert_eq!(lex("m(a  \t\n  b)"), vec![
            TokenKind::Identifier("m".to_string()),
            TokenKind::LeftParen,
            text("a"),
            TokenKind::Separation,
            text("b"),
            TokenKind::RightParen,
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn test_quoted_argument() {
        assert_eq!(lex(r#"m("a b")"#), vec![
            TokenKind::Identifier("m".to_string()),
            TokenKind::LeftParen,
            TokenKind::QuotedOpen,
            text("a b"),
            TokenKind::QuotedClose,
            TokenKind::RightParen,
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn test_quoted_escapes() {
        assert_eq!(lex(r#"m("a\"b\t")"#), vec![
            TokenKind::Identifier("m".to_string()),
            TokenKind::LeftParen,
            TokenKind::QuotedOpen,
            text("a"),
            TokenKind::Escape('"'),
            text("b"),
            TokenKind::Escape('t'),
            TokenKind::QuotedClose,
            TokenKind::RightParen,
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn test_line_continuation_suppresses_newline() {
        assert_eq!(lex("m(\"a\\\nb\")"), vec![
            TokenKind::Identifier("m".to_string()),
            TokenKind::LeftParen,
            TokenKind::QuotedOpen,
            text("a"),
            text("b"),
            TokenKind::QuotedClose,
            TokenKind::RightParen,
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn test_variable_reference() {
        assert_eq!(lex("m(${x})"), vec![
            TokenKind::Identifier("m".to_string()),
            TokenKind::LeftParen,
            TokenKind::VarOpen(VarRefKind::Normal),
            text("x"),
            TokenKind::VarClose,
            TokenKind::RightParen,
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn test_nested_variable_reference() {
        assert_eq!(lex("m(${a${b}c})"), vec![
            TokenKind::Identifier("m".to_string()),
            TokenKind::LeftParen,
            TokenKind::VarOpen(VarRefKind::Normal),
            text("a"),
            TokenKind::VarOpen(VarRefKind::Normal),
            text("b"),
            TokenKind::VarClose,
            text("c"),
            TokenKind::VarClose,
            TokenKind::RightParen,
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn test_cache_and_env_references() {
        assert_eq!(lex("m($CACHE{X}$ENV{PATH})"), vec![
            TokenKind::Identifier("m".to_string()),
            TokenKind::LeftParen,
            TokenKind::VarOpen(VarRefKind::Cache),
            text("X"),
            TokenKind::VarClose,
            TokenKind::VarOpen(VarRefKind::Env),
            text("PATH"),
            TokenKind::VarClose,
            TokenKind::RightParen,
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn test_plain_dollar_is_ordinary() {
        assert_eq!(lex("m(a$b $ENVY)"), vec![
            TokenKind::Identifier("m".to_string()),
            TokenKind::LeftParen,
            text("a$b"),
            TokenKind::Separation,
            text("$ENVY"),
            TokenKind::RightParen,
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn test_bracket_argument() {
        assert_eq!(lex("m([==[ raw ${x} ]==])"), vec![
            TokenKind::Identifier("m".to_string()),
            TokenKind::LeftParen,
            TokenKind::BracketArgument(" raw ${x} ".to_string()),
            TokenKind::RightParen,
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn test_bracket_argument_shorter_close_is_content() {
        assert_eq!(lex("m([=[a]]b]=])"), vec![
            TokenKind::Identifier("m".to_string()),
            TokenKind::LeftParen,
            TokenKind::BracketArgument("a]]b".to_string()),
            TokenKind::RightParen,
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn test_plain_open_bracket_is_ordinary() {
        assert_eq!(lex("m(a[0])"), vec![
            TokenKind::Identifier("m".to_string()),
            TokenKind::LeftParen,
            text("a[0]"),
            TokenKind::RightParen,
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn test_nested_parentheses_stay_in_argument_mode() {
        assert_eq!(lex("if(NOT (A))"), vec![
            TokenKind::Identifier("if".to_string()),
            TokenKind::LeftParen,
            text("NOT"),
            TokenKind::Separation,
            TokenKind::LeftParen,
            text("A"),
            TokenKind::RightParen,
            TokenKind::RightParen,
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn test_line_comment() {
        assert_eq!(lex("# hello\nset(a)"), vec![
            TokenKind::Identifier("set".to_string()),
            TokenKind::LeftParen,
            text("a"),
            TokenKind::RightParen,
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn test_bracket_comment() {
        assert_eq!(lex("#[=[ block\ncomment ]=]set(a)"), vec![
            TokenKind::Identifier("set".to_string()),
            TokenKind::LeftParen,
            text("a"),
            TokenKind::RightParen,
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn test_comment_inside_arguments() {
        assert_eq!(lex("m(a # trailing\n b)"), vec![
            TokenKind::Identifier("m".to_string()),
            TokenKind::LeftParen,
            text("a"),
            TokenKind::Separation,
            TokenKind::Separation,
            text("b"),
            TokenKind::RightParen,
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn test_escaped_space_joins_run() {
        assert_eq!(lex("m(a\\ b)"), vec![
            TokenKind::Identifier("m".to_string()),
            TokenKind::LeftParen,
            text("a"),
            TokenKind::Escape(' '),
            text("b"),
            TokenKind::RightParen,
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn test_unterminated_quote() {
        assert!(matches!(
            lex_err("m(\"abc"),
            ParseError::UnterminatedQuoted { .. }
        ));
    }

    #[test]
    fn test_unterminated_bracket() {
        assert!(matches!(
            lex_err("m([=[abc]])"),
            ParseError::UnterminatedBracket { .. }
        ));
    }

    #[test]
    fn test_unterminated_reference() {
        assert!(matches!(
            lex_err("m(${abc)"),
            ParseError::UnterminatedVariableReference { .. }
        ));
    }

    #[test]
    fn test_unmatched_close_brace() {
        assert!(matches!(
            lex_err("m(a})"),
            ParseError::UnmatchedCloseBrace { .. }
        ));
    }

    #[test]
    fn test_unexpected_character_at_top_level() {
        assert!(matches!(
            lex_err("123(a)"),
            ParseError::UnexpectedCharacter { found: '1', .. }
        ));
    }

    #[test]
    fn test_strict_rejects_unknown_escape() {
        let mut scanner = Scanner::new("m(a\\qb)");
        scanner.set_strict(true);
        let err = loop {
            match scanner.next_token() {
                Ok(token) if token.kind == TokenKind::Eof => panic!("expected error"),
                Ok(_) => continue,
                Err(err) => break err,
            }
        };
        assert!(matches!(err, ParseError::InvalidEscape { found: 'q', .. }));
    }

    #[test]
    fn test_permissive_identity_escape() {
        assert_eq!(lex("m(a\\qb)"), vec![
            TokenKind::Identifier("m".to_string()),
            TokenKind::LeftParen,
            text("a"),
            TokenKind::Escape('q'),
            text("b"),
            TokenKind::RightParen,
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn test_line_numbers() {
        let mut scanner = Scanner::new("set(a)\nset(b)\n");
        let mut lines = Vec::new();
        loop {
            let token = scanner.next_token().expect("scan failed");
            if token.kind == TokenKind::Eof {
                break;
            }
            if matches!(token.kind, TokenKind::Identifier(_)) {
                lines.push(token.span.line);
            }
        }
        assert_eq!(lines, vec![1, 2]);
    }

    #[test]
    fn test_bracket_payload_is_verbatim() {
        let source = "m([[\nline1\nline2]])";
        let kinds = lex(source);
        assert!(kinds.contains(&TokenKind::BracketArgument("\nline1\nline2".to_string())));
    }

    #[test]
    fn test_closing_brace_literal_in_quoted() {
        assert_eq!(lex(r#"m("}")"#), vec![
            TokenKind::Identifier("m".to_string()),
            TokenKind::LeftParen,
            TokenKind::QuotedOpen,
            text("}"),
            TokenKind::QuotedClose,
            TokenKind::RightParen,
            TokenKind::Eof,
        ]);
    }
}
