//! Tokenizer for the script language.
//!
//! Produces a flat token stream with explicit `Newline`, `Indent` and `Dedent`
//! tokens, so the parser never looks at whitespace. Newlines inside brackets
//! and after a trailing backslash do not end a logical line.

use crate::error::LoadError;

/// Reserved words the language understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Def,
    Return,
    If,
    Elif,
    Else,
    While,
    For,
    In,
    Not,
    And,
    Or,
    Is,
    True,
    False,
    None,
    Break,
    Continue,
    Pass,
    Raise,
    Assert,
}

/// Python keywords the language reserves but does not implement.
const UNSUPPORTED_KEYWORDS: &[&str] = &[
    "import", "from", "class", "lambda", "try", "except", "finally", "with", "as", "yield",
    "global", "nonlocal", "del", "async", "await",
];

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Name(String),
    Int(i64),
    Float(f64),
    Str(String),
    Keyword(Keyword),
    /// A reserved word with no implementation, kept for a precise error.
    Unsupported(String),

    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Semicolon,
    Dot,
    Arrow,

    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,

    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    DoubleStarAssign,
    SlashAssign,
    DoubleSlashAssign,
    PercentAssign,

    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,

    Newline,
    Indent,
    Dedent,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub col: usize,
}

/// Tokenizes `src` into a stream terminated by [`TokenKind::Eof`].
pub fn tokenize(src: &str) -> Result<Vec<Token>, LoadError> {
    Lexer::new(src).run()
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    col: usize,
    indents: Vec<usize>,
    depth: usize,
    at_line_start: bool,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            chars: src.chars().peekable(),
            line: 1,
            col: 0,
            indents: vec![0],
            depth: 0,
            at_line_start: true,
            tokens: Vec::new(),
        }
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        if ch == '\n' {
            self.line += 1;
            self.col = 0;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn peek_second(&self) -> Option<char> {
        let mut it = self.chars.clone();
        it.next();
        it.next()
    }

    fn push(&mut self, kind: TokenKind, line: usize, col: usize) {
        self.tokens.push(Token { kind, line, col });
    }

    fn run(mut self) -> Result<Vec<Token>, LoadError> {
        loop {
            if self.at_line_start && self.depth == 0 {
                if !self.start_line()? {
                    break;
                }
                continue;
            }

            let Some(ch) = self.peek() else { break };
            let (line, col) = (self.line, self.col);
            match ch {
                ' ' | '\t' | '\r' | '\x0c' => {
                    self.bump();
                }
                '#' => self.skip_comment(),
                '\\' => {
                    self.bump();
                    while matches!(self.peek(), Some('\r')) {
                        self.bump();
                    }
                    if self.bump() != Some('\n') {
                        return Err(LoadError::syntax(
                            line,
                            "unexpected character after line continuation character",
                        ));
                    }
                }
                '\n' => {
                    self.bump();
                    if self.depth == 0 {
                        self.end_logical_line(line, col);
                        self.at_line_start = true;
                    }
                }
                c if c.is_ascii_digit() => self.lex_number(line, col)?,
                '.' if self.peek_second().is_some_and(|c| c.is_ascii_digit()) => {
                    self.lex_number(line, col)?
                }
                c if c.is_alphabetic() || c == '_' => self.lex_identifier(line, col)?,
                '\'' | '"' => self.lex_string(line, col)?,
                _ => self.lex_operator(line, col)?,
            }
        }

        if self.depth > 0 {
            return Err(LoadError::syntax(self.line, "unexpected EOF: unclosed bracket"));
        }
        let (line, col) = (self.line, self.col);
        self.end_logical_line(line, col);
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(TokenKind::Dedent, line, 0);
        }
        self.push(TokenKind::Eof, line, col);
        Ok(self.tokens)
    }

    /// Measures indentation at the start of a physical line and emits
    /// `Indent`/`Dedent` tokens. Returns `false` at end of input.
    fn start_line(&mut self) -> Result<bool, LoadError> {
        let mut width = 0;
        loop {
            match self.peek() {
                Some(' ') => width += 1,
                Some('\t') => width = (width / 8 + 1) * 8,
                Some('\r') | Some('\x0c') => {}
                _ => break,
            }
            self.bump();
        }

        match self.peek() {
            None => return Ok(false),
            Some('\n') => {
                self.bump();
                return Ok(true);
            }
            Some('#') => {
                self.skip_comment();
                return Ok(true);
            }
            Some(_) => {}
        }

        let line = self.line;
        let current = self.indents.last().copied().unwrap_or(0);
        if width > current {
            self.indents.push(width);
            self.push(TokenKind::Indent, line, 0);
        } else if width < current {
            while self.indents.last().is_some_and(|&w| w > width) {
                self.indents.pop();
                self.push(TokenKind::Dedent, line, 0);
            }
            if self.indents.last().copied() != Some(width) {
                return Err(LoadError::syntax(
                    line,
                    "unindent does not match any outer indentation level",
                ));
            }
        }
        self.at_line_start = false;
        Ok(true)
    }

    fn end_logical_line(&mut self, line: usize, col: usize) {
        let needs_newline = self.tokens.last().is_some_and(|t| {
            !matches!(
                t.kind,
                TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent
            )
        });
        if needs_newline {
            self.push(TokenKind::Newline, line, col);
        }
    }

    fn skip_comment(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn lex_number(&mut self, line: usize, col: usize) -> Result<(), LoadError> {
        let mut buf = String::new();

        if self.peek() == Some('0') {
            let radix = match self.peek_second() {
                Some('x') | Some('X') => Some(16),
                Some('o') | Some('O') => Some(8),
                Some('b') | Some('B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.bump();
                self.bump();
                while let Some(ch) = self.peek() {
                    if ch.is_ascii_alphanumeric() || ch == '_' {
                        if ch != '_' {
                            buf.push(ch);
                        }
                        self.bump();
                    } else {
                        break;
                    }
                }
                let value = i64::from_str_radix(&buf, radix).map_err(|_| {
                    LoadError::syntax(line, format!("invalid integer literal '{buf}'"))
                })?;
                self.push(TokenKind::Int(value), line, col);
                return Ok(());
            }
        }

        let mut is_float = false;
        while let Some(ch) = self.peek() {
            match ch {
                '0'..='9' => buf.push(ch),
                '_' => {}
                '.' if !is_float => {
                    is_float = true;
                    buf.push(ch);
                }
                'e' | 'E' => {
                    is_float = true;
                    buf.push(ch);
                    self.bump();
                    if let Some(sign @ ('+' | '-')) = self.peek() {
                        buf.push(sign);
                        self.bump();
                    }
                    continue;
                }
                _ => break,
            }
            self.bump();
        }

        if self.peek().is_some_and(|c| c.is_alphabetic() || c == '_') {
            return Err(LoadError::syntax(line, "invalid decimal literal"));
        }

        let kind = if is_float {
            let value = buf
                .parse::<f64>()
                .map_err(|_| LoadError::syntax(line, format!("invalid float literal '{buf}'")))?;
            TokenKind::Float(value)
        } else {
            let value = buf.parse::<i64>().map_err(|_| {
                LoadError::syntax(line, format!("integer literal '{buf}' is too large"))
            })?;
            TokenKind::Int(value)
        };
        self.push(kind, line, col);
        Ok(())
    }

    fn lex_identifier(&mut self, line: usize, col: usize) -> Result<(), LoadError> {
        let mut buf = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                buf.push(ch);
                self.bump();
            } else {
                break;
            }
        }

        if matches!(self.peek(), Some('\'' | '"')) {
            return Err(LoadError::syntax(
                line,
                format!("string prefix '{buf}' is not supported"),
            ));
        }

        let kind = match buf.as_str() {
            "def" => TokenKind::Keyword(Keyword::Def),
            "return" => TokenKind::Keyword(Keyword::Return),
            "if" => TokenKind::Keyword(Keyword::If),
            "elif" => TokenKind::Keyword(Keyword::Elif),
            "else" => TokenKind::Keyword(Keyword::Else),
            "while" => TokenKind::Keyword(Keyword::While),
            "for" => TokenKind::Keyword(Keyword::For),
            "in" => TokenKind::Keyword(Keyword::In),
            "not" => TokenKind::Keyword(Keyword::Not),
            "and" => TokenKind::Keyword(Keyword::And),
            "or" => TokenKind::Keyword(Keyword::Or),
            "is" => TokenKind::Keyword(Keyword::Is),
            "True" => TokenKind::Keyword(Keyword::True),
            "False" => TokenKind::Keyword(Keyword::False),
            "None" => TokenKind::Keyword(Keyword::None),
            "break" => TokenKind::Keyword(Keyword::Break),
            "continue" => TokenKind::Keyword(Keyword::Continue),
            "pass" => TokenKind::Keyword(Keyword::Pass),
            "raise" => TokenKind::Keyword(Keyword::Raise),
            "assert" => TokenKind::Keyword(Keyword::Assert),
            other if UNSUPPORTED_KEYWORDS.contains(&other) => TokenKind::Unsupported(buf),
            _ => TokenKind::Name(buf),
        };
        self.push(kind, line, col);
        Ok(())
    }

    fn lex_string(&mut self, line: usize, col: usize) -> Result<(), LoadError> {
        let Some(quote) = self.bump() else {
            return Err(LoadError::syntax(line, "unterminated string literal"));
        };
        let triple = self.peek() == Some(quote) && self.peek_second() == Some(quote);
        if triple {
            self.bump();
            self.bump();
        }

        let mut buf = String::new();
        loop {
            let Some(ch) = self.bump() else {
                return Err(LoadError::syntax(line, "unterminated string literal"));
            };
            match ch {
                c if c == quote => {
                    if !triple {
                        break;
                    }
                    if self.peek() == Some(quote) && self.peek_second() == Some(quote) {
                        self.bump();
                        self.bump();
                        break;
                    }
                    buf.push(c);
                }
                '\n' if !triple => {
                    return Err(LoadError::syntax(line, "unterminated string literal"));
                }
                '\\' => {
                    let Some(esc) = self.bump() else {
                        return Err(LoadError::syntax(line, "unterminated string literal"));
                    };
                    match esc {
                        'n' => buf.push('\n'),
                        't' => buf.push('\t'),
                        'r' => buf.push('\r'),
                        '0' => buf.push('\0'),
                        '\\' => buf.push('\\'),
                        '\'' => buf.push('\''),
                        '"' => buf.push('"'),
                        '\n' => {}
                        other => {
                            buf.push('\\');
                            buf.push(other);
                        }
                    }
                }
                c => buf.push(c),
            }
        }

        self.push(TokenKind::Str(buf), line, col);
        Ok(())
    }

    fn lex_operator(&mut self, line: usize, col: usize) -> Result<(), LoadError> {
        let Some(ch) = self.bump() else {
            return Ok(());
        };
        let next = self.peek();

        let kind = match (ch, next) {
            ('(', _) => {
                self.depth += 1;
                TokenKind::LParen
            }
            ('[', _) => {
                self.depth += 1;
                TokenKind::LBracket
            }
            ('{', _) => {
                self.depth += 1;
                TokenKind::LBrace
            }
            (')' | ']' | '}', _) => {
                if self.depth == 0 {
                    return Err(LoadError::syntax(line, format!("unmatched '{ch}'")));
                }
                self.depth -= 1;
                match ch {
                    ')' => TokenKind::RParen,
                    ']' => TokenKind::RBracket,
                    _ => TokenKind::RBrace,
                }
            }
            (',', _) => TokenKind::Comma,
            (':', _) => TokenKind::Colon,
            (';', _) => TokenKind::Semicolon,
            ('.', _) => TokenKind::Dot,
            ('+', Some('=')) => self.take(TokenKind::PlusAssign),
            ('+', _) => TokenKind::Plus,
            ('-', Some('=')) => self.take(TokenKind::MinusAssign),
            ('-', Some('>')) => self.take(TokenKind::Arrow),
            ('-', _) => TokenKind::Minus,
            ('*', Some('*')) => {
                self.bump();
                if self.peek() == Some('=') {
                    self.take(TokenKind::DoubleStarAssign)
                } else {
                    TokenKind::DoubleStar
                }
            }
            ('*', Some('=')) => self.take(TokenKind::StarAssign),
            ('*', _) => TokenKind::Star,
            ('/', Some('/')) => {
                self.bump();
                if self.peek() == Some('=') {
                    self.take(TokenKind::DoubleSlashAssign)
                } else {
                    TokenKind::DoubleSlash
                }
            }
            ('/', Some('=')) => self.take(TokenKind::SlashAssign),
            ('/', _) => TokenKind::Slash,
            ('%', Some('=')) => self.take(TokenKind::PercentAssign),
            ('%', _) => TokenKind::Percent,
            ('=', Some('=')) => self.take(TokenKind::EqEq),
            ('=', _) => TokenKind::Assign,
            ('!', Some('=')) => self.take(TokenKind::NotEq),
            ('<', Some('=')) => self.take(TokenKind::Le),
            ('<', _) => TokenKind::Lt,
            ('>', Some('=')) => self.take(TokenKind::Ge),
            ('>', _) => TokenKind::Gt,
            (other, _) => {
                return Err(LoadError::syntax(
                    line,
                    format!("invalid character '{other}'"),
                ))
            }
        };
        self.push(kind, line, col);
        Ok(())
    }

    /// Consumes the second character of a two-character operator.
    fn take(&mut self, kind: TokenKind) -> TokenKind {
        self.bump();
        kind
    }
}
