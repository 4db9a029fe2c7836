//! Indentation-aware lexer for the NovaIR DSL.
//!
//! Tokenizes one logical line at a time. Blank and comment-only lines are
//! skipped entirely (no tokens, no indent bookkeeping). Every other line
//! contributes zero or more `Indent`/`Dedent` tokens followed by its content
//! tokens and a trailing `Newline`.

use super::token::{Token, TokenKind};
use novair_core::LexError;

/// Unit suffixes recognized immediately after a numeric literal, longest
/// candidates first so `kHz` isn't mistaken for a truncated `Hz` etc.
const UNIT_TOKENS: &[&str] = &[
    "dBA", "kHz", "MHz", "GHz", "ms", "kW", "mW", "KB", "MB", "GB", "TB", "Hz", "dB", "B", "K",
    "W", "s", "m", "h", "%",
];

pub struct Lexer<'a> {
    lines: Vec<&'a str>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            lines: source.lines().collect(),
        }
    }

    /// Tokenize the whole source, returning the token stream ending in `Eof`.
    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        let mut indent_stack: Vec<usize> = vec![0];
        let mut last_line = 1usize;

        for (idx, raw_line) in self.lines.iter().enumerate() {
            let line_no = idx + 1;
            last_line = line_no;

            let (indent_width, rest) = split_indent(raw_line, line_no)?;
            let content_start = rest.trim_start();
            if content_start.is_empty() || content_start.starts_with('#') {
                continue;
            }

            let top = *indent_stack.last().unwrap();
            if indent_width > top {
                indent_stack.push(indent_width);
                tokens.push(Token::new(TokenKind::Indent, line_no, 1));
            } else if indent_width < top {
                while *indent_stack.last().unwrap() > indent_width {
                    indent_stack.pop();
                    tokens.push(Token::new(TokenKind::Dedent, line_no, 1));
                }
                if *indent_stack.last().unwrap() != indent_width {
                    return Err(LexError::IndentMismatch {
                        line: line_no,
                        found: indent_width,
                    });
                }
            }

            tokenize_line(rest, indent_width, line_no, &mut tokens)?;
            tokens.push(Token::new(TokenKind::Newline, line_no, raw_line.len() + 1));
        }

        while indent_stack.len() > 1 {
            indent_stack.pop();
            tokens.push(Token::new(TokenKind::Dedent, last_line, 1));
        }
        tokens.push(Token::new(TokenKind::Eof, last_line, 1));
        Ok(tokens)
    }
}

/// Splits a raw line into its leading-indentation width and the remainder.
/// Rejects indentation that mixes tabs and spaces.
fn split_indent(line: &str, line_no: usize) -> Result<(usize, &str), LexError> {
    let mut width = 0usize;
    let mut saw_space = false;
    let mut saw_tab = false;
    let mut consumed = 0usize;

    for ch in line.chars() {
        match ch {
            ' ' => {
                saw_space = true;
                width += 1;
                consumed += 1;
            }
            '\t' => {
                saw_tab = true;
                width += 1;
                consumed += 1;
            }
            _ => break,
        }
        if saw_space && saw_tab {
            return Err(LexError::MixedIndentation { line: line_no });
        }
    }

    Ok((width, &line[consumed..]))
}

fn tokenize_line(
    rest: &str,
    indent_width: usize,
    line_no: usize,
    out: &mut Vec<Token>,
) -> Result<(), LexError> {
    let mut scanner = LineScanner {
        bytes: rest,
        chars: rest.char_indices().peekable(),
        line: line_no,
        col_offset: indent_width + 1,
    };
    scanner.run(out)
}

struct LineScanner<'a> {
    bytes: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    line: usize,
    col_offset: usize,
}

impl<'a> LineScanner<'a> {
    fn column(&mut self) -> usize {
        let pos = self
            .chars
            .peek()
            .map(|(i, _)| *i)
            .unwrap_or(self.bytes.len());
        self.col_offset + pos
    }

    fn byte_pos(&mut self) -> usize {
        self.chars
            .peek()
            .map(|(i, _)| *i)
            .unwrap_or(self.bytes.len())
    }

    fn remaining(&mut self) -> &'a str {
        let pos = self.byte_pos();
        &self.bytes[pos..]
    }

    fn advance(&mut self) -> Option<char> {
        self.chars.next().map(|(_, c)| c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn run(&mut self, out: &mut Vec<Token>) -> Result<(), LexError> {
        loop {
            while matches!(self.peek(), Some(' ') | Some('\t')) {
                self.advance();
            }

            let Some(c) = self.peek() else { break };
            if c == '#' {
                break;
            }

            let col = self.column();
            if c.is_ascii_digit() || ((c == '-' || c == '+') && self.starts_signed_number()) {
                self.scan_number(col, out)?;
                continue;
            }
            let kind = self.scan_token(col)?;
            out.push(Token::new(kind, self.line, col));
        }
        Ok(())
    }

    /// Whether a leading `+`/`-` at the current position begins a numeric
    /// literal rather than the arrow operators or an error.
    fn starts_signed_number(&mut self) -> bool {
        let mut lookahead = self.chars.clone();
        lookahead.next();
        matches!(lookahead.peek(), Some((_, d)) if d.is_ascii_digit())
    }

    fn scan_token(&mut self, col: usize) -> Result<TokenKind, LexError> {
        let c = self.peek().unwrap();
        match c {
            ':' => {
                self.advance();
                Ok(TokenKind::Colon)
            }
            ',' => {
                self.advance();
                Ok(TokenKind::Comma)
            }
            '(' => {
                self.advance();
                Ok(TokenKind::LParen)
            }
            ')' => {
                self.advance();
                Ok(TokenKind::RParen)
            }
            '[' => {
                self.advance();
                Ok(TokenKind::LBracket)
            }
            ']' => {
                self.advance();
                Ok(TokenKind::RBracket)
            }
            '.' => {
                self.advance();
                if self.peek() == Some('.') {
                    self.advance();
                    Ok(TokenKind::Range)
                } else {
                    Ok(TokenKind::Dot)
                }
            }
            '<' => {
                self.advance();
                match self.peek() {
                    Some('-') => {
                        self.advance();
                        Ok(TokenKind::ArrowLeft)
                    }
                    Some('=') => {
                        self.advance();
                        Ok(TokenKind::Le)
                    }
                    _ => Ok(TokenKind::Lt),
                }
            }
            '>' => {
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                    Ok(TokenKind::Ge)
                } else {
                    Ok(TokenKind::Gt)
                }
            }
            '=' => {
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                    Ok(TokenKind::EqEq)
                } else {
                    Err(LexError::UnexpectedChar {
                        ch: '=',
                        line: self.line,
                        column: col,
                    })
                }
            }
            '!' => {
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                    Ok(TokenKind::Ne)
                } else {
                    Err(LexError::UnexpectedChar {
                        ch: '!',
                        line: self.line,
                        column: col,
                    })
                }
            }
            '-' => {
                self.advance();
                if self.peek() == Some('>') {
                    self.advance();
                    Ok(TokenKind::ArrowRight)
                } else {
                    Err(LexError::UnexpectedChar {
                        ch: '-',
                        line: self.line,
                        column: col,
                    })
                }
            }
            '"' => self.scan_string(col),
            '@' => self.scan_annotation(col),
            a if a.is_alphabetic() || a == '_' => Ok(self.scan_identifier()),
            other => {
                self.advance();
                Err(LexError::UnexpectedChar {
                    ch: other,
                    line: self.line,
                    column: col,
                })
            }
        }
    }

    fn scan_string(&mut self, col: usize) -> Result<TokenKind, LexError> {
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.advance() {
                None => {
                    return Err(LexError::UnterminatedString {
                        line: self.line,
                        column: col,
                    })
                }
                Some('"') => break,
                Some(c) => value.push(c),
            }
        }
        Ok(TokenKind::String(value))
    }

    fn scan_annotation(&mut self, col: usize) -> Result<TokenKind, LexError> {
        self.advance(); // '@'
        let start = self.byte_pos();
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.advance();
        }
        let end = self.byte_pos();
        let name = &self.bytes[start..end];
        match name {
            "version" => Ok(TokenKind::Version),
            "critical" => Ok(TokenKind::Critical),
            "warning" => Ok(TokenKind::Warning),
            "priority" => Ok(TokenKind::Priority),
            _ => Err(LexError::UnknownAnnotation {
                name: name.to_string(),
                line: self.line,
                column: col,
            }),
        }
    }

    fn scan_identifier(&mut self) -> TokenKind {
        let start = self.byte_pos();
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.advance();
        }
        let end = self.byte_pos();
        let ident = &self.bytes[start..end];
        match ident {
            "system" => TokenKind::System,
            "state" => TokenKind::State,
            "constraints" => TokenKind::Constraints,
            "objectives" => TokenKind::Objectives,
            "actions" => TokenKind::Actions,
            "tick" => TokenKind::Tick,
            "parameters" => TokenKind::Parameters,
            "effects" => TokenKind::Effects,
            "cost" => TokenKind::Cost,
            "target" => TokenKind::Target,
            "min" => TokenKind::Min,
            "max" => TokenKind::Max,
            "to" => TokenKind::To,
            "interval" => TokenKind::Interval,
            "action_threshold" => TokenKind::ActionThreshold,
            "mode" => TokenKind::Mode,
            "low" => TokenKind::Low,
            "medium" => TokenKind::Medium,
            "high" => TokenKind::High,
            "continuous" => TokenKind::Continuous,
            "reactive" => TokenKind::Reactive,
            _ => TokenKind::Identifier(ident.to_string()),
        }
    }

    /// Scans a number (with optional leading sign and fractional part) and
    /// pushes it, plus a following `Unit` token if one is immediately
    /// adjacent, onto `out`.
    fn scan_number(&mut self, col: usize, out: &mut Vec<Token>) -> Result<(), LexError> {
        let negative = match self.peek() {
            Some('-') => {
                self.advance();
                true
            }
            Some('+') => {
                self.advance();
                false
            }
            _ => false,
        };

        let start = self.byte_pos();
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
        // A fractional part is only consumed when the `.` is followed by a
        // digit; `85..95` must lex as Number, Range, Number.
        if self.peek() == Some('.') {
            let mut lookahead = self.chars.clone();
            lookahead.next();
            if matches!(lookahead.peek(), Some((_, d)) if d.is_ascii_digit()) {
                self.advance();
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    self.advance();
                }
            }
        }
        let end = self.byte_pos();
        let mut value: f64 = self.bytes[start..end].parse().unwrap_or(0.0);
        if negative {
            value = -value;
        }
        out.push(Token::new(TokenKind::Number(value), self.line, col));

        if let Some(unit) = self.scan_unit_suffix() {
            out.push(Token::new(TokenKind::Unit(unit), self.line, col));
        }
        Ok(())
    }

    /// Recognizes a unit token immediately following a number, with no
    /// intervening whitespace. Consumes the whole trailing alphanumeric run
    /// first and only then checks it against the known-unit set; an
    /// unrecognized run is still consumed and produces no token at all, so
    /// `30msg` lexes as bare `Number(30)` with `msg` dropped rather than as
    /// `Number, Unit("ms"), Identifier("g")`. This matches the reference
    /// lexer's `_read_number` (`lexer.py`), which reads the full alphabetic
    /// run before checking membership in its unit set and simply advances
    /// past it either way.
    fn scan_unit_suffix(&mut self) -> Option<String> {
        if self.peek() == Some('°') {
            let mut lookahead = self.chars.clone();
            lookahead.next();
            match lookahead.peek().map(|(_, c)| *c) {
                Some('C') | Some('F') => {
                    self.advance();
                    let letter = self.advance().unwrap();
                    return Some(format!("°{}", letter));
                }
                _ => return None,
            }
        }

        if self.peek() == Some('%') {
            self.advance();
            return Some("%".to_string());
        }

        if !matches!(self.peek(), Some(c) if c.is_alphabetic()) {
            return None;
        }

        let start = self.byte_pos();
        while matches!(self.peek(), Some(c) if c.is_alphanumeric()) {
            self.advance();
        }
        let end = self.byte_pos();
        let run = &self.bytes[start..end];

        if UNIT_TOKENS.contains(&run) || matches!(run.to_ascii_lowercase().as_str(), "ms" | "s" | "m" | "h") {
            Some(run.to_string())
        } else {
            None
        }
    }
}
