//! Tokenizer for Part 21 (ISO 10303-21) entity records.
//!
//! Only what the DATA section needs: keywords (including user-defined
//! `!NAME`), `#id` references, strings with their control directives decoded,
//! reals and integers, `.ENUM.` values and punctuation. `/* */` comments are
//! skipped.

use crate::error::{Result, StepError};

/// A lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Entity type or section keyword, uppercased.
    Keyword(String),
    /// `#123`.
    EntityRef(u64),
    /// Decoded string contents.
    String(String),
    Real(f64),
    Integer(i64),
    /// `.TRUE.` is `Enum("TRUE")`.
    Enum(String),
    LParen,
    RParen,
    Comma,
    Semicolon,
    Equals,
    /// `*`, a derived attribute.
    Asterisk,
    /// `$`, an unset attribute.
    Dollar,
}

/// 1-based line and column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub col: usize,
}

/// A token and where it starts.
#[derive(Debug, Clone)]
pub struct SpannedToken {
    pub token: Token,
    pub pos: Position,
}

/// Byte-level scanner over one record (or a whole file).
pub struct Lexer<'a> {
    src: &'a [u8],
    at: usize,
    here: Position,
}

impl<'a> Lexer<'a> {
    /// Scan `src`, reporting positions as if it began at `line`.
    pub fn starting_at(src: &'a [u8], line: usize) -> Self {
        Self {
            src,
            at: 0,
            here: Position { line, col: 1 },
        }
    }

    /// All remaining tokens.
    pub fn tokenize(&mut self) -> Result<Vec<SpannedToken>> {
        std::iter::from_fn(|| self.next_token().transpose()).collect()
    }

    /// The next token, or `None` at the end of input.
    pub fn next_token(&mut self) -> Result<Option<SpannedToken>> {
        self.skip_trivia();
        let Some(byte) = self.current() else {
            return Ok(None);
        };
        let pos = self.here;
        let starts_number =
            |next: Option<u8>| next.is_some_and(|c| c.is_ascii_digit() || c == b'.');

        let token = match byte {
            b'(' => self.punct(Token::LParen),
            b')' => self.punct(Token::RParen),
            b',' => self.punct(Token::Comma),
            b';' => self.punct(Token::Semicolon),
            b'=' => self.punct(Token::Equals),
            b'*' => self.punct(Token::Asterisk),
            b'$' => self.punct(Token::Dollar),
            b'#' => self.entity_ref(pos)?,
            b'\'' => self.string(pos)?,
            // `.5` is a real, `.T.` an enumeration
            b'.' if self.lookahead(1).is_some_and(|c| c.is_ascii_digit()) => self.number(pos)?,
            b'.' => self.enumeration(pos)?,
            b'-' | b'+' if starts_number(self.lookahead(1)) => self.number(pos)?,
            b'0'..=b'9' => self.number(pos)?,
            b'A'..=b'Z' | b'a'..=b'z' | b'_' | b'!' => self.keyword(),
            other => {
                return Err(StepError::lexer(
                    pos.line,
                    pos.col,
                    format!("unexpected character: '{}'", other.escape_ascii()),
                ))
            }
        };
        Ok(Some(SpannedToken { token, pos }))
    }

    fn current(&self) -> Option<u8> {
        self.src.get(self.at).copied()
    }

    fn lookahead(&self, n: usize) -> Option<u8> {
        self.src.get(self.at + n).copied()
    }

    fn bump(&mut self) {
        if let Some(byte) = self.current() {
            self.at += 1;
            if byte == b'\n' {
                self.here.line += 1;
                self.here.col = 1;
            } else {
                self.here.col += 1;
            }
        }
    }

    fn punct(&mut self, token: Token) -> Token {
        self.bump();
        token
    }

    /// Consume bytes matching `pred` and return them.
    fn eat_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a [u8] {
        let src = self.src;
        let start = self.at;
        while self.current().is_some_and(&pred) {
            self.bump();
        }
        &src[start..self.at]
    }

    fn skip_trivia(&mut self) {
        loop {
            self.eat_while(|c| c.is_ascii_whitespace());
            if !self.src[self.at..].starts_with(b"/*") {
                return;
            }
            let rest = &self.src[self.at + 2..];
            let len = match rest.windows(2).position(|w| w == b"*/") {
                Some(offset) => offset + 4,
                // Unterminated comment runs to the end
                None => rest.len() + 2,
            };
            (0..len).for_each(|_| self.bump());
        }
    }

    fn entity_ref(&mut self, pos: Position) -> Result<Token> {
        self.bump();
        let digits = String::from_utf8_lossy(self.eat_while(|c| c.is_ascii_digit())).into_owned();
        if digits.is_empty() {
            return Err(StepError::lexer(pos.line, pos.col, "expected digits after '#'"));
        }
        digits.parse().map(Token::EntityRef).map_err(|_| {
            StepError::lexer(pos.line, pos.col, format!("invalid entity id: {digits}"))
        })
    }

    fn string(&mut self, pos: Position) -> Result<Token> {
        self.bump();
        let mut bytes = Vec::new();
        loop {
            let Some(byte) = self.current() else {
                return Err(StepError::lexer(pos.line, pos.col, "unterminated string"));
            };
            self.bump();
            match byte {
                // `''` is an embedded quote
                b'\'' if self.current() == Some(b'\'') => {
                    bytes.push(b'\'');
                    self.bump();
                }
                b'\'' => break,
                b'\n' | b'\r' => {}
                other => bytes.push(other),
            }
        }
        Ok(Token::String(decode_string(&String::from_utf8_lossy(&bytes))))
    }

    fn enumeration(&mut self, pos: Position) -> Result<Token> {
        self.bump();
        let name = self.eat_while(|c| c.is_ascii_alphanumeric() || c == b'_');
        let name = String::from_utf8_lossy(name).to_uppercase();
        match self.current() {
            Some(b'.') if !name.is_empty() => {
                self.bump();
                Ok(Token::Enum(name))
            }
            Some(b'.') => Err(StepError::lexer(pos.line, pos.col, "empty enumeration")),
            Some(other) => Err(StepError::lexer(
                pos.line,
                pos.col,
                format!("invalid character in enumeration: '{}'", other.escape_ascii()),
            )),
            None => Err(StepError::lexer(pos.line, pos.col, "unterminated enumeration")),
        }
    }

    fn number(&mut self, pos: Position) -> Result<Token> {
        let start = self.at;
        if matches!(self.current(), Some(b'-' | b'+')) {
            self.bump();
        }
        self.eat_while(|c| c.is_ascii_digit());
        let mut real = false;
        // STEP allows a bare trailing dot (`1.`)
        if self.current() == Some(b'.') {
            real = true;
            self.bump();
            self.eat_while(|c| c.is_ascii_digit());
        }
        if matches!(self.current(), Some(b'E' | b'e')) {
            real = true;
            self.bump();
            if matches!(self.current(), Some(b'-' | b'+')) {
                self.bump();
            }
            self.eat_while(|c| c.is_ascii_digit());
        }

        let text = String::from_utf8_lossy(&self.src[start..self.at]).into_owned();
        let invalid =
            |kind: &str| StepError::lexer(pos.line, pos.col, format!("invalid {kind}: {text}"));
        if real {
            normalize_real(&text)
                .parse()
                .map(Token::Real)
                .map_err(|_| invalid("real number"))
        } else {
            text.parse().map(Token::Integer).map_err(|_| invalid("integer"))
        }
    }

    fn keyword(&mut self) -> Token {
        let bang = self.current() == Some(b'!');
        if bang {
            self.bump();
        }
        // Header keywords contain hyphens (END-ISO-10303-21)
        let word = self.eat_while(|c| c.is_ascii_alphanumeric() || c == b'_' || c == b'-');
        let word = String::from_utf8_lossy(word).to_uppercase();
        Token::Keyword(if bang { format!("!{word}") } else { word })
    }
}

/// Rust's float parser rejects `1.`, `.5` and a dangling exponent.
fn normalize_real(s: &str) -> String {
    let (mantissa, exponent) = match s.find(['E', 'e']) {
        Some(i) => (&s[..i], &s[i..]),
        None => (s, ""),
    };
    let mut m = mantissa.to_string();
    if m.ends_with('.') {
        m.push('0');
    }
    if let Some(rest) = m.strip_prefix('.') {
        m = format!("0.{rest}");
    } else if let Some(rest) = m.strip_prefix("-.") {
        m = format!("-0.{rest}");
    } else if let Some(rest) = m.strip_prefix("+.") {
        m = format!("0.{rest}");
    }
    let exponent = if exponent.len() == 1 || exponent.ends_with(['+', '-']) {
        ""
    } else {
        exponent
    };
    format!("{m}{exponent}")
}

/// Decode Part 21 string control directives.
///
/// `\\` is a backslash, `\X\hh` an ISO 8859-1 character, `\X2\…\X0\` UTF-16
/// code units, `\X4\…\X0\` UCS-4 code points and `\S\c` the upper half of the
/// active code page (taken as ISO 8859-1). `\P?\` page switches are dropped.
pub fn decode_string(raw: &str) -> String {
    if !raw.contains('\\') {
        return raw.to_string();
    }

    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len());
    let mut i = 0;
    let hex_at = |start: usize, len: usize| -> Option<u32> {
        let s: String = chars.get(start..start + len)?.iter().collect();
        u32::from_str_radix(&s, 16).ok()
    };
    let starts_with = |at: usize, pat: &str| -> bool {
        pat.chars().enumerate().all(|(k, p)| chars.get(at + k) == Some(&p))
    };

    while i < chars.len() {
        if chars[i] != '\\' {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        if starts_with(i, "\\\\") {
            out.push('\\');
            i += 2;
        } else if starts_with(i, "\\X2\\") || starts_with(i, "\\X4\\") {
            let width = if chars[i + 2] == '2' { 4 } else { 8 };
            let mut j = i + 4;
            let mut units = Vec::new();
            while let Some(v) = hex_at(j, width) {
                units.push(v);
                j += width;
            }
            if width == 4 {
                let utf16: Vec<u16> = units.iter().map(|&u| u as u16).collect();
                out.extend(char::decode_utf16(utf16).map(|r| r.unwrap_or('\u{FFFD}')));
            } else {
                out.extend(units.iter().map(|&u| char::from_u32(u).unwrap_or('\u{FFFD}')));
            }
            i = if starts_with(j, "\\X0\\") { j + 4 } else { j };
        } else if starts_with(i, "\\X\\") {
            match hex_at(i + 3, 2).and_then(char::from_u32) {
                Some(c) => {
                    out.push(c);
                    i += 5;
                }
                None => {
                    out.push('\\');
                    i += 1;
                }
            }
        } else if starts_with(i, "\\S\\") && i + 3 < chars.len() {
            let c = chars[i + 3] as u32;
            out.push(char::from_u32(c + 128).unwrap_or('\u{FFFD}'));
            i += 4;
        } else if starts_with(i, "\\P") && chars.get(i + 3) == Some(&'\\') {
            i += 4;
        } else {
            out.push('\\');
            i += 1;
        }
    }
    out
}
