//! Part 21 parser: builds raw entity records from tokens.
//!
//! The parser works on one record at a time and does not interpret entity
//! semantics. Each record has an ID and one or more typed parts: a simple
//! instance `#1 = TYPE(args);` has one part, a complex instance
//! `#1 = (TYPE_A(args) TYPE_B(args));` has several. Arguments can be nested.

use indexmap::IndexMap;

use crate::error::{Result, StepError};
use crate::lexer::{Lexer, Position, SpannedToken, Token};

/// Deepest aggregate / typed-value nesting accepted in one record.
const MAX_NESTING: usize = 64;

/// An attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum StepValue {
    /// `#123`.
    EntityRef(u64),
    /// Decoded string.
    String(String),
    /// Real number.
    Real(f64),
    /// Integer.
    Integer(i64),
    /// `.BOTH.` without the dots.
    Enum(String),
    /// Parenthesized aggregate.
    List(Vec<StepValue>),
    /// `*`
    Derived,
    /// `$`
    Null,
    /// Inline select value such as `LENGTH_MEASURE(2.5)`.
    Typed {
        /// Type keyword.
        type_name: String,
        /// Wrapped arguments.
        args: Vec<StepValue>,
    },
}

impl StepValue {
    /// The id of an `EntityRef`.
    pub fn as_entity_ref(&self) -> Option<u64> {
        if let StepValue::EntityRef(id) = self {
            Some(*id)
        } else {
            None
        }
    }

    /// A numeric value; integers are widened.
    pub fn as_real(&self) -> Option<f64> {
        match *self {
            StepValue::Real(v) => Some(v),
            StepValue::Integer(v) => Some(v as f64),
            _ => None,
        }
    }

    /// The contents of a `String`.
    pub fn as_string(&self) -> Option<&str> {
        if let StepValue::String(s) = self {
            Some(s)
        } else {
            None
        }
    }

    /// Every entity reference in this value, depth-first, in textual order.
    pub fn collect_refs(&self, out: &mut Vec<u64>) {
        match self {
            StepValue::EntityRef(id) => out.push(*id),
            StepValue::List(items) => items.iter().for_each(|v| v.collect_refs(out)),
            StepValue::Typed { args, .. } => args.iter().for_each(|v| v.collect_refs(out)),
            _ => {}
        }
    }
}

/// A parsed STEP entity (or one part of a complex instance).
#[derive(Debug, Clone, PartialEq)]
pub struct StepEntity {
    /// Entity ID (from `#123`; 0 for header entities).
    pub id: u64,
    /// Entity type name (e.g., `COLOUR_RGB`).
    pub type_name: String,
    /// Arguments to the entity constructor.
    pub args: Vec<StepValue>,
}

impl StepEntity {
    /// Argument at `index`.
    pub fn arg(&self, index: usize) -> Option<&StepValue> {
        self.args.get(index)
    }

    /// Every entity reference in the arguments, in textual order.
    pub fn refs(&self) -> Vec<u64> {
        let mut out = Vec::new();
        self.args.iter().for_each(|v| v.collect_refs(&mut out));
        out
    }
}

/// One record of the DATA section.
#[derive(Debug, Clone, PartialEq)]
pub enum StepRecord {
    /// `#N = TYPE(args);`
    Simple(StepEntity),
    /// `#N = (TYPE_A(args) TYPE_B(args) ...);`
    Complex {
        /// Entity ID.
        id: u64,
        /// Component parts, in textual order.
        parts: Vec<StepEntity>,
    },
}

impl StepRecord {
    /// Entity ID.
    pub fn id(&self) -> u64 {
        match self {
            StepRecord::Simple(e) => e.id,
            StepRecord::Complex { id, .. } => *id,
        }
    }

    /// Typed parts: one for simple records.
    pub fn parts(&self) -> &[StepEntity] {
        match self {
            StepRecord::Simple(e) => std::slice::from_ref(e),
            StepRecord::Complex { parts, .. } => parts,
        }
    }
}

/// The parsed content of a STEP file.
#[derive(Debug, Clone, Default)]
pub struct StepFile {
    /// Header section entities (`FILE_DESCRIPTION`, `FILE_NAME`, ...).
    pub header: Vec<StepEntity>,
    /// Data section records, in file order, indexed by ID.
    pub records: IndexMap<u64, StepRecord>,
    /// Number of data records that could not be parsed.
    pub skipped: usize,
}

impl StepFile {
    /// Get a record by ID.
    pub fn get(&self, id: u64) -> Option<&StepRecord> {
        self.records.get(&id)
    }

    /// Originating system from the `FILE_NAME` header, if recorded.
    pub fn originating_system(&self) -> Option<&str> {
        self.header
            .iter()
            .find(|e| e.type_name == "FILE_NAME")?
            .arg(5)?
            .as_string()
            .filter(|s| !s.trim().is_empty())
    }
}

/// Parser for Part 21 records.
pub struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
    origin: Position,
    depth: usize,
}

impl Parser {
    fn new(text: &[u8], line: usize) -> Result<Self> {
        let tokens = Lexer::starting_at(text, line).tokenize()?;
        Ok(Parser {
            tokens,
            pos: 0,
            origin: Position { line, col: 1 },
            depth: 0,
        })
    }

    /// Parse one data record (`#N = ...`), with or without its `;`.
    pub fn parse_record(text: &[u8], line: usize) -> Result<StepRecord> {
        let mut parser = Parser::new(text, line)?;
        let record = parser.record()?;
        parser.finish(Some(record.id()))?;
        Ok(record)
    }

    /// Parse one header record (`TYPE(args)`), with or without its `;`.
    pub fn parse_header_record(text: &[u8], line: usize) -> Result<StepEntity> {
        let mut parser = Parser::new(text, line)?;
        let type_name = parser.keyword(None)?;
        let args = parser.parse_args(None)?;
        parser.finish(None)?;
        Ok(StepEntity {
            id: 0,
            type_name,
            args,
        })
    }

    fn record(&mut self) -> Result<StepRecord> {
        let id = match self.peek().map(|t| t.token.clone()) {
            Some(Token::EntityRef(id)) => {
                self.advance();
                id
            }
            other => {
                return Err(self.error(None, format!("expected entity id, got {other:?}")));
            }
        };
        self.expect_token(&Token::Equals, Some(id))?;

        if self.check_token(&Token::LParen) {
            // Complex instance: a parenthesized list of TYPE(args) parts
            self.advance();
            let mut parts = Vec::new();
            while !self.check_token(&Token::RParen) {
                let type_name = self.keyword(Some(id))?;
                let args = self.parse_args(Some(id))?;
                parts.push(StepEntity {
                    id,
                    type_name,
                    args,
                });
            }
            self.expect_token(&Token::RParen, Some(id))?;
            if parts.is_empty() {
                return Err(self.error(Some(id), "empty complex instance"));
            }
            Ok(StepRecord::Complex { id, parts })
        } else {
            let type_name = self.keyword(Some(id))?;
            let args = self.parse_args(Some(id))?;
            Ok(StepRecord::Simple(StepEntity {
                id,
                type_name,
                args,
            }))
        }
    }

    fn finish(&mut self, id: Option<u64>) -> Result<()> {
        if self.check_token(&Token::Semicolon) {
            self.advance();
        }
        match self.peek() {
            None => Ok(()),
            Some(tok) => {
                let tok = tok.token.clone();
                Err(self.error(id, format!("trailing token {tok:?}")))
            }
        }
    }

    fn keyword(&mut self, id: Option<u64>) -> Result<String> {
        match self.peek().map(|t| t.token.clone()) {
            Some(Token::Keyword(name)) => {
                self.advance();
                Ok(name)
            }
            other => Err(self.error(id, format!("expected type name, got {other:?}"))),
        }
    }

    fn parse_args(&mut self, id: Option<u64>) -> Result<Vec<StepValue>> {
        self.expect_token(&Token::LParen, id)?;
        let args = self.parse_list_body(id)?;
        self.expect_token(&Token::RParen, id)?;
        Ok(args)
    }

    fn parse_list_body(&mut self, id: Option<u64>) -> Result<Vec<StepValue>> {
        let mut list = Vec::new();
        if !self.check_token(&Token::RParen) {
            list.push(self.parse_value(id)?);
            while self.check_token(&Token::Comma) {
                self.advance();
                list.push(self.parse_value(id)?);
            }
        }
        Ok(list)
    }

    fn parse_value(&mut self, id: Option<u64>) -> Result<StepValue> {
        let tok = self.peek().map(|t| t.token.clone());
        match tok {
            Some(Token::EntityRef(r)) => {
                self.advance();
                Ok(StepValue::EntityRef(r))
            }
            Some(Token::String(s)) => {
                self.advance();
                Ok(StepValue::String(s))
            }
            Some(Token::Real(v)) => {
                self.advance();
                Ok(StepValue::Real(v))
            }
            Some(Token::Integer(v)) => {
                self.advance();
                Ok(StepValue::Integer(v))
            }
            Some(Token::Enum(s)) => {
                self.advance();
                Ok(StepValue::Enum(s))
            }
            Some(Token::Asterisk) => {
                self.advance();
                Ok(StepValue::Derived)
            }
            Some(Token::Dollar) => {
                self.advance();
                Ok(StepValue::Null)
            }
            Some(Token::LParen) => {
                self.advance();
                self.enter(id)?;
                let list = self.parse_list_body(id)?;
                self.depth -= 1;
                self.expect_token(&Token::RParen, id)?;
                Ok(StepValue::List(list))
            }
            Some(Token::Keyword(type_name)) => {
                // Typed select value: TYPE_NAME(args)
                self.advance();
                self.enter(id)?;
                let args = self.parse_args(id)?;
                self.depth -= 1;
                Ok(StepValue::Typed { type_name, args })
            }
            other => Err(self.error(id, format!("unexpected value: {other:?}"))),
        }
    }

    fn enter(&mut self, id: Option<u64>) -> Result<()> {
        if self.depth >= MAX_NESTING {
            return Err(self.error(id, "nesting too deep"));
        }
        self.depth += 1;
        Ok(())
    }

    fn error(&self, id: Option<u64>, message: impl Into<String>) -> StepError {
        let pos = self.peek().map(|t| t.pos).unwrap_or(self.origin);
        StepError::parser(id, format!("line {}: {}", pos.line, message.into()))
    }

    fn peek(&self) -> Option<&SpannedToken> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn check_token(&self, expected: &Token) -> bool {
        self.peek().is_some_and(|t| &t.token == expected)
    }

    fn expect_token(&mut self, expected: &Token, id: Option<u64>) -> Result<()> {
        if self.check_token(expected) {
            self.advance();
            Ok(())
        } else {
            let actual = self.peek().map(|t| t.token.clone());
            Err(self.error(id, format!("expected {expected:?}, got {actual:?}")))
        }
    }
}
