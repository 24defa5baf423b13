//! STEP reading errors.

use thiserror::Error;

/// Errors from reading STEP text.
///
/// Only the file-level variants abort color extraction. Lexer and parser
/// errors are raised per record, and the extractor skips such records.
#[derive(Error, Debug)]
pub enum StepError {
    /// The file could not be read.
    #[error("cannot read STEP file: {0}")]
    Io(#[from] std::io::Error),

    /// Binary input.
    #[error("input is not a text file (NUL byte at offset {0})")]
    NotText(usize),

    /// The input does not start with `ISO-10303-21;`.
    #[error("missing ISO-10303-21 signature")]
    MissingSignature,

    /// No `DATA;` section.
    #[error("no DATA section found")]
    MissingDataSection,

    /// A malformed token inside a record.
    #[error("line {line}, column {col}: {message}")]
    Lexer {
        /// 1-based line in the file.
        line: usize,
        /// 1-based column.
        col: usize,
        /// What was wrong.
        message: String,
    },

    /// A record whose structure could not be parsed.
    #[error("{}{message}", entity_id.map(|id| format!("record #{id}: ")).unwrap_or_default())]
    Parser {
        /// Record id, once it has been read.
        entity_id: Option<u64>,
        /// What was wrong.
        message: String,
    },
}

impl StepError {
    /// A [`StepError::Lexer`] at `line`:`col`.
    pub fn lexer(line: usize, col: usize, message: impl Into<String>) -> Self {
        Self::Lexer {
            line,
            col,
            message: message.into(),
        }
    }

    /// A [`StepError::Parser`] for record `entity_id`.
    pub fn parser(entity_id: Option<u64>, message: impl Into<String>) -> Self {
        Self::Parser {
            entity_id,
            message: message.into(),
        }
    }

    /// True for errors that make the whole file unusable.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, StepError::Lexer { .. } | StepError::Parser { .. })
    }
}

/// Result alias for STEP reading.
pub type Result<T> = std::result::Result<T, StepError>;
