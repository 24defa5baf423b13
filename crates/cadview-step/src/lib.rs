#![warn(missing_docs)]

//! STEP color extraction for the cadview pipeline.
//!
//! Reads ISO 10303-21 text just far enough to recover which color each part
//! carries. Only records that take part in presentation styles or product
//! structure are parsed; malformed records are skipped.
//!
//! # Example
//!
//! ```no_run
//! use cadview_step::extract_colors_from_file;
//!
//! let extraction = extract_colors_from_file("assembly.step").unwrap();
//! extraction.colors.write("assembly.part-colors.json").unwrap();
//! ```

mod colors;
pub mod entities;
mod error;
mod lexer;
mod parser;
mod reader;

pub use colors::{
    extract_colors, extract_colors_from_file, predefined_colour, ColorExtraction, ExtractionStats,
};
pub use entities::{Entity, EntityIndex};
pub use error::{Result, StepError};
pub use lexer::decode_string;
pub use parser::{StepEntity, StepFile, StepRecord, StepValue};
pub use reader::{read_step, read_step_from_buffer, RecordKind};
