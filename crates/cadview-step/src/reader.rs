//! File-level reading: section scanning and record splitting.
//!
//! The DATA section is split into records at top-level semicolons without
//! tokenizing, so records of uninteresting types can be dropped by looking at
//! their type name only. Records that fail to parse are counted and skipped.

use std::path::Path;

use crate::error::{Result, StepError};
use crate::parser::{Parser, StepFile};

/// Cheap classification of a raw data record before parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind<'a> {
    /// `#N = TYPE(...)`, with the type name as written.
    Simple(&'a str),
    /// `#N = (...)`
    Complex,
}

/// A raw record: text between two top-level semicolons.
#[derive(Debug, Clone, Copy)]
struct RawRecord<'a> {
    text: &'a [u8],
    line: usize,
}

/// Read a STEP file from a path, keeping only the records `keep` accepts.
pub fn read_step(path: impl AsRef<Path>, keep: impl Fn(RecordKind<'_>) -> bool) -> Result<StepFile> {
    let data = std::fs::read(path)?;
    read_step_from_buffer(&data, keep)
}

/// Read STEP text from a byte buffer, keeping only the records `keep` accepts.
///
/// Fails only when the buffer is not STEP text at all: binary content, no
/// `ISO-10303-21` signature, or no DATA section.
pub fn read_step_from_buffer(data: &[u8], keep: impl Fn(RecordKind<'_>) -> bool) -> Result<StepFile> {
    if let Some(offset) = data.iter().position(|&b| b == 0) {
        return Err(StepError::NotText(offset));
    }
    let data = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);

    let mut file = StepFile::default();
    let mut section = Section::Preamble;
    let mut saw_data = false;
    let mut saw_signature = false;

    for raw in split_records(data) {
        let text = skip_blank_and_comments(raw.text);
        if text.is_empty() {
            continue;
        }
        let head = leading_keyword(text);

        if !saw_signature {
            if !head.eq_ignore_ascii_case("ISO-10303-21") {
                return Err(StepError::MissingSignature);
            }
            saw_signature = true;
            continue;
        }

        let offset = text.as_ptr() as usize - raw.text.as_ptr() as usize;
        let line = raw.line + raw.text[..offset].iter().filter(|&&b| b == b'\n').count();

        match section {
            Section::Data if text[0] == b'#' => {
                let Some(kind) = record_kind(text) else {
                    file.skipped += 1;
                    continue;
                };
                if !keep(kind) {
                    continue;
                }
                match Parser::parse_record(text, line) {
                    Ok(parsed) => {
                        file.records.insert(parsed.id(), parsed);
                    }
                    Err(err) => {
                        log::debug!("skipping record: {err}");
                        file.skipped += 1;
                    }
                }
                continue;
            }
            Section::Header if !is_section_keyword(head) => {
                match Parser::parse_header_record(text, line) {
                    Ok(entity) => file.header.push(entity),
                    Err(err) => log::debug!("skipping header record: {err}"),
                }
                continue;
            }
            _ => {}
        }

        match head.to_ascii_uppercase().as_str() {
            "HEADER" => section = Section::Header,
            "DATA" => {
                section = Section::Data;
                saw_data = true;
            }
            "ENDSEC" => section = Section::Preamble,
            "END-ISO-10303-21" => break,
            _ => {
                if section == Section::Data {
                    file.skipped += 1;
                }
            }
        }
    }

    if !saw_data {
        return Err(StepError::MissingDataSection);
    }
    Ok(file)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Header,
    Data,
}

fn is_section_keyword(head: &str) -> bool {
    ["HEADER", "DATA", "ENDSEC", "END-ISO-10303-21"]
        .iter()
        .any(|k| head.eq_ignore_ascii_case(k))
}

/// Split text into records at semicolons outside strings and comments.
fn split_records(data: &[u8]) -> impl Iterator<Item = RawRecord<'_>> {
    let mut pos = 0;
    let mut line = 1;
    std::iter::from_fn(move || {
        if pos >= data.len() {
            return None;
        }
        let start = pos;
        let start_line = line;
        let mut in_string = false;
        let mut in_comment = false;
        while pos < data.len() {
            let ch = data[pos];
            if ch == b'\n' {
                line += 1;
            }
            if in_comment {
                if ch == b'*' && data.get(pos + 1) == Some(&b'/') {
                    in_comment = false;
                    pos += 1;
                }
            } else if in_string {
                // A doubled quote closes and reopens, which nets out
                if ch == b'\'' {
                    in_string = false;
                }
            } else if ch == b'\'' {
                in_string = true;
            } else if ch == b'/' && data.get(pos + 1) == Some(&b'*') {
                in_comment = true;
                pos += 1;
            } else if ch == b';' {
                pos += 1;
                return Some(RawRecord {
                    text: &data[start..pos - 1],
                    line: start_line,
                });
            }
            pos += 1;
        }
        Some(RawRecord {
            text: &data[start..],
            line: start_line,
        })
    })
}

fn skip_blank_and_comments(mut text: &[u8]) -> &[u8] {
    loop {
        text = text.trim_ascii_start();
        if let Some(rest) = text.strip_prefix(b"/*") {
            match rest.windows(2).position(|w| w == b"*/") {
                Some(end) => text = &rest[end + 2..],
                None => return &[],
            }
        } else {
            return text.trim_ascii_end();
        }
    }
}

fn leading_keyword(text: &[u8]) -> &str {
    let end = text
        .iter()
        .position(|&b| !(b.is_ascii_alphanumeric() || b == b'_' || b == b'-'))
        .unwrap_or(text.len());
    std::str::from_utf8(&text[..end]).unwrap_or("")
}

fn record_kind(text: &[u8]) -> Option<RecordKind<'_>> {
    let rest = text.strip_prefix(b"#")?;
    let digits = rest.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let rest = rest[digits..].trim_ascii_start().strip_prefix(b"=")?;
    let rest = rest.trim_ascii_start();
    match rest.first()? {
        b'(' => Some(RecordKind::Complex),
        _ => {
            let name = leading_keyword(rest);
            (!name.is_empty()).then_some(RecordKind::Simple(name))
        }
    }
}
