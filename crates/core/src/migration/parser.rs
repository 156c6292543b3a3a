//! Source file parsing: CSV and JSON into rows of JSON values.

use serde_json::Value;

use crate::types::Row;

use super::job::SourceType;

/// Errors raised while reading an uploaded file. The upload does not take
/// effect when any of these occur.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Unsupported file type: '{0}' (expected .csv or .json)")]
    UnsupportedExtension(String),

    #[error("{0} files are not supported; export the sheet as CSV")]
    UnsupportedFormat(SourceType),

    #[error("Invalid CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected JSON shape: {0}")]
    JsonShape(String),

    #[error("File contains no header row")]
    MissingHeader,
}

/// A fully parsed source file.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFile {
    pub source_type: SourceType,
    /// Column names in file order (CSV) or first-seen order (JSON).
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl ParsedFile {
    pub fn total_rows(&self) -> usize {
        self.rows.len()
    }

    /// The first `n` rows.
    pub fn sample(&self, n: usize) -> Vec<Row> {
        self.rows.iter().take(n).cloned().collect()
    }
}

/// Parse `bytes` according to the extension of `filename`.
pub fn parse_file(bytes: &[u8], filename: &str) -> Result<ParsedFile, ParseError> {
    let source_type = SourceType::from_filename(filename)
        .ok_or_else(|| ParseError::UnsupportedExtension(filename.to_string()))?;
    parse_bytes(bytes, source_type)
}

/// Parse `bytes` as the given source type.
pub fn parse_bytes(bytes: &[u8], source_type: SourceType) -> Result<ParsedFile, ParseError> {
    match source_type {
        SourceType::Csv => parse_csv(bytes),
        SourceType::Json => parse_json(bytes),
        SourceType::Excel => Err(ParseError::UnsupportedFormat(SourceType::Excel)),
    }
}

/// Decode text as UTF-8 (with or without BOM), falling back to Latin-1.
///
/// Latin-1 maps every byte to a code point, so decoding never fails.
pub fn decode_text(bytes: &[u8]) -> String {
    let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(body) {
        Ok(s) => s.to_string(),
        Err(_) => body.iter().map(|&b| char::from(b)).collect(),
    }
}

pub fn parse_csv(bytes: &[u8]) -> Result<ParsedFile, ParseError> {
    let text = decode_text(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(text.as_bytes());

    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            if h.is_empty() {
                format!("column_{}", i + 1)
            } else {
                h.to_string()
            }
        })
        .collect();
    if columns.is_empty() {
        return Err(ParseError::MissingHeader);
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        let row: Row = columns
            .iter()
            .enumerate()
            .map(|(i, col)| {
                let value = record
                    .get(i)
                    .map_or(Value::Null, |f| Value::String(f.to_string()));
                (col.clone(), value)
            })
            .collect();
        rows.push(row);
    }

    Ok(ParsedFile {
        source_type: SourceType::Csv,
        columns,
        rows,
    })
}

pub fn parse_json(bytes: &[u8]) -> Result<ParsedFile, ParseError> {
    let text = decode_text(bytes);
    let root: Value = serde_json::from_str(&text)?;

    let items = match root {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("data") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(ParseError::JsonShape(
                    "object must contain a 'data' array".into(),
                ))
            }
        },
        _ => {
            return Err(ParseError::JsonShape(
                "expected an array of objects or {\"data\": [...]}".into(),
            ))
        }
    };

    let mut columns: Vec<String> = Vec::new();
    let mut rows = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        let Value::Object(row) = item else {
            return Err(ParseError::JsonShape(format!(
                "item {} is not an object",
                i + 1
            )));
        };
        for key in row.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
        rows.push(row);
    }

    Ok(ParsedFile {
        source_type: SourceType::Json,
        columns,
        rows,
    })
}
