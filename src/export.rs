//! Delimited-text export of report rows.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during export
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Delimiter must be a single ASCII character: {0:?}")]
    InvalidDelimiter(char),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Output options for delimited text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvOptions {
    /// Field delimiter
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// Emit a header row of field names
    #[serde(default = "default_has_header")]
    pub has_header: bool,
}

const fn default_delimiter() -> char {
    ','
}

const fn default_has_header() -> bool {
    true
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            has_header: default_has_header(),
        }
    }
}

impl CsvOptions {
    /// Tab-separated with a header row
    #[must_use]
    pub const fn tsv() -> Self {
        Self {
            delimiter: '\t',
            has_header: true,
        }
    }

    fn builder(&self) -> Result<csv::WriterBuilder, ExportError> {
        let delimiter =
            u8::try_from(self.delimiter).map_err(|_| ExportError::InvalidDelimiter(self.delimiter))?;
        if !delimiter.is_ascii() {
            return Err(ExportError::InvalidDelimiter(self.delimiter));
        }

        let mut builder = csv::WriterBuilder::new();
        builder.delimiter(delimiter).has_headers(self.has_header);
        Ok(builder)
    }
}

/// Row types with a fixed column list.
///
/// The csv writer derives its header from the first serialized row, so an
/// empty view would otherwise come out without one.
pub trait Columns: Serialize {
    /// Header names, in serialization order
    const COLUMNS: &'static [&'static str];
}

fn write_rows<W: std::io::Write, T: Columns>(
    writer: &mut csv::Writer<W>,
    rows: &[T],
    options: &CsvOptions,
) -> Result<(), ExportError> {
    if rows.is_empty() && options.has_header {
        writer.write_record(T::COLUMNS)?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    Ok(())
}

/// Serialize `rows` as delimited text
///
/// # Errors
///
/// Returns an error if the delimiter is not ASCII or a row cannot be serialized.
pub fn to_delimited_string<T: Columns>(rows: &[T], options: &CsvOptions) -> Result<String, ExportError> {
    let mut writer = options.builder()?.from_writer(Vec::new());
    write_rows(&mut writer, rows, options)?;
    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::IoError(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Write `rows` as delimited text to `path`, replacing any existing file
///
/// # Errors
///
/// Returns an error if the file cannot be written or a row cannot be serialized.
pub fn write_delimited<T: Columns>(
    path: impl AsRef<Path>,
    rows: &[T],
    options: &CsvOptions,
) -> Result<(), ExportError> {
    let path = path.as_ref();
    let mut writer = options.builder()?.from_path(path)?;
    write_rows(&mut writer, rows, options)?;
    writer.flush()?;
    tracing::debug!(path = %path.display(), rows = rows.len(), "Wrote report view");
    Ok(())
}
