//! CSV adapter - reads a bank export into a raw table

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use crate::domain::result::{Error, Result};
use crate::domain::{RawRow, RawTable};

/// How to read a CSV file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvOptions {
    pub delimiter: u8,
    /// Lines before the header row to drop
    pub skip_rows: usize,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            skip_rows: 0,
        }
    }
}

/// Read a CSV file with a header row
pub fn read_table(path: &Path, options: CsvOptions) -> Result<RawTable> {
    let file = File::open(path).map_err(|e| Error::not_found(format!("{}: {}", path.display(), e)))?;
    read_table_from(file, options)
}

/// Read CSV from any source.
///
/// Records may be shorter or longer than the header: missing cells are absent
/// from the row and extra cells are dropped.
pub fn read_table_from(source: impl Read, options: CsvOptions) -> Result<RawTable> {
    let mut reader = BufReader::new(source);
    let mut skipped = String::new();
    for _ in 0..options.skip_rows {
        skipped.clear();
        if reader.read_line(&mut skipped)? == 0 {
            break;
        }
    }

    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let column_names: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
    if column_names.iter().all(String::is_empty) {
        return Err(Error::validation("CSV file has no header row"));
    }

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let row = column_names
            .iter()
            .zip(record.iter())
            .filter(|(name, _)| !name.is_empty())
            .fold(RawRow::new(), |mut row, (name, value)| {
                row.insert(name.as_str(), value);
                row
            });
        rows.push(row);
    }

    Ok(RawTable::new(column_names, rows))
}
