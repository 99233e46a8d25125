// Flattened responses and the CSV dataset they are appended to.

use log::{debug, warn};
use std::error::Error;
use std::fmt::Display;

/// The column that identifies a submission in the dataset.
pub const RESPONSE_ID_COLUMN: &str = "response_id";

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum DatasetErrors {
    Decoding { line: Option<u64>, message: String },
    Encoding(String),
}

impl Error for DatasetErrors {}

impl Display for DatasetErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatasetErrors::Decoding {
                line: Some(line),
                message,
            } => write!(f, "cannot read dataset at line {}: {}", line, message),
            DatasetErrors::Decoding { line: None, message } => {
                write!(f, "cannot read dataset: {}", message)
            }
            DatasetErrors::Encoding(message) => write!(f, "cannot write dataset: {}", message),
        }
    }
}

fn decoding_error(e: csv::Error) -> DatasetErrors {
    DatasetErrors::Decoding {
        line: e.position().map(|p| p.line()),
        message: e.to_string(),
    }
}

/// One completed submission, as a single row: an ordered list of (column, cell).
///
/// The first column is always the response id.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ResponseRecord {
    fields: Vec<(String, String)>,
}

impl ResponseRecord {
    pub fn new(response_id: &str) -> ResponseRecord {
        ResponseRecord {
            fields: vec![(RESPONSE_ID_COLUMN.to_string(), response_id.to_string())],
        }
    }

    pub fn response_id(&self) -> &str {
        // The constructor guarantees the first field.
        self.fields[0].1.as_str()
    }

    /// Sets a cell, replacing the previous content of this column if any.
    pub fn insert(&mut self, column: &str, value: &str) {
        match self.fields.iter_mut().find(|(c, _)| c == column) {
            Some(field) => field.1 = value.to_string(),
            None => self.fields.push((column.to_string(), value.to_string())),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.as_str())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(c, _)| c.as_str())
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Number of answered questions (the response id is not counted).
    pub fn answer_count(&self) -> usize {
        self.fields.len() - 1
    }

    /// The record alone, as a CSV file with a header.
    pub fn to_csv(&self) -> Result<String, DatasetErrors> {
        Dataset::from_record(self).to_csv()
    }
}

/// A table of responses.
///
/// The columns are the union of all the keys ever recorded. Older rows have empty
/// cells for the columns added after them.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct Dataset {
    columns: Vec<String>,
    // Invariant: every row has exactly columns.len() cells.
    rows: Vec<Vec<String>>,
}

impl Dataset {
    pub fn empty() -> Dataset {
        Dataset::default()
    }

    pub fn from_record(record: &ResponseRecord) -> Dataset {
        let mut ds = Dataset::empty();
        ds.append(record);
        ds
    }

    /// Reads a CSV file with a header row.
    ///
    /// Rows shorter than the header are padded with empty cells. Cells beyond the
    /// header are dropped. A header that names the same column twice is rejected,
    /// since appending to it would be ambiguous.
    pub fn parse(content: &str) -> Result<Dataset, DatasetErrors> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(content.as_bytes());
        let columns: Vec<String> = rdr
            .headers()
            .map_err(decoding_error)?
            .iter()
            .map(|s| s.to_string())
            .collect();
        for (idx, column) in columns.iter().enumerate() {
            if columns[..idx].contains(column) {
                return Err(DatasetErrors::Decoding {
                    line: Some(1),
                    message: format!("column {:?} appears more than once", column),
                });
            }
        }
        let mut rows: Vec<Vec<String>> = Vec::new();
        for (idx, line_r) in rdr.records().enumerate() {
            let line = line_r.map_err(decoding_error)?;
            if line.len() > columns.len() {
                warn!(
                    "Dataset::parse: row {} has {} cells but the header has {} columns, dropping the extra cells",
                    idx + 1,
                    line.len(),
                    columns.len()
                );
            }
            let mut row: Vec<String> = line
                .iter()
                .take(columns.len())
                .map(|s| s.to_string())
                .collect();
            row.resize(columns.len(), String::new());
            rows.push(row);
        }
        debug!(
            "Dataset::parse: {} columns, {} rows",
            columns.len(),
            rows.len()
        );
        Ok(Dataset { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let col_idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row).map(|r| r[col_idx].as_str())
    }

    pub fn contains_response(&self, response_id: &str) -> bool {
        match self.columns.iter().position(|c| c == RESPONSE_ID_COLUMN) {
            Some(col_idx) => self.rows.iter().any(|r| r[col_idx] == response_id),
            None => false,
        }
    }

    /// Adds the record as the last row, extending the header with any new column.
    pub fn append(&mut self, record: &ResponseRecord) {
        for column in record.columns() {
            if !self.columns.iter().any(|c| c == column) {
                debug!("Dataset::append: new column {:?}", column);
                self.columns.push(column.to_string());
            }
        }
        let width = self.columns.len();
        for row in self.rows.iter_mut() {
            row.resize(width, String::new());
        }
        let row: Vec<String> = self
            .columns
            .iter()
            .map(|c| record.get(c).unwrap_or("").to_string())
            .collect();
        self.rows.push(row);
    }

    /// Writes the dataset as CSV. A dataset without columns is the empty string.
    pub fn to_csv(&self) -> Result<String, DatasetErrors> {
        if self.columns.is_empty() {
            return Ok(String::new());
        }
        let mut wtr = csv::Writer::from_writer(vec![]);
        wtr.write_record(&self.columns)
            .map_err(|e| DatasetErrors::Encoding(e.to_string()))?;
        for row in self.rows.iter() {
            wtr.write_record(row)
                .map_err(|e| DatasetErrors::Encoding(e.to_string()))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| DatasetErrors::Encoding(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| DatasetErrors::Encoding(e.to_string()))
    }
}
