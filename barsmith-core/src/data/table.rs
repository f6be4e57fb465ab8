//! RawTable: provider rows before any coercion.

use serde::{Deserialize, Serialize};
use std::io::Read;
use thiserror::Error;

/// A single untyped cell as a provider delivered it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    /// Missing-value markers: null, NaN, and the usual textual spellings.
    pub fn is_missing(&self) -> bool {
        match self {
            Cell::Null => true,
            Cell::Int(_) => false,
            Cell::Float(v) => v.is_nan(),
            Cell::Text(s) => is_missing_text(s),
        }
    }
}

pub(crate) fn is_missing_text(s: &str) -> bool {
    let s = s.trim();
    s.is_empty()
        || ["nan", "null", "none", "na"]
            .iter()
            .any(|marker| s.eq_ignore_ascii_case(marker))
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Cell::Int(v)
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Float(v)
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Cell::Text(v.to_string())
    }
}

impl From<String> for Cell {
    fn from(v: String) -> Self {
        Cell::Text(v)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(v: Option<T>) -> Self {
        v.map_or(Cell::Null, Into::into)
    }
}

/// Heterogeneous provider output: a header row and untyped cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl RawTable {
    pub fn new<S: Into<String>>(headers: impl IntoIterator<Item = S>) -> Self {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn with_rows(mut self, rows: Vec<Vec<Cell>>) -> Self {
        self.rows = rows;
        self
    }

    pub fn push_row(&mut self, row: Vec<Cell>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Read a headered CSV. Every non-empty cell stays text; coercion happens
    /// in `validate`.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, TableError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = rdr.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            rows.push(
                record
                    .iter()
                    .map(|field| {
                        if field.is_empty() {
                            Cell::Null
                        } else {
                            Cell::Text(field.to_string())
                        }
                    })
                    .collect(),
            );
        }

        Ok(Self { headers, rows })
    }

    /// Parse a JSON array of flat objects. Headers follow first appearance;
    /// a key absent from a record reads as null.
    pub fn from_json_records(json: &str) -> Result<Self, TableError> {
        let records: Vec<serde_json::Value> = serde_json::from_str(json)?;

        let mut headers: Vec<String> = Vec::new();
        let mut objects = Vec::with_capacity(records.len());
        for (idx, record) in records.into_iter().enumerate() {
            let serde_json::Value::Object(map) = record else {
                return Err(TableError::NotAnObject(idx));
            };
            for key in map.keys() {
                if !headers.contains(key) {
                    headers.push(key.clone());
                }
            }
            objects.push(map);
        }

        let rows = objects
            .iter()
            .map(|map| {
                headers
                    .iter()
                    .map(|h| map.get(h).map_or(Cell::Null, json_cell))
                    .collect()
            })
            .collect();

        Ok(Self { headers, rows })
    }
}

fn json_cell(value: &serde_json::Value) -> Cell {
    use serde_json::Value;
    match value {
        Value::Null => Cell::Null,
        Value::Number(n) => match n.as_i64() {
            Some(i) => Cell::Int(i),
            None => n.as_f64().map_or(Cell::Null, Cell::Float),
        },
        Value::String(s) => Cell::Text(s.clone()),
        other => Cell::Text(other.to_string()),
    }
}

#[derive(Debug, Error)]
pub enum TableError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("record {0} is not a JSON object")]
    NotAnObject(usize),
}
