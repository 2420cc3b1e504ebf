use std::collections::BTreeMap;

use tracing::debug;

pub mod cell;
pub mod clean;
pub mod join;
pub mod output;
pub mod parse;
pub mod sheet;
pub mod unpack;

pub use cell::{Cell, CellParser, CellValue};

/// One input record keyed by column name. `None` marks a field the source did not provide.
pub type Row = BTreeMap<String, Option<String>>;

/// A row after repacking: every key maps to a single plain value.
pub type PlainRow = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Option<Vec<String>>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl Table {
    pub fn num_columns(&self) -> usize {
        self.headers
            .as_ref()
            .map_or_else(|| self.rows.iter().map(Vec::len).max().unwrap_or(0), Vec::len)
    }

    /// Column keys in display order. Headerless tables are keyed by 0-based index.
    pub fn keys(&self) -> Vec<String> {
        match &self.headers {
            Some(headers) => headers.clone(),
            None => (0..self.num_columns()).map(|i| i.to_string()).collect(),
        }
    }

    /// Convert every row into a keyed [`Row`].
    ///
    /// Short rows leave their trailing keys absent. Fields past the last header
    /// are dropped.
    pub fn keyed_rows(&self) -> Vec<Row> {
        let keys = self.keys();
        self.rows
            .iter()
            .enumerate()
            .map(|(idx, fields)| {
                if fields.len() > keys.len() {
                    debug!(
                        "Row {idx} has {} fields for {} columns, dropping the extras",
                        fields.len(),
                        keys.len()
                    );
                }
                keys.iter()
                    .zip(fields.iter())
                    .map(|(key, field)| (key.clone(), field.clone()))
                    .collect()
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Unpacked cells, one JSON object per row.
    Cells,
    /// Repacked plain values, one JSON object per row.
    Plain,
    /// The input cleaned of whitespace and money formatting, tab separated.
    Tsv,
}
