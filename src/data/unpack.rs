//! Per-row unpacking of raw string fields into typed [`Cell`]s, and repacking
//! back into plain values.

use std::collections::{BTreeMap, HashMap};

use serde::{Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

use super::cell::{Cell, CellParser, UnknownParser};
use super::{PlainRow, Row};

pub type UnpackedRow = BTreeMap<String, Cell>;

/// A row that may carry plain values next to its cells.
pub type MixedRow = BTreeMap<String, Field>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnpackError {
    #[error("column() expects 1 or 2 arguments; got {got}")]
    Arity { got: usize },
    #[error(transparent)]
    UnknownParser(#[from] UnknownParser),
}

/// Maps rows to unpacked rows, with a private registry of per-column parsers.
///
/// Columns without a registered parser use [`CellParser::Number`].
#[derive(Debug, Clone, Default)]
pub struct Unpacker {
    parsers: HashMap<String, CellParser>,
}

impl Unpacker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parser(mut self, key: impl Into<String>, parser: CellParser) -> Self {
        self.set_parser(key, parser);
        self
    }

    pub fn set_parser(&mut self, key: impl Into<String>, parser: CellParser) -> &mut Self {
        self.parsers.insert(key.into(), parser);
        self
    }

    pub fn set_parsers<K, I>(&mut self, parsers: I) -> &mut Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, CellParser)>,
    {
        for (key, parser) in parsers {
            self.set_parser(key, parser);
        }
        self
    }

    /// The parser registered for `key`. The implicit number default is not reported.
    pub fn get_parser(&self, key: &str) -> Option<CellParser> {
        self.parsers.get(key).copied()
    }

    /// Query or install a parser from string arguments: `[key]` returns the
    /// registered parser, `[key, name]` installs the named parser and returns it.
    pub fn column(&mut self, args: &[&str]) -> Result<Option<CellParser>, UnpackError> {
        match *args {
            [key] => Ok(self.get_parser(key)),
            [key, name] => {
                let parser = name.parse::<CellParser>()?;
                self.set_parser(key, parser);
                Ok(Some(parser))
            }
            _ => Err(UnpackError::Arity { got: args.len() }),
        }
    }

    pub fn unpack(&self, row: &Row) -> UnpackedRow {
        row.iter()
            .map(|(key, raw)| {
                let parser = self.parsers.get(key).copied().unwrap_or_default();
                (key.clone(), Cell::parse(raw.as_deref(), &parser))
            })
            .collect()
    }

    /// Unpack and repack every row, typing them the same way as [`Unpacker::unpack`].
    pub fn repack_rows(&self, rows: &[Row]) -> Vec<PlainRow> {
        rows.iter().map(|row| repack(&self.unpack(row))).collect()
    }
}

/// An entry of a mixed row: either an unpacked cell or a plain value added later.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Cell(Cell),
    Plain(Value),
}

impl From<Cell> for Field {
    fn from(cell: Cell) -> Self {
        Field::Cell(cell)
    }
}

impl From<Value> for Field {
    fn from(value: Value) -> Self {
        Field::Plain(value)
    }
}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Field::Cell(cell) => cell.serialize(serializer),
            Field::Plain(value) => value.serialize(serializer),
        }
    }
}

pub fn into_mixed(row: UnpackedRow) -> MixedRow {
    row.into_iter()
        .map(|(key, cell)| (key, Field::Cell(cell)))
        .collect()
}

/// Anything that flattens to a single plain value.
pub trait Repack {
    fn repacked(&self) -> Value;
}

impl Repack for Cell {
    fn repacked(&self) -> Value {
        self.value().to_json()
    }
}

impl Repack for Value {
    fn repacked(&self) -> Value {
        self.clone()
    }
}

impl Repack for Field {
    fn repacked(&self) -> Value {
        match self {
            Field::Cell(cell) => cell.repacked(),
            Field::Plain(value) => value.clone(),
        }
    }
}

/// Flatten a row to plain values: cells become their value, plain entries pass through.
pub fn repack<V: Repack>(row: &BTreeMap<String, V>) -> PlainRow {
    row.iter()
        .map(|(key, entry)| (key.clone(), entry.repacked()))
        .collect()
}
