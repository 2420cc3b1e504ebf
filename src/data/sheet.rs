use std::path::Path;

use tracing::{debug, error, warn};

use super::cell::CellParser;
use super::unpack::{UnpackedRow, Unpacker};
use super::Row;

#[derive(Debug, Clone)]
pub struct Column {
    pub key: String,
    pub label: Option<String>,
    pub parser: Option<CellParser>,
}

impl Column {
    pub fn new(key: impl Into<String>) -> Self {
        Column {
            key: key.into(),
            label: None,
            parser: None,
        }
    }

    pub fn with_parser(mut self, parser: CellParser) -> Self {
        self.parser = Some(parser);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// The label, or the key when no label was set.
    pub fn title(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.key)
    }
}

/// Ordered column definitions for a whole table.
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    columns: Vec<Column>,
}

#[derive(Debug, Clone)]
pub struct UnpackedSheet {
    pub columns: Vec<Column>,
    pub rows: Vec<UnpackedRow>,
}

impl Sheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load column definitions from a config file, falling back to an empty sheet.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            debug!("No column config at {path:?}");
            return Sheet::default();
        }

        let sheet = crate::config::parse_file(path);
        if let Err(err) = &sheet {
            error!("Failed to parse column config {path:?}: {err}");
            warn!("Falling back to default columns");
        };

        sheet.unwrap_or_default()
    }

    /// Add a column, or replace the definition of an existing key in place.
    pub fn column(&mut self, column: Column) -> &mut Self {
        match self.columns.iter_mut().find(|c| c.key == column.key) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
        self
    }

    pub fn get_column(&self, key: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.key == key)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn set_columns(&mut self, columns: Vec<Column>) -> &mut Self {
        self.columns.clear();
        for column in columns {
            self.column(column);
        }
        self
    }

    /// An unpacker with the parser of every column that declares one.
    pub fn unpacker(&self) -> Unpacker {
        let mut unpacker = Unpacker::new();
        unpacker.set_parsers(
            self.columns
                .iter()
                .filter_map(|c| c.parser.map(|p| (c.key.clone(), p))),
        );
        unpacker
    }

    pub fn unpack(&self, rows: &[Row]) -> UnpackedSheet {
        let unpacker = self.unpacker();
        UnpackedSheet {
            columns: self.columns.clone(),
            rows: rows.iter().map(|row| unpacker.unpack(row)).collect(),
        }
    }
}
