use anyhow::{anyhow, Result};
use serde_json::{Map, Value};

use super::unpack::{repack, MixedRow};
use super::{OutputFormat, PlainRow};

/// Order `entries` by `order` first, then whatever keys remain (e.g. joined fields).
fn ordered(mut entries: PlainRow, order: &[String]) -> Map<String, Value> {
    let mut out = Map::new();
    for key in order {
        if let Some(value) = entries.remove(key) {
            out.insert(key.clone(), value);
        }
    }
    out.extend(entries);
    out
}

/// Render one row as a single line of JSON. TSV is written per table, not per row.
pub fn format_row(row: &MixedRow, order: &[String], format: OutputFormat) -> Result<String> {
    let object = match format {
        OutputFormat::Cells => {
            let mut entries = PlainRow::new();
            for (key, field) in row {
                entries.insert(key.clone(), serde_json::to_value(field)?);
            }
            ordered(entries, order)
        }
        OutputFormat::Plain => ordered(repack(row), order),
        OutputFormat::Tsv => return Err(anyhow!("tsv output is written per table, not per row")),
    };

    Ok(serde_json::to_string(&Value::Object(object))?)
}
