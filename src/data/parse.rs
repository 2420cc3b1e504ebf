use std::io::{self, IsTerminal, Read};
use std::path::Path;

use anyhow::{anyhow, Context, Result};

use super::{InputFormat, Table};

/// Read from stdin and parse into a Table.
pub fn parse_stdin(format: InputFormat, has_header: bool) -> Result<Table> {
    if io::stdin().is_terminal() {
        return Err(anyhow!("no input provided; pipe data into sheetpack or redirect from a file"));
    }
    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;
    parse_string(&input, format, has_header)
}

/// Read a whole file and parse it into a Table.
pub fn parse_file(path: &Path, format: InputFormat, has_header: bool) -> Result<Table> {
    let input = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    parse_string(&input, format, has_header)
}

/// Parse a string into a Table (testable core).
pub fn parse_string(input: &str, format: InputFormat, has_header: bool) -> Result<Table> {
    match format {
        InputFormat::Csv => parse_csv(input, has_header),
        InputFormat::Json => parse_json(input),
    }
}

fn parse_csv(input: &str, has_header: bool) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(has_header)
        .flexible(true)
        .from_reader(input.as_bytes());

    let headers = if has_header {
        let hdrs = reader.headers()?.clone();
        if hdrs.is_empty() {
            None
        } else {
            Some(hdrs.iter().map(|h| h.to_string()).collect())
        }
    } else {
        None
    };

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        rows.push(record.iter().map(|field| Some(field.to_string())).collect());
    }

    Ok(Table { headers, rows })
}

fn parse_json(input: &str) -> Result<Table> {
    let value: serde_json::Value = serde_json::from_str(input)?;

    match value {
        serde_json::Value::Array(arr) => {
            if arr.is_empty() {
                return Ok(Table {
                    headers: None,
                    rows: Vec::new(),
                });
            }

            match &arr[0] {
                serde_json::Value::Object(_) => parse_json_objects(&arr),
                serde_json::Value::Array(_) => parse_json_arrays(&arr),
                _ => Err(anyhow!(
                    "JSON input must be an array of objects or an array of arrays"
                )),
            }
        }
        _ => Err(anyhow!("JSON input must be a top-level array")),
    }
}

fn parse_json_objects(arr: &[serde_json::Value]) -> Result<Table> {
    // Collect all unique keys in order of first appearance
    let mut headers: Vec<String> = Vec::new();
    for item in arr {
        if let serde_json::Value::Object(map) = item {
            for key in map.keys() {
                if !headers.contains(key) {
                    headers.push(key.clone());
                }
            }
        } else {
            return Err(anyhow!("Expected all elements to be objects"));
        }
    }

    let mut rows = Vec::new();
    for item in arr {
        if let serde_json::Value::Object(map) = item {
            let row = headers
                .iter()
                .map(|key| map.get(key).and_then(stringify_json_value))
                .collect();
            rows.push(row);
        }
    }

    Ok(Table {
        headers: Some(headers),
        rows,
    })
}

fn parse_json_arrays(arr: &[serde_json::Value]) -> Result<Table> {
    let mut rows = Vec::new();
    for item in arr {
        if let serde_json::Value::Array(inner) = item {
            rows.push(inner.iter().map(stringify_json_value).collect());
        } else {
            return Err(anyhow!("Expected all elements to be arrays"));
        }
    }

    Ok(Table {
        headers: None,
        rows,
    })
}

/// Null is an absent field; other non-strings keep their JSON text so numbers
/// re-parse as numbers.
fn stringify_json_value(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}
