//! CSV to TSV conversion with money formatting stripped from every atom.

use anyhow::Result;
use pest::Parser;

use super::cell::{CellGrammar, Rule};
use super::parse::parse_string;
use super::{InputFormat, Table};

/// Length of the money run (`$1,234`) starting at the front of `text`, if any.
fn money_run_len(text: &str) -> Option<usize> {
    let run = CellGrammar::parse(Rule::money_run, text).ok()?.next()?;
    Some(run.as_str().len())
}

/// Trim an atom and rewrite every money run as bare digits.
///
/// `"$5,000.00"` becomes `"5000.00"`; text around the runs is kept.
pub fn clean_atom(atom: &str) -> String {
    let atom = atom.trim();
    let mut cleaned = String::with_capacity(atom.len());
    let mut rest = atom;

    while let Some(c) = rest.chars().next() {
        match money_run_len(rest) {
            Some(len) => {
                cleaned.extend(rest[..len].chars().filter(|c| *c != '$' && *c != ','));
                rest = &rest[len..];
            }
            None => {
                cleaned.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
    }

    cleaned
}

/// Write a table as tab separated values, header first, cleaning every field.
/// Absent fields are written empty.
pub fn table_to_tsv(table: &Table) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_writer(Vec::new());

    if let Some(headers) = &table.headers {
        writer.write_record(headers.iter().map(|h| clean_atom(h)))?;
    }
    for row in &table.rows {
        writer.write_record(
            row.iter()
                .map(|field| field.as_deref().map(clean_atom).unwrap_or_default()),
        )?;
    }

    let bytes = writer.into_inner().map_err(|err| err.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

/// Rewrite CSV as tab separated values, cleaning every field of every record.
pub fn csv_to_tsv(input: &str) -> Result<String> {
    table_to_tsv(&parse_string(input, InputFormat::Csv, false)?)
}
