//! Column config files.
//!
//! ```text
//! // one block per column; quote keys that contain spaces
//! amount { parser: money; label: "Amount"; }
//! "Stand Your Ground" { parser: number; }
//! price { symbol: "€"; }
//! zip { parser: text; }
//! ```

use std::path::Path;

use pest::iterators::Pair;
use pest::Parser;
use thiserror::Error;
use tracing::debug;

use crate::data::cell::{single_char, CellParser, UnknownParser};
use crate::data::sheet::{Column, Sheet};

#[derive(pest_derive::Parser)]
#[grammar = "config/columns.pest"]
struct ColumnConfigParser;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read column config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid column config:\n{0}")]
    Syntax(#[from] Box<pest::error::Error<Rule>>),
    #[error("column `{column}`: unknown property `{property}`")]
    UnknownProperty { column: String, property: String },
    #[error("column `{column}`: {source}")]
    UnknownParser {
        column: String,
        #[source]
        source: UnknownParser,
    },
    #[error("column `{column}`: currency symbol must be a single character, got {symbol:?}")]
    BadSymbol { column: String, symbol: String },
    #[error("column `{column}`: a currency symbol needs the money parser, not {parser}")]
    SymbolWithoutMoney { column: String, parser: CellParser },
}

pub fn parse_file(path: &Path) -> Result<Sheet, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_str(&content)
}

pub fn parse_str(input: &str) -> Result<Sheet, ConfigError> {
    let stylesheet = ColumnConfigParser::parse(Rule::stylesheet, input)
        .map_err(Box::new)?
        .next()
        .into_iter()
        .flat_map(Pair::into_inner);

    let mut sheet = Sheet::new();
    for pair in stylesheet {
        if pair.as_rule() == Rule::column {
            sheet.column(parse_column(pair)?);
        }
    }

    debug!("Parsed {} column definitions", sheet.columns().len());
    Ok(sheet)
}

fn parse_column(pair: Pair<'_, Rule>) -> Result<Column, ConfigError> {
    let mut inner = pair.into_inner();
    let key = inner.next().map(text_of).unwrap_or_default();

    let mut column = Column::new(key.clone());
    let mut symbol = None;

    for declaration in inner {
        let mut parts = declaration.into_inner();
        let property = parts.next().map(|p| p.as_str()).unwrap_or_default();
        let value = parts.next().map(text_of).unwrap_or_default();

        match property {
            "parser" => {
                let parser = value.parse::<CellParser>().map_err(|source| {
                    ConfigError::UnknownParser {
                        column: key.clone(),
                        source,
                    }
                })?;
                column.parser = Some(parser);
            }
            "symbol" => {
                symbol = Some(single_char(&value).ok_or_else(|| ConfigError::BadSymbol {
                    column: key.clone(),
                    symbol: value.clone(),
                })?);
            }
            "label" => column.label = Some(value),
            other => {
                return Err(ConfigError::UnknownProperty {
                    column: key,
                    property: other.to_string(),
                })
            }
        }
    }

    if let Some(symbol) = symbol {
        match column.parser {
            None | Some(CellParser::Money { .. }) => {
                column.parser = Some(CellParser::Money { symbol });
            }
            Some(parser) => return Err(ConfigError::SymbolWithoutMoney { column: key, parser }),
        }
    }

    Ok(column)
}

/// The text of a `key` or `value` pair, without quotes.
fn text_of(pair: Pair<'_, Rule>) -> String {
    let inner = match pair.into_inner().next() {
        Some(inner) => inner,
        None => return String::new(),
    };

    match inner.as_rule() {
        Rule::quoted => inner
            .into_inner()
            .next()
            .map(|text| text.as_str().to_string())
            .unwrap_or_default(),
        _ => inner.as_str().to_string(),
    }
}
