//! Typed spreadsheet cells and the parsers that produce them.
//!
//! A parser turns the raw text of a field into a number, or `None` when the text
//! is not numeric. Text that fails to parse is never an error: the cell keeps the
//! raw string as its value instead.

use std::fmt;
use std::str::FromStr;

use pest::iterators::Pairs;
use pest::Parser;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde_json::Value;
use thiserror::Error;

#[derive(pest_derive::Parser)]
#[grammar = "data/cell.pest"]
pub(crate) struct CellGrammar;

/// Signature of a user supplied cell parser.
pub type ParseFn = fn(Option<&str>) -> Option<f64>;

/// Largest integer a double holds exactly; integral values up to this bound
/// serialize as JSON integers.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

#[derive(Clone, Copy, Default)]
pub enum CellParser {
    /// Digits with thousands separators, falling back to loose numeric coercion.
    #[default]
    Number,
    /// Like `Number`, but the digits must follow a single currency symbol.
    Money { symbol: char },
    /// Never numeric. Keeps columns such as zip codes as text.
    Text,
    Custom(ParseFn),
}

impl CellParser {
    pub const MONEY: CellParser = CellParser::Money { symbol: '$' };

    pub fn parse(&self, raw: Option<&str>) -> Option<f64> {
        match self {
            CellParser::Number => number(raw),
            CellParser::Money { symbol } => money_with(raw, *symbol),
            CellParser::Text => None,
            CellParser::Custom(parse) => parse(raw),
        }
    }
}

impl fmt::Debug for CellParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CellParser({self})")
    }
}

impl fmt::Display for CellParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellParser::Number => f.write_str("number"),
            CellParser::Money { symbol: '$' } => f.write_str("money"),
            CellParser::Money { symbol } => write!(f, "money({symbol})"),
            CellParser::Text => f.write_str("text"),
            CellParser::Custom(_) => f.write_str("custom"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown parser `{0}`; expected number, money, money(<symbol>) or text")]
pub struct UnknownParser(pub String);

impl FromStr for CellParser {
    type Err = UnknownParser;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim() {
            "number" => Ok(CellParser::Number),
            "money" => Ok(CellParser::MONEY),
            "text" => Ok(CellParser::Text),
            other => other
                .strip_prefix("money(")
                .and_then(|rest| rest.strip_suffix(')'))
                .and_then(single_char)
                .map(|symbol| CellParser::Money { symbol })
                .ok_or_else(|| UnknownParser(name.to_string())),
        }
    }
}

pub(crate) fn single_char(text: &str) -> Option<char> {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

/// Parse a plain numeric field, e.g. `"1,234.5"` or `" 42 "`.
///
/// Absent and empty input is not numeric. A string made only of digits, periods
/// and commas (with optional surrounding whitespace) has its commas removed before
/// conversion; anything else is coerced as-is, which rejects prose.
pub fn number(raw: Option<&str>) -> Option<f64> {
    let raw = raw.filter(|s| !s.is_empty())?;
    match inner_pairs(Rule::number_cell, raw).and_then(|pairs| find(pairs, Rule::digit_run)) {
        Some(digits) => coerce(&digits.replace(',', "")),
        None => coerce(raw),
    }
}

/// Parse a dollar amount, e.g. `"$5,000.00"`.
pub fn money(raw: Option<&str>) -> Option<f64> {
    money_with(raw, '$')
}

/// Parse an amount prefixed by `symbol`. The symbol is consumed before the digits.
pub fn money_with(raw: Option<&str>, symbol: char) -> Option<f64> {
    let raw = raw.filter(|s| !s.is_empty())?;
    let digits = inner_pairs(Rule::money_cell, raw).and_then(|pairs| {
        let found = find(pairs.clone(), Rule::symbol)?;
        if single_char(found) == Some(symbol) {
            find(pairs, Rule::digit_run)
        } else {
            None
        }
    });
    match digits {
        Some(digits) => coerce(&digits.replace(',', "")),
        None => coerce(raw),
    }
}

/// Loose numeric coercion of a whole string.
///
/// Surrounding whitespace is ignored and a blank string is zero. Accepts signed
/// decimals with optional fraction and exponent, `Infinity`, and unsigned
/// `0x`/`0o`/`0b` integers. Everything else is `None`.
pub fn coerce(text: &str) -> Option<f64> {
    let numeric = CellGrammar::parse(Rule::numeric, text).ok()?.next()?;
    let literal = match numeric.into_inner().find(|pair| pair.as_rule() != Rule::EOI) {
        Some(literal) => literal,
        None => return Some(0.0),
    };

    let text = literal.as_str();
    match literal.as_rule() {
        Rule::hex_literal => Some(radix(&text[2..], 16)),
        Rule::oct_literal => Some(radix(&text[2..], 8)),
        Rule::bin_literal => Some(radix(&text[2..], 2)),
        Rule::dec_literal => decimal(text),
        _ => None,
    }
}

fn radix(digits: &str, base: u32) -> f64 {
    digits
        .chars()
        .filter_map(|c| c.to_digit(base))
        .fold(0.0, |acc, digit| acc * f64::from(base) + f64::from(digit))
}

fn decimal(text: &str) -> Option<f64> {
    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };

    if unsigned == "Infinity" {
        return Some(if negative {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        });
    }

    text.parse::<f64>().ok()
}

fn inner_pairs(rule: Rule, raw: &str) -> Option<Pairs<'_, Rule>> {
    let matched = CellGrammar::parse(rule, raw).ok()?.next()?;
    Some(matched.into_inner())
}

fn find<'i>(mut pairs: Pairs<'i, Rule>, rule: Rule) -> Option<&'i str> {
    pairs.find(|pair| pair.as_rule() == rule).map(|pair| pair.as_str())
}

/// The resolved value of a cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Number(f64),
    Text(String),
    /// The source row had no value for this key.
    Missing,
}

impl CellValue {
    /// Integral numbers become JSON integers, non-finite numbers become null.
    pub fn to_json(&self) -> Value {
        match self {
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER => {
                Value::from(*n as i64)
            }
            CellValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            CellValue::Text(text) => Value::String(text.clone()),
            CellValue::Missing => Value::Null,
        }
    }
}

/// One unpacked field: the raw text alongside its typed value.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    raw: Option<String>,
    value: CellValue,
}

impl Cell {
    pub fn parse(raw: Option<&str>, parser: &CellParser) -> Self {
        let value = match raw {
            None => CellValue::Missing,
            Some(text) => match parser.parse(Some(text)) {
                Some(n) => CellValue::Number(n),
                None => CellValue::Text(text.to_string()),
            },
        };

        Cell {
            raw: raw.map(str::to_string),
            value,
        }
    }

    pub fn raw_string(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.value, CellValue::Number(_))
    }

    pub fn value(&self) -> &CellValue {
        &self.value
    }

}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Cell", 3)?;
        state.serialize_field("raw_string", &self.raw)?;
        state.serialize_field("is_numeric", &self.is_numeric())?;
        state.serialize_field("value", &self.value.to_json())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use speculoos::prelude::*;

    #[test]
    fn number_strips_thousands_separators() {
        assert_eq!(number(Some("1,234.5")), Some(1234.5));
        assert_eq!(number(Some("  12,000  ")), Some(12000.0));
        assert_eq!(number(Some("2000")), Some(2000.0));
    }

    #[test]
    fn number_rejects_prose() {
        assert_that!(number(Some("Texas"))).is_none();
        assert_that!(number(Some("New Hampshire"))).is_none();
        assert_that!(number(Some("12 apples"))).is_none();
    }

    #[test]
    fn number_absent_or_empty_is_not_numeric() {
        assert_that!(number(None)).is_none();
        assert_that!(number(Some(""))).is_none();
    }

    #[test]
    fn number_with_malformed_digit_run() {
        assert_that!(number(Some("1.2.3"))).is_none();
        assert_that!(number(Some("."))).is_none();
    }

    #[test]
    fn number_blank_or_bare_separators_coerce_to_zero() {
        assert_eq!(number(Some("  ")), Some(0.0));
        assert_eq!(number(Some(",")), Some(0.0));
    }

    #[test]
    fn number_falls_back_to_coercion() {
        assert_eq!(number(Some("-5")), Some(-5.0));
        assert_eq!(number(Some("1e3")), Some(1000.0));
        assert_eq!(number(Some("0x10")), Some(16.0));
    }

    #[test]
    fn money_strips_symbol_and_separators() {
        assert_eq!(money(Some("$5,000.00")), Some(5000.0));
        assert_eq!(money(Some(" $12 ")), Some(12.0));
    }

    #[test]
    fn money_without_symbol_is_coerced_as_is() {
        assert_eq!(money(Some("5000")), Some(5000.0));
        assert_that!(money(Some("5,000"))).is_none();
        assert_that!(money(Some("$ 5"))).is_none();
        assert_that!(money(None)).is_none();
    }

    #[test]
    fn money_with_other_symbol() {
        assert_eq!(money_with(Some("€1,500"), '€'), Some(1500.0));
        assert_that!(money_with(Some("$1,500"), '€')).is_none();
    }

    #[test]
    fn coerce_literals() {
        assert_eq!(coerce("  42  "), Some(42.0));
        assert_eq!(coerce(""), Some(0.0));
        assert_eq!(coerce("   "), Some(0.0));
        assert_eq!(coerce(".5"), Some(0.5));
        assert_eq!(coerce("5."), Some(5.0));
        assert_eq!(coerce("+1.5E2"), Some(150.0));
        assert_eq!(coerce("0b101"), Some(5.0));
        assert_eq!(coerce("0o17"), Some(15.0));
        assert_eq!(coerce("-Infinity"), Some(f64::NEG_INFINITY));
    }

    #[test]
    fn coerce_rejects_non_literals() {
        assert_that!(coerce("inf")).is_none();
        assert_that!(coerce("NaN")).is_none();
        assert_that!(coerce("-0x10")).is_none();
        assert_that!(coerce("0b")).is_none();
        assert_that!(coerce("1 2")).is_none();
    }

    #[test]
    fn parser_names() {
        assert_eq!("number".parse::<CellParser>().unwrap().to_string(), "number");
        assert_eq!("money".parse::<CellParser>().unwrap().to_string(), "money");
        assert_eq!("money(€)".parse::<CellParser>().unwrap().to_string(), "money(€)");
        assert_eq!("text".parse::<CellParser>().unwrap().to_string(), "text");
        assert_eq!(
            "currency".parse::<CellParser>().unwrap_err(),
            UnknownParser("currency".to_string())
        );
        assert_that!("money(€€)".parse::<CellParser>()).is_err();
    }

    #[test]
    fn text_parser_is_never_numeric() {
        let cell = Cell::parse(Some("02139"), &CellParser::Text);
        assert_that!(cell.is_numeric()).is_false();
        assert_eq!(cell.value(), &CellValue::Text("02139".to_string()));
    }

    #[test]
    fn custom_parser() {
        fn percent(raw: Option<&str>) -> Option<f64> {
            number(raw?.strip_suffix('%')).map(|n| n / 100.0)
        }

        let cell = Cell::parse(Some("25%"), &CellParser::Custom(percent));
        assert_eq!(cell.value(), &CellValue::Number(0.25));
    }

    #[test]
    fn cell_value_matches_numeric_flag() {
        let numeric = Cell::parse(Some("2000"), &CellParser::Number);
        assert_that!(numeric.is_numeric()).is_true();
        assert_eq!(numeric.value(), &CellValue::Number(2000.0));
        assert_eq!(numeric.raw_string(), Some("2000"));

        let text = Cell::parse(Some("Texas"), &CellParser::Number);
        assert_that!(text.is_numeric()).is_false();
        assert_eq!(text.value(), &CellValue::Text("Texas".to_string()));
    }

    #[test]
    fn missing_cell_is_never_numeric() {
        fn always_one(_: Option<&str>) -> Option<f64> {
            Some(1.0)
        }

        let cell = Cell::parse(None, &CellParser::Custom(always_one));
        assert_that!(cell.is_numeric()).is_false();
        assert_eq!(cell.value(), &CellValue::Missing);
        assert_eq!(cell.raw_string(), None);
    }

    #[test]
    fn empty_cell_keeps_its_raw_string() {
        let cell = Cell::parse(Some(""), &CellParser::Number);
        assert_that!(cell.is_numeric()).is_false();
        assert_eq!(cell.value(), &CellValue::Text(String::new()));
    }

    #[test]
    fn cell_serializes_raw_flag_and_value() {
        let cell = Cell::parse(Some("$5,000.00"), &CellParser::MONEY);
        assert_eq!(
            serde_json::to_string(&cell).unwrap(),
            r#"{"raw_string":"$5,000.00","is_numeric":true,"value":5000}"#
        );

        let cell = Cell::parse(Some("1.5"), &CellParser::Number);
        assert_eq!(
            serde_json::to_string(&cell).unwrap(),
            r#"{"raw_string":"1.5","is_numeric":true,"value":1.5}"#
        );

        let cell = Cell::parse(None, &CellParser::Number);
        assert_eq!(
            serde_json::to_string(&cell).unwrap(),
            r#"{"raw_string":null,"is_numeric":false,"value":null}"#
        );
    }

    #[test]
    fn infinite_values_serialize_as_null() {
        assert_eq!(CellValue::Number(f64::INFINITY).to_json(), Value::Null);
    }
}
