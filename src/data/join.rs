//! Joining rows of one table onto another by a shared name key.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, warn};

use super::unpack::Repack;
use super::PlainRow;

/// The text a value contributes as a join key.
fn key_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Index rows by the text of `key`. When several rows share a key the first one wins.
pub fn index_by<'a>(rows: &'a [PlainRow], key: &str) -> BTreeMap<String, &'a PlainRow> {
    let mut index = BTreeMap::new();
    for row in rows {
        match row.get(key).and_then(key_text) {
            Some(text) => {
                index.entry(text).or_insert(row);
            }
            None => debug!("Row without a usable `{key}` value left out of the index"),
        }
    }
    index
}

/// Insert the indexed row matching each row's `key` under `field`.
///
/// Rows without a match are left untouched and reported. Returns the number of
/// rows that matched.
pub fn join<V>(
    rows: &mut [BTreeMap<String, V>],
    key: &str,
    index: &BTreeMap<String, &PlainRow>,
    field: &str,
) -> usize
where
    V: Repack + From<Value>,
{
    let mut matched = 0;
    for row in rows.iter_mut() {
        let text = match row.get(key).map(Repack::repacked).as_ref().and_then(key_text) {
            Some(text) => text,
            None => {
                warn!("Row has no `{key}` value to join on");
                continue;
            }
        };

        match index.get(&text) {
            Some(other) => {
                let object = other
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect::<serde_json::Map<_, _>>();
                row.insert(field.to_string(), V::from(Value::Object(object)));
                matched += 1;
            }
            None => warn!("No match for {key} = {text:?}"),
        }
    }
    matched
}

/// Keys that name a year (exactly four ASCII digits), sorted ascending.
pub fn year_columns<'a, I>(keys: I) -> Vec<u16>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut years: Vec<u16> = keys
        .into_iter()
        .filter(|key| key.len() == 4 && key.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|key| key.parse().ok())
        .collect();
    years.sort_unstable();
    years
}

/// Smallest and largest numeric value of `field`, skipping non-numeric entries.
pub fn numeric_extent<'a, I>(rows: I, field: &str) -> Option<(f64, f64)>
where
    I: IntoIterator<Item = &'a PlainRow>,
{
    rows.into_iter()
        .filter_map(|row| row.get(field).and_then(Value::as_f64))
        .fold(None, |extent, n| match extent {
            None => Some((n, n)),
            Some((lo, hi)) => Some((lo.min(n), hi.max(n))),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::unpack::{into_mixed, repack, Field, Unpacker};
    use crate::data::{CellParser, Row};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use speculoos::prelude::*;

    fn plain(value: Value) -> PlainRow {
        match value {
            Value::Object(map) => map.into_iter().collect(),
            _ => unreachable!("test rows are objects"),
        }
    }

    fn rtc_rows() -> Vec<PlainRow> {
        vec![
            plain(json!({"State": "Texas", "2010": "S", "2011": "S"})),
            plain(json!({"State": "Illinois", "2010": "N", "2011": "N"})),
            plain(json!({"State": "Texas", "2010": "M", "2011": "M"})),
        ]
    }

    #[test]
    fn index_keeps_first_row_per_key() {
        let rows = rtc_rows();
        let index = index_by(&rows, "State");

        assert_eq!(index.len(), 2);
        assert_eq!(index["Texas"]["2010"], json!("S"));
    }

    #[test]
    fn index_uses_numeric_keys_as_text() {
        let rows = vec![plain(json!({"fips": 48, "name": "Texas"}))];
        let index = index_by(&rows, "fips");

        assert_eq!(index["48"]["name"], json!("Texas"));
    }

    #[test]
    fn join_injects_matches_and_skips_misses() {
        let rtc = rtc_rows();
        let index = index_by(&rtc, "State");
        let mut states = vec![
            plain(json!({"state": "Texas", "registered": 51903})),
            plain(json!({"state": "Vermont", "registered": 1000})),
            plain(json!({"registered": 7})),
        ];

        let matched = join(&mut states, "state", &index, "rtc");

        assert_eq!(matched, 1);
        assert_eq!(states[0]["rtc"]["2011"], json!("S"));
        assert_that!(states[1].contains_key("rtc")).is_false();
        assert_that!(states[2].contains_key("rtc")).is_false();
    }

    #[test]
    fn join_onto_unpacked_rows() {
        let rtc = rtc_rows();
        let index = index_by(&rtc, "State");
        let row: Row = vec![("state".to_string(), Some("Illinois".to_string()))]
            .into_iter()
            .collect();
        let mut rows = vec![into_mixed(Unpacker::new().unpack(&row))];

        assert_eq!(join(&mut rows, "state", &index, "rtc"), 1);
        assert_that!(matches!(rows[0]["rtc"], Field::Plain(_))).is_true();
        assert_eq!(repack(&rows[0])["rtc"]["2010"], json!("N"));
    }

    #[test]
    fn join_text_keys_typed_alike_on_both_sides() {
        let unpacker = Unpacker::new().with_parser("zip", CellParser::Text);
        let towns: Vec<Row> = vec![vec![("zip", "02139"), ("name", "Cambridge")]]
            .into_iter()
            .map(|fields| {
                fields
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), Some(v.to_string())))
                    .collect()
            })
            .collect();
        let other_rows = unpacker.repack_rows(&towns);
        let index = index_by(&other_rows, "zip");

        let row: Row = vec![
            ("zip".to_string(), Some("02139".to_string())),
            ("pop".to_string(), Some("100".to_string())),
        ]
        .into_iter()
        .collect();
        let mut rows = vec![into_mixed(unpacker.unpack(&row))];

        assert_eq!(join(&mut rows, "zip", &index, "town"), 1);
        let plain = repack(&rows[0]);
        assert_eq!(plain["zip"], json!("02139"));
        assert_eq!(plain["town"]["name"], json!("Cambridge"));
    }

    #[test]
    fn year_columns_are_sorted_numbers() {
        let keys = vec!["State", "2011", "1986", "abbr", "20110", "2000"];
        assert_eq!(year_columns(keys), vec![1986, 2000, 2011]);
    }

    #[test]
    fn extent_ignores_non_numeric_values() {
        let rows = vec![
            plain(json!({"permits": 12})),
            plain(json!({"permits": "n/a"})),
            plain(json!({"permits": 3.5})),
            plain(json!({"other": 100})),
        ];

        assert_eq!(numeric_extent(&rows, "permits"), Some((3.5, 12.0)));
        assert_eq!(numeric_extent(&rows, "missing"), None);
    }
}
