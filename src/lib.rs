//! Typed spreadsheet cells.
//!
//! Rows of raw strings (as read from CSV or JSON) are unpacked into [`Cell`]s that
//! keep the raw text next to a numeric or textual value, using a parser chosen per
//! column. Unpacked rows repack into plain values, and can be joined against a
//! second table by a name key.
//!
//! ```
//! use sheetpack::{repack, CellParser, Row, Unpacker};
//!
//! let unpacker = Unpacker::new().with_parser("amount", CellParser::MONEY);
//! let row: Row = vec![
//!     ("year".to_string(), Some("2000".to_string())),
//!     ("amount".to_string(), Some("$5,000.00".to_string())),
//! ]
//! .into_iter()
//! .collect();
//!
//! let unpacked = unpacker.unpack(&row);
//! assert!(unpacked["amount"].is_numeric());
//! assert_eq!(repack(&unpacked)["amount"], serde_json::json!(5000));
//! ```

pub mod config;
pub mod data;

pub use data::cell::{Cell, CellParser, CellValue};
pub use data::sheet::{Column, Sheet};
pub use data::unpack::{repack, Field, Repack, UnpackError, UnpackedRow, Unpacker};
pub use data::{PlainRow, Row, Table};
