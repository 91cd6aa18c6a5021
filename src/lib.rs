//! A strict TOML 1.0 parser that produces an owned, insertion-ordered
//! document tree.
//!
//! Every malformed input the TOML specification rejects is rejected here,
//! with an error carrying the byte offset (and derived line/column) of the
//! failure. Valid input yields a [`Document`] — the root [`Table`] — whose
//! values are plain owned Rust data with no borrow back into the source.
//!
//! # Quick start
//!
//! ```
//! # fn main() -> Result<(), toml_arbor::Error> {
//! let doc = toml_arbor::parse("key = 'value'")?;
//! assert_eq!(doc.get("key").and_then(|v| v.as_str()), Some("value"));
//! # Ok(())
//! # }
//! ```
//!
//! Traverse without panicking on missing keys using [`Table::probe`], which
//! collapses absent keys, wrong types, and out-of-bounds indices into `None`:
//!
//! ```
//! # fn main() -> Result<(), toml_arbor::Error> {
//! let doc = toml_arbor::parse(
//!     r#"
//! dev-mode = true
//!
//! [[things]]
//! name = "hammer"
//! value = 43
//!
//! [[things]]
//! name = "drill"
//! value = 300
//! color = "green"
//! "#,
//! )?;
//!
//! assert_eq!(doc.probe("things").at(0).key("color").as_str(), None);
//! assert_eq!(doc.probe("things").at(1).key("color").as_str(), Some("green"));
//! assert_eq!(doc.probe("dev-mode").as_bool(), Some(true));
//! # Ok(())
//! # }
//! ```
//!
//! Or pattern-match [`Value`] directly:
//!
//! ```
//! # let doc = toml_arbor::parse("item = 0").unwrap();
//! for (key, value) in &doc {
//!     match value {
//!         toml_arbor::Value::String(s) => {}
//!         toml_arbor::Value::Integer(i) => {}
//!         toml_arbor::Value::Float(f) => {}
//!         toml_arbor::Value::Boolean(b) => {}
//!         toml_arbor::Value::DateTime(dt) => {}
//!         toml_arbor::Value::Array(items) => {}
//!         toml_arbor::Value::Table(table) => {}
//!     }
//! }
//! ```
//!
//! # Errors
//!
//! Parsing stops at the first error; no partial tree is returned. The
//! [`Error`] exposes its [`ErrorKind`], the source [`Span`], and 1-based
//! line/column. With the `reporting` feature enabled,
//! `Error::to_diagnostic` renders rich diagnostics via
//! `codespan-reporting`.
//!
//! # Features
//!
//! - `serde` — `serde::Serialize` for the tree, so a parsed document can
//!   be re-encoded as JSON or any other serde format.
//! - `reporting` — diagnostic conversion for `codespan-reporting`.

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod array;
mod error;
mod parser;
mod span;
mod table;
mod time;
mod value;

pub use array::Array;
pub use error::{Error, ErrorKind};
pub use parser::parse;
pub use span::Span;
pub use table::Table;
pub use time::{Date, DateTime, DateTimeKind, Time, TimeOffset};
pub use value::{Key, Probe, Value};

/// The root [`Table`] produced by [`parse`].
pub type Document = Table;

#[cfg(feature = "serde")]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
pub mod impl_serde;
