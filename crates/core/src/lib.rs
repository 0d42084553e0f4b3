//! # gridkv-core
//!
//! Key-value tables stored in the sheets of a remote spreadsheet.
//!
//! Each table is one sheet with a `key,value` header. Rows are looked up
//! through a cached copy of the key column, deleted keys leave vacant rows
//! that later inserts reuse, and nothing ever shifts a row another client
//! may have resolved.
//!
//! # Examples
//!
//! ```
//! use gridkv_core::{Db, MemoryBackend};
//! use std::sync::Arc;
//!
//! let db = Db::new(Arc::new(MemoryBackend::new()));
//! let mut table = db.create_table("settings", false).unwrap();
//!
//! table.set("theme", "dark").unwrap();
//! assert_eq!(table.get("theme").unwrap(), "dark");
//!
//! table.set_object("limits", &serde_json::json!({"max": 10})).unwrap();
//! let limits: serde_json::Value = table.get_object("limits").unwrap();
//! assert_eq!(limits["max"], 10);
//!
//! assert_eq!(table.list_keys().unwrap(), vec!["theme", "limits"]);
//! ```

/// A1 range notation helpers.
pub mod a1_notation;
/// The tabular backend capability.
pub mod backend;
/// Sheet binding with header verification.
pub mod binding;
/// Table lifecycle over a spreadsheet.
pub mod db;
/// Error types and result aliases.
pub mod error;
/// Key to row resolution.
pub mod index;
/// In-memory backend.
pub mod memory;
/// Key-value table façade.
pub mod table;

pub use a1_notation::A1Range;
pub use backend::{Grid, SheetHandle, TabularBackend};
pub use binding::SheetBinding;
pub use db::Db;
pub use error::{KvError, KvResult};
pub use index::{KeyCache, KeyRowIndex};
pub use memory::MemoryBackend;
pub use table::{Table, TableValue, HEADER};
