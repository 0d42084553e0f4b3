//! # gridkv-http
//!
//! Google Sheets backend for gridkv tables.
//!
//! [`SheetsBackend`] talks to the Sheets v4 REST API with a blocking HTTP
//! client; every trait call is one request (two for structural deletes,
//! which first resolve the sheet id). Credentials come from a pluggable
//! [`CredentialProvider`].
//!
//! ```no_run
//! use gridkv_core::Db;
//! use gridkv_http::{SheetsBackend, SheetsConfig, StaticToken};
//! use std::sync::Arc;
//!
//! let backend = SheetsBackend::new(
//!     "1bofFXyy7Lz-slQ1m0",
//!     Arc::new(StaticToken::new("ya29.token")),
//!     SheetsConfig::default(),
//! )
//! .unwrap();
//! let db = Db::new(Arc::new(backend));
//! let mut table = db.get_table("settings", true).unwrap();
//! table.set("theme", "dark").unwrap();
//! ```

/// Credential handles and providers.
pub mod auth;
/// Sheets REST backend.
pub mod sheets;

pub use auth::{AuthorizedUserFile, Credential, CredentialProvider, StaticToken};
pub use sheets::{SheetsBackend, SheetsConfig};
