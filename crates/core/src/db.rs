//! A spreadsheet document viewed as a database of tables.

use crate::backend::TabularBackend;
use crate::error::{KvError, KvResult};
use crate::table::Table;
use std::sync::Arc;
use tracing::info;

/// Entry point for opening, creating and dropping tables.
#[derive(Clone)]
pub struct Db {
    backend: Arc<dyn TabularBackend>,
}

impl std::fmt::Debug for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db").finish_non_exhaustive()
    }
}

impl Db {
    /// Wrap a backend scoped to one spreadsheet document.
    pub fn new(backend: Arc<dyn TabularBackend>) -> Self {
        Self { backend }
    }

    /// Open a table, creating its sheet when `create_if_missing` is set.
    pub fn get_table(&self, name: &str, create_if_missing: bool) -> KvResult<Table> {
        Table::bind(Arc::clone(&self.backend), name, create_if_missing)
    }

    /// Check whether a table exists.
    pub fn has_table(&self, name: &str) -> KvResult<bool> {
        self.backend.sheet_exists(name)
    }

    /// Create a table. An existing table is opened only when `exist_ok` is set.
    pub fn create_table(&self, name: &str, exist_ok: bool) -> KvResult<Table> {
        if !exist_ok && self.has_table(name)? {
            return Err(KvError::AlreadyExists {
                name: name.to_string(),
            });
        }
        self.get_table(name, true)
    }

    /// Drop a table and everything stored in it.
    pub fn delete_table(&self, name: &str) -> KvResult<()> {
        let handle = self
            .backend
            .sheet_handle(name)?
            .ok_or_else(|| KvError::TableNotFound {
                name: name.to_string(),
            })?;
        self.backend.delete_sheet(handle)?;
        info!(table = name, "deleted table");
        Ok(())
    }
}
