//! Key-value table stored in one sheet.
//!
//! Layout: row 1 is the `key,value` header, every later row holds one pair
//! in columns A and B. A row whose key cell is empty is vacant and is filled
//! again before the sheet is allowed to grow.

use crate::a1_notation::cell;
use crate::backend::TabularBackend;
use crate::binding::SheetBinding;
use crate::error::{KvError, KvResult};
use crate::index::KeyRowIndex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Header every table sheet starts with.
pub const HEADER: [&str; 2] = ["key", "value"];

const KEY_COLUMN: usize = 0;
const VALUE_COLUMN: usize = 1;

/// A value as stored through the table façade.
///
/// `Raw` strings are written verbatim; `Encoded` values are written as JSON
/// text. The row layer below only ever sees strings.
#[derive(Debug, Clone, PartialEq)]
pub enum TableValue {
    Raw(String),
    Encoded(serde_json::Value),
}

impl TableValue {
    /// Text written to the value cell.
    pub fn encode(&self) -> KvResult<String> {
        match self {
            Self::Raw(text) => Ok(text.clone()),
            Self::Encoded(value) => Ok(serde_json::to_string(value)?),
        }
    }

    /// Parse value-cell text as an encoded value.
    pub fn decode(text: &str) -> KvResult<Self> {
        Ok(Self::Encoded(serde_json::from_str(text)?))
    }

    /// The string, if this is a raw value.
    pub fn as_raw(&self) -> Option<&str> {
        match self {
            Self::Raw(text) => Some(text),
            Self::Encoded(_) => None,
        }
    }
}

impl From<String> for TableValue {
    fn from(text: String) -> Self {
        Self::Raw(text)
    }
}

impl From<&str> for TableValue {
    fn from(text: &str) -> Self {
        Self::Raw(text.to_string())
    }
}

impl From<serde_json::Value> for TableValue {
    fn from(value: serde_json::Value) -> Self {
        Self::Encoded(value)
    }
}

/// A named key-value table.
///
/// One instance is meant to be driven by one thread. Several instances,
/// in this or other processes, may share the same sheet: writes always
/// resolve rows against a fresh read of the key column, and deletes empty
/// rows in place so row numbers never shift under another client. Two
/// clients writing the same key race, and the last write wins.
#[derive(Debug)]
pub struct Table {
    sheet: SheetBinding,
    index: KeyRowIndex,
}

impl Table {
    /// Bind to the sheet called `name`, creating it when allowed.
    pub fn bind(
        backend: Arc<dyn TabularBackend>,
        name: &str,
        create_if_missing: bool,
    ) -> KvResult<Self> {
        let sheet = SheetBinding::bind(backend, name, &HEADER, create_if_missing)?;
        Ok(Self {
            sheet,
            index: KeyRowIndex::new(),
        })
    }

    /// Name of the underlying sheet.
    pub fn name(&self) -> &str {
        self.sheet.name()
    }

    /// Check whether `key` is present, against a fresh read of the key column.
    pub fn has(&mut self, key: &str) -> KvResult<bool> {
        Ok(self.row_of(key)?.is_some())
    }

    /// Row currently holding `key`, resolved authoritatively.
    pub fn row_of(&mut self, key: &str) -> KvResult<Option<usize>> {
        self.index.find_key_row(&self.sheet, key, false)
    }

    /// Value stored under `key`; fails with [`KvError::KeyNotFound`] when absent.
    pub fn get(&mut self, key: &str) -> KvResult<String> {
        self.try_get(key)?
            .ok_or_else(|| KvError::key_not_found(key))
    }

    /// Value stored under `key`, or `None` when absent.
    ///
    /// The cached key column is tried first. Its row is read back and only
    /// trusted if it still carries `key`; otherwise the key column is
    /// re-read once and the value fetched from the resolved row.
    pub fn try_get(&mut self, key: &str) -> KvResult<Option<String>> {
        if let Some(row) = self.index.find_key_row(&self.sheet, key, true)? {
            let grid = self.sheet.get_range(&pair_range(row))?;
            if let Some(cells) = grid.into_iter().next() {
                let mut cells = cells.into_iter();
                if cells.next().as_deref() == Some(key) {
                    return Ok(Some(cells.next().unwrap_or_default()));
                }
            }
            warn!(sheet = self.name(), key, row, "cached row no longer holds key");
        }

        match self.index.find_key_row(&self.sheet, key, false)? {
            Some(row) => self.sheet.get_value(&cell(VALUE_COLUMN, row)).map(Some),
            None => Ok(None),
        }
    }

    /// Store `value` under `key`, reusing a vacant row before appending.
    ///
    /// The empty string is not a valid key: an empty key cell is how vacant
    /// rows are recognised.
    pub fn set(&mut self, key: &str, value: &str) -> KvResult<()> {
        if key.is_empty() {
            return Err(KvError::invalid(
                "key must not be empty: an empty key cell marks a vacant row",
            ));
        }

        if let Some(row) = self.index.find_key_row(&self.sheet, key, false)? {
            debug!(sheet = self.name(), key, row, "overwrite value");
            return self.sheet.set_value(&cell(VALUE_COLUMN, row), value);
        }

        // Same snapshot as the lookup above; another client may fill this
        // row in between, which is an accepted race.
        match self.index.find_vacant_row(&self.sheet, true)? {
            Some(row) => {
                debug!(sheet = self.name(), key, row, "fill vacant row");
                self.sheet.set_value(&cell(KEY_COLUMN, row), key)?;
                self.sheet.set_value(&cell(VALUE_COLUMN, row), value)
            }
            None => {
                debug!(sheet = self.name(), key, "append row");
                self.sheet
                    .append_row(vec![key.to_string(), value.to_string()])
            }
        }
    }

    /// Remove `key`; fails with [`KvError::KeyNotFound`] when absent.
    pub fn delete(&mut self, key: &str) -> KvResult<()> {
        if self.try_delete(key)? {
            Ok(())
        } else {
            Err(KvError::key_not_found(key))
        }
    }

    /// Remove `key` if present. Returns whether a row was emptied.
    ///
    /// The row is blanked, never removed: removing it would shift every row
    /// below and invalidate row numbers other clients already resolved.
    pub fn try_delete(&mut self, key: &str) -> KvResult<bool> {
        let Some(row) = self.index.find_key_row(&self.sheet, key, false)? else {
            return Ok(false);
        };
        debug!(sheet = self.name(), key, row, "tombstone row");
        self.sheet
            .set_range(&pair_range(row), vec![vec![String::new(), String::new()]])?;
        Ok(true)
    }

    /// All keys in ascending row order, from a fresh read.
    pub fn list_keys(&mut self) -> KvResult<Vec<String>> {
        let cache = self.index.refresh(&self.sheet)?;
        Ok(cache.keys().map(str::to_string).collect())
    }

    /// Store a façade value.
    pub fn put(&mut self, key: &str, value: &TableValue) -> KvResult<()> {
        let text = value.encode()?;
        self.set(key, &text)
    }

    /// Fetch the value under `key` decoded as JSON.
    pub fn fetch_encoded(&mut self, key: &str) -> KvResult<TableValue> {
        let text = self.get(key)?;
        TableValue::decode(&text)
    }

    /// Store any serializable value as JSON text.
    pub fn set_object<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> KvResult<()> {
        let text = serde_json::to_string(value)?;
        self.set(key, &text)
    }

    /// Read the value under `key` and deserialize it from JSON text.
    pub fn get_object<T: DeserializeOwned>(&mut self, key: &str) -> KvResult<T> {
        let text = self.get(key)?;
        Ok(serde_json::from_str(&text)?)
    }
}

fn pair_range(row: usize) -> String {
    format!("{}:{}", cell(KEY_COLUMN, row), cell(VALUE_COLUMN, row))
}
