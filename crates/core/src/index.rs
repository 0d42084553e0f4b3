//! Key to row-number resolution over snapshots of the key column.
//!
//! Data rows start at row 2: row 1 holds the header. Entry `i` of a
//! [`KeyCache`] therefore describes row `i + 2`.

use crate::backend::Grid;
use crate::binding::SheetBinding;
use crate::error::{KvError, KvResult};
use tracing::{debug, trace, warn};

/// First row that holds data rather than the header.
pub const FIRST_DATA_ROW: usize = 2;

/// Range covering every key cell below the header.
pub const KEY_COLUMN_RANGE: &str = "A2:A";

/// Row number of the `index`-th data row.
pub fn key_index_to_row(index: usize) -> usize {
    index + FIRST_DATA_ROW
}

/// Point-in-time copy of the key column. `None` marks a vacant row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyCache {
    keys: Vec<Option<String>>,
}

impl KeyCache {
    /// Build a snapshot from a raw `A2:A` read. Short or empty rows are vacant.
    pub fn from_grid(grid: Grid) -> Self {
        let keys = grid
            .into_iter()
            .map(|row| row.into_iter().next().filter(|key| !key.is_empty()))
            .collect();
        Self { keys }
    }

    /// Number of data rows covered by the snapshot.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// True when the snapshot covers no data rows.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Row numbers of every entry equal to `key`, ascending.
    pub fn rows_of(&self, key: &str) -> Vec<usize> {
        self.keys
            .iter()
            .enumerate()
            .filter(|(_, k)| k.as_deref() == Some(key))
            .map(|(i, _)| key_index_to_row(i))
            .collect()
    }

    /// Row number of the lowest vacant entry.
    pub fn first_vacant(&self) -> Option<usize> {
        self.keys.iter().position(Option::is_none).map(key_index_to_row)
    }

    /// Occupied keys in row order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().filter_map(|k| k.as_deref())
    }
}

/// Resolves keys to row numbers, caching the key column between calls.
///
/// Callers choose per lookup whether the cached snapshot is good enough
/// (`use_cache = true`) or an authoritative re-read is required. Only
/// read paths should trust the cache; anything that writes must refresh.
#[derive(Debug, Default)]
pub struct KeyRowIndex {
    cache: Option<KeyCache>,
}

impl KeyRowIndex {
    /// Create an index with no snapshot yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot, if one has been taken.
    pub fn cached(&self) -> Option<&KeyCache> {
        self.cache.as_ref()
    }

    /// Re-read the key column and replace the snapshot wholesale.
    pub fn refresh(&mut self, sheet: &SheetBinding) -> KvResult<&KeyCache> {
        let cache = read_snapshot(sheet)?;
        Ok(self.cache.insert(cache))
    }

    /// Snapshot to scan: the cached one when allowed and present, otherwise a fresh one.
    pub fn query(&mut self, sheet: &SheetBinding, use_cache: bool) -> KvResult<&KeyCache> {
        let cache = match self.cache.take() {
            Some(cache) if use_cache => {
                trace!(sheet = sheet.name(), "using cached key column");
                cache
            }
            _ => read_snapshot(sheet)?,
        };
        Ok(self.cache.insert(cache))
    }

    /// Row holding `key`, or `None` when absent.
    ///
    /// Several rows holding the same key is an integrity violation and
    /// fails with [`KvError::DuplicateKey`]; no occurrence is preferred.
    pub fn find_key_row(
        &mut self,
        sheet: &SheetBinding,
        key: &str,
        use_cache: bool,
    ) -> KvResult<Option<usize>> {
        let rows = self.query(sheet, use_cache)?.rows_of(key);
        match rows.len() {
            0 => Ok(None),
            1 => Ok(Some(rows[0])),
            _ => {
                warn!(sheet = sheet.name(), key, ?rows, "duplicate key");
                Err(KvError::DuplicateKey {
                    key: key.to_string(),
                    rows,
                })
            }
        }
    }

    /// Lowest vacant row, or `None` when every data row is occupied.
    pub fn find_vacant_row(
        &mut self,
        sheet: &SheetBinding,
        use_cache: bool,
    ) -> KvResult<Option<usize>> {
        Ok(self.query(sheet, use_cache)?.first_vacant())
    }
}

fn read_snapshot(sheet: &SheetBinding) -> KvResult<KeyCache> {
    let cache = KeyCache::from_grid(sheet.get_range(KEY_COLUMN_RANGE)?);
    debug!(sheet = sheet.name(), rows = cache.len(), "refreshed key cache");
    Ok(cache)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TabularBackend;
    use crate::memory::MemoryBackend;
    use std::sync::Arc;

    fn grid(keys: &[&str]) -> Grid {
        keys.iter()
            .map(|k| {
                if k.is_empty() {
                    Vec::new()
                } else {
                    vec![(*k).to_string()]
                }
            })
            .collect()
    }

    fn bound_sheet(keys: &[&str]) -> (Arc<MemoryBackend>, SheetBinding) {
        let backend = Arc::new(MemoryBackend::new());
        let sheet = SheetBinding::bind(backend.clone(), "kv", &["key", "value"], true).unwrap();
        for key in keys {
            backend
                .append_row("kv", vec![(*key).to_string(), "v".to_string()])
                .unwrap();
        }
        (backend, sheet)
    }

    #[test]
    fn test_key_index_to_row() {
        assert_eq!(key_index_to_row(0), 2);
        assert_eq!(key_index_to_row(9), 11);
    }

    #[test]
    fn test_cache_from_grid() {
        let mut raw = grid(&["a", "", "b"]);
        raw.push(vec![String::new(), "orphan value".to_string()]);
        let cache = KeyCache::from_grid(raw);

        assert_eq!(cache.len(), 4);
        assert_eq!(cache.rows_of("a"), vec![2]);
        assert_eq!(cache.rows_of("b"), vec![4]);
        assert_eq!(cache.first_vacant(), Some(3));
        assert_eq!(cache.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_cache_empty() {
        let cache = KeyCache::from_grid(Vec::new());
        assert!(cache.is_empty());
        assert_eq!(cache.first_vacant(), None);
        assert!(cache.rows_of("a").is_empty());
    }

    #[test]
    fn test_cache_duplicates_listed_in_row_order() {
        let cache = KeyCache::from_grid(grid(&["x", "a", "", "a"]));
        assert_eq!(cache.rows_of("a"), vec![3, 5]);
    }

    #[test]
    fn test_find_key_row() {
        let (_backend, sheet) = bound_sheet(&["a", "b"]);
        let mut index = KeyRowIndex::new();

        assert_eq!(index.find_key_row(&sheet, "a", false).unwrap(), Some(2));
        assert_eq!(index.find_key_row(&sheet, "b", true).unwrap(), Some(3));
        assert_eq!(index.find_key_row(&sheet, "c", true).unwrap(), None);
    }

    #[test]
    fn test_use_cache_skips_refresh() {
        let (backend, sheet) = bound_sheet(&["a"]);
        let mut index = KeyRowIndex::new();

        // No snapshot yet: use_cache still has to read
        let before = backend.round_trips();
        index.find_key_row(&sheet, "a", true).unwrap();
        assert_eq!(backend.round_trips(), before + 1);

        // External writer adds a key; the cached snapshot does not see it
        backend
            .append_row("kv", vec!["b".to_string(), "v".to_string()])
            .unwrap();
        let before = backend.round_trips();
        assert_eq!(index.find_key_row(&sheet, "b", true).unwrap(), None);
        assert_eq!(backend.round_trips(), before);

        assert_eq!(index.find_key_row(&sheet, "b", false).unwrap(), Some(3));
        assert_eq!(backend.round_trips(), before + 1);
    }

    #[test]
    fn test_duplicate_key_is_error() {
        let (_backend, sheet) = bound_sheet(&["a", "b", "a"]);
        let mut index = KeyRowIndex::new();

        let err = index.find_key_row(&sheet, "a", false).unwrap_err();
        match err {
            KvError::DuplicateKey { key, rows } => {
                assert_eq!(key, "a");
                assert_eq!(rows, vec![2, 4]);
            }
            other => panic!("expected duplicate key, got {other:?}"),
        }
        // Other keys still resolve
        assert_eq!(index.find_key_row(&sheet, "b", true).unwrap(), Some(3));
    }

    #[test]
    fn test_find_vacant_row_first_fit() {
        let (backend, sheet) = bound_sheet(&["a", "b", "c", "d"]);
        let mut index = KeyRowIndex::new();
        assert_eq!(index.find_vacant_row(&sheet, false).unwrap(), None);

        for row in [4, 3] {
            backend
                .set_range("kv", &format!("A{row}:B{row}"), vec![vec![String::new(), String::new()]])
                .unwrap();
        }
        assert_eq!(index.find_vacant_row(&sheet, true).unwrap(), None);
        assert_eq!(index.find_vacant_row(&sheet, false).unwrap(), Some(3));
    }

    #[test]
    fn test_refresh_replaces_snapshot() {
        let (backend, sheet) = bound_sheet(&["a"]);
        let mut index = KeyRowIndex::new();
        assert!(index.cached().is_none());

        index.refresh(&sheet).unwrap();
        assert_eq!(index.cached().map(KeyCache::len), Some(1));

        backend
            .set_range("kv", "A2:B2", vec![vec![String::new(), String::new()]])
            .unwrap();
        let cache = index.refresh(&sheet).unwrap();
        assert!(cache.is_empty());
    }
}
