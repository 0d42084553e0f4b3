//! The remote tabular resource a table is stored in.
//!
//! Every call is a synchronous round trip. Implementations must not buffer
//! writes: once a call returns `Ok`, other clients can observe the change.

use crate::error::KvResult;

/// Cell values of a range, row-major.
///
/// Rows may be ragged. A row shorter than the range is padded with empty
/// cells, and trailing empty rows are omitted entirely.
pub type Grid = Vec<Vec<String>>;

/// Backend-assigned identifier of a sheet inside a spreadsheet document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SheetHandle(pub i64);

/// Capability consumed by [`SheetBinding`](crate::SheetBinding).
///
/// `range` arguments are unqualified A1 expressions (`A2:A`, `B7`); the
/// backend is responsible for scoping them to `sheet`.
pub trait TabularBackend: Send + Sync {
    /// Look up the handle of a sheet by its name.
    fn sheet_handle(&self, sheet: &str) -> KvResult<Option<SheetHandle>>;

    /// Check whether a sheet exists.
    fn sheet_exists(&self, sheet: &str) -> KvResult<bool> {
        Ok(self.sheet_handle(sheet)?.is_some())
    }

    /// Create an empty sheet with the default grid.
    fn create_sheet(&self, sheet: &str) -> KvResult<SheetHandle>;

    /// Remove a sheet and all of its contents.
    fn delete_sheet(&self, handle: SheetHandle) -> KvResult<()>;

    /// Read the values of a range.
    fn get_range(&self, sheet: &str, range: &str) -> KvResult<Grid>;

    /// Overwrite the values of a range starting at its top-left cell.
    fn set_range(&self, sheet: &str, range: &str, values: Grid) -> KvResult<()>;

    /// Write `values` into the first row past the last non-empty row of column A.
    fn append_row(&self, sheet: &str, values: Vec<String>) -> KvResult<()>;

    /// Structurally delete columns `start..=end` (letters), shifting later columns left.
    fn delete_columns(&self, sheet: &str, start: &str, end: &str) -> KvResult<()>;

    /// Structurally delete one row (1-based), shifting later rows up.
    fn delete_row(&self, sheet: &str, row: usize) -> KvResult<()>;
}
