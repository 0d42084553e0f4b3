//! Binds a logical table name to one backend sheet.

use crate::a1_notation::{column_letters, A1Range};
use crate::backend::{Grid, TabularBackend};
use crate::error::{KvError, KvResult};
use std::sync::Arc;
use tracing::{debug, info};

/// Last column of the default grid that a fresh sheet comes with.
const LAST_DEFAULT_COLUMN: &str = "Z";

/// Range-scoped access to a single sheet with a verified header row.
pub struct SheetBinding {
    backend: Arc<dyn TabularBackend>,
    name: String,
    header: Vec<String>,
}

impl std::fmt::Debug for SheetBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetBinding")
            .field("name", &self.name)
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}

impl SheetBinding {
    /// Resolve the sheet called `name`, creating it when allowed.
    ///
    /// An existing sheet must carry `header` in its first columns; extra
    /// columns after the header are left alone. A new sheet is stripped of
    /// the unused default columns and receives `header` as its first row.
    pub fn bind(
        backend: Arc<dyn TabularBackend>,
        name: &str,
        header: &[&str],
        create_if_missing: bool,
    ) -> KvResult<Self> {
        let binding = Self {
            backend,
            name: name.to_string(),
            header: header.iter().map(|h| (*h).to_string()).collect(),
        };

        if binding.backend.sheet_exists(name)? {
            binding.check_header()?;
            return Ok(binding);
        }
        if !create_if_missing {
            return Err(KvError::TableNotFound {
                name: name.to_string(),
            });
        }

        binding.backend.create_sheet(name)?;
        info!(sheet = name, "created sheet");
        if binding.header.len() < 26 {
            binding.delete_columns(&column_letters(binding.header.len()), LAST_DEFAULT_COLUMN)?;
        }
        binding.append_row(binding.header.clone())?;
        Ok(binding)
    }

    /// Name of the bound sheet.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Header the sheet was verified against.
    pub fn header(&self) -> &[String] {
        &self.header
    }

    fn check_header(&self) -> KvResult<()> {
        let last = column_letters(self.header.len().max(26) - 1);
        let grid = self.get_range(&format!("A1:{last}1"))?;
        let actual: Vec<String> = grid
            .into_iter()
            .next()
            .unwrap_or_default()
            .into_iter()
            .take(self.header.len())
            .collect();

        if actual != self.header {
            return Err(KvError::SchemaMismatch {
                expected: self.header.clone(),
                actual,
            });
        }
        Ok(())
    }

    /// Read a range of this sheet.
    pub fn get_range(&self, coord: &str) -> KvResult<Grid> {
        validate(coord)?;
        debug!(sheet = %self.name, range = coord, "get range");
        self.backend.get_range(&self.name, coord)
    }

    /// Overwrite a range of this sheet.
    pub fn set_range(&self, coord: &str, values: Grid) -> KvResult<()> {
        validate(coord)?;
        debug!(sheet = %self.name, range = coord, rows = values.len(), "set range");
        self.backend.set_range(&self.name, coord, values)
    }

    /// Read a single cell; an empty cell reads as `""`.
    pub fn get_value(&self, coord: &str) -> KvResult<String> {
        single_cell(coord)?;
        let grid = self.get_range(coord)?;
        if grid.len() > 1 || grid.first().is_some_and(|row| row.len() > 1) {
            return Err(KvError::invalid(format!(
                "expected one cell for {coord}, got {grid:?}"
            )));
        }
        Ok(grid
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .unwrap_or_default())
    }

    /// Write a single cell.
    pub fn set_value(&self, coord: &str, value: &str) -> KvResult<()> {
        single_cell(coord)?;
        self.set_range(coord, vec![vec![value.to_string()]])
    }

    /// Append a row after the last used row of column A.
    pub fn append_row(&self, values: Vec<String>) -> KvResult<()> {
        debug!(sheet = %self.name, cells = values.len(), "append row");
        self.backend.append_row(&self.name, values)
    }

    /// Structurally delete columns `start..=end`.
    pub fn delete_columns(&self, start: &str, end: &str) -> KvResult<()> {
        debug!(sheet = %self.name, start, end, "delete columns");
        self.backend.delete_columns(&self.name, start, end)
    }

    /// Structurally delete a row (1-based).
    pub fn delete_row(&self, row: usize) -> KvResult<()> {
        debug!(sheet = %self.name, row, "delete row");
        self.backend.delete_row(&self.name, row)
    }
}

fn validate(coord: &str) -> KvResult<A1Range> {
    A1Range::parse(coord)
}

fn single_cell(coord: &str) -> KvResult<()> {
    if validate(coord)?.is_single_cell() {
        Ok(())
    } else {
        Err(KvError::invalid(format!(
            "coordinate should reference only one cell: {coord}"
        )))
    }
}
