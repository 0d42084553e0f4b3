//! In-process tabular backend.
//!
//! Emulates the observable behaviour of a remote spreadsheet closely enough
//! for the row-slot protocol to be exercised without a network: reads trim
//! trailing empty cells and rows, appends land after the last non-empty key
//! cell, and structural deletes shift the grid.

use crate::a1_notation::{column_index, A1Range};
use crate::backend::{Grid, SheetHandle, TabularBackend};
use crate::error::{KvError, KvResult};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Columns in a freshly created sheet (A..Z).
pub const DEFAULT_COLUMN_COUNT: usize = 26;

#[derive(Debug, Clone)]
struct MemorySheet {
    handle: SheetHandle,
    rows: Vec<Vec<String>>,
    column_count: usize,
}

impl MemorySheet {
    fn new(handle: SheetHandle) -> Self {
        Self {
            handle,
            rows: Vec::new(),
            column_count: DEFAULT_COLUMN_COUNT,
        }
    }

    fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map_or("", String::as_str)
    }

    fn write(&mut self, row: usize, col: usize, value: String) {
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, Vec::new);
        }
        let cells = &mut self.rows[row];
        if cells.len() <= col {
            cells.resize(col + 1, String::new());
        }
        cells[col] = value;
        self.column_count = self.column_count.max(col + 1);
    }
}

#[derive(Debug, Default)]
struct State {
    sheets: HashMap<String, MemorySheet>,
    next_handle: i64,
    round_trips: usize,
    pending_failure: Option<String>,
}

/// Thread-safe in-memory [`TabularBackend`].
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    /// Create a backend with no sheets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of backend calls served so far, failed ones included.
    pub fn round_trips(&self) -> usize {
        self.state.lock().round_trips
    }

    /// Make the next backend call fail with `message`.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.state.lock().pending_failure = Some(message.into());
    }

    /// Names of all sheets, sorted.
    pub fn sheet_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().sheets.keys().cloned().collect();
        names.sort();
        names
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut State) -> KvResult<T>) -> KvResult<T> {
        let mut state = self.state.lock();
        state.round_trips += 1;
        if let Some(message) = state.pending_failure.take() {
            return Err(KvError::backend(message));
        }
        f(&mut state)
    }

    fn with_sheet<T>(
        &self,
        sheet: &str,
        f: impl FnOnce(&mut MemorySheet) -> KvResult<T>,
    ) -> KvResult<T> {
        self.with_state(|state| {
            let target = state
                .sheets
                .get_mut(sheet)
                .ok_or_else(|| KvError::backend(format!("Unable to parse range: {sheet}")))?;
            f(target)
        })
    }
}

impl TabularBackend for MemoryBackend {
    fn sheet_handle(&self, sheet: &str) -> KvResult<Option<SheetHandle>> {
        self.with_state(|state| Ok(state.sheets.get(sheet).map(|s| s.handle)))
    }

    fn create_sheet(&self, sheet: &str) -> KvResult<SheetHandle> {
        self.with_state(|state| {
            if state.sheets.contains_key(sheet) {
                return Err(KvError::backend(format!(
                    "A sheet with the name \"{sheet}\" already exists"
                )));
            }
            state.next_handle += 1;
            let handle = SheetHandle(state.next_handle);
            state
                .sheets
                .insert(sheet.to_string(), MemorySheet::new(handle));
            Ok(handle)
        })
    }

    fn delete_sheet(&self, handle: SheetHandle) -> KvResult<()> {
        self.with_state(|state| {
            let name = state
                .sheets
                .iter()
                .find(|(_, s)| s.handle == handle)
                .map(|(name, _)| name.clone())
                .ok_or_else(|| KvError::backend(format!("No sheet with id: {}", handle.0)))?;
            state.sheets.remove(&name);
            Ok(())
        })
    }

    fn get_range(&self, sheet: &str, range: &str) -> KvResult<Grid> {
        let range = A1Range::parse(range)?;
        self.with_sheet(sheet, |s| {
            let first = range.first_row() - 1;
            let last = range.end_row.unwrap_or(s.rows.len()).min(s.rows.len());

            let mut grid: Grid = (first..last)
                .map(|row| {
                    let mut cells: Vec<String> = (range.start_col..=range.end_col)
                        .map(|col| s.cell(row, col).to_string())
                        .collect();
                    while cells.last().is_some_and(String::is_empty) {
                        cells.pop();
                    }
                    cells
                })
                .collect();
            while grid.last().is_some_and(Vec::is_empty) {
                grid.pop();
            }
            Ok(grid)
        })
    }

    fn set_range(&self, sheet: &str, range: &str, values: Grid) -> KvResult<()> {
        let range = A1Range::parse(range)?;
        if let Some(end) = range.end_row {
            let height = end - range.first_row() + 1;
            if values.len() > height {
                return Err(KvError::backend(format!(
                    "Requested writing within range [{range}], but tried writing {} rows",
                    values.len()
                )));
            }
        }
        if let Some(row) = values.iter().find(|row| row.len() > range.width()) {
            return Err(KvError::backend(format!(
                "Requested writing within range [{range}], but tried writing {} columns",
                row.len()
            )));
        }

        self.with_sheet(sheet, |s| {
            let first = range.first_row() - 1;
            for (r, row) in values.into_iter().enumerate() {
                for (c, value) in row.into_iter().enumerate() {
                    s.write(first + r, range.start_col + c, value);
                }
            }
            Ok(())
        })
    }

    fn append_row(&self, sheet: &str, values: Vec<String>) -> KvResult<()> {
        self.with_sheet(sheet, |s| {
            let target = s
                .rows
                .iter()
                .rposition(|row| row.first().is_some_and(|key| !key.is_empty()))
                .map_or(0, |last| last + 1);
            for (col, value) in values.into_iter().enumerate() {
                s.write(target, col, value);
            }
            Ok(())
        })
    }

    fn delete_columns(&self, sheet: &str, start: &str, end: &str) -> KvResult<()> {
        let start = column_index(start)?;
        let end = column_index(end)?;
        if start > end {
            return Err(KvError::invalid(format!(
                "column range is reversed: {start}..{end}"
            )));
        }

        self.with_sheet(sheet, |s| {
            if end >= s.column_count {
                return Err(KvError::backend(format!(
                    "Cannot delete columns beyond the grid ({} columns)",
                    s.column_count
                )));
            }
            for row in &mut s.rows {
                if row.len() > start {
                    row.drain(start..=end.min(row.len() - 1));
                }
            }
            s.column_count -= end - start + 1;
            Ok(())
        })
    }

    fn delete_row(&self, sheet: &str, row: usize) -> KvResult<()> {
        if row == 0 {
            return Err(KvError::invalid("row numbers start at 1"));
        }
        self.with_sheet(sheet, |s| {
            if row <= s.rows.len() {
                s.rows.remove(row - 1);
            }
            Ok(())
        })
    }
}
