use crate::error::{KvError, KvResult};
use std::fmt;

/// A range expression in A1 notation without a sheet qualifier.
///
/// Columns are 0-based. Rows are 1-based, as they appear in the expression.
/// A missing row means the range is open in that direction: `A2:A` runs
/// from row 2 to the last row of column A, `A:A` covers the whole column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct A1Range {
    pub start_col: usize,
    pub start_row: Option<usize>,
    pub end_col: usize,
    pub end_row: Option<usize>,
}

impl A1Range {
    /// Parse a range such as `A5:B5`, `B7`, `A2:A` or `A1:Z1`.
    pub fn parse(expr: &str) -> KvResult<Self> {
        if expr.contains('!') {
            return Err(KvError::invalid(format!(
                "range must not contain a sheet qualifier: {expr}"
            )));
        }

        let mut parts = expr.split(':');
        let first = parts.next().unwrap_or_default();
        let second = parts.next();
        if parts.next().is_some() {
            return Err(KvError::invalid(format!("malformed range: {expr}")));
        }

        let (start_col, start_row) = parse_endpoint(first, expr)?;
        let (end_col, end_row) = match second {
            Some(end) => parse_endpoint(end, expr)?,
            None => {
                if start_row.is_none() {
                    return Err(KvError::invalid(format!(
                        "single cell reference needs a row: {expr}"
                    )));
                }
                (start_col, start_row)
            }
        };

        Ok(Self {
            start_col: start_col.min(end_col),
            start_row: match (start_row, end_row) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (row, _) => row,
            },
            end_col: start_col.max(end_col),
            end_row: match (start_row, end_row) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (_, row) => row,
            },
        })
    }

    /// True when the range addresses exactly one cell.
    pub fn is_single_cell(&self) -> bool {
        self.start_col == self.end_col && self.start_row.is_some() && self.start_row == self.end_row
    }

    /// First row covered by the range (1-based).
    pub fn first_row(&self) -> usize {
        self.start_row.unwrap_or(1)
    }

    /// Number of columns covered by the range.
    pub fn width(&self) -> usize {
        self.end_col - self.start_col + 1
    }
}

impl fmt::Display for A1Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let row = |r: Option<usize>| r.map(|r| r.to_string()).unwrap_or_default();
        if self.is_single_cell() {
            return write!(
                f,
                "{}{}",
                column_letters(self.start_col),
                row(self.start_row)
            );
        }
        write!(
            f,
            "{}{}:{}{}",
            column_letters(self.start_col),
            row(self.start_row),
            column_letters(self.end_col),
            row(self.end_row)
        )
    }
}

/// Split `AB12` into (column index, Some(12)); `AB` alone yields no row.
fn parse_endpoint(part: &str, expr: &str) -> KvResult<(usize, Option<usize>)> {
    let invalid = || KvError::invalid(format!("malformed range: {expr}"));

    let split = part
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(part.len());
    let (letters, digits) = part.split_at(split);
    if letters.is_empty() {
        return Err(invalid());
    }
    let col = column_index(letters)?;

    if digits.is_empty() {
        return Ok((col, None));
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let row = digits.parse::<usize>().map_err(|_| invalid())?;
    if row == 0 {
        return Err(invalid());
    }
    Ok((col, Some(row)))
}

/// Convert column letters to a 0-based column index
/// A=0, B=1, ... Z=25, AA=26, AB=27, ...
pub fn column_index(letters: &str) -> KvResult<usize> {
    if letters.is_empty() {
        return Err(KvError::invalid("empty column letters"));
    }

    let mut col = 0usize;
    for b in letters.bytes() {
        if !b.is_ascii_alphabetic() {
            return Err(KvError::invalid(format!("invalid column: {letters}")));
        }
        col = col
            .checked_mul(26)
            .and_then(|c| c.checked_add((b.to_ascii_uppercase() - b'A') as usize + 1))
            .ok_or_else(|| KvError::invalid(format!("column out of range: {letters}")))?;
    }

    Ok(col - 1)
}

/// Convert a 0-based column index to column letters
/// 0=A, 1=B, ... 25=Z, 26=AA, 27=AB, ...
pub fn column_letters(mut col: usize) -> String {
    let mut result = String::new();
    col += 1;

    while col > 0 {
        col -= 1;
        result.insert(0, ((col % 26) as u8 + b'A') as char);
        col /= 26;
    }

    result
}

/// Single-cell coordinate, e.g. `cell(1, 5)` is `B5`.
pub fn cell(col: usize, row: usize) -> String {
    format!("{}{}", column_letters(col), row)
}
