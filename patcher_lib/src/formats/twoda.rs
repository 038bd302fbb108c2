//! 2-D array: a table of named columns over rows, each row carrying a string label.
//!
//! **Binary layout** (little-endian; this crate's own scheme — see `formats::mod` doc):
//!
//! | Field | Size | Notes |
//! |---|---|---|
//! | `file_type` | 4 bytes | ASCII `"2DA "` |
//! | `file_version` | 4 bytes | ASCII `"V2.0"` |
//! | `column_count` | u32 | |
//! | columns | repeated | u32 length + UTF-8 bytes, once per column |
//! | `row_count` | u32 | |
//! | row labels | repeated | u32 length + UTF-8 bytes, once per row |
//! | cells | `row_count * column_count` | u32 length + UTF-8 bytes, row-major; an empty cell
//! |       |                            | (the `****` sentinel) is encoded as length `u32::MAX` |
//!
//! Grounded on `files/table/mod.rs`'s `Table` (named columns over rows) for the overall shape;
//! the real game's 2DA column-offset-table scheme is not reproduced since SPEC_FULL.md §1 marks
//! container byte layout opaque.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read};

use crate::error::{PatcherError, Result};

pub const FILE_TYPE: &[u8; 4] = b"2DA ";
pub const FILE_VERSION: &[u8; 4] = b"V2.0";

/// Marker length used to encode an empty (`****`) cell distinctly from an empty string.
const EMPTY_CELL: u32 = u32::MAX;

#[derive(Debug, Clone, Default)]
pub struct TwoDa {
    columns: Vec<String>,
    row_labels: Vec<String>,
    /// `cells[row][column]`; `None` is the `****` sentinel, distinct from `Some(String::new())`.
    cells: Vec<Vec<Option<String>>>,
}

impl TwoDa {
    pub fn new(columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        TwoDa {
            columns: columns.into_iter().map(Into::into).collect(),
            row_labels: Vec::new(),
            cells: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_labels(&self) -> &[String] {
        &self.row_labels
    }

    pub fn row_count(&self) -> usize {
        self.cells.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    pub fn row_index_by_label(&self, label: &str) -> Option<usize> {
        self.row_labels.iter().position(|l| l == label)
    }

    /// Appends a column of empty cells, returning its index. A no-op (returns the existing
    /// index) if the column already exists, matching `AddColumn`'s idempotence.
    pub fn add_column(&mut self, name: impl Into<String>) -> usize {
        let name = name.into();
        if let Some(idx) = self.column_index(&name) {
            return idx;
        }
        self.columns.push(name);
        for row in &mut self.cells {
            row.push(None);
        }
        self.columns.len() - 1
    }

    /// Appends a row with every cell set to the `****` sentinel, returning its index.
    pub fn add_row(&mut self, label: impl Into<String>) -> usize {
        self.row_labels.push(label.into());
        self.cells.push(vec![None; self.columns.len()]);
        self.cells.len() - 1
    }

    pub fn cell(&self, row: usize, column: usize) -> Result<Option<&str>> {
        let row_cells = self
            .cells
            .get(row)
            .ok_or_else(|| PatcherError::TwoDaTargetNotFound(format!("row {row}")))?;
        let value = row_cells
            .get(column)
            .ok_or_else(|| PatcherError::TwoDaTargetNotFound(format!("column {column}")))?;
        Ok(value.as_deref())
    }

    pub fn set_cell(&mut self, row: usize, column: usize, value: Option<String>) -> Result<()> {
        let row_cells = self
            .cells
            .get_mut(row)
            .ok_or_else(|| PatcherError::TwoDaTargetNotFound(format!("row {row}")))?;
        let slot = row_cells
            .get_mut(column)
            .ok_or_else(|| PatcherError::TwoDaTargetNotFound(format!("column {column}")))?;
        *slot = value;
        Ok(())
    }

    pub fn set_row_label(&mut self, row: usize, label: impl Into<String>) -> Result<()> {
        let slot = self
            .row_labels
            .get_mut(row)
            .ok_or_else(|| PatcherError::TwoDaTargetNotFound(format!("row {row}")))?;
        *slot = label.into();
        Ok(())
    }

    pub fn load(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let mut file_type = [0u8; 4];
        let mut file_version = [0u8; 4];
        cursor.read_exact(&mut file_type)?;
        cursor.read_exact(&mut file_version)?;
        if &file_type != FILE_TYPE || &file_version != FILE_VERSION {
            return Err(PatcherError::Other(format!(
                "not a recognized 2DA file (saw {:?} {:?})",
                String::from_utf8_lossy(&file_type),
                String::from_utf8_lossy(&file_version)
            )));
        }

        let column_count = cursor.read_u32::<LittleEndian>()? as usize;
        let mut columns = Vec::with_capacity(column_count);
        for _ in 0..column_count {
            columns.push(read_string(&mut cursor)?);
        }

        let row_count = cursor.read_u32::<LittleEndian>()? as usize;
        let mut row_labels = Vec::with_capacity(row_count);
        for _ in 0..row_count {
            row_labels.push(read_string(&mut cursor)?);
        }

        let mut cells = Vec::with_capacity(row_count);
        for _ in 0..row_count {
            let mut row = Vec::with_capacity(column_count);
            for _ in 0..column_count {
                row.push(read_cell(&mut cursor)?);
            }
            cells.push(row);
        }

        Ok(TwoDa { columns, row_labels, cells })
    }

    pub fn save(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        out.extend_from_slice(FILE_TYPE);
        out.extend_from_slice(FILE_VERSION);

        out.write_u32::<LittleEndian>(self.columns.len() as u32)?;
        for column in &self.columns {
            write_string(&mut out, column)?;
        }

        out.write_u32::<LittleEndian>(self.row_labels.len() as u32)?;
        for label in &self.row_labels {
            write_string(&mut out, label)?;
        }

        for row in &self.cells {
            for cell in row {
                write_cell(&mut out, cell.as_deref())?;
            }
        }

        Ok(out)
    }
}

fn read_string(cursor: &mut Cursor<&[u8]>) -> Result<String> {
    let len = cursor.read_u32::<LittleEndian>()? as usize;
    let mut buf = vec![0u8; len];
    cursor.read_exact(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn write_string(out: &mut Vec<u8>, s: &str) -> Result<()> {
    out.write_u32::<LittleEndian>(s.len() as u32)?;
    out.extend_from_slice(s.as_bytes());
    Ok(())
}

fn read_cell(cursor: &mut Cursor<&[u8]>) -> Result<Option<String>> {
    let len = cursor.read_u32::<LittleEndian>()?;
    if len == EMPTY_CELL {
        return Ok(None);
    }
    let mut buf = vec![0u8; len as usize];
    cursor.read_exact(&mut buf)?;
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

fn write_cell(out: &mut Vec<u8>, cell: Option<&str>) -> Result<()> {
    match cell {
        None => out.write_u32::<LittleEndian>(EMPTY_CELL)?,
        Some(s) => write_string(out, s)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_save_and_load() {
        let mut table = TwoDa::new(["label", "value"]);
        table.add_row("0");
        table.set_cell(0, 0, Some("first".into())).unwrap();
        table.set_cell(0, 1, None).unwrap();
        let bytes = table.save().unwrap();
        let loaded = TwoDa::load(&bytes).unwrap();
        assert_eq!(loaded.cell(0, 0).unwrap(), Some("first"));
        assert_eq!(loaded.cell(0, 1).unwrap(), None);
    }

    #[test]
    fn add_column_is_idempotent_and_backfills_existing_rows() {
        let mut table = TwoDa::new(["a"]);
        table.add_row("0");
        let idx1 = table.add_column("b");
        let idx2 = table.add_column("b");
        assert_eq!(idx1, idx2);
        assert_eq!(table.cell(0, idx1).unwrap(), None);
    }

    #[test]
    fn row_lookup_by_label() {
        let mut table = TwoDa::new(["a"]);
        table.add_row("42");
        assert_eq!(table.row_index_by_label("42"), Some(0));
        assert_eq!(table.row_index_by_label("missing"), None);
    }
}
