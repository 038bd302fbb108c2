//! 2DA algorithm: `ChangeRow`/`AddRow`/`CopyRow`/`AddColumn` against a loaded table.
//!
//! Grounded on SPEC_FULL.md §4.5 directly (row-target resolution, `RowValue` evaluation table
//! including `High()`, declaration-order tie-break for repeated `ChangeRow` targets, and the
//! post-edit `store_2da`/`store_tlk` token-write step).

use crate::error::{PatcherError, Result};
use crate::formats::twoda::TwoDa;
use crate::memory::PatcherMemory;
use crate::program::{RowTarget, RowValue, TwoDaModifier, TwoDaPatch};

use super::PatchOutcome;

pub fn apply(table: &mut TwoDa, patch: &TwoDaPatch, memory: &mut PatcherMemory) -> Result<PatchOutcome> {
    for modifier in &patch.modifiers {
        apply_modifier(table, modifier, memory)?;
    }
    Ok(PatchOutcome::Bytes(table.save()?))
}

fn apply_modifier(table: &mut TwoDa, modifier: &TwoDaModifier, memory: &mut PatcherMemory) -> Result<()> {
    match modifier {
        TwoDaModifier::ChangeRow { target, cells, store_2da, store_tlk } => {
            let row = resolve_target(table, target)?;
            apply_cells(table, row, cells, memory)?;
            apply_stores(table, row, store_2da, store_tlk, memory)?;
        }
        TwoDaModifier::AddRow { row_label, exclusive_column, cells, store_2da, store_tlk } => {
            let collapse_row = find_exclusive_collision(table, exclusive_column.as_deref(), table.row_count(), cells, memory)?;
            let row = match collapse_row {
                Some(r) => r,
                None => {
                    let label = match row_label {
                        Some(v) => eval(table, table.row_count(), v, memory)?.unwrap_or_default(),
                        None => table.row_count().to_string(),
                    };
                    table.add_row(label)
                }
            };
            apply_cells(table, row, cells, memory)?;
            apply_stores(table, row, store_2da, store_tlk, memory)?;
        }
        TwoDaModifier::CopyRow { source, new_row_label, exclusive_column, cells, store_2da, store_tlk } => {
            let source_row = resolve_target(table, source)?;

            let collapse_row =
                find_exclusive_collision(table, exclusive_column.as_deref(), source_row, cells, memory)?;

            let row = match collapse_row {
                Some(r) => r,
                None => {
                    let label = match new_row_label {
                        Some(v) => eval(table, source_row, v, memory)?.unwrap_or_default(),
                        None => table.row_count().to_string(),
                    };
                    let new_row = table.add_row(label);
                    for col in 0..table.columns().len() {
                        let value = table.cell(source_row, col)?.map(str::to_string);
                        table.set_cell(new_row, col, value)?;
                    }
                    new_row
                }
            };
            apply_cells(table, row, cells, memory)?;
            apply_stores(table, row, store_2da, store_tlk, memory)?;
        }
        TwoDaModifier::AddColumn { column, default, index_insert, label_insert, store_2da, store_tlk } => {
            let col = table.add_column(column.clone());
            let default_value = eval(table, 0, default, memory)?;
            for row in 0..table.row_count() {
                table.set_cell(row, col, default_value.clone())?;
            }
            for (row, value) in index_insert {
                if *row >= table.row_count() {
                    return Err(PatcherError::TwoDaTargetNotFound(format!("row index {row}")));
                }
                let resolved = eval(table, *row, value, memory)?;
                table.set_cell(*row, col, resolved)?;
            }
            for (label, value) in label_insert {
                let row = table
                    .row_index_by_label(label)
                    .ok_or_else(|| PatcherError::TwoDaTargetNotFound(label.clone()))?;
                let resolved = eval(table, row, value, memory)?;
                table.set_cell(row, col, resolved)?;
            }
            // §4.5: stores for `AddColumn` evaluate once against the default row context (row 0).
            apply_stores(table, 0, store_2da, store_tlk, memory)?;
        }
    }
    Ok(())
}

/// `AddRow`/`CopyRow`'s `exclusive_column` collapse check: if `column` is set and some existing
/// row already carries the new row's value for it, that row's index is returned so the caller
/// applies its cell edits as a `ChangeRow` instead of appending a duplicate.
fn find_exclusive_collision(
    table: &TwoDa,
    column: Option<&str>,
    context_row: usize,
    cells: &[(String, RowValue)],
    memory: &PatcherMemory,
) -> Result<Option<usize>> {
    let Some(col_name) = column else { return Ok(None) };
    let col = table
        .column_index(col_name)
        .ok_or_else(|| PatcherError::TwoDaTargetNotFound(col_name.to_string()))?;
    let new_value = cells
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(col_name))
        .map(|(_, v)| eval(table, context_row, v, memory))
        .transpose()?
        .flatten();
    Ok(new_value
        .and_then(|value| (0..table.row_count()).find(|&r| table.cell(r, col).ok().flatten() == Some(value.as_str()))))
}

fn resolve_target(table: &TwoDa, target: &RowTarget) -> Result<usize> {
    match target {
        RowTarget::Index(i) => {
            if *i >= table.row_count() {
                return Err(PatcherError::TwoDaTargetNotFound(format!("row index {i}")));
            }
            Ok(*i)
        }
        RowTarget::Label(label) => table
            .row_index_by_label(label)
            .ok_or_else(|| PatcherError::TwoDaTargetNotFound(label.clone())),
        RowTarget::ColumnValue { column, value } => {
            let col = table
                .column_index(column)
                .ok_or_else(|| PatcherError::TwoDaTargetNotFound(column.clone()))?;
            let matches: Vec<usize> = (0..table.row_count())
                .filter(|&r| table.cell(r, col).ok().flatten() == Some(value.as_str()))
                .collect();
            match matches.len() {
                1 => Ok(matches[0]),
                0 => Err(PatcherError::TwoDaTargetNotFound(format!("{column}={value}"))),
                n => Err(PatcherError::TwoDaTargetAmbiguous(format!("{column}={value}"), n)),
            }
        }
    }
}

fn apply_cells(
    table: &mut TwoDa,
    row: usize,
    cells: &[(String, RowValue)],
    memory: &mut PatcherMemory,
) -> Result<()> {
    for (column, value) in cells {
        let col = table.add_column(column.clone());
        let resolved = eval(table, row, value, memory)?;
        table.set_cell(row, col, resolved)?;
    }
    Ok(())
}

/// Runs the post-edit `store_2da`/`store_tlk` writes, each re-evaluated against the row that was
/// just edited so `RowCell`/`RowIndex`/`RowLabel` references see the final cell contents.
fn apply_stores(
    table: &TwoDa,
    row: usize,
    store_2da: &[(i32, RowValue)],
    store_tlk: &[(i32, RowValue)],
    memory: &mut PatcherMemory,
) -> Result<()> {
    for (token, value) in store_2da {
        let resolved = eval(table, row, value, memory)?.unwrap_or_default();
        memory.store_2da(*token, resolved);
    }
    for (token, value) in store_tlk {
        let resolved = eval(table, row, value, memory)?.unwrap_or_default();
        let parsed: i32 = resolved
            .parse()
            .map_err(|_| PatcherError::Other(format!("store_tlk value {resolved:?} is not an integer")))?;
        memory.store_str(*token, parsed);
    }
    Ok(())
}

/// Evaluates a [`RowValue`] against `row`, per §4.5's evaluation table. `Constant("****")` and
/// any `None` column lookup resolve to `None`, the `****` empty-cell sentinel.
fn eval(table: &TwoDa, row: usize, value: &RowValue, memory: &PatcherMemory) -> Result<Option<String>> {
    Ok(match value {
        RowValue::Constant(s) if s == "****" => None,
        RowValue::Constant(s) => Some(s.clone()),
        RowValue::Mem2Da(t) => Some(memory.lookup_2da(*t)?.to_string()),
        RowValue::MemStr(t) => Some(memory.lookup_str(*t)?.to_string()),
        RowValue::High(column) => {
            let col = table
                .column_index(column)
                .ok_or_else(|| PatcherError::TwoDaTargetNotFound(column.clone()))?;
            let max = (0..table.row_count())
                .filter_map(|r| table.cell(r, col).ok().flatten())
                .filter_map(|cell| cell.parse::<i64>().ok())
                .max();
            Some(max.map(|m| m + 1).unwrap_or(0).to_string())
        }
        RowValue::RowIndex => Some(row.to_string()),
        RowValue::RowLabel => Some(table.row_labels().get(row).cloned().unwrap_or_default()),
        RowValue::RowCell(column) => {
            let col = table
                .column_index(column)
                .ok_or_else(|| PatcherError::TwoDaTargetNotFound(column.clone()))?;
            table.cell(row, col)?.map(str::to_string)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::PatchHeader;

    fn header() -> PatchHeader {
        PatchHeader::new("test.2da")
    }

    fn empty_stores() -> (Vec<(i32, RowValue)>, Vec<(i32, RowValue)>) {
        (Vec::new(), Vec::new())
    }

    #[test]
    fn change_row_by_index_overwrites_cell() {
        let mut table = TwoDa::new(["label", "value"]);
        table.add_row("0");
        table.set_cell(0, 1, Some("old".into())).unwrap();
        let mut memory = PatcherMemory::new();
        let (store_2da, store_tlk) = empty_stores();
        let patch = TwoDaPatch {
            header: header(),
            modifiers: vec![TwoDaModifier::ChangeRow {
                target: RowTarget::Index(0),
                cells: vec![("value".to_string(), RowValue::Constant("new".into()))],
                store_2da,
                store_tlk,
            }],
        };
        apply(&mut table, &patch, &mut memory).unwrap();
        assert_eq!(table.cell(0, 1).unwrap(), Some("new"));
    }

    #[test]
    fn add_row_uses_index_as_label_when_unspecified() {
        let mut table = TwoDa::new(["value"]);
        let mut memory = PatcherMemory::new();
        let (store_2da, store_tlk) = empty_stores();
        let patch = TwoDaPatch {
            header: header(),
            modifiers: vec![TwoDaModifier::AddRow {
                row_label: None,
                exclusive_column: None,
                cells: vec![("value".to_string(), RowValue::Constant("x".into()))],
                store_2da,
                store_tlk,
            }],
        };
        apply(&mut table, &patch, &mut memory).unwrap();
        assert_eq!(table.row_labels(), ["0"]);
    }

    #[test]
    fn column_value_lookup_with_multiple_matches_is_ambiguous() {
        let mut table = TwoDa::new(["key"]);
        table.add_row("0");
        table.set_cell(0, 0, Some("dup".into())).unwrap();
        table.add_row("1");
        table.set_cell(1, 0, Some("dup".into())).unwrap();
        let target = RowTarget::ColumnValue { column: "key".into(), value: "dup".into() };
        assert!(matches!(resolve_target(&table, &target), Err(PatcherError::TwoDaTargetAmbiguous(_, 2))));
    }

    #[test]
    fn repeated_change_row_modifiers_layer_last_writer_wins() {
        let mut table = TwoDa::new(["a", "b"]);
        table.add_row("0");
        let mut memory = PatcherMemory::new();
        let (s1t, s1k) = empty_stores();
        let (s2t, s2k) = empty_stores();
        let patch = TwoDaPatch {
            header: header(),
            modifiers: vec![
                TwoDaModifier::ChangeRow {
                    target: RowTarget::Index(0),
                    cells: vec![("a".to_string(), RowValue::Constant("1".into()))],
                    store_2da: s1t,
                    store_tlk: s1k,
                },
                TwoDaModifier::ChangeRow {
                    target: RowTarget::Index(0),
                    cells: vec![("b".to_string(), RowValue::Constant("2".into()))],
                    store_2da: s2t,
                    store_tlk: s2k,
                },
            ],
        };
        apply(&mut table, &patch, &mut memory).unwrap();
        assert_eq!(table.cell(0, 0).unwrap(), Some("1"));
        assert_eq!(table.cell(0, 1).unwrap(), Some("2"));
    }

    #[test]
    fn high_returns_one_past_max_numeric_cell_ignoring_empties() {
        let mut table = TwoDa::new(["id"]);
        table.add_row("0");
        table.set_cell(0, 0, Some("3".into())).unwrap();
        table.add_row("1");
        table.set_cell(1, 0, None).unwrap();
        table.add_row("2");
        table.set_cell(2, 0, Some("7".into())).unwrap();
        let mut memory = PatcherMemory::new();
        let (store_2da, store_tlk) = empty_stores();
        let patch = TwoDaPatch {
            header: header(),
            modifiers: vec![TwoDaModifier::AddRow {
                row_label: None,
                exclusive_column: None,
                cells: vec![("id".to_string(), RowValue::High("id".to_string()))],
                store_2da,
                store_tlk,
            }],
        };
        apply(&mut table, &patch, &mut memory).unwrap();
        assert_eq!(table.cell(3, 0).unwrap(), Some("8"));
    }

    #[test]
    fn high_on_empty_column_is_zero() {
        let mut table = TwoDa::new(["id"]);
        table.add_row("0");
        let mut memory = PatcherMemory::new();
        let (store_2da, store_tlk) = empty_stores();
        let patch = TwoDaPatch {
            header: header(),
            modifiers: vec![TwoDaModifier::ChangeRow {
                target: RowTarget::Index(0),
                cells: vec![("id".to_string(), RowValue::High("id".to_string()))],
                store_2da,
                store_tlk,
            }],
        };
        apply(&mut table, &patch, &mut memory).unwrap();
        assert_eq!(table.cell(0, 0).unwrap(), Some("0"));
    }

    #[test]
    fn store_2da_writes_row_label_after_add_row() {
        let mut table = TwoDa::new(["value"]);
        let mut memory = PatcherMemory::new();
        let patch = TwoDaPatch {
            header: header(),
            modifiers: vec![TwoDaModifier::AddRow {
                row_label: None,
                exclusive_column: None,
                cells: vec![("value".to_string(), RowValue::Constant("x".into()))],
                store_2da: vec![(7, RowValue::RowLabel)],
                store_tlk: Vec::new(),
            }],
        };
        apply(&mut table, &patch, &mut memory).unwrap();
        assert_eq!(memory.lookup_2da(7).unwrap(), "0");
    }

    #[test]
    fn add_row_with_exclusive_column_collision_collapses_into_change_row() {
        let mut table = TwoDa::new(["label", "value"]);
        table.add_row("0");
        table.set_cell(0, 0, Some("feat_power_attack".into())).unwrap();
        table.set_cell(0, 1, Some("old".into())).unwrap();
        let mut memory = PatcherMemory::new();
        let (store_2da, store_tlk) = empty_stores();
        let patch = TwoDaPatch {
            header: header(),
            modifiers: vec![TwoDaModifier::AddRow {
                row_label: None,
                exclusive_column: Some("label".to_string()),
                cells: vec![
                    ("label".to_string(), RowValue::Constant("feat_power_attack".into())),
                    ("value".to_string(), RowValue::Constant("new".into())),
                ],
                store_2da,
                store_tlk,
            }],
        };
        apply(&mut table, &patch, &mut memory).unwrap();
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.cell(0, 1).unwrap(), Some("new"));
    }

    #[test]
    fn add_row_with_exclusive_column_no_collision_appends_new_row() {
        let mut table = TwoDa::new(["label", "value"]);
        table.add_row("0");
        table.set_cell(0, 0, Some("feat_power_attack".into())).unwrap();
        let mut memory = PatcherMemory::new();
        let (store_2da, store_tlk) = empty_stores();
        let patch = TwoDaPatch {
            header: header(),
            modifiers: vec![TwoDaModifier::AddRow {
                row_label: None,
                exclusive_column: Some("label".to_string()),
                cells: vec![
                    ("label".to_string(), RowValue::Constant("feat_power_blast".into())),
                    ("value".to_string(), RowValue::Constant("new".into())),
                ],
                store_2da,
                store_tlk,
            }],
        };
        apply(&mut table, &patch, &mut memory).unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.cell(1, 1).unwrap(), Some("new"));
    }
}
