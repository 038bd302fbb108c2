//! GFF algorithm: `ModifyField`/`AddField` against a loaded field tree.
//!
//! Grounded on SPEC_FULL.md §4.6. `AddField` targets a struct (named field add) or a list
//! (unlabeled struct append); nested rows under an `AddField` are resolved by prefixing the
//! newly created node's own path onto each nested path rather than holding a live reference
//! across recursive calls, avoiding self-referential borrows.

use crate::error::{PatcherError, Result};
use crate::formats::gff::{Gff, GffNodeMut, GffStruct, GffValue, LocString};
use crate::memory::PatcherMemory;
use crate::program::{GffAddField, GffFieldType, GffFieldValue, GffModifier, GffPatch};

use super::PatchOutcome;

pub fn apply(gff: &mut Gff, patch: &GffPatch, memory: &mut PatcherMemory) -> Result<PatchOutcome> {
    for modifier in &patch.modifiers {
        apply_modifier(gff, modifier, memory)?;
    }
    Ok(PatchOutcome::Bytes(gff.save()?))
}

fn apply_modifier(gff: &mut Gff, modifier: &GffModifier, memory: &mut PatcherMemory) -> Result<()> {
    match modifier {
        GffModifier::SetField { path, value } => set_field(gff, path, value, memory),
        GffModifier::AddField(add) => add_field(gff, add, memory),
    }
}

fn set_field(gff: &mut Gff, path: &str, value: &GffFieldValue, memory: &mut PatcherMemory) -> Result<()> {
    let (parent, field) = gff.resolve_parent_mut(path)?;
    let existing = parent
        .get(&field)
        .ok_or_else(|| PatcherError::GffPathNotFound(path.to_string()))?
        .clone();
    let resolved = eval_against_existing(path, &existing, value, memory)?;
    check_type_match(path, &existing, &resolved)?;
    parent.set(field, resolved);
    Ok(())
}

fn add_field(gff: &mut Gff, add: &GffAddField, memory: &mut PatcherMemory) -> Result<()> {
    let value = build_value(add.parent_path.as_str(), add.field_type, &add.value, add.new_struct_id, memory)?;
    let new_path = match gff.resolve_node_mut(&add.parent_path)? {
        GffNodeMut::Struct(s) => {
            s.set(add.label.clone(), value);
            prefix_path(&add.parent_path, &add.label)
        }
        GffNodeMut::List(items) => {
            let GffValue::Struct(s) = value else {
                return Err(PatcherError::Other(format!(
                    "AddField into list {:?} must add a struct, not a scalar field",
                    add.parent_path
                )));
            };
            items.push(s);
            let index = items.len() - 1;
            if let Some(token) = add.index_in_list_token {
                memory.store_2da(token, index.to_string());
            }
            prefix_path(&add.parent_path, &index.to_string())
        }
    };

    for nested in &add.nested {
        apply_nested(gff, nested, &new_path, memory)?;
    }
    Ok(())
}

/// Applies a nested modifier (declared inside an `AddField`'s `nested` list) against the
/// just-created node at `new_path`, by prefixing `new_path` onto whatever path the nested
/// modifier names relative to it.
fn apply_nested(gff: &mut Gff, modifier: &GffModifier, new_path: &str, memory: &mut PatcherMemory) -> Result<()> {
    match modifier {
        GffModifier::SetField { path, value } => set_field(gff, &prefix_path(new_path, path), value, memory),
        GffModifier::AddField(add) => {
            let mut rebased = add.clone();
            rebased.parent_path = prefix_path(new_path, &add.parent_path);
            add_field(gff, &rebased, memory)
        }
    }
}

fn prefix_path(parent: &str, child: &str) -> String {
    match (parent.is_empty(), child.is_empty()) {
        (true, _) => child.to_string(),
        (false, true) => parent.to_string(),
        (false, false) => format!("{parent}/{child}"),
    }
}

fn check_type_match(path: &str, existing: &GffValue, new_value: &GffValue) -> Result<()> {
    if std::mem::discriminant(existing) != std::mem::discriminant(new_value) {
        return Err(PatcherError::GffTypeMismatch {
            path: path.to_string(),
            expected: format!("{existing:?}"),
            found: format!("{new_value:?}"),
        });
    }
    Ok(())
}

/// Resolves a `ModifyField` value against the field's current value, for type-directed
/// coercion of memory-token references and `LocalizedStringDelta` merging.
fn eval_against_existing(
    path: &str,
    existing: &GffValue,
    value: &GffFieldValue,
    memory: &PatcherMemory,
) -> Result<GffValue> {
    match value {
        GffFieldValue::Literal(v) => Ok(v.clone()),
        GffFieldValue::RawString(s) => coerce_string(path, existing, s),
        GffFieldValue::TwoDaMemoryToken(t) => coerce_string(path, existing, memory.lookup_2da(*t)?),
        GffFieldValue::StrRefMemoryToken(t) => coerce_int(path, existing, memory.lookup_str(*t)?),
        GffFieldValue::LocalizedStringDelta { string_ref, substrings } => {
            let GffValue::LocString(loc) = existing else {
                return Err(PatcherError::GffTypeMismatch {
                    path: path.to_string(),
                    expected: "LocString".to_string(),
                    found: format!("{existing:?}"),
                });
            };
            Ok(GffValue::LocString(merge_locstring(loc, *string_ref, substrings)))
        }
    }
}

/// Builds the value an `AddField` row creates: either a fresh empty `Struct`/`List` container
/// (whose contents come from nested rows), or, for scalar field types, the declared value.
fn build_value(
    parent_path: &str,
    field_type: GffFieldType,
    value: &Option<GffFieldValue>,
    new_struct_id: u32,
    memory: &PatcherMemory,
) -> Result<GffValue> {
    match field_type {
        GffFieldType::Struct => Ok(GffValue::Struct(GffStruct::new(new_struct_id))),
        GffFieldType::List => Ok(GffValue::List(Vec::new())),
        other => {
            let value = value.as_ref().ok_or_else(|| {
                PatcherError::Other(format!("AddField at {parent_path:?} has no value for scalar field {other:?}"))
            })?;
            match value {
                GffFieldValue::Literal(v) => Ok(v.clone()),
                GffFieldValue::RawString(s) => build_from_string(parent_path, other, s),
                GffFieldValue::TwoDaMemoryToken(t) => build_from_string(parent_path, other, memory.lookup_2da(*t)?),
                GffFieldValue::StrRefMemoryToken(t) => build_from_int(parent_path, other, memory.lookup_str(*t)?),
                GffFieldValue::LocalizedStringDelta { string_ref, substrings } => {
                    if other != GffFieldType::LocString {
                        return Err(PatcherError::GffTypeMismatch {
                            path: parent_path.to_string(),
                            expected: "LocString".to_string(),
                            found: format!("{other:?}"),
                        });
                    }
                    Ok(GffValue::LocString(merge_locstring(&LocString::default(), *string_ref, substrings)))
                }
            }
        }
    }
}

fn merge_locstring(existing: &LocString, string_ref: Option<i32>, substrings: &[((i32, bool), String)]) -> LocString {
    let mut merged = existing.clone();
    if let Some(sr) = string_ref {
        merged.string_ref = sr;
    }
    for (key, text) in substrings {
        merged.substrings.insert(*key, text.clone());
    }
    merged
}

fn parse_type_mismatch(path: &str, expected: &str) -> PatcherError {
    PatcherError::GffTypeMismatch { path: path.to_string(), expected: expected.to_string(), found: "String".to_string() }
}

fn coerce_string(path: &str, existing: &GffValue, s: &str) -> Result<GffValue> {
    Ok(match existing {
        GffValue::String(_) => GffValue::String(s.to_string()),
        GffValue::ResRef(_) => GffValue::ResRef(s.to_string()),
        GffValue::Byte(_) => GffValue::Byte(parse_num(path, s)?),
        GffValue::Char(_) => GffValue::Char(parse_num(path, s)?),
        GffValue::Word(_) => GffValue::Word(parse_num(path, s)?),
        GffValue::Short(_) => GffValue::Short(parse_num(path, s)?),
        GffValue::Dword(_) => GffValue::Dword(parse_num(path, s)?),
        GffValue::Int(_) => GffValue::Int(parse_num(path, s)?),
        GffValue::Dword64(_) => GffValue::Dword64(parse_num(path, s)?),
        GffValue::Int64(_) => GffValue::Int64(parse_num(path, s)?),
        GffValue::Float(_) => GffValue::Float(parse_num(path, s)?),
        GffValue::Double(_) => GffValue::Double(parse_num(path, s)?),
        _ => return Err(parse_type_mismatch(path, "String or ResRef")),
    })
}

fn coerce_int(path: &str, existing: &GffValue, n: i32) -> Result<GffValue> {
    Ok(match existing {
        GffValue::Byte(_) => GffValue::Byte(int_in_range(path, "Byte (0..=255)", n)?),
        GffValue::Char(_) => GffValue::Char(int_in_range(path, "Char (-128..=127)", n)?),
        GffValue::Word(_) => GffValue::Word(int_in_range(path, "Word (0..=65535)", n)?),
        GffValue::Short(_) => GffValue::Short(int_in_range(path, "Short (-32768..=32767)", n)?),
        GffValue::Dword(_) => GffValue::Dword(int_in_range(path, "Dword (0..=4294967295)", n)?),
        GffValue::Int(_) => GffValue::Int(n),
        GffValue::Dword64(_) => GffValue::Dword64(int_in_range(path, "Dword64 (unsigned)", n)?),
        GffValue::Int64(_) => GffValue::Int64(n as i64),
        GffValue::Float(_) => GffValue::Float(n as f32),
        GffValue::Double(_) => GffValue::Double(n as f64),
        GffValue::LocString(loc) => GffValue::LocString(LocString { string_ref: n, substrings: loc.substrings.clone() }),
        _ => return Err(parse_type_mismatch(path, "a numeric or LocString field")),
    })
}

/// Narrows a token-resolved `i32` to a smaller GFF scalar type, erroring rather than truncating
/// when the value falls outside that type's range.
fn int_in_range<T: TryFrom<i32>>(path: &str, expected: &str, n: i32) -> Result<T> {
    T::try_from(n).map_err(|_| PatcherError::GffTypeMismatch {
        path: path.to_string(),
        expected: expected.to_string(),
        found: format!("out-of-range integer {n}"),
    })
}

fn build_from_string(path: &str, field_type: GffFieldType, s: &str) -> Result<GffValue> {
    Ok(match field_type {
        GffFieldType::String => GffValue::String(s.to_string()),
        GffFieldType::ResRef => GffValue::ResRef(s.to_string()),
        GffFieldType::Byte => GffValue::Byte(parse_num(path, s)?),
        GffFieldType::Char => GffValue::Char(parse_num(path, s)?),
        GffFieldType::Word => GffValue::Word(parse_num(path, s)?),
        GffFieldType::Short => GffValue::Short(parse_num(path, s)?),
        GffFieldType::Dword => GffValue::Dword(parse_num(path, s)?),
        GffFieldType::Int => GffValue::Int(parse_num(path, s)?),
        GffFieldType::Dword64 => GffValue::Dword64(parse_num(path, s)?),
        GffFieldType::Int64 => GffValue::Int64(parse_num(path, s)?),
        GffFieldType::Float => GffValue::Float(parse_num(path, s)?),
        GffFieldType::Double => GffValue::Double(parse_num(path, s)?),
        _ => return Err(parse_type_mismatch(path, "String or ResRef")),
    })
}

fn build_from_int(path: &str, field_type: GffFieldType, n: i32) -> Result<GffValue> {
    Ok(match field_type {
        GffFieldType::Byte => GffValue::Byte(int_in_range(path, "Byte (0..=255)", n)?),
        GffFieldType::Char => GffValue::Char(int_in_range(path, "Char (-128..=127)", n)?),
        GffFieldType::Word => GffValue::Word(int_in_range(path, "Word (0..=65535)", n)?),
        GffFieldType::Short => GffValue::Short(int_in_range(path, "Short (-32768..=32767)", n)?),
        GffFieldType::Dword => GffValue::Dword(int_in_range(path, "Dword (0..=4294967295)", n)?),
        GffFieldType::Int => GffValue::Int(n),
        GffFieldType::Dword64 => GffValue::Dword64(int_in_range(path, "Dword64 (unsigned)", n)?),
        GffFieldType::Int64 => GffValue::Int64(n as i64),
        GffFieldType::Float => GffValue::Float(n as f32),
        GffFieldType::Double => GffValue::Double(n as f64),
        GffFieldType::LocString => GffValue::LocString(LocString { string_ref: n, substrings: Default::default() }),
        _ => return Err(parse_type_mismatch(path, "a numeric or LocString field")),
    })
}

fn parse_num<T: std::str::FromStr>(path: &str, s: &str) -> Result<T> {
    s.parse().map_err(|_| PatcherError::Other(format!("value {s:?} at {path:?} is not a valid number")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::PatchHeader;

    fn header() -> PatchHeader {
        PatchHeader::new("test.utc")
    }

    #[test]
    fn set_field_overwrites_matching_type() {
        let mut gff = Gff::new("UTC ");
        gff.root.set("HP", GffValue::Int(10));
        let mut memory = PatcherMemory::new();
        let patch = GffPatch {
            header: header(),
            modifiers: vec![GffModifier::SetField {
                path: "HP".to_string(),
                value: GffFieldValue::Literal(GffValue::Int(20)),
            }],
        };
        apply(&mut gff, &patch, &mut memory).unwrap();
        assert_eq!(gff.resolve_path("HP").unwrap(), &GffValue::Int(20));
    }

    #[test]
    fn set_field_type_mismatch_is_fatal() {
        let mut gff = Gff::new("UTC ");
        gff.root.set("HP", GffValue::Int(10));
        let mut memory = PatcherMemory::new();
        let patch = GffPatch {
            header: header(),
            modifiers: vec![GffModifier::SetField {
                path: "HP".to_string(),
                value: GffFieldValue::Literal(GffValue::String("oops".into())),
            }],
        };
        assert!(matches!(apply(&mut gff, &patch, &mut memory), Err(PatcherError::GffTypeMismatch { .. })));
    }

    #[test]
    fn set_field_raw_string_coerces_to_existing_numeric_type() {
        let mut gff = Gff::new("UTC ");
        gff.root.set("HP", GffValue::Int(10));
        let mut memory = PatcherMemory::new();
        let patch = GffPatch {
            header: header(),
            modifiers: vec![GffModifier::SetField {
                path: "HP".to_string(),
                value: GffFieldValue::RawString("20".to_string()),
            }],
        };
        apply(&mut gff, &patch, &mut memory).unwrap();
        assert_eq!(gff.resolve_path("HP").unwrap(), &GffValue::Int(20));
    }

    #[test]
    fn set_field_strref_token_out_of_range_for_byte_is_fatal() {
        let mut gff = Gff::new("UTC ");
        gff.root.set("FortSave", GffValue::Byte(0));
        let mut memory = PatcherMemory::new();
        memory.store_str(0, 300);
        let patch = GffPatch {
            header: header(),
            modifiers: vec![GffModifier::SetField {
                path: "FortSave".to_string(),
                value: GffFieldValue::StrRefMemoryToken(0),
            }],
        };
        let err = apply(&mut gff, &patch, &mut memory).unwrap_err();
        assert!(matches!(err, PatcherError::GffTypeMismatch { .. }));
        // must not have truncated the field in place before failing
        assert_eq!(gff.resolve_path("FortSave").unwrap(), &GffValue::Byte(0));
    }

    #[test]
    fn set_field_strref_token_in_range_for_byte_succeeds() {
        let mut gff = Gff::new("UTC ");
        gff.root.set("FortSave", GffValue::Byte(0));
        let mut memory = PatcherMemory::new();
        memory.store_str(0, 200);
        let patch = GffPatch {
            header: header(),
            modifiers: vec![GffModifier::SetField {
                path: "FortSave".to_string(),
                value: GffFieldValue::StrRefMemoryToken(0),
            }],
        };
        apply(&mut gff, &patch, &mut memory).unwrap();
        assert_eq!(gff.resolve_path("FortSave").unwrap(), &GffValue::Byte(200));
    }

    #[test]
    fn add_field_creates_new_struct_leaf() {
        let mut gff = Gff::new("UTC ");
        let mut memory = PatcherMemory::new();
        let patch = GffPatch {
            header: header(),
            modifiers: vec![GffModifier::AddField(GffAddField {
                parent_path: String::new(),
                label: "NewField".to_string(),
                field_type: GffFieldType::Struct,
                value: None,
                nested: Vec::new(),
                index_in_list_token: None,
                new_struct_id: 3,
            })],
        };
        apply(&mut gff, &patch, &mut memory).unwrap();
        match gff.resolve_path("NewField").unwrap() {
            GffValue::Struct(s) => assert_eq!(s.struct_id, 3),
            other => panic!("expected Struct, got {other:?}"),
        }
    }

    #[test]
    fn add_field_into_list_appends_struct_and_stores_index() {
        let mut gff = Gff::new("UTC ");
        gff.root.set("EntryList", GffValue::List(vec![GffStruct::new(1), GffStruct::new(1), GffStruct::new(1)]));
        let mut memory = PatcherMemory::new();
        let patch = GffPatch {
            header: header(),
            modifiers: vec![GffModifier::AddField(GffAddField {
                parent_path: "EntryList".to_string(),
                label: String::new(),
                field_type: GffFieldType::Struct,
                value: None,
                nested: vec![GffModifier::SetField {
                    path: "Value".to_string(),
                    value: GffFieldValue::Literal(GffValue::Int(0)),
                }]
                .into_iter()
                .map(|_| GffModifier::AddField(GffAddField {
                    parent_path: String::new(),
                    label: "Value".to_string(),
                    field_type: GffFieldType::Int,
                    value: Some(GffFieldValue::Literal(GffValue::Int(42))),
                    nested: Vec::new(),
                    index_in_list_token: None,
                    new_struct_id: 0,
                }))
                .collect(),
                index_in_list_token: Some(7),
                new_struct_id: 5,
            })],
        };
        apply(&mut gff, &patch, &mut memory).unwrap();
        assert_eq!(memory.lookup_2da(7).unwrap(), "3");
        match gff.resolve_path("EntryList/3/Value").unwrap() {
            GffValue::Int(v) => assert_eq!(*v, 42),
            other => panic!("expected Int, got {other:?}"),
        }
        match gff.resolve_path("EntryList/3").unwrap() {
            GffValue::Struct(s) => assert_eq!(s.struct_id, 5),
            other => panic!("expected Struct, got {other:?}"),
        }
    }

    #[test]
    fn localized_string_delta_keeps_unreferenced_substrings() {
        let mut gff = Gff::new("UTC ");
        let mut loc = LocString::default();
        loc.string_ref = -1;
        loc.substrings.insert((0, false), "Hello".into());
        loc.substrings.insert((0, true), "Hello (f)".into());
        gff.root.set("Name", GffValue::LocString(loc));

        let mut memory = PatcherMemory::new();
        let patch = GffPatch {
            header: header(),
            modifiers: vec![GffModifier::SetField {
                path: "Name".to_string(),
                value: GffFieldValue::LocalizedStringDelta {
                    string_ref: None,
                    substrings: vec![((0, false), "Bonjour".into())],
                },
            }],
        };
        apply(&mut gff, &patch, &mut memory).unwrap();
        match gff.resolve_path("Name").unwrap() {
            GffValue::LocString(l) => {
                assert_eq!(l.substrings.get(&(0, false)).unwrap(), "Bonjour");
                assert_eq!(l.substrings.get(&(0, true)).unwrap(), "Hello (f)");
                assert_eq!(l.string_ref, -1);
            }
            other => panic!("expected LocString, got {other:?}"),
        }
    }
}
