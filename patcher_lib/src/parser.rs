//! Turns a parsed [`RawIni`] (a `changes.ini`) into a [`PatchProgram`].
//!
//! One function per top-level list section, grounded on
//! `original_source/.../reader.py::ConfigReader`'s `load_settings`/`load_filelist`/
//! `load_tlk_list`/`load_2da`/`load_ssf`/`load_gff`/`load_nss` family. Each patch kind's
//! per-row-modifier sections are keyed by the list section's own entries (`Table0=appearance.2da`
//! names a section `[appearance.2da]`, whose entries in turn name further per-modifier sections),
//! matching the original's two-level indirection.

use crate::error::{PatcherError, Result};
use crate::formats::ssf::SSFSound;
use crate::ini::RawIni;
use crate::program::{
    GffAddField, GffFieldType, GffFieldValue, GffModifier, GffPatch, HackPatch, HackValue, HackWidth, HackWrite,
    InstallFilePatch, NssPatch, PatchHeader, PatchProgram, PatchSettings, RowTarget, RowValue, SsfPatch, SsfValue,
    SsfWrite, TlkPatch, TwoDaModifier, TwoDaPatch,
};

pub fn parse(ini: &RawIni) -> Result<PatchProgram> {
    let mut program = PatchProgram::new();
    *program.settings_mut() = load_settings(ini);
    *program.install_mut() = load_install_list(ini)?;
    *program.tlk_mut() = load_tlk_list(ini)?;
    *program.two_da_mut() = load_two_da_list(ini)?;
    *program.gff_mut() = load_gff_list(ini)?;
    *program.hack_mut() = load_hack_list(ini)?;
    *program.nss_mut() = load_nss_list(ini)?;
    *program.ssf_mut() = load_ssf_list(ini)?;
    Ok(program)
}

fn load_settings(ini: &RawIni) -> PatchSettings {
    let mut settings = PatchSettings::default();
    let Some(entries) = ini.section("Settings") else { return settings };

    for entry in entries {
        let Some(value) = entry.value.as_deref() else { continue };
        match entry.key.as_str() {
            "WindowCaption" => settings.set_window_caption(value.to_string()),
            "ConfirmMessage" => settings.set_confirm_message(value.to_string()),
            "LookupGameNumber" => {
                let game = match value.trim() {
                    "1" => Some(crate::path::GameNumber::One),
                    "2" => Some(crate::path::GameNumber::Two),
                    _ => None,
                };
                settings.set_lookup_game_number(game)
            }
            "Required" => settings.set_required_file(Some(value.to_string())),
            "RequiredMsg" => settings.set_required_message(Some(value.to_string())),
            "IgnoreExtensions" => {
                let list = value.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
                settings.set_ignore_file_extensions(list)
            }
            "LogLevel" => {
                let level = match value.trim() {
                    "0" => crate::logger::LogLevel::Nothing,
                    "1" => crate::logger::LogLevel::General,
                    "2" => crate::logger::LogLevel::Errors,
                    "3" => crate::logger::LogLevel::Warnings,
                    _ => crate::logger::LogLevel::Full,
                };
                settings.set_log_level(Some(level))
            }
            "SaveProcessedScripts" => settings.set_save_processed_scripts(value.trim() != "0"),
            _ => {}
        };
    }
    settings
}

/// `[InstallList]` names destination folders; each destination's own section lists files to
/// copy there, one per key, with the `replace`-prefix convention distinguishing overwrite from
/// skip-if-present (`bar.uti` installs only if absent, `replacebar.uti` always overwrites).
fn load_install_list(ini: &RawIni) -> Result<Vec<InstallFilePatch>> {
    let Some(folders) = ini.section("InstallList") else { return Ok(Vec::new()) };

    let mut patches = Vec::new();
    for folder_entry in folders {
        let Some(destination) = folder_entry.value.as_deref() else { continue };
        let Some(files) = ini.section(destination) else { continue };

        for file_entry in files {
            let (source_file, replace_existing) = match strip_prefix_ci(&file_entry.key, "replace") {
                Some(rest) if !rest.is_empty() => (rest.to_string(), true),
                _ => (file_entry.key.clone(), false),
            };
            let mut header = PatchHeader::new(source_file);
            header.set_destination(destination.to_string());
            header.set_replace_existing(replace_existing);
            header.set_skip_if_not_replace(!replace_existing);
            if let Some(save_as) = file_entry.value.as_deref().filter(|v| !v.is_empty()) {
                header.set_save_as(save_as.to_string());
            }
            patches.push(InstallFilePatch { header });
        }
    }
    Ok(patches)
}

/// Only the inline `<token>\Text=`/`<token>\Sound=` (or `/`-separated) syntax and the
/// `StrRef<n>=<text>` literal-replace shorthand are supported. The legacy `File<n>=<tlkfile>`
/// companion-section form requires reading a second TLK-formatted file at parse time to resolve
/// per-entry text, which sits outside what a pure instruction-file parser can do without
/// filesystem access it isn't given; instruction files relying on it are rejected rather than
/// silently mis-installed.
fn load_tlk_list(ini: &RawIni) -> Result<Vec<TlkPatch>> {
    let Some(entries) = ini.section("TLKList") else { return Ok(Vec::new()) };

    let mut inline: std::collections::BTreeMap<i32, (Option<String>, Option<String>)> = Default::default();
    let mut replacements = Vec::new();

    for entry in entries {
        let key = entry.key.trim();
        if let Some(rest) = strip_prefix_ci(key, "File") {
            if rest.chars().all(|c| c.is_ascii_digit()) && !rest.is_empty() {
                return Err(PatcherError::UnsupportedKeyInSection {
                    section: "TLKList".to_string(),
                    key: entry.key.clone(),
                });
            }
        }
        if let Some(rest) = strip_prefix_ci(key, "StrRef") {
            if let Ok(token) = rest.parse::<i32>() {
                let text = entry.value.clone().unwrap_or_default();
                replacements.push(TlkPatch { token, text: Some(text), sound: None, is_replacement: true });
                continue;
            }
        }

        let (token_part, field) = match key.rsplit_once(['\\', '/']) {
            Some((t, f)) => (t, f),
            None => continue,
        };
        let Ok(token) = token_part.parse::<i32>() else { continue };
        let slot = inline.entry(token).or_default();
        if field.eq_ignore_ascii_case("Text") {
            slot.0 = entry.value.clone();
        } else if field.eq_ignore_ascii_case("Sound") {
            slot.1 = entry.value.clone();
        }
    }

    let mut patches = replacements;
    for (token, (text, sound)) in inline {
        patches.push(TlkPatch { token, text, sound, is_replacement: false });
    }
    Ok(patches)
}

fn load_two_da_list(ini: &RawIni) -> Result<Vec<TwoDaPatch>> {
    let Some(tables) = ini.section("2DAList") else { return Ok(Vec::new()) };

    let mut patches = Vec::new();
    for entry in tables {
        let Some(filename) = entry.value.as_deref() else { continue };
        let Some(file_section) = ini.section(filename) else { continue };

        let mut modifiers = Vec::new();
        for modifier_entry in file_section {
            let Some(section_name) = modifier_entry.value.as_deref() else { continue };
            let kind = modifier_entry.key.as_str();
            if strip_digits_prefix(kind, "ChangeRow").is_some() {
                modifiers.push(parse_change_row(ini, section_name)?);
            } else if strip_digits_prefix(kind, "AddRow").is_some() {
                modifiers.push(parse_add_row(ini, section_name)?);
            } else if strip_digits_prefix(kind, "CopyRow").is_some() {
                modifiers.push(parse_copy_row(ini, section_name)?);
            } else if strip_digits_prefix(kind, "AddColumn").is_some() {
                modifiers.push(parse_add_column(ini, section_name)?);
            }
        }

        let mut header = PatchHeader::new(filename.to_string());
        header.set_destination("Override".to_string());
        patches.push(TwoDaPatch { header, modifiers });
    }
    Ok(patches)
}

fn parse_change_row(ini: &RawIni, section: &str) -> Result<TwoDaModifier> {
    let entries = ini.section(section).ok_or_else(|| PatcherError::MissingIniHeader { name: section.to_string() })?;
    let mut target = None;
    let mut cells = Vec::new();
    let mut store_2da = Vec::new();
    let mut store_tlk = Vec::new();

    for entry in entries {
        let Some(value) = entry.value.as_deref() else { continue };
        match classify_row_key(&entry.key) {
            RowKey::RowIndex => target = Some(RowTarget::Index(value.parse().map_err(|_| invalid_key(section, &entry.key))?)),
            RowKey::RowLabel => target = Some(RowTarget::Label(value.to_string())),
            RowKey::Store2Da(token) => store_2da.push((token, parse_store_value(value))),
            RowKey::StoreTlk(token) => store_tlk.push((token, parse_store_value(value))),
            RowKey::Other => {
                if target.is_none() {
                    target = Some(RowTarget::ColumnValue { column: entry.key.clone(), value: value.to_string() });
                } else {
                    cells.push((entry.key.clone(), parse_cell_value(value, &entry.key)));
                }
            }
        }
    }

    let target = target.ok_or_else(|| PatcherError::InvalidKeySyntax {
        section: section.to_string(),
        key: "RowIndex/RowLabel".to_string(),
        reason: "ChangeRow section names no target row".to_string(),
    })?;
    Ok(TwoDaModifier::ChangeRow { target, cells, store_2da, store_tlk })
}

fn parse_add_row(ini: &RawIni, section: &str) -> Result<TwoDaModifier> {
    let entries = ini.section(section).ok_or_else(|| PatcherError::MissingIniHeader { name: section.to_string() })?;
    let mut row_label = None;
    let mut exclusive_column = None;
    let mut cells = Vec::new();
    let mut store_2da = Vec::new();
    let mut store_tlk = Vec::new();

    for entry in entries {
        let Some(value) = entry.value.as_deref() else { continue };
        if entry.key.eq_ignore_ascii_case("ExclusiveColumn") {
            exclusive_column = Some(value.to_string());
            continue;
        }
        match classify_row_key(&entry.key) {
            RowKey::RowLabel => row_label = Some(parse_cell_value(value, "RowLabel")),
            RowKey::RowIndex => {} // AddRow always appends; an explicit index has no meaning here.
            RowKey::Store2Da(token) => store_2da.push((token, parse_store_value(value))),
            RowKey::StoreTlk(token) => store_tlk.push((token, parse_store_value(value))),
            RowKey::Other => cells.push((entry.key.clone(), parse_cell_value(value, &entry.key))),
        }
    }
    Ok(TwoDaModifier::AddRow { row_label, exclusive_column, cells, store_2da, store_tlk })
}

fn parse_copy_row(ini: &RawIni, section: &str) -> Result<TwoDaModifier> {
    let entries = ini.section(section).ok_or_else(|| PatcherError::MissingIniHeader { name: section.to_string() })?;
    let mut source = None;
    let mut new_row_label = None;
    let mut exclusive_column = None;
    let mut cells = Vec::new();
    let mut store_2da = Vec::new();
    let mut store_tlk = Vec::new();

    for entry in entries {
        let Some(value) = entry.value.as_deref() else { continue };
        if entry.key.eq_ignore_ascii_case("ExclusiveColumn") {
            exclusive_column = Some(value.to_string());
            continue;
        }
        if entry.key.eq_ignore_ascii_case("NewRowLabel") {
            new_row_label = Some(parse_cell_value(value, "NewRowLabel"));
            continue;
        }
        match classify_row_key(&entry.key) {
            RowKey::RowIndex => source = Some(RowTarget::Index(value.parse().map_err(|_| invalid_key(section, &entry.key))?)),
            RowKey::RowLabel => source = Some(RowTarget::Label(value.to_string())),
            RowKey::Store2Da(token) => store_2da.push((token, parse_store_value(value))),
            RowKey::StoreTlk(token) => store_tlk.push((token, parse_store_value(value))),
            RowKey::Other => {
                if source.is_none() {
                    source = Some(RowTarget::ColumnValue { column: entry.key.clone(), value: value.to_string() });
                } else {
                    cells.push((entry.key.clone(), parse_cell_value(value, &entry.key)));
                }
            }
        }
    }

    let source = source.ok_or_else(|| PatcherError::InvalidKeySyntax {
        section: section.to_string(),
        key: "RowIndex/RowLabel".to_string(),
        reason: "CopyRow section names no source row".to_string(),
    })?;
    Ok(TwoDaModifier::CopyRow { source, new_row_label, exclusive_column, cells, store_2da, store_tlk })
}

fn parse_add_column(ini: &RawIni, section: &str) -> Result<TwoDaModifier> {
    let entries = ini.section(section).ok_or_else(|| PatcherError::MissingIniHeader { name: section.to_string() })?;
    let mut column = None;
    let mut default = RowValue::Constant("****".to_string());
    let mut index_insert = Vec::new();
    let mut label_insert = Vec::new();
    let mut store_2da = Vec::new();
    let mut store_tlk = Vec::new();

    for entry in entries {
        let Some(value) = entry.value.as_deref() else { continue };
        if entry.key.eq_ignore_ascii_case("ColumnLabel") {
            column = Some(value.to_string());
        } else if entry.key.eq_ignore_ascii_case("DefaultValue") {
            default = parse_cell_value(value, "DefaultValue");
        } else if let Some(rest) = strip_prefix_ci(&entry.key, "I") {
            if let Ok(row) = rest.parse::<usize>() {
                index_insert.push((row, parse_cell_value(value, "I")));
                continue;
            }
        } else if let Some(rest) = strip_prefix_ci(&entry.key, "L") {
            if !rest.is_empty() {
                label_insert.push((rest.to_string(), parse_cell_value(value, "L")));
                continue;
            }
        } else {
            match classify_row_key(&entry.key) {
                RowKey::Store2Da(token) => store_2da.push((token, parse_store_value(value))),
                RowKey::StoreTlk(token) => store_tlk.push((token, parse_store_value(value))),
                _ => {}
            }
        }
    }

    let column = column.ok_or_else(|| PatcherError::UnrecognizedMandatoryKey {
        section: section.to_string(),
        key: "ColumnLabel".to_string(),
    })?;
    Ok(TwoDaModifier::AddColumn { column, default, index_insert, label_insert, store_2da, store_tlk })
}

enum RowKey {
    RowIndex,
    RowLabel,
    Store2Da(i32),
    StoreTlk(i32),
    Other,
}

fn classify_row_key(key: &str) -> RowKey {
    if key.eq_ignore_ascii_case("RowIndex") {
        return RowKey::RowIndex;
    }
    if key.eq_ignore_ascii_case("RowLabel") {
        return RowKey::RowLabel;
    }
    if let Some(rest) = strip_prefix_ci(key, "2DAMEMORY") {
        if let Ok(token) = rest.parse::<i32>() {
            return RowKey::Store2Da(token);
        }
    }
    if let Some(rest) = strip_prefix_ci(key, "StrRef") {
        if let Ok(token) = rest.parse::<i32>() {
            return RowKey::StoreTlk(token);
        }
    }
    RowKey::Other
}

/// Parses a cell/default/insert value in column-edit position: `high()` resolves against
/// `column`, everything else follows the shared token/literal rules.
fn parse_cell_value(value: &str, column: &str) -> RowValue {
    if value.eq_ignore_ascii_case("high()") {
        return RowValue::High(column.to_string());
    }
    parse_shared_row_value(value).unwrap_or_else(|| RowValue::Constant(value.to_string()))
}

/// Parses a `2DAMEMORY<n>=`/`StrRef<n>=` store value: a bare non-reserved string names a column
/// to capture from the row just written, rather than a literal.
fn parse_store_value(value: &str) -> RowValue {
    parse_shared_row_value(value).unwrap_or_else(|| RowValue::RowCell(value.to_string()))
}

fn parse_shared_row_value(value: &str) -> Option<RowValue> {
    if value.eq_ignore_ascii_case("RowIndex") {
        return Some(RowValue::RowIndex);
    }
    if value.eq_ignore_ascii_case("RowLabel") {
        return Some(RowValue::RowLabel);
    }
    if let Some(rest) = strip_prefix_ci(value, "2DAMEMORY") {
        if let Ok(token) = rest.parse::<i32>() {
            return Some(RowValue::Mem2Da(token));
        }
    }
    if let Some(rest) = strip_prefix_ci(value, "StrRef") {
        if let Ok(token) = rest.parse::<i32>() {
            return Some(RowValue::MemStr(token));
        }
    }
    None
}

/// `[GFFList]` names files; each file's section lists `AddField<n>=<section>` rows (each naming
/// a further section describing the new field, itself possibly nesting more `AddField<n>` rows)
/// and plain `<path>=<value>` rows, which are `SetField`s.
fn load_gff_list(ini: &RawIni) -> Result<Vec<GffPatch>> {
    let Some(files) = ini.section("GFFList") else { return Ok(Vec::new()) };

    let mut patches = Vec::new();
    for entry in files {
        let Some(filename) = entry.value.as_deref() else { continue };
        let Some(file_section) = ini.section(filename) else { continue };

        let mut modifiers = Vec::new();
        for row in file_section {
            let Some(value) = row.value.as_deref() else { continue };
            if strip_digits_prefix(&row.key, "AddField").is_some() {
                modifiers.push(GffModifier::AddField(parse_add_field(ini, value)?));
            } else {
                modifiers.push(parse_set_field(&row.key, value));
            }
        }

        let mut header = PatchHeader::new(filename.to_string());
        header.set_destination("Override".to_string());
        patches.push(GffPatch { header, modifiers });
    }
    Ok(patches)
}

/// A bare path, or a path with a `(strref)`/`(lang<n>)` suffix addressing a `LocString`'s
/// stringref or one of its per-language/gender substrings.
fn parse_set_field(path: &str, value: &str) -> GffModifier {
    if let Some(rest) = path.strip_suffix(')') {
        if let Some(idx) = rest.rfind('(') {
            let (base, suffix) = (&rest[..idx], &rest[idx + 1..]);
            if suffix.eq_ignore_ascii_case("strref") {
                return GffModifier::SetField {
                    path: base.to_string(),
                    value: GffFieldValue::LocalizedStringDelta {
                        string_ref: value.parse().ok(),
                        substrings: Vec::new(),
                    },
                };
            }
            if let Some(lang_digits) = strip_prefix_ci(suffix, "lang") {
                if let Ok(lang_id) = lang_digits.parse::<i32>() {
                    let (language, gender) = (lang_id / 2, lang_id % 2 == 1);
                    return GffModifier::SetField {
                        path: base.to_string(),
                        value: GffFieldValue::LocalizedStringDelta {
                            string_ref: None,
                            substrings: vec![((language, gender), value.to_string())],
                        },
                    };
                }
            }
        }
    }

    GffModifier::SetField { path: path.to_string(), value: parse_field_value(value) }
}

fn parse_field_value(value: &str) -> GffFieldValue {
    if let Some(rest) = strip_prefix_ci(value, "2DAMEMORY") {
        if let Ok(token) = rest.parse::<i32>() {
            return GffFieldValue::TwoDaMemoryToken(token);
        }
    }
    if let Some(rest) = strip_prefix_ci(value, "StrRef") {
        if let Ok(token) = rest.parse::<i32>() {
            return GffFieldValue::StrRefMemoryToken(token);
        }
    }
    GffFieldValue::RawString(value.to_string())
}

fn parse_add_field(ini: &RawIni, section: &str) -> Result<GffAddField> {
    let entries = ini.section(section).ok_or_else(|| PatcherError::MissingIniHeader { name: section.to_string() })?;

    let mut parent_path = String::new();
    let mut label = String::new();
    let mut field_type = None;
    let mut value = None;
    let mut index_in_list_token = None;
    let mut new_struct_id = 0u32;
    let mut nested = Vec::new();

    for entry in entries {
        if entry.key.eq_ignore_ascii_case("Path") {
            parent_path = entry.value.clone().unwrap_or_default();
            continue;
        }
        if entry.key.eq_ignore_ascii_case("Label") {
            label = entry.value.clone().unwrap_or_default();
            continue;
        }
        if entry.key.eq_ignore_ascii_case("FieldType") {
            let Some(raw) = entry.value.as_deref() else { continue };
            field_type = Some(parse_field_type(section, raw)?);
            continue;
        }
        if entry.key.eq_ignore_ascii_case("TypeId") {
            new_struct_id = entry.value.as_deref().and_then(|v| v.parse().ok()).unwrap_or(0);
            continue;
        }
        // `2DAMEMORY<n>=ListIndex`: the token lives in the key, the value just names the
        // convention, so this has to be checked before the generic `AddField<n>` dispatch below.
        if let Some(rest) = strip_prefix_ci(&entry.key, "2DAMEMORY") {
            if let Ok(token) = rest.parse::<i32>() {
                if entry.value.as_deref().is_some_and(|v| v.eq_ignore_ascii_case("ListIndex")) {
                    index_in_list_token = Some(token);
                    continue;
                }
            }
        }
        if strip_digits_prefix(&entry.key, "AddField").is_some() {
            if let Some(target) = entry.value.as_deref() {
                nested.push(GffModifier::AddField(parse_add_field(ini, target)?));
            }
            continue;
        }
        if entry.key.eq_ignore_ascii_case("Value") {
            value = entry.value.as_deref().map(parse_field_value);
            continue;
        }
    }

    let field_type = field_type.ok_or_else(|| PatcherError::UnrecognizedMandatoryKey {
        section: section.to_string(),
        key: "FieldType".to_string(),
    })?;

    Ok(GffAddField { parent_path, label, field_type, value, nested, index_in_list_token, new_struct_id })
}

fn parse_field_type(section: &str, raw: &str) -> Result<GffFieldType> {
    Ok(match raw {
        s if s.eq_ignore_ascii_case("Byte") => GffFieldType::Byte,
        s if s.eq_ignore_ascii_case("Char") => GffFieldType::Char,
        s if s.eq_ignore_ascii_case("Word") => GffFieldType::Word,
        s if s.eq_ignore_ascii_case("Short") => GffFieldType::Short,
        s if s.eq_ignore_ascii_case("DWORD") => GffFieldType::Dword,
        s if s.eq_ignore_ascii_case("Int") => GffFieldType::Int,
        s if s.eq_ignore_ascii_case("Int64") => GffFieldType::Int64,
        s if s.eq_ignore_ascii_case("DWORD64") => GffFieldType::Dword64,
        s if s.eq_ignore_ascii_case("Float") => GffFieldType::Float,
        s if s.eq_ignore_ascii_case("Double") => GffFieldType::Double,
        s if s.eq_ignore_ascii_case("ExoString") => GffFieldType::String,
        s if s.eq_ignore_ascii_case("ResRef") => GffFieldType::ResRef,
        s if s.eq_ignore_ascii_case("ExoLocString") => GffFieldType::LocString,
        s if s.eq_ignore_ascii_case("Position") => GffFieldType::Vector3,
        s if s.eq_ignore_ascii_case("Orientation") => GffFieldType::Vector4,
        s if s.eq_ignore_ascii_case("Struct") => GffFieldType::Struct,
        s if s.eq_ignore_ascii_case("List") => GffFieldType::List,
        other => {
            return Err(PatcherError::InvalidKeySyntax {
                section: section.to_string(),
                key: "FieldType".to_string(),
                reason: format!("unrecognized field type {other:?}"),
            })
        }
    })
}

/// `[HACKList]` mirrors `[GFFList]`'s file-name indirection but each file section's rows are
/// themselves the writes (no further indirection): `<offset>=<width>,<value>`.
fn load_hack_list(ini: &RawIni) -> Result<Vec<HackPatch>> {
    let Some(files) = ini.section("HACKList") else { return Ok(Vec::new()) };

    let mut patches = Vec::new();
    for entry in files {
        let Some(filename) = entry.value.as_deref() else { continue };
        let Some(file_section) = ini.section(filename) else { continue };

        let mut writes = Vec::new();
        for row in file_section {
            let Some(raw) = row.value.as_deref() else { continue };
            let offset: u64 = row.key.parse().map_err(|_| invalid_key(filename, &row.key))?;
            let (width_str, value_str) =
                raw.split_once(',').ok_or_else(|| invalid_key(filename, &row.key))?;
            let width = match width_str.trim() {
                "8" => HackWidth::U8,
                "16" => HackWidth::U16,
                "32" => HackWidth::U32,
                "64" => HackWidth::U64,
                _ => return Err(invalid_key(filename, &row.key)),
            };
            let value_str = value_str.trim();
            let value = if let Some(rest) = strip_prefix_ci(value_str, "2DAMEMORY") {
                rest.parse().map(HackValue::TwoDaMemoryToken).map_err(|_| invalid_key(filename, &row.key))?
            } else if let Some(rest) = strip_prefix_ci(value_str, "StrRef") {
                rest.parse().map(HackValue::StrRefMemoryToken).map_err(|_| invalid_key(filename, &row.key))?
            } else {
                HackValue::Literal(value_str.parse().map_err(|_| invalid_key(filename, &row.key))?)
            };
            writes.push(HackWrite { offset, width, value });
        }

        let mut header = PatchHeader::new(filename.to_string());
        header.set_destination("Override".to_string());
        patches.push(HackPatch { header, writes });
    }
    Ok(patches)
}

fn load_nss_list(ini: &RawIni) -> Result<Vec<NssPatch>> {
    let Some(entries) = ini.section("CompileList") else { return Ok(Vec::new()) };

    let destination = entries
        .iter()
        .find(|e| e.key.eq_ignore_ascii_case("!Destination"))
        .and_then(|e| e.value.as_deref())
        .unwrap_or("Override");

    let mut patches = Vec::new();
    for entry in entries {
        if entry.key.eq_ignore_ascii_case("!Destination") {
            continue;
        }
        let mut header = PatchHeader::new(entry.key.clone());
        header.set_destination(destination.to_string());
        patches.push(NssPatch { header });
    }
    Ok(patches)
}

fn load_ssf_list(ini: &RawIni) -> Result<Vec<SsfPatch>> {
    let Some(files) = ini.section("SSFList") else { return Ok(Vec::new()) };

    let mut patches = Vec::new();
    for entry in files {
        let Some(filename) = entry.value.as_deref() else { continue };
        let Some(file_section) = ini.section(filename) else { continue };

        let mut writes = Vec::new();
        for row in file_section {
            let Some(raw) = row.value.as_deref() else { continue };
            let Some(sound) = SSFSound::from_label(&row.key) else {
                return Err(PatcherError::InvalidKeySyntax {
                    section: filename.to_string(),
                    key: row.key.clone(),
                    reason: "unrecognized sound-set slot name".to_string(),
                });
            };
            let value = if let Some(rest) = strip_prefix_ci(raw, "2DAMEMORY") {
                rest.parse().map(SsfValue::TwoDaMemoryToken).map_err(|_| invalid_key(filename, &row.key))?
            } else if let Some(rest) = strip_prefix_ci(raw, "StrRef") {
                rest.parse().map(SsfValue::StrRefMemoryToken).map_err(|_| invalid_key(filename, &row.key))?
            } else {
                SsfValue::Literal(raw.parse().map_err(|_| invalid_key(filename, &row.key))?)
            };
            writes.push(SsfWrite { sound, value });
        }

        let mut header = PatchHeader::new(filename.to_string());
        header.set_destination("Override".to_string());
        patches.push(SsfPatch { header, writes });
    }
    Ok(patches)
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len() && s[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

/// `strip_prefix_ci` plus a check that what remains is purely the row index (so `ChangeRow0` is
/// recognized but `ChangeRowLabel` is not mistaken for one).
fn strip_digits_prefix<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = strip_prefix_ci(s, prefix)?;
    (!rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit())).then_some(rest)
}

fn invalid_key(section: &str, key: &str) -> PatcherError {
    PatcherError::InvalidKeySyntax {
        section: section.to_string(),
        key: key.to_string(),
        reason: "malformed value".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_list_applies_replace_prefix_convention() {
        let ini = RawIni::parse(
            "[InstallList]\nFolder0=Override\n\n[Override]\nbar.uti\nreplacefoo.uti\n",
        );
        let patches = load_install_list(&ini).unwrap();
        assert_eq!(patches.len(), 2);
        let bar = patches.iter().find(|p| p.header.source_file() == "bar.uti").unwrap();
        assert!(!*bar.header.replace_existing());
        let foo = patches.iter().find(|p| p.header.source_file() == "foo.uti").unwrap();
        assert!(*foo.header.replace_existing());
    }

    #[test]
    fn tlk_inline_syntax_groups_text_and_sound_by_token() {
        let ini = RawIni::parse("[TLKList]\n5\\Text=Hello there\n5\\Sound=n_greet\n");
        let patches = load_tlk_list(&ini).unwrap();
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].token, 5);
        assert_eq!(patches[0].text.as_deref(), Some("Hello there"));
        assert_eq!(patches[0].sound.as_deref(), Some("n_greet"));
        assert!(!patches[0].is_replacement);
    }

    #[test]
    fn tlk_legacy_strref_is_a_literal_replace() {
        let ini = RawIni::parse("[TLKList]\nStrRef12=Replacement text\n");
        let patches = load_tlk_list(&ini).unwrap();
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].token, 12);
        assert!(patches[0].is_replacement);
    }

    #[test]
    fn two_da_change_row_parses_target_and_cells() {
        let ini = RawIni::parse(
            "[2DAList]\nTable0=appearance.2da\n\n[appearance.2da]\nChangeRow0=change_1\n\n\
             [change_1]\nRowIndex=3\nlabel=NewLabel\n2DAMEMORY4=label\n",
        );
        let patches = load_two_da_list(&ini).unwrap();
        assert_eq!(patches.len(), 1);
        match &patches[0].modifiers[0] {
            TwoDaModifier::ChangeRow { target, cells, store_2da, .. } => {
                assert!(matches!(target, RowTarget::Index(3)));
                assert_eq!(cells.len(), 1);
                assert_eq!(store_2da.len(), 1);
            }
            other => panic!("expected ChangeRow, got {other:?}"),
        }
    }

    #[test]
    fn two_da_add_row_parses_exclusive_column() {
        let ini = RawIni::parse(
            "[2DAList]\nTable0=appearance.2da\n\n[appearance.2da]\nAddRow0=add_1\n\n\
             [add_1]\nExclusiveColumn=label\nlabel=feat_power_attack\nvalue=new\n",
        );
        let patches = load_two_da_list(&ini).unwrap();
        match &patches[0].modifiers[0] {
            TwoDaModifier::AddRow { exclusive_column, cells, .. } => {
                assert_eq!(exclusive_column.as_deref(), Some("label"));
                assert_eq!(cells.len(), 2);
            }
            other => panic!("expected AddRow, got {other:?}"),
        }
    }

    #[test]
    fn gff_add_field_nests_and_records_list_index_token() {
        let ini = RawIni::parse(
            "[GFFList]\nFile0=test.utc\n\n[test.utc]\nAddField0=add_0\nHP=20\n\n\
             [add_0]\nFieldType=Struct\nLabel=\nPath=EntryList\nTypeId=5\n2DAMEMORY7=ListIndex\nAddField0=add_inner\n\n\
             [add_inner]\nFieldType=Int\nLabel=Value\nValue=42\n",
        );
        let patches = load_gff_list(&ini).unwrap();
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].modifiers.len(), 2);
        let add = patches[0].modifiers.iter().find_map(|m| match m {
            GffModifier::AddField(a) => Some(a),
            _ => None,
        }).unwrap();
        assert_eq!(add.parent_path, "EntryList");
        assert_eq!(add.index_in_list_token, Some(7));
        assert_eq!(add.nested.len(), 1);
    }

    #[test]
    fn ssf_list_resolves_sound_labels() {
        let ini = RawIni::parse("[SSFList]\nFile0=test.ssf\n\n[test.ssf]\nDeath=1234\nPoisoned=2DAMEMORY3\n");
        let patches = load_ssf_list(&ini).unwrap();
        assert_eq!(patches[0].writes.len(), 2);
    }

    #[test]
    fn hack_list_parses_offset_width_and_value() {
        let ini = RawIni::parse("[HACKList]\nFile0=test.ncs\n\n[test.ncs]\n16=32,StrRef2\n");
        let patches = load_hack_list(&ini).unwrap();
        assert_eq!(patches[0].writes.len(), 1);
        assert!(matches!(patches[0].writes[0].value, HackValue::StrRefMemoryToken(2)));
        assert_eq!(patches[0].writes[0].offset, 16);
    }

    #[test]
    fn nss_list_reads_optional_destination_override() {
        let ini = RawIni::parse("[CompileList]\n!Destination=Override\nk_test.nss\n");
        let patches = load_nss_list(&ini).unwrap();
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].header.source_file(), "k_test.nss");
        assert_eq!(patches[0].header.destination(), "Override");
    }
}
