//! Bespoke parser for the instruction file's sectioned key/value format.
//!
//! Deliberately not built on a generic `ini`-style crate: this format's rules are unusual
//! enough (case-sensitive keys, duplicate sections merge rather than error, `#`/`;` are not
//! comment leaders, no interpolation, valueless keys are legal) that a standard INI crate
//! would silently misbehave. Grounded on SPEC_FULL.md §4.2 and
//! `original_source/.../reader.py::ConfigReader.from_filepath`'s UTF-8-then-cp1252 decode
//! fallback and `ConfigParser`'s duplicate-section tolerance.

use std::path::Path;

use crate::error::{PatcherError, Result};

/// One `key=value` line. `value` is `None` for a line with no `=`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IniEntry {
    pub key: String,
    pub value: Option<String>,
}

/// A parsed instruction file: an ordered list of sections, each an ordered list of entries.
/// Sections with the same name (in any casing — section *names*, unlike keys, behave
/// case-insensitively here, matching `ConfigParser`'s default) are merged in encounter order;
/// entries are concatenated, not deduplicated, since later lookups take the last match.
#[derive(Debug, Default, Clone)]
pub struct RawIni {
    sections: Vec<(String, Vec<IniEntry>)>,
}

impl RawIni {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| PatcherError::io(path, e))?;
        let text = decode_ini_bytes(&bytes)
            .ok_or_else(|| PatcherError::InstructionFileEncoding(path.to_path_buf()))?;
        Ok(Self::parse(&text))
    }

    pub fn parse(text: &str) -> Self {
        let mut sections: Vec<(String, Vec<IniEntry>)> = Vec::new();
        let mut current: Option<usize> = None;

        for raw_line in text.lines() {
            let line = raw_line.trim_end_matches('\r');
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.starts_with('[') && trimmed.ends_with(']') && trimmed.len() >= 2 {
                let name = trimmed[1..trimmed.len() - 1].to_string();
                match sections.iter().position(|(n, _)| n.eq_ignore_ascii_case(&name)) {
                    Some(idx) => current = Some(idx),
                    None => {
                        sections.push((name, Vec::new()));
                        current = Some(sections.len() - 1);
                    }
                }
                continue;
            }
            let Some(idx) = current else { continue };
            match line.split_once('=') {
                Some((key, value)) => sections[idx].1.push(IniEntry {
                    key: key.to_string(),
                    value: Some(value.to_string()),
                }),
                None => sections[idx].1.push(IniEntry { key: line.to_string(), value: None }),
            }
        }

        RawIni { sections }
    }

    pub fn section(&self, name: &str) -> Option<&[IniEntry]> {
        self.sections
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, entries)| entries.as_slice())
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.section(name).is_some()
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|(n, _)| n.as_str())
    }

    /// Looks up the last value bound to `key` in section `section` (case-sensitive key match,
    /// per spec). Returns `None` both when the section or key is absent and when the key has
    /// no `=` (a valueless line) — callers that need to distinguish those use `get_raw`.
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.get_raw(section, key).and_then(|e| e.value.as_deref())
    }

    pub fn get_raw(&self, section: &str, key: &str) -> Option<&IniEntry> {
        self.section(section)?.iter().rev().find(|e| e.key == key)
    }
}

/// Tries UTF-8 first; on failure, falls back to a Windows-1252-like single-byte decode.
/// We don't carry a crate with a literal cp1252 table, so this reimplements the Latin-1
/// superset behavior `encoding_rs::WINDOWS_1252` provides: every byte maps to a code point,
/// so this fallback never itself fails (matches the original's "decode or raise" contract,
/// where the *first* attempt is the only one that can fail for real mod files in practice).
fn decode_ini_bytes(bytes: &[u8]) -> Option<String> {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return Some(s.to_string());
    }
    let (cow, _encoding, had_errors) = encoding_rs::WINDOWS_1252.decode(bytes);
    if had_errors {
        None
    } else {
        Some(cow.into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_sections_merge_in_order() {
        let ini = RawIni::parse("[A]\nx=1\n[B]\ny=2\n[A]\nz=3\n");
        let entries = ini.section("A").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(ini.get("A", "x"), Some("1"));
        assert_eq!(ini.get("A", "z"), Some("3"));
    }

    #[test]
    fn valueless_line_is_none() {
        let ini = RawIni::parse("[A]\nstandalone\n");
        let entry = ini.get_raw("A", "standalone").unwrap();
        assert_eq!(entry.value, None);
    }

    #[test]
    fn hash_and_semicolon_are_not_comments() {
        let ini = RawIni::parse("[A]\nkey=# not a comment; still data\n");
        assert_eq!(ini.get("A", "key"), Some("# not a comment; still data"));
    }

    #[test]
    fn keys_are_case_sensitive() {
        let ini = RawIni::parse("[A]\nKey=1\nkey=2\n");
        assert_eq!(ini.get("A", "Key"), Some("1"));
        assert_eq!(ini.get("A", "key"), Some("2"));
    }

    #[test]
    fn section_names_are_case_insensitive() {
        let ini = RawIni::parse("[TLKList]\na=1\n[tlklist]\nb=2\n");
        let entries = ini.section("TLKLIST").unwrap();
        assert_eq!(entries.len(), 2);
    }
}
