//! Talk table: a string table indexed by integer stringrefs, with an optional voiceover
//! `ResRef` per entry.
//!
//! **Binary layout** (little-endian; loosely modeled on the BioWare Aurora/Odyssey TLK format —
//! this crate owns the exact scheme since the byte layout is opaque per SPEC_FULL.md §1):
//!
//! | Field | Size | Notes |
//! |---|---|---|
//! | `file_type` | 4 bytes | ASCII `"TLK "` |
//! | `file_version` | 4 bytes | ASCII `"V3.0"` |
//! | `language_id` | u32 | opaque language tag, round-tripped only |
//! | `string_count` | u32 | |
//! | entries | 28 bytes × `string_count` | `flags: u32`, `sound_resref: [u8; 16]`, `sound_length: f32`, `text_offset: u32`, `text_len: u32` |
//! | string data | variable | UTF-8 text for each entry, concatenated in order |
//!
//! Grounded on `files/loc/mod.rs`'s `Loc` (a string table wrapping string-indexed entries) for
//! the overall shape, and `original_source/.../mods/tlk.py` for the algorithm this format feeds.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read};

use crate::error::{PatcherError, Result};

pub const FILE_TYPE: &[u8; 4] = b"TLK ";
pub const FILE_VERSION: &[u8; 4] = b"V3.0";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlkEntry {
    pub text: String,
    /// Voiceover resref; empty string if none.
    pub sound: String,
}

#[derive(Debug, Clone, Default)]
pub struct Tlk {
    pub language_id: u32,
    pub entries: Vec<TlkEntry>,
}

impl Tlk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: i32) -> Option<&TlkEntry> {
        if index < 0 {
            return None;
        }
        self.entries.get(index as usize)
    }

    /// Appends a new entry, returning its index.
    pub fn insert(&mut self, text: impl Into<String>, sound: impl Into<String>) -> i32 {
        self.entries.push(TlkEntry { text: text.into(), sound: sound.into() });
        (self.entries.len() - 1) as i32
    }

    /// Overwrites an existing entry in place. Growing the table via `replace` past its current
    /// length is treated as an append at that exact index (pads with empty entries), matching
    /// a talk table that may legitimately have gaps patched in out of order.
    pub fn replace(&mut self, index: i32, text: impl Into<String>, sound: impl Into<String>) {
        let index = index.max(0) as usize;
        if index >= self.entries.len() {
            self.entries.resize(index + 1, TlkEntry::default());
        }
        self.entries[index] = TlkEntry { text: text.into(), sound: sound.into() };
    }

    pub fn load(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let mut file_type = [0u8; 4];
        let mut file_version = [0u8; 4];
        cursor.read_exact(&mut file_type)?;
        cursor.read_exact(&mut file_version)?;
        if &file_type != FILE_TYPE || &file_version != FILE_VERSION {
            return Err(PatcherError::Other(format!(
                "not a recognized TLK file (saw {:?} {:?})",
                String::from_utf8_lossy(&file_type),
                String::from_utf8_lossy(&file_version)
            )));
        }
        let language_id = cursor.read_u32::<LittleEndian>()?;
        let string_count = cursor.read_u32::<LittleEndian>()?;

        struct RawEntry {
            has_text: bool,
            has_sound: bool,
            sound: String,
            text_offset: u32,
            text_len: u32,
        }
        let mut raw = Vec::with_capacity(string_count as usize);
        for _ in 0..string_count {
            let flags = cursor.read_u32::<LittleEndian>()?;
            let mut sound_bytes = [0u8; 16];
            cursor.read_exact(&mut sound_bytes)?;
            let sound_end = sound_bytes.iter().position(|b| *b == 0).unwrap_or(16);
            let sound = String::from_utf8_lossy(&sound_bytes[..sound_end]).into_owned();
            let _sound_length = cursor.read_f32::<LittleEndian>()?;
            let text_offset = cursor.read_u32::<LittleEndian>()?;
            let text_len = cursor.read_u32::<LittleEndian>()?;
            raw.push(RawEntry { has_text: flags & 0x1 != 0, has_sound: flags & 0x2 != 0, sound, text_offset, text_len });
        }

        let string_data_start = cursor.position() as usize;
        let mut entries = Vec::with_capacity(raw.len());
        for r in raw {
            let text = if r.has_text {
                let start = string_data_start + r.text_offset as usize;
                let end = start + r.text_len as usize;
                let slice = bytes.get(start..end).ok_or_else(|| {
                    PatcherError::Other("TLK string data out of bounds".to_string())
                })?;
                String::from_utf8_lossy(slice).into_owned()
            } else {
                String::new()
            };
            let sound = if r.has_sound { r.sound } else { String::new() };
            entries.push(TlkEntry { text, sound });
        }

        Ok(Tlk { language_id, entries })
    }

    pub fn save(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        out.extend_from_slice(FILE_TYPE);
        out.extend_from_slice(FILE_VERSION);
        out.write_u32::<LittleEndian>(self.language_id)?;
        out.write_u32::<LittleEndian>(self.entries.len() as u32)?;

        let mut string_data = Vec::new();
        for entry in &self.entries {
            let flags: u32 = (!entry.text.is_empty() as u32) | ((!entry.sound.is_empty() as u32) << 1);
            out.write_u32::<LittleEndian>(flags)?;
            let mut sound_bytes = [0u8; 16];
            let sound_ascii = entry.sound.as_bytes();
            let take = sound_ascii.len().min(16);
            sound_bytes[..take].copy_from_slice(&sound_ascii[..take]);
            out.extend_from_slice(&sound_bytes);
            out.write_f32::<LittleEndian>(0.0)?;
            out.write_u32::<LittleEndian>(string_data.len() as u32)?;
            out.write_u32::<LittleEndian>(entry.text.len() as u32)?;
            string_data.extend_from_slice(entry.text.as_bytes());
        }
        out.extend_from_slice(&string_data);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_save_and_load() {
        let mut tlk = Tlk::new();
        tlk.insert("Hello", "n_hello");
        tlk.insert("Goodbye", "");
        let bytes = tlk.save().unwrap();
        let loaded = Tlk::load(&bytes).unwrap();
        assert_eq!(loaded.entries, tlk.entries);
    }

    #[test]
    fn insert_returns_appended_index() {
        let mut tlk = Tlk::new();
        let i0 = tlk.insert("a", "");
        let i1 = tlk.insert("b", "");
        assert_eq!(i0, 0);
        assert_eq!(i1, 1);
    }

    #[test]
    fn replace_overwrites_in_place() {
        let mut tlk = Tlk::new();
        tlk.insert("a", "");
        tlk.insert("b", "");
        tlk.replace(0, "A", "snd");
        assert_eq!(tlk.get(0).unwrap().text, "A");
        assert_eq!(tlk.get(1).unwrap().text, "b");
    }
}
