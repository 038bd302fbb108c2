//! Generic File Format tree: a typed struct/list hierarchy with scalar leaves, used for
//! save-game-like and template resources.
//!
//! **Binary layout** (little-endian; this crate's own scheme — see `formats::mod` doc): each
//! `GffValue` is written as a one-byte tag followed by a tag-specific body. Structs write their
//! field count then, per field, a length-prefixed name string followed by a nested value. Lists
//! write their element count then each element in order. This recursive, self-describing
//! encoding forgoes the real format's flat offset-table scheme (opaque per SPEC_FULL.md §1) in
//! favor of directly mirroring the in-memory tree, following `files/mod.rs`'s
//! `Decodeable`/`Encodeable` pair.
//!
//! Grounded on SPEC_FULL.md §3 for the field-type set (including the localized string's
//! per-(language, gender) substring table and the `nalgebra`-backed vector types) and on
//! `original_source/.../reader.py`'s field-path dotted/indexed addressing
//! (`"FieldA\\ListB\\2\\FieldC"`-style paths, though this implementation uses `/`-joined paths).

use std::collections::BTreeMap;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use nalgebra::{Vector3, Vector4};
use std::io::{Cursor, Read};

use crate::error::{PatcherError, Result};

/// `(language_id, is_female)` key into a localized string's substring table.
pub type LocKey = (i32, bool);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocString {
    pub string_ref: i32,
    pub substrings: BTreeMap<LocKey, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GffValue {
    Byte(u8),
    Char(i8),
    Word(u16),
    Short(i16),
    Dword(u32),
    Int(i32),
    Dword64(u64),
    Int64(i64),
    Float(f32),
    Double(f64),
    String(String),
    ResRef(String),
    LocString(LocString),
    Vector3(Vector3<f32>),
    Vector4(Vector4<f32>),
    Struct(GffStruct),
    List(Vec<GffStruct>),
}

/// A struct node: an ordered set of named fields plus an opaque type id (matches the real
/// format's per-struct type tag, used by callers to distinguish sibling list entries).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GffStruct {
    pub struct_id: u32,
    pub fields: Vec<(String, GffValue)>,
}

impl GffStruct {
    pub fn new(struct_id: u32) -> Self {
        GffStruct { struct_id, fields: Vec::new() }
    }

    pub fn get(&self, name: &str) -> Option<&GffValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut GffValue> {
        self.fields.iter_mut().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn set(&mut self, name: impl Into<String>, value: GffValue) {
        let name = name.into();
        if let Some(slot) = self.fields.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.fields.push((name, value));
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Gff {
    pub file_type: String,
    pub root: GffStruct,
}

/// The node an `AddField` parent path names: either a struct whose fields take a new labeled
/// entry, or a list whose elements take a new unlabeled struct.
pub enum GffNodeMut<'a> {
    Struct(&'a mut GffStruct),
    List(&'a mut Vec<GffStruct>),
}

impl Gff {
    pub fn new(file_type: impl Into<String>) -> Self {
        Gff { file_type: file_type.into(), root: GffStruct::new(0xFFFFFFFF) }
    }

    /// Resolves a `/`-joined field path (`"ClassList/0/Class"`) against the root struct,
    /// descending into nested structs by field name and into lists by index.
    pub fn resolve_path(&self, path: &str) -> Result<&GffValue> {
        let mut current = &self.root;
        let mut segments = path.split('/').peekable();
        let mut last: Option<&GffValue> = None;

        while let Some(segment) = segments.next() {
            let value = current
                .get(segment)
                .ok_or_else(|| PatcherError::GffPathNotFound(path.to_string()))?;
            if segments.peek().is_none() {
                return Ok(value);
            }
            match value {
                GffValue::Struct(s) => current = s,
                GffValue::List(items) => {
                    let index_segment = segments
                        .next()
                        .ok_or_else(|| PatcherError::GffPathNotFound(path.to_string()))?;
                    let index: usize = index_segment
                        .parse()
                        .map_err(|_| PatcherError::GffPathNotFound(path.to_string()))?;
                    current = items
                        .get(index)
                        .ok_or_else(|| PatcherError::GffPathNotFound(path.to_string()))?;
                }
                _ => return Err(PatcherError::GffPathNotFound(path.to_string())),
            }
            last = Some(value);
        }

        last.ok_or_else(|| PatcherError::GffPathNotFound(path.to_string()))
    }

    /// Resolves every path segment but the last, creating missing intermediate structs as
    /// needed, then returns a mutable reference to the parent struct and the final field name.
    pub fn resolve_parent_mut(&mut self, path: &str) -> Result<(&mut GffStruct, String)> {
        let segments: Vec<&str> = path.split('/').collect();
        let Some((last, parents)) = segments.split_last() else {
            return Err(PatcherError::GffPathNotFound(path.to_string()));
        };

        let mut current = &mut self.root;
        for segment in parents {
            let needs_insert = current.get(segment).is_none();
            if needs_insert {
                current.set(*segment, GffValue::Struct(GffStruct::new(0)));
            }
            match current.get_mut(segment) {
                Some(GffValue::Struct(s)) => current = s,
                _ => return Err(PatcherError::GffPathNotFound(path.to_string())),
            }
        }

        Ok((current, (*last).to_string()))
    }

    /// Resolves `path` to the struct or list node it names, for `AddField`'s `parent_path`
    /// (empty path means the root struct itself). Unlike [`Gff::resolve_parent_mut`], this
    /// resolves the node `path` itself names rather than its parent, and accepts a trailing
    /// list field (not just structs), since `AddField` into a list targets the list directly.
    pub fn resolve_node_mut(&mut self, path: &str) -> Result<GffNodeMut<'_>> {
        if path.is_empty() {
            return Ok(GffNodeMut::Struct(&mut self.root));
        }

        let segments: Vec<&str> = path.split('/').collect();
        let mut current: &mut GffStruct = &mut self.root;
        let mut i = 0;
        while i < segments.len() {
            let is_last = i == segments.len() - 1;
            let value = current
                .get_mut(segments[i])
                .ok_or_else(|| PatcherError::GffPathNotFound(path.to_string()))?;
            if is_last {
                return match value {
                    GffValue::Struct(s) => Ok(GffNodeMut::Struct(s)),
                    GffValue::List(items) => Ok(GffNodeMut::List(items)),
                    _ => Err(PatcherError::GffPathNotFound(path.to_string())),
                };
            }
            match value {
                GffValue::Struct(s) => {
                    current = s;
                    i += 1;
                }
                GffValue::List(items) => {
                    i += 1;
                    let index_segment = segments
                        .get(i)
                        .ok_or_else(|| PatcherError::GffPathNotFound(path.to_string()))?;
                    let index: usize = index_segment
                        .parse()
                        .map_err(|_| PatcherError::GffPathNotFound(path.to_string()))?;
                    let is_last_after_index = i == segments.len() - 1;
                    let item = items
                        .get_mut(index)
                        .ok_or_else(|| PatcherError::GffPathNotFound(path.to_string()))?;
                    if is_last_after_index {
                        return Ok(GffNodeMut::Struct(item));
                    }
                    current = item;
                    i += 1;
                }
                _ => return Err(PatcherError::GffPathNotFound(path.to_string())),
            }
        }

        Err(PatcherError::GffPathNotFound(path.to_string()))
    }

    pub fn load(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let file_type = read_tagged_string(&mut cursor, 4)?;
        let root = read_struct(&mut cursor)?;
        Ok(Gff { file_type, root })
    }

    pub fn save(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut type_bytes = [b' '; 4];
        let src = self.file_type.as_bytes();
        let take = src.len().min(4);
        type_bytes[..take].copy_from_slice(&src[..take]);
        out.extend_from_slice(&type_bytes);
        write_struct(&mut out, &self.root)?;
        Ok(out)
    }
}

fn read_tagged_string(cursor: &mut Cursor<&[u8]>, len: usize) -> Result<String> {
    let mut buf = vec![0u8; len];
    cursor.read_exact(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).trim_end().to_string())
}

fn read_length_prefixed(cursor: &mut Cursor<&[u8]>) -> Result<String> {
    let len = cursor.read_u32::<LittleEndian>()? as usize;
    let mut buf = vec![0u8; len];
    cursor.read_exact(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn write_length_prefixed(out: &mut Vec<u8>, s: &str) -> Result<()> {
    out.write_u32::<LittleEndian>(s.len() as u32)?;
    out.extend_from_slice(s.as_bytes());
    Ok(())
}

const TAG_BYTE: u8 = 0;
const TAG_CHAR: u8 = 1;
const TAG_WORD: u8 = 2;
const TAG_SHORT: u8 = 3;
const TAG_DWORD: u8 = 4;
const TAG_INT: u8 = 5;
const TAG_DWORD64: u8 = 6;
const TAG_INT64: u8 = 7;
const TAG_FLOAT: u8 = 8;
const TAG_DOUBLE: u8 = 9;
const TAG_STRING: u8 = 10;
const TAG_RESREF: u8 = 11;
const TAG_LOCSTRING: u8 = 12;
const TAG_VECTOR3: u8 = 13;
const TAG_VECTOR4: u8 = 14;
const TAG_STRUCT: u8 = 15;
const TAG_LIST: u8 = 16;

fn read_value(cursor: &mut Cursor<&[u8]>) -> Result<GffValue> {
    let tag = cursor.read_u8()?;
    Ok(match tag {
        TAG_BYTE => GffValue::Byte(cursor.read_u8()?),
        TAG_CHAR => GffValue::Char(cursor.read_i8()?),
        TAG_WORD => GffValue::Word(cursor.read_u16::<LittleEndian>()?),
        TAG_SHORT => GffValue::Short(cursor.read_i16::<LittleEndian>()?),
        TAG_DWORD => GffValue::Dword(cursor.read_u32::<LittleEndian>()?),
        TAG_INT => GffValue::Int(cursor.read_i32::<LittleEndian>()?),
        TAG_DWORD64 => GffValue::Dword64(cursor.read_u64::<LittleEndian>()?),
        TAG_INT64 => GffValue::Int64(cursor.read_i64::<LittleEndian>()?),
        TAG_FLOAT => GffValue::Float(cursor.read_f32::<LittleEndian>()?),
        TAG_DOUBLE => GffValue::Double(cursor.read_f64::<LittleEndian>()?),
        TAG_STRING => GffValue::String(read_length_prefixed(cursor)?),
        TAG_RESREF => GffValue::ResRef(read_length_prefixed(cursor)?),
        TAG_LOCSTRING => {
            let string_ref = cursor.read_i32::<LittleEndian>()?;
            let count = cursor.read_u32::<LittleEndian>()?;
            let mut substrings = BTreeMap::new();
            for _ in 0..count {
                let language_id = cursor.read_i32::<LittleEndian>()?;
                let is_female = cursor.read_u8()? != 0;
                let text = read_length_prefixed(cursor)?;
                substrings.insert((language_id, is_female), text);
            }
            GffValue::LocString(LocString { string_ref, substrings })
        }
        TAG_VECTOR3 => {
            let x = cursor.read_f32::<LittleEndian>()?;
            let y = cursor.read_f32::<LittleEndian>()?;
            let z = cursor.read_f32::<LittleEndian>()?;
            GffValue::Vector3(Vector3::new(x, y, z))
        }
        TAG_VECTOR4 => {
            let x = cursor.read_f32::<LittleEndian>()?;
            let y = cursor.read_f32::<LittleEndian>()?;
            let z = cursor.read_f32::<LittleEndian>()?;
            let w = cursor.read_f32::<LittleEndian>()?;
            GffValue::Vector4(Vector4::new(x, y, z, w))
        }
        TAG_STRUCT => GffValue::Struct(read_struct(cursor)?),
        TAG_LIST => {
            let count = cursor.read_u32::<LittleEndian>()?;
            let mut items = Vec::with_capacity(count as usize);
            for _ in 0..count {
                items.push(read_struct(cursor)?);
            }
            GffValue::List(items)
        }
        other => return Err(PatcherError::Other(format!("unrecognized GFF field tag {other}"))),
    })
}

fn write_value(out: &mut Vec<u8>, value: &GffValue) -> Result<()> {
    match value {
        GffValue::Byte(v) => {
            out.push(TAG_BYTE);
            out.push(*v);
        }
        GffValue::Char(v) => {
            out.push(TAG_CHAR);
            out.push(*v as u8);
        }
        GffValue::Word(v) => {
            out.push(TAG_WORD);
            out.write_u16::<LittleEndian>(*v)?;
        }
        GffValue::Short(v) => {
            out.push(TAG_SHORT);
            out.write_i16::<LittleEndian>(*v)?;
        }
        GffValue::Dword(v) => {
            out.push(TAG_DWORD);
            out.write_u32::<LittleEndian>(*v)?;
        }
        GffValue::Int(v) => {
            out.push(TAG_INT);
            out.write_i32::<LittleEndian>(*v)?;
        }
        GffValue::Dword64(v) => {
            out.push(TAG_DWORD64);
            out.write_u64::<LittleEndian>(*v)?;
        }
        GffValue::Int64(v) => {
            out.push(TAG_INT64);
            out.write_i64::<LittleEndian>(*v)?;
        }
        GffValue::Float(v) => {
            out.push(TAG_FLOAT);
            out.write_f32::<LittleEndian>(*v)?;
        }
        GffValue::Double(v) => {
            out.push(TAG_DOUBLE);
            out.write_f64::<LittleEndian>(*v)?;
        }
        GffValue::String(s) => {
            out.push(TAG_STRING);
            write_length_prefixed(out, s)?;
        }
        GffValue::ResRef(s) => {
            out.push(TAG_RESREF);
            write_length_prefixed(out, s)?;
        }
        GffValue::LocString(loc) => {
            out.push(TAG_LOCSTRING);
            out.write_i32::<LittleEndian>(loc.string_ref)?;
            out.write_u32::<LittleEndian>(loc.substrings.len() as u32)?;
            for ((language_id, is_female), text) in &loc.substrings {
                out.write_i32::<LittleEndian>(*language_id)?;
                out.push(*is_female as u8);
                write_length_prefixed(out, text)?;
            }
        }
        GffValue::Vector3(v) => {
            out.push(TAG_VECTOR3);
            out.write_f32::<LittleEndian>(v.x)?;
            out.write_f32::<LittleEndian>(v.y)?;
            out.write_f32::<LittleEndian>(v.z)?;
        }
        GffValue::Vector4(v) => {
            out.push(TAG_VECTOR4);
            out.write_f32::<LittleEndian>(v.x)?;
            out.write_f32::<LittleEndian>(v.y)?;
            out.write_f32::<LittleEndian>(v.z)?;
            out.write_f32::<LittleEndian>(v.w)?;
        }
        GffValue::Struct(s) => {
            out.push(TAG_STRUCT);
            write_struct(out, s)?;
        }
        GffValue::List(items) => {
            out.push(TAG_LIST);
            out.write_u32::<LittleEndian>(items.len() as u32)?;
            for item in items {
                write_struct(out, item)?;
            }
        }
    }
    Ok(())
}

fn read_struct(cursor: &mut Cursor<&[u8]>) -> Result<GffStruct> {
    let struct_id = cursor.read_u32::<LittleEndian>()?;
    let field_count = cursor.read_u32::<LittleEndian>()?;
    let mut fields = Vec::with_capacity(field_count as usize);
    for _ in 0..field_count {
        let name = read_length_prefixed(cursor)?;
        let value = read_value(cursor)?;
        fields.push((name, value));
    }
    Ok(GffStruct { struct_id, fields })
}

fn write_struct(out: &mut Vec<u8>, s: &GffStruct) -> Result<()> {
    out.write_u32::<LittleEndian>(s.struct_id)?;
    out.write_u32::<LittleEndian>(s.fields.len() as u32)?;
    for (name, value) in &s.fields {
        write_length_prefixed(out, name)?;
        write_value(out, value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::assert_float_eq;

    #[test]
    fn round_trips_position_and_orientation_vectors() {
        let mut gff = Gff::new("UTC ");
        gff.root.set("Position", GffValue::Vector3(Vector3::new(1.5, -2.25, 0.0)));
        gff.root.set("Orientation", GffValue::Vector4(Vector4::new(0.0, 0.0, 0.7071, 0.7071)));

        let bytes = gff.save().unwrap();
        let loaded = Gff::load(&bytes).unwrap();

        let GffValue::Vector3(position) = loaded.resolve_path("Position").unwrap() else {
            panic!("expected Vector3");
        };
        assert_float_eq!(position.x, 1.5, abs <= 1e-6);
        assert_float_eq!(position.y, -2.25, abs <= 1e-6);
        assert_float_eq!(position.z, 0.0, abs <= 1e-6);

        let GffValue::Vector4(orientation) = loaded.resolve_path("Orientation").unwrap() else {
            panic!("expected Vector4");
        };
        assert_float_eq!(orientation.z, 0.7071, abs <= 1e-6);
        assert_float_eq!(orientation.w, 0.7071, abs <= 1e-6);
    }

    #[test]
    fn round_trips_nested_struct_and_list() {
        let mut gff = Gff::new("UTC ");
        gff.root.set("Tag", GffValue::ResRef("n_test".into()));
        let mut entry = GffStruct::new(2);
        entry.set("Class", GffValue::Int(1));
        gff.root.set("ClassList", GffValue::List(vec![entry]));

        let bytes = gff.save().unwrap();
        let loaded = Gff::load(&bytes).unwrap();
        assert_eq!(loaded.file_type, "UTC");
        assert_eq!(loaded.resolve_path("Tag").unwrap(), &GffValue::ResRef("n_test".into()));
        assert_eq!(loaded.resolve_path("ClassList/0/Class").unwrap(), &GffValue::Int(1));
    }

    #[test]
    fn resolve_path_reports_missing_field() {
        let gff = Gff::new("UTC ");
        assert!(matches!(gff.resolve_path("Missing"), Err(PatcherError::GffPathNotFound(_))));
    }

    #[test]
    fn resolve_parent_mut_creates_intermediate_structs() {
        let mut gff = Gff::new("UTC ");
        let (parent, field) = gff.resolve_parent_mut("Outer/Inner").unwrap();
        parent.set(field, GffValue::Int(7));
        assert_eq!(gff.resolve_path("Outer/Inner").unwrap(), &GffValue::Int(7));
    }

    #[test]
    fn resolve_node_mut_returns_list_for_trailing_list_field() {
        let mut gff = Gff::new("UTC ");
        gff.root.set("EntryList", GffValue::List(vec![GffStruct::new(1), GffStruct::new(2)]));
        match gff.resolve_node_mut("EntryList").unwrap() {
            GffNodeMut::List(items) => assert_eq!(items.len(), 2),
            GffNodeMut::Struct(_) => panic!("expected a list node"),
        }
    }

    #[test]
    fn locstring_keeps_per_language_gender_substrings() {
        let mut loc = LocString::default();
        loc.string_ref = -1;
        loc.substrings.insert((0, false), "Hello".into());
        loc.substrings.insert((0, true), "Hello (f)".into());
        let mut gff = Gff::new("UTC ");
        gff.root.set("Name", GffValue::LocString(loc));
        let bytes = gff.save().unwrap();
        let loaded = Gff::load(&bytes).unwrap();
        match loaded.resolve_path("Name").unwrap() {
            GffValue::LocString(l) => {
                assert_eq!(l.substrings.get(&(0, true)).unwrap(), "Hello (f)");
            }
            other => panic!("expected LocString, got {other:?}"),
        }
    }
}
