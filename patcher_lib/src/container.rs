//! Install destinations: a loose folder on disk, or an archive (ERF/RIM/MOD-style) file.
//!
//! Both destinations are addressed the same way by the patch algorithms: a case-insensitive
//! relative path in, raw bytes out. Grounded on `files/mod.rs`'s `Container` trait (`insert`/
//! `remove`/`files`/`files_mut` over an `RFile` map, keyed by path) — generalized here from an
//! `RFile`-keyed `HashMap` to a plain `Vec<u8>`-keyed one, since this engine never needs the
//! teacher's lazy-loading or decode-on-demand machinery, only raw bytes in and out.
//!
//! The archive byte layout (header/entry-table/blob) is this crate's own scheme — see
//! `formats::mod`'s doc comment on why container byte layouts are not reproduced byte-exactly —
//! modeled in shape on `files/pack/mod.rs`'s header + index + data-block structure.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read};

use crate::error::{PatcherError, Result};
use crate::path::CasePath;

/// Path of a single entry within a [`Container`], relative to its root, always with `/`
/// separators regardless of host platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryPath(String);

impl EntryPath {
    pub fn new(path: impl Into<String>) -> Self {
        EntryPath(path.into().replace('\\', "/"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn fold(&self) -> String {
        caseless::default_case_fold_str(&self.0)
    }
}

/// A destination an [`InstallFile`](crate::program::Patch::InstallFile) step can target: a loose
/// folder on disk, or an in-memory archive later flushed to a single file.
pub trait Container {
    /// Inserts or overwrites an entry, matching an existing entry case-insensitively if one
    /// exists so a repeated install doesn't create a sibling with different casing.
    fn insert(&mut self, path: EntryPath, data: Vec<u8>) {
        let existing_key = self
            .files()
            .keys()
            .find(|k| caseless::default_case_fold_str(k) == path.fold())
            .cloned();
        let key = existing_key.unwrap_or_else(|| path.as_str().to_string());
        self.files_mut().insert(key, data);
    }

    fn remove(&mut self, path: &EntryPath) -> bool {
        let key = self.files().keys().find(|k| caseless::default_case_fold_str(k) == path.fold()).cloned();
        match key {
            Some(k) => {
                self.files_mut().remove(&k);
                true
            }
            None => false,
        }
    }

    fn get(&self, path: &EntryPath) -> Option<&[u8]> {
        self.files()
            .iter()
            .find(|(k, _)| caseless::default_case_fold_str(k) == path.fold())
            .map(|(_, v)| v.as_slice())
    }

    fn contains(&self, path: &EntryPath) -> bool {
        self.get(path).is_some()
    }

    fn paths(&self) -> Vec<EntryPath> {
        self.files().keys().map(|k| EntryPath::new(k.clone())).collect()
    }

    fn files(&self) -> &HashMap<String, Vec<u8>>;
    fn files_mut(&mut self) -> &mut HashMap<String, Vec<u8>>;
}

/// A loose directory on disk. Entries are loaded lazily on first `get`/`insert` touch is not
/// attempted — the whole tree is read up front by [`FolderContainer::open`], matching the
/// engine's append-only, single-pass-per-run usage.
#[derive(Debug, Default)]
pub struct FolderContainer {
    root: PathBuf,
    files: HashMap<String, Vec<u8>>,
}

impl FolderContainer {
    /// Opens (and creates, if missing) `root` as a folder container, reading every file beneath
    /// it into memory keyed by its path relative to `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| PatcherError::io(&root, e))?;
        let mut files = HashMap::new();
        read_dir_recursive(&root, &root, &mut files)?;
        Ok(FolderContainer { root, files })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes every in-memory entry back to disk, resolving each path case-insensitively
    /// against the existing tree so a Windows-authored mod doesn't create duplicate-cased
    /// siblings on a case-sensitive filesystem.
    pub fn flush(&self) -> Result<()> {
        for (relative, data) in &self.files {
            let target = CasePath::new(&self.root).join(relative).resolve();
            if let Some(parent) = target.as_path().parent() {
                fs::create_dir_all(parent).map_err(|e| PatcherError::io(parent, e))?;
            }
            fs::write(target.as_path(), data).map_err(|e| PatcherError::io(target.as_path(), e))?;
        }
        Ok(())
    }
}

impl Container for FolderContainer {
    fn files(&self) -> &HashMap<String, Vec<u8>> {
        &self.files
    }

    fn files_mut(&mut self) -> &mut HashMap<String, Vec<u8>> {
        &mut self.files
    }
}

fn read_dir_recursive(root: &Path, dir: &Path, out: &mut HashMap<String, Vec<u8>>) -> Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return Ok(()),
    };
    for entry in entries {
        let entry = entry.map_err(|e| PatcherError::io(dir, e))?;
        let path = entry.path();
        if path.is_dir() {
            read_dir_recursive(root, &path, out)?;
        } else {
            let relative = path.strip_prefix(root).unwrap_or(&path).to_string_lossy().replace('\\', "/");
            let data = fs::read(&path).map_err(|e| PatcherError::io(&path, e))?;
            out.insert(relative, data);
        }
    }
    Ok(())
}

const ARCHIVE_FILE_TYPE: &[u8; 4] = b"ARC ";
const ARCHIVE_VERSION: &[u8; 4] = b"V1.0";

/// An in-memory archive (stands in for ERF/RIM/MOD-style single-file containers). Flushed to a
/// single file with [`ArchiveContainer::save`]; loaded back with [`ArchiveContainer::load`].
#[derive(Debug, Default)]
pub struct ArchiveContainer {
    files: HashMap<String, Vec<u8>>,
}

impl ArchiveContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let mut file_type = [0u8; 4];
        let mut version = [0u8; 4];
        cursor.read_exact(&mut file_type)?;
        cursor.read_exact(&mut version)?;
        if &file_type != ARCHIVE_FILE_TYPE || &version != ARCHIVE_VERSION {
            return Err(PatcherError::Other("not a recognized archive container".to_string()));
        }
        let count = cursor.read_u32::<LittleEndian>()?;
        let mut files = HashMap::with_capacity(count as usize);
        for _ in 0..count {
            let name_len = cursor.read_u32::<LittleEndian>()? as usize;
            let mut name_buf = vec![0u8; name_len];
            cursor.read_exact(&mut name_buf)?;
            let name = String::from_utf8_lossy(&name_buf).into_owned();
            let data_len = cursor.read_u32::<LittleEndian>()? as usize;
            let mut data = vec![0u8; data_len];
            cursor.read_exact(&mut data)?;
            files.insert(name, data);
        }
        Ok(ArchiveContainer { files })
    }

    pub fn save(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        out.extend_from_slice(ARCHIVE_FILE_TYPE);
        out.extend_from_slice(ARCHIVE_VERSION);
        out.write_u32::<LittleEndian>(self.files.len() as u32)?;
        let mut names: Vec<&String> = self.files.keys().collect();
        names.sort();
        for name in names {
            let data = &self.files[name];
            out.write_u32::<LittleEndian>(name.len() as u32)?;
            out.extend_from_slice(name.as_bytes());
            out.write_u32::<LittleEndian>(data.len() as u32)?;
            out.extend_from_slice(data);
        }
        Ok(out)
    }
}

impl Container for ArchiveContainer {
    fn files(&self) -> &HashMap<String, Vec<u8>> {
        &self.files
    }

    fn files_mut(&mut self) -> &mut HashMap<String, Vec<u8>> {
        &mut self.files
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn folder_container_round_trips_through_flush_and_reopen() {
        let dir = tempdir().unwrap();
        let mut container = FolderContainer::open(dir.path()).unwrap();
        container.insert(EntryPath::new("override/n_test.utc"), b"hello".to_vec());
        container.flush().unwrap();

        let reopened = FolderContainer::open(dir.path()).unwrap();
        assert_eq!(reopened.get(&EntryPath::new("Override/N_Test.UTC")), Some(b"hello".as_slice()));
    }

    #[test]
    fn insert_matches_existing_entry_case_insensitively() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("Override")).unwrap();
        std::fs::write(dir.path().join("Override").join("Dialog.TLK"), b"old").unwrap();
        let mut container = FolderContainer::open(dir.path()).unwrap();

        container.insert(EntryPath::new("override/dialog.tlk"), b"new".to_vec());
        assert_eq!(container.files().len(), 1);
        assert_eq!(container.get(&EntryPath::new("OVERRIDE/DIALOG.TLK")), Some(b"new".as_slice()));
    }

    #[test]
    fn archive_container_round_trips_through_save_and_load() {
        let mut archive = ArchiveContainer::new();
        archive.insert(EntryPath::new("n_test.nss"), b"void main() {}".to_vec());
        let bytes = archive.save().unwrap();
        let loaded = ArchiveContainer::load(&bytes).unwrap();
        assert_eq!(loaded.get(&EntryPath::new("n_test.nss")), Some(b"void main() {}".as_slice()));
    }
}
