//! `namespaces.ini`: the catalog a multi-mod archive exposes so the CLI can offer a choice of
//! which sub-mod to install, rather than assuming a single `changes.ini` at the mod root.
//!
//! Grounded on `original_source/.../reader.py::NamespaceReader` (`[Namespaces]` section lists
//! namespace ids in declaration order; each id is itself a section naming `IniName`/`InfoName`
//! and optional `DataPath`/`Name`/`Description`).

use std::path::{Path, PathBuf};

use getset::Getters;

use crate::error::{PatcherError, Result};
use crate::ini::RawIni;

/// One selectable entry from `namespaces.ini`.
#[derive(Debug, Clone, Getters)]
#[getset(get = "pub")]
pub struct Namespace {
    namespace_id: String,
    /// Instruction file this entry points at, e.g. `changes.ini`.
    ini_filename: String,
    /// Info/readme file this entry points at, e.g. `info.rtf`.
    info_filename: String,
    /// Subdirectory holding this entry's own mod tree, relative to the namespace file's
    /// directory; `None` means the mod tree is the namespace file's own directory.
    data_folder: Option<String>,
    /// Human-readable name shown in a selection prompt; falls back to `namespace_id` when absent.
    name: Option<String>,
    description: Option<String>,
}

impl Namespace {
    /// The directory this namespace's instruction file and mod tree live in, relative to the
    /// directory `namespaces.ini` itself was read from.
    pub fn resolve_root(&self, namespaces_dir: &Path) -> PathBuf {
        match &self.data_folder {
            Some(sub) => namespaces_dir.join(sub),
            None => namespaces_dir.to_path_buf(),
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.namespace_id)
    }
}

/// Reads every `[Namespaces]`-listed entry from a `namespaces.ini` file, in declaration order.
pub fn read_namespaces(path: &Path) -> Result<Vec<Namespace>> {
    let ini = RawIni::from_path(path)?;

    let namespaces_section = ini
        .section("Namespaces")
        .ok_or_else(|| PatcherError::MissingIniHeader { name: "Namespaces".to_string() })?;

    let mut namespaces = Vec::new();
    for entry in namespaces_section {
        let Some(namespace_id) = entry.value.as_deref() else { continue };
        if !ini.has_section(namespace_id) {
            return Err(PatcherError::MissingIniHeader { name: namespace_id.to_string() });
        }

        let get = |key: &str| ini.get(namespace_id, key).map(str::to_string);
        let ini_filename = get("IniName").ok_or_else(|| PatcherError::UnrecognizedMandatoryKey {
            section: namespace_id.to_string(),
            key: "IniName".to_string(),
        })?;
        let info_filename = get("InfoName").ok_or_else(|| PatcherError::UnrecognizedMandatoryKey {
            section: namespace_id.to_string(),
            key: "InfoName".to_string(),
        })?;

        namespaces.push(Namespace {
            namespace_id: namespace_id.to_string(),
            ini_filename,
            info_filename,
            data_folder: get("DataPath"),
            name: get("Name"),
            description: get("Description"),
        });
    }

    Ok(namespaces)
}

/// Selects a namespace by its position in `read_namespaces`'s returned order, matching the CLI's
/// `--namespace-option-index` flag.
pub fn select_by_index(namespaces: &[Namespace], index: usize) -> Result<&Namespace> {
    namespaces
        .get(index)
        .ok_or_else(|| PatcherError::NamespaceIndexOutOfRange { index, available: namespaces.len() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_namespaces(dir: &Path, contents: &str) -> PathBuf {
        let path = dir.join("namespaces.ini");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn reads_namespaces_in_declaration_order() {
        let dir = tempdir().unwrap();
        let path = write_namespaces(
            dir.path(),
            "[Namespaces]\nNamespace0=Base\nNamespace1=Expansion\n\n\
             [Base]\nIniName=changes.ini\nInfoName=info.rtf\nName=Base Mod\n\n\
             [Expansion]\nIniName=changes.ini\nInfoName=info.rtf\nDataPath=expansion\nName=Expansion Pack\n",
        );
        let namespaces = read_namespaces(&path).unwrap();
        assert_eq!(namespaces.len(), 2);
        assert_eq!(namespaces[0].display_name(), "Base Mod");
        assert_eq!(namespaces[1].data_folder().as_deref(), Some("expansion"));
    }

    #[test]
    fn select_by_index_out_of_range_is_reported() {
        let dir = tempdir().unwrap();
        let path = write_namespaces(
            dir.path(),
            "[Namespaces]\nNamespace0=Base\n\n[Base]\nIniName=changes.ini\nInfoName=info.rtf\n",
        );
        let namespaces = read_namespaces(&path).unwrap();
        assert!(matches!(
            select_by_index(&namespaces, 5),
            Err(PatcherError::NamespaceIndexOutOfRange { index: 5, available: 1 })
        ));
    }
}
