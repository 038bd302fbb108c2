//! Case-insensitive, case-preserving path resolution.
//!
//! The game trees this engine patches were authored on a case-preserving-but-insensitive
//! filesystem; the engine itself frequently runs on one that is not. `CasePath` wraps a
//! logical, unresolved path and only touches disk when `resolve` is called, per SPEC_FULL.md
//! §4.1 / §9 ("avoid resolving eagerly in the parser").
//!
//! Grounded on `examples/original_source/pykotor/tools/path.py::resolve_case_insensitive`
//! for the component-walk algorithm, and `locate_game_path` for install-path discovery.

use std::fs;
use std::path::{Component, Path, PathBuf};

use caseless::default_case_fold_str;

/// A path that compares and hashes case-insensitively but preserves the case it was built with.
#[derive(Debug, Clone)]
pub struct CasePath {
    inner: PathBuf,
}

impl CasePath {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CasePath { inner: path.into() }
    }

    pub fn as_path(&self) -> &Path {
        &self.inner
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.inner
    }

    fn fold(s: &str) -> String {
        default_case_fold_str(s)
    }

    pub fn join(&self, segment: impl AsRef<Path>) -> Self {
        CasePath::new(self.inner.join(segment))
    }

    pub fn parent(&self) -> Option<CasePath> {
        self.inner.parent().map(CasePath::new)
    }

    pub fn name(&self) -> Option<String> {
        self.inner.file_name().map(|n| n.to_string_lossy().into_owned())
    }

    pub fn stem(&self) -> Option<String> {
        self.inner.file_stem().map(|n| n.to_string_lossy().into_owned())
    }

    pub fn suffix(&self) -> Option<String> {
        self.inner.extension().map(|n| n.to_string_lossy().into_owned())
    }

    pub fn with_suffix(&self, suffix: &str) -> CasePath {
        CasePath::new(self.inner.with_extension(suffix))
    }

    pub fn relative_to(&self, base: &CasePath) -> Option<PathBuf> {
        self.inner.strip_prefix(&base.inner).ok().map(|p| p.to_path_buf())
    }

    pub fn is_relative_to(&self, base: &CasePath) -> bool {
        self.inner.starts_with(&base.inner)
    }

    /// Splits the file name around the `n`-th dot from the left (`n > 0`) or the right
    /// (`n < 0`). Falls back to the single available dot if fewer dots exist than requested.
    /// `n == 0` is a programmer error.
    pub fn split_filename(&self, dots: i32) -> (String, String) {
        assert!(dots != 0, "split_filename: dots must be nonzero");
        let name = self.name().unwrap_or_default();
        let dot_positions: Vec<usize> = name
            .char_indices()
            .filter(|(_, c)| *c == '.')
            .map(|(i, _)| i)
            .collect();
        if dot_positions.is_empty() {
            return (name, String::new());
        }
        let idx = if dots > 0 {
            let want = (dots as usize).saturating_sub(1);
            *dot_positions.get(want).unwrap_or_else(|| dot_positions.last().unwrap())
        } else {
            let want = dot_positions.len().saturating_sub((-dots) as usize);
            *dot_positions.get(want).unwrap_or_else(|| dot_positions.first().unwrap())
        };
        let (head, tail) = name.split_at(idx);
        (head.to_string(), tail.trim_start_matches('.').to_string())
    }

    /// Resolves against the real filesystem: walks `self`'s components, and at each step
    /// matches an existing child case-insensitively, tie-breaking on the longest
    /// case-exact prefix then lexicographic order. The tail past the first missing
    /// component is appended verbatim.
    pub fn resolve(&self) -> CasePath {
        let mut resolved = PathBuf::new();
        let mut cursor = PathBuf::new();
        let mut components = self.inner.components().peekable();
        let mut broke = false;

        while let Some(component) = components.next() {
            match component {
                Component::Prefix(_) | Component::RootDir => {
                    resolved.push(component.as_os_str());
                    cursor.push(component.as_os_str());
                    continue;
                }
                Component::CurDir => continue,
                Component::ParentDir => {
                    resolved.push("..");
                    cursor.push("..");
                    continue;
                }
                Component::Normal(part) => {
                    if broke {
                        resolved.push(part);
                        continue;
                    }
                    let part_str = part.to_string_lossy();
                    match Self::best_child(&cursor, &part_str) {
                        Some(actual) => {
                            resolved.push(&actual);
                            cursor.push(&actual);
                        }
                        None => {
                            broke = true;
                            resolved.push(part);
                        }
                    }
                }
            }
        }

        CasePath::new(resolved)
    }

    fn best_child(dir: &Path, wanted: &str) -> Option<String> {
        let entries = Self::safe_read_dir(dir)?;
        let wanted_fold = Self::fold(wanted);

        let mut best: Option<String> = None;
        let mut best_prefix_len = 0usize;

        for entry_name in entries {
            if Self::fold(&entry_name) != wanted_fold {
                continue;
            }
            let prefix_len = wanted
                .chars()
                .zip(entry_name.chars())
                .take_while(|(a, b)| a == b)
                .count();
            let better = match &best {
                None => true,
                Some(current) => {
                    prefix_len > best_prefix_len
                        || (prefix_len == best_prefix_len && entry_name < *current)
                }
            };
            if better {
                best = Some(entry_name);
                best_prefix_len = prefix_len;
            }
        }
        best
    }

    fn safe_read_dir(dir: &Path) -> Option<Vec<String>> {
        if dir.as_os_str().is_empty() {
            return Some(Vec::new());
        }
        match fs::read_dir(dir) {
            Ok(iter) => Some(
                iter.filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect(),
            ),
            Err(_) => None,
        }
    }

    /// Returns `None` instead of propagating permission errors.
    pub fn safe_exists(&self) -> Option<bool> {
        match fs::symlink_metadata(&self.inner) {
            Ok(_) => Some(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Some(false),
            Err(_) => None,
        }
    }

    pub fn safe_is_file(&self) -> Option<bool> {
        match fs::metadata(&self.inner) {
            Ok(m) => Some(m.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Some(false),
            Err(_) => None,
        }
    }

    pub fn safe_is_dir(&self) -> Option<bool> {
        match fs::metadata(&self.inner) {
            Ok(m) => Some(m.is_dir()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Some(false),
            Err(_) => None,
        }
    }
}

impl PartialEq for CasePath {
    fn eq(&self, other: &Self) -> bool {
        Self::fold(&self.inner.to_string_lossy()) == Self::fold(&other.inner.to_string_lossy())
    }
}
impl Eq for CasePath {}

impl std::hash::Hash for CasePath {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        Self::fold(&self.inner.to_string_lossy()).hash(state);
    }
}

impl From<PathBuf> for CasePath {
    fn from(p: PathBuf) -> Self {
        CasePath::new(p)
    }
}

impl std::fmt::Display for CasePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner.display())
    }
}

/// `1` or `2`, mirroring `Settings.LookupGameNumber`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameNumber {
    One,
    Two,
}

/// Enumerates the platform-conventional KOTOR 1/2 install locations that exist on disk.
///
/// Not load-bearing for the engine (which always takes an explicit game path); a convenience
/// for the CLI's interactive game-directory prompt. Grounded on
/// `original_source/pykotor/tools/path.py::locate_game_path`'s hardcoded Steam/GOG tables,
/// reimplemented against the `steamlocate` crate (already a teacher dependency) for the Steam
/// case, with the non-Steam fallback directories from the original kept as literal candidates.
pub fn find_known_install_paths(game: GameNumber) -> Vec<PathBuf> {
    let app_id: u32 = match game {
        GameNumber::One => 32370,
        GameNumber::Two => 208580,
    };

    let mut found = Vec::new();

    if let Ok(steamdir) = steamlocate::SteamDir::locate() {
        if let Ok(Some((app, library))) = steamdir.find_app(app_id) {
            found.push(library.resolve_app_dir(&app));
        }
    }

    let mut candidates: Vec<PathBuf> = Vec::new();
    let name = match game {
        GameNumber::One => "Star Wars - Knights of the Old Republic",
        GameNumber::Two => "Star Wars - Knights of the Old Republic II",
    };
    if cfg!(target_os = "windows") {
        candidates.push(PathBuf::from(format!(r"C:\Program Files (x86)\Steam\steamapps\common\{name}")));
        candidates.push(PathBuf::from(format!(r"C:\GOG Games\{name}")));
    } else if cfg!(target_os = "macos") {
        if let Some(home) = dirs_home() {
            candidates.push(home.join(format!(
                "Library/Application Support/Steam/steamapps/common/{name}"
            )));
        }
    } else {
        if let Some(home) = dirs_home() {
            candidates.push(home.join(format!(".steam/steam/steamapps/common/{name}")));
            candidates.push(home.join(format!(".local/share/Steam/steamapps/common/{name}")));
        }
    }

    for candidate in candidates {
        if candidate.is_dir() {
            found.push(candidate);
        }
    }

    found.sort();
    found.dedup();
    found
}

fn dirs_home() -> Option<PathBuf> {
    directories::UserDirs::new().map(|d| d.home_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn resolve_matches_case_insensitively() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("Override")).unwrap();
        std::fs::write(dir.path().join("Override").join("Dialog.TLK"), b"x").unwrap();

        let p = CasePath::new(dir.path()).join("override").join("dialog.tlk");
        let resolved = p.resolve();
        assert!(resolved.safe_exists().unwrap_or(false));
        assert_eq!(resolved.name().unwrap(), "Dialog.TLK");
    }

    #[test]
    fn resolve_is_idempotent() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("Override")).unwrap();

        let p = CasePath::new(dir.path()).join("OVERRIDE");
        let once = p.resolve();
        let twice = once.resolve();
        assert_eq!(once.as_path(), twice.as_path());
    }

    #[test]
    fn resolve_falls_back_to_literal_past_missing_component() {
        let dir = tempdir().unwrap();
        let p = CasePath::new(dir.path()).join("Nonexistent").join("Still/Here.txt");
        let resolved = p.resolve();
        assert!(resolved.as_path().ends_with("Nonexistent/Still/Here.txt"));
    }

    #[test]
    fn case_insensitive_equality_and_hash() {
        let a = CasePath::new("/Game/Override/Dialog.TLK");
        let b = CasePath::new("/game/override/dialog.tlk");
        assert_eq!(a, b);

        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};
        let mut ha = DefaultHasher::new();
        let mut hb = DefaultHasher::new();
        a.hash(&mut ha);
        b.hash(&mut hb);
        assert_eq!(ha.finish(), hb.finish());
    }

    #[test]
    fn split_filename_from_left_and_right() {
        let p = CasePath::new("archive.tar.gz");
        assert_eq!(p.split_filename(1), ("archive".to_string(), "tar.gz".to_string()));
        assert_eq!(p.split_filename(-1), ("archive.tar".to_string(), "gz".to_string()));
    }
}
