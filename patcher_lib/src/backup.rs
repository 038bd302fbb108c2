//! Backup ledger: mirrors every destination file this run is about to overwrite into a
//! timestamped backup directory, and emits `uninstall.ps1`/`uninstall.sh` scripts that restore
//! it later.
//!
//! Grounded on `original_source/.../mods/install.py::create_backup`/`create_uninstall_scripts`:
//! one timestamped backup directory per run under `<mod root>/backup/`, a sibling
//! `<mod root>/uninstall/` created lazily on first use, collision-suffixed backup copies
//! (`name (2).ext`, `name (3).ext`, ...) for repeat writes to the same destination within a run,
//! and a `remove these files.txt` ledger for destination paths that didn't exist yet (so
//! uninstall knows to delete rather than restore them).

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use time::OffsetDateTime;

use crate::error::{PatcherError, Result};
use crate::path::CasePath;

#[derive(Debug)]
pub struct BackupLedger {
    backup_dir: PathBuf,
    uninstall_dir: PathBuf,
    /// Lower-cased destination paths already backed up this run, so a file touched by more
    /// than one patch in the same install is only backed up once.
    processed: HashSet<String>,
    uninstall_scripts_written: bool,
}

impl BackupLedger {
    /// `root` is the mod's own working directory (its `tslpatchdata`-equivalent); the backup
    /// directory is `root/backup/<timestamp>`, the uninstall directory `root/uninstall`.
    pub fn new(root: impl AsRef<Path>, timestamp: OffsetDateTime) -> Self {
        let root = root.as_ref();
        BackupLedger {
            backup_dir: root.join("backup").join(format_timestamp(timestamp)),
            uninstall_dir: root.join("uninstall"),
            processed: HashSet::new(),
            uninstall_scripts_written: false,
        }
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Backs up `destination` (a file about to be overwritten or deleted), into an optional
    /// `subdirectory` beneath the backup directory (mirroring the destination's own subtree, so
    /// an `Override/n_test.utc` write backs up to `backup/<timestamp>/Override/n_test.utc`).
    /// A no-op if this exact destination was already backed up earlier in the same run.
    pub fn backup_file(&mut self, destination: &CasePath, subdirectory: Option<&str>, game_root: &Path) -> Result<()> {
        let key = destination.to_string().to_lowercase();
        if self.processed.contains(&key) {
            return Ok(());
        }

        if !self.uninstall_scripts_written {
            fs::create_dir_all(&self.uninstall_dir).map_err(|e| PatcherError::io(&self.uninstall_dir, e))?;
            write_uninstall_scripts(&self.uninstall_dir, &self.backup_dir, game_root)?;
            self.uninstall_scripts_written = true;
        }

        let backup_subdir = match subdirectory {
            Some(sub) => self.backup_dir.join(sub),
            None => self.backup_dir.clone(),
        };

        if destination.safe_is_file().unwrap_or(false) {
            fs::create_dir_all(&backup_subdir).map_err(|e| PatcherError::io(&backup_subdir, e))?;
            let backup_path = self.next_free_backup_path(&backup_subdir, destination);
            fs::copy(destination.as_path(), &backup_path).map_err(|e| PatcherError::io(&backup_path, e))?;
        } else {
            fs::create_dir_all(&self.backup_dir).map_err(|e| PatcherError::io(&self.backup_dir, e))?;
            self.append_removal_line(destination)?;
        }

        self.processed.insert(key);
        Ok(())
    }

    fn next_free_backup_path(&self, dir: &Path, destination: &CasePath) -> PathBuf {
        let stem = destination.stem().unwrap_or_default();
        let suffix = destination.suffix();
        let plain_name = match &suffix {
            Some(s) => format!("{stem}.{s}"),
            None => stem.clone(),
        };
        let mut candidate = dir.join(&plain_name);
        let mut i = 2;
        while candidate.exists() {
            let name = match &suffix {
                Some(s) => format!("{stem} ({i}).{s}"),
                None => format!("{stem} ({i})"),
            };
            candidate = dir.join(name);
            i += 1;
        }
        candidate
    }

    fn append_removal_line(&self, destination: &CasePath) -> Result<()> {
        let list_path = self.backup_dir.join("remove these files.txt");
        let needs_leading_newline = list_path.is_file();
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&list_path)
            .map_err(|e| PatcherError::io(&list_path, e))?;
        if needs_leading_newline {
            writeln!(file).map_err(|e| PatcherError::io(&list_path, e))?;
        }
        write!(file, "{destination}").map_err(|e| PatcherError::io(&list_path, e))?;
        Ok(())
    }
}

fn format_timestamp(t: OffsetDateTime) -> String {
    format!(
        "{:04}-{:02}-{:02}_{:02}.{:02}.{:02}",
        t.year(),
        u8::from(t.month()),
        t.day(),
        t.hour(),
        t.minute(),
        t.second()
    )
}

/// Writes the PowerShell/POSIX-shell uninstall scripts into `uninstall_dir`: each deletes every
/// path listed in the backup's `remove these files.txt` (files this run created fresh) and
/// restores every other file the backup mirrors (files this run overwrote), rooted at
/// `game_root`.
fn write_uninstall_scripts(uninstall_dir: &Path, backup_dir: &Path, game_root: &Path) -> Result<()> {
    let backup_display = backup_dir.display();
    let game_display = game_root.display();

    let ps1_path = uninstall_dir.join("uninstall.ps1");
    let ps1 = format!(
        r#"#!/usr/bin/env pwsh
$backupFolder = "{backup_display}"
$gameFolder = "{game_display}"
$deleteListFile = Join-Path $backupFolder "remove these files.txt"
if (Test-Path -LiteralPath $deleteListFile) {{
    Get-Content -LiteralPath $deleteListFile | ForEach-Object {{
        if ($_ -and (Test-Path -LiteralPath $_)) {{
            Remove-Item -LiteralPath $_ -Force
            Write-Host "Removed $_"
        }}
    }}
}}
Get-ChildItem -LiteralPath $backupFolder -Recurse -File | Where-Object {{ $_.Name -ne "remove these files.txt" }} | ForEach-Object {{
    $relative = $_.FullName.Substring($backupFolder.Length).TrimStart("\", "/")
    $destination = Join-Path $gameFolder $relative
    New-Item -ItemType Directory -Force -Path (Split-Path $destination) | Out-Null
    Copy-Item -LiteralPath $_.FullName -Destination $destination -Force
    Write-Host "Restored $relative"
}}
"#
    );
    fs::write(&ps1_path, ps1).map_err(|e| PatcherError::io(&ps1_path, e))?;

    let sh_path = uninstall_dir.join("uninstall.sh");
    let sh = format!(
        r#"#!/bin/bash
backup_folder="{backup_display}"
game_folder="{game_display}"
delete_list_file="$backup_folder/remove these files.txt"
if [[ -f "$delete_list_file" ]]; then
    while IFS= read -r path; do
        if [[ -n "$path" && -f "$path" ]]; then
            rm -f "$path"
            echo "Removed $path"
        fi
    done < "$delete_list_file"
fi
find "$backup_folder" -type f ! -name 'remove these files.txt' -print0 | while IFS= read -r -d $'\0' file; do
    relative="${{file#$backup_folder/}}"
    destination="$game_folder/$relative"
    mkdir -p "$(dirname "$destination")"
    cp "$file" "$destination"
    echo "Restored $relative"
done
"#
    );
    fs::write(&sh_path, sh).map_err(|e| PatcherError::io(&sh_path, e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use time::macros::datetime;

    #[test]
    fn backing_up_existing_file_creates_collision_suffixed_copies() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Override")).unwrap();
        let target = dir.path().join("Override").join("n_test.utc");
        fs::write(&target, b"v1").unwrap();

        let mut ledger = BackupLedger::new(dir.path(), datetime!(2024-01-01 12:00:00 UTC));
        let case_path = CasePath::new(&target);
        ledger.backup_file(&case_path, Some("Override"), dir.path()).unwrap();

        let backed_up = ledger.backup_dir().join("Override").join("n_test.utc");
        assert!(backed_up.is_file());
        assert_eq!(fs::read(&backed_up).unwrap(), b"v1");
    }

    #[test]
    fn backing_up_missing_destination_appends_to_removal_list() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("Override").join("n_new.utc");

        let mut ledger = BackupLedger::new(dir.path(), datetime!(2024-01-01 12:00:00 UTC));
        let case_path = CasePath::new(&target);
        ledger.backup_file(&case_path, Some("Override"), dir.path()).unwrap();

        let list = fs::read_to_string(ledger.backup_dir().join("remove these files.txt")).unwrap();
        assert!(list.contains("n_new.utc"));
    }

    #[test]
    fn repeated_backup_of_same_destination_is_a_no_op() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Override")).unwrap();
        let target = dir.path().join("Override").join("n_test.utc");
        fs::write(&target, b"v1").unwrap();

        let mut ledger = BackupLedger::new(dir.path(), datetime!(2024-01-01 12:00:00 UTC));
        let case_path = CasePath::new(&target);
        ledger.backup_file(&case_path, Some("Override"), dir.path()).unwrap();
        ledger.backup_file(&case_path, Some("Override"), dir.path()).unwrap();

        let entries: Vec<_> = fs::read_dir(ledger.backup_dir().join("Override")).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
