//! The execution driver: runs a parsed [`PatchProgram`] against a real game directory in a
//! fixed order, routing each patch kind through its own algorithm in `crate::patch` and its own
//! on-disk/in-archive resource.
//!
//! Grounded on SPEC_FULL.md §4.9's list ordering (`InstallList` → `TLKList` → `2DAList` →
//! `GFFList` → `HACKList` → `CompileList`/`NSSList` → `SSFList`; `HACKList` placed between
//! `GFFList` and `CompileList` per the already-recorded Open Question decision) and on
//! `original_source/.../patcher.py`'s single-pass-through-every-list driver shape, generalized
//! from its per-list Python loop into one Rust function per list plus a shared [`Destinations`]
//! resource router standing in for its direct filesystem calls.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::backup::BackupLedger;
use crate::compiler::{CompileOutcome, Compiler};
use crate::container::{ArchiveContainer, Container, EntryPath, FolderContainer};
use crate::error::{PatcherError, Result};
use crate::formats::{Gff, Ssf, Tlk, TwoDa};
use crate::ini::RawIni;
use crate::logger::PatchLogger;
use crate::memory::PatcherMemory;
use crate::patch::{self, PatchOutcome};
use crate::path::CasePath;
use crate::program::{OverrideType, PatchProgram};

/// `dialog.tlk`'s on-disk name and its female companion, which some installs ship (falls back
/// silently to the male table when absent, per the recorded Open Question decision).
const MALE_TLK: &str = "dialog.tlk";
const FEMALE_TLK: &str = "dialogf.tlk";
const ARCHIVE_EXTENSIONS: &[&str] = &["mod", "erf", "rim", "sav"];

pub struct InstallReport {
    pub memory: PatcherMemory,
    pub logger: PatchLogger,
    /// Total entries processed across every list, for a front end's closing summary line.
    pub patches: usize,
}

/// Runs every list in `program` against `game_root`, in fixed order. `mod_root` is where the
/// mod's own bundled resources (its `tslpatchdata`-equivalent) live; `compiler`, when present,
/// compiles `CompileList` scripts, otherwise those entries are skipped with a warning.
pub fn install(
    program: &PatchProgram,
    mod_root: &CasePath,
    game_root: &CasePath,
    compiler: Option<&Compiler>,
    backup: &mut BackupLedger,
) -> Result<InstallReport> {
    let mut memory = PatcherMemory::new();
    let mut logger = PatchLogger::new(program.settings().log_level().unwrap_or_default());
    let mut destinations = Destinations::open(game_root)?;

    run_install_list(program, mod_root, &mut destinations, backup, &mut logger)?;
    run_tlk_list(program, game_root, backup, &mut memory, &mut logger)?;
    run_two_da_list(program, mod_root, &mut destinations, backup, &mut memory, &mut logger)?;
    run_gff_list(program, mod_root, &mut destinations, backup, &mut memory, &mut logger)?;
    run_hack_list(program, mod_root, &mut destinations, backup, &mut memory, &mut logger)?;
    run_nss_list(program, mod_root, &mut destinations, backup, compiler, &mut memory, &mut logger)?;
    run_ssf_list(program, mod_root, &mut destinations, backup, &mut memory, &mut logger)?;

    destinations.flush()?;
    let patches = program.install().len()
        + program.tlk().len()
        + program.two_da().len()
        + program.gff().len()
        + program.hack().len()
        + program.nss().len()
        + program.ssf().len();
    Ok(InstallReport { memory, logger, patches })
}

/// Parses `changes_ini_path` and runs [`install`] against it, the single entry point a host
/// (the CLI, or any embedder) needs for a full install. Backup directory naming is the caller's
/// responsibility (it owns the timestamp), matching `backup` being passed in already opened.
pub fn run_install(
    mod_root: &CasePath,
    game_root: &CasePath,
    changes_ini_path: &Path,
    compiler: Option<&Compiler>,
    backup: &mut BackupLedger,
) -> Result<InstallReport> {
    let raw = RawIni::from_path(changes_ini_path)
        .map_err(|_| PatcherError::ChangesIniNotFound(changes_ini_path.to_path_buf()))?;
    let program = crate::parser::parse(&raw)?;
    check_required_file(&program, game_root)?;
    install(&program, mod_root, game_root, compiler, backup)
}

/// `[Settings]`'s `Required`/`RequiredMsg`: a fatal precondition guarding against installing
/// over a game that's missing some other mod this one depends on. Exposed for callers that parse
/// a program themselves (e.g. to override a setting) and so call [`install`] directly rather than
/// going through [`run_install`].
pub fn check_required_file(program: &PatchProgram, game_root: &CasePath) -> Result<()> {
    let Some(required) = program.settings().required_file() else {
        return Ok(());
    };
    let path = game_root.join("Override").join(required).resolve();
    if path.safe_is_file().unwrap_or(false) {
        return Ok(());
    }
    let message = program
        .settings()
        .required_message()
        .clone()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| "cannot install - missing a required mod".to_string());
    Err(PatcherError::RequiredFileMissing { path: path.into_path_buf(), message })
}

/// The result of validating an instruction file without touching the filesystem for write
/// purposes: the parsed program, so a caller can inspect list sizes, plus whether every
/// `SourceFile` it names actually exists under `mod_root`.
pub struct ValidationReport {
    pub program: PatchProgram,
}

/// Runs only the instruction parser against `changes_ini_path`, then checks that every source
/// file it references exists somewhere under `mod_root` (existence only, never reading the
/// referenced files' contents). `TLKList` entries have no source file of their own (they patch
/// `dialog.tlk`/`dialogf.tlk` directly at install time) and so are not checked here.
pub fn validate(mod_root: &CasePath, changes_ini_path: &Path) -> Result<ValidationReport> {
    let raw = RawIni::from_path(changes_ini_path)
        .map_err(|_| PatcherError::ChangesIniNotFound(changes_ini_path.to_path_buf()))?;
    let program = crate::parser::parse(&raw)?;

    for entry in program.install() {
        check_source_exists(mod_root, entry.header.source_file())?;
    }
    for entry in program.two_da() {
        check_source_exists(mod_root, entry.header.source_file())?;
    }
    for entry in program.gff() {
        check_source_exists(mod_root, entry.header.source_file())?;
    }
    for entry in program.hack() {
        check_source_exists(mod_root, entry.header.source_file())?;
    }
    for entry in program.nss() {
        check_source_exists(mod_root, entry.header.source_file())?;
    }
    for entry in program.ssf() {
        check_source_exists(mod_root, entry.header.source_file())?;
    }

    Ok(ValidationReport { program })
}

fn check_source_exists(mod_root: &CasePath, filename: &str) -> Result<()> {
    let path = mod_root.join(filename).resolve();
    match path.safe_is_file() {
        Some(true) => Ok(()),
        _ => Err(PatcherError::ReferencedFileMissing {
            key: "SourceFile".to_string(),
            value: filename.to_string(),
            path: path.into_path_buf(),
        }),
    }
}

/// Tally of what [`uninstall`] did against one backup.
pub struct UninstallReport {
    pub restored: usize,
    pub removed: usize,
}

/// Restores `game_root` from the most recent backup under `mod_root/backup/`: every file the
/// backup mirrors is copied back over its original destination, then every path listed in that
/// backup's `remove these files.txt` (files the install created fresh) is deleted. A missing or
/// empty backup directory is a [`PatcherError::BackupNotFound`]; mismatched files underneath it
/// are reported to `logger` rather than aborting the run.
pub fn uninstall(mod_root: &CasePath, game_root: &CasePath, logger: &mut PatchLogger) -> Result<UninstallReport> {
    let backup_root = mod_root.as_path().join("backup");
    let backup_dir = latest_backup_dir(&backup_root)?;
    restore_from_backup(&backup_dir, game_root.as_path(), logger)
}

fn latest_backup_dir(backup_root: &Path) -> Result<PathBuf> {
    let entries = std::fs::read_dir(backup_root).map_err(|_| PatcherError::BackupNotFound(backup_root.to_path_buf()))?;
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    dirs.pop().ok_or_else(|| PatcherError::BackupNotFound(backup_root.to_path_buf()))
}

fn restore_from_backup(backup_dir: &Path, game_root: &Path, logger: &mut PatchLogger) -> Result<UninstallReport> {
    let mut restored = 0usize;
    let mut removed = 0usize;

    let removal_list = backup_dir.join("remove these files.txt");
    if removal_list.is_file() {
        let contents = std::fs::read_to_string(&removal_list).map_err(|e| PatcherError::io(&removal_list, e))?;
        for line in contents.lines().filter(|l| !l.is_empty()) {
            let path = PathBuf::from(line);
            if path.is_file() {
                std::fs::remove_file(&path).map_err(|e| PatcherError::io(&path, e))?;
                removed += 1;
                logger.add_note(format!("removed {}", path.display()));
            } else {
                logger.add_warning(format!("expected to remove {} but it was not present", path.display()));
            }
        }
    }

    let mirrored: Vec<PathBuf> = walk_files(backup_dir)?
        .into_iter()
        .filter(|f| f.file_name().and_then(|n| n.to_str()) != Some("remove these files.txt"))
        .collect();

    // Each file's copy is independent of every other, so the actual disk I/O runs in parallel;
    // the per-file bookkeeping below (counting, logging) stays sequential.
    let copies: Vec<Result<PathBuf>> = mirrored
        .par_iter()
        .map(|file| {
            let relative = file.strip_prefix(backup_dir).expect("walked from backup_dir");
            let destination = game_root.join(relative);
            if let Some(parent) = destination.parent() {
                std::fs::create_dir_all(parent).map_err(|e| PatcherError::io(parent, e))?;
            }
            std::fs::copy(file, &destination).map_err(|e| PatcherError::io(&destination, e))?;
            Ok(destination)
        })
        .collect();

    for copy in copies {
        let destination = copy?;
        restored += 1;
        logger.add_note(format!("restored {}", destination.display()));
    }

    Ok(UninstallReport { restored, removed })
}

fn walk_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        let entries = std::fs::read_dir(&current).map_err(|e| PatcherError::io(&current, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| PatcherError::io(&current, e))?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                out.push(path);
            }
        }
    }
    Ok(out)
}

/// Routes a named `(destination, filename)` resource to either the shared game-root folder
/// container or a lazily-loaded archive container, matching whichever `destination` names.
/// Backs up whatever real on-disk target a write is about to replace the first time this run
/// touches it.
struct Destinations<'a> {
    game_root: &'a CasePath,
    folder: FolderContainer,
    archives: HashMap<String, ArchiveContainer>,
    backed_up: HashSet<String>,
}

impl<'a> Destinations<'a> {
    fn open(game_root: &'a CasePath) -> Result<Self> {
        Ok(Destinations {
            game_root,
            folder: FolderContainer::open(game_root.as_path())?,
            archives: HashMap::new(),
            backed_up: HashSet::new(),
        })
    }

    fn archive_path(&self, destination: &str) -> CasePath {
        self.game_root.join(destination).resolve()
    }

    fn get(&mut self, destination: &str, filename: &str) -> Result<Option<Vec<u8>>> {
        if is_archive_destination(destination) {
            let archive = self.archive_mut(destination)?;
            Ok(archive.get(&EntryPath::new(filename.to_string())).map(|b| b.to_vec()))
        } else {
            let path = EntryPath::new(format!("{destination}/{filename}"));
            Ok(self.folder.get(&path).map(|b| b.to_vec()))
        }
    }

    fn put(
        &mut self,
        destination: &str,
        filename: &str,
        data: Vec<u8>,
        override_type: OverrideType,
        logger: &mut PatchLogger,
        backup: &mut BackupLedger,
    ) -> Result<()> {
        if is_archive_destination(destination) {
            self.handle_override_shadow(filename, override_type, logger, backup)?;
            self.backup_archive_once(destination, backup)?;
            let archive = self.archive_mut(destination)?;
            archive.insert(EntryPath::new(filename.to_string()), data);
        } else {
            self.backup_folder_entry(destination, filename, backup)?;
            self.folder.insert(EntryPath::new(format!("{destination}/{filename}")), data);
        }
        Ok(())
    }

    /// SPEC_FULL.md §4.10 step 7: when writing into an archive, a same-named `Override/<filename>`
    /// shadows it at load time (the game reads `Override` before archives). `ignore` leaves the
    /// shadow alone; `warn` logs it; `rename` moves it out of the way to `old_<filename>` (with a
    /// numeric-suffix collision loop matching `next_available_name`) so the new archive entry
    /// actually takes effect. Archive-only per the recorded Open Question decision in DESIGN.md.
    fn handle_override_shadow(
        &mut self,
        filename: &str,
        override_type: OverrideType,
        logger: &mut PatchLogger,
        backup: &mut BackupLedger,
    ) -> Result<()> {
        if override_type == OverrideType::Ignore {
            return Ok(());
        }
        let shadow_path = EntryPath::new(format!("Override/{filename}"));
        if !self.folder.contains(&shadow_path) {
            return Ok(());
        }
        match override_type {
            OverrideType::Ignore => unreachable!("checked above"),
            OverrideType::Warn => {
                logger.add_warning(format!(
                    "Override/{filename} shadows the copy being written into the archive"
                ));
            }
            OverrideType::Rename => {
                self.backup_folder_entry("Override", filename, backup)?;
                let data = self.folder.get(&shadow_path).expect("just checked contains").to_vec();
                self.folder.remove(&shadow_path);
                let renamed = next_available_name(self, "Override", &format!("old_{filename}"))?;
                self.folder.insert(EntryPath::new(format!("Override/{renamed}")), data);
                logger.add_warning(format!("renamed Override/{filename} to Override/{renamed}"));
            }
        }
        Ok(())
    }

    fn archive_mut(&mut self, destination: &str) -> Result<&mut ArchiveContainer> {
        if !self.archives.contains_key(destination) {
            let path = self.archive_path(destination);
            let container = match path.safe_is_file() {
                Some(true) => {
                    let bytes = std::fs::read(path.as_path()).map_err(|e| PatcherError::io(path.as_path(), e))?;
                    ArchiveContainer::load(&bytes)?
                }
                _ => ArchiveContainer::new(),
            };
            self.archives.insert(destination.to_string(), container);
        }
        Ok(self.archives.get_mut(destination).expect("just inserted"))
    }

    fn backup_folder_entry(&mut self, destination: &str, filename: &str, backup: &mut BackupLedger) -> Result<()> {
        let path = self.game_root.join(destination).join(filename).resolve();
        backup.backup_file(&path, Some(destination), self.game_root.as_path())
    }

    fn backup_archive_once(&mut self, destination: &str, backup: &mut BackupLedger) -> Result<()> {
        let key = destination.to_lowercase();
        if self.backed_up.contains(&key) {
            return Ok(());
        }
        let path = self.archive_path(destination);
        backup.backup_file(&path, None, self.game_root.as_path())?;
        self.backed_up.insert(key);
        Ok(())
    }

    fn contains(&mut self, destination: &str, filename: &str) -> Result<bool> {
        Ok(self.get(destination, filename)?.is_some())
    }

    fn flush(self) -> Result<()> {
        self.folder.flush()?;
        for (destination, archive) in &self.archives {
            let path = self.archive_path(destination);
            if let Some(parent) = path.as_path().parent() {
                std::fs::create_dir_all(parent).map_err(|e| PatcherError::io(parent, e))?;
            }
            std::fs::write(path.as_path(), archive.save()?).map_err(|e| PatcherError::io(path.as_path(), e))?;
        }
        Ok(())
    }
}

fn is_archive_destination(destination: &str) -> bool {
    let lower = destination.to_ascii_lowercase();
    ARCHIVE_EXTENSIONS.iter().any(|ext| lower.ends_with(&format!(".{ext}")))
}

/// Loads the existing copy of a patch target: whatever is already installed at its destination
/// takes priority, falling back to the mod's own bundled reference copy (named identically,
/// somewhere under `mod_root`) when the destination doesn't have one yet.
fn load_target(
    mod_root: &CasePath,
    destinations: &mut Destinations,
    destination: &str,
    filename: &str,
) -> Result<Vec<u8>> {
    if let Some(bytes) = destinations.get(destination, filename)? {
        return Ok(bytes);
    }
    let fallback = mod_root.join(filename).resolve();
    match fallback.safe_is_file() {
        Some(true) => std::fs::read(fallback.as_path()).map_err(|e| PatcherError::io(fallback.as_path(), e)),
        _ => Err(PatcherError::ReferencedFileMissing {
            key: "target".to_string(),
            value: filename.to_string(),
            path: fallback.into_path_buf(),
        }),
    }
}

fn run_install_list(
    program: &PatchProgram,
    mod_root: &CasePath,
    destinations: &mut Destinations,
    backup: &mut BackupLedger,
    logger: &mut PatchLogger,
) -> Result<()> {
    for install in program.install() {
        let header = &install.header;
        let source_path = mod_root.join(header.source_file()).resolve();
        let bytes = std::fs::read(source_path.as_path()).map_err(|e| PatcherError::io(source_path.as_path(), e))?;

        let destination_exists = destinations.contains(header.destination(), header.save_as())?;
        match patch::install_file::apply(&bytes, header, destination_exists)? {
            PatchOutcome::Skip => {
                logger.add_note(format!(
                    "skipped installing {} into {} (already present)",
                    header.save_as(),
                    header.destination()
                ));
            }
            PatchOutcome::Bytes(data) => {
                let name = if destination_exists && !*header.replace_existing() {
                    next_available_name(destinations, header.destination(), header.save_as())?
                } else {
                    header.save_as().to_string()
                };
                destinations.put(header.destination(), &name, data, *header.override_type(), logger, backup)?;
            }
        }
    }
    Ok(())
}

fn next_available_name(destinations: &mut Destinations, destination: &str, name: &str) -> Result<String> {
    let dot = name.rfind('.');
    let (stem, suffix) = match dot {
        Some(i) => (&name[..i], &name[i..]),
        None => (name, ""),
    };
    let mut candidate = name.to_string();
    let mut i = 2;
    while destinations.contains(destination, &candidate)? {
        candidate = format!("{stem} ({i}){suffix}");
        i += 1;
    }
    Ok(candidate)
}

fn run_tlk_list(
    program: &PatchProgram,
    game_root: &CasePath,
    backup: &mut BackupLedger,
    memory: &mut PatcherMemory,
    logger: &mut PatchLogger,
) -> Result<()> {
    if program.tlk().is_empty() {
        return Ok(());
    }

    patch_tlk_table(game_root, MALE_TLK, program, backup, memory)?;

    let female_path = game_root.join(FEMALE_TLK).resolve();
    if female_path.safe_is_file().unwrap_or(false) {
        let mut shadow_memory = PatcherMemory::new();
        patch_tlk_table(game_root, FEMALE_TLK, program, backup, &mut shadow_memory)?;
    } else {
        logger.add_note("no dialogf.tlk present; female strings fall back to dialog.tlk");
    }
    Ok(())
}

fn patch_tlk_table(
    game_root: &CasePath,
    filename: &str,
    program: &PatchProgram,
    backup: &mut BackupLedger,
    memory: &mut PatcherMemory,
) -> Result<()> {
    let path = game_root.join(filename).resolve();
    let bytes = std::fs::read(path.as_path()).map_err(|e| PatcherError::io(path.as_path(), e))?;
    let mut tlk = Tlk::load(&bytes)?;

    backup.backup_file(&path, None, game_root.as_path())?;
    let PatchOutcome::Bytes(out) = patch::tlk::apply(&mut tlk, program.tlk(), memory)? else {
        unreachable!("tlk::apply never returns Skip");
    };
    std::fs::write(path.as_path(), out).map_err(|e| PatcherError::io(path.as_path(), e))
}

fn run_two_da_list(
    program: &PatchProgram,
    mod_root: &CasePath,
    destinations: &mut Destinations,
    backup: &mut BackupLedger,
    memory: &mut PatcherMemory,
    logger: &mut PatchLogger,
) -> Result<()> {
    for entry in program.two_da() {
        let header = &entry.header;
        let bytes = load_target(mod_root, destinations, header.destination(), header.source_file())?;
        let mut table = TwoDa::load(&bytes)?;
        let PatchOutcome::Bytes(out) = patch::twoda::apply(&mut table, entry, memory)? else {
            unreachable!("twoda::apply never returns Skip");
        };
        destinations.put(header.destination(), header.source_file(), out, *header.override_type(), logger, backup)?;
    }
    Ok(())
}

fn run_gff_list(
    program: &PatchProgram,
    mod_root: &CasePath,
    destinations: &mut Destinations,
    backup: &mut BackupLedger,
    memory: &mut PatcherMemory,
    logger: &mut PatchLogger,
) -> Result<()> {
    for entry in program.gff() {
        let header = &entry.header;
        let bytes = load_target(mod_root, destinations, header.destination(), header.source_file())?;
        let mut gff = Gff::load(&bytes)?;
        let PatchOutcome::Bytes(out) = patch::gff::apply(&mut gff, entry, memory)? else {
            unreachable!("gff::apply never returns Skip");
        };
        destinations.put(header.destination(), header.source_file(), out, *header.override_type(), logger, backup)?;
    }
    Ok(())
}

fn run_hack_list(
    program: &PatchProgram,
    mod_root: &CasePath,
    destinations: &mut Destinations,
    backup: &mut BackupLedger,
    memory: &mut PatcherMemory,
    logger: &mut PatchLogger,
) -> Result<()> {
    for entry in program.hack() {
        let header = &entry.header;
        let bytes = load_target(mod_root, destinations, header.destination(), header.source_file())?;
        let PatchOutcome::Bytes(out) = patch::hack::apply(bytes, entry, memory)? else {
            unreachable!("hack::apply never returns Skip");
        };
        destinations.put(header.destination(), header.source_file(), out, *header.override_type(), logger, backup)?;
    }
    Ok(())
}

/// `temp_nss_working_dir`'s on-disk name, mirroring the original's staging directory: every
/// `CompileList` entry this run compiles is staged underneath it, kept around afterward only
/// when `!SaveProcessedScripts` is set.
const NSS_STAGING_DIR: &str = "temp_nss_working_dir";

fn run_nss_list(
    program: &PatchProgram,
    mod_root: &CasePath,
    destinations: &mut Destinations,
    backup: &mut BackupLedger,
    compiler: Option<&Compiler>,
    memory: &mut PatcherMemory,
    logger: &mut PatchLogger,
) -> Result<()> {
    if program.nss().is_empty() {
        return Ok(());
    }

    let staging_dir = mod_root.as_path().join(NSS_STAGING_DIR);
    if staging_dir.is_dir() {
        std::fs::remove_dir_all(&staging_dir).map_err(|e| PatcherError::io(&staging_dir, e))?;
    }
    std::fs::create_dir_all(&staging_dir).map_err(|e| PatcherError::io(&staging_dir, e))?;

    for entry in program.nss() {
        let header = &entry.header;
        let Some(compiler) = compiler else {
            logger.add_warning(format!("no script compiler configured; skipping {}", header.source_file()));
            continue;
        };

        let source_path = mod_root.join(header.source_file()).resolve();
        let source = std::fs::read_to_string(source_path.as_path())
            .map_err(|e| PatcherError::io(source_path.as_path(), e))?;

        let name = header.source_file().to_string();
        let outcome =
            patch::nss::apply(&source, memory, |substituted| compiler.compile_in(&staging_dir, substituted, &name))?;
        match outcome {
            PatchOutcome::Skip => {
                logger.add_note(format!("{} has no entry point; nothing to compile", header.source_file()));
            }
            PatchOutcome::Bytes(ncs) => {
                let ncs_name = header.with_compiled_extension();
                destinations.put(header.destination(), &ncs_name, ncs, *header.override_type(), logger, backup)?;
            }
        }
    }

    if *program.settings().save_processed_scripts() {
        logger.add_note(format!("kept staged scripts at {}", staging_dir.display()));
    } else {
        std::fs::remove_dir_all(&staging_dir).map_err(|e| PatcherError::io(&staging_dir, e))?;
    }
    Ok(())
}

fn run_ssf_list(
    program: &PatchProgram,
    mod_root: &CasePath,
    destinations: &mut Destinations,
    backup: &mut BackupLedger,
    memory: &mut PatcherMemory,
    logger: &mut PatchLogger,
) -> Result<()> {
    for entry in program.ssf() {
        let header = &entry.header;
        let bytes = load_target(mod_root, destinations, header.destination(), header.source_file())?;
        let mut ssf = Ssf::load(&bytes)?;
        let PatchOutcome::Bytes(out) = patch::ssf::apply(&mut ssf, entry, memory)? else {
            unreachable!("ssf::apply never returns Skip");
        };
        destinations.put(header.destination(), header.source_file(), out, *header.override_type(), logger, backup)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{PatchHeader, TlkPatch};
    use tempfile::tempdir;
    use time::macros::datetime;

    fn header(name: &str) -> PatchHeader {
        PatchHeader::new(name)
    }

    #[test]
    fn install_list_copies_file_from_mod_root_into_game_override() {
        let mod_dir = tempdir().unwrap();
        let game_dir = tempdir().unwrap();
        std::fs::write(mod_dir.path().join("n_test.utc"), b"payload").unwrap();

        let mut program = PatchProgram::new();
        program.install_mut().push(crate::program::InstallFilePatch { header: header("n_test.utc") });

        let mod_root = CasePath::new(mod_dir.path());
        let game_root = CasePath::new(game_dir.path());
        let mut backup = BackupLedger::new(game_dir.path(), datetime!(2024-01-01 00:00:00 UTC));

        install(&program, &mod_root, &game_root, None, &mut backup).unwrap();

        let installed = game_dir.path().join("Override").join("n_test.utc");
        assert_eq!(std::fs::read(installed).unwrap(), b"payload");
    }

    #[test]
    fn tlk_list_patches_dialog_tlk_in_place() {
        let mod_dir = tempdir().unwrap();
        let game_dir = tempdir().unwrap();
        let mut tlk = Tlk::new();
        tlk.insert("existing", "");
        std::fs::write(game_dir.path().join(MALE_TLK), tlk.save().unwrap()).unwrap();

        let mut program = PatchProgram::new();
        program.tlk_mut().push(TlkPatch { token: 4, text: Some("new line".into()), sound: None, is_replacement: false });

        let mod_root = CasePath::new(mod_dir.path());
        let game_root = CasePath::new(game_dir.path());
        let mut backup = BackupLedger::new(game_dir.path(), datetime!(2024-01-01 00:00:00 UTC));

        let report = install(&program, &mod_root, &game_root, None, &mut backup).unwrap();
        assert_eq!(report.memory.lookup_str(4).unwrap(), 1);

        let saved = Tlk::load(&std::fs::read(game_dir.path().join(MALE_TLK)).unwrap()).unwrap();
        assert_eq!(saved.get(1).unwrap().text, "new line");
    }

    #[test]
    fn validate_reports_missing_source_file_without_touching_the_filesystem() {
        let mod_dir = tempdir().unwrap();
        std::fs::write(
            mod_dir.path().join("changes.ini"),
            "[InstallList]\nFile0=n_missing.utc\n\n[n_missing.utc]\n",
        )
        .unwrap();

        let mod_root = CasePath::new(mod_dir.path());
        let result = validate(&mod_root, &mod_dir.path().join("changes.ini"));
        assert!(matches!(result, Err(PatcherError::ReferencedFileMissing { .. })));
    }

    #[test]
    fn validate_succeeds_when_every_source_file_is_present() {
        let mod_dir = tempdir().unwrap();
        std::fs::write(mod_dir.path().join("n_test.utc"), b"payload").unwrap();
        std::fs::write(
            mod_dir.path().join("changes.ini"),
            "[InstallList]\nFile0=n_test.utc\n\n[n_test.utc]\n",
        )
        .unwrap();

        let mod_root = CasePath::new(mod_dir.path());
        let report = validate(&mod_root, &mod_dir.path().join("changes.ini")).unwrap();
        assert_eq!(report.program.install().len(), 1);
    }

    #[test]
    fn uninstall_restores_overwritten_files_and_deletes_newly_installed_ones() {
        let mod_dir = tempdir().unwrap();
        let game_dir = tempdir().unwrap();
        std::fs::create_dir_all(game_dir.path().join("Override")).unwrap();
        std::fs::write(game_dir.path().join("Override").join("n_existing.utc"), b"original").unwrap();
        std::fs::write(mod_dir.path().join("n_existing.utc"), b"patched").unwrap();
        std::fs::write(mod_dir.path().join("n_new.utc"), b"fresh").unwrap();

        let mut program = PatchProgram::new();
        let mut existing_header = header("n_existing.utc");
        existing_header.set_replace_existing(true);
        program.install_mut().push(crate::program::InstallFilePatch { header: existing_header });
        program.install_mut().push(crate::program::InstallFilePatch { header: header("n_new.utc") });

        let mod_root = CasePath::new(mod_dir.path());
        let game_root = CasePath::new(game_dir.path());
        let mut backup = BackupLedger::new(mod_dir.path(), datetime!(2024-01-01 00:00:00 UTC));

        install(&program, &mod_root, &game_root, None, &mut backup).unwrap();
        assert_eq!(
            std::fs::read(game_dir.path().join("Override").join("n_existing.utc")).unwrap(),
            b"patched"
        );

        let mut logger = PatchLogger::new(crate::logger::LogLevel::Full);
        let report = uninstall(&mod_root, &game_root, &mut logger).unwrap();

        assert_eq!(report.restored, 1);
        assert_eq!(report.removed, 1);
        assert_eq!(
            std::fs::read(game_dir.path().join("Override").join("n_existing.utc")).unwrap(),
            b"original"
        );
        assert!(!game_dir.path().join("Override").join("n_new.utc").is_file());
    }

    #[test]
    fn run_install_enforces_required_file_precondition() {
        let mod_dir = tempdir().unwrap();
        let game_dir = tempdir().unwrap();
        std::fs::write(
            mod_dir.path().join("changes.ini"),
            "[Settings]\nRequired=k1_enhanced.2da\nRequiredMsg=Install Kotor 1 Enhancements first.\n\n[InstallList]\n\n[TLKList]\n\n[2DAList]\n\n[GFFList]\n\n[CompileList]\n\n[HACKList]\n\n[SSFList]\n",
        )
        .unwrap();

        let mod_root = CasePath::new(mod_dir.path());
        let game_root = CasePath::new(game_dir.path());
        let mut backup = BackupLedger::new(mod_dir.path(), datetime!(2024-01-01 00:00:00 UTC));

        let err = run_install(&mod_root, &game_root, &mod_dir.path().join("changes.ini"), None, &mut backup)
            .unwrap_err();
        assert!(matches!(err, PatcherError::RequiredFileMissing { .. }));

        std::fs::create_dir_all(game_dir.path().join("Override")).unwrap();
        std::fs::write(game_dir.path().join("Override").join("k1_enhanced.2da"), b"2DA V2.0").unwrap();
        run_install(&mod_root, &game_root, &mod_dir.path().join("changes.ini"), None, &mut backup).unwrap();
    }

    #[test]
    fn install_into_archive_with_override_type_rename_moves_the_shadowing_file() {
        let mod_dir = tempdir().unwrap();
        let game_dir = tempdir().unwrap();
        std::fs::create_dir_all(game_dir.path().join("modules")).unwrap();
        std::fs::create_dir_all(game_dir.path().join("Override")).unwrap();
        std::fs::write(game_dir.path().join("Override").join("res.utc"), b"override copy").unwrap();
        std::fs::write(mod_dir.path().join("res.utc"), b"new archive copy").unwrap();

        let mut program = PatchProgram::new();
        let mut install_header = header("res.utc");
        install_header.set_destination("modules/mod.mod".to_string());
        install_header.set_replace_existing(true);
        install_header.set_override_type(crate::program::OverrideType::Rename);
        program.install_mut().push(crate::program::InstallFilePatch { header: install_header });

        let mod_root = CasePath::new(mod_dir.path());
        let game_root = CasePath::new(game_dir.path());
        let mut backup = BackupLedger::new(mod_dir.path(), datetime!(2024-01-01 00:00:00 UTC));

        install(&program, &mod_root, &game_root, None, &mut backup).unwrap();

        let archive_bytes = std::fs::read(game_dir.path().join("modules").join("mod.mod")).unwrap();
        let archive = ArchiveContainer::load(&archive_bytes).unwrap();
        assert_eq!(archive.get(&EntryPath::new("res.utc")), Some(b"new archive copy".as_slice()));

        assert!(!game_dir.path().join("Override").join("res.utc").is_file());
        assert_eq!(
            std::fs::read(game_dir.path().join("Override").join("old_res.utc")).unwrap(),
            b"override copy"
        );
    }

    #[test]
    fn install_into_archive_with_override_type_warn_leaves_the_shadowing_file_in_place() {
        let mod_dir = tempdir().unwrap();
        let game_dir = tempdir().unwrap();
        std::fs::create_dir_all(game_dir.path().join("modules")).unwrap();
        std::fs::create_dir_all(game_dir.path().join("Override")).unwrap();
        std::fs::write(game_dir.path().join("Override").join("res.utc"), b"override copy").unwrap();
        std::fs::write(mod_dir.path().join("res.utc"), b"new archive copy").unwrap();

        let mut program = PatchProgram::new();
        let mut install_header = header("res.utc");
        install_header.set_destination("modules/mod.mod".to_string());
        install_header.set_replace_existing(true);
        install_header.set_override_type(crate::program::OverrideType::Warn);
        program.install_mut().push(crate::program::InstallFilePatch { header: install_header });

        let mod_root = CasePath::new(mod_dir.path());
        let game_root = CasePath::new(game_dir.path());
        let mut backup = BackupLedger::new(mod_dir.path(), datetime!(2024-01-01 00:00:00 UTC));

        let report = install(&program, &mod_root, &game_root, None, &mut backup).unwrap();

        assert_eq!(
            std::fs::read(game_dir.path().join("Override").join("res.utc")).unwrap(),
            b"override copy"
        );
        assert!(report.logger.warnings().iter().any(|w| w.contains("shadows")));
    }
}
