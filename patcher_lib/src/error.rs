//! Crate-wide error type.
//!
//! One enum per SPEC_FULL.md §7 error taxonomy (parser / precondition / patch / I/O / compiler),
//! following the shape of `error/mod.rs` in the teacher crate: a single `thiserror`-derived enum
//! with transparent wraps for the third-party/stdlib errors that leak through, plus a `Result`
//! alias used everywhere instead of `std::result::Result`.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = PatcherError> = core::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum PatcherError {
    //-----------------------------------------------------------------------------//
    //                           Parser errors (§7 category 1)
    //-----------------------------------------------------------------------------//
    #[error("instruction file not found: {0}")]
    ChangesIniNotFound(PathBuf),

    #[error("namespaces.ini not found: {0}")]
    NamespacesIniNotFound(PathBuf),

    #[error("namespace index {index} out of range (namespace file lists {available})")]
    NamespaceIndexOutOfRange { index: usize, available: usize },

    #[error("could not decode instruction file as UTF-8 or cp1252: {0}")]
    InstructionFileEncoding(PathBuf),

    #[error("unrecognized mandatory key '{key}' in section [{section}]")]
    UnrecognizedMandatoryKey { section: String, key: String },

    #[error("key '{key}' is not supported in section [{section}]")]
    UnsupportedKeyInSection { section: String, key: String },

    #[error("file referenced by '{key}={value}' not found in mod tree: {path}")]
    ReferencedFileMissing { key: String, value: String, path: PathBuf },

    #[error("INI header for '{name}' referenced but not found")]
    MissingIniHeader { name: String },

    #[error("invalid key '{key}' in section [{section}]: {reason}")]
    InvalidKeySyntax { section: String, key: String, reason: String },

    //-----------------------------------------------------------------------------//
    //                        Precondition errors (§7 category 2)
    //-----------------------------------------------------------------------------//
    #[error("game directory does not look like a KOTOR install: {0}")]
    InvalidGameDirectory(PathBuf),

    #[error("required file is missing: {path} ({message})")]
    RequiredFileMissing { path: PathBuf, message: String },

    #[error("expected an archive at {0} but it does not exist")]
    ArchiveMissing(PathBuf),

    #[error("backup directory does not exist or is empty: {0}")]
    BackupNotFound(PathBuf),

    //-----------------------------------------------------------------------------//
    //                          Patch errors (§7 category 3)
    //-----------------------------------------------------------------------------//
    #[error("memory token {0} undefined at time of use")]
    TokenUndefined(i32),

    #[error("2DA target not found: {0}")]
    TwoDaTargetNotFound(String),

    #[error("2DA target ambiguous, {count} rows matched: {0}", count = .1)]
    TwoDaTargetAmbiguous(String, usize),

    #[error("GFF field path could not be resolved: {0}")]
    GffPathNotFound(String),

    #[error("GFF type mismatch at '{path}': expected {expected}, found {found}")]
    GffTypeMismatch { path: String, expected: String, found: String },

    #[error("numeric value '{value}' out of range for {kind} ({lo}..={hi})")]
    NumericOutOfRange { value: String, kind: String, lo: i64, hi: i64 },

    #[error("HACK offset {offset} (width {width}) is beyond buffer length {len}")]
    HackOffsetOutOfRange { offset: usize, width: usize, len: usize },

    #[error("unresolved token markers remain in NSS source after substitution: {0}")]
    UnresolvedNssTokens(String),

    //-----------------------------------------------------------------------------//
    //                            I/O errors (§7 category 4)
    //-----------------------------------------------------------------------------//
    #[error("I/O error on {path}: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },

    #[error(transparent)]
    IoPlain(#[from] std::io::Error),

    //-----------------------------------------------------------------------------//
    //                         Compiler errors (§7 category 5)
    //-----------------------------------------------------------------------------//
    #[error("external script compiler failed for {source_file}: {message}")]
    CompilerFailed { source_file: String, message: String },

    #[error("external compiler binary could not be spawned: {0}")]
    CompilerSpawnFailed(String),

    //-----------------------------------------------------------------------------//
    //                                  Misc / transparent
    //-----------------------------------------------------------------------------//
    #[error("invalid integer: {0}")]
    ParseInt(#[from] std::num::ParseIntError),

    #[error("invalid float: {0}")]
    ParseFloat(#[from] std::num::ParseFloatError),

    #[error("config serialization error: {0}")]
    Ron(#[from] ron::Error),

    #[error("config deserialization error: {0}")]
    RonSpanned(#[from] ron::error::SpannedError),

    #[error("{0}")]
    Other(String),
}

impl PatcherError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PatcherError::Io { path: path.into(), source }
    }
}
