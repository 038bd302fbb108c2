//! Engine crate: parses a declarative instruction file describing a KOTOR/KOTOR II mod's
//! changes and applies them against a game install, one resource format at a time.
//!
//! The modules below are organized the way the original codebase splits them: a domain model
//! (`program`) produced by a parser (`ini` + `parser`) from a `changes.ini`-style instruction
//! file, a handful of format-specific patch algorithms (`patch`, backed by `formats`), a shared
//! token store threaded through all of them (`memory`), and an execution driver (`driver`) that
//! ties it together against a real game directory, with its own backup/uninstall ledger
//! (`backup`) and domain-level run log (`logger`). That run log is business data (what a patch
//! run actually did), returned to the caller rather than printed; a host embedding this crate is
//! expected to wire its own engineering-level tracing (e.g. via the `log` facade) around the
//! calls it makes into here.

pub mod backup;
pub mod compiler;
pub mod container;
pub mod driver;
pub mod error;
pub mod formats;
pub mod ini;
pub mod logger;
pub mod memory;
pub mod namespace;
pub mod parser;
pub mod patch;
pub mod path;
pub mod program;

pub use driver::{check_required_file, install, run_install, uninstall, validate, InstallReport, UninstallReport, ValidationReport};
pub use error::{PatcherError, Result};
