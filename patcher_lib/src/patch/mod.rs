//! One algorithm module per [`crate::program::Patch`] variant. Each `apply` function takes the
//! patch's own modifiers plus the shared [`PatcherMemory`](crate::memory::PatcherMemory) and
//! returns a [`PatchOutcome`] — either replacement bytes to write, or `Skip`, meaning this patch
//! produced no change and the driver should neither write nor treat it as an error (the NSS
//! include-only-script case is the only variant that currently produces `Skip`).
//!
//! Grounded on SPEC_FULL.md §4.4-§4.9, `original_source/.../mods/{tlk,nss}.py` directly, and
//! the tri-state `CompileOutcome` REDESIGN FLAG (exception-based control flow in the original
//! replaced with an explicit return value here, matching the teacher's `Result`-returning,
//! `?`-propagating style rather than any exception-like mechanism).

pub mod gff;
pub mod hack;
pub mod install_file;
pub mod nss;
pub mod ssf;
pub mod tlk;
pub mod twoda;

/// The result of applying one patch's algorithm to its loaded target bytes.
#[derive(Debug, Clone)]
pub enum PatchOutcome {
    Bytes(Vec<u8>),
    Skip,
}
