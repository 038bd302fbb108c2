//! External NSS→NCS compiler shim.
//!
//! Grounded on SPEC_FULL.md §4.8 and the REDESIGN FLAG replacing the original's
//! exception-driven compiler control flow with an explicit tri-state [`CompileOutcome`]. The
//! actual compiler binary (a `nwnnsscomp`-compatible tool) ships alongside the game installs
//! this engine targets and is never bundled with this crate, so it is invoked as an external
//! process over a staged temp directory rather than linked in-process.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{PatcherError, Result};
use crate::path::GameNumber;

/// The result of compiling one script source. `NoEntryPoint` covers include-only scripts with
/// no `void main()`/`void StartingConditional()` — not an error, just nothing to install.
#[derive(Debug, Clone)]
pub enum CompileOutcome {
    Compiled(Vec<u8>),
    NoEntryPoint,
    Failed(String),
}

/// Substrings the external compiler's stderr is known to emit for an include-only script,
/// checked case-insensitively since different compiler builds phrase this differently.
const NO_ENTRY_POINT_MARKERS: &[&str] = &["no entry point", "nothing to compile", "no main function"];

/// Wraps the path to a configured external compiler binary and the game number it should target
/// (KOTOR 1 and 2 use incompatible script library versions, selected by a compiler flag).
#[derive(Debug, Clone)]
pub struct Compiler {
    binary: PathBuf,
    game: GameNumber,
}

impl Compiler {
    pub fn new(binary: impl Into<PathBuf>, game: GameNumber) -> Self {
        Compiler { binary: binary.into(), game }
    }

    /// Stages `source` into a scratch temp directory, invokes the compiler against it, and reads
    /// back the compiled `.ncs` bytes on success. The staged files are discarded once this call
    /// returns; use [`Compiler::compile_in`] when the caller wants to keep them (`!SaveProcessedScripts`).
    pub fn compile(&self, source: &str, source_name: &str) -> Result<CompileOutcome> {
        let dir = tempfile::tempdir().map_err(|e| PatcherError::io(std::env::temp_dir(), e))?;
        self.compile_in(dir.path(), source, source_name)
    }

    /// Like [`Compiler::compile`] but stages the source/compiled output under a caller-owned
    /// directory instead of a throwaway temp one, so the caller can choose to keep it afterward.
    pub fn compile_in(&self, dir: &Path, source: &str, source_name: &str) -> Result<CompileOutcome> {
        let stem = Path::new(source_name).file_stem().and_then(|s| s.to_str()).unwrap_or("script");
        let nss_path = dir.join(format!("{stem}.nss"));
        let ncs_path = dir.join(format!("{stem}.ncs"));

        let mut file = std::fs::File::create(&nss_path).map_err(|e| PatcherError::io(&nss_path, e))?;
        file.write_all(source.as_bytes()).map_err(|e| PatcherError::io(&nss_path, e))?;
        drop(file);

        let game_flag = match self.game {
            GameNumber::One => "1",
            GameNumber::Two => "2",
        };

        let output = Command::new(&self.binary)
            .arg("-c")
            .arg("-g")
            .arg(game_flag)
            .arg(&nss_path)
            .arg(&ncs_path)
            .output()
            .map_err(|e| PatcherError::CompilerSpawnFailed(format!("{}: {e}", self.binary.display())))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let combined = format!("{stdout}\n{stderr}").to_lowercase();

        if NO_ENTRY_POINT_MARKERS.iter().any(|marker| combined.contains(marker)) {
            return Ok(CompileOutcome::NoEntryPoint);
        }

        if !output.status.success() {
            return Ok(CompileOutcome::Failed(if stderr.trim().is_empty() {
                format!("compiler exited with status {}", output.status)
            } else {
                stderr.trim().to_string()
            }));
        }

        match std::fs::read(&ncs_path) {
            Ok(bytes) => Ok(CompileOutcome::Compiled(bytes)),
            Err(_) => Ok(CompileOutcome::Failed("compiler reported success but produced no output file".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_failure_on_missing_binary_is_reported() {
        let compiler = Compiler::new("/nonexistent/compiler/binary", GameNumber::One);
        let result = compiler.compile("void main() {}", "n_test.nss");
        assert!(matches!(result, Err(PatcherError::CompilerSpawnFailed(_))));
    }
}
