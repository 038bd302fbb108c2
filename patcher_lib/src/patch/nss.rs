//! NSS algorithm: token substitution over script source, then delegate to the external
//! compiler shim.
//!
//! Grounded on `original_source/.../mods/nss.py::ModificationsNSS.apply` for the exact
//! substitution regexes (`#2DAMEMORY<n>#`, `#StrRef<n>#`, replaced iteratively left to right)
//! and SPEC_FULL.md §4.8 for the staging/compile/cleanup envelope (implemented in
//! `crate::driver`, not here — this module is the pure substitute-then-hand-off step).

use regex::Regex;
use std::sync::OnceLock;

use crate::compiler::CompileOutcome;
use crate::error::{PatcherError, Result};
use crate::memory::PatcherMemory;

use super::PatchOutcome;

fn two_da_memory_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#2DAMEMORY(\d+)#").unwrap())
}

fn str_ref_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#StrRef(\d+)#").unwrap())
}

/// Substitutes every `#2DAMEMORY<n>#` and `#StrRef<n>#` token with its resolved value. A token
/// referencing an undefined memory slot is fatal (propagated from [`PatcherMemory::lookup_2da`]/
/// [`PatcherMemory::lookup_str`]), matching the rest of the engine's "lookup against a missing
/// token is fatal" rule even though the original Python would raise a `KeyError` instead.
pub fn substitute_tokens(source: &str, memory: &PatcherMemory) -> Result<String> {
    let mut current = source.to_string();

    loop {
        let Some(captures) = two_da_memory_pattern().captures(&current) else { break };
        let token: i32 = captures[1].parse().map_err(|_| {
            PatcherError::Other(format!("malformed #2DAMEMORY# token: {}", &captures[0]))
        })?;
        let value = memory.lookup_2da(token)?.to_string();
        let whole = captures.get(0).unwrap();
        current.replace_range(whole.range(), &value);
    }

    loop {
        let Some(captures) = str_ref_pattern().captures(&current) else { break };
        let token: i32 = captures[1]
            .parse()
            .map_err(|_| PatcherError::Other(format!("malformed #StrRef# token: {}", &captures[0])))?;
        let value = memory.lookup_str(token)?;
        let whole = captures.get(0).unwrap();
        current.replace_range(whole.range(), &value.to_string());
    }

    if current.contains("#2DAMEMORY") || current.contains("#StrRef") {
        return Err(PatcherError::UnresolvedNssTokens(source.to_string()));
    }

    Ok(current)
}

/// Runs token substitution then the external compiler, translating its tri-state outcome into
/// the shared [`PatchOutcome`] (`NoEntryPoint` becomes `Skip`, matching include-only scripts).
pub fn apply(
    source: &str,
    memory: &PatcherMemory,
    compile: impl FnOnce(&str) -> Result<CompileOutcome>,
) -> Result<PatchOutcome> {
    let substituted = substitute_tokens(source, memory)?;
    match compile(&substituted)? {
        CompileOutcome::Compiled(bytes) => Ok(PatchOutcome::Bytes(bytes)),
        CompileOutcome::NoEntryPoint => Ok(PatchOutcome::Skip),
        CompileOutcome::Failed(message) => Err(PatcherError::CompilerFailed {
            source_file: "<staged source>".to_string(),
            message,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_both_token_kinds_iteratively() {
        let mut memory = PatcherMemory::new();
        memory.store_2da(1, "n_droid01");
        memory.store_str(2, 12345);
        let source = "string s = \"#2DAMEMORY1#\"; int i = #StrRef2#;";
        let result = substitute_tokens(source, &memory).unwrap();
        assert_eq!(result, "string s = \"n_droid01\"; int i = 12345;");
    }

    #[test]
    fn undefined_token_is_fatal() {
        let memory = PatcherMemory::new();
        let result = substitute_tokens("#2DAMEMORY9#", &memory);
        assert!(result.is_err());
    }

    #[test]
    fn no_entry_point_becomes_skip() {
        let memory = PatcherMemory::new();
        let outcome = apply("void main() {}", &memory, |_| Ok(CompileOutcome::NoEntryPoint)).unwrap();
        assert!(matches!(outcome, PatchOutcome::Skip));
    }
}
