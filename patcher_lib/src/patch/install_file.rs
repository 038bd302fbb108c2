//! InstallList algorithm: a raw file copy, the one patch kind with no modifier language of its
//! own.
//!
//! Grounded on SPEC_FULL.md §4.4. The overwrite-vs-skip-vs-install-alongside decision needs to
//! know whether a destination entry already exists and, if so, pick an alternate name — both of
//! which require [`crate::container::Container`] access the other patch algorithms don't need,
//! so that part stays in [`crate::driver`]. This module only decides the one question that's
//! purely a function of the header and whether a destination entry exists: whether to skip.

use crate::error::Result;
use crate::program::PatchHeader;

use super::PatchOutcome;

/// Returns `Skip` when an entry already exists at the destination, the header does not ask to
/// replace it, and `!SkipIfNotReplace` (the header's `skip_if_not_replace` field) is set.
/// Otherwise returns the source bytes unchanged, to be installed at whatever name the driver
/// has already resolved (its own name, or an alongside-install alternate).
pub fn apply(source_bytes: &[u8], header: &PatchHeader, destination_exists: bool) -> Result<PatchOutcome> {
    if destination_exists && !*header.replace_existing() && *header.skip_if_not_replace() {
        return Ok(PatchOutcome::Skip);
    }
    Ok(PatchOutcome::Bytes(source_bytes.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(replace_existing: bool, skip_if_not_replace: bool) -> PatchHeader {
        let mut h = PatchHeader::new("n_test.utc");
        h.set_replace_existing(replace_existing);
        h.set_skip_if_not_replace(skip_if_not_replace);
        h
    }

    #[test]
    fn passes_bytes_through_when_destination_absent() {
        let outcome = apply(b"data", &header(false, true), false).unwrap();
        assert!(matches!(outcome, PatchOutcome::Bytes(b) if b == b"data"));
    }

    #[test]
    fn skips_when_existing_and_not_replacing_with_skip_flag_set() {
        let outcome = apply(b"data", &header(false, true), true).unwrap();
        assert!(matches!(outcome, PatchOutcome::Skip));
    }

    #[test]
    fn installs_alongside_when_skip_flag_unset() {
        let outcome = apply(b"data", &header(false, false), true).unwrap();
        assert!(matches!(outcome, PatchOutcome::Bytes(b) if b == b"data"));
    }

    #[test]
    fn overwrites_when_replace_existing_is_set() {
        let outcome = apply(b"new", &header(true, true), true).unwrap();
        assert!(matches!(outcome, PatchOutcome::Bytes(b) if b == b"new"));
    }
}
