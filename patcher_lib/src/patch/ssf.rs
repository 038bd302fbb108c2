//! SSF algorithm: apply slot writes against a loaded sound set.
//!
//! Grounded on SPEC_FULL.md §4.7.

use crate::error::Result;
use crate::formats::ssf::Ssf;
use crate::memory::PatcherMemory;
use crate::program::{SsfPatch, SsfValue};

use super::PatchOutcome;

pub fn apply(ssf: &mut Ssf, patch: &SsfPatch, memory: &PatcherMemory) -> Result<PatchOutcome> {
    for write in &patch.writes {
        let value = match &write.value {
            SsfValue::Literal(v) => *v,
            SsfValue::TwoDaMemoryToken(t) => memory.lookup_2da(*t)?.parse().unwrap_or(-1),
            SsfValue::StrRefMemoryToken(t) => memory.lookup_str(*t)?,
        };
        ssf.set(write.sound, value);
    }
    Ok(PatchOutcome::Bytes(ssf.save()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::ssf::SSFSound;
    use crate::program::PatchHeader;

    #[test]
    fn literal_write_sets_slot() {
        let mut ssf = Ssf::new();
        let mut memory = PatcherMemory::new();
        let patch = SsfPatch {
            header: PatchHeader::new("test.ssf"),
            writes: vec![crate::program::SsfWrite { sound: SSFSound::Death, value: SsfValue::Literal(42) }],
        };
        apply(&mut ssf, &patch, &mut memory).unwrap();
        assert_eq!(ssf.get(SSFSound::Death), 42);
    }

    #[test]
    fn token_write_reads_from_memory() {
        let mut ssf = Ssf::new();
        let mut memory = PatcherMemory::new();
        memory.store_str(5, 99);
        let patch = SsfPatch {
            header: PatchHeader::new("test.ssf"),
            writes: vec![crate::program::SsfWrite {
                sound: SSFSound::Poisoned,
                value: SsfValue::StrRefMemoryToken(5),
            }],
        };
        apply(&mut ssf, &patch, &mut memory).unwrap();
        assert_eq!(ssf.get(SSFSound::Poisoned), 99);
    }
}
