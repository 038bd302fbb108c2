//! TLK algorithm: apply a list of [`TlkPatch`] modifiers against a loaded talk table.
//!
//! Grounded on SPEC_FULL.md §4.4 and `original_source/.../mods/tlk.py`'s `ModifyTLK`
//! (`is_replacement` dispatches between overwrite-in-place and append).

use crate::error::Result;
use crate::formats::tlk::Tlk;
use crate::memory::PatcherMemory;
use crate::program::TlkPatch;

use super::PatchOutcome;

pub fn apply(tlk: &mut Tlk, modifiers: &[TlkPatch], memory: &mut PatcherMemory) -> Result<PatchOutcome> {
    for modifier in modifiers {
        let text = modifier.text.clone().unwrap_or_default();
        let sound = modifier.sound.clone().unwrap_or_default();

        if modifier.is_replacement {
            tlk.replace(modifier.token, text, sound);
            memory.store_str(modifier.token, modifier.token);
        } else {
            let new_index = tlk.insert(text, sound);
            memory.store_str(modifier.token, new_index);
        }
    }
    Ok(PatchOutcome::Bytes(tlk.save()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_appends_and_records_new_index() {
        let mut tlk = Tlk::new();
        tlk.insert("existing", "");
        let mut memory = PatcherMemory::new();
        let modifiers = vec![TlkPatch {
            token: 7,
            text: Some("new entry".into()),
            sound: None,
            is_replacement: false,
        }];

        apply(&mut tlk, &modifiers, &mut memory).unwrap();
        assert_eq!(tlk.get(1).unwrap().text, "new entry");
        assert_eq!(memory.lookup_str(7).unwrap(), 1);
    }

    #[test]
    fn replace_overwrites_and_records_same_index() {
        let mut tlk = Tlk::new();
        tlk.insert("old", "");
        let mut memory = PatcherMemory::new();
        let modifiers = vec![TlkPatch {
            token: 3,
            text: Some("replaced".into()),
            sound: Some("n_snd".into()),
            is_replacement: true,
        }];

        apply(&mut tlk, &modifiers, &mut memory).unwrap();
        assert_eq!(tlk.get(0).unwrap().text, "old");
        assert_eq!(tlk.get(3).unwrap().text, "replaced");
        assert_eq!(memory.lookup_str(3).unwrap(), 3);
    }
}
