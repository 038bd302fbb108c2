//! Sound set: a fixed table of stringref slots, one per `SSFSound` kind.
//!
//! **Binary layout** (little-endian; this crate's own scheme — see `formats::mod` doc):
//!
//! | Field | Size | Notes |
//! |---|---|---|
//! | `file_type` | 4 bytes | ASCII `"SSF "` |
//! | `file_version` | 4 bytes | ASCII `"V1.1"` |
//! | slots | i32 × [`SSFSound::COUNT`] | one stringref per sound kind, in declaration order; `-1` means unset |
//!
//! `SSFSound` and its human-readable labels are grounded on
//! `original_source/.../reader.py`'s `configstr_to_ssfsound` table.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read};

use crate::error::{PatcherError, Result};

pub const FILE_TYPE: &[u8; 4] = b"SSF ";
pub const FILE_VERSION: &[u8; 4] = b"V1.1";

/// One sound slot in a creature's sound set, in on-disk order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SSFSound {
    BattleCry1,
    BattleCry2,
    BattleCry3,
    BattleCry4,
    BattleCry5,
    BattleCry6,
    Selected1,
    Selected2,
    Selected3,
    AttackGrunt1,
    AttackGrunt2,
    AttackGrunt3,
    PainGrunt1,
    PainGrunt2,
    LowHealth,
    Death,
    CriticalHit,
    TargetImmune,
    LayMine,
    DisarmMine,
    BeginStealth,
    BeginSearch,
    BeginUnlock,
    UnlockFailed,
    UnlockSuccess,
    SeparatedFromParty,
    RejoinedParty,
    Poisoned,
}

impl SSFSound {
    pub const COUNT: usize = 28;

    pub const ALL: [SSFSound; Self::COUNT] = [
        SSFSound::BattleCry1,
        SSFSound::BattleCry2,
        SSFSound::BattleCry3,
        SSFSound::BattleCry4,
        SSFSound::BattleCry5,
        SSFSound::BattleCry6,
        SSFSound::Selected1,
        SSFSound::Selected2,
        SSFSound::Selected3,
        SSFSound::AttackGrunt1,
        SSFSound::AttackGrunt2,
        SSFSound::AttackGrunt3,
        SSFSound::PainGrunt1,
        SSFSound::PainGrunt2,
        SSFSound::LowHealth,
        SSFSound::Death,
        SSFSound::CriticalHit,
        SSFSound::TargetImmune,
        SSFSound::LayMine,
        SSFSound::DisarmMine,
        SSFSound::BeginStealth,
        SSFSound::BeginSearch,
        SSFSound::BeginUnlock,
        SSFSound::UnlockFailed,
        SSFSound::UnlockSuccess,
        SSFSound::SeparatedFromParty,
        SSFSound::RejoinedParty,
        SSFSound::Poisoned,
    ];

    fn index(self) -> usize {
        Self::ALL.iter().position(|s| *s == self).expect("SSFSound::ALL is exhaustive")
    }

    /// Maps the instruction file's human-readable label to a sound kind, matching
    /// `configstr_to_ssfsound`. Case-insensitive; returns `None` for an unrecognized label.
    pub fn from_label(label: &str) -> Option<SSFSound> {
        let normalized = label.trim();
        Some(match normalized {
            s if s.eq_ignore_ascii_case("Battlecry 1") => SSFSound::BattleCry1,
            s if s.eq_ignore_ascii_case("Battlecry 2") => SSFSound::BattleCry2,
            s if s.eq_ignore_ascii_case("Battlecry 3") => SSFSound::BattleCry3,
            s if s.eq_ignore_ascii_case("Battlecry 4") => SSFSound::BattleCry4,
            s if s.eq_ignore_ascii_case("Battlecry 5") => SSFSound::BattleCry5,
            s if s.eq_ignore_ascii_case("Battlecry 6") => SSFSound::BattleCry6,
            s if s.eq_ignore_ascii_case("Selected 1") => SSFSound::Selected1,
            s if s.eq_ignore_ascii_case("Selected 2") => SSFSound::Selected2,
            s if s.eq_ignore_ascii_case("Selected 3") => SSFSound::Selected3,
            s if s.eq_ignore_ascii_case("Attack 1") => SSFSound::AttackGrunt1,
            s if s.eq_ignore_ascii_case("Attack 2") => SSFSound::AttackGrunt2,
            s if s.eq_ignore_ascii_case("Attack 3") => SSFSound::AttackGrunt3,
            s if s.eq_ignore_ascii_case("Pain 1") => SSFSound::PainGrunt1,
            s if s.eq_ignore_ascii_case("Pain 2") => SSFSound::PainGrunt2,
            s if s.eq_ignore_ascii_case("Low health") => SSFSound::LowHealth,
            s if s.eq_ignore_ascii_case("Death") => SSFSound::Death,
            s if s.eq_ignore_ascii_case("Critical hit") => SSFSound::CriticalHit,
            s if s.eq_ignore_ascii_case("Target immune") => SSFSound::TargetImmune,
            s if s.eq_ignore_ascii_case("Place mine") => SSFSound::LayMine,
            s if s.eq_ignore_ascii_case("Disarm mine") => SSFSound::DisarmMine,
            s if s.eq_ignore_ascii_case("Stealth on") => SSFSound::BeginStealth,
            s if s.eq_ignore_ascii_case("Search") => SSFSound::BeginSearch,
            s if s.eq_ignore_ascii_case("Pick lock start") => SSFSound::BeginUnlock,
            s if s.eq_ignore_ascii_case("Pick lock fail") => SSFSound::UnlockFailed,
            s if s.eq_ignore_ascii_case("Pick lock done") => SSFSound::UnlockSuccess,
            s if s.eq_ignore_ascii_case("Leave party") => SSFSound::SeparatedFromParty,
            s if s.eq_ignore_ascii_case("Rejoin party") => SSFSound::RejoinedParty,
            s if s.eq_ignore_ascii_case("Poisoned") => SSFSound::Poisoned,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Ssf {
    slots: [i32; SSFSound::COUNT],
}

impl Default for Ssf {
    fn default() -> Self {
        Ssf { slots: [-1; SSFSound::COUNT] }
    }
}

impl Ssf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, sound: SSFSound) -> i32 {
        self.slots[sound.index()]
    }

    pub fn set(&mut self, sound: SSFSound, stringref: i32) {
        self.slots[sound.index()] = stringref;
    }

    pub fn load(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let mut file_type = [0u8; 4];
        let mut file_version = [0u8; 4];
        cursor.read_exact(&mut file_type)?;
        cursor.read_exact(&mut file_version)?;
        if &file_type != FILE_TYPE || &file_version != FILE_VERSION {
            return Err(PatcherError::Other(format!(
                "not a recognized SSF file (saw {:?} {:?})",
                String::from_utf8_lossy(&file_type),
                String::from_utf8_lossy(&file_version)
            )));
        }
        let mut slots = [-1i32; SSFSound::COUNT];
        for slot in slots.iter_mut() {
            *slot = cursor.read_i32::<LittleEndian>()?;
        }
        Ok(Ssf { slots })
    }

    pub fn save(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        out.extend_from_slice(FILE_TYPE);
        out.extend_from_slice(FILE_VERSION);
        for slot in self.slots {
            out.write_i32::<LittleEndian>(slot)?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_save_and_load() {
        let mut ssf = Ssf::new();
        ssf.set(SSFSound::Death, 1234);
        ssf.set(SSFSound::Poisoned, 0);
        let bytes = ssf.save().unwrap();
        let loaded = Ssf::load(&bytes).unwrap();
        assert_eq!(loaded.get(SSFSound::Death), 1234);
        assert_eq!(loaded.get(SSFSound::Poisoned), 0);
        assert_eq!(loaded.get(SSFSound::BattleCry1), -1);
    }

    #[test]
    fn from_label_is_case_insensitive_and_covers_known_labels() {
        assert_eq!(SSFSound::from_label("low health"), Some(SSFSound::LowHealth));
        assert_eq!(SSFSound::from_label("Pick Lock Done"), Some(SSFSound::UnlockSuccess));
        assert_eq!(SSFSound::from_label("not a real label"), None);
    }
}
