//! HACK algorithm: fixed-width little-endian writes against a raw byte buffer.
//!
//! Grounded on SPEC_FULL.md §4.9 (dropped by the distillation, restored from spec.md's
//! component table and `holopatcher/core.py`'s `[HACKList]` ordering comments). Unlike every
//! other patch kind, there is no `Skip` outcome: the buffer is always written back.

use crate::error::{PatcherError, Result};
use crate::memory::PatcherMemory;
use crate::program::{HackPatch, HackValue, HackWidth, HackWrite};

use super::PatchOutcome;

pub fn apply(mut buffer: Vec<u8>, patch: &HackPatch, memory: &PatcherMemory) -> Result<PatchOutcome> {
    for write in &patch.writes {
        apply_write(&mut buffer, write, memory)?;
    }
    Ok(PatchOutcome::Bytes(buffer))
}

fn apply_write(buffer: &mut [u8], write: &HackWrite, memory: &PatcherMemory) -> Result<()> {
    let value: u64 = match &write.value {
        HackValue::Literal(v) => *v,
        HackValue::TwoDaMemoryToken(t) => memory.lookup_2da(*t)?.parse().unwrap_or(0),
        HackValue::StrRefMemoryToken(t) => memory.lookup_str(*t)? as u64,
    };

    let width = match write.width {
        HackWidth::U8 => 1,
        HackWidth::U16 => 2,
        HackWidth::U32 => 4,
        HackWidth::U64 => 8,
    };

    let start = write.offset as usize;
    let end = start + width;
    let slice = buffer.get_mut(start..end).ok_or(PatcherError::HackOffsetOutOfRange {
        offset: start,
        width,
        len: buffer.len(),
    })?;

    let bytes = value.to_le_bytes();
    slice.copy_from_slice(&bytes[..width]);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::PatchHeader;

    #[test]
    fn literal_write_patches_in_place_little_endian() {
        let buffer = vec![0u8; 8];
        let memory = PatcherMemory::new();
        let patch = HackPatch {
            header: PatchHeader::new("test.ncs"),
            writes: vec![HackWrite { offset: 2, width: HackWidth::U32, value: HackValue::Literal(0x1020_3040) }],
        };
        let PatchOutcome::Bytes(out) = apply(buffer, &patch, &memory).unwrap() else {
            panic!("expected Bytes");
        };
        assert_eq!(&out[2..6], &[0x40, 0x30, 0x20, 0x10]);
    }

    #[test]
    fn out_of_range_offset_is_fatal() {
        let buffer = vec![0u8; 4];
        let memory = PatcherMemory::new();
        let patch = HackPatch {
            header: PatchHeader::new("test.ncs"),
            writes: vec![HackWrite { offset: 2, width: HackWidth::U32, value: HackValue::Literal(1) }],
        };
        assert!(matches!(
            apply(buffer, &patch, &memory),
            Err(PatcherError::HackOffsetOutOfRange { .. })
        ));
    }
}
