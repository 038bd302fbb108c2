//! Container/resource codecs: talk table, 2-D array, GFF tree, sound-set.
//!
//! SPEC_FULL.md §1 marks the on-disk byte layout of these formats "opaque" — the patch
//! algorithms in `crate::patch` are written purely against the named-field operations below
//! (`Tlk::insert`, `TwoDa::cell`, `Gff::resolve_path`, `Ssf::set`…), not against any particular
//! byte scheme. Each format here nonetheless ships a real, round-tripping `load`/`save` pair so
//! the engine is runnable end to end, following the shape of `files/loc/mod.rs` and
//! `files/mod.rs`'s `Decodeable`/`Encodeable` trait pair in the teacher (binary layout
//! documented in a markdown table on each type, checked little-endian reads via `byteorder`).

pub mod gff;
pub mod ssf;
pub mod tlk;
pub mod twoda;

pub use gff::Gff;
pub use ssf::Ssf;
pub use tlk::Tlk;
pub use twoda::TwoDa;
