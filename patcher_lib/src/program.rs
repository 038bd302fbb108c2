//! The in-memory representation of a parsed instruction file: one [`PatchProgram`] per
//! `changes.ini`, holding every patch list in execution order.
//!
//! Grounded on `original_source/.../mods/template.py`'s `PatcherModifications` base contract
//! (`sourcefile`/`saveas`/`replace_file`/`destination`/`override_type`/`skip_if_not_replace`,
//! plus the `!SourceFile`/`!SaveAs`/`!Filename`/`!Destination`/`!ReplaceFile`/`!OverrideType`
//! override-variable set) and on SPEC_FULL.md §3's `Patch` tagged-variant table. Built in the
//! teacher's plain-struct-with-`getset` idiom (`files/mod.rs`'s `RFile`/`ContainerPath` pairing
//! is the nearest teacher shape: a small set of named, enumerable operations over a patch list).

use getset::{Getters, MutGetters, Setters};

use crate::formats::gff::GffValue;

/// How the patcher should behave when the install destination is an archive (ERF/RIM/MOD) and
/// the target filename already exists within it.
///
/// Grounded on `template.py::OverrideType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverrideType {
    /// TSLPatcher's historical default: proceed without checking.
    #[default]
    Ignore,
    /// HoloPatcher's default: proceed, but log a warning.
    Warn,
    /// Rename the existing Override-folder file with an `old_` prefix, then log a warning.
    Rename,
}

/// Fields common to every patch-list entry (`!SourceFile`, `!SaveAs`/`!Filename`,
/// `!Destination`, `!ReplaceFile`, `!OverrideType`), shared by every [`Patch`] variant's payload.
#[derive(Debug, Clone, Getters, Setters, MutGetters)]
#[getset(get = "pub", set = "pub", get_mut = "pub")]
pub struct PatchHeader {
    /// Name of the file as it exists in the mod's own directory tree.
    source_file: String,
    /// Name the file is saved/installed as; defaults to `source_file`.
    save_as: String,
    /// Destination folder relative to the game directory, or an archive name.
    destination: String,
    /// Whether an existing install-destination file of the same name should be overwritten.
    replace_existing: bool,
    override_type: OverrideType,
    /// `InstallList`-only: skip this entry entirely when `replace_existing` is false and the
    /// target already exists, rather than installing alongside it under a different name.
    skip_if_not_replace: bool,
}

impl PatchHeader {
    pub fn new(source_file: impl Into<String>) -> Self {
        let source_file = source_file.into();
        PatchHeader {
            save_as: source_file.clone(),
            source_file,
            destination: "Override".to_string(),
            replace_existing: false,
            override_type: OverrideType::default(),
            skip_if_not_replace: false,
        }
    }

    /// `CompileList`-only: the name a compiled script is installed under, `save_as`'s stem with
    /// its `.nss` extension swapped for `.ncs`.
    pub fn with_compiled_extension(&self) -> String {
        let stem = self.save_as.strip_suffix(".nss").unwrap_or(&self.save_as);
        format!("{stem}.ncs")
    }
}

/// One `[InstallList]` file copy, prior to any patch-list processing.
#[derive(Debug, Clone)]
pub struct InstallFilePatch {
    pub header: PatchHeader,
}

/// One `[TLKList]` talk-table modification: replace-in-place or append, per the resolved
/// `is_replacement` flag (see `crate::parser`).
#[derive(Debug, Clone)]
pub struct TlkPatch {
    pub token: i32,
    pub text: Option<String>,
    pub sound: Option<String>,
    pub is_replacement: bool,
}

/// A single 2DA modifier: `ChangeRow`, `AddRow`, `AddColumn`, or `CopyRow`, matching the
/// instruction file's per-file sub-section keys. `store_2da`/`store_tlk` run after the row edit
/// itself, per SPEC_FULL.md §4.3/§4.5.
#[derive(Debug, Clone)]
pub enum TwoDaModifier {
    ChangeRow {
        target: RowTarget,
        cells: Vec<(String, RowValue)>,
        store_2da: Vec<(i32, RowValue)>,
        store_tlk: Vec<(i32, RowValue)>,
    },
    AddRow {
        row_label: Option<RowValue>,
        /// When set and an existing row already has this new row's value in that column,
        /// the add collapses into a `ChangeRow` against that existing row instead of appending.
        exclusive_column: Option<String>,
        cells: Vec<(String, RowValue)>,
        store_2da: Vec<(i32, RowValue)>,
        store_tlk: Vec<(i32, RowValue)>,
    },
    CopyRow {
        source: RowTarget,
        new_row_label: Option<RowValue>,
        exclusive_column: Option<String>,
        cells: Vec<(String, RowValue)>,
        store_2da: Vec<(i32, RowValue)>,
        store_tlk: Vec<(i32, RowValue)>,
    },
    AddColumn {
        column: String,
        default: RowValue,
        index_insert: Vec<(usize, RowValue)>,
        label_insert: Vec<(String, RowValue)>,
        store_2da: Vec<(i32, RowValue)>,
        store_tlk: Vec<(i32, RowValue)>,
    },
}

/// Identifies a 2DA row by a fixed index, a row label, or a `column=value` lookup with an
/// optional tie-break among multiple matches (declaration order in the cells list).
#[derive(Debug, Clone)]
pub enum RowTarget {
    Index(usize),
    Label(String),
    ColumnValue { column: String, value: String },
}

/// A 2DA cell/store value exactly as the instruction file can express it, per SPEC_FULL.md §4.5's
/// `RowValue` evaluation table. `Constant("****")` is the empty-cell sentinel; evaluation turns
/// it into `None` rather than the literal four-asterisk string.
#[derive(Debug, Clone)]
pub enum RowValue {
    Constant(String),
    Mem2Da(i32),
    MemStr(i32),
    /// `1 + max(numeric cells in this column)`, ignoring empty cells; `0` for an empty column.
    High(String),
    /// Decimal index of the row being written.
    RowIndex,
    /// The label of the row being written.
    RowLabel,
    /// The value of another cell in the row being written.
    RowCell(String),
}

#[derive(Debug, Clone)]
pub struct TwoDaPatch {
    pub header: PatchHeader,
    pub modifiers: Vec<TwoDaModifier>,
}

/// A single GFF field write: set an existing field, or add a missing one (struct/list/scalar),
/// addressed by a `/`-joined path (see `crate::formats::gff::Gff::resolve_path`).
#[derive(Debug, Clone)]
pub enum GffModifier {
    SetField { path: String, value: GffFieldValue },
    AddField(GffAddField),
}

/// An `AddField` modifier. `parent_path` names the struct or list the new field/struct is added
/// to (empty path means the root struct); when `parent_path` resolves to a list, `label` is
/// ignored and a new struct (tagged `new_struct_id`) is appended instead of a named field.
#[derive(Debug, Clone)]
pub struct GffAddField {
    pub parent_path: String,
    pub label: String,
    pub field_type: GffFieldType,
    /// Absent only when `field_type` is `Struct`/`List`, whose contents come entirely from
    /// `nested` (matching rows with no direct value, per SPEC_FULL.md §4.6).
    pub value: Option<GffFieldValue>,
    /// `AddField`/`ModifyField` rows nested under this one, applied against the struct or list
    /// entry this row just created (its own path segment prefixed onto each nested path).
    pub nested: Vec<GffModifier>,
    /// When set, the index of the newly appended list entry is written into this `mem2da` token
    /// after the insert, letting later rows in the same patch address it by path.
    pub index_in_list_token: Option<i32>,
    pub new_struct_id: u32,
}

/// The declared type of a field an `AddField` modifier creates, needed because an absent field
/// has no existing value to infer a type from (unlike `SetField`'s type-match check).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GffFieldType {
    Byte,
    Char,
    Word,
    Short,
    Dword,
    Int,
    Dword64,
    Int64,
    Float,
    Double,
    String,
    ResRef,
    LocString,
    Vector3,
    Vector4,
    Struct,
    List,
}

/// A GFF field value as written in the instruction file, before token substitution: either a
/// literal ready-to-store value or a memory-token reference resolved at apply time.
#[derive(Debug, Clone)]
pub enum GffFieldValue {
    Literal(GffValue),
    /// A literal straight from the instruction file, not yet typed: coerced against the
    /// existing field's type (`SetField`) or the declared `FieldType` (`AddField`) the same way
    /// a memory-token's resolved text is, since the instruction file itself never names a GFF
    /// field's Rust-level representation.
    RawString(String),
    TwoDaMemoryToken(i32),
    StrRefMemoryToken(i32),
    /// A partial override of an existing `LocString`'s substring table: only the listed
    /// `(language, gender)` slots are replaced, the rest of the existing table is kept, per
    /// SPEC_FULL.md §4.6's localized-string delta merge. `string_ref` of `None` keeps the
    /// existing `strref`.
    LocalizedStringDelta {
        string_ref: Option<i32>,
        substrings: Vec<((i32, bool), String)>,
    },
}

#[derive(Debug, Clone)]
pub struct GffPatch {
    pub header: PatchHeader,
    pub modifiers: Vec<GffModifier>,
}

/// One fixed-width binary write: `offset` (byte offset from the start of the file), `width`
/// (1/2/4/8 bytes), and the value to write (little-endian), which may itself be a token.
#[derive(Debug, Clone)]
pub struct HackWrite {
    pub offset: u64,
    pub width: HackWidth,
    pub value: HackValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HackWidth {
    U8,
    U16,
    U32,
    U64,
}

#[derive(Debug, Clone)]
pub enum HackValue {
    Literal(u64),
    TwoDaMemoryToken(i32),
    StrRefMemoryToken(i32),
}

#[derive(Debug, Clone)]
pub struct HackPatch {
    pub header: PatchHeader,
    pub writes: Vec<HackWrite>,
}

/// One `[CompileList]` script to compile (and, transitively, its `[HACKList]`-style token
/// substitution over its own source) before being installed as its compiled (`.ncs`) form.
#[derive(Debug, Clone)]
pub struct NssPatch {
    pub header: PatchHeader,
}

/// One `[SSFList]` sound-set modification: a single slot write.
#[derive(Debug, Clone)]
pub struct SsfWrite {
    pub sound: crate::formats::ssf::SSFSound,
    pub value: SsfValue,
}

#[derive(Debug, Clone)]
pub enum SsfValue {
    Literal(i32),
    TwoDaMemoryToken(i32),
    StrRefMemoryToken(i32),
}

#[derive(Debug, Clone)]
pub struct SsfPatch {
    pub header: PatchHeader,
    pub writes: Vec<SsfWrite>,
}

/// One patch-list entry, tagged by kind. Execution order across variants is fixed by
/// [`crate::driver`], not by this enum's declaration order.
#[derive(Debug, Clone)]
pub enum Patch {
    InstallFile(InstallFilePatch),
    Tlk(TlkPatch),
    TwoDa(TwoDaPatch),
    Gff(GffPatch),
    Hack(HackPatch),
    Nss(NssPatch),
    Ssf(SsfPatch),
}

/// Settings parsed from `[Settings]`: window caption, confirmation prompt, target game number,
/// and an optional required companion mod.
#[derive(Debug, Clone, Default, Getters, Setters)]
#[getset(get = "pub", set = "pub")]
pub struct PatchSettings {
    window_caption: String,
    confirm_message: String,
    lookup_game_number: Option<crate::path::GameNumber>,
    required_file: Option<String>,
    required_message: Option<String>,
    /// File extensions `InstallList`/source lookups should silently skip rather than treat as a
    /// missing-file error, matching `!IgnoreExtensions` in the instruction file's `[Settings]`.
    ignore_file_extensions: Vec<String>,
    /// `!LogLevel` override for the domain [`crate::logger::PatchLogger`]; `None` keeps the
    /// driver-selected default.
    log_level: Option<crate::logger::LogLevel>,
    /// Whether compiled `.ncs` intermediates are kept in the backup/working directory rather
    /// than discarded after install, matching `!SaveProcessedScripts`.
    save_processed_scripts: bool,
}

/// The fully parsed instruction file: ordered patch lists plus top-level settings.
#[derive(Debug, Clone, Default, Getters, MutGetters)]
#[getset(get = "pub", get_mut = "pub")]
pub struct PatchProgram {
    settings: PatchSettings,
    install: Vec<InstallFilePatch>,
    tlk: Vec<TlkPatch>,
    two_da: Vec<TwoDaPatch>,
    gff: Vec<GffPatch>,
    hack: Vec<HackPatch>,
    nss: Vec<NssPatch>,
    ssf: Vec<SsfPatch>,
}

impl PatchProgram {
    pub fn new() -> Self {
        Self::default()
    }
}
