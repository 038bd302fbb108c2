//! Domain-level patch log: the running record of what an install actually did, distinct from the
//! ambient `log`-crate tracing `patcher_cli` wires up for its own diagnostics. This is business
//! data (the engine's own account of notes/warnings/errors raised while applying a program), not
//! an engineering trace, so it's collected in memory and handed back to the caller rather than
//! written straight to a sink.
//!
//! Grounded on `original_source/.../logger.py::PatchLogger`/`PatchLog`: four append-only lists
//! (verbose/note/warning/error) plus a combined chronological log, each entry additionally
//! appended into the combined list in the order it was raised.

/// `!LogLevel` from `[Settings]`: how much of what's raised during an install is kept. Ordered
/// from least to most verbose so a level can be compared against the threshold each call site
/// checks. `Serialize`/`Deserialize` back the CLI's persisted default-level setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, serde_derive::Serialize, serde_derive::Deserialize)]
pub enum LogLevel {
    Nothing,
    General,
    Errors,
    Warnings,
    #[default]
    Full,
}

/// One entry in the combined chronological log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    Verbose(String),
    Note(String),
    Warning(String),
    Error(String),
}

impl LogEntry {
    pub fn message(&self) -> &str {
        match self {
            LogEntry::Verbose(m) | LogEntry::Note(m) | LogEntry::Warning(m) | LogEntry::Error(m) => m,
        }
    }
}

/// Collects everything a patch run raises, filtered by `level`, and keeps both the per-category
/// lists and the combined chronological order.
#[derive(Debug, Clone)]
pub struct PatchLogger {
    level: LogLevel,
    verbose_logs: Vec<String>,
    notes: Vec<String>,
    warnings: Vec<String>,
    errors: Vec<String>,
    all_logs: Vec<LogEntry>,
}

impl PatchLogger {
    pub fn new(level: LogLevel) -> Self {
        PatchLogger {
            level,
            verbose_logs: Vec::new(),
            notes: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
            all_logs: Vec::new(),
        }
    }

    /// Kept only at `LogLevel::Full`.
    pub fn add_verbose(&mut self, message: impl Into<String>) {
        if self.level < LogLevel::Full {
            return;
        }
        let message = message.into();
        self.all_logs.push(LogEntry::Verbose(message.clone()));
        self.verbose_logs.push(message);
    }

    /// Kept at any level above `Nothing`.
    pub fn add_note(&mut self, message: impl Into<String>) {
        if self.level == LogLevel::Nothing {
            return;
        }
        let message = message.into();
        self.all_logs.push(LogEntry::Note(message.clone()));
        self.notes.push(message);
    }

    /// Kept at `Warnings` and `Full`.
    pub fn add_warning(&mut self, message: impl Into<String>) {
        if self.level < LogLevel::Warnings {
            return;
        }
        let message = message.into();
        self.all_logs.push(LogEntry::Warning(message.clone()));
        self.warnings.push(message);
    }

    /// Kept at any level above `Nothing`; errors are never silently dropped at a level that's
    /// otherwise recording anything.
    pub fn add_error(&mut self, message: impl Into<String>) {
        if self.level == LogLevel::Nothing {
            return;
        }
        let message = message.into();
        self.all_logs.push(LogEntry::Error(message.clone()));
        self.errors.push(message);
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn verbose_logs(&self) -> &[String] {
        &self.verbose_logs
    }

    pub fn all_logs(&self) -> &[LogEntry] {
        &self.all_logs
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// One-line tally, e.g. for a final "install complete" message.
    pub fn summary(&self) -> String {
        format!(
            "{} note(s), {} warning(s), {} error(s)",
            self.notes.len(),
            self.warnings.len(),
            self.errors.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_level_keeps_everything_in_order() {
        let mut logger = PatchLogger::new(LogLevel::Full);
        logger.add_verbose("loaded changes.ini");
        logger.add_note("patched appearance.2da");
        logger.add_warning("file already exists, skipping");
        logger.add_error("token 5 undefined");

        assert_eq!(logger.all_logs().len(), 4);
        assert!(logger.has_errors());
        assert_eq!(logger.summary(), "1 note(s), 1 warning(s), 1 error(s)");
    }

    #[test]
    fn errors_level_drops_verbose_and_warnings() {
        let mut logger = PatchLogger::new(LogLevel::Errors);
        logger.add_verbose("detail");
        logger.add_note("note");
        logger.add_warning("warning");
        logger.add_error("error");

        assert!(logger.verbose_logs().is_empty());
        assert!(logger.warnings().is_empty());
        assert_eq!(logger.notes().len(), 1);
        assert_eq!(logger.errors().len(), 1);
        assert_eq!(logger.all_logs().len(), 2);
    }

    #[test]
    fn nothing_level_drops_all_entries() {
        let mut logger = PatchLogger::new(LogLevel::Nothing);
        logger.add_verbose("detail");
        logger.add_note("note");
        logger.add_warning("warning");
        logger.add_error("error");

        assert!(logger.all_logs().is_empty());
        assert!(!logger.has_errors());
    }
}
