//! Ambient engineering-level tracing for the CLI binary, initialized once at startup: terminal
//! output plus a rolling log file, via the `log` facade.
//!
//! Grounded on `patcher_lib/src/integrations/log.rs`'s `Logger` (kept the `log`-crate-facade
//! initialization idea for the CLI binary; dropped the Sentry/crash-report machinery, which has
//! no counterpart here) and the checked-in `main.rs`'s release-vs-debug `CombinedLogger` split,
//! simplified to a single path since this tool has no `simple_logger`-needing custom-terminal
//! concern to work around.

use std::fs::File;

use log::LevelFilter;
use simplelog::{CombinedLogger, Config, TermLogger, TerminalMode, WriteLogger};

use crate::config::log_file_path;

/// Initializes the `log` facade with a terminal sink and, when a config directory is available,
/// a file sink under it. Falls back to terminal-only if the log file can't be created (e.g. a
/// read-only home directory) rather than failing the whole run over a diagnostics nicety.
pub fn init(verbose: bool) {
    let level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    let term_logger = TermLogger::new(level, Config::default(), TerminalMode::Mixed, simplelog::ColorChoice::Auto);

    let file_logger = log_file_path().and_then(|path| {
        path.parent().and_then(|parent| std::fs::create_dir_all(parent).ok())?;
        File::create(&path).ok().map(|file| WriteLogger::new(level, Config::default(), file))
    });

    let result = match file_logger {
        Some(file_logger) => CombinedLogger::init(vec![term_logger, file_logger]),
        None => CombinedLogger::init(vec![term_logger]),
    };

    if let Err(error) = result {
        eprintln!("warning: failed to initialize logging: {error}");
    }
}
