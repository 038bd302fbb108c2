//! Command-line front end for the patching engine: resolves a mod directory and a game
//! directory from arguments/prompts/remembered defaults, then drives `patcher_lib`'s
//! `run_install`/`validate`/`uninstall` entry points.
//!
//! Grounded on `original_source/Tools/HoloPatcher/src/holopatcher/core.py`'s `parse_args`/
//! `ExitCode`/tslpatchdata-path resolution (a GUI tool with a console fallback mode; this binary
//! keeps the console-mode argument surface and exit-code table, dropping the GUI).

mod config;
mod logger;

use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode as ProcessExitCode;

use clap::{ArgGroup, Parser};
use time::OffsetDateTime;

use patcher_lib::backup::BackupLedger;
use patcher_lib::compiler::Compiler;
use patcher_lib::error::PatcherError;
use patcher_lib::namespace;
use patcher_lib::path::{find_known_install_paths, CasePath, GameNumber};

use config::CliConfig;

#[derive(Parser, Debug)]
#[command(name = "patcher", version = env!("CARGO_PKG_VERSION"), about = "Installs, validates or uninstalls a KOTOR/KOTOR II mod package.")]
#[command(group(ArgGroup::new("mode").args(["install", "validate", "uninstall"])))]
struct Cli {
    /// Directory holding `tslpatchdata` (or that directory itself). Defaults to the current
    /// directory.
    mod_path: Option<PathBuf>,

    /// Path to the KOTOR/KOTOR II install directory. Remembered for next time once given.
    #[arg(long = "game-dir", value_name = "PATH")]
    game_dir: Option<PathBuf>,

    /// Which `namespaces.ini` entry to install, by position, when the mod offers more than one.
    #[arg(long = "namespace-option-index", value_name = "N")]
    namespace_option_index: Option<usize>,

    /// Install the mod (default mode).
    #[arg(long)]
    install: bool,

    /// Parse the instruction file and confirm every referenced source file exists, without
    /// writing anything.
    #[arg(long)]
    validate: bool,

    /// Restore the game directory from the most recent backup this tool made.
    #[arg(long)]
    uninstall: bool,

    /// Force non-interactive operation: fail instead of prompting for anything.
    #[arg(long)]
    console: bool,

    /// Keep staged `.nss`/`.ncs` intermediates after install, overriding the instruction file's
    /// own `!SaveProcessedScripts` setting.
    #[arg(long)]
    save_processed_scripts: bool,
}

/// Mirrors `holopatcher.core.ExitCode`. That enum's code 10 ("closing for an update process") is
/// a GUI-only concept this console-mode binary never reaches, so it has no variant here; 9
/// (uncaught panic) is kept since that can happen in any binary.
#[derive(Debug, Clone, Copy)]
enum ExitCode {
    Success = 0,
    UnknownStartupError = 1,
    NumberOfArgs = 2,
    NamespacesIniNotFound = 3,
    NamespaceIndexOutOfRange = 4,
    ChangesIniNotFound = 5,
    AbortInstallUnsafe = 6,
    ExceptionDuringInstall = 7,
    InstallCompletedWithErrors = 8,
    Crash = 9,
}

fn main() -> ProcessExitCode {
    let cli = Cli::parse();
    logger::init(false);

    let code = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| run(cli))).unwrap_or_else(|payload| {
        log::error!("{}", panic_message(&payload));
        ExitCode::Crash
    });

    ProcessExitCode::from(code as u8)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

enum Mode {
    Install,
    Validate,
    Uninstall,
}

fn run(cli: Cli) -> ExitCode {
    let mode = if cli.install {
        Mode::Install
    } else if cli.validate {
        Mode::Validate
    } else if cli.uninstall {
        Mode::Uninstall
    } else {
        Mode::Install
    };

    let interactive = !cli.console && std::io::stdin().is_terminal();
    let mut cli_config = CliConfig::load();

    let directory_path = cli.mod_path.clone().unwrap_or_else(|| PathBuf::from("."));
    let Some(tslpatchdata_path) = resolve_tslpatchdata(&directory_path) else {
        eprintln!("no tslpatchdata directory found under {}", directory_path.display());
        return ExitCode::UnknownStartupError;
    };
    let mod_root = CasePath::new(tslpatchdata_path.as_path());

    let Some(game_dir) = resolve_game_dir(&cli, &mut cli_config, interactive) else {
        eprintln!("no game directory given, remembered, or found automatically");
        return ExitCode::UnknownStartupError;
    };
    let game_root = CasePath::new(game_dir.as_path());

    let changes_ini_path = match resolve_changes_ini(&tslpatchdata_path, cli.namespace_option_index, interactive) {
        Ok(path) => path,
        Err(code) => return code,
    };

    match mode {
        Mode::Validate => run_validate(&mod_root, &changes_ini_path),
        Mode::Install => {
            run_install_mode(&cli, &mod_root, &game_root, &changes_ini_path, interactive, &mut cli_config)
        }
        Mode::Uninstall => run_uninstall_mode(&mod_root, &game_root),
    }
}

/// `directory_path / "tslpatchdata"` if it's a real directory; otherwise, if `directory_path`
/// itself is named `tslpatchdata` (the user pointed straight at it), that directory. Matches
/// `core.py::load_mod`'s resolution; this binary has no use for that function's separate
/// `mod_path` (tslpatchdata's parent), since every resource lookup here already goes through
/// `tslpatchdata_path` as `mod_root`.
fn resolve_tslpatchdata(directory_path: &Path) -> Option<PathBuf> {
    let nested = directory_path.join("tslpatchdata");
    if nested.is_dir() {
        return Some(nested);
    }
    if directory_path.file_name().map(|name| name.eq_ignore_ascii_case("tslpatchdata")).unwrap_or(false) {
        return Some(directory_path.to_path_buf());
    }
    None
}

fn resolve_game_dir(cli: &Cli, cli_config: &mut CliConfig, interactive: bool) -> Option<PathBuf> {
    if let Some(path) = &cli.game_dir {
        return Some(path.clone());
    }
    if let Some(path) = &cli_config.default_game_dir {
        if path.is_dir() {
            return Some(path.clone());
        }
    }
    if !interactive {
        return None;
    }

    let mut candidates = find_known_install_paths(GameNumber::One);
    candidates.extend(find_known_install_paths(GameNumber::Two));
    candidates.sort();
    candidates.dedup();

    match candidates.len() {
        0 => prompt_for_game_dir(),
        1 => candidates.into_iter().next(),
        _ => {
            let labels: Vec<String> = candidates.iter().map(|p| p.display().to_string()).collect();
            match prompt_index("Multiple game installs found, pick one", &labels) {
                Some(index) if index < candidates.len() => Some(candidates.swap_remove(index)),
                _ => prompt_for_game_dir(),
            }
        }
    }
}

fn prompt_for_game_dir() -> Option<PathBuf> {
    prompt_line("Enter the path to your KOTOR/KOTOR II install directory: ").map(PathBuf::from)
}

/// Reads every `[Namespaces]` entry out of `tslpatchdata_path/namespaces.ini` if present (falling
/// back to a bare `changes.ini` at the mod root when it isn't), resolves `--namespace-option-index`
/// against it, prompting interactively when the index is ambiguous and a human is attached.
fn resolve_changes_ini(
    tslpatchdata_path: &Path,
    namespace_option_index: Option<usize>,
    interactive: bool,
) -> Result<PathBuf, ExitCode> {
    let namespaces_ini = tslpatchdata_path.join("namespaces.ini");
    if !namespaces_ini.is_file() {
        return Ok(tslpatchdata_path.join("changes.ini"));
    }

    let namespaces = namespace::read_namespaces(&namespaces_ini).map_err(|_| ExitCode::NamespacesIniNotFound)?;
    if namespaces.is_empty() {
        return Err(ExitCode::NamespacesIniNotFound);
    }

    let index = match namespace_option_index {
        Some(index) => index,
        None if namespaces.len() == 1 => 0,
        None if interactive => {
            let labels: Vec<String> = namespaces.iter().map(|n| n.display_name().to_string()).collect();
            prompt_index("Select which mod to install", &labels).ok_or(ExitCode::NamespaceIndexOutOfRange)?
        }
        None => return Err(ExitCode::NamespaceIndexOutOfRange),
    };

    let selected = namespace::select_by_index(&namespaces, index).map_err(|_| ExitCode::NamespaceIndexOutOfRange)?;
    let root = selected.resolve_root(tslpatchdata_path);
    Ok(root.join(selected.ini_filename()))
}

fn run_validate(mod_root: &CasePath, changes_ini_path: &Path) -> ExitCode {
    match patcher_lib::validate(mod_root, changes_ini_path) {
        Ok(report) => {
            let program = &report.program;
            let total = program.install().len()
                + program.tlk().len()
                + program.two_da().len()
                + program.gff().len()
                + program.hack().len()
                + program.nss().len()
                + program.ssf().len();
            println!("{total} patch entries parsed; every referenced source file is present");
            ExitCode::Success
        }
        Err(PatcherError::ChangesIniNotFound(path)) => {
            eprintln!("instruction file not found: {}", path.display());
            ExitCode::ChangesIniNotFound
        }
        Err(error) => {
            eprintln!("validation failed: {error}");
            ExitCode::ExceptionDuringInstall
        }
    }
}

fn run_install_mode(
    cli: &Cli,
    mod_root: &CasePath,
    game_root: &CasePath,
    changes_ini_path: &Path,
    interactive: bool,
    cli_config: &mut CliConfig,
) -> ExitCode {
    if interactive && !confirm("Install this mod now?") {
        return ExitCode::AbortInstallUnsafe;
    }

    let validation = match patcher_lib::validate(mod_root, changes_ini_path) {
        Ok(validation) => validation,
        Err(PatcherError::ChangesIniNotFound(path)) => {
            eprintln!("instruction file not found: {}", path.display());
            return ExitCode::ChangesIniNotFound;
        }
        Err(error) => {
            eprintln!("install failed: {error}");
            return ExitCode::ExceptionDuringInstall;
        }
    };
    let mut program = validation.program;
    if cli.save_processed_scripts {
        program.settings_mut().set_save_processed_scripts(true);
    }

    let game = program.settings().lookup_game_number().unwrap_or(GameNumber::One);
    let compiler = find_compiler(mod_root.as_path(), game);
    let mut backup = BackupLedger::new(mod_root.as_path(), OffsetDateTime::now_utc());

    if let Err(error) = patcher_lib::check_required_file(&program, game_root) {
        eprintln!("install failed: {error}");
        return ExitCode::ExceptionDuringInstall;
    }

    match patcher_lib::install(&program, mod_root, game_root, compiler.as_ref(), &mut backup) {
        Ok(report) => {
            cli_config.default_game_dir = Some(game_root.as_path().to_path_buf());
            if let Err(error) = cli_config.save() {
                log::warn!("failed to persist CLI config: {error}");
            }

            println!("{} patch entries applied ({})", report.patches, report.logger.summary());
            for warning in report.logger.warnings() {
                eprintln!("warning: {warning}");
            }
            for error in report.logger.errors() {
                eprintln!("error: {error}");
            }

            if report.logger.has_errors() {
                ExitCode::InstallCompletedWithErrors
            } else {
                ExitCode::Success
            }
        }
        Err(PatcherError::ChangesIniNotFound(path)) => {
            eprintln!("instruction file not found: {}", path.display());
            ExitCode::ChangesIniNotFound
        }
        Err(error) => {
            eprintln!("install failed: {error}");
            ExitCode::ExceptionDuringInstall
        }
    }
}

fn run_uninstall_mode(mod_root: &CasePath, game_root: &CasePath) -> ExitCode {
    let mut logger = patcher_lib::logger::PatchLogger::new(patcher_lib::logger::LogLevel::Full);
    match patcher_lib::uninstall(mod_root, game_root, &mut logger) {
        Ok(report) => {
            println!("restored {} file(s), removed {} file(s)", report.restored, report.removed);
            for warning in logger.warnings() {
                eprintln!("warning: {warning}");
            }
            ExitCode::Success
        }
        Err(error) => {
            eprintln!("uninstall failed: {error}");
            ExitCode::ExceptionDuringInstall
        }
    }
}

/// Looks for a `nwnnsscomp`-compatible binary next to the mod's own files, then on `PATH`.
/// Install/uninstall never fail over a missing compiler: scripts are simply skipped with a
/// warning (see `driver::run_nss_list`), matching a mod that ships no `CompileList` entries.
fn find_compiler(mod_root: &Path, game: GameNumber) -> Option<Compiler> {
    let exe_name = if cfg!(target_os = "windows") { "nwnnsscomp.exe" } else { "nwnnsscomp" };

    let bundled = mod_root.join(exe_name);
    let binary = if bundled.is_file() {
        bundled
    } else {
        which(exe_name)?
    };

    Some(Compiler::new(binary, game))
}

fn which(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var).map(|dir| dir.join(name)).find(|candidate| candidate.is_file())
}

fn confirm(message: &str) -> bool {
    matches!(prompt_line(&format!("{message} [y/N] ")), Some(answer) if answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes"))
}

fn prompt_index(message: &str, labels: &[String]) -> Option<usize> {
    println!("{message}:");
    for (index, label) in labels.iter().enumerate() {
        println!("  {index}) {label}");
    }
    prompt_line("> ")?.parse().ok()
}

fn prompt_line(message: &str) -> Option<String> {
    print!("{message}");
    std::io::stdout().flush().ok()?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input).ok()?;
    let trimmed = input.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
