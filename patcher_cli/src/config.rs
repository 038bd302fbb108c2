//! Persisted CLI settings: the one thing this tool remembers between runs, as opposed to
//! everything a `changes.ini` itself carries (which lives entirely in `patcher_lib::program`).
//!
//! Grounded on `patcher_lib/src/config/mod.rs`'s `ProjectDirs`-based config path lookup,
//! re-targeted at this tool's own identifier and persisted as `ron` instead of that file's
//! bincode-backed settings blob.

use std::fs;
use std::path::PathBuf;

use directories::ProjectDirs;
use patcher_lib::logger::LogLevel;
use serde_derive::{Deserialize, Serialize};

const QUALIFIER: &str = "";
const ORGANIZATION: &str = "kotor-patch-engine";
const APPLICATION: &str = "patcher";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Remembered `--game-dir`, offered as the default the next time none is given.
    pub default_game_dir: Option<PathBuf>,
    /// Remembered `!LogLevel` override, applied when the instruction file doesn't set one.
    pub default_log_level: Option<LogLevel>,
}

impl CliConfig {
    /// Loads the persisted config, falling back to defaults if it's missing, unreadable, or
    /// fails to parse (a corrupt config file should never stop the tool from running).
    pub fn load() -> Self {
        let Some(path) = config_path() else { return Self::default() };
        let Ok(text) = fs::read_to_string(&path) else { return Self::default() };
        ron::from_str(&text).unwrap_or_default()
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let Some(path) = config_path() else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        fs::write(path, text)?;
        Ok(())
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
}

pub fn config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.ron"))
}

pub fn log_file_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().join("patcher_cli.log"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_ron() {
        let config = CliConfig {
            default_game_dir: Some(PathBuf::from("/games/kotor2")),
            default_log_level: Some(LogLevel::Warnings),
        };
        let text = ron::ser::to_string(&config).unwrap();
        let parsed: CliConfig = ron::from_str(&text).unwrap();
        assert_eq!(parsed.default_game_dir, config.default_game_dir);
        assert_eq!(parsed.default_log_level, Some(LogLevel::Warnings));
    }
}
