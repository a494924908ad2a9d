use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application path resolution.
pub struct AppDirs;

impl AppDirs {
    /// Score database under `$HOME/.local/state/typometer`, falling back to
    /// the platform-specific local data directory.
    pub fn db_path() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            let state_dir = PathBuf::from(home)
                .join(".local")
                .join("state")
                .join("typometer");
            Some(state_dir.join("scores.db"))
        } else {
            ProjectDirs::from("", "", "typometer")
                .map(|proj_dirs| proj_dirs.data_local_dir().join("scores.db"))
        }
    }

    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "typometer").map(|pd| pd.config_dir().join("config.json"))
    }

    /// CSV journal of completed sessions, next to the config.
    pub fn journal_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "typometer").map(|pd| pd.config_dir().join("sessions.csv"))
    }
}
