use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    pub fn db_path() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            let state_dir = PathBuf::from(home)
                .join(".local")
                .join("state")
                .join("ringcheck");
            Some(state_dir.join("attempts.db"))
        } else {
            ProjectDirs::from("", "", "ringcheck")
                .map(|proj_dirs| proj_dirs.data_local_dir().join("attempts.db"))
        }
    }

    /// Where the completed-session CSV log lives.
    pub fn session_log_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "ringcheck")
            .map(|proj_dirs| proj_dirs.config_dir().join("log.csv"))
    }
}
