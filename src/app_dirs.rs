use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "cubik").map(|proj_dirs| proj_dirs.config_dir().join("config.json"))
    }

    pub fn journal_path() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            let state_dir = PathBuf::from(home)
                .join(".local")
                .join("state")
                .join("cubik");
            Some(state_dir.join("solves.csv"))
        } else {
            ProjectDirs::from("", "", "cubik")
                .map(|proj_dirs| proj_dirs.data_local_dir().join("solves.csv"))
        }
    }
}
