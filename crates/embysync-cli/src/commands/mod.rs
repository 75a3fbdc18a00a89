pub mod covers;
pub mod daemon;
pub mod genres;
pub mod importers;
pub mod mapping;
pub mod missing;
pub mod run;
pub mod ui;

use color_eyre::eyre::eyre;
use color_eyre::Result;
use emby_sync_config::{Config, PathManager};
use emby_sync_core::CancelFlag;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub fn config_path(override_path: Option<PathBuf>, paths: &PathManager) -> PathBuf {
    override_path.unwrap_or_else(|| paths.config_file())
}

/// Reads the config file without validating it; used by commands that edit it.
pub fn read_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Err(eyre!(
            "Config file not found at {}. Create it with at least a [server] section (url, api_key).",
            path.display()
        ));
    }
    Config::load_from_file(path).map_err(|e| eyre!("Failed to load config from {}: {}", path.display(), e))
}

/// Loads and validates the config, creating the data and log directories.
pub fn load_config(override_path: Option<PathBuf>) -> Result<(Config, PathManager)> {
    let paths = PathManager::default();
    let path = config_path(override_path, &paths);
    debug!(path = %path.display(), "Loading config");

    let config = read_config(&path)?;
    config
        .validate()
        .map_err(|e| eyre!("Invalid config {}: {}", path.display(), e))?;
    paths
        .ensure_directories()
        .map_err(|e| eyre!("Failed to create data directories: {}", e))?;
    Ok((config, paths))
}

/// Sets `cancel` on the first Ctrl-C so in-flight work stops between entries.
pub fn cancel_on_ctrl_c(cancel: CancelFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing the current request and stopping");
            cancel.cancel();
        }
    });
}
