use super::{config_path, read_config};
use crate::output::{new_table, Output};
use crate::MappingCommands;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use emby_sync_config::{Config, PathManager};
use std::path::{Path, PathBuf};

pub fn run_mapping(config_override: Option<PathBuf>, cmd: MappingCommands, output: &Output) -> Result<()> {
    let paths = PathManager::default();
    let path = config_path(config_override, &paths);
    let mut config = read_config(&path)?;

    match cmd {
        MappingCommands::List => {
            if config.name_mapping.is_empty() {
                output.info("No title mappings configured");
            }
            let mut table = new_table(&["List title", "Library title"]);
            for (from, to) in &config.name_mapping {
                table.add_row(vec![from.as_str(), to.as_str()]);
            }
            if !config.name_mapping.is_empty() {
                output.table(&table);
            }
            output.report(&config.name_mapping);
        }
        MappingCommands::Add { from, to } => {
            let from = from.trim().to_string();
            let to = to.trim().to_string();
            if from.is_empty() || to.is_empty() {
                return Err(eyre!("Both titles must be non-empty"));
            }
            match config.name_mapping.insert(from.clone(), to.clone()) {
                Some(previous) if previous == to => {
                    output.info(format!("'{}' already maps to '{}'", from, to));
                    return Ok(());
                }
                Some(previous) => output.warn(format!("Replacing '{}' -> '{}'", from, previous)),
                None => {}
            }
            save(&config, &path)?;
            output.success(format!("Mapped '{}' -> '{}'", from, to));
        }
        MappingCommands::Remove { from } => {
            if config.name_mapping.remove(from.trim()).is_none() {
                output.warn(format!("No mapping for '{}'", from));
                return Ok(());
            }
            save(&config, &path)?;
            output.success(format!("Removed mapping for '{}'", from));
        }
    }
    Ok(())
}

fn save(config: &Config, path: &Path) -> Result<()> {
    config
        .save_to_file(path)
        .map_err(|e| eyre!("Failed to save config to {}: {}", path.display(), e))
}
