use super::{config_path, read_config};
use crate::output::{new_table, Output};
use color_eyre::Result;
use emby_sync_config::PathManager;
use emby_sync_sources::SourceFactoryRegistry;
use std::path::PathBuf;

pub fn list_importers(config_override: Option<PathBuf>, output: &Output) -> Result<()> {
    let paths = PathManager::default();
    let config = read_config(&config_path(config_override, &paths))?;
    let importers = SourceFactoryRegistry::new().describe(&config);

    let mut table = new_table(&["Importer", "Description", "Enabled"]);
    for importer in &importers {
        table.add_row(vec![
            importer.name.clone(),
            importer.description.clone(),
            if importer.enabled { "yes" } else { "no" }.to_string(),
        ]);
    }
    output.table(&table);
    output.report(&importers);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use emby_sync_config::Config;

    #[test]
    fn test_lists_from_unvalidated_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        // An enabled doulist without ids would fail validation.
        let mut config = Config::with_server("http://emby:8096", "key");
        config.importers.doulist.enabled = true;
        config.save_to_file(&path).unwrap();

        let output = Output::new(OutputFormat::Json, true);
        assert!(list_importers(Some(path), &output).is_ok());
        assert!(list_importers(Some(dir.path().join("absent.toml")), &output).is_err());
    }
}
