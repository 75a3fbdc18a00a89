use super::ui::Progress;
use super::{cancel_on_ctrl_c, load_config};
use crate::output::{new_table, Output};
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use emby_sync_core::{CancelFlag, GenreMapper, GenreRules, GenreSummary};
use emby_sync_sources::{EmbyApi, EmbyHttpClient};
use std::path::PathBuf;
use std::sync::Arc;

pub async fn run_genres(config_path: Option<PathBuf>, dry_run: bool, output: &Output) -> Result<()> {
    let (config, _paths) = load_config(config_path)?;
    config
        .validate_genre_mapper()
        .map_err(|e| eyre!("Genre mapping is not configured: {}", e))?;

    let api: Arc<dyn EmbyApi> =
        Arc::new(EmbyHttpClient::new(&config.server).map_err(|e| eyre!("Failed to create Emby client: {}", e))?);
    api.server_info().await.wrap_err("Emby server is unreachable")?;

    let cancel = CancelFlag::new();
    cancel_on_ctrl_c(cancel.clone());
    let dry_run = dry_run || config.genre_mapper.dry_run;
    let mapper = GenreMapper::new(api, GenreRules::from_mapping(&config.genre_mapping), dry_run, cancel);

    let spinner = Progress::spinner(output.is_human(), "Mapping genres...");
    let summary = mapper.run(&config.genre_mapper.library_names).await;
    spinner.clear();

    let summary = summary.wrap_err("Failed to list libraries")?;
    print_summary(&summary, output);
    output.report(&summary);
    Ok(())
}

fn print_summary(summary: &GenreSummary, output: &Output) {
    if !output.is_human() {
        return;
    }

    let mut table = new_table(&["Library", "Scanned", "Changed", "Failed"]);
    for library in &summary.libraries {
        table.add_row(vec![
            library.library.clone(),
            library.scanned.to_string(),
            library.changed.len().to_string(),
            library.failed.len().to_string(),
        ]);
    }
    if !summary.libraries.is_empty() {
        output.table(&table);
    }

    for library in &summary.libraries {
        if let Some(error) = &library.error {
            output.warn(format!("{}: {}", library.library, error));
        }
    }
    for name in &summary.missing_libraries {
        output.warn(format!("No library named '{}' on the server", name));
    }
    if summary.cancelled {
        output.warn("Interrupted before all items were processed");
    }

    let verb = if summary.dry_run { "Would update" } else { "Updated" };
    output.success(format!("{} genres on {} items", verb, summary.changed()));
}
