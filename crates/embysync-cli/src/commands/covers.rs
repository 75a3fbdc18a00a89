use super::ui::Progress;
use super::{cancel_on_ctrl_c, load_config};
use crate::output::{new_table, Output};
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use emby_sync_core::{CancelFlag, CoverEvent, CoverFiller, FillOutcome, LibraryIndex};
use emby_sync_sources::EmbyHttpClient;
use std::path::PathBuf;
use std::sync::Arc;

pub async fn run_covers(config_path: Option<PathBuf>, output: &Output) -> Result<()> {
    let (config, _paths) = load_config(config_path)?;

    let api = EmbyHttpClient::new(&config.server).map_err(|e| eyre!("Failed to create Emby client: {}", e))?;
    let index = Arc::new(LibraryIndex::new(Arc::new(api)));
    index.check_server().await.wrap_err("Emby server is unreachable")?;

    let cancel = CancelFlag::new();
    cancel_on_ctrl_c(cancel.clone());
    let filler = CoverFiller::new(index, cancel);

    let progress = Progress::bar(output.is_human());
    let summary = filler
        .fill_all(|event| match event {
            CoverEvent::PassStarted { image, pass, missing } => {
                progress.start_stage(missing as u64, format!("{} pass {}", image, pass));
            }
            CoverEvent::Collection {
                image,
                collection,
                outcome,
            } => {
                let verb = match outcome {
                    FillOutcome::Filled => "filled",
                    FillOutcome::NoChildren => "empty",
                    FillOutcome::NoSourceImage => "no source image",
                    FillOutcome::Failed => "failed",
                };
                progress.advance(format!("{} {}: {}", image, collection.name, verb));
            }
        })
        .await;
    progress.finish("Done");
    let summary = summary.wrap_err("Failed to list collections")?;

    if output.is_human() {
        let mut table = new_table(&["Image", "Pass", "Missing", "Filled"]);
        for pass in &summary.passes {
            table.add_row(vec![
                pass.image.to_string(),
                pass.pass.to_string(),
                pass.missing.to_string(),
                pass.filled.to_string(),
            ]);
        }
        if !summary.passes.is_empty() {
            output.table(&table);
        }
        for (image, names) in &summary.remaining {
            if !names.is_empty() {
                output.warn(format!("{} still missing on: {}", image, names.join(", ")));
            }
        }
        output.success(format!("Filled {} collection images", summary.filled()));
    }
    output.report(&summary);
    Ok(())
}
