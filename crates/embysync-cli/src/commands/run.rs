use super::ui::Progress;
use super::{cancel_on_ctrl_c, load_config};
use crate::output::{new_table, Output};
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use emby_sync_core::{CancelFlag, RunOrchestrator, RunOutcome, RunSummary};
use std::path::PathBuf;

pub async fn run_once(config_path: Option<PathBuf>, importers: Vec<String>, dry_run: bool, output: &Output) -> Result<()> {
    tracing::debug!("Run command started");
    let (config, paths) = load_config(config_path)?;

    let cancel = CancelFlag::new();
    cancel_on_ctrl_c(cancel.clone());
    let orchestrator = RunOrchestrator::from_config(config, &paths)
        .map_err(|e| eyre!("Failed to set up sync: {}", e))?
        .with_cancel(cancel);

    let spinner = Progress::spinner(output.is_human(), "Syncing collections...");
    let outcome = orchestrator.run(&importers, dry_run).await;
    spinner.clear();

    let outcome = outcome.wrap_err("Sync run failed")?;
    match &outcome {
        RunOutcome::Skipped { lock_path } => {
            output.warn(format!("Another run holds {}, nothing done", lock_path.display()));
        }
        RunOutcome::Completed(summary) => print_summary(summary, output),
    }
    output.report(&outcome);
    Ok(())
}

fn print_summary(summary: &RunSummary, output: &Output) {
    if !output.is_human() {
        return;
    }

    let mut table = new_table(&["Importer", "Collection", "Added", "Missing", "Status"]);
    for importer in &summary.importers {
        for collection in &importer.collections {
            let status = if collection.cancelled {
                "cancelled"
            } else if collection.created {
                "created"
            } else {
                "rebuilt"
            };
            table.add_row(vec![
                importer.importer.clone(),
                collection.collection.clone(),
                collection.added.len().to_string(),
                collection.missing.len().to_string(),
                status.to_string(),
            ]);
        }
        for failed in &importer.failed {
            table.add_row(vec![
                importer.importer.clone(),
                failed.collection.clone().unwrap_or_else(|| failed.source_id.clone()),
                "-".to_string(),
                "-".to_string(),
                format!("failed: {}", failed.error),
            ]);
        }
        for source_id in &importer.skipped_sources {
            table.add_row(vec![
                importer.importer.clone(),
                source_id.clone(),
                "-".to_string(),
                "-".to_string(),
                "skipped".to_string(),
            ]);
        }
    }
    output.table(&table);

    let prefix = if summary.dry_run { "[dry-run] " } else { "" };
    let line = format!(
        "{}{} collections, {} items added, {} missing in {:.1}s",
        prefix,
        summary.collections(),
        summary.added(),
        summary.missing(),
        summary.duration.as_secs_f64()
    );
    if summary.failed() > 0 || summary.cancelled {
        output.warn(line);
    } else {
        output.success(line);
    }
}
