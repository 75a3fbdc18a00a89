use super::{config_path, read_config};
use crate::output::{new_table, Output};
use crate::MissingCommands;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use emby_sync_config::PathManager;
use emby_sync_core::CsvMissingReport;
use emby_sync_models::MissingRecord;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;

pub fn run_missing(config_override: Option<PathBuf>, cmd: MissingCommands, output: &Output) -> Result<()> {
    let paths = PathManager::default();
    let config = read_config(&config_path(config_override, &paths))?;
    let report = config.missing_report_path(&paths);

    match cmd {
        MissingCommands::Show { limit } => {
            let records = CsvMissingReport::load(&report).map_err(|e| eyre!("{}", e))?;
            show(&records, limit, output);
        }
        MissingCommands::Export {
            path,
            importer,
            collection,
        } => {
            let records = CsvMissingReport::load(&report).map_err(|e| eyre!("{}", e))?;
            let selected = filter_records(records, importer.as_deref(), collection.as_deref());
            CsvMissingReport::export(&selected, &path)
                .map_err(|e| eyre!("Failed to write {}: {}", path.display(), e))?;
            output.success(format!("Exported {} rows to {}", selected.len(), path.display()));
            output.report(&json!({ "exported": selected.len(), "path": path }));
        }
        MissingCommands::Clear => {
            CsvMissingReport::clear(&report).map_err(|e| eyre!("Failed to clear {}: {}", report.display(), e))?;
            output.success(format!("Cleared {}", report.display()));
        }
    }
    Ok(())
}

fn show(records: &[MissingRecord], limit: usize, output: &Output) {
    if records.is_empty() {
        output.info("No missing items recorded");
        output.report(&json!({ "total": 0 }));
        return;
    }

    let by_importer = totals_by(records, |r| r.importer.clone());
    let by_collection = totals_by(records, |r| format!("{} / {}", r.importer, r.collection));
    let latest: Vec<&MissingRecord> = records.iter().rev().take(limit).collect();

    if output.is_human() {
        let mut importers = new_table(&["Importer", "Missing"]);
        for (name, count) in &by_importer {
            importers.add_row(vec![name.clone(), count.to_string()]);
        }
        output.table(&importers);

        let mut collections = new_table(&["Collection", "Missing"]);
        for (name, count) in &by_collection {
            collections.add_row(vec![name.clone(), count.to_string()]);
        }
        output.table(&collections);

        let mut rows = new_table(&["Recorded", "Collection", "Title", "Year", "Reason"]);
        for record in &latest {
            rows.add_row(vec![
                record.recorded_at.format("%Y-%m-%d %H:%M").to_string(),
                record.collection.clone(),
                record.title.clone(),
                record.year.map(|y| y.to_string()).unwrap_or_default(),
                record.reason.to_string(),
            ]);
        }
        output.table(&rows);
        output.info(format!("{} missing items recorded", records.len()));
    }

    output.report(&json!({
        "total": records.len(),
        "by_importer": by_importer.into_iter().collect::<BTreeMap<_, _>>(),
        "by_collection": by_collection.into_iter().collect::<BTreeMap<_, _>>(),
        "latest": latest,
    }));
}

/// Counts per key, sorted by key.
fn totals_by<F>(records: &[MissingRecord], key: F) -> Vec<(String, usize)>
where
    F: Fn(&MissingRecord) -> String,
{
    let mut totals: BTreeMap<String, usize> = BTreeMap::new();
    for record in records {
        *totals.entry(key(record)).or_default() += 1;
    }
    totals.into_iter().collect()
}

fn filter_records(records: Vec<MissingRecord>, importer: Option<&str>, collection: Option<&str>) -> Vec<MissingRecord> {
    records
        .into_iter()
        .filter(|r| importer.map_or(true, |i| r.importer == i))
        .filter(|r| collection.map_or(true, |c| r.collection == c))
        .collect()
}
