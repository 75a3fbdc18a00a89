use super::{cancel_on_ctrl_c, load_config};
use crate::logging;
use crate::output::Output;
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use emby_sync_config::SchedulerConfig;
use emby_sync_core::{CancelFlag, RunOrchestrator, RunOutcome};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Six-field cron expression (seconds first).
    Cron(String),
    Interval(Duration),
}

impl Trigger {
    /// A cron override or configured cron wins over the interval.
    pub fn resolve(schedule_override: Option<String>, config: &SchedulerConfig) -> Result<Self> {
        if let Some(cron) = schedule_override.or_else(|| config.cron.clone()) {
            return Ok(Trigger::Cron(with_seconds_field(&cron)?));
        }
        match config.interval_minutes {
            Some(minutes) if minutes > 0 => Ok(Trigger::Interval(Duration::from_secs(minutes * 60))),
            _ => Err(eyre!("Scheduler needs a cron expression or a positive interval_minutes")),
        }
    }

    fn describe(&self) -> String {
        match self {
            Trigger::Cron(expr) => format!("cron '{}'", expr),
            Trigger::Interval(every) => format!("every {} minutes", every.as_secs() / 60),
        }
    }
}

/// The scheduler expects a leading seconds field; standard 5-field expressions fire at second 0.
pub fn with_seconds_field(expr: &str) -> Result<String> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    match fields.len() {
        5 => Ok(format!("0 {}", fields.join(" "))),
        6 | 7 => Ok(fields.join(" ")),
        n => Err(eyre!("Invalid cron expression '{}': expected 5 fields, got {}", expr, n)),
    }
}

async fn scheduled_run(orchestrator: &RunOrchestrator, cancel: &CancelFlag, trigger: &str) {
    if cancel.is_cancelled() {
        return;
    }
    info!(operation = "scheduled_run_start", trigger, "Starting scheduled run");
    match orchestrator.run(&[], false).await {
        Ok(RunOutcome::Completed(summary)) => info!(
            operation = "scheduled_run_complete",
            trigger,
            collections = summary.collections(),
            added = summary.added(),
            missing = summary.missing(),
            failed = summary.failed(),
            duration_ms = summary.duration.as_millis() as u64,
            "Scheduled run completed"
        ),
        Ok(RunOutcome::Skipped { lock_path }) => warn!(
            operation = "scheduled_run_skipped",
            trigger,
            lock = %lock_path.display(),
            "Previous run still in progress, skipped"
        ),
        Err(e) => error!(operation = "scheduled_run_error", trigger, error = %e, "Scheduled run failed"),
    }
}

pub async fn run_daemon(
    config_path: Option<PathBuf>,
    schedule_override: Option<String>,
    no_startup_run: bool,
    verbose: u8,
    quiet: bool,
    output: &Output,
) -> Result<()> {
    let (config, paths) = load_config(config_path)?;
    let log_file = paths.daemon_log_file();
    logging::init_daemon_logging(verbose, quiet, &log_file).map_err(|e| eyre!("{}", e))?;

    let scheduler_config = config.scheduler.clone().unwrap_or_default();
    if !scheduler_config.enabled && schedule_override.is_none() {
        return Err(eyre!("Scheduler is disabled in the config; use `embysync run` or pass --schedule"));
    }
    let trigger = Trigger::resolve(schedule_override, &scheduler_config)?;
    let run_on_startup = scheduler_config.run_on_startup && !no_startup_run;

    let cancel = CancelFlag::new();
    cancel_on_ctrl_c(cancel.clone());
    let orchestrator = Arc::new(
        RunOrchestrator::from_config(config, &paths)
            .map_err(|e| eyre!("Failed to set up sync: {}", e))?
            .with_cancel(cancel.clone()),
    );

    output.info(format!(
        "Daemon started ({}), logging to {}. Press Ctrl-C to stop.",
        trigger.describe(),
        log_file.display()
    ));

    if run_on_startup {
        scheduled_run(&orchestrator, &cancel, "startup").await;
    }

    let mut scheduler = JobScheduler::new().await.wrap_err("Failed to create scheduler")?;
    let job = {
        let orchestrator = orchestrator.clone();
        let cancel = cancel.clone();
        let run = move |trigger: &'static str| {
            let orchestrator = orchestrator.clone();
            let cancel = cancel.clone();
            Box::pin(async move { scheduled_run(&orchestrator, &cancel, trigger).await })
                as std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
        };
        match &trigger {
            Trigger::Cron(expr) => Job::new_async(expr.as_str(), move |_id, _sched| run("cron")),
            Trigger::Interval(every) => Job::new_repeated_async(*every, move |_id, _sched| run("interval")),
        }
        .wrap_err_with(|| format!("Invalid schedule {}", trigger.describe()))?
    };
    scheduler.add(job).await.wrap_err("Failed to add scheduled job")?;
    scheduler.start().await.wrap_err("Failed to start scheduler")?;
    info!(operation = "scheduler_started", schedule = %trigger.describe(), "Scheduler started");

    let mut tick = tokio::time::interval(Duration::from_millis(500));
    while !cancel.is_cancelled() {
        tick.tick().await;
    }

    info!(operation = "scheduler_stopping", "Shutting down scheduler");
    scheduler.shutdown().await.wrap_err("Failed to stop scheduler")?;
    output.success("Daemon stopped");
    Ok(())
}
