use clap::{ArgAction, Parser, Subcommand};
use commands::{covers, daemon, genres, importers, mapping, missing, run};
use std::path::PathBuf;

mod commands;
mod logging;
mod output;

#[derive(Parser)]
#[command(name = "embysync")]
#[command(about = "Keep Emby collections in step with Douban and Bangumi lists")]
#[command(version)]
struct Cli {
    /// Enable verbose output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "human", value_enum)]
    output: output::OutputFormat,

    /// Config file (defaults to the platform config directory)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync collections once and exit
    #[command(long_about = "Fetch every enabled list, match its entries against the Emby library and rebuild the matching collections. Use --importer to run specific importers regardless of whether they are enabled.")]
    Run {
        /// Importer to run (repeatable): hotmovie, doulist, bangumi
        #[arg(short, long = "importer", value_name = "NAME")]
        importers: Vec<String>,

        /// Match and report without changing anything on the server
        #[arg(long, action = ArgAction::SetTrue)]
        dry_run: bool,
    },
    /// Run on a schedule until interrupted
    #[command(long_about = "Run the enabled importers on the configured cron schedule or interval. Runs once at startup unless disabled in the config or with --no-startup-run.")]
    Daemon {
        /// Cron expression overriding the config, e.g. '0 */6 * * *'
        #[arg(long, value_name = "SCHEDULE")]
        schedule: Option<String>,

        /// Skip the run at startup
        #[arg(long, action = ArgAction::SetTrue)]
        no_startup_run: bool,
    },
    /// Fill in missing collection posters and backdrops
    Covers,
    /// Replace English genre tags with the names from [genre_mapping]
    #[command(long_about = "Rewrite the genres of every movie and series in the libraries listed under [genre_mapper] using the [genre_mapping] table. Nothing is written while genre_mapper.dry_run is true or --dry-run is given.")]
    Genres {
        /// Report the changes without writing them
        #[arg(long, action = ArgAction::SetTrue)]
        dry_run: bool,
    },
    /// List the available importers and whether the config enables them
    Importers,
    /// Inspect the missing-items report
    Missing {
        #[command(subcommand)]
        cmd: MissingCommands,
    },
    /// Manage title aliases applied to every list entry
    Mapping {
        #[command(subcommand)]
        cmd: MappingCommands,
    },
}

#[derive(Subcommand)]
pub enum MissingCommands {
    /// Totals per importer and collection, plus the latest rows
    Show {
        /// Number of recent rows to list
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Write a filtered copy of the report
    Export {
        /// Destination CSV file
        path: PathBuf,

        #[arg(long)]
        importer: Option<String>,

        #[arg(long)]
        collection: Option<String>,
    },
    /// Truncate the report
    Clear,
}

#[derive(Subcommand)]
pub enum MappingCommands {
    List,
    /// Map list title FROM to library title TO
    Add { from: String, to: String },
    Remove { from: String },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let output = output::Output::new(cli.output, cli.quiet);

    // The daemon sets up its own file logging.
    if !matches!(cli.command, Commands::Daemon { .. }) {
        logging::init_logging(cli.verbose, cli.quiet).map_err(|e| color_eyre::eyre::eyre!("{}", e))?;
    }

    let config_path = cli.config;
    match cli.command {
        Commands::Run { importers, dry_run } => run::run_once(config_path, importers, dry_run, &output).await,
        Commands::Daemon {
            schedule,
            no_startup_run,
        } => daemon::run_daemon(config_path, schedule, no_startup_run, cli.verbose, cli.quiet, &output).await,
        Commands::Covers => covers::run_covers(config_path, &output).await,
        Commands::Genres { dry_run } => genres::run_genres(config_path, dry_run, &output).await,
        Commands::Importers => importers::list_importers(config_path, &output),
        Commands::Missing { cmd } => missing::run_missing(config_path, cmd, &output),
        Commands::Mapping { cmd } => mapping::run_mapping(config_path, cmd, &output),
    }
}
