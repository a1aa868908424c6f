use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod clock;
mod config;
mod estimate;
mod models;
mod pipeline;
mod report;
mod store;
mod widget;

use clock::{Clock, SystemClock};
use config::Config;
use estimate::{FixedJitter, JitterSource, RandomJitter};

#[derive(Parser)]
#[command(name = "widget-stats")]
#[command(about = "Poll a Discord server widget and persist display stats", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch widget data and update the stats file (default)
    Fetch(FetchArgs),
    /// Render a markdown summary of the stats file
    Report {
        #[arg(long)]
        stats_file: Option<PathBuf>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Export the update history as CSV
    ExportHistory {
        #[arg(long)]
        stats_file: Option<PathBuf>,
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Args, Default)]
struct FetchArgs {
    #[arg(long)]
    stats_file: Option<PathBuf>,
    #[arg(long)]
    server_id: Option<String>,
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// Disable the random variation applied to the membership estimate
    #[arg(long)]
    no_jitter: bool,
}

impl FetchArgs {
    fn apply(self, mut config: Config) -> Config {
        if let Some(path) = self.stats_file {
            config.stats_path = path;
        }
        if let Some(id) = self.server_id.filter(|id| !id.trim().is_empty()) {
            config.server_id = Some(id);
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout = Duration::from_secs(secs);
        }
        if self.no_jitter {
            config.jitter = false;
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command.unwrap_or_else(|| Commands::Fetch(FetchArgs::default())) {
        Commands::Fetch(args) => {
            let config = args.apply(config);
            let client = widget::build_client(&config).context("failed to build HTTP client")?;
            let mut jitter: Box<dyn JitterSource> = if config.jitter {
                Box::new(RandomJitter)
            } else {
                Box::new(FixedJitter(0))
            };

            let record = pipeline::run(&client, &config, &SystemClock, jitter.as_mut()).await?;

            println!("Stats saved to {}", config.stats_path.display());
            println!("Online: {}", record.online_count);
            println!("Estimated Total: {}", record.estimated_total);
        }
        Commands::Report { stats_file, out } => {
            let path = stats_file.unwrap_or(config.stats_path);
            let record = store::load_record(&path)?;
            let report = report::build_report(&record, SystemClock.now());

            match out {
                Some(out) => {
                    std::fs::write(&out, report)
                        .with_context(|| format!("failed to write {}", out.display()))?;
                    println!("Report written to {}.", out.display());
                }
                None => print!("{report}"),
            }
        }
        Commands::ExportHistory { stats_file, out } => {
            let path = stats_file.unwrap_or(config.stats_path);
            let record = store::load_record(&path)?;
            let written = report::export_history_csv(&record, &out)?;
            println!("Exported {written} history entries to {}.", out.display());
        }
    }

    Ok(())
}
