use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use truthpulse_snapshot::calendar::parse_ist_date;
use truthpulse_snapshot::{run_once, GeneratorConfig, RunMode, RunSummary};

#[derive(Debug, Parser)]
#[command(name = "truthpulse-cli")]
#[command(about = "Generate TruthPulse daily snapshot files (IST calendar days)")]
struct Cli {
    /// IST date to generate (YYYY-MM-DD); defaults to today in IST.
    date: Option<String>,

    /// Regenerate every date from the epoch through today.
    #[arg(long)]
    backfill: bool,

    /// Output directory, also where the base feeds are read from.
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,
}

impl Cli {
    fn run_mode(&self) -> Result<RunMode> {
        if self.backfill {
            return Ok(RunMode::Backfill);
        }
        match self.date.as_deref() {
            Some(raw) => Ok(RunMode::Date(parse_ist_date(raw)?)),
            None => Ok(RunMode::Today),
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    // Reject a bad date before touching any file.
    let mode = cli.run_mode()?;

    let mut config = GeneratorConfig::from_env()?;
    if let Some(dir) = cli.data_dir {
        config = config.with_data_dir(dir);
    }
    info!(data_dir = %config.data_dir.display(), epoch = %config.epoch, ?mode, "starting generation");

    match run_once(config, mode).await? {
        RunSummary::Single(summary) => {
            println!(
                "snapshot complete: date={} day_index={} articles={} files={}",
                summary.date, summary.day_index, summary.articles, summary.files_written
            );
        }
        RunSummary::Backfill(summary) => {
            let range = match (summary.first, summary.last) {
                (Some(first), Some(last)) => format!("{first}..={last}"),
                _ => "none".to_string(),
            };
            println!(
                "backfill complete: dates={} range={} files={}",
                summary.dates, range, summary.files_written
            );
        }
    }

    Ok(())
}
