mod aggregate;
mod config;
mod loader;
mod models;
mod pipeline;
mod scraper;
mod storage;
mod utils;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{AppConfig, Variant};
use crate::pipeline::progress::{EventSink, FetchEvent};
use crate::pipeline::Pipeline;
use crate::scraper::cleaner::parse_station_date;
use crate::scraper::parsers::extract_series;

#[derive(Parser)]
#[command(name = "sir-scrape", about = "SIR Toscana rainfall / temperature station scraper", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch every catalog station and write the merged table(s)
    Update {
        #[arg(value_enum, default_value = "all")]
        target: Target,

        /// Station catalog (default: assets/stazioni.csv)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Directory for the output CSV files (default: assets/)
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// List the deduplicated station catalog
    Stations {
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// Extract the series from a saved station page
    Parse {
        file: PathBuf,

        #[arg(short = 'd', long = "dataset", value_enum, default_value = "precipitation")]
        variant: Variant,

        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Target {
    Precipitation,
    Temperature,
    All,
}

impl Target {
    fn variants(self) -> Vec<Variant> {
        match self {
            Target::Precipitation => vec![Variant::Precipitation],
            Target::Temperature => vec![Variant::Temperature],
            Target::All => vec![Variant::Precipitation, Variant::Temperature],
        }
    }
}

#[derive(Serialize)]
struct SeriesRow<'a> {
    date: &'a str,
    value: Option<f64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "sir_scrape=info,warn",
        1 => "sir_scrape=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let mut config = AppConfig::load()?;

    match cli.command {
        Command::Update {
            target,
            catalog,
            output_dir,
        } => {
            if let Some(path) = catalog {
                config.pipeline.catalog_path = path;
            }
            if let Some(dir) = output_dir {
                config.pipeline.output_dir = dir;
            }

            for variant in target.variants() {
                let (events, rx) = EventSink::channel();
                let pipeline = Pipeline::new(config.clone(), variant.dataset()).with_events(events);
                let catalog = pipeline.load_catalog()?;
                if catalog.is_empty() {
                    warn!("No stations in {:?}", config.pipeline.catalog_path);
                }

                let progress = spawn_progress(variant, catalog.len() as u64, rx);
                let stats = pipeline.run(&catalog).await;
                drop(pipeline);
                progress.await.ok();

                let stats = stats?;
                println!(
                    "✅ {}: {} stations ({} with data, {} skipped), {} dates → {}",
                    variant,
                    stats.stations,
                    stats.with_data,
                    stats.skipped,
                    stats.dates,
                    stats.output.display()
                );
            }
        }

        Command::Stations { catalog } => {
            if let Some(path) = catalog {
                config.pipeline.catalog_path = path;
            }
            let id_column = config.pipeline.id_column.clone();
            let catalog = Pipeline::new(config, Variant::Precipitation.dataset()).load_catalog()?;

            println!("{} stations:", catalog.len());
            for station in &catalog.stations {
                let attrs: Vec<&str> = catalog
                    .headers
                    .iter()
                    .zip(&station.values)
                    .filter(|(h, v)| h.as_str() != id_column && !v.is_empty())
                    .map(|(_, v)| v.as_str())
                    .collect();
                println!("  {:<14} {}", station.id, attrs.join(" | "));
            }
        }

        Command::Parse {
            file,
            variant,
            json,
        } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {:?}", file))?;
            let series = extract_series(&content, &variant.dataset());
            info!("{:?}: {} dates", file, series.len());

            let mut dates: Vec<&String> = series.keys().collect();
            dates.sort_by(|a, b| (parse_station_date(a), a).cmp(&(parse_station_date(b), b)));

            if json {
                let rows: Vec<SeriesRow> = dates
                    .iter()
                    .map(|d| SeriesRow {
                        date: d,
                        value: series[*d],
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                for d in dates {
                    match series[d] {
                        Some(v) => println!("{}\t{}", d, v),
                        None => println!("{}\t—", d),
                    }
                }
            }
        }
    }

    Ok(())
}

/// Drive a terminal progress bar from the coordinator's events until the
/// pipeline drops its sender.
fn spawn_progress(
    variant: Variant,
    total: u64,
    mut rx: UnboundedReceiver<FetchEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::with_template("{prefix:>13} [{bar:40}] {pos}/{len} {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        pb.set_prefix(variant.to_string());

        while let Some(event) = rx.recv().await {
            match event {
                FetchEvent::Completed { station_id, .. } => {
                    pb.inc(1);
                    pb.set_message(station_id);
                }
                FetchEvent::Retrying {
                    station_id,
                    attempt,
                    wait,
                    ..
                } => {
                    pb.set_message(format!(
                        "{} failed (attempt {}), retrying in {}",
                        station_id,
                        attempt,
                        utils::human_duration(wait)
                    ));
                }
                FetchEvent::Skipped { station_id, reason } => {
                    pb.println(format!("⚠️  {} skipped: {}", station_id, reason));
                }
            }
        }

        pb.finish_with_message("done");
    })
}
