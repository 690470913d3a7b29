//! Event Gallery command line entry point

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use event_gallery::{
    get_metrics, parse_event_date, Clock, Config, Event, EventStatus, EventTiming,
    GalleryBatchLoader, GalleryClient, HttpGalleryApi, SystemClock,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Event Gallery: event timing and gallery previews
#[derive(Parser, Debug)]
#[command(name = "event-gallery")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify an event as upcoming, today, past or cancelled
    Classify {
        /// Event date (YYYY-MM-DD or ISO datetime)
        #[arg(short, long)]
        date: String,
        /// Start time, e.g. "2:30 PM" or "14:30"
        #[arg(short, long)]
        time: Option<String>,
        /// Event status
        #[arg(short, long, default_value = "published")]
        status: String,
        /// Evaluate against this local time instead of the wall clock
        #[arg(long)]
        now: Option<String>,
    },
    /// Load gallery previews for past events listed in a JSON file
    Previews {
        /// JSON file holding an array of events
        #[arg(short, long)]
        events: PathBuf,
        /// Maximum number of events to consider
        #[arg(short, long)]
        max: Option<usize>,
        /// Print fetch metrics after loading
        #[arg(long)]
        metrics: bool,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };

    init_logging(&config, args.json_logs);

    match args.command {
        Command::Classify {
            date,
            time,
            status,
            now,
        } => {
            let date =
                parse_event_date(&date).ok_or_else(|| anyhow!("Invalid event date: {}", date))?;
            let status: EventStatus = status.parse().map_err(|e: String| anyhow!(e))?;
            let now = match now {
                Some(raw) => parse_now(&raw)?,
                None => SystemClock.now(),
            };

            let timing = EventTiming::new(date, time.as_deref(), status, now);
            if args.json {
                println!("{}", serde_json::to_string_pretty(&timing)?);
            } else {
                println!("Starts at: {}", timing.starts_at);
                println!("Phase:     {}", timing.phase);
                println!("Upcoming:  {}", timing.is_upcoming);
                println!("Past:      {}", timing.is_past);
            }
        }
        Command::Previews {
            events,
            max,
            metrics,
        } => {
            let content = std::fs::read_to_string(&events)
                .with_context(|| format!("Failed to read {}", events.display()))?;
            let events: Vec<Event> =
                serde_json::from_str(&content).context("Failed to parse events")?;

            let api = Arc::new(HttpGalleryApi::from_config(&config.api)?);
            let loader = GalleryBatchLoader::new(
                GalleryClient::new(api),
                SystemClock,
                config.loader.clone(),
            );
            let max = max.unwrap_or(config.loader.max_events);
            let report = loader.load_galleries_for(&events, max).await;
            let previews: BTreeMap<_, _> = loader.previews().into_iter().collect();

            if args.json {
                let output = serde_json::json!({
                    "report": report,
                    "previews": previews,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!(
                    "Scheduled {} of {} events in {} batches ({} loaded, {} failed)",
                    report.scheduled,
                    report.requested,
                    report.batches,
                    report.loaded,
                    report.failed.len()
                );
                for (event_id, images) in &previews {
                    println!("{}:", event_id);
                    for image in images {
                        match &image.caption {
                            Some(caption) => println!("  {} ({})", image.url, caption),
                            None => println!("  {}", image.url),
                        }
                    }
                }
                for event_id in &report.failed {
                    println!("{}: unavailable, retry later", event_id);
                }
            }

            if metrics {
                let metrics = get_metrics();
                if args.json {
                    println!("{}", serde_json::to_string_pretty(&metrics.export_json())?);
                } else {
                    print!("{}", metrics.export_prometheus());
                }
            }
        }
        Command::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn init_logging(config: &Config, json_logs: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    if json_logs || config.logging.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Accepts "YYYY-MM-DDTHH:MM[:SS]" or the same with a space separator.
fn parse_now(raw: &str) -> anyhow::Result<NaiveDateTime> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw.trim(), format).ok())
        .ok_or_else(|| anyhow!("Invalid --now value: {}", raw))
}
