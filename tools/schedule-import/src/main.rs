use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{filter::FilterFn, layer::SubscriberExt, util::SubscriberInitExt};

use corvallis_transit::prelude::*;

mod gtfs;
mod platforms;

use gtfs::{describe_mapping, load_route_map, load_stop_map, load_stops, CsvFeedSource};
use platforms::JsonPlatformSource;

#[derive(Parser, Debug)]
#[command(
    name = "schedule-import",
    author,
    version,
    about = "Build per-stop bus schedules from a GTFS directory",
    long_about = "Reads routes.txt, trips.txt, calendar.txt, stop_times.txt and stops.txt \
                  from an unpacked GTFS feed, interpolates stop times between timepoints \
                  and builds the per-stop, per-weekday schedule. Route patterns and \
                  platform geometry can be imported first from a JSON export.\n\n\
                  The built data can be queried directly with the nearby and arrivals \
                  subcommands."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output (show debug messages)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Args, Debug)]
struct FeedArgs {
    /// Unpacked GTFS directory
    #[arg(short, long)]
    feed: PathBuf,

    /// CSV mapping feed route ids to system route ids (feed_route_id,route_id)
    #[arg(short, long)]
    route_map: PathBuf,

    /// CSV mapping feed stop ids to stop numbers (stop_id,stop_number)
    #[arg(short, long)]
    stop_map: Option<PathBuf>,

    /// JSON route patterns and platform geometry, imported before the schedule
    #[arg(short, long)]
    platforms: Option<PathBuf>,

    /// Time zone the schedule is published in
    #[arg(long, default_value = "America/Los_Angeles")]
    timezone: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the schedule and report what was ingested
    Import {
        #[command(flatten)]
        feed: FeedArgs,
    },

    /// List stops within a radius of a point
    Nearby {
        #[command(flatten)]
        feed: FeedArgs,

        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Search radius in meters
        #[arg(long, default_value = "500")]
        radius: f64,
    },

    /// Show the next buses at some stops
    Arrivals {
        #[command(flatten)]
        feed: FeedArgs,

        /// Comma separated stop numbers
        #[arg(long)]
        stops: String,

        /// Instant to look at (RFC 3339), defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
}

fn setup_logging(verbose: bool) {
    let level = if verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };
    let filter = FilterFn::new(|meta| {
        meta.module_path()
            .map(|path| path.starts_with("corvallis_transit") || path.starts_with("schedule_import"))
            .unwrap_or(false)
    });

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().without_time().with_target(false))
        .with(filter)
        .with(level)
        .init();
}

/// Load the stops and build the schedule into a fresh in-memory service
async fn load_service(
    args: &FeedArgs,
) -> Result<(TransitService, Option<PlatformReport>, IngestReport)> {
    if !args.feed.is_dir() {
        bail!("Feed directory not found: {}", args.feed.display());
    }

    let timezone: chrono_tz::Tz = args
        .timezone
        .parse()
        .map_err(|e| anyhow::anyhow!("Unknown time zone {:?}: {}", args.timezone, e))?;

    let stop_map = match &args.stop_map {
        Some(path) => load_stop_map(path).context("Failed to read stop map")?,
        None => Default::default(),
    };
    let mapping = load_route_map(&args.route_map).context("Failed to read route map")?;
    tracing::info!("Mapped routes: {}", describe_mapping(&mapping));

    let stops = load_stops(&args.feed, &stop_map).context("Failed to read stops.txt")?;
    let store = Arc::new(MemoryTransitStore::from_data(stops, vec![]));

    let service = TransitService::new(
        Stores::shared(store),
        Arc::new(MemoryLiveFeed::new()),
        EngineConfig::default().with_timezone(timezone),
    );

    let platforms = match &args.platforms {
        Some(path) => Some(
            service
                .import_platforms(&JsonPlatformSource::new(path.clone()))
                .await
                .context("Platform import failed")?,
        ),
        None => None,
    };

    let source = CsvFeedSource::new(args.feed.clone(), stop_map);
    let report = service
        .rebuild_schedule(&source, &mapping)
        .await
        .context("Schedule build failed")?;

    Ok((service, platforms, report))
}

fn print_report(platforms: Option<&PlatformReport>, report: &IngestReport) {
    if let Some(platforms) = platforms {
        println!("Platforms:    {platforms}");
    }
    let skipped = &report.skipped;
    println!("Trips:        {}", report.trips);
    println!("Arrivals:     {} ({} interpolated)", report.arrivals, report.interpolated);
    println!("Routes:       {}", report.routes);
    println!("Skipped:      {}", skipped.total());
    println!("  unmapped route:    {}", skipped.unmapped_route);
    println!("  unknown trip:      {}", skipped.unknown_trip);
    println!("  unknown service:   {}", skipped.unknown_service);
    println!("  unknown stop:      {}", skipped.unknown_stop);
    println!("  malformed row:     {}", skipped.malformed_row);
    println!("  missing timepoint: {}", skipped.missing_timepoint);
    println!("  rejected row:      {}", skipped.rejected_row);
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match &cli.command {
        Command::Import { feed } => {
            let (_, platforms, report) = load_service(feed).await?;
            if cli.json {
                let summary = serde_json::json!({
                    "platforms": platforms,
                    "schedule": report,
                });
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_report(platforms.as_ref(), &report);
            }
        }

        Command::Nearby {
            feed,
            lat,
            lon,
            radius,
        } => {
            let (service, _, _) = load_service(feed).await?;
            let found = service.nearby(*lat, *lon, *radius).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&found)?);
            } else {
                for nearby in &found {
                    println!("{:>8.0} m  {:>6}  {}", nearby.distance, nearby.stop.id, nearby.stop.name);
                }
                if found.is_empty() {
                    println!("No stops within {radius} m");
                }
            }
        }

        Command::Arrivals { feed, stops, at } => {
            let stop_ids = parse_stop_list(stops)?;
            let (service, _, _) = load_service(feed).await?;
            let response = service.reconcile(&stop_ids, *at).await?;

            if cli.json {
                let by_stop: BTreeMap<String, &Vec<Arrival>> = response
                    .arrivals
                    .iter()
                    .map(|(id, arrivals)| (id.to_string(), arrivals))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&by_stop)?);
            } else {
                for (stop_id, arrivals) in &response.arrivals {
                    println!("Stop {stop_id}");
                    for arrival in arrivals {
                        println!(
                            "  {:<6} scheduled {}  expected {}",
                            arrival.route,
                            arrival.scheduled.format("%H:%M"),
                            arrival.expected.format("%H:%M")
                        );
                    }
                }
            }

            for (stop_id, error) in &response.failed {
                tracing::warn!("Stop {}: {}", stop_id, error);
            }
            if !response.incomplete.is_empty() {
                tracing::warn!("Timed out before finishing {} stops", response.incomplete.len());
            }
        }
    }

    Ok(())
}
