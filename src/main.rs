//! # Dive Tracker Application Entry Point
//!
//! Command-line front end for the conditions dashboard:
//! - `dashboard`: fetch every configured spot and print the table plus a tide panel
//! - `tides`: tide prediction for arbitrary coordinates (`--offline` skips the API)
//! - `spots`: list, add or remove dive spots in the config file
//!
//! Logs go to stderr so the dashboard on stdout stays clean.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dive_tracker_lib::aggregator::{ConditionsAggregator, TideConditions};
use dive_tracker_lib::cache::DataCache;
use dive_tracker_lib::config::{self, Config, DiveSpot};
use dive_tracker_lib::marine::OpenMeteoClient;
use dive_tracker_lib::renderer::{draw_dashboard, draw_tide_panel};
use dive_tracker_lib::tide_data::{StormglassClient, TideApi, TidePredictionService};

#[derive(Parser, Debug)]
#[command(
    name = "dive-tracker",
    version,
    about = "Dive site conditions and tide dashboard"
)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = config::DEFAULT_PATH)]
    config: PathBuf,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Conditions for every configured spot
    Dashboard {
        /// Spot to show the tide panel for (defaults to the first)
        #[arg(long)]
        spot: Option<String>,
    },
    /// Tide prediction for a location
    Tides(TidesArgs),
    /// Manage dive spots
    #[command(subcommand)]
    Spots(SpotsCommand),
}

#[derive(Args, Debug)]
struct TidesArgs {
    #[arg(long, allow_hyphen_values = true)]
    lat: f64,
    #[arg(long, allow_hyphen_values = true)]
    lng: f64,
    /// Defaults to the configured number of days
    #[arg(long)]
    days: Option<i64>,
    /// Use only the offline harmonic model
    #[arg(long)]
    offline: bool,
}

#[derive(Subcommand, Debug)]
enum SpotsCommand {
    List,
    Add {
        #[arg(long)]
        name: String,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        #[arg(long, default_value = "")]
        region: String,
        #[arg(long, default_value = "")]
        depth: String,
        #[arg(long)]
        description: Option<String>,
    },
    Remove {
        #[arg(long)]
        name: String,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn tide_service(config: &Config, offline: bool) -> anyhow::Result<TidePredictionService> {
    if offline {
        return Ok(TidePredictionService::offline());
    }
    let api: Option<Box<dyn TideApi>> = match &config.tides.api_key {
        Some(key) => Some(Box::new(
            StormglassClient::new(key.clone(), Duration::from_secs(config.tides.timeout_secs))
                .context("failed to create Stormglass client")?,
        )),
        None => {
            info!("STORMGLASS_API_KEY not set, tides come from the offline model");
            None
        }
    };
    Ok(TidePredictionService::new(api))
}

async fn cmd_dashboard(config: &Config, spot: Option<String>) -> anyhow::Result<()> {
    if config.spots.is_empty() {
        bail!("no dive spots configured; add one with `dive-tracker spots add`");
    }
    if let Some(name) = &spot {
        if config.spot(name).is_none() {
            bail!("no spot named '{name}'");
        }
    }

    let marine = OpenMeteoClient::new(Duration::from_secs(config.tides.timeout_secs))
        .context("failed to create Open-Meteo client")?;
    let mut aggregator = ConditionsAggregator::new(
        Box::new(marine),
        tide_service(config, false)?,
        config.thresholds.clone(),
        config.tides.days,
    );
    if config.cache.enabled {
        match DataCache::open(&config.cache.dir) {
            Ok(cache) => aggregator = aggregator.with_cache(cache),
            Err(e) => warn!(dir = %config.cache.dir.display(), error = %e, "cache disabled"),
        }
    }

    let conditions = aggregator.fetch_all(&config.spots).await;
    draw_dashboard(&conditions, spot.as_deref());
    Ok(())
}

async fn cmd_tides(config: &Config, args: TidesArgs) -> anyhow::Result<()> {
    let days = args.days.unwrap_or(config.tides.days);
    let service = tide_service(config, args.offline)?;
    let now = Utc::now();
    let prediction = service
        .predict_at(args.lat, args.lng, days, now)
        .await
        .context("tide prediction failed")?;

    let tides = TideConditions::from_prediction(prediction, now);
    draw_tide_panel(&format!("{:.3}, {:.3}", args.lat, args.lng), &tides);
    Ok(())
}

fn cmd_spots(config_path: &Path, mut config: Config, command: SpotsCommand) -> anyhow::Result<()> {
    match command {
        SpotsCommand::List => {
            for s in &config.spots {
                println!(
                    "{:<20} {:>8.3} {:>9.3}  {:<12} {}",
                    s.name, s.lat, s.lng, s.region, s.depth_range
                );
            }
            return Ok(());
        }
        SpotsCommand::Add {
            name,
            lat,
            lng,
            region,
            depth,
            description,
        } => {
            let mut spot = DiveSpot::new(name, lat, lng)
                .with_region(region)
                .with_depth_range(depth);
            spot.description = description;
            config.add_spot(spot)?;
        }
        SpotsCommand::Remove { name } => {
            let removed = config.remove_spot(&name)?;
            info!(spot = %removed.name, "removed spot");
        }
    }
    config
        .save_to_path(config_path)
        .with_context(|| format!("failed to write {}", config_path.display()))
}

fn main() -> anyhow::Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Spots(command) => {
            // edit the file as written, without env overrides
            let config = match Config::try_load(&cli.config) {
                Ok(config) => config,
                Err(e) if e.is_not_found() => Config::default(),
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("refusing to rewrite {}", cli.config.display()))
                }
            };
            cmd_spots(&cli.config, config, command)
        }
        Command::Dashboard { spot } => {
            let config = Config::load_from_path(&cli.config);
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(cmd_dashboard(&config, spot))
        }
        Command::Tides(args) => {
            let config = Config::load_from_path(&cli.config);
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(cmd_tides(&config, args))
        }
    }
}
