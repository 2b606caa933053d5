use std::{
    net::SocketAddr,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use anyhow::Result;
use bike_traffic::{
    adapters::bluebikes::BluebikesAdapter,
    server,
    traffic::{
        Dataset, TimeFilter,
        controller::RecomputeController,
        render::{GeoJsonRenderer, StationMarker},
        scale::DEFAULT_MAX_RADIUS,
        window::{CircularWindow, WINDOW_RADIUS_MINUTES},
    },
};
use clap::{Parser, Subcommand};
use itertools::Itertools;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bike_traffic")]
#[command(about = "Bike station traffic by time of day", long_about = None)]
struct Cli {
    /// Station JSON (bare array or GBFS envelope)
    #[arg(long, env = "BIKE_TRAFFIC_STATIONS")]
    stations: PathBuf,

    /// Trip CSV, optionally gzipped or inside a zip archive
    #[arg(long, env = "BIKE_TRAFFIC_TRIPS")]
    trips: PathBuf,

    /// Marker radius of the busiest station
    #[arg(long, env = "BIKE_TRAFFIC_MAX_RADIUS", default_value_t = DEFAULT_MAX_RADIUS)]
    max_radius: f64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the busiest stations around a time of day
    Summary {
        /// HH:MM, minute of day, or "any"
        #[arg(short, long, default_value = "any")]
        time: TimeFilter,

        /// Number of stations to list
        #[arg(short = 'n', long, default_value_t = 20)]
        top: usize,
    },
    /// Serve station traffic as GeoJSON over HTTP
    Serve {
        #[arg(long, env = "BIKE_TRAFFIC_ADDR", default_value = "127.0.0.1:3000")]
        addr: SocketAddr,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let now = std::time::Instant::now();
    info!("Loading stations and trips");
    let adapter = BluebikesAdapter::new(&cli.stations, &cli.trips);
    let dataset = Dataset::from_adapter(&adapter)?;
    info!("Done in {:?}", now.elapsed());

    match cli.command {
        Commands::Summary { time, top } => {
            let mut controller = RecomputeController::new(Vec::new(), cli.max_radius);
            controller.on_time_filter_changed(time);
            controller.load(dataset)?;
            print_summary(time, controller.renderer(), top);
        }
        Commands::Serve { addr } => {
            let mut controller =
                RecomputeController::new(GeoJsonRenderer::default(), cli.max_radius);
            controller.load(dataset)?;
            server::serve(Arc::new(Mutex::new(controller)), addr).await?;
        }
    }

    Ok(())
}

fn print_summary(filter: TimeFilter, markers: &[StationMarker], top: usize) {
    match filter.minute() {
        Some(minute) => {
            let window = CircularWindow::around(minute, WINDOW_RADIUS_MINUTES);
            println!(
                "Trips within {WINDOW_RADIUS_MINUTES} minutes of {} ({} to {})",
                minute.label_12h(),
                window.lo(),
                window.hi()
            );
        }
        None => println!("Trips at any time"),
    }

    for marker in markers
        .iter()
        .sorted_by(|a, b| b.total_traffic.cmp(&a.total_traffic).then(a.id.cmp(&b.id)))
        .take(top)
    {
        println!(
            "{:<10} {:<40} r={:>5.1}  {}",
            marker.id,
            marker.name.as_deref().unwrap_or("-"),
            marker.radius,
            marker.tooltip
        );
    }
}
