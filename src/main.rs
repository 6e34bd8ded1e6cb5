//! fleet-analysis - offline trajectory analysis for fleet telemetry
//!
//! Replays a JSONL track-point file through the analysis core: geofence
//! transition detection against the fences declared in config, then
//! per-vehicle behavior detection and scoring over the full file window.
//!
//! Module structure:
//! - `domain/` - Core telemetry types (TrackPoint, Geofence, BehaviorEvent)
//! - `io/` - External interfaces (store ports, JSONL ingest/egress)
//! - `services/` - Analysis logic (FenceEvaluator, BehaviorDetector, Scorer)
//! - `infra/` - Infrastructure (Config, Metrics)

use anyhow::Context;
use clap::Parser;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

use fleet_telemetry::domain::VehicleId;
use fleet_telemetry::infra::{Config, Metrics};
use fleet_telemetry::io::{
    track_reader, ConfigGeofenceStore, Egress, InMemoryTrackStore, JsonlAlertStore,
    JsonlBehaviorStore,
};
use fleet_telemetry::services::Analyzer;

/// fleet-analysis - offline trajectory and geofence analysis
#[derive(Parser, Debug)]
#[command(name = "fleet-analysis", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/dev.toml")]
    config: String,

    /// JSONL file of track points to replay
    #[arg(short, long)]
    tracks: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    // Default: INFO, use RUST_LOG=debug for full event visibility
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    let args = Args::parse();
    info!(git_hash = env!("GIT_HASH"), config = %args.config, "fleet-analysis starting");

    let config = Config::load_from_path(&args.config);
    info!(
        config_file = %config.config_file(),
        geofences = %config.geofences().len(),
        overspeed_kmh = %config.detection().overspeed_threshold_kmh,
        "config_loaded"
    );

    let points = track_reader::read_track_points(&args.tracks)?;
    if points.is_empty() {
        anyhow::bail!("no track points in {}", args.tracks);
    }

    let track_store = Arc::new(InMemoryTrackStore::new());
    track_store.push_points(points.iter().cloned());

    let metrics = Arc::new(Metrics::new());
    let egress = config.egress();
    let mut analyzer = Analyzer::new(
        &config,
        track_store.clone(),
        Arc::new(ConfigGeofenceStore::new(config.geofences().to_vec())),
        Arc::new(JsonlAlertStore::new(&egress.alerts_file)),
        Arc::new(JsonlBehaviorStore::new(&egress.events_file)),
        metrics.clone(),
    );

    // Replay all pings through the geofence loop in file order
    let (tx, rx) = mpsc::channel(1024);
    let replay = points.clone();
    let feeder = tokio::spawn(async move {
        for point in replay {
            if tx.send(point).await.is_err() {
                break;
            }
        }
    });
    analyzer.run(rx).await?;
    feeder.await.context("ping feeder task panicked")?;

    // Per-vehicle window analysis over the full span of the file
    let vehicles: BTreeSet<VehicleId> = points.iter().map(|p| p.vehicle_id).collect();
    let reports_egress = Egress::new(&egress.reports_file);

    for vehicle_id in vehicles {
        let timestamps = points
            .iter()
            .filter(|p| p.vehicle_id == vehicle_id)
            .map(|p| p.timestamp);
        let start = timestamps.clone().min().context("empty vehicle window")?;
        let end = timestamps.max().context("empty vehicle window")?;

        let report = analyzer.analyze_window(vehicle_id, start, end).await?;
        info!(
            vehicle_id = %vehicle_id,
            score = %report.score,
            grade = %report.grade.as_str(),
            events = %report.total_events,
            "vehicle_scored"
        );
        reports_egress.write(&report)?;
    }

    metrics.report();
    info!("fleet-analysis done");
    Ok(())
}
