//! Central analysis orchestrator
//!
//! The Analyzer coordinates the stateful and pure halves of the core:
//! - Geofence evaluation over incoming position pings (stateful, serialized
//!   per vehicle inside the evaluator)
//! - Trajectory window analysis: detect behavior events, persist them, and
//!   return the score report
//!
//! Scheduling is call-driven: pings arrive on a channel, window analysis is
//! invoked by the caller. Store failure propagates as a hard error; retry
//! policy belongs to the caller.

use crate::domain::{DrivingScoreReport, Geofence, TrackPoint, TransitionKind, VehicleId};
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::ports::{AlertStore, BehaviorStore, GeofenceStore, TrackStore};
use crate::services::behavior_detector::BehaviorDetector;
use crate::services::fence_evaluator::FenceEvaluator;
use crate::services::scorer::ScoreAggregator;
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};
use tracing::{debug, info};

/// Coordinates geofence evaluation and trajectory analysis
pub struct Analyzer {
    /// Stateful entry/exit transition detection
    evaluator: FenceEvaluator,
    /// Pure kinematic anomaly detection
    detector: BehaviorDetector,
    /// Pure score aggregation
    scorer: ScoreAggregator,
    /// Trajectory source
    tracks: Arc<dyn TrackStore>,
    /// Geofence configuration source
    fences: Arc<dyn GeofenceStore>,
    /// Alert sink
    alerts: Arc<dyn AlertStore>,
    /// Behavior event sink
    behaviors: Arc<dyn BehaviorStore>,
    /// Metrics collector
    metrics: Arc<Metrics>,
    /// Active fences, refreshed on the periodic tick
    fence_cache: Vec<Geofence>,
    /// Tick period for fence refresh and metrics reporting
    tick_secs: u64,
}

impl Analyzer {
    pub fn new(
        config: &Config,
        tracks: Arc<dyn TrackStore>,
        fences: Arc<dyn GeofenceStore>,
        alerts: Arc<dyn AlertStore>,
        behaviors: Arc<dyn BehaviorStore>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            evaluator: FenceEvaluator::new(),
            detector: BehaviorDetector::new(config.detection().clone()),
            scorer: ScoreAggregator::new(config.scoring().clone()),
            tracks,
            fences,
            alerts,
            behaviors,
            metrics,
            fence_cache: Vec::new(),
            tick_secs: config.metrics_interval_secs().max(1),
        }
    }

    /// Consume position pings until the channel closes.
    ///
    /// The fence cache is loaded up front and refreshed on each tick, so a
    /// fence change in the store is picked up without restarting the loop.
    pub async fn run(&mut self, mut ping_rx: mpsc::Receiver<TrackPoint>) -> anyhow::Result<()> {
        self.refresh_fences().await?;
        let mut tick = interval(Duration::from_secs(self.tick_secs));
        // First tick fires immediately; skip it so it does not double-refresh
        tick.tick().await;

        loop {
            tokio::select! {
                ping = ping_rx.recv() => {
                    match ping {
                        Some(point) => self.process_ping(point).await?,
                        None => break,
                    }
                }
                _ = tick.tick() => {
                    self.refresh_fences().await?;
                    self.metrics.report();
                }
            }
        }

        info!("ping_channel_closed");
        Ok(())
    }

    /// Evaluate one ping against the cached fences and persist transitions
    pub async fn process_ping(&mut self, point: TrackPoint) -> anyhow::Result<()> {
        let started = Instant::now();
        let transitions = self.evaluator.evaluate(&point, &self.fence_cache);
        self.metrics.record_ping(started.elapsed().as_micros() as u64);

        if transitions.is_empty() {
            return Ok(());
        }

        for transition in &transitions {
            match transition.kind {
                TransitionKind::Entry => self.metrics.record_entry_alert(),
                TransitionKind::Exit => self.metrics.record_exit_alert(),
            }
        }

        self.alerts
            .record_transitions(&transitions)
            .await
            .context("analysis unavailable: alert store rejected transitions")
    }

    /// Analyze one vehicle's trajectory window: detect, persist, score.
    ///
    /// The detected events are persisted before scoring; if the behavior
    /// store is unavailable the error propagates and no report is produced.
    pub async fn analyze_window(
        &self,
        vehicle_id: VehicleId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<DrivingScoreReport> {
        let points = self
            .tracks
            .fetch_window(vehicle_id, start, end)
            .await
            .context("analysis unavailable: track store fetch failed")?;

        let events = self.detector.detect(vehicle_id, &points);
        self.metrics.record_behavior_events(events.len() as u64);

        if !events.is_empty() {
            self.behaviors
                .record_events(&events)
                .await
                .context("analysis unavailable: behavior store rejected events")?;
        }

        let report = self.scorer.score(vehicle_id, &events, start, end);
        self.metrics.record_window_scored();

        debug!(
            vehicle_id = %vehicle_id,
            points = %points.len(),
            events = %events.len(),
            score = %report.score,
            "window_analyzed"
        );

        Ok(report)
    }

    /// Reload the fence cache from the geofence store
    async fn refresh_fences(&mut self) -> anyhow::Result<()> {
        let fences = self
            .fences
            .active_fences()
            .await
            .context("analysis unavailable: geofence store fetch failed")?;
        debug!(fences = %fences.len(), "fence_cache_refreshed");
        self.fence_cache = fences;
        Ok(())
    }

    /// Direct access to the evaluator's containment state (for diagnostics)
    pub fn evaluator(&self) -> &FenceEvaluator {
        &self.evaluator
    }
}
