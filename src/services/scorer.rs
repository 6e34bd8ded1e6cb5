//! Driving score aggregation
//!
//! Folds a window's behavior events into a bounded 0-100 score and grade.
//! Pure arithmetic over the event list and the injected scoring tables:
//! no clock reads, no randomness, no persistence.

use crate::domain::{BehaviorEvent, DrivingScoreReport, Grade, VehicleId};
use crate::infra::config::ScoringConfig;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::debug;

/// Aggregates behavior events into a score report
pub struct ScoreAggregator {
    config: ScoringConfig,
}

impl ScoreAggregator {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Score one window of events.
    ///
    /// Each event deducts `weight(kind) * multiplier(risk)` from 100; the
    /// result is rounded and clamped to [0, 100]. Deterministic for
    /// identical input.
    pub fn score(
        &self,
        vehicle_id: VehicleId,
        events: &[BehaviorEvent],
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> DrivingScoreReport {
        let mut deduction = 0.0;
        let mut counts_by_kind: BTreeMap<_, u64> = BTreeMap::new();

        for event in events {
            deduction += self.config.weight(event.kind) * self.config.multiplier(event.risk);
            *counts_by_kind.entry(event.kind).or_insert(0) += 1;
        }

        let score = (100.0 - deduction).max(0.0).round().min(100.0) as u32;
        let grade = Grade::from_score(score);

        debug!(
            vehicle_id = %vehicle_id,
            events = %events.len(),
            deduction = %deduction,
            score = %score,
            grade = %grade.as_str(),
            "window_scored"
        );

        DrivingScoreReport {
            vehicle_id,
            window_start,
            window_end,
            score,
            grade,
            total_events: events.len(),
            counts_by_kind,
        }
    }
}
