//! Geofence transition detection
//!
//! Turns raw position pings into entry/exit transitions by comparing each
//! ping against the last known containment for the (vehicle, fence) pair.
//! Without that persisted state a ping inside a fence is indistinguishable
//! from a crossing, so the ledger is the load-bearing invariant here: it is
//! read and written exactly once per evaluation, under a per-vehicle lock.
//!
//! Locking discipline: a vehicle always hashes to the same shard, so the
//! read-compute-write sequence for one vehicle is serialized while pings
//! for different vehicles proceed in parallel on other shards.

use crate::domain::{
    AlertTransition, Containment, FenceId, Geofence, TrackPoint, TransitionKind, VehicleId,
};
use crate::services::geo;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::{debug, warn};

/// Number of ledger shards. Power of two so the modulo folds to a mask.
const SHARD_COUNT: usize = 16;

/// Containment record for one (vehicle, fence) pair
#[derive(Debug, Clone, Copy)]
struct ContainmentRecord {
    state: Containment,
    #[allow(dead_code)]
    evaluated_at: DateTime<Utc>,
}

/// Stateful evaluator owning the containment ledger
pub struct FenceEvaluator {
    shards: Vec<Mutex<FxHashMap<(VehicleId, FenceId), ContainmentRecord>>>,
}

impl FenceEvaluator {
    pub fn new() -> Self {
        let shards = (0..SHARD_COUNT).map(|_| Mutex::new(FxHashMap::default())).collect();
        Self { shards }
    }

    #[inline]
    fn shard_index(vehicle_id: VehicleId) -> usize {
        // Fibonacci hashing; cheap and spreads sequential ids
        (vehicle_id.0 as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15) as usize & (SHARD_COUNT - 1)
    }

    /// Evaluate one position ping against a set of fences.
    ///
    /// Emits zero or more transitions, one per fence whose containment
    /// changed in a direction its alert mode covers. The stored state is
    /// updated unconditionally for every valid fence, whether or not an
    /// event fired. Invalid fences (bad center or non-positive radius) are
    /// skipped with a warning and do not abort the rest.
    pub fn evaluate(
        &self,
        point: &TrackPoint,
        fences: &[Geofence],
    ) -> SmallVec<[AlertTransition; 2]> {
        let mut transitions = SmallVec::new();
        let mut ledger = self.shards[Self::shard_index(point.vehicle_id)].lock();

        for fence in fences {
            if !fence.active {
                continue;
            }
            if !fence.is_valid() {
                warn!(
                    fence_id = %fence.id,
                    radius_m = %fence.radius_m,
                    "invalid_geofence_config"
                );
                continue;
            }

            let inside = geo::is_inside(point.latitude, point.longitude, fence);
            let prior = ledger
                .get(&(point.vehicle_id, fence.id))
                .map(|r| r.state)
                .unwrap_or(Containment::Unknown);

            let kind = match (prior, inside) {
                (Containment::Unknown | Containment::Outside, true)
                    if fence.alert_mode.fires_on_entry() =>
                {
                    Some(TransitionKind::Entry)
                }
                (Containment::Inside, false) if fence.alert_mode.fires_on_exit() => {
                    Some(TransitionKind::Exit)
                }
                _ => None,
            };

            if let Some(kind) = kind {
                debug!(
                    vehicle_id = %point.vehicle_id,
                    fence_id = %fence.id,
                    prior = %prior.as_str(),
                    kind = %kind.as_str(),
                    "fence_transition"
                );
                transitions.push(AlertTransition {
                    fence_id: fence.id,
                    vehicle_id: point.vehicle_id,
                    latitude: point.latitude,
                    longitude: point.longitude,
                    kind,
                    at: point.timestamp,
                });
            }

            ledger.insert(
                (point.vehicle_id, fence.id),
                ContainmentRecord {
                    state: if inside { Containment::Inside } else { Containment::Outside },
                    evaluated_at: point.timestamp,
                },
            );
        }

        transitions
    }

    /// Last known containment for a pair (Unknown if never evaluated)
    pub fn containment(&self, vehicle_id: VehicleId, fence_id: FenceId) -> Containment {
        self.shards[Self::shard_index(vehicle_id)]
            .lock()
            .get(&(vehicle_id, fence_id))
            .map(|r| r.state)
            .unwrap_or(Containment::Unknown)
    }

    /// Drop ledger entries for a fence that was deactivated or deleted
    pub fn retire_fence(&self, fence_id: FenceId) {
        let mut dropped = 0usize;
        for shard in &self.shards {
            let mut ledger = shard.lock();
            let before = ledger.len();
            ledger.retain(|(_, fid), _| *fid != fence_id);
            dropped += before - ledger.len();
        }
        if dropped > 0 {
            debug!(fence_id = %fence_id, dropped = %dropped, "fence_state_retired");
        }
    }

    /// Number of tracked (vehicle, fence) pairs across all shards
    pub fn tracked_pairs(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }
}

impl Default for FenceEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AlertMode;
    use chrono::TimeZone;

    const CENTER: (f64, f64) = (64.1466, -21.9426);
    // ~1.1 km north of center, outside a 500 m fence
    const FAR: (f64, f64) = (64.1566, -21.9426);

    fn fence(id: i64, mode: AlertMode) -> Geofence {
        Geofence {
            id: FenceId(id),
            name: format!("fence_{id}"),
            center_lat: CENTER.0,
            center_lon: CENTER.1,
            radius_m: 500.0,
            alert_mode: mode,
            active: true,
        }
    }

    fn ping(vehicle: i64, (lat, lon): (f64, f64), secs: i64) -> TrackPoint {
        TrackPoint {
            vehicle_id: VehicleId(vehicle),
            latitude: lat,
            longitude: lon,
            speed_kmh: Some(40.0),
            heading_deg: None,
            timestamp: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
        }
    }

    #[test]
    fn test_entry_exit_sequence_fires_once_each() {
        let evaluator = FenceEvaluator::new();
        let fences = vec![fence(1, AlertMode::Both)];

        // OUTSIDE, INSIDE, INSIDE, OUTSIDE -> exactly [entry, exit]
        let positions = [FAR, CENTER, CENTER, FAR];
        let mut all = Vec::new();
        for (i, pos) in positions.iter().enumerate() {
            all.extend(evaluator.evaluate(&ping(1, *pos, i as i64), &fences));
        }

        assert_eq!(all.len(), 2);
        assert_eq!(all[0].kind, TransitionKind::Entry);
        assert_eq!(all[1].kind, TransitionKind::Exit);
    }

    #[test]
    fn test_first_evaluation_outside_records_without_event() {
        let evaluator = FenceEvaluator::new();
        let fences = vec![fence(1, AlertMode::Both)];

        let transitions = evaluator.evaluate(&ping(1, FAR, 0), &fences);

        assert!(transitions.is_empty());
        assert_eq!(evaluator.containment(VehicleId(1), FenceId(1)), Containment::Outside);
    }

    #[test]
    fn test_first_evaluation_inside_fires_entry() {
        let evaluator = FenceEvaluator::new();
        let fences = vec![fence(1, AlertMode::Entry)];

        let transitions = evaluator.evaluate(&ping(1, CENTER, 0), &fences);

        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].kind, TransitionKind::Entry);
        assert_eq!(evaluator.containment(VehicleId(1), FenceId(1)), Containment::Inside);
    }

    #[test]
    fn test_alert_mode_filters_direction() {
        let evaluator = FenceEvaluator::new();
        let fences = vec![fence(1, AlertMode::Exit)];

        // Entry is suppressed for Exit-mode fences, but state still updates
        assert!(evaluator.evaluate(&ping(1, CENTER, 0), &fences).is_empty());
        assert_eq!(evaluator.containment(VehicleId(1), FenceId(1)), Containment::Inside);

        // The exit still fires
        let transitions = evaluator.evaluate(&ping(1, FAR, 1), &fences);
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].kind, TransitionKind::Exit);
    }

    #[test]
    fn test_no_event_while_state_unchanged() {
        let evaluator = FenceEvaluator::new();
        let fences = vec![fence(1, AlertMode::Both)];

        evaluator.evaluate(&ping(1, CENTER, 0), &fences);
        for i in 1..10 {
            assert!(evaluator.evaluate(&ping(1, CENTER, i), &fences).is_empty());
        }
    }

    #[test]
    fn test_invalid_fence_skipped_others_evaluated() {
        let evaluator = FenceEvaluator::new();
        let mut bad = fence(1, AlertMode::Both);
        bad.radius_m = -10.0;
        let fences = vec![bad, fence(2, AlertMode::Both)];

        let transitions = evaluator.evaluate(&ping(1, CENTER, 0), &fences);

        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].fence_id, FenceId(2));
        // No state recorded for the invalid fence
        assert_eq!(evaluator.containment(VehicleId(1), FenceId(1)), Containment::Unknown);
    }

    #[test]
    fn test_inactive_fence_skipped() {
        let evaluator = FenceEvaluator::new();
        let mut inactive = fence(1, AlertMode::Both);
        inactive.active = false;

        assert!(evaluator.evaluate(&ping(1, CENTER, 0), &[inactive]).is_empty());
        assert_eq!(evaluator.tracked_pairs(), 0);
    }

    #[test]
    fn test_multiple_fences_single_call() {
        let evaluator = FenceEvaluator::new();
        let fences = vec![fence(1, AlertMode::Both), fence(2, AlertMode::Both)];

        let transitions = evaluator.evaluate(&ping(1, CENTER, 0), &fences);

        assert_eq!(transitions.len(), 2);
        assert!(transitions.iter().all(|t| t.kind == TransitionKind::Entry));
    }

    #[test]
    fn test_vehicles_tracked_independently() {
        let evaluator = FenceEvaluator::new();
        let fences = vec![fence(1, AlertMode::Both)];

        evaluator.evaluate(&ping(1, CENTER, 0), &fences);
        // Second vehicle entering fires its own entry
        let transitions = evaluator.evaluate(&ping(2, CENTER, 1), &fences);

        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].vehicle_id, VehicleId(2));
        assert_eq!(evaluator.tracked_pairs(), 2);
    }

    #[test]
    fn test_retire_fence_clears_state() {
        let evaluator = FenceEvaluator::new();
        let fences = vec![fence(1, AlertMode::Both)];

        evaluator.evaluate(&ping(1, CENTER, 0), &fences);
        evaluator.evaluate(&ping(2, CENTER, 0), &fences);
        assert_eq!(evaluator.tracked_pairs(), 2);

        evaluator.retire_fence(FenceId(1));
        assert_eq!(evaluator.tracked_pairs(), 0);
        // Re-entry after retirement is a fresh first evaluation
        let transitions = evaluator.evaluate(&ping(1, CENTER, 1), &fences);
        assert_eq!(transitions.len(), 1);
    }

    #[test]
    fn test_transition_carries_ping_position_and_time() {
        let evaluator = FenceEvaluator::new();
        let fences = vec![fence(1, AlertMode::Both)];
        let p = ping(1, CENTER, 42);

        let transitions = evaluator.evaluate(&p, &fences);

        assert_eq!(transitions[0].latitude, p.latitude);
        assert_eq!(transitions[0].longitude, p.longitude);
        assert_eq!(transitions[0].at, p.timestamp);
    }
}
