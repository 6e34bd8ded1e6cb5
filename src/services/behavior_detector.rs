//! Kinematic anomaly detection over one vehicle's trajectory window
//!
//! Consumes an ordered slice of track points and emits discrete behavior
//! events. All checks are pure computation over the input slice; persistence
//! belongs to the caller. The input must be ascending by timestamp -
//! unsorted input yields unspecified results and is not corrected here.
//!
//! Samples with missing speed and pairs with non-positive time deltas
//! (duplicate or out-of-order timestamps from the ingestion path) are
//! skipped without an event. The fatigue check spans first-to-last sample
//! and does not account for intervening rest stops.

use crate::domain::{BehaviorEvent, BehaviorKind, RiskLevel, TrackPoint, VehicleId};
use crate::infra::config::DetectionConfig;
use tracing::trace;

/// Speed conversion: km/h -> m/s
const KMH_TO_MS: f64 = 3.6;

/// Detects behavior events from ordered trajectory windows
pub struct BehaviorDetector {
    config: DetectionConfig,
}

impl BehaviorDetector {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    /// Analyze one window and return all detected events.
    ///
    /// Output order: pairwise events in input order, then long-idle runs,
    /// then at most one fatigue event. Fewer than two points yields an
    /// empty list. Idempotent for identical input.
    pub fn detect(&self, vehicle_id: VehicleId, points: &[TrackPoint]) -> Vec<BehaviorEvent> {
        if points.len() < 2 {
            return Vec::new();
        }

        let mut events = Vec::new();

        for pair in points.windows(2) {
            let (prev, cur) = (&pair[0], &pair[1]);
            self.check_pair(vehicle_id, prev, cur, &mut events);
        }

        self.check_idle_runs(vehicle_id, points, &mut events);
        self.check_fatigue(vehicle_id, points, &mut events);

        trace!(
            vehicle_id = %vehicle_id,
            points = %points.len(),
            events = %events.len(),
            "behavior_window_analyzed"
        );

        events
    }

    /// Acceleration, overspeed, and sharp-turn checks for one sample pair
    fn check_pair(
        &self,
        vehicle_id: VehicleId,
        prev: &TrackPoint,
        cur: &TrackPoint,
        events: &mut Vec<BehaviorEvent>,
    ) {
        let (Some(prev_speed), Some(cur_speed)) = (prev.speed_kmh, cur.speed_kmh) else {
            return;
        };

        let dt_seconds = (cur.timestamp - prev.timestamp).num_milliseconds() as f64 / 1000.0;
        if dt_seconds <= 0.0 {
            // Duplicate or out-of-order sample; not an anomaly by design
            return;
        }

        let accel_ms2 = ((cur_speed - prev_speed) / KMH_TO_MS) / dt_seconds;

        if accel_ms2 > self.config.rapid_accel_threshold_ms2 {
            events.push(self.event(
                vehicle_id,
                cur,
                BehaviorKind::RapidAccel,
                RiskLevel::Medium,
                Some(accel_ms2),
                format!("acceleration {:.2} m/s2 over {:.1} s", accel_ms2, dt_seconds),
            ));
        } else if accel_ms2 < -self.config.rapid_brake_threshold_ms2 {
            events.push(self.event(
                vehicle_id,
                cur,
                BehaviorKind::RapidBrake,
                RiskLevel::High,
                Some(accel_ms2),
                format!("deceleration {:.2} m/s2 over {:.1} s", accel_ms2, dt_seconds),
            ));
        }

        // Overspeed is checked independently of acceleration
        let limit = self.config.overspeed_threshold_kmh;
        if cur_speed > limit {
            let over_fraction = (cur_speed - limit) / limit;
            let risk = if over_fraction > 0.5 {
                RiskLevel::Critical
            } else if over_fraction > 0.3 {
                RiskLevel::High
            } else {
                RiskLevel::Medium
            };
            events.push(self.event(
                vehicle_id,
                cur,
                BehaviorKind::Overspeed,
                risk,
                Some(accel_ms2),
                format!(
                    "speed {:.1} km/h exceeds limit {:.1} km/h by {:.0}%",
                    cur_speed,
                    limit,
                    over_fraction * 100.0
                ),
            ));
        }

        if let (Some(prev_heading), Some(cur_heading)) = (prev.heading_deg, cur.heading_deg) {
            if cur_speed >= self.config.sharp_turn_min_speed_kmh {
                let delta = heading_delta_deg(prev_heading, cur_heading);
                if delta > self.config.sharp_turn_threshold_deg {
                    events.push(self.event(
                        vehicle_id,
                        cur,
                        BehaviorKind::SharpTurn,
                        RiskLevel::Medium,
                        None,
                        format!("heading changed {:.0} deg at {:.1} km/h", delta, cur_speed),
                    ));
                }
            }
        }
    }

    /// One IdleLong per maximal run of consecutive near-zero-speed samples
    fn check_idle_runs(
        &self,
        vehicle_id: VehicleId,
        points: &[TrackPoint],
        events: &mut Vec<BehaviorEvent>,
    ) {
        let mut run_start: Option<usize> = None;

        for i in 0..=points.len() {
            let idling = points.get(i).is_some_and(|p| {
                p.speed_kmh.is_some_and(|s| s <= self.config.idle_speed_kmh)
            });

            if idling {
                run_start.get_or_insert(i);
                continue;
            }

            if let Some(start) = run_start.take() {
                let first = &points[start];
                let last = &points[i - 1];
                let minutes =
                    (last.timestamp - first.timestamp).num_milliseconds() as f64 / 60_000.0;
                if minutes >= self.config.idle_threshold_minutes {
                    events.push(self.event(
                        vehicle_id,
                        last,
                        BehaviorKind::IdleLong,
                        RiskLevel::Low,
                        None,
                        format!("idle for {:.1} min", minutes),
                    ));
                }
            }
        }
    }

    /// At most one fatigue event per window, anchored to the last point
    fn check_fatigue(
        &self,
        vehicle_id: VehicleId,
        points: &[TrackPoint],
        events: &mut Vec<BehaviorEvent>,
    ) {
        let first = &points[0];
        let last = &points[points.len() - 1];
        let driving_minutes =
            (last.timestamp - first.timestamp).num_milliseconds() as f64 / 60_000.0;

        if driving_minutes >= self.config.fatigue_threshold_minutes {
            events.push(self.event(
                vehicle_id,
                last,
                BehaviorKind::Fatigue,
                RiskLevel::High,
                None,
                format!("continuous driving {:.1} min", driving_minutes),
            ));
        }
    }

    fn event(
        &self,
        vehicle_id: VehicleId,
        point: &TrackPoint,
        kind: BehaviorKind,
        risk: RiskLevel,
        acceleration_ms2: Option<f64>,
        description: String,
    ) -> BehaviorEvent {
        BehaviorEvent {
            vehicle_id,
            kind,
            risk,
            latitude: point.latitude,
            longitude: point.longitude,
            speed_kmh: point.speed_kmh,
            acceleration_ms2,
            event_time: point.timestamp,
            description,
        }
    }
}

/// Absolute heading change in degrees, wrapped to [0, 180]
fn heading_delta_deg(a: f64, b: f64) -> f64 {
    let d = (b - a).abs() % 360.0;
    if d > 180.0 {
        360.0 - d
    } else {
        d
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn detector() -> BehaviorDetector {
        BehaviorDetector::new(DetectionConfig::default())
    }

    fn point(speed_kmh: Option<f64>, offset_secs: i64) -> TrackPoint {
        TrackPoint {
            vehicle_id: VehicleId(1),
            latitude: 64.1466,
            longitude: -21.9426,
            speed_kmh,
            heading_deg: None,
            timestamp: Utc.timestamp_opt(1_700_000_000 + offset_secs, 0).unwrap(),
        }
    }

    fn count(events: &[BehaviorEvent], kind: BehaviorKind) -> usize {
        events.iter().filter(|e| e.kind == kind).count()
    }

    #[test]
    fn test_fewer_than_two_points_yields_empty() {
        let d = detector();
        assert!(d.detect(VehicleId(1), &[]).is_empty());
        assert!(d.detect(VehicleId(1), &[point(Some(50.0), 0)]).is_empty());
    }

    #[test]
    fn test_acceleration_boundary_example() {
        // (65-20)/3.6/5 = 2.50 m/s2, below the 3.0 threshold
        // (20-65)/3.6/2 = -6.25 m/s2, beyond the brake threshold
        let d = detector();
        let points =
            vec![point(Some(20.0), 0), point(Some(65.0), 5), point(Some(20.0), 7)];

        let events = d.detect(VehicleId(1), &points);

        assert_eq!(count(&events, BehaviorKind::RapidAccel), 0);
        assert_eq!(count(&events, BehaviorKind::RapidBrake), 1);
        let brake = events.iter().find(|e| e.kind == BehaviorKind::RapidBrake).unwrap();
        assert_eq!(brake.risk, RiskLevel::High);
        assert!((brake.acceleration_ms2.unwrap() + 6.25).abs() < 0.01);
        assert_eq!(brake.event_time, points[2].timestamp);
    }

    #[test]
    fn test_rapid_accel_above_threshold() {
        // (80-20)/3.6/5 = 3.33 m/s2
        let d = detector();
        let events = d.detect(VehicleId(1), &[point(Some(20.0), 0), point(Some(80.0), 5)]);

        assert_eq!(count(&events, BehaviorKind::RapidAccel), 1);
        let accel = events.iter().find(|e| e.kind == BehaviorKind::RapidAccel).unwrap();
        assert_eq!(accel.risk, RiskLevel::Medium);
        assert!(accel.description.contains("3.33"));
    }

    #[test]
    fn test_overspeed_risk_tiers() {
        let d = detector();

        // 70 km/h over a 60 limit: 16.7% over -> medium
        let events = d.detect(VehicleId(1), &[point(Some(68.0), 0), point(Some(70.0), 10)]);
        assert_eq!(events.iter().find(|e| e.kind == BehaviorKind::Overspeed).unwrap().risk,
            RiskLevel::Medium);

        // 90 km/h: exactly 50% over is not >0.5, falls to the high tier
        let events = d.detect(VehicleId(1), &[point(Some(88.0), 0), point(Some(90.0), 10)]);
        assert_eq!(events.iter().find(|e| e.kind == BehaviorKind::Overspeed).unwrap().risk,
            RiskLevel::High);

        // 95 km/h: 58% over -> critical
        let events = d.detect(VehicleId(1), &[point(Some(93.0), 0), point(Some(95.0), 10)]);
        assert_eq!(events.iter().find(|e| e.kind == BehaviorKind::Overspeed).unwrap().risk,
            RiskLevel::Critical);
    }

    #[test]
    fn test_overspeed_fires_once_per_offending_sample() {
        let d = detector();
        let points = vec![point(Some(70.0), 0), point(Some(71.0), 10), point(Some(72.0), 20)];

        let events = d.detect(VehicleId(1), &points);

        // First point is only ever `prev`, so two overspeed samples
        assert_eq!(count(&events, BehaviorKind::Overspeed), 2);
    }

    #[test]
    fn test_missing_speed_skips_pair() {
        let d = detector();
        let points = vec![point(Some(20.0), 0), point(None, 5), point(Some(90.0), 10)];

        let events = d.detect(VehicleId(1), &points);

        // Both pairs touch the speedless sample, so no kinematic events at all
        assert_eq!(count(&events, BehaviorKind::RapidAccel), 0);
        assert_eq!(count(&events, BehaviorKind::Overspeed), 0);
    }

    #[test]
    fn test_duplicate_timestamp_skipped_silently() {
        let d = detector();
        // Same timestamp, huge speed jump: would be infinite acceleration
        let points = vec![point(Some(20.0), 0), point(Some(120.0), 0)];

        let events = d.detect(VehicleId(1), &points);

        assert_eq!(count(&events, BehaviorKind::RapidAccel), 0);
        assert_eq!(count(&events, BehaviorKind::RapidBrake), 0);
    }

    #[test]
    fn test_fatigue_window_boundaries() {
        let d = detector();

        // 245 minutes across three points -> exactly one fatigue event
        let long = vec![
            point(Some(50.0), 0),
            point(Some(51.0), 120 * 60),
            point(Some(50.0), 245 * 60),
        ];
        let events = d.detect(VehicleId(1), &long);
        assert_eq!(count(&events, BehaviorKind::Fatigue), 1);
        let fatigue = events.iter().find(|e| e.kind == BehaviorKind::Fatigue).unwrap();
        assert_eq!(fatigue.risk, RiskLevel::High);
        assert_eq!(fatigue.event_time, long[2].timestamp);

        // 120 minutes -> none
        let short = vec![point(Some(50.0), 0), point(Some(50.0), 120 * 60)];
        assert_eq!(count(&d.detect(VehicleId(1), &short), BehaviorKind::Fatigue), 0);
    }

    #[test]
    fn test_fatigue_appended_last() {
        let d = detector();
        let points = vec![
            point(Some(20.0), 0),
            point(Some(80.0), 5), // rapid accel
            point(Some(50.0), 250 * 60),
        ];

        let events = d.detect(VehicleId(1), &points);

        assert_eq!(events.last().unwrap().kind, BehaviorKind::Fatigue);
    }

    #[test]
    fn test_sharp_turn_detection() {
        let d = detector();
        let mut a = point(Some(40.0), 0);
        let mut b = point(Some(40.0), 5);
        a.heading_deg = Some(10.0);
        b.heading_deg = Some(100.0);

        let events = d.detect(VehicleId(1), &[a.clone(), b.clone()]);
        assert_eq!(count(&events, BehaviorKind::SharpTurn), 1);

        // Below the minimum speed the same turn is ignored
        a.speed_kmh = Some(10.0);
        b.speed_kmh = Some(10.0);
        let events = d.detect(VehicleId(1), &[a, b]);
        assert_eq!(count(&events, BehaviorKind::SharpTurn), 0);
    }

    #[test]
    fn test_heading_delta_wraps_at_north() {
        assert!((heading_delta_deg(350.0, 10.0) - 20.0).abs() < 1e-9);
        assert!((heading_delta_deg(10.0, 350.0) - 20.0).abs() < 1e-9);
        assert!((heading_delta_deg(0.0, 180.0) - 180.0).abs() < 1e-9);
        assert_eq!(heading_delta_deg(90.0, 90.0), 0.0);
    }

    #[test]
    fn test_idle_run_detection() {
        let d = detector();
        // 20 minutes stationary, then moving
        let points = vec![
            point(Some(0.0), 0),
            point(Some(1.0), 10 * 60),
            point(Some(0.5), 20 * 60),
            point(Some(40.0), 21 * 60),
        ];

        let events = d.detect(VehicleId(1), &points);

        assert_eq!(count(&events, BehaviorKind::IdleLong), 1);
        let idle = events.iter().find(|e| e.kind == BehaviorKind::IdleLong).unwrap();
        assert_eq!(idle.risk, RiskLevel::Low);
        assert_eq!(idle.event_time, points[2].timestamp);
    }

    #[test]
    fn test_idle_run_broken_by_movement() {
        let d = detector();
        // Two 10-minute stops separated by movement: neither reaches 15 min
        let points = vec![
            point(Some(0.0), 0),
            point(Some(0.0), 10 * 60),
            point(Some(40.0), 11 * 60),
            point(Some(0.0), 12 * 60),
            point(Some(0.0), 22 * 60),
            point(Some(40.0), 23 * 60),
        ];

        assert_eq!(count(&d.detect(VehicleId(1), &points), BehaviorKind::IdleLong), 0);
    }

    #[test]
    fn test_detect_is_idempotent() {
        let d = detector();
        let points = vec![
            point(Some(20.0), 0),
            point(Some(80.0), 5),
            point(Some(95.0), 10),
            point(Some(20.0), 12),
        ];

        let first = d.detect(VehicleId(1), &points);
        let second = d.detect(VehicleId(1), &points);

        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn test_custom_thresholds_respected() {
        let config = DetectionConfig {
            overspeed_threshold_kmh: 90.0,
            ..DetectionConfig::default()
        };
        let d = BehaviorDetector::new(config);

        let events = d.detect(VehicleId(1), &[point(Some(70.0), 0), point(Some(80.0), 10)]);

        assert_eq!(count(&events, BehaviorKind::Overspeed), 0);
    }
}
