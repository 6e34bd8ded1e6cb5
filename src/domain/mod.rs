//! Domain models - core telemetry types
//!
//! This module contains the canonical data types used throughout the system:
//! - `TrackPoint` - one timestamped GPS sample for a vehicle
//! - `Geofence` - circular region with an alert mode
//! - `AlertTransition` - entry/exit crossing emitted by the evaluator
//! - `BehaviorEvent` - discrete detected driving anomaly
//! - `DrivingScoreReport` - aggregated 0-100 score for a window

pub mod types;

pub use types::{
    AlertMode, AlertTransition, BehaviorEvent, BehaviorKind, Containment, DrivingScoreReport,
    FenceId, Geofence, Grade, RiskLevel, TrackPoint, TransitionKind, VehicleId,
};
