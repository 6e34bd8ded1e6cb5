//! Shared types for the fleet telemetry analysis core

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Newtype wrapper for vehicle IDs to provide type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct VehicleId(pub i64);

impl std::fmt::Display for VehicleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Newtype wrapper for geofence IDs to provide type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct FenceId(pub i64);

impl std::fmt::Display for FenceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One timestamped GPS sample for a vehicle.
///
/// Produced by the external ingestion path; the analysis core only reads it.
/// `speed_kmh` and `heading_deg` may be absent when the receiver had no fix
/// for them, and the detectors skip the affected checks rather than error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackPoint {
    pub vehicle_id: VehicleId,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub speed_kmh: Option<f64>,
    #[serde(default)]
    pub heading_deg: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// When a geofence raises alerts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertMode {
    Entry,
    Exit,
    Both,
}

impl AlertMode {
    #[inline]
    pub fn fires_on_entry(&self) -> bool {
        matches!(self, AlertMode::Entry | AlertMode::Both)
    }

    #[inline]
    pub fn fires_on_exit(&self) -> bool {
        matches!(self, AlertMode::Exit | AlertMode::Both)
    }
}

/// Circular geofence: center + radius with an alert mode.
///
/// Owned by external configuration management; read-only to the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Geofence {
    pub id: FenceId,
    #[serde(default)]
    pub name: String,
    pub center_lat: f64,
    pub center_lon: f64,
    pub radius_m: f64,
    pub alert_mode: AlertMode,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Geofence {
    /// A fence is evaluable when its center is a real coordinate and its
    /// radius is positive. Anything else is skipped with a warning.
    pub fn is_valid(&self) -> bool {
        self.center_lat.is_finite()
            && self.center_lon.is_finite()
            && self.radius_m.is_finite()
            && self.radius_m > 0.0
    }
}

/// Last known containment of a vehicle relative to one fence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Containment {
    Unknown,
    Inside,
    Outside,
}

impl Containment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Containment::Unknown => "unknown",
            Containment::Inside => "inside",
            Containment::Outside => "outside",
        }
    }
}

/// Entry or exit crossing detected between two evaluations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    Entry,
    Exit,
}

impl TransitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionKind::Entry => "entry",
            TransitionKind::Exit => "exit",
        }
    }
}

/// Ephemeral evaluator output; the caller maps these into persisted alert rows
#[derive(Debug, Clone, Serialize)]
pub struct AlertTransition {
    pub fence_id: FenceId,
    pub vehicle_id: VehicleId,
    pub latitude: f64,
    pub longitude: f64,
    pub kind: TransitionKind,
    pub at: DateTime<Utc>,
}

/// Discrete driving anomaly classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorKind {
    RapidAccel,
    RapidBrake,
    Overspeed,
    Fatigue,
    SharpTurn,
    IdleLong,
}

impl BehaviorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BehaviorKind::RapidAccel => "rapid_accel",
            BehaviorKind::RapidBrake => "rapid_brake",
            BehaviorKind::Overspeed => "overspeed",
            BehaviorKind::Fatigue => "fatigue",
            BehaviorKind::SharpTurn => "sharp_turn",
            BehaviorKind::IdleLong => "idle_long",
        }
    }
}

/// Severity of a detected behavior event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

/// A detected driving anomaly, immutable once created
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BehaviorEvent {
    pub vehicle_id: VehicleId,
    pub kind: BehaviorKind,
    pub risk: RiskLevel,
    pub latitude: f64,
    pub longitude: f64,
    pub speed_kmh: Option<f64>,
    pub acceleration_ms2: Option<f64>,
    pub event_time: DateTime<Utc>,
    pub description: String,
}

/// Letter grade derived from the numeric score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grade {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl Grade {
    pub fn from_score(score: u32) -> Self {
        if score >= 90 {
            Grade::Excellent
        } else if score >= 80 {
            Grade::Good
        } else if score >= 60 {
            Grade::Fair
        } else {
            Grade::Poor
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::Excellent => "excellent",
            Grade::Good => "good",
            Grade::Fair => "fair",
            Grade::Poor => "poor",
        }
    }
}

/// Aggregated driving score for one vehicle over one window
#[derive(Debug, Clone, Serialize)]
pub struct DrivingScoreReport {
    pub vehicle_id: VehicleId,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    /// Always within [0, 100]
    pub score: u32,
    pub grade: Grade,
    pub total_events: usize,
    pub counts_by_kind: BTreeMap<BehaviorKind, u64>,
}
