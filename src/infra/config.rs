//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml
//!
//! Thresholds, weights, and multipliers are resolved once at load time into
//! immutable value objects injected into the detectors, never read from
//! globals mid-analysis.

use crate::domain::{BehaviorKind, Geofence, RiskLevel};
use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

/// Kinematic detection thresholds
#[derive(Debug, Clone, Deserialize)]
pub struct DetectionConfig {
    /// Accelerations above this fire rapid_accel (m/s^2)
    #[serde(default = "default_rapid_accel_threshold")]
    pub rapid_accel_threshold_ms2: f64,
    /// Decelerations beyond the negative of this fire rapid_brake (m/s^2)
    #[serde(default = "default_rapid_brake_threshold")]
    pub rapid_brake_threshold_ms2: f64,
    /// Speed limit for overspeed detection (km/h)
    #[serde(default = "default_overspeed_threshold")]
    pub overspeed_threshold_kmh: f64,
    /// Continuous driving span that counts as fatigue (minutes)
    #[serde(default = "default_fatigue_threshold")]
    pub fatigue_threshold_minutes: f64,
    /// Heading change across one sample pair that counts as a sharp turn (degrees)
    #[serde(default = "default_sharp_turn_threshold")]
    pub sharp_turn_threshold_deg: f64,
    /// Sharp turns below this speed are ignored (km/h)
    #[serde(default = "default_sharp_turn_min_speed")]
    pub sharp_turn_min_speed_kmh: f64,
    /// Sustained near-zero-speed span that counts as long idle (minutes)
    #[serde(default = "default_idle_threshold")]
    pub idle_threshold_minutes: f64,
    /// Speeds at or below this count as idling (km/h)
    #[serde(default = "default_idle_speed")]
    pub idle_speed_kmh: f64,
}

fn default_rapid_accel_threshold() -> f64 {
    3.0
}

fn default_rapid_brake_threshold() -> f64 {
    3.0
}

fn default_overspeed_threshold() -> f64 {
    60.0
}

fn default_fatigue_threshold() -> f64 {
    240.0
}

fn default_sharp_turn_threshold() -> f64 {
    60.0
}

fn default_sharp_turn_min_speed() -> f64 {
    30.0
}

fn default_idle_threshold() -> f64 {
    15.0
}

fn default_idle_speed() -> f64 {
    2.0
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            rapid_accel_threshold_ms2: default_rapid_accel_threshold(),
            rapid_brake_threshold_ms2: default_rapid_brake_threshold(),
            overspeed_threshold_kmh: default_overspeed_threshold(),
            fatigue_threshold_minutes: default_fatigue_threshold(),
            sharp_turn_threshold_deg: default_sharp_turn_threshold(),
            sharp_turn_min_speed_kmh: default_sharp_turn_min_speed(),
            idle_threshold_minutes: default_idle_threshold(),
            idle_speed_kmh: default_idle_speed(),
        }
    }
}

/// Per-kind deduction weights
#[derive(Debug, Clone, Deserialize)]
pub struct WeightTable {
    #[serde(default = "default_weight_rapid_accel")]
    pub rapid_accel: f64,
    #[serde(default = "default_weight_rapid_brake")]
    pub rapid_brake: f64,
    #[serde(default = "default_weight_overspeed")]
    pub overspeed: f64,
    #[serde(default = "default_weight_fatigue")]
    pub fatigue: f64,
    #[serde(default = "default_weight_sharp_turn")]
    pub sharp_turn: f64,
    #[serde(default = "default_weight_idle_long")]
    pub idle_long: f64,
}

fn default_weight_rapid_accel() -> f64 {
    2.0
}

fn default_weight_rapid_brake() -> f64 {
    3.0
}

fn default_weight_overspeed() -> f64 {
    5.0
}

fn default_weight_fatigue() -> f64 {
    10.0
}

fn default_weight_sharp_turn() -> f64 {
    2.0
}

fn default_weight_idle_long() -> f64 {
    1.0
}

impl Default for WeightTable {
    fn default() -> Self {
        Self {
            rapid_accel: default_weight_rapid_accel(),
            rapid_brake: default_weight_rapid_brake(),
            overspeed: default_weight_overspeed(),
            fatigue: default_weight_fatigue(),
            sharp_turn: default_weight_sharp_turn(),
            idle_long: default_weight_idle_long(),
        }
    }
}

/// Per-risk deduction multipliers
#[derive(Debug, Clone, Deserialize)]
pub struct RiskMultiplierTable {
    #[serde(default = "default_multiplier_low")]
    pub low: f64,
    #[serde(default = "default_multiplier_medium")]
    pub medium: f64,
    #[serde(default = "default_multiplier_high")]
    pub high: f64,
    #[serde(default = "default_multiplier_critical")]
    pub critical: f64,
}

fn default_multiplier_low() -> f64 {
    0.5
}

fn default_multiplier_medium() -> f64 {
    1.0
}

fn default_multiplier_high() -> f64 {
    2.0
}

fn default_multiplier_critical() -> f64 {
    3.0
}

impl Default for RiskMultiplierTable {
    fn default() -> Self {
        Self {
            low: default_multiplier_low(),
            medium: default_multiplier_medium(),
            high: default_multiplier_high(),
            critical: default_multiplier_critical(),
        }
    }
}

/// Scoring tables resolved once at load time
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ScoringConfig {
    #[serde(default)]
    pub weights: WeightTable,
    #[serde(default)]
    pub risk_multipliers: RiskMultiplierTable,
}

impl ScoringConfig {
    pub fn weight(&self, kind: BehaviorKind) -> f64 {
        match kind {
            BehaviorKind::RapidAccel => self.weights.rapid_accel,
            BehaviorKind::RapidBrake => self.weights.rapid_brake,
            BehaviorKind::Overspeed => self.weights.overspeed,
            BehaviorKind::Fatigue => self.weights.fatigue,
            BehaviorKind::SharpTurn => self.weights.sharp_turn,
            BehaviorKind::IdleLong => self.weights.idle_long,
        }
    }

    pub fn multiplier(&self, risk: RiskLevel) -> f64 {
        match risk {
            RiskLevel::Low => self.risk_multipliers.low,
            RiskLevel::Medium => self.risk_multipliers.medium,
            RiskLevel::High => self.risk_multipliers.high,
            RiskLevel::Critical => self.risk_multipliers.critical,
        }
    }
}

/// JSONL output destinations
#[derive(Debug, Clone, Deserialize)]
pub struct EgressConfig {
    #[serde(default = "default_alerts_file")]
    pub alerts_file: String,
    #[serde(default = "default_events_file")]
    pub events_file: String,
    #[serde(default = "default_reports_file")]
    pub reports_file: String,
}

fn default_alerts_file() -> String {
    "out/alerts.jsonl".to_string()
}

fn default_events_file() -> String {
    "out/events.jsonl".to_string()
}

fn default_reports_file() -> String {
    "out/reports.jsonl".to_string()
}

impl Default for EgressConfig {
    fn default() -> Self {
        Self {
            alerts_file: default_alerts_file(),
            events_file: default_events_file(),
            reports_file: default_reports_file(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval")]
    pub interval_secs: u64,
}

fn default_metrics_interval() -> u64 {
    10
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval() }
    }
}

/// Raw TOML file layout
#[derive(Debug, Clone, Deserialize, Default)]
struct TomlConfig {
    #[serde(default)]
    detection: Option<DetectionConfig>,
    #[serde(default)]
    scoring: ScoringConfig,
    #[serde(default)]
    egress: EgressConfig,
    #[serde(default)]
    metrics: MetricsConfig,
    #[serde(default)]
    geofences: Vec<Geofence>,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    detection: DetectionConfig,
    scoring: ScoringConfig,
    egress: EgressConfig,
    metrics: MetricsConfig,
    geofences: Vec<Geofence>,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            detection: DetectionConfig::default(),
            scoring: ScoringConfig::default(),
            egress: EgressConfig::default(),
            metrics: MetricsConfig::default(),
            geofences: Vec::new(),
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    /// Determine config file path from args or environment
    pub fn resolve_config_path(args: &[String]) -> String {
        for (i, arg) in args.iter().enumerate() {
            if arg == "--config" {
                if let Some(path) = args.get(i + 1) {
                    return path.clone();
                }
            }
            if let Some(path) = arg.strip_prefix("--config=") {
                return path.to_string();
            }
        }

        if let Ok(path) = env::var("CONFIG_FILE") {
            return path;
        }

        "config/dev.toml".to_string()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self {
            detection: toml_config.detection.unwrap_or_default(),
            scoring: toml_config.scoring,
            egress: toml_config.egress,
            metrics: toml_config.metrics,
            geofences: toml_config.geofences,
            config_file: path.display().to_string(),
        })
    }

    /// Load configuration - tries TOML file first, falls back to defaults
    pub fn load(args: &[String]) -> Self {
        let config_path = Self::resolve_config_path(args);

        match Self::from_file(&config_path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {}. Using defaults.", e);
                Self::default()
            }
        }
    }

    /// Load configuration from an explicit path, falling back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {}. Using defaults.", e);
                Self::default()
            }
        }
    }

    pub fn detection(&self) -> &DetectionConfig {
        &self.detection
    }

    pub fn scoring(&self) -> &ScoringConfig {
        &self.scoring
    }

    pub fn egress(&self) -> &EgressConfig {
        &self.egress
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics.interval_secs
    }

    pub fn geofences(&self) -> &[Geofence] {
        &self.geofences
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to override detection thresholds
    #[cfg(test)]
    pub fn with_detection(mut self, detection: DetectionConfig) -> Self {
        self.detection = detection;
        self
    }

    /// Builder method for tests to seed geofences
    #[cfg(test)]
    pub fn with_geofences(mut self, geofences: Vec<Geofence>) -> Self {
        self.geofences = geofences;
        self
    }
}
