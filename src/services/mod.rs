//! Services - analysis logic and state management
//!
//! This module contains the core analysis services:
//! - `geo` - Great-circle distance and containment primitives
//! - `fence_evaluator` - Stateful geofence entry/exit transition detection
//! - `behavior_detector` - Kinematic anomaly detection over trajectories
//! - `scorer` - Driving score aggregation
//! - `analyzer` - Central orchestrator wiring evaluator, detector, and stores

pub mod analyzer;
pub mod behavior_detector;
pub mod fence_evaluator;
pub mod geo;
pub mod scorer;

// Re-export commonly used types
pub use analyzer::Analyzer;
pub use behavior_detector::BehaviorDetector;
pub use fence_evaluator::FenceEvaluator;
pub use scorer::ScoreAggregator;
