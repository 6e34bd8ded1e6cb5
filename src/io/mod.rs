//! IO modules - external system interfaces
//!
//! This module contains the seams to external collaborators:
//! - `ports` - Store traits (tracks, fences, alerts, behavior) + in-memory impls
//! - `track_reader` - JSONL track-point ingestion
//! - `egress` - JSONL output for alerts, events, and reports

pub mod egress;
pub mod ports;
pub mod track_reader;

// Re-export commonly used types
pub use egress::{Egress, JsonlAlertStore, JsonlBehaviorStore};
pub use ports::{
    AlertStore, BehaviorStore, ConfigGeofenceStore, GeofenceStore, InMemoryAlertStore,
    InMemoryBehaviorStore, InMemoryTrackStore, TrackStore,
};
