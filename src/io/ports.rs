//! Collaborator store interfaces
//!
//! The analysis core never talks to a database or transport directly; the
//! caller wires in implementations of these traits. Store failure is the
//! one condition that propagates as a hard error to the caller - the core
//! never retries.

use crate::domain::{AlertTransition, BehaviorEvent, Geofence, TrackPoint, VehicleId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Source of ordered trajectory windows
#[async_trait]
pub trait TrackStore: Send + Sync {
    /// Track points for (vehicle, [start, end]), ascending by timestamp
    async fn fetch_window(
        &self,
        vehicle_id: VehicleId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<TrackPoint>>;
}

/// Source of geofence configuration
#[async_trait]
pub trait GeofenceStore: Send + Sync {
    /// Fences with `active == true`
    async fn active_fences(&self) -> anyhow::Result<Vec<Geofence>>;
}

/// Sink for geofence transition alerts
#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn record_transitions(&self, transitions: &[AlertTransition]) -> anyhow::Result<()>;
}

/// Sink for detected behavior events
#[async_trait]
pub trait BehaviorStore: Send + Sync {
    async fn record_events(&self, events: &[BehaviorEvent]) -> anyhow::Result<()>;
}

/// In-memory track store for the offline binary and tests
#[derive(Default)]
pub struct InMemoryTrackStore {
    points: Mutex<Vec<TrackPoint>>,
}

impl InMemoryTrackStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch of points (kept in insertion order)
    pub fn push_points(&self, points: impl IntoIterator<Item = TrackPoint>) {
        self.points.lock().extend(points);
    }

    pub fn len(&self) -> usize {
        self.points.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.lock().is_empty()
    }
}

#[async_trait]
impl TrackStore for InMemoryTrackStore {
    async fn fetch_window(
        &self,
        vehicle_id: VehicleId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<TrackPoint>> {
        let mut window: Vec<TrackPoint> = self
            .points
            .lock()
            .iter()
            .filter(|p| {
                p.vehicle_id == vehicle_id && p.timestamp >= start && p.timestamp <= end
            })
            .cloned()
            .collect();
        window.sort_by_key(|p| p.timestamp);
        Ok(window)
    }
}

/// Geofence store backed by a fixed config snapshot
pub struct ConfigGeofenceStore {
    fences: Vec<Geofence>,
}

impl ConfigGeofenceStore {
    pub fn new(fences: Vec<Geofence>) -> Self {
        Self { fences }
    }
}

#[async_trait]
impl GeofenceStore for ConfigGeofenceStore {
    async fn active_fences(&self) -> anyhow::Result<Vec<Geofence>> {
        Ok(self.fences.iter().filter(|f| f.active).cloned().collect())
    }
}

/// In-memory alert sink for tests
#[derive(Default)]
pub struct InMemoryAlertStore {
    transitions: Mutex<Vec<AlertTransition>>,
}

impl InMemoryAlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<AlertTransition> {
        self.transitions.lock().clone()
    }
}

#[async_trait]
impl AlertStore for InMemoryAlertStore {
    async fn record_transitions(&self, transitions: &[AlertTransition]) -> anyhow::Result<()> {
        self.transitions.lock().extend_from_slice(transitions);
        Ok(())
    }
}

/// In-memory behavior sink for tests
#[derive(Default)]
pub struct InMemoryBehaviorStore {
    events: Mutex<Vec<BehaviorEvent>>,
}

impl InMemoryBehaviorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<BehaviorEvent> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl BehaviorStore for InMemoryBehaviorStore {
    async fn record_events(&self, events: &[BehaviorEvent]) -> anyhow::Result<()> {
        self.events.lock().extend_from_slice(events);
        Ok(())
    }
}
