//! JSONL egress - writes analysis output to file
//!
//! Alerts, behavior events, and score reports are written in JSONL format
//! (one JSON object per line) to the files specified in config. Also
//! provides egress-backed implementations of the alert and behavior store
//! ports for the offline binary.

use crate::domain::{AlertTransition, BehaviorEvent};
use crate::io::ports::{AlertStore, BehaviorStore};
use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

/// Append-only JSONL writer
pub struct Egress {
    file_path: String,
}

impl Egress {
    pub fn new(file_path: &str) -> Self {
        info!(file_path = %file_path, "egress_initialized");
        Self { file_path: file_path.to_string() }
    }

    /// Serialize one record and append it as a line
    pub fn write<T: Serialize>(&self, record: &T) -> anyhow::Result<()> {
        let json = serde_json::to_string(record)
            .with_context(|| format!("Failed to serialize record for {}", self.file_path))?;
        self.append_line(&json)
            .with_context(|| format!("Failed to write to {}", self.file_path))
    }

    /// Write a batch of records, returning the number written
    pub fn write_all<T: Serialize>(&self, records: &[T]) -> anyhow::Result<usize> {
        for record in records {
            self.write(record)?;
        }
        Ok(records.len())
    }

    /// Append a line to the egress file
    fn append_line(&self, line: &str) -> std::io::Result<()> {
        let path = Path::new(&self.file_path);

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;

        writeln!(file, "{}", line)?;
        debug!(file = %self.file_path, bytes = %line.len(), "egress_written");

        Ok(())
    }
}

/// Alert store that appends transitions to a JSONL file
pub struct JsonlAlertStore {
    egress: Egress,
}

impl JsonlAlertStore {
    pub fn new(file_path: &str) -> Self {
        Self { egress: Egress::new(file_path) }
    }
}

#[async_trait]
impl AlertStore for JsonlAlertStore {
    async fn record_transitions(&self, transitions: &[AlertTransition]) -> anyhow::Result<()> {
        self.egress.write_all(transitions)?;
        Ok(())
    }
}

/// Behavior store that appends events to a JSONL file
pub struct JsonlBehaviorStore {
    egress: Egress,
}

impl JsonlBehaviorStore {
    pub fn new(file_path: &str) -> Self {
        Self { egress: Egress::new(file_path) }
    }
}

#[async_trait]
impl BehaviorStore for JsonlBehaviorStore {
    async fn record_events(&self, events: &[BehaviorEvent]) -> anyhow::Result<()> {
        self.egress.write_all(events)?;
        Ok(())
    }
}
