//! JSONL track-point ingestion for the offline binary
//!
//! One track point per line. Malformed lines are counted and skipped with
//! a warning so a single bad record cannot sink a replay.

use crate::domain::TrackPoint;
use anyhow::Context;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{info, warn};

/// Read all track points from a JSONL file, in file order
pub fn read_track_points<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<TrackPoint>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open track file {}", path.display()))?;

    let mut points = Vec::new();
    let mut skipped = 0usize;

    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line
            .with_context(|| format!("Failed to read line from {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<TrackPoint>(&line) {
            Ok(point) => points.push(point),
            Err(e) => {
                skipped += 1;
                warn!(line = %(line_no + 1), error = %e, "track_point_parse_failed");
            }
        }
    }

    info!(
        file = %path.display(),
        points = %points.len(),
        skipped = %skipped,
        "track_file_loaded"
    );

    Ok(points)
}
