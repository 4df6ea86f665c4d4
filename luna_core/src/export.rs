//! Data export.
//!
//! Two formats:
//! - a JSON snapshot (`metadata`, full `events`, `profile`, optional
//!   narrative `summary`) for downloads
//! - a CSV of daily check-ins for spreadsheets

use crate::history::recent_checkins;
use crate::state::{ProfileData, SystemState};
use crate::types::{HealthEvent, EVENT_SCHEMA_VERSION};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Metadata block of an export snapshot
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    pub exported_at: DateTime<Utc>,
    pub app_version: String,
    pub schema_version: String,
    pub event_count: usize,
}

/// Downloadable snapshot of a user's data
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSnapshot {
    pub metadata: ExportMetadata,
    pub events: Vec<HealthEvent>,
    pub profile: ProfileData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl ExportSnapshot {
    /// Build a snapshot from projected state
    pub fn from_state(state: &SystemState, summary: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            metadata: ExportMetadata {
                exported_at: now,
                app_version: env!("CARGO_PKG_VERSION").to_string(),
                schema_version: EVENT_SCHEMA_VERSION.to_string(),
                event_count: state.events.len(),
            },
            events: state.events.clone(),
            profile: state.profile.clone(),
            summary,
        }
    }

    /// Write the snapshot as pretty JSON
    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = File::create(path)?;
        let mut writer = std::io::BufWriter::new(&file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        drop(writer);
        file.sync_all()?;

        tracing::info!(
            "Exported {} events to {:?}",
            self.metadata.event_count,
            path
        );
        Ok(())
    }
}

/// A row in the check-in CSV
#[derive(Debug, Serialize)]
struct CheckinRow {
    timestamp: String,
    energy: Option<u8>,
    mood: Option<u8>,
    sleep_hours: Option<f32>,
    symptoms: String,
    notes: String,
}

/// Write every readable check-in to `path` as CSV, oldest first
///
/// Returns the number of rows written.
pub fn write_checkins_csv(log: &[HealthEvent], path: &Path) -> Result<usize> {
    let mut checkins = recent_checkins(log, usize::MAX);
    checkins.reverse();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(path)?;
    let mut writer = csv::WriterBuilder::new().has_headers(true).from_writer(&file);

    for (timestamp, checkin) in &checkins {
        writer.serialize(CheckinRow {
            timestamp: timestamp.to_rfc3339(),
            energy: checkin.energy,
            mood: checkin.mood,
            sleep_hours: checkin.sleep_hours,
            symptoms: checkin.symptoms.join(";"),
            notes: checkin.notes.clone().unwrap_or_default(),
        })?;
    }

    // Flush and sync to disk
    writer.flush()?;
    drop(writer);
    file.sync_all()?;

    tracing::info!("Exported {} check-ins to {:?}", checkins.len(), path);
    Ok(checkins.len())
}
