//! Append-only event store.
//!
//! The persisted log is a single JSON array of `HealthEvent` records. An
//! append is a full read-modify-write performed under an exclusive lock on a
//! sidecar `.lock` file; the new array is written to a temp file in the same
//! directory, synced and atomically renamed over the old log.

use crate::types::{EventKind, EventType, HealthEvent};
use crate::{Error, Result};
use fs2::FileExt;
use serde_json::{Map, Value};
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Storage for the health event log
pub trait EventStore {
    /// Validate, stamp and append a new event, returning it
    fn append(&mut self, event_type: EventType, payload: Value) -> Result<HealthEvent>;

    /// Read the full log in storage order
    fn get_log(&self) -> Result<Vec<HealthEvent>>;

    /// Append a typed event
    fn append_kind(&mut self, kind: &EventKind) -> Result<HealthEvent> {
        let payload = kind.to_payload()?;
        self.append(kind.event_type(), payload)
    }
}

/// Check an append request and return the payload to persist
///
/// Rejects unknown types, non-object payloads and payloads that do not fit
/// the type's shape. A missing payload is stored as an empty object.
pub fn validate_append(event_type: &EventType, payload: Value) -> Result<Value> {
    if !event_type.is_recognized() {
        return Err(Error::Validation(format!(
            "unknown event type '{}'",
            event_type
        )));
    }
    let payload = match payload {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };
    EventKind::decode(event_type, &payload)?.validate()?;
    Ok(payload)
}

/// Read the log, falling back to an empty log if it cannot be read
///
/// State is always re-derivable from the log, so an unreadable log degrades
/// to the default state instead of failing the caller.
pub fn load_log_or_empty<S: EventStore + ?Sized>(store: &S) -> Vec<HealthEvent> {
    match store.get_log() {
        Ok(log) => log,
        Err(e) => {
            tracing::warn!("Unable to read event log: {}. Using an empty log.", e);
            Vec::new()
        }
    }
}

// ============================================================================
// JSON file store
// ============================================================================

/// Event store backed by a JSON array file
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Create a store for the log at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the persisted log
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".lock");
        PathBuf::from(name)
    }

    fn open_lock(&self) -> Result<File> {
        std::fs::create_dir_all(self.parent_dir())?;
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(self.lock_path())?;
        Ok(file)
    }

    /// Read and parse the log; caller holds the lock
    fn read_locked(&self) -> Result<Vec<HealthEvent>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let contents = std::fs::read_to_string(&self.path).map_err(|e| {
            Error::Storage(format!("unable to read event log {:?}: {}", self.path, e))
        })?;
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str::<Vec<HealthEvent>>(&contents).map_err(|e| {
            Error::Storage(format!("event log {:?} is corrupt: {}", self.path, e))
        })
    }

    /// Atomically replace the log; caller holds the lock
    fn write_locked(&self, log: &[HealthEvent]) -> Result<()> {
        let temp = NamedTempFile::new_in(self.parent_dir())?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            serde_json::to_writer(&mut writer, log)?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

impl EventStore for JsonFileStore {
    fn append(&mut self, event_type: EventType, payload: Value) -> Result<HealthEvent> {
        let payload = validate_append(&event_type, payload)?;

        let lock = self.open_lock()?;
        // Held across the whole read-modify-write
        lock.lock_exclusive()?;

        let result = self.read_locked().and_then(|mut log| {
            let event = HealthEvent::new(event_type, payload);
            log.push(event.clone());
            self.write_locked(&log)?;
            Ok(event)
        });

        lock.unlock()?;

        let event = result?;
        tracing::info!("Appended {} event {} to {:?}", event.event_type, event.id, self.path);
        Ok(event)
    }

    fn get_log(&self) -> Result<Vec<HealthEvent>> {
        if !self.path.exists() {
            tracing::debug!("No event log at {:?}, starting empty", self.path);
            return Ok(Vec::new());
        }

        let lock = self.open_lock()?;
        lock.lock_shared()?;
        let result = self.read_locked();
        lock.unlock()?;

        let log = result?;
        tracing::debug!("Read {} events from {:?}", log.len(), self.path);
        Ok(log)
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Event store held in memory
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    events: Vec<HealthEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with existing events, e.g. an imported log
    pub fn from_events(events: Vec<HealthEvent>) -> Self {
        Self { events }
    }
}

impl EventStore for MemoryStore {
    fn append(&mut self, event_type: EventType, payload: Value) -> Result<HealthEvent> {
        let payload = validate_append(&event_type, payload)?;
        let event = HealthEvent::new(event_type, payload);
        self.events.push(event.clone());
        Ok(event)
    }

    fn get_log(&self) -> Result<Vec<HealthEvent>> {
        Ok(self.events.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CheckinPayload, CycleSyncPayload};
    use serde_json::json;

    fn temp_store() -> (tempfile::TempDir, JsonFileStore) {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(temp_dir.path().join("health_events_v3.json"));
        (temp_dir, store)
    }

    #[test]
    fn test_append_and_read_single_event() {
        crate::logging::init_test();
        let (_dir, mut store) = temp_store();

        let event = store
            .append(EventType::CycleSync, json!({"day": 3, "length": 29}))
            .unwrap();

        let log = store.get_log().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0], event);
        assert_eq!(log[0].version, "3");
    }

    #[test]
    fn test_append_preserves_order() {
        let (_dir, mut store) = temp_store();

        let mut ids = Vec::new();
        for day in 1..=5 {
            let event = store
                .append_kind(&EventKind::CycleSync(CycleSyncPayload {
                    day: Some(day),
                    length: None,
                }))
                .unwrap();
            ids.push(event.id);
        }

        let log = store.get_log().unwrap();
        let read_ids: Vec<_> = log.into_iter().map(|e| e.id).collect();
        assert_eq!(read_ids, ids);
    }

    #[test]
    fn test_persisted_format_is_json_array() {
        let (_dir, mut store) = temp_store();
        store
            .append_kind(&EventKind::DailyCheckin(CheckinPayload {
                symptoms: vec!["cramps".into()],
                ..Default::default()
            }))
            .unwrap();

        let raw: Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        let record = &raw.as_array().unwrap()[0];
        assert_eq!(record["type"], "DAILY_CHECKIN");
        assert_eq!(record["payload"]["symptoms"], json!(["cramps"]));
        for key in ["id", "timestamp", "version"] {
            assert!(record.get(key).is_some(), "missing {}", key);
        }
    }

    #[test]
    fn test_read_missing_log_is_empty() {
        let (_dir, store) = temp_store();
        assert!(store.get_log().unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_corrupt_log_is_a_storage_error() {
        let (_dir, store) = temp_store();
        std::fs::write(store.path(), "[{ invalid json").unwrap();

        let err = store.get_log().unwrap_err();
        assert!(err.is_storage());
        assert!(load_log_or_empty(&store).is_empty());
    }

    #[test]
    fn test_append_refuses_to_overwrite_corrupt_log() {
        let (_dir, mut store) = temp_store();
        std::fs::write(store.path(), "not json at all").unwrap();

        let result = store.append(EventType::AuthSuccess, json!({}));
        assert!(result.unwrap_err().is_storage());
        assert_eq!(
            std::fs::read_to_string(store.path()).unwrap(),
            "not json at all"
        );
    }

    #[test]
    fn test_validation_rejects_bad_requests() {
        let (_dir, mut store) = temp_store();

        let unknown = store.append(EventType::Unrecognized("MOON".into()), json!({}));
        assert!(matches!(unknown, Err(Error::Validation(_))));

        let not_object = store.append(EventType::LabMarkerEntry, json!("TSH 2.0"));
        assert!(matches!(not_object, Err(Error::Validation(_))));

        let bad_shape = store.append(EventType::CycleSync, json!({"day": "soon"}));
        assert!(matches!(bad_shape, Err(Error::Validation(_))));

        let missing_action = store.append(EventType::MedicationLog, json!({"name": "Iron"}));
        assert!(matches!(missing_action, Err(Error::Validation(_))));

        assert!(store.get_log().unwrap().is_empty());
    }

    #[test]
    fn test_null_payload_stored_as_empty_object() {
        let mut store = MemoryStore::new();
        let event = store.append(EventType::OnboardingComplete, Value::Null).unwrap();
        assert_eq!(event.payload, json!({}));
    }

    #[test]
    fn test_unknown_fields_survive_rewrite() {
        let (_dir, mut store) = temp_store();
        let existing = json!([{
            "id": "old-1",
            "timestamp": "2023-11-02T09:00:00Z",
            "type": "DAILY_CHECKIN",
            "version": "2",
            "payload": {"symptoms": ["cramps"], "flow": "light"}
        }, {
            "id": "future-1",
            "timestamp": "2023-11-03T09:00:00Z",
            "type": "WEARABLE_SYNC",
            "version": "4",
            "payload": {"steps": 9000}
        }]);
        std::fs::write(store.path(), existing.to_string()).unwrap();

        store.append(EventType::AuthSuccess, json!({})).unwrap();

        let raw: Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        let records = raw.as_array().unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0]["payload"]["flow"], "light");
        assert_eq!(records[1]["type"], "WEARABLE_SYNC");
        assert_eq!(records[1]["payload"]["steps"], 9000);
    }

    #[test]
    fn test_no_stray_temp_files() {
        let (dir, mut store) = temp_store();
        store.append(EventType::AuthSuccess, json!({})).unwrap();

        let extras: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name != "health_events_v3.json" && name != "health_events_v3.json.lock")
            .collect();
        assert!(extras.is_empty(), "unexpected files: {:?}", extras);
    }

    #[test]
    fn test_memory_store_round_trip() {
        let mut store = MemoryStore::new();
        store.append(EventType::AuthSuccess, json!({})).unwrap();
        store
            .append(EventType::SubscriptionPurchase, json!({"tier": "monthly"}))
            .unwrap();

        let log = store.get_log().unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].event_type, EventType::SubscriptionPurchase);

        let seeded = MemoryStore::from_events(log.clone());
        assert_eq!(seeded.get_log().unwrap(), log);
    }
}
