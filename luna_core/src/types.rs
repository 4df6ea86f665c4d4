//! Event types for the append-only health log.
//!
//! This module defines:
//! - The persisted `HealthEvent` record (`id, timestamp, type, version, payload`)
//! - The closed `EventType` enumeration with a catch-all for newer builds
//! - Typed payload shapes and the `EventKind` tagged union over them
//!
//! The persisted payload is kept as raw JSON so that a full log
//! read-modify-write never drops fields written by another schema version.
//! Typed access goes through `HealthEvent::kind()`.

use crate::state::SubscriptionTier;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Schema version stamped on every event produced by this build
pub const EVENT_SCHEMA_VERSION: &str = "3";

// ============================================================================
// Event Type
// ============================================================================

/// Kind of health event
///
/// Serialized in SCREAMING_SNAKE_CASE. Types written by a newer build are
/// read back as `Unrecognized` and preserved verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    OnboardingComplete,
    AuthSuccess,
    SubscriptionPurchase,
    CycleSync,
    DailyCheckin,
    MedicationLog,
    LabMarkerEntry,
    ProfileUpdate,
    AudioReflection,
    FuelLog,
    DataExported,
    InsightGenerated,
    Unrecognized(String),
}

impl EventType {
    /// Every type this build knows how to produce
    pub const RECOGNIZED: [EventType; 12] = [
        EventType::OnboardingComplete,
        EventType::AuthSuccess,
        EventType::SubscriptionPurchase,
        EventType::CycleSync,
        EventType::DailyCheckin,
        EventType::MedicationLog,
        EventType::LabMarkerEntry,
        EventType::ProfileUpdate,
        EventType::AudioReflection,
        EventType::FuelLog,
        EventType::DataExported,
        EventType::InsightGenerated,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            EventType::OnboardingComplete => "ONBOARDING_COMPLETE",
            EventType::AuthSuccess => "AUTH_SUCCESS",
            EventType::SubscriptionPurchase => "SUBSCRIPTION_PURCHASE",
            EventType::CycleSync => "CYCLE_SYNC",
            EventType::DailyCheckin => "DAILY_CHECKIN",
            EventType::MedicationLog => "MEDICATION_LOG",
            EventType::LabMarkerEntry => "LAB_MARKER_ENTRY",
            EventType::ProfileUpdate => "PROFILE_UPDATE",
            EventType::AudioReflection => "AUDIO_REFLECTION",
            EventType::FuelLog => "FUEL_LOG",
            EventType::DataExported => "DATA_EXPORTED",
            EventType::InsightGenerated => "INSIGHT_GENERATED",
            EventType::Unrecognized(other) => other,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, EventType::Unrecognized(_))
    }
}

impl From<String> for EventType {
    fn from(s: String) -> Self {
        EventType::RECOGNIZED
            .iter()
            .find(|t| t.as_str() == s)
            .cloned()
            .unwrap_or(EventType::Unrecognized(s))
    }
}

impl From<EventType> for String {
    fn from(t: EventType) -> Self {
        match t {
            EventType::Unrecognized(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

/// Strict parse used at the append boundary: unknown names are rejected
impl FromStr for EventType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_uppercase().replace('-', "_");
        match EventType::from(normalized) {
            EventType::Unrecognized(_) => {
                Err(Error::Validation(format!("unknown event type '{}'", s)))
            }
            known => Ok(known),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Persisted Event
// ============================================================================

/// An immutable fact in the health log
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default, deserialize_with = "lenient_version")]
    pub version: String,
    #[serde(default)]
    pub payload: Value,
}

/// Older builds wrote the version as a number
fn lenient_version<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

impl HealthEvent {
    /// Build a new event with a fresh id and the current time
    pub fn new(event_type: EventType, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            version: EVENT_SCHEMA_VERSION.to_string(),
            payload,
        }
    }

    /// Typed view of this event's payload
    ///
    /// Never fails: a payload that cannot be decoded for its type yields
    /// `EventKind::Undecodable`, which projection treats as a no-op.
    pub fn kind(&self) -> EventKind {
        match EventKind::decode_lenient(&self.event_type, &self.payload) {
            Ok(kind) => kind,
            Err(e) => EventKind::Undecodable {
                event_type: self.event_type.clone(),
                reason: e.to_string(),
            },
        }
    }
}

// ============================================================================
// Payload Shapes
// ============================================================================

/// Payload of SUBSCRIPTION_PURCHASE
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubscriptionPayload {
    pub tier: Option<SubscriptionTier>,
}

/// Payload of CYCLE_SYNC
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CycleSyncPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
}

/// Payload of DAILY_CHECKIN
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckinPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mood: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sleep_hours: Option<f32>,
    pub symptoms: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Fields of a medication being added
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MedicationDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    pub observations: Vec<String>,
    pub notes: String,
}

/// Payload of MEDICATION_LOG, discriminated by `action`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MedicationLogPayload {
    Add(MedicationDraft),
    Remove {
        #[serde(rename = "medId")]
        med_id: String,
    },
}

/// Payload of LAB_MARKER_ENTRY
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LabMarkerPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
}

/// Payload of PROFILE_UPDATE: only the fields present are merged
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goals: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload of AUDIO_REFLECTION
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AudioReflectionPayload {
    pub transcript: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
}

/// Payload of FUEL_LOG
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FuelLogPayload {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calories: Option<u32>,
}

/// Payload of DATA_EXPORTED
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataExportedPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}

/// Payload of INSIGHT_GENERATED
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InsightGeneratedPayload {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

// ============================================================================
// Typed Event Union
// ============================================================================

/// Strongly-typed event, one variant per recognized `EventType`
#[derive(Clone, Debug, PartialEq)]
pub enum EventKind {
    OnboardingComplete,
    AuthSuccess,
    SubscriptionPurchase(SubscriptionPayload),
    CycleSync(CycleSyncPayload),
    DailyCheckin(CheckinPayload),
    MedicationLog(MedicationLogPayload),
    LabMarkerEntry(LabMarkerPayload),
    ProfileUpdate(ProfilePatch),
    AudioReflection(AudioReflectionPayload),
    FuelLog(FuelLogPayload),
    DataExported(DataExportedPayload),
    InsightGenerated(InsightGeneratedPayload),
    /// Type written by a newer build
    Unrecognized(String),
    /// Recognized type whose payload could not be decoded
    Undecodable { event_type: EventType, reason: String },
}

/// Decode a payload, treating a missing payload as an empty object
fn decode_payload<T: DeserializeOwned>(event_type: &EventType, payload: &Value) -> Result<T> {
    let result = match payload {
        Value::Null => T::deserialize(&Value::Object(Map::new())),
        Value::Object(_) => T::deserialize(payload),
        _ => {
            return Err(Error::Validation(format!(
                "{} payload must be a JSON object",
                event_type
            )))
        }
    };
    result.map_err(|e| Error::Validation(format!("invalid {} payload: {}", event_type, e)))
}

/// Decode a payload field by field
///
/// `null` counts as absent, and a field whose value cannot be read for its
/// type is dropped on its own so the remaining fields still apply. The
/// `action` discriminator is always kept.
fn decode_payload_lenient<T: DeserializeOwned>(
    event_type: &EventType,
    payload: &Value,
) -> Result<T> {
    let fields: Map<String, Value> = match payload {
        Value::Null => Map::new(),
        Value::Object(map) => map
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
        _ => {
            return Err(Error::Validation(format!(
                "{} payload must be a JSON object",
                event_type
            )))
        }
    };

    if let Ok(decoded) = T::deserialize(&Value::Object(fields.clone())) {
        return Ok(decoded);
    }

    let tag = fields.get("action").cloned();
    let readable: Map<String, Value> = fields
        .into_iter()
        .filter(|(key, value)| {
            if key == "action" {
                return true;
            }
            let mut single = Map::new();
            if let Some(tag) = &tag {
                single.insert("action".into(), tag.clone());
            }
            single.insert(key.clone(), value.clone());
            let ok = T::deserialize(&Value::Object(single)).is_ok();
            if !ok {
                tracing::debug!("Ignoring unreadable {} field '{}'", event_type, key);
            }
            ok
        })
        .collect();

    T::deserialize(&Value::Object(readable))
        .map_err(|e| Error::Validation(format!("invalid {} payload: {}", event_type, e)))
}

/// Decode in the requested mode
fn decode_as<T: DeserializeOwned>(event_type: &EventType, payload: &Value, lenient: bool) -> Result<T> {
    if lenient {
        decode_payload_lenient(event_type, payload)
    } else {
        decode_payload(event_type, payload)
    }
}

impl EventKind {
    /// Decode a raw `(type, payload)` pair into its typed form
    ///
    /// Strict: any field of the wrong type rejects the whole payload. Used
    /// at the append boundary.
    pub fn decode(event_type: &EventType, payload: &Value) -> Result<Self> {
        Self::decode_with(event_type, payload, false)
    }

    /// Decode a persisted payload, ignoring fields that cannot be read
    ///
    /// Only a payload that is not an object (or a medication log without a
    /// usable `action`) fails.
    pub fn decode_lenient(event_type: &EventType, payload: &Value) -> Result<Self> {
        Self::decode_with(event_type, payload, true)
    }

    fn decode_with(event_type: &EventType, payload: &Value, lenient: bool) -> Result<Self> {
        let kind = match event_type {
            EventType::OnboardingComplete => EventKind::OnboardingComplete,
            EventType::AuthSuccess => EventKind::AuthSuccess,
            EventType::SubscriptionPurchase => {
                EventKind::SubscriptionPurchase(decode_as(event_type, payload, lenient)?)
            }
            EventType::CycleSync => EventKind::CycleSync(decode_as(event_type, payload, lenient)?),
            EventType::DailyCheckin => {
                EventKind::DailyCheckin(decode_as(event_type, payload, lenient)?)
            }
            EventType::MedicationLog => {
                EventKind::MedicationLog(decode_as(event_type, payload, lenient)?)
            }
            EventType::LabMarkerEntry => {
                EventKind::LabMarkerEntry(decode_as(event_type, payload, lenient)?)
            }
            EventType::ProfileUpdate => {
                EventKind::ProfileUpdate(decode_as(event_type, payload, lenient)?)
            }
            EventType::AudioReflection => {
                EventKind::AudioReflection(decode_as(event_type, payload, lenient)?)
            }
            EventType::FuelLog => EventKind::FuelLog(decode_as(event_type, payload, lenient)?),
            EventType::DataExported => {
                EventKind::DataExported(decode_as(event_type, payload, lenient)?)
            }
            EventType::InsightGenerated => {
                EventKind::InsightGenerated(decode_as(event_type, payload, lenient)?)
            }
            EventType::Unrecognized(name) => EventKind::Unrecognized(name.clone()),
        };
        Ok(kind)
    }

    /// The `EventType` this variant is persisted under
    pub fn event_type(&self) -> EventType {
        match self {
            EventKind::OnboardingComplete => EventType::OnboardingComplete,
            EventKind::AuthSuccess => EventType::AuthSuccess,
            EventKind::SubscriptionPurchase(_) => EventType::SubscriptionPurchase,
            EventKind::CycleSync(_) => EventType::CycleSync,
            EventKind::DailyCheckin(_) => EventType::DailyCheckin,
            EventKind::MedicationLog(_) => EventType::MedicationLog,
            EventKind::LabMarkerEntry(_) => EventType::LabMarkerEntry,
            EventKind::ProfileUpdate(_) => EventType::ProfileUpdate,
            EventKind::AudioReflection(_) => EventType::AudioReflection,
            EventKind::FuelLog(_) => EventType::FuelLog,
            EventKind::DataExported(_) => EventType::DataExported,
            EventKind::InsightGenerated(_) => EventType::InsightGenerated,
            EventKind::Unrecognized(name) => EventType::Unrecognized(name.clone()),
            EventKind::Undecodable { event_type, .. } => event_type.clone(),
        }
    }

    /// Serialize the typed payload into its persisted JSON form
    pub fn to_payload(&self) -> Result<Value> {
        let value = match self {
            EventKind::OnboardingComplete | EventKind::AuthSuccess => Value::Object(Map::new()),
            EventKind::SubscriptionPurchase(p) => serde_json::to_value(p)?,
            EventKind::CycleSync(p) => serde_json::to_value(p)?,
            EventKind::DailyCheckin(p) => serde_json::to_value(p)?,
            EventKind::MedicationLog(p) => serde_json::to_value(p)?,
            EventKind::LabMarkerEntry(p) => serde_json::to_value(p)?,
            EventKind::ProfileUpdate(p) => serde_json::to_value(p)?,
            EventKind::AudioReflection(p) => serde_json::to_value(p)?,
            EventKind::FuelLog(p) => serde_json::to_value(p)?,
            EventKind::DataExported(p) => serde_json::to_value(p)?,
            EventKind::InsightGenerated(p) => serde_json::to_value(p)?,
            EventKind::Unrecognized(name) => {
                return Err(Error::Validation(format!("unknown event type '{}'", name)))
            }
            EventKind::Undecodable { event_type, reason } => {
                return Err(Error::Validation(format!(
                    "cannot persist undecodable {} event: {}",
                    event_type, reason
                )))
            }
        };
        Ok(value)
    }

    /// Semantic checks applied at the append boundary
    pub fn validate(&self) -> Result<()> {
        match self {
            EventKind::CycleSync(p) => {
                if p.day == Some(0) || p.length == Some(0) {
                    return Err(Error::Validation(
                        "cycle day and length must be positive".into(),
                    ));
                }
                if let (Some(day), Some(length)) = (p.day, p.length) {
                    if day > length {
                        return Err(Error::Validation(format!(
                            "cycle day {} exceeds cycle length {}",
                            day, length
                        )));
                    }
                }
            }
            EventKind::MedicationLog(MedicationLogPayload::Add(draft)) => {
                if draft.name.trim().is_empty() {
                    return Err(Error::Validation("medication name is required".into()));
                }
            }
            EventKind::MedicationLog(MedicationLogPayload::Remove { med_id }) => {
                if med_id.trim().is_empty() {
                    return Err(Error::Validation("medId is required".into()));
                }
            }
            EventKind::Unrecognized(_) | EventKind::Undecodable { .. } => {
                self.to_payload()?;
            }
            _ => {}
        }
        Ok(())
    }
}
