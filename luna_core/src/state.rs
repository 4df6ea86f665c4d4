//! Derived application state.
//!
//! `SystemState` is never persisted; it is recomputed from the event log by
//! `projector::project_state`. The types here are what presentation
//! collaborators read.

use crate::cycle::CyclePhase;
use crate::types::{CheckinPayload, HealthEvent, MedicationDraft, ProfilePatch};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Default cycle length in days
pub const DEFAULT_CYCLE_LENGTH: u32 = 28;

/// Subscription tier
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    #[default]
    None,
    Monthly,
    Yearly,
}

/// A medication currently on the user's list
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medication {
    pub id: String,
    pub name: String,
    pub dose: Option<String>,
    pub start_date: Option<String>,
    pub observations: Vec<String>,
    pub notes: String,
    pub added_at: DateTime<Utc>,
}

impl Medication {
    /// Build a medication from an ADD payload; the event id stands in when
    /// the payload carries no id of its own
    pub fn from_draft(draft: &MedicationDraft, event: &HealthEvent) -> Self {
        Self {
            id: draft.id.clone().unwrap_or_else(|| event.id.clone()),
            name: draft.name.clone(),
            dose: draft.dose.clone(),
            start_date: draft.start_date.clone(),
            observations: draft.observations.clone(),
            notes: draft.notes.clone(),
            added_at: event.timestamp,
        }
    }
}

/// Most recent check-in, annotated with when it was recorded
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LastCheckin {
    #[serde(flatten)]
    pub checkin: CheckinPayload,
    pub timestamp: DateTime<Utc>,
}

/// User profile, shallow-merged from PROFILE_UPDATE events
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileData {
    pub name: String,
    pub birth_date: Option<String>,
    pub email: Option<String>,
    pub conditions: Vec<String>,
    pub goals: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ProfileData {
    /// Merge the fields present in `patch`; absent fields keep their value
    pub fn apply_patch(&mut self, patch: &ProfilePatch) {
        if let Some(ref name) = patch.name {
            self.name = name.clone();
        }
        if let Some(ref birth_date) = patch.birth_date {
            self.birth_date = Some(birth_date.clone());
        }
        if let Some(ref email) = patch.email {
            self.email = Some(email.clone());
        }
        if let Some(ref conditions) = patch.conditions {
            self.conditions = conditions.clone();
        }
        if let Some(ref goals) = patch.goals {
            self.goals = goals.clone();
        }
        for (key, value) in &patch.extra {
            self.extra.insert(key.clone(), value.clone());
        }
    }

    /// Parsed birth date, accepting `YYYY-MM-DD` or a full RFC 3339 timestamp
    pub fn birth_date(&self) -> Option<NaiveDate> {
        let raw = self.birth_date.as_deref()?.trim();
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .or_else(|| {
                DateTime::parse_from_rfc3339(raw)
                    .ok()
                    .map(|dt| dt.date_naive())
            })
    }

    /// Age in whole years on `today`, if the birth date is known and sane
    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        today.years_since(self.birth_date()?)
    }
}

/// Snapshot of everything derived from the event log
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemState {
    pub onboarded: bool,
    pub is_authenticated: bool,
    pub subscription_tier: SubscriptionTier,
    pub current_day: u32,
    pub cycle_length: u32,
    pub medications: Vec<Medication>,
    pub symptoms: BTreeSet<String>,
    pub lab_data: String,
    pub last_checkin: Option<LastCheckin>,
    pub profile: ProfileData,
    pub events: Vec<HealthEvent>,
}

impl Default for SystemState {
    fn default() -> Self {
        Self {
            onboarded: false,
            is_authenticated: false,
            subscription_tier: SubscriptionTier::None,
            current_day: 1,
            cycle_length: DEFAULT_CYCLE_LENGTH,
            medications: Vec::new(),
            symptoms: BTreeSet::new(),
            lab_data: String::new(),
            last_checkin: None,
            profile: ProfileData::default(),
            events: Vec::new(),
        }
    }
}

impl SystemState {
    /// Cycle phase for the current day
    pub fn cycle_phase(&self) -> CyclePhase {
        CyclePhase::from_day(self.current_day, self.cycle_length)
    }

    /// Look up a medication by id
    pub fn medication(&self, id: &str) -> Option<&Medication> {
        self.medications.iter().find(|m| m.id == id)
    }
}
