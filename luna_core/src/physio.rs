//! Physiological input handed to the rule engine.
//!
//! `PhysioInput` is a narrow, read-only projection of `SystemState` plus
//! caller-supplied context (age, symptom scope).

use crate::cycle::CyclePhase;
use crate::state::SystemState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which reported symptoms the rule engine reacts to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymptomScope {
    /// Every symptom ever reported (union over all check-ins)
    #[default]
    AllTime,
    /// Only the symptoms of the most recent check-in
    LastCheckin,
}

/// Snapshot of physiological inputs for one rule pass
///
/// Every list field defaults to empty when absent from serialized input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PhysioInput {
    pub age: u32,
    pub cycle_day: u32,
    pub cycle_length: u32,
    pub symptoms: Vec<String>,
    pub medications: Vec<String>,
    pub lab_markers: BTreeMap<String, f64>,
}

impl Default for PhysioInput {
    fn default() -> Self {
        Self {
            age: 0,
            cycle_day: 1,
            cycle_length: crate::state::DEFAULT_CYCLE_LENGTH,
            symptoms: Vec::new(),
            medications: Vec::new(),
            lab_markers: BTreeMap::new(),
        }
    }
}

/// Canonical symptom key: trimmed, lowercase, words joined by `_`
pub fn normalize_symptom(symptom: &str) -> String {
    symptom
        .trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

impl PhysioInput {
    /// Derive the rule engine input from projected state
    ///
    /// `age` is supplied by the caller; lab markers are not parsed from the
    /// free-text lab data and are always empty.
    pub fn from_state(state: &SystemState, age: u32, scope: SymptomScope) -> Self {
        let symptoms = match scope {
            SymptomScope::AllTime => state.symptoms.iter().cloned().collect(),
            SymptomScope::LastCheckin => state
                .last_checkin
                .as_ref()
                .map(|c| c.checkin.symptoms.clone())
                .unwrap_or_default(),
        };

        Self {
            age,
            cycle_day: state.current_day,
            cycle_length: state.cycle_length,
            symptoms,
            medications: state.medications.iter().map(|m| m.name.clone()).collect(),
            lab_markers: BTreeMap::new(),
        }
    }

    /// Cycle phase for this input's day
    pub fn phase(&self) -> CyclePhase {
        CyclePhase::from_day(self.cycle_day, self.cycle_length)
    }

    /// Whether a symptom was reported, ignoring case and separators
    pub fn has_symptom(&self, symptom: &str) -> bool {
        let wanted = normalize_symptom(symptom);
        self.symptoms.iter().any(|s| normalize_symptom(s) == wanted)
    }

    /// Whether any of the given symptoms was reported
    pub fn has_any_symptom(&self, symptoms: &[&str]) -> bool {
        symptoms.iter().any(|s| self.has_symptom(s))
    }

    /// Whether a medication name contains `needle`, ignoring case
    pub fn takes_medication(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.medications
            .iter()
            .any(|m| m.to_lowercase().contains(&needle))
    }
}
