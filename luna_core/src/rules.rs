//! Rule engine data model.
//!
//! A `Rule` pairs a trigger predicate over `PhysioInput` with the effects it
//! contributes when it fires. Rules are evaluated in declaration order by
//! `engine::evaluate`.

use crate::archetype::SymptomArchetype;
use crate::physio::PhysioInput;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Baseline hormone tracked by the engine
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HormoneId {
    Estrogen,
    Progesterone,
    Testosterone,
    Cortisol,
    Thyroid,
    Insulin,
}

impl HormoneId {
    /// The six hormones every `RuleOutput` reports on
    pub const BASELINE: [HormoneId; 6] = [
        HormoneId::Estrogen,
        HormoneId::Progesterone,
        HormoneId::Testosterone,
        HormoneId::Cortisol,
        HormoneId::Thyroid,
        HormoneId::Insulin,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HormoneId::Estrogen => "estrogen",
            HormoneId::Progesterone => "progesterone",
            HormoneId::Testosterone => "testosterone",
            HormoneId::Cortisol => "cortisol",
            HormoneId::Thyroid => "thyroid",
            HormoneId::Insulin => "insulin",
        }
    }
}

impl fmt::Display for HormoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Qualitative hormone status label
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HormoneStatus {
    #[default]
    Balanced,
    Unstable,
    Strained,
    Fluctuating,
    #[serde(rename = "Peak Activity")]
    PeakActivity,
    Dormant,
}

impl fmt::Display for HormoneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            HormoneStatus::Balanced => "Balanced",
            HormoneStatus::Unstable => "Unstable",
            HormoneStatus::Strained => "Strained",
            HormoneStatus::Fluctuating => "Fluctuating",
            HormoneStatus::PeakActivity => "Peak Activity",
            HormoneStatus::Dormant => "Dormant",
        };
        f.write_str(label)
    }
}

/// Confidence attached to a rule's insight
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// Grouping used by presentation to file insights
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    Metabolic,
    Reproductive,
    Stress,
    Mood,
    Recovery,
}

/// Trigger predicate evaluated against one input snapshot
pub type Trigger = fn(&PhysioInput) -> bool;

/// Effects a rule contributes when it fires
#[derive(Clone, Debug)]
pub struct RuleEffects {
    /// Applied in order; the first entry names the insight's hormone
    pub status_adjustments: Vec<(HormoneId, HormoneStatus)>,
    /// Informational deltas per metric; not applied to any state
    pub state_adjustments: Vec<(&'static str, i32)>,
    pub insight: &'static str,
    pub confidence: Confidence,
    pub archetype: Option<&'static SymptomArchetype>,
}

/// A declarative rule in the catalog
#[derive(Clone, Debug)]
pub struct Rule {
    pub rule_id: &'static str,
    pub category: RuleCategory,
    /// Display weight copied onto insights; never changes evaluation order
    pub priority: u8,
    pub trigger: Trigger,
    pub effects: RuleEffects,
    /// Supports `{cycleDay}`, `{cycleLength}`, `{phase}` and `{symptoms}`
    pub explanation_template: &'static str,
    pub doctor_prompts: Vec<&'static str>,
}

impl Rule {
    /// First hormone this rule adjusts, if any
    pub fn primary_hormone(&self) -> Option<HormoneId> {
        self.effects.status_adjustments.first().map(|(id, _)| *id)
    }
}

/// An insight produced by a fired rule
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    pub rule_id: String,
    pub category: RuleCategory,
    pub text: String,
    pub hormone_id: Option<HormoneId>,
    pub confidence: Confidence,
    pub priority: u8,
    pub explanation: String,
    pub state_adjustments: BTreeMap<String, i32>,
}

/// A question to bring to a clinician
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorQuestion {
    pub id: String,
    pub question: String,
    pub context: String,
}

/// Result of one rule engine pass
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleOutput {
    pub hormone_statuses: BTreeMap<HormoneId, HormoneStatus>,
    pub insights: Vec<Insight>,
    pub doctor_questions: Vec<DoctorQuestion>,
    pub archetype: Option<SymptomArchetype>,
}

impl Default for RuleOutput {
    /// Conservative default: all hormones balanced, nothing else
    fn default() -> Self {
        Self {
            hormone_statuses: HormoneId::BASELINE
                .iter()
                .map(|id| (*id, HormoneStatus::Balanced))
                .collect(),
            insights: Vec::new(),
            doctor_questions: Vec::new(),
            archetype: None,
        }
    }
}

impl RuleOutput {
    /// Status of a hormone; every baseline hormone is always present
    pub fn status(&self, id: HormoneId) -> HormoneStatus {
        self.hormone_statuses.get(&id).copied().unwrap_or_default()
    }
}
