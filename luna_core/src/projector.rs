//! Event-sourced state projection.
//!
//! `project_state` folds the log left to right from `SystemState::default()`.
//! Each event is decoded into its typed `EventKind` and applied by an
//! exhaustive match; unknown and undecodable events leave state untouched.

use crate::state::{LastCheckin, Medication, SystemState};
use crate::types::{CycleSyncPayload, EventKind, HealthEvent, MedicationLogPayload};

/// Fold an ordered event log into the current state
///
/// Pure: the same ordered log always yields an equal state, and a prefix of
/// the log yields the state as of that prefix.
pub fn project_state(log: &[HealthEvent]) -> SystemState {
    let mut state = SystemState::default();
    for event in log {
        state.apply(event);
    }
    tracing::debug!("Projected state from {} events", log.len());
    state
}

impl SystemState {
    /// Apply a single event to this state
    pub fn apply(&mut self, event: &HealthEvent) {
        match event.kind() {
            EventKind::OnboardingComplete => self.onboarded = true,
            EventKind::AuthSuccess => self.is_authenticated = true,
            EventKind::SubscriptionPurchase(p) => {
                if let Some(tier) = p.tier {
                    self.subscription_tier = tier;
                }
            }
            EventKind::CycleSync(CycleSyncPayload { day, length }) => {
                if let Some(day) = day {
                    self.current_day = day;
                }
                if let Some(length) = length {
                    self.cycle_length = length;
                }
            }
            EventKind::DailyCheckin(checkin) => {
                self.symptoms.extend(checkin.symptoms.iter().cloned());
                self.last_checkin = Some(LastCheckin {
                    checkin,
                    timestamp: event.timestamp,
                });
            }
            EventKind::MedicationLog(MedicationLogPayload::Add(draft)) => {
                self.medications.push(Medication::from_draft(&draft, event));
            }
            EventKind::MedicationLog(MedicationLogPayload::Remove { med_id }) => {
                self.medications.retain(|m| m.id != med_id);
            }
            EventKind::LabMarkerEntry(p) => {
                if let Some(raw_text) = p.raw_text {
                    self.lab_data = raw_text;
                }
            }
            EventKind::ProfileUpdate(patch) => self.profile.apply_patch(&patch),
            // Read directly from the log by the views that need them
            EventKind::AudioReflection(_)
            | EventKind::FuelLog(_)
            | EventKind::DataExported(_)
            | EventKind::InsightGenerated(_) => {}
            EventKind::Unrecognized(name) => {
                tracing::debug!("Skipping event {} of unrecognized type {}", event.id, name);
            }
            EventKind::Undecodable { event_type, reason } => {
                tracing::warn!(
                    "Skipping {} event {} with unreadable payload: {}",
                    event_type,
                    event.id,
                    reason
                );
            }
        }
        self.events.push(event.clone());
    }
}

/// Projection cache that folds only the events appended since the last call
///
/// The cached state always equals `project_state(log)`. Events already
/// folded are compared against the head of the new log; if the log no
/// longer extends them (shorter, or any folded event rewritten) the state is
/// rebuilt from scratch.
#[derive(Clone, Debug, Default)]
pub struct IncrementalProjector {
    state: SystemState,
}

impl IncrementalProjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events folded into the cached state
    pub fn folded(&self) -> usize {
        self.state.events.len()
    }

    /// Bring the cached state up to date with `log` and return it
    pub fn refresh(&mut self, log: &[HealthEvent]) -> &SystemState {
        let folded = self.folded();
        let extends = log.len() >= folded && log[..folded] == self.state.events[..];

        if extends {
            for event in &log[folded..] {
                self.state.apply(event);
            }
            tracing::debug!("Folded {} new events", log.len() - folded);
        } else {
            tracing::debug!("Log no longer extends cached state, rebuilding");
            self.state = project_state(log);
        }
        &self.state
    }

    /// The cached state without refreshing
    pub fn state(&self) -> &SystemState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SubscriptionTier;
    use crate::types::EventType;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::{json, Value};

    fn event(n: i64, event_type: EventType, payload: Value) -> HealthEvent {
        HealthEvent {
            id: format!("evt-{}", n),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap() + Duration::hours(n),
            event_type,
            version: "3".into(),
            payload,
        }
    }

    fn add_med(n: i64, name: &str) -> HealthEvent {
        event(
            n,
            EventType::MedicationLog,
            json!({"action": "ADD", "name": name, "dose": "1 tab"}),
        )
    }

    fn remove_med(n: i64, id: &str) -> HealthEvent {
        event(
            n,
            EventType::MedicationLog,
            json!({"action": "REMOVE", "medId": id}),
        )
    }

    fn checkin(n: i64, symptoms: &[&str]) -> HealthEvent {
        event(
            n,
            EventType::DailyCheckin,
            json!({"energy": 3, "mood": 2, "symptoms": symptoms}),
        )
    }

    fn sample_log() -> Vec<HealthEvent> {
        vec![
            event(0, EventType::OnboardingComplete, json!({})),
            event(1, EventType::AuthSuccess, json!({})),
            event(2, EventType::SubscriptionPurchase, json!({"tier": "yearly"})),
            event(3, EventType::CycleSync, json!({"day": 12, "length": 30})),
            checkin(4, &["cramps", "fatigue"]),
            add_med(5, "Magnesium"),
            event(6, EventType::LabMarkerEntry, json!({"rawText": "TSH 2.1"})),
            event(7, EventType::ProfileUpdate, json!({"name": "Ada"})),
            event(8, EventType::FuelLog, json!({"description": "oats"})),
        ]
    }

    #[test]
    fn test_empty_log_yields_defaults() {
        assert_eq!(project_state(&[]), SystemState::default());
    }

    #[test]
    fn test_reduction_rules() {
        let state = project_state(&sample_log());

        assert!(state.onboarded);
        assert!(state.is_authenticated);
        assert_eq!(state.subscription_tier, SubscriptionTier::Yearly);
        assert_eq!(state.current_day, 12);
        assert_eq!(state.cycle_length, 30);
        assert!(state.symptoms.contains("cramps"));
        assert!(state.symptoms.contains("fatigue"));
        assert_eq!(state.medications.len(), 1);
        assert_eq!(state.medications[0].name, "Magnesium");
        assert_eq!(state.medications[0].id, "evt-5");
        assert_eq!(state.lab_data, "TSH 2.1");
        assert_eq!(state.profile.name, "Ada");
        assert_eq!(state.events.len(), 9);

        let last = state.last_checkin.unwrap();
        assert_eq!(last.checkin.energy, Some(3));
        assert_eq!(last.timestamp, sample_log()[4].timestamp);
    }

    #[test]
    fn test_projection_is_deterministic() {
        let log = sample_log();
        assert_eq!(project_state(&log), project_state(&log));
    }

    #[test]
    fn test_prefix_gives_state_as_of_prefix() {
        let log = sample_log();
        let state = project_state(&log[..4]);
        assert!(state.onboarded);
        assert_eq!(state.current_day, 12);
        assert!(state.medications.is_empty());
        assert!(state.symptoms.is_empty());
    }

    #[test]
    fn test_add_medication_appends_exactly_one() {
        let mut log = sample_log();
        let before = project_state(&log).medications;

        log.push(add_med(20, "Vitamin D"));
        let after = project_state(&log).medications;

        assert_eq!(after.len(), before.len() + 1);
        assert_eq!(&after[..before.len()], &before[..]);
        assert_eq!(after.last().unwrap().id, "evt-20");
        assert_eq!(after.last().unwrap().added_at, log.last().unwrap().timestamp);
    }

    #[test]
    fn test_payload_id_wins_over_event_id() {
        let log = vec![event(
            0,
            EventType::MedicationLog,
            json!({"action": "ADD", "id": "med-42", "name": "Iron"}),
        )];
        let state = project_state(&log);
        assert_eq!(state.medications[0].id, "med-42");
    }

    #[test]
    fn test_remove_medication_by_id() {
        let log = vec![
            add_med(0, "Magnesium"),
            add_med(1, "Iron"),
            add_med(2, "Vitamin D"),
            remove_med(3, "evt-1"),
        ];
        let state = project_state(&log);

        assert_eq!(state.medications.len(), 2);
        assert!(state.medication("evt-1").is_none());
        let names: Vec<_> = state.medications.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Magnesium", "Vitamin D"]);
    }

    #[test]
    fn test_remove_unknown_id_is_noop() {
        let log = vec![add_med(0, "Magnesium"), remove_med(1, "nope")];
        assert_eq!(project_state(&log).medications.len(), 1);
    }

    #[test]
    fn test_symptoms_accumulate_as_union() {
        let log = vec![
            checkin(0, &["cramps", "fatigue"]),
            checkin(1, &["fatigue", "headache", "bloating"]),
            checkin(2, &[]),
        ];
        let state = project_state(&log);

        assert_eq!(state.symptoms.len(), 4);
        assert!(state.symptoms.len() <= 2 + 3);
        assert!(state.symptoms.len() >= 3);
        // The last check-in reported nothing, but history is kept
        assert!(state.last_checkin.unwrap().checkin.symptoms.is_empty());
    }

    #[test]
    fn test_lab_data_is_overwritten() {
        let log = vec![
            event(0, EventType::LabMarkerEntry, json!({"rawText": "TSH 4.5"})),
            event(1, EventType::LabMarkerEntry, json!({"rawText": "Ferritin 30"})),
        ];
        assert_eq!(project_state(&log).lab_data, "Ferritin 30");
    }

    #[test]
    fn test_profile_update_is_field_local() {
        let log = vec![
            event(
                0,
                EventType::ProfileUpdate,
                json!({"name": "Ada", "birthDate": "1990-05-01", "goals": ["sleep"]}),
            ),
            event(1, EventType::ProfileUpdate, json!({"name": "X"})),
        ];
        let profile = project_state(&log).profile;

        assert_eq!(profile.name, "X");
        assert_eq!(profile.birth_date.as_deref(), Some("1990-05-01"));
        assert_eq!(profile.goals, vec!["sleep".to_string()]);
    }

    #[test]
    fn test_partial_and_malformed_payloads_do_not_crash() {
        let log = vec![
            event(0, EventType::CycleSync, json!({"day": 9})),
            event(1, EventType::CycleSync, json!({"day": "late"})),
            event(2, EventType::DailyCheckin, Value::Null),
            event(3, EventType::MedicationLog, json!({"name": "no action"})),
            event(4, EventType::SubscriptionPurchase, json!({})),
            event(5, EventType::LabMarkerEntry, json!({})),
        ];
        let state = project_state(&log);

        assert_eq!(state.current_day, 9);
        assert_eq!(state.cycle_length, 28);
        assert!(state.last_checkin.is_some());
        assert!(state.medications.is_empty());
        assert_eq!(state.subscription_tier, SubscriptionTier::None);
        assert_eq!(state.lab_data, "");
        assert_eq!(state.events.len(), 6);
    }

    #[test]
    fn test_bad_fields_do_not_drop_the_event() {
        let log = vec![
            event(
                0,
                EventType::DailyCheckin,
                json!({"energy": 3.5, "symptoms": ["brain_fog"]}),
            ),
            event(1, EventType::DailyCheckin, json!({"mood": 3, "symptoms": null})),
            event(2, EventType::CycleSync, json!({"day": 25, "length": "28"})),
        ];
        let state = project_state(&log);

        assert!(state.symptoms.contains("brain_fog"));
        assert_eq!(state.current_day, 25);
        assert_eq!(state.cycle_length, 28);

        let last = state.last_checkin.unwrap();
        assert_eq!(last.checkin.mood, Some(3));
        assert_eq!(last.timestamp, log[1].timestamp);
    }

    #[test]
    fn test_unrecognized_types_are_retained_but_ignored() {
        let log = vec![
            event(0, EventType::Unrecognized("MOON_PHASE".into()), json!({"full": true})),
            event(1, EventType::OnboardingComplete, json!({})),
        ];
        let state = project_state(&log);
        assert!(state.onboarded);
        assert_eq!(state.events.len(), 2);
    }

    #[test]
    fn test_incremental_matches_full_projection() {
        let log = sample_log();
        let mut projector = IncrementalProjector::new();

        projector.refresh(&log[..3]);
        assert_eq!(projector.folded(), 3);

        let state = projector.refresh(&log).clone();
        assert_eq!(state, project_state(&log));
        assert_eq!(projector.folded(), log.len());
    }

    #[test]
    fn test_incremental_rebuilds_on_divergence() {
        let log = sample_log();
        let mut projector = IncrementalProjector::new();
        projector.refresh(&log);

        let shorter = &log[..2];
        assert_eq!(projector.refresh(shorter), &project_state(shorter));

        let mut other = log.clone();
        let last = other.len() - 1;
        other[last] = event(99, EventType::CycleSync, json!({"day": 3}));
        projector.refresh(&log);
        assert_eq!(projector.refresh(&other), &project_state(&other));
    }

    #[test]
    fn test_incremental_rebuilds_on_earlier_rewrite() {
        let log = sample_log();
        let mut projector = IncrementalProjector::new();
        projector.refresh(&log);

        // Same length and same final event, different history
        let mut rewritten = log.clone();
        rewritten[3] = event(3, EventType::CycleSync, json!({"day": 20, "length": 35}));
        let state = projector.refresh(&rewritten).clone();

        assert_eq!(state, project_state(&rewritten));
        assert_eq!(state.current_day, 20);
        assert_eq!(state.cycle_length, 35);
    }
}
