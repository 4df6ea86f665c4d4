//! Default rule catalog.
//!
//! Declaration order is evaluation order: when two rules adjust the same
//! hormone or both set an archetype, the later rule wins. New rules are
//! appended where their precedence belongs.

use crate::archetype::{ANCHOR, FOG, RADIANCE, STORM};
use crate::cycle::CyclePhase;
use crate::rules::{Confidence, HormoneId, HormoneStatus, Rule, RuleCategory, RuleEffects};
use crate::{Error, Result};
use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Placeholders `engine::render_explanation` knows how to fill
pub const TEMPLATE_PLACEHOLDERS: [&str; 4] = ["cycleDay", "cycleLength", "phase", "symptoms"];

/// Ordered collection of rules
#[derive(Clone, Debug)]
pub struct RuleCatalog {
    pub rules: Vec<Rule>,
}

/// Cached default catalog - built once and reused across all evaluations
static DEFAULT_CATALOG: Lazy<RuleCatalog> = Lazy::new(build_default_catalog);

/// Get a reference to the cached default catalog
pub fn get_default_catalog() -> &'static RuleCatalog {
    &DEFAULT_CATALOG
}

/// Builds the default rule catalog
///
/// Prefer `get_default_catalog()`; this is kept for tests and for hosts
/// that extend the catalog.
pub fn build_default_catalog() -> RuleCatalog {
    use HormoneId::*;
    use HormoneStatus::*;

    let rules = vec![
        // ====================================================================
        // Cycle-phase rules
        // ====================================================================
        Rule {
            rule_id: "late_luteal_fog",
            category: RuleCategory::Metabolic,
            priority: 3,
            trigger: |input| {
                input.phase() == CyclePhase::LateLuteal
                    && input.has_any_symptom(&["fatigue", "brain_fog"])
            },
            effects: RuleEffects {
                status_adjustments: vec![(Thyroid, Strained), (Progesterone, Fluctuating)],
                state_adjustments: vec![("energy", -2), ("focus", -2)],
                insight: "Late-cycle fog and fatigue often track with falling progesterone and a thyroid working harder than usual.",
                confidence: Confidence::High,
                archetype: Some(&FOG),
            },
            explanation_template: "Day {cycleDay} of {cycleLength} falls in the {phase} phase, and you reported {symptoms}.",
            doctor_prompts: vec![
                "Could my late-cycle fatigue be metabolic in origin?",
                "Should my thyroid panel include free T3 and free T4, not just TSH?",
            ],
        },
        Rule {
            rule_id: "ovulatory_radiance",
            category: RuleCategory::Reproductive,
            priority: 2,
            trigger: |input| {
                input.phase() == CyclePhase::Ovulatory && !input.has_symptom("fatigue")
            },
            effects: RuleEffects {
                status_adjustments: vec![(Estrogen, PeakActivity), (Testosterone, PeakActivity)],
                state_adjustments: vec![("energy", 2), ("social", 2)],
                insight: "You are in your ovulatory window: estrogen and testosterone are near their monthly peak.",
                confidence: Confidence::Medium,
                archetype: Some(&RADIANCE),
            },
            explanation_template: "Day {cycleDay} of a {cycleLength}-day cycle sits in the {phase} window.",
            doctor_prompts: vec![],
        },
        Rule {
            rule_id: "menstrual_anchor",
            category: RuleCategory::Reproductive,
            priority: 2,
            trigger: |input| input.phase() == CyclePhase::Menstrual,
            effects: RuleEffects {
                status_adjustments: vec![(Estrogen, Dormant), (Progesterone, Dormant)],
                state_adjustments: vec![("energy", -1)],
                insight: "Estrogen and progesterone are at their monthly low while you bleed; rest counts as progress right now.",
                confidence: Confidence::Medium,
                archetype: Some(&ANCHOR),
            },
            explanation_template: "Day {cycleDay} is part of the {phase} phase.",
            doctor_prompts: vec![],
        },
        Rule {
            rule_id: "heavy_flow_iron",
            category: RuleCategory::Recovery,
            priority: 3,
            trigger: |input| {
                input.phase() == CyclePhase::Menstrual
                    && input.has_any_symptom(&["heavy_bleeding", "dizziness"])
            },
            effects: RuleEffects {
                status_adjustments: vec![],
                state_adjustments: vec![("energy", -2)],
                insight: "Heavy flow or dizziness during your period can draw down iron stores.",
                confidence: Confidence::Medium,
                archetype: None,
            },
            explanation_template: "You reported {symptoms} during the {phase} phase.",
            doctor_prompts: vec!["Should we check my ferritin and iron levels?"],
        },
        // ====================================================================
        // Mood and stress rules
        // ====================================================================
        Rule {
            rule_id: "irritability_storm",
            category: RuleCategory::Mood,
            priority: 3,
            trigger: |input| input.has_symptom("irritability") && input.has_symptom("anxiety"),
            effects: RuleEffects {
                status_adjustments: vec![(Cortisol, Unstable), (Progesterone, Fluctuating)],
                state_adjustments: vec![("mood", -2), ("calm", -2)],
                insight: "Irritability and anxiety arriving together often point to a stress response amplified by shifting progesterone.",
                confidence: Confidence::Medium,
                archetype: Some(&STORM),
            },
            explanation_template: "You reported {symptoms} on day {cycleDay}.",
            doctor_prompts: vec![
                "Could my mood shifts be linked to progesterone sensitivity?",
                "Would tracking my cortisol rhythm help explain these swings?",
            ],
        },
        Rule {
            rule_id: "stress_sleep_cortisol",
            category: RuleCategory::Stress,
            priority: 2,
            trigger: |input| {
                input.has_any_symptom(&["insomnia", "poor_sleep"])
                    && input.has_any_symptom(&["anxiety", "irritability"])
            },
            effects: RuleEffects {
                status_adjustments: vec![(Cortisol, Strained)],
                state_adjustments: vec![("sleep", -2)],
                insight: "Poor sleep on top of anxiety keeps cortisol elevated into the evening.",
                confidence: Confidence::Medium,
                archetype: None,
            },
            explanation_template: "Sleep disruption and {symptoms} were both reported.",
            doctor_prompts: vec!["Would tracking my cortisol rhythm help explain these swings?"],
        },
        Rule {
            rule_id: "luteal_sleep_disruption",
            category: RuleCategory::Recovery,
            priority: 1,
            trigger: |input| {
                input.phase().is_luteal() && input.has_any_symptom(&["insomnia", "night_sweats"])
            },
            effects: RuleEffects {
                status_adjustments: vec![(Progesterone, Unstable)],
                state_adjustments: vec![("sleep", -1)],
                insight: "Sleep often frays in the luteal phase as progesterone's calming effect fades.",
                confidence: Confidence::Low,
                archetype: None,
            },
            explanation_template: "Day {cycleDay} is {phase}, and you reported {symptoms}.",
            doctor_prompts: vec![
                "Is my sleep disruption related to progesterone withdrawal?",
                "Could my late-cycle fatigue be metabolic in origin?",
            ],
        },
        // ====================================================================
        // Metabolic and endocrine rules
        // ====================================================================
        Rule {
            rule_id: "blood_sugar_swings",
            category: RuleCategory::Metabolic,
            priority: 2,
            trigger: |input| {
                input.has_any_symptom(&["sugar_cravings", "cravings"])
                    && input.has_any_symptom(&["fatigue", "shakiness", "brain_fog"])
            },
            effects: RuleEffects {
                status_adjustments: vec![(Insulin, Unstable)],
                state_adjustments: vec![("energy", -1)],
                insight: "Cravings followed by crashes can reflect swings in blood sugar regulation.",
                confidence: Confidence::Low,
                archetype: None,
            },
            explanation_template: "You reported {symptoms}.",
            doctor_prompts: vec!["Should we check my fasting glucose and HbA1c?"],
        },
        Rule {
            rule_id: "low_drive",
            category: RuleCategory::Reproductive,
            priority: 1,
            trigger: |input| {
                input.has_symptom("low_libido") && input.phase() != CyclePhase::Ovulatory
            },
            effects: RuleEffects {
                status_adjustments: vec![(Testosterone, Dormant)],
                state_adjustments: vec![],
                insight: "Low drive outside the ovulatory window is common, but persistent changes are worth tracking.",
                confidence: Confidence::Low,
                archetype: None,
            },
            explanation_template: "Low libido was reported during the {phase} phase.",
            doctor_prompts: vec!["Could low testosterone explain my reduced drive?"],
        },
        Rule {
            rule_id: "thyroid_medication_check",
            category: RuleCategory::Metabolic,
            priority: 3,
            trigger: |input| {
                input.takes_medication("levothyroxine")
                    && input.has_any_symptom(&["fatigue", "brain_fog", "hair_loss", "cold_intolerance"])
            },
            effects: RuleEffects {
                status_adjustments: vec![(Thyroid, Strained)],
                state_adjustments: vec![],
                insight: "Ongoing hypothyroid-type symptoms while on thyroid medication may mean the dose needs review.",
                confidence: Confidence::Medium,
                archetype: None,
            },
            explanation_template: "You take thyroid medication and reported {symptoms}.",
            doctor_prompts: vec!["Is my thyroid medication dose still right for me?"],
        },
        Rule {
            rule_id: "perimenopause_window",
            category: RuleCategory::Reproductive,
            priority: 2,
            trigger: |input| {
                input.age >= 42 && input.has_any_symptom(&["hot_flashes", "night_sweats"])
            },
            effects: RuleEffects {
                status_adjustments: vec![(Estrogen, Fluctuating)],
                state_adjustments: vec![("sleep", -1)],
                insight: "Hot flashes or night sweats in your 40s can signal estrogen starting to fluctuate.",
                confidence: Confidence::Low,
                archetype: None,
            },
            explanation_template: "You reported {symptoms}.",
            doctor_prompts: vec!["Could these symptoms be early perimenopause?"],
        },
    ];

    RuleCatalog { rules }
}

impl RuleCatalog {
    /// Validate the catalog for consistency
    ///
    /// Returns a list of validation errors, or empty Vec if valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let mut seen_ids = HashSet::new();

        for rule in &self.rules {
            if rule.rule_id.is_empty() {
                errors.push("Rule has empty ID".to_string());
            } else if !seen_ids.insert(rule.rule_id) {
                errors.push(format!("Duplicate rule ID '{}'", rule.rule_id));
            }

            if rule.effects.insight.is_empty() {
                errors.push(format!("Rule '{}' has empty insight", rule.rule_id));
            }

            if rule.effects.status_adjustments.is_empty()
                && rule.effects.archetype.is_none()
                && rule.doctor_prompts.is_empty()
            {
                errors.push(format!("Rule '{}' has no effect", rule.rule_id));
            }

            let mut adjusted = HashSet::new();
            for (hormone, _) in &rule.effects.status_adjustments {
                if !adjusted.insert(*hormone) {
                    errors.push(format!(
                        "Rule '{}' adjusts {} more than once",
                        rule.rule_id, hormone
                    ));
                }
            }

            for placeholder in placeholders(rule.explanation_template) {
                if !TEMPLATE_PLACEHOLDERS.contains(&placeholder) {
                    errors.push(format!(
                        "Rule '{}' uses unknown placeholder '{{{}}}'",
                        rule.rule_id, placeholder
                    ));
                }
            }
        }

        errors
    }

    /// Validate and fail with `Error::Catalog` listing every problem
    pub fn check(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            return Ok(());
        }
        for error in &errors {
            tracing::error!("Catalog validation: {}", error);
        }
        Err(Error::Catalog(errors.join("; ")))
    }

    /// Look up a rule by id
    pub fn rule(&self, rule_id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.rule_id == rule_id)
    }

    /// Position of a rule in evaluation order
    pub fn position(&self, rule_id: &str) -> Option<usize> {
        self.rules.iter().position(|r| r.rule_id == rule_id)
    }
}

/// Names inside `{...}` in a template
fn placeholders(template: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                names.push(&after[..end]);
                rest = &after[end + 1..];
            }
            None => break,
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_validates() {
        let catalog = build_default_catalog();
        let errors = catalog.validate();
        assert!(
            errors.is_empty(),
            "Default catalog has validation errors: {:?}",
            errors
        );
    }

    #[test]
    fn test_cached_catalog_matches_built() {
        assert_eq!(
            get_default_catalog().rules.len(),
            build_default_catalog().rules.len()
        );
    }

    #[test]
    fn test_storm_is_declared_after_radiance() {
        let catalog = get_default_catalog();
        let radiance = catalog.position("ovulatory_radiance").unwrap();
        let storm = catalog.position("irritability_storm").unwrap();
        assert!(storm > radiance);
    }

    #[test]
    fn test_every_archetype_has_a_rule() {
        let catalog = get_default_catalog();
        for archetype in crate::archetype::all() {
            assert!(
                catalog
                    .rules
                    .iter()
                    .any(|r| r.effects.archetype.map(|a| a.id) == Some(archetype.id)),
                "no rule selects {:?}",
                archetype.id
            );
        }
    }

    #[test]
    fn test_validate_reports_problems() {
        let mut catalog = build_default_catalog();
        let mut duplicate = catalog.rules[0].clone();
        duplicate.explanation_template = "On {weekday} you felt off.";
        catalog.rules.push(duplicate);

        let mut inert = catalog.rules[1].clone();
        inert.rule_id = "inert";
        inert.effects.status_adjustments.clear();
        inert.effects.archetype = None;
        inert.doctor_prompts.clear();
        catalog.rules.push(inert);

        let errors = catalog.validate();
        assert!(errors.iter().any(|e| e.contains("Duplicate rule ID")));
        assert!(errors.iter().any(|e| e.contains("{weekday}")));
        assert!(errors.iter().any(|e| e.contains("'inert' has no effect")));

        match catalog.check() {
            Err(Error::Catalog(message)) => assert!(message.contains("Duplicate rule ID")),
            other => panic!("expected a catalog error, got {:?}", other),
        }
    }

    #[test]
    fn test_default_catalog_passes_check() {
        assert!(get_default_catalog().check().is_ok());
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(
            placeholders("Day {cycleDay} of {cycleLength}"),
            vec!["cycleDay", "cycleLength"]
        );
        assert!(placeholders("no braces").is_empty());
        assert!(placeholders("dangling {open").is_empty());
    }
}
