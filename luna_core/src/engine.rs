//! Deterministic rule engine.
//!
//! ## Evaluation
//!
//! 1. Start with every baseline hormone `Balanced`.
//! 2. Walk the catalog in declaration order. For each rule whose trigger
//!    holds:
//!    - overwrite the status of every hormone it adjusts (last write wins)
//!    - append an insight
//!    - if it names an archetype, that archetype becomes the active one
//!    - append its doctor prompts as questions
//! 3. Drop repeated doctor questions by exact text, keeping the first.
//!
//! The pass is pure: identical input always yields identical output.

use crate::catalog::get_default_catalog;
use crate::physio::PhysioInput;
use crate::rules::{DoctorQuestion, Insight, Rule, RuleOutput};
use std::collections::HashSet;

/// Run the default catalog against `input`
pub fn run_rule_engine(input: &PhysioInput) -> RuleOutput {
    evaluate(&get_default_catalog().rules, input)
}

/// Evaluate `rules` in order against `input`
pub fn evaluate(rules: &[Rule], input: &PhysioInput) -> RuleOutput {
    let mut output = RuleOutput::default();
    let mut fired = 0usize;

    for rule in rules {
        if !(rule.trigger)(input) {
            continue;
        }
        fired += 1;
        tracing::debug!("Rule {} fired", rule.rule_id);

        for (hormone, status) in &rule.effects.status_adjustments {
            output.hormone_statuses.insert(*hormone, *status);
        }

        output.insights.push(Insight {
            rule_id: rule.rule_id.to_string(),
            category: rule.category,
            text: rule.effects.insight.to_string(),
            hormone_id: rule.primary_hormone(),
            confidence: rule.effects.confidence,
            priority: rule.priority,
            explanation: render_explanation(rule.explanation_template, input),
            state_adjustments: rule
                .effects
                .state_adjustments
                .iter()
                .map(|(metric, delta)| (metric.to_string(), *delta))
                .collect(),
        });

        if let Some(archetype) = rule.effects.archetype {
            output.archetype = Some(archetype.clone());
        }

        for (index, prompt) in rule.doctor_prompts.iter().enumerate() {
            output.doctor_questions.push(DoctorQuestion {
                id: format!("{}-q{}", rule.rule_id, index),
                question: prompt.to_string(),
                context: rule.effects.insight.to_string(),
            });
        }
    }

    let mut seen = HashSet::new();
    output
        .doctor_questions
        .retain(|q| seen.insert(q.question.clone()));

    tracing::debug!(
        "Rule pass complete: {} of {} rules fired, archetype {:?}",
        fired,
        rules.len(),
        output.archetype.as_ref().map(|a| a.id)
    );

    output
}

/// Fill a rule's explanation template from the input
pub fn render_explanation(template: &str, input: &PhysioInput) -> String {
    let symptoms = if input.symptoms.is_empty() {
        "no symptoms".to_string()
    } else {
        input
            .symptoms
            .iter()
            .map(|s| s.replace('_', " "))
            .collect::<Vec<_>>()
            .join(", ")
    };

    template
        .replace("{cycleDay}", &input.cycle_day.to_string())
        .replace("{cycleLength}", &input.cycle_length.to_string())
        .replace("{phase}", &input.phase().to_string())
        .replace("{symptoms}", &symptoms)
}
