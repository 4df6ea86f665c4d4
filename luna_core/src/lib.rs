#![forbid(unsafe_code)]

//! Core domain model and derivation logic for Luna.
//!
//! This crate provides:
//! - Domain events and the append-only event store
//! - Projection of the event log into `SystemState`
//! - Cycle phase and rule engine input derivation
//! - The ordered rule catalog and the rule engine
//! - History views, export, configuration and logging

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod store;
pub mod state;
pub mod projector;
pub mod cycle;
pub mod physio;
pub mod archetype;
pub mod rules;
pub mod catalog;
pub mod engine;
pub mod history;
pub mod export;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use state::{LastCheckin, Medication, ProfileData, SubscriptionTier, SystemState};
pub use config::Config;
pub use store::{load_log_or_empty, EventStore, JsonFileStore, MemoryStore};
pub use projector::{project_state, IncrementalProjector};
pub use cycle::CyclePhase;
pub use physio::{PhysioInput, SymptomScope};
pub use archetype::{ArchetypeId, SymptomArchetype};
pub use rules::{
    Confidence, DoctorQuestion, HormoneId, HormoneStatus, Insight, Rule, RuleCategory,
    RuleOutput,
};
pub use catalog::{build_default_catalog, get_default_catalog, RuleCatalog};
pub use engine::{evaluate, run_rule_engine};
pub use export::ExportSnapshot;
