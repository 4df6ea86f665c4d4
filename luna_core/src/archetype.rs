//! Symptom archetypes: the single dominant felt-state tag a rule pass can
//! select.

use serde::{Deserialize, Serialize};

/// Identifier of a configured archetype
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchetypeId {
    Fog,
    Radiance,
    Storm,
    Anchor,
}

/// Named, colored, iconified archetype
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SymptomArchetype {
    pub id: ArchetypeId,
    pub name: &'static str,
    pub color: &'static str,
    pub icon: &'static str,
    pub description: &'static str,
}

pub static FOG: SymptomArchetype = SymptomArchetype {
    id: ArchetypeId::Fog,
    name: "The Fog",
    color: "#94A3B8",
    icon: "cloud",
    description: "Low energy and muddled focus; the body is asking for less.",
};

pub static RADIANCE: SymptomArchetype = SymptomArchetype {
    id: ArchetypeId::Radiance,
    name: "The Radiance",
    color: "#F59E0B",
    icon: "sun",
    description: "Energy, confidence and social ease near their monthly high.",
};

pub static STORM: SymptomArchetype = SymptomArchetype {
    id: ArchetypeId::Storm,
    name: "The Storm",
    color: "#7C3AED",
    icon: "zap",
    description: "Heightened reactivity with irritability and worry close to the surface.",
};

pub static ANCHOR: SymptomArchetype = SymptomArchetype {
    id: ArchetypeId::Anchor,
    name: "The Anchor",
    color: "#B91C1C",
    icon: "anchor",
    description: "A grounded, inward phase suited to rest and reflection.",
};

/// All configured archetypes
pub fn all() -> [&'static SymptomArchetype; 4] {
    [&FOG, &RADIANCE, &STORM, &ANCHOR]
}

/// Look up an archetype by id
pub fn by_id(id: ArchetypeId) -> &'static SymptomArchetype {
    match id {
        ArchetypeId::Fog => &FOG,
        ArchetypeId::Radiance => &RADIANCE,
        ArchetypeId::Storm => &STORM,
        ArchetypeId::Anchor => &ANCHOR,
    }
}
