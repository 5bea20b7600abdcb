use crate::error::{CafeOpsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeciesClass {
    Arabica,
    Robusta,
}

impl SpeciesClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpeciesClass::Arabica => "arabica",
            SpeciesClass::Robusta => "robusta",
        }
    }
}

impl std::fmt::Display for SpeciesClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeatTolerance {
    Baixa,
    Media,
    Alta,
}

/// Closed interval used for the ideal temperature and pH bands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub min: f64,
    pub max: f64,
}

impl Band {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

impl std::fmt::Display for Band {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VarietyProfile {
    pub key: &'static str,
    pub species: SpeciesClass,
    pub ideal_temperature_c: Band,
    pub ideal_ph: Band,
    pub heat_tolerance: HeatTolerance,
    pub characteristics: &'static str,
}

const VARIETIES: &[VarietyProfile] = &[
    VarietyProfile {
        key: "mundo_novo",
        species: SpeciesClass::Arabica,
        ideal_temperature_c: Band::new(18.0, 23.0),
        ideal_ph: Band::new(5.0, 6.0),
        heat_tolerance: HeatTolerance::Baixa,
        characteristics: "Does not tolerate excess heat",
    },
    VarietyProfile {
        key: "catuai",
        species: SpeciesClass::Arabica,
        ideal_temperature_c: Band::new(19.0, 24.0),
        ideal_ph: Band::new(5.0, 6.5),
        heat_tolerance: HeatTolerance::Media,
        characteristics: "Adapts well to different soils",
    },
    VarietyProfile {
        key: "bourbon",
        species: SpeciesClass::Arabica,
        ideal_temperature_c: Band::new(18.0, 22.0),
        ideal_ph: Band::new(5.0, 6.0),
        heat_tolerance: HeatTolerance::Baixa,
        characteristics: "More susceptible to pests",
    },
    VarietyProfile {
        key: "acaia",
        species: SpeciesClass::Arabica,
        ideal_temperature_c: Band::new(20.0, 25.0),
        ideal_ph: Band::new(5.0, 6.0),
        heat_tolerance: HeatTolerance::Media,
        characteristics: "Performs best in the Cerrado",
    },
    VarietyProfile {
        key: "conilon",
        species: SpeciesClass::Robusta,
        ideal_temperature_c: Band::new(22.0, 30.0),
        ideal_ph: Band::new(4.5, 6.0),
        heat_tolerance: HeatTolerance::Alta,
        characteristics: "Does not tolerate cold below 18°C",
    },
];

/// Per-variety agronomic thresholds, built once at startup and shared by reference.
#[derive(Debug, Clone)]
pub struct VarietyKnowledgeBase {
    varieties: HashMap<&'static str, VarietyProfile>,
}

impl VarietyKnowledgeBase {
    pub fn new() -> Self {
        let varieties = VARIETIES.iter().map(|v| (v.key, v.clone())).collect();
        Self { varieties }
    }

    pub fn get(&self, key: &str) -> Option<&VarietyProfile> {
        self.varieties.get(key.trim().to_lowercase().as_str())
    }

    /// Like [`get`](Self::get), but an unknown key is an error for the plantation.
    pub fn lookup(&self, key: &str) -> Result<&VarietyProfile> {
        self.get(key)
            .ok_or_else(|| CafeOpsError::UnknownVariety(key.to_string()))
    }

    pub fn keys(&self) -> Vec<&'static str> {
        let mut keys: Vec<_> = self.varieties.keys().copied().collect();
        keys.sort_unstable();
        keys
    }
}

impl Default for VarietyKnowledgeBase {
    fn default() -> Self {
        Self::new()
    }
}
