pub mod climate;
pub mod engine;
pub mod phase;
pub mod soil;

pub use engine::RulesEngine;

use super::calculations::ClimateWindow;
use crate::models::{Finding, PhenologicalPhase, SoilSnapshot, VarietyProfile};

/// Rule families; each runs independently over the same snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleFamily {
    Soil,
    Climate,
    Phase,
}

impl RuleFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleFamily::Soil => "soil",
            RuleFamily::Climate => "climate",
            RuleFamily::Phase => "phase",
        }
    }
}

/// Everything a rule may look at for one plantation.
#[derive(Debug, Clone)]
pub struct RuleContext<'a> {
    pub variety_key: &'a str,
    pub variety: &'a VarietyProfile,
    pub phase: PhenologicalPhase,
    pub soil: Option<SoilSnapshot>,
    pub climate: &'a ClimateWindow,
}

/// Trait for agronomic rules
pub trait Rule: Send + Sync {
    /// Unique identifier for this rule
    fn id(&self) -> &'static str;

    /// Human-readable name
    fn name(&self) -> &'static str;

    fn family(&self) -> RuleFamily;

    /// Evaluate the rule and return a finding if conditions are met.
    /// Missing inputs mean the rule does not fire.
    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<Finding>;
}
