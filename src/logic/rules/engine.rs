use super::{
    climate::{ColdRiskRule, HeatStressRule, LowHumidityRule, RustConditionsRule, WaterDeficitRule},
    phase::{
        FloweringIrrigationRule, GrainFillHeatRule, ReposeMaintenanceRule, RipeningRainRule,
        SproutingIrrigationRule,
    },
    soil::{SandySoilRule, SoilPhRule},
    Rule, RuleContext, RuleFamily,
};
use crate::models::Finding;

pub struct RulesEngine {
    rules: Vec<Box<dyn Rule>>,
}

impl RulesEngine {
    /// All rule families, in soil, climate, phase order.
    pub fn new() -> Self {
        let mut rules = Self::soil_rules();
        rules.extend(Self::climate_rules());
        rules.extend(Self::phase_rules());
        Self { rules }
    }

    pub fn soil() -> Self {
        Self {
            rules: Self::soil_rules(),
        }
    }

    pub fn historical_climate() -> Self {
        Self {
            rules: Self::climate_rules(),
        }
    }

    pub fn phase() -> Self {
        Self {
            rules: Self::phase_rules(),
        }
    }

    fn soil_rules() -> Vec<Box<dyn Rule>> {
        vec![Box::new(SoilPhRule), Box::new(SandySoilRule)]
    }

    fn climate_rules() -> Vec<Box<dyn Rule>> {
        vec![
            Box::new(ColdRiskRule),
            Box::new(HeatStressRule),
            Box::new(WaterDeficitRule),
            Box::new(LowHumidityRule),
            Box::new(RustConditionsRule),
        ]
    }

    fn phase_rules() -> Vec<Box<dyn Rule>> {
        vec![
            Box::new(ReposeMaintenanceRule),
            Box::new(SproutingIrrigationRule),
            Box::new(FloweringIrrigationRule),
            Box::new(GrainFillHeatRule),
            Box::new(RipeningRainRule),
        ]
    }

    pub fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<Finding> {
        self.rules
            .iter()
            .filter_map(|rule| rule.evaluate(ctx))
            .collect()
    }

    /// (id, name, family) of every rule, in evaluation order.
    pub fn list_rules(&self) -> Vec<(&'static str, &'static str, RuleFamily)> {
        self.rules
            .iter()
            .map(|r| (r.id(), r.name(), r.family()))
            .collect()
    }
}

impl Default for RulesEngine {
    fn default() -> Self {
        Self::new()
    }
}
