use super::{Rule, RuleContext, RuleFamily};
use crate::logic::calculations::round1;
use crate::models::{Finding, PhenologicalPhase, PhenologyCalendar, Priority};

/// Weekly rainfall below which sprouting and flowering need irrigation.
const PHASE_RAIN_NEED_MM: f64 = 25.0;

fn water_need(phase: PhenologicalPhase) -> &'static str {
    PhenologyCalendar::new().water_need(phase).as_str()
}

/// Repose - cultural maintenance. Fires whenever the plantation is in repose.
pub struct ReposeMaintenanceRule;

impl Rule for ReposeMaintenanceRule {
    fn id(&self) -> &'static str {
        "repose_maintenance"
    }

    fn name(&self) -> &'static str {
        "Repose Cultural Maintenance"
    }

    fn family(&self) -> RuleFamily {
        RuleFamily::Phase
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<Finding> {
        if ctx.phase != PhenologicalPhase::Repose {
            return None;
        }

        Some(
            Finding::new(
                "manejo_cultural",
                Priority::Baixa,
                "Repose phase - cultural maintenance",
                "Good time for cultural practices and plantation upkeep.",
            )
            .with_action("Prune where needed, control weeds, service equipment.")
            .with_rationale("Vegetative repose - focus on cultural practices")
            .with_param("phase", ctx.phase.as_str())
            .with_param("water_need", water_need(ctx.phase)),
        )
    }
}

/// Sprouting with less than 25mm of weekly rain.
pub struct SproutingIrrigationRule;

impl Rule for SproutingIrrigationRule {
    fn id(&self) -> &'static str {
        "sprouting_irrigation"
    }

    fn name(&self) -> &'static str {
        "Sprouting Irrigation"
    }

    fn family(&self) -> RuleFamily {
        RuleFamily::Phase
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<Finding> {
        if ctx.phase != PhenologicalPhase::Sprouting {
            return None;
        }
        let precip = ctx.climate.precipitation_total_mm?;
        if precip >= PHASE_RAIN_NEED_MM {
            return None;
        }

        Some(
            Finding::new(
                "irrigacao",
                Priority::Alta,
                "Irrigation essential for sprouting",
                "Sprouting needs adequate moisture for bud development.",
            )
            .with_action("Irrigate 15-20mm. Keep the soil moist but not waterlogged.")
            .with_rationale("Sprouting and rainfall < 25mm/week")
            .with_param("phase", ctx.phase.as_str())
            .with_param("water_need", water_need(ctx.phase))
            .with_param("weekly_precipitation", round1(precip)),
        )
    }
}

/// Flowering with less than 25mm of weekly rain. The most yield-critical
/// condition in the rule set.
pub struct FloweringIrrigationRule;

impl Rule for FloweringIrrigationRule {
    fn id(&self) -> &'static str {
        "flowering_irrigation"
    }

    fn name(&self) -> &'static str {
        "Flowering Irrigation"
    }

    fn family(&self) -> RuleFamily {
        RuleFamily::Phase
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<Finding> {
        if ctx.phase != PhenologicalPhase::Flowering {
            return None;
        }
        let precip = ctx.climate.precipitation_total_mm?;
        if precip >= PHASE_RAIN_NEED_MM {
            return None;
        }

        Some(
            Finding::new(
                "irrigacao",
                Priority::Urgente,
                "Mandatory irrigation during flowering",
                "Critical phase. A water deficit during flowering compromises the harvest.",
            )
            .with_action("Mandatory irrigation: 20-25mm. Top priority for this phase.")
            .with_rationale("Flowering and rainfall < 25mm/week - critical risk to the crop")
            .with_param("phase", ctx.phase.as_str())
            .with_param("water_need", water_need(ctx.phase))
            .with_param("weekly_precipitation", round1(precip)),
        )
    }
}

/// Grain fill with a weekly maximum above 30°C.
pub struct GrainFillHeatRule;

impl Rule for GrainFillHeatRule {
    fn id(&self) -> &'static str {
        "grain_fill_heat"
    }

    fn name(&self) -> &'static str {
        "Grain Fill Heat Protection"
    }

    fn family(&self) -> RuleFamily {
        RuleFamily::Phase
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<Finding> {
        if ctx.phase != PhenologicalPhase::GrainFill {
            return None;
        }
        let temp_max = ctx.climate.temp_max_c?;
        if temp_max <= 30.0 {
            return None;
        }

        Some(
            Finding::new(
                "irrigacao",
                Priority::Alta,
                "Heat protection during grain fill",
                "Grain filling under high temperature. Water and heat must be balanced.",
            )
            .with_action("Irrigate 15-20mm according to soil moisture, plus shading if available.")
            .with_rationale("Grain fill and temperature > 30°C")
            .with_param("phase", ctx.phase.as_str())
            .with_param("water_need", water_need(ctx.phase))
            .with_param("temp_max", round1(temp_max)),
        )
    }
}

/// Ripening with more than 50mm of weekly rain.
pub struct RipeningRainRule;

impl Rule for RipeningRainRule {
    fn id(&self) -> &'static str {
        "ripening_rain"
    }

    fn name(&self) -> &'static str {
        "Ripening Excess Rain"
    }

    fn family(&self) -> RuleFamily {
        RuleFamily::Phase
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<Finding> {
        if ctx.phase != PhenologicalPhase::Ripening {
            return None;
        }
        let precip = ctx.climate.precipitation_total_mm?;
        if precip <= 50.0 {
            return None;
        }

        Some(
            Finding::new(
                "alerta_qualidade",
                Priority::Media,
                "Excess rain during ripening, quality risk",
                "Heavy rain during ripening can hurt bean quality.",
            )
            .with_action("Hold irrigation. Improve drainage where possible. Bring the harvest forward if beans are ripe.")
            .with_rationale("Ripening and rainfall > 50mm/week - quality risk")
            .with_param("phase", ctx.phase.as_str())
            .with_param("water_need", water_need(ctx.phase))
            .with_param("weekly_precipitation", round1(precip)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::calculations::ClimateWindow;
    use crate::models::VarietyKnowledgeBase;

    fn eval(rule: &dyn Rule, phase: PhenologicalPhase, precip: f64, temp_max: f64) -> Option<Finding> {
        let kb = VarietyKnowledgeBase::new();
        let climate = ClimateWindow {
            observation_count: 7,
            temp_max_c: Some(temp_max),
            precipitation_total_mm: Some(precip),
            ..Default::default()
        };
        let ctx = RuleContext {
            variety_key: "catuai",
            variety: kb.get("catuai").unwrap(),
            phase,
            soil: None,
            climate: &climate,
        };
        rule.evaluate(&ctx)
    }

    #[test]
    fn repose_fires_unconditionally() {
        let f = eval(&ReposeMaintenanceRule, PhenologicalPhase::Repose, 100.0, 20.0).unwrap();
        assert_eq!(f.priority, Priority::Baixa);
        assert_eq!(f.parameters["water_need"], "minima");
        assert_eq!(f.kind, "manejo_cultural");
        assert!(eval(&ReposeMaintenanceRule, PhenologicalPhase::Flowering, 0.0, 20.0).is_none());
    }

    #[test]
    fn repose_fires_without_climate_data() {
        let kb = VarietyKnowledgeBase::new();
        let climate = ClimateWindow::default();
        let ctx = RuleContext {
            variety_key: "catuai",
            variety: kb.get("catuai").unwrap(),
            phase: PhenologicalPhase::Repose,
            soil: None,
            climate: &climate,
        };
        assert!(ReposeMaintenanceRule.evaluate(&ctx).is_some());
        assert!(FloweringIrrigationRule.evaluate(&ctx).is_none());
    }

    #[test]
    fn sprouting_needs_water() {
        let f = eval(&SproutingIrrigationRule, PhenologicalPhase::Sprouting, 10.0, 25.0).unwrap();
        assert_eq!(f.priority, Priority::Alta);
        assert!(eval(&SproutingIrrigationRule, PhenologicalPhase::Sprouting, 25.0, 25.0).is_none());
    }

    #[test]
    fn flowering_deficit_is_urgent() {
        let f = eval(&FloweringIrrigationRule, PhenologicalPhase::Flowering, 24.9, 25.0).unwrap();
        assert_eq!(f.priority, Priority::Urgente);
        assert_eq!(f.parameters["phase"], "flowering");
        assert_eq!(f.parameters["water_need"], "alta");
    }

    #[test]
    fn grain_fill_heat() {
        assert!(eval(&GrainFillHeatRule, PhenologicalPhase::GrainFill, 0.0, 30.0).is_none());
        let f = eval(&GrainFillHeatRule, PhenologicalPhase::GrainFill, 0.0, 31.0).unwrap();
        assert_eq!(f.priority, Priority::Alta);
    }

    #[test]
    fn ripening_excess_rain() {
        assert!(eval(&RipeningRainRule, PhenologicalPhase::Ripening, 50.0, 25.0).is_none());
        let f = eval(&RipeningRainRule, PhenologicalPhase::Ripening, 60.0, 25.0).unwrap();
        assert_eq!(f.kind, "alerta_qualidade");
        assert_eq!(f.priority, Priority::Media);
    }
}
