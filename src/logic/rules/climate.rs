use super::{Rule, RuleContext, RuleFamily};
use crate::logic::calculations::round1;
use crate::models::{Finding, Priority, SpeciesClass};

/// Frost / cold-stress rule over the 7-day minimum temperature
///
/// - Arabica: tempMin < 12°C is urgente (frost risk)
/// - Robusta: tempMin < 18°C is alta (cold stress)
pub struct ColdRiskRule;

impl Rule for ColdRiskRule {
    fn id(&self) -> &'static str {
        "cold_risk"
    }

    fn name(&self) -> &'static str {
        "Frost and Cold Stress"
    }

    fn family(&self) -> RuleFamily {
        RuleFamily::Climate
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<Finding> {
        let temp_min = ctx.climate.temp_min_c?;
        let species = ctx.variety.species;

        let finding = match species {
            SpeciesClass::Arabica if temp_min < 12.0 => Finding::new(
                "alerta_climatico",
                Priority::Urgente,
                "ALERT: Frost risk",
                format!(
                    "Minimum temperature of {:.1}°C. Critical frost risk for arabica coffee.",
                    temp_min
                ),
            )
            .with_action(
                "Monitor temperature constantly. Prepare protection (covers, controlled burning). Avoid pruning.",
            )
            .with_rationale("Temperature < 12°C - frost risk for arabica"),
            SpeciesClass::Robusta if temp_min < 18.0 => Finding::new(
                "alerta_climatico",
                Priority::Alta,
                "Cold-stress risk",
                format!(
                    "Minimum temperature of {:.1}°C. Robusta coffee suffers at low temperatures.",
                    temp_min
                ),
            )
            .with_action("Monitor plants. Avoid excess irrigation. Consider mulching.")
            .with_rationale("Temperature < 18°C - stress for robusta"),
            _ => return None,
        };

        Some(
            finding
                .with_param("temp_min", round1(temp_min))
                .with_param("species", species.as_str()),
        )
    }
}

/// Heat stress over the 7-day maximum temperature
///
/// - Arabica: tempMax > 30°C, alta above 32°C else media
/// - Robusta: tempMax > 34°C, urgente above 36°C else alta
pub struct HeatStressRule;

impl Rule for HeatStressRule {
    fn id(&self) -> &'static str {
        "heat_stress"
    }

    fn name(&self) -> &'static str {
        "Heat Stress"
    }

    fn family(&self) -> RuleFamily {
        RuleFamily::Climate
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<Finding> {
        let temp_max = ctx.climate.temp_max_c?;
        let species = ctx.variety.species;

        let finding = match species {
            SpeciesClass::Arabica if temp_max > 30.0 => {
                let priority = if temp_max > 32.0 {
                    Priority::Alta
                } else {
                    Priority::Media
                };
                Finding::new(
                    "alerta_climatico",
                    priority,
                    "Heat stress - excessive heat",
                    format!(
                        "Maximum temperature of {:.1}°C. Arabica coffee is stressed by excessive heat.",
                        temp_max
                    ),
                )
                .with_action("Increase irrigation. Consider temporary shading. Apply mulch.")
                .with_rationale("Temperature > 30°C - heat stress for arabica")
            }
            SpeciesClass::Robusta if temp_max > 34.0 => {
                let priority = if temp_max > 36.0 {
                    Priority::Urgente
                } else {
                    Priority::Alta
                };
                Finding::new(
                    "alerta_climatico",
                    priority,
                    "Critical risk - extreme heat",
                    format!(
                        "Maximum temperature of {:.1}°C. Even robusta coffee suffers in this heat.",
                        temp_max
                    ),
                )
                .with_action("Emergency irrigation. Mandatory shading. Foliar spraying.")
                .with_rationale("Temperature > 34°C - critical risk for robusta")
            }
            _ => return None,
        };

        Some(
            finding
                .with_param("temp_max", round1(temp_max))
                .with_param("species", species.as_str()),
        )
    }
}

/// Weekly rainfall deficit
///
/// - < 10mm: alta, irrigate 20-25mm
/// - < 25mm: media, supplemental 10-15mm
pub struct WaterDeficitRule;

impl Rule for WaterDeficitRule {
    fn id(&self) -> &'static str {
        "water_deficit"
    }

    fn name(&self) -> &'static str {
        "Weekly Water Deficit"
    }

    fn family(&self) -> RuleFamily {
        RuleFamily::Climate
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<Finding> {
        let precip = ctx.climate.precipitation_total_mm?;

        let finding = if precip < 10.0 {
            Finding::new(
                "irrigacao",
                Priority::Alta,
                "Critical water deficit",
                format!(
                    "Only {:.1}mm of rain in the last 7 days. Severe water deficit.",
                    precip
                ),
            )
            .with_action("Irrigate now: 20-25mm. Check soil moisture daily.")
            .with_rationale("Rainfall < 10mm/week - critical deficit")
        } else if precip < 25.0 {
            Finding::new(
                "irrigacao",
                Priority::Media,
                "Supplemental irrigation",
                format!(
                    "{:.1}mm of rain in the last 7 days. Below what coffee needs.",
                    precip
                ),
            )
            .with_action("Supplemental irrigation recommended: 10-15mm. Assess soil moisture.")
            .with_rationale("Rainfall 10-25mm/week - attention")
        } else {
            return None;
        };

        Some(
            finding
                .with_param("weekly_precipitation", round1(precip))
                .with_param("deficit", round1(25.0 - precip)),
        )
    }
}

/// Low humidity causes flower and young fruit drop.
pub struct LowHumidityRule;

impl Rule for LowHumidityRule {
    fn id(&self) -> &'static str {
        "low_humidity"
    }

    fn name(&self) -> &'static str {
        "Flower Drop Risk"
    }

    fn family(&self) -> RuleFamily {
        RuleFamily::Climate
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<Finding> {
        let humidity = ctx.climate.humidity_mean_percent?;
        if humidity >= 40.0 {
            return None;
        }

        Some(
            Finding::new(
                "alerta_climatico",
                Priority::Media,
                "Low humidity - flower-drop risk",
                format!(
                    "Low relative humidity ({:.1}%). May cause flowers and young fruit to drop.",
                    humidity
                ),
            )
            .with_action(
                "Increase sprinkler irrigation if available. Keep mulch in place. Avoid weeding in the dry hours.",
            )
            .with_rationale("Humidity < 40% - flower/fruit drop risk")
            .with_param("humidity_mean", round1(humidity)),
        )
    }
}

/// Coffee leaf rust (Hemileia vastatrix) favorable conditions
///
/// 22°C <= mean temperature <= 25°C and mean humidity > 80%
pub struct RustConditionsRule;

impl Rule for RustConditionsRule {
    fn id(&self) -> &'static str {
        "rust_conditions"
    }

    fn name(&self) -> &'static str {
        "Rust-Favorable Conditions"
    }

    fn family(&self) -> RuleFamily {
        RuleFamily::Climate
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<Finding> {
        let humidity = ctx.climate.humidity_mean_percent?;
        let temp_mean = ctx.climate.temp_mean_c?;
        if humidity <= 80.0 || !(22.0..=25.0).contains(&temp_mean) {
            return None;
        }

        Some(
            Finding::new(
                "alerta_fitossanitario",
                Priority::Alta,
                "ALERT: Rust-favorable conditions",
                format!(
                    "High humidity ({:.1}%) and ideal temperature ({:.1}°C) for coffee leaf rust.",
                    humidity, temp_mean
                ),
            )
            .with_action(
                "Inspect leaves daily. Apply preventive fungicide if rust occurred before. Improve airflow.",
            )
            .with_rationale("Humidity > 80% and 22-25°C favor Hemileia vastatrix")
            .with_param("humidity_mean", round1(humidity))
            .with_param("temp_mean", round1(temp_mean)),
        )
    }
}
