use super::calculations::round1;
use crate::models::{Finding, ForecastDay, PhenologicalPhase, Priority, VarietyProfile};

const FROST_TEMP_C: f64 = 5.0;
const HEAT_TEMP_C: f64 = 35.0;
const HEAT_HUMIDITY_PERCENT: f64 = 40.0;
const HEAVY_RAIN_MM: f64 = 50.0;
const DRY_SPELL_DAYS: usize = 3;
const DRY_SPELL_MM: f64 = 5.0;

/// Scans a five-day forecast and raises predictive risk alerts.
///
/// Every day is checked independently. The dry-spell check runs from the
/// third day on over a trailing three-day window, so one dry spell can raise
/// up to three alerts.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForecastRiskAnalyzer;

impl ForecastRiskAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Alerts sorted by priority (highest first), then by lead time.
    pub fn analyze(
        &self,
        days: &[ForecastDay],
        variety: &VarietyProfile,
        phase: PhenologicalPhase,
    ) -> Vec<Finding> {
        let mut alerts = Vec::new();

        for (index, day) in days.iter().enumerate() {
            let lead = index as u32 + 1;

            if day.temp_min_c <= FROST_TEMP_C {
                alerts.push(frost_alert(day, lead, variety));
            }
            if day.temp_max_c >= HEAT_TEMP_C && day.humidity_percent < HEAT_HUMIDITY_PERCENT {
                alerts.push(heat_alert(day, lead, variety));
            }
            if day.precipitation_mm >= HEAVY_RAIN_MM {
                alerts.push(heavy_rain_alert(day, lead, phase));
            }
            if index + 1 >= DRY_SPELL_DAYS {
                let window = &days[index + 1 - DRY_SPELL_DAYS..=index];
                let total: f64 = window.iter().map(|d| d.precipitation_mm).sum();
                if total < DRY_SPELL_MM {
                    alerts.push(dry_spell_alert(day, lead, total, variety));
                }
            }
            if (22.0..=25.0).contains(&day.temp_mean_c)
                && day.humidity_percent >= 80.0
                && day.precipitation_mm > 0.0
            {
                alerts.push(rust_alert(day, lead, variety));
            }
        }

        alerts.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.lead_time().cmp(&b.lead_time()))
        });
        alerts
    }
}

fn in_days(lead: u32) -> String {
    if lead == 1 {
        "in 1 day".to_string()
    } else {
        format!("in {} days", lead)
    }
}

fn is_imminent(lead: u32) -> bool {
    lead <= 1
}

fn frost_alert(day: &ForecastDay, lead: u32, variety: &VarietyProfile) -> Finding {
    let action = if is_imminent(lead) {
        "IMMEDIATE ACTION: Cover young plants with thermal blankets or plastic. \
         Irrigate the soil 1-2 hours before dawn to release heat. \
         Light smoke barriers in the plantation where permitted. \
         Monitor temperature through the night."
    } else {
        "PREPARATION: Cover young plants with thermal blankets or plastic. \
         Irrigate the soil 1-2 hours before dawn to release heat. \
         Check protective equipment."
    };

    Finding::new(
        "risco_geada",
        Priority::Urgente,
        format!("Frost risk {}", in_days(lead)),
        format!(
            "Forecast minimum temperature: {}°C. High risk of frost damage to coffee trees.",
            day.temp_min_c
        ),
    )
    .with_action(action)
    .with_rationale("Forecast minimum <= 5°C")
    .with_param("temp_min", day.temp_min_c)
    .with_param("lead_time_days", lead)
    .with_param("variety", variety.key)
    .with_forecast(lead, day.date)
}

fn heat_alert(day: &ForecastDay, lead: u32, variety: &VarietyProfile) -> Finding {
    let action = if is_imminent(lead) {
        "IMMEDIATE ACTION: Increase irrigation to twice a day. \
         Irrigate early in the morning and late in the afternoon. \
         Check the mulch layer to conserve moisture."
    } else {
        "PREPARATION: Increase irrigation to twice a day. \
         Irrigate early in the morning and late in the afternoon. \
         Plan intensive irrigation."
    };

    Finding::new(
        "risco_estresse_termico",
        Priority::Alta,
        format!("Thermal stress {}", in_days(lead)),
        format!(
            "Maximum temperature: {}°C, humidity: {}%. Stress conditions for coffee trees.",
            day.temp_max_c, day.humidity_percent
        ),
    )
    .with_action(action)
    .with_rationale("Forecast maximum >= 35°C with humidity < 40%")
    .with_param("temp_max", day.temp_max_c)
    .with_param("humidity", day.humidity_percent)
    .with_param("lead_time_days", lead)
    .with_param("variety", variety.key)
    .with_forecast(lead, day.date)
}

fn heavy_rain_alert(day: &ForecastDay, lead: u32, phase: PhenologicalPhase) -> Finding {
    let specific = match phase {
        PhenologicalPhase::Flowering => {
            "Rain during flowering can impair pollination. Check drainage and keep traffic out of the plantation."
        }
        PhenologicalPhase::GrainFill => {
            "Excess water during grain fill can split the fruit. Improve drainage."
        }
        PhenologicalPhase::Ripening => {
            "Rain during ripening hurts quality. Bring the harvest forward if fruit is ripe."
        }
        _ => {
            "Check the drainage system. Avoid foliar applications. Watch for signs of fungal disease."
        }
    };
    let action = if is_imminent(lead) {
        format!("IMMEDIATE ACTION: {} Prepare the drainage system.", specific)
    } else {
        format!("PREPARATION: {}", specific)
    };

    Finding::new(
        "risco_chuva_excessiva",
        Priority::Media,
        format!("Heavy rain {}", in_days(lead)),
        format!(
            "Forecast precipitation: {}mm. Risk of waterlogging and fungal disease.",
            day.precipitation_mm
        ),
    )
    .with_action(action)
    .with_rationale("Forecast precipitation >= 50mm/day")
    .with_param("precipitation", day.precipitation_mm)
    .with_param("lead_time_days", lead)
    .with_param("phase", phase.as_str())
    .with_forecast(lead, day.date)
}

fn dry_spell_alert(day: &ForecastDay, lead: u32, total: f64, variety: &VarietyProfile) -> Finding {
    Finding::new(
        "risco_seca",
        Priority::Media,
        "Prolonged dry spell",
        format!(
            "Only {:.1}mm forecast over 3 days. Risk of water deficit.",
            total
        ),
    )
    .with_action(
        "Schedule intensive irrigation. Check the irrigation system. \
         Apply mulch. Check soil moisture daily.",
    )
    .with_rationale("Less than 5mm forecast over 3 consecutive days")
    .with_param("precipitation_3d", round1(total))
    .with_param("lead_time_days", lead)
    .with_param("variety", variety.key)
    .with_forecast(lead, day.date)
}

fn rust_alert(day: &ForecastDay, lead: u32, variety: &VarietyProfile) -> Finding {
    let action = if is_imminent(lead) {
        "IMMEDIATE ACTION: Apply preventive fungicide (triazole or strobilurin). \
         Inspect leaves for first symptoms."
    } else {
        "PREPARATION: Check fungicide stock. Schedule a preventive application. \
         Inspect the plantation."
    };

    Finding::new(
        "risco_ferrugem",
        Priority::Alta,
        format!("Rust-favorable conditions {}", in_days(lead)),
        format!(
            "Temperature {}°C, humidity {}%, with rain. Ideal conditions for Hemileia vastatrix.",
            day.temp_mean_c, day.humidity_percent
        ),
    )
    .with_action(action)
    .with_rationale("22-25°C mean, humidity >= 80% and rain")
    .with_param("temp_mean", day.temp_mean_c)
    .with_param("humidity", day.humidity_percent)
    .with_param("lead_time_days", lead)
    .with_param("variety", variety.key)
    .with_forecast(lead, day.date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ForecastOrigin, VarietyKnowledgeBase};
    use chrono::{Duration, NaiveDate};

    fn day(lead: u32, min: f64, max: f64, mean: f64, precip: f64, humidity: f64) -> ForecastDay {
        ForecastDay {
            date: NaiveDate::from_ymd_opt(2026, 10, 18).unwrap() + Duration::days(lead as i64),
            lead_time_days: lead,
            temp_min_c: min,
            temp_max_c: max,
            temp_mean_c: mean,
            precipitation_mm: precip,
            humidity_percent: humidity,
            wind_speed_ms: None,
            description: String::new(),
            origin: ForecastOrigin::Climatological,
        }
    }

    fn mild(lead: u32, precip: f64) -> ForecastDay {
        day(lead, 16.0, 28.0, 20.0, precip, 65.0)
    }

    fn analyze(days: &[ForecastDay], phase: PhenologicalPhase) -> Vec<Finding> {
        let kb = VarietyKnowledgeBase::new();
        ForecastRiskAnalyzer::new().analyze(days, kb.get("catuai").unwrap(), phase)
    }

    #[test]
    fn dry_week_raises_three_drought_alerts() {
        let days: Vec<_> = (1..=5).map(|l| mild(l, 0.0)).collect();
        let alerts = analyze(&days, PhenologicalPhase::Flowering);
        assert_eq!(alerts.len(), 3);
        let leads: Vec<_> = alerts.iter().map(|a| a.lead_time()).collect();
        assert_eq!(leads, vec![3, 4, 5]);
        for alert in &alerts {
            assert_eq!(alert.kind, "risco_seca");
            assert_eq!(alert.parameters["precipitation_3d"], serde_json::json!(0.0));
        }
    }

    #[test]
    fn rain_breaks_the_dry_spell_window() {
        let days = vec![
            mild(1, 0.0),
            mild(2, 0.0),
            mild(3, 6.0),
            mild(4, 0.0),
            mild(5, 0.0),
        ];
        let alerts = analyze(&days, PhenologicalPhase::Flowering);
        assert!(alerts.is_empty());
    }

    #[test]
    fn frost_at_threshold_with_lead_tiered_action() {
        let days = vec![
            day(1, 5.0, 18.0, 11.0, 10.0, 70.0),
            day(2, 4.0, 18.0, 11.0, 10.0, 70.0),
            mild(3, 10.0),
            mild(4, 10.0),
            mild(5, 10.0),
        ];
        let alerts = analyze(&days, PhenologicalPhase::Repose);
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].title, "Frost risk in 1 day");
        assert!(alerts[0].action.starts_with("IMMEDIATE ACTION"));
        assert_eq!(alerts[1].title, "Frost risk in 2 days");
        assert!(alerts[1].action.starts_with("PREPARATION"));
    }

    #[test]
    fn heat_needs_dry_air() {
        let humid = vec![day(1, 22.0, 36.0, 29.0, 10.0, 45.0)];
        assert!(analyze(&humid, PhenologicalPhase::Repose).is_empty());
        let dry = vec![day(1, 22.0, 36.0, 29.0, 10.0, 35.0)];
        let alerts = analyze(&dry, PhenologicalPhase::Repose);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, "risco_estresse_termico");
    }

    #[test]
    fn heavy_rain_action_depends_on_phase() {
        let days = vec![day(2, 16.0, 24.0, 20.0, 65.0, 90.0)];
        let ripening = analyze(&days, PhenologicalPhase::Ripening);
        assert!(ripening[0].action.contains("ripening"));
        let repose = analyze(&days, PhenologicalPhase::Repose);
        assert!(repose[0].action.contains("drainage system"));
        assert!(repose[0].action.starts_with("IMMEDIATE ACTION"));
    }

    #[test]
    fn rust_requires_rain() {
        let dry = vec![day(1, 20.0, 26.0, 23.0, 0.0, 85.0)];
        assert!(analyze(&dry, PhenologicalPhase::GrainFill).is_empty());
        let wet = vec![day(1, 20.0, 26.0, 23.0, 15.0, 85.0)];
        let alerts = analyze(&wet, PhenologicalPhase::GrainFill);
        assert_eq!(alerts[0].kind, "risco_ferrugem");
        assert_eq!(alerts[0].priority, Priority::Alta);
    }

    #[test]
    fn sorted_by_priority_then_lead_time() {
        let days = vec![
            day(1, 18.0, 28.0, 23.0, 2.0, 65.0),
            day(2, 22.0, 36.0, 29.0, 0.0, 35.0),
            day(3, 20.0, 26.0, 23.0, 15.0, 85.0),
            day(4, 16.0, 24.0, 20.0, 65.0, 90.0),
            day(5, 3.0, 15.0, 9.0, 0.0, 70.0),
        ];
        let alerts = analyze(&days, PhenologicalPhase::Flowering);
        let summary: Vec<_> = alerts
            .iter()
            .map(|a| (a.kind.as_str(), a.lead_time()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("risco_geada", 5),
                ("risco_estresse_termico", 2),
                ("risco_ferrugem", 3),
                ("risco_chuva_excessiva", 4),
            ]
        );
    }
}
