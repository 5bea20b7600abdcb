use super::{Rule, RuleContext, RuleFamily};
use crate::logic::calculations::round1;
use crate::models::{Finding, NutrientLevels, PhClass, Priority};
use serde_json::{Map, Value};

/// Severely acidic soil. Below this no variety's ideal band matters.
const SEVERE_ACIDITY_PH: f64 = 4.5;
const ALKALINE_PH: f64 = 7.0;

/// Measured nutrients and their class, attached to soil findings.
fn with_nutrients(finding: Finding, nutrients: &NutrientLevels) -> Finding {
    let classes: Map<String, Value> = nutrients
        .classes()
        .into_iter()
        .map(|(nutrient, class)| (nutrient.as_str().to_string(), class.as_str().into()))
        .collect();
    if classes.is_empty() {
        finding
    } else {
        finding.with_param("nutrients", classes)
    }
}

/// pH correction rule
///
/// Conditions, first match wins:
/// - pH < 4.5: alta, urgent liming
/// - pH below the variety's ideal minimum: media, liming
/// - pH > 7.0: media, alkaline soil
pub struct SoilPhRule;

impl Rule for SoilPhRule {
    fn id(&self) -> &'static str {
        "soil_ph"
    }

    fn name(&self) -> &'static str {
        "Soil pH Correction"
    }

    fn family(&self) -> RuleFamily {
        RuleFamily::Soil
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<Finding> {
        let soil = ctx.soil?;
        let ph = soil.ph?;
        let ideal = ctx.variety.ideal_ph;

        let finding = if ph < SEVERE_ACIDITY_PH {
            Finding::new(
                "correcao_solo",
                Priority::Alta,
                "Severely acidic soil, urgent liming",
                format!(
                    "Soil pH ({}) is far too low for coffee. Very acidic soil impairs nutrient uptake.",
                    ph
                ),
            )
            .with_action(
                "Apply dolomitic limestone at 2-3 t/ha. Repeat the soil analysis in 60 days.",
            )
            .with_rationale("pH < 4.5 - soil too acidic for coffee")
        } else if ph < ideal.min {
            Finding::new(
                "correcao_solo",
                Priority::Media,
                "pH correction recommended",
                format!(
                    "Soil pH ({}) is below the ideal for {}. It may limit yield.",
                    ph, ctx.variety_key
                ),
            )
            .with_action("Apply limestone at 1-2 t/ha according to a full soil analysis.")
            .with_rationale(format!("pH below the ideal for {}", ctx.variety_key))
        } else if ph > ALKALINE_PH {
            Finding::new(
                "correcao_solo",
                Priority::Media,
                "Alkaline soil, reduced micronutrient availability",
                format!(
                    "Soil pH ({}) is high. Alkaline soil reduces micronutrient availability.",
                    ph
                ),
            )
            .with_action(
                "Apply ammonium sulfate or elemental sulfur. Consider foliar micronutrient feeding.",
            )
            .with_rationale("pH > 7.0 - alkaline soil limits Fe, Mn and Zn uptake")
        } else {
            return None;
        };

        let finding = finding
            .with_param("ph", round1(ph))
            .with_param("ph_class", PhClass::classify(ph).as_str())
            .with_param("ideal_ph", ideal.to_string());
        Some(with_nutrients(finding, &soil.nutrients))
    }
}

/// Sandy soil management, independent of pH.
pub struct SandySoilRule;

impl Rule for SandySoilRule {
    fn id(&self) -> &'static str {
        "sandy_soil"
    }

    fn name(&self) -> &'static str {
        "Sandy Soil Management"
    }

    fn family(&self) -> RuleFamily {
        RuleFamily::Soil
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<Finding> {
        let soil = ctx.soil?;
        let texture = soil.texture?;
        if !texture.is_sandy() {
            return None;
        }

        let finding = Finding::new(
            "manejo_solo",
            Priority::Media,
            "Sandy-soil management",
            "Sandy soil drains quickly and holds few nutrients.",
        )
        .with_action("Irrigate and fertilize more often. Add organic matter to improve retention.")
        .with_rationale("Sandy soil needs more intensive management")
        .with_param("soil_type", texture.as_str());
        Some(with_nutrients(finding, &soil.nutrients))
    }
}
