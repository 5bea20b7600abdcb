use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhenologicalPhase {
    Repose,
    Sprouting,
    Flowering,
    GrainFill,
    Ripening,
}

impl PhenologicalPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhenologicalPhase::Repose => "repose",
            PhenologicalPhase::Sprouting => "sprouting",
            PhenologicalPhase::Flowering => "flowering",
            PhenologicalPhase::GrainFill => "grain_fill",
            PhenologicalPhase::Ripening => "ripening",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "repose" | "repouso" => Some(PhenologicalPhase::Repose),
            "sprouting" | "brotacao" => Some(PhenologicalPhase::Sprouting),
            "flowering" | "floracao" => Some(PhenologicalPhase::Flowering),
            "grain_fill" | "grainfill" | "grain-fill" | "granacao" => {
                Some(PhenologicalPhase::GrainFill)
            }
            "ripening" | "maturacao" => Some(PhenologicalPhase::Ripening),
            _ => None,
        }
    }
}

impl std::fmt::Display for PhenologicalPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaterNeed {
    Minima,
    Baixa,
    Media,
    Alta,
}

impl WaterNeed {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaterNeed::Minima => "minima",
            WaterNeed::Baixa => "baixa",
            WaterNeed::Media => "media",
            WaterNeed::Alta => "alta",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PhaseEntry {
    pub phase: PhenologicalPhase,
    pub months: &'static [u32],
    pub water_need: WaterNeed,
    pub care: &'static str,
}

// Declaration order is the lookup order. Repose and ripening both claim May-July;
// the first match wins, so ripening is only reachable through an explicit override.
const CALENDAR: &[PhaseEntry] = &[
    PhaseEntry {
        phase: PhenologicalPhase::Repose,
        months: &[5, 6, 7, 8],
        water_need: WaterNeed::Minima,
        care: "Focus on pruning and pest control",
    },
    PhaseEntry {
        phase: PhenologicalPhase::Sprouting,
        months: &[9],
        water_need: WaterNeed::Media,
        care: "Moisture is essential for bud break",
    },
    PhaseEntry {
        phase: PhenologicalPhase::Flowering,
        months: &[10, 11, 12],
        water_need: WaterNeed::Alta,
        care: "Water is essential, avoid stress",
    },
    PhaseEntry {
        phase: PhenologicalPhase::GrainFill,
        months: &[1, 2, 3, 4],
        water_need: WaterNeed::Alta,
        care: "Balance between rain and sun",
    },
    PhaseEntry {
        phase: PhenologicalPhase::Ripening,
        months: &[5, 6, 7],
        water_need: WaterNeed::Baixa,
        care: "Dry weather is favorable",
    },
];

/// Month to phenological phase lookup.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhenologyCalendar;

impl PhenologyCalendar {
    pub fn new() -> Self {
        Self
    }

    /// First-match lookup over the calendar in declaration order. `month` is 1-12.
    pub fn phase_for_month(&self, month: u32) -> PhenologicalPhase {
        CALENDAR
            .iter()
            .find(|entry| entry.months.contains(&month))
            .map(|entry| entry.phase)
            .unwrap_or(PhenologicalPhase::Repose)
    }

    /// Explicit override from the plantation record wins over the calendar.
    pub fn resolve(&self, explicit: Option<PhenologicalPhase>, month: u32) -> PhenologicalPhase {
        explicit.unwrap_or_else(|| self.phase_for_month(month))
    }

    pub fn entry(&self, phase: PhenologicalPhase) -> &'static PhaseEntry {
        CALENDAR
            .iter()
            .find(|entry| entry.phase == phase)
            .unwrap_or(&CALENDAR[0])
    }

    pub fn water_need(&self, phase: PhenologicalPhase) -> WaterNeed {
        self.entry(phase).water_need
    }
}
