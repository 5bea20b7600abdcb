use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Tag stored with every recommendation so the producer can be audited later.
pub const ALGORITHM_VERSION: &str = "deterministic_coffee_v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Baixa,
    Media,
    Alta,
    Urgente,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Baixa => "baixa",
            Priority::Media => "media",
            Priority::Alta => "alta",
            Priority::Urgente => "urgente",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "baixa" => Some(Priority::Baixa),
            "media" => Some(Priority::Media),
            "alta" => Some(Priority::Alta),
            "urgente" => Some(Priority::Urgente),
            _ => None,
        }
    }

    /// Days from creation until the recommendation is due.
    pub fn due_in_days(&self) -> i64 {
        match self {
            Priority::Urgente => 1,
            Priority::Alta => 3,
            Priority::Media | Priority::Baixa => 7,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationStatus {
    #[default]
    Pendente,
    Concluida,
    Cancelada,
    Vencida,
}

impl RecommendationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationStatus::Pendente => "pendente",
            RecommendationStatus::Concluida => "concluida",
            RecommendationStatus::Cancelada => "cancelada",
            RecommendationStatus::Vencida => "vencida",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pendente" | "pending" => Some(RecommendationStatus::Pendente),
            "concluida" | "done" => Some(RecommendationStatus::Concluida),
            "cancelada" | "cancelled" => Some(RecommendationStatus::Cancelada),
            "vencida" | "expired" => Some(RecommendationStatus::Vencida),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecommendationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which pending recommendations hold back a new batch, and for how long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitClass {
    /// Any pending recommendation blocks general generation.
    General,
    /// Only pending predictive recommendations block predictive generation.
    Predictive,
}

impl RateLimitClass {
    pub fn window(&self) -> chrono::Duration {
        match self {
            RateLimitClass::General => chrono::Duration::hours(24),
            RateLimitClass::Predictive => chrono::Duration::hours(6),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitClass::General => "general",
            RateLimitClass::Predictive => "predictive",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastContext {
    pub lead_time_days: u32,
    pub event_date: NaiveDate,
}

/// What a rule or forecast alert reports, before it is scheduled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub kind: String,
    pub priority: Priority,
    pub title: String,
    pub description: String,
    pub action: String,
    pub rationale: String,
    pub parameters: Map<String, Value>,
    pub forecast: Option<ForecastContext>,
}

impl Finding {
    pub fn new(
        kind: impl Into<String>,
        priority: Priority,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            priority,
            title: title.into(),
            description: description.into(),
            action: String::new(),
            rationale: String::new(),
            parameters: Map::new(),
            forecast: None,
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = rationale.into();
        self
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }

    pub fn with_forecast(mut self, lead_time_days: u32, event_date: NaiveDate) -> Self {
        self.forecast = Some(ForecastContext {
            lead_time_days,
            event_date,
        });
        self
    }

    /// Non-predictive findings sort as if they were due today.
    pub fn lead_time(&self) -> u32 {
        self.forecast.map(|f| f.lead_time_days).unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub recommended_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParametersUsed {
    pub algorithm_version: String,
    pub rationale: String,
    pub parameters: Map<String, Value>,
}

/// A scheduled, persisted recommendation. Serializes to the output schema
/// consumed by the dashboard (camelCase keys, `type` for the kind tag).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub id: Option<i64>,
    pub plantation_id: i64,
    pub owner_id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub priority: Priority,
    pub title: String,
    pub description: String,
    pub recommended_action: String,
    pub schedule: Schedule,
    pub status: RecommendationStatus,
    pub parameters_used: ParametersUsed,
    pub created_at: DateTime<Utc>,
    pub predictive: bool,
}
