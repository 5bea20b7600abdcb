use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Every forecast handed to the risk analyzer has exactly this many days.
pub const FORECAST_DAYS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastOrigin {
    Government,
    OpenWeatherMap,
    Climatological,
}

impl ForecastOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForecastOrigin::Government => "cptec_inpe",
            ForecastOrigin::OpenWeatherMap => "openweathermap",
            ForecastOrigin::Climatological => "climatological",
        }
    }
}

impl std::fmt::Display for ForecastOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One forecast day. `lead_time_days` is 1 for tomorrow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    pub date: NaiveDate,
    pub lead_time_days: u32,
    pub temp_min_c: f64,
    pub temp_max_c: f64,
    pub temp_mean_c: f64,
    pub precipitation_mm: f64,
    pub humidity_percent: f64,
    pub wind_speed_ms: Option<f64>,
    pub description: String,
    pub origin: ForecastOrigin,
}

impl ForecastDay {
    pub fn summary_for(precipitation_mm: f64, temp_max_c: f64) -> &'static str {
        if precipitation_mm > 50.0 {
            "Heavy rain"
        } else if precipitation_mm > 20.0 {
            "Moderate rain"
        } else if precipitation_mm > 5.0 {
            "Light rain"
        } else if temp_max_c > 35.0 {
            "Very hot and dry"
        } else if temp_max_c < 15.0 {
            "Cold"
        } else {
            "Stable weather"
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forecast {
    pub fetched_at: DateTime<Utc>,
    pub origin: ForecastOrigin,
    pub days: Vec<ForecastDay>,
}

impl Forecast {
    pub fn total_precipitation(&self) -> f64 {
        self.days.iter().map(|d| d.precipitation_mm).sum()
    }
}

/// Weather groups shared by the government and commercial feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum WeatherCondition {
    #[default]
    Clear,
    Cloudy,
    Showers,
    Rain,
    Storm,
    Other,
}

impl WeatherCondition {
    pub fn from_owm_id(id: u32) -> Self {
        match id {
            200..=232 => WeatherCondition::Storm,
            300..=321 => WeatherCondition::Showers,
            500..=531 => WeatherCondition::Rain,
            800 => WeatherCondition::Clear,
            801..=804 | 701..=781 => WeatherCondition::Cloudy,
            _ => WeatherCondition::Other,
        }
    }

    /// CPTEC/INPE weather codes (`<tempo>` element).
    pub fn from_cptec_code(code: &str) -> Self {
        match code.trim().to_lowercase().as_str() {
            "t" => WeatherCondition::Storm,
            "c" | "ch" | "ec" | "ci" | "cm" | "cn" | "ct" | "cv" | "in" => WeatherCondition::Rain,
            "pp" | "pt" | "pm" | "pc" | "pnt" | "np" | "psc" | "pcm" | "pct" | "pcn" | "npt"
            | "npn" | "ncn" | "nct" | "ncm" | "npm" | "npp" | "ppn" | "ppt" | "ppm" => {
                WeatherCondition::Showers
            }
            "n" | "e" | "pn" | "nv" | "vn" => WeatherCondition::Cloudy,
            "cl" | "ps" => WeatherCondition::Clear,
            _ => WeatherCondition::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WeatherCondition::Clear => "Clear",
            WeatherCondition::Cloudy => "Cloudy",
            WeatherCondition::Showers => "Showers",
            WeatherCondition::Rain => "Rain",
            WeatherCondition::Storm => "Storm",
            WeatherCondition::Other => "Other",
        }
    }

    /// Daily rainfall assumed when a feed only gives a condition code.
    pub fn estimated_precipitation_mm(&self) -> f64 {
        match self {
            WeatherCondition::Storm => 30.0,
            WeatherCondition::Rain => 15.0,
            WeatherCondition::Showers => 8.0,
            WeatherCondition::Cloudy => 1.0,
            WeatherCondition::Clear => 0.0,
            WeatherCondition::Other => 2.0,
        }
    }

    pub fn estimated_humidity_percent(&self) -> f64 {
        match self {
            WeatherCondition::Storm => 90.0,
            WeatherCondition::Rain => 85.0,
            WeatherCondition::Showers => 75.0,
            WeatherCondition::Cloudy => 70.0,
            WeatherCondition::Clear => 55.0,
            WeatherCondition::Other => 65.0,
        }
    }
}

impl std::fmt::Display for WeatherCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
