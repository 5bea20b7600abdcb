use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationSource {
    #[default]
    Manual,
    Station,
    Synthetic,
}

impl ObservationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObservationSource::Manual => "manual",
            ObservationSource::Station => "station",
            ObservationSource::Synthetic => "synthetic",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "manual" => Some(ObservationSource::Manual),
            "station" => Some(ObservationSource::Station),
            "synthetic" => Some(ObservationSource::Synthetic),
            _ => None,
        }
    }
}

impl std::fmt::Display for ObservationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One day of observed weather at a plantation. Any field may be missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimateObservation {
    pub id: Option<i64>,
    #[serde(default)]
    pub plantation_id: i64,
    pub date: NaiveDate,
    pub temp_max_c: Option<f64>,
    pub temp_min_c: Option<f64>,
    pub temp_mean_c: Option<f64>,
    pub humidity_mean_percent: Option<f64>,
    pub precipitation_mm: Option<f64>,
    pub wind_speed_ms: Option<f64>,
    #[serde(default)]
    pub source: ObservationSource,
}

impl ClimateObservation {
    pub fn new(plantation_id: i64, date: NaiveDate, source: ObservationSource) -> Self {
        Self {
            id: None,
            plantation_id,
            date,
            temp_max_c: None,
            temp_min_c: None,
            temp_mean_c: None,
            humidity_mean_percent: None,
            precipitation_mm: None,
            wind_speed_ms: None,
            source,
        }
    }

    pub fn with_temperatures(mut self, min: f64, mean: f64, max: f64) -> Self {
        self.temp_min_c = Some(min);
        self.temp_mean_c = Some(mean);
        self.temp_max_c = Some(max);
        self
    }

    pub fn with_humidity(mut self, humidity: f64) -> Self {
        self.humidity_mean_percent = Some(humidity);
        self
    }

    pub fn with_precipitation(mut self, mm: f64) -> Self {
        self.precipitation_mm = Some(mm);
        self
    }

    pub fn with_wind(mut self, speed_ms: f64) -> Self {
        self.wind_speed_ms = Some(speed_ms);
        self
    }

    /// Observations are daily; the day starts at midnight UTC.
    pub fn observed_at(&self) -> DateTime<Utc> {
        self.date.and_time(NaiveTime::MIN).and_utc()
    }

    pub fn is_older_than(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        now - self.observed_at() > max_age
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn staleness_uses_start_of_day() {
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
        let yesterday = ClimateObservation::new(
            1,
            NaiveDate::from_ymd_opt(2026, 10, 17).unwrap(),
            ObservationSource::Station,
        );
        let three_days_ago = ClimateObservation::new(
            1,
            NaiveDate::from_ymd_opt(2026, 10, 15).unwrap(),
            ObservationSource::Station,
        );
        assert!(!yesterday.is_older_than(Duration::hours(48), now));
        assert!(three_days_ago.is_older_than(Duration::hours(48), now));
    }

    #[test]
    fn missing_fields_deserialize_as_none() {
        let json = r#"{"id": null, "date": "2026-10-01", "temp_max_c": 31.0,
            "temp_min_c": null, "temp_mean_c": null, "humidity_mean_percent": null,
            "precipitation_mm": 0.0, "wind_speed_ms": null}"#;
        let obs: ClimateObservation = serde_json::from_str(json).unwrap();
        assert_eq!(obs.temp_max_c, Some(31.0));
        assert!(obs.temp_min_c.is_none());
        assert_eq!(obs.source, ObservationSource::Manual);
    }

    #[test]
    fn source_round_trips_through_str() {
        for source in [
            ObservationSource::Manual,
            ObservationSource::Station,
            ObservationSource::Synthetic,
        ] {
            assert_eq!(ObservationSource::from_str(source.as_str()), Some(source));
        }
    }
}
