use super::ForecastSource;
use crate::config::OpenWeatherMapConfig;
use crate::error::{CafeOpsError, Result};
use crate::logic::calculations::{maximum, mean, minimum, round1};
use crate::models::{ForecastDay, ForecastOrigin, Location, WeatherCondition};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate};
use serde::Deserialize;
use std::collections::BTreeMap;

const API_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

/// 3-hour slots a local day needs before its min and max are trusted.
/// The feed's first and last days are usually cut short.
const MIN_SLOTS_PER_DAY: usize = 6;

pub struct OpenWeatherMapClient {
    client: reqwest::Client,
    config: OpenWeatherMapConfig,
}

// OpenWeatherMap API response structures
#[derive(Debug, Deserialize)]
struct OwmForecastResponse {
    list: Vec<OwmForecastItem>,
    #[serde(default)]
    city: Option<OwmCity>,
}

#[derive(Debug, Deserialize)]
struct OwmForecastItem {
    dt: i64,
    main: OwmMain,
    #[serde(default)]
    weather: Vec<OwmWeather>,
    wind: OwmWind,
    #[serde(default)]
    rain: Option<OwmPrecipitation>,
    #[serde(default)]
    snow: Option<OwmPrecipitation>,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct OwmWeather {
    id: u32,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwmWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwmPrecipitation {
    #[serde(rename = "3h", default)]
    three_hour: f64,
}

#[derive(Debug, Deserialize)]
struct OwmCity {
    /// Offset from UTC in seconds.
    #[serde(default)]
    timezone: i64,
}

impl OpenWeatherMapClient {
    pub fn new(config: OpenWeatherMapConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Fetch the 5-day/3-hour forecast and fold it into daily figures.
    pub async fn fetch_forecast(&self, location: &Location) -> Result<Vec<ForecastDay>> {
        let url = format!(
            "{}/forecast?lat={}&lon={}&appid={}&units=metric",
            API_BASE_URL, location.latitude, location.longitude, self.config.api_key
        );

        let response =
            self.client.get(&url).send().await.map_err(|e| {
                CafeOpsError::DataSourceUnavailable(format!("OpenWeatherMap: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CafeOpsError::DataSourceUnavailable(format!(
                "OpenWeatherMap returned {}: {}",
                status, body
            )));
        }

        let owm_response: OwmForecastResponse = response.json().await.map_err(|e| {
            CafeOpsError::DataSourceUnavailable(format!(
                "Failed to parse OpenWeatherMap response: {}",
                e
            ))
        })?;

        Ok(aggregate_daily(&owm_response, MIN_SLOTS_PER_DAY))
    }

    /// Test connection to OpenWeatherMap API
    pub async fn test_connection(&self, location: &Location) -> Result<bool> {
        let url = format!(
            "{}/weather?lat={}&lon={}&appid={}&units=metric",
            API_BASE_URL, location.latitude, location.longitude, self.config.api_key
        );

        let response =
            self.client.get(&url).send().await.map_err(|e| {
                CafeOpsError::DataSourceUnavailable(format!("OpenWeatherMap: {}", e))
            })?;

        Ok(response.status().is_success())
    }
}

#[async_trait]
impl ForecastSource for OpenWeatherMapClient {
    fn name(&self) -> &'static str {
        "openweathermap"
    }

    async fn fetch(&self, location: &Location) -> Result<Vec<ForecastDay>> {
        self.fetch_forecast(location).await
    }
}

/// Group 3-hour slots by local calendar day, in date order. Days with
/// fewer than `min_slots` slots are dropped.
fn aggregate_daily(response: &OwmForecastResponse, min_slots: usize) -> Vec<ForecastDay> {
    let offset = Duration::seconds(response.city.as_ref().map(|c| c.timezone).unwrap_or(0));

    let mut by_date: BTreeMap<NaiveDate, Vec<&OwmForecastItem>> = BTreeMap::new();
    for item in &response.list {
        let Some(timestamp) = DateTime::from_timestamp(item.dt, 0) else {
            tracing::debug!(dt = item.dt, "Skipping OpenWeatherMap slot with bad timestamp");
            continue;
        };
        let local_date = (timestamp + offset).date_naive();
        by_date.entry(local_date).or_default().push(item);
    }

    by_date
        .into_iter()
        .filter(|(date, items)| {
            let complete = items.len() >= min_slots;
            if !complete {
                tracing::debug!(%date, slots = items.len(), "Dropping partial OpenWeatherMap day");
            }
            complete
        })
        .filter_map(|(date, items)| aggregate_day(date, &items))
        .collect()
}

fn aggregate_day(date: NaiveDate, items: &[&OwmForecastItem]) -> Option<ForecastDay> {
    let temp_min_c = minimum(items.iter().map(|i| i.main.temp))?;
    let temp_max_c = maximum(items.iter().map(|i| i.main.temp))?;
    let temp_mean_c = mean(items.iter().map(|i| i.main.temp))?;

    // Combine rain and snow precipitation
    let precipitation_mm: f64 = items
        .iter()
        .map(|i| {
            i.rain.as_ref().map(|r| r.three_hour).unwrap_or(0.0)
                + i.snow.as_ref().map(|s| s.three_hour).unwrap_or(0.0)
        })
        .sum();

    let humidity_percent = mean(items.iter().map(|i| i.main.humidity)).unwrap_or(0.0);
    let wind_speed_ms = mean(items.iter().map(|i| i.wind.speed));

    let description = items
        .first()
        .and_then(|i| i.weather.first())
        .map(|w| {
            if w.description.is_empty() {
                WeatherCondition::from_owm_id(w.id).as_str().to_string()
            } else {
                w.description.clone()
            }
        })
        .unwrap_or_else(|| ForecastDay::summary_for(precipitation_mm, temp_max_c).to_string());

    Some(ForecastDay {
        date,
        lead_time_days: 0,
        temp_min_c: round1(temp_min_c),
        temp_max_c: round1(temp_max_c),
        temp_mean_c: round1(temp_mean_c),
        precipitation_mm: round1(precipitation_mm),
        humidity_percent: humidity_percent.round(),
        wind_speed_ms: wind_speed_ms.map(round1),
        description,
        origin: ForecastOrigin::OpenWeatherMap,
    })
}
