use super::ObservationArchive;
use crate::config::InmetConfig;
use crate::error::{CafeOpsError, Result};
use crate::logic::calculations::round1;
use crate::models::{ClimateObservation, Location, ObservationSource};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = concat!("cafeops/", env!("CARGO_PKG_VERSION"));
const DATE_FORMAT: &str = "%Y-%m-%d";

/// An automatic INMET station near a plantation.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherStation {
    pub code: String,
    pub name: String,
    pub state: Option<String>,
    pub location: Location,
    pub distance_km: f64,
}

// INMET sends most numbers as strings, some as numbers, missing ones as null.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InmetValue {
    Number(f64),
    Text(String),
}

impl InmetValue {
    fn as_f64(&self) -> Option<f64> {
        match self {
            InmetValue::Number(n) => Some(*n),
            InmetValue::Text(s) => s.trim().parse::<f64>().ok(),
        }
        .filter(|v| v.is_finite())
    }
}

fn reading(value: &Option<InmetValue>) -> Option<f64> {
    value.as_ref().and_then(InmetValue::as_f64)
}

#[derive(Debug, Deserialize)]
struct InmetStation {
    #[serde(rename = "CD_ESTACAO")]
    code: String,
    #[serde(rename = "DC_NOME", default)]
    name: Option<String>,
    #[serde(rename = "SG_ESTADO", default)]
    state: Option<String>,
    #[serde(rename = "VL_LATITUDE", default)]
    latitude: Option<InmetValue>,
    #[serde(rename = "VL_LONGITUDE", default)]
    longitude: Option<InmetValue>,
}

#[derive(Debug, Deserialize)]
struct InmetDailyRecord {
    #[serde(rename = "DT_MEDICAO")]
    date: String,
    #[serde(rename = "TEM_MAX", default)]
    temp_max: Option<InmetValue>,
    #[serde(rename = "TEM_MIN", default)]
    temp_min: Option<InmetValue>,
    #[serde(rename = "UMD_MAX", default)]
    humidity_max: Option<InmetValue>,
    #[serde(rename = "UMD_MIN", default)]
    humidity_min: Option<InmetValue>,
    #[serde(rename = "CHUVA", default)]
    rain: Option<InmetValue>,
    #[serde(rename = "VEN_VEL", default)]
    wind_speed: Option<InmetValue>,
}

/// INMET automatic-station REST API (apitempo).
pub struct InmetClient {
    client: reqwest::Client,
    base_url: String,
    search_radius_km: f64,
}

impl InmetClient {
    pub fn new(config: &InmetConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            search_radius_km: config.search_radius_km,
        })
    }

    async fn get(&self, url: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CafeOpsError::DataSourceUnavailable(format!("INMET: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(CafeOpsError::DataSourceUnavailable(format!(
                "INMET returned {}",
                status
            )));
        }

        let body = response.text().await.map_err(|e| {
            CafeOpsError::DataSourceUnavailable(format!("Failed to read INMET response: {}", e))
        })?;
        Ok(Some(body).filter(|b| !b.trim().is_empty()))
    }

    /// Closest automatic station within the search radius.
    pub async fn find_nearest_station(&self, location: &Location) -> Result<Option<WeatherStation>> {
        let url = format!("{}/estacoes/T", self.base_url);
        tracing::debug!(%url, "Requesting INMET station list");

        let Some(body) = self.get(&url).await? else {
            return Ok(None);
        };
        Ok(nearest_station(&body, location, self.search_radius_km)?)
    }

    /// Daily records for `station_code` between `start` and `end`.
    pub async fn fetch_daily(
        &self,
        station_code: &str,
        plantation_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ClimateObservation>> {
        let url = format!(
            "{}/estacao/diaria/{}/{}/{}",
            self.base_url,
            start.format(DATE_FORMAT),
            end.format(DATE_FORMAT),
            station_code
        );
        tracing::debug!(station_code, %start, %end, "Requesting INMET daily records");

        let Some(body) = self.get(&url).await? else {
            return Ok(Vec::new());
        };
        let observations = parse_daily(&body, plantation_id)?;

        tracing::debug!(
            station_code,
            count = observations.len(),
            "Fetched INMET daily records"
        );
        Ok(observations)
    }

    pub async fn test_connection(&self) -> Result<bool> {
        let url = format!("{}/estacoes/T", self.base_url);
        Ok(self.get(&url).await?.is_some())
    }
}

#[async_trait]
impl ObservationArchive for InmetClient {
    async fn nearest_station(&self, location: &Location) -> Result<Option<WeatherStation>> {
        self.find_nearest_station(location).await
    }

    async fn daily_observations(
        &self,
        station_code: &str,
        plantation_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ClimateObservation>> {
        self.fetch_daily(station_code, plantation_id, start, end)
            .await
    }
}

fn nearest_station(
    body: &str,
    location: &Location,
    radius_km: f64,
) -> serde_json::Result<Option<WeatherStation>> {
    let stations: Vec<InmetStation> = serde_json::from_str(body)?;

    let nearest = stations
        .into_iter()
        .filter_map(|s| {
            let station_location = Location::new(reading(&s.latitude)?, reading(&s.longitude)?);
            let distance_km = location.distance_km(&station_location);
            Some(WeatherStation {
                name: s.name.unwrap_or_else(|| s.code.clone()),
                code: s.code,
                state: s.state,
                location: station_location,
                distance_km,
            })
        })
        .filter(|s| s.distance_km <= radius_km)
        .min_by(|a, b| a.distance_km.total_cmp(&b.distance_km));

    Ok(nearest)
}

fn parse_daily(body: &str, plantation_id: i64) -> serde_json::Result<Vec<ClimateObservation>> {
    let records: Vec<InmetDailyRecord> = serde_json::from_str(body)?;

    Ok(records
        .iter()
        .filter_map(|record| {
            let date = NaiveDate::parse_from_str(record.date.trim(), DATE_FORMAT)
                .map_err(|e| {
                    tracing::debug!(date = %record.date, error = %e, "Skipping undated INMET record");
                })
                .ok()?;
            Some(to_observation(record, plantation_id, date))
        })
        .collect())
}

fn to_observation(
    record: &InmetDailyRecord,
    plantation_id: i64,
    date: NaiveDate,
) -> ClimateObservation {
    let temp_max = reading(&record.temp_max);
    let temp_min = reading(&record.temp_min);
    let humidity_max = reading(&record.humidity_max).filter(|h| (0.0..=100.0).contains(h));
    let humidity_min = reading(&record.humidity_min).filter(|h| (0.0..=100.0).contains(h));

    let mut obs = ClimateObservation::new(plantation_id, date, ObservationSource::Station);
    obs.temp_max_c = temp_max;
    obs.temp_min_c = temp_min;
    obs.temp_mean_c = temp_max.zip(temp_min).map(|(max, min)| round1((max + min) / 2.0));
    obs.humidity_mean_percent = humidity_max
        .zip(humidity_min)
        .map(|(max, min)| round1((max + min) / 2.0));
    obs.precipitation_mm = reading(&record.rain).filter(|p| *p >= 0.0);
    obs.wind_speed_ms = reading(&record.wind_speed).filter(|w| *w >= 0.0);
    obs
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATIONS: &str = r#"[
        {"CD_ESTACAO": "A001", "DC_NOME": "BRASILIA", "SG_ESTADO": "DF",
         "VL_LATITUDE": "-15.78944444", "VL_LONGITUDE": "-47.92583332"},
        {"CD_ESTACAO": "A509", "DC_NOME": "MONTE VERDE", "SG_ESTADO": "MG",
         "VL_LATITUDE": "-22.86166666", "VL_LONGITUDE": "-46.04333333"},
        {"CD_ESTACAO": "A531", "DC_NOME": "MARIA DA FE", "SG_ESTADO": "MG",
         "VL_LATITUDE": -22.31472221, "VL_LONGITUDE": -45.37305555},
        {"CD_ESTACAO": "A999", "DC_NOME": "SEM COORDENADAS", "SG_ESTADO": "MG",
         "VL_LATITUDE": null, "VL_LONGITUDE": null}
    ]"#;

    #[test]
    fn picks_the_closest_station_in_range() {
        // Sul de Minas, closer to Maria da Fé than to Monte Verde
        let farm = Location::new(-22.2, -45.3);
        let station = nearest_station(STATIONS, &farm, 100.0).unwrap().unwrap();
        assert_eq!(station.code, "A531");
        assert_eq!(station.name, "MARIA DA FE");
        assert_eq!(station.state.as_deref(), Some("MG"));
        assert!(station.distance_km < 20.0);
    }

    #[test]
    fn nothing_within_radius() {
        // Cerrado Mineiro, over 300 km from every listed station
        let farm = Location::new(-18.9, -46.9);
        assert!(nearest_station(STATIONS, &farm, 100.0).unwrap().is_none());
    }

    #[test]
    fn daily_record_mapping() {
        let body = r#"[
            {"DT_MEDICAO": "2026-10-15", "CD_ESTACAO": "A531",
             "TEM_MAX": "28.4", "TEM_MIN": "13.2", "UMD_MAX": "94", "UMD_MIN": "41",
             "CHUVA": "12.6", "VEN_VEL": "1.8"},
            {"DT_MEDICAO": "2026-10-16", "CD_ESTACAO": "A531",
             "TEM_MAX": null, "TEM_MIN": "11.0", "UMD_MAX": null, "UMD_MIN": null,
             "CHUVA": null, "VEN_VEL": null},
            {"DT_MEDICAO": "ontem", "TEM_MAX": "30"}
        ]"#;
        let obs = parse_daily(body, 4).unwrap();
        assert_eq!(obs.len(), 2);

        let first = &obs[0];
        assert_eq!(first.plantation_id, 4);
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2026, 10, 15).unwrap());
        assert_eq!(first.source, ObservationSource::Station);
        assert_eq!(first.temp_max_c, Some(28.4));
        assert_eq!(first.temp_mean_c, Some(20.8));
        assert_eq!(first.humidity_mean_percent, Some(67.5));
        assert_eq!(first.precipitation_mm, Some(12.6));
        assert_eq!(first.wind_speed_ms, Some(1.8));

        let second = &obs[1];
        assert_eq!(second.temp_min_c, Some(11.0));
        assert_eq!(second.temp_mean_c, None);
        assert_eq!(second.humidity_mean_percent, None);
        assert_eq!(second.precipitation_mm, None);
    }

    #[test]
    fn malformed_body_is_an_error() {
        assert!(parse_daily("<html>", 1).is_err());
        assert!(nearest_station("{}", &Location::new(-15.8, -47.9), 100.0).is_err());
    }
}
