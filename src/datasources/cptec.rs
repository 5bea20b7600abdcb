use super::ForecastSource;
use crate::config::GovernmentSourceConfig;
use crate::error::{CafeOpsError, Result};
use crate::logic::calculations::round1;
use crate::models::{ForecastDay, ForecastOrigin, Location, WeatherCondition};
use async_trait::async_trait;
use chrono::NaiveDate;
use regex_lite::Regex;

#[derive(Debug, Clone, Copy)]
pub struct CptecCity {
    pub code: u32,
    pub name: &'static str,
    pub location: Location,
}

const CITIES: &[CptecCity] = &[
    CptecCity {
        code: 244,
        name: "São Paulo",
        location: Location {
            latitude: -23.5,
            longitude: -46.6,
        },
    },
    CptecCity {
        code: 218,
        name: "Belo Horizonte",
        location: Location {
            latitude: -19.9,
            longitude: -43.9,
        },
    },
    CptecCity {
        code: 139,
        name: "Brasília",
        location: Location {
            latitude: -15.8,
            longitude: -47.9,
        },
    },
];

/// Closest city in the CPTEC table by great-circle distance.
pub fn nearest_city(location: &Location) -> &'static CptecCity {
    let mut best = &CITIES[0];
    let mut best_distance = location.distance_km(&best.location);
    for city in &CITIES[1..] {
        let distance = location.distance_km(&city.location);
        if distance < best_distance {
            best = city;
            best_distance = distance;
        }
    }
    best
}

/// CPTEC/INPE seven-day city forecast (XML).
pub struct CptecClient {
    client: reqwest::Client,
    base_url: String,
}

impl CptecClient {
    pub fn new(config: &GovernmentSourceConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn fetch_city(&self, city: &CptecCity) -> Result<Vec<ForecastDay>> {
        let url = format!("{}/cidade/7dias/{}/previsao.xml", self.base_url, city.code);
        tracing::debug!(city = city.name, code = city.code, "Requesting CPTEC forecast");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CafeOpsError::DataSourceUnavailable(format!("CPTEC: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(CafeOpsError::DataSourceUnavailable(format!(
                "CPTEC returned {}",
                status
            )));
        }

        let body = response.text().await.map_err(|e| {
            CafeOpsError::DataSourceUnavailable(format!("Failed to read CPTEC response: {}", e))
        })?;

        parse_forecast(&body)
    }

    pub async fn test_connection(&self) -> Result<bool> {
        let city = &CITIES[0];
        let url = format!("{}/cidade/7dias/{}/previsao.xml", self.base_url, city.code);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CafeOpsError::DataSourceUnavailable(format!("CPTEC: {}", e)))?;
        Ok(response.status().is_success())
    }
}

#[async_trait]
impl ForecastSource for CptecClient {
    fn name(&self) -> &'static str {
        "cptec_inpe"
    }

    fn covers(&self, location: &Location) -> bool {
        location.is_in_brazil()
    }

    async fn fetch(&self, location: &Location) -> Result<Vec<ForecastDay>> {
        self.fetch_city(nearest_city(location)).await
    }
}

fn tag_value<'a>(re: &Regex, block: &'a str) -> Option<&'a str> {
    re.captures(block)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
}

/// Parse the `<previsao>` blocks of a city forecast. The feed has no rain or
/// humidity figures, so both are estimated from the weather code.
pub fn parse_forecast(xml: &str) -> Result<Vec<ForecastDay>> {
    let invalid = |e: regex_lite::Error| CafeOpsError::InvalidData(format!("CPTEC pattern: {}", e));
    let block_re = Regex::new(r"(?s)<previsao>(.*?)</previsao>").map_err(invalid)?;
    let day_re = Regex::new(r"<dia>([^<]*)</dia>").map_err(invalid)?;
    let code_re = Regex::new(r"<tempo>([^<]*)</tempo>").map_err(invalid)?;
    let max_re = Regex::new(r"<maxima>([^<]*)</maxima>").map_err(invalid)?;
    let min_re = Regex::new(r"<minima>([^<]*)</minima>").map_err(invalid)?;

    let mut days = Vec::new();
    for block in block_re.captures_iter(xml) {
        let Some(body) = block.get(1).map(|m| m.as_str()) else {
            continue;
        };

        let parsed = (|| {
            let date = NaiveDate::parse_from_str(tag_value(&day_re, body)?, "%Y-%m-%d").ok()?;
            let code = tag_value(&code_re, body).unwrap_or_default();
            let max: f64 = tag_value(&max_re, body)?.parse().ok()?;
            let min: f64 = tag_value(&min_re, body)?.parse().ok()?;
            Some((date, code, min, max))
        })();

        let Some((date, code, temp_min_c, temp_max_c)) = parsed else {
            tracing::debug!("Skipping malformed CPTEC <previsao> block");
            continue;
        };

        let condition = WeatherCondition::from_cptec_code(code);
        let precipitation_mm = condition.estimated_precipitation_mm();
        days.push(ForecastDay {
            date,
            lead_time_days: 0,
            temp_min_c,
            temp_max_c,
            temp_mean_c: round1((temp_min_c + temp_max_c) / 2.0),
            precipitation_mm,
            humidity_percent: condition.estimated_humidity_percent(),
            wind_speed_ms: None,
            description: ForecastDay::summary_for(precipitation_mm, temp_max_c).to_string(),
            origin: ForecastOrigin::Government,
        });
    }

    if days.is_empty() {
        return Err(CafeOpsError::InvalidData(
            "CPTEC response contained no forecast days".into(),
        ));
    }
    Ok(days)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="ISO-8859-1"?>
<cidade>
  <nome>Belo Horizonte</nome>
  <uf>MG</uf>
  <atualizacao>2026-10-18</atualizacao>
  <previsao>
    <dia>2026-10-19</dia>
    <tempo>ps</tempo>
    <maxima>31</maxima>
    <minima>17</minima>
    <iuv>12.0</iuv>
  </previsao>
  <previsao>
    <dia>2026-10-20</dia>
    <tempo>t</tempo>
    <maxima>27</maxima>
    <minima>18</minima>
    <iuv>9.0</iuv>
  </previsao>
  <previsao>
    <dia>not-a-date</dia>
    <tempo>n</tempo>
    <maxima>25</maxima>
    <minima>16</minima>
  </previsao>
</cidade>"#;

    #[test]
    fn parses_previsao_blocks() {
        let days = parse_forecast(SAMPLE).unwrap();
        assert_eq!(days.len(), 2);

        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
        assert_eq!(days[0].temp_max_c, 31.0);
        assert_eq!(days[0].temp_min_c, 17.0);
        assert_eq!(days[0].temp_mean_c, 24.0);
        assert_eq!(days[0].precipitation_mm, 0.0);
        assert_eq!(days[0].origin, ForecastOrigin::Government);

        assert_eq!(days[1].precipitation_mm, 30.0);
        assert_eq!(days[1].humidity_percent, 90.0);
        assert_eq!(days[1].description, "Moderate rain");
    }

    #[test]
    fn empty_feed_is_an_error() {
        assert!(parse_forecast("<cidade><nome>x</nome></cidade>").is_err());
    }

    #[test]
    fn picks_nearest_city() {
        // Sul de Minas is closest to Belo Horizonte among the three.
        assert_eq!(nearest_city(&Location::new(-21.2, -44.9)).code, 218);
        assert_eq!(nearest_city(&Location::new(-16.7, -47.6)).code, 139);
        assert_eq!(nearest_city(&Location::new(-22.9, -47.1)).code, 244);
    }

    #[test]
    fn only_covers_brazil() {
        let client = CptecClient::new(&GovernmentSourceConfig::default());
        assert!(client.covers(&Location::new(-19.9, -43.9)));
        assert!(!client.covers(&Location::new(4.6, -76.1)));
    }
}
