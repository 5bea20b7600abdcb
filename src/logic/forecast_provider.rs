use super::climatology::ClimatologicalGenerator;
use crate::config::ForecastConfig;
use crate::datasources::{CptecClient, ForecastSource, OpenWeatherMapClient};
use crate::models::{Forecast, ForecastDay, ForecastOrigin, Location, FORECAST_DAYS};
use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Fewest leading days a source must cover. A shorter tail is completed
/// from climatology.
pub const MIN_SOURCE_DAYS: usize = 4;

/// Five-day forecast through a chain of remote sources, ending in the
/// climatological generator. Never fails and never returns fewer than five days.
pub struct ForecastProvider {
    sources: Vec<Box<dyn ForecastSource>>,
    fallback: ClimatologicalGenerator,
    timeout: std::time::Duration,
}

impl ForecastProvider {
    pub fn new(
        sources: Vec<Box<dyn ForecastSource>>,
        fallback: ClimatologicalGenerator,
        timeout: std::time::Duration,
    ) -> Self {
        Self {
            sources,
            fallback,
            timeout,
        }
    }

    /// Government source first, then OpenWeatherMap when a key is configured.
    pub fn from_config(config: &ForecastConfig) -> Self {
        let mut sources: Vec<Box<dyn ForecastSource>> = Vec::new();

        if config.government.enabled {
            sources.push(Box::new(CptecClient::new(&config.government)));
        }

        match config.openweathermap.as_ref().filter(|c| c.is_usable()) {
            Some(owm) => {
                tracing::info!("OpenWeatherMap configured as secondary forecast source");
                sources.push(Box::new(OpenWeatherMapClient::new(owm.clone())));
            }
            None => tracing::debug!("OpenWeatherMap not configured"),
        }

        Self::new(sources, ClimatologicalGenerator::new(), config.timeout())
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    pub async fn five_day_forecast(&self, location: &Location, now: DateTime<Utc>) -> Forecast {
        let today = now.date_naive();

        for source in &self.sources {
            if !source.covers(location) {
                tracing::debug!(source = source.name(), "Source does not cover location");
                continue;
            }

            match tokio::time::timeout(self.timeout, source.fetch(location)).await {
                Ok(Ok(days)) => match normalize(days, today) {
                    Some(mut days) => {
                        tracing::info!(source = source.name(), "Forecast obtained");
                        if days.len() < FORECAST_DAYS {
                            tracing::debug!(
                                source = source.name(),
                                missing = FORECAST_DAYS - days.len(),
                                "Completing forecast tail from climatology"
                            );
                            let covered = days.len();
                            days.extend(
                                self.fallback
                                    .generate(location, today)
                                    .into_iter()
                                    .skip(covered),
                            );
                        }
                        let origin = days[0].origin;
                        return Forecast {
                            fetched_at: now,
                            origin,
                            days,
                        };
                    }
                    None => tracing::warn!(
                        source = source.name(),
                        "Forecast did not cover the next days, trying next source"
                    ),
                },
                Ok(Err(e)) => {
                    tracing::warn!(source = source.name(), error = %e, "Forecast source failed")
                }
                Err(_) => tracing::warn!(
                    source = source.name(),
                    timeout_secs = self.timeout.as_secs(),
                    "Forecast source timed out"
                ),
            }
        }

        tracing::info!("Using climatological forecast");
        Forecast {
            fetched_at: now,
            origin: ForecastOrigin::Climatological,
            days: self.fallback.generate(location, today),
        }
    }
}

/// Keep the days after `today` that follow on from tomorrow without gaps,
/// at most five, and number their lead times. `None` when fewer than
/// [`MIN_SOURCE_DAYS`] remain.
pub fn normalize(mut days: Vec<ForecastDay>, today: NaiveDate) -> Option<Vec<ForecastDay>> {
    days.sort_by_key(|d| d.date);
    days.dedup_by_key(|d| d.date);

    let upcoming: Vec<ForecastDay> = days
        .into_iter()
        .filter(|d| d.date > today)
        .take(FORECAST_DAYS)
        .enumerate()
        .map_while(|(i, mut day)| {
            let lead = i as u32 + 1;
            (day.date == today + Duration::days(lead as i64)).then(|| {
                day.lead_time_days = lead;
                day
            })
        })
        .collect();

    (upcoming.len() >= MIN_SOURCE_DAYS).then_some(upcoming)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CafeOpsError, Result};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use rand::rngs::mock::StepRng;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
    }

    fn day(date: NaiveDate, origin: ForecastOrigin) -> ForecastDay {
        ForecastDay {
            date,
            lead_time_days: 0,
            temp_min_c: 15.0,
            temp_max_c: 27.0,
            temp_mean_c: 21.0,
            precipitation_mm: 3.0,
            humidity_percent: 70.0,
            wind_speed_ms: None,
            description: String::new(),
            origin,
        }
    }

    fn days_from(start_offset: i64, count: i64, origin: ForecastOrigin) -> Vec<ForecastDay> {
        (start_offset..start_offset + count)
            .map(|i| day(now().date_naive() + Duration::days(i), origin))
            .collect()
    }

    struct Fixed(Vec<ForecastDay>);

    #[async_trait]
    impl ForecastSource for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn fetch(&self, _location: &Location) -> Result<Vec<ForecastDay>> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    #[async_trait]
    impl ForecastSource for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn fetch(&self, _location: &Location) -> Result<Vec<ForecastDay>> {
            Err(CafeOpsError::DataSourceUnavailable("down".into()))
        }
    }

    struct Hanging;

    #[async_trait]
    impl ForecastSource for Hanging {
        fn name(&self) -> &'static str {
            "hanging"
        }

        async fn fetch(&self, _location: &Location) -> Result<Vec<ForecastDay>> {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    struct Elsewhere;

    #[async_trait]
    impl ForecastSource for Elsewhere {
        fn name(&self) -> &'static str {
            "elsewhere"
        }

        fn covers(&self, location: &Location) -> bool {
            location.is_in_brazil()
        }

        async fn fetch(&self, _location: &Location) -> Result<Vec<ForecastDay>> {
            Ok(days_from(1, 5, ForecastOrigin::Government))
        }
    }

    fn provider(sources: Vec<Box<dyn ForecastSource>>) -> ForecastProvider {
        provider_with_timeout(sources, std::time::Duration::from_secs(8))
    }

    fn provider_with_timeout(
        sources: Vec<Box<dyn ForecastSource>>,
        timeout: std::time::Duration,
    ) -> ForecastProvider {
        ForecastProvider::new(
            sources,
            ClimatologicalGenerator::with_rng(Box::new(StepRng::new(0, 0))),
            timeout,
        )
    }

    fn brazil() -> Location {
        Location::new(-21.2, -45.0)
    }

    #[tokio::test]
    async fn first_good_source_wins() {
        let p = provider(vec![
            Box::new(Fixed(days_from(1, 7, ForecastOrigin::Government))),
            Box::new(Fixed(days_from(1, 5, ForecastOrigin::OpenWeatherMap))),
        ]);
        let forecast = p.five_day_forecast(&brazil(), now()).await;
        assert_eq!(forecast.origin, ForecastOrigin::Government);
        assert_eq!(forecast.days.len(), 5);
        assert_eq!(forecast.days[4].lead_time_days, 5);
    }

    #[tokio::test]
    async fn failing_source_falls_through() {
        let p = provider(vec![
            Box::new(Failing),
            Box::new(Fixed(days_from(1, 5, ForecastOrigin::OpenWeatherMap))),
        ]);
        let forecast = p.five_day_forecast(&brazil(), now()).await;
        assert_eq!(forecast.origin, ForecastOrigin::OpenWeatherMap);
    }

    #[tokio::test]
    async fn timed_out_source_falls_back_to_climatology() {
        let p = provider_with_timeout(
            vec![Box::new(Hanging), Box::new(Failing)],
            std::time::Duration::from_millis(50),
        );
        let forecast = p.five_day_forecast(&brazil(), now()).await;
        assert_eq!(forecast.origin, ForecastOrigin::Climatological);
        assert_eq!(forecast.days.len(), 5);
        assert_eq!(
            forecast.days[0].date,
            NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
        );
    }

    #[tokio::test]
    async fn short_forecast_is_rejected() {
        let p = provider(vec![Box::new(Fixed(days_from(1, 3, ForecastOrigin::Government)))]);
        let forecast = p.five_day_forecast(&brazil(), now()).await;
        assert_eq!(forecast.origin, ForecastOrigin::Climatological);
    }

    #[tokio::test]
    async fn uncovered_location_skips_source() {
        let p = provider(vec![Box::new(Elsewhere)]);
        let forecast = p.five_day_forecast(&Location::new(39.8, -75.8), now()).await;
        assert_eq!(forecast.origin, ForecastOrigin::Climatological);

        let forecast = p.five_day_forecast(&brazil(), now()).await;
        assert_eq!(forecast.origin, ForecastOrigin::Government);
    }

    #[test]
    fn normalize_drops_today_and_past() {
        let today = now().date_naive();
        let days = normalize(days_from(-1, 8, ForecastOrigin::Government), today).unwrap();
        assert_eq!(days.len(), 5);
        assert_eq!(days[0].date, today + Duration::days(1));
        assert_eq!(days[0].lead_time_days, 1);
    }

    #[tokio::test]
    async fn four_day_source_is_completed_from_climatology() {
        let p = provider(vec![Box::new(Fixed(days_from(0, 5, ForecastOrigin::OpenWeatherMap)))]);
        let forecast = p.five_day_forecast(&brazil(), now()).await;
        assert_eq!(forecast.origin, ForecastOrigin::OpenWeatherMap);
        assert_eq!(forecast.days.len(), 5);
        assert!(forecast.days[..4]
            .iter()
            .all(|d| d.origin == ForecastOrigin::OpenWeatherMap));
        let last = &forecast.days[4];
        assert_eq!(last.origin, ForecastOrigin::Climatological);
        assert_eq!(last.lead_time_days, 5);
        assert_eq!(last.date, now().date_naive() + Duration::days(5));
    }

    #[test]
    fn normalize_keeps_the_leading_run() {
        let today = now().date_naive();
        let mut days = days_from(1, 6, ForecastOrigin::Government);
        days.remove(4);
        let days = normalize(days, today).unwrap();
        assert_eq!(days.len(), 4);
        assert_eq!(days[3].lead_time_days, 4);
    }

    #[test]
    fn normalize_rejects_gaps() {
        let today = now().date_naive();
        let mut days = days_from(1, 6, ForecastOrigin::Government);
        days.remove(2);
        assert!(normalize(days, today).is_none());
    }

    #[test]
    fn normalize_sorts_feed_order() {
        let today = now().date_naive();
        let mut days = days_from(1, 5, ForecastOrigin::Government);
        days.reverse();
        let days = normalize(days, today).unwrap();
        assert_eq!(days[0].date, today + Duration::days(1));
    }
}
