use crate::models::ClimateObservation;
use serde::Serialize;

/// Most observations the historical rules look at.
pub const CLIMATE_WINDOW_DAYS: usize = 7;

/// Aggregates over the most recent observations. Each aggregate ignores
/// observations missing the field and is `None` when no observation has it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClimateWindow {
    pub observation_count: usize,
    pub temp_mean_c: Option<f64>,
    pub temp_max_c: Option<f64>,
    pub temp_min_c: Option<f64>,
    pub precipitation_total_mm: Option<f64>,
    pub humidity_mean_percent: Option<f64>,
}

impl ClimateWindow {
    /// `observations` must be most-recent-first; anything past the window is ignored.
    pub fn from_observations(observations: &[ClimateObservation]) -> Self {
        let window = &observations[..observations.len().min(CLIMATE_WINDOW_DAYS)];
        Self {
            observation_count: window.len(),
            temp_mean_c: mean(window.iter().filter_map(|o| o.temp_mean_c)),
            temp_max_c: maximum(window.iter().filter_map(|o| o.temp_max_c)),
            temp_min_c: minimum(window.iter().filter_map(|o| o.temp_min_c)),
            precipitation_total_mm: total(window.iter().filter_map(|o| o.precipitation_mm)),
            humidity_mean_percent: mean(window.iter().filter_map(|o| o.humidity_mean_percent)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.observation_count == 0
    }
}

pub fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

pub fn total(values: impl Iterator<Item = f64>) -> Option<f64> {
    values.fold(None, |acc, v| Some(acc.unwrap_or(0.0) + v))
}

pub fn maximum(values: impl Iterator<Item = f64>) -> Option<f64> {
    values.fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))))
}

pub fn minimum(values: impl Iterator<Item = f64>) -> Option<f64> {
    values.fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.min(v))))
}

/// Round to one decimal place, the precision used in reports and parameters.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ObservationSource;
    use chrono::NaiveDate;

    fn obs(day: u32) -> ClimateObservation {
        ClimateObservation::new(
            1,
            NaiveDate::from_ymd_opt(2026, 10, day).unwrap(),
            ObservationSource::Manual,
        )
    }

    #[test]
    fn aggregates_over_full_window() {
        let observations: Vec<_> = (1..=7)
            .rev()
            .map(|d| {
                obs(d)
                    .with_temperatures(10.0 + d as f64, 20.0, 28.0 + d as f64)
                    .with_humidity(60.0)
                    .with_precipitation(d as f64)
            })
            .collect();
        let window = ClimateWindow::from_observations(&observations);
        assert_eq!(window.observation_count, 7);
        assert_eq!(window.temp_min_c, Some(11.0));
        assert_eq!(window.temp_max_c, Some(35.0));
        assert_eq!(window.temp_mean_c, Some(20.0));
        assert_eq!(window.precipitation_total_mm, Some(28.0));
        assert_eq!(window.humidity_mean_percent, Some(60.0));
    }

    #[test]
    fn only_the_most_recent_seven_count() {
        let observations: Vec<_> = (1..=10)
            .rev()
            .map(|d| obs(d).with_precipitation(1.0))
            .collect();
        let window = ClimateWindow::from_observations(&observations);
        assert_eq!(window.observation_count, 7);
        assert_eq!(window.precipitation_total_mm, Some(7.0));
    }

    #[test]
    fn missing_fields_are_excluded() {
        let observations = vec![
            obs(3).with_humidity(90.0),
            obs(2).with_precipitation(4.0),
            obs(1).with_humidity(70.0),
        ];
        let window = ClimateWindow::from_observations(&observations);
        assert_eq!(window.humidity_mean_percent, Some(80.0));
        assert_eq!(window.precipitation_total_mm, Some(4.0));
        assert!(window.temp_min_c.is_none());
        assert!(window.temp_max_c.is_none());
    }

    #[test]
    fn empty_window_has_no_aggregates() {
        let window = ClimateWindow::from_observations(&[]);
        assert!(window.is_empty());
        assert_eq!(window, ClimateWindow::default());
    }

    #[test]
    fn rounding() {
        assert_eq!(round1(12.345), 12.3);
        assert_eq!(round1(-0.06), -0.1);
    }
}
