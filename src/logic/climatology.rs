use super::calculations::round1;
use crate::models::{ForecastDay, ForecastOrigin, Location, FORECAST_DAYS};
use chrono::{Datelike, Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClimateRegion {
    Amazonia,
    Cerrado,
    Tropical,
    Subtropical,
}

impl ClimateRegion {
    pub fn for_location(location: &Location) -> Self {
        if location.latitude > -5.0 {
            ClimateRegion::Amazonia
        } else if location.latitude > -15.0 && location.longitude > -50.0 {
            ClimateRegion::Cerrado
        } else if location.latitude > -25.0 {
            ClimateRegion::Tropical
        } else {
            ClimateRegion::Subtropical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClimateRegion::Amazonia => "amazonia",
            ClimateRegion::Cerrado => "cerrado",
            ClimateRegion::Tropical => "tropical",
            ClimateRegion::Subtropical => "subtropical",
        }
    }

    /// Typical daily conditions for a calendar month (1-12).
    pub fn normals(&self, month: u32) -> &'static MonthlyNormals {
        let table = match self {
            ClimateRegion::Amazonia => &AMAZONIA,
            ClimateRegion::Cerrado => &CERRADO,
            ClimateRegion::Tropical => &TROPICAL,
            ClimateRegion::Subtropical => &SUBTROPICAL,
        };
        &table[(month.clamp(1, 12) - 1) as usize]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthlyNormals {
    pub temp_c: (f64, f64),
    pub rain_mm: (f64, f64),
    pub humidity_percent: (f64, f64),
}

const fn n(temp: (f64, f64), rain: (f64, f64), humidity: (f64, f64)) -> MonthlyNormals {
    MonthlyNormals {
        temp_c: temp,
        rain_mm: rain,
        humidity_percent: humidity,
    }
}

#[rustfmt::skip]
const AMAZONIA: [MonthlyNormals; 12] = [
    n((22.0, 31.0), (15.0, 50.0), (80.0, 95.0)),
    n((22.0, 31.0), (15.0, 55.0), (82.0, 95.0)),
    n((22.0, 31.0), (15.0, 55.0), (82.0, 95.0)),
    n((22.0, 31.0), (10.0, 45.0), (80.0, 95.0)),
    n((22.0, 32.0), (5.0, 35.0), (78.0, 92.0)),
    n((21.0, 32.0), (0.0, 20.0), (72.0, 88.0)),
    n((20.0, 32.0), (0.0, 15.0), (70.0, 85.0)),
    n((20.0, 33.0), (0.0, 15.0), (68.0, 85.0)),
    n((21.0, 33.0), (0.0, 20.0), (70.0, 88.0)),
    n((20.0, 32.0), (0.0, 25.0), (75.0, 90.0)),
    n((22.0, 33.0), (10.0, 40.0), (75.0, 90.0)),
    n((23.0, 34.0), (15.0, 50.0), (80.0, 95.0)),
];

#[rustfmt::skip]
const CERRADO: [MonthlyNormals; 12] = [
    n((20.0, 30.0), (15.0, 50.0), (70.0, 85.0)),
    n((20.0, 30.0), (10.0, 45.0), (70.0, 85.0)),
    n((19.0, 30.0), (10.0, 40.0), (68.0, 85.0)),
    n((17.0, 29.0), (5.0, 25.0), (60.0, 80.0)),
    n((14.0, 28.0), (0.0, 10.0), (50.0, 72.0)),
    n((12.0, 27.0), (0.0, 5.0), (45.0, 65.0)),
    n((12.0, 27.0), (0.0, 5.0), (40.0, 60.0)),
    n((13.0, 29.0), (0.0, 8.0), (38.0, 58.0)),
    n((15.0, 31.0), (0.0, 12.0), (40.0, 62.0)),
    n((15.0, 30.0), (0.0, 15.0), (45.0, 70.0)),
    n((18.0, 32.0), (5.0, 30.0), (50.0, 75.0)),
    n((20.0, 33.0), (20.0, 60.0), (60.0, 85.0)),
];

#[rustfmt::skip]
const TROPICAL: [MonthlyNormals; 12] = [
    n((20.0, 30.0), (15.0, 50.0), (65.0, 85.0)),
    n((20.0, 30.0), (10.0, 45.0), (65.0, 85.0)),
    n((19.0, 29.0), (10.0, 40.0), (65.0, 82.0)),
    n((17.0, 27.0), (5.0, 25.0), (62.0, 80.0)),
    n((14.0, 25.0), (0.0, 15.0), (58.0, 78.0)),
    n((12.0, 24.0), (0.0, 10.0), (55.0, 75.0)),
    n((11.0, 24.0), (0.0, 10.0), (52.0, 72.0)),
    n((13.0, 26.0), (0.0, 10.0), (50.0, 70.0)),
    n((15.0, 27.0), (0.0, 15.0), (52.0, 72.0)),
    n((18.0, 28.0), (0.0, 20.0), (55.0, 75.0)),
    n((20.0, 30.0), (10.0, 40.0), (60.0, 80.0)),
    n((22.0, 32.0), (25.0, 70.0), (65.0, 85.0)),
];

#[rustfmt::skip]
const SUBTROPICAL: [MonthlyNormals; 12] = [
    n((19.0, 29.0), (10.0, 40.0), (70.0, 85.0)),
    n((19.0, 29.0), (10.0, 40.0), (70.0, 85.0)),
    n((18.0, 27.0), (8.0, 35.0), (70.0, 85.0)),
    n((15.0, 24.0), (5.0, 30.0), (70.0, 85.0)),
    n((12.0, 21.0), (5.0, 30.0), (72.0, 88.0)),
    n((9.0, 18.0), (5.0, 30.0), (75.0, 90.0)),
    n((8.0, 18.0), (5.0, 30.0), (75.0, 90.0)),
    n((9.0, 20.0), (5.0, 30.0), (72.0, 88.0)),
    n((11.0, 21.0), (5.0, 30.0), (68.0, 85.0)),
    n((12.0, 22.0), (5.0, 25.0), (60.0, 80.0)),
    n((15.0, 25.0), (10.0, 35.0), (65.0, 80.0)),
    n((18.0, 28.0), (15.0, 45.0), (70.0, 85.0)),
];

/// Deterministic-with-jitter forecast built from regional monthly normals.
/// Used when no remote source answers; it cannot fail.
pub struct ClimatologicalGenerator {
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl ClimatologicalGenerator {
    pub fn new() -> Self {
        Self::with_rng(Box::new(StdRng::from_entropy()))
    }

    pub fn with_rng(rng: Box<dyn RngCore + Send>) -> Self {
        Self {
            rng: Mutex::new(rng),
        }
    }

    /// Five days starting the day after `today`.
    pub fn generate(&self, location: &Location, today: NaiveDate) -> Vec<ForecastDay> {
        let region = ClimateRegion::for_location(location);
        tracing::debug!(region = region.as_str(), %today, "Generating climatological forecast");
        // A poisoned lock still holds a usable generator.
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());

        (1..=FORECAST_DAYS as u32)
            .map(|lead| {
                let date = today + Duration::days(lead as i64);
                let normals = region.normals(date.month());
                let uncertainty = (lead as f64 * 0.5).min(2.5);

                let temp_jitter = (rng.gen::<f64>() - 0.5) * uncertainty * 4.0;
                let rain_jitter = (rng.gen::<f64>() - 0.5) * uncertainty * 20.0;
                let humidity_jitter = (rng.gen::<f64>() - 0.5) * uncertainty * 10.0;
                let (rain_lo, rain_hi) = normals.rain_mm;
                let rain_base = rain_lo + (rain_hi - rain_lo) * rng.gen::<f64>();
                let wind = 5.0 + rng.gen::<f64>() * 10.0;

                let temp_min_c = normals.temp_c.0 + temp_jitter;
                let temp_max_c = normals.temp_c.1 + temp_jitter;
                let precipitation_mm = (rain_base + rain_jitter).max(0.0);
                let (hum_lo, hum_hi) = normals.humidity_percent;

                ForecastDay {
                    date,
                    lead_time_days: lead,
                    temp_min_c: round1(temp_min_c),
                    temp_max_c: round1(temp_max_c),
                    temp_mean_c: round1((temp_min_c + temp_max_c) / 2.0),
                    precipitation_mm: round1(precipitation_mm),
                    humidity_percent: ((hum_lo + hum_hi) / 2.0 + humidity_jitter).round(),
                    wind_speed_ms: Some(round1(wind)),
                    description: ForecastDay::summary_for(precipitation_mm, temp_max_c)
                        .to_string(),
                    origin: ForecastOrigin::Climatological,
                }
            })
            .collect()
    }
}

impl Default for ClimatologicalGenerator {
    fn default() -> Self {
        Self::new()
    }
}
