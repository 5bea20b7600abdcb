pub mod cptec;
pub mod inmet;
pub mod openweathermap;

pub use cptec::CptecClient;
pub use inmet::{InmetClient, WeatherStation};
pub use openweathermap::OpenWeatherMapClient;

use crate::error::Result;
use crate::models::{ClimateObservation, ForecastDay, Location};
use async_trait::async_trait;
use chrono::NaiveDate;

/// A remote daily forecast feed. Days come back in feed order; the provider
/// checks and trims them to the five days after today.
#[async_trait]
pub trait ForecastSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the feed has anything for this location.
    fn covers(&self, _location: &Location) -> bool {
        true
    }

    async fn fetch(&self, location: &Location) -> Result<Vec<ForecastDay>>;
}

/// Daily station records, used to refresh a stale climate window.
#[async_trait]
pub trait ObservationArchive: Send + Sync {
    /// The station to read for a plantation without one assigned.
    async fn nearest_station(&self, location: &Location) -> Result<Option<WeatherStation>>;

    async fn daily_observations(
        &self,
        station_code: &str,
        plantation_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ClimateObservation>>;
}
