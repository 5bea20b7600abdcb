mod connection;
mod fixture;
mod migrations;
mod queries;

pub use connection::Database;
pub use fixture::Fixture;

use crate::error::Result;
use crate::models::{
    ClimateObservation, Plantation, RateLimitClass, Recommendation, RecommendationStatus,
    SoilSample,
};
use chrono::{DateTime, Utc};

/// Access to plantations and their soil samples.
pub trait PlantationStore {
    fn list_plantations(&self) -> Result<Vec<Plantation>>;

    fn get_plantation(&self, id: i64) -> Result<Option<Plantation>>;

    /// Remember the weather station assigned to a plantation.
    fn set_station_code(&self, id: i64, station_code: &str) -> Result<()>;

    fn latest_soil_sample(&self, plantation_id: i64) -> Result<Option<SoilSample>>;
}

pub trait ClimateHistoryStore {
    /// Up to `days` observations, most recent first.
    fn recent_observations(&self, plantation_id: i64, days: usize)
        -> Result<Vec<ClimateObservation>>;

    /// Insert or replace observations keyed by (plantation, date).
    fn record_observations(&self, observations: &[ClimateObservation]) -> Result<usize>;

    /// Insert observations for dates that have none yet. An existing synthetic
    /// row is replaced by a real reading; real rows are left alone.
    /// Returns the number of rows written.
    fn fill_missing(&self, observations: &[ClimateObservation]) -> Result<usize>;
}

pub trait RecommendationStore {
    fn list_pending(&self, plantation_id: i64) -> Result<Vec<Recommendation>>;

    fn insert(&self, recommendation: &Recommendation) -> Result<i64>;

    fn update_status(&self, id: i64, status: RecommendationStatus) -> Result<()>;

    /// Whether a pending recommendation of `class` was created at or after `since`.
    fn has_pending_since(
        &self,
        plantation_id: i64,
        class: RateLimitClass,
        since: DateTime<Utc>,
    ) -> Result<bool>;

    /// Atomically insert `batch` unless a pending recommendation of `class`
    /// for the plantation was created at or after `since`.
    /// Returns the new ids, or `None` when the batch was suppressed.
    fn insert_if_quiet(
        &self,
        plantation_id: i64,
        class: RateLimitClass,
        since: DateTime<Utc>,
        batch: &[Recommendation],
    ) -> Result<Option<Vec<i64>>>;
}
