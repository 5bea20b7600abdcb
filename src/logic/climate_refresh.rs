use super::calculations::{round1, CLIMATE_WINDOW_DAYS};
use crate::datasources::ObservationArchive;
use crate::db::{ClimateHistoryStore, PlantationStore};
use crate::error::{CafeOpsError, Result};
use crate::models::{ClimateObservation, ObservationSource, Plantation};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::f64::consts::PI;
use std::sync::Mutex;

/// Observations older than this no longer describe the current week.
pub const STALE_AFTER_HOURS: i64 = 48;

/// Keeps a plantation's climate window usable. A stale window is topped up
/// from the nearest INMET station when one answers, otherwise from a
/// synthetic seasonal week. Only dates with no real reading are written.
pub struct ClimateRefresher {
    archive: Option<Box<dyn ObservationArchive>>,
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl ClimateRefresher {
    pub fn new(archive: Option<Box<dyn ObservationArchive>>) -> Self {
        Self::with_rng(archive, Box::new(StdRng::from_entropy()))
    }

    pub fn with_rng(
        archive: Option<Box<dyn ObservationArchive>>,
        rng: Box<dyn RngCore + Send>,
    ) -> Self {
        Self {
            archive,
            rng: Mutex::new(rng),
        }
    }

    pub fn is_stale(latest: Option<&ClimateObservation>, now: DateTime<Utc>) -> bool {
        match latest {
            Some(obs) => obs.is_older_than(Duration::hours(STALE_AFTER_HOURS), now),
            None => true,
        }
    }

    /// The plantation's recent observations, most recent first, refreshed
    /// first if the latest one is stale.
    pub async fn current_window<S: ClimateHistoryStore + PlantationStore + ?Sized>(
        &self,
        store: &S,
        plantation: &Plantation,
        now: DateTime<Utc>,
    ) -> Result<Vec<ClimateObservation>> {
        let plantation_id = plantation
            .id
            .ok_or_else(|| CafeOpsError::InvalidData("plantation has no id".into()))?;

        let observations = store.recent_observations(plantation_id, CLIMATE_WINDOW_DAYS)?;
        if !Self::is_stale(observations.first(), now) {
            return Ok(observations);
        }

        let fresh = match self.from_station(store, plantation, plantation_id, now).await {
            Some(fresh) => fresh,
            None => {
                tracing::warn!(
                    plantation_id,
                    "Climate data older than {}h, generating synthetic week",
                    STALE_AFTER_HOURS
                );
                self.synthetic_week(plantation_id, now.date_naive())
            }
        };

        let written = store.fill_missing(&fresh)?;
        tracing::debug!(plantation_id, written, "Climate window refreshed");

        store.recent_observations(plantation_id, CLIMATE_WINDOW_DAYS)
    }

    /// The plantation's station, assigning the nearest one when none is set.
    async fn station_code<S: PlantationStore + ?Sized>(
        &self,
        archive: &dyn ObservationArchive,
        store: &S,
        plantation: &Plantation,
        plantation_id: i64,
    ) -> Option<String> {
        if let Some(code) = &plantation.station_code {
            return Some(code.clone());
        }

        match archive.nearest_station(&plantation.location).await {
            Ok(Some(station)) => {
                tracing::info!(
                    plantation_id,
                    station_code = %station.code,
                    station = %station.name,
                    state = station.state.as_deref().unwrap_or("-"),
                    latitude = station.location.latitude,
                    longitude = station.location.longitude,
                    distance_km = round1(station.distance_km),
                    "Assigned nearest INMET station"
                );
                if let Err(e) = store.set_station_code(plantation_id, &station.code) {
                    tracing::warn!(plantation_id, error = %e, "Failed to save station code");
                }
                Some(station.code)
            }
            Ok(None) => {
                tracing::debug!(plantation_id, "No INMET station within range");
                None
            }
            Err(e) => {
                tracing::warn!(plantation_id, error = %e, "INMET station lookup failed");
                None
            }
        }
    }

    async fn from_station<S: PlantationStore + ?Sized>(
        &self,
        store: &S,
        plantation: &Plantation,
        plantation_id: i64,
        now: DateTime<Utc>,
    ) -> Option<Vec<ClimateObservation>> {
        let archive = self.archive.as_deref()?;
        let station_code = self
            .station_code(archive, store, plantation, plantation_id)
            .await?;

        let end = now.date_naive();
        let start = end - Duration::days(CLIMATE_WINDOW_DAYS as i64 - 1);
        match archive
            .daily_observations(&station_code, plantation_id, start, end)
            .await
        {
            Ok(observations) => {
                let newest = observations.iter().max_by_key(|o| o.date);
                if Self::is_stale(newest, now) {
                    tracing::warn!(
                        plantation_id,
                        station_code,
                        "Station has no recent records"
                    );
                    None
                } else {
                    tracing::info!(
                        plantation_id,
                        station_code,
                        count = observations.len(),
                        "Climate window refreshed from INMET"
                    );
                    Some(observations)
                }
            }
            Err(e) => {
                tracing::warn!(plantation_id, station_code, error = %e, "INMET daily query failed");
                None
            }
        }
    }

    /// Seven days ending `today`, following a seasonal curve on day of year.
    pub fn synthetic_week(&self, plantation_id: i64, today: NaiveDate) -> Vec<ClimateObservation> {
        // A poisoned lock still holds a usable generator.
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());

        (0..CLIMATE_WINDOW_DAYS as i64)
            .rev()
            .map(|back| {
                let date = today - Duration::days(back);
                let base = 20.0 + 10.0 * (date.ordinal() as f64 / 365.0 * 2.0 * PI).sin();

                let temp_max = (base + 5.0 + rng.gen::<f64>() * 10.0).max(base + 2.0);
                let temp_min = (base - 5.0 + rng.gen::<f64>() * 5.0).max(5.0);
                let temp_mean = base + rng.gen::<f64>() * 6.0 - 3.0;
                let humidity = 55.0 + rng.gen::<f64>() * 35.0;
                let precipitation = if rng.gen::<f64>() < 0.3 {
                    rng.gen::<f64>() * 40.0
                } else {
                    rng.gen::<f64>() * 5.0
                };
                let wind = 2.0 + rng.gen::<f64>() * 15.0;

                ClimateObservation::new(plantation_id, date, ObservationSource::Synthetic)
                    .with_temperatures(round1(temp_min), round1(temp_mean), round1(temp_max))
                    .with_humidity(round1(humidity))
                    .with_precipitation(round1(precipitation))
                    .with_wind(round1(wind))
            })
            .collect()
    }
}
