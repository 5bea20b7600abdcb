use super::{ClimateHistoryStore, Database};
use crate::error::Result;
use crate::models::{ClimateObservation, Plantation, SoilSample};
use serde::Deserialize;
use std::path::Path;

/// JSON document accepted by `cafeops import`.
///
/// Soil samples and observations are nested under their plantation; their
/// `plantation_id` is filled in from the inserted plantation.
#[derive(Debug, Deserialize)]
pub struct Fixture {
    pub plantations: Vec<FixturePlantation>,
}

#[derive(Debug, Deserialize)]
pub struct FixturePlantation {
    #[serde(flatten)]
    pub plantation: Plantation,
    #[serde(default)]
    pub soil_samples: Vec<SoilSample>,
    #[serde(default)]
    pub observations: Vec<ClimateObservation>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ImportSummary {
    pub plantations: usize,
    pub soil_samples: usize,
    pub observations: usize,
}

impl Fixture {
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl Database {
    pub fn import_fixture(&self, fixture: Fixture) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();

        for entry in fixture.plantations {
            let id = self.create_plantation(&entry.plantation)?;
            summary.plantations += 1;

            for mut sample in entry.soil_samples {
                sample.plantation_id = id;
                self.insert_soil_sample(&sample)?;
                summary.soil_samples += 1;
            }

            let observations: Vec<ClimateObservation> = entry
                .observations
                .into_iter()
                .map(|mut obs| {
                    obs.plantation_id = id;
                    obs
                })
                .collect();
            summary.observations += self.record_observations(&observations)?;

            tracing::debug!(plantation_id = id, name = %entry.plantation.name, "Imported plantation");
        }

        Ok(summary)
    }
}
