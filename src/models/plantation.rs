use super::phenology::PhenologicalPhase;
use super::soil::SoilTexture;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// The engine only advises on coffee; the tag is kept for the record shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Species {
    #[default]
    Cafe,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Rough Brazil bounding box, used to gate the government forecast source.
    pub fn is_in_brazil(&self) -> bool {
        (-35.0..=5.0).contains(&self.latitude) && (-75.0..=-30.0).contains(&self.longitude)
    }

    /// Great-circle distance in kilometres.
    pub fn distance_km(&self, other: &Location) -> f64 {
        const EARTH_RADIUS_KM: f64 = 6371.0;
        let d_lat = (other.latitude - self.latitude).to_radians();
        let d_lon = (other.longitude - self.longitude).to_radians();
        let a = (d_lat / 2.0).sin().powi(2)
            + self.latitude.to_radians().cos()
                * other.latitude.to_radians().cos()
                * (d_lon / 2.0).sin().powi(2);
        EARTH_RADIUS_KM * 2.0 * a.sqrt().atan2((1.0 - a).sqrt())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plantation {
    pub id: Option<i64>,
    pub owner_id: i64,
    pub name: String,
    #[serde(default)]
    pub species: Species,
    pub variety: String,
    #[serde(default)]
    pub phase_override: Option<PhenologicalPhase>,
    pub location: Location,
    #[serde(default)]
    pub soil_ph: Option<f64>,
    #[serde(default)]
    pub soil_type: Option<SoilTexture>,
    pub planting_date: NaiveDate,
    /// Weather station code in the external station archive, if known.
    #[serde(default)]
    pub station_code: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Plantation {
    pub fn new(
        owner_id: i64,
        name: impl Into<String>,
        variety: impl Into<String>,
        location: Location,
        planting_date: NaiveDate,
    ) -> Self {
        Self {
            id: None,
            owner_id,
            name: name.into(),
            species: Species::Cafe,
            variety: variety.into(),
            phase_override: None,
            location,
            soil_ph: None,
            soil_type: None,
            planting_date,
            station_code: None,
            created_at: Utc::now(),
        }
    }

    pub fn label(&self) -> String {
        match self.id {
            Some(id) => format!("{} (#{})", self.name, id),
            None => self.name.clone(),
        }
    }
}
