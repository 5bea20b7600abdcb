use super::{ClimateHistoryStore, PlantationStore, RecommendationStore};
use crate::db::Database;
use crate::error::{CafeOpsError, Result};
use crate::models::{
    ClimateObservation, Location, NutrientLevels, ObservationSource, ParametersUsed,
    PhenologicalPhase, Plantation, Priority, RateLimitClass, Recommendation,
    RecommendationStatus, Schedule, SoilSample, SoilTexture, Species,
};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row, TransactionBehavior};
use tracing::{debug, warn};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Fixed-width RFC 3339 so stored timestamps compare correctly as text.
fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            warn!(timestamp = %s, "Unparseable timestamp in database, using now");
            Utc::now()
        })
}

/// Reads a `YYYY-MM-DD` text column, reporting failures against that column.
fn get_date(row: &Row, column: &str) -> rusqlite::Result<NaiveDate> {
    let idx = row.as_ref().column_index(column)?;
    let value: String = row.get(idx)?;
    NaiveDate::parse_from_str(&value, DATE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// Plantation Queries

impl Database {
    pub fn create_plantation(&self, plantation: &Plantation) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO plantations
                    (owner_id, name, species, variety, phase_override, latitude, longitude,
                     soil_ph, soil_type, planting_date, station_code, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                "#,
                params![
                    plantation.owner_id,
                    plantation.name,
                    "cafe",
                    plantation.variety,
                    plantation.phase_override.map(|p| p.as_str()),
                    plantation.location.latitude,
                    plantation.location.longitude,
                    plantation.soil_ph,
                    plantation.soil_type.map(|t| t.as_str()),
                    plantation.planting_date.format(DATE_FORMAT).to_string(),
                    plantation.station_code,
                    ts(&plantation.created_at),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }
}

fn row_to_plantation(row: &Row) -> rusqlite::Result<Plantation> {
    let phase_str: Option<String> = row.get("phase_override")?;
    let soil_type_str: Option<String> = row.get("soil_type")?;
    let created_at_str: String = row.get("created_at")?;

    let phase_override = phase_str.as_ref().and_then(|s| {
        PhenologicalPhase::from_str(s).or_else(|| {
            warn!(phase = %s, "Unknown phase_override in database, ignoring");
            None
        })
    });
    let soil_type = soil_type_str.as_ref().and_then(|s| {
        SoilTexture::from_str(s).or_else(|| {
            warn!(soil_type = %s, "Unknown soil_type in database, ignoring");
            None
        })
    });

    Ok(Plantation {
        id: Some(row.get("id")?),
        owner_id: row.get("owner_id")?,
        name: row.get("name")?,
        species: Species::Cafe,
        variety: row.get("variety")?,
        phase_override,
        location: Location::new(row.get("latitude")?, row.get("longitude")?),
        soil_ph: row.get("soil_ph")?,
        soil_type,
        planting_date: get_date(row, "planting_date")?,
        station_code: row.get("station_code")?,
        created_at: parse_ts(&created_at_str),
    })
}

impl PlantationStore for Database {
    fn list_plantations(&self) -> Result<Vec<Plantation>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM plantations ORDER BY id")?;
            let plantations = stmt
                .query_map([], row_to_plantation)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(plantations)
        })
    }

    fn get_plantation(&self, id: i64) -> Result<Option<Plantation>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM plantations WHERE id = ?1",
                [id],
                row_to_plantation,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    fn set_station_code(&self, id: i64, station_code: &str) -> Result<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE plantations SET station_code = ?1 WHERE id = ?2",
                params![station_code, id],
            )?;
            if changed == 0 {
                return Err(CafeOpsError::NotFound(format!("plantation {}", id)));
            }
            Ok(())
        })
    }

    fn latest_soil_sample(&self, plantation_id: i64) -> Result<Option<SoilSample>> {
        self.with_conn(|conn| {
            conn.query_row(
                r#"
                SELECT * FROM soil_samples
                WHERE plantation_id = ?1
                ORDER BY analysis_date DESC, id DESC
                LIMIT 1
                "#,
                [plantation_id],
                row_to_soil_sample,
            )
            .optional()
            .map_err(Into::into)
        })
    }
}

// Soil Sample Queries

impl Database {
    pub fn insert_soil_sample(&self, sample: &SoilSample) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO soil_samples
                    (plantation_id, ph, texture, nitrogen, phosphorus, potassium, analysis_date)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    sample.plantation_id,
                    sample.ph,
                    sample.texture.map(|t| t.as_str()),
                    sample.nutrients.nitrogen,
                    sample.nutrients.phosphorus,
                    sample.nutrients.potassium,
                    sample.analysis_date.format(DATE_FORMAT).to_string(),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }
}

fn row_to_soil_sample(row: &Row) -> rusqlite::Result<SoilSample> {
    let texture_str: Option<String> = row.get("texture")?;

    Ok(SoilSample {
        id: Some(row.get("id")?),
        plantation_id: row.get("plantation_id")?,
        ph: row.get("ph")?,
        texture: texture_str.as_deref().and_then(SoilTexture::from_str),
        nutrients: NutrientLevels {
            nitrogen: row.get("nitrogen")?,
            phosphorus: row.get("phosphorus")?,
            potassium: row.get("potassium")?,
        },
        analysis_date: get_date(row, "analysis_date")?,
    })
}

// Climate Observation Queries

fn row_to_observation(row: &Row) -> rusqlite::Result<ClimateObservation> {
    let source_str: String = row.get("source")?;

    let source = ObservationSource::from_str(&source_str).unwrap_or_else(|| {
        warn!(source = %source_str, "Unknown observation source in database, defaulting to manual");
        ObservationSource::Manual
    });

    Ok(ClimateObservation {
        id: Some(row.get("id")?),
        plantation_id: row.get("plantation_id")?,
        date: get_date(row, "date")?,
        temp_max_c: row.get("temp_max_c")?,
        temp_min_c: row.get("temp_min_c")?,
        temp_mean_c: row.get("temp_mean_c")?,
        humidity_mean_percent: row.get("humidity_mean_percent")?,
        precipitation_mm: row.get("precipitation_mm")?,
        wind_speed_ms: row.get("wind_speed_ms")?,
        source,
    })
}

impl ClimateHistoryStore for Database {
    fn recent_observations(
        &self,
        plantation_id: i64,
        days: usize,
    ) -> Result<Vec<ClimateObservation>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT * FROM climate_observations
                WHERE plantation_id = ?1
                ORDER BY date DESC
                LIMIT ?2
                "#,
            )?;
            let observations = stmt
                .query_map(params![plantation_id, days as i64], row_to_observation)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(observations)
        })
    }

    fn record_observations(&self, observations: &[ClimateObservation]) -> Result<usize> {
        write_observations(self, "INSERT OR REPLACE INTO", "", observations)
    }

    fn fill_missing(&self, observations: &[ClimateObservation]) -> Result<usize> {
        // A synthetic placeholder yields to anything; a real reading is never touched.
        write_observations(
            self,
            "INSERT INTO",
            r#"
            ON CONFLICT(plantation_id, date) DO UPDATE SET
                temp_max_c = excluded.temp_max_c,
                temp_min_c = excluded.temp_min_c,
                temp_mean_c = excluded.temp_mean_c,
                humidity_mean_percent = excluded.humidity_mean_percent,
                precipitation_mm = excluded.precipitation_mm,
                wind_speed_ms = excluded.wind_speed_ms,
                source = excluded.source
            WHERE climate_observations.source = 'synthetic'
              AND excluded.source <> 'synthetic'
            "#,
            observations,
        )
    }
}

/// Writes observations in one transaction and returns how many rows changed.
fn write_observations(
    db: &Database,
    verb: &str,
    on_conflict: &str,
    observations: &[ClimateObservation],
) -> Result<usize> {
    let sql = format!(
        r#"
        {verb} climate_observations
            (plantation_id, date, temp_max_c, temp_min_c, temp_mean_c,
             humidity_mean_percent, precipitation_mm, wind_speed_ms, source)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        {on_conflict}
        "#
    );
    db.with_conn_mut(|conn| {
        let tx = conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(&sql)?;
            for obs in observations {
                written += stmt.execute(params![
                    obs.plantation_id,
                    obs.date.format(DATE_FORMAT).to_string(),
                    obs.temp_max_c,
                    obs.temp_min_c,
                    obs.temp_mean_c,
                    obs.humidity_mean_percent,
                    obs.precipitation_mm,
                    obs.wind_speed_ms,
                    obs.source.as_str(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(written)
    })
}

// Recommendation Queries

fn insert_recommendation(conn: &Connection, rec: &Recommendation) -> Result<i64> {
    let parameters = serde_json::to_string(&rec.parameters_used.parameters)?;
    conn.execute(
        r#"
        INSERT INTO recommendations
            (plantation_id, owner_id, kind, priority, title, description, recommended_action,
             recommended_date, due_date, status, algorithm_version, rationale, parameters,
             predictive, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
        "#,
        params![
            rec.plantation_id,
            rec.owner_id,
            rec.kind,
            rec.priority.as_str(),
            rec.title,
            rec.description,
            rec.recommended_action,
            ts(&rec.schedule.recommended_date),
            ts(&rec.schedule.due_date),
            rec.status.as_str(),
            rec.parameters_used.algorithm_version,
            rec.parameters_used.rationale,
            parameters,
            rec.predictive,
            ts(&rec.created_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn row_to_recommendation(row: &Row) -> rusqlite::Result<Recommendation> {
    let priority_str: String = row.get("priority")?;
    let status_str: String = row.get("status")?;
    let parameters_str: String = row.get("parameters")?;
    let recommended_str: String = row.get("recommended_date")?;
    let due_str: String = row.get("due_date")?;
    let created_str: String = row.get("created_at")?;

    let priority = Priority::from_str(&priority_str).unwrap_or_else(|| {
        warn!(priority = %priority_str, "Unknown priority in database, defaulting to media");
        Priority::Media
    });
    let status = RecommendationStatus::from_str(&status_str).unwrap_or_else(|| {
        warn!(status = %status_str, "Unknown status in database, defaulting to pendente");
        RecommendationStatus::Pendente
    });
    let parameters = serde_json::from_str(&parameters_str).unwrap_or_else(|e| {
        warn!(error = %e, "Unparseable recommendation parameters, ignoring");
        serde_json::Map::new()
    });

    Ok(Recommendation {
        id: Some(row.get("id")?),
        plantation_id: row.get("plantation_id")?,
        owner_id: row.get("owner_id")?,
        kind: row.get("kind")?,
        priority,
        title: row.get("title")?,
        description: row.get("description")?,
        recommended_action: row.get("recommended_action")?,
        schedule: Schedule {
            recommended_date: parse_ts(&recommended_str),
            due_date: parse_ts(&due_str),
        },
        status,
        parameters_used: ParametersUsed {
            algorithm_version: row.get("algorithm_version")?,
            rationale: row.get("rationale")?,
            parameters,
        },
        created_at: parse_ts(&created_str),
        predictive: row.get("predictive")?,
    })
}

impl Database {
    pub fn get_recommendation(&self, id: i64) -> Result<Option<Recommendation>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM recommendations WHERE id = ?1",
                [id],
                row_to_recommendation,
            )
            .optional()
            .map_err(Into::into)
        })
    }
}

impl RecommendationStore for Database {
    fn list_pending(&self, plantation_id: i64) -> Result<Vec<Recommendation>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT * FROM recommendations
                WHERE plantation_id = ?1 AND status = 'pendente'
                ORDER BY created_at DESC, id
                "#,
            )?;
            let recs = stmt
                .query_map([plantation_id], row_to_recommendation)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(recs)
        })
    }

    fn insert(&self, recommendation: &Recommendation) -> Result<i64> {
        self.with_conn(|conn| insert_recommendation(conn, recommendation))
    }

    fn update_status(&self, id: i64, status: RecommendationStatus) -> Result<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE recommendations SET status = ?1 WHERE id = ?2",
                params![status.as_str(), id],
            )?;
            if changed == 0 {
                return Err(CafeOpsError::NotFound(format!("recommendation {}", id)));
            }
            Ok(())
        })
    }

    fn has_pending_since(
        &self,
        plantation_id: i64,
        class: RateLimitClass,
        since: DateTime<Utc>,
    ) -> Result<bool> {
        self.with_conn(|conn| Ok(count_blocking(conn, plantation_id, class, since)? > 0))
    }

    fn insert_if_quiet(
        &self,
        plantation_id: i64,
        class: RateLimitClass,
        since: DateTime<Utc>,
        batch: &[Recommendation],
    ) -> Result<Option<Vec<i64>>> {
        self.with_conn_mut(|conn| {
            // IMMEDIATE takes the write lock up front, so no other writer can
            // slip a batch in between the check and the insert.
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let blocking = count_blocking(&tx, plantation_id, class, since)?;
            if blocking > 0 {
                debug!(plantation_id, class = class.as_str(), blocking, "Batch suppressed");
                return Ok(None);
            }

            let mut ids = Vec::with_capacity(batch.len());
            for rec in batch {
                ids.push(insert_recommendation(&tx, rec)?);
            }
            tx.commit()?;
            Ok(Some(ids))
        })
    }
}

/// Pending recommendations of `class` created at or after `since`.
fn count_blocking(
    conn: &Connection,
    plantation_id: i64,
    class: RateLimitClass,
    since: DateTime<Utc>,
) -> Result<i64> {
    let guard = match class {
        RateLimitClass::General => {
            r#"
            SELECT COUNT(*) FROM recommendations
            WHERE plantation_id = ?1 AND status = 'pendente' AND created_at >= ?2
            "#
        }
        RateLimitClass::Predictive => {
            r#"
            SELECT COUNT(*) FROM recommendations
            WHERE plantation_id = ?1 AND status = 'pendente' AND predictive = 1
              AND created_at >= ?2
            "#
        }
    };
    Ok(conn.query_row(guard, params![plantation_id, ts(&since)], |row| row.get(0))?)
}

trait OptionalExt<T> {
    fn optional(self) -> rusqlite::Result<Option<T>>;
}

impl<T> OptionalExt<T> for rusqlite::Result<T> {
    fn optional(self) -> rusqlite::Result<Option<T>> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ALGORITHM_VERSION;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap()
    }

    fn seed_plantation(db: &Database) -> i64 {
        let mut p = Plantation::new(
            1,
            "Sitio Alto",
            "catuai",
            Location::new(-21.2, -45.0),
            NaiveDate::from_ymd_opt(2018, 11, 1).unwrap(),
        );
        p.phase_override = Some(PhenologicalPhase::Flowering);
        p.soil_ph = Some(5.4);
        p.soil_type = Some(SoilTexture::Arenoso);
        db.create_plantation(&p).unwrap()
    }

    fn rec(plantation_id: i64, created_at: DateTime<Utc>, predictive: bool) -> Recommendation {
        Recommendation {
            id: None,
            plantation_id,
            owner_id: 1,
            kind: if predictive { "risco_geada_predictive" } else { "irrigacao" }.to_string(),
            priority: Priority::Alta,
            title: "t".to_string(),
            description: "d".to_string(),
            recommended_action: "a".to_string(),
            schedule: Schedule {
                recommended_date: created_at + Duration::days(1),
                due_date: created_at + Duration::days(3),
            },
            status: RecommendationStatus::Pendente,
            parameters_used: ParametersUsed {
                algorithm_version: ALGORITHM_VERSION.to_string(),
                rationale: "r".to_string(),
                parameters: serde_json::Map::new(),
            },
            created_at,
            predictive,
        }
    }

    #[test]
    fn plantation_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let id = seed_plantation(&db);
        let p = db.get_plantation(id).unwrap().unwrap();
        assert_eq!(p.name, "Sitio Alto");
        assert_eq!(p.phase_override, Some(PhenologicalPhase::Flowering));
        assert_eq!(p.soil_type, Some(SoilTexture::Arenoso));
        assert_eq!(p.location.latitude, -21.2);
        assert!(db.get_plantation(id + 100).unwrap().is_none());
        assert_eq!(db.list_plantations().unwrap().len(), 1);
    }

    #[test]
    fn latest_soil_sample_wins() {
        let db = Database::open_in_memory().unwrap();
        let id = seed_plantation(&db);
        db.insert_soil_sample(&SoilSample::new(
            id,
            4.8,
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
        ))
        .unwrap();
        let mut sample = SoilSample::new(id, 5.6, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
        sample.texture = Some(SoilTexture::Argiloso);
        db.insert_soil_sample(&sample).unwrap();
        let latest = db.latest_soil_sample(id).unwrap().unwrap();
        assert_eq!(latest.ph, 5.6);
        assert_eq!(latest.texture, Some(SoilTexture::Argiloso));
    }

    #[test]
    fn observations_are_most_recent_first_and_limited() {
        let db = Database::open_in_memory().unwrap();
        let id = seed_plantation(&db);
        let observations: Vec<_> = (1..=10)
            .map(|d| {
                ClimateObservation::new(
                    id,
                    NaiveDate::from_ymd_opt(2026, 10, d).unwrap(),
                    ObservationSource::Station,
                )
                .with_precipitation(d as f64)
            })
            .collect();
        assert_eq!(db.record_observations(&observations).unwrap(), 10);

        let recent = db.recent_observations(id, 7).unwrap();
        assert_eq!(recent.len(), 7);
        assert_eq!(recent[0].date, NaiveDate::from_ymd_opt(2026, 10, 10).unwrap());
        assert_eq!(recent[6].date, NaiveDate::from_ymd_opt(2026, 10, 4).unwrap());
        assert!(recent[0].temp_max_c.is_none());
    }

    #[test]
    fn recording_the_same_day_replaces_it() {
        let db = Database::open_in_memory().unwrap();
        let id = seed_plantation(&db);
        let date = NaiveDate::from_ymd_opt(2026, 10, 1).unwrap();
        db.record_observations(&[ClimateObservation::new(id, date, ObservationSource::Synthetic)
            .with_precipitation(1.0)])
            .unwrap();
        db.record_observations(&[ClimateObservation::new(id, date, ObservationSource::Station)
            .with_precipitation(9.0)])
            .unwrap();
        let recent = db.recent_observations(id, 7).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].precipitation_mm, Some(9.0));
        assert_eq!(recent[0].source, ObservationSource::Station);
    }

    #[test]
    fn fill_missing_keeps_real_readings() {
        let db = Database::open_in_memory().unwrap();
        let id = seed_plantation(&db);
        let day = |d| NaiveDate::from_ymd_opt(2026, 10, d).unwrap();
        db.record_observations(&[
            ClimateObservation::new(id, day(1), ObservationSource::Station).with_precipitation(30.0),
            ClimateObservation::new(id, day(2), ObservationSource::Synthetic).with_precipitation(1.0),
        ])
        .unwrap();

        let written = db
            .fill_missing(&[
                ClimateObservation::new(id, day(1), ObservationSource::Synthetic).with_precipitation(0.0),
                ClimateObservation::new(id, day(2), ObservationSource::Station).with_precipitation(12.0),
                ClimateObservation::new(id, day(3), ObservationSource::Synthetic).with_precipitation(2.0),
            ])
            .unwrap();
        assert_eq!(written, 2);

        let recent = db.recent_observations(id, 7).unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[2].date, day(1));
        assert_eq!(recent[2].precipitation_mm, Some(30.0));
        assert_eq!(recent[2].source, ObservationSource::Station);
        assert_eq!(recent[1].precipitation_mm, Some(12.0));
        assert_eq!(recent[1].source, ObservationSource::Station);
        assert_eq!(recent[0].source, ObservationSource::Synthetic);
    }

    #[test]
    fn synthetic_does_not_overwrite_synthetic() {
        let db = Database::open_in_memory().unwrap();
        let id = seed_plantation(&db);
        let date = NaiveDate::from_ymd_opt(2026, 10, 1).unwrap();
        db.fill_missing(&[ClimateObservation::new(id, date, ObservationSource::Synthetic)
            .with_precipitation(4.0)])
            .unwrap();
        let written = db
            .fill_missing(&[ClimateObservation::new(id, date, ObservationSource::Synthetic)
                .with_precipitation(8.0)])
            .unwrap();
        assert_eq!(written, 0);
        assert_eq!(db.recent_observations(id, 1).unwrap()[0].precipitation_mm, Some(4.0));
    }

    #[test]
    fn bad_date_reports_its_own_column() {
        let db = Database::open_in_memory().unwrap();
        let id = seed_plantation(&db);
        let expected = db
            .with_conn(|conn| {
                let stmt = conn.prepare("SELECT * FROM plantations")?;
                Ok(stmt.column_index("planting_date")?)
            })
            .unwrap();
        db.with_conn(|conn| {
            conn.execute(
                "UPDATE plantations SET planting_date = 'novembro' WHERE id = ?1",
                [id],
            )?;
            Ok(())
        })
        .unwrap();

        match db.get_plantation(id) {
            Err(CafeOpsError::Database(rusqlite::Error::FromSqlConversionFailure(idx, _, _))) => {
                assert_ne!(idx, 0);
                assert_eq!(idx, expected);
            }
            other => panic!("expected a conversion failure, got {:?}", other),
        }
    }

    #[test]
    fn set_station_code_updates_plantation() {
        let db = Database::open_in_memory().unwrap();
        let id = seed_plantation(&db);
        db.set_station_code(id, "A509").unwrap();
        let p = db.get_plantation(id).unwrap().unwrap();
        assert_eq!(p.station_code.as_deref(), Some("A509"));
        assert!(matches!(
            db.set_station_code(id + 1, "A509"),
            Err(CafeOpsError::NotFound(_))
        ));
    }

    #[test]
    fn update_status_removes_from_pending() {
        let db = Database::open_in_memory().unwrap();
        let id = seed_plantation(&db);
        let rec_id = db.insert(&rec(id, now(), false)).unwrap();
        assert_eq!(db.list_pending(id).unwrap().len(), 1);

        db.update_status(rec_id, RecommendationStatus::Concluida).unwrap();
        assert!(db.list_pending(id).unwrap().is_empty());
        let stored = db.get_recommendation(rec_id).unwrap().unwrap();
        assert_eq!(stored.status, RecommendationStatus::Concluida);

        match db.update_status(9999, RecommendationStatus::Cancelada) {
            Err(CafeOpsError::NotFound(_)) => {}
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn general_window_blocks_on_any_pending() {
        let db = Database::open_in_memory().unwrap();
        let id = seed_plantation(&db);
        db.insert(&rec(id, now() - Duration::hours(3), true)).unwrap();

        let since = now() - RateLimitClass::General.window();
        let result = db
            .insert_if_quiet(id, RateLimitClass::General, since, &[rec(id, now(), false)])
            .unwrap();
        assert!(result.is_none());
        assert_eq!(db.list_pending(id).unwrap().len(), 1);
    }

    #[test]
    fn predictive_window_ignores_general_recommendations() {
        let db = Database::open_in_memory().unwrap();
        let id = seed_plantation(&db);
        db.insert(&rec(id, now() - Duration::hours(1), false)).unwrap();

        let since = now() - RateLimitClass::Predictive.window();
        let ids = db
            .insert_if_quiet(
                id,
                RateLimitClass::Predictive,
                since,
                &[rec(id, now(), true), rec(id, now(), true)],
            )
            .unwrap()
            .unwrap();
        assert_eq!(ids.len(), 2);

        let again = db
            .insert_if_quiet(id, RateLimitClass::Predictive, since, &[rec(id, now(), true)])
            .unwrap();
        assert!(again.is_none());
    }

    #[test]
    fn old_or_concluded_recommendations_do_not_block() {
        let db = Database::open_in_memory().unwrap();
        let id = seed_plantation(&db);
        db.insert(&rec(id, now() - Duration::hours(30), false)).unwrap();
        let done = db.insert(&rec(id, now() - Duration::hours(2), false)).unwrap();
        db.update_status(done, RecommendationStatus::Concluida).unwrap();

        let since = now() - RateLimitClass::General.window();
        let ids = db
            .insert_if_quiet(id, RateLimitClass::General, since, &[rec(id, now(), false)])
            .unwrap();
        assert_eq!(ids.map(|v| v.len()), Some(1));
    }

    #[test]
    fn pending_check_matches_the_insert_guard() {
        let db = Database::open_in_memory().unwrap();
        let id = seed_plantation(&db);
        let since = now() - RateLimitClass::General.window();
        assert!(!db.has_pending_since(id, RateLimitClass::General, since).unwrap());

        db.insert(&rec(id, now() - Duration::hours(2), false)).unwrap();
        assert!(db.has_pending_since(id, RateLimitClass::General, since).unwrap());
        let since = now() - RateLimitClass::Predictive.window();
        assert!(!db.has_pending_since(id, RateLimitClass::Predictive, since).unwrap());
    }

    #[test]
    fn racing_handles_store_one_batch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();
        let first = Database::open(Some(&path)).unwrap();
        let second = Database::open(Some(&path)).unwrap();
        let id = seed_plantation(&first);
        let since = now() - RateLimitClass::General.window();
        let barrier = std::sync::Arc::new(std::sync::Barrier::new(2));

        let handles: Vec<_> = [first, second]
            .into_iter()
            .map(|db| {
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    let batch = vec![rec(id, now(), false), rec(id, now(), false)];
                    barrier.wait();
                    db.insert_if_quiet(id, RateLimitClass::General, since, &batch)
                        .unwrap()
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_some()).count(), 1);
        let check = Database::open(Some(&path)).unwrap();
        assert_eq!(check.list_pending(id).unwrap().len(), 2);
    }

    #[test]
    fn parameters_survive_storage() {
        let db = Database::open_in_memory().unwrap();
        let id = seed_plantation(&db);
        let mut r = rec(id, now(), true);
        r.parameters_used
            .parameters
            .insert("analysis".to_string(), serde_json::json!("predictive"));
        let rec_id = db.insert(&r).unwrap();
        let stored = db.get_recommendation(rec_id).unwrap().unwrap();
        assert_eq!(stored.parameters_used.parameters["analysis"], "predictive");
        assert!(stored.predictive);
        assert_eq!(stored.created_at, now());
        assert_eq!(stored.schedule, r.schedule);
    }
}
