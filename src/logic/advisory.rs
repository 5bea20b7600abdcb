use super::calculations::{round1, ClimateWindow};
use super::climate_refresh::ClimateRefresher;
use super::forecast_provider::ForecastProvider;
use super::forecast_risk::ForecastRiskAnalyzer;
use super::rules::{RuleContext, RuleFamily, RulesEngine};
use super::scheduler::{Commit, RecommendationScheduler};
use crate::config::Config;
use crate::datasources::{InmetClient, ObservationArchive};
use crate::db::{Database, PlantationStore};
use crate::error::{CafeOpsError, Result};
use crate::models::{
    Finding, Forecast, NutrientLevels, PhenologicalPhase, PhenologyCalendar, Plantation,
    Priority, RateLimitClass, SoilSnapshot, VarietyKnowledgeBase, WaterNeed,
};
use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;

/// Per-plantation result of a generation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Created(usize),
    Suppressed,
    Failed(String),
}

impl From<Commit> for Outcome {
    fn from(commit: Commit) -> Self {
        match commit {
            Commit::Created(ids) => Outcome::Created(ids.len()),
            Commit::Suppressed => Outcome::Suppressed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchEntry {
    pub plantation_id: i64,
    pub name: String,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub entries: Vec<BatchEntry>,
}

impl BatchReport {
    pub fn created(&self) -> usize {
        self.entries
            .iter()
            .map(|e| match e.outcome {
                Outcome::Created(n) => n,
                _ => 0,
            })
            .sum()
    }

    pub fn suppressed(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.outcome == Outcome::Suppressed)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.outcome, Outcome::Failed(_)))
            .count()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastSummary {
    pub total: usize,
    pub urgent: usize,
    pub high: usize,
    pub precipitation_total_mm: f64,
    pub next_risk: Option<Finding>,
}

/// Forecast plus the alerts it raises, without persisting anything.
#[derive(Debug, Clone, Serialize)]
pub struct ForecastReport {
    pub plantation: Plantation,
    pub phase: PhenologicalPhase,
    pub water_need: WaterNeed,
    pub care: &'static str,
    pub forecast: Forecast,
    pub alerts: Vec<Finding>,
    pub summary: ForecastSummary,
}

/// Runs the rule families and the forecast analyzer for plantations and
/// hands the results to the scheduler.
pub struct AdvisoryService {
    db: Database,
    varieties: VarietyKnowledgeBase,
    calendar: PhenologyCalendar,
    rule_families: Vec<(RuleFamily, RulesEngine)>,
    analyzer: ForecastRiskAnalyzer,
    scheduler: RecommendationScheduler,
    forecasts: ForecastProvider,
    climate: ClimateRefresher,
}

impl AdvisoryService {
    pub fn new(db: Database, forecasts: ForecastProvider, climate: ClimateRefresher) -> Self {
        Self {
            db,
            varieties: VarietyKnowledgeBase::new(),
            calendar: PhenologyCalendar::new(),
            rule_families: vec![
                (RuleFamily::Soil, RulesEngine::soil()),
                (RuleFamily::Climate, RulesEngine::historical_climate()),
                (RuleFamily::Phase, RulesEngine::phase()),
            ],
            analyzer: ForecastRiskAnalyzer::new(),
            scheduler: RecommendationScheduler::new(),
            forecasts,
            climate,
        }
    }

    /// Wire up remote sources from config. Without INMET, stale climate
    /// windows are filled synthetically.
    pub fn from_config(config: &Config, db: Database) -> Self {
        let archive: Option<Box<dyn ObservationArchive>> = if config.inmet.enabled {
            match InmetClient::new(&config.inmet) {
                Ok(client) => Some(Box::new(client)),
                Err(e) => {
                    tracing::warn!("Failed to build INMET client: {}", e);
                    None
                }
            }
        } else {
            tracing::debug!("INMET disabled");
            None
        };

        Self::new(
            db,
            ForecastProvider::from_config(&config.forecast),
            ClimateRefresher::new(archive),
        )
    }

    fn load(&self, plantation_id: i64) -> Result<Plantation> {
        self.db
            .get_plantation(plantation_id)?
            .ok_or_else(|| CafeOpsError::NotFound(format!("plantation {}", plantation_id)))
    }

    fn phase_for(&self, plantation: &Plantation, now: DateTime<Utc>) -> PhenologicalPhase {
        self.calendar.resolve(plantation.phase_override, now.month())
    }

    /// Latest soil sample, else the plantation's own pH and soil type.
    fn soil_for(&self, plantation: &Plantation, plantation_id: i64) -> Result<Option<SoilSnapshot>> {
        let snapshot = match self.db.latest_soil_sample(plantation_id)? {
            Some(sample) => {
                let mut snap = SoilSnapshot::from_sample(&sample);
                snap.texture = snap.texture.or(plantation.soil_type);
                snap
            }
            None => SoilSnapshot {
                ph: plantation.soil_ph,
                texture: plantation.soil_type,
                nutrients: NutrientLevels::default(),
            },
        };
        Ok((!snapshot.is_empty()).then_some(snapshot))
    }

    /// Soil, historical-climate and phase rules; persisted unless a pending
    /// recommendation was created in the last 24 hours.
    pub async fn generate_for_plantation(
        &self,
        plantation_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Outcome> {
        let plantation = self.load(plantation_id)?;
        let variety = self.varieties.lookup(&plantation.variety)?;
        if self
            .scheduler
            .window_occupied(&self.db, plantation_id, RateLimitClass::General, now)?
        {
            tracing::info!(plantation_id, "Pending recommendations from the last 24h, skipping");
            return Ok(Outcome::Suppressed);
        }

        let phase = self.phase_for(&plantation, now);
        let soil = self.soil_for(&plantation, plantation_id)?;

        let observations = self.climate.current_window(&self.db, &plantation, now).await?;
        let window = ClimateWindow::from_observations(&observations);

        let ctx = RuleContext {
            variety_key: &plantation.variety,
            variety,
            phase,
            soil,
            climate: &window,
        };

        let mut findings = Vec::new();
        for (family, engine) in &self.rule_families {
            if *family == RuleFamily::Soil && soil.is_none() {
                tracing::debug!(plantation_id, "No soil data, skipping soil rules");
                continue;
            }
            let family_findings = engine.evaluate(&ctx);
            tracing::debug!(
                plantation_id,
                family = family.as_str(),
                findings = family_findings.len(),
                "Rule family evaluated"
            );
            findings.extend(family_findings);
        }
        tracing::debug!(
            plantation_id,
            phase = phase.as_str(),
            observations = window.observation_count,
            findings = findings.len(),
            "Rules evaluated"
        );

        let batch = self
            .scheduler
            .schedule(&plantation, findings, RateLimitClass::General, now)?;
        let commit =
            self.scheduler
                .commit(&self.db, plantation_id, RateLimitClass::General, &batch, now)?;
        Ok(commit.into())
    }

    /// Forecast risk alerts; persisted unless a pending predictive
    /// recommendation was created in the last 6 hours.
    pub async fn predict_for_plantation(
        &self,
        plantation_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Outcome> {
        let plantation = self.load(plantation_id)?;
        let variety = self.varieties.lookup(&plantation.variety)?;
        if self
            .scheduler
            .window_occupied(&self.db, plantation_id, RateLimitClass::Predictive, now)?
        {
            tracing::info!(plantation_id, "Pending forecast alerts from the last 6h, skipping");
            return Ok(Outcome::Suppressed);
        }

        let phase = self.phase_for(&plantation, now);

        let forecast = self
            .forecasts
            .five_day_forecast(&plantation.location, now)
            .await;
        let alerts = self.analyzer.analyze(&forecast.days, variety, phase);
        tracing::debug!(
            plantation_id,
            origin = forecast.origin.as_str(),
            alerts = alerts.len(),
            "Forecast analyzed"
        );

        let batch = self
            .scheduler
            .schedule(&plantation, alerts, RateLimitClass::Predictive, now)?;
        let commit = self.scheduler.commit(
            &self.db,
            plantation_id,
            RateLimitClass::Predictive,
            &batch,
            now,
        )?;
        Ok(commit.into())
    }

    pub async fn forecast_report(
        &self,
        plantation_id: i64,
        now: DateTime<Utc>,
    ) -> Result<ForecastReport> {
        let plantation = self.load(plantation_id)?;
        let variety = self.varieties.lookup(&plantation.variety)?;
        let phase = self.phase_for(&plantation, now);

        let forecast = self
            .forecasts
            .five_day_forecast(&plantation.location, now)
            .await;
        let alerts = self.analyzer.analyze(&forecast.days, variety, phase);

        let summary = ForecastSummary {
            total: alerts.len(),
            urgent: alerts
                .iter()
                .filter(|a| a.priority == Priority::Urgente)
                .count(),
            high: alerts.iter().filter(|a| a.priority == Priority::Alta).count(),
            precipitation_total_mm: round1(forecast.total_precipitation()),
            next_risk: alerts.first().cloned(),
        };
        let entry = self.calendar.entry(phase);

        Ok(ForecastReport {
            plantation,
            phase,
            water_need: entry.water_need,
            care: entry.care,
            forecast,
            alerts,
            summary,
        })
    }

    pub async fn generate_all(&self, now: DateTime<Utc>) -> Result<BatchReport> {
        let plantations = self.db.list_plantations()?;
        let mut report = BatchReport::default();

        // One plantation at a time.
        for plantation in plantations {
            let Some(id) = plantation.id else { continue };
            let outcome = match self.generate_for_plantation(id, now).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!(plantation = %plantation.label(), error = %e, "Generation failed");
                    Outcome::Failed(e.to_string())
                }
            };
            report.entries.push(BatchEntry {
                plantation_id: id,
                name: plantation.name,
                outcome,
            });
        }

        Ok(report)
    }

    pub async fn predict_all(&self, now: DateTime<Utc>) -> Result<BatchReport> {
        let plantations = self.db.list_plantations()?;
        let mut report = BatchReport::default();

        for plantation in plantations {
            let Some(id) = plantation.id else { continue };
            let outcome = match self.predict_for_plantation(id, now).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!(
                        plantation = %plantation.label(),
                        error = %e,
                        "Predictive generation failed"
                    );
                    Outcome::Failed(e.to_string())
                }
            };
            report.entries.push(BatchEntry {
                plantation_id: id,
                name: plantation.name,
                outcome,
            });
        }

        Ok(report)
    }
}
