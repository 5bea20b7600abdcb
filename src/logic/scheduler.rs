use crate::db::RecommendationStore;
use crate::error::{CafeOpsError, Result};
use crate::models::{
    Finding, ParametersUsed, Plantation, RateLimitClass, Recommendation, RecommendationStatus,
    Schedule, ALGORITHM_VERSION,
};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::Value;

const TITLE_MAX_CHARS: usize = 200;
const DESCRIPTION_MAX_CHARS: usize = 1000;
const ACTION_MAX_CHARS: usize = 500;

const PREDICTIVE_SUFFIX: &str = "_predictive";
const FORECAST_PREFIX: &str = "FORECAST: ";

/// Result of committing one plantation's batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Commit {
    Created(Vec<i64>),
    /// A recent pending recommendation of the same class held the batch back.
    Suppressed,
}

/// Turns findings into scheduled recommendations and persists them behind
/// the rate-limit window of their class.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecommendationScheduler;

impl RecommendationScheduler {
    pub fn new() -> Self {
        Self
    }

    /// Priority descending, then soonest lead time. Stable for equal keys.
    pub fn order(findings: &mut [Finding]) {
        findings.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.lead_time().cmp(&b.lead_time()))
        });
    }

    pub fn schedule(
        &self,
        plantation: &Plantation,
        mut findings: Vec<Finding>,
        class: RateLimitClass,
        now: DateTime<Utc>,
    ) -> Result<Vec<Recommendation>> {
        let plantation_id = plantation
            .id
            .ok_or_else(|| CafeOpsError::InvalidData("plantation has no id".into()))?;

        Self::order(&mut findings);

        Ok(findings
            .into_iter()
            .map(|finding| match class {
                RateLimitClass::General => {
                    to_recommendation(plantation_id, plantation.owner_id, finding, now)
                }
                RateLimitClass::Predictive => {
                    to_predictive(plantation_id, plantation.owner_id, finding, now)
                }
            })
            .collect())
    }

    /// Whether the class window already holds a pending recommendation.
    /// `commit` checks again atomically.
    pub fn window_occupied<S: RecommendationStore + ?Sized>(
        &self,
        store: &S,
        plantation_id: i64,
        class: RateLimitClass,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        store.has_pending_since(plantation_id, class, now - class.window())
    }

    /// Insert the batch unless the class window is still occupied.
    pub fn commit<S: RecommendationStore + ?Sized>(
        &self,
        store: &S,
        plantation_id: i64,
        class: RateLimitClass,
        batch: &[Recommendation],
        now: DateTime<Utc>,
    ) -> Result<Commit> {
        let since = now - class.window();
        match store.insert_if_quiet(plantation_id, class, since, batch)? {
            Some(ids) => {
                tracing::info!(
                    plantation_id,
                    class = class.as_str(),
                    count = ids.len(),
                    "Recommendations created"
                );
                Ok(Commit::Created(ids))
            }
            None => {
                tracing::info!(
                    plantation_id,
                    class = class.as_str(),
                    "Pending recommendations inside the rate-limit window; batch suppressed"
                );
                Ok(Commit::Suppressed)
            }
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn to_recommendation(
    plantation_id: i64,
    owner_id: i64,
    finding: Finding,
    now: DateTime<Utc>,
) -> Recommendation {
    let schedule = Schedule {
        recommended_date: now + Duration::days(1),
        due_date: now + Duration::days(finding.priority.due_in_days()),
    };

    Recommendation {
        id: None,
        plantation_id,
        owner_id,
        kind: finding.kind,
        priority: finding.priority,
        title: truncate(&finding.title, TITLE_MAX_CHARS),
        description: truncate(&finding.description, DESCRIPTION_MAX_CHARS),
        recommended_action: truncate(&finding.action, ACTION_MAX_CHARS),
        schedule,
        status: RecommendationStatus::Pendente,
        parameters_used: ParametersUsed {
            algorithm_version: ALGORITHM_VERSION.to_string(),
            rationale: finding.rationale,
            parameters: finding.parameters,
        },
        created_at: now,
        predictive: false,
    }
}

fn to_predictive(
    plantation_id: i64,
    owner_id: i64,
    mut finding: Finding,
    now: DateTime<Utc>,
) -> Recommendation {
    let alert_kind = finding.kind.clone();

    finding
        .parameters
        .insert("analysis".to_string(), Value::from("predictive"));
    if let Some(ctx) = finding.forecast {
        finding.parameters.insert(
            "event_date".to_string(),
            Value::from(ctx.event_date.format("%Y-%m-%d").to_string()),
        );
    }
    finding.parameters.insert(
        "generated_at".to_string(),
        Value::from(now.to_rfc3339_opts(SecondsFormat::Secs, true)),
    );

    finding.kind = format!("{}{}", alert_kind, PREDICTIVE_SUFFIX);
    finding.description = format!("{}{}", FORECAST_PREFIX, finding.description);
    finding.rationale = format!("predictive analysis - {}", alert_kind);

    let mut rec = to_recommendation(plantation_id, owner_id, finding, now);
    rec.predictive = true;
    rec
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{Location, Priority};
    use chrono::{NaiveDate, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap()
    }

    fn plantation(db: &Database) -> Plantation {
        let mut p = Plantation::new(
            3,
            "Fazenda Boa Vista",
            "catuai",
            Location::new(-21.2, -45.0),
            NaiveDate::from_ymd_opt(2015, 1, 10).unwrap(),
        );
        p.id = Some(db.create_plantation(&p).unwrap());
        p
    }

    fn finding(priority: Priority) -> Finding {
        Finding::new("irrigacao", priority, priority.as_str(), "desc")
    }

    #[test]
    fn orders_by_priority_descending() {
        let mut findings = vec![
            finding(Priority::Media),
            finding(Priority::Urgente),
            finding(Priority::Alta),
            finding(Priority::Baixa),
        ];
        RecommendationScheduler::order(&mut findings);
        let order: Vec<_> = findings.iter().map(|f| f.priority).collect();
        assert_eq!(
            order,
            vec![Priority::Urgente, Priority::Alta, Priority::Media, Priority::Baixa]
        );
    }

    #[test]
    fn ties_break_on_lead_time() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 21).unwrap();
        let mut findings = vec![
            finding(Priority::Media).with_forecast(3, date),
            finding(Priority::Media).with_forecast(1, date),
            finding(Priority::Alta).with_forecast(5, date),
        ];
        RecommendationScheduler::order(&mut findings);
        let leads: Vec<_> = findings.iter().map(|f| f.lead_time()).collect();
        assert_eq!(leads, vec![5, 1, 3]);
    }

    #[test]
    fn due_dates_follow_priority() {
        let db = Database::open_in_memory().unwrap();
        let p = plantation(&db);
        let recs = RecommendationScheduler::new()
            .schedule(
                &p,
                vec![
                    finding(Priority::Urgente),
                    finding(Priority::Alta),
                    finding(Priority::Baixa),
                ],
                RateLimitClass::General,
                now(),
            )
            .unwrap();

        for rec in &recs {
            assert_eq!(rec.schedule.recommended_date, now() + Duration::days(1));
            assert!(rec.schedule.due_date >= rec.schedule.recommended_date);
            assert!(rec.schedule.recommended_date >= rec.created_at);
            assert_eq!(rec.status, RecommendationStatus::Pendente);
            assert_eq!(rec.owner_id, 3);
        }
        assert_eq!(recs[0].schedule.due_date, now() + Duration::days(1));
        assert_eq!(recs[1].schedule.due_date, now() + Duration::days(3));
        assert_eq!(recs[2].schedule.due_date, now() + Duration::days(7));
    }

    #[test]
    fn long_text_is_truncated_by_characters() {
        let db = Database::open_in_memory().unwrap();
        let p = plantation(&db);
        let long = "ç".repeat(1200);
        let f = Finding::new("x", Priority::Media, long.clone(), long.clone()).with_action(long);
        let recs = RecommendationScheduler::new()
            .schedule(&p, vec![f], RateLimitClass::General, now())
            .unwrap();
        assert_eq!(recs[0].title.chars().count(), 200);
        assert_eq!(recs[0].description.chars().count(), 1000);
        assert_eq!(recs[0].recommended_action.chars().count(), 500);
    }

    #[test]
    fn predictive_findings_are_tagged() {
        let db = Database::open_in_memory().unwrap();
        let p = plantation(&db);
        let event = NaiveDate::from_ymd_opt(2026, 10, 20).unwrap();
        let alert = Finding::new("risco_geada", Priority::Urgente, "Frost risk in 2 days", "Cold")
            .with_param("temp_min", 3.0)
            .with_forecast(2, event);

        let recs = RecommendationScheduler::new()
            .schedule(&p, vec![alert], RateLimitClass::Predictive, now())
            .unwrap();
        let rec = &recs[0];
        assert!(rec.predictive);
        assert_eq!(rec.kind, "risco_geada_predictive");
        assert_eq!(rec.description, "FORECAST: Cold");
        assert_eq!(rec.parameters_used.rationale, "predictive analysis - risco_geada");
        let params = &rec.parameters_used.parameters;
        assert_eq!(params["analysis"], "predictive");
        assert_eq!(params["event_date"], "2026-10-20");
        assert_eq!(params["generated_at"], "2026-10-18T09:00:00Z");
        assert_eq!(params["temp_min"], 3.0);
    }

    #[test]
    fn second_general_commit_within_a_day_is_suppressed() {
        let db = Database::open_in_memory().unwrap();
        let p = plantation(&db);
        let scheduler = RecommendationScheduler::new();
        let id = p.id.unwrap();

        let batch = scheduler
            .schedule(&p, vec![finding(Priority::Alta)], RateLimitClass::General, now())
            .unwrap();
        let first = scheduler
            .commit(&db, id, RateLimitClass::General, &batch, now())
            .unwrap();
        assert!(matches!(first, Commit::Created(ref ids) if ids.len() == 1));

        let later = now() + Duration::hours(23);
        assert!(scheduler
            .window_occupied(&db, id, RateLimitClass::General, later)
            .unwrap());
        assert!(!scheduler
            .window_occupied(&db, id, RateLimitClass::Predictive, later)
            .unwrap());
        let batch = scheduler
            .schedule(&p, vec![finding(Priority::Alta)], RateLimitClass::General, later)
            .unwrap();
        let second = scheduler
            .commit(&db, id, RateLimitClass::General, &batch, later)
            .unwrap();
        assert_eq!(second, Commit::Suppressed);
        assert_eq!(db.list_pending(id).unwrap().len(), 1);

        let next_day = now() + Duration::hours(25);
        assert!(!scheduler
            .window_occupied(&db, id, RateLimitClass::General, next_day)
            .unwrap());
        let third = scheduler
            .commit(&db, id, RateLimitClass::General, &batch, next_day)
            .unwrap();
        assert!(matches!(third, Commit::Created(_)));
    }
}
