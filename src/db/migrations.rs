use crate::db::Database;
use crate::error::Result;

const MIGRATIONS: &[&str] = &[
    // Migration 1: Initial schema
    r#"
    CREATE TABLE IF NOT EXISTS plantations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        species TEXT NOT NULL DEFAULT 'cafe',
        variety TEXT NOT NULL,
        phase_override TEXT,
        latitude REAL NOT NULL,
        longitude REAL NOT NULL,
        soil_ph REAL,
        soil_type TEXT,
        planting_date TEXT NOT NULL,
        station_code TEXT,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS soil_samples (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        plantation_id INTEGER NOT NULL REFERENCES plantations(id) ON DELETE CASCADE,
        ph REAL NOT NULL,
        texture TEXT,
        nitrogen REAL,
        phosphorus REAL,
        potassium REAL,
        analysis_date TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS climate_observations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        plantation_id INTEGER NOT NULL REFERENCES plantations(id) ON DELETE CASCADE,
        date TEXT NOT NULL,
        temp_max_c REAL,
        temp_min_c REAL,
        temp_mean_c REAL,
        humidity_mean_percent REAL,
        precipitation_mm REAL,
        wind_speed_ms REAL,
        source TEXT NOT NULL,
        UNIQUE(plantation_id, date)
    );

    CREATE TABLE IF NOT EXISTS recommendations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        plantation_id INTEGER NOT NULL REFERENCES plantations(id) ON DELETE CASCADE,
        owner_id INTEGER NOT NULL,
        kind TEXT NOT NULL,
        priority TEXT NOT NULL,
        title TEXT NOT NULL,
        description TEXT NOT NULL,
        recommended_action TEXT NOT NULL,
        recommended_date TEXT NOT NULL,
        due_date TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pendente',
        algorithm_version TEXT NOT NULL,
        rationale TEXT NOT NULL,
        parameters TEXT NOT NULL,
        predictive INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS schema_migrations (
        version INTEGER PRIMARY KEY,
        applied_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
    "#,
    // Migration 2: Add indexes
    r#"
    CREATE INDEX IF NOT EXISTS idx_soil_samples_plantation
        ON soil_samples(plantation_id, analysis_date);
    CREATE INDEX IF NOT EXISTS idx_climate_plantation_date
        ON climate_observations(plantation_id, date);
    CREATE INDEX IF NOT EXISTS idx_recommendations_pending
        ON recommendations(plantation_id, status, created_at);
    "#,
];

pub fn run(db: &Database) -> Result<()> {
    db.with_conn_mut(|conn| {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            "#,
        )?;

        let current_version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            let version = (i + 1) as i32;
            if version > current_version {
                tracing::info!(version, "Applying migration");
                let tx = conn.transaction()?;
                tx.execute_batch(migration)?;
                tx.execute(
                    "INSERT INTO schema_migrations (version) VALUES (?1)",
                    [version],
                )?;
                tx.commit()?;
            }
        }

        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let db = Database::open_in_memory().unwrap();
        run(&db).unwrap();
        let version: i32 = db
            .with_conn(|conn| {
                conn.query_row("SELECT MAX(version) FROM schema_migrations", [], |r| {
                    r.get(0)
                })
                .map_err(Into::into)
            })
            .unwrap();
        assert_eq!(version, MIGRATIONS.len() as i32);
    }
}
