mod cli;
mod config;
mod datasources;
mod db;
mod error;
mod logic;
mod models;

use anyhow::{anyhow, Context};
use chrono::Utc;
use clap::Parser;
use cli::{Cli, Commands};
use config::Config;
use datasources::{CptecClient, InmetClient, OpenWeatherMapClient};
use db::{Database, Fixture, RecommendationStore};
use logic::{AdvisoryService, BatchReport, ForecastProvider, RulesEngine};
use models::{Location, RecommendationStatus, VarietyKnowledgeBase};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let now = Utc::now();
    let config_path = cli.config.as_ref();
    let data_dir = cli.data_dir.as_ref();

    match cli.command {
        Commands::Init => {
            let (_, path) = Config::setup_interactive()?;
            println!("Configuration written to {}", path.display());
        }
        Commands::Check => {
            let (config, db) = open(config_path, data_dir)?;
            check(&config, &db).await?;
        }
        Commands::Import { file } => {
            let (_, db) = open(config_path, data_dir)?;
            let fixture = Fixture::from_path(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let summary = db.import_fixture(fixture)?;
            print_json(&summary)?;
        }
        Commands::Generate { plantation } => {
            let (config, db) = open(config_path, data_dir)?;
            let service = AdvisoryService::from_config(&config, db);
            match plantation {
                Some(id) => {
                    let outcome = service.generate_for_plantation(id, now).await?;
                    print_json(&serde_json::json!({ "plantation_id": id, "outcome": outcome }))?;
                }
                None => print_batch(&service.generate_all(now).await?)?,
            }
        }
        Commands::Predict { plantation } => {
            let (config, db) = open(config_path, data_dir)?;
            let service = AdvisoryService::from_config(&config, db);
            match plantation {
                Some(id) => {
                    let outcome = service.predict_for_plantation(id, now).await?;
                    print_json(&serde_json::json!({ "plantation_id": id, "outcome": outcome }))?;
                }
                None => print_batch(&service.predict_all(now).await?)?,
            }
        }
        Commands::Forecast { plantation } => {
            let (config, db) = open(config_path, data_dir)?;
            let service = AdvisoryService::from_config(&config, db);
            print_json(&service.forecast_report(plantation, now).await?)?;
        }
        Commands::List { plantation } => {
            let (_, db) = open(config_path, data_dir)?;
            print_json(&db.list_pending(plantation)?)?;
        }
        Commands::Mark {
            recommendation,
            status,
        } => {
            let (_, db) = open(config_path, data_dir)?;
            let status = RecommendationStatus::from_str(&status)
                .ok_or_else(|| anyhow!("Unknown status '{}'", status))?;
            db.update_status(recommendation, status)?;
            let updated = db
                .get_recommendation(recommendation)?
                .ok_or_else(|| anyhow!("Recommendation {} disappeared", recommendation))?;
            print_json(&updated)?;
        }
    }

    Ok(())
}

/// Config from file if one exists, defaults otherwise, plus the local store.
fn open(
    config_path: Option<&PathBuf>,
    data_dir: Option<&PathBuf>,
) -> anyhow::Result<(Config, Database)> {
    let config = if Config::exists(config_path) {
        Config::load(config_path).context("Configuration error")?
    } else {
        tracing::info!("No config file found, using defaults (run `cafeops init` to create one)");
        Config::default()
    };

    let db = Database::open(data_dir)?;
    tracing::debug!(path = %db.path().display(), "Opened database");
    Ok((config, db))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_batch(report: &BatchReport) -> anyhow::Result<()> {
    print_json(&serde_json::json!({
        "entries": report.entries,
        "created": report.created(),
        "suppressed": report.suppressed(),
        "failed": report.failed(),
    }))
}

async fn check(config: &Config, db: &Database) -> anyhow::Result<()> {
    println!("Config OK");
    println!("  Database: {}", db.path().display());
    println!("  Source timeout: {}s", config.forecast.timeout().as_secs());

    // Brasilia
    let target = Location::new(-15.8, -47.9);

    if config.forecast.government.enabled {
        let cptec = CptecClient::new(&config.forecast.government);
        print_status("CPTEC/INPE", cptec.test_connection().await);
    } else {
        println!("  CPTEC/INPE: disabled");
    }

    match config.forecast.openweathermap.as_ref().filter(|c| c.is_usable()) {
        Some(owm) => {
            let client = OpenWeatherMapClient::new(owm.clone());
            print_status("OpenWeatherMap", client.test_connection(&target).await);
        }
        None => println!("  OpenWeatherMap: not configured"),
    }

    let sources = ForecastProvider::from_config(&config.forecast).source_names();
    println!(
        "  Forecast chain: {} -> climatological",
        if sources.is_empty() {
            "(none)".to_string()
        } else {
            sources.join(" -> ")
        }
    );

    if config.inmet.enabled {
        match InmetClient::new(&config.inmet) {
            Ok(client) => print_status("INMET stations", client.test_connection().await),
            Err(e) => println!("  INMET stations: FAILED ({})", e),
        }
    } else {
        println!("  INMET stations: disabled (synthetic climate fallback)");
    }

    println!("  Varieties: {}", VarietyKnowledgeBase::new().keys().join(", "));
    println!("  Rules:");
    for (id, name, family) in RulesEngine::new().list_rules() {
        println!("    [{}] {} - {}", family.as_str(), id, name);
    }
    Ok(())
}

fn print_status(name: &str, result: error::Result<bool>) {
    match result {
        Ok(true) => println!("  {}: OK", name),
        Ok(false) => println!("  {}: unexpected response", name),
        Err(e) => println!("  {}: FAILED ({})", name, e),
    }
}
