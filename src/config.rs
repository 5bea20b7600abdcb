use crate::error::{CafeOpsError, Result};
use dialoguer::{Confirm, Input};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CPTEC_BASE_URL: &str = "http://servicos.cptec.inpe.br/XML";
pub const DEFAULT_INMET_BASE_URL: &str = "https://apitempo.inmet.gov.br";
const DEFAULT_STATION_RADIUS_KM: f64 = 100.0;
const MIN_TIMEOUT_SECS: u64 = 8;
const MAX_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub forecast: ForecastConfig,
    #[serde(default)]
    pub inmet: InmetConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ForecastConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub government: GovernmentSourceConfig,
    #[serde(default)]
    pub openweathermap: Option<OpenWeatherMapConfig>,
}

fn default_timeout_secs() -> u64 {
    MIN_TIMEOUT_SECS
}

impl ForecastConfig {
    /// Per-source timeout, kept within 8 to 10 seconds whatever the file says.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS))
    }
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            government: GovernmentSourceConfig::default(),
            openweathermap: None,
        }
    }
}

/// CPTEC/INPE city forecast service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GovernmentSourceConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_cptec_base_url")]
    pub base_url: String,
}

fn default_cptec_base_url() -> String {
    DEFAULT_CPTEC_BASE_URL.to_string()
}

impl Default for GovernmentSourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_cptec_base_url(),
        }
    }
}

#[derive(Clone, Deserialize, Serialize)]
pub struct OpenWeatherMapConfig {
    pub api_key: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl OpenWeatherMapConfig {
    pub fn is_usable(&self) -> bool {
        self.enabled && !self.api_key.is_empty()
    }
}

impl std::fmt::Debug for OpenWeatherMapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenWeatherMapConfig")
            .field("api_key", &"[REDACTED]")
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// INMET automatic weather stations, used to refresh stale climate history.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InmetConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_inmet_base_url")]
    pub base_url: String,
    /// Stations farther than this from a plantation are not assigned to it.
    #[serde(default = "default_station_radius_km")]
    pub search_radius_km: f64,
}

fn default_inmet_base_url() -> String {
    DEFAULT_INMET_BASE_URL.to_string()
}

fn default_station_radius_km() -> f64 {
    DEFAULT_STATION_RADIUS_KM
}

impl Default for InmetConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_inmet_base_url(),
            search_radius_km: default_station_radius_km(),
        }
    }
}

impl Config {
    pub fn load(config_override: Option<&PathBuf>) -> Result<Self> {
        let config_path = match config_override {
            Some(p) => p.clone(),
            None => Self::find_config_path()?,
        };

        if !config_path.exists() {
            return Err(CafeOpsError::Config(format!(
                "Config file not found at {:?}. Run `cafeops init` to set up.",
                config_path
            )));
        }

        let config_str = std::fs::read_to_string(&config_path)
            .map_err(|e| CafeOpsError::Config(format!("Failed to read config: {}", e)))?;

        Self::from_yaml(&config_str)
    }

    /// Parse a config document after `${VAR}` substitution.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let content = Self::substitute_env_vars(content)?;
        serde_yaml::from_str(&content)
            .map_err(|e| CafeOpsError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Search for config.yaml in standard locations.
    /// Returns the path of the first found config, or the XDG default path if none found.
    fn find_config_path() -> Result<PathBuf> {
        let local_config = PathBuf::from("config/config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let xdg_config = config_dir.join("cafeops").join("config.yaml");
            if xdg_config.exists() {
                return Ok(xdg_config);
            }
        }

        Self::default_config_path()
    }

    /// Returns true if a config file can be found in any standard location.
    pub fn exists(config_override: Option<&PathBuf>) -> bool {
        match config_override {
            Some(p) => p.exists(),
            None => Self::find_config_path()
                .map(|p| p.exists())
                .unwrap_or(false),
        }
    }

    /// Default path for writing new config files (~/.config/cafeops/config.yaml).
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CafeOpsError::Config("Cannot determine config directory".into()))?
            .join("cafeops");
        Ok(config_dir.join("config.yaml"))
    }

    /// Run interactive setup prompts and write config to disk.
    /// Returns the new Config and the path it was written to.
    pub fn setup_interactive() -> Result<(Self, PathBuf)> {
        println!();
        println!("Let's set up CafeOps!");
        println!();

        // --- Forecast sources ---
        println!("Forecast");
        let timeout_secs: u64 = Input::new()
            .with_prompt("  Source timeout in seconds (8-10)")
            .default(MIN_TIMEOUT_SECS)
            .interact_text()
            .map_err(|e| CafeOpsError::Config(format!("Input error: {}", e)))?;

        let government_enabled = Confirm::new()
            .with_prompt("  Use CPTEC/INPE forecasts for plantations in Brazil?")
            .default(true)
            .interact()
            .map_err(|e| CafeOpsError::Config(format!("Input error: {}", e)))?;

        println!();

        // --- OpenWeatherMap (optional) ---
        println!("OpenWeatherMap (leave API key blank to skip)");
        let owm_api_key: String = Input::new()
            .with_prompt("  API key")
            .default(String::new())
            .allow_empty(true)
            .interact_text()
            .map_err(|e| CafeOpsError::Config(format!("Input error: {}", e)))?;

        let openweathermap = if owm_api_key.is_empty() {
            None
        } else {
            Some(OpenWeatherMapConfig {
                api_key: owm_api_key,
                enabled: true,
            })
        };

        println!();

        // --- INMET stations ---
        println!("Climate history");
        let inmet_enabled = Confirm::new()
            .with_prompt("  Refresh stale climate data from the nearest INMET station?")
            .default(true)
            .interact()
            .map_err(|e| CafeOpsError::Config(format!("Input error: {}", e)))?;

        let search_radius_km: f64 = if inmet_enabled {
            Input::new()
                .with_prompt("  Station search radius in km")
                .default(DEFAULT_STATION_RADIUS_KM)
                .interact_text()
                .map_err(|e| CafeOpsError::Config(format!("Input error: {}", e)))?
        } else {
            DEFAULT_STATION_RADIUS_KM
        };

        println!();

        let config = Config {
            forecast: ForecastConfig {
                timeout_secs: timeout_secs.clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS),
                government: GovernmentSourceConfig {
                    enabled: government_enabled,
                    base_url: default_cptec_base_url(),
                },
                openweathermap,
            },
            inmet: InmetConfig {
                enabled: inmet_enabled,
                base_url: default_inmet_base_url(),
                search_radius_km,
            },
        };

        let config_path = Self::default_config_path()?;
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let yaml = serde_yaml::to_string(&config)
            .map_err(|e| CafeOpsError::Config(format!("Failed to serialize config: {}", e)))?;

        let content = format!(
            "# CafeOps Configuration\n# Generated by `cafeops init`\n# Environment variable substitution (${{VAR}}) is supported.\n\n{}",
            yaml
        );
        std::fs::write(&config_path, content)?;

        println!("Configuration saved to {}", config_path.display());
        println!();

        Ok((config, config_path))
    }

    fn substitute_env_vars(content: &str) -> Result<String> {
        let mut result = content.to_string();

        let re = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
            .map_err(|e| CafeOpsError::Config(format!("Invalid substitution pattern: {}", e)))?;

        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let placeholder = &cap[0];
            if let Ok(value) = std::env::var(var_name) {
                result = result.replace(placeholder, &value);
            }
        }

        Ok(result)
    }

    pub fn data_dir(data_dir_override: Option<&PathBuf>) -> Result<PathBuf> {
        // CLI override takes priority
        if let Some(dir) = data_dir_override {
            std::fs::create_dir_all(dir)?;
            return Ok(dir.clone());
        }

        if let Ok(dir) = std::env::var("CAFEOPS_DATA_DIR") {
            let p = PathBuf::from(dir);
            std::fs::create_dir_all(&p)?;
            return Ok(p);
        }

        let data_dir = dirs::data_dir()
            .ok_or_else(|| CafeOpsError::Config("Cannot determine data directory".into()))?
            .join("cafeops");

        std::fs::create_dir_all(&data_dir)?;
        Ok(data_dir)
    }

    pub fn db_path(data_dir_override: Option<&PathBuf>) -> Result<PathBuf> {
        Ok(Self::data_dir(data_dir_override)?.join("cafeops.db"))
    }
}
