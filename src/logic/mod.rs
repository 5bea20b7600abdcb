pub mod advisory;
pub mod calculations;
pub mod climate_refresh;
pub mod climatology;
pub mod forecast_provider;
pub mod forecast_risk;
pub mod rules;
pub mod scheduler;

pub use advisory::{AdvisoryService, BatchReport};
pub use forecast_provider::ForecastProvider;
pub use rules::RulesEngine;
