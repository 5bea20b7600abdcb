use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "cafeops",
    version,
    about = "Agronomic recommendations for coffee plantations"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config.yaml
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override SQLite data directory
    #[arg(short, long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run interactive setup
    Init,
    /// Validate config and test connections
    Check,
    /// Load plantations, soil samples and observations from a JSON file
    Import {
        file: PathBuf,
    },
    /// Generate soil, climate and phase recommendations
    Generate {
        /// Only this plantation (default: all)
        #[arg(short, long)]
        plantation: Option<i64>,
    },
    /// Generate recommendations from the 5-day forecast
    Predict {
        /// Only this plantation (default: all)
        #[arg(short, long)]
        plantation: Option<i64>,
    },
    /// Show the 5-day forecast and its risks without saving anything
    Forecast {
        plantation: i64,
    },
    /// List pending recommendations for a plantation
    List {
        plantation: i64,
    },
    /// Set the status of a recommendation
    Mark {
        recommendation: i64,
        /// pendente, concluida, cancelada or vencida
        status: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["cafeops", "generate", "--plantation", "3", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Generate { plantation: Some(3) }));
    }

    #[test]
    fn mark_takes_id_and_status() {
        let cli = Cli::try_parse_from(["cafeops", "mark", "12", "concluida"]).unwrap();
        match cli.command {
            Commands::Mark {
                recommendation,
                status,
            } => {
                assert_eq!(recommendation, 12);
                assert_eq!(status, "concluida");
            }
            _ => panic!("expected mark"),
        }
    }
}
