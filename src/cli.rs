use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tabula::config::Settings;
use tabula::dataset::{DatasetProvider, Table, TableLoader};
use tabula::http;
use tabula::profiling::{DEFAULT_BINS, DEFAULT_K, DEFAULT_TOP, Params, Statistic};

#[derive(Parser)]
#[command(name = "tabula", about = "Dataset profiling service", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the statistics API (the default when no command is given)
    Serve {
        /// Address to bind. Overrides TABULA_BIND_ADDRESS.
        #[arg(long)]
        bind: Option<String>,

        /// Port to listen on. Overrides TABULA_PORT.
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Compute one statistic and print it as JSON
    Profile {
        /// Statistic to compute
        #[arg(value_enum)]
        stat: Statistic,

        /// File to profile. Defaults to DATASET_PATH.
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Column for `distribution` and `boxplot`
        #[arg(short, long)]
        column: Option<String>,

        /// Histogram bins (clamped to 5..=100)
        #[arg(long, default_value_t = DEFAULT_BINS)]
        bins: usize,

        /// Categories listed by `distribution` (clamped to 5..=50)
        #[arg(long, default_value_t = DEFAULT_TOP)]
        top: usize,

        /// Values per column for `topk` (clamped to 1..=50)
        #[arg(short, long, default_value_t = DEFAULT_K)]
        k: usize,
    },
}

pub fn run_command(command: Commands, settings: Settings) -> Result<()> {
    match command {
        Commands::Serve { bind, port } => handle_serve(settings, bind, port),
        Commands::Profile {
            stat,
            file,
            column,
            bins,
            top,
            k,
        } => handle_profile(
            &settings,
            stat,
            file,
            Params {
                column,
                bins,
                top,
                k,
            },
        ),
    }
}

fn handle_serve(mut settings: Settings, bind: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(bind) = bind {
        settings.bind_address = bind;
    }
    if let Some(port) = port {
        settings.port = port;
    }
    http::serve(&settings)
}

fn handle_profile(
    settings: &Settings,
    stat: Statistic,
    file: Option<PathBuf>,
    params: Params,
) -> Result<()> {
    let table: Arc<Table> = match file {
        Some(path) => Arc::new(
            TableLoader::new(settings.sniff_sample_bytes)
                .load_path(&path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
        ),
        None => DatasetProvider::from_settings(settings)
            .current()
            .context("Failed to load the configured dataset")?,
    };

    let value = stat.evaluate(&table, &params)?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory as _;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_profile_arguments() {
        let cli = Cli::try_parse_from([
            "tabula", "profile", "nulls-per-column", "--file", "data.csv",
        ])
        .expect("valid arguments");
        match cli.command {
            Some(Commands::Profile { stat, file, bins, .. }) => {
                assert_eq!(stat, Statistic::NullsPerColumn);
                assert_eq!(file, Some(PathBuf::from("data.csv")));
                assert_eq!(bins, DEFAULT_BINS);
            }
            _ => panic!("expected the profile command"),
        }
    }

    #[test]
    fn test_no_command_means_serve() {
        let cli = Cli::try_parse_from(["tabula"]).expect("valid arguments");
        assert!(cli.command.is_none(), "main falls back to serve");
    }
}
