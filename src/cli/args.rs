use crate::config::FailurePolicy;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "crag-etl")]
#[command(about = "Crag catalogue ETL with hourly weather enrichment and a DuckDB star schema")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,

    #[arg(long, global = true, help = "TOML configuration file")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full pipeline from catalogue to star schema
    Run {
        #[arg(short, long, help = "Crag catalogue JSON file")]
        input: PathBuf,

        #[arg(long, help = "Directory for intermediate Parquet snapshots")]
        snapshot_dir: Option<PathBuf>,

        #[arg(short, long, help = "DuckDB database file")]
        database: Option<PathBuf>,

        #[arg(short, long)]
        compression: Option<String>,

        #[arg(long, help = "Cap on distinct coordinates sent to the weather provider")]
        max_coordinates: Option<usize>,

        #[arg(long, value_enum)]
        failure_policy: Option<FailurePolicy>,

        #[arg(long, default_value = "false", help = "Check expectations after the run")]
        check: bool,
    },

    /// Check crag and weather snapshots against the output expectations
    Validate {
        #[arg(short, long, help = "Directory holding crags.parquet and cleaned_weather.parquet")]
        snapshot_dir: Option<PathBuf>,

        #[arg(long, requires = "weather_rows", help = "Exact crag row count to require")]
        crag_rows: Option<usize>,

        #[arg(long, requires = "crag_rows", help = "Exact weather row count to require")]
        weather_rows: Option<usize>,
    },

    /// Display information about a Parquet snapshot
    Info {
        #[arg(short, long)]
        file: PathBuf,

        #[arg(short, long, default_value = "10")]
        sample: usize,
    },
}
