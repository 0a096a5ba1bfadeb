use crate::cli::args::{Cli, Commands};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::pipeline::Pipeline;
use crate::processors::ExpectationChecker;
use crate::utils::constants::{CLEANED_WEATHER_SNAPSHOT, CRAG_SNAPSHOT};
use crate::utils::logging::init_logging;
use crate::weather::{OpenMeteoClient, WeatherProvider};
use crate::writers::ParquetWriter;
use std::path::Path;

pub async fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose, cli.log_file.as_deref())?;
    let mut config = PipelineConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            input,
            snapshot_dir,
            database,
            compression,
            max_coordinates,
            failure_policy,
            check,
        } => {
            if let Some(dir) = snapshot_dir {
                config.snapshot_dir = dir;
            }
            if let Some(path) = database {
                config.database_path = path;
            }
            if let Some(compression) = compression {
                config.compression = compression;
            }
            if let Some(cap) = max_coordinates {
                config.weather.max_coordinates = cap;
            }
            if let Some(policy) = failure_policy {
                config.weather.failure_policy = policy;
            }

            println!("Running crag pipeline...");
            println!("Input catalogue: {}", input.display());
            println!("Snapshots: {}", config.snapshot_dir.display());
            println!("Database: {}", config.database_path.display());

            let client = OpenMeteoClient::new(&config.weather)?;
            println!(
                "Weather provider: {} (max {} coordinates, {:?} on failure)",
                client.name(),
                config.weather.max_coordinates,
                config.weather.failure_policy
            );

            let pipeline = Pipeline::new(config, client)?.with_progress(!cli.verbose);
            let summary = pipeline.run(&input).await?;

            println!("\n{}", summary.summary());

            if check {
                check_snapshots(&pipeline.config().snapshot_dir, ExpectationChecker::new())?;
            }

            println!("Pipeline complete!");
        }

        Commands::Validate {
            snapshot_dir,
            crag_rows,
            weather_rows,
        } => {
            let dir = snapshot_dir.unwrap_or(config.snapshot_dir);
            println!("Validating snapshots in {}", dir.display());

            let checker = match (crag_rows, weather_rows) {
                (Some(crags), Some(weather)) => {
                    ExpectationChecker::new().with_row_counts(crags, weather)
                }
                _ => ExpectationChecker::new(),
            };

            check_snapshots(&dir, checker)?;
        }

        Commands::Info { file, sample } => {
            println!("Analyzing Parquet file: {}", file.display());

            let writer = ParquetWriter::new();
            let file_info = writer.get_file_info(&file)?;

            println!("\nFile Details:");
            println!("{}", file_info.summary());

            if sample > 0 {
                println!("\nSample Rows (showing up to {}):", sample);
                match writer.read_sample_rows(&file, sample) {
                    Ok(rows) => {
                        for (i, row) in rows.iter().enumerate() {
                            if i == 0 {
                                println!("   {}", row.join(" | "));
                            } else {
                                println!("{}. {}", i, row.join(" | "));
                            }
                        }
                    }
                    Err(e) => println!("Error reading sample data: {}", e),
                }
            }
        }
    }

    Ok(())
}

/// Read the crag and cleaned weather snapshots and print the expectation
/// report. Any failed expectation fails the command.
fn check_snapshots(dir: &Path, checker: ExpectationChecker) -> Result<()> {
    let report = checker.check_files(
        &dir.join(CRAG_SNAPSHOT),
        &dir.join(CLEANED_WEATHER_SNAPSHOT),
    )?;
    println!("\n{}", checker.generate_summary(&report));

    if report.success() {
        println!("✅ All expectations met");
        Ok(())
    } else {
        Err(PipelineError::InvalidFormat(format!(
            "{} expectations failed",
            report.failures().len()
        )))
    }
}
