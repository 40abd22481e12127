use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

mod aggregate;
mod classifier;
mod conditioning;
mod config;
mod db;
mod error;
mod features;
mod filters;
mod impute;
mod models;
mod pipeline;
mod report;

use config::PredictionConfig;
use models::{LiveScan, NewMeasurement, PredictionResponse, ScanEntry};
use pipeline::LocalizationRequest;

#[derive(Parser)]
#[command(name = "room-locator")]
#[command(about = "Wi-Fi fingerprint room localization", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a small set of seed fingerprints
    Seed,
    /// Import measurements from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Store one measurement from a JSON file
    Record {
        #[arg(long)]
        file: PathBuf,
    },
    /// List stored measurements
    List {
        #[arg(long)]
        room: Option<String>,
    },
    /// Predict the room for a live scan (JSON list of routers)
    Predict {
        #[arg(long)]
        scan: PathBuf,
        /// Measurement to leave out of the training data (repeatable)
        #[arg(long = "ignore-measurement")]
        ignore_measurements: Vec<i32>,
        #[command(flatten)]
        config: PredictionConfig,
    },
    /// Leave-one-out evaluation over all stored measurements
    Evaluate {
        #[arg(long, default_value = "evaluation.md")]
        out: PathBuf,
        #[command(flatten)]
        config: PredictionConfig,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance")?;

    let pool = db::connect(&database_url).await?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let inserted = db::seed(&pool).await?;
            println!("Inserted {inserted} seed measurements.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} measurements from {}.", csv.display());
        }
        Commands::Record { file } => {
            let contents = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let measurement: NewMeasurement =
                serde_json::from_str(&contents).context("invalid measurement JSON")?;
            match db::add_measurement(&pool, &measurement).await? {
                db::MeasurementInsert::Inserted(id) => println!("Measurement {id} added."),
                db::MeasurementInsert::Duplicate => {
                    anyhow::bail!(
                        "measurement with device_id {} and timestamp {} already exists",
                        measurement.device_id,
                        measurement.timestamp
                    )
                }
            }
        }
        Commands::List { room } => {
            let measurements = db::list_measurements(&pool, room.as_deref()).await?;
            if measurements.is_empty() {
                println!("No measurements stored.");
                return Ok(());
            }

            for measurement in measurements.iter() {
                println!(
                    "- #{} {} ({}) from {} at {}, {} routers",
                    measurement.measurement_id,
                    measurement.room_name,
                    measurement.room_id,
                    measurement.device_id,
                    measurement.timestamp,
                    measurement.routers.len()
                );
                for router in measurement.routers.iter() {
                    println!(
                        "    {} {:<20} {} dBm",
                        router.bssid, router.ssid, router.signal_strength
                    );
                }
            }
        }
        Commands::Predict {
            scan,
            ignore_measurements,
            config,
        } => {
            let contents = std::fs::read_to_string(&scan)
                .with_context(|| format!("failed to read {}", scan.display()))?;
            let entries: Vec<ScanEntry> =
                serde_json::from_str(&contents).context("invalid scan JSON")?;
            let live_scan = LiveScan::from_entries(entries);
            if live_scan.is_empty() {
                anyhow::bail!("scan contains no routers");
            }

            let readings = db::fetch_readings(&pool).await?;
            let excluded: HashSet<i32> = ignore_measurements.into_iter().collect();
            if !excluded.is_empty() {
                log::info!("ignoring measurements {:?}", excluded);
            }

            let prediction = pipeline::predict_room(&LocalizationRequest {
                readings: &readings,
                scan: &live_scan,
                config: &config,
                excluded: &excluded,
            })?;
            let room_name = db::fetch_room_name(&pool, prediction.room_id).await?;
            let response = PredictionResponse::new(&prediction, room_name);
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Evaluate { out, config } => {
            let readings = db::fetch_readings(&pool).await?;
            let room_names = db::fetch_room_names(&pool).await?;
            let evaluation = report::evaluate(&readings, &room_names, &config);
            let report = report::build_report(&config, &evaluation);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
