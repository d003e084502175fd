use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use chanvision::api::{ApiState, router};
use chanvision::core::cleaning::MessageCleaner;
use chanvision::core::db::{DetectionDb, MessageRepository};
use chanvision::core::export::{DEFAULT_CSV_NAME, write_detections_csv};
use chanvision::{Config, DetectionPipeline, YoloDetector, logging};

#[derive(Parser)]
#[command(name = "chanvision")]
#[command(about = "Detect objects in scraped channel images and manage the results")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run object detection over a directory of images
    Detect {
        /// Directory of input images (defaults to DOWNLOAD_DIR)
        #[arg(value_name = "IMAGES")]
        images: Option<PathBuf>,

        /// Directory for annotated images and the CSV export
        #[arg(long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Path to the .rten detection model
        #[arg(long, value_name = "FILE")]
        model: Option<PathBuf>,

        /// Class names, one per line (defaults to COCO)
        #[arg(long, value_name = "FILE")]
        labels: Option<PathBuf>,

        /// File name of the CSV export inside the output directory
        #[arg(long, default_value = DEFAULT_CSV_NAME)]
        csv: String,

        /// Skip writing detections to the database
        #[arg(long)]
        no_db: bool,
    },
    /// Serve the detection records over HTTP
    Serve {
        /// Listen address (defaults to SERVER_ADDR)
        #[arg(long)]
        addr: Option<String>,
    },
    /// Clean a CSV export of scraped messages
    Clean {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Also replace this database table with the cleaned rows
        #[arg(long)]
        table: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Cli::parse();
    let config = Config::from_env();
    let log = logging::init(&config.log)?;

    let result = match args.command {
        Command::Detect {
            images,
            output,
            model,
            labels,
            csv,
            no_db,
        } => {
            let images = images.unwrap_or_else(|| config.scraper.download_dir.clone());
            let output = output.unwrap_or_else(|| config.output_dir.clone());
            let model = model.unwrap_or_else(|| config.model.path.clone());
            let labels = labels.or_else(|| config.model.labels.clone());
            detect(&config, images, output, model, labels, &csv, no_db).await
        }
        Command::Serve { addr } => {
            let addr = addr.unwrap_or_else(|| config.server_addr.clone());
            serve(&config, &addr).await
        }
        Command::Clean {
            input,
            output,
            table,
        } => clean(&config, input, output, table).await,
    };

    if let Err(e) = &result {
        tracing::error!("command failed: {e:#}");
    }
    log.shutdown()?;
    result
}

async fn detect(
    config: &Config,
    images: PathBuf,
    output: PathBuf,
    model: PathBuf,
    labels: Option<PathBuf>,
    csv_name: &str,
    no_db: bool,
) -> anyhow::Result<()> {
    // Connect before the run so a bad database fails fast.
    let db = if no_db {
        None
    } else {
        Some(DetectionDb::open(&config.database.connect_url()).await?)
    };

    let detector = YoloDetector::load(&model, labels.as_deref())?;
    let pipeline = DetectionPipeline::new(detector, output.clone())
        .with_transient_root(config.transient_dir.clone());

    let batch = tokio::task::spawn_blocking(move || pipeline.run(&images))
        .await
        .context("Detection run panicked")??;

    for skipped in &batch.skipped {
        println!(
            "skipped {} at {}: {}",
            skipped.image_name, skipped.stage, skipped.reason
        );
    }

    let csv_path = write_detections_csv(&batch.detections, &output, csv_name)?;
    println!("Saved {} detections to {}", batch.len(), csv_path.display());

    if let Some(db) = db {
        let inserted = db
            .insert_batch(&batch)
            .await
            .context("Failed to store detection batch; it can be retried as a whole")?;
        println!("Inserted {inserted} detections into the database");
        db.close().await;
    }
    Ok(())
}

async fn serve(config: &Config, addr: &str) -> anyhow::Result<()> {
    let db = DetectionDb::open(&config.database.connect_url()).await?;
    let app = router(ApiState { db: db.clone() });

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(addr, "record service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    db.close().await;
    Ok(())
}

async fn clean(
    config: &Config,
    input: PathBuf,
    output: PathBuf,
    table: Option<String>,
) -> anyhow::Result<()> {
    let mut cleaner = MessageCleaner::from_csv(&input)
        .with_context(|| format!("Failed to load messages from {:?}", input))?;

    let duplicates = cleaner.count_duplicates();
    let missing = cleaner.total_missing();
    println!("{} rows, {duplicates} duplicates, {missing} missing values", cleaner.rows().len());

    cleaner.remove_duplicates();
    cleaner.remove_missing_values();
    cleaner.standardize_dates()?;
    cleaner.remove_whitespaces();
    cleaner.write_csv(&output)?;
    println!("Wrote {} cleaned rows to {}", cleaner.rows().len(), output.display());

    if let Some(table) = table {
        let db = DetectionDb::connect(&config.database.connect_url()).await?;
        let rows = db.replace_messages(&table, cleaner.rows()).await?;
        println!("Saved {rows} rows to table '{table}'");
        db.close().await;
    }
    Ok(())
}
