use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

mod apis;
mod cleaning;
mod config;
#[cfg(feature = "db")]
mod db;
mod error;
mod loader;
mod logging;
mod pipeline;
mod storage;
mod types;

use crate::config::Config;
use crate::loader::IncrementalLoader;
use crate::pipeline::{collect_for_api, CleaningPipeline};
use crate::storage::Storage;
use std::path::Path;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "jobmarket_scraper")]
#[command(about = "Job market posting collection and cleaning pipeline")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch postings from the provider APIs into batch files
    Collect {
        /// Specific APIs to run (comma-separated). Available: adzuna, usajobs, jooble
        #[arg(long)]
        apis: Option<String>,
    },
    /// Load collected batch files into the raw store, skipping known ids
    LoadRaw,
    /// Run the cleaning pipeline and publish the cleaned table
    Clean,
    /// Run collect, load and clean sequentially
    Run {
        /// Specific APIs to run (comma-separated)
        #[arg(long)]
        apis: Option<String>,
    },
}

#[cfg(feature = "db")]
async fn build_storage() -> anyhow::Result<Arc<dyn Storage>> {
    let manager = db::DatabaseManager::new().await?;
    manager.run_migrations().await?;
    Ok(Arc::new(db::DatabaseStorage::new(manager)))
}

#[cfg(not(feature = "db"))]
async fn build_storage() -> anyhow::Result<Arc<dyn Storage>> {
    warn!("Built without the `db` feature; using in-memory storage (data is not persisted)");
    Ok(Arc::new(storage::InMemoryStorage::new()))
}

fn parse_api_names(apis: Option<String>) -> Vec<String> {
    match apis {
        Some(list) => list.split(',').map(|s| s.trim().to_string()).collect(),
        None => apis::supported_apis()
            .into_iter()
            .map(str::to_string)
            .collect(),
    }
}

async fn run_collectors(api_names: &[String], config: &Config) {
    for api_name in api_names {
        let api = match apis::create_api(api_name, &config.collection) {
            Ok(api) => api,
            Err(e) => {
                warn!("Skipping API {}: {}", api_name, e);
                println!("⚠️  Skipping {api_name}: {e}");
                continue;
            }
        };

        match collect_for_api(api, &config.collection).await {
            Ok(report) => {
                println!("\n📊 Collection results for {}:", report.api_name);
                println!("   Searches: {}", report.searches);
                println!("   Fetched: {}", report.fetched);
                println!("   Unique: {}", report.unique);
                println!("   Errors: {}", report.errors.len());
                if let Some(file) = &report.output_file {
                    println!("   Output file: {file}");
                }
            }
            Err(e) => {
                error!("Collection failed for {}: {}", api_name, e);
                println!("❌ Collection failed for {api_name}: {e}");
            }
        }
    }
}

async fn run_loader(storage: Arc<dyn Storage>, config: &Config) -> anyhow::Result<()> {
    let loader = IncrementalLoader::new(storage);
    let report = loader.run(Path::new(&config.collection.batch_dir)).await?;

    println!("\n📊 Incremental load results:");
    println!("   Loaded: {}", report.loaded);
    println!("   Duplicates skipped: {}", report.skipped_duplicates);
    println!("   Batches rejected: {}", report.rejected_batches);
    println!("   Write failures: {}", report.failed_batches);
    Ok(())
}

async fn run_cleaning(storage: Arc<dyn Storage>, config: &Config) -> anyhow::Result<()> {
    let pipeline = CleaningPipeline::new(storage, config.cleaning.clone());
    let report = pipeline.run().await?;

    println!("\n📊 Cleaning results (run {}):", report.run_id);
    println!("   Raw records: {}", report.stats.raw_records);
    println!("   Published: {}", report.stats.published);
    println!("   Missing state dropped: {}", report.stats.missing_state_dropped);
    println!("   Excluded source dropped: {}", report.stats.excluded_source_dropped);
    println!("   Duplicates removed: {}", report.stats.duplicates_removed);
    println!("   Per-unit dropped: {}", report.stats.per_unit_dropped);
    println!("   Imputed salaries: {}", report.stats.imputed);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize logging
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Collect { apis } => {
            println!("🕷️  Running collectors...");
            let api_names = parse_api_names(apis);
            run_collectors(&api_names, &config).await;
        }
        Commands::LoadRaw => {
            println!("📥 Running incremental load...");
            let storage = build_storage().await?;
            run_loader(storage, &config).await?;
        }
        Commands::Clean => {
            println!("🧹 Running cleaning pipeline...");
            let storage = build_storage().await?;
            run_cleaning(storage, &config).await?;
        }
        Commands::Run { apis } => {
            println!("🚀 Running full pipeline (collect + load + clean)...");
            let api_names = parse_api_names(apis);
            let storage = build_storage().await?;

            println!("\n🕷️  Step 1: Collecting from providers...");
            run_collectors(&api_names, &config).await;

            println!("\n📥 Step 2: Loading batches into the raw store...");
            run_loader(storage.clone(), &config).await?;

            let deleted =
                loader::remove_batch_files(Path::new(&config.collection.batch_dir))?;
            info!("Deleted {} consumed batch files", deleted);

            println!("\n🧹 Step 3: Cleaning and publishing...");
            run_cleaning(storage, &config).await?;

            println!("\n✅ Full pipeline completed successfully!");
        }
    }
    Ok(())
}
