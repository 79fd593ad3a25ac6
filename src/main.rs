//! Velocity - tiered deduplication storage for vehicle position snapshots
//!
//! This is the main entry point for the velocity command-line interface.
//!
//! Usage:
//!   velocity bench --data-dir ./data --max-documents 100 --random-reads 1000
//!   velocity get 2024-03-01T14_22_05 --store-dir ./tmp/velocity
//!   velocity stats --config stores.json --store velocity

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use velocity::benchmarks::benchmark::{self, BenchmarkSettings};
use velocity::config::{FileCompression, StoreConfig, VelocityConfig};
use velocity::core::geojson::FeatureCollection;
use velocity::storage::{AnyStore, DocumentStore};

#[derive(Parser, Debug)]
#[command(name = "velocity")]
#[command(about = "Tiered deduplication storage for moving-object snapshots", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compare write time, size and random reads across stores
    Bench {
        #[arg(short, long, default_value = "data")]
        data_dir: PathBuf,

        #[arg(long, default_value_t = benchmark::DEFAULT_MAX_DOCUMENTS)]
        max_documents: usize,

        #[arg(long, default_value_t = benchmark::DEFAULT_RANDOM_READS)]
        random_reads: usize,

        #[arg(long, default_value = "42")]
        seed: u64,

        #[arg(long, default_value = "results")]
        results_dir: PathBuf,

        /// JSON list of store configurations; defaults to velocity, json and gzip
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Parent directory of the default stores
        #[arg(long, default_value = "tmp")]
        store_root: PathBuf,
    },
    /// Print one stored snapshot as GeoJSON
    Get {
        timestamp: String,

        #[command(flatten)]
        store: StoreArgs,
    },
    /// Print dictionary sizes and run an integrity check
    Stats {
        #[command(flatten)]
        store: StoreArgs,
    },
}

#[derive(Args, Debug)]
struct StoreArgs {
    /// Velocity store directory, used when no config file is given
    #[arg(short, long, default_value = "tmp/velocity")]
    store_dir: PathBuf,

    /// JSON list of store configurations
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Name of the store to pick from the config file; defaults to the first
    #[arg(long)]
    store: Option<String>,
}

impl StoreArgs {
    fn resolve(&self) -> Result<StoreConfig, Box<dyn std::error::Error>> {
        let Some(path) = &self.config else {
            return Ok(StoreConfig::velocity(&self.store_dir, VelocityConfig::default()));
        };
        let configs = StoreConfig::load_all(path)?;
        let found = match &self.store {
            Some(name) => configs.into_iter().find(|c| c.name.as_deref() == Some(name.as_str())),
            None => configs.into_iter().next(),
        };
        found.ok_or_else(|| format!("no matching store in {}", path.display()).into())
    }
}

fn default_stores(root: &Path) -> Vec<StoreConfig> {
    vec![
        StoreConfig::velocity(root.join("velocity"), VelocityConfig::default()),
        StoreConfig::file(root.join("json"), FileCompression::None),
        StoreConfig::file(root.join("gzip"), FileCompression::Gzip),
    ]
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Bench {
            data_dir,
            max_documents,
            random_reads,
            seed,
            results_dir,
            config,
            store_root,
        } => {
            let configs = match config {
                Some(path) => StoreConfig::load_all(&path)?,
                None => default_stores(&store_root),
            };
            let mut stores = configs
                .iter()
                .map(|config| {
                    AnyStore::open(config).map(|store| (Box::new(store) as Box<dyn DocumentStore>, true))
                })
                .collect::<Result<Vec<_>, _>>()?;

            let settings = BenchmarkSettings {
                data_dir,
                max_documents,
                random_reads,
                seed,
                results_dir: Some(results_dir),
            };
            let (reports, written) = benchmark::run(&mut stores, &settings)?;

            println!();
            println!("=== Summary ===");
            for report in &reports {
                println!(
                    "{:<40} write {:>8.3} s  size {:>8.3} MB  read {}",
                    report.name,
                    report.write_seconds,
                    report.size_mb(),
                    report.read_seconds.map_or("-".to_string(), |s| format!("{:.3} s", s))
                );
            }
            if let Some(path) = written {
                println!("Results written to {}", path.display());
            }
        }
        Command::Get { timestamp, store } => {
            let store = AnyStore::open(&store.resolve()?)?;
            let snapshot = store.get_document(&timestamp)?;
            println!("{}", FeatureCollection::from_snapshot(&snapshot).to_json()?);
        }
        Command::Stats { store } => {
            let config = store.resolve()?;
            let AnyStore::Velocity(store) = AnyStore::open(&config)? else {
                return Err(format!("{} is not a velocity store", config.data_dir.display()).into());
            };
            let stats = store.stats();
            println!("Store: {}", store.name());
            println!("  - Documents: {}", stats.documents);
            println!("  - Snapshot rows: {}", stats.rows);
            println!("  - Items: {}", stats.items);
            println!("  - Subitems: {}", stats.subitems);

            let report = store.check_integrity()?;
            println!(
                "Integrity OK: {} documents, {} rows, {} items checked",
                report.documents_checked, report.rows_checked, report.items_checked
            );
            store.close()?;
        }
    }

    Ok(())
}
