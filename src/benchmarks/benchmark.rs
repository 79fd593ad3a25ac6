//! Write / size / random-read benchmark over a directory of snapshot files.
//!
//! Snapshots are read from `<data_dir>/*.json`, sorted by file name, and the
//! file stem is used as the timestamp. Every store is reset, fed the same
//! snapshots, measured on disk, then asked for `random_reads` timestamps
//! drawn with replacement from a seeded RNG.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::geojson::FeatureCollection;
use crate::core::Snapshot;
use crate::error::Result;
use crate::storage::DocumentStore;

pub const DEFAULT_MAX_DOCUMENTS: usize = 100;
pub const DEFAULT_RANDOM_READS: usize = 1000;

#[derive(Debug, Clone)]
pub struct BenchmarkSettings {
    pub data_dir: PathBuf,
    pub max_documents: usize,
    pub random_reads: usize,
    pub seed: u64,
    /// Where the JSON report goes; `None` skips writing it
    pub results_dir: Option<PathBuf>,
}

impl Default for BenchmarkSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            max_documents: DEFAULT_MAX_DOCUMENTS,
            random_reads: DEFAULT_RANDOM_READS,
            seed: 42,
            results_dir: Some(PathBuf::from("results")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreReport {
    pub name: String,
    pub documents: usize,
    pub write_seconds: f64,
    pub size_bytes: u64,
    /// `None` when read measurement was disabled for the store
    pub read_seconds: Option<f64>,
}

impl StoreReport {
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// Reports keyed by store name, the layout of the results file.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResults {
    pub write_stats: BTreeMap<String, f64>,
    pub size_stats: BTreeMap<String, f64>,
    pub read_stats: BTreeMap<String, f64>,
}

impl BenchmarkResults {
    pub fn record(&mut self, report: &StoreReport) {
        self.write_stats.insert(report.name.clone(), report.write_seconds);
        self.size_stats.insert(report.name.clone(), report.size_mb());
        if let Some(read_seconds) = report.read_seconds {
            self.read_stats.insert(report.name.clone(), read_seconds);
        }
    }
}

/// Load up to `max_documents` snapshots from `dir`, in file name order.
pub fn load_snapshots(dir: &Path, max_documents: usize) -> Result<Vec<Snapshot>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?
        .into_iter()
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    paths
        .into_iter()
        .take(max_documents)
        .filter_map(|path| {
            let timestamp = path.file_stem()?.to_str()?.to_string();
            Some((path, timestamp))
        })
        .map(|(path, timestamp)| {
            let reader = BufReader::new(File::open(&path)?);
            FeatureCollection::from_reader(reader)?.into_snapshot(&timestamp)
        })
        .collect()
}

/// Reset `store`, write every snapshot, then optionally time random reads.
pub fn run_store(
    store: &mut dyn DocumentStore,
    snapshots: &[Snapshot],
    settings: &BenchmarkSettings,
    measure_reads: bool,
) -> Result<StoreReport> {
    let name = store.name();
    println!("Running benchmark for {}", name);
    store.reset()?;

    let start = Instant::now();
    for snapshot in snapshots {
        store.store_document(snapshot.clone())?;
    }
    let size_bytes = store.get_total_size()?;
    let write_seconds = start.elapsed().as_secs_f64();

    println!(
        " {} took {:.3} MB to store {} documents",
        name,
        size_bytes as f64 / (1024.0 * 1024.0),
        snapshots.len()
    );
    println!(" {} took {:.3} s to store {} documents", name, write_seconds, snapshots.len());

    let read_seconds = if measure_reads && !snapshots.is_empty() {
        let timestamps: Vec<&str> = snapshots.iter().map(|s| s.timestamp.as_str()).collect();
        let mut rng = StdRng::seed_from_u64(settings.seed);

        let start = Instant::now();
        for _ in 0..settings.random_reads {
            if let Some(timestamp) = timestamps.choose(&mut rng) {
                store.get_document(timestamp)?;
            }
        }
        let elapsed = start.elapsed().as_secs_f64();
        println!(" {} took {:.3} s to get {} documents", name, elapsed, settings.random_reads);
        Some(elapsed)
    } else {
        None
    };

    Ok(StoreReport { name, documents: snapshots.len(), write_seconds, size_bytes, read_seconds })
}

/// Benchmark every `(store, measure_reads)` pair and write the results file.
pub fn run(
    stores: &mut [(Box<dyn DocumentStore>, bool)],
    settings: &BenchmarkSettings,
) -> Result<(Vec<StoreReport>, Option<PathBuf>)> {
    let snapshots = load_snapshots(&settings.data_dir, settings.max_documents)?;
    info!(documents = snapshots.len(), path = %settings.data_dir.display(), "loaded snapshots");

    let mut reports = Vec::with_capacity(stores.len());
    let mut results = BenchmarkResults::default();
    for (store, measure_reads) in stores.iter_mut() {
        let report = run_store(store.as_mut(), &snapshots, settings, *measure_reads)?;
        results.record(&report);
        reports.push(report);
    }

    let written = match &settings.results_dir {
        Some(dir) => Some(write_results(dir, &results)?),
        None => None,
    };
    Ok((reports, written))
}

pub fn write_results(dir: &Path, results: &BenchmarkResults) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let started = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    let path = dir.join(format!("benchmark_results_store_{}.json", started));
    fs::write(&path, serde_json::to_string_pretty(results)?)?;
    info!(path = %path.display(), "wrote benchmark results");
    Ok(path)
}
