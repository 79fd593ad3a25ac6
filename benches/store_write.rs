use std::fs;
use std::time::Instant;

use velocity::config::{CoordinateStorage, FileCompression, StoreConfig, VelocityConfig};
use velocity::core::pairing::CodecConfig;
use velocity::core::{Coordinates, Observation, Snapshot};
use velocity::storage::{AnyStore, DocumentStore};

const DATA_DIR: &str = "data/store_write_benchmark";
const VEHICLES: usize = 300;
const TICKS: usize = 180;

/// Synthetic feed: a fixed fleet moving a little every 20 seconds.
fn generate_snapshots() -> Vec<Snapshot> {
    (0..TICKS)
        .map(|tick| {
            let seconds = tick * 20;
            let timestamp = format!(
                "2024-03-01T{:02}_{:02}_{:02}",
                14 + seconds / 3600,
                (seconds / 60) % 60,
                seconds % 60
            );
            let observations = (0..VEHICLES)
                .map(|vehicle| Observation {
                    object_id: format!("vehicle-{:04}", vehicle),
                    numeric_id: vehicle as i64,
                    color: format!("#{:06X}", (vehicle % 40) * 0x0F0F0F),
                    direction: (vehicle % 2) as u8 + 1,
                    line_id: (vehicle % 40).to_string(),
                    route_point_id: ((vehicle * 31 + tick / 6) % 5000) as u32,
                    distance: (tick * 35 + vehicle) as f64 * 1.5,
                    distance_from_point: (tick % 6) as u32 * 7,
                    coordinates: Coordinates::new(
                        4.30 + vehicle as f64 * 1e-4 + tick as f64 * 1e-5,
                        50.80 + vehicle as f64 * 1e-4 - tick as f64 * 1e-5,
                    ),
                })
                .collect();
            Snapshot::new(&timestamp, observations)
        })
        .collect()
}

fn stores() -> Vec<StoreConfig> {
    let dir = |name: &str| format!("{}/{}", DATA_DIR, name);
    vec![
        StoreConfig::velocity(dir("velocity"), VelocityConfig::default())
            .with_name("velocity (unbuffered)"),
        StoreConfig::velocity(
            dir("velocity_batched"),
            VelocityConfig { batch_size: 30, ..VelocityConfig::default() },
        )
        .with_name("velocity (batch 30)"),
        StoreConfig::velocity(
            dir("velocity_paired"),
            VelocityConfig {
                batch_size: 30,
                coordinates: CoordinateStorage::Paired(CodecConfig::default()),
                ..VelocityConfig::default()
            },
        )
        .with_name("velocity (batch 30, elegant pairing)"),
        StoreConfig::file(dir("json"), FileCompression::None).with_name("json files"),
        StoreConfig::file(dir("gzip"), FileCompression::Gzip).with_name("gzip files"),
    ]
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Snapshot Write Benchmark : Velocity vs File Baselines");
    let _ = fs::remove_dir_all(DATA_DIR);
    fs::create_dir_all(DATA_DIR)?;

    let snapshots = generate_snapshots();
    println!("Generated {} snapshots of {} vehicles", snapshots.len(), VEHICLES);

    println!("{:-<80}", "");
    println!("{:<40} {:<15} {:<15}", "Store", "Write Time(ms)", "Size(KB)");
    println!("{:-<80}", "");

    for config in stores() {
        let mut store = AnyStore::open(&config)?;
        store.reset()?;

        let start = Instant::now();
        for snapshot in &snapshots {
            store.store_document(snapshot.clone())?;
        }
        let size = store.get_total_size()?;
        let elapsed = start.elapsed();

        println!(
            "{:<40} {:<15.3} {:<15.1}",
            store.name(),
            elapsed.as_secs_f64() * 1000.0,
            size as f64 / 1024.0
        );
    }

    println!("{:-<80}", "");
    Ok(())
}
