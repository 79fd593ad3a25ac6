//! # Velocity
//!
//! Velocity stores periodic snapshots of moving-object telemetry, such as the
//! vehicle positions a transit feed publishes every twenty seconds.
//!
//! Most of a vehicle's attributes (its line, color and direction) barely change
//! between two snapshots. Velocity interns them once in content-addressed
//! dictionary tiers and writes only a compact row per vehicle per tick, so
//! storage grows with what actually moves.
//!
//! ## Features
//!
//! - Two-tier deduplication with SHA-256 content keys and collision detection
//! - Cantor and elegant (Szudzik) pairing to pack coordinates into one integer
//! - Append-only, time-partitioned segment log with checksummed commit frames
//! - Plain JSON and gzip baselines behind the same [`storage::DocumentStore`] trait
//!
//! ## Example
//!
//! ```rust,no_run
//! use velocity::config::VelocityConfig;
//! use velocity::core::Snapshot;
//! use velocity::storage::velocity::VelocityStore;
//!
//! fn example() -> velocity::Result<()> {
//!     let mut store = VelocityStore::open("data/velocity".as_ref(), VelocityConfig::default())?;
//!     store.store_document(Snapshot::new("2024-03-01T14:22:05", Vec::new()))?;
//!     let snapshot = store.get_document("2024-03-01T14:22:05")?;
//!     assert!(snapshot.is_empty());
//!     store.close()
//! }
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unnecessary_map_or)]
#![allow(clippy::doc_markdown)]

/// Core data structures, codecs and the wire format
pub mod core;

/// Store configuration
pub mod config;

pub mod error;

/// Dictionary tiers, segment log and the store backends
pub mod storage;

/// Benchmark harness comparing the store backends
pub mod benchmarks;

// Re-export commonly used types
pub use error::{Error, Result};
