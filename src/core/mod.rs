//! Core data structures and types for the velocity snapshot store

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A WGS84-like position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: f64,
    pub y: f64,
}

impl Coordinates {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One tracked object's reading at one timestamp.
///
/// `direction` keeps its wire form (1 or 2); stores normalize it with
/// [`normalize_direction`] and restore it with [`denormalize_direction`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub object_id: String,
    pub numeric_id: i64,
    pub color: String,
    pub direction: u8,
    pub line_id: String,
    pub route_point_id: u32,
    pub distance: f64,
    pub distance_from_point: u32,
    pub coordinates: Coordinates,
}

/// One timestamped batch of observations, the unit of ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: String,
    pub observations: Vec<Observation>,
}

impl Snapshot {
    pub fn new(timestamp: &str, observations: Vec<Observation>) -> Self {
        Self { timestamp: timestamp.to_string(), observations }
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

/// Map the 1-based wire direction onto the stored boolean (`value - 1`).
pub fn normalize_direction(direction: u8) -> Result<bool> {
    match direction {
        1 => Ok(false),
        2 => Ok(true),
        other => Err(Error::InvalidDocument(format!("direction must be 1 or 2, got {}", other))),
    }
}

/// Inverse of [`normalize_direction`].
pub fn denormalize_direction(stored: bool) -> u8 {
    u8::from(stored) + 1
}

pub mod encoding;
pub mod geojson;
pub mod hashing;
pub mod pairing;
