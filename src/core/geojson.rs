//! GeoJSON-like wire format for vehicle position documents
//!
//! ```json
//! {"type": "FeatureCollection", "features": [
//!   {"type": "Feature",
//!    "properties": {"uuid": "...", "id": 12, "color": "#FF0000", "direction": 1,
//!                   "distance": 1520.5, "distanceFromPoint": 40, "lineId": "64",
//!                   "pointId": 8012},
//!    "geometry": {"type": "Point", "coordinates": [4.35, 50.85]}}]}
//! ```
//!
//! `direction` is 1-based on the wire. Unknown properties are ignored.

use std::io::Read;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize};

use crate::core::{Coordinates, Observation, Snapshot};
use crate::error::{Error, Result};

const FEATURE_COLLECTION: &str = "FeatureCollection";
const FEATURE: &str = "Feature";
const POINT: &str = "Point";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type", default = "feature_collection_kind")]
    pub kind: String,
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type", default = "feature_kind")]
    pub kind: String,
    pub properties: Properties,
    pub geometry: Geometry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Properties {
    pub uuid: String,
    #[serde(deserialize_with = "integer_or_string")]
    pub id: i64,
    pub color: String,
    pub direction: u8,
    pub distance: f64,
    pub distance_from_point: u32,
    pub line_id: String,
    #[serde(deserialize_with = "integer_or_string")]
    pub point_id: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type", default = "point_kind")]
    pub kind: String,
    pub coordinates: Vec<f64>,
}

fn feature_collection_kind() -> String {
    FEATURE_COLLECTION.to_string()
}

fn feature_kind() -> String {
    FEATURE.to_string()
}

fn point_kind() -> String {
    POINT.to_string()
}

/// Some feeds send numeric ids as strings.
fn integer_or_string<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64> + FromStr,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Integer(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Integer(value) => T::try_from(value)
            .map_err(|_| de::Error::custom(format!("integer {} out of range", value))),
        Raw::Text(text) => text
            .trim()
            .parse::<T>()
            .map_err(|_| de::Error::custom(format!("expected an integer, got {:?}", text))),
    }
}

impl FeatureCollection {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str::<Self>(text)?.validated()
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        serde_json::from_reader::<_, Self>(reader)?.validated()
    }

    fn validated(self) -> Result<Self> {
        if self.kind != FEATURE_COLLECTION {
            return Err(Error::InvalidDocument(format!(
                "expected a {}, got {:?}",
                FEATURE_COLLECTION, self.kind
            )));
        }
        for (index, feature) in self.features.iter().enumerate() {
            if feature.kind != FEATURE {
                return Err(Error::InvalidDocument(format!(
                    "feature {}: expected a {}, got {:?}",
                    index, FEATURE, feature.kind
                )));
            }
            if feature.geometry.kind != POINT {
                return Err(Error::InvalidDocument(format!(
                    "feature {}: expected a {} geometry, got {:?}",
                    index, POINT, feature.geometry.kind
                )));
            }
        }
        Ok(self)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn into_snapshot(self, timestamp: &str) -> Result<Snapshot> {
        let observations = self
            .features
            .into_iter()
            .enumerate()
            .map(|(index, feature)| feature.into_observation(index))
            .collect::<Result<Vec<_>>>()?;
        Ok(Snapshot::new(timestamp, observations))
    }

    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            kind: feature_collection_kind(),
            features: snapshot.observations.iter().map(Feature::from_observation).collect(),
        }
    }
}

impl Feature {
    fn into_observation(self, index: usize) -> Result<Observation> {
        let (x, y) = match self.geometry.coordinates.as_slice() {
            [x, y, ..] => (*x, *y),
            other => {
                return Err(Error::InvalidDocument(format!(
                    "feature {} has {} coordinates, expected at least 2",
                    index,
                    other.len()
                )))
            }
        };
        let properties = self.properties;

        Ok(Observation {
            object_id: properties.uuid,
            numeric_id: properties.id,
            color: properties.color,
            direction: properties.direction,
            line_id: properties.line_id,
            route_point_id: properties.point_id,
            distance: properties.distance,
            distance_from_point: properties.distance_from_point,
            coordinates: Coordinates::new(x, y),
        })
    }

    fn from_observation(observation: &Observation) -> Self {
        Self {
            kind: feature_kind(),
            properties: Properties {
                uuid: observation.object_id.clone(),
                id: observation.numeric_id,
                color: observation.color.clone(),
                direction: observation.direction,
                distance: observation.distance,
                distance_from_point: observation.distance_from_point,
                line_id: observation.line_id.clone(),
                point_id: observation.route_point_id,
            },
            geometry: Geometry {
                kind: point_kind(),
                coordinates: vec![observation.coordinates.x, observation.coordinates.y],
            },
        }
    }
}
