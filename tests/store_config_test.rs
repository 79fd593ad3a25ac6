use std::fs;

use velocity::config::{BackendConfig, CoordinateStorage, FileCompression, StoreConfig};
use velocity::core::geojson::FeatureCollection;
use velocity::core::Snapshot;
use velocity::storage::{AnyStore, DocumentStore};
use velocity::Error;

const SAMPLE: &str = r##"{
    "type": "FeatureCollection",
    "features": [
        {"type": "Feature",
         "properties": {"uuid": "A", "id": 3, "color": "#FF0000", "direction": 1,
                        "distance": 120.5, "distanceFromPoint": 4, "lineId": "64",
                        "pointId": "8012"},
         "geometry": {"type": "Point", "coordinates": [4.35, 50.85]}},
        {"type": "Feature",
         "properties": {"uuid": "B", "id": "4", "color": "#00FF00", "direction": 2,
                        "distance": 98.0, "distanceFromPoint": 0, "lineId": "71",
                        "pointId": 8013},
         "geometry": {"type": "Point", "coordinates": [4.36, 50.86]}}
    ]
}"##;

fn sample() -> Snapshot {
    FeatureCollection::from_json(SAMPLE).unwrap().into_snapshot("2024-03-01T14_22_05").unwrap()
}

#[test]
fn test_every_configured_backend_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("stores.json");
    let root = dir.path().display().to_string().replace('\\', "/");
    let text = format!(
        r#"[
            {{"name": "velocity", "data_dir": "{root}/velocity",
              "backend": {{"kind": "velocity", "batch_size": 2}}}},
            {{"name": "paired", "data_dir": "{root}/paired",
              "backend": {{"kind": "velocity",
                           "coordinates": {{"mode": "paired", "pairing": "cantor"}}}}}},
            {{"name": "json", "data_dir": "{root}/json",
              "backend": {{"kind": "file"}}}},
            {{"name": "gzip", "data_dir": "{root}/gzip",
              "backend": {{"kind": "file", "compression": "gzip"}}}}
        ]"#
    );
    fs::write(&config_path, text).unwrap();

    let configs = StoreConfig::load_all(&config_path).unwrap();
    assert_eq!(configs.len(), 4);
    assert!(matches!(
        &configs[1].backend,
        BackendConfig::Velocity(v) if matches!(v.coordinates, CoordinateStorage::Paired(_))
    ));
    assert_eq!(configs[2].backend, StoreConfig::file("x", FileCompression::None).backend);

    for config in &configs {
        let mut store = AnyStore::open(config).unwrap();
        assert_eq!(Some(store.name()), config.name);

        store.reset().unwrap();
        store.store_document(sample()).unwrap();
        let restored = store.get_document("2024-03-01T14_22_05").unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.observations[0].route_point_id, 8012);
        assert_eq!(restored.observations[1].numeric_id, 4);
        assert_eq!(restored.observations[1].direction, 2);
        assert!(store.get_total_size().unwrap() > 0);
        assert!(matches!(store.get_document("missing"), Err(Error::NotFound(_))));
    }
}

#[test]
fn test_gzip_is_smaller_than_plain_json() {
    let dir = tempfile::tempdir().unwrap();
    let mut json = AnyStore::open(&StoreConfig::file(dir.path().join("json"), FileCompression::None))
        .unwrap();
    let mut gzip = AnyStore::open(&StoreConfig::file(dir.path().join("gzip"), FileCompression::Gzip))
        .unwrap();

    let mut big = sample();
    for i in 0..200 {
        let mut observation = big.observations[0].clone();
        observation.object_id = format!("vehicle-{}", i);
        big.observations.push(observation);
    }
    json.store_document(big.clone()).unwrap();
    gzip.store_document(big).unwrap();

    assert!(gzip.get_total_size().unwrap() < json.get_total_size().unwrap());
}

#[test]
fn test_invalid_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stores.json");

    fs::write(&path, r#"[{"data_dir": "x", "backend": {"kind": "velocity", "batch_size": 0}}]"#)
        .unwrap();
    assert!(matches!(StoreConfig::load_all(&path), Err(Error::Config(_))));

    fs::write(&path, r#"[{"data_dir": "x", "backend": {"kind": "sqlite"}}]"#).unwrap();
    assert!(matches!(StoreConfig::load_all(&path), Err(Error::Json(_))));

    assert!(matches!(
        StoreConfig::load_all(&dir.path().join("absent.json")),
        Err(Error::Backend(_))
    ));
}
