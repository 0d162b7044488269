//! Integration tests for the geotrack binary
//!
//! These run the compiled binary in a scratch directory and check its JSON output.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

fn regions_file() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../data/tamil_nadu_districts.json")
}

fn geotrack(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_geotrack"))
        .args(args)
        .current_dir(dir)
        .env_remove("GEOTRACK_MAX_SPEED_MPS")
        .env_remove("GEOTRACK_MAX_ACCURACY_M")
        .env_remove("GEOTRACK_DEFAULT_RADIUS_M")
        .env_remove("GEOTRACK_OUTER_BOUNDS")
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to execute geotrack")
}

fn json_data(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let parsed: Value =
        serde_json::from_slice(&output.stdout).expect("Output should be valid JSON");
    assert_eq!(parsed["status"], "success");
    parsed["data"].clone()
}

/// A client-location geofence around Salem plus a two-report approach
fn salem_fixture(dir: &Path) -> (String, String) {
    let geofences = dir.join("geofences.json").display().to_string();
    let output = geotrack(
        dir,
        &[
            "geofence", "--geofences", &geofences, "add", "--booking", "1", "--lat", "11.6643",
            "--lng", "78.1460", "--radius", "500", "--json",
        ],
    );
    json_data(&output);

    let reports = dir.join("approach.jsonl");
    std::fs::write(
        &reports,
        concat!(
            r#"{"booking_id":1,"worker_id":7,"latitude":11.6697,"longitude":78.1460,"timestamp":"2024-05-01T09:00:00Z"}"#,
            "\n",
            r#"{"booking_id":1,"worker_id":7,"latitude":11.6670,"longitude":78.1460,"timestamp":"2024-05-01T09:01:00Z"}"#,
            "\n",
        ),
    )
    .unwrap();

    (geofences, reports.display().to_string())
}

#[test]
fn test_resolve_chennai() {
    let dir = TempDir::new().unwrap();
    let regions = regions_file().display().to_string();
    let output = geotrack(dir.path(), &["resolve", "13.0827", "80.2707", "--regions", &regions, "--json"]);

    let data = json_data(&output);
    assert_eq!(data["region"]["name"], "Chennai");
    assert_eq!(data["region"]["boundingBox"]["latMin"], 12.74);
}

#[test]
fn test_resolve_mid_ocean_is_null() {
    let dir = TempDir::new().unwrap();
    let regions = regions_file().display().to_string();
    let output = geotrack(dir.path(), &["resolve", "0", "0", "--regions", &regions, "--json"]);

    assert!(json_data(&output)["region"].is_null());
}

#[test]
fn test_resolve_rejects_invalid_coordinate() {
    let dir = TempDir::new().unwrap();
    let regions = regions_file().display().to_string();
    let output = geotrack(dir.path(), &["resolve", "95", "80", "--regions", &regions]);
    assert!(!output.status.success());
}

#[test]
fn test_regions_lists_dataset() {
    let dir = TempDir::new().unwrap();
    let regions = regions_file().display().to_string();
    let data = json_data(&geotrack(dir.path(), &["regions", "--regions", &regions, "--json"]));

    let names: Vec<&str> =
        data["regions"].as_array().unwrap().iter().map(|r| r["name"].as_str().unwrap()).collect();
    assert_eq!(names.len(), 8);
    assert!(names.contains(&"Salem"));
}

#[test]
fn test_config_shows_sources() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("geotrack.toml"), "max_accuracy_meters = 80.0\n").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_geotrack"))
        .args(["config", "--json", "--default-radius-meters", "300"])
        .current_dir(dir.path())
        .env("GEOTRACK_MAX_SPEED_MPS", "30")
        .env_remove("GEOTRACK_MAX_ACCURACY_M")
        .env_remove("GEOTRACK_DEFAULT_RADIUS_M")
        .env_remove("GEOTRACK_OUTER_BOUNDS")
        .output()
        .unwrap();

    let data = json_data(&output);
    let source_of = |key: &str| {
        data.as_array()
            .unwrap()
            .iter()
            .find(|e| e["key"] == key)
            .map(|e| e["source"].as_str().unwrap().to_string())
            .unwrap()
    };
    assert_eq!(source_of("max_speed_mps"), "Environment");
    assert_eq!(source_of("max_accuracy_meters"), "File");
    assert_eq!(source_of("default_radius_meters"), "Cli");
    assert_eq!(source_of("outer_bounds"), "Default");
}

#[test]
fn test_replay_emits_entry_and_arrival() {
    let dir = TempDir::new().unwrap();
    let (geofences, reports) = salem_fixture(dir.path());

    let data = json_data(&geotrack(
        dir.path(),
        &["replay", "--geofences", &geofences, "--reports", &reports, "--json"],
    ));

    assert_eq!(data["reports"], 2);
    assert_eq!(data["accepted"], 2);
    assert_eq!(data["geofences"], 1);
    let types: Vec<&str> = data["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["event_type"].as_str().unwrap())
        .collect();
    assert_eq!(types, vec!["geofence_entry", "arrived_at_client"]);
}

#[test]
fn test_replay_geojson_output() {
    let dir = TempDir::new().unwrap();
    let (geofences, reports) = salem_fixture(dir.path());

    let output = geotrack(
        dir.path(),
        &["replay", "--geofences", &geofences, "--reports", &reports, "--geojson"],
    );
    assert!(output.status.success());

    let collection: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(collection["type"], "FeatureCollection");
    let first = &collection["features"][0];
    assert_eq!(first["geometry"]["type"], "Point");
    assert_eq!(first["properties"]["event_type"], "geofence_entry");
    assert_eq!(first["geometry"]["coordinates"][0], 78.146);
}

#[test]
fn test_replay_complete_deactivates_geofences() {
    let dir = TempDir::new().unwrap();
    let (geofences, reports) = salem_fixture(dir.path());

    let data = json_data(&geotrack(
        dir.path(),
        &["replay", "--geofences", &geofences, "--reports", &reports, "--complete", "--json"],
    ));
    let last = data["events"].as_array().unwrap().last().unwrap().clone();
    assert_eq!(last["event_type"], "work_completed");

    let listed = json_data(&geotrack(dir.path(), &["geofence", "--geofences", &geofences, "list", "--json"]));
    assert!(listed["geofences"].as_array().unwrap().is_empty());

    let all = json_data(&geotrack(
        dir.path(),
        &["geofence", "--geofences", &geofences, "list", "--all", "--json"],
    ));
    assert_eq!(all["geofences"][0]["active"], false);
}
