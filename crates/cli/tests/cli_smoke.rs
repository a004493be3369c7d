//! Smoke test for the `mission` binary: drives it end to end against fixture
//! files on disk and checks the summary it prints plus the CSV it writes.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;

const DECLARATION_YAML: &str = r#"
phases:
  prefix:
    name: prefix
    parts:
      - segment: Start
        name: start
        target:
          altitude: { value: 10668.0, unit: m }
          true_airspeed: { value: 231.0, unit: m/s }
      - segment: MassInput
        name: mass_input
routes:
  main:
    name: main
    cruise_part:
      segment: Cruise
      name: cruise
      polar: wing
      time_step: { value: 5.0, unit: s }
    range: { value: 3704.0, unit: km }
    distance_accuracy: { value: 1.0, unit: km }
missions:
  m1:
    name: m1
    parts:
      - phase: prefix
      - route: main
"#;

const VARIABLES_YAML: &str = r#"
data:mission:m1:TOW:
  value: 70000.0
  unit: kg
"#;

const AIRCRAFT_YAML: &str = r#"
wing_area_m2: 122.0
propulsion:
  sfc_kg_per_n_s: 1.7e-5
  max_thrust_n: 250000.0
polars:
  wing:
    cl: [0.0, 0.5, 1.0]
    cd: [0.02, 0.03, 0.06]
"#;

#[test]
fn runs_mission_and_writes_points_csv() {
    let dir = tempfile::tempdir().unwrap();
    let declaration_path = dir.path().join("declaration.yaml");
    let variables_path = dir.path().join("variables.yaml");
    let aircraft_path = dir.path().join("aircraft.yaml");
    let points_path = dir.path().join("points.csv");

    fs::write(&declaration_path, DECLARATION_YAML).unwrap();
    fs::write(&variables_path, VARIABLES_YAML).unwrap();
    fs::write(&aircraft_path, AIRCRAFT_YAML).unwrap();

    let mut cmd = Command::cargo_bin("mission").unwrap();
    cmd.arg("--declaration").arg(&declaration_path)
        .arg("--variables").arg(&variables_path)
        .arg("--aircraft").arg(&aircraft_path)
        .arg("--mission").arg("m1")
        .arg("--points-csv").arg(&points_path);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Mission 'm1'"))
        .stdout(predicate::str::contains("Needed block fuel"));

    let csv = fs::read_to_string(&points_path).unwrap();
    let mut lines = csv.lines();
    assert!(lines.next().unwrap().starts_with("time,altitude,ground_distance"));
    assert!(lines.count() > 0);
}

#[test]
fn missing_declaration_file_fails_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = Command::cargo_bin("mission").unwrap();
    cmd.arg("--declaration").arg(dir.path().join("missing.yaml"))
        .arg("--variables").arg(dir.path().join("missing.yaml"))
        .arg("--aircraft").arg(dir.path().join("missing.yaml"))
        .arg("--mission").arg("m1");

    cmd.assert().failure();
}
