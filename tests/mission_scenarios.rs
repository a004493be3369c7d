//! End-to-end scenarios driving the full declaration -> variable store ->
//! builder -> mission pipeline, rather than constructing `Mission` objects
//! by hand (that lower-level coverage lives in `msim_mission`'s own
//! `#[cfg(test)]` module). Mirrors the acceptance scenarios worked through
//! in the design notes: a plain cruise route, an optimal-cruise altitude
//! repoint, a reserve fuel part, an unreachable range, a contextual
//! variable reference, and the block-fuel/TOW outer relationship.

use std::sync::Arc;

use mission_performance::{build, ComponentCatalog, Declaration, Mission, MissionError, VariableStore};
use msim_polar::Polar;
use msim_propulsion::ConstantSfcPropulsion;

fn catalog() -> ComponentCatalog {
    let propulsion = Arc::new(ConstantSfcPropulsion::new(1.7e-5, 250_000.0));
    let polar = Arc::new(Polar::new(vec![0.0, 0.5, 1.0], vec![0.02, 0.03, 0.06]).unwrap());
    ComponentCatalog::new(propulsion, 122.0).with_polar("wing", polar)
}

fn build_mission(yaml: &str, mission_name: &str, store: &VariableStore) -> Mission {
    let declaration: Declaration = msim_declaration::parse(yaml).unwrap();
    let output = build(&declaration, mission_name, &catalog(), store).unwrap();
    assert!(output.missing.is_empty(), "unresolved inputs: {:?}", output.missing);
    output.mission
}

const SINGLE_CRUISE_YAML: &str = r#"
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

#[test]
fn single_cruise_full_pipeline_burns_fuel_with_monotonic_mass() {
    let mut store = VariableStore::new();
    store.set("data:mission:m1:TOW", 70_000.0, "kg");
    let mission = build_mission(SINGLE_CRUISE_YAML, "m1", &store);

    let output = mission.run().unwrap();
    assert!(output.total_fuel_kg > 0.0, "fuel_kg = {}", output.total_fuel_kg);
    assert!(output.total_time_s > 0.0, "time_s = {}", output.total_time_s);
    assert!((output.needed_block_fuel_kg - output.total_fuel_kg).abs() < 1e-6);
    assert_eq!(output.tow_kg, None);
    assert_eq!(output.block_fuel_kg, None);

    let mut last_mass = f64::INFINITY;
    for point in &output.points {
        assert!(point.mass <= last_mass + 1e-6);
        last_mass = point.mass;
    }
}

const OPTIMAL_CRUISE_YAML: &str = r#"
phases:
  prefix:
    name: prefix
    parts:
      - segment: Start
        name: start
        target:
          altitude: { value: 9000.0, unit: m }
          true_airspeed: { value: 231.0, unit: m/s }
      - segment: MassInput
        name: mass_input
routes:
  main:
    name: main
    cruise_part:
      segment: OptimalCruise
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

#[test]
fn optimal_cruise_repoints_start_altitude_to_max_ld() {
    let mut store = VariableStore::new();
    store.set("data:mission:m1:TOW", 70_000.0, "kg");
    let mission = build_mission(OPTIMAL_CRUISE_YAML, "m1", &store);

    let output = mission.run().unwrap();

    // `OptimalCruise` repoints the first cruise point's altitude to the
    // altitude of maximum L/D at cruise mass and entry Mach (§4.7), rather
    // than holding the 9000 m the Start segment declared.
    let entry_altitude = 9_000.0;
    let first_cruise_point = output
        .points
        .iter()
        .find(|p| (p.altitude - entry_altitude).abs() > 1.0)
        .expect("cruise should repoint altitude away from the declared start altitude");

    let props = msim_atmosphere::properties(msim_atmosphere::AtmosphereState::new(entry_altitude, 0.0)).unwrap();
    let entry_tas = 231.0;
    let mach = msim_atmosphere::tas_to_mach(entry_tas, &props);
    let polar = Polar::new(vec![0.0, 0.5, 1.0], vec![0.02, 0.03, 0.06]).unwrap();
    let expected_altitude = msim_segments::altitude_at_max_ld(70_000.0, mach, &polar, 0.0, 122.0).unwrap();

    assert!(
        (first_cruise_point.altitude - expected_altitude).abs() < 1.0,
        "got {}, expected {}",
        first_cruise_point.altitude,
        expected_altitude
    );
}

const RESERVE_MISSION_YAML: &str = r#"
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
      - reserve:
          ref: main
          multiplier: { value: 0.05, unit: "-" }
"#;

#[test]
fn reserve_part_adds_multiplier_times_referenced_route_fuel() {
    let mut store = VariableStore::new();
    store.set("data:mission:m1:TOW", 70_000.0, "kg");
    let mission = build_mission(RESERVE_MISSION_YAML, "m1", &store);

    let output = mission.run().unwrap();
    let main_fuel = output.per_part.iter().find(|(name, _)| name == "main").unwrap().1.fuel_kg;
    assert!((output.reserve_fuel_kg - 0.05 * main_fuel).abs() < 1e-6);
    assert!((output.needed_block_fuel_kg - (output.total_fuel_kg + output.reserve_fuel_kg)).abs() < 1e-6);
}

const UNREACHABLE_ROUTE_YAML: &str = r#"
phases:
  prefix:
    name: prefix
    parts:
      - segment: Start
        name: start
        target:
          altitude: { value: 0.0, unit: m }
          true_airspeed: { value: 120.0, unit: m/s }
      - segment: MassInput
        name: mass_input
routes:
  main:
    name: main
    climb_parts:
      - name: climb
        thrust_rate: { value: 0.9, unit: "-" }
        polar: wing
        time_step: { value: 5.0, unit: s }
        parts:
          - segment: AltitudeChange
            name: climb_to_cruise
            target:
              altitude: { value: 10668.0, unit: m }
              true_airspeed: { value: 231.0, unit: m/s }
    cruise_part:
      segment: Cruise
      name: cruise
      polar: wing
      time_step: { value: 5.0, unit: s }
    range: { value: 1.0, unit: km }
    distance_accuracy: { value: 1.0, unit: km }
missions:
  m1:
    name: m1
    parts:
      - phase: prefix
      - route: main
"#;

#[test]
fn route_unreachable_when_climb_alone_exceeds_the_target_range() {
    let mut store = VariableStore::new();
    store.set("data:mission:m1:TOW", 70_000.0, "kg");
    let mission = build_mission(UNREACHABLE_ROUTE_YAML, "m1", &store);

    let result = mission.run();
    assert!(matches!(result, Err(MissionError::RouteUnreachable { .. })), "{result:?}");
}

const CONTEXTUAL_THRUST_RATE_YAML: &str = r#"
phases:
  prefix:
    name: prefix
    parts:
      - segment: Start
        name: start
        target:
          altitude: { value: 0.0, unit: m }
          true_airspeed: { value: 120.0, unit: m/s }
      - segment: MassInput
        name: mass_input
routes:
  main:
    name: main
    climb_parts:
      - name: climb
        polar: wing
        time_step: { value: 5.0, unit: s }
        parts:
          - segment: AltitudeChange
            name: climb_to_cruise
            thrust_rate: "~"
            target:
              altitude: { value: 10668.0, unit: m }
              true_airspeed: { value: 231.0, unit: m/s }
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

#[test]
fn contextual_variable_resolves_per_mission_route_phase_scope() {
    let mut store = VariableStore::new();
    store.set("data:mission:m1:TOW", 70_000.0, "kg");
    // `~` on `climb_to_cruise`'s thrust_rate expands to
    // data:mission:<mission>:<route>:<phase>:thrust_rate (§4.9 step 4).
    store.set("data:mission:m1:main:climb:thrust_rate", 0.9, "-");

    let declaration: Declaration = msim_declaration::parse(CONTEXTUAL_THRUST_RATE_YAML).unwrap();
    let output = build(&declaration, "m1", &catalog(), &store).unwrap();
    assert!(output.missing.is_empty(), "unresolved inputs: {:?}", output.missing);

    let result = output.mission.run().unwrap();
    assert!(result.total_fuel_kg > 0.0);
}

#[test]
fn contextual_variable_missing_is_reported_as_a_required_input() {
    let mut store = VariableStore::new();
    store.set("data:mission:m1:TOW", 70_000.0, "kg");

    let declaration: Declaration = msim_declaration::parse(CONTEXTUAL_THRUST_RATE_YAML).unwrap();
    let output = build(&declaration, "m1", &catalog(), &store).unwrap();
    assert!(output.missing.iter().any(|input| input.name == "data:mission:m1:main:climb:thrust_rate"));
}

const BLOCK_FUEL_TOW_YAML: &str = r#"
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
    use_all_block_fuel: true
    compute_TOW: true
    parts:
      - phase: prefix
      - route: main
"#;

#[test]
fn block_fuel_and_tow_flags_propagate_through_full_pipeline() {
    let mut store = VariableStore::new();
    store.set("data:mission:m1:TOW", 70_000.0, "kg");
    store.set("data:mission:m1:block_fuel", 9_000.0, "kg");
    store.set("data:mission:m1:OWE", 40_000.0, "kg");
    store.set("data:mission:m1:payload", 15_000.0, "kg");
    let mission = build_mission(BLOCK_FUEL_TOW_YAML, "m1", &store);

    let output = mission.run().unwrap();
    assert_eq!(output.block_fuel_kg, Some(9_000.0));
    assert!((output.tow_kg.unwrap() - (40_000.0 + 15_000.0 + 9_000.0)).abs() < 1e-6);

    let target = 9_000.0 - output.reserve_fuel_kg;
    assert!((output.total_fuel_kg - target).abs() < 1e-2, "total_fuel_kg = {}", output.total_fuel_kg);
}
