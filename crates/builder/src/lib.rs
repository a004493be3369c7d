//! The mission builder (§4.9): walks a parsed [`Declaration`] tree, resolves
//! every parameter against a [`VariableStore`] in the order the design
//! specifies, and instantiates a runnable [`Mission`] from a
//! [`ComponentCatalog`] of pre-built polars and a propulsion model.

mod aircraft;
mod catalog;
mod resolve;

pub use aircraft::{load as load_aircraft_config, parse as parse_aircraft_config, AircraftConfigError};
pub use catalog::ComponentCatalog;
pub use resolve::{RequiredInput, ResolveContext};

use std::cell::Cell;

use msim_declaration::{
    Declaration, MissionPartDecl, PartDecl, PhaseDecl, RawParam, RawValue, RouteDecl, SegmentDecl, RawTarget,
};
use msim_flightpoint::FlightPoint;
use msim_mission::{
    CruiseSegment, Mission, MissionError, MissionPart, Phase, PhasePart as Part, ResolvedSegment, Route,
    SegmentResources,
};
use msim_propulsion::EngineSetting;
use msim_segments::{
    AltitudeChangePolicy, AltitudeTarget, EndOfTakeoffPolicy, GroundSpeedChangePolicy, HeldSpeed, LevelFlightPolicy,
    LevelStop, RotationPolicy, SpeedChangePolicy, SpeedTarget, StartValues, TaxiPolicy, Transition, TransitionTarget,
};
use msim_variables::VariableStore;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuilderError {
    #[error("invalid mission declaration: {0}")]
    InvalidDeclaration(String),
    #[error(transparent)]
    Unit(#[from] msim_core::units::UnitError),
    #[error("unit mismatch for '{name}': expected dimension of '{expected}', got unit '{got}'")]
    UnitMismatch { name: String, expected: String, got: String },
    #[error(transparent)]
    Mission(#[from] MissionError),
}

/// Default per-kind stop tolerances (§6.1 lists no tolerance field; the
/// declaration format leaves these to the builder).
const ALTITUDE_TOLERANCE_M: f64 = 10.0;
const TIME_TOLERANCE_S: f64 = 1.0;
const SPEED_TOLERANCE_M_S: f64 = 0.5;
const MACH_TOLERANCE: f64 = 0.005;
const DEFAULT_GROUND_FRICTION_COEFFICIENT: f64 = 0.02;
const DEFAULT_ROTATION_RATE_RAD_S: f64 = 0.0524; // 3 deg/s
const DEFAULT_DISTANCE_ACCURACY_M: f64 = 100.0;

/// Constants for the synthesized default `{start, taxi-out, takeoff
/// transition, mass_input}` prefix (§4.8 step 2, §3 invariant 2) when a
/// mission declares no `MassInput` segment. Not specified numerically by
/// the design; chosen as typical narrow-body taxi-out/takeoff figures —
/// see DESIGN.md.
const DEFAULT_PREFIX_TAXI_DURATION_S: f64 = 600.0;
const DEFAULT_PREFIX_TAXI_THRUST_RATE: f64 = 0.07;
const DEFAULT_PREFIX_TAKEOFF_MASS_RATIO: f64 = 0.995;
const DEFAULT_PREFIX_TAKEOFF_DURATION_S: f64 = 120.0;

/// Parameters inherited down the mission -> route/phase -> segment tree,
/// each level overriding only the fields it declares (§3 "Phase":
/// "Parameters set at phase level are inherited by leaves unless
/// overridden").
#[derive(Debug, Clone)]
struct Inherited {
    engine_setting: EngineSetting,
    thrust_rate: Option<f64>,
    polar_name: Option<String>,
    time_step_s: Option<f64>,
    isa_offset_k: f64,
    maximum_cl: Option<f64>,
}

impl Inherited {
    fn root(isa_offset_k: f64) -> Self {
        Self {
            engine_setting: EngineSetting::Cruise,
            thrust_rate: None,
            polar_name: None,
            time_step_s: None,
            isa_offset_k,
            maximum_cl: None,
        }
    }
}

fn parse_engine_setting(s: &str) -> Result<EngineSetting, BuilderError> {
    match s {
        "Takeoff" => Ok(EngineSetting::Takeoff),
        "Climb" => Ok(EngineSetting::Climb),
        "Cruise" => Ok(EngineSetting::Cruise),
        "Idle" => Ok(EngineSetting::Idle),
        other => Err(BuilderError::InvalidDeclaration(format!("unknown engine_setting '{other}'"))),
    }
}

fn missing_field(segment_name: &str, field: &str) -> BuilderError {
    BuilderError::InvalidDeclaration(format!("segment '{segment_name}' has no '{field}'"))
}

fn bare_number(raw: &RawParam) -> Option<f64> {
    match raw {
        RawParam::Bare(RawValue::Number(n)) => Some(*n),
        _ => None,
    }
}

#[allow(clippy::too_many_arguments)]
fn apply_overrides(
    parent: &Inherited,
    engine_setting: Option<&str>,
    thrust_rate: Option<&RawParam>,
    polar: Option<&str>,
    time_step: Option<&RawParam>,
    isa_offset: Option<&RawParam>,
    maximum_cl: Option<&RawParam>,
    ctx: ResolveContext,
    store: &VariableStore,
    missing: &mut Vec<RequiredInput>,
) -> Result<Inherited, BuilderError> {
    let engine_setting = match engine_setting {
        Some(s) => parse_engine_setting(s)?,
        None => parent.engine_setting,
    };
    let thrust_rate = match thrust_rate {
        Some(raw) => Some(resolve::resolve_scalar(raw, "thrust_rate", "-", ctx, store, missing)?),
        None => parent.thrust_rate,
    };
    let polar_name = match polar {
        Some(name) => Some(name.to_string()),
        None => parent.polar_name.clone(),
    };
    let time_step_s = match time_step {
        Some(raw) => Some(resolve::resolve_scalar(raw, "time_step", "s", ctx, store, missing)?),
        None => parent.time_step_s,
    };
    let isa_offset_k = match isa_offset {
        Some(raw) => resolve::resolve_scalar(raw, "isa_offset", "K", ctx, store, missing)?,
        None => parent.isa_offset_k,
    };
    let maximum_cl = match maximum_cl {
        Some(raw) => Some(resolve::resolve_scalar(raw, "maximum_cl", "-", ctx, store, missing)?),
        None => parent.maximum_cl,
    };
    Ok(Inherited { engine_setting, thrust_rate, polar_name, time_step_s, isa_offset_k, maximum_cl })
}

fn finish_resources(
    inherited: &Inherited,
    segment_name: &str,
    interrupt_if_unfeasible: Option<bool>,
    catalog: &ComponentCatalog,
) -> Result<SegmentResources, BuilderError> {
    let polar_name = inherited.polar_name.clone().ok_or_else(|| missing_field(segment_name, "polar"))?;
    let polar = catalog
        .polars
        .get(&polar_name)
        .cloned()
        .ok_or_else(|| BuilderError::InvalidDeclaration(format!("unknown polar '{polar_name}' referenced by '{segment_name}'")))?;
    let time_step_s = inherited.time_step_s.ok_or_else(|| missing_field(segment_name, "time_step"))?;
    Ok(SegmentResources {
        polar,
        propulsion: catalog.propulsion.clone(),
        wing_area_m2: catalog.wing_area_m2,
        time_step_s,
        max_steps: catalog.max_steps,
        interrupt_if_unfeasible: interrupt_if_unfeasible.unwrap_or(true),
        maximum_cl: inherited.maximum_cl,
        engine_setting: inherited.engine_setting,
        isa_offset_k: inherited.isa_offset_k,
    })
}

fn resolve_target_optional(
    target: &RawTarget,
    field: &str,
    unit: &str,
    ctx: ResolveContext,
    store: &VariableStore,
    missing: &mut Vec<RequiredInput>,
) -> Result<Option<f64>, BuilderError> {
    match target.get(field) {
        // The `"constant"` sentinel (§4.9 step 5) means "keep the start
        // point's value", which for an optional transition-target field is
        // exactly what leaving it unresolved (`None`) already does.
        Some(raw) if resolve::is_constant_token(raw) => Ok(None),
        Some(raw) => Ok(Some(resolve::resolve_scalar(raw, field, unit, ctx, store, missing)?)),
        None => Ok(None),
    }
}

/// `climbing` is not an explicit declaration field; inferred from whether
/// the segment/part name mentions a descent (§9 Open Question, resolved in
/// DESIGN.md: absent an explicit flag, name-based inference is the least
/// surprising default since every example mission in §8 names its descent
/// phases/segments accordingly).
fn infer_climbing(name: &str) -> bool {
    let lower = name.to_lowercase();
    !(lower.contains("descent") || lower.contains("descend"))
}

fn resolve_altitude_target(
    target: &RawTarget,
    ctx: ResolveContext,
    store: &VariableStore,
    missing: &mut Vec<RequiredInput>,
) -> Result<AltitudeTarget, BuilderError> {
    let raw = target
        .get("altitude")
        .or_else(|| target.get("delta_altitude"))
        .ok_or_else(|| BuilderError::InvalidDeclaration("AltitudeChange target requires 'altitude'".to_string()))?;
    if let Some(token) = resolve::altitude_token(raw) {
        return Ok(match token {
            "optimal_altitude" => AltitudeTarget::OptimalAltitude,
            _ => AltitudeTarget::OptimalFlightLevel,
        });
    }
    let value = resolve::resolve_scalar(raw, "altitude", "m", ctx, store, missing)?;
    Ok(AltitudeTarget::Absolute(value))
}

fn resolve_held_speed(
    target: &RawTarget,
    ctx: ResolveContext,
    store: &VariableStore,
    missing: &mut Vec<RequiredInput>,
) -> Result<HeldSpeed, BuilderError> {
    if let Some(raw) = target.get("mach") {
        return Ok(HeldSpeed::Mach(resolve::resolve_scalar(raw, "mach", "-", ctx, store, missing)?));
    }
    if let Some(raw) = target.get("true_airspeed") {
        return Ok(HeldSpeed::TrueAirspeed(resolve::resolve_scalar(raw, "true_airspeed", "m/s", ctx, store, missing)?));
    }
    if let Some(raw) = target.get("equivalent_airspeed") {
        return Ok(HeldSpeed::EquivalentAirspeed(resolve::resolve_scalar(
            raw,
            "equivalent_airspeed",
            "m/s",
            ctx,
            store,
            missing,
        )?));
    }
    Err(BuilderError::InvalidDeclaration(
        "AltitudeChange target requires one of mach/true_airspeed/equivalent_airspeed to hold".to_string(),
    ))
}

fn resolve_speed_target(
    target: &RawTarget,
    ctx: ResolveContext,
    store: &VariableStore,
    missing: &mut Vec<RequiredInput>,
) -> Result<SpeedTarget, BuilderError> {
    if let Some(raw) = target.get("mach") {
        return Ok(SpeedTarget::Mach(resolve::resolve_scalar(raw, "mach", "-", ctx, store, missing)?));
    }
    if let Some(raw) = target.get("true_airspeed") {
        return Ok(SpeedTarget::TrueAirspeed(resolve::resolve_scalar(raw, "true_airspeed", "m/s", ctx, store, missing)?));
    }
    if let Some(raw) = target.get("equivalent_airspeed") {
        return Ok(SpeedTarget::EquivalentAirspeed(resolve::resolve_scalar(
            raw,
            "equivalent_airspeed",
            "m/s",
            ctx,
            store,
            missing,
        )?));
    }
    Err(BuilderError::InvalidDeclaration(
        "SpeedChange target requires one of mach/true_airspeed/equivalent_airspeed".to_string(),
    ))
}

fn assemble_segment(
    decl: &SegmentDecl,
    parent: &Inherited,
    ctx: ResolveContext,
    catalog: &ComponentCatalog,
    store: &VariableStore,
    missing: &mut Vec<RequiredInput>,
    mission_mass_input_name: &str,
) -> Result<ResolvedSegment, BuilderError> {
    let inherited = apply_overrides(
        parent,
        decl.engine_setting.as_deref(),
        decl.thrust_rate.as_ref(),
        decl.polar.as_deref(),
        decl.time_step.as_ref(),
        decl.isa_offset.as_ref(),
        decl.maximum_cl.as_ref(),
        ctx,
        store,
        missing,
    )?;
    let name = decl.name.clone().unwrap_or_else(|| decl.segment.clone());

    match decl.segment.as_str() {
        "AltitudeChange" => {
            let target = resolve_altitude_target(&decl.target, ctx, store, missing)?;
            let held_speed = resolve_held_speed(&decl.target, ctx, store, missing)?;
            let thrust_rate = inherited.thrust_rate.ok_or_else(|| missing_field(&name, "thrust_rate"))?;
            let climbing = infer_climbing(&name);
            let resources = finish_resources(&inherited, &name, decl.interrupt_if_unfeasible, catalog)?;
            Ok(ResolvedSegment::AltitudeChange {
                name,
                policy: AltitudeChangePolicy { target, held_speed, thrust_rate, tolerance_m: ALTITUDE_TOLERANCE_M, climbing },
                resources,
            })
        }
        "SpeedChange" => {
            let target = resolve_speed_target(&decl.target, ctx, store, missing)?;
            let thrust_rate = inherited.thrust_rate.ok_or_else(|| missing_field(&name, "thrust_rate"))?;
            let tolerance = match target {
                SpeedTarget::Mach(_) => MACH_TOLERANCE,
                _ => SPEED_TOLERANCE_M_S,
            };
            let resources = finish_resources(&inherited, &name, decl.interrupt_if_unfeasible, catalog)?;
            Ok(ResolvedSegment::SpeedChange { name, policy: SpeedChangePolicy { target, thrust_rate, tolerance }, resources })
        }
        "Hold" => {
            let raw = decl
                .target
                .get("time")
                .or_else(|| decl.target.get("delta_time"))
                .ok_or_else(|| BuilderError::InvalidDeclaration(format!("segment '{name}' (Hold) requires target 'time'")))?;
            let target_time_s = resolve::resolve_scalar(raw, "time", "s", ctx, store, missing)?;
            let resources = finish_resources(&inherited, &name, decl.interrupt_if_unfeasible, catalog)?;
            Ok(ResolvedSegment::LevelFlight {
                name,
                policy: LevelFlightPolicy { stop: LevelStop::Time(target_time_s), tolerance: TIME_TOLERANCE_S },
                resources,
            })
        }
        "Taxi" => {
            let raw = decl
                .target
                .get("time")
                .ok_or_else(|| BuilderError::InvalidDeclaration(format!("segment '{name}' (Taxi) requires target 'time'")))?;
            let target_time_s = resolve::resolve_scalar(raw, "time", "s", ctx, store, missing)?;
            let thrust_rate = inherited.thrust_rate.ok_or_else(|| missing_field(&name, "thrust_rate"))?;
            let resources = finish_resources(&inherited, &name, decl.interrupt_if_unfeasible, catalog)?;
            Ok(ResolvedSegment::Taxi {
                name,
                policy: TaxiPolicy { target_time_s, thrust_rate, tolerance_s: TIME_TOLERANCE_S },
                resources,
            })
        }
        "GroundSpeedChange" => {
            let raw = decl.target.get("true_airspeed").ok_or_else(|| {
                BuilderError::InvalidDeclaration(format!("segment '{name}' (GroundSpeedChange) requires target 'true_airspeed'"))
            })?;
            let target_true_airspeed = resolve::resolve_scalar(raw, "true_airspeed", "m/s", ctx, store, missing)?;
            let thrust_rate = inherited.thrust_rate.ok_or_else(|| missing_field(&name, "thrust_rate"))?;
            let friction_coefficient = match decl.target.get("friction_coefficient") {
                Some(raw) => resolve::resolve_scalar(raw, "friction_coefficient", "-", ctx, store, missing)?,
                None => DEFAULT_GROUND_FRICTION_COEFFICIENT,
            };
            let resources = finish_resources(&inherited, &name, decl.interrupt_if_unfeasible, catalog)?;
            Ok(ResolvedSegment::GroundSpeedChange {
                name,
                policy: GroundSpeedChangePolicy {
                    target_true_airspeed,
                    thrust_rate,
                    friction_coefficient,
                    tolerance_m_s: SPEED_TOLERANCE_M_S,
                },
                resources,
            })
        }
        "Rotation" => {
            let raw = decl
                .target
                .get("alpha")
                .ok_or_else(|| BuilderError::InvalidDeclaration(format!("segment '{name}' (Rotation) requires target 'alpha'")))?;
            let alpha_limit_rad = resolve::resolve_scalar(raw, "alpha", "rad", ctx, store, missing)?;
            let thrust_rate = inherited.thrust_rate.ok_or_else(|| missing_field(&name, "thrust_rate"))?;
            let rotation_rate_rad_s = decl
                .target
                .get("rotation_rate")
                .and_then(bare_number)
                .unwrap_or(DEFAULT_ROTATION_RATE_RAD_S);
            let resources = finish_resources(&inherited, &name, decl.interrupt_if_unfeasible, catalog)?;
            Ok(ResolvedSegment::Rotation {
                name,
                policy: RotationPolicy { alpha_limit_rad, rotation_rate_rad_s, thrust_rate, tolerance_rad: 0.001 },
                resources,
            })
        }
        "EndOfTakeoff" => {
            let raw = decl.target.get("altitude").or_else(|| decl.target.get("delta_altitude")).ok_or_else(|| {
                BuilderError::InvalidDeclaration(format!("segment '{name}' (EndOfTakeoff) requires target 'altitude' or 'delta_altitude'"))
            })?;
            let target_altitude_m = resolve::resolve_scalar(raw, "altitude", "m", ctx, store, missing)?;
            let thrust_rate = inherited.thrust_rate.ok_or_else(|| missing_field(&name, "thrust_rate"))?;
            let resources = finish_resources(&inherited, &name, decl.interrupt_if_unfeasible, catalog)?;
            Ok(ResolvedSegment::EndOfTakeoff {
                name,
                policy: EndOfTakeoffPolicy { target_altitude_m, thrust_rate, tolerance_m: ALTITUDE_TOLERANCE_M },
                resources,
            })
        }
        "Transition" => {
            let mass_ratio = match &decl.mass_ratio {
                Some(raw) => resolve::resolve_scalar(raw, "mass_ratio", "-", ctx, store, missing)?,
                None => {
                    return Err(BuilderError::InvalidDeclaration(format!(
                        "segment '{name}' (Transition) requires 'mass_ratio'"
                    )))
                }
            };
            let reserve_mass_ratio = match &decl.reserve_mass_ratio {
                Some(raw) => Some(resolve::resolve_scalar(raw, "reserve_mass_ratio", "-", ctx, store, missing)?),
                None => None,
            };
            let duration_s = match &decl.time_step {
                Some(raw) => resolve::resolve_scalar(raw, "time_step", "s", ctx, store, missing)?,
                None => 0.0,
            };
            let target = TransitionTarget {
                altitude_m: resolve_target_optional(&decl.target, "altitude", "m", ctx, store, missing)?,
                mach: resolve_target_optional(&decl.target, "mach", "-", ctx, store, missing)?,
                true_airspeed_m_s: resolve_target_optional(&decl.target, "true_airspeed", "m/s", ctx, store, missing)?,
                delta_ground_distance_m: resolve_target_optional(&decl.target, "delta_ground_distance", "m", ctx, store, missing)?,
            };
            Ok(ResolvedSegment::Transition { name, transition: Transition { mass_ratio, reserve_mass_ratio, target, duration_s } })
        }
        "Start" => {
            let altitude_m = resolve_target_optional(&decl.target, "altitude", "m", ctx, store, missing)?.unwrap_or(0.0);
            let true_airspeed_m_s =
                resolve_target_optional(&decl.target, "true_airspeed", "m/s", ctx, store, missing)?.unwrap_or(0.0);
            let mass_kg = resolve_target_optional(&decl.target, "mass", "kg", ctx, store, missing)?.unwrap_or(0.0);
            Ok(ResolvedSegment::Start {
                name,
                values: StartValues { altitude_m, true_airspeed_m_s, mass_kg, isa_offset_k: inherited.isa_offset_k },
            })
        }
        "MassInput" => {
            let variable_name = mission_mass_input_name.to_string();
            let mass_kg = resolve::resolve_scalar(
                &RawParam::Bare(RawValue::Text(variable_name.clone())),
                "mass",
                "kg",
                ctx,
                store,
                missing,
            )?;
            Ok(ResolvedSegment::MassInput { name, variable_name, mass_kg: Cell::new(mass_kg) })
        }
        other => Err(BuilderError::InvalidDeclaration(format!("unknown segment kind '{other}'"))),
    }
}

#[allow(clippy::too_many_arguments)]
fn assemble_part(
    part: &PartDecl,
    declaration: &Declaration,
    inherited: &Inherited,
    mission: &str,
    route: Option<&str>,
    phase: Option<&str>,
    catalog: &ComponentCatalog,
    store: &VariableStore,
    missing: &mut Vec<RequiredInput>,
    mission_mass_input_name: &str,
) -> Result<Part, BuilderError> {
    match part {
        PartDecl::Segment(decl) => {
            let ctx = ResolveContext { mission, route, phase };
            Ok(Part::Segment(assemble_segment(decl, inherited, ctx, catalog, store, missing, mission_mass_input_name)?))
        }
        PartDecl::SegmentRef { segment_ref } => {
            let decl = declaration
                .segments
                .get(segment_ref)
                .ok_or_else(|| BuilderError::InvalidDeclaration(format!("segment_ref '{segment_ref}' not declared")))?;
            let ctx = ResolveContext { mission, route, phase };
            Ok(Part::Segment(assemble_segment(decl, inherited, ctx, catalog, store, missing, mission_mass_input_name)?))
        }
        PartDecl::Phase(phase_decl) => Ok(Part::Phase(Box::new(assemble_phase(
            phase_decl,
            declaration,
            inherited,
            mission,
            route,
            catalog,
            store,
            missing,
            mission_mass_input_name,
        )?))),
    }
}

#[allow(clippy::too_many_arguments)]
fn assemble_phase(
    decl: &PhaseDecl,
    declaration: &Declaration,
    parent: &Inherited,
    mission: &str,
    route: Option<&str>,
    catalog: &ComponentCatalog,
    store: &VariableStore,
    missing: &mut Vec<RequiredInput>,
    mission_mass_input_name: &str,
) -> Result<Phase, BuilderError> {
    let ctx = ResolveContext { mission, route, phase: Some(&decl.name) };
    let inherited = apply_overrides(
        parent,
        decl.engine_setting.as_deref(),
        decl.thrust_rate.as_ref(),
        decl.polar.as_deref(),
        decl.time_step.as_ref(),
        decl.isa_offset.as_ref(),
        decl.maximum_cl.as_ref(),
        ctx,
        store,
        missing,
    )?;

    let mut parts = Vec::with_capacity(decl.parts.len());
    for part in &decl.parts {
        parts.push(assemble_part(
            part,
            declaration,
            &inherited,
            mission,
            route,
            Some(&decl.name),
            catalog,
            store,
            missing,
            mission_mass_input_name,
        )?);
    }
    Ok(Phase { name: decl.name.clone(), parts })
}

#[allow(clippy::too_many_arguments)]
fn assemble_route(
    decl: &RouteDecl,
    mission: &str,
    parent: &Inherited,
    declaration: &Declaration,
    catalog: &ComponentCatalog,
    store: &VariableStore,
    missing: &mut Vec<RequiredInput>,
    mission_mass_input_name: &str,
) -> Result<Route, BuilderError> {
    let ctx = ResolveContext { mission, route: Some(&decl.name), phase: None };
    let isa_offset_k = match &decl.isa_offset {
        Some(raw) => resolve::resolve_scalar(raw, "isa_offset", "K", ctx, store, missing)?,
        None => parent.isa_offset_k,
    };
    let route_inherited = Inherited { isa_offset_k, ..parent.clone() };

    let climb = decl
        .climb_parts
        .iter()
        .map(|p| assemble_phase(p, declaration, &route_inherited, mission, Some(&decl.name), catalog, store, missing, mission_mass_input_name))
        .collect::<Result<Vec<_>, _>>()?;
    let descent = decl
        .descent_parts
        .iter()
        .map(|p| assemble_phase(p, declaration, &route_inherited, mission, Some(&decl.name), catalog, store, missing, mission_mass_input_name))
        .collect::<Result<Vec<_>, _>>()?;

    let range_m = resolve::resolve_scalar(&decl.range, "range", "m", ctx, store, missing)?;
    let distance_accuracy_m = match &decl.distance_accuracy {
        Some(raw) => resolve::resolve_scalar(raw, "distance_accuracy", "m", ctx, store, missing)?,
        None => DEFAULT_DISTANCE_ACCURACY_M,
    };

    let cruise_inherited = apply_overrides(
        &route_inherited,
        decl.cruise_part.engine_setting.as_deref(),
        decl.cruise_part.thrust_rate.as_ref(),
        decl.cruise_part.polar.as_deref(),
        decl.cruise_part.time_step.as_ref(),
        decl.cruise_part.isa_offset.as_ref(),
        decl.cruise_part.maximum_cl.as_ref(),
        ctx,
        store,
        missing,
    )?;
    let cruise_name = decl.cruise_part.name.clone().unwrap_or_else(|| decl.name.clone());
    let cruise_resources = finish_resources(&cruise_inherited, &cruise_name, decl.cruise_part.interrupt_if_unfeasible, catalog)?;
    let optimal = decl.cruise_part.segment == "OptimalCruise";

    Ok(Route {
        name: decl.name.clone(),
        climb,
        cruise: CruiseSegment { name: cruise_name, resources: cruise_resources, tolerance_m: distance_accuracy_m, optimal },
        descent,
        range_m: Cell::new(range_m),
        distance_accuracy_m,
    })
}

fn synthesize_default_prefix(
    root: &Inherited,
    mass_input_variable: &str,
    ctx: ResolveContext,
    catalog: &ComponentCatalog,
    store: &VariableStore,
    missing: &mut Vec<RequiredInput>,
) -> Result<Phase, BuilderError> {
    let mass_kg = resolve::resolve_scalar(
        &RawParam::Bare(RawValue::Text(mass_input_variable.to_string())),
        "mass",
        "kg",
        ctx,
        store,
        missing,
    )?;

    let start = ResolvedSegment::Start {
        name: "start".to_string(),
        values: StartValues { altitude_m: 0.0, true_airspeed_m_s: 0.0, mass_kg: 0.0, isa_offset_k: root.isa_offset_k },
    };
    let taxi = ResolvedSegment::Taxi {
        name: "taxi_out".to_string(),
        policy: TaxiPolicy {
            target_time_s: DEFAULT_PREFIX_TAXI_DURATION_S,
            thrust_rate: DEFAULT_PREFIX_TAXI_THRUST_RATE,
            tolerance_s: TIME_TOLERANCE_S,
        },
        resources: finish_resources(root, "taxi_out", Some(true), catalog)?,
    };
    let transition = ResolvedSegment::Transition {
        name: "takeoff_transition".to_string(),
        transition: Transition {
            mass_ratio: DEFAULT_PREFIX_TAKEOFF_MASS_RATIO,
            reserve_mass_ratio: None,
            target: TransitionTarget::default(),
            duration_s: DEFAULT_PREFIX_TAKEOFF_DURATION_S,
        },
    };
    let mass_input = ResolvedSegment::MassInput {
        name: "mass_input".to_string(),
        variable_name: mass_input_variable.to_string(),
        mass_kg: Cell::new(mass_kg),
    };

    Ok(Phase {
        name: "default_mass_input_prefix".to_string(),
        parts: vec![Part::Segment(start), Part::Segment(taxi), Part::Segment(transition), Part::Segment(mass_input)],
    })
}

/// A built mission plus every variable reference the declaration made that
/// the store could not resolve (§4.9, final paragraph): the framework
/// surrounding this core is expected to supply these before a real run.
pub struct BuildOutput {
    pub mission: Mission,
    pub missing: Vec<RequiredInput>,
}

/// Parse and resolve `mission_name` out of `declaration` against `store`,
/// instantiating segments from `catalog` (§4.9).
pub fn build(
    declaration: &Declaration,
    mission_name: &str,
    catalog: &ComponentCatalog,
    store: &VariableStore,
) -> Result<BuildOutput, BuilderError> {
    let decl = declaration
        .missions
        .get(mission_name)
        .ok_or_else(|| BuilderError::InvalidDeclaration(format!("mission '{mission_name}' not declared")))?;
    let mut missing = Vec::new();

    let ctx = ResolveContext { mission: mission_name, route: None, phase: None };
    let isa_offset_k = match &decl.isa_offset {
        Some(raw) => resolve::resolve_scalar(raw, "isa_offset", "K", ctx, store, &mut missing)?,
        None => 0.0,
    };
    let root = Inherited::root(isa_offset_k);

    let mass_input_variable = decl
        .mass_input_variable
        .clone()
        .unwrap_or_else(|| format!("data:mission:{mission_name}:TOW"));

    let mut parts = Vec::with_capacity(decl.parts.len());
    for part_decl in &decl.parts {
        let part = match part_decl {
            MissionPartDecl::Phase { phase } => {
                let phase_decl = declaration
                    .phases
                    .get(phase)
                    .ok_or_else(|| BuilderError::InvalidDeclaration(format!("phase '{phase}' not declared")))?;
                MissionPart::Phase(assemble_phase(
                    phase_decl,
                    declaration,
                    &root,
                    mission_name,
                    None,
                    catalog,
                    store,
                    &mut missing,
                    &mass_input_variable,
                )?)
            }
            MissionPartDecl::InlinePhase { phase_inline } => MissionPart::Phase(assemble_phase(
                phase_inline,
                declaration,
                &root,
                mission_name,
                None,
                catalog,
                store,
                &mut missing,
                &mass_input_variable,
            )?),
            MissionPartDecl::Route { route } => {
                let route_decl = declaration
                    .routes
                    .get(route)
                    .ok_or_else(|| BuilderError::InvalidDeclaration(format!("route '{route}' not declared")))?;
                MissionPart::Route(assemble_route(
                    route_decl,
                    mission_name,
                    &root,
                    declaration,
                    catalog,
                    store,
                    &mut missing,
                    &mass_input_variable,
                )?)
            }
            MissionPartDecl::Reserve { reserve } => {
                let multiplier = resolve::resolve_scalar(&reserve.multiplier, "multiplier", "-", ctx, store, &mut missing)?;
                MissionPart::Reserve(msim_mission::ReserveRef {
                    name: format!("reserve:{}", reserve.ref_route_name),
                    ref_route_name: reserve.ref_route_name.clone(),
                    multiplier,
                })
            }
        };
        parts.push(part);
    }

    // OWE/payload/block_fuel only matter to the §4.8 TOW/block-fuel
    // relationship; a mission that uses none of the three flags has no use
    // for them, so they are only looked up (and only then reported as
    // required inputs when absent) when the mission actually needs them.
    let needs_block_fuel_inputs = decl.use_all_block_fuel || decl.adjust_fuel || decl.compute_tow;
    let (block_fuel_kg, owe_kg, payload_kg) = if needs_block_fuel_inputs {
        let block_fuel_kg = resolve::resolve_scalar(
            &RawParam::Bare(RawValue::Text(format!("data:mission:{mission_name}:block_fuel"))),
            "block_fuel",
            "kg",
            ctx,
            store,
            &mut missing,
        )?;
        let owe_kg = resolve::resolve_scalar(
            &RawParam::Bare(RawValue::Text(format!("data:mission:{mission_name}:OWE"))),
            "OWE",
            "kg",
            ctx,
            store,
            &mut missing,
        )?;
        let payload_kg = resolve::resolve_scalar(
            &RawParam::Bare(RawValue::Text(format!("data:mission:{mission_name}:payload"))),
            "payload",
            "kg",
            ctx,
            store,
            &mut missing,
        )?;
        (block_fuel_kg, owe_kg, payload_kg)
    } else {
        (0.0, 0.0, 0.0)
    };

    let mut mission = Mission {
        name: mission_name.to_string(),
        parts,
        isa_offset_k,
        use_all_block_fuel: decl.use_all_block_fuel,
        block_fuel_kg,
        adjust_fuel: decl.adjust_fuel,
        compute_tow: decl.compute_tow,
        owe_kg,
        payload_kg,
        start: FlightPoint::zeroed(isa_offset_k),
    };

    if !mission.has_mass_input() {
        let prefix = synthesize_default_prefix(&root, &mass_input_variable, ctx, catalog, store, &mut missing)?;
        mission.parts.insert(0, MissionPart::Phase(prefix));
    }

    Ok(BuildOutput { mission, missing })
}
