//! Top-level composition of phases and routes into one runnable mission
//! (§4.8): mass-input placement, reserve fuel, and the block-fuel/TOW outer
//! fixed-point loop. Lower layers (segment, phase, route) each enforce their
//! own first-point continuity invariant; this crate threads that same
//! invariant across sibling mission parts.

mod error;
mod phase;
mod route;
mod segment;

pub use error::MissionError;
pub use phase::{Phase, PhasePart};
pub use route::{CruiseSegment, Route, RouteOutput};
pub use segment::{ResolvedSegment, SegmentError, SegmentResources};

use std::collections::BTreeMap;

use msim_flightpoint::FlightPoint;

use crate::phase::PhasePart as Part;

/// Aggregate distance/duration/fuel consumed by one segment, phase, or
/// route's emitted trace (§4.8 step 6, `per_part` map).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartTotals {
    pub distance_m: f64,
    pub duration_s: f64,
    pub fuel_kg: f64,
}

impl PartTotals {
    /// Totals between the point entering a part and the last point it
    /// emitted. `trace` is expected non-empty; falls back to `before` (zero
    /// totals) if it somehow isn't.
    pub fn from_trace(before: &FlightPoint, trace: &[FlightPoint]) -> Self {
        let after = trace.last().unwrap_or(before);
        PartTotals {
            distance_m: after.ground_distance - before.ground_distance,
            duration_s: after.time - before.time,
            fuel_kg: after.consumed_fuel - before.consumed_fuel,
        }
    }
}

/// `ReserveRef` (§3 "Mission"): a virtual part contributing
/// `multiplier · fuel_of(ref_route_name)` to the mission's total fuel
/// without emitting any FlightPoints of its own.
pub struct ReserveRef {
    pub name: String,
    pub ref_route_name: String,
    pub multiplier: f64,
}

/// One top-level mission part, in declaration order (§3 "Mission":
/// `parts: Vec<Route|Phase|ReserveRef>`).
pub enum MissionPart {
    Phase(Phase),
    Route(Route),
    Reserve(ReserveRef),
}

/// A fully resolved mission, ready to run (and re-run, for the block-fuel
/// outer loop) any number of times (§3 "Lifecycle / ownership": "Mission is
/// constructed once ... then replayed per outer iteration").
pub struct Mission {
    pub name: String,
    pub parts: Vec<MissionPart>,
    pub isa_offset_k: f64,
    /// §4.8 "Block-fuel / TOW adjustment": when set, the main route's range
    /// is solved so total fuel matches `block_fuel_kg - reserve_fuel_kg`
    /// rather than being held fixed.
    pub use_all_block_fuel: bool,
    pub block_fuel_kg: f64,
    /// §4.8: "If `adjust_fuel` is set ... block fuel is set equal to
    /// `total_fuel + reserve_fuel` on output" instead of being held at
    /// `block_fuel_kg`.
    pub adjust_fuel: bool,
    /// §4.8: "If `compute_TOW` is set, `TOW = OWE + payload + block_fuel`
    /// is updated; otherwise block fuel is derived from
    /// `TOW − OWE − payload`."
    pub compute_tow: bool,
    pub owe_kg: f64,
    pub payload_kg: f64,
    pub start: FlightPoint,
}

/// Result of running a mission once (§4.8 step 6).
pub struct MissionOutput {
    pub points: Vec<FlightPoint>,
    pub per_part: Vec<(String, PartTotals)>,
    pub total_fuel_kg: f64,
    pub total_time_s: f64,
    pub reserve_fuel_kg: f64,
    /// §6.3: `<mission>:needed_block_fuel`, always reported —
    /// `total_fuel + reserve_fuel` regardless of the `adjust_fuel`/
    /// `compute_TOW` flags.
    pub needed_block_fuel_kg: f64,
    /// §6.3: `<mission>:TOW`, reported only when `compute_TOW` (or
    /// `adjust_fuel`, which implies it) is set.
    pub tow_kg: Option<f64>,
    /// §6.3: `<mission>:block_fuel`, reported only when `adjust_fuel` or
    /// `compute_TOW` asked for it.
    pub block_fuel_kg: Option<f64>,
}

const CONTINUITY_TOLERANCE: f64 = 1e-6;
const MAX_BLOCK_FUEL_ITERATIONS: usize = 50;
const BLOCK_FUEL_TOLERANCE_KG: f64 = 1e-3;
const BLOCK_FUEL_BRACKET_EXPANSION_CAP: f64 = 10.0;

fn check_phase(phase: &Phase, mass_input_seen: &mut bool, mission_name: &str) -> Result<(), MissionError> {
    for part in &phase.parts {
        match part {
            Part::Segment(segment) => {
                if segment.is_mass_input() {
                    *mass_input_seen = true;
                } else if !*mass_input_seen && segment.is_mass_dependent() {
                    return Err(MissionError::InvalidMissionStructure {
                        mission: mission_name.to_string(),
                        part: segment.name().to_string(),
                    });
                }
            }
            Part::Phase(sub_phase) => check_phase(sub_phase, mass_input_seen, mission_name)?,
        }
    }
    Ok(())
}

impl Mission {
    /// Whether this mission (as currently assembled) contains a `MassInput`
    /// segment anywhere in its parts tree. A builder uses this to decide
    /// whether to synthesize and prepend the default prefix (§4.8 step 2)
    /// before the mission is ever run.
    pub fn has_mass_input(&self) -> bool {
        !self.mass_input_segments().is_empty()
    }

    fn mass_input_segments(&self) -> Vec<&ResolvedSegment> {
        let mut found = Vec::new();
        for part in &self.parts {
            match part {
                MissionPart::Phase(phase) => found.extend(phase.mass_inputs()),
                MissionPart::Route(route) => {
                    for p in route.climb.iter().chain(route.descent.iter()) {
                        found.extend(p.mass_inputs());
                    }
                }
                MissionPart::Reserve(_) => {}
            }
        }
        found
    }

    /// Validate that every segment preceding the first `MassInput` has
    /// mass-independent fuel consumption (§4.8 step 3). Locating/
    /// synthesizing a default `{start, taxi-out, takeoff, mass_input}`
    /// prefix when no `MassInput` is declared is the builder's
    /// responsibility (it alone owns the `SegmentResources` such a prefix
    /// needs) — see DESIGN.md.
    fn validate_mass_independence(&self) -> Result<(), MissionError> {
        let mut mass_input_seen = false;
        for part in &self.parts {
            match part {
                MissionPart::Phase(phase) => check_phase(phase, &mut mass_input_seen, &self.name)?,
                MissionPart::Route(route) => {
                    for p in route.climb.iter().chain(route.descent.iter()) {
                        check_phase(p, &mut mass_input_seen, &self.name)?;
                    }
                }
                MissionPart::Reserve(_) => {}
            }
        }
        Ok(())
    }

    /// Run every part once in declaration order (§4.8 steps 4-6), without
    /// the block-fuel outer loop.
    fn run_once(&self) -> Result<MissionOutput, MissionError> {
        if self.mass_input_segments().is_empty() {
            return Err(MissionError::MissingMassInput { mission: self.name.clone() });
        }
        self.validate_mass_independence()?;

        let mut points: Vec<FlightPoint> = Vec::new();
        let mut per_part: Vec<(String, PartTotals)> = Vec::new();
        let mut route_fuel: BTreeMap<String, f64> = BTreeMap::new();
        let mut reserve_fuel_kg = 0.0;
        let mut current = self.start.clone();

        for part in &self.parts {
            match part {
                MissionPart::Phase(phase) => {
                    let (part_points, part_totals) = phase.run(current.clone())?;
                    if let (Some(first), Some(last)) = (part_points.first(), points.last()) {
                        if !first.continuity_matches(last, CONTINUITY_TOLERANCE) {
                            return Err(MissionError::ContinuityBroken { part: phase.name.clone() });
                        }
                    }
                    if points.is_empty() {
                        points.extend(part_points);
                    } else {
                        points.extend(part_points.into_iter().skip(1));
                    }
                    per_part.extend(part_totals);
                }
                MissionPart::Route(route) => {
                    let before = current.clone();
                    let output = route.run(current.clone())?;
                    if let (Some(first), Some(last)) = (output.points.first(), points.last()) {
                        if !first.continuity_matches(last, CONTINUITY_TOLERANCE) {
                            return Err(MissionError::ContinuityBroken { part: route.name.clone() });
                        }
                    }
                    let totals = PartTotals::from_trace(&before, &output.points);
                    route_fuel.insert(route.name.clone(), totals.fuel_kg);
                    if points.is_empty() {
                        points.extend(output.points);
                    } else {
                        points.extend(output.points.into_iter().skip(1));
                    }
                    per_part.push((route.name.clone(), totals));
                    per_part.extend(output.per_part);
                }
                MissionPart::Reserve(reserve) => {
                    let fuel = route_fuel.get(&reserve.ref_route_name).copied().ok_or_else(|| {
                        MissionError::UnknownReserveRoute {
                            mission: self.name.clone(),
                            route: reserve.ref_route_name.clone(),
                        }
                    })?;
                    let this_reserve = reserve.multiplier * fuel;
                    reserve_fuel_kg += this_reserve;
                    per_part.push((
                        reserve.name.clone(),
                        PartTotals { distance_m: 0.0, duration_s: 0.0, fuel_kg: this_reserve },
                    ));
                }
            }
            current = points.last().cloned().unwrap_or(current);
        }

        let total_fuel_kg = points.last().map(|p| p.consumed_fuel).unwrap_or(0.0);
        let total_time_s = points.last().map(|p| p.time).unwrap_or(0.0);

        Ok(MissionOutput {
            points,
            per_part,
            total_fuel_kg,
            total_time_s,
            reserve_fuel_kg,
            needed_block_fuel_kg: total_fuel_kg + reserve_fuel_kg,
            tow_kg: None,
            block_fuel_kg: None,
        })
    }

    fn main_route(&self) -> Option<&Route> {
        self.parts.iter().find_map(|part| match part {
            MissionPart::Route(route) => Some(route),
            _ => None,
        })
    }

    /// The reference mass currently bound at the mission's `MassInput`
    /// segment (§4.8 step 3) — the mission's input TOW when `compute_TOW`
    /// is not set.
    fn input_mass_kg(&self) -> Option<f64> {
        self.mass_input_segments().first().and_then(|segment| segment.mass_input_value())
    }

    /// Run the mission once (applying the block-fuel/range solve when
    /// applicable), then resolve the §4.8 TOW/block-fuel outer relationship
    /// per the flag precedence in the design note's final paragraph:
    /// `adjust_fuel` implies `compute_TOW`, and `compute_TOW == false`
    /// means the block-fuel/range solve is skipped (TOW is the given
    /// input and block fuel is derived from it, not solved for).
    pub fn run(&self) -> Result<MissionOutput, MissionError> {
        let compute_tow = self.compute_tow || self.adjust_fuel;
        let solve_range_for_block_fuel = self.use_all_block_fuel && compute_tow;

        let mut output = if solve_range_for_block_fuel {
            self.run_with_range_solve()?
        } else {
            self.run_once()?
        };

        let block_fuel_tow_requested = self.use_all_block_fuel || self.adjust_fuel || self.compute_tow;
        if compute_tow {
            let block_fuel_kg = if self.adjust_fuel { output.needed_block_fuel_kg } else { self.block_fuel_kg };
            output.block_fuel_kg = Some(block_fuel_kg);
            output.tow_kg = Some(self.owe_kg + self.payload_kg + block_fuel_kg);
        } else if block_fuel_tow_requested {
            if let Some(input_tow_kg) = self.input_mass_kg() {
                output.block_fuel_kg = Some(input_tow_kg - self.owe_kg - self.payload_kg);
            }
        }

        Ok(output)
    }

    /// The block-fuel/range outer fixed point (§4.8 "Block-fuel / TOW
    /// adjustment", `use_all_block_fuel` branch): the main route's range is
    /// solved by bisection (same shape as §4.7) so that
    /// `total_fuel == block_fuel_kg - reserve_fuel_kg`.
    fn run_with_range_solve(&self) -> Result<MissionOutput, MissionError> {
        let Some(main_route) = self.main_route() else {
            return self.run_once();
        };

        let initial_range = main_route.range_m.get();
        let residual = |range_m: f64| -> Result<(f64, MissionOutput), MissionError> {
            main_route.set_range(range_m);
            let output = self.run_once()?;
            let target = self.block_fuel_kg - output.reserve_fuel_kg;
            Ok((output.total_fuel_kg - target, output))
        };

        let mut lo = 0.5 * initial_range;
        let mut hi = initial_range;
        let (mut lo_residual, _) = residual(lo)?;
        let (mut hi_residual, mut best) = residual(hi)?;

        let mut expansions = 0;
        while lo_residual.signum() == hi_residual.signum()
            && hi < BLOCK_FUEL_BRACKET_EXPANSION_CAP * initial_range
            && expansions < 8
        {
            lo = hi;
            lo_residual = hi_residual;
            hi *= 2.0;
            let (r, output) = residual(hi)?;
            hi_residual = r;
            best = output;
            expansions += 1;
        }

        if lo_residual.signum() == hi_residual.signum() {
            main_route.set_range(initial_range);
            return Err(MissionError::BlockFuelNotConverged {
                mission: self.name.clone(),
                max_iter: MAX_BLOCK_FUEL_ITERATIONS,
            });
        }

        let mut converged = false;
        for _ in 0..MAX_BLOCK_FUEL_ITERATIONS {
            let mid = 0.5 * (lo + hi);
            let (mid_residual, output) = residual(mid)?;
            best = output;
            if mid_residual.abs() <= BLOCK_FUEL_TOLERANCE_KG {
                converged = true;
                break;
            }
            if mid_residual.signum() == lo_residual.signum() {
                lo = mid;
                lo_residual = mid_residual;
            } else {
                hi = mid;
                hi_residual = mid_residual;
            }
        }

        if !converged {
            return Err(MissionError::BlockFuelNotConverged {
                mission: self.name.clone(),
                max_iter: MAX_BLOCK_FUEL_ITERATIONS,
            });
        }

        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use msim_polar::Polar;
    use msim_propulsion::{ConstantSfcPropulsion, EngineSetting};
    use msim_segments::{LevelFlightPolicy, LevelStop};
    use std::cell::Cell;
    use std::sync::Arc;

    fn resources() -> SegmentResources {
        SegmentResources {
            polar: Arc::new(Polar::new(vec![0.0, 0.5, 1.0], vec![0.02, 0.03, 0.06]).unwrap()),
            propulsion: Arc::new(ConstantSfcPropulsion::new(1.7e-5, 250_000.0)),
            wing_area_m2: 122.0,
            time_step_s: 5.0,
            max_steps: 10_000,
            interrupt_if_unfeasible: true,
            maximum_cl: None,
            engine_setting: EngineSetting::Cruise,
            isa_offset_k: 0.0,
        }
    }

    fn single_cruise_mission() -> Mission {
        let mut start = FlightPoint::zeroed(0.0);
        start.altitude = 10_668.0;
        start.mach = 0.78;
        let props = msim_atmosphere::properties(msim_atmosphere::AtmosphereState::new(10_668.0, 0.0)).unwrap();
        start.true_airspeed = msim_atmosphere::mach_to_tas(0.78, &props);
        start.equivalent_airspeed = msim_atmosphere::tas_to_eas(start.true_airspeed, &props);

        let mass_input = ResolvedSegment::MassInput {
            name: "mass_input".to_string(),
            variable_name: "data:mission:single_cruise:TOW".to_string(),
            mass_kg: Cell::new(70_000.0),
        };
        let prefix = Phase { name: "prefix".to_string(), parts: vec![Part::Segment(mass_input)] };

        let cruise = CruiseSegment {
            name: "cruise".to_string(),
            resources: resources(),
            tolerance_m: 10.0,
            optimal: false,
        };
        let route = Route {
            name: "main".to_string(),
            climb: vec![],
            cruise,
            descent: vec![],
            range_m: Cell::new(3_704_000.0),
            distance_accuracy_m: 50.0,
        };

        Mission {
            name: "single_cruise".to_string(),
            parts: vec![MissionPart::Phase(prefix), MissionPart::Route(route)],
            isa_offset_k: 0.0,
            use_all_block_fuel: false,
            block_fuel_kg: 0.0,
            adjust_fuel: false,
            compute_tow: false,
            owe_kg: 0.0,
            payload_kg: 0.0,
            start,
        }
    }

    #[test]
    fn single_cruise_mission_burns_expected_fuel_and_duration() {
        let mission = single_cruise_mission();
        let output = mission.run().unwrap();
        assert!((output.total_fuel_kg - 6_900.0).abs() < 400.0, "fuel = {}", output.total_fuel_kg);
        let hours = output.total_time_s / 3_600.0;
        assert!((hours - 4.42).abs() < 0.2, "duration_h = {hours}");

        let mut last_mass = f64::INFINITY;
        for point in &output.points {
            assert!(point.mass <= last_mass + 1e-6);
            last_mass = point.mass;
        }
    }

    #[test]
    fn missing_mass_input_is_rejected() {
        let mut start = FlightPoint::zeroed(0.0);
        start.true_airspeed = 200.0;
        let segment = ResolvedSegment::LevelFlight {
            name: "level".to_string(),
            policy: LevelFlightPolicy { stop: LevelStop::GroundDistance(1_000.0), tolerance: 10.0 },
            resources: resources(),
        };
        let phase = Phase { name: "no_mass_input".to_string(), parts: vec![Part::Segment(segment)] };
        let mission = Mission {
            name: "broken".to_string(),
            parts: vec![MissionPart::Phase(phase)],
            isa_offset_k: 0.0,
            use_all_block_fuel: false,
            block_fuel_kg: 0.0,
            adjust_fuel: false,
            compute_tow: false,
            owe_kg: 0.0,
            payload_kg: 0.0,
            start,
        };
        assert!(matches!(mission.run(), Err(MissionError::MissingMassInput { .. })));
    }

    #[test]
    fn reserve_is_multiplier_times_referenced_route_fuel() {
        let mut mission = single_cruise_mission();
        mission.parts.push(MissionPart::Reserve(ReserveRef {
            name: "reserve".to_string(),
            ref_route_name: "main".to_string(),
            multiplier: 0.05,
        }));
        let first = mission.run().unwrap();
        let main_fuel = first
            .per_part
            .iter()
            .find(|(name, _)| name == "main")
            .unwrap()
            .1
            .fuel_kg;
        assert!((first.reserve_fuel_kg - 0.05 * main_fuel).abs() < 1e-6);

        let second = mission.run().unwrap();
        assert!((first.total_fuel_kg - second.total_fuel_kg).abs() < 1e-6);
    }

    #[test]
    fn adjust_fuel_sets_tow_and_block_fuel_from_needed_fuel() {
        let mut mission = single_cruise_mission();
        mission.adjust_fuel = true;
        mission.owe_kg = 40_000.0;
        mission.payload_kg = 15_000.0;
        let output = mission.run().unwrap();

        assert_eq!(output.block_fuel_kg, Some(output.needed_block_fuel_kg));
        let tow = output.tow_kg.unwrap();
        assert!((tow - (40_000.0 + 15_000.0 + output.needed_block_fuel_kg)).abs() < 1e-6);
    }

    #[test]
    fn compute_tow_false_derives_block_fuel_from_input_mass() {
        let mut mission = single_cruise_mission();
        mission.owe_kg = 40_000.0;
        mission.payload_kg = 15_000.0;
        mission.use_all_block_fuel = true;
        mission.block_fuel_kg = 10_000.0;
        let output = mission.run().unwrap();

        // compute_tow is false, so the range-solve is skipped and block
        // fuel is read back from the mission's fixed TOW (70_000 kg, the
        // MassInput segment's bound value) instead of being solved for.
        assert_eq!(output.block_fuel_kg, Some(70_000.0 - 40_000.0 - 15_000.0));
        assert_eq!(output.tow_kg, None);
        assert!((output.total_fuel_kg - single_cruise_mission().run().unwrap().total_fuel_kg).abs() < 1e-6);
    }

    #[test]
    fn use_all_block_fuel_with_compute_tow_solves_range_to_match_block_fuel() {
        let mut mission = single_cruise_mission();
        mission.use_all_block_fuel = true;
        mission.compute_tow = true;
        mission.owe_kg = 40_000.0;
        mission.payload_kg = 15_000.0;
        mission.block_fuel_kg = 9_000.0;
        let output = mission.run().unwrap();

        let target = mission.block_fuel_kg - output.reserve_fuel_kg;
        assert!((output.total_fuel_kg - target).abs() < 1e-2, "total_fuel = {}", output.total_fuel_kg);
        assert_eq!(output.block_fuel_kg, Some(9_000.0));
        assert!((output.tow_kg.unwrap() - (40_000.0 + 15_000.0 + 9_000.0)).abs() < 1e-6);
    }
}
