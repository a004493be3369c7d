//! The route solver (§4.7): composes `{climb parts, one cruise segment,
//! descent parts}` and solves the cruise ground distance by bisection so
//! the total ground distance covered equals the target range.

use std::cell::Cell;

use msim_atmosphere::{self as atmosphere, AtmosphereState};
use msim_flightpoint::FlightPoint;
use msim_segments::LevelFlightPolicy;
use msim_segments::LevelStop;

use crate::error::MissionError;
use crate::phase::{run_phases, Phase};
use crate::segment::{ResolvedSegment, SegmentResources};
use crate::PartTotals;

/// The route's single cruise (or optimal-cruise) segment, parameterized by
/// the ground distance the bisection solver assigns it (§3 "Route":
/// "cruise has no distance target — the route selects it").
pub struct CruiseSegment {
    pub name: String,
    pub resources: SegmentResources,
    pub tolerance_m: f64,
    /// `OptimalCruise` (§4.7): before running, the start altitude is
    /// re-pointed to the altitude of maximum L/D at the mass entering
    /// cruise, holding the current Mach number constant.
    pub optimal: bool,
}

impl CruiseSegment {
    fn run(&self, mut start: FlightPoint, ground_distance_m: f64) -> Result<Vec<FlightPoint>, MissionError> {
        if self.optimal {
            let props = atmosphere::properties(AtmosphereState::new(start.altitude, self.resources.isa_offset_k))
                .map_err(|source| MissionError::Segment {
                    part: self.name.clone(),
                    source: msim_segments::SegmentError::Atmosphere(source),
                })?;
            let mach = atmosphere::tas_to_mach(start.true_airspeed, &props);
            let optimal_altitude = msim_segments::altitude_at_max_ld(
                start.mass,
                mach,
                &self.resources.polar,
                self.resources.isa_offset_k,
                self.resources.wing_area_m2,
            )
            .map_err(|source| MissionError::Segment { part: self.name.clone(), source })?;
            let new_props =
                atmosphere::properties(AtmosphereState::new(optimal_altitude, self.resources.isa_offset_k))
                    .map_err(|source| MissionError::Segment {
                        part: self.name.clone(),
                        source: msim_segments::SegmentError::Atmosphere(source),
                    })?;
            start.altitude = optimal_altitude;
            start.true_airspeed = atmosphere::mach_to_tas(mach, &new_props);
            start.mach = mach;
            start.equivalent_airspeed = atmosphere::tas_to_eas(start.true_airspeed, &new_props);
        }

        let policy = LevelFlightPolicy {
            stop: LevelStop::GroundDistance(start.ground_distance + ground_distance_m),
            tolerance: self.tolerance_m,
        };
        let segment = ResolvedSegment::LevelFlight {
            name: self.name.clone(),
            policy,
            resources: self.resources.clone(),
        };
        segment
            .run(start)
            .map_err(|source| MissionError::Segment { part: self.name.clone(), source })
    }
}

pub struct Route {
    pub name: String,
    pub climb: Vec<Phase>,
    pub cruise: CruiseSegment,
    pub descent: Vec<Phase>,
    /// Held in a `Cell` so the block-fuel outer loop (§4.8) can rebind the
    /// main route's range between replays without `&mut self`.
    pub range_m: Cell<f64>,
    pub distance_accuracy_m: f64,
}

impl Route {
    pub fn set_range(&self, range_m: f64) {
        self.range_m.set(range_m);
    }
}

pub struct RouteOutput {
    pub points: Vec<FlightPoint>,
    pub per_part: Vec<(String, PartTotals)>,
}

const MAX_BISECTION_ITERATIONS: usize = 100;
const BRACKET_EXPANSION_CAP: f64 = 10.0;

impl Route {
    /// Run the route from `start`, solving for the cruise ground distance
    /// by bisection (§4.7).
    pub fn run(&self, start: FlightPoint) -> Result<RouteOutput, MissionError> {
        let range_m = self.range_m.get();
        let (climb_points, climb_totals, after_climb) = run_phases(&self.climb, start)?;
        let start_ground_distance = after_climb.ground_distance;

        let climb_descent_distance_floor = {
            // Distance already covered through the end of climb, relative
            // to the route's own start, establishes the minimum the
            // descent alone cannot undercut below (used for the
            // unreachable-range check below).
            after_climb.ground_distance - start.ground_distance
        };

        let residual = |cruise_distance: f64| -> Result<(f64, Vec<FlightPoint>, Vec<(String, PartTotals)>), MissionError> {
            let before_cruise = after_climb.clone();
            let cruise_trace = self.cruise.run(before_cruise.clone(), cruise_distance)?;
            let after_cruise = cruise_trace.last().unwrap().clone();
            let cruise_totals = PartTotals::from_trace(&before_cruise, &cruise_trace);

            let (descent_points, descent_totals, after_descent) = run_phases(&self.descent, after_cruise)?;

            let total_distance = after_descent.ground_distance - start.ground_distance;
            let mut points = cruise_trace;
            if !descent_points.is_empty() {
                points.extend(descent_points.into_iter().skip(1));
            }
            let mut totals = vec![(self.cruise.name.clone(), cruise_totals)];
            totals.extend(descent_totals);
            Ok((total_distance - range_m, points, totals))
        };

        if climb_descent_distance_floor > range_m && self.descent.is_empty() {
            return Err(MissionError::RouteUnreachable {
                route: self.name.clone(),
                range_m,
                reason: "climb alone already exceeds the target range".to_string(),
            });
        }

        let mut lo = 0.5 * range_m;
        let mut hi = range_m;
        let mut lo_residual = residual(lo)?.0;
        let mut hi_residual = residual(hi)?.0;

        let mut expansions = 0;
        while lo_residual.signum() == hi_residual.signum() && hi < BRACKET_EXPANSION_CAP * range_m {
            lo = hi;
            lo_residual = hi_residual;
            hi *= 2.0;
            hi_residual = residual(hi)?.0;
            expansions += 1;
            if expansions > 8 {
                break;
            }
        }

        if lo_residual.signum() == hi_residual.signum() {
            return Err(MissionError::RouteUnreachable {
                route: self.name.clone(),
                range_m,
                reason: "cruise distance bracket could not be expanded to bracket the target range".to_string(),
            });
        }

        let mut best = residual(0.5 * (lo + hi))?;
        let mut mid = 0.5 * (lo + hi);
        for _ in 0..MAX_BISECTION_ITERATIONS {
            mid = 0.5 * (lo + hi);
            best = residual(mid)?;
            if best.0.abs() <= self.distance_accuracy_m {
                break;
            }
            if best.0.signum() == lo_residual.signum() {
                lo = mid;
                lo_residual = best.0;
            } else {
                hi = mid;
                hi_residual = best.0;
            }
        }
        let _ = mid;

        let (final_residual, tail_points, tail_totals) = best;
        if final_residual.abs() > self.distance_accuracy_m {
            return Err(MissionError::RouteUnreachable {
                route: self.name.clone(),
                range_m,
                reason: "bisection did not converge within the distance accuracy".to_string(),
            });
        }

        let mut points = climb_points;
        if !tail_points.is_empty() {
            points.extend(tail_points.into_iter().skip(1));
        }

        let mut per_part = climb_totals;
        per_part.extend(tail_totals);

        let _ = start_ground_distance;
        Ok(RouteOutput { points, per_part })
    }
}
