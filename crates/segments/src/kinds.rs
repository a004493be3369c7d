//! Concrete [`SegmentPolicy`] implementations for the altitude-change,
//! speed-change, cruise/hold, and taxi segment kinds (§4.4 table). `delta_`
//! targets are resolved to absolute values by the mission builder before a
//! policy is constructed; only the dynamic `optimal_altitude` /
//! `optimal_flight_level` tokens are re-evaluated here, once per step, as
//! the design requires.

use msim_atmosphere::{self as atmosphere, AtmosphereState};
use msim_core::constants::G0;
use msim_flightpoint::FlightPoint;

use crate::kernel::{SegmentContext, SegmentPolicy};
use crate::optimum;
use crate::SegmentError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AltitudeTarget {
    Absolute(f64),
    OptimalAltitude,
    OptimalFlightLevel,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeldSpeed {
    Mach(f64),
    TrueAirspeed(f64),
    EquivalentAirspeed(f64),
}

/// Climbs or descends at a given thrust rate while holding a commanded
/// airspeed, to a (possibly dynamically recomputed) target altitude.
pub struct AltitudeChangePolicy {
    pub target: AltitudeTarget,
    pub held_speed: HeldSpeed,
    pub thrust_rate: f64,
    pub tolerance_m: f64,
    /// Whether this segment is expected to gain altitude; used to flag an
    /// unfeasible (non-positive climb rate) step.
    pub climbing: bool,
}

impl AltitudeChangePolicy {
    fn mach_at(&self, current: &FlightPoint, ctx: &SegmentContext) -> Result<f64, SegmentError> {
        match self.held_speed {
            HeldSpeed::Mach(m) => Ok(m),
            HeldSpeed::TrueAirspeed(_) | HeldSpeed::EquivalentAirspeed(_) => {
                let props = atmosphere::properties(AtmosphereState::new(current.altitude, ctx.isa_offset_k))?;
                Ok(atmosphere::tas_to_mach(current.true_airspeed, &props))
            }
        }
    }

    fn target_altitude(&self, current: &FlightPoint, ctx: &SegmentContext) -> Result<f64, SegmentError> {
        match self.target {
            AltitudeTarget::Absolute(v) => Ok(v),
            AltitudeTarget::OptimalAltitude => {
                let mach = self.mach_at(current, ctx)?;
                optimum::altitude_at_max_ld(current.mass, mach, ctx.polar, ctx.isa_offset_k, ctx.wing_area_m2)
            }
            AltitudeTarget::OptimalFlightLevel => {
                let mach = self.mach_at(current, ctx)?;
                let continuous =
                    optimum::altitude_at_max_ld(current.mass, mach, ctx.polar, ctx.isa_offset_k, ctx.wing_area_m2)?;
                optimum::round_to_flight_level(
                    continuous,
                    current.mass,
                    mach,
                    ctx.polar,
                    ctx.isa_offset_k,
                    ctx.wing_area_m2,
                )
            }
        }
    }
}

impl SegmentPolicy for AltitudeChangePolicy {
    fn distance_to_target(&self, current: &FlightPoint, ctx: &SegmentContext) -> Result<f64, SegmentError> {
        Ok(self.target_altitude(current, ctx)? - current.altitude)
    }

    fn tolerance(&self) -> f64 {
        self.tolerance_m
    }

    fn prepare_thrust(&self, _current: &FlightPoint, _drag_n: f64, _lift_n: f64, next: &mut FlightPoint) {
        next.thrust_is_regulated = false;
        next.thrust_rate = self.thrust_rate;
    }

    fn gamma_and_acceleration(&self, _current: &FlightPoint, thrust_n: f64, drag_n: f64, _lift_n: f64, mass_kg: f64) -> (f64, f64) {
        let sin_gamma = ((thrust_n - drag_n) / (mass_kg * G0)).clamp(-1.0, 1.0);
        (sin_gamma.asin(), 0.0)
    }

    fn adjust_after_step(&self, _previous: &FlightPoint, next: &mut FlightPoint) {
        if let HeldSpeed::Mach(mach) = self.held_speed {
            if let Ok(props) = atmosphere::properties(AtmosphereState::new(next.altitude, next.isa_offset)) {
                next.true_airspeed = atmosphere::mach_to_tas(mach, &props);
                next.mach = mach;
                next.equivalent_airspeed = atmosphere::tas_to_eas(next.true_airspeed, &props);
            }
        }
    }

    fn is_unfeasible(&self, current: &FlightPoint) -> Option<String> {
        if self.climbing && current.slope_angle <= 0.0 {
            Some(format!("climb rate non-positive (gamma = {:.5} rad)", current.slope_angle))
        } else if !self.climbing && current.slope_angle >= 0.0 {
            Some(format!("descent rate non-negative (gamma = {:.5} rad)", current.slope_angle))
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpeedTarget {
    Mach(f64),
    TrueAirspeed(f64),
    EquivalentAirspeed(f64),
}

/// Accelerates or decelerates at constant altitude and given thrust rate to
/// a target airspeed (§4.4: `gamma = 0`, `a = (T - D) / m`).
pub struct SpeedChangePolicy {
    pub target: SpeedTarget,
    pub thrust_rate: f64,
    pub tolerance: f64,
}

impl SegmentPolicy for SpeedChangePolicy {
    fn distance_to_target(&self, current: &FlightPoint, ctx: &SegmentContext) -> Result<f64, SegmentError> {
        let props = atmosphere::properties(AtmosphereState::new(current.altitude, ctx.isa_offset_k))?;
        let (current_value, target_value) = match self.target {
            SpeedTarget::Mach(m) => (atmosphere::tas_to_mach(current.true_airspeed, &props), m),
            SpeedTarget::TrueAirspeed(v) => (current.true_airspeed, v),
            SpeedTarget::EquivalentAirspeed(v) => (atmosphere::tas_to_eas(current.true_airspeed, &props), v),
        };
        Ok(target_value - current_value)
    }

    fn tolerance(&self) -> f64 {
        self.tolerance
    }

    fn prepare_thrust(&self, _current: &FlightPoint, _drag_n: f64, _lift_n: f64, next: &mut FlightPoint) {
        next.thrust_is_regulated = false;
        next.thrust_rate = self.thrust_rate;
    }

    fn gamma_and_acceleration(&self, _current: &FlightPoint, thrust_n: f64, drag_n: f64, _lift_n: f64, mass_kg: f64) -> (f64, f64) {
        (0.0, (thrust_n - drag_n) / mass_kg)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LevelStop {
    GroundDistance(f64),
    Time(f64),
}

/// Shared policy for `Cruise`, `OptimalCruise`, and `Hold`: level flight at
/// regulated (equilibrium) thrust, stopping on a ground-distance or
/// elapsed-time target (§4.4: `gamma = 0`, `a = 0`).
pub struct LevelFlightPolicy {
    pub stop: LevelStop,
    pub tolerance: f64,
}

impl SegmentPolicy for LevelFlightPolicy {
    fn distance_to_target(&self, current: &FlightPoint, _ctx: &SegmentContext) -> Result<f64, SegmentError> {
        Ok(match self.stop {
            LevelStop::GroundDistance(target) => target - current.ground_distance,
            LevelStop::Time(target) => target - current.time,
        })
    }

    fn tolerance(&self) -> f64 {
        self.tolerance
    }

    fn prepare_thrust(&self, _current: &FlightPoint, drag_n: f64, _lift_n: f64, next: &mut FlightPoint) {
        next.thrust_is_regulated = true;
        next.thrust = drag_n;
    }

    fn gamma_and_acceleration(&self, _current: &FlightPoint, _thrust_n: f64, _drag_n: f64, _lift_n: f64, _mass_kg: f64) -> (f64, f64) {
        (0.0, 0.0)
    }
}

/// Holds position on the ground at zero airspeed change for a given
/// duration, burning fuel at idle/taxi thrust rate (§4.4: `gamma = 0`,
/// `a = 0`, airspeed fixed).
pub struct TaxiPolicy {
    pub target_time_s: f64,
    pub thrust_rate: f64,
    pub tolerance_s: f64,
}

impl SegmentPolicy for TaxiPolicy {
    fn distance_to_target(&self, current: &FlightPoint, _ctx: &SegmentContext) -> Result<f64, SegmentError> {
        Ok(self.target_time_s - current.time)
    }

    fn tolerance(&self) -> f64 {
        self.tolerance_s
    }

    fn prepare_thrust(&self, _current: &FlightPoint, _drag_n: f64, _lift_n: f64, next: &mut FlightPoint) {
        next.thrust_is_regulated = false;
        next.thrust_rate = self.thrust_rate;
    }

    fn gamma_and_acceleration(&self, _current: &FlightPoint, _thrust_n: f64, _drag_n: f64, _lift_n: f64, _mass_kg: f64) -> (f64, f64) {
        (0.0, 0.0)
    }
}
