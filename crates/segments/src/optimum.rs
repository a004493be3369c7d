//! Altitude-of-maximum-L/D search and flight-level rounding (§4.4), shared
//! by the `AltitudeChange` segment (target `optimal_altitude`) and the
//! route solver (`OptimalCruise`'s per-iteration altitude adjustment).

use msim_atmosphere::{self as atmosphere, AtmosphereState};
use msim_polar::Polar;

use crate::SegmentError;

const SEARCH_STEPS: usize = 200;
/// 2000 ft, the flight-level discretization step (§9 glossary).
pub const FLIGHT_LEVEL_STEP_M: f64 = 609.6;
/// L/D loss tolerance used to decide whether to round a flight level up
/// instead of down (§9 open question 1): treated as a tunable, fixed here.
const FLIGHT_LEVEL_LD_TOLERANCE: f64 = 0.01;

fn lift_to_drag_at(
    altitude_m: f64,
    mass_kg: f64,
    mach: f64,
    polar: &Polar,
    isa_offset_k: f64,
    wing_area_m2: f64,
) -> Result<f64, SegmentError> {
    let props = atmosphere::properties(AtmosphereState::new(altitude_m, isa_offset_k))?;
    let tas = atmosphere::mach_to_tas(mach, &props);
    let q = 0.5 * props.density_kg_m3 * tas * tas;
    if q * wing_area_m2 < 1e-9 {
        return Ok(0.0);
    }
    let cl = mass_kg * msim_core::constants::G0 / (q * wing_area_m2);
    let cd = polar.cd_at(cl, &msim_flightpoint::FlightPoint { altitude: altitude_m, ..Default::default() });
    Ok(cl / cd)
}

/// Altitude (m) maximizing L/D at the given mass and Mach number, found by
/// coarse search over the modeled atmosphere.
pub fn altitude_at_max_ld(
    mass_kg: f64,
    mach: f64,
    polar: &Polar,
    isa_offset_k: f64,
    wing_area_m2: f64,
) -> Result<f64, SegmentError> {
    let max_altitude = msim_atmosphere::MAX_ALTITUDE_M;
    let mut best_altitude = 0.0;
    let mut best_ld = f64::NEG_INFINITY;
    for i in 0..=SEARCH_STEPS {
        let altitude = max_altitude * (i as f64) / (SEARCH_STEPS as f64);
        let ld = lift_to_drag_at(altitude, mass_kg, mach, polar, isa_offset_k, wing_area_m2)?;
        if ld > best_ld {
            best_ld = ld;
            best_altitude = altitude;
        }
    }
    Ok(best_altitude)
}

/// Round a continuous optimal altitude down to the nearest flight level
/// (2000 ft step), unless that loses more than 1% of the attainable L/D, in
/// which case round up instead (§4.4 "Flight-level rounding").
pub fn round_to_flight_level(
    continuous_altitude_m: f64,
    mass_kg: f64,
    mach: f64,
    polar: &Polar,
    isa_offset_k: f64,
    wing_area_m2: f64,
) -> Result<f64, SegmentError> {
    let down = (continuous_altitude_m / FLIGHT_LEVEL_STEP_M).floor() * FLIGHT_LEVEL_STEP_M;
    let up = down + FLIGHT_LEVEL_STEP_M;

    let ld_continuous = lift_to_drag_at(continuous_altitude_m, mass_kg, mach, polar, isa_offset_k, wing_area_m2)?;
    let ld_down = lift_to_drag_at(down, mass_kg, mach, polar, isa_offset_k, wing_area_m2)?;
    let ld_up = lift_to_drag_at(up, mass_kg, mach, polar, isa_offset_k, wing_area_m2)?;

    let down_loss = (ld_continuous - ld_down) / ld_continuous.max(1e-9);
    if down_loss <= FLIGHT_LEVEL_LD_TOLERANCE || ld_up <= ld_down {
        Ok(down.max(0.0))
    } else {
        Ok(up.min(msim_atmosphere::MAX_ALTITUDE_M))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_polar() -> Polar {
        Polar::new(vec![0.0, 0.3, 0.6, 1.0], vec![0.015, 0.02, 0.035, 0.07]).unwrap()
    }

    #[test]
    fn altitude_search_stays_within_modeled_range() {
        let polar = sample_polar();
        let altitude = altitude_at_max_ld(70_000.0, 0.78, &polar, 0.0, 122.0).unwrap();
        assert!(altitude >= 0.0 && altitude <= msim_atmosphere::MAX_ALTITUDE_M);
    }

    #[test]
    fn flight_level_rounding_lands_on_a_2000ft_multiple() {
        let polar = sample_polar();
        let continuous = altitude_at_max_ld(70_000.0, 0.78, &polar, 0.0, 122.0).unwrap();
        let rounded = round_to_flight_level(continuous, 70_000.0, 0.78, &polar, 0.0, 122.0).unwrap();
        let steps = rounded / FLIGHT_LEVEL_STEP_M;
        assert!((steps - steps.round()).abs() < 1e-6);
    }
}
