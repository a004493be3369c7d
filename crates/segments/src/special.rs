//! The two zero-duration pseudo segments: `Start`, which seeds the initial
//! `FlightPoint` of a mission part, and `MassInput`, which binds the
//! externally supplied reference mass into the stream.

use msim_flightpoint::FlightPoint;

/// Explicit initial values for a `Start` segment (§3 "Lifecycle / ownership").
#[derive(Debug, Clone, Copy)]
pub struct StartValues {
    pub altitude_m: f64,
    pub true_airspeed_m_s: f64,
    pub mass_kg: f64,
    pub isa_offset_k: f64,
}

/// Build the single `FlightPoint` a `Start` segment emits.
pub fn start_point(values: StartValues, part_name: &str) -> FlightPoint {
    let mut fp = FlightPoint::zeroed(values.isa_offset_k);
    fp.altitude = values.altitude_m;
    fp.true_airspeed = values.true_airspeed_m_s;
    fp.mass = values.mass_kg;
    fp.name = Some(part_name.to_string());
    fp
}

/// Bind the mission's reference mass into the stream at a `MassInput`
/// segment: identity on every field except `mass`, which is overwritten
/// with the externally provided value (§4.8 step 3).
pub fn mass_input_point(mut current: FlightPoint, mass_kg: f64, part_name: &str) -> FlightPoint {
    current.mass = mass_kg;
    current.name = Some(part_name.to_string());
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_point_seeds_explicit_values() {
        let fp = start_point(
            StartValues { altitude_m: 0.0, true_airspeed_m_s: 0.0, mass_kg: 70_000.0, isa_offset_k: 0.0 },
            "start",
        );
        assert_eq!(fp.mass, 70_000.0);
        assert_eq!(fp.time, 0.0);
        assert_eq!(fp.consumed_fuel, 0.0);
    }

    #[test]
    fn mass_input_overwrites_only_mass() {
        let mut current = FlightPoint::zeroed(0.0);
        current.ground_distance = 500.0;
        let bound = mass_input_point(current, 72_000.0, "mass_input");
        assert_eq!(bound.mass, 72_000.0);
        assert_eq!(bound.ground_distance, 500.0);
    }
}
