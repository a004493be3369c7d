//! Macroscopic single-step segments (§4.6), used where detailed integration
//! is not wanted: a mass ratio applied directly, with the end state jumping
//! straight to its target fields.

use msim_flightpoint::FlightPoint;

/// End-state target for a [`Transition`] segment. Every field is optional;
/// unset fields keep the start point's value.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionTarget {
    pub altitude_m: Option<f64>,
    pub mach: Option<f64>,
    pub true_airspeed_m_s: Option<f64>,
    pub delta_ground_distance_m: Option<f64>,
}

/// A macroscopic jump segment: `m_end = mass_ratio * m_start`, with
/// `reserve_mass_ratio` recording fuel set aside for reserves without
/// affecting `consumed_fuel`.
#[derive(Debug, Clone, Copy)]
pub struct Transition {
    pub mass_ratio: f64,
    pub reserve_mass_ratio: Option<f64>,
    pub target: TransitionTarget,
    pub duration_s: f64,
}

/// Run a transition: emits exactly the start point and the end point per §4.6.
pub fn run_transition(transition: &Transition, start: FlightPoint, part_name: &str) -> Vec<FlightPoint> {
    let mut end = start.clone();
    let consumed = (1.0 - transition.mass_ratio) * start.mass;
    end.mass = transition.mass_ratio * start.mass;
    end.consumed_fuel = start.consumed_fuel + consumed;
    end.time = start.time + transition.duration_s;
    if let Some(altitude) = transition.target.altitude_m {
        end.altitude = altitude;
    }
    if let Some(mach) = transition.target.mach {
        end.mach = mach;
    }
    if let Some(tas) = transition.target.true_airspeed_m_s {
        end.true_airspeed = tas;
    }
    if let Some(delta) = transition.target.delta_ground_distance_m {
        end.ground_distance = start.ground_distance + delta;
    }
    end.name = Some(part_name.to_string());
    vec![start, end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_mass_ratio_and_tracks_consumed_fuel() {
        let transition = Transition {
            mass_ratio: 0.995,
            reserve_mass_ratio: None,
            target: TransitionTarget { delta_ground_distance_m: Some(-100.0), ..Default::default() },
            duration_s: 120.0,
        };
        let mut start = FlightPoint::zeroed(0.0);
        start.mass = 70_000.0;
        let trace = run_transition(&transition, start, "takeoff_transition");
        assert_eq!(trace.len(), 2);
        let end = &trace[1];
        assert!((end.mass - 69_650.0).abs() < 1e-6);
        assert!((end.consumed_fuel - 350.0).abs() < 1e-6);
        assert!((end.ground_distance - (-100.0)).abs() < 1e-6);
    }
}
