//! Ground roll, rotation, and initial climb (§4.5), plus the `Takeoff`
//! composite that chains them with continuity of state.

use msim_core::constants::G0;
use msim_flightpoint::FlightPoint;
use msim_polar::Polar;

use crate::kernel::{run_segment, SegmentContext, SegmentPolicy};
use crate::SegmentError;

/// Ground-roll acceleration with wheel friction, thrust at a given rate,
/// `gamma = 0`. Stops at a target true airspeed, or at zero airspeed
/// (a rejected takeoff).
#[derive(Debug, Clone, Copy)]
pub struct GroundSpeedChangePolicy {
    pub target_true_airspeed: f64,
    pub thrust_rate: f64,
    pub friction_coefficient: f64,
    pub tolerance_m_s: f64,
}

impl SegmentPolicy for GroundSpeedChangePolicy {
    fn distance_to_target(&self, current: &FlightPoint, _ctx: &SegmentContext) -> Result<f64, SegmentError> {
        Ok(self.target_true_airspeed - current.true_airspeed)
    }

    fn tolerance(&self) -> f64 {
        self.tolerance_m_s
    }

    fn prepare_thrust(&self, _current: &FlightPoint, _drag_n: f64, _lift_n: f64, next: &mut FlightPoint) {
        next.thrust_is_regulated = false;
        next.thrust_rate = self.thrust_rate;
    }

    fn gamma_and_acceleration(&self, current: &FlightPoint, thrust_n: f64, drag_n: f64, lift_n: f64, mass_kg: f64) -> (f64, f64) {
        let weight = mass_kg * G0;
        let friction = self.friction_coefficient * (weight - lift_n).max(0.0);
        let _ = current;
        (0.0, (thrust_n - drag_n - friction) / mass_kg)
    }

    fn is_unfeasible(&self, current: &FlightPoint) -> Option<String> {
        if current.time > 0.0 && current.true_airspeed <= 0.0 {
            Some("ground roll decelerated back to zero airspeed (rejected takeoff)".to_string())
        } else {
            None
        }
    }
}

/// Pitches angle of attack at a constant rate from the current value to
/// `alpha_limit_rad`, reading lift from the polar's alpha-indexed mode.
#[derive(Debug, Clone, Copy)]
pub struct RotationPolicy {
    pub alpha_limit_rad: f64,
    pub rotation_rate_rad_s: f64,
    pub thrust_rate: f64,
    pub tolerance_rad: f64,
}

impl SegmentPolicy for RotationPolicy {
    fn distance_to_target(&self, current: &FlightPoint, _ctx: &SegmentContext) -> Result<f64, SegmentError> {
        Ok(self.alpha_limit_rad - current.alpha)
    }

    fn tolerance(&self) -> f64 {
        self.tolerance_rad
    }

    fn prepare_thrust(&self, _current: &FlightPoint, _drag_n: f64, _lift_n: f64, next: &mut FlightPoint) {
        next.thrust_is_regulated = false;
        next.thrust_rate = self.thrust_rate;
    }

    fn gamma_and_acceleration(&self, _current: &FlightPoint, thrust_n: f64, drag_n: f64, _lift_n: f64, mass_kg: f64) -> (f64, f64) {
        (0.0, (thrust_n - drag_n) / mass_kg)
    }

    fn adjust_after_step(&self, previous: &FlightPoint, next: &mut FlightPoint) {
        let direction = (self.alpha_limit_rad - previous.alpha).signum();
        let step = direction * self.rotation_rate_rad_s * (next.time - previous.time);
        next.alpha = (previous.alpha + step).clamp(
            previous.alpha.min(self.alpha_limit_rad),
            previous.alpha.max(self.alpha_limit_rad),
        );
    }

    /// §4.5: "lift uses the polar evaluated at current α ... the polar
    /// exposes an alternate interpolation mode `cl_at_alpha`". Falls back to
    /// the default force-balance `CL` if the polar carries no alpha-lift
    /// slope (e.g. a CL-indexed-only polar reused from another segment).
    fn cl_override(&self, current: &FlightPoint, ctx: &SegmentContext) -> Option<f64> {
        ctx.polar.cl_at_alpha(current.alpha)
    }
}

/// Free-flight climb to a target `delta_altitude` (typically 35 ft), with
/// `gamma` from the vertical force balance and a fine time step.
#[derive(Debug, Clone, Copy)]
pub struct EndOfTakeoffPolicy {
    pub target_altitude_m: f64,
    pub thrust_rate: f64,
    pub tolerance_m: f64,
}

impl SegmentPolicy for EndOfTakeoffPolicy {
    fn distance_to_target(&self, current: &FlightPoint, _ctx: &SegmentContext) -> Result<f64, SegmentError> {
        Ok(self.target_altitude_m - current.altitude)
    }

    fn tolerance(&self) -> f64 {
        self.tolerance_m
    }

    fn prepare_thrust(&self, _current: &FlightPoint, _drag_n: f64, _lift_n: f64, next: &mut FlightPoint) {
        next.thrust_is_regulated = false;
        next.thrust_rate = self.thrust_rate;
    }

    fn gamma_and_acceleration(&self, _current: &FlightPoint, thrust_n: f64, drag_n: f64, lift_n: f64, mass_kg: f64) -> (f64, f64) {
        let weight = mass_kg * G0;
        let sin_gamma = ((lift_n - weight) / weight.max(1.0)).clamp(-1.0, 1.0);
        (sin_gamma.asin(), (thrust_n - drag_n) / mass_kg)
    }
}

/// Maximum step size for `EndOfTakeoff` (§4.5).
pub const END_OF_TAKEOFF_MAX_TIME_STEP_S: f64 = 0.05;

/// Chains `GroundSpeedChange`, `Rotation`, and `EndOfTakeoff` with automatic
/// continuity of state, emitting one combined trace.
pub fn run_takeoff(
    ground_roll: GroundSpeedChangePolicy,
    rotation: RotationPolicy,
    end_of_takeoff: EndOfTakeoffPolicy,
    start: FlightPoint,
    ground_roll_ctx: &SegmentContext,
    rotation_ctx: &SegmentContext,
    end_of_takeoff_ctx: &SegmentContext,
) -> Result<Vec<FlightPoint>, SegmentError> {
    let mut trace = run_segment(&ground_roll, start, ground_roll_ctx)?;
    let after_roll = trace.last().unwrap().clone();

    let rotation_trace = run_segment(&rotation, after_roll, rotation_ctx)?;
    let after_rotation = rotation_trace.last().unwrap().clone();
    trace.extend(rotation_trace.into_iter().skip(1));

    let climb_trace = run_segment(&end_of_takeoff, after_rotation, end_of_takeoff_ctx)?;
    trace.extend(climb_trace.into_iter().skip(1));

    Ok(trace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use msim_propulsion::{ConstantSfcPropulsion, EngineSetting};

    fn context<'a>(polar: &'a Polar, propulsion: &'a ConstantSfcPropulsion, name: &str, dt: f64) -> SegmentContext<'a> {
        SegmentContext {
            part_name: name.to_string(),
            polar,
            propulsion,
            wing_area_m2: 122.0,
            time_step_s: dt,
            max_steps: 10_000,
            interrupt_if_unfeasible: true,
            maximum_cl: None,
            engine_setting: EngineSetting::Takeoff,
            isa_offset_k: 0.0,
        }
    }

    #[test]
    fn ground_speed_change_reaches_target_airspeed() {
        let polar = Polar::new(vec![0.0, 1.0], vec![0.02, 0.05]).unwrap();
        let propulsion = ConstantSfcPropulsion::new(2.0e-5, 250_000.0);
        let ctx = context(&polar, &propulsion, "ground_roll", 1.0);
        let mut start = FlightPoint::zeroed(0.0);
        start.mass = 70_000.0;
        let policy = GroundSpeedChangePolicy {
            target_true_airspeed: 80.0,
            thrust_rate: 1.0,
            friction_coefficient: 0.02,
            tolerance_m_s: 0.5,
        };
        let trace = run_segment(&policy, start, &ctx).unwrap();
        let last = trace.last().unwrap();
        assert!((last.true_airspeed - 80.0).abs() <= 0.5);
    }

    #[test]
    fn rotation_pitches_to_alpha_limit_using_alpha_indexed_cl() {
        let polar = Polar::new(vec![0.0, 1.0], vec![0.02, 0.05])
            .unwrap()
            .with_alpha_lift_slope(2.0 * std::f64::consts::PI, 0.0);
        let propulsion = ConstantSfcPropulsion::new(2.0e-5, 250_000.0);
        let ctx = context(&polar, &propulsion, "rotation", 0.1);
        let mut start = FlightPoint::zeroed(0.0);
        start.mass = 70_000.0;
        start.true_airspeed = 80.0;
        let policy = RotationPolicy {
            alpha_limit_rad: 0.12,
            rotation_rate_rad_s: 0.0524,
            thrust_rate: 1.0,
            tolerance_rad: 0.001,
        };
        let trace = run_segment(&policy, start, &ctx).unwrap();
        let last = trace.last().unwrap();
        assert!((last.alpha - 0.12).abs() <= 0.001);
        // CL at the final alpha should come from the alpha slope, not the
        // force-balance formula the other segment kinds use.
        assert!((last.cl - polar.cl_at_alpha(last.alpha).unwrap()).abs() < 1e-6);
    }

    #[test]
    fn end_of_takeoff_climbs_to_delta_altitude() {
        let polar = Polar::new(vec![0.0, 1.0], vec![0.02, 0.05]).unwrap();
        let propulsion = ConstantSfcPropulsion::new(2.0e-5, 250_000.0);
        let ctx = context(&polar, &propulsion, "end_of_takeoff", END_OF_TAKEOFF_MAX_TIME_STEP_S);
        let mut start = FlightPoint::zeroed(0.0);
        start.mass = 70_000.0;
        start.true_airspeed = 85.0;
        let policy = EndOfTakeoffPolicy { target_altitude_m: 10.7, thrust_rate: 1.0, tolerance_m: 0.2 };
        let trace = run_segment(&policy, start, &ctx).unwrap();
        let last = trace.last().unwrap();
        assert!((last.altitude - 10.7).abs() <= 0.2);
    }
}
