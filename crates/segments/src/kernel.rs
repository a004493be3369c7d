//! The shared time-step integration loop (§4.4) every segment kind runs,
//! parameterized over a small per-kind capability trait (§9 "Dynamic
//! dispatch across segment kinds").

use msim_atmosphere::{self as atmosphere, AtmosphereState};
use msim_core::constants::G0;
use msim_flightpoint::FlightPoint;
use msim_polar::Polar;
use msim_propulsion::{EngineSetting, PropulsionModel};

use crate::SegmentError;

/// Parameters shared by every segment kind, resolved by the phase/route
/// layer before the segment runs.
pub struct SegmentContext<'a> {
    pub part_name: String,
    pub polar: &'a Polar,
    pub propulsion: &'a dyn PropulsionModel,
    pub wing_area_m2: f64,
    pub time_step_s: f64,
    pub max_steps: usize,
    pub interrupt_if_unfeasible: bool,
    pub maximum_cl: Option<f64>,
    pub engine_setting: EngineSetting,
    pub isa_offset_k: f64,
}

/// Per-kind behavior the generic stepping loop defers to.
pub trait SegmentPolicy {
    /// Signed residual driving the stop condition; sign matters for
    /// overshoot detection.
    fn distance_to_target(
        &self,
        current: &FlightPoint,
        ctx: &SegmentContext,
    ) -> Result<f64, SegmentError>;

    /// Convergence tolerance on [`SegmentPolicy::distance_to_target`].
    fn tolerance(&self) -> f64;

    /// Seed the propulsion-relevant fields (`thrust`, `thrust_rate`,
    /// `thrust_is_regulated`) on `next` before the propulsion query. For a
    /// manual-thrust policy this sets the commanded rate; for a
    /// regulated-thrust policy this sets a trial thrust solving the
    /// tangential force balance.
    fn prepare_thrust(&self, current: &FlightPoint, drag_n: f64, lift_n: f64, next: &mut FlightPoint);

    /// Flight-path angle and along-track acceleration for this step, given
    /// the post-propulsion thrust.
    fn gamma_and_acceleration(
        &self,
        current: &FlightPoint,
        thrust_n: f64,
        drag_n: f64,
        lift_n: f64,
        mass_kg: f64,
    ) -> (f64, f64);

    /// Called once per accepted step, after the physics update, to enforce
    /// any policy-specific constraint on the new point (e.g. re-deriving
    /// true airspeed from a held Mach number). Default: no adjustment.
    fn adjust_after_step(&self, _previous: &FlightPoint, _next: &mut FlightPoint) {}

    /// Override the lift coefficient used for this step instead of the
    /// default equilibrium force balance (`CL = 2mg·cos(γ) / (ρV²S)`).
    /// `Rotation` (§4.5) overrides this to read `CL` from the polar's
    /// alpha-indexed mode (`Polar::cl_at_alpha`) rather than CL-indexed,
    /// since during rotation lift is driven by the commanded angle of
    /// attack, not by a force balance the aircraft hasn't reached yet.
    /// Default: no override, use the force-balance `CL`.
    fn cl_override(&self, _current: &FlightPoint, _ctx: &SegmentContext) -> Option<f64> {
        None
    }

    /// Whether `current` is in an unfeasible state the caller should react
    /// to (e.g. climb rate at or below zero for a climb segment). Default:
    /// never unfeasible; kinds with a specific notion override this.
    fn is_unfeasible(&self, _current: &FlightPoint) -> Option<String> {
        None
    }
}

fn forces_at<P: SegmentPolicy>(
    policy: &P,
    current: &FlightPoint,
    ctx: &SegmentContext,
) -> Result<(f64, f64, f64, f64), SegmentError> {
    let props = atmosphere::properties(AtmosphereState::new(current.altitude, ctx.isa_offset_k))?;
    let v = current.true_airspeed;
    let gamma = current.slope_angle;
    let q = 0.5 * props.density_kg_m3 * v * v;
    let weight = current.mass * G0;
    let cl = match policy.cl_override(current, ctx) {
        Some(cl) => cl,
        None if q * ctx.wing_area_m2 > 1e-9 => weight * gamma.cos() / (q * ctx.wing_area_m2),
        None => 0.0,
    };
    let cd = ctx.polar.cd_at(cl, current);
    let drag = q * ctx.wing_area_m2 * cd;
    let lift = q * ctx.wing_area_m2 * cl;
    Ok((cl, cd, drag, lift))
}

/// Advance `current` by `dt` seconds: one forward-Euler step per §4.4
/// steps 1-6.
fn advance<P: SegmentPolicy>(
    policy: &P,
    current: &FlightPoint,
    ctx: &SegmentContext,
    dt: f64,
) -> Result<FlightPoint, SegmentError> {
    let (cl, cd, drag, lift) = forces_at(policy, current, ctx)?;

    let mut next = current.clone();
    policy.prepare_thrust(current, drag, lift, &mut next);
    ctx.propulsion.compute_flight_points(std::slice::from_mut(&mut next))?;

    let (gamma, acceleration) = policy.gamma_and_acceleration(current, next.thrust, drag, lift, current.mass);

    let v_new = (current.true_airspeed + acceleration * dt).max(0.0);
    let h_new = current.altitude + current.true_airspeed * gamma.sin() * dt;
    let x_new = current.ground_distance + current.true_airspeed * gamma.cos() * dt;
    let t_new = current.time + dt;
    let consumed = ctx.propulsion.consumed_mass(&next, dt)?;
    let m_new = (current.mass - consumed).max(0.0);

    let props_new = atmosphere::properties(AtmosphereState::new(h_new, ctx.isa_offset_k))?;

    next.true_airspeed = v_new;
    next.altitude = h_new;
    next.ground_distance = x_new;
    next.time = t_new;
    next.mass = m_new;
    next.consumed_fuel = current.consumed_fuel + consumed;
    next.slope_angle = gamma;
    next.acceleration = acceleration;
    next.cl = cl;
    next.cd = cd;
    next.drag = drag;
    next.lift = lift;
    next.isa_offset = ctx.isa_offset_k;
    next.equivalent_airspeed = atmosphere::tas_to_eas(v_new, &props_new);
    next.mach = atmosphere::tas_to_mach(v_new, &props_new);
    next.name = Some(ctx.part_name.clone());

    policy.adjust_after_step(current, &mut next);
    Ok(next)
}

/// Run the shared stepping loop (§4.4) from `start` until `policy`'s target
/// residual is satisfied, the step limit is hit, or an unfeasible state is
/// reached.
pub fn run_segment<P: SegmentPolicy>(
    policy: &P,
    start: FlightPoint,
    ctx: &SegmentContext,
) -> Result<Vec<FlightPoint>, SegmentError> {
    let mut trace = vec![start.clone()];
    let mut current = start;

    for _ in 0..ctx.max_steps {
        let d = policy.distance_to_target(&current, ctx)?;
        if d.abs() <= policy.tolerance() {
            return Ok(trace);
        }

        let trial = advance(policy, &current, ctx, ctx.time_step_s)?;
        let trial_d = policy.distance_to_target(&trial, ctx)?;

        let next = if trial_d.abs() <= policy.tolerance() || trial_d.signum() != d.signum() {
            // Overshoot: linearly extrapolate the time step that lands
            // exactly on the target from the two residual samples.
            let denom = (d - trial_d).abs();
            let dt = if denom > 1e-12 {
                ctx.time_step_s * (d.abs() / denom).clamp(0.0, 1.0)
            } else {
                ctx.time_step_s
            };
            advance(policy, &current, ctx, dt)?
        } else {
            trial
        };

        trace.push(next.clone());

        if let Some(max_cl) = ctx.maximum_cl {
            if next.cl > max_cl {
                return Err(SegmentError::ClExceeded {
                    part: ctx.part_name.clone(),
                    cl: next.cl,
                    max_cl,
                });
            }
        }

        if let Some(reason) = policy.is_unfeasible(&next) {
            if ctx.interrupt_if_unfeasible {
                return Err(SegmentError::Unfeasible { part: ctx.part_name.clone(), reason });
            }
            return Ok(trace);
        }

        if policy.distance_to_target(&next, ctx)?.abs() <= policy.tolerance() {
            return Ok(trace);
        }

        current = next;
    }

    Err(SegmentError::StepLimit { part: ctx.part_name.clone(), max_steps: ctx.max_steps })
}
