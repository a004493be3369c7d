//! A resolved, runnable segment: the mission layer's view of one leaf of
//! the composition tree, after the builder has turned every declared
//! parameter into concrete SI values and wired in shared `Polar`/
//! `PropulsionModel` instances (§3 "Lifecycle / ownership": segments hold
//! shared, immutable references to these, modeled here as `Arc` so the
//! mission can be replayed across outer block-fuel iterations without
//! lifetime gymnastics — see DESIGN.md).

use std::cell::Cell;
use std::sync::Arc;

use msim_flightpoint::FlightPoint;
use msim_polar::Polar;
use msim_propulsion::{EngineSetting, PropulsionModel};
use msim_segments::{
    mass_input_point, run_segment, run_takeoff, run_transition, start_point, AltitudeChangePolicy,
    EndOfTakeoffPolicy, GroundSpeedChangePolicy, LevelFlightPolicy, RotationPolicy, SegmentContext,
    SpeedChangePolicy, StartValues, TaxiPolicy, Transition,
};

pub use msim_segments::SegmentError;

/// Parameters every time-step segment kind shares, resolved to concrete SI
/// values (§3 "Segment descriptor" common fields).
#[derive(Clone)]
pub struct SegmentResources {
    pub polar: Arc<Polar>,
    pub propulsion: Arc<dyn PropulsionModel>,
    pub wing_area_m2: f64,
    pub time_step_s: f64,
    pub max_steps: usize,
    pub interrupt_if_unfeasible: bool,
    pub maximum_cl: Option<f64>,
    pub engine_setting: EngineSetting,
    pub isa_offset_k: f64,
}

impl SegmentResources {
    fn context(&self, part_name: &str) -> SegmentContext<'_> {
        SegmentContext {
            part_name: part_name.to_string(),
            polar: self.polar.as_ref(),
            propulsion: self.propulsion.as_ref(),
            wing_area_m2: self.wing_area_m2,
            time_step_s: self.time_step_s,
            max_steps: self.max_steps,
            interrupt_if_unfeasible: self.interrupt_if_unfeasible,
            maximum_cl: self.maximum_cl,
            engine_setting: self.engine_setting,
            isa_offset_k: self.isa_offset_k,
        }
    }
}

/// A fully resolved, ready-to-run leaf segment (§3 "Segment descriptor"
/// `kind` tag dispatched through [`ResolvedSegment::run`] rather than a
/// shared trait object, since each kind's policy type differs).
pub enum ResolvedSegment {
    AltitudeChange { name: String, policy: AltitudeChangePolicy, resources: SegmentResources },
    SpeedChange { name: String, policy: SpeedChangePolicy, resources: SegmentResources },
    LevelFlight { name: String, policy: LevelFlightPolicy, resources: SegmentResources },
    Taxi { name: String, policy: TaxiPolicy, resources: SegmentResources },
    GroundSpeedChange { name: String, policy: GroundSpeedChangePolicy, resources: SegmentResources },
    Rotation { name: String, policy: RotationPolicy, resources: SegmentResources },
    EndOfTakeoff { name: String, policy: EndOfTakeoffPolicy, resources: SegmentResources },
    Takeoff {
        name: String,
        ground_roll: GroundSpeedChangePolicy,
        rotation: RotationPolicy,
        end_of_takeoff: EndOfTakeoffPolicy,
        resources: SegmentResources,
    },
    Transition { name: String, transition: Transition },
    Start { name: String, values: StartValues },
    /// The externally supplied reference mass (§4.8 step 3) is held in a
    /// `Cell` so the block-fuel/TOW outer loop can rebind it between
    /// replays without needing `&mut self` plumbed through the whole
    /// composition tree (§3: "Mission is constructed once ... then
    /// replayed per outer iteration").
    MassInput { name: String, variable_name: String, mass_kg: Cell<f64> },
}

impl ResolvedSegment {
    pub fn name(&self) -> &str {
        match self {
            ResolvedSegment::AltitudeChange { name, .. }
            | ResolvedSegment::SpeedChange { name, .. }
            | ResolvedSegment::LevelFlight { name, .. }
            | ResolvedSegment::Taxi { name, .. }
            | ResolvedSegment::GroundSpeedChange { name, .. }
            | ResolvedSegment::Rotation { name, .. }
            | ResolvedSegment::EndOfTakeoff { name, .. }
            | ResolvedSegment::Takeoff { name, .. }
            | ResolvedSegment::Transition { name, .. }
            | ResolvedSegment::Start { name, .. }
            | ResolvedSegment::MassInput { name, .. } => name,
        }
    }

    /// Run this segment from `start`, producing its emitted trace (§4.4/§4.6).
    pub fn run(&self, start: FlightPoint) -> Result<Vec<FlightPoint>, SegmentError> {
        match self {
            ResolvedSegment::AltitudeChange { name, policy, resources } => {
                run_segment(policy, start, &resources.context(name))
            }
            ResolvedSegment::SpeedChange { name, policy, resources } => {
                run_segment(policy, start, &resources.context(name))
            }
            ResolvedSegment::LevelFlight { name, policy, resources } => {
                run_segment(policy, start, &resources.context(name))
            }
            ResolvedSegment::Taxi { name, policy, resources } => {
                run_segment(policy, start, &resources.context(name))
            }
            ResolvedSegment::GroundSpeedChange { name, policy, resources } => {
                run_segment(policy, start, &resources.context(name))
            }
            ResolvedSegment::Rotation { name, policy, resources } => {
                run_segment(policy, start, &resources.context(name))
            }
            ResolvedSegment::EndOfTakeoff { name, policy, resources } => {
                run_segment(policy, start, &resources.context(name))
            }
            ResolvedSegment::Takeoff { name, ground_roll, rotation, end_of_takeoff, resources } => {
                let roll_ctx = resources.context(&format!("{name}:ground_roll"));
                let rotation_ctx = resources.context(&format!("{name}:rotation"));
                let climb_ctx = resources.context(&format!("{name}:end_of_takeoff"));
                run_takeoff(
                    *ground_roll,
                    *rotation,
                    *end_of_takeoff,
                    start,
                    &roll_ctx,
                    &rotation_ctx,
                    &climb_ctx,
                )
            }
            ResolvedSegment::Transition { name, transition } => {
                Ok(run_transition(transition, start, name))
            }
            ResolvedSegment::Start { name, values } => Ok(vec![start_point(*values, name)]),
            ResolvedSegment::MassInput { name, mass_kg, .. } => {
                Ok(vec![mass_input_point(start, mass_kg.get(), name)])
            }
        }
    }

    /// True for the `MassInput` kind (§4.8 step 2).
    pub fn is_mass_input(&self) -> bool {
        matches!(self, ResolvedSegment::MassInput { .. })
    }

    /// Overwrite the reference mass at a `MassInput` segment, used by the
    /// block-fuel/TOW outer loop (§4.8) between replays. No-op on any
    /// other kind.
    pub fn set_mass_input(&self, mass_kg: f64) {
        if let ResolvedSegment::MassInput { mass_kg: cell, .. } = self {
            cell.set(mass_kg);
        }
    }

    /// The currently bound reference mass of a `MassInput` segment, or
    /// `None` for any other kind.
    pub fn mass_input_value(&self) -> Option<f64> {
        match self {
            ResolvedSegment::MassInput { mass_kg, .. } => Some(mass_kg.get()),
            _ => None,
        }
    }

    /// True for kinds whose fuel consumption depends on the aircraft's
    /// mass, used by the driver to validate the mass-input placement
    /// (§4.8 step 3).
    pub fn is_mass_dependent(&self) -> bool {
        !matches!(
            self,
            ResolvedSegment::Start { .. } | ResolvedSegment::MassInput { .. }
        )
    }
}
