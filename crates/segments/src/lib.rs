//! The segment integration kernel (§4.4): a family of typed flight-segment
//! integrators sharing one time-step loop, plus the takeoff sub-segments,
//! macroscopic transitions, and the two zero-duration pseudo segments.

mod kernel;
mod kinds;
mod optimum;
mod special;
mod takeoff;
mod transition;

pub use kernel::{run_segment, SegmentContext, SegmentPolicy};
pub use kinds::{
    AltitudeChangePolicy, AltitudeTarget, HeldSpeed, LevelFlightPolicy, LevelStop, SpeedChangePolicy, SpeedTarget,
    TaxiPolicy,
};
pub use optimum::{altitude_at_max_ld, round_to_flight_level, FLIGHT_LEVEL_STEP_M};
pub use special::{mass_input_point, start_point, StartValues};
pub use takeoff::{
    run_takeoff, EndOfTakeoffPolicy, GroundSpeedChangePolicy, RotationPolicy,
    END_OF_TAKEOFF_MAX_TIME_STEP_S,
};
pub use transition::{run_transition, Transition, TransitionTarget};

use thiserror::Error;

pub const DEFAULT_MAX_STEPS: usize = 10_000;

#[derive(Debug, Error, PartialEq)]
pub enum SegmentError {
    #[error("segment '{part}' requires CL {cl} exceeding the maximum_CL guardrail {max_cl}")]
    ClExceeded { part: String, cl: f64, max_cl: f64 },
    #[error("segment '{part}' exceeded its step limit ({max_steps})")]
    StepLimit { part: String, max_steps: usize },
    #[error("segment '{part}' became unfeasible: {reason}")]
    Unfeasible { part: String, reason: String },
    #[error(transparent)]
    Propulsion(#[from] msim_propulsion::PropulsionError),
    #[error(transparent)]
    Atmosphere(#[from] msim_atmosphere::AtmosphereError),
}

/// Tag identifying a segment's kind, kept around for CSV output and error
/// reporting. The dispatch itself happens through [`SegmentPolicy`]
/// implementations rather than a match over this enum (§9 "Dynamic
/// dispatch across segment kinds").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    AltitudeChange,
    SpeedChange,
    Cruise,
    OptimalCruise,
    Hold,
    Taxi,
    GroundSpeedChange,
    Rotation,
    EndOfTakeoff,
    Transition,
    Start,
    MassInput,
}
