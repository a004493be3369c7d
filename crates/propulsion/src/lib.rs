//! The propulsion adapter contract (§4.3/§6.4) segments integrate against,
//! plus a constant-SFC reference implementation.
//!
//! The core is agnostic to the real propulsion model: aerodynamic, weight
//! and propulsion modelling are out of scope. `ConstantSfcPropulsion` exists
//! so the engine is runnable and testable end to end without an external
//! model plugged in.

use msim_flightpoint::FlightPoint;
use thiserror::Error;

/// Power-setting category a segment may request, independent of the
/// regulated/manual thrust split (which is carried on the `FlightPoint`
/// itself via `thrust_is_regulated`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineSetting {
    Takeoff,
    Climb,
    Cruise,
    Idle,
}

#[derive(Debug, Error, PartialEq)]
pub enum PropulsionError {
    #[error("propulsion query at part '{part}' returned a non-finite thrust")]
    NonFiniteThrust { part: String },
    #[error("propulsion query at part '{part}' requires thrust rate {rate} outside [0, 1]")]
    Unfeasible { part: String, rate: f64 },
}

/// Contract segments consume: fill in the propulsion-related fields of a
/// batch of flight points, and report the mass consumed integrating one
/// time step at a given state.
pub trait PropulsionModel {
    /// Fill `thrust`, `thrust_rate`, and `sfc` on every point. If
    /// `thrust_is_regulated` is true on a point, `thrust` is taken as given
    /// and `thrust_rate` is derived; otherwise `thrust_rate` is taken as
    /// given and `thrust` is derived. Pure with respect to every other
    /// field.
    fn compute_flight_points(&self, points: &mut [FlightPoint]) -> Result<(), PropulsionError>;

    /// Mass, in kg, consumed over `dt` seconds at state `fp`.
    fn consumed_mass(&self, fp: &FlightPoint, dt: f64) -> Result<f64, PropulsionError>;

    /// Maximum available thrust (N) at the given state, used by regulated
    /// segments to clip the thrust solved for force balance.
    fn max_thrust(&self, fp: &FlightPoint) -> f64;
}

/// Reference propulsion adapter: fixed maximum thrust and a constant
/// specific fuel consumption, independent of altitude, speed, or engine
/// setting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantSfcPropulsion {
    pub sfc_kg_per_n_s: f64,
    pub max_thrust_n: f64,
}

impl ConstantSfcPropulsion {
    pub fn new(sfc_kg_per_n_s: f64, max_thrust_n: f64) -> Self {
        Self { sfc_kg_per_n_s, max_thrust_n }
    }
}

impl PropulsionModel for ConstantSfcPropulsion {
    fn compute_flight_points(&self, points: &mut [FlightPoint]) -> Result<(), PropulsionError> {
        for fp in points.iter_mut() {
            fp.sfc = self.sfc_kg_per_n_s;
            if fp.thrust_is_regulated {
                if !fp.thrust.is_finite() {
                    return Err(PropulsionError::NonFiniteThrust {
                        part: fp.name.clone().unwrap_or_default(),
                    });
                }
                let clipped = fp.thrust.clamp(0.0, self.max_thrust_n);
                fp.thrust_rate = clipped / self.max_thrust_n;
                fp.thrust = clipped;
            } else {
                if !(0.0..=1.0).contains(&fp.thrust_rate) {
                    return Err(PropulsionError::Unfeasible {
                        part: fp.name.clone().unwrap_or_default(),
                        rate: fp.thrust_rate,
                    });
                }
                fp.thrust = fp.thrust_rate * self.max_thrust_n;
            }
        }
        Ok(())
    }

    fn consumed_mass(&self, fp: &FlightPoint, dt: f64) -> Result<f64, PropulsionError> {
        if !fp.thrust.is_finite() {
            return Err(PropulsionError::NonFiniteThrust {
                part: fp.name.clone().unwrap_or_default(),
            });
        }
        Ok(self.sfc_kg_per_n_s * fp.thrust * dt)
    }

    fn max_thrust(&self, _fp: &FlightPoint) -> f64 {
        self.max_thrust_n
    }
}
