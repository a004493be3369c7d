//! Aerodynamic polar: lift-to-drag mapping with optional modifiers, plus the
//! optimum-CL query the climb and cruise segments depend on.

use msim_flightpoint::FlightPoint;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum PolarError {
    #[error("polar requires at least 2 points, got {0}")]
    TooFewPoints(usize),
    #[error("CL and CD arrays must have equal length ({cl} vs {cd})")]
    LengthMismatch { cl: usize, cd: usize },
    #[error("CL array must be strictly increasing (violated at index {index})")]
    NotStrictlyIncreasing { index: usize },
}

/// A single parameterized drag contribution evaluated in addition to the
/// base `CD(CL)` table.
#[derive(Debug, Clone, PartialEq)]
pub enum PolarModifier {
    /// Ground-effect reduction of induced drag (§4.2): a Wieselsberger-style
    /// multiplicative factor on the induced-drag component, function of
    /// height above ground expressed in wing spans.
    GroundEffect {
        wing_span_m: f64,
        gear_height_m: f64,
        induced_drag_coefficient: f64,
        winglet_factor: f64,
    },
}

impl PolarModifier {
    /// Additional `CD` contributed by this modifier at the given lift
    /// coefficient and height above ground.
    fn cd_delta(&self, cl: f64, height_above_ground_m: f64) -> f64 {
        match self {
            PolarModifier::GroundEffect {
                wing_span_m,
                gear_height_m,
                induced_drag_coefficient,
                winglet_factor,
            } => {
                let h = (height_above_ground_m + gear_height_m).max(0.0);
                let ratio = 16.0 * h / wing_span_m;
                let phi = (ratio * ratio) / (1.0 + ratio * ratio);
                let induced_cd = induced_drag_coefficient * cl * cl * winglet_factor;
                -(1.0 - phi) * induced_cd
            }
        }
    }
}

/// Pair of monotone arrays `(CL[], CD[])` plus optional modifiers, per §3/§4.2.
#[derive(Debug)]
pub struct Polar {
    cl: Vec<f64>,
    cd: Vec<f64>,
    modifiers: Vec<PolarModifier>,
    optimum_cl: OnceLock<f64>,
    /// Linear CL-alpha slope (per radian) and zero-lift angle, used only by
    /// the `Rotation` takeoff sub-segment (§4.5), which indexes the polar by
    /// angle of attack rather than by CL.
    alpha_slope_per_rad: Option<f64>,
    alpha_zero_lift_rad: f64,
}

const OPTIMUM_SEARCH_STEPS: usize = 512;

impl Polar {
    pub fn new(cl: Vec<f64>, cd: Vec<f64>) -> Result<Self, PolarError> {
        Self::with_modifiers(cl, cd, Vec::new())
    }

    pub fn with_modifiers(
        cl: Vec<f64>,
        cd: Vec<f64>,
        modifiers: Vec<PolarModifier>,
    ) -> Result<Self, PolarError> {
        if cl.len() < 2 {
            return Err(PolarError::TooFewPoints(cl.len()));
        }
        if cl.len() != cd.len() {
            return Err(PolarError::LengthMismatch { cl: cl.len(), cd: cd.len() });
        }
        for i in 1..cl.len() {
            if cl[i] <= cl[i - 1] {
                return Err(PolarError::NotStrictlyIncreasing { index: i });
            }
        }
        Ok(Self {
            cl,
            cd,
            modifiers,
            optimum_cl: OnceLock::new(),
            alpha_slope_per_rad: None,
            alpha_zero_lift_rad: 0.0,
        })
    }

    /// Attach a linear CL-alpha relation so [`Polar::cl_at_alpha`] can serve
    /// the `Rotation` segment.
    pub fn with_alpha_lift_slope(mut self, slope_per_rad: f64, zero_lift_rad: f64) -> Self {
        self.alpha_slope_per_rad = Some(slope_per_rad);
        self.alpha_zero_lift_rad = zero_lift_rad;
        self
    }

    /// `CL` at a given angle of attack, for polars carrying an alpha-indexed
    /// mode (§4.5). `None` if no CL-alpha slope was attached.
    pub fn cl_at_alpha(&self, alpha_rad: f64) -> Option<f64> {
        self.alpha_slope_per_rad
            .map(|slope| slope * (alpha_rad - self.alpha_zero_lift_rad))
    }

    /// Piecewise-linear interpolation of the base table, clamped to the
    /// table's range outside it.
    fn base_cd_at(&self, cl: f64) -> f64 {
        if cl <= self.cl[0] {
            return self.cd[0];
        }
        let last = self.cl.len() - 1;
        if cl >= self.cl[last] {
            return self.cd[last];
        }
        let segment = self
            .cl
            .windows(2)
            .position(|w| cl >= w[0] && cl <= w[1])
            .unwrap_or(last - 1);
        let (cl0, cl1) = (self.cl[segment], self.cl[segment + 1]);
        let (cd0, cd1) = (self.cd[segment], self.cd[segment + 1]);
        let t = (cl - cl0) / (cl1 - cl0);
        cd0 + t * (cd1 - cd0)
    }

    /// `CD(CL)` at the aircraft's current flight point: base interpolation
    /// plus every modifier's contribution, floored to stay strictly
    /// positive per the §4.2 invariant.
    pub fn cd_at(&self, cl: f64, fp: &FlightPoint) -> f64 {
        let mut cd = self.base_cd_at(cl);
        for modifier in &self.modifiers {
            cd += modifier.cd_delta(cl, fp.altitude);
        }
        cd.max(1e-6)
    }

    /// `CL` at maximum `L/D`, ignoring height-dependent modifiers (which
    /// only matter near the ground, where the aircraft is not operating at
    /// maximum L/D): computed once on the base table and cached.
    pub fn optimum_cl(&self) -> f64 {
        *self.optimum_cl.get_or_init(|| {
            let lo = self.cl[0];
            let hi = self.cl[self.cl.len() - 1];
            let mut best_cl = lo;
            let mut best_ratio = f64::NEG_INFINITY;
            for i in 0..=OPTIMUM_SEARCH_STEPS {
                let cl = lo + (hi - lo) * (i as f64) / (OPTIMUM_SEARCH_STEPS as f64);
                let cd = self.base_cd_at(cl);
                let ratio = cl / cd;
                if ratio > best_ratio {
                    best_ratio = ratio;
                    best_cl = cl;
                }
            }
            best_cl
        })
    }

    pub fn cl_range(&self) -> (f64, f64) {
        (self.cl[0], self.cl[self.cl.len() - 1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_polar() -> Polar {
        Polar::new(vec![0.0, 0.5, 1.0], vec![0.02, 0.03, 0.06]).unwrap()
    }

    fn sample_point() -> FlightPoint {
        let mut fp = FlightPoint::zeroed(0.0);
        fp.altitude = 10_000.0;
        fp
    }

    #[test]
    fn interpolates_linearly_between_points() {
        let polar = sample_polar();
        let fp = sample_point();
        let cd = polar.cd_at(0.25, &fp);
        assert!((cd - 0.025).abs() < 1e-9);
    }

    #[test]
    fn clamps_outside_table_range() {
        let polar = sample_polar();
        let fp = sample_point();
        assert!((polar.cd_at(-1.0, &fp) - 0.02).abs() < 1e-9);
        assert!((polar.cd_at(2.0, &fp) - 0.06).abs() < 1e-9);
    }

    #[test]
    fn cd_is_always_strictly_positive() {
        let polar = Polar::new(vec![0.0, 1.0], vec![0.0, 0.0]).unwrap();
        let fp = sample_point();
        assert!(polar.cd_at(0.5, &fp) > 0.0);
    }

    #[test]
    fn optimum_cl_is_cached_and_within_table_range() {
        let polar = sample_polar();
        let (lo, hi) = polar.cl_range();
        let cl = polar.optimum_cl();
        assert!(cl >= lo && cl <= hi);
        assert_eq!(cl, polar.optimum_cl());
    }

    #[test]
    fn ground_effect_reduces_induced_drag_near_ground() {
        let polar = Polar::with_modifiers(
            vec![0.0, 1.0],
            vec![0.02, 0.08],
            vec![PolarModifier::GroundEffect {
                wing_span_m: 35.0,
                gear_height_m: 2.0,
                induced_drag_coefficient: 0.04,
                winglet_factor: 1.0,
            }],
        )
        .unwrap();
        let mut low = sample_point();
        low.altitude = 0.0;
        let mut high = sample_point();
        high.altitude = 5_000.0;
        assert!(polar.cd_at(0.8, &low) < polar.cd_at(0.8, &high));
    }

    #[test]
    fn cl_at_alpha_uses_attached_linear_slope() {
        let polar = sample_polar().with_alpha_lift_slope(2.0 * std::f64::consts::PI, 0.0);
        let cl = polar.cl_at_alpha(0.1).unwrap();
        assert!((cl - 2.0 * std::f64::consts::PI * 0.1).abs() < 1e-9);
        assert!(Polar::new(vec![0.0, 1.0], vec![0.0, 0.0]).unwrap().cl_at_alpha(0.1).is_none());
    }

    #[test]
    fn rejects_malformed_tables() {
        assert!(matches!(Polar::new(vec![0.0], vec![0.0]), Err(PolarError::TooFewPoints(1))));
        assert!(matches!(
            Polar::new(vec![0.0, 1.0], vec![0.0]),
            Err(PolarError::LengthMismatch { .. })
        ));
        assert!(matches!(
            Polar::new(vec![1.0, 0.0], vec![0.0, 0.0]),
            Err(PolarError::NotStrictlyIncreasing { .. })
        ));
    }
}
