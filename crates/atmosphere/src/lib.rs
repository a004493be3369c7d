//! 1976 US Standard Atmosphere (ISA) up to 84 km, with an additive
//! temperature offset, plus mutually consistent airspeed conversions
//! between true, equivalent, and calibrated airspeed and Mach number.

use msim_core::constants::{GAMMA_AIR, G0, P0, R_AIR, RHO0, T0};
use thiserror::Error;

/// Upper bound of the modeled atmosphere (84 km geopotential altitude).
pub const MAX_ALTITUDE_M: f64 = 84_852.0;

#[derive(Debug, Error, PartialEq)]
pub enum AtmosphereError {
    #[error("altitude {altitude_m} m is outside the modeled range [0, {max} m]", max = MAX_ALTITUDE_M)]
    AltitudeOutOfRange { altitude_m: f64 },
}

/// One layer of the piecewise-linear ISA temperature/pressure model.
struct Layer {
    base_altitude_m: f64,
    base_temperature_k: f64,
    base_pressure_pa: f64,
    lapse_rate_k_per_m: f64,
}

/// Standard (ΔISA = 0) layer table, base altitude ascending.
const LAYERS: &[Layer] = &[
    Layer { base_altitude_m: 0.0, base_temperature_k: T0, base_pressure_pa: P0, lapse_rate_k_per_m: -0.0065 },
    Layer { base_altitude_m: 11_000.0, base_temperature_k: 216.65, base_pressure_pa: 22_632.1, lapse_rate_k_per_m: 0.0 },
    Layer { base_altitude_m: 20_000.0, base_temperature_k: 216.65, base_pressure_pa: 5_474.89, lapse_rate_k_per_m: 0.001 },
    Layer { base_altitude_m: 32_000.0, base_temperature_k: 228.65, base_pressure_pa: 868.019, lapse_rate_k_per_m: 0.0028 },
    Layer { base_altitude_m: 47_000.0, base_temperature_k: 270.65, base_pressure_pa: 110.906, lapse_rate_k_per_m: 0.0 },
    Layer { base_altitude_m: 51_000.0, base_temperature_k: 270.65, base_pressure_pa: 66.9389, lapse_rate_k_per_m: -0.0028 },
    Layer { base_altitude_m: 71_000.0, base_temperature_k: 214.65, base_pressure_pa: 3.95642, lapse_rate_k_per_m: -0.002 },
];

fn layer_for(altitude_m: f64) -> &'static Layer {
    LAYERS
        .iter()
        .rev()
        .find(|layer| altitude_m >= layer.base_altitude_m)
        .unwrap_or(&LAYERS[0])
}

/// Atmospheric state: geopotential altitude and a uniform ISA temperature offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtmosphereState {
    pub altitude_m: f64,
    pub isa_offset_k: f64,
}

impl AtmosphereState {
    pub fn new(altitude_m: f64, isa_offset_k: f64) -> Self {
        Self { altitude_m, isa_offset_k }
    }
}

/// Derived atmospheric properties at a given [`AtmosphereState`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtmosphereProperties {
    pub temperature_k: f64,
    pub pressure_pa: f64,
    pub density_kg_m3: f64,
    pub speed_of_sound_m_s: f64,
}

/// Compute standard-day pressure and temperature (ΔISA = 0) at `altitude_m`.
fn standard_temperature_pressure(altitude_m: f64) -> (f64, f64) {
    let layer = layer_for(altitude_m);
    let dh = altitude_m - layer.base_altitude_m;
    let standard_temperature_k = layer.base_temperature_k + layer.lapse_rate_k_per_m * dh;
    let pressure_pa = if layer.lapse_rate_k_per_m.abs() > 1e-12 {
        layer.base_pressure_pa
            * (layer.base_temperature_k / standard_temperature_k)
                .powf(G0 / (R_AIR * layer.lapse_rate_k_per_m))
    } else {
        layer.base_pressure_pa * (-G0 * dh / (R_AIR * layer.base_temperature_k)).exp()
    };
    (standard_temperature_k, pressure_pa)
}

/// Evaluate the atmosphere at `state`, applying the ISA offset to
/// temperature only: pressure (and hence pressure altitude) follows the
/// unperturbed standard profile, consistent with how ΔISA is used
/// operationally.
pub fn properties(state: AtmosphereState) -> Result<AtmosphereProperties, AtmosphereError> {
    if !(0.0..=MAX_ALTITUDE_M).contains(&state.altitude_m) {
        return Err(AtmosphereError::AltitudeOutOfRange {
            altitude_m: state.altitude_m,
        });
    }
    let (standard_temperature_k, pressure_pa) = standard_temperature_pressure(state.altitude_m);
    let temperature_k = standard_temperature_k + state.isa_offset_k;
    let density_kg_m3 = pressure_pa / (R_AIR * temperature_k);
    let speed_of_sound_m_s = (GAMMA_AIR * R_AIR * temperature_k).sqrt();
    Ok(AtmosphereProperties {
        temperature_k,
        pressure_pa,
        density_kg_m3,
        speed_of_sound_m_s,
    })
}

/// True airspeed to equivalent airspeed: `EAS = TAS * sqrt(rho / rho0)`.
pub fn tas_to_eas(tas_m_s: f64, props: &AtmosphereProperties) -> f64 {
    tas_m_s * (props.density_kg_m3 / RHO0).sqrt()
}

/// Equivalent airspeed to true airspeed: `TAS = EAS / sqrt(rho / rho0)`.
pub fn eas_to_tas(eas_m_s: f64, props: &AtmosphereProperties) -> f64 {
    eas_m_s / (props.density_kg_m3 / RHO0).sqrt()
}

/// True airspeed to Mach number.
pub fn tas_to_mach(tas_m_s: f64, props: &AtmosphereProperties) -> f64 {
    tas_m_s / props.speed_of_sound_m_s
}

/// Mach number to true airspeed.
pub fn mach_to_tas(mach: f64, props: &AtmosphereProperties) -> f64 {
    mach * props.speed_of_sound_m_s
}

const SEA_LEVEL_SPEED_OF_SOUND_M_S: f64 = 340.293_99; // sqrt(GAMMA_AIR * R_AIR * T0)

/// Compressible-pitot impact pressure for Mach `m` at static pressure `p` (subsonic, M < 1).
fn impact_pressure(mach: f64, static_pressure_pa: f64) -> f64 {
    static_pressure_pa * ((1.0 + 0.2 * mach * mach).powf(3.5) - 1.0)
}

/// Invert the impact-pressure relation for Mach number (subsonic, M < 1).
fn mach_from_impact_pressure(qc_pa: f64, static_pressure_pa: f64) -> f64 {
    (5.0 * ((qc_pa / static_pressure_pa + 1.0).powf(2.0 / 7.0) - 1.0)).sqrt()
}

/// True airspeed to calibrated airspeed via the compressible pitot relation.
/// Direct below Mach 0.3, where the compressibility correction is negligible
/// and CAS is treated as equal to EAS.
pub fn tas_to_cas(tas_m_s: f64, props: &AtmosphereProperties) -> f64 {
    let mach = tas_to_mach(tas_m_s, props);
    if mach < 0.3 {
        return tas_to_eas(tas_m_s, props);
    }
    let qc = impact_pressure(mach, props.pressure_pa);
    let equivalent_mach = mach_from_impact_pressure(qc, P0);
    equivalent_mach * SEA_LEVEL_SPEED_OF_SOUND_M_S
}

/// Calibrated airspeed to true airspeed, iterating the compressible pitot
/// relation against the local static pressure above Mach 0.3.
pub fn cas_to_tas(cas_m_s: f64, props: &AtmosphereProperties) -> f64 {
    let equivalent_mach = cas_m_s / SEA_LEVEL_SPEED_OF_SOUND_M_S;
    if equivalent_mach < 0.3 {
        return eas_to_tas(cas_m_s, props);
    }
    let qc = impact_pressure(equivalent_mach, P0);
    let mach = mach_from_impact_pressure(qc, props.pressure_pa);
    mach_to_tas(mach, props)
}
