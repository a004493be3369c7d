//! Loader for the component catalog a CLI front-end needs to exercise the
//! engine end to end: named polars, a constant-SFC propulsion model, wing
//! area, and the step cap (§6.4, §1 Non-goals — the real propulsion/
//! aerodynamic models are opaque external collaborators; this is the
//! reference stand-in, grounded in how the teacher's own `config` crate
//! loads scenario manifests from YAML/TOML).

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use msim_polar::{Polar, PolarError, PolarModifier};
use msim_propulsion::ConstantSfcPropulsion;

use crate::ComponentCatalog;

#[derive(Debug, Error)]
pub enum AircraftConfigError {
    #[error("failed to read aircraft config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse aircraft config YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("polar '{name}' is invalid: {source}")]
    Polar { name: String, #[source] source: PolarError },
}

#[derive(Debug, Deserialize)]
struct GroundEffectConfig {
    wing_span_m: f64,
    gear_height_m: f64,
    induced_drag_coefficient: f64,
    #[serde(default = "default_winglet_factor")]
    winglet_factor: f64,
}

fn default_winglet_factor() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
struct PolarConfig {
    cl: Vec<f64>,
    cd: Vec<f64>,
    #[serde(default)]
    ground_effect: Option<GroundEffectConfig>,
    #[serde(default)]
    alpha_lift_slope_per_rad: Option<f64>,
    #[serde(default)]
    alpha_zero_lift_rad: f64,
}

#[derive(Debug, Deserialize)]
struct PropulsionConfig {
    sfc_kg_per_n_s: f64,
    max_thrust_n: f64,
}

#[derive(Debug, Deserialize)]
struct AircraftConfig {
    wing_area_m2: f64,
    #[serde(default)]
    max_steps: Option<usize>,
    propulsion: PropulsionConfig,
    polars: BTreeMap<String, PolarConfig>,
}

/// Parse an [`AircraftConfig`] document and instantiate the
/// [`ComponentCatalog`] it describes.
pub fn parse(yaml: &str) -> Result<ComponentCatalog, AircraftConfigError> {
    let config: AircraftConfig = serde_yaml::from_str(yaml)?;
    build_catalog(config)
}

/// Load and parse an aircraft config document from a file path (§6.4:
/// the core only consumes the propulsion/polar interfaces; this is the
/// on-disk form a CLI front-end uses to supply them).
pub fn load<P: AsRef<Path>>(path: P) -> Result<ComponentCatalog, AircraftConfigError> {
    let reader = File::open(path)?;
    let config: AircraftConfig = serde_yaml::from_reader(reader)?;
    build_catalog(config)
}

fn build_catalog(config: AircraftConfig) -> Result<ComponentCatalog, AircraftConfigError> {
    let propulsion = Arc::new(ConstantSfcPropulsion::new(
        config.propulsion.sfc_kg_per_n_s,
        config.propulsion.max_thrust_n,
    ));
    let mut catalog = ComponentCatalog::new(propulsion, config.wing_area_m2);
    if let Some(max_steps) = config.max_steps {
        catalog = catalog.with_max_steps(max_steps);
    }
    for (name, polar_config) in config.polars {
        let modifiers = polar_config
            .ground_effect
            .map(|ge| {
                vec![PolarModifier::GroundEffect {
                    wing_span_m: ge.wing_span_m,
                    gear_height_m: ge.gear_height_m,
                    induced_drag_coefficient: ge.induced_drag_coefficient,
                    winglet_factor: ge.winglet_factor,
                }]
            })
            .unwrap_or_default();
        let mut polar = Polar::with_modifiers(polar_config.cl, polar_config.cd, modifiers)
            .map_err(|source| AircraftConfigError::Polar { name: name.clone(), source })?;
        if let Some(slope) = polar_config.alpha_lift_slope_per_rad {
            polar = polar.with_alpha_lift_slope(slope, polar_config.alpha_zero_lift_rad);
        }
        catalog = catalog.with_polar(name, Arc::new(polar));
    }
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
wing_area_m2: 122.6
max_steps: 5000
propulsion:
  sfc_kg_per_n_s: 1.7e-5
  max_thrust_n: 250000.0
polars:
  clean:
    cl: [0.0, 0.5, 1.0]
    cd: [0.02, 0.03, 0.06]
  ground:
    cl: [0.0, 1.0, 2.0]
    cd: [0.03, 0.05, 0.12]
    ground_effect:
      wing_span_m: 35.8
      gear_height_m: 2.0
      induced_drag_coefficient: 0.04
    alpha_lift_slope_per_rad: 6.0
    alpha_zero_lift_rad: -0.02
"#;

    #[test]
    fn parses_polars_and_propulsion() {
        let catalog = parse(SAMPLE).unwrap();
        assert_eq!(catalog.wing_area_m2, 122.6);
        assert_eq!(catalog.max_steps, 5000);
        assert!(catalog.polars.contains_key("clean"));
        assert!(catalog.polars.contains_key("ground"));
    }

    #[test]
    fn rejects_malformed_polar() {
        let bad = r#"
wing_area_m2: 100.0
propulsion:
  sfc_kg_per_n_s: 1.0e-5
  max_thrust_n: 100000.0
polars:
  broken:
    cl: [0.0]
    cd: [0.0]
"#;
        assert!(matches!(parse(bad), Err(AircraftConfigError::Polar { .. })));
    }
}
