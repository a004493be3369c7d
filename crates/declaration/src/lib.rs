//! Parsed representation of the hierarchical mission declaration file
//! (§6.1): `phases`, `routes`, `missions`, plus an optional `segments`
//! shortcuts table. Values at this layer are still raw — literals, variable
//! references, or special tokens — left unresolved until the mission
//! builder (`msim_builder`) walks the tree against a `VariableStore`.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeclarationError {
    #[error("failed to read declaration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse declaration YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// A raw parameter value as it appears in the declaration file, before the
/// mission builder resolves literals/variable-refs/special-strings (§4.9).
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
}

/// A `{value, unit}` literal, or a bare raw value (unit defaults to SI via
/// the builder's units registry lookup for the parameter in question).
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum RawParam {
    Bare(RawValue),
    WithUnit { value: RawValue, unit: String },
}

/// Map of stop-field name -> raw target value, as declared under a
/// segment's `target:` key. `delta_`-prefixed keys are resolved relative to
/// the segment's start point by the builder (§4.9/§6.1).
pub type RawTarget = BTreeMap<String, RawParam>;

/// One segment entry (§6.1 table). Fields not meaningful to `kind` are
/// simply absent from the parsed map; the builder validates per-kind
/// requirements.
#[derive(Debug, Deserialize, Clone)]
pub struct SegmentDecl {
    pub segment: String,
    #[serde(default)]
    pub target: RawTarget,
    #[serde(default)]
    pub engine_setting: Option<String>,
    #[serde(default)]
    pub thrust_rate: Option<RawParam>,
    #[serde(default)]
    pub polar: Option<String>,
    #[serde(default)]
    pub time_step: Option<RawParam>,
    #[serde(default)]
    pub isa_offset: Option<RawParam>,
    #[serde(default)]
    pub mass_ratio: Option<RawParam>,
    #[serde(default)]
    pub reserve_mass_ratio: Option<RawParam>,
    #[serde(default)]
    pub maximum_cl: Option<RawParam>,
    #[serde(default)]
    pub interrupt_if_unfeasible: Option<bool>,
    #[serde(default)]
    pub name: Option<String>,
}

/// One entry of a phase's `parts` list: either an inline segment, or a
/// reference to a `segments:` shortcut, or a nested sub-phase (§3 "Phase").
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum PartDecl {
    Segment(SegmentDecl),
    SegmentRef { segment_ref: String },
    Phase(PhaseDecl),
}

#[derive(Debug, Deserialize, Clone)]
pub struct PhaseDecl {
    pub name: String,
    #[serde(default)]
    pub parts: Vec<PartDecl>,
    #[serde(default)]
    pub engine_setting: Option<String>,
    #[serde(default)]
    pub thrust_rate: Option<RawParam>,
    #[serde(default)]
    pub polar: Option<String>,
    #[serde(default)]
    pub time_step: Option<RawParam>,
    #[serde(default)]
    pub isa_offset: Option<RawParam>,
    #[serde(default)]
    pub maximum_cl: Option<RawParam>,
}

/// `{climb: Vec<Phase>, cruise: Segment, descent: Vec<Phase>, range, distance_accuracy}` (§3 "Route").
#[derive(Debug, Deserialize, Clone)]
pub struct RouteDecl {
    pub name: String,
    #[serde(default)]
    pub climb_parts: Vec<PhaseDecl>,
    pub cruise_part: SegmentDecl,
    #[serde(default)]
    pub descent_parts: Vec<PhaseDecl>,
    pub range: RawParam,
    #[serde(default)]
    pub distance_accuracy: Option<RawParam>,
    #[serde(default)]
    pub isa_offset: Option<RawParam>,
}

/// One entry of a mission's `parts` list (§6.1).
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum MissionPartDecl {
    Phase { phase: String },
    InlinePhase { phase_inline: PhaseDecl },
    Route { route: String },
    Reserve { reserve: ReserveDecl },
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReserveDecl {
    #[serde(rename = "ref")]
    pub ref_route_name: String,
    pub multiplier: RawParam,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MissionDecl {
    pub name: String,
    pub parts: Vec<MissionPartDecl>,
    #[serde(default)]
    pub isa_offset: Option<RawParam>,
    #[serde(default)]
    pub use_all_block_fuel: bool,
    /// §4.8: block fuel is set equal to `total_fuel + reserve_fuel` on
    /// output instead of being held fixed at the input block fuel.
    #[serde(default)]
    pub adjust_fuel: bool,
    /// §4.8: `TOW = OWE + payload + block_fuel` is solved for, rather than
    /// block fuel being derived from an input TOW.
    #[serde(default, rename = "compute_TOW")]
    pub compute_tow: bool,
    #[serde(default)]
    pub mass_input_variable: Option<String>,
}

/// Top-level declaration document: `phases`, `routes`, `missions`, plus
/// `segments` shortcuts referenced by `segment_ref` (§6.1).
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Declaration {
    #[serde(default)]
    pub segments: BTreeMap<String, SegmentDecl>,
    #[serde(default)]
    pub phases: BTreeMap<String, PhaseDecl>,
    #[serde(default)]
    pub routes: BTreeMap<String, RouteDecl>,
    #[serde(default)]
    pub missions: BTreeMap<String, MissionDecl>,
}

/// Parse a declaration document from a YAML string.
pub fn parse(yaml: &str) -> Result<Declaration, DeclarationError> {
    Ok(serde_yaml::from_str(yaml)?)
}

/// Load and parse a declaration document from a file path.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Declaration, DeclarationError> {
    let reader = File::open(path)?;
    Ok(serde_yaml::from_reader(reader)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
phases:
  climb:
    name: climb
    parts:
      - segment: AltitudeChange
        target:
          altitude: { value: 10668.0, unit: m }
        thrust_rate: { value: 0.85, unit: "-" }
routes:
  main:
    name: main
    climb_parts: []
    cruise_part:
      segment: Cruise
      target: {}
    descent_parts: []
    range: { value: 3704.0, unit: km }
    distance_accuracy: { value: 1.0, unit: km }
missions:
  m1:
    name: m1
    parts:
      - route: main
"#;

    #[test]
    fn parses_phases_routes_and_missions() {
        let decl = parse(SAMPLE).unwrap();
        assert!(decl.phases.contains_key("climb"));
        assert!(decl.routes.contains_key("main"));
        assert!(decl.missions.contains_key("m1"));
        let climb = &decl.phases["climb"];
        assert_eq!(climb.parts.len(), 1);
    }

    #[test]
    fn rejects_malformed_yaml() {
        assert!(parse("not: [valid: yaml: :").is_err());
    }

    #[test]
    fn route_requires_a_single_cruise_part() {
        let decl = parse(SAMPLE).unwrap();
        let route = &decl.routes["main"];
        assert_eq!(route.cruise_part.segment, "Cruise");
    }
}
