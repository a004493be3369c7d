//! The extensible `FlightPoint` record: the value type carrying the full
//! state of the aircraft at one instant of a mission, plus the field
//! registry that lets callers declare extra named fields at startup.

use std::collections::BTreeMap;
use thiserror::Error;

/// The set of base fields every `FlightPoint` carries, in declaration order.
/// Used by the CSV writer and the continuity checker to walk base fields
/// generically.
pub const BASE_FIELDS: &[&str] = &[
    "time",
    "altitude",
    "ground_distance",
    "mass",
    "true_airspeed",
    "equivalent_airspeed",
    "mach",
    "alpha",
    "slope_angle",
    "acceleration",
    "thrust",
    "thrust_rate",
    "thrust_is_regulated",
    "sfc",
    "drag",
    "lift",
    "CL",
    "CD",
    "consumed_fuel",
    "name",
    "isa_offset",
];

/// Base fields whose continuity across segment boundaries the driver
/// enforces (§5, §8 invariant 4): the last point of part *k* must equal the
/// first point of part *k+1* on these fields.
pub const CONTINUITY_FIELDS: &[&str] = &[
    "time",
    "ground_distance",
    "altitude",
    "mass",
    "consumed_fuel",
    "true_airspeed",
];

/// Value record holding the full state of the aircraft at one instant.
/// Unset numeric fields carry `f64::NAN`; unset string fields carry `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightPoint {
    /// Seconds since mission start.
    pub time: f64,
    /// Metres.
    pub altitude: f64,
    /// Metres.
    pub ground_distance: f64,
    /// Kilograms.
    pub mass: f64,
    /// Metres per second.
    pub true_airspeed: f64,
    /// Metres per second.
    pub equivalent_airspeed: f64,
    pub mach: f64,
    /// Radians.
    pub alpha: f64,
    /// Radians (flight-path angle γ).
    pub slope_angle: f64,
    /// Metres per second squared.
    pub acceleration: f64,
    /// Newtons.
    pub thrust: f64,
    /// 0..1.
    pub thrust_rate: f64,
    pub thrust_is_regulated: bool,
    /// kg/N/s.
    pub sfc: f64,
    /// Newtons.
    pub drag: f64,
    /// Newtons.
    pub lift: f64,
    pub cl: f64,
    pub cd: f64,
    /// Kilograms, cumulative since mission start.
    pub consumed_fuel: f64,
    /// Name tag identifying the segment/phase producing this point.
    pub name: Option<String>,
    /// Kelvin.
    pub isa_offset: f64,
    /// User-declared extension fields, keyed by name.
    pub extras: BTreeMap<String, f64>,
}

impl Default for FlightPoint {
    /// All numeric fields unset (`NaN`), `thrust_is_regulated` false, `name` unset.
    fn default() -> Self {
        Self {
            time: f64::NAN,
            altitude: f64::NAN,
            ground_distance: f64::NAN,
            mass: f64::NAN,
            true_airspeed: f64::NAN,
            equivalent_airspeed: f64::NAN,
            mach: f64::NAN,
            alpha: f64::NAN,
            slope_angle: f64::NAN,
            acceleration: f64::NAN,
            thrust: f64::NAN,
            thrust_rate: f64::NAN,
            thrust_is_regulated: false,
            sfc: f64::NAN,
            drag: f64::NAN,
            lift: f64::NAN,
            cl: f64::NAN,
            cd: f64::NAN,
            consumed_fuel: f64::NAN,
            name: None,
            isa_offset: f64::NAN,
            extras: BTreeMap::new(),
        }
    }
}

impl FlightPoint {
    /// A point with every continuity-relevant field (and `isa_offset`,
    /// `alpha`) zeroed, as a starting point for a `Start` segment. `alpha`
    /// is zeroed alongside them so a `Rotation` segment fed this point
    /// through a ground roll starts pitching from a defined angle of attack
    /// rather than `NaN`.
    pub fn zeroed(isa_offset: f64) -> Self {
        Self {
            time: 0.0,
            altitude: 0.0,
            ground_distance: 0.0,
            mass: 0.0,
            consumed_fuel: 0.0,
            alpha: 0.0,
            isa_offset,
            ..Self::default()
        }
    }

    /// Compare two points on [`CONTINUITY_FIELDS`] within `tolerance`.
    pub fn continuity_matches(&self, other: &Self, tolerance: f64) -> bool {
        let pairs = [
            (self.time, other.time),
            (self.ground_distance, other.ground_distance),
            (self.altitude, other.altitude),
            (self.mass, other.mass),
            (self.consumed_fuel, other.consumed_fuel),
            (self.true_airspeed, other.true_airspeed),
        ];
        pairs.iter().all(|(a, b)| (a - b).abs() <= tolerance)
    }
}

/// Metadata for one user-declared extension field: its name, default value,
/// whether it accumulates since mission start, and whether it is written to
/// the CSV output.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub default: f64,
    pub is_cumulative: bool,
    pub is_output: bool,
}

/// Registry of extension fields, built once at startup and never mutated
/// afterwards (see design note "Global state").
#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    specs: Vec<FieldSpec>,
}

#[derive(Debug, Error, PartialEq)]
pub enum FieldRegistryError {
    #[error("extension field '{0}' declared more than once")]
    DuplicateField(String),
    #[error("extension field '{0}' collides with a base FlightPoint field")]
    CollidesWithBaseField(String),
}

impl FieldRegistry {
    /// Build a registry from a list of field declarations, rejecting
    /// duplicate names and names that collide with [`BASE_FIELDS`].
    pub fn new(specs: Vec<FieldSpec>) -> Result<Self, FieldRegistryError> {
        let mut seen = std::collections::HashSet::new();
        for spec in &specs {
            if BASE_FIELDS.contains(&spec.name.as_str()) {
                return Err(FieldRegistryError::CollidesWithBaseField(spec.name.clone()));
            }
            if !seen.insert(spec.name.clone()) {
                return Err(FieldRegistryError::DuplicateField(spec.name.clone()));
            }
        }
        Ok(Self { specs })
    }

    pub fn specs(&self) -> &[FieldSpec] {
        &self.specs
    }

    /// Default value for each declared extension field, for seeding a fresh `FlightPoint`.
    pub fn default_extras(&self) -> BTreeMap<String, f64> {
        self.specs
            .iter()
            .map(|spec| (spec.name.clone(), spec.default))
            .collect()
    }

    pub fn is_output(&self, field: &str) -> bool {
        self.specs
            .iter()
            .find(|spec| spec.name == field)
            .map(|spec| spec.is_output)
            .unwrap_or(false)
    }

    pub fn is_cumulative(&self, field: &str) -> bool {
        self.specs
            .iter()
            .find(|spec| spec.name == field)
            .map(|spec| spec.is_cumulative)
            .unwrap_or(false)
    }
}

/// One row of the tabular form, field name -> formatted cell. Full
/// round-trip precision, distinct from the (lossy, `{:.6g}`-formatted) CSV
/// export format produced by `msim_export`.
pub type Row = Vec<(String, String)>;

fn format_cell_f64(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        // Rust's `{}` Display for f64 is round-trip exact (shortest
        // representation that parses back to the same bits).
        format!("{value}")
    }
}

fn parse_cell_f64(cell: &str) -> f64 {
    if cell.is_empty() {
        f64::NAN
    } else {
        cell.parse().unwrap_or(f64::NAN)
    }
}

impl FlightPoint {
    /// Convert to a row of (field name, formatted value) pairs: base fields
    /// in declaration order, followed by extension fields in registry order.
    pub fn to_row(&self, registry: &FieldRegistry) -> Row {
        let mut row = Vec::with_capacity(BASE_FIELDS.len() + registry.specs().len());
        row.push(("time".to_string(), format_cell_f64(self.time)));
        row.push(("altitude".to_string(), format_cell_f64(self.altitude)));
        row.push(("ground_distance".to_string(), format_cell_f64(self.ground_distance)));
        row.push(("mass".to_string(), format_cell_f64(self.mass)));
        row.push(("true_airspeed".to_string(), format_cell_f64(self.true_airspeed)));
        row.push(("equivalent_airspeed".to_string(), format_cell_f64(self.equivalent_airspeed)));
        row.push(("mach".to_string(), format_cell_f64(self.mach)));
        row.push(("alpha".to_string(), format_cell_f64(self.alpha)));
        row.push(("slope_angle".to_string(), format_cell_f64(self.slope_angle)));
        row.push(("acceleration".to_string(), format_cell_f64(self.acceleration)));
        row.push(("thrust".to_string(), format_cell_f64(self.thrust)));
        row.push(("thrust_rate".to_string(), format_cell_f64(self.thrust_rate)));
        row.push(("thrust_is_regulated".to_string(), self.thrust_is_regulated.to_string()));
        row.push(("sfc".to_string(), format_cell_f64(self.sfc)));
        row.push(("drag".to_string(), format_cell_f64(self.drag)));
        row.push(("lift".to_string(), format_cell_f64(self.lift)));
        row.push(("CL".to_string(), format_cell_f64(self.cl)));
        row.push(("CD".to_string(), format_cell_f64(self.cd)));
        row.push(("consumed_fuel".to_string(), format_cell_f64(self.consumed_fuel)));
        row.push(("name".to_string(), self.name.clone().unwrap_or_default()));
        row.push(("isa_offset".to_string(), format_cell_f64(self.isa_offset)));
        for spec in registry.specs() {
            let value = self.extras.get(&spec.name).copied().unwrap_or(f64::NAN);
            row.push((spec.name.clone(), format_cell_f64(value)));
        }
        row
    }

    /// Reconstruct a `FlightPoint` from a row produced by [`FlightPoint::to_row`].
    pub fn from_row(row: &Row, registry: &FieldRegistry) -> Self {
        let get = |name: &str| row.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str());
        let mut fp = FlightPoint {
            time: get("time").map(parse_cell_f64).unwrap_or(f64::NAN),
            altitude: get("altitude").map(parse_cell_f64).unwrap_or(f64::NAN),
            ground_distance: get("ground_distance").map(parse_cell_f64).unwrap_or(f64::NAN),
            mass: get("mass").map(parse_cell_f64).unwrap_or(f64::NAN),
            true_airspeed: get("true_airspeed").map(parse_cell_f64).unwrap_or(f64::NAN),
            equivalent_airspeed: get("equivalent_airspeed").map(parse_cell_f64).unwrap_or(f64::NAN),
            mach: get("mach").map(parse_cell_f64).unwrap_or(f64::NAN),
            alpha: get("alpha").map(parse_cell_f64).unwrap_or(f64::NAN),
            slope_angle: get("slope_angle").map(parse_cell_f64).unwrap_or(f64::NAN),
            acceleration: get("acceleration").map(parse_cell_f64).unwrap_or(f64::NAN),
            thrust: get("thrust").map(parse_cell_f64).unwrap_or(f64::NAN),
            thrust_rate: get("thrust_rate").map(parse_cell_f64).unwrap_or(f64::NAN),
            thrust_is_regulated: get("thrust_is_regulated").map(|v| v == "true").unwrap_or(false),
            sfc: get("sfc").map(parse_cell_f64).unwrap_or(f64::NAN),
            drag: get("drag").map(parse_cell_f64).unwrap_or(f64::NAN),
            lift: get("lift").map(parse_cell_f64).unwrap_or(f64::NAN),
            cl: get("CL").map(parse_cell_f64).unwrap_or(f64::NAN),
            cd: get("CD").map(parse_cell_f64).unwrap_or(f64::NAN),
            consumed_fuel: get("consumed_fuel").map(parse_cell_f64).unwrap_or(f64::NAN),
            name: get("name").and_then(|v| if v.is_empty() { None } else { Some(v.to_string()) }),
            isa_offset: get("isa_offset").map(parse_cell_f64).unwrap_or(f64::NAN),
            extras: BTreeMap::new(),
        };
        for spec in registry.specs() {
            let value = get(&spec.name).map(parse_cell_f64).unwrap_or(f64::NAN);
            fp.extras.insert(spec.name.clone(), value);
        }
        fp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_registry() -> FieldRegistry {
        FieldRegistry::new(vec![FieldSpec {
            name: "wing_temp".to_string(),
            default: 0.0,
            is_cumulative: false,
            is_output: true,
        }])
        .unwrap()
    }

    #[test]
    fn row_round_trip_preserves_base_fields() {
        let registry = sample_registry();
        let fp = FlightPoint {
            time: 120.0,
            altitude: 10_668.0,
            ground_distance: 50_000.0,
            mass: 69_800.0,
            true_airspeed: 233.4,
            equivalent_airspeed: 150.2,
            mach: 0.78,
            alpha: 0.05,
            slope_angle: 0.0,
            acceleration: 0.0,
            thrust: 45_000.0,
            thrust_rate: 0.6,
            thrust_is_regulated: true,
            sfc: 1.7e-5,
            drag: 45_000.0,
            lift: 680_000.0,
            cl: 0.52,
            cd: 0.031,
            consumed_fuel: 200.0,
            name: Some("cruise".to_string()),
            isa_offset: 0.0,
            extras: [("wing_temp".to_string(), 12.5)].into_iter().collect(),
        };

        let row = fp.to_row(&registry);
        let back = FlightPoint::from_row(&row, &registry);
        assert_eq!(fp, back);
    }

    #[test]
    fn unset_fields_round_trip_as_nan_or_none() {
        let registry = FieldRegistry::default();
        let fp = FlightPoint::default();
        let row = fp.to_row(&registry);
        let back = FlightPoint::from_row(&row, &registry);
        assert!(back.time.is_nan());
        assert!(back.name.is_none());
    }

    #[test]
    fn duplicate_field_declaration_is_rejected() {
        let specs = vec![
            FieldSpec { name: "x".to_string(), default: 0.0, is_cumulative: false, is_output: true },
            FieldSpec { name: "x".to_string(), default: 0.0, is_cumulative: false, is_output: true },
        ];
        assert!(matches!(
            FieldRegistry::new(specs),
            Err(FieldRegistryError::DuplicateField(_))
        ));
    }

    #[test]
    fn field_colliding_with_base_is_rejected() {
        let specs = vec![FieldSpec {
            name: "mass".to_string(),
            default: 0.0,
            is_cumulative: false,
            is_output: true,
        }];
        assert!(matches!(
            FieldRegistry::new(specs),
            Err(FieldRegistryError::CollidesWithBaseField(_))
        ));
    }

    #[test]
    fn continuity_matches_within_tolerance() {
        let a = FlightPoint::zeroed(0.0);
        let mut b = FlightPoint::zeroed(0.0);
        b.time = 1e-10;
        assert!(a.continuity_matches(&b, 1e-9));
        b.time = 1.0;
        assert!(!a.continuity_matches(&b, 1e-9));
    }
}
