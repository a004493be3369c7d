//! Core constants, units registry, and shared primitives for the mission
//! performance engine workspace.

/// Physical constants expressed in SI units (unless stated otherwise).
pub mod constants {
    /// Standard gravity at Earth's surface (m/s²).
    pub const G0: f64 = 9.80665;
    /// Seconds per hour.
    pub const SECONDS_PER_HOUR: f64 = 3_600.0;
    /// Seconds per minute.
    pub const SECONDS_PER_MINUTE: f64 = 60.0;
    /// Sea-level air density (kg/m³), ISA standard day.
    pub const RHO0: f64 = 1.225;
    /// Sea-level pressure (Pa), ISA standard day.
    pub const P0: f64 = 101_325.0;
    /// Sea-level temperature (K), ISA standard day.
    pub const T0: f64 = 288.15;
    /// Specific gas constant for dry air (J/(kg·K)).
    pub const R_AIR: f64 = 287.05287;
    /// Ratio of specific heats for air.
    pub const GAMMA_AIR: f64 = 1.4;
}

/// Time utilities shared across crates.
pub mod time {
    use super::constants::{SECONDS_PER_HOUR, SECONDS_PER_MINUTE};

    /// Convert hours to seconds.
    #[inline]
    pub fn hours_to_seconds(hours: f64) -> f64 {
        hours * SECONDS_PER_HOUR
    }

    /// Convert seconds to hours.
    #[inline]
    pub fn seconds_to_hours(seconds: f64) -> f64 {
        seconds / SECONDS_PER_HOUR
    }

    /// Convert minutes to seconds.
    #[inline]
    pub fn minutes_to_seconds(minutes: f64) -> f64 {
        minutes * SECONDS_PER_MINUTE
    }
}

/// A minimal internal units table, replacing the external units library the
/// original design framework relies on (see design note "Unit handling").
///
/// Every unit appearing in mission declaration files is listed here with its
/// physical dimension and its affine conversion to the dimension's SI base
/// unit. No compile-time dimensional types are used: callers convert by
/// name and the [`UnitError::Mismatch`] variant catches dimension errors at
/// the boundary (the mission builder, §4.9).
pub mod units {
    use thiserror::Error;

    /// Physical dimension a unit belongs to. Two units convert into each
    /// other only if they share a dimension.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum Dimension {
        Length,
        Mass,
        Time,
        Speed,
        Angle,
        Force,
        Power,
        MassFlow,
        Sfc,
        Temperature,
        Dimensionless,
    }

    /// Errors raised while parsing or converting a unit string.
    #[derive(Debug, Error, PartialEq)]
    pub enum UnitError {
        #[error("unknown unit '{0}'")]
        UnknownUnit(String),
        #[error("unit mismatch: expected dimension {expected:?}, got unit '{unit}' ({got:?})")]
        Mismatch {
            expected: Dimension,
            unit: String,
            got: Dimension,
        },
    }

    /// One entry of the units table: how to convert a value expressed in
    /// this unit to and from the dimension's SI base unit.
    struct UnitDef {
        name: &'static str,
        dimension: Dimension,
        /// `si = value * scale + offset`
        scale: f64,
        offset: f64,
    }

    const UNITS: &[UnitDef] = &[
        UnitDef { name: "m", dimension: Dimension::Length, scale: 1.0, offset: 0.0 },
        UnitDef { name: "km", dimension: Dimension::Length, scale: 1_000.0, offset: 0.0 },
        UnitDef { name: "NM", dimension: Dimension::Length, scale: 1_852.0, offset: 0.0 },
        UnitDef { name: "ft", dimension: Dimension::Length, scale: 0.3048, offset: 0.0 },
        UnitDef { name: "kg", dimension: Dimension::Mass, scale: 1.0, offset: 0.0 },
        UnitDef { name: "lb", dimension: Dimension::Mass, scale: 0.453_592_37, offset: 0.0 },
        UnitDef { name: "s", dimension: Dimension::Time, scale: 1.0, offset: 0.0 },
        UnitDef { name: "min", dimension: Dimension::Time, scale: 60.0, offset: 0.0 },
        UnitDef { name: "h", dimension: Dimension::Time, scale: 3_600.0, offset: 0.0 },
        UnitDef { name: "m/s", dimension: Dimension::Speed, scale: 1.0, offset: 0.0 },
        UnitDef { name: "kn", dimension: Dimension::Speed, scale: 0.514_444_444, offset: 0.0 },
        UnitDef { name: "K", dimension: Dimension::Temperature, scale: 1.0, offset: 0.0 },
        UnitDef { name: "degC", dimension: Dimension::Temperature, scale: 1.0, offset: 273.15 },
        UnitDef { name: "deg", dimension: Dimension::Angle, scale: std::f64::consts::PI / 180.0, offset: 0.0 },
        UnitDef { name: "rad", dimension: Dimension::Angle, scale: 1.0, offset: 0.0 },
        UnitDef { name: "N", dimension: Dimension::Force, scale: 1.0, offset: 0.0 },
        UnitDef { name: "kN", dimension: Dimension::Force, scale: 1_000.0, offset: 0.0 },
        UnitDef { name: "W", dimension: Dimension::Power, scale: 1.0, offset: 0.0 },
        UnitDef { name: "kg/s", dimension: Dimension::MassFlow, scale: 1.0, offset: 0.0 },
        UnitDef { name: "kg/N/s", dimension: Dimension::Sfc, scale: 1.0, offset: 0.0 },
        UnitDef { name: "-", dimension: Dimension::Dimensionless, scale: 1.0, offset: 0.0 },
    ];

    fn lookup(unit: &str) -> Result<&'static UnitDef, UnitError> {
        UNITS
            .iter()
            .find(|def| def.name == unit)
            .ok_or_else(|| UnitError::UnknownUnit(unit.to_string()))
    }

    /// Return the physical dimension of a unit string.
    pub fn dimension_of(unit: &str) -> Result<Dimension, UnitError> {
        lookup(unit).map(|def| def.dimension)
    }

    /// Convert `value` expressed in `unit` to the dimension's SI base unit.
    pub fn to_si(value: f64, unit: &str) -> Result<f64, UnitError> {
        let def = lookup(unit)?;
        Ok(value * def.scale + def.offset)
    }

    /// Convert `value_si` (expressed in the dimension's SI base unit) to `unit`.
    pub fn from_si(value_si: f64, unit: &str) -> Result<f64, UnitError> {
        let def = lookup(unit)?;
        Ok((value_si - def.offset) / def.scale)
    }

    /// Convert a value from one unit to another, checking they share a dimension.
    pub fn convert(value: f64, from: &str, to: &str) -> Result<f64, UnitError> {
        let si = to_si(value, from)?;
        from_si(si, to)
    }

    /// Assert that `unit` has the `expected` dimension, for use at sites
    /// where the mission builder knows what physical quantity a parameter
    /// must hold (e.g. an `altitude` target must be a [`Dimension::Length`]).
    pub fn expect_dimension(unit: &str, expected: Dimension) -> Result<(), UnitError> {
        let got = dimension_of(unit)?;
        if got == expected {
            Ok(())
        } else {
            Err(UnitError::Mismatch {
                expected,
                unit: unit.to_string(),
                got,
            })
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn km_to_m_round_trips() {
            let m = to_si(3.704, "km").unwrap();
            assert!((m - 3704.0).abs() < 1e-9);
            let km = from_si(m, "km").unwrap();
            assert!((km - 3.704).abs() < 1e-12);
        }

        #[test]
        fn nautical_miles_convert_to_metres() {
            let m = to_si(1.0, "NM").unwrap();
            assert!((m - 1852.0).abs() < 1e-9);
        }

        #[test]
        fn deg_c_is_affine() {
            let k = to_si(15.0, "degC").unwrap();
            assert!((k - 288.15).abs() < 1e-9);
        }

        #[test]
        fn mismatched_dimension_is_rejected() {
            let err = expect_dimension("kg", Dimension::Length).unwrap_err();
            assert!(matches!(err, UnitError::Mismatch { .. }));
        }

        #[test]
        fn unknown_unit_is_rejected() {
            assert!(matches!(lookup("furlong"), Err(UnitError::UnknownUnit(_))));
        }
    }
}
