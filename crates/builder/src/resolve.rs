//! Variable resolution (§4.9): turns one raw declaration value into a
//! concrete SI scalar against a [`VariableStore`], in the order the design
//! specifies — literal, named reference, opposite-of, contextual
//! substitution — recording every variable that was looked up but absent as
//! a required input rather than failing outright.

use msim_core::units;
use msim_declaration::{RawParam, RawValue};
use msim_variables::VariableStore;

use crate::BuilderError;

/// Recognized prefixes for a direct named-variable reference (§4.9 step 2).
const NAMED_VARIABLE_PREFIXES: &[&str] = &["data:", "settings:", "tuning:"];

/// The mission/route/phase names in scope while resolving one parameter,
/// used to expand a contextual (`~`) reference (§4.9 step 4).
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    pub mission: &'a str,
    pub route: Option<&'a str>,
    pub phase: Option<&'a str>,
}

/// One variable the builder looked up but did not find, reported back to
/// the surrounding framework as a required input (§4.9, final paragraph).
#[derive(Debug, Clone, PartialEq)]
pub struct RequiredInput {
    pub name: String,
    pub unit: String,
    pub default: f64,
}

/// Resolve one [`RawParam`] to an SI scalar in `expected_unit`'s dimension,
/// following the resolution order of §4.9 steps 1-4. Unresolved variables
/// resolve to `NaN` and are appended to `missing` rather than failing the
/// build; genuine structural problems (unit mismatch, an unparsable
/// reference string) fail with [`BuilderError`].
pub fn resolve_scalar(
    raw: &RawParam,
    param_name: &str,
    expected_unit: &str,
    ctx: ResolveContext,
    store: &VariableStore,
    missing: &mut Vec<RequiredInput>,
) -> Result<f64, BuilderError> {
    match raw {
        RawParam::Bare(RawValue::Number(n)) => Ok(*n),
        RawParam::Bare(RawValue::Text(s)) => resolve_text(s, param_name, expected_unit, ctx, store, missing),
        RawParam::WithUnit { value: RawValue::Number(n), unit } => {
            check_dimension(param_name, unit, expected_unit)?;
            Ok(units::convert(*n, unit, expected_unit)?)
        }
        RawParam::WithUnit { value: RawValue::Text(s), unit } => {
            resolve_text(s, param_name, unit, ctx, store, missing)
        }
    }
}

fn check_dimension(param_name: &str, unit: &str, expected_unit: &str) -> Result<(), BuilderError> {
    let expected_dim = units::dimension_of(expected_unit)?;
    units::expect_dimension(unit, expected_dim).map_err(|_| BuilderError::UnitMismatch {
        name: param_name.to_string(),
        expected: expected_unit.to_string(),
        got: unit.to_string(),
    })
}

fn resolve_text(
    s: &str,
    param_name: &str,
    expected_unit: &str,
    ctx: ResolveContext,
    store: &VariableStore,
    missing: &mut Vec<RequiredInput>,
) -> Result<f64, BuilderError> {
    if let Some(rest) = s.strip_prefix('-') {
        let value = resolve_text(rest, param_name, expected_unit, ctx, store, missing)?;
        return Ok(-value);
    }

    if let Some((prefix, suffix)) = s.split_once('~') {
        let prefix = if prefix.is_empty() { "data:mission" } else { prefix };
        let suffix = if suffix.is_empty() { param_name } else { suffix };
        let mut full = format!("{prefix}:{}", ctx.mission);
        if let Some(route) = ctx.route {
            full.push(':');
            full.push_str(route);
        }
        if let Some(phase) = ctx.phase {
            full.push(':');
            full.push_str(phase);
        }
        full.push(':');
        full.push_str(suffix);
        return lookup_variable(&full, expected_unit, store, missing);
    }

    if NAMED_VARIABLE_PREFIXES.iter().any(|prefix| s.starts_with(prefix)) {
        return lookup_variable(s, expected_unit, store, missing);
    }

    Err(BuilderError::InvalidDeclaration(format!(
        "'{s}' for parameter '{param_name}' is not a number, a named variable reference, or a contextual reference"
    )))
}

fn lookup_variable(
    name: &str,
    expected_unit: &str,
    store: &VariableStore,
    missing: &mut Vec<RequiredInput>,
) -> Result<f64, BuilderError> {
    let Some(variable) = store.get(name) else {
        missing.push(RequiredInput { name: name.to_string(), unit: expected_unit.to_string(), default: f64::NAN });
        return Ok(f64::NAN);
    };
    let Some(raw) = variable.value.as_scalar() else {
        return Err(BuilderError::InvalidDeclaration(format!("variable '{name}' is not a scalar")));
    };
    check_dimension(name, &variable.unit, expected_unit)?;
    Ok(units::convert(raw, &variable.unit, expected_unit)?)
}

/// Whether a raw text value names one of the two dynamic altitude tokens
/// (§4.9 step 5) rather than a literal or variable reference.
pub fn altitude_token(raw: &RawParam) -> Option<&'static str> {
    match raw {
        RawParam::Bare(RawValue::Text(s)) if s == "optimal_altitude" => Some("optimal_altitude"),
        RawParam::Bare(RawValue::Text(s)) if s == "optimal_flight_level" => Some("optimal_flight_level"),
        _ => None,
    }
}

/// Whether a raw target value is the `"constant"` sentinel (§4.9 step 5,
/// §3 "Segment descriptor": "keep value of start point"), valid only in
/// `target:` fields.
pub fn is_constant_token(raw: &RawParam) -> bool {
    matches!(raw, RawParam::Bare(RawValue::Text(s)) if s == "constant")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(mission: &'a str) -> ResolveContext<'a> {
        ResolveContext { mission, route: None, phase: None }
    }

    #[test]
    fn bare_number_passes_through() {
        let mut missing = Vec::new();
        let store = VariableStore::new();
        let value = resolve_scalar(
            &RawParam::Bare(RawValue::Number(10_668.0)),
            "altitude",
            "m",
            ctx("m1"),
            &store,
            &mut missing,
        )
        .unwrap();
        assert_eq!(value, 10_668.0);
        assert!(missing.is_empty());
    }

    #[test]
    fn with_unit_literal_converts() {
        let mut missing = Vec::new();
        let store = VariableStore::new();
        let raw = RawParam::WithUnit { value: RawValue::Number(3.704), unit: "km".to_string() };
        let value = resolve_scalar(&raw, "range", "m", ctx("m1"), &store, &mut missing).unwrap();
        assert!((value - 3_704.0).abs() < 1e-9);
    }

    #[test]
    fn mismatched_unit_is_rejected() {
        let mut missing = Vec::new();
        let store = VariableStore::new();
        let raw = RawParam::WithUnit { value: RawValue::Number(3.0), unit: "kg".to_string() };
        let err = resolve_scalar(&raw, "range", "m", ctx("m1"), &store, &mut missing).unwrap_err();
        assert!(matches!(err, BuilderError::UnitMismatch { .. }));
    }

    #[test]
    fn named_variable_reference_is_looked_up() {
        let mut missing = Vec::new();
        let mut store = VariableStore::new();
        store.set("data:mission:m1:TOW", 70_000.0, "kg");
        let raw = RawParam::Bare(RawValue::Text("data:mission:m1:TOW".to_string()));
        let value = resolve_scalar(&raw, "mass", "kg", ctx("m1"), &store, &mut missing).unwrap();
        assert_eq!(value, 70_000.0);
        assert!(missing.is_empty());
    }

    #[test]
    fn missing_named_variable_is_reported_not_an_error() {
        let mut missing = Vec::new();
        let store = VariableStore::new();
        let raw = RawParam::Bare(RawValue::Text("data:mission:m1:TOW".to_string()));
        let value = resolve_scalar(&raw, "mass", "kg", ctx("m1"), &store, &mut missing).unwrap();
        assert!(value.is_nan());
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].name, "data:mission:m1:TOW");
    }

    #[test]
    fn opposite_of_negates_the_resolved_value() {
        let mut missing = Vec::new();
        let mut store = VariableStore::new();
        store.set("tuning:bias", 2.5, "-");
        let raw = RawParam::Bare(RawValue::Text("-tuning:bias".to_string()));
        let value = resolve_scalar(&raw, "bias", "-", ctx("m1"), &store, &mut missing).unwrap();
        assert_eq!(value, -2.5);
    }

    #[test]
    fn contextual_reference_expands_prefix_and_suffix() {
        let mut missing = Vec::new();
        let mut store = VariableStore::new();
        store.set("data:mission:m1:main:cruise:mass_ratio", 0.99, "-");
        let raw = RawParam::Bare(RawValue::Text("~mass_ratio".to_string()));
        let context = ResolveContext { mission: "m1", route: Some("main"), phase: Some("cruise") };
        let value = resolve_scalar(&raw, "mass_ratio", "-", context, &store, &mut missing).unwrap();
        assert_eq!(value, 0.99);
    }

    #[test]
    fn constant_token_is_recognized_only_as_the_bare_text_constant() {
        assert!(is_constant_token(&RawParam::Bare(RawValue::Text("constant".to_string()))));
        assert!(!is_constant_token(&RawParam::Bare(RawValue::Text("constants".to_string()))));
        assert!(!is_constant_token(&RawParam::Bare(RawValue::Number(0.0))));
    }

    #[test]
    fn unrecognized_text_is_an_invalid_declaration() {
        let mut missing = Vec::new();
        let store = VariableStore::new();
        let raw = RawParam::Bare(RawValue::Text("garbage".to_string()));
        let err = resolve_scalar(&raw, "mass_ratio", "-", ctx("m1"), &store, &mut missing).unwrap_err();
        assert!(matches!(err, BuilderError::InvalidDeclaration(_)));
    }
}
