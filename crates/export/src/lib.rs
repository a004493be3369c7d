//! Tabular export of a mission run: the full flight-point trace as CSV, and
//! a short per-part summary table alongside it.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use msim_flightpoint::{FieldRegistry, FlightPoint, BASE_FIELDS};
use msim_mission::PartTotals;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error writing export: {0}")]
    Io(#[from] io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Create a writer for the target path, handling stdout (`-`) by convention.
pub fn writer_for_path(path: &Path) -> io::Result<Box<dyn Write>> {
    if path == Path::new("-") {
        return Ok(Box::new(BufWriter::new(io::stdout())));
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let file = File::create(path)?;
    Ok(Box::new(BufWriter::new(file)))
}

fn output_field_names(registry: &FieldRegistry) -> HashSet<&str> {
    registry.specs().iter().filter(|spec| spec.is_output).map(|spec| spec.name.as_str()).collect()
}

fn header(registry: &FieldRegistry) -> Vec<String> {
    let mut fields: Vec<String> = BASE_FIELDS.iter().map(|f| f.to_string()).collect();
    fields.extend(registry.specs().iter().filter(|spec| spec.is_output).map(|spec| spec.name.clone()));
    fields
}

/// Format a cell to 6 significant figures (§6.2), empty for NaN/unset.
///
/// Rust has no `%g`-equivalent format specifier, so this emulates one: pick
/// the decimal exponent from `log10`, then render fixed-point with just
/// enough fractional digits to hold 6 significant digits, trimming trailing
/// zeros (and a bare trailing `.`).
fn format_significant(value: f64) -> String {
    if value.is_nan() {
        return String::new();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    let exponent = value.abs().log10().floor() as i32;
    let decimals = (5 - exponent).clamp(0, 17) as usize;
    let fixed = format!("{value:.decimals$}");
    if fixed.contains('.') {
        let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
        if trimmed.is_empty() || trimmed == "-" {
            "0".to_string()
        } else {
            trimmed.to_string()
        }
    } else {
        fixed
    }
}

/// Base fields that are not numeric and so pass through CSV export verbatim
/// rather than through [`format_significant`].
const NON_NUMERIC_FIELDS: &[&str] = &["name", "thrust_is_regulated"];

/// Write a full mission trace as CSV: base fields in [`BASE_FIELDS`] order,
/// followed by any extension fields the registry marks as output. Numeric
/// values are formatted to 6 significant figures (§6.2), not the full
/// round-trip precision `FlightPoint::to_row` keeps for its own
/// serialization.
pub fn write_points(writer: impl Write, registry: &FieldRegistry, points: &[FlightPoint]) -> Result<(), ExportError> {
    let mut csv_writer = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    csv_writer.write_record(header(registry))?;

    let output_fields = output_field_names(registry);
    for point in points {
        let row = point.to_row(registry);
        let values = row
            .into_iter()
            .filter(|(name, _)| BASE_FIELDS.contains(&name.as_str()) || output_fields.contains(name.as_str()))
            .map(|(name, cell)| {
                if NON_NUMERIC_FIELDS.contains(&name.as_str()) {
                    cell
                } else {
                    format_significant(parse_cell(&cell))
                }
            });
        csv_writer.write_record(values)?;
    }
    csv_writer.flush()?;
    Ok(())
}

fn parse_cell(cell: &str) -> f64 {
    if cell.is_empty() {
        f64::NAN
    } else {
        cell.parse().unwrap_or(f64::NAN)
    }
}

const SUMMARY_HEADER: &[&str] = &["part", "distance_m", "duration_s", "fuel_kg"];

/// Write the per-part distance/duration/fuel breakdown a mission run
/// produces alongside its point trace.
pub fn write_part_summary<'a>(
    writer: impl Write,
    parts: impl IntoIterator<Item = (&'a str, PartTotals)>,
) -> Result<(), ExportError> {
    let mut csv_writer = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    csv_writer.write_record(SUMMARY_HEADER)?;
    for (part, totals) in parts {
        csv_writer.write_record([
            part.to_string(),
            format!("{:.3}", totals.distance_m),
            format!("{:.3}", totals.duration_s),
            format!("{:.3}", totals.fuel_kg),
        ])?;
    }
    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use msim_flightpoint::FieldSpec;

    #[test]
    fn header_includes_only_output_extension_fields() {
        let registry = FieldRegistry::new(vec![
            FieldSpec { name: "wing_temp".to_string(), default: 0.0, is_cumulative: false, is_output: true },
            FieldSpec { name: "internal_counter".to_string(), default: 0.0, is_cumulative: false, is_output: false },
        ])
        .unwrap();
        let fields = header(&registry);
        assert!(fields.contains(&"wing_temp".to_string()));
        assert!(!fields.contains(&"internal_counter".to_string()));
        assert_eq!(fields.len(), BASE_FIELDS.len() + 1);
    }

    #[test]
    fn write_points_emits_one_row_per_point_plus_header() {
        let registry = FieldRegistry::default();
        let points = vec![FlightPoint::zeroed(0.0), FlightPoint::zeroed(0.0)];
        let mut buf = Vec::new();
        write_points(&mut buf, &registry, &points).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn format_significant_keeps_six_sig_figs_and_empty_for_nan() {
        assert_eq!(format_significant(f64::NAN), "");
        assert_eq!(format_significant(0.0), "0");
        assert_eq!(format_significant(123_456.789), "123457");
        assert_eq!(format_significant(0.00012345678), "0.000123457");
        assert_eq!(format_significant(-42.0), "-42");
    }

    #[test]
    fn write_points_truncates_mass_to_six_sig_figs() {
        let registry = FieldRegistry::default();
        let mut point = FlightPoint::zeroed(0.0);
        point.mass = 70_123.456_789;
        let mut buf = Vec::new();
        write_points(&mut buf, &registry, &[point]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let row = text.lines().nth(1).unwrap();
        assert!(row.contains(",70123.5,"), "row was: {row}");
    }

    #[test]
    fn write_part_summary_formats_totals() {
        let totals = PartTotals { distance_m: 1_234.5, duration_s: 60.0, fuel_kg: 12.0 };
        let mut buf = Vec::new();
        write_part_summary(&mut buf, [("cruise", totals)]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("cruise,1234.500,60.000,12.000"));
    }
}
