//! Mission performance engine: a configurable, time-step flight simulator
//! that reads a declarative YAML mission description, resolves it against a
//! variable store, and runs it segment by segment into a trace of
//! [`FlightPoint`]s.
//!
//! This crate is the facade over the workspace's lower-level crates:
//! [`msim_core`] (units, ISA constants), [`msim_atmosphere`] (the ISA
//! model), [`msim_polar`]/[`msim_propulsion`] (aerodynamics and engine
//! models), [`msim_segments`] (one stepping loop per segment kind),
//! [`msim_mission`] (phase/route/mission composition), [`msim_declaration`]/
//! [`msim_variables`] (the YAML wire format and its variable store), and
//! [`msim_builder`] (turning a declaration into a runnable [`Mission`]).

pub use msim_builder::{
    build, load_aircraft_config, parse_aircraft_config, AircraftConfigError, BuildOutput, BuilderError,
    ComponentCatalog, RequiredInput,
};
pub use msim_declaration::{Declaration, DeclarationError};
pub use msim_export::ExportError;
pub use msim_flightpoint::{FieldRegistry, FieldSpec, FlightPoint};
pub use msim_mission::{Mission, MissionError, MissionOutput, PartTotals};
pub use msim_variables::{VariableStore, VariableStoreError};

use std::io::Write;
use std::path::Path;

use thiserror::Error;

/// Anything that can go wrong end to end: loading the declaration file,
/// loading the variable store, building the mission, running it, or writing
/// results back out.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Declaration(#[from] DeclarationError),
    #[error(transparent)]
    Variables(#[from] VariableStoreError),
    #[error(transparent)]
    Build(#[from] BuilderError),
    #[error(transparent)]
    Mission(#[from] MissionError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Load a declaration file and a variable store, build the named mission
/// against a supplied [`ComponentCatalog`], and run it once end to end.
///
/// Any variables the declaration references but the store does not define
/// are reported back in [`BuildOutput::missing`] rather than failing the
/// build outright; running a mission with unresolved (`NaN`) parameters
/// will surface as ordinary floating-point propagation in the trace, not a
/// panic.
pub fn run_mission_from_files(
    declaration_path: impl AsRef<Path>,
    variables_path: impl AsRef<Path>,
    mission_name: &str,
    catalog: &ComponentCatalog,
) -> Result<(MissionOutput, Vec<RequiredInput>), EngineError> {
    let declaration = msim_declaration::load(declaration_path)?;
    let store = VariableStore::load(variables_path)?;
    let output = build(&declaration, mission_name, catalog, &store)?;
    let result = output.mission.run()?;
    Ok((result, output.missing))
}

/// Write a mission run's outputs back into a [`VariableStore`] (§6.3): the
/// needed block fuel is always written; `TOW` and `block_fuel` only when
/// the mission's `adjust_fuel`/`compute_TOW` flags produced them; and one
/// `{distance, duration, fuel}` triple per emitted part.
///
/// The engine never mutates entries it did not itself produce (§6.3); this
/// only ever inserts the fixed set of names documented here, all rooted at
/// `data:mission:<mission>:...`.
pub fn write_mission_outputs(store: &mut VariableStore, mission_name: &str, output: &MissionOutput) {
    let prefix = format!("data:mission:{mission_name}");
    store.set(format!("{prefix}:needed_block_fuel"), output.needed_block_fuel_kg, "kg");
    if let Some(tow_kg) = output.tow_kg {
        store.set(format!("{prefix}:TOW"), tow_kg, "kg");
    }
    if let Some(block_fuel_kg) = output.block_fuel_kg {
        store.set(format!("{prefix}:block_fuel"), block_fuel_kg, "kg");
    }
    for (part_name, totals) in &output.per_part {
        store.set(format!("{prefix}:{part_name}:distance"), totals.distance_m, "m");
        store.set(format!("{prefix}:{part_name}:duration"), totals.duration_s, "s");
        store.set(format!("{prefix}:{part_name}:fuel"), totals.fuel_kg, "kg");
    }
}

/// Write a mission run's point trace and per-part summary to two writers.
pub fn export_mission_output(
    output: &MissionOutput,
    registry: &FieldRegistry,
    points_writer: impl Write,
    summary_writer: impl Write,
) -> Result<(), ExportError> {
    msim_export::write_points(points_writer, registry, &output.points)?;
    let parts = output.per_part.iter().map(|(name, totals)| (name.as_str(), *totals));
    msim_export::write_part_summary(summary_writer, parts)
}

/// Crate version, reported by the CLI's `--version` flag.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
