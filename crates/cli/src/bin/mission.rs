use std::path::PathBuf;

use clap::Parser;
use mission_performance::{
    load_aircraft_config, run_mission_from_files, write_mission_outputs, FieldRegistry, VariableStore,
};

#[derive(Parser)]
#[command(author, version, about = "Mission performance engine CLI")]
struct Cli {
    /// Mission declaration YAML file (§6.1: phases/routes/missions/segments)
    #[arg(long)]
    declaration: PathBuf,

    /// Variable store YAML file (§6.3: flat name -> {value, unit} map)
    #[arg(long)]
    variables: PathBuf,

    /// Aircraft config YAML file: named polars, propulsion, wing area
    #[arg(long)]
    aircraft: PathBuf,

    /// Name of the mission to run, from the declaration's `missions:` table
    #[arg(long)]
    mission: String,

    /// Write the full flight-point trace as CSV here ('-' for stdout)
    #[arg(long)]
    points_csv: Option<PathBuf>,

    /// Write the per-part distance/duration/fuel summary as CSV here
    #[arg(long)]
    summary_csv: Option<PathBuf>,

    /// Write the variable store back out here, with the mission's §6.3
    /// outputs (needed_block_fuel, TOW/block_fuel when computed, and
    /// per-part totals) merged in
    #[arg(long)]
    write_variables: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let catalog = load_aircraft_config(&cli.aircraft)?;
    let (output, missing) =
        run_mission_from_files(&cli.declaration, &cli.variables, &cli.mission, &catalog)?;

    println!("=== Mission '{}' ===", cli.mission);
    println!(
        "Total fuel     : {:.1} kg (reserve {:.1} kg)",
        output.total_fuel_kg, output.reserve_fuel_kg
    );
    println!(
        "Total time     : {:.2} h ({:.0} s)",
        output.total_time_s / 3_600.0,
        output.total_time_s
    );
    println!("Points emitted : {}", output.points.len());
    println!("Needed block fuel: {:.1} kg", output.needed_block_fuel_kg);
    if let Some(tow_kg) = output.tow_kg {
        println!("TOW            : {tow_kg:.1} kg");
    }
    if let Some(block_fuel_kg) = output.block_fuel_kg {
        println!("Block fuel     : {block_fuel_kg:.1} kg");
    }
    println!();
    println!("{:<28} {:>12} {:>12} {:>10}", "part", "distance_m", "duration_s", "fuel_kg");
    for (name, totals) in &output.per_part {
        println!(
            "{:<28} {:>12.1} {:>12.1} {:>10.2}",
            name, totals.distance_m, totals.duration_s, totals.fuel_kg
        );
    }

    if !missing.is_empty() {
        println!();
        println!("Required inputs not found in the variable store:");
        for input in &missing {
            println!("  {} ({}){}", input.name, input.unit, default_suffix(input.default));
        }
    }

    let registry = FieldRegistry::default();
    if let Some(points_path) = &cli.points_csv {
        let writer = msim_export::writer_for_path(points_path)?;
        msim_export::write_points(writer, &registry, &output.points)?;
    }
    if let Some(summary_path) = &cli.summary_csv {
        let writer = msim_export::writer_for_path(summary_path)?;
        let parts = output.per_part.iter().map(|(name, totals)| (name.as_str(), *totals));
        msim_export::write_part_summary(writer, parts)?;
    }

    if let Some(write_path) = &cli.write_variables {
        let mut store = VariableStore::load(&cli.variables)?;
        write_mission_outputs(&mut store, &cli.mission, &output);
        store.save(write_path)?;
    }

    Ok(())
}

fn default_suffix(default: f64) -> String {
    if default.is_nan() {
        String::new()
    } else {
        format!(" [default {default}]")
    }
}
