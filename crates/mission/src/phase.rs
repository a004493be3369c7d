//! Ordered composition of segments (and nested sub-phases) sharing
//! inherited parameters (§3 "Phase"); the driver enforces first-point
//! continuity (§5) between every consecutive pair of emitted parts.

use msim_flightpoint::FlightPoint;

use crate::error::MissionError;
use crate::segment::ResolvedSegment;
use crate::PartTotals;

/// One entry of a phase's parts list: a leaf segment, or a nested sub-phase
/// (§3: "a phase can contain sub-phases (nesting allowed)").
pub enum PhasePart {
    Segment(ResolvedSegment),
    Phase(Box<Phase>),
}

pub struct Phase {
    pub name: String,
    pub parts: Vec<PhasePart>,
}

/// Continuity tolerance (§8 invariant 4 is exact for the driver's own
/// splicing; segment-internal floating point accumulation gets a small
/// numerical allowance here).
const CONTINUITY_TOLERANCE: f64 = 1e-6;

impl Phase {
    /// Run every part in declaration order, enforcing that each part's
    /// first emitted point continues from the previous part's last point.
    pub fn run(&self, start: FlightPoint) -> Result<(Vec<FlightPoint>, Vec<(String, PartTotals)>), MissionError> {
        let mut points = Vec::new();
        let mut totals = Vec::new();
        let mut current = start;

        for part in &self.parts {
            let (part_points, part_totals) = match part {
                PhasePart::Segment(segment) => {
                    let before = current.clone();
                    let trace = segment
                        .run(current.clone())
                        .map_err(|source| MissionError::Segment { part: segment.name().to_string(), source })?;
                    let totals = PartTotals::from_trace(&before, &trace);
                    (trace, vec![(segment.name().to_string(), totals)])
                }
                PhasePart::Phase(sub_phase) => sub_phase.run(current.clone())?,
            };

            if let (Some(first), Some(last_so_far)) = (part_points.first(), points.last()) {
                if !first.continuity_matches(last_so_far, CONTINUITY_TOLERANCE) {
                    return Err(MissionError::ContinuityBroken {
                        part: part_name(part).to_string(),
                    });
                }
            }

            if points.is_empty() {
                points.extend(part_points);
            } else {
                points.extend(part_points.into_iter().skip(1));
            }
            totals.extend(part_totals);
            current = points.last().unwrap().clone();
        }

        Ok((points, totals))
    }
}

impl Phase {
    /// Recursively collect the `MassInput` segments within this phase
    /// (§4.8 step 2), used by the mission driver to locate and rebind the
    /// externally supplied reference mass.
    pub fn mass_inputs(&self) -> Vec<&ResolvedSegment> {
        let mut found = Vec::new();
        for part in &self.parts {
            match part {
                PhasePart::Segment(segment) if segment.is_mass_input() => found.push(segment),
                PhasePart::Segment(_) => {}
                PhasePart::Phase(sub_phase) => found.extend(sub_phase.mass_inputs()),
            }
        }
        found
    }
}

fn part_name(part: &PhasePart) -> &str {
    match part {
        PhasePart::Segment(segment) => segment.name(),
        PhasePart::Phase(phase) => &phase.name,
    }
}

/// Run a list of sibling phases in order, threading continuity between
/// them the same way parts within one phase do (§4.8 step 4).
pub fn run_phases(
    phases: &[Phase],
    start: FlightPoint,
) -> Result<(Vec<FlightPoint>, Vec<(String, PartTotals)>, FlightPoint), MissionError> {
    let mut points = Vec::new();
    let mut totals = Vec::new();
    let mut current = start;

    for phase in phases {
        let (phase_points, phase_totals) = phase.run(current.clone())?;
        if points.is_empty() {
            points.extend(phase_points);
        } else {
            points.extend(phase_points.into_iter().skip(1));
        }
        totals.extend(phase_totals);
        current = points.last().cloned().unwrap_or(current);
    }

    Ok((points, totals, current))
}
