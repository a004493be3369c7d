//! The mission-layer error taxonomy (§7), wrapping segment and route
//! failures with the part name the design requires every diagnostic to
//! carry.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MissionError {
    #[error("segment '{part}' failed: {source}")]
    Segment { part: String, #[source] source: msim_segments::SegmentError },
    #[error("continuity broken entering part '{part}'")]
    ContinuityBroken { part: String },
    #[error(
        "route '{route}' is unreachable: range {range_m} m cannot be achieved ({reason})"
    )]
    RouteUnreachable { route: String, range_m: f64, reason: String },
    #[error("mission '{mission}' has no resolvable MassInput segment and no default prefix could be synthesized")]
    MissingMassInput { mission: String },
    #[error(
        "mission '{mission}' declares segments before MassInput whose fuel consumption depends on mass: {part}"
    )]
    InvalidMissionStructure { mission: String, part: String },
    #[error("mission '{mission}' references reserve route '{route}' which was never run")]
    UnknownReserveRoute { mission: String, route: String },
    #[error(
        "block-fuel/TOW fixed point for mission '{mission}' did not converge within {max_iter} iterations"
    )]
    BlockFuelNotConverged { mission: String, max_iter: usize },
}
