//! The component catalog the builder instantiates segments from (§4.9:
//! "instantiates a Mission from the component catalog"). Polars and
//! propulsion models are opaque, pre-built inputs (§1 Non-goals: "the core
//! is agnostic to those and receives polars and masses as opaque inputs") —
//! the declaration file names them, the catalog supplies the instances.

use std::collections::BTreeMap;
use std::sync::Arc;

use msim_polar::Polar;
use msim_propulsion::PropulsionModel;

/// Polars and propulsion models available to a build, keyed by the name a
/// `SegmentDecl`/`PhaseDecl`'s `polar:` field references. A single shared
/// propulsion model is used across the mission, consistent with the design
/// note that one aircraft's propulsion characteristics do not vary by
/// segment kind (only the requested thrust rate or regulation mode does).
pub struct ComponentCatalog {
    pub polars: BTreeMap<String, Arc<Polar>>,
    pub propulsion: Arc<dyn PropulsionModel>,
    pub wing_area_m2: f64,
    pub max_steps: usize,
}

impl ComponentCatalog {
    pub fn new(propulsion: Arc<dyn PropulsionModel>, wing_area_m2: f64) -> Self {
        Self { polars: BTreeMap::new(), propulsion, wing_area_m2, max_steps: msim_segments::DEFAULT_MAX_STEPS }
    }

    pub fn with_polar(mut self, name: impl Into<String>, polar: Arc<Polar>) -> Self {
        self.polars.insert(name.into(), polar);
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }
}
