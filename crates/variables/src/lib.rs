//! The variable store boundary layer (§4.9/§6.3): a flat
//! `name -> (value, unit)` map produced by the surrounding design framework,
//! consumed (and partly written back to) by the mission builder and driver.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A stored value: either a scalar, or a 1-D array (`shape_by_conn`, §4.9).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableValue {
    Scalar(f64),
    Array(Vec<f64>),
}

impl VariableValue {
    /// The value as a scalar; the first element if stored as a length-1 array.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            VariableValue::Scalar(v) => Some(*v),
            VariableValue::Array(values) if values.len() == 1 => Some(values[0]),
            VariableValue::Array(_) => None,
        }
    }
}

/// One entry of the store: a value plus the unit it is expressed in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub value: VariableValue,
    pub unit: String,
}

/// Flat `map<String, Variable>` with `get`/`set`/`contains`/`iter` (§6.3).
/// The engine never mutates entries it did not itself produce: callers use
/// [`VariableStore::set`] only for outputs the driver computes (needed
/// block fuel, TOW, per-part totals), never for inputs it consumed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableStore {
    entries: BTreeMap<String, Variable>,
}

#[derive(Debug, Error)]
pub enum VariableStoreError {
    #[error("failed to read variable store file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse variable store YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: f64, unit: impl Into<String>) {
        self.entries.insert(
            name.into(),
            Variable { value: VariableValue::Scalar(value), unit: unit.into() },
        );
    }

    pub fn set_variable(&mut self, name: impl Into<String>, variable: Variable) {
        self.entries.insert(name.into(), variable);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Variable)> {
        self.entries.iter()
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, VariableStoreError> {
        let reader = File::open(path)?;
        Ok(serde_yaml::from_reader(reader)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), VariableStoreError> {
        let file = File::create(path)?;
        serde_yaml::to_writer(file, self)?;
        Ok(())
    }
}
