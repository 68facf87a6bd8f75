//! Output destination specifications attached to playbook instructions.
//!
//! An instruction's `outputs` field tells the runner where a call result is
//! written in playbook state. Three authoring forms are accepted:
//!
//! ```yaml
//! outputs: $deployed.token              # whole result to one path
//! outputs:                              # result fields to paths
//!   address: [$deployed.token, $outputs.lastAddress]
//!   tx: $outputs.deployTx
//! outputs:                              # several of the above, applied in order
//!   - $deployed.token
//!   - { tx: $outputs.deployTx }
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// One destination or several for a mapped result field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputTargets {
    One(String),
    Many(Vec<String>),
}

impl OutputTargets {
    pub fn paths(&self) -> &[String] {
        match self {
            OutputTargets::One(path) => std::slice::from_ref(path),
            OutputTargets::Many(paths) => paths,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputSpec {
    /// Store the entire result at a single destination path.
    Path(String),
    /// Map result field paths to one or more destination paths.
    Mapping(IndexMap<String, OutputTargets>),
    /// Apply each nested specification in order.
    List(Vec<OutputSpec>),
}

impl Default for OutputSpec {
    fn default() -> Self {
        OutputSpec::Mapping(IndexMap::new())
    }
}

impl OutputSpec {
    /// Builds a specification from an authored playbook value.
    ///
    /// Returns a human readable message when the value has none of the three
    /// accepted forms or names an empty destination.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        let spec: OutputSpec = serde_json::from_value(value.to_json()).map_err(|_| {
            format!(
                "outputs must be a destination path, a mapping of result fields to destinations, or a list of those (found {})",
                value.shape()
            )
        })?;
        if let Some(empty) = spec.destinations().into_iter().find(|path| path.trim().is_empty()) {
            return Err(format!("outputs contain an empty destination path {empty:?}"));
        }
        Ok(spec)
    }

    pub fn is_empty(&self) -> bool {
        match self {
            OutputSpec::Path(_) => false,
            OutputSpec::Mapping(mapping) => mapping.is_empty(),
            OutputSpec::List(specs) => specs.iter().all(OutputSpec::is_empty),
        }
    }

    /// Every destination path named by the specification, in authoring order.
    pub fn destinations(&self) -> Vec<&str> {
        match self {
            OutputSpec::Path(path) => vec![path.as_str()],
            OutputSpec::Mapping(mapping) => mapping
                .values()
                .flat_map(|targets| targets.paths().iter().map(String::as_str))
                .collect(),
            OutputSpec::List(specs) => specs.iter().flat_map(OutputSpec::destinations).collect(),
        }
    }
}
