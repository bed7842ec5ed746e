use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// A tree of requests. Top level steps start together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    #[serde(default)]
    pub steps: Vec<FlowStep>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowStep {
    pub request: String,
    /// Run after this step, sharing its environment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_steps: Option<StepGroup>,
    /// Run once per element of an environment array, each on a copy of the
    /// environment with the variable bound to the element.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub for_each_steps: Option<ForEachGroup>,
    /// As `for_each_steps`, iterating the first element of the array.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub for_each_first_steps: Option<ForEachGroup>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepGroup {
    #[serde(default)]
    pub steps: Vec<FlowStep>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForEachGroup {
    pub environment: String,
    #[serde(default)]
    pub steps: Vec<FlowStep>,
}

pub fn load_flow(path: &Path) -> Result<Flow> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading flow {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing flow {}", path.display()))
}
