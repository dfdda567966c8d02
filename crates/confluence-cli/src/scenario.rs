//! Scenario files: recorded scorer outputs replayed through the engine.
//!
//! ```json
//! {
//!   "inputs": ["the server is on fire"],
//!   "chain": false,
//!   "scorers": [
//!     { "id": "lexicon", "rounds": [{ "atoms": { "urgent": 0.6 }, "coherence": 0.4 }] },
//!     { "id": "prosody", "rounds": [{ "error": "model offline" }] }
//!   ]
//! }
//! ```

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use confluence_consensus::{Scorer, ScriptedScorer};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// One invocation per input
    pub inputs: Vec<String>,
    /// Feed each decision into the next invocation as prior context
    #[serde(default)]
    pub chain: bool,
    pub scorers: Vec<ScriptedScorer>,
}

impl Scenario {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("Invalid scenario {}", path.display()))
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let scenario: Scenario = serde_json::from_str(raw)?;
        if scenario.inputs.is_empty() {
            bail!("scenario has no inputs");
        }
        Ok(scenario)
    }

    pub fn scorers(&self) -> Vec<Arc<dyn Scorer>> {
        self.scorers
            .iter()
            .cloned()
            .map(|s| Arc::new(s) as Arc<dyn Scorer>)
            .collect()
    }
}
