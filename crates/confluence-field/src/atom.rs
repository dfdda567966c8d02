//! Scorer identities and the raw output a scorer hands back.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a pluggable scorer.
///
/// The engine knows nothing else about a scorer; this string is the key for
/// semantic fields, nexus participants and co-activation pairs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScorerId(pub String);

impl ScorerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScorerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ScorerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ScorerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Raw, unnormalized result of one scorer call.
///
/// Scores may fall outside [0, 1]; the extractor clips them. Non-finite
/// numbers mark the whole output as malformed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScorerOutput {
    /// Raw score per atom name
    pub atoms: BTreeMap<String, f64>,
    /// The scorer's own internal self-consistency
    pub coherence: f64,
}

impl ScorerOutput {
    /// Output with no atoms and the given coherence.
    pub fn new(coherence: f64) -> Self {
        Self {
            atoms: BTreeMap::new(),
            coherence,
        }
    }

    /// Output that carries no signal at all.
    pub fn empty() -> Self {
        Self::new(0.0)
    }

    /// Add (or replace) one atom score.
    #[must_use]
    pub fn with_atom(mut self, atom: impl Into<String>, score: f64) -> Self {
        self.atoms.insert(atom.into(), score);
        self
    }
}
