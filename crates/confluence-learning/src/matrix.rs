//! Co-activation matrix: learned affinity between scorer pairs.

use std::collections::{BTreeMap, BTreeSet};

use confluence_field::{CouplingSource, ScorerId};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::ema;
use crate::pair::ScorerPair;

/// Weight reported for a pair that has never been reinforced.
pub const DEFAULT_COUPLING: f64 = 0.5;

/// Default smoothing factor for co-activation updates.
pub const DEFAULT_COACTIVATION_ALPHA: f64 = 0.15;

/// Symmetric scorer-pair affinity store.
///
/// One entry per unordered pair, each in [0, 1]. Entries are created on the
/// first reinforcement and never removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "MatrixRepr", into = "MatrixRepr")]
pub struct CoactivationMatrix {
    weights: BTreeMap<ScorerPair, f64>,
    default_weight: f64,
}

impl Default for CoactivationMatrix {
    fn default() -> Self {
        Self::new()
    }
}

impl CoactivationMatrix {
    /// Empty matrix with the neutral default weight.
    pub fn new() -> Self {
        Self::with_default_weight(DEFAULT_COUPLING)
    }

    /// Empty matrix reporting `default_weight` for unseen pairs.
    pub fn with_default_weight(default_weight: f64) -> Self {
        Self {
            weights: BTreeMap::new(),
            default_weight: default_weight.clamp(0.0, 1.0),
        }
    }

    pub fn default_weight(&self) -> f64 {
        self.default_weight
    }

    /// Change the weight reported for unseen pairs. Learned entries are untouched.
    pub fn set_default_weight(&mut self, default_weight: f64) {
        self.default_weight = default_weight.clamp(0.0, 1.0);
    }

    /// Weight of a pair, or the default if it has never been reinforced.
    pub fn weight(&self, pair: &ScorerPair) -> f64 {
        self.weights.get(pair).copied().unwrap_or(self.default_weight)
    }

    /// Weight between two scorers in either order.
    pub fn get(&self, a: &ScorerId, b: &ScorerId) -> f64 {
        match ScorerPair::new(a.clone(), b.clone()) {
            Some(pair) => self.weight(&pair),
            None => self.default_weight,
        }
    }

    /// Whether a pair has a learned entry.
    pub fn contains(&self, pair: &ScorerPair) -> bool {
        self.weights.contains_key(pair)
    }

    /// Reinforce every pair within `participants` toward `outcome_confidence`.
    ///
    /// `w ← (1 − α)·w + α·confidence` per pair, starting from the default for
    /// unseen pairs. Returns the number of pairs touched.
    pub fn update(
        &mut self,
        participants: &BTreeSet<ScorerId>,
        outcome_confidence: f64,
        alpha: f64,
    ) -> usize {
        let target = outcome_confidence.clamp(0.0, 1.0);
        let pairs = ScorerPair::within(participants);
        for pair in &pairs {
            let weight = self.weights.entry(pair.clone()).or_insert(self.default_weight);
            *weight = ema(*weight, target, alpha).clamp(0.0, 1.0);
            trace!(low = %pair.low(), high = %pair.high(), weight = *weight, "Reinforced pair");
        }
        pairs.len()
    }

    /// Number of learned pairs.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Learned pairs in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&ScorerPair, f64)> {
        self.weights.iter().map(|(pair, weight)| (pair, *weight))
    }
}

impl CouplingSource for CoactivationMatrix {
    fn coupling(&self, a: &ScorerId, b: &ScorerId) -> f64 {
        self.get(a, b)
    }
}

/// On-disk layout: JSON object keys must be strings, so pairs are listed.
#[derive(Serialize, Deserialize)]
struct MatrixRepr {
    default_weight: f64,
    entries: Vec<MatrixEntry>,
}

#[derive(Serialize, Deserialize)]
struct MatrixEntry {
    a: ScorerId,
    b: ScorerId,
    weight: f64,
}

impl From<CoactivationMatrix> for MatrixRepr {
    fn from(matrix: CoactivationMatrix) -> Self {
        Self {
            default_weight: matrix.default_weight,
            entries: matrix
                .weights
                .into_iter()
                .map(|(pair, weight)| MatrixEntry {
                    a: pair.low().clone(),
                    b: pair.high().clone(),
                    weight,
                })
                .collect(),
        }
    }
}

impl From<MatrixRepr> for CoactivationMatrix {
    fn from(repr: MatrixRepr) -> Self {
        let mut matrix = Self::with_default_weight(repr.default_weight);
        for entry in repr.entries {
            // Self-pairs in a hand-edited file are ignored
            if let Some(pair) = ScorerPair::new(entry.a, entry.b) {
                matrix.weights.insert(pair, entry.weight.clamp(0.0, 1.0));
            }
        }
        matrix
    }
}
