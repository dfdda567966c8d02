//! Nexus: an atom on which several scorers agree.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::atom::ScorerId;

/// A cross-scorer agreement point on one atom for one round.
///
/// Every field here is recomputed from the current round's semantic fields;
/// nothing is carried over between rounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nexus {
    /// The atom the participants agree on
    pub atom: String,
    /// Scorers whose activation cleared their threshold (always ≥ 2)
    pub participants: BTreeSet<ScorerId>,
    /// Activation of each participant on this atom
    pub activations: BTreeMap<ScorerId, f64>,
    /// Σ activation × coherence over participants (may exceed 1.0)
    pub intersection_strength: f64,
    /// 1 − sample stdev of participant activations, in [0, 1]
    pub agreement: f64,
    /// Mean learned coupling over all participant pairs
    pub coupling_weight: f64,
}

impl Nexus {
    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// Intersection strength clamped into [0, 1] for use in bounded scores.
    pub fn bounded_strength(&self) -> f64 {
        self.intersection_strength.clamp(0.0, 1.0)
    }

    /// Candidate ranking: higher strength first, then higher agreement, then
    /// more participants, then atom name ascending.
    ///
    /// `Ordering::Less` means `self` ranks ahead of `other`.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .intersection_strength
            .total_cmp(&self.intersection_strength)
            .then_with(|| other.agreement.total_cmp(&self.agreement))
            .then_with(|| other.participant_count().cmp(&self.participant_count()))
            .then_with(|| self.atom.cmp(&other.atom))
    }
}

/// Agreement quality of a set of activations: `1 − stdev`, clamped to [0, 1].
///
/// Uses the sample standard deviation. Fewer than two values agree trivially.
pub fn agreement(activations: &[f64]) -> f64 {
    let n = activations.len();
    if n < 2 {
        return 1.0;
    }
    let mean = activations.iter().sum::<f64>() / n as f64;
    let variance = activations.iter().map(|a| (a - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    (1.0 - variance.sqrt()).clamp(0.0, 1.0)
}
