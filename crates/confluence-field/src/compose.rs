//! Intersection composition: find atoms that multiple scorers agree on.
//!
//! # Algorithm
//!
//! For every atom present in at least two fields:
//!
//! ```text
//! participants = { s | field[s][atom] > threshold(s) }
//! strength     = Σ activation_s × coherence_s
//! agreement    = 1 − stdev(activations)
//! coupling     = mean(matrix[pair]) over unordered participant pairs
//! ```
//!
//! Atoms with fewer than two participants are not nexuses.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::atom::ScorerId;
use crate::extract::SemanticField;
use crate::nexus::{agreement, Nexus};

/// Default per-scorer activation threshold.
pub const DEFAULT_ACTIVATION_THRESHOLD: f64 = 0.3;

/// A nexus needs at least this many participants by definition.
pub const MIN_NEXUS_PARTICIPANTS: usize = 2;

/// Source of learned pairwise scorer affinity.
pub trait CouplingSource {
    /// Affinity of an unordered scorer pair, in [0, 1].
    fn coupling(&self, a: &ScorerId, b: &ScorerId) -> f64;
}

/// Reports the same coupling for every pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformCoupling(pub f64);

impl CouplingSource for UniformCoupling {
    fn coupling(&self, _a: &ScorerId, _b: &ScorerId) -> f64 {
        self.0
    }
}

/// Participation thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposerConfig {
    /// Threshold for scorers without an override
    pub activation_threshold: f64,
    /// Per-scorer overrides
    #[serde(default)]
    pub scorer_thresholds: BTreeMap<ScorerId, f64>,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            activation_threshold: DEFAULT_ACTIVATION_THRESHOLD,
            scorer_thresholds: BTreeMap::new(),
        }
    }
}

impl ComposerConfig {
    /// Activation a scorer must strictly exceed to participate.
    pub fn threshold_for(&self, scorer: &ScorerId) -> f64 {
        self.scorer_thresholds
            .get(scorer)
            .copied()
            .unwrap_or(self.activation_threshold)
    }
}

/// Compose this round's nexus candidates, best first (see [`Nexus::rank_cmp`]).
pub fn compose(
    fields: &[SemanticField],
    coupling: &dyn CouplingSource,
    config: &ComposerConfig,
) -> Vec<Nexus> {
    let mut appearances: BTreeMap<&str, usize> = BTreeMap::new();
    for field in fields {
        for atom in field.activations.keys() {
            *appearances.entry(atom.as_str()).or_default() += 1;
        }
    }

    let mut nexuses = Vec::new();
    for (atom, count) in appearances {
        if count < MIN_NEXUS_PARTICIPANTS {
            continue;
        }

        let mut activations = BTreeMap::new();
        let mut strength = 0.0;
        for field in fields {
            let activation = field.activation(atom);
            if activation > config.threshold_for(&field.scorer) {
                activations.insert(field.scorer.clone(), activation);
                strength += activation * field.coherence;
            }
        }

        if activations.len() < MIN_NEXUS_PARTICIPANTS {
            continue;
        }

        let values: Vec<f64> = activations.values().copied().collect();
        let participants: Vec<&ScorerId> = activations.keys().collect();
        let coupling_weight = mean_pair_coupling(&participants, coupling);

        nexuses.push(Nexus {
            atom: atom.to_string(),
            participants: activations.keys().cloned().collect(),
            agreement: agreement(&values),
            intersection_strength: strength,
            coupling_weight,
            activations,
        });
    }

    nexuses.sort_by(|a, b| a.rank_cmp(b));
    nexuses
}

fn mean_pair_coupling(participants: &[&ScorerId], coupling: &dyn CouplingSource) -> f64 {
    let mut total = 0.0;
    let mut pairs = 0usize;
    for (i, a) in participants.iter().enumerate() {
        for b in &participants[i + 1..] {
            total += coupling.coupling(a, b);
            pairs += 1;
        }
    }
    if pairs == 0 {
        0.0
    } else {
        total / pairs as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::ScorerOutput;
    use crate::extract::{normalize, ExtractorConfig};
    use proptest::prelude::*;

    fn field(scorer: &str, coherence: f64, atoms: &[(&str, f64)]) -> SemanticField {
        let output = atoms
            .iter()
            .fold(ScorerOutput::new(coherence), |out, (atom, score)| out.with_atom(*atom, *score));
        normalize(ScorerId::new(scorer), output, &ExtractorConfig::default()).unwrap()
    }

    /// Coupling that depends on which pair is asked.
    struct PairTable;

    impl CouplingSource for PairTable {
        fn coupling(&self, a: &ScorerId, b: &ScorerId) -> f64 {
            match (a.as_str(), b.as_str()) {
                ("a", "b") | ("b", "a") => 0.9,
                ("a", "c") | ("c", "a") => 0.3,
                _ => 0.6,
            }
        }
    }

    #[test]
    fn two_scorers_agreeing_form_a_nexus() {
        let fields = vec![
            field("scorer1", 0.8, &[("urgent", 0.9)]),
            field("scorer2", 0.8, &[("urgent", 0.85)]),
        ];

        let nexuses = compose(&fields, &UniformCoupling(0.5), &ComposerConfig::default());

        assert_eq!(nexuses.len(), 1);
        let nexus = &nexuses[0];
        assert_eq!(nexus.atom, "urgent");
        assert_eq!(
            nexus.participants.iter().map(ScorerId::as_str).collect::<Vec<_>>(),
            vec!["scorer1", "scorer2"]
        );
        assert!((nexus.agreement - 0.96).abs() < 0.01);
        assert!((nexus.intersection_strength - (0.9 * 0.8 + 0.85 * 0.8)).abs() < 1e-12);
        assert_eq!(nexus.coupling_weight, 0.5);
    }

    #[test]
    fn single_scorer_never_forms_a_nexus() {
        let fields = vec![
            field("scorer1", 0.9, &[("urgent", 0.95)]),
            field("scorer2", 0.9, &[("calm", 0.2)]),
        ];
        assert!(compose(&fields, &UniformCoupling(0.5), &ComposerConfig::default()).is_empty());
    }

    #[test]
    fn threshold_is_strict_and_per_scorer() {
        let fields = vec![
            field("a", 1.0, &[("urgent", 0.3)]),
            field("b", 1.0, &[("urgent", 0.6)]),
            field("c", 1.0, &[("urgent", 0.6)]),
        ];

        // a sits exactly at the default threshold and is excluded
        let nexuses = compose(&fields, &UniformCoupling(0.5), &ComposerConfig::default());
        assert_eq!(nexuses[0].participant_count(), 2);
        assert!(!nexuses[0].participants.contains(&ScorerId::new("a")));

        // c gets a stricter override and drops out, leaving b alone
        let mut config = ComposerConfig::default();
        config.scorer_thresholds.insert(ScorerId::new("a"), 0.1);
        config.scorer_thresholds.insert(ScorerId::new("c"), 0.7);
        let nexuses = compose(&fields, &UniformCoupling(0.5), &config);
        assert_eq!(nexuses.len(), 1);
        assert_eq!(
            nexuses[0].participants.iter().map(ScorerId::as_str).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
    }

    #[test]
    fn coupling_is_mean_over_participant_pairs() {
        let fields = vec![
            field("a", 1.0, &[("urgent", 0.8)]),
            field("b", 1.0, &[("urgent", 0.8)]),
            field("c", 1.0, &[("urgent", 0.8)]),
        ];
        let nexuses = compose(&fields, &PairTable, &ComposerConfig::default());
        // (0.9 + 0.3 + 0.6) / 3
        assert!((nexuses[0].coupling_weight - 0.6).abs() < 1e-12);
    }

    #[test]
    fn output_is_ranked() {
        let fields = vec![
            field("a", 0.5, &[("calm", 0.5), ("urgent", 0.9), ("grief", 0.5)]),
            field("b", 0.5, &[("calm", 0.5), ("urgent", 0.9), ("grief", 0.5)]),
        ];
        let nexuses = compose(&fields, &UniformCoupling(0.5), &ComposerConfig::default());
        let atoms: Vec<&str> = nexuses.iter().map(|n| n.atom.as_str()).collect();
        // calm and grief tie on everything but the name
        assert_eq!(atoms, vec!["urgent", "calm", "grief"]);
    }

    #[test]
    fn empty_fields_contribute_nothing() {
        let fields = vec![
            field("a", 0.8, &[("urgent", 0.9)]),
            SemanticField::empty(ScorerId::new("b")),
            field("c", 0.8, &[("urgent", 0.7)]),
        ];
        let nexuses = compose(&fields, &UniformCoupling(0.5), &ComposerConfig::default());
        assert_eq!(nexuses.len(), 1);
        assert!(!nexuses[0].participants.contains(&ScorerId::new("b")));
    }

    proptest! {
        #[test]
        fn every_nexus_has_two_participants_and_bounded_scores(
            scores in proptest::collection::vec(
                proptest::collection::vec(0.0f64..1.0, 4),
                2..6,
            ),
            coherence in 0.0f64..1.0,
        ) {
            let atoms = ["urgent", "calm", "grief", "awe"];
            let fields: Vec<SemanticField> = scores
                .iter()
                .enumerate()
                .map(|(i, row)| {
                    let pairs: Vec<(&str, f64)> = atoms.iter().copied().zip(row.iter().copied()).collect();
                    field(&format!("s{i}"), coherence, &pairs)
                })
                .collect();

            let nexuses = compose(&fields, &UniformCoupling(0.5), &ComposerConfig::default());
            for pair in nexuses.windows(2) {
                prop_assert_ne!(pair[0].rank_cmp(&pair[1]), std::cmp::Ordering::Greater);
            }
            for nexus in nexuses {
                prop_assert!(nexus.participant_count() >= MIN_NEXUS_PARTICIPANTS);
                prop_assert!((0.0..=1.0).contains(&nexus.agreement));
                prop_assert!(nexus.intersection_strength >= 0.0);
            }
        }
    }
}
