//! Emission gate: four strictly ordered filters over the final round's nexuses.
//!
//! ```text
//! 1. intersection   participants ≥ min_participants
//! 2. coherence      agreement ≥ coherence_threshold
//! 3. satisfaction   low ≤ confidence ≤ high
//! 4. min-energy     argmin (1 − confidence) over survivors
//! ```
//!
//! `confidence = α·agreement + β·strength + γ·coupling`, with strength
//! clamped to [0, 1]. Gate 3 rejects from both sides: below the window is too
//! uncertain to commit, above it is a degenerate match.
//!
//! Gate 4 only accepts [`Admitted`] values, which only [`EmissionGate::screen`]
//! can produce after gates 1–3 pass.

use std::cmp::Ordering;
use std::fmt;

use confluence_field::Nexus;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Weights of the combined confidence score. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GateWeights {
    /// α
    pub agreement: f64,
    /// β
    pub strength: f64,
    /// γ
    pub coupling: f64,
}

impl Default for GateWeights {
    fn default() -> Self {
        Self {
            agreement: 0.47,
            strength: 0.35,
            coupling: 0.18,
        }
    }
}

impl GateWeights {
    pub fn sum(&self) -> f64 {
        self.agreement + self.strength + self.coupling
    }
}

/// Gate parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateConfig {
    pub min_participants: usize,
    pub coherence_threshold: f64,
    /// Inclusive `(low, high)` confidence band
    pub satisfaction_window: (f64, f64),
    pub weights: GateWeights,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            min_participants: 2,
            coherence_threshold: 0.4,
            satisfaction_window: (0.45, 0.85),
            weights: GateWeights::default(),
        }
    }
}

impl GateConfig {
    /// Combined confidence of a nexus.
    pub fn confidence(&self, nexus: &Nexus) -> f64 {
        self.weights.agreement * nexus.agreement
            + self.weights.strength * nexus.bounded_strength()
            + self.weights.coupling * nexus.coupling_weight
    }
}

/// A nexus with its confidence, as committed or snapshotted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatedNexus {
    pub nexus: Nexus,
    pub confidence: f64,
}

impl GatedNexus {
    pub fn energy(&self) -> f64 {
        1.0 - self.confidence
    }
}

/// Which gate stopped a nexus.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "gate", rename_all = "snake_case")]
pub enum RejectReason {
    /// Gate 1
    TooFewParticipants { have: usize, need: usize },
    /// Gate 2
    Incoherent { agreement: f64, threshold: f64 },
    /// Gate 3, below the window
    Underconfident { confidence: f64, floor: f64 },
    /// Gate 3, above the window
    Overconfident { confidence: f64, ceiling: f64 },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::TooFewParticipants { have, need } => {
                write!(f, "{have} participants, need {need}")
            }
            RejectReason::Incoherent { agreement, threshold } => {
                write!(f, "agreement {agreement:.3} below {threshold:.3}")
            }
            RejectReason::Underconfident { confidence, floor } => {
                write!(f, "confidence {confidence:.3} below window floor {floor:.3}")
            }
            RejectReason::Overconfident { confidence, ceiling } => {
                write!(f, "confidence {confidence:.3} above window ceiling {ceiling:.3}")
            }
        }
    }
}

/// A nexus the gate refused. Diagnostic only, never emittable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedNexus {
    pub nexus: Nexus,
    pub confidence: f64,
    pub reason: RejectReason,
}

/// A nexus that passed gates 1–3.
#[derive(Debug, Clone, PartialEq)]
pub struct Admitted(GatedNexus);

impl Admitted {
    pub fn confidence(&self) -> f64 {
        self.0.confidence
    }

    pub fn nexus(&self) -> &Nexus {
        &self.0.nexus
    }
}

/// What the gate decided for one nexus list.
#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    /// The minimum-energy survivor of gates 1–3
    Emit(GatedNexus),
    /// Nothing survived; carries the highest-confidence rejection, if any
    Withhold { best_rejected: Option<RejectedNexus> },
}

/// The four-stage emission filter.
#[derive(Debug, Clone)]
pub struct EmissionGate {
    config: GateConfig,
}

impl EmissionGate {
    pub fn new(config: GateConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Run all four gates over a round's nexuses.
    pub fn evaluate(&self, nexuses: &[Nexus]) -> GateOutcome {
        let mut admitted = Vec::new();
        let mut rejected = Vec::new();

        for nexus in nexuses {
            match self.screen(nexus) {
                Ok(passed) => admitted.push(passed),
                Err(rejection) => {
                    trace!(atom = %rejection.nexus.atom, reason = %rejection.reason, "Gate rejected nexus");
                    rejected.push(rejection);
                }
            }
        }

        match select_minimum_energy(admitted) {
            Some(selected) => GateOutcome::Emit(selected),
            None => GateOutcome::Withhold {
                best_rejected: rejected.into_iter().min_by(|a, b| {
                    b.confidence
                        .total_cmp(&a.confidence)
                        .then_with(|| a.nexus.rank_cmp(&b.nexus))
                }),
            },
        }
    }

    /// Gates 1–3 in order. The first failing gate names the rejection.
    pub fn screen(&self, nexus: &Nexus) -> Result<Admitted, RejectedNexus> {
        let confidence = self.config.confidence(nexus);
        let reject = |reason| RejectedNexus {
            nexus: nexus.clone(),
            confidence,
            reason,
        };

        let have = nexus.participant_count();
        if have < self.config.min_participants {
            return Err(reject(RejectReason::TooFewParticipants {
                have,
                need: self.config.min_participants,
            }));
        }

        if nexus.agreement < self.config.coherence_threshold {
            return Err(reject(RejectReason::Incoherent {
                agreement: nexus.agreement,
                threshold: self.config.coherence_threshold,
            }));
        }

        let (floor, ceiling) = self.config.satisfaction_window;
        if confidence < floor {
            return Err(reject(RejectReason::Underconfident { confidence, floor }));
        }
        if confidence > ceiling {
            return Err(reject(RejectReason::Overconfident { confidence, ceiling }));
        }

        Ok(Admitted(GatedNexus {
            nexus: nexus.clone(),
            confidence,
        }))
    }
}

/// Gate 4: lowest energy wins, ties broken by nexus rank.
pub fn select_minimum_energy(admitted: Vec<Admitted>) -> Option<GatedNexus> {
    admitted
        .into_iter()
        .map(|Admitted(gated)| gated)
        .min_by(|a, b| compare_energy(a, b))
}

fn compare_energy(a: &GatedNexus, b: &GatedNexus) -> Ordering {
    a.energy()
        .total_cmp(&b.energy())
        .then_with(|| a.nexus.rank_cmp(&b.nexus))
}

#[cfg(test)]
mod tests {
    use super::*;
    use confluence_field::{
        compose, normalize, ComposerConfig, ExtractorConfig, ScorerId, ScorerOutput, UniformCoupling,
    };
    use std::collections::{BTreeMap, BTreeSet};

    fn nexus(atom: &str, participants: usize, strength: f64, agreement: f64, coupling: f64) -> Nexus {
        let ids: BTreeSet<ScorerId> = (0..participants)
            .map(|i| ScorerId::new(format!("s{i}")))
            .collect();
        Nexus {
            atom: atom.to_string(),
            activations: ids.iter().map(|id| (id.clone(), 0.6)).collect::<BTreeMap<_, _>>(),
            participants: ids,
            intersection_strength: strength,
            agreement,
            coupling_weight: coupling,
        }
    }

    fn gate() -> EmissionGate {
        EmissionGate::new(GateConfig::default())
    }

    #[test]
    fn default_weights_sum_to_one() {
        assert!((GateWeights::default().sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn agreeing_scorers_pass_gates_one_and_two() {
        let config = ExtractorConfig::default();
        let fields = vec![
            normalize(ScorerId::new("scorer1"), ScorerOutput::new(0.8).with_atom("urgent", 0.9), &config).unwrap(),
            normalize(ScorerId::new("scorer2"), ScorerOutput::new(0.8).with_atom("urgent", 0.85), &config).unwrap(),
        ];
        let nexuses = compose(&fields, &UniformCoupling(0.5), &ComposerConfig::default());
        assert_eq!(nexuses.len(), 1);

        // Whatever gate 3 says, the rejection (if any) must come from gate 3
        match gate().screen(&nexuses[0]) {
            Ok(_) => {}
            Err(rejected) => assert!(matches!(
                rejected.reason,
                RejectReason::Underconfident { .. } | RejectReason::Overconfident { .. }
            )),
        }
    }

    #[test]
    fn confidence_090_is_rejected_as_overconfident() {
        // Window pinned so 0.90 sits just above it; gates 1-2 pass
        let config = GateConfig {
            weights: GateWeights { agreement: 1.0, strength: 0.0, coupling: 0.0 },
            ..GateConfig::default()
        };
        let candidate = nexus("urgent", 2, 0.5, 0.90, 0.5);
        assert_eq!(config.confidence(&candidate), 0.90);

        let rejected = EmissionGate::new(config).screen(&candidate).unwrap_err();
        assert_eq!(
            rejected.reason,
            RejectReason::Overconfident { confidence: 0.90, ceiling: 0.85 }
        );
    }

    #[test]
    fn gates_reject_in_order() {
        let gate = gate();

        // Fails gate 1 and gate 2; gate 1 is reported
        let lonely = nexus("a", 1, 0.6, 0.1, 0.5);
        assert!(matches!(
            gate.screen(&lonely).unwrap_err().reason,
            RejectReason::TooFewParticipants { have: 1, need: 2 }
        ));

        let incoherent = nexus("b", 2, 0.6, 0.3, 0.5);
        assert!(matches!(
            gate.screen(&incoherent).unwrap_err().reason,
            RejectReason::Incoherent { .. }
        ));

        // 0.47·0.4 + 0.35·0.1 + 0.18·0.2 = 0.259
        let weak = nexus("c", 2, 0.1, 0.4, 0.2);
        assert!(matches!(
            gate.screen(&weak).unwrap_err().reason,
            RejectReason::Underconfident { .. }
        ));
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let config = GateConfig {
            weights: GateWeights { agreement: 1.0, strength: 0.0, coupling: 0.0 },
            ..GateConfig::default()
        };
        let gate = EmissionGate::new(config);
        assert!(gate.screen(&nexus("low", 2, 0.5, 0.45, 0.5)).is_ok());
        assert!(gate.screen(&nexus("high", 2, 0.5, 0.85, 0.5)).is_ok());
    }

    #[test]
    fn selects_highest_confidence_survivor() {
        let candidates = vec![
            nexus("strong", 2, 0.9, 0.5, 0.5),  // 0.235 + 0.315 + 0.09 = 0.640
            nexus("steady", 2, 0.5, 0.95, 0.5), // 0.4465 + 0.175 + 0.09 = 0.7115
            nexus("wobbly", 2, 0.7, 0.35, 0.5), // fails gate 2
        ];

        match gate().evaluate(&candidates) {
            GateOutcome::Emit(selected) => {
                assert_eq!(selected.nexus.atom, "steady");
                assert!((selected.confidence - 0.7115).abs() < 1e-9);
                assert!((selected.energy() - 0.2885).abs() < 1e-9);
            }
            other => panic!("expected emission, got {other:?}"),
        }
    }

    #[test]
    fn equal_energy_falls_back_to_rank() {
        let candidates = vec![nexus("zeal", 2, 0.5, 0.8, 0.5), nexus("awe", 2, 0.5, 0.8, 0.5)];
        match gate().evaluate(&candidates) {
            GateOutcome::Emit(selected) => assert_eq!(selected.nexus.atom, "awe"),
            other => panic!("expected emission, got {other:?}"),
        }
    }

    #[test]
    fn nothing_survives_reports_best_rejection() {
        let candidates = vec![
            nexus("overeager", 3, 1.5, 1.0, 1.0), // 1.0, above window
            nexus("timid", 2, 0.1, 0.45, 0.1),    // below window
        ];

        match gate().evaluate(&candidates) {
            GateOutcome::Withhold { best_rejected: Some(rejected) } => {
                assert_eq!(rejected.nexus.atom, "overeager");
                assert!(matches!(rejected.reason, RejectReason::Overconfident { .. }));
            }
            other => panic!("expected withhold, got {other:?}"),
        }
    }

    #[test]
    fn empty_input_withholds_without_diagnostic() {
        assert_eq!(gate().evaluate(&[]), GateOutcome::Withhold { best_rejected: None });
    }

    #[test]
    fn reject_reason_display() {
        let reason = RejectReason::TooFewParticipants { have: 1, need: 2 };
        assert_eq!(reason.to_string(), "1 participants, need 2");
    }
}
