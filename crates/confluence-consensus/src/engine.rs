//! Engine orchestration: rounds, gate, decision, learning.

use std::collections::BTreeSet;
use std::sync::Arc;

use confluence_field::{compose, Nexus, ScorerId, SemanticField};
use confluence_store::Persistence;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::convergence::{ConvergenceController, Phase};
use crate::decision::{Decision, DecisionStatus};
use crate::error::{Error, Result};
use crate::gate::{EmissionGate, GateOutcome, GatedNexus, RejectedNexus};
use crate::learning::LearningState;
use crate::round::collect_fields;
use crate::scorer::Scorer;

/// Fewest scorers that can ever agree on anything.
pub const MIN_SCORERS: usize = 2;

/// Signature entries after the per-scorer activations.
const SIGNATURE_TAIL: usize = 3;

/// A configured set of scorers bound to shared learning state.
///
/// Cheap to share behind an `Arc`; every method takes `&self` and many
/// invocations may run at once.
pub struct Engine {
    config: EngineConfig,
    scorers: Vec<Arc<dyn Scorer>>,
    learning: Arc<LearningState>,
    gate: EmissionGate,
}

impl Engine {
    /// Validate `config`, check the scorer set and load learning state from `store`.
    pub fn new(
        config: EngineConfig,
        scorers: Vec<Arc<dyn Scorer>>,
        store: Arc<dyn Persistence>,
    ) -> Result<Self> {
        config.validate()?;
        let learning = Arc::new(LearningState::load(store, &config)?);
        Self::with_learning(config, scorers, learning)
    }

    /// Build an engine over learning state shared with other engines.
    pub fn with_learning(
        config: EngineConfig,
        scorers: Vec<Arc<dyn Scorer>>,
        learning: Arc<LearningState>,
    ) -> Result<Self> {
        config.validate()?;

        if scorers.len() < MIN_SCORERS {
            return Err(Error::TooFewScorers {
                have: scorers.len(),
                need: MIN_SCORERS,
            });
        }
        let mut seen = BTreeSet::new();
        for scorer in &scorers {
            if !seen.insert(scorer.id().clone()) {
                return Err(Error::DuplicateScorer(scorer.id().clone()));
            }
        }

        learning.bind_signature_len(scorers.len() + SIGNATURE_TAIL)?;

        info!(
            scorers = scorers.len(),
            max_rounds = config.max_rounds,
            "Convergence engine ready"
        );

        Ok(Self {
            gate: EmissionGate::new(config.gate()),
            config,
            scorers,
            learning,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn learning(&self) -> &Arc<LearningState> {
        &self.learning
    }

    /// Scorer ids in registration order.
    pub fn scorer_ids(&self) -> Vec<ScorerId> {
        self.scorers.iter().map(|s| s.id().clone()).collect()
    }

    /// Run one invocation to a decision.
    pub async fn converge(&self, input: &str) -> Result<Decision> {
        self.run(input, None).await
    }

    /// Run one invocation whose first round sees `prior`'s nexus as feedback.
    pub async fn converge_chained(&self, input: &str, prior: &Decision) -> Result<Decision> {
        self.run(input, prior.nexus.clone()).await
    }

    /// Run independent invocations concurrently. Results keep input order.
    pub async fn converge_batch(self: &Arc<Self>, inputs: Vec<String>) -> Vec<Result<Decision>> {
        let handles: Vec<_> = inputs
            .into_iter()
            .map(|input| {
                let engine = Arc::clone(self);
                tokio::spawn(async move { engine.converge(&input).await })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(match handle.await {
                Ok(result) => result,
                Err(error) => Err(Error::Join(error)),
            });
        }
        results
    }

    async fn run(&self, input: &str, seed: Option<Nexus>) -> Result<Decision> {
        let input: Arc<str> = Arc::from(input);
        let mut controller = ConvergenceController::new(self.config.controller());
        if let Some(prior) = seed {
            controller.seed(prior);
        }

        let mut last = GateOutcome::Withhold { best_rejected: None };
        while !controller.phase().is_terminal() {
            let context = Arc::new(controller.context());
            let fields = collect_fields(
                &self.scorers,
                Arc::clone(&input),
                Arc::clone(&context),
                self.config.extractor(),
                self.config.round_timeout(),
            )
            .await;

            let coherence = mean_coherence(&fields);
            let nexuses = {
                let matrix = self.learning.read_matrix().await;
                compose(&fields, &*matrix, &self.config.composer())
            };

            last = self.gate.evaluate(&nexuses);
            if let GateOutcome::Emit(candidate) = &last {
                controller.offer_snapshot(candidate.clone());
            }

            let phase = controller.observe(&nexuses, coherence);
            debug!(
                round = context.round,
                tension = controller.state().tension,
                nexuses = nexuses.len(),
                best = nexuses.first().map(|n| n.atom.as_str()),
                %phase,
                "Round complete"
            );
        }

        let phase = controller.phase();
        let state = controller.into_state();
        let round_count = state.round_number;

        let mut decision = match (phase, last) {
            (Phase::Converged, GateOutcome::Emit(selected)) => {
                emitted(selected, round_count, state.tension_history)
            }
            (Phase::Converged, GateOutcome::Withhold { best_rejected }) => {
                no_decision(best_rejected, round_count, state.tension_history)
            }
            (_, GateOutcome::Emit(selected)) => exhausted(
                selected,
                self.config.exhausted_confidence_factor,
                round_count,
                state.tension_history,
            ),
            // Nothing passed the gate in the final round; fall back to the
            // best earlier candidate, if any round produced one
            (_, GateOutcome::Withhold { best_rejected }) => match state.best_nexus_snapshot {
                Some(snapshot) => exhausted(
                    snapshot,
                    self.config.exhausted_confidence_factor,
                    round_count,
                    state.tension_history,
                ),
                None => no_decision(best_rejected, round_count, state.tension_history),
            },
        };

        let mut save_error = None;
        if let (DecisionStatus::Emitted, Some(nexus)) = (decision.status, &decision.nexus) {
            let commit = self
                .learning
                .commit(
                    &nexus.participants,
                    decision.confidence,
                    &self.signature(nexus),
                    &nexus.atom,
                )
                .await;
            decision.family = Some(commit.assignment.family_id);
            save_error = commit.save_error;
        }

        info!(
            status = %decision.status,
            atom = decision.nexus.as_ref().map(|n| n.atom.as_str()),
            confidence = decision.confidence,
            rounds = decision.round_count,
            family = decision.family.map(|f| f.0),
            "Decision reached"
        );
        match save_error {
            Some(source) => Err(Error::Unpersisted {
                decision: Box::new(decision),
                source,
            }),
            None => Ok(decision),
        }
    }

    /// Per-scorer activation on the atom in registration order, then
    /// agreement, bounded strength and coupling.
    pub fn signature(&self, nexus: &Nexus) -> Vec<f64> {
        let mut signature: Vec<f64> = self
            .scorers
            .iter()
            .map(|s| nexus.activations.get(s.id()).copied().unwrap_or(0.0))
            .collect();
        signature.extend([
            nexus.agreement,
            nexus.bounded_strength(),
            nexus.coupling_weight,
        ]);
        signature
    }
}

fn mean_coherence(fields: &[SemanticField]) -> f64 {
    if fields.is_empty() {
        return 0.0;
    }
    fields.iter().map(|f| f.coherence).sum::<f64>() / fields.len() as f64
}

fn emitted(selected: GatedNexus, round_count: u32, tension_history: Vec<f64>) -> Decision {
    Decision {
        status: DecisionStatus::Emitted,
        confidence: selected.confidence,
        nexus: Some(selected.nexus),
        round_count,
        tension_history,
        family: None,
        diagnostic: None,
    }
}

fn no_decision(
    best_rejected: Option<RejectedNexus>,
    round_count: u32,
    tension_history: Vec<f64>,
) -> Decision {
    if let Some(rejected) = &best_rejected {
        debug!(
            atom = %rejected.nexus.atom,
            confidence = rejected.confidence,
            reason = %rejected.reason,
            "No nexus passed the gate"
        );
    }
    Decision {
        status: DecisionStatus::NoDecision,
        nexus: None,
        confidence: 0.0,
        round_count,
        tension_history,
        family: None,
        diagnostic: best_rejected,
    }
}

fn exhausted(
    best: GatedNexus,
    factor: f64,
    round_count: u32,
    tension_history: Vec<f64>,
) -> Decision {
    Decision {
        status: DecisionStatus::Exhausted,
        confidence: best.confidence * factor,
        nexus: Some(best.nexus),
        round_count,
        tension_history,
        family: None,
        diagnostic: None,
    }
}
