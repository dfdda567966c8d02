//! Convergence control: when have the scorers settled?
//!
//! # Tension
//!
//! After every round the controller reduces the round to one scalar, the
//! unresolved tension in [0, 1]:
//!
//! ```text
//! tension = w1·(1 − best_agreement)
//!         + w2·|Δtension_prev|
//!         + w3·(1 − mean_coherence)
//!         + w4·(1 − best_strength)
//! ```
//!
//! `best_*` come from the top-ranked nexus (0 when no nexus formed) and
//! `Δtension_prev` is the movement between the two previous rounds.
//!
//! # Quiet moment
//!
//! The loop converges when tension sits inside the target band (neither
//! still urgent nor suspiciously perfect) and moved less than
//! `descent_epsilon` since the previous round, for `quiet_rounds`
//! consecutive rounds. It is exhausted after `max_rounds` rounds otherwise.
//! Either way it never runs more than `max_rounds` rounds.
//!
//! ```text
//! Running ──quiet moment──▶ Converged
//!    │
//!    └──round == max_rounds──▶ Exhausted
//! ```

use std::fmt;

use confluence_field::Nexus;
use serde::{Deserialize, Serialize};

use crate::gate::GatedNexus;
use crate::scorer::RoundContext;

/// Tension at invocation start.
pub const INITIAL_TENSION: f64 = 1.0;

/// Controller phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Running,
    Converged,
    Exhausted,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Phase::Running)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Running => write!(f, "Running"),
            Phase::Converged => write!(f, "Converged"),
            Phase::Exhausted => write!(f, "Exhausted"),
        }
    }
}

/// Weights of the four tension terms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TensionWeights {
    /// w1, disagreement of the best nexus
    pub agreement: f64,
    /// w2, movement of tension between the previous two rounds
    pub drift: f64,
    /// w3, mean scorer incoherence
    pub coherence: f64,
    /// w4, weakness of the best nexus
    pub strength: f64,
}

impl Default for TensionWeights {
    fn default() -> Self {
        Self {
            agreement: 0.25,
            drift: 0.25,
            coherence: 0.25,
            strength: 0.25,
        }
    }
}

impl TensionWeights {
    pub fn sum(&self) -> f64 {
        self.agreement + self.drift + self.coherence + self.strength
    }
}

/// Controller parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerConfig {
    pub max_rounds: u32,
    /// Inclusive `(low, high)` band tension must settle in
    pub tension_band: (f64, f64),
    pub descent_epsilon: f64,
    /// Consecutive quiet rounds needed to converge
    pub quiet_rounds: u32,
    pub weights: TensionWeights,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_rounds: 4,
            tension_band: (0.30, 0.50),
            descent_epsilon: 0.05,
            quiet_rounds: 1,
            weights: TensionWeights::default(),
        }
    }
}

/// Compute one round's tension, clamped to [0, 1].
pub fn compute_tension(
    weights: &TensionWeights,
    best: Option<&Nexus>,
    previous_drift: f64,
    mean_coherence: f64,
) -> f64 {
    let (agreement, strength) = best.map_or((0.0, 0.0), |n| (n.agreement, n.bounded_strength()));
    let tension = weights.agreement * (1.0 - agreement)
        + weights.drift * previous_drift.abs()
        + weights.coherence * (1.0 - mean_coherence.clamp(0.0, 1.0))
        + weights.strength * (1.0 - strength);
    tension.clamp(0.0, 1.0)
}

/// State carried across the rounds of one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvergenceState {
    /// Current round, 1-based. Equals the number of rounds run once terminal.
    pub round_number: u32,
    /// Tension after the latest round
    pub tension: f64,
    /// Tension after the round before that
    pub previous_tension: f64,
    /// One entry per completed round, append-only
    pub tension_history: Vec<f64>,
    /// Best gate-passing candidate seen in any round
    pub best_nexus_snapshot: Option<GatedNexus>,
    quiet_streak: u32,
}

impl Default for ConvergenceState {
    fn default() -> Self {
        Self {
            round_number: 1,
            tension: INITIAL_TENSION,
            previous_tension: INITIAL_TENSION,
            tension_history: Vec::new(),
            best_nexus_snapshot: None,
            quiet_streak: 0,
        }
    }
}

impl ConvergenceState {
    /// Rounds completed so far.
    pub fn rounds_completed(&self) -> u32 {
        self.tension_history.len() as u32
    }
}

/// Drives the Running → Converged | Exhausted state machine.
#[derive(Debug, Clone)]
pub struct ConvergenceController {
    config: ControllerConfig,
    state: ConvergenceState,
    phase: Phase,
    prior_best: Option<Nexus>,
    focus_atoms: Vec<String>,
}

impl ConvergenceController {
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            config,
            state: ConvergenceState::default(),
            phase: Phase::Running,
            prior_best: None,
            focus_atoms: Vec::new(),
        }
    }

    /// Seed round 1 with a nexus from an earlier, chained invocation.
    pub fn seed(&mut self, prior: Nexus) {
        self.focus_atoms = vec![prior.atom.clone()];
        self.prior_best = Some(prior);
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> &ConvergenceState {
        &self.state
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Immutable feedback for the round about to run.
    pub fn context(&self) -> RoundContext {
        RoundContext {
            round: self.state.round_number,
            tension: self.state.tension,
            prior_best: self.prior_best.clone(),
            focus_atoms: self.focus_atoms.clone(),
        }
    }

    /// Record a gate-passing candidate; keeps whichever has higher confidence.
    /// Earlier rounds win ties.
    pub fn offer_snapshot(&mut self, candidate: GatedNexus) {
        let better = match &self.state.best_nexus_snapshot {
            Some(current) => candidate.confidence > current.confidence,
            None => true,
        };
        if better {
            self.state.best_nexus_snapshot = Some(candidate);
        }
    }

    /// Fold in one completed round and advance the state machine.
    ///
    /// `nexuses` must be ranked best first. Calling this once terminal is a
    /// no-op that returns the terminal phase.
    pub fn observe(&mut self, nexuses: &[Nexus], mean_coherence: f64) -> Phase {
        if self.phase.is_terminal() {
            return self.phase;
        }

        let drift = self.state.tension - self.state.previous_tension;
        let tension = compute_tension(&self.config.weights, nexuses.first(), drift, mean_coherence);
        let step = (tension - self.state.tension).abs();

        self.state.previous_tension = self.state.tension;
        self.state.tension = tension;
        self.state.tension_history.push(tension);

        let (low, high) = self.config.tension_band;
        let in_band = (low..=high).contains(&tension);
        if in_band && step < self.config.descent_epsilon {
            self.state.quiet_streak += 1;
        } else {
            self.state.quiet_streak = 0;
        }

        self.prior_best = nexuses.first().cloned();
        self.focus_atoms = nexuses.iter().map(|n| n.atom.clone()).collect();

        if self.state.quiet_streak >= self.config.quiet_rounds.max(1) {
            self.phase = Phase::Converged;
        } else if self.state.round_number >= self.config.max_rounds {
            self.phase = Phase::Exhausted;
        } else {
            self.state.round_number += 1;
        }
        self.phase
    }

    pub fn into_state(self) -> ConvergenceState {
        self.state
    }
}
