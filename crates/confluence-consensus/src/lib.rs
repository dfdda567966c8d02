//! Confluence Consensus
//!
//! Drives a set of independent scorers to a single, gated decision.
//!
//! # Invocation
//!
//! ```text
//! ┌──────────── round r ────────────┐
//! │ scorers (parallel, time-bounded)│
//! │   → semantic fields             │
//! │   → nexus candidates            │──► tension ──► CONVERGED / EXHAUSTED?
//! │   → emission gate               │                   │ no: round r+1 with
//! └─────────────────────────────────┘                   │ feedback context
//!                                                       ▼
//!                                                   Decision
//! ```
//!
//! Rounds are strictly sequential; scorers within a round are not. A round
//! that overruns its budget keeps whatever fields arrived in time.
//!
//! # Outcomes
//!
//! - `EMITTED`: converged and a nexus passed all four gates. Only these
//!   decisions update the co-activation matrix and the family store.
//! - `NO_DECISION`: converged but nothing passed. Carries the strongest
//!   rejected candidate as a diagnostic.
//! - `EXHAUSTED`: `max_rounds` ran out. Carries the best gate-passing
//!   candidate seen, with discounted confidence. If no round ever had one,
//!   the outcome is `NO_DECISION` with the final round's diagnostic.
//!
//! None of these are errors. [`Error`] is reserved for configuration and
//! storage problems. A decision whose learning could not be saved comes
//! back inside [`Error::Unpersisted`].

pub mod config;
pub mod error;
mod scorer;
mod round;
mod gate;
mod convergence;
mod learning;
mod decision;
mod engine;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use scorer::{RoundContext, Scorer, ScriptedRound, ScriptedScorer};
pub use round::collect_fields;
pub use gate::{
    select_minimum_energy, Admitted, EmissionGate, GateConfig, GateOutcome, GateWeights,
    GatedNexus, RejectReason, RejectedNexus,
};
pub use convergence::{
    compute_tension, ControllerConfig, ConvergenceController, ConvergenceState, Phase,
    TensionWeights, INITIAL_TENSION,
};
pub use learning::{Commit, LearningState};
pub use decision::{Decision, DecisionStatus};
pub use engine::{Engine, MIN_SCORERS};
