//! Error types for confluence-consensus.
//!
//! Only initialization and storage problems are errors. Scorer failures are
//! absorbed per round, and `NO_DECISION` / `EXHAUSTED` are ordinary outcomes.

use confluence_field::ScorerId;
use confluence_store::StoreError;
use thiserror::Error;

use crate::decision::Decision;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur building or running an engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The learning store could not be loaded or saved.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A decision was reached and learned from in memory, but saving the
    /// learning state failed. The decision is still usable.
    #[error("decision reached but learning state not saved: {source}")]
    Unpersisted {
        decision: Box<Decision>,
        #[source]
        source: StoreError,
    },

    /// The engine's decision signatures do not match the width of the
    /// families already held by its learning state.
    #[error("learning state holds {expected}-wide family signatures, engine produces {got}")]
    SignatureMismatch { expected: usize, got: usize },

    /// Two scorers share an id.
    #[error("duplicate scorer id: {0}")]
    DuplicateScorer(ScorerId),

    /// Cross-scorer agreement needs at least two scorers.
    #[error("need at least {need} scorers, got {have}")]
    TooFewScorers { have: usize, need: usize },

    /// Reading a configuration file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration document could not be parsed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A batch invocation task panicked or was cancelled.
    #[error("invocation task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    /// The decision carried by an [`Error::Unpersisted`].
    pub fn decision(&self) -> Option<&Decision> {
        match self {
            Error::Unpersisted { decision, .. } => Some(decision.as_ref()),
            _ => None,
        }
    }
}
