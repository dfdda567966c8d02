//! Confluence Semantic Fields
//!
//! Several independent scorers each take a partial, noisy read on an input.
//! This crate turns those reads into something comparable and finds the
//! places where they agree.
//!
//! # Pipeline
//!
//! 1. A scorer returns a raw [`ScorerOutput`]: `{atom: score}` plus a coherence
//! 2. [`extract`] normalizes it into a [`SemanticField`] (clip to [0, 1],
//!    zero anything under the noise floor). Broken output becomes an empty field.
//! 3. [`compose`] scans all fields of a round for atoms that at least two
//!    scorers activate above threshold and emits ranked [`Nexus`] candidates.
//!
//! # Atoms
//!
//! An atom is a plain string. Scorers that share atom names can agree on them;
//! atoms no other scorer knows about can never form a nexus.

mod atom;
mod extract;
mod nexus;
mod compose;

pub use atom::{ScorerId, ScorerOutput};
pub use extract::{extract, normalize, ExtractorConfig, Malformed, SemanticField, DEFAULT_NOISE_FLOOR};
pub use nexus::{agreement, Nexus};
pub use compose::{
    compose, ComposerConfig, CouplingSource, UniformCoupling, DEFAULT_ACTIVATION_THRESHOLD,
    MIN_NEXUS_PARTICIPANTS,
};
