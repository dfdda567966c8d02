//! Confluence Learning State
//!
//! The only state that outlives a single convergence invocation:
//!
//! - **Co-activation matrix**: a learned affinity per unordered scorer pair.
//!   Unseen pairs read as a neutral default (0.5), never 0, so no pair is
//!   silenced forever. Keys are only ever added.
//! - **Families**: clusters of committed decisions, grown incrementally by
//!   cosine similarity against running-mean centroids. Families are never
//!   merged, split or deleted.
//!
//! Both learn by scalar exponential smoothing only:
//!
//! ```text
//! value ← (1 − α)·value + α·observation
//! ```

mod pair;
mod matrix;
mod family;
mod cluster;

pub use pair::ScorerPair;
pub use matrix::{CoactivationMatrix, DEFAULT_COACTIVATION_ALPHA, DEFAULT_COUPLING};
pub use family::{Family, FamilyId, Maturity};
pub use cluster::{
    cosine_similarity, Assignment, Census, FamilyClusterer, FamilyThresholds, DEFAULT_FAMILY_ALPHA,
};

/// One exponential-moving-average step.
pub fn ema(current: f64, observation: f64, alpha: f64) -> f64 {
    (1.0 - alpha) * current + alpha * observation
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_moves_toward_observation() {
        assert_eq!(ema(0.5, 0.5, 0.15), 0.5);
        assert!((ema(0.5, 1.0, 0.15) - 0.575).abs() < 1e-12);
        assert!((ema(0.5, 0.0, 0.15) - 0.425).abs() < 1e-12);
        assert_eq!(ema(0.2, 0.9, 1.0), 0.9);
    }
}
