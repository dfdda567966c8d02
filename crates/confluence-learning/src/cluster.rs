//! Incremental family clustering.
//!
//! # Adaptive threshold
//!
//! The similarity needed to join an existing family rises with the number of
//! families, so the store explores early and consolidates later:
//!
//! | Families | τ    |
//! |----------|------|
//! | < 8      | 0.55 |
//! | 8 – 24   | 0.65 |
//! | ≥ 25     | 0.75 |
//!
//! A signature joins its most similar family when `similarity ≥ τ`, otherwise
//! it founds a new one. Families never merge, split or disappear.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::family::{Family, FamilyId, Maturity};

/// Default centroid learning rate.
pub const DEFAULT_FAMILY_ALPHA: f64 = 0.2;

/// Tiered join thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FamilyThresholds {
    /// τ while the store is small
    pub exploration: f64,
    /// τ in the middle tier
    pub balance: f64,
    /// τ once the store is large
    pub consolidation: f64,
    /// Family count at which `balance` applies
    pub balance_from: usize,
    /// Family count at which `consolidation` applies
    pub consolidation_from: usize,
}

impl Default for FamilyThresholds {
    fn default() -> Self {
        Self {
            exploration: 0.55,
            balance: 0.65,
            consolidation: 0.75,
            balance_from: 8,
            consolidation_from: 25,
        }
    }
}

impl FamilyThresholds {
    /// Join threshold for a store currently holding `family_count` families.
    pub fn threshold_for(&self, family_count: usize) -> f64 {
        if family_count >= self.consolidation_from {
            self.consolidation
        } else if family_count >= self.balance_from {
            self.balance
        } else {
            self.exploration
        }
    }
}

/// Result of assigning one signature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assignment {
    pub family_id: FamilyId,
    /// Similarity to the nearest existing family (0.0 if there was none)
    pub similarity: f64,
    /// Threshold that was in force
    pub threshold: f64,
    /// Whether a new family was founded
    pub created: bool,
}

/// Family count per maturity tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Census {
    pub nascent: usize,
    pub developing: usize,
    pub mature: usize,
}

impl Census {
    pub fn total(&self) -> usize {
        self.nascent + self.developing + self.mature
    }
}

/// Append-biased clusterer over decision signatures.
#[derive(Debug, Clone)]
pub struct FamilyClusterer {
    families: BTreeMap<FamilyId, Family>,
    next_id: u64,
    thresholds: FamilyThresholds,
    alpha: f64,
}

impl FamilyClusterer {
    /// Empty clusterer.
    pub fn new(thresholds: FamilyThresholds, alpha: f64) -> Self {
        Self {
            families: BTreeMap::new(),
            next_id: 1,
            thresholds,
            alpha,
        }
    }

    /// Rebuild from persisted families. New ids continue after the highest one seen.
    pub fn from_families(
        families: impl IntoIterator<Item = Family>,
        thresholds: FamilyThresholds,
        alpha: f64,
    ) -> Self {
        let mut clusterer = Self::new(thresholds, alpha);
        for family in families {
            clusterer.next_id = clusterer.next_id.max(family.id.0.saturating_add(1));
            clusterer.families.insert(family.id, family);
        }
        clusterer
    }

    /// Most similar family and its similarity. Lower id wins ties.
    pub fn nearest(&self, signature: &[f64]) -> Option<(FamilyId, f64)> {
        let mut best: Option<(FamilyId, f64)> = None;
        for family in self.families.values() {
            let similarity = cosine_similarity(signature, &family.centroid);
            if best.map_or(true, |(_, s)| similarity > s) {
                best = Some((family.id, similarity));
            }
        }
        best
    }

    /// Join the nearest family if similar enough, otherwise found a new one.
    pub fn assign(&mut self, signature: &[f64], label: &str) -> Assignment {
        let threshold = self.thresholds.threshold_for(self.families.len());
        let nearest = self.nearest(signature);
        let similarity = nearest.map_or(0.0, |(_, s)| s);

        if let Some((id, similarity)) = nearest.filter(|(_, s)| *s >= threshold) {
            if let Some(family) = self.families.get_mut(&id) {
                family.absorb(signature, self.alpha);
                debug!(family = %id, similarity, threshold, members = family.member_count, "Joined family");
                return Assignment {
                    family_id: id,
                    similarity,
                    threshold,
                    created: false,
                };
            }
        }

        let id = FamilyId(self.next_id);
        self.next_id += 1;
        self.families.insert(id, Family::found(id, signature, label));
        debug!(family = %id, similarity, threshold, label, "Founded family");
        Assignment {
            family_id: id,
            similarity,
            threshold,
            created: true,
        }
    }

    pub fn get(&self, id: FamilyId) -> Option<&Family> {
        self.families.get(&id)
    }

    /// Families in id order.
    pub fn families(&self) -> impl Iterator<Item = &Family> {
        self.families.values()
    }

    /// Owned copy of every family, for persistence.
    pub fn snapshot(&self) -> Vec<Family> {
        self.families.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    pub fn thresholds(&self) -> &FamilyThresholds {
        &self.thresholds
    }

    /// Count families per maturity tier.
    pub fn census(&self) -> Census {
        let mut census = Census::default();
        for family in self.families.values() {
            match family.maturity() {
                Maturity::Nascent => census.nascent += 1,
                Maturity::Developing => census.developing += 1,
                Maturity::Mature => census.mature += 1,
            }
        }
        census
    }
}

/// Cosine similarity of two vectors.
///
/// Zero-length or zero-norm vectors, and vectors of different length, have
/// similarity 0.0.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() {
        warn!(left = a.len(), right = b.len(), "Signature length mismatch");
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
