//! Unordered scorer pairs.

use std::collections::BTreeSet;

use confluence_field::ScorerId;
use serde::{Deserialize, Serialize};

/// An unordered pair of distinct scorers, stored sorted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScorerPair {
    low: ScorerId,
    high: ScorerId,
}

impl ScorerPair {
    /// Build a pair in canonical order. Returns `None` for a scorer paired with itself.
    pub fn new(a: ScorerId, b: ScorerId) -> Option<Self> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(Self { low: a, high: b }),
            std::cmp::Ordering::Greater => Some(Self { low: b, high: a }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn low(&self) -> &ScorerId {
        &self.low
    }

    pub fn high(&self) -> &ScorerId {
        &self.high
    }

    /// Every unordered pair within a participant set, in sorted order.
    pub fn within(participants: &BTreeSet<ScorerId>) -> Vec<ScorerPair> {
        let members: Vec<&ScorerId> = participants.iter().collect();
        let mut pairs = Vec::with_capacity(members.len() * members.len().saturating_sub(1) / 2);
        for (i, a) in members.iter().enumerate() {
            for b in &members[i + 1..] {
                pairs.push(Self {
                    low: (*a).clone(),
                    high: (*b).clone(),
                });
            }
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ScorerId {
        ScorerId::new(s)
    }

    #[test]
    fn canonical_order() {
        let ab = ScorerPair::new(id("a"), id("b")).unwrap();
        let ba = ScorerPair::new(id("b"), id("a")).unwrap();
        assert_eq!(ab, ba);
        assert_eq!(ab.low(), &id("a"));
        assert_eq!(ab.high(), &id("b"));
    }

    #[test]
    fn self_pair_rejected() {
        assert!(ScorerPair::new(id("a"), id("a")).is_none());
    }

    #[test]
    fn pairs_within_set() {
        let set: BTreeSet<ScorerId> = ["c", "a", "b"].into_iter().map(id).collect();
        let pairs = ScorerPair::within(&set);
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0], ScorerPair::new(id("a"), id("b")).unwrap());
        assert_eq!(pairs[1], ScorerPair::new(id("a"), id("c")).unwrap());
        assert_eq!(pairs[2], ScorerPair::new(id("b"), id("c")).unwrap());

        let single: BTreeSet<ScorerId> = [id("a")].into_iter().collect();
        assert!(ScorerPair::within(&single).is_empty());
    }
}
