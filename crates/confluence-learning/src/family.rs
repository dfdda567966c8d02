//! Decision families.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ema;

/// Integer identifier of a family. Assigned in creation order, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FamilyId(pub u64);

impl fmt::Display for FamilyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "family-{}", self.0)
    }
}

/// Maturity tier derived from member count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Maturity {
    /// Fewer than 3 members
    Nascent,
    /// 3 to 9 members
    Developing,
    /// 10 or more members
    Mature,
}

impl Maturity {
    pub const fn from_members(member_count: u64) -> Self {
        match member_count {
            0..=2 => Maturity::Nascent,
            3..=9 => Maturity::Developing,
            _ => Maturity::Mature,
        }
    }
}

impl fmt::Display for Maturity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Maturity::Nascent => write!(f, "nascent"),
            Maturity::Developing => write!(f, "developing"),
            Maturity::Mature => write!(f, "mature"),
        }
    }
}

/// A persistent cluster of similar committed decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Family {
    pub id: FamilyId,
    /// Running EMA of member signatures
    pub centroid: Vec<f64>,
    pub member_count: u64,
    /// Atom of the decision that founded the family
    pub label: String,
}

impl Family {
    /// Found a family from its first member.
    pub fn found(id: FamilyId, signature: &[f64], label: impl Into<String>) -> Self {
        Self {
            id,
            centroid: signature.to_vec(),
            member_count: 1,
            label: label.into(),
        }
    }

    pub fn maturity(&self) -> Maturity {
        Maturity::from_members(self.member_count)
    }

    /// Take in a new member: move the centroid toward it and count it.
    pub(crate) fn absorb(&mut self, signature: &[f64], alpha: f64) {
        for (c, s) in self.centroid.iter_mut().zip(signature) {
            *c = ema(*c, *s, alpha);
        }
        self.member_count = self.member_count.saturating_add(1);
    }
}
