//! The outcome of one convergence invocation.

use std::fmt;

use confluence_field::Nexus;
use confluence_learning::FamilyId;
use serde::{Deserialize, Serialize};

use crate::gate::RejectedNexus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionStatus {
    /// Converged and a nexus passed all four gates
    Emitted,
    /// Nothing passed the gate, either at convergence or in any round
    NoDecision,
    /// Ran out of rounds; carries the best gate-passing candidate, discounted
    Exhausted,
}

impl fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionStatus::Emitted => write!(f, "EMITTED"),
            DecisionStatus::NoDecision => write!(f, "NO_DECISION"),
            DecisionStatus::Exhausted => write!(f, "EXHAUSTED"),
        }
    }
}

/// What an invocation produced.
///
/// `nexus` is `Some` for every `Emitted` and `Exhausted` decision, and
/// `confidence` is 0 for `NoDecision`.
/// `diagnostic` is only set on `NoDecision` and names the strongest
/// rejected candidate of the final round, if there was one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub status: DecisionStatus,
    pub nexus: Option<Nexus>,
    pub confidence: f64,
    pub round_count: u32,
    pub tension_history: Vec<f64>,
    pub family: Option<FamilyId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<RejectedNexus>,
}

impl Decision {
    pub fn is_emitted(&self) -> bool {
        self.status == DecisionStatus::Emitted
    }

    /// The emitted nexus, or `None` for any other status.
    pub fn emitted_nexus(&self) -> Option<&Nexus> {
        if self.is_emitted() {
            self.nexus.as_ref()
        } else {
            None
        }
    }

    /// Tension after the last round.
    pub fn final_tension(&self) -> Option<f64> {
        self.tension_history.last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_in_upper_case() {
        assert_eq!(
            serde_json::to_string(&DecisionStatus::NoDecision).unwrap(),
            "\"NO_DECISION\""
        );
        assert_eq!(DecisionStatus::Exhausted.to_string(), "EXHAUSTED");
    }

    #[test]
    fn only_emitted_exposes_nexus() {
        let decision = Decision {
            status: DecisionStatus::NoDecision,
            nexus: None,
            confidence: 0.0,
            round_count: 4,
            tension_history: vec![0.9, 0.8, 0.7, 0.6],
            family: None,
            diagnostic: None,
        };
        assert!(!decision.is_emitted());
        assert!(decision.emitted_nexus().is_none());
        assert_eq!(decision.final_tension(), Some(0.6));

        let json = serde_json::to_value(&decision).unwrap();
        assert!(json.get("diagnostic").is_none());
        assert_eq!(json["status"], "NO_DECISION");
    }
}
