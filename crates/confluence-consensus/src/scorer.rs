//! The pluggable scorer contract.

use anyhow::anyhow;
use confluence_field::{Nexus, ScorerId, ScorerOutput};
use serde::{Deserialize, Serialize};

/// Feedback handed to every scorer call of one round.
///
/// Built fresh by the controller before each round and never mutated while
/// the round runs.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundContext {
    /// 1-based round number
    pub round: u32,
    /// Tension after the previous round (1.0 before round 1)
    pub tension: f64,
    /// Top-ranked nexus of the previous round, or a chained prior decision
    pub prior_best: Option<Nexus>,
    /// Atoms of every nexus the previous round formed, best first
    pub focus_atoms: Vec<String>,
}

impl Default for RoundContext {
    fn default() -> Self {
        Self {
            round: 1,
            tension: 1.0,
            prior_best: None,
            focus_atoms: Vec::new(),
        }
    }
}

impl RoundContext {
    pub fn is_first_round(&self) -> bool {
        self.round == 1
    }
}

/// A scoring module taking a partial read on the input.
///
/// Called once per round, possibly concurrently with other scorers and from
/// a blocking worker thread. Errors are absorbed as an empty field.
pub trait Scorer: Send + Sync {
    /// Stable identifier, unique within one engine.
    fn id(&self) -> &ScorerId;

    /// Score the input given the feedback from previous rounds.
    fn score(&self, input: &str, context: &RoundContext) -> anyhow::Result<ScorerOutput>;
}

/// One recorded round of a [`ScriptedScorer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScriptedRound {
    /// The scorer fails this round
    Failure { error: String },
    /// The scorer returns this output
    Output(ScorerOutput),
}

/// Replays pre-recorded outputs round by round, ignoring the input.
///
/// Rounds past the end of the script repeat the last entry; an empty script
/// always returns an empty output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedScorer {
    pub id: ScorerId,
    pub rounds: Vec<ScriptedRound>,
}

impl ScriptedScorer {
    pub fn new(id: impl Into<ScorerId>, rounds: Vec<ScriptedRound>) -> Self {
        Self {
            id: id.into(),
            rounds,
        }
    }

    /// Same output every round.
    pub fn constant(id: impl Into<ScorerId>, output: ScorerOutput) -> Self {
        Self::new(id, vec![ScriptedRound::Output(output)])
    }

    fn entry(&self, round: u32) -> Option<&ScriptedRound> {
        let index = (round.max(1) - 1) as usize;
        self.rounds.get(index).or_else(|| self.rounds.last())
    }
}

impl Scorer for ScriptedScorer {
    fn id(&self) -> &ScorerId {
        &self.id
    }

    fn score(&self, _input: &str, context: &RoundContext) -> anyhow::Result<ScorerOutput> {
        match self.entry(context.round) {
            Some(ScriptedRound::Output(output)) => Ok(output.clone()),
            Some(ScriptedRound::Failure { error }) => Err(anyhow!("{error}")),
            None => Ok(ScorerOutput::empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn at(round: u32) -> RoundContext {
        RoundContext {
            round,
            ..RoundContext::default()
        }
    }

    #[test]
    fn default_context_is_round_one() {
        let context = RoundContext::default();
        assert!(context.is_first_round());
        assert_eq!(context.tension, 1.0);
        assert!(context.prior_best.is_none());
    }

    #[test]
    fn scripted_rounds_replay_and_repeat_last() {
        let scorer = ScriptedScorer::new(
            "lexicon",
            vec![
                ScriptedRound::Output(ScorerOutput::new(0.5).with_atom("calm", 0.4)),
                ScriptedRound::Failure { error: "lexicon timeout".into() },
                ScriptedRound::Output(ScorerOutput::new(0.7).with_atom("calm", 0.6)),
            ],
        );

        assert_eq!(scorer.score("", &at(1)).unwrap().atoms["calm"], 0.4);
        let err = scorer.score("", &at(2)).unwrap_err();
        assert_eq!(err.to_string(), "lexicon timeout");
        assert_eq!(scorer.score("", &at(3)).unwrap().atoms["calm"], 0.6);
        assert_eq!(scorer.score("", &at(9)).unwrap().atoms["calm"], 0.6);
    }

    #[test]
    fn empty_script_is_silent() {
        let scorer = ScriptedScorer::new("quiet", Vec::new());
        assert_eq!(scorer.score("", &at(1)).unwrap(), ScorerOutput::empty());
    }

    #[test]
    fn scripted_scorer_from_json() {
        let json = r#"{
            "id": "prosody",
            "rounds": [
                {"atoms": {"urgent": 0.8}, "coherence": 0.6},
                {"error": "mic dropped"}
            ]
        }"#;
        let scorer: ScriptedScorer = serde_json::from_str(json).unwrap();
        assert_eq!(scorer.id(), &ScorerId::new("prosody"));
        assert!(matches!(scorer.rounds[0], ScriptedRound::Output(_)));
        assert!(matches!(scorer.rounds[1], ScriptedRound::Failure { .. }));
    }

    #[test]
    fn shared_scorer_delegates() {
        let scorer: Arc<dyn Scorer> =
            Arc::new(ScriptedScorer::constant("somatic", ScorerOutput::new(0.3)));
        let shared = Arc::clone(&scorer);
        assert_eq!(shared.id().as_str(), "somatic");
        assert_eq!(shared.score("", &at(1)).unwrap().coherence, 0.3);
    }
}
