//! One round of scorer calls.
//!
//! Scorers are independent within a round, so each runs on its own blocking
//! worker. The round waits for all of them or for its deadline, whichever
//! comes first. A scorer that errors, panics or misses the deadline yields
//! an empty field for this round only.

use std::sync::Arc;
use std::time::Duration;

use confluence_field::{extract, ExtractorConfig, SemanticField};
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::warn;

use crate::scorer::{RoundContext, Scorer};

/// Run every scorer for one round and return one field per scorer, in
/// registration order.
pub async fn collect_fields(
    scorers: &[Arc<dyn Scorer>],
    input: Arc<str>,
    context: Arc<RoundContext>,
    extractor: ExtractorConfig,
    budget: Duration,
) -> Vec<SemanticField> {
    let deadline = Instant::now() + budget;
    let mut tasks = JoinSet::new();

    for (slot, scorer) in scorers.iter().enumerate() {
        let scorer = Arc::clone(scorer);
        let input = Arc::clone(&input);
        let context = Arc::clone(&context);
        tasks.spawn_blocking(move || {
            let outcome = scorer.score(&input, &context);
            (slot, extract(scorer.id().clone(), outcome, &extractor))
        });
    }

    let mut collected: Vec<Option<SemanticField>> = vec![None; scorers.len()];
    loop {
        match timeout_at(deadline, tasks.join_next()).await {
            Ok(Some(Ok((slot, field)))) => collected[slot] = Some(field),
            Ok(Some(Err(error))) => {
                warn!(round = context.round, %error, "Scorer task aborted, using empty field");
            }
            Ok(None) => break,
            Err(_) => {
                warn!(
                    round = context.round,
                    pending = tasks.len(),
                    budget_ms = budget.as_millis() as u64,
                    "Round budget exceeded, using empty fields for pending scorers"
                );
                // Blocking workers cannot be interrupted; they finish detached
                tasks.detach_all();
                break;
            }
        }
    }

    scorers
        .iter()
        .zip(collected)
        .map(|(scorer, field)| field.unwrap_or_else(|| SemanticField::empty(scorer.id().clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorer::ScriptedScorer;
    use confluence_field::{ScorerId, ScorerOutput};

    struct Panicking(ScorerId);

    impl Scorer for Panicking {
        fn id(&self) -> &ScorerId {
            &self.0
        }

        fn score(&self, _input: &str, _context: &RoundContext) -> anyhow::Result<ScorerOutput> {
            panic!("scorer blew up");
        }
    }

    struct Sleepy(ScorerId, Duration);

    impl Scorer for Sleepy {
        fn id(&self) -> &ScorerId {
            &self.0
        }

        fn score(&self, _input: &str, _context: &RoundContext) -> anyhow::Result<ScorerOutput> {
            std::thread::sleep(self.1);
            Ok(ScorerOutput::new(0.9).with_atom("urgent", 0.9))
        }
    }

    fn steady(id: &str) -> Arc<dyn Scorer> {
        Arc::new(ScriptedScorer::constant(id, ScorerOutput::new(0.8).with_atom("urgent", 0.7)))
    }

    async fn run(scorers: &[Arc<dyn Scorer>], budget: Duration) -> Vec<SemanticField> {
        collect_fields(
            scorers,
            Arc::from("input"),
            Arc::new(RoundContext::default()),
            ExtractorConfig::default(),
            budget,
        )
        .await
    }

    #[tokio::test]
    async fn fields_follow_registration_order() {
        let scorers = vec![steady("c"), steady("a"), steady("b")];
        let fields = run(&scorers, Duration::from_secs(5)).await;
        let ids: Vec<&str> = fields.iter().map(|f| f.scorer.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
        assert!(fields.iter().all(|f| f.activation("urgent") == 0.7));
    }

    #[tokio::test]
    async fn panicking_scorer_yields_empty_field() {
        let scorers: Vec<Arc<dyn Scorer>> = vec![
            steady("a"),
            Arc::new(Panicking(ScorerId::new("b"))),
            steady("c"),
        ];
        let fields = run(&scorers, Duration::from_secs(5)).await;
        assert_eq!(fields.len(), 3);
        assert!(fields[1].is_empty());
        assert_eq!(fields[1].scorer, ScorerId::new("b"));
        assert_eq!(fields[1].coherence, 0.0);
        assert!(!fields[2].is_empty());
    }

    #[tokio::test]
    async fn slow_scorer_misses_the_deadline() {
        let scorers: Vec<Arc<dyn Scorer>> = vec![
            steady("a"),
            Arc::new(Sleepy(ScorerId::new("slow"), Duration::from_millis(400))),
            steady("c"),
        ];
        let fields = run(&scorers, Duration::from_millis(100)).await;
        assert!(!fields[0].is_empty());
        assert!(fields[1].is_empty());
        assert!(!fields[2].is_empty());
    }
}
