//! Shared fixtures for the end-to-end scenarios in `tests/`.

use std::sync::{Arc, Mutex, PoisonError};

use confluence_consensus::{Engine, EngineConfig, RoundContext, Scorer, ScriptedScorer};
use confluence_field::{ScorerId, ScorerOutput};
use confluence_learning::{CoactivationMatrix, Family, FamilyId};
use confluence_store::{MemoryStore, Persistence, StoreError};

/// A scorer that returns the same atoms every round.
pub fn steady(id: &str, coherence: f64, atoms: &[(&str, f64)]) -> Arc<dyn Scorer> {
    let output = atoms
        .iter()
        .fold(ScorerOutput::new(coherence), |out, (atom, value)| out.with_atom(*atom, *value));
    Arc::new(ScriptedScorer::constant(id, output))
}

/// Two scorers that agree on `urgent` and settle into the tension band on
/// round 4 under the default configuration.
pub fn settling_pair() -> Vec<Arc<dyn Scorer>> {
    vec![
        steady("lexicon", 0.4, &[("urgent", 0.6)]),
        steady("prosody", 0.4, &[("urgent", 0.5)]),
    ]
}

/// Engine over a fresh in-memory store.
pub fn engine_with(
    config: EngineConfig,
    scorers: Vec<Arc<dyn Scorer>>,
) -> (Engine, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    // Fixtures only build engines from valid inputs
    let engine = match Engine::new(config, scorers, store.clone()) {
        Ok(engine) => engine,
        Err(e) => panic!("fixture engine failed to build: {e}"),
    };
    (engine, store)
}

/// In-memory store whose matrix saves always fail.
#[derive(Default)]
pub struct ReadOnlyMatrixStore {
    inner: MemoryStore,
}

impl Persistence for ReadOnlyMatrixStore {
    fn load_matrix(&self) -> confluence_store::Result<CoactivationMatrix> {
        self.inner.load_matrix()
    }

    fn save_matrix(&self, _matrix: &CoactivationMatrix) -> confluence_store::Result<()> {
        Err(StoreError::Unavailable("matrix volume is read-only".into()))
    }

    fn load_families(&self) -> confluence_store::Result<Vec<Family>> {
        self.inner.load_families()
    }

    fn save_families(&self, families: &[Family]) -> confluence_store::Result<()> {
        self.inner.save_families(families)
    }
}

/// Activates the input text itself as an atom.
pub struct KeywordScorer {
    id: ScorerId,
    activation: f64,
    coherence: f64,
}

impl KeywordScorer {
    pub fn new(id: &str, activation: f64, coherence: f64) -> Self {
        Self {
            id: ScorerId::new(id),
            activation,
            coherence,
        }
    }
}

impl Scorer for KeywordScorer {
    fn id(&self) -> &ScorerId {
        &self.id
    }

    fn score(&self, input: &str, _context: &RoundContext) -> anyhow::Result<ScorerOutput> {
        Ok(ScorerOutput::new(self.coherence).with_atom(input, self.activation))
    }
}

/// Wraps another scorer and records every context it is called with.
pub struct RecordingScorer {
    inner: Arc<dyn Scorer>,
    seen: Mutex<Vec<RoundContext>>,
}

impl RecordingScorer {
    pub fn new(inner: Arc<dyn Scorer>) -> Self {
        Self {
            inner,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn contexts(&self) -> Vec<RoundContext> {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Scorer for RecordingScorer {
    fn id(&self) -> &ScorerId {
        self.inner.id()
    }

    fn score(&self, input: &str, context: &RoundContext) -> anyhow::Result<ScorerOutput> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(context.clone());
        self.inner.score(input, context)
    }
}

/// Unit vector `i` in `dim` dimensions.
pub fn basis(dim: usize, i: usize) -> Vec<f64> {
    let mut v = vec![0.0; dim];
    v[i] = 1.0;
    v
}

/// `count` mutually orthogonal families over the first basis vectors.
pub fn orthogonal_families(dim: usize, count: usize) -> Vec<Family> {
    (0..count)
        .map(|i| Family::found(FamilyId(i as u64 + 1), &basis(dim, i), format!("atom-{i}")))
        .collect()
}
