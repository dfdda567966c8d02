//! Learning state shared by every invocation of one engine.
//!
//! The matrix is read-mostly: every round of every in-flight invocation takes
//! a read guard to compose, and only an emitted decision takes the write
//! guard. Family assignment is serialized through a mutex. Each update is
//! written through to the store while its guard is still held, so the store
//! never sees updates out of order. Saves run on the blocking pool.

use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};

use confluence_field::ScorerId;
use confluence_learning::{Assignment, Census, CoactivationMatrix, Family, FamilyClusterer};
use confluence_store::{Persistence, StoreError};
use tokio::sync::{Mutex, RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{Error, Result};

/// What committing one emitted decision changed.
#[derive(Debug)]
pub struct Commit {
    /// Matrix pairs reinforced
    pub pairs: usize,
    pub assignment: Assignment,
    /// First save that failed. Both in-memory updates are applied regardless.
    pub save_error: Option<StoreError>,
}

pub struct LearningState {
    store: Arc<dyn Persistence>,
    matrix: RwLock<CoactivationMatrix>,
    families: Mutex<FamilyClusterer>,
    coactivation_alpha: f64,
    signature_len: OnceLock<usize>,
}

impl LearningState {
    /// Load matrix and families from `store`.
    ///
    /// The configured `coactivation_default` replaces whatever default the
    /// store held, so unseen pairs always read the current setting.
    pub fn load(store: Arc<dyn Persistence>, config: &EngineConfig) -> Result<Self> {
        let mut matrix = store.load_matrix()?;
        matrix.set_default_weight(config.coactivation_default);
        let families = FamilyClusterer::from_families(
            store.load_families()?,
            config.family_thresholds,
            config.ema_alpha_family,
        );

        let signature_len = OnceLock::new();
        if let Some(family) = families.families().next() {
            let _ = signature_len.set(family.centroid.len());
        }

        info!(
            pairs = matrix.len(),
            families = families.len(),
            signature_len = signature_len.get().copied(),
            "Loaded learning state"
        );

        Ok(Self {
            store,
            matrix: RwLock::new(matrix),
            families: Mutex::new(families),
            coactivation_alpha: config.ema_alpha_coactivation,
            signature_len,
        })
    }

    /// Fix the width of family signatures, or check it against the width
    /// already fixed by stored families or an earlier engine.
    pub fn bind_signature_len(&self, len: usize) -> Result<()> {
        let expected = *self.signature_len.get_or_init(|| len);
        if expected != len {
            return Err(Error::SignatureMismatch { expected, got: len });
        }
        Ok(())
    }

    /// Signature width, once an engine or the store has fixed it.
    pub fn signature_len(&self) -> Option<usize> {
        self.signature_len.get().copied()
    }

    /// Shared read access for composing a round.
    pub async fn read_matrix(&self) -> RwLockReadGuard<'_, CoactivationMatrix> {
        self.matrix.read().await
    }

    /// Copy of the current matrix.
    pub async fn matrix_snapshot(&self) -> CoactivationMatrix {
        self.matrix.read().await.clone()
    }

    /// Learn from one emitted decision: reinforce the participants' pairs
    /// toward `confidence`, then assign `signature` to a family.
    ///
    /// Both steps always run. A failed save does not stop the other step.
    pub async fn commit(
        &self,
        participants: &BTreeSet<ScorerId>,
        confidence: f64,
        signature: &[f64],
        label: &str,
    ) -> Commit {
        let (pairs, matrix_saved) = self.reinforce(participants, confidence).await;
        let (assignment, families_saved) = self.assign_family(signature, label).await;

        let save_error = matrix_saved.err().or(families_saved.err());
        if let Some(error) = &save_error {
            warn!(%error, "Learning update applied in memory but not persisted");
        }
        Commit {
            pairs,
            assignment,
            save_error,
        }
    }

    async fn reinforce(
        &self,
        participants: &BTreeSet<ScorerId>,
        confidence: f64,
    ) -> (usize, confluence_store::Result<()>) {
        let mut matrix = self.matrix.write().await;
        let pairs = matrix.update(participants, confidence, self.coactivation_alpha);
        debug!(pairs, confidence, "Updated co-activation matrix");

        let snapshot = matrix.clone();
        let saved = self.persist(move |store| store.save_matrix(&snapshot)).await;
        (pairs, saved)
    }

    async fn assign_family(
        &self,
        signature: &[f64],
        label: &str,
    ) -> (Assignment, confluence_store::Result<()>) {
        let mut families = self.families.lock().await;
        let assignment = families.assign(signature, label);
        if assignment.created {
            info!(family = %assignment.family_id, label, "New decision family");
        }

        let snapshot = families.snapshot();
        let saved = self.persist(move |store| store.save_families(&snapshot)).await;
        (assignment, saved)
    }

    async fn persist<F>(&self, save: F) -> confluence_store::Result<()>
    where
        F: FnOnce(&dyn Persistence) -> confluence_store::Result<()> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        match tokio::task::spawn_blocking(move || save(store.as_ref())).await {
            Ok(saved) => saved,
            Err(e) => Err(StoreError::Unavailable(format!("save task failed: {e}"))),
        }
    }

    /// Copy of every family, ordered by id.
    pub async fn families(&self) -> Vec<Family> {
        self.families.lock().await.snapshot()
    }

    pub async fn census(&self) -> Census {
        self.families.lock().await.census()
    }
}
