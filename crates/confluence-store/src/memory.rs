//! In-memory store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use confluence_learning::{CoactivationMatrix, Family};

use crate::error::Result;
use crate::Persistence;

/// Process-local store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    matrix: Mutex<CoactivationMatrix>,
    families: Mutex<Vec<Family>>,
    matrix_saves: AtomicUsize,
    family_saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with learning state.
    pub fn with_state(matrix: CoactivationMatrix, families: Vec<Family>) -> Self {
        Self {
            matrix: Mutex::new(matrix),
            families: Mutex::new(families),
            ..Self::default()
        }
    }

    /// Number of completed matrix saves.
    pub fn matrix_saves(&self) -> usize {
        self.matrix_saves.load(Ordering::SeqCst)
    }

    /// Number of completed family saves.
    pub fn family_saves(&self) -> usize {
        self.family_saves.load(Ordering::SeqCst)
    }
}

// The guarded values are plain data replaced wholesale, so a poisoned lock
// still holds a consistent value.
fn guard<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Persistence for MemoryStore {
    fn load_matrix(&self) -> Result<CoactivationMatrix> {
        Ok(guard(&self.matrix).clone())
    }

    fn save_matrix(&self, matrix: &CoactivationMatrix) -> Result<()> {
        *guard(&self.matrix) = matrix.clone();
        self.matrix_saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn load_families(&self) -> Result<Vec<Family>> {
        Ok(guard(&self.families).clone())
    }

    fn save_families(&self, families: &[Family]) -> Result<()> {
        *guard(&self.families) = families.to_vec();
        self.family_saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confluence_field::ScorerId;
    use confluence_learning::FamilyId;
    use std::collections::BTreeSet;

    #[test]
    fn fresh_store_is_empty() {
        let store = MemoryStore::new();
        assert!(store.load_matrix().unwrap().is_empty());
        assert!(store.load_families().unwrap().is_empty());
        assert_eq!(store.matrix_saves(), 0);
    }

    #[test]
    fn saves_replace_state() {
        let store = MemoryStore::new();

        let mut matrix = CoactivationMatrix::new();
        let pair: BTreeSet<ScorerId> = ["a", "b"].into_iter().map(ScorerId::new).collect();
        matrix.update(&pair, 0.9, 0.15);
        store.save_matrix(&matrix).unwrap();

        let families = vec![Family::found(FamilyId(1), &[0.5, 0.5], "urgent")];
        store.save_families(&families).unwrap();

        assert_eq!(store.load_matrix().unwrap(), matrix);
        assert_eq!(store.load_families().unwrap(), families);
        assert_eq!(store.matrix_saves(), 1);
        assert_eq!(store.family_saves(), 1);
    }
}
