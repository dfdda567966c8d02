//! Confluence Store
//!
//! Durable home of the learning state that outlives one convergence
//! invocation: the co-activation matrix and the family list.
//!
//! The engine only sees the [`Persistence`] trait. Two backends ship here:
//!
//! - [`MemoryStore`]: isolated in-process state for tests and one-shot runs
//! - [`JsonFileStore`]: one JSON document per concern in a data directory,
//!   replaced atomically on every save

pub mod error;
mod memory;
mod json_file;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use json_file::JsonFileStore;

use confluence_learning::{CoactivationMatrix, Family};

/// Storage contract for the learning state.
///
/// Loads happen once at engine start; a failing load is fatal there. Saves
/// happen after every learning update.
pub trait Persistence: Send + Sync {
    /// Load the co-activation matrix. A store that has never been written
    /// returns an empty matrix.
    fn load_matrix(&self) -> Result<CoactivationMatrix>;

    /// Replace the stored co-activation matrix.
    fn save_matrix(&self, matrix: &CoactivationMatrix) -> Result<()>;

    /// Load every family. A store that has never been written returns none.
    fn load_families(&self) -> Result<Vec<Family>>;

    /// Replace the stored family list.
    fn save_families(&self, families: &[Family]) -> Result<()>;
}
