//! JSON-file store.
//!
//! Layout inside the data directory:
//!
//! ```text
//! coactivation.json   CoactivationMatrix
//! families.json       [Family]
//! ```
//!
//! Each save writes a sibling `.tmp` file and renames it over the target, so
//! a crash mid-save leaves the previous document intact.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use confluence_learning::{CoactivationMatrix, Family};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::Persistence;

const MATRIX_FILE: &str = "coactivation.json";
const FAMILIES_FILE: &str = "families.json";

/// Store backed by JSON documents in a directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open or create storage at the given directory.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        if !dir.is_dir() {
            return Err(StoreError::Unavailable(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
        info!(dir = %dir.display(), "Opened JSON store");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let path = self.dir.join(name);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    fn write<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.dir.join(name);
        let tmp = self.dir.join(format!("{name}.tmp"));
        let bytes = serde_json::to_vec_pretty(value)?;
        fs::write(&tmp, bytes).map_err(|e| StoreError::io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| StoreError::io(&path, e))?;
        debug!(path = %path.display(), "Saved document");
        Ok(())
    }
}

impl Persistence for JsonFileStore {
    fn load_matrix(&self) -> Result<CoactivationMatrix> {
        Ok(self.read(MATRIX_FILE)?.unwrap_or_default())
    }

    fn save_matrix(&self, matrix: &CoactivationMatrix) -> Result<()> {
        self.write(MATRIX_FILE, matrix)
    }

    fn load_families(&self) -> Result<Vec<Family>> {
        Ok(self.read(FAMILIES_FILE)?.unwrap_or_default())
    }

    fn save_families(&self, families: &[Family]) -> Result<()> {
        self.write(FAMILIES_FILE, families)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confluence_field::ScorerId;
    use confluence_learning::FamilyId;
    use std::collections::BTreeSet;
    use tempfile::tempdir;

    #[test]
    fn empty_directory_loads_defaults() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        assert!(store.load_matrix().unwrap().is_empty());
        assert!(store.load_families().unwrap().is_empty());
    }

    #[test]
    fn state_survives_reopen() {
        let dir = tempdir().unwrap();

        let mut matrix = CoactivationMatrix::new();
        let pair: BTreeSet<ScorerId> = ["lexicon", "somatic"].into_iter().map(ScorerId::new).collect();
        matrix.update(&pair, 0.7, 0.15);
        let families = vec![
            Family::found(FamilyId(1), &[0.6, 0.5, 0.9], "urgent"),
            Family::found(FamilyId(2), &[0.1, 0.8, 0.7], "calm"),
        ];

        {
            let store = JsonFileStore::open(dir.path()).unwrap();
            store.save_matrix(&matrix).unwrap();
            store.save_families(&families).unwrap();
        }

        let reopened = JsonFileStore::open(dir.path()).unwrap();
        assert_eq!(reopened.load_matrix().unwrap(), matrix);
        assert_eq!(reopened.load_families().unwrap(), families);
        assert!(!dir.path().join("coactivation.json.tmp").exists());
    }

    #[test]
    fn open_creates_nested_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let store = JsonFileStore::open(&nested).unwrap();
        assert!(nested.is_dir());
        assert_eq!(store.dir(), nested.as_path());
    }

    #[test]
    fn open_on_a_file_fails() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        fs::write(&file, b"x").unwrap();
        assert!(JsonFileStore::open(&file).is_err());
    }

    #[test]
    fn corrupt_document_is_an_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(MATRIX_FILE), b"{ not json").unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        assert!(matches!(store.load_matrix(), Err(StoreError::Serialization(_))));
    }
}
