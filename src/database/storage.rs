//! Dataset snapshot storage
//!
//! Persists a [`Dataset`] to disk and loads it back, as pretty JSON or as
//! compact binary (bincode). Datasets are validated before saving and after
//! loading.
//!
//! # Example
//!
//! ```rust,no_run
//! use pizza_reports::database::{DatasetStorage, SampleData};
//!
//! let dataset = SampleData::new(7).generate(100);
//!
//! let storage = DatasetStorage::new();
//! storage.save(&dataset, "sales.json")?;
//! let loaded = storage.load("sales.json")?;
//! # Ok::<(), pizza_reports::DatasetError>(())
//! ```

use crate::database::dataset::Dataset;
use crate::error::DatasetError;
use std::fs;
use std::path::Path;

/// Dataset storage
///
/// Provides methods for saving and loading dataset snapshots.
#[derive(Debug, Clone, Default)]
pub struct DatasetStorage;

impl DatasetStorage {
    /// Create a new storage instance
    pub fn new() -> Self {
        Self
    }

    /// Save a dataset as JSON
    pub fn save(&self, dataset: &Dataset, path: impl AsRef<Path>) -> Result<(), DatasetError> {
        let path = path.as_ref();
        dataset.validate()?;

        let json = serde_json::to_string_pretty(dataset)?;
        fs::write(path, json).map_err(|e| DatasetError::io(path, e))?;
        log::debug!("saved JSON snapshot to {}", path.display());
        Ok(())
    }

    /// Load a dataset from JSON
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Dataset, DatasetError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| DatasetError::io(path, e))?;

        let dataset: Dataset = serde_json::from_str(&contents)?;
        dataset.validate()?;
        Ok(dataset)
    }

    /// Save a dataset as bincode
    pub fn save_binary(
        &self,
        dataset: &Dataset,
        path: impl AsRef<Path>,
    ) -> Result<(), DatasetError> {
        let path = path.as_ref();
        dataset.validate()?;

        let bytes = bincode::serde::encode_to_vec(dataset, bincode::config::standard())?;
        fs::write(path, bytes).map_err(|e| DatasetError::io(path, e))?;
        log::debug!("saved binary snapshot to {}", path.display());
        Ok(())
    }

    /// Load a dataset from bincode
    pub fn load_binary(&self, path: impl AsRef<Path>) -> Result<Dataset, DatasetError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| DatasetError::io(path, e))?;

        let (dataset, _): (Dataset, usize) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard())?;
        dataset.validate()?;
        Ok(dataset)
    }

    /// Save by file extension: `.json` as JSON, anything else as bincode
    pub fn save_auto(&self, dataset: &Dataset, path: impl AsRef<Path>) -> Result<(), DatasetError> {
        let path = path.as_ref();
        if is_json(path) {
            self.save(dataset, path)
        } else {
            self.save_binary(dataset, path)
        }
    }

    /// Load by file extension: `.json` as JSON, anything else as bincode
    pub fn load_auto(&self, path: impl AsRef<Path>) -> Result<Dataset, DatasetError> {
        let path = path.as_ref();
        if is_json(path) {
            self.load(path)
        } else {
            self.load_binary(path)
        }
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::SampleData;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sales.json");
        let dataset = SampleData::new(1).generate(20);

        let storage = DatasetStorage::new();
        storage.save(&dataset, &path).unwrap();
        let loaded = storage.load(&path).unwrap();
        assert_eq!(loaded, dataset);
    }

    #[test]
    fn test_save_and_load_binary() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sales.bin");
        let dataset = SampleData::new(2).generate(20);

        let storage = DatasetStorage::new();
        storage.save_auto(&dataset, &path).unwrap();
        let loaded = storage.load_auto(&path).unwrap();
        assert_eq!(loaded, dataset);
    }

    #[test]
    fn test_save_rejects_invalid_dataset() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        let mut dataset = SampleData::new(3).generate(5);
        dataset.order_details[0].quantity = -2;

        let storage = DatasetStorage::new();
        assert!(matches!(
            storage.save(&dataset, &path),
            Err(DatasetError::Integrity(_))
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_load_missing_file() {
        let storage = DatasetStorage::new();
        let err = storage.load("/nonexistent/sales.json").unwrap_err();
        assert!(matches!(err, DatasetError::Io { .. }));
    }
}
