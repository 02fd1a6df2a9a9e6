//! Persistence layer for run artifacts.
//!
//! Supports both JSON (human-readable) and bincode (efficient binary)
//! formats, chosen by file extension. Artifacts keep the field names of
//! their record types verbatim; downstream consumers rely on them.
//!
//! A run writes into its own `run_<timestamp>/` directory:
//! `units.json`, `retrieval_results.json`, `ground_truth/gt.json`,
//! `evaluation/metrics.json`. Runs are append-only: a new run creates a new
//! directory, never rewriting an old one.

use crate::error::{RagError, Result};
use crate::ground_truth::GroundTruth;
use crate::index::RetrievalResult;
use crate::unit::Unit;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Default filenames within a run directory.
pub const UNITS_FILENAME: &str = "units.json";
pub const RETRIEVAL_FILENAME: &str = "retrieval_results.json";
pub const GROUND_TRUTH_FILENAME: &str = "ground_truth/gt.json";
pub const METRICS_FILENAME: &str = "evaluation/metrics.json";
pub const ANSWER_METRICS_FILENAME: &str = "evaluation/answer_metrics.json";

/// Retrieval results keyed by query id, the persisted shape.
pub type RetrievalResults = BTreeMap<String, RetrievalResult>;

/// Save format for artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveFormat {
    /// JSON format (human-readable, larger).
    Json,
    /// Bincode format (binary, compact).
    Bincode,
}

impl SaveFormat {
    /// Determine format from file extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => SaveFormat::Json,
            Some("bin") | Some("bincode") => SaveFormat::Bincode,
            _ => SaveFormat::Json, // Default to JSON
        }
    }
}

/// Save any serializable artifact, creating parent directories as needed.
pub fn save_artifact<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let format = SaveFormat::from_path(path);

    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| RagError::io(parent, e))?;
        }
    }

    let data = match format {
        SaveFormat::Json => serde_json::to_string_pretty(value)
            .map_err(|e| RagError::Serialization(e.to_string()))?
            .into_bytes(),
        SaveFormat::Bincode => {
            let config = bincode::config::standard();
            bincode::serde::encode_to_vec(value, config)
                .map_err(|e| RagError::Serialization(e.to_string()))?
        }
    };

    fs::write(path, &data).map_err(|e| RagError::io(path, e))?;

    Ok(())
}

/// Load an artifact saved by [`save_artifact`].
pub fn load_artifact<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Err(RagError::RunNotFound(path.to_path_buf()));
    }

    let data = fs::read(path).map_err(|e| RagError::io(path, e))?;

    let value = match SaveFormat::from_path(path) {
        SaveFormat::Json => {
            let json_str = String::from_utf8(data)
                .map_err(|e| RagError::Serialization(e.to_string()))?;
            serde_json::from_str(&json_str)
                .map_err(|e| RagError::Serialization(e.to_string()))?
        }
        SaveFormat::Bincode => {
            let config = bincode::config::standard();
            let (value, _) = bincode::serde::decode_from_slice(&data, config)
                .map_err(|e| RagError::Serialization(e.to_string()))?;
            value
        }
    };

    Ok(value)
}

/// Save a unit collection.
pub fn save_units(units: &[Unit], path: &Path) -> Result<()> {
    save_artifact(&units, path)
}

/// Load a unit collection.
pub fn load_units(path: &Path) -> Result<Vec<Unit>> {
    load_artifact(path)
}

/// Save retrieval results keyed by query id.
pub fn save_retrieval_results(results: &RetrievalResults, path: &Path) -> Result<()> {
    save_artifact(results, path)
}

/// Load retrieval results keyed by query id.
pub fn load_retrieval_results(path: &Path) -> Result<RetrievalResults> {
    load_artifact(path)
}

/// Save a ground-truth collection.
pub fn save_ground_truth(ground_truth: &GroundTruth, path: &Path) -> Result<()> {
    save_artifact(ground_truth, path)
}

/// Load a ground-truth collection.
pub fn load_ground_truth(path: &Path) -> Result<GroundTruth> {
    load_artifact(path)
}

/// Create a fresh `run_<timestamp>` directory under `root`.
pub fn create_run_dir(root: &Path) -> Result<PathBuf> {
    let run_id = format!("run_{}", chrono::Local::now().format("%Y-%m-%d_%H-%M-%S"));
    let run_dir = root.join(run_id);
    fs::create_dir_all(&run_dir).map_err(|e| RagError::io(&run_dir, e))?;
    Ok(run_dir)
}

/// Locate the most recent run directory under `root`.
///
/// Run ids embed their timestamp, so lexical order is chronological.
pub fn latest_run(root: &Path) -> Result<PathBuf> {
    let mut runs: Vec<PathBuf> = fs::read_dir(root)
        .map_err(|e| RagError::io(root, e))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_dir()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("run_"))
        })
        .collect();

    runs.sort();
    runs.pop()
        .ok_or_else(|| RagError::RunNotFound(root.to_path_buf()))
}

/// Check whether an artifact exists at the given path.
pub fn artifact_exists(path: &Path) -> bool {
    path.exists() && path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_units() -> Vec<Unit> {
        vec![
            Unit::new("doc", "structural", 0, "First section.", 0, 1, 1),
            Unit::new("doc", "structural", 1, "Second section.", 1, 2, 1),
        ]
    }

    #[test]
    fn test_save_and_load_units_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("units.json");

        let original = test_units();
        save_units(&original, &path).unwrap();

        assert!(artifact_exists(&path));

        let loaded = load_units(&path).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_save_and_load_units_bincode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("units.bin");

        let original = test_units();
        save_units(&original, &path).unwrap();

        let loaded = load_units(&path).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(
            SaveFormat::from_path(Path::new("units.json")),
            SaveFormat::Json
        );
        assert_eq!(
            SaveFormat::from_path(Path::new("units.bin")),
            SaveFormat::Bincode
        );
        assert_eq!(
            SaveFormat::from_path(Path::new("units.bincode")),
            SaveFormat::Bincode
        );
        assert_eq!(SaveFormat::from_path(Path::new("units")), SaveFormat::Json);
    }

    #[test]
    fn test_load_nonexistent() {
        let result = load_units(Path::new("/nonexistent/units.json"));
        assert!(matches!(result, Err(RagError::RunNotFound(_))));
    }

    #[test]
    fn test_nested_ground_truth_path_created() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(GROUND_TRUTH_FILENAME);

        let gt = GroundTruth::new();
        save_ground_truth(&gt, &path).unwrap();
        assert!(artifact_exists(&path));
    }

    #[test]
    fn test_latest_run_ordering() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("run_2026-01-01_00-00-00")).unwrap();
        fs::create_dir(dir.path().join("run_2026-03-05_10-30-00")).unwrap();
        fs::create_dir(dir.path().join("run_2026-02-01_00-00-00")).unwrap();
        fs::create_dir(dir.path().join("not_a_run")).unwrap();

        let latest = latest_run(dir.path()).unwrap();
        assert_eq!(
            latest.file_name().unwrap().to_str().unwrap(),
            "run_2026-03-05_10-30-00"
        );
    }

    #[test]
    fn test_latest_run_empty_root() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            latest_run(dir.path()),
            Err(RagError::RunNotFound(_))
        ));
    }

    #[test]
    fn test_json_is_readable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("units.json");

        save_units(&test_units(), &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("doc_structural_0"));
        assert!(content.contains("First section."));
    }
}
