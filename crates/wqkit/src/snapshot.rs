//! JSON snapshot file persistence for [`MeasurementStore`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};
use wqkit_record::{MeasurementStore, SpecStoreSnapshot, ValidationError};

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("malformed snapshot {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid record in snapshot {path}: {source}")]
    Invalid {
        path: PathBuf,
        source: ValidationError,
    },
}

/// Load the store from `path`. A missing file is an empty store.
pub fn load_store(path: &Path) -> Result<MeasurementStore, SnapshotError> {
    let c_json = match fs::read_to_string(path) {
        Ok(c_json) => c_json,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!("No snapshot at {}; starting empty", path.display());
            return Ok(MeasurementStore::new());
        }
        Err(source) => {
            return Err(SnapshotError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let snapshot: SpecStoreSnapshot =
        serde_json::from_str(&c_json).map_err(|source| SnapshotError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    MeasurementStore::from_snapshot(snapshot).map_err(|source| SnapshotError::Invalid {
        path: path.to_path_buf(),
        source,
    })
}

/// Write every measurement to `path` as pretty JSON, replacing the file.
pub fn save_store(store: &MeasurementStore, path: &Path) -> Result<(), SnapshotError> {
    let snapshot = store.snapshot();
    let c_json = serde_json::to_string_pretty(&snapshot)?;

    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|source| SnapshotError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, c_json).map_err(|source| SnapshotError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    info!(
        "Saved {} measurement(s) to {}",
        snapshot.measurements.len(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use wqkit_record::{EnumSite, RecordSource};

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn test_missing_file_is_empty_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = load_store(&dir.path().join("absent.json")).expect("load");
        assert!(store.is_empty());
    }

    #[test]
    fn test_save_then_load_preserves_measurements() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("store.json");

        let store = MeasurementStore::new();
        store
            .upsert_measurement(EnumSite::DrainA, date(2024, 1, 5), 7.0, Some(25.0), 1.2)
            .expect("insert");
        store
            .upsert_measurement(EnumSite::DrainC, date(2024, 3, 1), 6.4, None, 0.0)
            .expect("insert");
        save_store(&store, &path).expect("save");

        let restored = load_store(&path).expect("load");
        assert_eq!(restored.snapshot(), store.snapshot());
        assert_eq!(
            restored.all_aggregates(EnumSite::DrainA),
            store.all_aggregates(EnumSite::DrainA)
        );
    }

    #[test]
    fn test_legacy_records_load_without_temperature() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("legacy.json");
        fs::write(
            &path,
            r#"{"measurements":[{"site":"Drain B","date":"2023-11-02","ph":6.8,"flow":0.4}]}"#,
        )
        .expect("write");

        let store = load_store(&path).expect("load");
        let m = store
            .measurement(EnumSite::DrainB, date(2023, 11, 2))
            .expect("record");
        assert_eq!(m.temperature, None);
    }

    #[test]
    fn test_malformed_and_invalid_snapshots_are_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.json");

        fs::write(&path, "{ not json").expect("write");
        assert!(matches!(load_store(&path), Err(SnapshotError::Parse { .. })));

        fs::write(
            &path,
            r#"{"measurements":[{"site":"Drain A","date":"2024-01-05","ph":15.0,"flow":1.0}]}"#,
        )
        .expect("write");
        assert!(matches!(
            load_store(&path),
            Err(SnapshotError::Invalid {
                source: ValidationError::PhOutOfRange(_),
                ..
            })
        ));
    }
}
