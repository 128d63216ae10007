use super::RateStore;
use crate::core::error::StorageError;
use crate::core::rate::RateSnapshot;
use serde::{Serialize, de::DeserializeOwned};
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

const RATES_FILE: &str = "rates.json";
const COUNTRIES_FILE: &str = "countries.json";

/// Stores the two mappings as JSON files in a data directory.
pub struct DiskStore {
    dir: PathBuf,
}

impl DiskStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn rates_path(&self) -> PathBuf {
        self.dir.join(RATES_FILE)
    }

    pub fn countries_path(&self) -> PathBuf {
        self.dir.join(COUNTRIES_FILE)
    }

    fn read_map<V: DeserializeOwned>(
        path: &Path,
    ) -> Result<Option<BTreeMap<String, V>>, StorageError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StorageError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let map = serde_json::from_str(&content).map_err(|source| StorageError::Format {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Some(map))
    }

    fn io_error(path: &Path) -> impl Fn(std::io::Error) -> StorageError + '_ {
        move |source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    // Staged next to the target and later renamed over it, so readers never
    // see a partially written file.
    fn write_temp<V: Serialize>(
        &self,
        path: &Path,
        map: &BTreeMap<String, V>,
    ) -> Result<NamedTempFile, StorageError> {
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(Self::io_error(path))?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, map).map_err(|source| {
                StorageError::Format {
                    path: path.to_path_buf(),
                    source,
                }
            })?;
            writer.flush().map_err(Self::io_error(path))?;
        }
        Ok(tmp)
    }

    /// Puts `path` back to `previous`, or removes it when there was nothing
    /// before.
    fn restore(&self, path: &Path, previous: Option<Vec<u8>>) {
        let restored = match previous {
            Some(bytes) => NamedTempFile::new_in(&self.dir)
                .and_then(|mut tmp| {
                    tmp.write_all(&bytes)?;
                    tmp.flush()?;
                    Ok(tmp)
                })
                .and_then(|tmp| tmp.persist(path).map(|_| ()).map_err(|e| e.error)),
            None => fs::remove_file(path),
        };
        if let Err(e) = restored {
            warn!(error = %e, "Failed to restore {}", path.display());
        }
    }
}

impl RateStore for DiskStore {
    fn load(&self) -> Result<Option<RateSnapshot>, StorageError> {
        let rates = Self::read_map::<f64>(&self.rates_path())?;
        let countries = Self::read_map::<String>(&self.countries_path())?;

        let (Some(rates), Some(countries)) = (rates, countries) else {
            debug!("No persisted rates in {}", self.dir.display());
            return Ok(None);
        };

        let snapshot = RateSnapshot { rates, countries };
        if !snapshot.is_consistent() {
            return Err(StorageError::Inconsistent {
                path: self.dir.clone(),
            });
        }
        snapshot
            .validate()
            .map_err(|reason| StorageError::Invalid {
                path: self.dir.clone(),
                reason,
            })?;
        debug!(
            "Loaded {} rates from {}",
            snapshot.rates.len(),
            self.dir.display()
        );
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &RateSnapshot) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir).map_err(|source| StorageError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let countries_path = self.countries_path();
        let rates_path = self.rates_path();
        let countries_tmp = self.write_temp(&countries_path, &snapshot.countries)?;
        let rates_tmp = self.write_temp(&rates_path, &snapshot.rates)?;

        let previous = match fs::read(&countries_path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(source) => {
                return Err(StorageError::Io {
                    path: countries_path,
                    source,
                });
            }
        };

        // Rates go last: their mtime marks the snapshot as fresh.
        countries_tmp
            .persist(&countries_path)
            .map_err(|e| Self::io_error(&countries_path)(e.error))?;
        if let Err(e) = rates_tmp.persist(&rates_path) {
            self.restore(&countries_path, previous);
            return Err(Self::io_error(&rates_path)(e.error));
        }

        debug!(
            "Wrote {} rates to {}",
            snapshot.rates.len(),
            self.dir.display()
        );
        Ok(())
    }

    fn last_modified(&self) -> Result<Option<SystemTime>, StorageError> {
        let path = self.rates_path();
        match fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(modified) => Ok(Some(modified)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rate::RateEntry;
    use std::time::Duration;
    use tempfile::tempdir;

    fn sample_snapshot() -> RateSnapshot {
        RateSnapshot::from_entries(vec![
            RateEntry::new("usd", "United States", 0.2551),
            RateEntry::new("aud", "Australia", 0.3899),
            RateEntry::new("jpy", "Japan", 38.12),
        ])
        .unwrap()
    }

    #[test]
    fn test_missing_store_loads_none() {
        let dir = tempdir().unwrap();
        let store = DiskStore::new(dir.path().join("data"));

        assert!(store.load().unwrap().is_none());
        assert!(store.last_modified().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = DiskStore::new(dir.path().join("data"));
        let snapshot = sample_snapshot();

        store.save(&snapshot).unwrap();

        assert_eq!(store.load().unwrap(), Some(snapshot));
        assert!(store.last_modified().unwrap().is_some());
    }

    #[test]
    fn test_save_replaces_previous_contents() {
        let dir = tempdir().unwrap();
        let store = DiskStore::new(dir.path());
        store.save(&sample_snapshot()).unwrap();

        let replacement =
            RateSnapshot::from_entries(vec![RateEntry::new("eur", "Euro Zone", 0.23)]).unwrap();
        store.save(&replacement).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, replacement);
        assert!(!loaded.rates.contains_key("usd"));
    }

    #[test]
    fn test_only_one_file_present_loads_none() {
        let dir = tempdir().unwrap();
        let store = DiskStore::new(dir.path());
        fs::write(store.rates_path(), r#"{"usd": 0.25}"#).unwrap();

        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_file_is_format_error() {
        let dir = tempdir().unwrap();
        let store = DiskStore::new(dir.path());
        fs::write(store.rates_path(), "not json").unwrap();
        fs::write(store.countries_path(), r#"{"usd": "United States"}"#).unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, StorageError::Format { .. }));
        assert!(err.to_string().contains("rates.json"));
    }

    #[test]
    fn test_mismatched_keys_are_inconsistent() {
        let dir = tempdir().unwrap();
        let store = DiskStore::new(dir.path());
        fs::write(store.rates_path(), r#"{"usd": 0.25}"#).unwrap();
        fs::write(store.countries_path(), r#"{"aud": "Australia"}"#).unwrap();

        assert!(matches!(
            store.load().unwrap_err(),
            StorageError::Inconsistent { .. }
        ));
    }

    #[test]
    fn test_invalid_persisted_rates_are_rejected() {
        let dir = tempdir().unwrap();
        let store = DiskStore::new(dir.path());
        fs::write(store.rates_path(), r#"{"usd": 0.0, "EUR": -2.0}"#).unwrap();
        fs::write(
            store.countries_path(),
            r#"{"usd": "United States", "EUR": "Euro Zone"}"#,
        )
        .unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, StorageError::Invalid { .. }), "got {err:?}");
    }

    #[test]
    fn test_uppercase_persisted_code_is_rejected() {
        let dir = tempdir().unwrap();
        let store = DiskStore::new(dir.path());
        fs::write(store.rates_path(), r#"{"USD": 0.25}"#).unwrap();
        fs::write(store.countries_path(), r#"{"USD": "United States"}"#).unwrap();

        assert!(matches!(
            store.load().unwrap_err(),
            StorageError::Invalid { .. }
        ));
    }

    // A directory in place of rates.json makes the final rename fail.
    fn block_rates_file(store: &DiskStore) {
        let _ = fs::remove_file(store.rates_path());
        fs::create_dir(store.rates_path()).unwrap();
        fs::write(store.rates_path().join("keep"), "x").unwrap();
    }

    #[test]
    fn test_failed_rates_write_restores_countries() {
        let dir = tempdir().unwrap();
        let store = DiskStore::new(dir.path());
        store.save(&sample_snapshot()).unwrap();
        let before = fs::read_to_string(store.countries_path()).unwrap();
        block_rates_file(&store);

        let replacement =
            RateSnapshot::from_entries(vec![RateEntry::new("eur", "Euro Zone", 0.23)]).unwrap();
        let err = store.save(&replacement).unwrap_err();

        assert!(matches!(err, StorageError::Io { .. }));
        assert!(err.to_string().contains("rates.json"));
        assert_eq!(fs::read_to_string(store.countries_path()).unwrap(), before);
    }

    #[test]
    fn test_failed_rates_write_removes_new_countries() {
        let dir = tempdir().unwrap();
        let store = DiskStore::new(dir.path());
        block_rates_file(&store);

        assert!(store.save(&sample_snapshot()).is_err());
        assert!(!store.countries_path().exists());
    }

    #[test]
    fn test_last_modified_tracks_rates_file() {
        let dir = tempdir().unwrap();
        let store = DiskStore::new(dir.path());
        store.save(&sample_snapshot()).unwrap();

        let past = SystemTime::now() - Duration::from_secs(90_000);
        fs::File::options()
            .write(true)
            .open(store.rates_path())
            .unwrap()
            .set_modified(past)
            .unwrap();

        let modified = store.last_modified().unwrap().unwrap();
        let age = SystemTime::now().duration_since(modified).unwrap();
        assert!(age >= Duration::from_secs(89_999), "age was {age:?}");
    }
}
