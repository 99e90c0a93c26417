//! JSONL-based append-only storage with in-memory caching.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Serialize, de::DeserializeOwned};

use super::traits::{AppendStore, Filter, HasId};
use crate::error::{RefinrError, Result};

/// JSONL-based storage with in-memory caching.
///
/// Each collection is one `<collection>.jsonl` file. The file is the source
/// of truth; the cache mirrors it in append order.
pub struct JsonlStorage {
    base_path: PathBuf,
    cache: RwLock<HashMap<String, Vec<serde_json::Value>>>,
}

fn lock_err(e: impl std::fmt::Display) -> RefinrError {
    RefinrError::PersistenceFailed(e.to_string())
}

impl JsonlStorage {
    /// Create a new JsonlStorage at the given path.
    pub fn new(base_path: impl AsRef<Path>) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;
        Ok(Self {
            base_path,
            cache: RwLock::new(HashMap::new()),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn collection_path(&self, collection: &str) -> PathBuf {
        self.base_path.join(format!("{}.jsonl", collection))
    }

    /// Load a collection into cache if not already loaded.
    fn ensure_loaded(&self, collection: &str) -> Result<()> {
        {
            let cache = self.cache.read().map_err(lock_err)?;
            if cache.contains_key(collection) {
                return Ok(());
            }
        }

        let mut cache = self.cache.write().map_err(lock_err)?;
        if cache.contains_key(collection) {
            return Ok(());
        }

        let path = self.collection_path(collection);
        let records = if path.exists() {
            let file = File::open(&path)?;
            let reader = BufReader::new(file);
            let mut records = Vec::new();
            for line in reader.lines() {
                let line = line?;
                if !line.trim().is_empty() {
                    let record: serde_json::Value = serde_json::from_str(&line)?;
                    records.push(record);
                }
            }
            records
        } else {
            Vec::new()
        };

        cache.insert(collection.to_string(), records);
        Ok(())
    }

    /// Append a record to the JSONL file.
    fn append_to_file(&self, collection: &str, record: &serde_json::Value) -> Result<()> {
        let path = self.collection_path(collection);
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(file, "{}", serde_json::to_string(record)?)?;
        Ok(())
    }
}

impl AppendStore for JsonlStorage {
    fn create<T: Serialize + HasId>(&self, collection: &str, record: &T) -> Result<()> {
        self.ensure_loaded(collection)?;

        let value = serde_json::to_value(record)?;

        // Hold the write lock across the append so concurrent writers serialize
        let mut cache = self.cache.write().map_err(lock_err)?;
        let records = cache
            .get_mut(collection)
            .ok_or_else(|| RefinrError::PersistenceFailed(format!("Collection not loaded: {}", collection)))?;

        if records
            .iter()
            .any(|r| r.get("id").and_then(|v| v.as_str()) == Some(record.id()))
        {
            return Err(RefinrError::PersistenceFailed(format!(
                "Duplicate id {} in {}",
                record.id(),
                collection
            )));
        }

        self.append_to_file(collection, &value)?;
        records.push(value);

        Ok(())
    }

    fn get<T: DeserializeOwned>(&self, collection: &str, id: &str) -> Result<Option<T>> {
        self.ensure_loaded(collection)?;

        let cache = self.cache.read().map_err(lock_err)?;
        let records = cache
            .get(collection)
            .ok_or_else(|| RefinrError::PersistenceFailed(format!("Collection not loaded: {}", collection)))?;

        for record in records {
            if record.get("id").and_then(|v| v.as_str()) == Some(id) {
                let parsed: T = serde_json::from_value(record.clone())?;
                return Ok(Some(parsed));
            }
        }

        Ok(None)
    }

    fn query<T: DeserializeOwned>(&self, collection: &str, filters: &[Filter]) -> Result<Vec<T>> {
        self.ensure_loaded(collection)?;

        let cache = self.cache.read().map_err(lock_err)?;
        let records = cache
            .get(collection)
            .ok_or_else(|| RefinrError::PersistenceFailed(format!("Collection not loaded: {}", collection)))?;

        let mut results = Vec::new();
        for record in records {
            if filters.iter().all(|f| f.matches(record)) {
                let parsed: T = serde_json::from_value(record.clone())?;
                results.push(parsed);
            }
        }

        Ok(results)
    }

    fn list<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>> {
        self.query(collection, &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct TestRecord {
        id: String,
        name: String,
        status: String,
    }

    impl HasId for TestRecord {
        fn id(&self) -> &str {
            &self.id
        }
    }

    fn record(id: &str, name: &str, status: &str) -> TestRecord {
        TestRecord {
            id: id.to_string(),
            name: name.to_string(),
            status: status.to_string(),
        }
    }

    fn create_test_storage() -> (JsonlStorage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = JsonlStorage::new(temp_dir.path()).unwrap();
        (storage, temp_dir)
    }

    #[test]
    fn test_create_and_get() {
        let (storage, _temp) = create_test_storage();
        let rec = record("1", "test", "active");

        storage.create("test", &rec).unwrap();
        let retrieved: Option<TestRecord> = storage.get("test", "1").unwrap();

        assert_eq!(retrieved, Some(rec));
    }

    #[test]
    fn test_get_not_found() {
        let (storage, _temp) = create_test_storage();
        let retrieved: Option<TestRecord> = storage.get("test", "nonexistent").unwrap();
        assert_eq!(retrieved, None);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let (storage, temp) = create_test_storage();
        storage.create("test", &record("1", "first", "active")).unwrap();

        let result = storage.create("test", &record("1", "second", "active"));
        assert!(matches!(result, Err(RefinrError::PersistenceFailed(_))));

        // Nothing extra hit the file
        let content = fs::read_to_string(temp.path().join("test.jsonl")).unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[test]
    fn test_query_preserves_append_order() {
        let (storage, _temp) = create_test_storage();
        storage.create("test", &record("c", "charlie", "active")).unwrap();
        storage.create("test", &record("a", "alice", "inactive")).unwrap();
        storage.create("test", &record("b", "bob", "active")).unwrap();

        let active: Vec<TestRecord> = storage.query("test", &[Filter::eq("status", "active")]).unwrap();
        let names: Vec<_> = active.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["charlie", "bob"]);

        let all: Vec<TestRecord> = storage.list("test").unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[1].id, "a");
    }

    #[test]
    fn test_persistence_across_instances() {
        let temp_dir = TempDir::new().unwrap();

        {
            let storage = JsonlStorage::new(temp_dir.path()).unwrap();
            storage.create("test", &record("1", "test", "active")).unwrap();
            storage.create("test", &record("2", "second", "active")).unwrap();
        }

        {
            let storage = JsonlStorage::new(temp_dir.path()).unwrap();
            let all: Vec<TestRecord> = storage.list("test").unwrap();
            assert_eq!(all.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["1", "2"]);
            // Duplicate detection survives a reopen
            assert!(storage.create("test", &record("1", "again", "active")).is_err());
        }
    }

    #[test]
    fn test_empty_collection() {
        let (storage, _temp) = create_test_storage();
        let all: Vec<TestRecord> = storage.list("empty").unwrap();
        assert!(all.is_empty());
    }

    #[test]
    fn test_multiple_collections() {
        let (storage, _temp) = create_test_storage();
        storage.create("collection_a", &record("1", "in_a", "active")).unwrap();
        storage.create("collection_b", &record("1", "in_b", "active")).unwrap();

        let a: Option<TestRecord> = storage.get("collection_a", "1").unwrap();
        let b: Option<TestRecord> = storage.get("collection_b", "1").unwrap();

        assert_eq!(a.unwrap().name, "in_a");
        assert_eq!(b.unwrap().name, "in_b");
    }
}
