//! Sled-based storage for processed records.
//!
//! Records are keyed by their original URL, so storing the same link twice
//! is detected instead of silently overwriting the first result.

use crate::summary::{dedup_tags, ContentRecord, MAX_TAGS};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    DbError(#[from] sled::Error),
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// A stored record with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    /// When the record was stored
    pub created_at: DateTime<Utc>,
    pub record: ContentRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Inserted,
    /// A record for the same URL already exists and was left untouched
    Duplicate,
}

pub struct Storage {
    db: sled::Db,
}

impl Storage {
    /// Open or create storage at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Store a record unless one with the same URL exists. Tags are capped
    /// at the downstream limit on the way in.
    pub fn store(&self, record: &ContentRecord) -> Result<StoreOutcome, StorageError> {
        let mut record = record.clone();
        record.tags = dedup_tags(&record.tags);
        record.tags.truncate(MAX_TAGS);

        let stored = StoredRecord {
            created_at: Utc::now(),
            record,
        };
        let value = serde_json::to_vec(&stored)?;
        let key = stored.record.original_url.as_bytes();

        // insert only if absent
        let inserted = self
            .db
            .compare_and_swap(key, None as Option<&[u8]>, Some(value))?
            .is_ok();
        self.db.flush()?;

        debug!(url = %stored.record.original_url, inserted, "store record");
        Ok(if inserted {
            StoreOutcome::Inserted
        } else {
            StoreOutcome::Duplicate
        })
    }

    /// Retrieve a record by URL
    pub fn get(&self, url: &str) -> Result<Option<StoredRecord>, StorageError> {
        match self.db.get(url.as_bytes())? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    pub fn contains(&self, url: &str) -> Result<bool, StorageError> {
        Ok(self.db.contains_key(url.as_bytes())?)
    }

    /// List all stored records, newest first
    pub fn list_all(&self) -> Result<Vec<StoredRecord>, StorageError> {
        let mut results = Vec::new();
        for item in self.db.iter() {
            let (_key, value) = item?;
            let stored: StoredRecord = serde_json::from_slice(&value)?;
            results.push(stored);
        }
        results.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(results)
    }

    /// Delete a record by URL; returns whether it existed
    pub fn delete(&self, url: &str) -> Result<bool, StorageError> {
        let existed = self.db.remove(url.as_bytes())?.is_some();
        self.db.flush()?;
        Ok(existed)
    }

    pub fn count(&self) -> usize {
        self.db.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(url: &str, tags: usize) -> ContentRecord {
        ContentRecord {
            title: "Title".into(),
            summary: "Summary".into(),
            key_points: vec!["point".into()],
            tags: (0..tags).map(|i| format!("tag{}", i)).collect(),
            related_links: vec![],
            source: "example.com".into(),
            original_url: url.into(),
        }
    }

    #[test]
    fn duplicate_urls_are_detected() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();

        let first = record("https://example.com/a", 3);
        assert_eq!(storage.store(&first).unwrap(), StoreOutcome::Inserted);

        let mut second = first.clone();
        second.title = "Changed".into();
        assert_eq!(storage.store(&second).unwrap(), StoreOutcome::Duplicate);

        let stored = storage.get("https://example.com/a").unwrap().unwrap();
        assert_eq!(stored.record.title, "Title");
        assert_eq!(storage.count(), 1);
        assert!(storage.contains("https://example.com/a").unwrap());
    }

    #[test]
    fn tags_are_capped_on_store() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();
        storage.store(&record("https://example.com/b", 14)).unwrap();
        let stored = storage.get("https://example.com/b").unwrap().unwrap();
        assert_eq!(stored.record.tags.len(), MAX_TAGS);
    }

    #[test]
    fn list_and_delete() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();
        storage.store(&record("https://example.com/1", 1)).unwrap();
        storage.store(&record("https://example.com/2", 1)).unwrap();
        assert_eq!(storage.list_all().unwrap().len(), 2);

        assert!(storage.delete("https://example.com/1").unwrap());
        assert!(!storage.delete("https://example.com/1").unwrap());
        assert!(storage.get("https://example.com/1").unwrap().is_none());
        assert_eq!(storage.count(), 1);
    }
}
