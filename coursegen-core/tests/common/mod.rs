#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use coursegen_core::contract::{DocumentStore, StoreError, StoredDocument};
use coursegen_core::course::{CourseDefinition, CourseMeta, CourseStep};

/// Document store kept in memory, keyed by `(db, key)`.
#[derive(Default)]
pub struct InMemoryStore {
    docs: Mutex<BTreeMap<(String, String), serde_json::Value>>,
}

impl InMemoryStore {
    pub fn raw(&self, db: &str, key: &str) -> Option<serde_json::Value> {
        self.docs
            .lock()
            .unwrap()
            .get(&(db.to_string(), key.to_string()))
            .cloned()
    }

    pub fn put_raw(&self, db: &str, key: &str, value: serde_json::Value) {
        self.docs
            .lock()
            .unwrap()
            .insert((db.to_string(), key.to_string()), value);
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn create_document(
        &self,
        db: &str,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), StoreError> {
        let mut docs = self.docs.lock().unwrap();
        let k = (db.to_string(), key.to_string());
        if docs.contains_key(&k) {
            return Err(StoreError::AlreadyExists {
                db: db.into(),
                key: key.into(),
            });
        }
        docs.insert(k, value);
        Ok(())
    }

    async fn get_document(
        &self,
        db: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(self.raw(db, key))
    }

    async fn update_document(
        &self,
        db: &str,
        key: &str,
        value: serde_json::Value,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let mut docs = self.docs.lock().unwrap();
        let k = (db.to_string(), key.to_string());
        let Some(stored) = docs.get(&k) else {
            return Err(StoreError::NotFound {
                db: db.into(),
                key: key.into(),
            });
        };
        if stored["version"].as_u64() != Some(expected_version) {
            return Err(StoreError::VersionMismatch {
                db: db.into(),
                key: key.into(),
                expected: expected_version,
            });
        }
        docs.insert(k, value);
        Ok(())
    }

    async fn delete_document(&self, db: &str, key: &str) -> Result<(), StoreError> {
        self.docs
            .lock()
            .unwrap()
            .remove(&(db.to_string(), key.to_string()))
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound {
                db: db.into(),
                key: key.into(),
            })
    }

    async fn list_documents(&self, db: &str) -> Result<Vec<StoredDocument>, StoreError> {
        Ok(self
            .docs
            .lock()
            .unwrap()
            .iter()
            .filter(|((d, _), _)| d == db)
            .map(|((_, key), value)| StoredDocument {
                key: key.clone(),
                value: value.clone(),
            })
            .collect())
    }
}

pub fn sample_course() -> CourseDefinition {
    CourseDefinition {
        meta: CourseMeta {
            title: "Intro to tokio".into(),
            description: "Spawn tasks and await them".into(),
            ..Default::default()
        },
        steps: vec![CourseStep {
            id: "spawn".into(),
            title: "Spawning tasks".into(),
            content: "Use `tokio::spawn`.".into(),
            video_timestamp: Some("3:15".into()),
            ..Default::default()
        }],
        resources: vec![],
        transcript: None,
    }
}
