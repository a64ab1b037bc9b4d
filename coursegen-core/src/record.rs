//! Course records persisted in the document store.
//!
//! A [`CourseRecord`] wraps the generated [`CourseDefinition`] with
//! lifecycle state, timestamps and publish history. Updates are guarded by a
//! version number: a write based on a stale copy is rejected with
//! [`RecordError::Conflict`] instead of silently overwriting a concurrent
//! edit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::contract::{DocumentStore, StoreError};
use crate::course::CourseDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseStatus {
    Draft,
    Processing,
    Ready,
    Published,
}

impl fmt::Display for CourseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CourseStatus::Draft => "draft",
            CourseStatus::Processing => "processing",
            CourseStatus::Ready => "ready",
            CourseStatus::Published => "published",
        };
        f.pad(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishEntry {
    pub url: String,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<CourseDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    pub status: CourseStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
    #[serde(default)]
    pub publish_history: Vec<PublishEntry>,
}

/// Input for [`CourseRepository::create`].
#[derive(Debug, Clone, Default)]
pub struct NewCourse {
    pub title: String,
    pub description: String,
    pub video_url: Option<String>,
    pub transcript: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("course '{0}' not found")]
    NotFound(String),

    #[error("course '{id}' was modified concurrently (expected version {expected}, found {found})")]
    Conflict { id: String, expected: u64, found: u64 },

    #[error("stored course '{id}' is malformed: {source}")]
    Malformed {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct CourseRepository<S> {
    store: S,
    db: String,
}

impl<S: DocumentStore> CourseRepository<S> {
    pub fn new(store: S, db: impl Into<String>) -> Self {
        Self {
            store,
            db: db.into(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn create(&self, new: NewCourse) -> Result<CourseRecord, RecordError> {
        let now = Utc::now();
        let record = CourseRecord {
            id: Uuid::new_v4().to_string(),
            title: new.title,
            description: new.description,
            video_url: new.video_url,
            transcript: new.transcript,
            course: None,
            html: None,
            status: CourseStatus::Draft,
            created_at: now,
            updated_at: now,
            version: 1,
            publish_history: Vec::new(),
        };
        let value = serde_json::to_value(&record).map_err(StoreError::from)?;
        self.store
            .create_document(&self.db, &record.id, value)
            .await
            .map_err(|e| {
                error!(error = %e, id = %record.id, "Failed to create course record");
                e
            })?;
        info!(id = %record.id, title = %record.title, "Created course record");
        Ok(record)
    }

    pub async fn get(&self, id: &str) -> Result<CourseRecord, RecordError> {
        let value = self
            .store
            .get_document(&self.db, id)
            .await?
            .ok_or_else(|| RecordError::NotFound(id.to_string()))?;
        decode(id, value)
    }

    /// All records, most recently updated first. Malformed documents are
    /// skipped with a warning.
    pub async fn list(&self) -> Result<Vec<CourseRecord>, RecordError> {
        let docs = self.store.list_documents(&self.db).await?;
        let mut records: Vec<CourseRecord> = docs
            .into_iter()
            .filter_map(|doc| match decode(&doc.key, doc.value) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(error = %e, key = %doc.key, "Skipping malformed course record");
                    None
                }
            })
            .collect();
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        debug!(count = records.len(), "Listed course records");
        Ok(records)
    }

    /// Writes `record` if nobody else has written since it was read. The
    /// returned record carries the new version.
    ///
    /// The early read only avoids a pointless write; the store's conditional
    /// update is what rejects a concurrent writer that got in between.
    pub async fn update(&self, mut record: CourseRecord) -> Result<CourseRecord, RecordError> {
        let current = self.get(&record.id).await?;
        if current.version != record.version {
            return Err(self.conflict(record.id, record.version, current.version));
        }

        let expected = record.version;
        record.version += 1;
        record.updated_at = Utc::now();
        let value = serde_json::to_value(&record).map_err(StoreError::from)?;
        match self
            .store
            .update_document(&self.db, &record.id, value, expected)
            .await
        {
            Ok(()) => {}
            Err(StoreError::VersionMismatch { .. }) => {
                let found = self.get(&record.id).await?.version;
                return Err(self.conflict(record.id, expected, found));
            }
            Err(e) => return Err(e.into()),
        }
        info!(id = %record.id, version = record.version, status = %record.status, "Updated course record");
        Ok(record)
    }

    fn conflict(&self, id: String, expected: u64, found: u64) -> RecordError {
        warn!(id = %id, expected, found, "Rejected stale course update");
        RecordError::Conflict {
            id,
            expected,
            found,
        }
    }

    pub async fn delete(&self, id: &str) -> Result<(), RecordError> {
        self.store.delete_document(&self.db, id).await?;
        info!(id, "Deleted course record");
        Ok(())
    }

    pub async fn set_status(
        &self,
        id: &str,
        status: CourseStatus,
    ) -> Result<CourseRecord, RecordError> {
        let mut record = self.get(id).await?;
        record.status = status;
        self.update(record).await
    }

    /// Stores a pipeline result and marks the record ready.
    pub async fn save_generated(
        &self,
        id: &str,
        course: CourseDefinition,
        html: String,
    ) -> Result<CourseRecord, RecordError> {
        let mut record = self.get(id).await?;
        record.title = course.meta.title.clone();
        record.description = course.meta.description.clone();
        record.course = Some(course);
        record.html = Some(html);
        record.status = CourseStatus::Ready;
        self.update(record).await
    }
}

fn decode(id: &str, value: serde_json::Value) -> Result<CourseRecord, RecordError> {
    serde_json::from_value(value).map_err(|source| RecordError::Malformed {
        id: id.to_string(),
        source,
    })
}
