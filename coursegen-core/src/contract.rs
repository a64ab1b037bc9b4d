//! # contract: interfaces to the external collaborators
//!
//! The core never talks to the network directly. Everything it needs from
//! the outside world goes through one of three traits:
//!
//! - [`TextGenerator`]: the text-generation API (transcript→JSON,
//!   JSON→HTML, refine).
//! - [`DocumentStore`]: a generic key/value document API used to persist
//!   course records.
//! - [`Publisher`]: the hosting endpoint that turns HTML into a permanent URL.
//!
//! The CLI crate provides HTTP implementations; tests use the `mockall`
//! mocks generated here (exported with the `test-export-mocks` feature).
//!
//! Retries, if any, belong to the implementations. The core calls each
//! method exactly once per operation.

use async_trait::async_trait;
use std::time::Duration;

use mockall::automock;

use crate::course::CourseDefinition;

/// Input for transcript→course generation.
#[derive(Debug, Clone, Copy)]
pub struct GenerateRequest<'a> {
    /// Raw transcript text, already trimmed and non-empty.
    pub transcript: &'a str,
    /// Source video, so the model can attach it to steps.
    pub video_url: Option<&'a str>,
}

/// Failure reported by a [`TextGenerator`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("text generation API rate limit exceeded")]
    RateLimited { retry_after: Option<Duration> },

    #[error("text generation API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("text generation request timed out after {0:?}")]
    Timeout(Duration),

    #[error("text generation transport error: {0}")]
    Transport(String),

    #[error("malformed text generation response: {0}")]
    Malformed(String),
}

impl GenerationError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, GenerationError::RateLimited { .. })
    }
}

/// Trait for the text-generation API.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Turn a transcript into a course definition.
    async fn generate_json<'a>(
        &self,
        req: GenerateRequest<'a>,
    ) -> Result<CourseDefinition, GenerationError>;

    /// Render a course definition as a standalone HTML page.
    async fn generate_html(&self, course: &CourseDefinition) -> Result<String, GenerationError>;

    /// Apply a natural-language change request to a course definition.
    async fn refine_json(
        &self,
        course: &CourseDefinition,
        prompt: &str,
    ) -> Result<CourseDefinition, GenerationError>;
}

/// A stored document and its key.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub key: String,
    pub value: serde_json::Value,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document '{key}' not found in '{db}'")]
    NotFound { db: String, key: String },

    #[error("document '{key}' already exists in '{db}'")]
    AlreadyExists { db: String, key: String },

    /// A conditional update found a different `version` than expected.
    #[error("document '{key}' in '{db}' is not at version {expected}")]
    VersionMismatch {
        db: String,
        key: String,
        expected: u64,
    },

    #[error("document store returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("document store transport error: {0}")]
    Transport(String),

    #[error("document store payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Trait for the generic key/value document store.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn create_document(
        &self,
        db: &str,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), StoreError>;

    /// Fetch a document; `Ok(None)` when the key does not exist.
    async fn get_document(
        &self,
        db: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, StoreError>;

    /// Replace a document only if its stored `version` field still equals
    /// `expected_version`. The compare and the write happen in one step on
    /// the store side; a mismatch is [`StoreError::VersionMismatch`].
    async fn update_document(
        &self,
        db: &str,
        key: &str,
        value: serde_json::Value,
        expected_version: u64,
    ) -> Result<(), StoreError>;

    async fn delete_document(&self, db: &str, key: &str) -> Result<(), StoreError>;

    async fn list_documents(&self, db: &str) -> Result<Vec<StoredDocument>, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The client-generated id is already taken; retry with a fresh one.
    #[error("publish id '{0}' is already in use")]
    IdCollision(String),

    #[error("cannot publish empty HTML")]
    EmptyHtml,

    #[error("publish endpoint returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("publish transport error: {0}")]
    Transport(String),

    #[error("gave up publishing after {attempts} id collisions")]
    TooManyCollisions { attempts: u32 },
}

/// Trait for the permanent hosting endpoint.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Store base64-encoded HTML under `id` and return its permanent URL.
    async fn publish(&self, id: &str, html_base64: &str) -> Result<String, PublishError>;
}
