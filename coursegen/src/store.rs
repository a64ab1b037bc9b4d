//! HTTP implementation of the core [`DocumentStore`] trait.
//!
//! Documents live at `{base_url}/{db}/{key}`; listing a database is
//! `GET {base_url}/{db}` and returns `[{"key": ..., "value": ...}]`.
//! A bearer token is sent when `STORE_API_KEY` is configured.
//!
//! Updates are conditional: the expected record version goes out as
//! `If-Match: "<version>"` and the store answers 409 or 412 when the stored
//! document has moved on.

use async_trait::async_trait;
use coursegen_core::config::StoreConfig;
use coursegen_core::contract::{DocumentStore, StoreError, StoredDocument};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info};

pub struct HttpDocumentStore {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct ListedDocument {
    key: String,
    value: Value,
}

impl HttpDocumentStore {
    pub fn new(config: &StoreConfig) -> Self {
        info!(
            base_url = %config.base_url,
            auth = config.api_key.is_some(),
            "Initialized HttpDocumentStore"
        );
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    fn document_url(&self, db: &str, key: &str) -> String {
        format!("{}/{}/{}", self.base_url, db, key)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        self.authorized(request).send().await.map_err(|e| {
            error!(error = ?e, "Document store transport error");
            StoreError::Transport(e.to_string())
        })
    }
}

async fn api_error(response: Response) -> StoreError {
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    error!(status, message = %message, "Document store API error");
    StoreError::Api { status, message }
}

fn not_found(db: &str, key: &str) -> StoreError {
    StoreError::NotFound {
        db: db.to_string(),
        key: key.to_string(),
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn create_document(&self, db: &str, key: &str, value: Value) -> Result<(), StoreError> {
        debug!(db, key, "Creating document");
        let response = self
            .send(self.http.post(self.document_url(db, key)).json(&value))
            .await?;
        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::CONFLICT => Err(StoreError::AlreadyExists {
                db: db.to_string(),
                key: key.to_string(),
            }),
            _ => Err(api_error(response).await),
        }
    }

    async fn get_document(&self, db: &str, key: &str) -> Result<Option<Value>, StoreError> {
        debug!(db, key, "Fetching document");
        let response = self.send(self.http.get(self.document_url(db, key))).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| StoreError::Transport(e.to_string()))?;
                Ok(Some(serde_json::from_slice(&bytes)?))
            }
            _ => Err(api_error(response).await),
        }
    }

    async fn update_document(
        &self,
        db: &str,
        key: &str,
        value: Value,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        debug!(db, key, expected_version, "Updating document");
        let response = self
            .send(
                self.http
                    .put(self.document_url(db, key))
                    .header(reqwest::header::IF_MATCH, format!("\"{expected_version}\""))
                    .json(&value),
            )
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(not_found(db, key)),
            StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => {
                Err(StoreError::VersionMismatch {
                    db: db.to_string(),
                    key: key.to_string(),
                    expected: expected_version,
                })
            }
            s if s.is_success() => Ok(()),
            _ => Err(api_error(response).await),
        }
    }

    async fn delete_document(&self, db: &str, key: &str) -> Result<(), StoreError> {
        debug!(db, key, "Deleting document");
        let response = self
            .send(self.http.delete(self.document_url(db, key)))
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(not_found(db, key)),
            s if s.is_success() => Ok(()),
            _ => Err(api_error(response).await),
        }
    }

    async fn list_documents(&self, db: &str) -> Result<Vec<StoredDocument>, StoreError> {
        let url = format!("{}/{}", self.base_url, db);
        let response = self.send(self.http.get(url)).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(Vec::new()),
            s if s.is_success() => {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| StoreError::Transport(e.to_string()))?;
                let listed: Vec<ListedDocument> = serde_json::from_slice(&bytes)?;
                debug!(db, count = listed.len(), "Listed documents");
                Ok(listed
                    .into_iter()
                    .map(|doc| StoredDocument {
                        key: doc.key,
                        value: doc.value,
                    })
                    .collect())
            }
            _ => Err(api_error(response).await),
        }
    }
}
