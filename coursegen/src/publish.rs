//! HTTP implementation of the core [`Publisher`] trait.
//!
//! `POST {endpoint}` with `{"id": ..., "html": <base64>}`. A 409 means the id
//! is taken; the core retry loop picks a fresh one.

use async_trait::async_trait;
use coursegen_core::config::PublishConfig;
use coursegen_core::contract::{PublishError, Publisher};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

pub struct HttpPublisher {
    http: reqwest::Client,
    endpoint: String,
}

#[derive(Deserialize)]
struct PublishResponse {
    url: String,
}

impl HttpPublisher {
    pub fn new(config: &PublishConfig) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        if config.endpoint.trim().is_empty() {
            error!("Publish endpoint missing from config");
            return Err("publish.endpoint is not configured".into());
        }
        info!(endpoint = %config.endpoint, "Initialized HttpPublisher");
        Ok(Self {
            http: reqwest::Client::new(),
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl Publisher for HttpPublisher {
    async fn publish(&self, id: &str, html_base64: &str) -> Result<String, PublishError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&json!({ "id": id, "html": html_base64 }))
            .send()
            .await
            .map_err(|e| {
                error!(error = ?e, "Publish transport error");
                PublishError::Transport(e.to_string())
            })?;

        let status = response.status();
        if status == StatusCode::CONFLICT {
            return Err(PublishError::IdCollision(id.to_string()));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), message = %message, "Publish endpoint error");
            return Err(PublishError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: PublishResponse = response.json().await.map_err(|e| PublishError::Api {
            status: status.as_u16(),
            message: format!("unexpected publish response: {e}"),
        })?;
        Ok(body.url)
    }
}
