//! Publishing rendered HTML to the permanent hosting endpoint.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::PublishConfig;
use crate::contract::{PublishError, Publisher};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishOutcome {
    pub id: String,
    pub url: String,
    pub attempts: u32,
}

/// Fresh client-side id: 12 lowercase hex characters.
pub fn generate_publish_id() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

/// Publishes `html`, retrying with a fresh id whenever the endpoint reports
/// an id collision. Any other error is returned as is.
pub async fn publish_html<P: Publisher + ?Sized>(
    publisher: &P,
    html: &str,
    config: &PublishConfig,
) -> Result<PublishOutcome, PublishError> {
    if html.trim().is_empty() {
        return Err(PublishError::EmptyHtml);
    }
    let encoded = STANDARD.encode(html.as_bytes());
    let max_attempts = config.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        let id = generate_publish_id();
        match publisher.publish(&id, &encoded).await {
            Ok(url) => {
                info!(id = %id, url = %url, attempt, "Published course HTML");
                return Ok(PublishOutcome {
                    id,
                    url,
                    attempts: attempt,
                });
            }
            Err(PublishError::IdCollision(taken)) => {
                warn!(id = %taken, attempt, max_attempts, "Publish id collision, retrying");
            }
            Err(e) => return Err(e),
        }
    }

    Err(PublishError::TooManyCollisions {
        attempts: max_attempts,
    })
}
