//! # Text generation client
//!
//! [`ChatCompletionsClient`] implements the core's [`TextGenerator`] trait
//! against an OpenAI-compatible `/chat/completions` endpoint.
//!
//! - Every request carries a fixed timeout taken from [`GenerationConfig`].
//! - HTTP 429 is surfaced as [`GenerationError::RateLimited`] and retried up
//!   to `max_retries` times, honouring `Retry-After` when present. Nothing
//!   else is retried.
//! - Model output is cleaned of markdown code fences before parsing.

use std::time::Duration;

use async_trait::async_trait;
use coursegen_core::config::GenerationConfig;
use coursegen_core::contract::{GenerateRequest, GenerationError, TextGenerator};
use coursegen_core::course::CourseDefinition;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

const COURSE_SCHEMA: &str = r#"{
  "meta": {
    "title": "string, at most 200 characters",
    "description": "string, at most 2000 characters",
    "author": "optional string",
    "estimatedTime": "optional string such as \"45 min\"",
    "difficulty": "optional: beginner | intermediate | advanced",
    "prerequisites": ["optional strings"]
  },
  "steps": [
    {
      "id": "unique slug: letters, digits, - and _ only",
      "title": "string, at most 200 characters",
      "content": "markdown body, never empty",
      "videoUrl": "optional, the source video URL",
      "videoTimestamp": "optional, M:SS or H:MM:SS where the step starts",
      "estimatedTime": "optional string",
      "checkpoint": { "label": "what the learner should have done", "hint": "optional" }
    }
  ],
  "resources": [
    { "label": "string", "url": "absolute URL", "description": "optional" }
  ]
}"#;

fn json_system_prompt() -> String {
    format!(
        r#"You turn video transcripts into hands-on, step-by-step courses.

OUTPUT: Return ONLY valid JSON matching this shape:
{COURSE_SCHEMA}

RULES:
- At least one step; step ids must be unique
- Use transcript timestamps for videoTimestamp when they are available
- Write step content as practical markdown instructions, not a summary
- Output ONLY JSON, nothing else"#
    )
}

const HTML_SYSTEM_PROMPT: &str = r#"You render course definitions as a single self-contained HTML page.

RULES:
- Inline all CSS, no external scripts or stylesheets
- One section per step, in order, with its title, content rendered from markdown and checkpoint if present
- Embed the step video at its timestamp when a videoUrl is present
- List resources at the end
- Output ONLY the HTML document, nothing else"#;

fn refine_system_prompt() -> String {
    format!(
        r#"You edit course definitions according to the author's request.

Return the COMPLETE updated course as JSON with the same shape:
{COURSE_SCHEMA}

RULES:
- Change only what the request asks for
- Keep ids of unchanged steps stable
- Output ONLY JSON, nothing else"#
    )
}

pub struct ChatCompletionsClient {
    http: reqwest::Client,
    config: GenerationConfig,
    api_key: String,
}

impl ChatCompletionsClient {
    pub fn new(config: GenerationConfig) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let api_key = match config.api_key.clone() {
            Some(key) if !key.is_empty() => key,
            _ => {
                error!("Generation API key missing from config");
                return Err("generation API key is not configured".into());
            }
        };
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        info!(
            api_url = %config.api_url,
            model = %config.model,
            timeout_secs = config.timeout_secs,
            "Initialized ChatCompletionsClient"
        );
        Ok(Self {
            http,
            config,
            api_key,
        })
    }

    async fn complete(&self, system: &str, user: &str, json_mode: bool) -> Result<String, GenerationError> {
        let mut attempt = 0;
        loop {
            let error = match self.send_once(system, user, json_mode).await {
                Ok(content) => return Ok(content),
                Err(e) => e,
            };
            let Some(wait) = retry_delay(&error, attempt, self.config.max_retries) else {
                return Err(error);
            };
            attempt += 1;
            warn!(attempt, wait_secs = wait.as_secs(), "Rate limited by text generation API, backing off");
            tokio::time::sleep(wait).await;
        }
    }

    async fn send_once(&self, system: &str, user: &str, json_mode: bool) -> Result<String, GenerationError> {
        let mut body = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "temperature": self.config.temperature,
        });
        if json_mode {
            body["response_format"] = json!({ "type": "json_object" });
        }

        let response = self
            .http
            .post(&self.config.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(GenerationError::RateLimited { retry_after });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), message = %message, "Text generation API error");
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;
        let content = extract_content(&value)?;
        debug!(chars = content.len(), "Received completion");
        Ok(content)
    }

    fn transport_error(&self, e: reqwest::Error) -> GenerationError {
        if e.is_timeout() {
            error!(timeout_secs = self.config.timeout_secs, "Text generation request timed out");
            GenerationError::Timeout(self.config.timeout())
        } else {
            error!(error = ?e, "Text generation transport error");
            GenerationError::Transport(e.to_string())
        }
    }
}

/// How long to wait before retrying after `error`, or `None` when the error
/// is final. Only rate limiting is retried, at most `max_retries` times;
/// `attempt` counts the retries already made. `Retry-After` wins over the
/// linear 2s-per-attempt backoff.
pub fn retry_delay(error: &GenerationError, attempt: u32, max_retries: u32) -> Option<Duration> {
    if !error.is_rate_limited() || attempt >= max_retries {
        return None;
    }
    match error {
        GenerationError::RateLimited {
            retry_after: Some(wait),
        } => Some(*wait),
        _ => Some(Duration::from_secs(2 * (u64::from(attempt) + 1))),
    }
}

/// Pulls the assistant message out of a chat completions response.
pub fn extract_content(response: &Value) -> Result<String, GenerationError> {
    response["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| GenerationError::Malformed(format!("Invalid API response: {response}")))
}

/// Removes a surrounding markdown code fence (```json ... ```), if any.
pub fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

pub fn parse_course(content: &str) -> Result<CourseDefinition, GenerationError> {
    serde_json::from_str(strip_code_fences(content)).map_err(|e| {
        error!(error = %e, "Model returned a course that does not parse");
        GenerationError::Malformed(format!("course JSON: {e}"))
    })
}

#[async_trait]
impl TextGenerator for ChatCompletionsClient {
    async fn generate_json<'a>(
        &self,
        req: GenerateRequest<'a>,
    ) -> Result<CourseDefinition, GenerationError> {
        let mut user = String::new();
        if let Some(url) = req.video_url {
            user.push_str(&format!("Source video: {url}\n\n"));
        }
        user.push_str("Transcript:\n\n");
        user.push_str(req.transcript);

        let content = self.complete(&json_system_prompt(), &user, true).await?;
        parse_course(&content)
    }

    async fn generate_html(&self, course: &CourseDefinition) -> Result<String, GenerationError> {
        let course_json = serde_json::to_string_pretty(course)
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;
        let content = self
            .complete(HTML_SYSTEM_PROMPT, &course_json, false)
            .await?;
        Ok(strip_code_fences(&content).to_string())
    }

    async fn refine_json(
        &self,
        course: &CourseDefinition,
        prompt: &str,
    ) -> Result<CourseDefinition, GenerationError> {
        let course_json = serde_json::to_string_pretty(course)
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;
        let user = format!("Current course:\n{course_json}\n\nRequested change:\n{prompt}");
        let content = self.complete(&refine_system_prompt(), &user, true).await?;
        parse_course(&content)
    }
}
