//! Record-level orchestration: generate a course for a stored record and
//! publish it.
//!
//! Each step is fail-fast. A failed generation puts the record back to
//! `draft` so it can be retried; the pipeline error itself is returned
//! untouched so callers still see which stage failed.

use chrono::Utc;
use tracing::{error, info};

use crate::config::PublishConfig;
use crate::contract::{DocumentStore, PublishError, Publisher, TextGenerator};
use crate::pipeline::{CoursePipeline, PipelineError};
use crate::publish::{publish_html, PublishOutcome};
use crate::record::{CourseRecord, CourseRepository, CourseStatus, PublishEntry, RecordError};

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("course '{0}' has no transcript")]
    MissingTranscript(String),

    #[error("course '{0}' has no generated HTML; generate it first")]
    NotGenerated(String),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// Runs the pipeline on the record's transcript and stores the result.
pub async fn generate_for_record<S, C>(
    repo: &CourseRepository<S>,
    pipeline: &mut CoursePipeline<C>,
    id: &str,
) -> Result<CourseRecord, WorkflowError>
where
    S: DocumentStore,
    C: TextGenerator,
{
    let record = repo.get(id).await?;
    let transcript = record
        .transcript
        .clone()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| WorkflowError::MissingTranscript(id.to_string()))?;
    let video_url = record.video_url.clone();

    let mut processing = record;
    processing.status = CourseStatus::Processing;
    repo.update(processing).await?;
    info!(id, "[GENERATE] Record marked processing");

    match pipeline.run(&transcript, video_url.as_deref()).await {
        Ok(result) => {
            let saved = repo.save_generated(id, result.course, result.html).await?;
            info!(id, version = saved.version, "[GENERATE] Course generated and saved");
            Ok(saved)
        }
        Err(e) => {
            error!(id, error = %e, "[GENERATE][ERROR] Pipeline failed, reverting record to draft");
            if let Err(revert) = repo.set_status(id, CourseStatus::Draft).await {
                error!(id, error = %revert, "[GENERATE][ERROR] Failed to revert record to draft");
            }
            Err(e.into())
        }
    }
}

/// Publishes the record's HTML and appends the URL to its history.
pub async fn publish_record<S, P>(
    repo: &CourseRepository<S>,
    publisher: &P,
    config: &PublishConfig,
    id: &str,
) -> Result<(CourseRecord, PublishOutcome), WorkflowError>
where
    S: DocumentStore,
    P: Publisher + ?Sized,
{
    let mut record = repo.get(id).await?;
    let html = record
        .html
        .as_deref()
        .filter(|h| !h.trim().is_empty())
        .ok_or_else(|| WorkflowError::NotGenerated(id.to_string()))?;

    let outcome = publish_html(publisher, html, config).await?;

    record.publish_history.push(PublishEntry {
        url: outcome.url.clone(),
        published_at: Utc::now(),
    });
    record.status = CourseStatus::Published;
    let record = repo.update(record).await?;
    info!(id, url = %outcome.url, "[PUBLISH] Course published");
    Ok((record, outcome))
}
