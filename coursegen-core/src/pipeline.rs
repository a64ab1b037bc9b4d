//! Generation pipeline: transcript → course JSON → HTML.
//!
//! A [`CoursePipeline`] is a small status machine around a [`Generator`]:
//!
//! ```text
//! idle → generating-json → validating-json → generating-html → completed
//!              \________________\_________________\_________→ failed
//! ```
//!
//! Stages run strictly one after another. Every transition is reported to
//! the optional observer, in order, including the terminal one. There is no
//! retry and no backward transition; a failed pipeline has to be
//! [`reset`](CoursePipeline::reset) before it accepts new work.
//!
//! `validating-json` does no work of its own (validation happens inside the
//! JSON stage); observers still receive it between the two generation
//! stages.

use std::fmt;

use serde::Serialize;
use tracing::{error, info};

use crate::contract::TextGenerator;
use crate::course::CourseDefinition;
use crate::generator::{Generator, GeneratorError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineStatus {
    Idle,
    GeneratingJson,
    ValidatingJson,
    GeneratingHtml,
    Completed,
    Failed,
}

impl PipelineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStatus::Idle => "idle",
            PipelineStatus::GeneratingJson => "generating-json",
            PipelineStatus::ValidatingJson => "validating-json",
            PipelineStatus::GeneratingHtml => "generating-html",
            PipelineStatus::Completed => "completed",
            PipelineStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineResult {
    pub status: PipelineStatus,
    pub course: CourseDefinition,
    pub html: String,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Rejected before any stage was entered.
    #[error("Transcript is required")]
    EmptyTranscript,

    #[error("pipeline is {status}; reset it before starting a new run")]
    NotReady { status: PipelineStatus },

    #[error("pipeline failed during {stage}: {message}")]
    Stage {
        stage: PipelineStatus,
        message: String,
        #[source]
        source: GeneratorError,
    },
}

impl PipelineError {
    /// Stage the failure happened in, if one had been entered.
    pub fn stage(&self) -> Option<PipelineStatus> {
        match self {
            PipelineError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Called synchronously on every status transition.
pub type StatusObserver = Box<dyn Fn(PipelineStatus) + Send + Sync>;

pub struct CoursePipeline<C> {
    generator: Generator<C>,
    status: PipelineStatus,
    observer: Option<StatusObserver>,
}

impl<C: TextGenerator> CoursePipeline<C> {
    pub fn new(generator: Generator<C>) -> Self {
        Self {
            generator,
            status: PipelineStatus::Idle,
            observer: None,
        }
    }

    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(PipelineStatus) + Send + Sync + 'static,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn status(&self) -> PipelineStatus {
        self.status
    }

    pub fn generator(&self) -> &Generator<C> {
        &self.generator
    }

    /// Back to `idle`. Only the observer notices.
    pub fn reset(&mut self) {
        self.transition(PipelineStatus::Idle);
    }

    /// Runs transcript → JSON → HTML.
    pub async fn run(
        &mut self,
        transcript: &str,
        video_url: Option<&str>,
    ) -> Result<PipelineResult, PipelineError> {
        self.ensure_ready()?;
        let transcript = transcript.trim();
        if transcript.is_empty() {
            error!("Pipeline run rejected: empty transcript");
            return Err(PipelineError::EmptyTranscript);
        }
        let video_url = video_url.map(str::trim).filter(|u| !u.is_empty());

        self.transition(PipelineStatus::GeneratingJson);
        let course = match self
            .generator
            .generate_from_transcript(transcript, video_url)
            .await
        {
            Ok(course) => course,
            Err(e) => return Err(self.fail(PipelineStatus::GeneratingJson, e)),
        };

        self.transition(PipelineStatus::ValidatingJson);

        self.transition(PipelineStatus::GeneratingHtml);
        let html = match self.generator.generate_html(&course).await {
            Ok(html) => html,
            Err(e) => return Err(self.fail(PipelineStatus::GeneratingHtml, e)),
        };

        self.transition(PipelineStatus::Completed);
        info!(title = %course.meta.title, steps = course.steps.len(), "Pipeline completed");
        Ok(PipelineResult {
            status: PipelineStatus::Completed,
            course,
            html,
        })
    }

    /// Re-generates the course JSON from a change request. Skips the HTML
    /// stage.
    pub async fn refine(
        &mut self,
        course: &CourseDefinition,
        prompt: &str,
    ) -> Result<CourseDefinition, PipelineError> {
        self.ensure_ready()?;

        self.transition(PipelineStatus::GeneratingJson);
        match self.generator.refine(course, prompt).await {
            Ok(refined) => {
                self.transition(PipelineStatus::Completed);
                Ok(refined)
            }
            Err(e) => Err(self.fail(PipelineStatus::GeneratingJson, e)),
        }
    }

    fn ensure_ready(&self) -> Result<(), PipelineError> {
        match self.status {
            PipelineStatus::Idle | PipelineStatus::Completed => Ok(()),
            status => Err(PipelineError::NotReady { status }),
        }
    }

    fn transition(&mut self, next: PipelineStatus) {
        info!(from = %self.status, to = %next, "Pipeline transition");
        self.status = next;
        if let Some(observer) = &self.observer {
            observer(next);
        }
    }

    fn fail(&mut self, stage: PipelineStatus, source: GeneratorError) -> PipelineError {
        error!(stage = %stage, error = %source, "Pipeline stage failed");
        self.transition(PipelineStatus::Failed);
        PipelineError::Stage {
            stage,
            message: source.to_string(),
            source,
        }
    }
}
