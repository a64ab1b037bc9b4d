//! Course generation on top of a [`TextGenerator`].
//!
//! The generator owns the rules the model output has to obey: every course
//! coming back from the text-generation API is checked with
//! [`validate_course`] before it is handed to the caller.

use tracing::{debug, error, info};

use crate::contract::{GenerateRequest, GenerationError, TextGenerator};
use crate::course::CourseDefinition;
use crate::validate::validate_course;

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error(transparent)]
    Client(#[from] GenerationError),

    #[error("generated course is invalid: {}", errors.join("; "))]
    InvalidCourse { errors: Vec<String> },

    #[error("generated HTML is empty")]
    EmptyHtml,

    #[error("refinement prompt is required")]
    EmptyPrompt,
}

pub struct Generator<C> {
    client: C,
}

impl<C: TextGenerator> Generator<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Transcript → validated course. The transcript is kept on the course
    /// when the model did not echo it back.
    pub async fn generate_from_transcript(
        &self,
        transcript: &str,
        video_url: Option<&str>,
    ) -> Result<CourseDefinition, GeneratorError> {
        info!(
            transcript_chars = transcript.chars().count(),
            video_url = video_url.unwrap_or(""),
            "Generating course from transcript"
        );
        let mut course = self
            .client
            .generate_json(GenerateRequest {
                transcript,
                video_url,
            })
            .await
            .map_err(|e| {
                error!(error = %e, "Course JSON generation failed");
                e
            })?;

        ensure_valid(&course)?;
        if course.transcript.is_none() {
            course.transcript = Some(transcript.to_string());
        }
        info!(steps = course.steps.len(), title = %course.meta.title, "Course generated");
        Ok(course)
    }

    /// Course → HTML page.
    pub async fn generate_html(&self, course: &CourseDefinition) -> Result<String, GeneratorError> {
        info!(title = %course.meta.title, "Generating course HTML");
        let html = self.client.generate_html(course).await.map_err(|e| {
            error!(error = %e, "Course HTML generation failed");
            e
        })?;
        if html.trim().is_empty() {
            error!("Text generation returned empty HTML");
            return Err(GeneratorError::EmptyHtml);
        }
        debug!(bytes = html.len(), "Course HTML generated");
        Ok(html)
    }

    /// Applies a natural-language change request and validates the result.
    pub async fn refine(
        &self,
        course: &CourseDefinition,
        prompt: &str,
    ) -> Result<CourseDefinition, GeneratorError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(GeneratorError::EmptyPrompt);
        }
        info!(title = %course.meta.title, "Refining course");
        let mut refined = self.client.refine_json(course, prompt).await.map_err(|e| {
            error!(error = %e, "Course refinement failed");
            e
        })?;
        ensure_valid(&refined)?;
        if refined.transcript.is_none() {
            refined.transcript = course.transcript.clone();
        }
        Ok(refined)
    }
}

fn ensure_valid(course: &CourseDefinition) -> Result<(), GeneratorError> {
    let result = validate_course(course);
    if result.valid {
        Ok(())
    } else {
        error!(errors = ?result.errors, "Generated course failed validation");
        Err(GeneratorError::InvalidCourse {
            errors: result.errors,
        })
    }
}
