//! Field-level diffing between two versions of a course, replay of a change
//! list onto a base course, and natural-language refinement.
//!
//! [`detect_changes`] produces a reviewable list of [`Change`]s in a fixed
//! order: meta changes, then step changes, then resource changes. Within
//! steps, removals come first (in the original order), followed by
//! additions and modifications in the order of the modified course.
//!
//! Added and removed steps/resources carry their full payload, so
//! [`apply_changes`] can rebuild the modified course from the original and
//! the change list alone.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

use crate::contract::TextGenerator;
use crate::course::{CourseDefinition, CourseMeta, CourseResource, CourseStep, Difficulty};
use crate::generator::{Generator, GeneratorError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MetaField {
    Title,
    Description,
    Author,
    EstimatedTime,
    Difficulty,
}

impl MetaField {
    pub const ALL: [MetaField; 5] = [
        MetaField::Title,
        MetaField::Description,
        MetaField::Author,
        MetaField::EstimatedTime,
        MetaField::Difficulty,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetaField::Title => "title",
            MetaField::Description => "description",
            MetaField::Author => "author",
            MetaField::EstimatedTime => "estimatedTime",
            MetaField::Difficulty => "difficulty",
        }
    }

    fn get(&self, meta: &CourseMeta) -> Option<String> {
        match self {
            MetaField::Title => Some(meta.title.clone()),
            MetaField::Description => Some(meta.description.clone()),
            MetaField::Author => meta.author.clone(),
            MetaField::EstimatedTime => meta.estimated_time.clone(),
            MetaField::Difficulty => meta.difficulty.map(|d| d.as_str().to_string()),
        }
    }

    fn set(&self, meta: &mut CourseMeta, value: Option<String>) {
        match self {
            MetaField::Title => meta.title = value.unwrap_or_default(),
            MetaField::Description => meta.description = value.unwrap_or_default(),
            MetaField::Author => meta.author = value,
            MetaField::EstimatedTime => meta.estimated_time = value,
            MetaField::Difficulty => meta.difficulty = value.as_deref().and_then(Difficulty::parse),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StepField {
    Title,
    Content,
    VideoTimestamp,
    EstimatedTime,
}

impl StepField {
    pub const ALL: [StepField; 4] = [
        StepField::Title,
        StepField::Content,
        StepField::VideoTimestamp,
        StepField::EstimatedTime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepField::Title => "title",
            StepField::Content => "content",
            StepField::VideoTimestamp => "videoTimestamp",
            StepField::EstimatedTime => "estimatedTime",
        }
    }

    fn get(&self, step: &CourseStep) -> Option<String> {
        match self {
            StepField::Title => Some(step.title.clone()),
            StepField::Content => Some(step.content.clone()),
            StepField::VideoTimestamp => step.video_timestamp.clone(),
            StepField::EstimatedTime => step.estimated_time.clone(),
        }
    }

    fn set(&self, step: &mut CourseStep, value: Option<String>) {
        match self {
            StepField::Title => step.title = value.unwrap_or_default(),
            StepField::Content => step.content = value.unwrap_or_default(),
            StepField::VideoTimestamp => step.video_timestamp = value,
            StepField::EstimatedTime => step.estimated_time = value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaChange {
    pub field: MetaField,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum StepChange {
    Added {
        step: CourseStep,
    },
    Removed {
        step: CourseStep,
    },
    Modified {
        step_id: String,
        step_title: String,
        field: StepField,
        old_value: Option<String>,
        new_value: Option<String>,
    },
}

/// Resources are matched by URL only, so there is no `modified` action.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ResourceChange {
    Added { resource: CourseResource },
    Removed { resource: CourseResource },
}

/// One detected difference between two courses.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Change {
    Meta(MetaChange),
    Step(StepChange),
    Resource(ResourceChange),
}

fn show(value: &Option<String>) -> String {
    match value {
        Some(v) => format!("{v:?}"),
        None => "(none)".to_string(),
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::Meta(m) => write!(
                f,
                "meta.{}: {} -> {}",
                m.field.as_str(),
                show(&m.old_value),
                show(&m.new_value)
            ),
            Change::Step(StepChange::Added { step }) => {
                write!(f, "step '{}' added ({})", step.id, step.title)
            }
            Change::Step(StepChange::Removed { step }) => {
                write!(f, "step '{}' removed ({})", step.id, step.title)
            }
            Change::Step(StepChange::Modified {
                step_id,
                field,
                old_value,
                new_value,
                ..
            }) => write!(
                f,
                "step '{}'.{}: {} -> {}",
                step_id,
                field.as_str(),
                show(old_value),
                show(new_value)
            ),
            Change::Resource(ResourceChange::Added { resource }) => {
                write!(f, "resource added: {}", resource.url)
            }
            Change::Resource(ResourceChange::Removed { resource }) => {
                write!(f, "resource removed: {}", resource.url)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Original,
    Modified,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Original => f.write_str("original"),
            Side::Modified => f.write_str("modified"),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DiffError {
    #[error("duplicate step id '{id}' in {side} course")]
    DuplicateStepId { id: String, side: Side },
}

fn index_steps(steps: &[CourseStep], side: Side) -> Result<HashMap<&str, &CourseStep>, DiffError> {
    let mut map = HashMap::with_capacity(steps.len());
    for step in steps {
        if map.insert(step.id.as_str(), step).is_some() {
            return Err(DiffError::DuplicateStepId {
                id: step.id.clone(),
                side,
            });
        }
    }
    Ok(map)
}

/// Lists every field-level difference between `original` and `modified`.
pub fn detect_changes(
    original: &CourseDefinition,
    modified: &CourseDefinition,
) -> Result<Vec<Change>, DiffError> {
    let mut changes = Vec::new();

    for field in MetaField::ALL {
        let old_value = field.get(&original.meta);
        let new_value = field.get(&modified.meta);
        if old_value != new_value {
            changes.push(Change::Meta(MetaChange {
                field,
                old_value,
                new_value,
            }));
        }
    }

    let original_steps = index_steps(&original.steps, Side::Original)?;
    let modified_steps = index_steps(&modified.steps, Side::Modified)?;

    for step in &original.steps {
        if !modified_steps.contains_key(step.id.as_str()) {
            changes.push(Change::Step(StepChange::Removed { step: step.clone() }));
        }
    }

    for step in &modified.steps {
        let Some(before) = original_steps.get(step.id.as_str()) else {
            changes.push(Change::Step(StepChange::Added { step: step.clone() }));
            continue;
        };
        for field in StepField::ALL {
            let old_value = field.get(before);
            let new_value = field.get(step);
            if old_value != new_value {
                changes.push(Change::Step(StepChange::Modified {
                    step_id: step.id.clone(),
                    step_title: step.title.clone(),
                    field,
                    old_value,
                    new_value,
                }));
            }
        }
    }

    let original_urls: HashSet<&str> = original.resources.iter().map(|r| r.url.as_str()).collect();
    let modified_urls: HashSet<&str> = modified.resources.iter().map(|r| r.url.as_str()).collect();

    for resource in &original.resources {
        if !modified_urls.contains(resource.url.as_str()) {
            changes.push(Change::Resource(ResourceChange::Removed {
                resource: resource.clone(),
            }));
        }
    }
    for resource in &modified.resources {
        if !original_urls.contains(resource.url.as_str()) {
            changes.push(Change::Resource(ResourceChange::Added {
                resource: resource.clone(),
            }));
        }
    }

    Ok(changes)
}

/// Applies `changes` in order to a copy of `course`.
///
/// Modifications addressed to a step id that does not exist are ignored.
pub fn apply_changes(course: &CourseDefinition, changes: &[Change]) -> CourseDefinition {
    let mut result = course.clone();

    for change in changes {
        match change {
            Change::Meta(m) => m.field.set(&mut result.meta, m.new_value.clone()),
            Change::Step(StepChange::Added { step }) => result.steps.push(step.clone()),
            Change::Step(StepChange::Removed { step }) => {
                result.steps.retain(|s| s.id != step.id)
            }
            Change::Step(StepChange::Modified {
                step_id,
                field,
                new_value,
                ..
            }) => {
                if let Some(step) = result.step_mut(step_id) {
                    field.set(step, new_value.clone());
                }
            }
            Change::Resource(ResourceChange::Added { resource }) => {
                result.resources.push(resource.clone())
            }
            Change::Resource(ResourceChange::Removed { resource }) => {
                result.resources.retain(|r| r.url != resource.url)
            }
        }
    }

    result
}

#[derive(Debug, thiserror::Error)]
#[error("course refinement failed: {0}")]
pub struct RefineError(#[from] pub GeneratorError);

/// Refines `course` with a natural-language prompt. The result has already
/// been validated by the generator.
pub async fn refine_course<C: TextGenerator>(
    generator: &Generator<C>,
    course: &CourseDefinition,
    prompt: &str,
) -> Result<CourseDefinition, RefineError> {
    let refined = generator.refine(course, prompt).await?;
    info!(title = %refined.meta.title, "Course refined");
    Ok(refined)
}

/// Fail-open variant of [`refine_course`]: on any failure the error is
/// logged and an unchanged copy of `course` is returned. Callers cannot tell
/// a failed refinement from a no-op one; use [`refine_course`] when that
/// matters.
pub async fn refine_course_or_original<C: TextGenerator>(
    generator: &Generator<C>,
    course: &CourseDefinition,
    prompt: &str,
) -> CourseDefinition {
    match refine_course(generator, course, prompt).await {
        Ok(refined) => refined,
        Err(e) => {
            warn!(error = %e, "Refinement failed, keeping original course");
            course.clone()
        }
    }
}
