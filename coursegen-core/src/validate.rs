//! Validation of course definitions.
//!
//! Every check here is pure: it never panics and never short-circuits, so a
//! single call reports every violated rule. Results are plain values
//! ([`ValidationResult`]) rather than errors; callers decide what to do with
//! an invalid course.
//!
//! The module also hosts the format helpers the checks rely on: video URL
//! pattern matching ([`parse_video_url`]) and timestamp parsing
//! ([`parse_timestamp`]).

use std::collections::HashSet;

use regex::Regex;
use serde::Serialize;

use crate::course::{CourseDefinition, CourseMeta, CourseResource, CourseStep};

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_DESCRIPTION_CHARS: usize = 2000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Hosting service a step video lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoProvider {
    Youtube,
    Vimeo,
    Loom,
    Wistia,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoSource {
    pub provider: VideoProvider,
    pub video_id: String,
}

fn video_patterns() -> Vec<(VideoProvider, &'static str)> {
    vec![
        (
            VideoProvider::Youtube,
            r"^(?:https?://)?(?:www\.|m\.)?youtube\.com/(?:watch\?(?:[^#]*&)?v=|embed/|shorts/|live/)([A-Za-z0-9_-]{11})",
        ),
        (
            VideoProvider::Youtube,
            r"^(?:https?://)?youtu\.be/([A-Za-z0-9_-]{11})",
        ),
        (
            VideoProvider::Vimeo,
            r"^(?:https?://)?(?:www\.|player\.)?vimeo\.com/(?:video/)?(\d+)",
        ),
        (
            VideoProvider::Loom,
            r"^(?:https?://)?(?:www\.)?loom\.com/(?:share|embed)/([A-Za-z0-9]+)",
        ),
        (
            VideoProvider::Wistia,
            r"^(?:https?://)?(?:[a-z0-9-]+\.)?(?:wistia\.com|wistia\.net)/(?:medias|embed/iframe)/([A-Za-z0-9]+)",
        ),
    ]
}

/// Matches `url` against the supported video hosts and extracts the video id.
pub fn parse_video_url(url: &str) -> Option<VideoSource> {
    let url = url.trim();
    for (provider, pattern) in video_patterns() {
        let re = Regex::new(pattern).ok()?;
        if let Some(caps) = re.captures(url) {
            return Some(VideoSource {
                provider,
                video_id: caps.get(1)?.as_str().to_string(),
            });
        }
    }
    None
}

pub fn is_supported_video_url(url: &str) -> bool {
    parse_video_url(url).is_some()
}

/// Parses `"M:SS"`, `"H:MM:SS"` or bare seconds into a number of seconds.
///
/// The leading field is unconstrained (`"61:00"` is fine); every following
/// field must be `00`-`59`.
pub fn parse_timestamp(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let bare = Regex::new(r"^\d+$").ok()?;
    if bare.is_match(raw) {
        return raw.parse().ok();
    }

    let minutes = Regex::new(r"^(\d+):([0-5]\d)$").ok()?;
    if let Some(caps) = minutes.captures(raw) {
        let m: u64 = caps[1].parse().ok()?;
        let s: u64 = caps[2].parse().ok()?;
        return m.checked_mul(60)?.checked_add(s);
    }

    let hours = Regex::new(r"^(\d+):([0-5]\d):([0-5]\d)$").ok()?;
    if let Some(caps) = hours.captures(raw) {
        let h: u64 = caps[1].parse().ok()?;
        let m: u64 = caps[2].parse().ok()?;
        let s: u64 = caps[3].parse().ok()?;
        return h.checked_mul(3600)?.checked_add(m * 60 + s);
    }

    None
}

pub fn is_valid_timestamp(raw: &str) -> bool {
    parse_timestamp(raw).is_some()
}

/// Step ids are limited to ASCII letters, digits, hyphen and underscore.
pub fn is_valid_step_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Absolute URL check, delegated to the `url` crate.
pub fn is_valid_url(raw: &str) -> bool {
    url::Url::parse(raw.trim()).is_ok()
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

pub fn validate_meta(meta: &CourseMeta) -> ValidationResult {
    let mut errors = Vec::new();

    if is_blank(&meta.title) {
        errors.push("Title is required".to_string());
    } else if meta.title.chars().count() > MAX_TITLE_CHARS {
        errors.push(format!(
            "Title must be {MAX_TITLE_CHARS} characters or less"
        ));
    }

    if is_blank(&meta.description) {
        errors.push("Description is required".to_string());
    } else if meta.description.chars().count() > MAX_DESCRIPTION_CHARS {
        errors.push(format!(
            "Description must be {MAX_DESCRIPTION_CHARS} characters or less"
        ));
    }

    if meta.prerequisites.iter().any(|p| is_blank(p)) {
        errors.push("Prerequisites must not be empty".to_string());
    }

    ValidationResult::from_errors(errors)
}

pub fn validate_step(step: &CourseStep) -> ValidationResult {
    let mut errors = Vec::new();

    if is_blank(&step.id) {
        errors.push("Step id is required".to_string());
    } else if !is_valid_step_id(&step.id) {
        errors.push(format!(
            "Step id '{}' may only contain letters, digits, hyphens and underscores",
            step.id
        ));
    }

    if is_blank(&step.title) {
        errors.push("Step title is required".to_string());
    } else if step.title.chars().count() > MAX_TITLE_CHARS {
        errors.push(format!(
            "Step title must be {MAX_TITLE_CHARS} characters or less"
        ));
    }

    if is_blank(&step.content) {
        errors.push("Step content is required".to_string());
    }

    if let Some(url) = step.video_url.as_deref().filter(|u| !is_blank(u)) {
        if !is_supported_video_url(url) {
            errors.push(format!("Unsupported video URL: {url}"));
        }
    }

    if let Some(ts) = step.video_timestamp.as_deref().filter(|t| !is_blank(t)) {
        if !is_valid_timestamp(ts) {
            errors.push(format!(
                "Invalid video timestamp '{ts}' (expected M:SS, H:MM:SS or seconds)"
            ));
        }
    }

    if let Some(checkpoint) = &step.checkpoint {
        if is_blank(&checkpoint.label) {
            errors.push("Checkpoint label is required".to_string());
        }
    }

    ValidationResult::from_errors(errors)
}

pub fn validate_resource(resource: &CourseResource) -> ValidationResult {
    let mut errors = Vec::new();

    if is_blank(&resource.label) {
        errors.push("Resource label is required".to_string());
    }

    if is_blank(&resource.url) {
        errors.push("Resource URL is required".to_string());
    } else if !is_valid_url(&resource.url) {
        errors.push(format!("Invalid resource URL: {}", resource.url));
    }

    ValidationResult::from_errors(errors)
}

/// Validates the whole course. Step and resource errors are prefixed with
/// their 1-based position.
pub fn validate_course(course: &CourseDefinition) -> ValidationResult {
    let mut errors = validate_meta(&course.meta).errors;

    if course.steps.is_empty() {
        errors.push("Course must have at least one step".to_string());
    }

    let mut seen = HashSet::new();
    for (i, step) in course.steps.iter().enumerate() {
        for e in validate_step(step).errors {
            errors.push(format!("Step {}: {e}", i + 1));
        }
        if !step.id.is_empty() && !seen.insert(step.id.as_str()) {
            errors.push(format!("Step {}: Duplicate step id '{}'", i + 1, step.id));
        }
    }

    for (i, resource) in course.resources.iter().enumerate() {
        for e in validate_resource(resource).errors {
            errors.push(format!("Resource {}: {e}", i + 1));
        }
    }

    ValidationResult::from_errors(errors)
}
