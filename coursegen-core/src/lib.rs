#![doc = "coursegen-core: core logic library for coursegen."]

//! This crate turns video transcripts into structured, step-based courses.
//! It holds the data model, validation, the generation pipeline, the
//! diff/refine engine and the record/publish flows. Network access lives
//! behind the traits in [`contract`]; the `coursegen` binary provides the
//! HTTP implementations.
//!
//! # Usage
//! Build a [`generator::Generator`] around any [`contract::TextGenerator`],
//! wrap it in a [`pipeline::CoursePipeline`] and call `run`.

pub mod config;
pub mod contract;
pub mod course;
pub mod diff;
pub mod generator;
pub mod pipeline;
pub mod publish;
pub mod record;
pub mod transcript;
pub mod validate;
pub mod workflow;

pub use course::{Checkpoint, CourseDefinition, CourseMeta, CourseResource, CourseStep, Difficulty};
pub use diff::{apply_changes, detect_changes, refine_course, refine_course_or_original, Change};
pub use generator::{Generator, GeneratorError};
pub use pipeline::{CoursePipeline, PipelineError, PipelineResult, PipelineStatus};
pub use validate::{validate_course, ValidationResult};
