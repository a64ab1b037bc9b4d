use coursegen_core::contract::{GenerationError, MockTextGenerator};
use coursegen_core::course::{CourseDefinition, CourseMeta, CourseResource, CourseStep, Difficulty};
use coursegen_core::diff::{
    apply_changes, detect_changes, refine_course, refine_course_or_original, Change, DiffError,
    MetaField, ResourceChange, Side, StepChange, StepField,
};
use coursegen_core::generator::{Generator, GeneratorError};
use serde_json::json;

fn step(id: &str, title: &str) -> CourseStep {
    CourseStep {
        id: id.into(),
        title: title.into(),
        content: format!("Content for {title}"),
        ..Default::default()
    }
}

fn resource(label: &str, url: &str) -> CourseResource {
    CourseResource {
        label: label.into(),
        url: url.into(),
        description: None,
    }
}

fn base_course() -> CourseDefinition {
    CourseDefinition {
        meta: CourseMeta {
            title: "Async Rust".into(),
            description: "Futures, executors and tokio".into(),
            author: Some("Ferris".into()),
            difficulty: Some(Difficulty::Intermediate),
            ..Default::default()
        },
        steps: vec![step("s1", "Futures"), step("s2", "Executors")],
        resources: vec![resource("Tokio", "https://tokio.rs")],
        transcript: Some("raw transcript".into()),
    }
}

#[test]
fn test_identical_courses_have_no_changes() {
    let course = base_course();
    assert!(detect_changes(&course, &course).unwrap().is_empty());
}

#[test]
fn test_title_change_round_trips_through_apply() {
    let original = base_course();
    let mut modified = original.clone();
    modified.meta.title = "Async Rust, properly".into();

    let changes = detect_changes(&original, &modified).unwrap();
    assert_eq!(changes.len(), 1);

    let applied = apply_changes(&original, &changes);
    assert_eq!(applied.meta.title, "Async Rust, properly");
    let mut expected = original.clone();
    expected.meta.title = applied.meta.title.clone();
    assert_eq!(applied, expected);
}

#[test]
fn test_step_swap_yields_removed_then_added() {
    let original = base_course();
    let mut modified = original.clone();
    modified.steps = vec![step("s1", "Futures"), step("s3", "Pinning")];

    let changes = detect_changes(&original, &modified).unwrap();
    assert_eq!(changes.len(), 2);
    match (&changes[0], &changes[1]) {
        (
            Change::Step(StepChange::Removed { step: removed }),
            Change::Step(StepChange::Added { step: added }),
        ) => {
            assert_eq!(removed.id, "s2");
            assert_eq!(added.id, "s3");
        }
        other => panic!("unexpected changes: {other:?}"),
    }
}

#[test]
fn test_changes_are_ordered_meta_steps_resources() {
    let original = base_course();
    let mut modified = original.clone();
    modified.resources = vec![resource("Async book", "https://rust-lang.github.io/async-book/")];
    modified.steps[0].content = "Rewritten".into();
    modified.steps[0].video_timestamp = Some("1:30".into());
    modified.steps.remove(1);
    modified.steps.push(step("s4", "Streams"));
    modified.meta.difficulty = Some(Difficulty::Advanced);
    modified.meta.author = None;

    let changes = detect_changes(&original, &modified).unwrap();
    let kinds: Vec<String> = changes.iter().map(|c| c.to_string()).collect();

    assert_eq!(
        kinds,
        vec![
            "meta.author: \"Ferris\" -> (none)",
            "meta.difficulty: \"intermediate\" -> \"advanced\"",
            "step 's2' removed (Executors)",
            "step 's1'.content: \"Content for Futures\" -> \"Rewritten\"",
            "step 's1'.videoTimestamp: (none) -> \"1:30\"",
            "step 's4' added (Streams)",
            "resource removed: https://tokio.rs",
            "resource added: https://rust-lang.github.io/async-book/",
        ]
    );
}

#[test]
fn test_apply_rebuilds_modified_course() {
    let original = base_course();
    let mut modified = original.clone();
    let mut streams = step("s4", "Streams");
    streams.video_url = Some("https://youtu.be/dQw4w9WgXcQ".into());
    streams.estimated_time = Some("10 min".into());
    modified.steps.remove(0);
    modified.steps.push(streams);
    modified.steps[0].title = "Executors and wakers".into();
    modified.meta.estimated_time = Some("1h".into());
    modified.resources.push(resource("Async book", "https://rust-lang.github.io/async-book/"));

    let changes = detect_changes(&original, &modified).unwrap();
    let applied = apply_changes(&original, &changes);

    assert_eq!(applied, modified);
    assert_eq!(original, base_course(), "input must not be mutated");
}

#[test]
fn test_resource_label_change_is_not_detected() {
    let original = base_course();
    let mut modified = original.clone();
    modified.resources[0].label = "Tokio homepage".into();

    assert!(detect_changes(&original, &modified).unwrap().is_empty());
}

#[test]
fn test_duplicate_step_ids_are_rejected() {
    let original = base_course();
    let mut modified = original.clone();
    modified.steps.push(step("s1", "Futures again"));

    assert_eq!(
        detect_changes(&original, &modified).unwrap_err(),
        DiffError::DuplicateStepId {
            id: "s1".into(),
            side: Side::Modified,
        }
    );
    assert!(matches!(
        detect_changes(&modified, &original),
        Err(DiffError::DuplicateStepId {
            side: Side::Original,
            ..
        })
    ));
}

#[test]
fn test_modifying_unknown_step_is_ignored() {
    let original = base_course();
    let changes = vec![Change::Step(StepChange::Modified {
        step_id: "missing".into(),
        step_title: "Ghost".into(),
        field: StepField::Title,
        old_value: None,
        new_value: Some("Boo".into()),
    })];

    assert_eq!(apply_changes(&original, &changes), original);
}

#[test]
fn test_change_serialization_shape() {
    let original = base_course();
    let mut modified = original.clone();
    modified.meta.title = "New".into();
    modified.steps[1].title = "Runtimes".into();
    modified.resources.clear();

    let changes = detect_changes(&original, &modified).unwrap();
    let value = serde_json::to_value(&changes).unwrap();

    assert_eq!(
        value[0],
        json!({"type": "meta", "field": "title", "oldValue": "Async Rust", "newValue": "New"})
    );
    assert_eq!(
        value[1],
        json!({
            "type": "step",
            "action": "modified",
            "stepId": "s2",
            "stepTitle": "Runtimes",
            "field": "title",
            "oldValue": "Executors",
            "newValue": "Runtimes"
        })
    );
    assert_eq!(value[2]["type"], "resource");
    assert_eq!(value[2]["action"], "removed");
    assert_eq!(value[2]["resource"]["url"], "https://tokio.rs");
}

#[test]
fn test_meta_change_to_unknown_difficulty_clears_it() {
    let original = base_course();
    let changes = vec![Change::Meta(coursegen_core::diff::MetaChange {
        field: MetaField::Difficulty,
        old_value: Some("intermediate".into()),
        new_value: Some("legendary".into()),
    })];
    assert_eq!(apply_changes(&original, &changes).meta.difficulty, None);
}

#[tokio::test]
async fn test_refine_course_returns_validated_result() {
    let mut mock = MockTextGenerator::new();
    mock.expect_refine_json().times(1).returning(|course, _prompt| {
        let mut refined = course.clone();
        refined.steps.push(CourseStep {
            id: "quiz".into(),
            title: "Quiz".into(),
            content: "What does `.await` do?".into(),
            ..Default::default()
        });
        refined.transcript = None;
        Ok(refined)
    });
    let generator = Generator::new(mock);
    let original = base_course();

    let refined = refine_course(&generator, &original, "add a quiz").await.unwrap();
    assert_eq!(refined.steps.len(), 3);
    assert_eq!(refined.transcript, original.transcript);

    let changes = detect_changes(&original, &refined).unwrap();
    assert!(matches!(
        changes.as_slice(),
        [Change::Step(StepChange::Added { step })] if step.id == "quiz"
    ));
}

#[tokio::test]
async fn test_refine_failure_is_reported_by_tagged_variant() {
    let mut mock = MockTextGenerator::new();
    mock.expect_refine_json()
        .returning(|_course, _prompt| Err(GenerationError::RateLimited { retry_after: None }));
    let generator = Generator::new(mock);

    let err = refine_course(&generator, &base_course(), "shorter")
        .await
        .unwrap_err();
    assert!(matches!(
        err.0,
        GeneratorError::Client(GenerationError::RateLimited { .. })
    ));
}

#[tokio::test]
async fn test_refine_or_original_fails_open() {
    let mut mock = MockTextGenerator::new();
    mock.expect_refine_json().returning(|_course, _prompt| {
        Err(GenerationError::Api {
            status: 503,
            message: "overloaded".into(),
        })
    });
    let generator = Generator::new(mock);
    let original = base_course();

    let result = refine_course_or_original(&generator, &original, "make it shorter").await;
    assert_eq!(result, original);
}

#[tokio::test]
async fn test_refine_or_original_rejects_invalid_model_output() {
    let mut mock = MockTextGenerator::new();
    mock.expect_refine_json().returning(|course, _prompt| {
        let mut broken = course.clone();
        broken.steps.clear();
        Ok(broken)
    });
    let generator = Generator::new(mock);
    let original = base_course();

    let result = refine_course_or_original(&generator, &original, "remove everything").await;
    assert_eq!(result, original);
}

#[tokio::test]
async fn test_empty_prompt_never_reaches_the_model() {
    let mut mock = MockTextGenerator::new();
    mock.expect_refine_json().never();
    let generator = Generator::new(mock);

    let err = refine_course(&generator, &base_course(), "  ").await.unwrap_err();
    assert!(matches!(err.0, GeneratorError::EmptyPrompt));
}

#[test]
fn test_resource_changes_apply_by_url() {
    let original = base_course();
    let changes = vec![
        Change::Resource(ResourceChange::Removed {
            resource: resource("whatever", "https://tokio.rs"),
        }),
        Change::Resource(ResourceChange::Added {
            resource: resource("Docs", "https://docs.rs/tokio"),
        }),
    ];
    let applied = apply_changes(&original, &changes);
    assert_eq!(applied.resources, vec![resource("Docs", "https://docs.rs/tokio")]);
}

#[test]
fn test_added_steps_are_appended_on_apply() {
    let original = base_course();
    let mut modified = original.clone();
    modified.steps.insert(0, step("s0", "Why async"));

    let changes = detect_changes(&original, &modified).unwrap();
    let applied = apply_changes(&original, &changes);

    let ids: Vec<&str> = applied.steps.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["s1", "s2", "s0"]);
    assert_eq!(applied.steps[2], modified.steps[0]);
}
