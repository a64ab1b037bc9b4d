///
/// CLI interface for coursegen: argument parsing, subcommand routing and client wiring.
///
/// All course logic (model, validation, pipeline, diff, records, publishing) lives in
/// [`coursegen-core`]. This module only loads config, builds the HTTP clients and
/// prints results.
///
/// `validate` and `diff` work on local JSON files and never touch the network or the
/// config file. Every other subcommand needs `--config`.
///
/// [`coursegen-core`]: ../../coursegen-core/
use crate::load_config::load_config;
use crate::publish::HttpPublisher;
use crate::store::HttpDocumentStore;
use crate::text_generation::ChatCompletionsClient;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use coursegen_core::config::AppConfig;
use coursegen_core::course::CourseDefinition;
use coursegen_core::diff::{detect_changes, refine_course_or_original};
use coursegen_core::generator::Generator;
use coursegen_core::pipeline::CoursePipeline;
use coursegen_core::record::{CourseRepository, NewCourse};
use coursegen_core::transcript::load_transcript;
use coursegen_core::validate::validate_course;
use coursegen_core::workflow::{generate_for_record, publish_record};
use std::path::{Path, PathBuf};

/// CLI for coursegen: turn video transcripts into step-based courses.
#[derive(Parser)]
#[clap(
    name = "coursegen",
    version,
    about = "Generate, refine, validate and publish step-based courses from video transcripts"
)]
pub struct Cli {
    /// Path to the YAML config file
    #[clap(long, global = true, default_value = "coursegen.yaml")]
    pub config: PathBuf,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a draft course record
    Create {
        #[clap(long)]
        title: String,
        #[clap(long, default_value = "")]
        description: String,
        #[clap(long)]
        video_url: Option<String>,
        /// Transcript file (.txt, .srt or .vtt)
        #[clap(long)]
        transcript: Option<PathBuf>,
    },
    /// Run the generation pipeline for a stored course
    Generate { id: String },
    /// Apply a natural-language change to a stored course
    Refine {
        id: String,
        #[clap(long)]
        prompt: String,
        /// Print the changes without saving them
        #[clap(long)]
        dry_run: bool,
        /// Keep the current course if refinement fails instead of erroring
        #[clap(long)]
        keep_on_error: bool,
    },
    /// Show the changes between two course JSON files
    Diff {
        original: PathBuf,
        modified: PathBuf,
    },
    /// Validate a course JSON file
    Validate { file: PathBuf },
    /// Publish a generated course and print its permanent URL
    Publish { id: String },
    /// List stored courses, most recently updated first
    List,
    /// Print a stored course record as JSON
    Show { id: String },
}

type Repository = CourseRepository<HttpDocumentStore>;

fn repository(config: &AppConfig) -> Repository {
    CourseRepository::new(
        HttpDocumentStore::new(&config.store),
        config.store.database.clone(),
    )
}

fn pipeline(config: &AppConfig) -> Result<CoursePipeline<ChatCompletionsClient>> {
    let client = ChatCompletionsClient::new(config.generation.clone())
        .map_err(|e| anyhow::anyhow!("Failed to construct text generation client: {e}"))?;
    Ok(CoursePipeline::new(Generator::new(client))
        .with_observer(|status| println!("  -> {status}")))
}

fn read_course(path: &Path) -> Result<CourseDefinition> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read course file {path:?}"))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse course JSON in {path:?}"))
}

/// Async CLI entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Validate { file } => {
            let course = read_course(&file)?;
            let result = validate_course(&course);
            if result.valid {
                println!("Course is valid: {} ({} steps)", course.meta.title, course.steps.len());
                Ok(())
            } else {
                for error in &result.errors {
                    println!("  - {error}");
                }
                tracing::error!(command = "validate", errors = result.errors.len(), "Course is invalid");
                Err(anyhow::anyhow!(
                    "Course is invalid: {} error(s)",
                    result.errors.len()
                ))
            }
        }
        Commands::Diff { original, modified } => {
            let original = read_course(&original)?;
            let modified = read_course(&modified)?;
            let changes = detect_changes(&original, &modified)?;
            if changes.is_empty() {
                println!("No changes.");
            }
            for change in &changes {
                println!("{change}");
            }
            Ok(())
        }
        Commands::Create {
            title,
            description,
            video_url,
            transcript,
        } => {
            let config = load_config(&cli.config)?;
            let transcript = match transcript {
                Some(path) => {
                    let loaded = load_transcript(&path).await?;
                    tracing::info!(command = "create", format = ?loaded.format, "Transcript loaded");
                    Some(loaded.text)
                }
                None => None,
            };
            let record = repository(&config)
                .create(NewCourse {
                    title,
                    description,
                    video_url,
                    transcript,
                })
                .await?;
            println!("{}", record.id);
            Ok(())
        }
        Commands::Generate { id } => {
            let config = load_config(&cli.config)?;
            let repo = repository(&config);
            let mut pipeline = pipeline(&config)?;
            tracing::info!(command = "generate", id = %id, "Starting generation");
            let record = generate_for_record(&repo, &mut pipeline, &id).await?;
            println!(
                "Generated '{}' ({} steps), status {}",
                record.title,
                record.course.as_ref().map_or(0, |c| c.steps.len()),
                record.status
            );
            Ok(())
        }
        Commands::Refine {
            id,
            prompt,
            dry_run,
            keep_on_error,
        } => {
            let config = load_config(&cli.config)?;
            let repo = repository(&config);
            let mut pipeline = pipeline(&config)?;
            let record = repo.get(&id).await?;
            let current = record
                .course
                .clone()
                .ok_or_else(|| anyhow::anyhow!("Course '{id}' has not been generated yet"))?;

            let refined = if keep_on_error {
                refine_course_or_original(pipeline.generator(), &current, &prompt).await
            } else {
                pipeline.refine(&current, &prompt).await?
            };

            let changes = detect_changes(&current, &refined)?;
            if changes.is_empty() {
                println!("No changes.");
                return Ok(());
            }
            for change in &changes {
                println!("{change}");
            }
            if dry_run {
                return Ok(());
            }

            let html = pipeline.generator().generate_html(&refined).await?;
            let saved = repo.save_generated(&id, refined, html).await?;
            tracing::info!(command = "refine", id = %id, version = saved.version, changes = changes.len(), "Refinement saved");
            println!("Saved {} change(s), version {}", changes.len(), saved.version);
            Ok(())
        }
        Commands::Publish { id } => {
            let config = load_config(&cli.config)?;
            let repo = repository(&config);
            let publisher = HttpPublisher::new(&config.publish)
                .map_err(|e| anyhow::anyhow!("Failed to construct publisher: {e}"))?;
            let (_, outcome) = publish_record(&repo, &publisher, &config.publish, &id).await?;
            tracing::info!(command = "publish", id = %id, attempts = outcome.attempts, "Publish complete");
            println!("{}", outcome.url);
            Ok(())
        }
        Commands::List => {
            let config = load_config(&cli.config)?;
            for record in repository(&config).list().await? {
                println!(
                    "{}  {:<10}  v{:<3}  {}",
                    record.id, record.status, record.version, record.title
                );
            }
            Ok(())
        }
        Commands::Show { id } => {
            let config = load_config(&cli.config)?;
            let record = repository(&config).get(&id).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
    }
}
