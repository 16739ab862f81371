//! Subcommand handlers.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use vannote_core::exchange::{
    self, dataset_filename, import_annotations, import_dataset, json::to_json_string,
    video_csv_filename, video_json_filename, ExportFormat,
};
use vannote_core::media::{extract_youtube_video_id, file_url, hash_file};
use vannote_core::presets::seed_preset_templates;
use vannote_core::query::{open_annotations, search_annotations};
use vannote_core::types::now;
use vannote_core::{
    AnnotationPatch, CoreError, NewAnnotation, NewCollection, NewTemplate, NewVideo, Storage,
    VideoPatch,
};

use crate::error::CliError;
use crate::{
    AnnotationCommand, CollectionCommand, ExportArgs, ExportCommand, ImportCommand,
    TemplateCommand, VideoCommand,
};

/// Shared state for a single invocation
pub struct App {
    pub storage: Storage,
    pub pretty_json: bool,
}

impl App {
    fn print<T: Serialize>(&self, value: &T) -> anyhow::Result<()> {
        println!("{}", to_json_string(value, self.pretty_json)?);
        Ok(())
    }

    fn print_deleted(&self, kind: &str, id: &str) -> anyhow::Result<()> {
        self.print(&json!({ "deleted": kind, "id": id }))
    }
}

// =============================================================================
// Videos
// =============================================================================

pub async fn video(app: &App, cmd: VideoCommand) -> anyhow::Result<()> {
    let storage = &app.storage;
    match cmd {
        VideoCommand::Add {
            youtube,
            file,
            title,
            description,
            duration,
        } => {
            let mut new_video = match (youtube, file) {
                (Some(input), _) => {
                    let video_id = extract_youtube_video_id(&input)
                        .ok_or_else(|| anyhow!("Invalid YouTube URL: {input}"))?;
                    let title = title.unwrap_or_else(|| format!("YouTube Video ({video_id})"));
                    NewVideo::youtube(&title, &video_id, &input)
                }
                (None, Some(path)) => {
                    let hash = hash_file(&path)
                        .with_context(|| format!("Failed to hash {}", path.display()))?;
                    let title = title.unwrap_or_else(|| file_title(&path));
                    NewVideo::local(&title, &hash, &file_url(&path))
                }
                (None, None) => return Err(anyhow!("Either --youtube or --file is required")),
            };
            new_video.description = description;
            new_video.duration = duration;

            let video = storage.create_video(new_video).await?;
            app.print(&video)
        }
        VideoCommand::List => app.print(&storage.get_all_videos().await?),
        VideoCommand::Show { id } => app.print(&exchange::export_video_json(storage, &id).await?),
        VideoCommand::Update {
            id,
            title,
            description,
            duration,
        } => {
            let patch = VideoPatch {
                title,
                description: description.map(Some),
                duration: duration.map(Some),
                ..Default::default()
            };
            app.print(&storage.update_video(&id, patch).await?)
        }
        VideoCommand::Delete { id } => {
            storage.delete_video(&id).await?;
            app.print_deleted("video", &id)
        }
    }
}

fn file_title(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

// =============================================================================
// Annotations
// =============================================================================

pub async fn annotation(app: &App, cmd: AnnotationCommand) -> anyhow::Result<()> {
    let storage = &app.storage;
    match cmd {
        AnnotationCommand::Add {
            video,
            title,
            start,
            end,
            description,
        } => {
            ensure_video(storage, &video).await?;
            let mut new_annotation = NewAnnotation::new(&video, &title, start);
            new_annotation.end_time = end;
            new_annotation.description = description;
            app.print(&storage.create_annotation(new_annotation).await?)
        }
        AnnotationCommand::List {
            video,
            unassigned,
            open,
        } => {
            let annotations = if unassigned {
                storage.get_unassigned_annotations(&video).await?
            } else {
                storage.get_annotations_by_video(&video).await?
            };
            if open {
                app.print(&open_annotations(&annotations))
            } else {
                app.print(&annotations)
            }
        }
        AnnotationCommand::Update {
            id,
            title,
            description,
            start,
            end,
            clear_end,
        } => {
            let end_time = if clear_end { Some(None) } else { end.map(Some) };
            let patch = AnnotationPatch {
                title,
                description: description.map(Some),
                start_time: start,
                end_time,
                ..Default::default()
            };
            app.print(&storage.update_annotation(&id, patch).await?)
        }
        AnnotationCommand::End { id, at } => {
            app.print(&storage.mark_annotation_end(&id, at).await?)
        }
        AnnotationCommand::Delete { id } => {
            storage.delete_annotation(&id).await?;
            app.print_deleted("annotation", &id)
        }
        AnnotationCommand::Search { video, term } => {
            let annotations = storage.get_annotations_by_video(&video).await?;
            app.print(&search_annotations(&annotations, &term))
        }
    }
}

async fn ensure_video(storage: &Storage, id: &str) -> anyhow::Result<()> {
    if storage.get_video(id).await?.is_none() {
        return Err(CoreError::VideoNotFound(id.to_string()).into());
    }
    Ok(())
}

// =============================================================================
// Collections
// =============================================================================

pub async fn collection(app: &App, cmd: CollectionCommand) -> anyhow::Result<()> {
    let storage = &app.storage;
    match cmd {
        CollectionCommand::Add {
            video,
            name,
            description,
            metadata,
            template,
        } => {
            ensure_video(storage, &video).await?;
            let mut new_collection = NewCollection::new(&video, &name);
            new_collection.description = description;
            new_collection.metadata.extend(metadata);

            let mut collection = storage.create_collection(new_collection).await?;
            if let Some(template_id) = template {
                collection = storage
                    .apply_template_to_collection(&collection.id, &template_id)
                    .await?;
            }
            app.print(&collection)
        }
        CollectionCommand::List { video } => {
            app.print(&storage.get_collections_by_video(&video).await?)
        }
        CollectionCommand::Assign {
            collection,
            annotation,
        } => app.print(
            &storage
                .assign_annotation_to_collection(&annotation, &collection)
                .await?,
        ),
        CollectionCommand::Unassign {
            collection,
            annotation,
        } => app.print(
            &storage
                .remove_annotation_from_collection(&collection, &annotation)
                .await?,
        ),
        CollectionCommand::Reorder {
            collection,
            annotations,
        } => app.print(&storage.reorder_collection(&collection, annotations).await?),
        CollectionCommand::ApplyTemplate {
            collection,
            template,
        } => app.print(
            &storage
                .apply_template_to_collection(&collection, &template)
                .await?,
        ),
        CollectionCommand::Delete { id } => {
            storage.delete_collection(&id).await?;
            app.print_deleted("collection", &id)
        }
    }
}

// =============================================================================
// Templates
// =============================================================================

pub async fn template(app: &App, cmd: TemplateCommand) -> anyhow::Result<()> {
    let storage = &app.storage;
    match cmd {
        TemplateCommand::Add {
            name,
            keys,
            description,
        } => {
            let new_template = NewTemplate {
                name,
                description,
                keys,
            };
            app.print(&storage.create_template(new_template).await?)
        }
        TemplateCommand::List => app.print(&storage.get_all_templates().await?),
        TemplateCommand::Delete { id } => {
            storage.delete_template(&id).await?;
            app.print_deleted("template", &id)
        }
        TemplateCommand::SeedPresets => {
            let created = seed_preset_templates(storage).await?;
            app.print(&json!({ "created": created }))
        }
    }
}

// =============================================================================
// Import / Export
// =============================================================================

pub async fn export(app: &App, cmd: ExportCommand) -> anyhow::Result<()> {
    let storage = &app.storage;
    let (format, args) = match cmd {
        ExportCommand::Json(args) => (ExportFormat::Json, args),
        ExportCommand::Csv(args) => (ExportFormat::Csv, args),
    };
    let ExportArgs { video, out } = args;

    let (content, default_name) = match (&video, format) {
        (Some(id), ExportFormat::Json) => {
            let document = exchange::export_video_json(storage, id).await?;
            let name = video_json_filename(&document.video.video.title);
            (to_json_string(&document, app.pretty_json)?, name)
        }
        (Some(id), ExportFormat::Csv) => {
            let snapshot = exchange::VideoSnapshot::load(storage, id).await?;
            let name = video_csv_filename(&snapshot.video.title);
            (exchange::csv::render_video_csv(&snapshot)?, name)
        }
        (None, ExportFormat::Json) => {
            let document = exchange::export_dataset_json(storage).await?;
            (
                to_json_string(&document, app.pretty_json)?,
                dataset_filename(&document.export_date, format),
            )
        }
        (None, ExportFormat::Csv) => (
            exchange::export_dataset_csv(storage).await?,
            dataset_filename(&now(), format),
        ),
    };

    match out {
        None => {
            println!("{content}");
            Ok(())
        }
        Some(path) => {
            let target = resolve_output(path, &default_name);
            vannote_core::fs::atomic_write_bytes(&target, content.as_bytes())
                .with_context(|| format!("Failed to write {}", target.display()))?;
            info!("Exported to {}", target.display());
            app.print(&json!({ "written": target.display().to_string() }))
        }
    }
}

fn resolve_output(path: PathBuf, default_name: &str) -> PathBuf {
    if path.is_dir() {
        path.join(default_name)
    } else {
        path
    }
}

pub async fn import(app: &App, cmd: ImportCommand) -> anyhow::Result<()> {
    let storage = &app.storage;
    match cmd {
        ImportCommand::Dataset { file } => {
            let content = read_document(&file)?;
            let outcome = import_dataset(storage, &content).await;
            app.print(&outcome)?;
            if !outcome.success {
                return Err(CliError::ImportFailed(outcome.message).into());
            }
            Ok(())
        }
        ImportCommand::Annotations { file, video } => {
            let content = read_document(&file)?;
            let outcome = import_annotations(storage, &content, &video).await;
            app.print(&outcome)?;
            if let Some(error) = outcome.error.filter(|_| !outcome.success) {
                return Err(CliError::ImportFailed(error).into());
            }
            Ok(())
        }
    }
}

fn read_document(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}
