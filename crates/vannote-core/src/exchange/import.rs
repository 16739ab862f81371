//! JSON import.
//!
//! Import never fails with an `Err`: parse errors, shape errors and storage
//! failures part-way through are all reported in the returned outcome.
//! Whole-dataset import is not transactional; records created before a
//! failure stay in place.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::{CoreError, CoreResult};
use crate::models::{
    deserialize_metadata, deserialize_template_keys, Metadata, NewAnnotation, NewCollection,
    NewTemplate, NewVideo, TemplatePatch, VideoPatch,
};
use crate::storage::Storage;
use crate::types::{AnnotationId, CollectionId, TemplateId, TimeSec, VideoId};

// =============================================================================
// Outcomes
// =============================================================================

/// Result of importing annotations into one video
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationImportOutcome {
    pub success: bool,
    /// Annotations created
    pub count: usize,
    /// Entries rejected for a missing title or non-numeric start time
    pub skipped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-type counts of a whole-dataset import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportDetails {
    pub videos: usize,
    pub collections: usize,
    pub annotations: usize,
    pub templates: usize,
}

/// Result of a whole-dataset import
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ImportDetails>,
}

impl ImportOutcome {
    fn failed(message: String) -> Self {
        Self {
            success: false,
            message,
            details: None,
        }
    }
}

// =============================================================================
// Entry Parsing
// =============================================================================

/// An annotation entry that passed validation
#[derive(Debug, Clone, PartialEq)]
struct AnnotationEntry {
    id: Option<String>,
    video_id: Option<String>,
    title: String,
    description: Option<String>,
    start_time: TimeSec,
    end_time: Option<TimeSec>,
    collection_id: Option<String>,
}

impl AnnotationEntry {
    /// Requires a non-empty string `title` and a numeric `startTime`.
    fn parse(value: &Value) -> Option<Self> {
        let title = value.get("title")?.as_str().filter(|t| !t.is_empty())?;
        let start_time = value.get("startTime")?.as_f64()?;
        let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);

        Some(Self {
            id: text("id"),
            video_id: text("videoId"),
            title: title.to_string(),
            description: text("description"),
            start_time,
            end_time: value.get("endTime").and_then(Value::as_f64),
            collection_id: text("collectionId"),
        })
    }

    fn into_new(self, video_id: &str) -> NewAnnotation {
        NewAnnotation {
            video_id: video_id.to_string(),
            title: self.title,
            description: self.description,
            start_time: self.start_time,
            end_time: self.end_time,
            collection_id: None,
            order: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportedVideo {
    #[serde(default)]
    id: Option<VideoId>,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    video_id: Option<String>,
    #[serde(default)]
    hash: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    duration: Option<TimeSec>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportedCollection {
    #[serde(default)]
    id: Option<CollectionId>,
    #[serde(default)]
    video_id: Option<VideoId>,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_metadata")]
    metadata: Metadata,
    #[serde(default)]
    template_id: Option<TemplateId>,
    #[serde(default)]
    annotation_ids: Vec<AnnotationId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportedTemplate {
    #[serde(default)]
    id: Option<TemplateId>,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_template_keys")]
    keys: Vec<String>,
}

/// A whole-dataset document after shape normalization
#[derive(Debug, Default)]
struct DatasetDocument {
    videos: Vec<ImportedVideo>,
    collections: Vec<ImportedCollection>,
    annotations: Vec<Value>,
    templates: Vec<ImportedTemplate>,
}

fn array_field(object: &Map<String, Value>, key: &str) -> Vec<Value> {
    object
        .get(key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// Flattens the annotations of a single-video export document
fn flatten_video_export(object: &Map<String, Value>) -> Vec<Value> {
    let mut annotations: Vec<Value> = array_field(object, "collections")
        .iter()
        .flat_map(|c| {
            c.get("annotations")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default()
        })
        .collect();
    annotations.extend(array_field(object, "unassignedAnnotations"));
    annotations
}

fn is_video_export(object: &Map<String, Value>) -> bool {
    object.get("video").is_some_and(Value::is_object)
        && (object.contains_key("collections") || object.contains_key("unassignedAnnotations"))
}

/// Accepts a bare array, `{ annotations: [...] }`, or a single-video export.
fn annotation_entries(document: Value) -> CoreResult<Vec<Value>> {
    match document {
        Value::Array(entries) => Ok(entries),
        Value::Object(object) => {
            if let Some(Value::Array(entries)) = object.get("annotations") {
                return Ok(entries.clone());
            }
            if is_video_export(&object) {
                return Ok(flatten_video_export(&object));
            }
            Err(CoreError::InvalidImport(
                "expected an array of annotations".into(),
            ))
        }
        _ => Err(CoreError::InvalidImport(
            "expected an array of annotations".into(),
        )),
    }
}

fn parse_list<T: serde::de::DeserializeOwned>(values: Vec<Value>, label: &str) -> CoreResult<Vec<T>> {
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            serde_json::from_value(value)
                .map_err(|e| CoreError::InvalidImport(format!("{label} #{}: {e}", index + 1)))
        })
        .collect()
}

/// Accepts a `{ videos: [...] }` dataset or a single-video export.
fn dataset_document(document: Value) -> CoreResult<DatasetDocument> {
    let Value::Object(object) = document else {
        return Err(CoreError::InvalidImport("expected videos array".into()));
    };

    if let Some(Value::Array(videos)) = object.get("videos") {
        return Ok(DatasetDocument {
            videos: parse_list(videos.clone(), "video")?,
            collections: parse_list(array_field(&object, "collections"), "collection")?,
            annotations: array_field(&object, "annotations"),
            templates: parse_list(array_field(&object, "templates"), "template")?,
        });
    }

    if is_video_export(&object) {
        let video = object.get("video").cloned().unwrap_or(Value::Null);
        return Ok(DatasetDocument {
            videos: parse_list(vec![video], "video")?,
            collections: parse_list(array_field(&object, "collections"), "collection")?,
            annotations: flatten_video_export(&object),
            templates: Vec::new(),
        });
    }

    Err(CoreError::InvalidImport("expected videos array".into()))
}

// =============================================================================
// Annotation Import
// =============================================================================

/// Creates every valid annotation in `content` under `video_id`.
///
/// An entry's `collectionId` is honored only when it names a collection of
/// the target video; membership is then established on both sides.
pub async fn import_annotations(
    storage: &Storage,
    content: &str,
    video_id: &str,
) -> AnnotationImportOutcome {
    let mut outcome = AnnotationImportOutcome::default();
    match run_annotation_import(storage, content, video_id, &mut outcome).await {
        Ok(()) => {
            outcome.success = true;
            info!(
                "Imported {} annotation(s) into video {} ({} skipped)",
                outcome.count, video_id, outcome.skipped
            );
        }
        Err(e) => {
            warn!("Annotation import into video {} failed: {}", video_id, e);
            outcome.error = Some(e.to_string());
        }
    }
    outcome
}

async fn run_annotation_import(
    storage: &Storage,
    content: &str,
    video_id: &str,
    outcome: &mut AnnotationImportOutcome,
) -> CoreResult<()> {
    let entries = annotation_entries(serde_json::from_str(content)?)?;
    if storage.get_video(video_id).await?.is_none() {
        return Err(CoreError::VideoNotFound(video_id.to_string()));
    }
    let collections = storage.get_collections_by_video(video_id).await?;

    for (index, value) in entries.iter().enumerate() {
        let Some(entry) = AnnotationEntry::parse(value) else {
            debug!("Skipping annotation entry #{}: missing title or startTime", index + 1);
            outcome.skipped += 1;
            continue;
        };

        let target = entry
            .collection_id
            .clone()
            .filter(|id| collections.iter().any(|c| &c.id == id));
        let annotation = storage.create_annotation(entry.into_new(video_id)).await?;
        if let Some(collection_id) = target {
            storage
                .assign_annotation_to_collection(&annotation.id, &collection_id)
                .await?;
        }
        outcome.count += 1;
    }
    Ok(())
}

// =============================================================================
// Dataset Import
// =============================================================================

/// Merges a whole-dataset document into storage.
///
/// Templates are matched by name, videos by platform id or content hash;
/// collections and annotations are always created fresh under the resolved
/// video.
pub async fn import_dataset(storage: &Storage, content: &str) -> ImportOutcome {
    let mut details = ImportDetails::default();
    match run_dataset_import(storage, content, &mut details).await {
        Ok(()) => {
            info!(
                "Dataset import completed: {} video(s), {} collection(s), {} annotation(s), {} template(s)",
                details.videos, details.collections, details.annotations, details.templates
            );
            ImportOutcome {
                success: true,
                message: "Import completed successfully".into(),
                details: Some(details),
            }
        }
        Err(e) => {
            warn!("Dataset import failed after {:?}: {}", details, e);
            ImportOutcome::failed(e.to_string())
        }
    }
}

async fn run_dataset_import(
    storage: &Storage,
    content: &str,
    details: &mut ImportDetails,
) -> CoreResult<()> {
    let document = dataset_document(serde_json::from_str(content)?)?;
    let template_ids = import_templates(storage, document.templates, details).await?;

    for video in document.videos {
        let old_id = video.id.clone();
        let resolved_id = resolve_video(storage, video).await?;
        details.videos += 1;

        let Some(old_id) = old_id else {
            continue;
        };

        let mut collection_ids: HashMap<String, CollectionId> = HashMap::new();
        let mut listed_members: Vec<(CollectionId, &[AnnotationId])> = Vec::new();
        for collection in document
            .collections
            .iter()
            .filter(|c| c.video_id.as_deref() == Some(old_id.as_str()))
        {
            let created = storage
                .create_collection(NewCollection {
                    video_id: resolved_id.clone(),
                    name: collection.name.clone(),
                    description: collection.description.clone(),
                    metadata: collection.metadata.clone(),
                    template_id: collection
                        .template_id
                        .as_ref()
                        .and_then(|id| template_ids.get(id))
                        .cloned(),
                    annotation_ids: Vec::new(),
                })
                .await?;
            if let Some(id) = &collection.id {
                collection_ids.insert(id.clone(), created.id.clone());
            }
            listed_members.push((created.id, collection.annotation_ids.as_slice()));
            details.collections += 1;
        }

        let mut annotation_ids: HashMap<String, AnnotationId> = HashMap::new();
        let mut arrived: HashMap<CollectionId, Vec<AnnotationId>> = HashMap::new();
        for (index, value) in document.annotations.iter().enumerate() {
            let Some(entry) = AnnotationEntry::parse(value) else {
                debug!("Skipping annotation entry #{}: missing title or startTime", index + 1);
                continue;
            };
            if entry.video_id.as_deref() != Some(old_id.as_str()) {
                continue;
            }

            let old_annotation_id = entry.id.clone();
            let target = entry
                .collection_id
                .as_ref()
                .and_then(|id| collection_ids.get(id))
                .cloned();
            let annotation = storage.create_annotation(entry.into_new(&resolved_id)).await?;
            if let Some(collection_id) = target {
                storage
                    .assign_annotation_to_collection(&annotation.id, &collection_id)
                    .await?;
                arrived
                    .entry(collection_id)
                    .or_default()
                    .push(annotation.id.clone());
            }
            if let Some(old_annotation_id) = old_annotation_id {
                annotation_ids.insert(old_annotation_id, annotation.id);
            }
            details.annotations += 1;
        }

        for (collection_id, listed) in listed_members {
            let Some(members) = arrived.remove(&collection_id) else {
                continue;
            };
            restore_member_order(storage, &collection_id, listed, &annotation_ids, members)
                .await?;
        }
    }
    Ok(())
}

/// Reapplies the exported member order. Members the document does not list
/// keep their arrival order after the listed ones.
async fn restore_member_order(
    storage: &Storage,
    collection_id: &str,
    listed: &[AnnotationId],
    imported: &HashMap<String, AnnotationId>,
    arrived: Vec<AnnotationId>,
) -> CoreResult<()> {
    let mut ordered: Vec<AnnotationId> = Vec::with_capacity(arrived.len());
    for old_id in listed {
        if let Some(new_id) = imported.get(old_id) {
            if arrived.contains(new_id) && !ordered.contains(new_id) {
                ordered.push(new_id.clone());
            }
        }
    }
    for id in &arrived {
        if !ordered.contains(id) {
            ordered.push(id.clone());
        }
    }

    if ordered != arrived {
        debug!("Restoring exported member order of collection {}", collection_id);
        storage.reorder_collection(collection_id, ordered).await?;
    }
    Ok(())
}

/// Upserts templates by name; returns old id -> resolved id.
async fn import_templates(
    storage: &Storage,
    templates: Vec<ImportedTemplate>,
    details: &mut ImportDetails,
) -> CoreResult<HashMap<TemplateId, TemplateId>> {
    let mut ids = HashMap::new();

    for template in templates {
        let existing = storage
            .get_all_templates()
            .await?
            .into_iter()
            .find(|t| t.name == template.name);

        let resolved = match existing {
            Some(existing) => {
                let patch = TemplatePatch {
                    name: None,
                    description: template.description.clone().map(Some),
                    keys: Some(template.keys.clone()),
                };
                debug!("Updating template '{}' in place", template.name);
                storage.update_template(&existing.id, patch).await?
            }
            None => {
                storage
                    .create_template(NewTemplate {
                        name: template.name.clone(),
                        description: template.description.clone(),
                        keys: template.keys.clone(),
                    })
                    .await?
            }
        };

        if let Some(old_id) = template.id {
            ids.insert(old_id, resolved.id);
        }
        details.templates += 1;
    }
    Ok(ids)
}

/// Updates the matching stored video or creates a new one; returns its id.
async fn resolve_video(storage: &Storage, video: ImportedVideo) -> CoreResult<VideoId> {
    let existing = storage
        .get_all_videos()
        .await?
        .into_iter()
        .find(|v| v.same_media(video.video_id.as_deref(), video.hash.as_deref()));

    match existing {
        Some(existing) => {
            let patch = VideoPatch {
                title: Some(video.title),
                description: video.description.map(Some),
                duration: video.duration.map(Some),
                ..Default::default()
            };
            debug!("Updating matched video {} in place", existing.id);
            Ok(storage.update_video(&existing.id, patch).await?.id)
        }
        None => {
            let created = storage
                .create_video(NewVideo {
                    title: video.title,
                    description: video.description,
                    video_id: video.video_id,
                    hash: video.hash,
                    url: video.url,
                    duration: video.duration,
                })
                .await?;
            Ok(created.id)
        }
    }
}
