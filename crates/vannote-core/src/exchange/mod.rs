//! Import/Export Engine
//!
//! Moves data between [`Storage`] and portable documents:
//! - JSON export of one video or the whole dataset (`json`)
//! - Hierarchical CSV export of one video or the whole dataset (`csv`)
//! - JSON import of annotations into one video, or of a whole dataset (`import`)
//!
//! Renderers work on [`VideoSnapshot`]s so they stay pure; the async
//! functions here load snapshots from storage and hand them over.

pub mod csv;
pub mod import;
pub mod json;

use crate::error::{CoreError, CoreResult};
use crate::models::{Annotation, Collection, Video};
use crate::storage::Storage;
use crate::types::{now, Timestamp};

pub use import::{
    import_annotations, import_dataset, AnnotationImportOutcome, ImportDetails, ImportOutcome,
};
pub use json::{DatasetExport, ExportedCollection, ExportedVideo, VideoExport};

/// Output format of an export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

// =============================================================================
// Snapshots
// =============================================================================

/// A video together with everything it owns
#[derive(Debug, Clone, PartialEq)]
pub struct VideoSnapshot {
    pub video: Video,
    pub annotations: Vec<Annotation>,
    pub collections: Vec<Collection>,
}

impl VideoSnapshot {
    /// Loads a snapshot for the video with `video_id`
    pub async fn load(storage: &Storage, video_id: &str) -> CoreResult<Self> {
        let video = storage
            .get_video(video_id)
            .await?
            .ok_or_else(|| CoreError::VideoNotFound(video_id.to_string()))?;
        Self::load_for(storage, video).await
    }

    async fn load_for(storage: &Storage, video: Video) -> CoreResult<Self> {
        let annotations = storage.get_annotations_by_video(&video.id).await?;
        let collections = storage.get_collections_by_video(&video.id).await?;
        Ok(Self {
            video,
            annotations,
            collections,
        })
    }

    /// Loads a snapshot for every stored video
    pub async fn load_all(storage: &Storage) -> CoreResult<Vec<Self>> {
        let videos = storage.get_all_videos().await?;
        let mut snapshots = Vec::with_capacity(videos.len());
        for video in videos {
            snapshots.push(Self::load_for(storage, video).await?);
        }
        Ok(snapshots)
    }

    /// Annotations in ascending `startTime` order
    pub fn sorted_annotations(&self) -> Vec<Annotation> {
        let mut annotations = self.annotations.clone();
        annotations.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        annotations
    }
}

/// Members of `collection` in `annotationIds` order, followed by any
/// annotation that points at the collection without being listed (in the
/// order of `annotations`).
pub fn collection_members<'a>(
    annotations: &'a [Annotation],
    collection: &Collection,
) -> Vec<&'a Annotation> {
    let mut members: Vec<&Annotation> = collection
        .annotation_ids
        .iter()
        .filter_map(|id| annotations.iter().find(|a| &a.id == id))
        .collect();
    members.extend(annotations.iter().filter(|a| {
        a.collection_id.as_deref() == Some(collection.id.as_str()) && !collection.contains(&a.id)
    }));
    members
}

// =============================================================================
// Storage-driven Exports
// =============================================================================

pub async fn export_video_json(storage: &Storage, video_id: &str) -> CoreResult<VideoExport> {
    let snapshot = VideoSnapshot::load(storage, video_id).await?;
    Ok(VideoExport::build(&snapshot))
}

pub async fn export_dataset_json(storage: &Storage) -> CoreResult<DatasetExport> {
    let snapshots = VideoSnapshot::load_all(storage).await?;
    let templates = storage.get_all_templates().await?;
    Ok(DatasetExport::build(&snapshots, &templates, now()))
}

pub async fn export_video_csv(storage: &Storage, video_id: &str) -> CoreResult<String> {
    let snapshot = VideoSnapshot::load(storage, video_id).await?;
    csv::render_video_csv(&snapshot)
}

pub async fn export_dataset_csv(storage: &Storage) -> CoreResult<String> {
    let snapshots = VideoSnapshot::load_all(storage).await?;
    let templates = storage.get_all_templates().await?;
    csv::render_dataset_csv(&snapshots, &templates, now())
}

// =============================================================================
// File Names
// =============================================================================

/// `vannote_export_<YYYY-MM-DD>.<ext>`
pub fn dataset_filename(date: &Timestamp, format: ExportFormat) -> String {
    format!(
        "vannote_export_{}.{}",
        date.format("%Y-%m-%d"),
        format.extension()
    )
}

/// `<title>_data.json`, whitespace replaced by underscores
pub fn video_json_filename(title: &str) -> String {
    format!("{}_data.json", underscore_whitespace(title))
}

/// `<title>_export.csv`, whitespace replaced by underscores
pub fn video_csv_filename(title: &str) -> String {
    format!("{}_export.csv", underscore_whitespace(title))
}

fn underscore_whitespace(title: &str) -> String {
    title
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}
