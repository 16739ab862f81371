//! JSON export documents.

use serde::{Deserialize, Serialize};

use super::{collection_members, VideoSnapshot};
use crate::error::CoreResult;
use crate::models::{Annotation, Collection, Template, Video, VideoSource};
use crate::types::Timestamp;

/// Envelope version written by whole-dataset exports
pub const EXPORT_VERSION: &str = "1.0";

/// A video with its derived source discriminator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedVideo {
    #[serde(flatten)]
    pub video: Video,
    pub source: VideoSource,
}

impl From<Video> for ExportedVideo {
    fn from(video: Video) -> Self {
        let source = video.source();
        Self { video, source }
    }
}

/// A collection with the annotations that point at it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedCollection {
    #[serde(flatten)]
    pub collection: Collection,
    pub annotations: Vec<Annotation>,
}

/// Single-video export document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoExport {
    pub video: ExportedVideo,
    pub collections: Vec<ExportedCollection>,
    pub unassigned_annotations: Vec<Annotation>,
}

impl VideoExport {
    /// Groups the snapshot's annotations under their collections.
    ///
    /// Collection members follow `annotationIds`; unassigned annotations are
    /// in ascending `startTime` order.
    pub fn build(snapshot: &VideoSnapshot) -> Self {
        let annotations = snapshot.sorted_annotations();

        let collections = snapshot
            .collections
            .iter()
            .map(|collection| ExportedCollection {
                collection: collection.clone(),
                annotations: collection_members(&annotations, collection)
                    .into_iter()
                    .cloned()
                    .collect(),
            })
            .collect();

        let unassigned_annotations = annotations
            .iter()
            .filter(|a| a.is_unassigned())
            .cloned()
            .collect();

        Self {
            video: ExportedVideo::from(snapshot.video.clone()),
            collections,
            unassigned_annotations,
        }
    }
}

/// Whole-dataset export document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetExport {
    pub version: String,
    pub export_date: Timestamp,
    pub videos: Vec<ExportedVideo>,
    pub collections: Vec<Collection>,
    pub annotations: Vec<Annotation>,
    pub templates: Vec<Template>,
}

impl DatasetExport {
    pub fn build(snapshots: &[VideoSnapshot], templates: &[Template], export_date: Timestamp) -> Self {
        let mut videos = Vec::with_capacity(snapshots.len());
        let mut collections = Vec::new();
        let mut annotations = Vec::new();

        for snapshot in snapshots {
            videos.push(ExportedVideo::from(snapshot.video.clone()));
            collections.extend(snapshot.collections.iter().cloned());
            annotations.extend(snapshot.sorted_annotations());
        }

        Self {
            version: EXPORT_VERSION.to_string(),
            export_date,
            videos,
            collections,
            annotations,
            templates: templates.to_vec(),
        }
    }
}

/// Serializes an export document
pub fn to_json_string<T: Serialize>(document: &T, pretty: bool) -> CoreResult<String> {
    let rendered = if pretty {
        serde_json::to_string_pretty(document)?
    } else {
        serde_json::to_string(document)?
    };
    Ok(rendered)
}
