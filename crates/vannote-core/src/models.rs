//! Entity Data Models
//!
//! Defines the four persisted record types (Video, Annotation, Collection,
//! Template), their creation inputs and partial-update patches.
//!
//! All records serialize with camelCase field names; timestamps are RFC 3339.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

use crate::media::youtube_watch_url;
use crate::types::{AnnotationId, CollectionId, TemplateId, TimeSec, Timestamp, VideoId};

/// Ordered collection metadata (key -> value)
pub type Metadata = IndexMap<String, String>;

// =============================================================================
// Video
// =============================================================================

/// A video registered for annotation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    /// Unique identifier
    pub id: VideoId,
    /// Display title
    pub title: String,
    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// External streaming-platform identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    /// Content hash for local files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// Local file URL or platform URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Duration in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<TimeSec>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Video {
    /// Returns true when the video references a streaming platform
    pub fn is_remote(&self) -> bool {
        self.video_id.is_some()
    }

    /// Derives the source discriminator used by exports
    pub fn source(&self) -> VideoSource {
        match &self.video_id {
            Some(video_id) => VideoSource::Youtube {
                video_id: video_id.clone(),
                url: youtube_watch_url(video_id),
            },
            None => VideoSource::Local {
                title: self.title.clone(),
                hash: self.hash.clone(),
            },
        }
    }

    /// Returns true when `other` describes the same media.
    ///
    /// Platform ids are compared when both sides carry one, otherwise local
    /// hashes when both sides carry one. Anything else never matches.
    pub fn same_media(&self, video_id: Option<&str>, hash: Option<&str>) -> bool {
        if let (Some(theirs), Some(ours)) = (video_id, self.video_id.as_deref()) {
            return theirs == ours;
        }
        if let (Some(theirs), Some(ours)) = (hash, self.hash.as_deref()) {
            return theirs == ours;
        }
        false
    }
}

/// Where a video's media comes from
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VideoSource {
    /// Remote streaming platform reference
    #[serde(rename = "youtube")]
    Youtube {
        #[serde(rename = "videoId")]
        video_id: String,
        url: String,
    },
    /// Local file identified by content hash
    #[serde(rename = "local")]
    Local {
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hash: Option<String>,
    },
}

/// Fields for creating a video
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVideo {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<TimeSec>,
}

impl NewVideo {
    /// A video hosted on a streaming platform
    pub fn youtube(title: &str, video_id: &str, url: &str) -> Self {
        Self {
            title: title.to_string(),
            video_id: Some(video_id.to_string()),
            url: Some(url.to_string()),
            ..Default::default()
        }
    }

    /// A local file identified by its content hash
    pub fn local(title: &str, hash: &str, url: &str) -> Self {
        Self {
            title: title.to_string(),
            hash: Some(hash.to_string()),
            url: Some(url.to_string()),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_duration(mut self, duration: TimeSec) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Materializes the record with an assigned id
    pub fn into_video(self, id: VideoId, now: Timestamp) -> Video {
        Video {
            id,
            title: self.title,
            description: self.description,
            video_id: self.video_id,
            hash: self.hash,
            url: self.url,
            duration: self.duration,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update for a video
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub video_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub hash: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub duration: Option<Option<TimeSec>>,
}

impl VideoPatch {
    pub fn apply(self, video: &mut Video) {
        if let Some(title) = self.title {
            video.title = title;
        }
        merge(&mut video.description, self.description);
        merge(&mut video.video_id, self.video_id);
        merge(&mut video.hash, self.hash);
        merge(&mut video.url, self.url);
        merge(&mut video.duration, self.duration);
    }
}

// =============================================================================
// Annotation
// =============================================================================

/// A timestamped label on a video (point marker or range segment)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: AnnotationId,
    /// Owning video
    pub video_id: VideoId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Start position in seconds
    pub start_time: TimeSec,
    /// End position in seconds (range segments only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<TimeSec>,
    /// Parent collection, if assigned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<CollectionId>,
    /// Position within the parent collection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Annotation {
    /// True for range segments
    pub fn is_range(&self) -> bool {
        self.end_time.is_some()
    }

    /// True for point markers still waiting for an end time
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// True when the annotation is not part of any collection
    pub fn is_unassigned(&self) -> bool {
        self.collection_id.is_none()
    }

    /// Segment length in seconds
    pub fn duration(&self) -> Option<TimeSec> {
        self.end_time.map(|end| end - self.start_time)
    }

    /// Reports whether `end_time >= start_time` (vacuously true for points)
    pub fn has_valid_range(&self) -> bool {
        self.end_time.is_none_or(|end| end >= self.start_time)
    }

    pub(crate) fn detach(&mut self) {
        self.collection_id = None;
        self.order = None;
    }
}

/// Fields for creating an annotation
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAnnotation {
    pub video_id: VideoId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start_time: TimeSec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<TimeSec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<CollectionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
}

impl NewAnnotation {
    pub fn new(video_id: &str, title: &str, start_time: TimeSec) -> Self {
        Self {
            video_id: video_id.to_string(),
            title: title.to_string(),
            start_time,
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_end_time(mut self, end_time: TimeSec) -> Self {
        self.end_time = Some(end_time);
        self
    }

    pub fn with_collection(mut self, collection_id: &str) -> Self {
        self.collection_id = Some(collection_id.to_string());
        self
    }

    pub fn into_annotation(self, id: AnnotationId, now: Timestamp) -> Annotation {
        Annotation {
            id,
            video_id: self.video_id,
            title: self.title,
            description: self.description,
            start_time: self.start_time,
            end_time: self.end_time,
            collection_id: self.collection_id,
            order: self.order,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update for an annotation.
///
/// Ownership (`videoId`) is fixed at creation and cannot be patched.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub start_time: Option<TimeSec>,
    #[serde(default, deserialize_with = "double_option")]
    pub end_time: Option<Option<TimeSec>>,
    #[serde(default, deserialize_with = "double_option")]
    pub collection_id: Option<Option<CollectionId>>,
    #[serde(default, deserialize_with = "double_option")]
    pub order: Option<Option<u32>>,
}

impl AnnotationPatch {
    pub fn apply(self, annotation: &mut Annotation) {
        if let Some(title) = self.title {
            annotation.title = title;
        }
        if let Some(start_time) = self.start_time {
            annotation.start_time = start_time;
        }
        merge(&mut annotation.description, self.description);
        merge(&mut annotation.end_time, self.end_time);
        merge(&mut annotation.collection_id, self.collection_id);
        merge(&mut annotation.order, self.order);
    }
}

// =============================================================================
// Collection
// =============================================================================

/// A named, ordered grouping of annotations with free-form metadata
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: CollectionId,
    pub video_id: VideoId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_metadata")]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<TemplateId>,
    /// Authoritative member ordering
    #[serde(default)]
    pub annotation_ids: Vec<AnnotationId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Collection {
    pub fn contains(&self, annotation_id: &str) -> bool {
        self.annotation_ids.iter().any(|id| id == annotation_id)
    }

    /// Position of a member within the collection
    pub fn position_of(&self, annotation_id: &str) -> Option<usize> {
        self.annotation_ids.iter().position(|id| id == annotation_id)
    }

    /// Adds every template key missing from the metadata with an empty value.
    ///
    /// Returns true if any key was added.
    pub fn merge_template_keys(&mut self, keys: &[String]) -> bool {
        let mut changed = false;
        for key in keys {
            if !self.metadata.contains_key(key) {
                self.metadata.insert(key.clone(), String::new());
                changed = true;
            }
        }
        changed
    }
}

/// Fields for creating a collection
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCollection {
    pub video_id: VideoId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_metadata")]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<TemplateId>,
    #[serde(default)]
    pub annotation_ids: Vec<AnnotationId>,
}

impl NewCollection {
    pub fn new(video_id: &str, name: &str) -> Self {
        Self {
            video_id: video_id.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn into_collection(self, id: CollectionId, now: Timestamp) -> Collection {
        Collection {
            id,
            video_id: self.video_id,
            name: self.name,
            description: self.description,
            metadata: self.metadata,
            template_id: self.template_id,
            annotation_ids: self.annotation_ids,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update for a collection
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_optional_metadata")]
    pub metadata: Option<Metadata>,
    #[serde(default, deserialize_with = "double_option")]
    pub template_id: Option<Option<TemplateId>>,
    #[serde(default)]
    pub annotation_ids: Option<Vec<AnnotationId>>,
}

impl CollectionPatch {
    pub fn apply(self, collection: &mut Collection) {
        if let Some(name) = self.name {
            collection.name = name;
        }
        if let Some(metadata) = self.metadata {
            collection.metadata = metadata;
        }
        if let Some(annotation_ids) = self.annotation_ids {
            collection.annotation_ids = annotation_ids;
        }
        merge(&mut collection.description, self.description);
        merge(&mut collection.template_id, self.template_id);
    }
}

// =============================================================================
// Template
// =============================================================================

/// A reusable list of metadata field names
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_template_keys")]
    pub keys: Vec<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Fields for creating a template
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTemplate {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_template_keys")]
    pub keys: Vec<String>,
}

impl NewTemplate {
    pub fn new(name: &str, keys: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            keys: keys.iter().map(|k| k.to_string()).collect(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn into_template(self, id: TemplateId, now: Timestamp) -> Template {
        Template {
            id,
            name: self.name,
            description: self.description,
            keys: self.keys,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update for a template
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplatePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_optional_template_keys")]
    pub keys: Option<Vec<String>>,
}

impl TemplatePatch {
    pub fn apply(self, template: &mut Template) {
        if let Some(name) = self.name {
            template.name = name;
        }
        if let Some(keys) = self.keys {
            template.keys = keys;
        }
        merge(&mut template.description, self.description);
    }
}

// =============================================================================
// Serde Helpers
// =============================================================================

fn merge<T>(field: &mut Option<T>, update: Option<Option<T>>) {
    if let Some(value) = update {
        *field = value;
    }
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Renders an arbitrary JSON value as a metadata string.
pub(crate) fn metadata_value_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn metadata_from_map(map: IndexMap<String, serde_json::Value>) -> Metadata {
    map.into_iter()
        .map(|(k, v)| (k, metadata_value_to_string(v)))
        .collect()
}

/// Metadata values are strings; other JSON values are stringified on read.
pub(crate) fn deserialize_metadata<'de, D>(deserializer: D) -> Result<Metadata, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<IndexMap<String, serde_json::Value>>::deserialize(deserializer)?;
    Ok(raw.map(metadata_from_map).unwrap_or_default())
}

fn deserialize_optional_metadata<'de, D>(deserializer: D) -> Result<Option<Metadata>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<IndexMap<String, serde_json::Value>>::deserialize(deserializer)?;
    Ok(raw.map(metadata_from_map))
}

/// A template key as found in the wild: a bare name or a field descriptor.
#[derive(Deserialize)]
#[serde(untagged)]
enum TemplateKeyRepr {
    Name(String),
    Field { key: String },
}

pub(crate) fn deserialize_template_keys<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(deserialize_optional_template_keys(deserializer)?.unwrap_or_default())
}

fn deserialize_optional_template_keys<'de, D>(
    deserializer: D,
) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<TemplateKeyRepr>>::deserialize(deserializer)?;
    Ok(raw.map(|keys| {
        keys.into_iter()
            .map(|k| match k {
                TemplateKeyRepr::Name(name) => name,
                TemplateKeyRepr::Field { key } => key,
            })
            .collect()
    }))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::now;
    use serde_json::json;

    fn sample_video() -> Video {
        NewVideo::youtube("Talk", "dQw4w9WgXcQ", "https://youtu.be/dQw4w9WgXcQ")
            .into_video("v1".into(), now())
    }

    // -------------------------------------------------------------------------
    // Video
    // -------------------------------------------------------------------------

    #[test]
    fn test_video_source_youtube() {
        let video = sample_video();
        assert!(video.is_remote());
        assert_eq!(
            video.source(),
            VideoSource::Youtube {
                video_id: "dQw4w9WgXcQ".into(),
                url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".into(),
            }
        );
    }

    #[test]
    fn test_video_source_local_serialization() {
        let video =
            NewVideo::local("clip.mp4", "sha256:abc", "file:///clip.mp4").into_video("v2".into(), now());
        let value = serde_json::to_value(video.source()).unwrap();
        assert_eq!(
            value,
            json!({ "type": "local", "title": "clip.mp4", "hash": "sha256:abc" })
        );
    }

    #[test]
    fn test_same_media() {
        let video = sample_video();
        assert!(video.same_media(Some("dQw4w9WgXcQ"), None));
        assert!(!video.same_media(Some("other"), None));
        // hash only compared when both sides have one
        assert!(!video.same_media(None, Some("sha256:abc")));

        let local = NewVideo::local("a", "sha256:abc", "").into_video("v3".into(), now());
        assert!(local.same_media(None, Some("sha256:abc")));
        assert!(!local.same_media(Some("dQw4w9WgXcQ"), Some("sha256:zzz")));
    }

    #[test]
    fn test_video_serializes_camel_case() {
        let value = serde_json::to_value(sample_video()).unwrap();
        assert_eq!(value["videoId"], "dQw4w9WgXcQ");
        assert!(value.get("createdAt").is_some());
        assert!(value.get("description").is_none());
    }

    #[test]
    fn test_video_patch_clears_with_null() {
        let mut video = sample_video();
        video.description = Some("old".into());
        let patch: VideoPatch =
            serde_json::from_value(json!({ "title": "New", "description": null })).unwrap();
        patch.apply(&mut video);
        assert_eq!(video.title, "New");
        assert_eq!(video.description, None);
        // untouched
        assert_eq!(video.video_id.as_deref(), Some("dQw4w9WgXcQ"));
    }

    // -------------------------------------------------------------------------
    // Annotation
    // -------------------------------------------------------------------------

    #[test]
    fn test_annotation_point_and_range() {
        let point = NewAnnotation::new("v1", "Hook", 3.0).into_annotation("a1".into(), now());
        assert!(point.is_open());
        assert!(!point.is_range());
        assert_eq!(point.duration(), None);
        assert!(point.has_valid_range());

        let range = NewAnnotation::new("v1", "Intro", 3.0)
            .with_end_time(10.5)
            .into_annotation("a2".into(), now());
        assert!(range.is_range());
        assert_eq!(range.duration(), Some(7.5));

        let inverted = NewAnnotation::new("v1", "Bad", 10.0)
            .with_end_time(2.0)
            .into_annotation("a3".into(), now());
        assert!(!inverted.has_valid_range());
    }

    #[test]
    fn test_annotation_patch() {
        let mut annotation = NewAnnotation::new("v1", "Hook", 3.0)
            .with_collection("c1")
            .into_annotation("a1".into(), now());
        annotation.order = Some(2);

        let patch: AnnotationPatch = serde_json::from_value(json!({
            "endTime": 9.0,
            "collectionId": null,
            "order": null
        }))
        .unwrap();
        patch.apply(&mut annotation);

        assert_eq!(annotation.end_time, Some(9.0));
        assert!(annotation.is_unassigned());
        assert_eq!(annotation.order, None);
        assert_eq!(annotation.title, "Hook");
    }

    // -------------------------------------------------------------------------
    // Collection
    // -------------------------------------------------------------------------

    #[test]
    fn test_merge_template_keys_is_additive() {
        let mut collection = NewCollection::new("v1", "Intro")
            .with_metadata("location", "Paris")
            .into_collection("c1".into(), now());

        let keys = vec!["location".to_string(), "mood".to_string()];
        assert!(collection.merge_template_keys(&keys));
        assert_eq!(collection.metadata["location"], "Paris");
        assert_eq!(collection.metadata["mood"], "");

        assert!(!collection.merge_template_keys(&keys));
        let order: Vec<_> = collection.metadata.keys().cloned().collect();
        assert_eq!(order, vec!["location", "mood"]);
    }

    #[test]
    fn test_metadata_values_are_stringified() {
        let collection: NewCollection = serde_json::from_value(json!({
            "videoId": "v1",
            "name": "Intro",
            "metadata": { "count": 3, "flag": true, "missing": null, "text": "x" }
        }))
        .unwrap();
        assert_eq!(collection.metadata["count"], "3");
        assert_eq!(collection.metadata["flag"], "true");
        assert_eq!(collection.metadata["missing"], "");
        assert_eq!(collection.metadata["text"], "x");
    }

    #[test]
    fn test_collection_without_metadata_defaults_empty() {
        let collection: NewCollection =
            serde_json::from_value(json!({ "videoId": "v1", "name": "Intro" })).unwrap();
        assert!(collection.metadata.is_empty());
        assert!(collection.annotation_ids.is_empty());
    }

    // -------------------------------------------------------------------------
    // Template
    // -------------------------------------------------------------------------

    #[test]
    fn test_template_keys_accept_field_descriptors() {
        let template: NewTemplate = serde_json::from_value(json!({
            "name": "Mixed",
            "keys": ["plain", { "key": "rich", "type": "string", "required": true }]
        }))
        .unwrap();
        assert_eq!(template.keys, vec!["plain", "rich"]);
    }

    #[test]
    fn test_template_patch() {
        let mut template = NewTemplate::new("Scenes", &["location"])
            .with_description("d")
            .into_template("t1".into(), now());
        let patch: TemplatePatch =
            serde_json::from_value(json!({ "keys": ["a", "b"], "description": null })).unwrap();
        patch.apply(&mut template);
        assert_eq!(template.keys, vec!["a", "b"]);
        assert_eq!(template.description, None);
        assert_eq!(template.name, "Scenes");
    }
}
