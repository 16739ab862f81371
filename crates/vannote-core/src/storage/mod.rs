//! Storage Layer
//!
//! The sole gateway between callers and durable state.
//!
//! ## Architecture
//!
//! - [`StorageAdapter`]: backend-agnostic async contract (CRUD per entity plus
//!   composite operations that keep the Annotation/Collection relationship in sync)
//! - [`LocalAdapter`]: reference implementation over any [`KeyValueStore`]
//! - [`RemoteAdapter`]: hosted-database stub, every call fails with `NotImplemented`
//! - [`Storage`]: cloneable façade handed to consumers; the adapter is chosen once
//!   at startup from [`StorageSettings`]

pub mod kv;
pub mod local;
pub mod remote;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::error::CoreResult;
use crate::models::{
    Annotation, AnnotationPatch, Collection, CollectionPatch, NewAnnotation, NewCollection,
    NewTemplate, NewVideo, Template, TemplatePatch, Video, VideoPatch,
};
use crate::settings::{StorageBackend, StorageSettings, StoreKind};
use crate::types::TimeSec;

pub use kv::{FileStore, KeyValueStore, MemoryStore};
pub use local::LocalAdapter;
pub use remote::RemoteAdapter;

// =============================================================================
// Adapter Contract
// =============================================================================

/// Persistence contract every backend must honor.
///
/// Semantics shared by all implementations:
/// - `create_*` assigns id, `createdAt` and `updatedAt`.
/// - `get_*` returns `None` for a missing id, never an error.
/// - `update_*` merges the patch and refreshes `updatedAt`; a missing id is a
///   not-found error.
/// - `delete_*` is idempotent and performs cascade cleanup first: a video takes
///   its annotations and collections with it, a collection demotes its members
///   to unassigned, an annotation is spliced out of its collection.
/// - Annotation lists are sorted by ascending `startTime`.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;

    // -------------------------------------------------------------------------
    // Videos
    // -------------------------------------------------------------------------

    async fn create_video(&self, video: NewVideo) -> CoreResult<Video>;
    async fn get_video(&self, id: &str) -> CoreResult<Option<Video>>;
    async fn get_all_videos(&self) -> CoreResult<Vec<Video>>;
    async fn update_video(&self, id: &str, patch: VideoPatch) -> CoreResult<Video>;
    async fn delete_video(&self, id: &str) -> CoreResult<()>;

    // -------------------------------------------------------------------------
    // Annotations
    // -------------------------------------------------------------------------

    /// Stores the annotation as given. A `collectionId` on the input is NOT
    /// mirrored into the collection's `annotationIds`; use
    /// [`StorageAdapter::assign_annotation_to_collection`] for that.
    async fn create_annotation(&self, annotation: NewAnnotation) -> CoreResult<Annotation>;
    async fn get_annotation(&self, id: &str) -> CoreResult<Option<Annotation>>;
    async fn get_annotations_by_video(&self, video_id: &str) -> CoreResult<Vec<Annotation>>;
    async fn get_unassigned_annotations(&self, video_id: &str) -> CoreResult<Vec<Annotation>>;
    /// A `collectionId` in the patch moves the annotation like
    /// [`StorageAdapter::assign_annotation_to_collection`] (or detaches it when
    /// null); `order` moves a member within its collection.
    async fn update_annotation(&self, id: &str, patch: AnnotationPatch)
        -> CoreResult<Annotation>;
    async fn delete_annotation(&self, id: &str) -> CoreResult<()>;

    // -------------------------------------------------------------------------
    // Collections
    // -------------------------------------------------------------------------

    async fn create_collection(&self, collection: NewCollection) -> CoreResult<Collection>;
    async fn get_collection(&self, id: &str) -> CoreResult<Option<Collection>>;
    async fn get_collections_by_video(&self, video_id: &str) -> CoreResult<Vec<Collection>>;
    /// An `annotationIds` patch replaces the member list: dropped members
    /// become unassigned, new members leave their previous collection.
    async fn update_collection(&self, id: &str, patch: CollectionPatch)
        -> CoreResult<Collection>;
    async fn delete_collection(&self, id: &str) -> CoreResult<()>;

    // -------------------------------------------------------------------------
    // Templates
    // -------------------------------------------------------------------------

    async fn create_template(&self, template: NewTemplate) -> CoreResult<Template>;
    async fn get_template(&self, id: &str) -> CoreResult<Option<Template>>;
    async fn get_all_templates(&self) -> CoreResult<Vec<Template>>;
    async fn update_template(&self, id: &str, patch: TemplatePatch) -> CoreResult<Template>;
    async fn delete_template(&self, id: &str) -> CoreResult<()>;

    // -------------------------------------------------------------------------
    // Composite Operations
    // -------------------------------------------------------------------------

    /// Adds every template key missing from the collection's metadata with an
    /// empty value. Existing values are never overwritten.
    async fn apply_template_to_collection(
        &self,
        collection_id: &str,
        template_id: &str,
    ) -> CoreResult<Collection>;

    /// Makes the annotation the last member of the collection, detaching it
    /// from any previous collection. Both sides are written together.
    async fn assign_annotation_to_collection(
        &self,
        annotation_id: &str,
        collection_id: &str,
    ) -> CoreResult<Collection>;

    /// Splices the annotation out of the collection and clears its
    /// `collectionId`/`order`. A non-member annotation is a no-op.
    async fn remove_annotation_from_collection(
        &self,
        collection_id: &str,
        annotation_id: &str,
    ) -> CoreResult<Collection>;

    /// Replaces the member order. `annotation_ids` must be a permutation of
    /// the current members.
    async fn reorder_collection(
        &self,
        collection_id: &str,
        annotation_ids: Vec<String>,
    ) -> CoreResult<Collection>;
}

// =============================================================================
// Storage Façade
// =============================================================================

/// Cloneable handle to the active storage adapter.
///
/// Constructed explicitly and passed to consumers; swapping the adapter never
/// changes call sites.
#[derive(Clone)]
pub struct Storage {
    adapter: Arc<dyn StorageAdapter>,
}

impl Storage {
    /// Wraps an adapter
    pub fn new<A: StorageAdapter + 'static>(adapter: A) -> Self {
        Self {
            adapter: Arc::new(adapter),
        }
    }

    /// Wraps an already shared adapter
    pub fn from_shared(adapter: Arc<dyn StorageAdapter>) -> Self {
        Self { adapter }
    }

    /// Ephemeral local storage (tests, dry runs)
    pub fn in_memory() -> Self {
        Self::new(LocalAdapter::new(MemoryStore::new()))
    }

    /// Builds the adapter selected by configuration
    pub fn from_settings(settings: &StorageSettings, data_dir: &Path) -> CoreResult<Self> {
        let storage = match (settings.backend, settings.kind) {
            (StorageBackend::Remote, _) => {
                Self::new(RemoteAdapter::new(settings.remote_url.clone()))
            }
            (StorageBackend::Local, StoreKind::Memory) => Self::in_memory(),
            (StorageBackend::Local, StoreKind::File) => {
                let store = FileStore::new(data_dir, &settings.namespace)?;
                Self::new(LocalAdapter::new(store))
            }
        };
        info!(
            "Storage initialized (backend: {}, namespace: {})",
            storage.backend_name(),
            settings.namespace
        );
        Ok(storage)
    }

    /// Access to the underlying adapter
    pub fn adapter(&self) -> &dyn StorageAdapter {
        self.adapter.as_ref()
    }

    pub fn backend_name(&self) -> &'static str {
        self.adapter.backend_name()
    }

    // -------------------------------------------------------------------------
    // Videos
    // -------------------------------------------------------------------------

    pub async fn create_video(&self, video: NewVideo) -> CoreResult<Video> {
        self.adapter.create_video(video).await
    }

    pub async fn get_video(&self, id: &str) -> CoreResult<Option<Video>> {
        self.adapter.get_video(id).await
    }

    pub async fn get_all_videos(&self) -> CoreResult<Vec<Video>> {
        self.adapter.get_all_videos().await
    }

    pub async fn update_video(&self, id: &str, patch: VideoPatch) -> CoreResult<Video> {
        self.adapter.update_video(id, patch).await
    }

    pub async fn delete_video(&self, id: &str) -> CoreResult<()> {
        self.adapter.delete_video(id).await
    }

    // -------------------------------------------------------------------------
    // Annotations
    // -------------------------------------------------------------------------

    pub async fn create_annotation(&self, annotation: NewAnnotation) -> CoreResult<Annotation> {
        self.adapter.create_annotation(annotation).await
    }

    pub async fn get_annotation(&self, id: &str) -> CoreResult<Option<Annotation>> {
        self.adapter.get_annotation(id).await
    }

    pub async fn get_annotations_by_video(&self, video_id: &str) -> CoreResult<Vec<Annotation>> {
        self.adapter.get_annotations_by_video(video_id).await
    }

    pub async fn get_unassigned_annotations(
        &self,
        video_id: &str,
    ) -> CoreResult<Vec<Annotation>> {
        self.adapter.get_unassigned_annotations(video_id).await
    }

    pub async fn update_annotation(
        &self,
        id: &str,
        patch: AnnotationPatch,
    ) -> CoreResult<Annotation> {
        self.adapter.update_annotation(id, patch).await
    }

    pub async fn delete_annotation(&self, id: &str) -> CoreResult<()> {
        self.adapter.delete_annotation(id).await
    }

    /// Closes an open annotation at the given playback position
    pub async fn mark_annotation_end(&self, id: &str, end_time: TimeSec) -> CoreResult<Annotation> {
        let patch = AnnotationPatch {
            end_time: Some(Some(end_time)),
            ..Default::default()
        };
        self.adapter.update_annotation(id, patch).await
    }

    // -------------------------------------------------------------------------
    // Collections
    // -------------------------------------------------------------------------

    pub async fn create_collection(&self, collection: NewCollection) -> CoreResult<Collection> {
        self.adapter.create_collection(collection).await
    }

    pub async fn get_collection(&self, id: &str) -> CoreResult<Option<Collection>> {
        self.adapter.get_collection(id).await
    }

    pub async fn get_collections_by_video(&self, video_id: &str) -> CoreResult<Vec<Collection>> {
        self.adapter.get_collections_by_video(video_id).await
    }

    pub async fn update_collection(
        &self,
        id: &str,
        patch: CollectionPatch,
    ) -> CoreResult<Collection> {
        self.adapter.update_collection(id, patch).await
    }

    pub async fn delete_collection(&self, id: &str) -> CoreResult<()> {
        self.adapter.delete_collection(id).await
    }

    // -------------------------------------------------------------------------
    // Templates
    // -------------------------------------------------------------------------

    pub async fn create_template(&self, template: NewTemplate) -> CoreResult<Template> {
        self.adapter.create_template(template).await
    }

    pub async fn get_template(&self, id: &str) -> CoreResult<Option<Template>> {
        self.adapter.get_template(id).await
    }

    pub async fn get_all_templates(&self) -> CoreResult<Vec<Template>> {
        self.adapter.get_all_templates().await
    }

    pub async fn update_template(&self, id: &str, patch: TemplatePatch) -> CoreResult<Template> {
        self.adapter.update_template(id, patch).await
    }

    pub async fn delete_template(&self, id: &str) -> CoreResult<()> {
        self.adapter.delete_template(id).await
    }

    // -------------------------------------------------------------------------
    // Composite Operations
    // -------------------------------------------------------------------------

    pub async fn apply_template_to_collection(
        &self,
        collection_id: &str,
        template_id: &str,
    ) -> CoreResult<Collection> {
        self.adapter
            .apply_template_to_collection(collection_id, template_id)
            .await
    }

    pub async fn assign_annotation_to_collection(
        &self,
        annotation_id: &str,
        collection_id: &str,
    ) -> CoreResult<Collection> {
        self.adapter
            .assign_annotation_to_collection(annotation_id, collection_id)
            .await
    }

    pub async fn remove_annotation_from_collection(
        &self,
        collection_id: &str,
        annotation_id: &str,
    ) -> CoreResult<Collection> {
        self.adapter
            .remove_annotation_from_collection(collection_id, annotation_id)
            .await
    }

    pub async fn reorder_collection(
        &self,
        collection_id: &str,
        annotation_ids: Vec<String>,
    ) -> CoreResult<Collection> {
        self.adapter
            .reorder_collection(collection_id, annotation_ids)
            .await
    }
}
