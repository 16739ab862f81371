//! Remote Adapter
//!
//! Placeholder for a hosted-database backend. Selecting it from settings is
//! supported so call sites can be exercised against it, but every operation
//! logs the attempted call and fails with [`CoreError::NotImplemented`].

use async_trait::async_trait;
use tracing::warn;

use super::StorageAdapter;
use crate::error::{CoreError, CoreResult};
use crate::models::{
    Annotation, AnnotationPatch, Collection, CollectionPatch, NewAnnotation, NewCollection,
    NewTemplate, NewVideo, Template, TemplatePatch, Video, VideoPatch,
};

/// Hosted-database adapter stub
#[derive(Clone, Debug, Default)]
pub struct RemoteAdapter {
    endpoint: Option<String>,
}

impl RemoteAdapter {
    pub fn new(endpoint: Option<String>) -> Self {
        Self { endpoint }
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    fn unsupported<T>(&self, operation: &str, args: String) -> CoreResult<T> {
        warn!(
            "Remote storage is not implemented: {}({}) [endpoint: {}]",
            operation,
            args,
            self.endpoint.as_deref().unwrap_or("unset")
        );
        Err(CoreError::NotImplemented(format!(
            "remote storage: {operation}"
        )))
    }
}

#[async_trait]
impl StorageAdapter for RemoteAdapter {
    fn backend_name(&self) -> &'static str {
        "remote"
    }

    async fn create_video(&self, video: NewVideo) -> CoreResult<Video> {
        self.unsupported("create_video", format!("{:?}", video.title))
    }

    async fn get_video(&self, id: &str) -> CoreResult<Option<Video>> {
        self.unsupported("get_video", id.to_string())
    }

    async fn get_all_videos(&self) -> CoreResult<Vec<Video>> {
        self.unsupported("get_all_videos", String::new())
    }

    async fn update_video(&self, id: &str, patch: VideoPatch) -> CoreResult<Video> {
        self.unsupported("update_video", format!("{id}, {patch:?}"))
    }

    async fn delete_video(&self, id: &str) -> CoreResult<()> {
        self.unsupported("delete_video", id.to_string())
    }

    async fn create_annotation(&self, annotation: NewAnnotation) -> CoreResult<Annotation> {
        self.unsupported(
            "create_annotation",
            format!("{}, {:?}", annotation.video_id, annotation.title),
        )
    }

    async fn get_annotation(&self, id: &str) -> CoreResult<Option<Annotation>> {
        self.unsupported("get_annotation", id.to_string())
    }

    async fn get_annotations_by_video(&self, video_id: &str) -> CoreResult<Vec<Annotation>> {
        self.unsupported("get_annotations_by_video", video_id.to_string())
    }

    async fn get_unassigned_annotations(&self, video_id: &str) -> CoreResult<Vec<Annotation>> {
        self.unsupported("get_unassigned_annotations", video_id.to_string())
    }

    async fn update_annotation(
        &self,
        id: &str,
        patch: AnnotationPatch,
    ) -> CoreResult<Annotation> {
        self.unsupported("update_annotation", format!("{id}, {patch:?}"))
    }

    async fn delete_annotation(&self, id: &str) -> CoreResult<()> {
        self.unsupported("delete_annotation", id.to_string())
    }

    async fn create_collection(&self, collection: NewCollection) -> CoreResult<Collection> {
        self.unsupported(
            "create_collection",
            format!("{}, {:?}", collection.video_id, collection.name),
        )
    }

    async fn get_collection(&self, id: &str) -> CoreResult<Option<Collection>> {
        self.unsupported("get_collection", id.to_string())
    }

    async fn get_collections_by_video(&self, video_id: &str) -> CoreResult<Vec<Collection>> {
        self.unsupported("get_collections_by_video", video_id.to_string())
    }

    async fn update_collection(
        &self,
        id: &str,
        patch: CollectionPatch,
    ) -> CoreResult<Collection> {
        self.unsupported("update_collection", format!("{id}, {patch:?}"))
    }

    async fn delete_collection(&self, id: &str) -> CoreResult<()> {
        self.unsupported("delete_collection", id.to_string())
    }

    async fn create_template(&self, template: NewTemplate) -> CoreResult<Template> {
        self.unsupported("create_template", format!("{:?}", template.name))
    }

    async fn get_template(&self, id: &str) -> CoreResult<Option<Template>> {
        self.unsupported("get_template", id.to_string())
    }

    async fn get_all_templates(&self) -> CoreResult<Vec<Template>> {
        self.unsupported("get_all_templates", String::new())
    }

    async fn update_template(&self, id: &str, patch: TemplatePatch) -> CoreResult<Template> {
        self.unsupported("update_template", format!("{id}, {patch:?}"))
    }

    async fn delete_template(&self, id: &str) -> CoreResult<()> {
        self.unsupported("delete_template", id.to_string())
    }

    async fn apply_template_to_collection(
        &self,
        collection_id: &str,
        template_id: &str,
    ) -> CoreResult<Collection> {
        self.unsupported(
            "apply_template_to_collection",
            format!("{collection_id}, {template_id}"),
        )
    }

    async fn assign_annotation_to_collection(
        &self,
        annotation_id: &str,
        collection_id: &str,
    ) -> CoreResult<Collection> {
        self.unsupported(
            "assign_annotation_to_collection",
            format!("{annotation_id}, {collection_id}"),
        )
    }

    async fn remove_annotation_from_collection(
        &self,
        collection_id: &str,
        annotation_id: &str,
    ) -> CoreResult<Collection> {
        self.unsupported(
            "remove_annotation_from_collection",
            format!("{collection_id}, {annotation_id}"),
        )
    }

    async fn reorder_collection(
        &self,
        collection_id: &str,
        annotation_ids: Vec<String>,
    ) -> CoreResult<Collection> {
        self.unsupported(
            "reorder_collection",
            format!("{collection_id}, {annotation_ids:?}"),
        )
    }
}
