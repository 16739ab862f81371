//! Local Adapter
//!
//! Reference [`StorageAdapter`] over a [`KeyValueStore`]. Each entity type is
//! one JSON array under a fixed key, read in full and rewritten in full on
//! every mutation. Mutations are serialized by an async write lock, and
//! multi-list writes are committed together (rolled back if a later write
//! fails), so the Annotation/Collection relationship never observes half of
//! an update.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};
use ulid::{Generator, Ulid};

use super::kv::KeyValueStore;
use super::StorageAdapter;
use crate::error::{CoreError, CoreResult};
use crate::models::{
    Annotation, AnnotationPatch, Collection, CollectionPatch, NewAnnotation, NewCollection,
    NewTemplate, NewVideo, Template, TemplatePatch, Video, VideoPatch,
};
use crate::types::{now, AnnotationId, CollectionId, Timestamp};

// =============================================================================
// Constants
// =============================================================================

/// Key holding the video list
pub const VIDEOS_KEY: &str = "videos";

/// Key holding the annotation list
pub const ANNOTATIONS_KEY: &str = "annotations";

/// Key holding the collection list
pub const COLLECTIONS_KEY: &str = "collections";

/// Key holding the template list
pub const TEMPLATES_KEY: &str = "templates";

// =============================================================================
// Write Batch
// =============================================================================

/// Serialized lists to commit together
#[derive(Default)]
struct Batch {
    writes: Vec<(&'static str, String)>,
}

impl Batch {
    fn put<T: Serialize>(&mut self, key: &'static str, items: &[T]) -> CoreResult<()> {
        self.writes.push((key, serde_json::to_string(items)?));
        Ok(())
    }
}

// =============================================================================
// Local Adapter
// =============================================================================

/// Storage adapter persisting entity lists in a key-value store
pub struct LocalAdapter<S: KeyValueStore> {
    store: S,
    write_lock: AsyncMutex<()>,
    ids: Mutex<Generator>,
}

impl<S: KeyValueStore> LocalAdapter<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            write_lock: AsyncMutex::new(()),
            ids: Mutex::new(Generator::new()),
        }
    }

    /// Returns the backing store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Time-ordered id with a random suffix, monotonic within this adapter.
    fn generate_id(&self) -> String {
        let ulid = match self.ids.lock() {
            Ok(mut generator) => generator.generate().unwrap_or_else(|_| Ulid::new()),
            Err(_) => Ulid::new(),
        };
        ulid.to_string().to_lowercase()
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> CoreResult<Vec<T>> {
        match self.store.get(key)? {
            None => Ok(Vec::new()),
            Some(raw) if raw.trim().is_empty() => Ok(Vec::new()),
            Some(raw) => serde_json::from_str(&raw).map_err(|e| CoreError::StorageCorrupted {
                key: key.to_string(),
                message: e.to_string(),
            }),
        }
    }

    /// Writes every list in the batch; restores earlier lists if a later write fails.
    fn commit(&self, batch: Batch) -> CoreResult<()> {
        let mut previous = Vec::with_capacity(batch.writes.len());
        for (key, _) in &batch.writes {
            previous.push((*key, self.store.get(key)?));
        }

        for (index, (key, value)) in batch.writes.iter().enumerate() {
            if let Err(e) = self.store.set(key, value) {
                warn!("Write of '{}' failed, rolling back {} list(s)", key, index);
                for (prev_key, prev_value) in previous.iter().take(index) {
                    let restored = match prev_value {
                        Some(raw) => self.store.set(prev_key, raw),
                        None => self.store.remove(prev_key),
                    };
                    if let Err(restore_err) = restored {
                        warn!("Failed to restore '{}': {}", prev_key, restore_err);
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }

    fn sorted_by_start(mut annotations: Vec<Annotation>) -> Vec<Annotation> {
        annotations.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        annotations
    }

    fn warn_if_inverted(annotation: &Annotation) {
        if !annotation.has_valid_range() {
            warn!(
                "Annotation {} ends before it starts ({} < {})",
                annotation.id,
                annotation.end_time.unwrap_or_default(),
                annotation.start_time
            );
        }
    }
}

/// Rewrites `collectionId`/`order` of every member to match its position.
fn sync_members(collection: &Collection, annotations: &mut [Annotation], at: Timestamp) {
    for (position, member_id) in collection.annotation_ids.iter().enumerate() {
        if let Some(annotation) = annotations.iter_mut().find(|a| &a.id == member_id) {
            let order = Some(position as u32);
            if annotation.collection_id.as_deref() != Some(collection.id.as_str())
                || annotation.order != order
            {
                annotation.collection_id = Some(collection.id.clone());
                annotation.order = order;
                annotation.updated_at = at;
            }
        }
    }
}

/// Removes `annotation_id` from every collection except `keep`, re-deriving member order.
fn detach_from_other_collections(
    annotation_id: &str,
    keep: Option<&str>,
    collections: &mut [Collection],
    annotations: &mut [Annotation],
    at: Timestamp,
) {
    for collection in collections.iter_mut() {
        if Some(collection.id.as_str()) == keep || !collection.contains(annotation_id) {
            continue;
        }
        collection.annotation_ids.retain(|id| id != annotation_id);
        collection.updated_at = at;
        sync_members(collection, annotations, at);
    }
}

/// Moves an annotation to `membership` (`Some(None)` detaches it) and, for a
/// member, to list position `order`. Both sides of the link are rewritten.
fn relink_annotation(
    annotation_id: &str,
    membership: Option<Option<CollectionId>>,
    order: Option<Option<u32>>,
    collections: &mut [Collection],
    annotations: &mut [Annotation],
    at: Timestamp,
) -> CoreResult<()> {
    match membership {
        Some(None) => {
            detach_from_other_collections(annotation_id, None, collections, annotations, at);
            if let Some(annotation) = annotations.iter_mut().find(|a| a.id == annotation_id) {
                if annotation.collection_id.is_some() || annotation.order.is_some() {
                    annotation.detach();
                    annotation.updated_at = at;
                }
            }
            return Ok(());
        }
        Some(Some(collection_id)) => {
            let video_id = annotations
                .iter()
                .find(|a| a.id == annotation_id)
                .map(|a| a.video_id.clone())
                .ok_or_else(|| CoreError::AnnotationNotFound(annotation_id.to_string()))?;
            let target = collections
                .iter()
                .position(|c| c.id == collection_id)
                .ok_or_else(|| CoreError::CollectionNotFound(collection_id.clone()))?;
            if collections[target].video_id != video_id {
                return Err(CoreError::ValidationError(format!(
                    "Annotation {} belongs to video {}, collection {} to video {}",
                    annotation_id, video_id, collection_id, collections[target].video_id
                )));
            }

            detach_from_other_collections(
                annotation_id,
                Some(collection_id.as_str()),
                collections,
                annotations,
                at,
            );
            let target = &mut collections[target];
            if !target.contains(annotation_id) {
                target.annotation_ids.push(annotation_id.to_string());
                target.updated_at = at;
            }
        }
        None => {}
    }

    let Some(collection) = collections.iter_mut().find(|c| c.contains(annotation_id)) else {
        if order.is_some() {
            debug!("Ignoring order of unassigned annotation {}", annotation_id);
        }
        return Ok(());
    };
    if let (Some(Some(position)), Some(current)) = (order, collection.position_of(annotation_id)) {
        let member = collection.annotation_ids.remove(current);
        let position = (position as usize).min(collection.annotation_ids.len());
        collection.annotation_ids.insert(position, member);
        if position != current {
            collection.updated_at = at;
        }
    }
    sync_members(collection, annotations, at);
    Ok(())
}

/// Replaces the member list of `collections[index]`. Dropped members are
/// detached; new members leave their previous collection.
fn replace_members(
    index: usize,
    members: Vec<AnnotationId>,
    collections: &mut [Collection],
    annotations: &mut [Annotation],
    at: Timestamp,
) -> CoreResult<()> {
    let collection_id = collections[index].id.clone();
    let video_id = collections[index].video_id.clone();

    let mut list: Vec<AnnotationId> = Vec::with_capacity(members.len());
    for member_id in members {
        let annotation = annotations
            .iter()
            .find(|a| a.id == member_id)
            .ok_or_else(|| CoreError::AnnotationNotFound(member_id.clone()))?;
        if annotation.video_id != video_id {
            return Err(CoreError::ValidationError(format!(
                "Annotation {} belongs to video {}, collection {} to video {}",
                member_id, annotation.video_id, collection_id, video_id
            )));
        }
        if !list.contains(&member_id) {
            list.push(member_id);
        }
    }

    for annotation in annotations.iter_mut() {
        if annotation.collection_id.as_deref() == Some(collection_id.as_str())
            && !list.contains(&annotation.id)
        {
            annotation.detach();
            annotation.updated_at = at;
        }
    }
    for member_id in &list {
        detach_from_other_collections(
            member_id,
            Some(collection_id.as_str()),
            collections,
            annotations,
            at,
        );
    }

    let collection = &mut collections[index];
    collection.annotation_ids = list;
    sync_members(collection, annotations, at);
    Ok(())
}

#[async_trait]
impl<S: KeyValueStore + 'static> StorageAdapter for LocalAdapter<S> {
    fn backend_name(&self) -> &'static str {
        "local"
    }

    // =========================================================================
    // Videos
    // =========================================================================

    async fn create_video(&self, video: NewVideo) -> CoreResult<Video> {
        let _guard = self.write_lock.lock().await;
        let video = video.into_video(self.generate_id(), now());

        let mut videos: Vec<Video> = self.load(VIDEOS_KEY)?;
        videos.push(video.clone());

        let mut batch = Batch::default();
        batch.put(VIDEOS_KEY, &videos)?;
        self.commit(batch)?;

        info!("Created video {} ({})", video.id, video.title);
        Ok(video)
    }

    async fn get_video(&self, id: &str) -> CoreResult<Option<Video>> {
        let videos: Vec<Video> = self.load(VIDEOS_KEY)?;
        Ok(videos.into_iter().find(|v| v.id == id))
    }

    async fn get_all_videos(&self) -> CoreResult<Vec<Video>> {
        self.load(VIDEOS_KEY)
    }

    async fn update_video(&self, id: &str, patch: VideoPatch) -> CoreResult<Video> {
        let _guard = self.write_lock.lock().await;
        let mut videos: Vec<Video> = self.load(VIDEOS_KEY)?;
        let video = videos
            .iter_mut()
            .find(|v| v.id == id)
            .ok_or_else(|| CoreError::VideoNotFound(id.to_string()))?;

        patch.apply(video);
        video.updated_at = now();
        let updated = video.clone();

        let mut batch = Batch::default();
        batch.put(VIDEOS_KEY, &videos)?;
        self.commit(batch)?;

        debug!("Updated video {}", id);
        Ok(updated)
    }

    async fn delete_video(&self, id: &str) -> CoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut videos: Vec<Video> = self.load(VIDEOS_KEY)?;
        let mut annotations: Vec<Annotation> = self.load(ANNOTATIONS_KEY)?;
        let mut collections: Vec<Collection> = self.load(COLLECTIONS_KEY)?;

        let before = (videos.len(), annotations.len(), collections.len());
        videos.retain(|v| v.id != id);
        annotations.retain(|a| a.video_id != id);
        collections.retain(|c| c.video_id != id);

        if before == (videos.len(), annotations.len(), collections.len()) {
            debug!("Delete of unknown video {} is a no-op", id);
            return Ok(());
        }

        let mut batch = Batch::default();
        batch.put(VIDEOS_KEY, &videos)?;
        batch.put(ANNOTATIONS_KEY, &annotations)?;
        batch.put(COLLECTIONS_KEY, &collections)?;
        self.commit(batch)?;

        info!(
            "Deleted video {} with {} annotation(s) and {} collection(s)",
            id,
            before.1 - annotations.len(),
            before.2 - collections.len()
        );
        Ok(())
    }

    // =========================================================================
    // Annotations
    // =========================================================================

    async fn create_annotation(&self, annotation: NewAnnotation) -> CoreResult<Annotation> {
        let _guard = self.write_lock.lock().await;
        let annotation = annotation.into_annotation(self.generate_id(), now());
        Self::warn_if_inverted(&annotation);

        let mut annotations: Vec<Annotation> = self.load(ANNOTATIONS_KEY)?;
        annotations.push(annotation.clone());

        let mut batch = Batch::default();
        batch.put(ANNOTATIONS_KEY, &annotations)?;
        self.commit(batch)?;

        debug!(
            "Created annotation {} on video {} at {}s",
            annotation.id, annotation.video_id, annotation.start_time
        );
        Ok(annotation)
    }

    async fn get_annotation(&self, id: &str) -> CoreResult<Option<Annotation>> {
        let annotations: Vec<Annotation> = self.load(ANNOTATIONS_KEY)?;
        Ok(annotations.into_iter().find(|a| a.id == id))
    }

    async fn get_annotations_by_video(&self, video_id: &str) -> CoreResult<Vec<Annotation>> {
        let annotations: Vec<Annotation> = self.load(ANNOTATIONS_KEY)?;
        Ok(Self::sorted_by_start(
            annotations
                .into_iter()
                .filter(|a| a.video_id == video_id)
                .collect(),
        ))
    }

    async fn get_unassigned_annotations(&self, video_id: &str) -> CoreResult<Vec<Annotation>> {
        let annotations: Vec<Annotation> = self.load(ANNOTATIONS_KEY)?;
        Ok(Self::sorted_by_start(
            annotations
                .into_iter()
                .filter(|a| a.video_id == video_id && a.is_unassigned())
                .collect(),
        ))
    }

    async fn update_annotation(
        &self,
        id: &str,
        mut patch: AnnotationPatch,
    ) -> CoreResult<Annotation> {
        let _guard = self.write_lock.lock().await;
        let mut annotations: Vec<Annotation> = self.load(ANNOTATIONS_KEY)?;
        let index = annotations
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| CoreError::AnnotationNotFound(id.to_string()))?;

        // Membership fields go through the relink helper, never straight onto the record.
        let membership = patch.collection_id.take();
        let order = patch.order.take();

        let at = now();
        let annotation = &mut annotations[index];
        patch.apply(annotation);
        annotation.updated_at = at;
        Self::warn_if_inverted(annotation);

        let mut batch = Batch::default();
        if membership.is_some() || order.is_some() {
            let mut collections: Vec<Collection> = self.load(COLLECTIONS_KEY)?;
            relink_annotation(id, membership, order, &mut collections, &mut annotations, at)?;
            batch.put(COLLECTIONS_KEY, &collections)?;
        }
        let updated = annotations[index].clone();
        batch.put(ANNOTATIONS_KEY, &annotations)?;
        self.commit(batch)?;

        debug!("Updated annotation {}", id);
        Ok(updated)
    }

    async fn delete_annotation(&self, id: &str) -> CoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut annotations: Vec<Annotation> = self.load(ANNOTATIONS_KEY)?;
        let mut collections: Vec<Collection> = self.load(COLLECTIONS_KEY)?;

        let Some(index) = annotations.iter().position(|a| a.id == id) else {
            debug!("Delete of unknown annotation {} is a no-op", id);
            return Ok(());
        };
        annotations.remove(index);

        let at = now();
        let touched_collections = collections.iter().any(|c| c.contains(id));
        detach_from_other_collections(id, None, &mut collections, &mut annotations, at);

        let mut batch = Batch::default();
        if touched_collections {
            batch.put(COLLECTIONS_KEY, &collections)?;
        }
        batch.put(ANNOTATIONS_KEY, &annotations)?;
        self.commit(batch)?;

        info!("Deleted annotation {}", id);
        Ok(())
    }

    // =========================================================================
    // Collections
    // =========================================================================

    async fn create_collection(&self, collection: NewCollection) -> CoreResult<Collection> {
        let _guard = self.write_lock.lock().await;
        let collection = collection.into_collection(self.generate_id(), now());

        let mut collections: Vec<Collection> = self.load(COLLECTIONS_KEY)?;
        collections.push(collection.clone());

        let mut batch = Batch::default();
        batch.put(COLLECTIONS_KEY, &collections)?;
        self.commit(batch)?;

        info!("Created collection {} ({})", collection.id, collection.name);
        Ok(collection)
    }

    async fn get_collection(&self, id: &str) -> CoreResult<Option<Collection>> {
        let collections: Vec<Collection> = self.load(COLLECTIONS_KEY)?;
        Ok(collections.into_iter().find(|c| c.id == id))
    }

    async fn get_collections_by_video(&self, video_id: &str) -> CoreResult<Vec<Collection>> {
        let collections: Vec<Collection> = self.load(COLLECTIONS_KEY)?;
        Ok(collections
            .into_iter()
            .filter(|c| c.video_id == video_id)
            .collect())
    }

    async fn update_collection(
        &self,
        id: &str,
        mut patch: CollectionPatch,
    ) -> CoreResult<Collection> {
        let _guard = self.write_lock.lock().await;
        let mut collections: Vec<Collection> = self.load(COLLECTIONS_KEY)?;
        let index = collections
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| CoreError::CollectionNotFound(id.to_string()))?;

        let members = patch.annotation_ids.take();
        let at = now();
        patch.apply(&mut collections[index]);
        collections[index].updated_at = at;

        let mut batch = Batch::default();
        if let Some(members) = members {
            let mut annotations: Vec<Annotation> = self.load(ANNOTATIONS_KEY)?;
            replace_members(index, members, &mut collections, &mut annotations, at)?;
            batch.put(COLLECTIONS_KEY, &collections)?;
            batch.put(ANNOTATIONS_KEY, &annotations)?;
        } else {
            batch.put(COLLECTIONS_KEY, &collections)?;
        }
        let updated = collections[index].clone();
        self.commit(batch)?;

        debug!("Updated collection {}", id);
        Ok(updated)
    }

    async fn delete_collection(&self, id: &str) -> CoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut collections: Vec<Collection> = self.load(COLLECTIONS_KEY)?;
        let mut annotations: Vec<Annotation> = self.load(ANNOTATIONS_KEY)?;

        let Some(index) = collections.iter().position(|c| c.id == id) else {
            debug!("Delete of unknown collection {} is a no-op", id);
            return Ok(());
        };
        let collection = collections.remove(index);

        // Demote members listed by the collection and any annotation still pointing at it.
        let at = now();
        let mut demoted = 0usize;
        for annotation in annotations.iter_mut() {
            if collection.contains(&annotation.id)
                || annotation.collection_id.as_deref() == Some(id)
            {
                annotation.detach();
                annotation.updated_at = at;
                demoted += 1;
            }
        }

        let mut batch = Batch::default();
        batch.put(ANNOTATIONS_KEY, &annotations)?;
        batch.put(COLLECTIONS_KEY, &collections)?;
        self.commit(batch)?;

        info!(
            "Deleted collection {} ({} annotation(s) now unassigned)",
            id, demoted
        );
        Ok(())
    }

    // =========================================================================
    // Templates
    // =========================================================================

    async fn create_template(&self, template: NewTemplate) -> CoreResult<Template> {
        let _guard = self.write_lock.lock().await;
        let template = template.into_template(self.generate_id(), now());

        let mut templates: Vec<Template> = self.load(TEMPLATES_KEY)?;
        templates.push(template.clone());

        let mut batch = Batch::default();
        batch.put(TEMPLATES_KEY, &templates)?;
        self.commit(batch)?;

        info!("Created template {} ({})", template.id, template.name);
        Ok(template)
    }

    async fn get_template(&self, id: &str) -> CoreResult<Option<Template>> {
        let templates: Vec<Template> = self.load(TEMPLATES_KEY)?;
        Ok(templates.into_iter().find(|t| t.id == id))
    }

    async fn get_all_templates(&self) -> CoreResult<Vec<Template>> {
        self.load(TEMPLATES_KEY)
    }

    async fn update_template(&self, id: &str, patch: TemplatePatch) -> CoreResult<Template> {
        let _guard = self.write_lock.lock().await;
        let mut templates: Vec<Template> = self.load(TEMPLATES_KEY)?;
        let template = templates
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| CoreError::TemplateNotFound(id.to_string()))?;

        patch.apply(template);
        template.updated_at = now();
        let updated = template.clone();

        let mut batch = Batch::default();
        batch.put(TEMPLATES_KEY, &templates)?;
        self.commit(batch)?;

        debug!("Updated template {}", id);
        Ok(updated)
    }

    async fn delete_template(&self, id: &str) -> CoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut templates: Vec<Template> = self.load(TEMPLATES_KEY)?;
        let mut collections: Vec<Collection> = self.load(COLLECTIONS_KEY)?;

        let before = templates.len();
        templates.retain(|t| t.id != id);
        if templates.len() == before {
            debug!("Delete of unknown template {} is a no-op", id);
            return Ok(());
        }

        // Metadata already merged from the template stays; only the reference goes.
        let at = now();
        let mut unlinked = false;
        for collection in collections.iter_mut() {
            if collection.template_id.as_deref() == Some(id) {
                collection.template_id = None;
                collection.updated_at = at;
                unlinked = true;
            }
        }

        let mut batch = Batch::default();
        if unlinked {
            batch.put(COLLECTIONS_KEY, &collections)?;
        }
        batch.put(TEMPLATES_KEY, &templates)?;
        self.commit(batch)?;

        info!("Deleted template {}", id);
        Ok(())
    }

    // =========================================================================
    // Composite Operations
    // =========================================================================

    async fn apply_template_to_collection(
        &self,
        collection_id: &str,
        template_id: &str,
    ) -> CoreResult<Collection> {
        let _guard = self.write_lock.lock().await;
        let templates: Vec<Template> = self.load(TEMPLATES_KEY)?;
        let template = templates
            .iter()
            .find(|t| t.id == template_id)
            .ok_or_else(|| CoreError::TemplateNotFound(template_id.to_string()))?;

        let mut collections: Vec<Collection> = self.load(COLLECTIONS_KEY)?;
        let collection = collections
            .iter_mut()
            .find(|c| c.id == collection_id)
            .ok_or_else(|| CoreError::CollectionNotFound(collection_id.to_string()))?;

        collection.merge_template_keys(&template.keys);
        collection.template_id = Some(template.id.clone());
        collection.updated_at = now();
        let updated = collection.clone();

        let mut batch = Batch::default();
        batch.put(COLLECTIONS_KEY, &collections)?;
        self.commit(batch)?;

        info!(
            "Applied template {} to collection {}",
            template_id, collection_id
        );
        Ok(updated)
    }

    async fn assign_annotation_to_collection(
        &self,
        annotation_id: &str,
        collection_id: &str,
    ) -> CoreResult<Collection> {
        let _guard = self.write_lock.lock().await;
        let mut annotations: Vec<Annotation> = self.load(ANNOTATIONS_KEY)?;
        let mut collections: Vec<Collection> = self.load(COLLECTIONS_KEY)?;

        relink_annotation(
            annotation_id,
            Some(Some(collection_id.to_string())),
            None,
            &mut collections,
            &mut annotations,
            now(),
        )?;
        let updated = collections
            .iter()
            .find(|c| c.id == collection_id)
            .cloned()
            .ok_or_else(|| CoreError::CollectionNotFound(collection_id.to_string()))?;

        let mut batch = Batch::default();
        batch.put(COLLECTIONS_KEY, &collections)?;
        batch.put(ANNOTATIONS_KEY, &annotations)?;
        self.commit(batch)?;

        info!(
            "Assigned annotation {} to collection {} at position {}",
            annotation_id,
            collection_id,
            updated.position_of(annotation_id).unwrap_or_default()
        );
        Ok(updated)
    }

    async fn remove_annotation_from_collection(
        &self,
        collection_id: &str,
        annotation_id: &str,
    ) -> CoreResult<Collection> {
        let _guard = self.write_lock.lock().await;
        let mut collections: Vec<Collection> = self.load(COLLECTIONS_KEY)?;
        let mut annotations: Vec<Annotation> = self.load(ANNOTATIONS_KEY)?;

        let collection = collections
            .iter_mut()
            .find(|c| c.id == collection_id)
            .ok_or_else(|| CoreError::CollectionNotFound(collection_id.to_string()))?;

        let was_member = collection.contains(annotation_id);
        let claimed = annotations
            .iter()
            .any(|a| a.id == annotation_id && a.collection_id.as_deref() == Some(collection_id));
        if !was_member && !claimed {
            debug!(
                "Annotation {} is not in collection {}; nothing to remove",
                annotation_id, collection_id
            );
            return Ok(collection.clone());
        }

        let at = now();
        collection.annotation_ids.retain(|id| id != annotation_id);
        collection.updated_at = at;
        if let Some(annotation) = annotations.iter_mut().find(|a| a.id == annotation_id) {
            annotation.detach();
            annotation.updated_at = at;
        }
        sync_members(collection, &mut annotations, at);
        let updated = collection.clone();

        let mut batch = Batch::default();
        batch.put(COLLECTIONS_KEY, &collections)?;
        batch.put(ANNOTATIONS_KEY, &annotations)?;
        self.commit(batch)?;

        info!(
            "Removed annotation {} from collection {}",
            annotation_id, collection_id
        );
        Ok(updated)
    }

    async fn reorder_collection(
        &self,
        collection_id: &str,
        annotation_ids: Vec<String>,
    ) -> CoreResult<Collection> {
        let _guard = self.write_lock.lock().await;
        let mut collections: Vec<Collection> = self.load(COLLECTIONS_KEY)?;
        let mut annotations: Vec<Annotation> = self.load(ANNOTATIONS_KEY)?;

        let collection = collections
            .iter_mut()
            .find(|c| c.id == collection_id)
            .ok_or_else(|| CoreError::CollectionNotFound(collection_id.to_string()))?;

        let current: HashSet<&str> = collection.annotation_ids.iter().map(String::as_str).collect();
        let proposed: HashSet<&str> = annotation_ids.iter().map(String::as_str).collect();
        if annotation_ids.len() != collection.annotation_ids.len() || current != proposed {
            return Err(CoreError::ValidationError(format!(
                "Reorder of collection {} must be a permutation of its {} member(s)",
                collection_id,
                collection.annotation_ids.len()
            )));
        }

        let at = now();
        collection.annotation_ids = annotation_ids;
        collection.updated_at = at;
        sync_members(collection, &mut annotations, at);
        let updated = collection.clone();

        let mut batch = Batch::default();
        batch.put(COLLECTIONS_KEY, &collections)?;
        batch.put(ANNOTATIONS_KEY, &annotations)?;
        self.commit(batch)?;

        debug!("Reordered collection {}", collection_id);
        Ok(updated)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::kv::MemoryStore;

    fn create_adapter() -> LocalAdapter<MemoryStore> {
        LocalAdapter::new(MemoryStore::new())
    }

    async fn seed_video(adapter: &LocalAdapter<MemoryStore>) -> Video {
        adapter
            .create_video(NewVideo::youtube("Talk", "abc123", "https://youtu.be/abc123"))
            .await
            .unwrap()
    }

    /// Both directions of the Annotation/Collection relationship agree.
    fn assert_consistent(adapter: &LocalAdapter<MemoryStore>) {
        let annotations: Vec<Annotation> = adapter.load(ANNOTATIONS_KEY).unwrap();
        let collections: Vec<Collection> = adapter.load(COLLECTIONS_KEY).unwrap();

        for annotation in &annotations {
            if let Some(collection_id) = &annotation.collection_id {
                let collection = collections
                    .iter()
                    .find(|c| &c.id == collection_id)
                    .expect("annotation points at a missing collection");
                assert!(collection.contains(&annotation.id));
            }
        }
        for collection in &collections {
            for (position, member_id) in collection.annotation_ids.iter().enumerate() {
                let member = annotations
                    .iter()
                    .find(|a| &a.id == member_id)
                    .expect("collection lists a missing annotation");
                assert_eq!(member.collection_id.as_deref(), Some(collection.id.as_str()));
                assert_eq!(member.order, Some(position as u32));
            }
        }
    }

    // -------------------------------------------------------------------------
    // IDs and Persistence
    // -------------------------------------------------------------------------

    #[test]
    fn test_generated_ids_are_unique_and_ordered() {
        let adapter = create_adapter();
        let ids: Vec<String> = (0..100).map(|_| adapter.generate_id()).collect();
        let unique: HashSet<&String> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());

        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(sorted, ids);
    }

    #[tokio::test]
    async fn test_corrupted_list_is_reported() {
        let adapter = create_adapter();
        adapter.store().set(VIDEOS_KEY, "{not json").unwrap();

        let err = adapter.get_all_videos().await.unwrap_err();
        assert!(matches!(err, CoreError::StorageCorrupted { ref key, .. } if key == "videos"));
    }

    #[tokio::test]
    async fn test_lists_persist_under_fixed_keys() {
        let adapter = create_adapter();
        let video = seed_video(&adapter).await;
        adapter
            .create_annotation(NewAnnotation::new(&video.id, "Hook", 3.0))
            .await
            .unwrap();

        let raw = adapter.store().get(ANNOTATIONS_KEY).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value[0]["title"], "Hook");
        assert_eq!(value[0]["startTime"], 3.0);
        assert!(value[0]["createdAt"].is_string());
    }

    // -------------------------------------------------------------------------
    // CRUD
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let adapter = create_adapter();
        assert!(adapter.get_video("nope").await.unwrap().is_none());
        assert!(adapter.get_annotation("nope").await.unwrap().is_none());
        assert!(adapter.get_collection("nope").await.unwrap().is_none());
        assert!(adapter.get_template("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let adapter = create_adapter();
        let err = adapter
            .update_video("nope", VideoPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::VideoNotFound(_)));

        let err = adapter
            .update_annotation("nope", AnnotationPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::AnnotationNotFound(_)));

        let err = adapter
            .update_collection("nope", CollectionPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::CollectionNotFound(_)));

        let err = adapter
            .update_template("nope", TemplatePatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::TemplateNotFound(_)));
    }

    #[tokio::test]
    async fn test_update_refreshes_timestamp() {
        let adapter = create_adapter();
        let video = seed_video(&adapter).await;

        let patch = VideoPatch {
            title: Some("Renamed".into()),
            duration: Some(Some(120.0)),
            ..Default::default()
        };
        let updated = adapter.update_video(&video.id, patch).await.unwrap();
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.duration, Some(120.0));
        assert_eq!(updated.created_at, video.created_at);
        assert!(updated.updated_at >= video.updated_at);
    }

    #[tokio::test]
    async fn test_annotations_sorted_by_start_time() {
        let adapter = create_adapter();
        let video = seed_video(&adapter).await;
        for (title, start) in [("c", 30.0), ("a", 1.5), ("b", 12.0)] {
            adapter
                .create_annotation(NewAnnotation::new(&video.id, title, start))
                .await
                .unwrap();
        }
        adapter
            .create_annotation(NewAnnotation::new("other-video", "x", 0.0))
            .await
            .unwrap();

        let titles: Vec<String> = adapter
            .get_annotations_by_video(&video.id)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.title)
            .collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_unassigned_annotations() {
        let adapter = create_adapter();
        let video = seed_video(&adapter).await;
        let collection = adapter
            .create_collection(NewCollection::new(&video.id, "Intro"))
            .await
            .unwrap();

        let late = adapter
            .create_annotation(NewAnnotation::new(&video.id, "late", 50.0))
            .await
            .unwrap();
        let early = adapter
            .create_annotation(NewAnnotation::new(&video.id, "early", 5.0))
            .await
            .unwrap();
        let member = adapter
            .create_annotation(NewAnnotation::new(&video.id, "member", 1.0))
            .await
            .unwrap();
        adapter
            .assign_annotation_to_collection(&member.id, &collection.id)
            .await
            .unwrap();

        let ids: Vec<String> = adapter
            .get_unassigned_annotations(&video.id)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec![early.id, late.id]);
    }

    #[tokio::test]
    async fn test_create_with_collection_id_does_not_append() {
        let adapter = create_adapter();
        let video = seed_video(&adapter).await;
        let collection = adapter
            .create_collection(NewCollection::new(&video.id, "Intro"))
            .await
            .unwrap();

        let annotation = adapter
            .create_annotation(NewAnnotation::new(&video.id, "Hook", 3.0).with_collection(&collection.id))
            .await
            .unwrap();
        assert_eq!(annotation.collection_id.as_deref(), Some(collection.id.as_str()));

        let stored = adapter.get_collection(&collection.id).await.unwrap().unwrap();
        assert!(stored.annotation_ids.is_empty());

        let patch = CollectionPatch {
            annotation_ids: Some(vec![annotation.id.clone()]),
            ..Default::default()
        };
        let linked = adapter.update_collection(&collection.id, patch).await.unwrap();
        assert_eq!(linked.annotation_ids, vec![annotation.id]);
        assert_consistent(&adapter);
    }

    async fn seed_members(
        adapter: &LocalAdapter<MemoryStore>,
        video: &Video,
        collection: &Collection,
        titles: &[&str],
    ) -> Vec<String> {
        let mut ids = Vec::new();
        for (index, title) in titles.iter().enumerate() {
            let annotation = adapter
                .create_annotation(NewAnnotation::new(&video.id, title, index as f64))
                .await
                .unwrap();
            adapter
                .assign_annotation_to_collection(&annotation.id, &collection.id)
                .await
                .unwrap();
            ids.push(annotation.id);
        }
        ids
    }

    #[tokio::test]
    async fn test_patching_annotation_ids_detaches_dropped_members() {
        let adapter = create_adapter();
        let video = seed_video(&adapter).await;
        let collection = adapter
            .create_collection(NewCollection::new(&video.id, "Intro"))
            .await
            .unwrap();
        let ids = seed_members(&adapter, &video, &collection, &["a", "b"]).await;

        let patch = CollectionPatch {
            annotation_ids: Some(Vec::new()),
            ..Default::default()
        };
        let emptied = adapter.update_collection(&collection.id, patch).await.unwrap();
        assert!(emptied.annotation_ids.is_empty());
        assert_consistent(&adapter);

        let unassigned = adapter.get_unassigned_annotations(&video.id).await.unwrap();
        assert_eq!(unassigned.len(), 2);

        // re-listing in a new order restores both sides
        let patch = CollectionPatch {
            annotation_ids: Some(vec![ids[1].clone(), ids[0].clone(), ids[1].clone()]),
            ..Default::default()
        };
        let relisted = adapter.update_collection(&collection.id, patch).await.unwrap();
        assert_eq!(relisted.annotation_ids, vec![ids[1].clone(), ids[0].clone()]);
        let first = adapter.get_annotation(&ids[0]).await.unwrap().unwrap();
        assert_eq!(first.order, Some(1));
        assert_consistent(&adapter);
    }

    #[tokio::test]
    async fn test_patching_annotation_ids_moves_members_between_collections() {
        let adapter = create_adapter();
        let video = seed_video(&adapter).await;
        let first = adapter
            .create_collection(NewCollection::new(&video.id, "First"))
            .await
            .unwrap();
        let second = adapter
            .create_collection(NewCollection::new(&video.id, "Second"))
            .await
            .unwrap();
        let ids = seed_members(&adapter, &video, &first, &["a", "b"]).await;

        let patch = CollectionPatch {
            annotation_ids: Some(vec![ids[0].clone()]),
            ..Default::default()
        };
        adapter.update_collection(&second.id, patch).await.unwrap();
        assert_consistent(&adapter);

        let first = adapter.get_collection(&first.id).await.unwrap().unwrap();
        assert_eq!(first.annotation_ids, vec![ids[1].clone()]);

        let err = adapter
            .update_collection(
                &second.id,
                CollectionPatch {
                    annotation_ids: Some(vec!["nope".into()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::AnnotationNotFound(_)));
        assert_consistent(&adapter);
    }

    #[tokio::test]
    async fn test_patching_collection_id_relinks_both_sides() {
        let adapter = create_adapter();
        let video = seed_video(&adapter).await;
        let first = adapter
            .create_collection(NewCollection::new(&video.id, "First"))
            .await
            .unwrap();
        let second = adapter
            .create_collection(NewCollection::new(&video.id, "Second"))
            .await
            .unwrap();
        let ids = seed_members(&adapter, &video, &first, &["a", "b", "c"]).await;

        let detached = adapter
            .update_annotation(
                &ids[1],
                AnnotationPatch {
                    collection_id: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(detached.is_unassigned());
        let stored = adapter.get_collection(&first.id).await.unwrap().unwrap();
        assert_eq!(stored.annotation_ids, vec![ids[0].clone(), ids[2].clone()]);
        assert_consistent(&adapter);

        let moved = adapter
            .update_annotation(
                &ids[0],
                AnnotationPatch {
                    collection_id: Some(Some(second.id.clone())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.collection_id.as_deref(), Some(second.id.as_str()));
        assert_eq!(moved.order, Some(0));
        assert_consistent(&adapter);

        let err = adapter
            .update_annotation(
                &ids[2],
                AnnotationPatch {
                    collection_id: Some(Some("nope".into())),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::CollectionNotFound(_)));
        assert_consistent(&adapter);
    }

    #[tokio::test]
    async fn test_patching_order_moves_member_within_collection() {
        let adapter = create_adapter();
        let video = seed_video(&adapter).await;
        let collection = adapter
            .create_collection(NewCollection::new(&video.id, "Intro"))
            .await
            .unwrap();
        let ids = seed_members(&adapter, &video, &collection, &["a", "b", "c"]).await;

        let moved = adapter
            .update_annotation(
                &ids[2],
                AnnotationPatch {
                    order: Some(Some(0)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.order, Some(0));
        let stored = adapter.get_collection(&collection.id).await.unwrap().unwrap();
        assert_eq!(
            stored.annotation_ids,
            vec![ids[2].clone(), ids[0].clone(), ids[1].clone()]
        );
        assert_consistent(&adapter);

        // out-of-range positions clamp to the end
        adapter
            .update_annotation(
                &ids[2],
                AnnotationPatch {
                    order: Some(Some(99)),
                    title: Some("renamed".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let stored = adapter.get_collection(&collection.id).await.unwrap().unwrap();
        assert_eq!(stored.annotation_ids.last(), Some(&ids[2]));
        assert_consistent(&adapter);
    }

    // -------------------------------------------------------------------------
    // Cascades
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_delete_video_cascades() {
        let adapter = create_adapter();
        let video = seed_video(&adapter).await;
        let keep = adapter
            .create_video(NewVideo::local("other", "sha256:1", "file:///o.mp4"))
            .await
            .unwrap();

        let collection = adapter
            .create_collection(NewCollection::new(&video.id, "Intro"))
            .await
            .unwrap();
        let annotation = adapter
            .create_annotation(NewAnnotation::new(&video.id, "Hook", 3.0))
            .await
            .unwrap();
        adapter
            .assign_annotation_to_collection(&annotation.id, &collection.id)
            .await
            .unwrap();
        adapter
            .create_annotation(NewAnnotation::new(&keep.id, "Stays", 1.0))
            .await
            .unwrap();

        adapter.delete_video(&video.id).await.unwrap();

        assert!(adapter.get_video(&video.id).await.unwrap().is_none());
        assert!(adapter.get_annotations_by_video(&video.id).await.unwrap().is_empty());
        assert!(adapter.get_collections_by_video(&video.id).await.unwrap().is_empty());
        assert_eq!(adapter.get_annotations_by_video(&keep.id).await.unwrap().len(), 1);

        // idempotent
        adapter.delete_video(&video.id).await.unwrap();
        assert_consistent(&adapter);
    }

    #[tokio::test]
    async fn test_delete_collection_demotes_members() {
        let adapter = create_adapter();
        let video = seed_video(&adapter).await;
        let collection = adapter
            .create_collection(NewCollection::new(&video.id, "Intro"))
            .await
            .unwrap();
        let a1 = adapter
            .create_annotation(NewAnnotation::new(&video.id, "one", 1.0))
            .await
            .unwrap();
        let a2 = adapter
            .create_annotation(NewAnnotation::new(&video.id, "two", 2.0))
            .await
            .unwrap();
        adapter
            .assign_annotation_to_collection(&a1.id, &collection.id)
            .await
            .unwrap();
        adapter
            .assign_annotation_to_collection(&a2.id, &collection.id)
            .await
            .unwrap();

        adapter.delete_collection(&collection.id).await.unwrap();

        for id in [&a1.id, &a2.id] {
            let annotation = adapter.get_annotation(id).await.unwrap().unwrap();
            assert_eq!(annotation.collection_id, None);
            assert_eq!(annotation.order, None);
        }
        assert!(adapter.get_collection(&collection.id).await.unwrap().is_none());
        adapter.delete_collection(&collection.id).await.unwrap();
        assert_consistent(&adapter);
    }

    #[tokio::test]
    async fn test_delete_annotation_splices_collection() {
        let adapter = create_adapter();
        let video = seed_video(&adapter).await;
        let collection = adapter
            .create_collection(NewCollection::new(&video.id, "Intro"))
            .await
            .unwrap();
        let mut ids = Vec::new();
        for (title, start) in [("one", 1.0), ("two", 2.0), ("three", 3.0)] {
            let a = adapter
                .create_annotation(NewAnnotation::new(&video.id, title, start))
                .await
                .unwrap();
            adapter
                .assign_annotation_to_collection(&a.id, &collection.id)
                .await
                .unwrap();
            ids.push(a.id);
        }

        adapter.delete_annotation(&ids[0]).await.unwrap();

        let stored = adapter.get_collection(&collection.id).await.unwrap().unwrap();
        assert_eq!(stored.annotation_ids, vec![ids[1].clone(), ids[2].clone()]);
        let second = adapter.get_annotation(&ids[1]).await.unwrap().unwrap();
        assert_eq!(second.order, Some(0));

        adapter.delete_annotation(&ids[0]).await.unwrap();
        assert_consistent(&adapter);
    }

    #[tokio::test]
    async fn test_delete_template_unlinks_collections() {
        let adapter = create_adapter();
        let video = seed_video(&adapter).await;
        let template = adapter
            .create_template(NewTemplate::new("Scenes", &["location"]))
            .await
            .unwrap();
        let collection = adapter
            .create_collection(NewCollection::new(&video.id, "Intro"))
            .await
            .unwrap();
        adapter
            .apply_template_to_collection(&collection.id, &template.id)
            .await
            .unwrap();

        adapter.delete_template(&template.id).await.unwrap();

        let stored = adapter.get_collection(&collection.id).await.unwrap().unwrap();
        assert_eq!(stored.template_id, None);
        assert!(stored.metadata.contains_key("location"));
        adapter.delete_template(&template.id).await.unwrap();
    }

    // -------------------------------------------------------------------------
    // Templates
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_apply_template_is_idempotent() {
        let adapter = create_adapter();
        let video = seed_video(&adapter).await;
        let template = adapter
            .create_template(NewTemplate::new("Scenes", &["location", "mood"]))
            .await
            .unwrap();
        let collection = adapter
            .create_collection(NewCollection::new(&video.id, "Intro").with_metadata("location", "Paris"))
            .await
            .unwrap();

        let once = adapter
            .apply_template_to_collection(&collection.id, &template.id)
            .await
            .unwrap();
        let twice = adapter
            .apply_template_to_collection(&collection.id, &template.id)
            .await
            .unwrap();

        assert_eq!(once.metadata, twice.metadata);
        assert_eq!(twice.metadata["location"], "Paris");
        assert_eq!(twice.metadata["mood"], "");
        assert_eq!(twice.template_id.as_deref(), Some(template.id.as_str()));
    }

    #[tokio::test]
    async fn test_apply_template_missing_ids() {
        let adapter = create_adapter();
        let video = seed_video(&adapter).await;
        let collection = adapter
            .create_collection(NewCollection::new(&video.id, "Intro"))
            .await
            .unwrap();
        let template = adapter
            .create_template(NewTemplate::new("Scenes", &["location"]))
            .await
            .unwrap();

        let err = adapter
            .apply_template_to_collection(&collection.id, "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::TemplateNotFound(_)));

        let err = adapter
            .apply_template_to_collection("nope", &template.id)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::CollectionNotFound(_)));
    }

    // -------------------------------------------------------------------------
    // Membership
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_assign_moves_between_collections() {
        let adapter = create_adapter();
        let video = seed_video(&adapter).await;
        let first = adapter
            .create_collection(NewCollection::new(&video.id, "First"))
            .await
            .unwrap();
        let second = adapter
            .create_collection(NewCollection::new(&video.id, "Second"))
            .await
            .unwrap();
        let a1 = adapter
            .create_annotation(NewAnnotation::new(&video.id, "one", 1.0))
            .await
            .unwrap();
        let a2 = adapter
            .create_annotation(NewAnnotation::new(&video.id, "two", 2.0))
            .await
            .unwrap();

        adapter.assign_annotation_to_collection(&a1.id, &first.id).await.unwrap();
        adapter.assign_annotation_to_collection(&a2.id, &first.id).await.unwrap();
        let moved = adapter
            .assign_annotation_to_collection(&a1.id, &second.id)
            .await
            .unwrap();
        assert_eq!(moved.annotation_ids, vec![a1.id.clone()]);

        let first = adapter.get_collection(&first.id).await.unwrap().unwrap();
        assert_eq!(first.annotation_ids, vec![a2.id.clone()]);
        let a2 = adapter.get_annotation(&a2.id).await.unwrap().unwrap();
        assert_eq!(a2.order, Some(0));
        assert_consistent(&adapter);
    }

    #[tokio::test]
    async fn test_assign_twice_is_stable() {
        let adapter = create_adapter();
        let video = seed_video(&adapter).await;
        let collection = adapter
            .create_collection(NewCollection::new(&video.id, "Intro"))
            .await
            .unwrap();
        let a1 = adapter
            .create_annotation(NewAnnotation::new(&video.id, "one", 1.0))
            .await
            .unwrap();
        let a2 = adapter
            .create_annotation(NewAnnotation::new(&video.id, "two", 2.0))
            .await
            .unwrap();
        adapter.assign_annotation_to_collection(&a1.id, &collection.id).await.unwrap();
        adapter.assign_annotation_to_collection(&a2.id, &collection.id).await.unwrap();

        let again = adapter
            .assign_annotation_to_collection(&a1.id, &collection.id)
            .await
            .unwrap();
        assert_eq!(again.annotation_ids, vec![a1.id, a2.id]);
        assert_consistent(&adapter);
    }

    #[tokio::test]
    async fn test_assign_rejects_cross_video() {
        let adapter = create_adapter();
        let video = seed_video(&adapter).await;
        let collection = adapter
            .create_collection(NewCollection::new(&video.id, "Intro"))
            .await
            .unwrap();
        let foreign = adapter
            .create_annotation(NewAnnotation::new("other-video", "x", 1.0))
            .await
            .unwrap();

        let err = adapter
            .assign_annotation_to_collection(&foreign.id, &collection.id)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));

        let err = adapter
            .assign_annotation_to_collection("nope", &collection.id)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::AnnotationNotFound(_)));
    }

    #[tokio::test]
    async fn test_remove_from_collection() {
        let adapter = create_adapter();
        let video = seed_video(&adapter).await;
        let collection = adapter
            .create_collection(NewCollection::new(&video.id, "Intro"))
            .await
            .unwrap();
        let a1 = adapter
            .create_annotation(NewAnnotation::new(&video.id, "one", 1.0))
            .await
            .unwrap();
        let a2 = adapter
            .create_annotation(NewAnnotation::new(&video.id, "two", 2.0))
            .await
            .unwrap();
        adapter.assign_annotation_to_collection(&a1.id, &collection.id).await.unwrap();
        adapter.assign_annotation_to_collection(&a2.id, &collection.id).await.unwrap();

        let updated = adapter
            .remove_annotation_from_collection(&collection.id, &a1.id)
            .await
            .unwrap();
        assert_eq!(updated.annotation_ids, vec![a2.id.clone()]);

        let a1 = adapter.get_annotation(&a1.id).await.unwrap().unwrap();
        assert!(a1.is_unassigned());
        assert_eq!(a1.order, None);

        // non-member is a no-op
        let unchanged = adapter
            .remove_annotation_from_collection(&collection.id, &a1.id)
            .await
            .unwrap();
        assert_eq!(unchanged.annotation_ids, vec![a2.id]);
        assert_consistent(&adapter);
    }

    #[tokio::test]
    async fn test_reorder_collection() {
        let adapter = create_adapter();
        let video = seed_video(&adapter).await;
        let collection = adapter
            .create_collection(NewCollection::new(&video.id, "Intro"))
            .await
            .unwrap();
        let mut ids = Vec::new();
        for start in [1.0, 2.0, 3.0] {
            let a = adapter
                .create_annotation(NewAnnotation::new(&video.id, "x", start))
                .await
                .unwrap();
            adapter
                .assign_annotation_to_collection(&a.id, &collection.id)
                .await
                .unwrap();
            ids.push(a.id);
        }

        let reversed: Vec<String> = ids.iter().rev().cloned().collect();
        let updated = adapter
            .reorder_collection(&collection.id, reversed.clone())
            .await
            .unwrap();
        assert_eq!(updated.annotation_ids, reversed);
        let last = adapter.get_annotation(&ids[2]).await.unwrap().unwrap();
        assert_eq!(last.order, Some(0));
        assert_consistent(&adapter);

        let err = adapter
            .reorder_collection(&collection.id, vec![ids[0].clone()])
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));

        let err = adapter
            .reorder_collection(&collection.id, vec![ids[0].clone(), ids[0].clone(), ids[1].clone()])
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
    }

    // -------------------------------------------------------------------------
    // Commit Rollback
    // -------------------------------------------------------------------------

    /// Store that rejects writes to one key.
    struct FailingStore {
        inner: MemoryStore,
        fail_key: &'static str,
    }

    impl KeyValueStore for FailingStore {
        fn get(&self, key: &str) -> CoreResult<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> CoreResult<()> {
            if key == self.fail_key {
                return Err(CoreError::Storage("disk full".into()));
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> CoreResult<()> {
            self.inner.remove(key)
        }
    }

    #[tokio::test]
    async fn test_failed_commit_rolls_back_earlier_lists() {
        let inner = MemoryStore::new();
        let seeded = LocalAdapter::new(inner.clone());
        let video = seed_video(&seeded).await;
        let collection = seeded
            .create_collection(NewCollection::new(&video.id, "Intro"))
            .await
            .unwrap();
        let annotation = seeded
            .create_annotation(NewAnnotation::new(&video.id, "Hook", 1.0))
            .await
            .unwrap();

        let failing = LocalAdapter::new(FailingStore {
            inner: inner.clone(),
            fail_key: ANNOTATIONS_KEY,
        });
        let err = failing
            .assign_annotation_to_collection(&annotation.id, &collection.id)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Storage(_)));

        // collections list was written first and must have been restored
        let stored = seeded.get_collection(&collection.id).await.unwrap().unwrap();
        assert!(stored.annotation_ids.is_empty());
        assert_consistent(&seeded);
    }
}
