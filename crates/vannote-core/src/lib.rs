//! VanNote Core Library
//!
//! Data layer for annotating videos with timestamped markers and segments,
//! grouping them into ordered collections with free-form metadata, and
//! moving the whole dataset in and out as JSON or CSV.
//!
//! ## Layout
//!
//! - `models`: the four persisted record types and their patches
//! - `storage`: adapter contract, local and remote adapters, the [`Storage`] façade
//! - `exchange`: JSON/CSV export and JSON import
//! - `settings`: persisted configuration
//! - `media`, `query`, `presets`: helpers used by the CLI and by import

pub mod error;
pub mod exchange;
pub mod fs;
pub mod media;
pub mod models;
pub mod presets;
pub mod query;
pub mod settings;
pub mod storage;
pub mod types;

pub use error::{CoreError, CoreResult};
pub use models::{
    Annotation, AnnotationPatch, Collection, CollectionPatch, Metadata, NewAnnotation,
    NewCollection, NewTemplate, NewVideo, Template, TemplatePatch, Video, VideoPatch,
    VideoSource,
};
pub use settings::{AppSettings, SettingsManager, StorageBackend, StorageSettings, StoreKind};
pub use storage::{Storage, StorageAdapter};
pub use types::{AnnotationId, CollectionId, TemplateId, TimeSec, Timestamp, VideoId};
