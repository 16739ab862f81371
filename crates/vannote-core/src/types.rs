//! VanNote Core Type Definitions
//!
//! Defines fundamental types used throughout the data layer.

// =============================================================================
// ID Types
// =============================================================================

/// Video unique identifier (ULID)
pub type VideoId = String;

/// Annotation unique identifier (ULID)
pub type AnnotationId = String;

/// Collection unique identifier (ULID)
pub type CollectionId = String;

/// Template unique identifier (ULID)
pub type TemplateId = String;

// =============================================================================
// Time Types
// =============================================================================

/// Time in seconds (floating point)
pub type TimeSec = f64;

/// Timestamp type for record bookkeeping
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Returns the current timestamp
pub fn now() -> Timestamp {
    chrono::Utc::now()
}
