//! Annotation Queries
//!
//! In-memory filters over annotation lists already loaded from storage.

use crate::models::Annotation;

/// Annotations whose title or description contains `term` (case-insensitive),
/// ordered by start time. A blank term matches everything.
pub fn search_annotations<'a>(annotations: &'a [Annotation], term: &str) -> Vec<&'a Annotation> {
    let needle = term.trim().to_lowercase();
    let mut matches: Vec<&Annotation> = annotations
        .iter()
        .filter(|a| {
            needle.is_empty()
                || a.title.to_lowercase().contains(&needle)
                || a
                    .description
                    .as_deref()
                    .is_some_and(|d| d.to_lowercase().contains(&needle))
        })
        .collect();
    matches.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
    matches
}

/// Point markers still waiting for an end time, ordered by start time
pub fn open_annotations(annotations: &[Annotation]) -> Vec<&Annotation> {
    let mut open: Vec<&Annotation> = annotations.iter().filter(|a| a.is_open()).collect();
    open.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
    open
}
