//! Hierarchical CSV export.
//!
//! Not a single tabular grid: sections are introduced by comment-style markers
//! (`#`, `##`, `###`, `####`) and each section carries its own small table.
//! Export-only; nothing parses this format back.

use chrono::SecondsFormat;

use super::{collection_members, VideoSnapshot};
use crate::error::{CoreError, CoreResult};
use crate::media::youtube_watch_url;
use crate::models::{Annotation, Collection, Template, Video};
use crate::types::Timestamp;

const COLLECTION_ANNOTATION_HEADER: &str = "ID,Title,Description,Start Time,End Time,Order";
const UNASSIGNED_ANNOTATION_HEADER: &str = "ID,Title,Description,Start Time,End Time";

// =============================================================================
// Field Encoding
// =============================================================================

/// Wraps a free-text field in quotes, doubling internal quotes
pub fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Quotes a bare field only when it would otherwise break the row
fn quote_if_needed(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        quote(value)
    } else {
        value.to_string()
    }
}

fn format_iso(timestamp: &Timestamp) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn optional_number<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

// =============================================================================
// Row Builders
// =============================================================================

struct CsvWriter {
    rows: Vec<String>,
}

impl CsvWriter {
    fn new() -> Self {
        Self { rows: Vec::new() }
    }

    fn line(&mut self, row: impl Into<String>) {
        self.rows.push(row.into());
    }

    fn blank(&mut self) {
        self.rows.push(String::new());
    }

    fn video_info(&mut self, video: &Video) {
        match &video.video_id {
            Some(video_id) => {
                self.line("Video Type,YouTube");
                self.line(format!("Video ID,{}", quote_if_needed(video_id)));
                self.line(format!("Video URL,{}", youtube_watch_url(video_id)));
            }
            None => {
                self.line("Video Type,Local File");
                self.line(format!("Video Title,{}", quote(&video.title)));
                self.line(format!(
                    "Video Hash,{}",
                    video.hash.as_deref().map(quote_if_needed).unwrap_or_else(|| "N/A".into())
                ));
            }
        }
        let duration = video
            .duration
            .filter(|d| *d > 0.0)
            .map(|d| d.to_string())
            .unwrap_or_else(|| "N/A".into());
        self.line(format!("Video Duration,{duration}"));
    }

    fn description(&mut self, description: Option<&str>) {
        if let Some(description) = description.filter(|d| !d.is_empty()) {
            self.line(format!("Description,{}", quote(description)));
        }
    }

    fn metadata(&mut self, marker: &str, collection: &Collection) {
        if collection.metadata.is_empty() {
            return;
        }
        self.line(marker);
        for (key, value) in &collection.metadata {
            self.line(format!("{},{}", quote_if_needed(key), quote(value)));
        }
    }

    fn member_table(&mut self, marker: &str, members: &[&Annotation]) {
        if members.is_empty() {
            return;
        }
        self.line(marker);
        self.line(COLLECTION_ANNOTATION_HEADER);
        for annotation in members {
            self.line(format!(
                "{},{},{},{},{},{}",
                annotation.id,
                quote(&annotation.title),
                quote(annotation.description.as_deref().unwrap_or_default()),
                annotation.start_time,
                optional_number(annotation.end_time),
                optional_number(annotation.order),
            ));
        }
    }

    fn unassigned_table(&mut self, unassigned: &[&Annotation]) {
        self.line("## Unassigned Annotations");
        self.line(UNASSIGNED_ANNOTATION_HEADER);
        for annotation in unassigned {
            self.line(format!(
                "{},{},{},{},{}",
                annotation.id,
                quote(&annotation.title),
                quote(annotation.description.as_deref().unwrap_or_default()),
                annotation.start_time,
                optional_number(annotation.end_time),
            ));
        }
    }

    fn finish(self) -> String {
        self.rows.join("\n")
    }
}

fn unassigned(annotations: &[Annotation]) -> Vec<&Annotation> {
    annotations.iter().filter(|a| a.is_unassigned()).collect()
}

// =============================================================================
// Documents
// =============================================================================

/// Renders one video's collections and annotations.
///
/// Fails with [`CoreError::NothingToExport`] when the video has neither.
pub fn render_video_csv(snapshot: &VideoSnapshot) -> CoreResult<String> {
    if snapshot.annotations.is_empty() && snapshot.collections.is_empty() {
        return Err(CoreError::NothingToExport);
    }
    let annotations = snapshot.sorted_annotations();
    let mut out = CsvWriter::new();

    out.line("# Video Information");
    out.video_info(&snapshot.video);
    out.blank();

    out.line("# Collections and Annotations");
    out.blank();

    for collection in &snapshot.collections {
        out.line(format!("## Collection: {}", quote(&collection.name)));
        out.description(collection.description.as_deref());
        out.metadata("### Metadata", collection);
        out.member_table("### Annotations", &collection_members(&annotations, collection));
        out.blank();
    }

    let unassigned = unassigned(&annotations);
    if !unassigned.is_empty() {
        out.unassigned_table(&unassigned);
    }

    Ok(out.finish())
}

/// Renders every template and every video.
///
/// Fails with [`CoreError::NothingToExport`] when there are no videos.
pub fn render_dataset_csv(
    snapshots: &[VideoSnapshot],
    templates: &[Template],
    export_date: Timestamp,
) -> CoreResult<String> {
    if snapshots.is_empty() {
        return Err(CoreError::NothingToExport);
    }
    let mut out = CsvWriter::new();

    out.line("# VanNote Master Export");
    out.line(format!("Export Date,{}", format_iso(&export_date)));
    out.blank();

    out.line("# Templates");
    out.blank();
    for template in templates {
        out.line(format!("## Template: {}", quote(&template.name)));
        out.description(template.description.as_deref());
        out.line("### Fields");
        out.line("Key");
        for key in &template.keys {
            out.line(quote(key));
        }
        out.blank();
    }

    for snapshot in snapshots {
        out.line("# Video");
        out.blank();
        out.video_info(&snapshot.video);
        out.line(format!("Created At,{}", format_iso(&snapshot.video.created_at)));
        out.blank();

        let annotations = snapshot.sorted_annotations();
        if !snapshot.collections.is_empty() {
            out.line("## Collections");
            out.blank();
            for collection in &snapshot.collections {
                out.line(format!("### Collection: {}", quote(&collection.name)));
                out.description(collection.description.as_deref());
                out.metadata("#### Metadata", collection);
                out.member_table("#### Annotations", &collection_members(&annotations, collection));
                out.blank();
            }
        }

        let unassigned = unassigned(&annotations);
        if !unassigned.is_empty() {
            out.unassigned_table(&unassigned);
            out.blank();
        }

        out.line("---");
        out.blank();
    }

    Ok(out.finish())
}
