//! Built-in Template Presets

use tracing::{info, warn};

use crate::error::CoreResult;
use crate::models::NewTemplate;
use crate::settings::SettingsManager;
use crate::storage::Storage;

/// A template shipped with the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplatePreset {
    pub name: &'static str,
    pub description: &'static str,
    pub keys: &'static [&'static str],
}

impl TemplatePreset {
    pub fn to_new_template(&self) -> NewTemplate {
        NewTemplate::new(self.name, self.keys).with_description(self.description)
    }
}

pub const TEMPLATE_PRESETS: &[TemplatePreset] = &[
    TemplatePreset {
        name: "Scene Analysis",
        description: "Annotate scenes with location, setting, and mood information",
        keys: &["location", "setting_type", "scene_mood", "notes"],
    },
    TemplatePreset {
        name: "Speaker Identification",
        description: "Track speakers and their dialogue in videos",
        keys: &["speaker_name", "speaker_role", "key_dialogue"],
    },
    TemplatePreset {
        name: "Content Highlights",
        description: "Mark important moments and key takeaways",
        keys: &["highlight_type", "importance", "summary"],
    },
];

/// Creates every preset whose name is not taken yet; returns how many were created.
///
/// A preset that fails to save is logged and skipped.
pub async fn seed_preset_templates(storage: &Storage) -> CoreResult<usize> {
    let existing = storage.get_all_templates().await?;
    let mut created = 0;

    for preset in TEMPLATE_PRESETS {
        if existing.iter().any(|t| t.name == preset.name) {
            continue;
        }
        match storage.create_template(preset.to_new_template()).await {
            Ok(_) => {
                info!("Created preset template: {}", preset.name);
                created += 1;
            }
            Err(e) => warn!("Failed to create preset template {}: {}", preset.name, e),
        }
    }

    Ok(created)
}

/// Seeds the presets once, then turns `templates.seedPresets` off so that
/// presets deleted later are not recreated.
pub async fn seed_presets_on_first_run(
    storage: &Storage,
    settings: &SettingsManager,
) -> CoreResult<usize> {
    let mut current = settings.load();
    if !current.templates.seed_presets {
        return Ok(0);
    }

    let created = seed_preset_templates(storage).await?;
    current.templates.seed_presets = false;
    settings.save(&current)?;
    Ok(created)
}
