//! Prompt template store: `templates/templates.json` plus the current
//! selection in `templates/template_settings.json`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{read_json, write_json};
use crate::error::{WorkerError, WorkerResult};
use reel_models::{template_id_from_name, PromptTemplate};

pub const DEFAULT_TEMPLATE_ID: &str = "theanomalists";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TemplateSettings {
    #[serde(default)]
    last_used_template: Option<String>,
}

/// Envelope written by [`TemplateStore::export`].
#[derive(Debug, Serialize, Deserialize)]
struct TemplateExport {
    template: PromptTemplate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exported_date: Option<NaiveDateTime>,
}

/// Named prompt templates keyed by id.
///
/// Ids iterate in sorted order, so "the first template" is the smallest id.
#[derive(Debug)]
pub struct TemplateStore {
    templates_file: PathBuf,
    settings_file: PathBuf,
    templates: BTreeMap<String, PromptTemplate>,
    settings: TemplateSettings,
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

impl TemplateStore {
    /// Load the store, seeding the default template when it is empty.
    pub fn open(config_dir: &Path) -> WorkerResult<Self> {
        let dir = config_dir.join("templates");
        let templates_file = dir.join("templates.json");
        let settings_file = dir.join("template_settings.json");

        let mut store = Self {
            templates: read_json(&templates_file).unwrap_or_default(),
            settings: read_json(&settings_file).unwrap_or_default(),
            templates_file,
            settings_file,
        };

        if store.templates.is_empty() {
            store
                .templates
                .insert(DEFAULT_TEMPLATE_ID.to_string(), default_template());
            store.save_templates()?;
            info!("Seeded default prompt template");
        }

        Ok(store)
    }

    fn save_templates(&self) -> WorkerResult<()> {
        write_json(&self.templates_file, &self.templates)
    }

    fn save_settings(&self) -> WorkerResult<()> {
        write_json(&self.settings_file, &self.settings)
    }

    pub fn ids(&self) -> Vec<String> {
        self.templates.keys().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<&PromptTemplate> {
        self.templates.get(id)
    }

    /// Current template id and template.
    ///
    /// A missing or stale selection falls back to the first template, and
    /// that choice is persisted.
    pub fn current(&mut self) -> WorkerResult<Option<(String, PromptTemplate)>> {
        let selected = self
            .settings
            .last_used_template
            .clone()
            .filter(|id| self.templates.contains_key(id));

        let id = match selected {
            Some(id) => id,
            None => {
                let Some(first) = self.templates.keys().next().cloned() else {
                    return Ok(None);
                };
                info!(
                    previous = ?self.settings.last_used_template,
                    fallback = %first,
                    "Current template not found, falling back"
                );
                self.set_current(&first)?;
                first
            }
        };

        Ok(self.templates.get(&id).cloned().map(|t| (id, t)))
    }

    pub fn set_current(&mut self, id: &str) -> WorkerResult<()> {
        if !self.templates.contains_key(id) {
            return Err(WorkerError::store(format!("Template '{}' not found", id)));
        }
        self.settings.last_used_template = Some(id.to_string());
        self.save_settings()
    }

    pub fn create(&mut self, id: &str, mut template: PromptTemplate) -> WorkerResult<()> {
        if self.templates.contains_key(id) {
            return Err(WorkerError::store(format!("Template '{}' already exists", id)));
        }
        let stamp = now();
        template.created_date = Some(stamp);
        template.modified_date = Some(stamp);
        self.templates.insert(id.to_string(), template);
        self.save_templates()
    }

    /// Replace a template, keeping its original creation date.
    pub fn update(&mut self, id: &str, mut template: PromptTemplate) -> WorkerResult<()> {
        let Some(existing) = self.templates.get(id) else {
            return Err(WorkerError::store(format!("Template '{}' not found", id)));
        };
        if existing.created_date.is_some() {
            template.created_date = existing.created_date;
        }
        template.modified_date = Some(now());
        self.templates.insert(id.to_string(), template);
        self.save_templates()
    }

    /// Delete a template. The last remaining template cannot be deleted.
    pub fn delete(&mut self, id: &str) -> WorkerResult<()> {
        if !self.templates.contains_key(id) {
            return Err(WorkerError::store(format!("Template '{}' not found", id)));
        }
        if self.templates.len() <= 1 {
            return Err(WorkerError::store("Cannot delete the last template"));
        }

        if self.settings.last_used_template.as_deref() == Some(id) {
            let next = self.templates.keys().find(|k| k.as_str() != id).cloned();
            if let Some(next) = next {
                self.set_current(&next)?;
            }
        }

        self.templates.remove(id);
        self.save_templates()
    }

    pub fn duplicate(&mut self, source_id: &str, new_id: &str, new_name: &str) -> WorkerResult<()> {
        let Some(source) = self.templates.get(source_id) else {
            return Err(WorkerError::store(format!("Template '{}' not found", source_id)));
        };
        let mut copy = source.clone();
        copy.name = new_name.to_string();
        self.create(new_id, copy)
    }

    pub fn export(&self, id: &str, path: &Path) -> WorkerResult<()> {
        let Some(template) = self.templates.get(id) else {
            return Err(WorkerError::store(format!("Template '{}' not found", id)));
        };
        write_json(
            path,
            &TemplateExport {
                template: template.clone(),
                exported_date: Some(now()),
            },
        )
    }

    /// Import an exported template. Without an explicit id, one is derived
    /// from the template name and suffixed `_1`, `_2`, ... until unique.
    pub fn import(&mut self, path: &Path, id: Option<&str>) -> WorkerResult<String> {
        let content = std::fs::read_to_string(path)?;
        let export: TemplateExport = serde_json::from_str(&content)?;

        let id = match id {
            Some(id) => id.to_string(),
            None => {
                let base = match template_id_from_name(&export.template.name) {
                    base if base.is_empty() => "imported_template".to_string(),
                    base => base,
                };
                let mut candidate = base.clone();
                let mut counter = 1;
                while self.templates.contains_key(&candidate) {
                    candidate = format!("{}_{}", base, counter);
                    counter += 1;
                }
                candidate
            }
        };

        self.create(&id, export.template)?;
        Ok(id)
    }
}

fn default_template() -> PromptTemplate {
    let stamp = now();
    PromptTemplate {
        name: "@theanomalists".to_string(),
        description: "History and mystery stories".to_string(),
        account_handle: "@theanomalists".to_string(),
        title_prompt: DEFAULT_TITLE_PROMPT.to_string(),
        caption_prompt: DEFAULT_CAPTION_PROMPT.to_string(),
        created_date: Some(stamp),
        modified_date: Some(stamp),
    }
}

const DEFAULT_TITLE_PROMPT: &str = "You write short, punchy headlines for viral history videos.

Original caption of the video:
{original_caption}

Text visible in the video:
{ocr_text}

Write one headline for this video.
- At most 12 words.
- State the most surprising contrast in the story as a bold, slightly funny claim.
- Only use facts present in the context above.
- No colons, dashes, periods, commas, emojis, quotes or formatting.
- Reply with the headline only, on a single line.";

const DEFAULT_CAPTION_PROMPT: &str = "You turn history into stories people want to share.

Original caption of the video:
{original_caption}

Text visible in the video:
{ocr_text}

Headline shown on the video:
{generated_title}

Write an Instagram caption with these parts, separated by blank lines:
1. A single dramatic opening sentence that drops the reader into the story.
2. One short paragraph telling the story in plain, conversational sentences.
3. A question for the audience that starts with an emoji.
4. An invitation to follow @theanomalists for more stories like this.
5. Exactly 10 relevant hashtags.

Only use facts present in the context above. Plain text only.";
