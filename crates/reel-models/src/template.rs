//! Prompt templates for title and caption generation.

use chrono::NaiveDateTime;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Placeholder replaced with the post's original caption.
pub const ORIGINAL_CAPTION_PLACEHOLDER: &str = "{original_caption}";
/// Placeholder replaced with the OCR text of the video.
pub const OCR_TEXT_PLACEHOLDER: &str = "{ocr_text}";
/// Placeholder replaced with the accepted title (caption prompts only).
pub const GENERATED_TITLE_PLACEHOLDER: &str = "{generated_title}";

/// A named pair of prompts tied to one publishing account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PromptTemplate {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Account handle the captions promote, e.g. `@theanomalists`
    #[serde(default)]
    pub account_handle: String,
    pub title_prompt: String,
    pub caption_prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_date: Option<NaiveDateTime>,
}

/// Values substituted into a prompt.
///
/// Empty inputs are replaced with short notes so the model never sees a
/// dangling heading.
#[derive(Debug, Clone, Copy)]
pub struct PromptVars<'a> {
    pub original_caption: &'a str,
    pub ocr_text: &'a str,
    pub generated_title: Option<&'a str>,
}

impl<'a> PromptVars<'a> {
    pub fn new(original_caption: &'a str, ocr_text: &'a str) -> Self {
        Self {
            original_caption,
            ocr_text,
            generated_title: None,
        }
    }

    pub fn with_title(mut self, title: &'a str) -> Self {
        self.generated_title = Some(title);
        self
    }
}

fn or_note<'a>(value: &'a str, note: &'a str) -> &'a str {
    if value.trim().is_empty() {
        note
    } else {
        value
    }
}

/// Literal placeholder substitution. Unknown or missing placeholders are left alone.
pub fn fill_prompt(template: &str, vars: &PromptVars<'_>) -> String {
    let mut prompt = template
        .replace(
            ORIGINAL_CAPTION_PLACEHOLDER,
            or_note(vars.original_caption, "No caption provided."),
        )
        .replace(
            OCR_TEXT_PLACEHOLDER,
            or_note(vars.ocr_text, "No text detected in video"),
        );

    if let Some(title) = vars.generated_title {
        prompt = prompt.replace(
            GENERATED_TITLE_PLACEHOLDER,
            or_note(title, "No title generated"),
        );
    }

    prompt
}

/// Derive a template id from a display name (`"@My Page"` -> `"my_page"`).
pub fn template_id_from_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_").replace('@', "")
}
