//! Title and caption generation through an OpenAI-compatible chat API.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::retry::{retry_async, RetryConfig};
use crate::stages::TextGenerator;
use crate::stores::TemplateStore;
use reel_models::{fill_prompt, PromptTemplate, PromptVars, TitleSource};

/// Used when neither the model nor the caption yields a title.
pub const PLACEHOLDER_TITLE: &str = "Untold Story";

/// Longest caption-derived title, in characters.
pub const FALLBACK_TITLE_MAX_CHARS: usize = 80;

/// Model outputs that are error text rather than a title.
pub const TITLE_DENY_LIST: &[&str] = &[
    "AI Title Generation Failed",
    "Template not found or invalid",
    "Groq client not configured",
    "API Error",
    "Generation Failed",
    "generated_title",
];

const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 1000;

/// First line of a generated title, or `None` when it is empty or matches
/// the deny-list.
pub fn accept_title(raw: &str) -> Option<String> {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty())?;
    let line = line.trim_matches(|c| c == '"' || c == '\'').trim();
    if line.is_empty() || TITLE_DENY_LIST.iter().any(|bad| line.contains(bad)) {
        return None;
    }
    Some(line.to_string())
}

/// Title derived from the original caption: text before the first `.`,
/// at most 80 characters, or the placeholder.
pub fn fallback_title(original_caption: &str) -> (String, TitleSource) {
    let first_sentence = original_caption.split('.').next().unwrap_or_default();
    let title: String = first_sentence.chars().take(FALLBACK_TITLE_MAX_CHARS).collect();
    let title = title.trim();

    if title.is_empty() {
        (PLACEHOLDER_TITLE.to_string(), TitleSource::Placeholder)
    } else {
        (title.to_string(), TitleSource::CaptionFallback)
    }
}

/// Caption saved when generation fails.
pub fn failed_caption(original_caption: &str) -> String {
    format!(
        "AI Caption Generation Failed. Original Caption:\n\n{}",
        original_caption
    )
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat completions client (Groq by default).
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ChatClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn from_config(config: &WorkerConfig, api_key: impl Into<String>) -> Self {
        Self::new(&config.groq_base_url, api_key, &config.groq_model)
    }

    /// Send one user message and return the reply text.
    pub async fn complete(&self, prompt: &str) -> WorkerResult<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(WorkerError::generation_failed(format!(
                "API returned status {}: {}",
                status.as_u16(),
                error_text
            )));
        }

        let body: ChatResponse = response.json().await.map_err(|e| {
            WorkerError::generation_failed(format!("Failed to parse chat response: {}", e))
        })?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| WorkerError::generation_failed("Empty response from model"))
    }
}

/// Generates text from the stored prompt templates.
pub struct TemplateGenerator {
    client: ChatClient,
    templates: Arc<Mutex<TemplateStore>>,
    retry: RetryConfig,
}

impl TemplateGenerator {
    pub fn new(client: ChatClient, templates: Arc<Mutex<TemplateStore>>) -> Self {
        Self {
            client,
            templates,
            retry: RetryConfig::new("chat_completion"),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// The requested template, or the store's current one.
    fn template(&self, template_id: Option<&str>) -> WorkerResult<PromptTemplate> {
        let mut store = self
            .templates
            .lock()
            .map_err(|_| WorkerError::store("Template store lock poisoned"))?;

        let template = match template_id {
            Some(id) => store.get(id).cloned(),
            None => store.current()?.map(|(_, t)| t),
        };

        template
            .filter(|t| !t.title_prompt.trim().is_empty() && !t.caption_prompt.trim().is_empty())
            .ok_or_else(|| WorkerError::generation_failed("Template not found or invalid"))
    }

    async fn complete_with_retry(&self, prompt: &str) -> WorkerResult<String> {
        retry_async(&self.retry, WorkerError::is_retryable, || self.client.complete(prompt)).await
    }
}

#[async_trait]
impl TextGenerator for TemplateGenerator {
    async fn generate_title(
        &self,
        original_caption: &str,
        ocr_text: &str,
        template_id: Option<&str>,
    ) -> WorkerResult<String> {
        let template = self.template(template_id)?;
        let prompt = fill_prompt(&template.title_prompt, &PromptVars::new(original_caption, ocr_text));
        debug!(template = %template.name, "Generating title");

        let title = self.complete_with_retry(&prompt).await?;
        info!(title = %title, "Title generated");
        Ok(title)
    }

    async fn generate_caption(
        &self,
        original_caption: &str,
        ocr_text: &str,
        title: &str,
        template_id: Option<&str>,
    ) -> WorkerResult<String> {
        let template = self.template(template_id)?;
        let vars = PromptVars::new(original_caption, ocr_text).with_title(title);
        let prompt = fill_prompt(&template.caption_prompt, &vars);

        let caption = self.complete_with_retry(&prompt).await;
        if let Err(e) = &caption {
            warn!(error = %e, "Caption generation failed");
        }
        caption
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn reply(text: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": text}}]
        }))
    }

    fn generator(server: &MockServer, dir: &std::path::Path) -> TemplateGenerator {
        let store = TemplateStore::open(dir).unwrap();
        let client = ChatClient::new(server.uri(), "gsk_test", "llama-3.1-8b-instant");
        TemplateGenerator::new(client, Arc::new(Mutex::new(store)))
            .with_retry(RetryConfig::new("test").with_base_delay(Duration::from_millis(1)))
    }

    #[test]
    fn test_accept_title() {
        assert_eq!(
            accept_title("The Queen secretly feared Diana\nsecond line").as_deref(),
            Some("The Queen secretly feared Diana")
        );
        assert_eq!(accept_title("\"Quoted title\"").as_deref(), Some("Quoted title"));
        assert!(accept_title("   \n  ").is_none());
        assert!(accept_title("API Error: 401").is_none());
        // Substring match also rejects otherwise valid titles
        assert!(accept_title("The Generation Failed Us").is_none());
    }

    #[test]
    fn test_fallback_title() {
        assert_eq!(
            fallback_title("Diana arrives at the gala. More text here."),
            ("Diana arrives at the gala".to_string(), TitleSource::CaptionFallback)
        );

        let long = "a".repeat(120);
        let (title, source) = fallback_title(&long);
        assert_eq!(title.chars().count(), 80);
        assert_eq!(source, TitleSource::CaptionFallback);

        assert_eq!(
            fallback_title(""),
            (PLACEHOLDER_TITLE.to_string(), TitleSource::Placeholder)
        );
        assert_eq!(fallback_title(". starts with a period").1, TitleSource::Placeholder);
    }

    #[test]
    fn test_failed_caption() {
        assert_eq!(
            failed_caption("orig"),
            "AI Caption Generation Failed. Original Caption:\n\norig"
        );
    }

    #[tokio::test]
    async fn test_generate_title_fills_template() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer gsk_test"))
            .and(body_partial_json(serde_json::json!({
                "model": "llama-3.1-8b-instant",
                "max_tokens": 1000
            })))
            .respond_with(reply("  Putin bowed lower than tradition allowed  "))
            .expect(1)
            .mount(&server)
            .await;

        let title = generator(&server, dir.path())
            .generate_title("Putin meets the Queen.", "", None)
            .await
            .unwrap();
        assert_eq!(title, "Putin bowed lower than tradition allowed");

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        let prompt = body["messages"][0]["content"].as_str().unwrap();
        assert!(prompt.contains("Putin meets the Queen."));
        assert!(prompt.contains("No text detected in video"));
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(reply("Caption text"))
            .mount(&server)
            .await;

        let caption = generator(&server, dir.path())
            .generate_caption("orig", "ocr", "Title", None)
            .await
            .unwrap();
        assert_eq!(caption, "Caption text");
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_auth_error_not_retried() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
            .mount(&server)
            .await;

        let err = generator(&server, dir.path())
            .generate_title("orig", "", None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("status 401"));
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_template_fails_without_request() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        let err = generator(&server, dir.path())
            .generate_title("orig", "", Some("missing"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Template not found or invalid"));
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
