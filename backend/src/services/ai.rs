//! Text generation for incident summaries and root-cause suggestions.

use std::fmt::Write as _;

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::models::activity::IncidentActivity;
use crate::utils::time::format_timestamp;

const SUMMARY_MAX_TOKENS: u32 = 200;
const ROOT_CAUSE_MAX_TOKENS: u32 = 800;
const TEMPERATURE: f32 = 0.3;
pub const MAX_TIMELINE_ENTRIES: usize = 100;

/// Incident fields fed to the summary prompt.
#[derive(Debug, Clone, Copy)]
pub struct SummaryInput<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub severity: &'a str,
    pub impact_scope: &'a str,
}

#[async_trait]
pub trait AiService: Send + Sync {
    /// False when no backend is configured; generators then fail.
    fn is_available(&self) -> bool;

    async fn generate_incident_summary(&self, input: SummaryInput<'_>) -> anyhow::Result<String>;

    async fn generate_root_cause_suggestion(
        &self,
        title: &str,
        description: &str,
        timeline: &[IncidentActivity],
    ) -> anyhow::Result<String>;
}

/// Renders timeline entries oldest first, capped at [`MAX_TIMELINE_ENTRIES`].
pub fn render_timeline(timeline: &[IncidentActivity]) -> String {
    let mut text = String::new();
    for activity in timeline.iter().take(MAX_TIMELINE_ENTRIES) {
        let _ = write!(
            text,
            "- [{}] {}",
            format_timestamp(activity.created_at),
            activity.activity_type.as_str()
        );
        if let Some(comment) = activity.comment.as_deref().filter(|c| !c.is_empty()) {
            let _ = write!(text, ": {}", comment);
        }
        if let (Some(old), Some(new)) = (
            activity.old_value.as_deref().filter(|v| !v.is_empty()),
            activity.new_value.as_deref().filter(|v| !v.is_empty()),
        ) {
            let _ = write!(text, " ({} → {})", old, new);
        }
        text.push('\n');
    }
    text
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: String,
}

/// Chat-completions client for OpenAI-compatible endpoints.
pub struct OpenAiService {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiService {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Returns None when no API key is configured.
    pub fn from_config(config: &Config) -> Option<Self> {
        if !config.openai_enabled() {
            return None;
        }
        let api_key = config.openai_api_key.clone()?;
        Some(Self::new(
            api_key,
            config.openai_model.clone(),
            config.openai_base_url.clone(),
        ))
    }

    async fn complete(
        &self,
        system: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> anyhow::Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens,
            temperature: TEMPERATURE,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("chat completion request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("chat completion returned {}: {}", status, body);
        }

        let payload: ChatResponse = response
            .json()
            .await
            .context("chat completion response was not valid JSON")?;
        payload
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .ok_or_else(|| anyhow!("chat completion returned no choices"))
    }
}

#[async_trait]
impl AiService for OpenAiService {
    fn is_available(&self) -> bool {
        true
    }

    async fn generate_incident_summary(&self, input: SummaryInput<'_>) -> anyhow::Result<String> {
        let prompt = format!(
            "Summarize the following incident in two or three sentences, keeping only the key points.\n\n\
             Title: {}\nSeverity: {}\nImpact scope: {}\nDetails:\n{}\n\nSummary:",
            input.title, input.severity, input.impact_scope, input.description
        );
        self.complete(
            "You are an incident management expert who writes short, clear incident summaries.",
            &prompt,
            SUMMARY_MAX_TOKENS,
        )
        .await
    }

    async fn generate_root_cause_suggestion(
        &self,
        title: &str,
        description: &str,
        timeline: &[IncidentActivity],
    ) -> anyhow::Result<String> {
        let prompt = format!(
            "Propose three to five candidate root causes for the incident below, most likely first, \
             formatted as:\n\n1. [Candidate]: explanation\n\n\
             Incident title: {}\n\nIncident details:\n{}\n\nTimeline:\n{}\nRoot cause candidates:",
            title,
            description,
            render_timeline(timeline)
        );
        self.complete(
            "You are an expert in incident management and root cause analysis. \
             Rank plausible root causes from the incident timeline and details.",
            &prompt,
            ROOT_CAUSE_MAX_TOKENS,
        )
        .await
    }
}

/// Stand-in used when no API key is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledAiService;

#[async_trait]
impl AiService for DisabledAiService {
    fn is_available(&self) -> bool {
        false
    }

    async fn generate_incident_summary(&self, _input: SummaryInput<'_>) -> anyhow::Result<String> {
        bail!("AI service not configured")
    }

    async fn generate_root_cause_suggestion(
        &self,
        _title: &str,
        _description: &str,
        _timeline: &[IncidentActivity],
    ) -> anyhow::Result<String> {
        bail!("AI service not configured")
    }
}

/// Returns canned replies; `None` makes every call fail.
#[derive(Debug, Clone, Default)]
pub struct ScriptedAiService {
    reply: Option<String>,
}

impl ScriptedAiService {
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
        }
    }

    pub fn failing() -> Self {
        Self { reply: None }
    }
}

#[async_trait]
impl AiService for ScriptedAiService {
    fn is_available(&self) -> bool {
        true
    }

    async fn generate_incident_summary(&self, _input: SummaryInput<'_>) -> anyhow::Result<String> {
        self.reply
            .clone()
            .ok_or_else(|| anyhow!("scripted AI failure"))
    }

    async fn generate_root_cause_suggestion(
        &self,
        _title: &str,
        _description: &str,
        _timeline: &[IncidentActivity],
    ) -> anyhow::Result<String> {
        self.reply
            .clone()
            .ok_or_else(|| anyhow!("scripted AI failure"))
    }
}
