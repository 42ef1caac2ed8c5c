//! OpenAI-compatible chat-completions producer.

use super::CodeProducer;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use mbpp_common::config::ProducerSettings;
use mbpp_common::types::Candidate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

const SYSTEM_PROMPT: &str = "You are an expert Python programmer solving small programming tasks. \
Reply with a single JSON object of the form {\"code\": \"...\", \"comment\": \"...\"}. \
`code` must be plain Python source that defines the requested function with exactly the \
name and signature given; do not include tests, example calls or print statements. \
`comment` briefly explains the approach.";

const PLAN_REQUEST: &str = "Before writing any code, outline a short step-by-step plan for \
solving this task, including edge cases the tests are likely to check. Reply with the plan \
only, as plain text.";

const IMPLEMENT_REQUEST: &str = "Now implement the plan. Reply with the JSON object only.";

const REVIEW_REQUEST: &str = "Review the draft solution above against the task. Look for \
wrong function names, off-by-one errors, unhandled edge cases and Python syntax errors. \
Reply with the JSON object only, containing the corrected final code and a comment that \
summarizes what you changed (or why nothing needed changing).";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: content.to_string(),
        }
    }

    fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ChatReplyMessage {
    content: Option<String>,
}

/// Chat-completions client implementing the three strategies
pub struct ChatProducer {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl ChatProducer {
    pub fn new(settings: &ProducerSettings) -> Result<Self> {
        let api_key = std::env::var(&settings.api_key_env).with_context(|| {
            format!(
                "Environment variable {} must hold the chat API key",
                settings.api_key_env
            )
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", settings.base_url.trim_end_matches('/')),
            api_key,
            model: settings.model.clone(),
            temperature: settings.temperature,
        })
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };

        let start = Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Chat request to {} failed", self.endpoint))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            bail!("Chat endpoint returned {}: {}", status, truncate(&body, 500));
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .with_context(|| format!("Failed to parse chat response: {}", truncate(&body, 500)))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .context("Chat response contained no message content")?;

        debug!(
            model = %self.model,
            messages = messages.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            reply_chars = content.len(),
            "Chat completion received"
        );
        Ok(content)
    }

    /// Plan, then implement; returns the conversation so far and the draft
    async fn plan_and_implement(
        &self,
        prompt: &str,
        reference: &str,
    ) -> Result<(Vec<ChatMessage>, String)> {
        let mut messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(task_message(prompt, reference)),
            ChatMessage::user(PLAN_REQUEST),
        ];
        let plan = self.complete(&messages).await?;

        messages.push(ChatMessage::assistant(plan));
        messages.push(ChatMessage::user(IMPLEMENT_REQUEST));
        let draft = self.complete(&messages).await?;

        messages.push(ChatMessage::assistant(draft.clone()));
        Ok((messages, draft))
    }
}

#[async_trait]
impl CodeProducer for ChatProducer {
    fn name(&self) -> &str {
        "chat"
    }

    async fn write_code(&self, prompt: &str, reference: &str) -> Result<Candidate> {
        let messages = [
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(task_message(prompt, reference)),
        ];
        let reply = self.complete(&messages).await?;
        Ok(parse_reply(&reply))
    }

    async fn advanced_writing(&self, prompt: &str, reference: &str) -> Result<Candidate> {
        let (_, draft) = self.plan_and_implement(prompt, reference).await?;
        Ok(parse_reply(&draft))
    }

    async fn advanced_writing_v2(&self, prompt: &str, reference: &str) -> Result<Candidate> {
        let (mut messages, draft) = self.plan_and_implement(prompt, reference).await?;
        messages.push(ChatMessage::user(REVIEW_REQUEST));
        let reviewed = parse_reply(&self.complete(&messages).await?);

        // A review that loses the code falls back to the draft
        if reviewed.code.trim().is_empty() {
            return Ok(parse_reply(&draft));
        }
        Ok(reviewed)
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

/// `def` lines of the reference, so the candidate uses the names the tests call
pub fn signature_hint(reference: &str) -> Vec<String> {
    reference
        .lines()
        .filter(|line| {
            let trimmed = line.trim_start();
            trimmed.starts_with("def ") || trimmed.starts_with("class ")
        })
        .map(|line| line.trim_end().to_string())
        .collect()
}

fn task_message(prompt: &str, reference: &str) -> String {
    let signatures = signature_hint(reference);
    if signatures.is_empty() {
        format!("Task: {}", prompt)
    } else {
        format!(
            "Task: {}\n\nYour solution must provide these definitions:\n{}",
            prompt,
            signatures.join("\n")
        )
    }
}

fn strip_json_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let inner = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"));
    inner.map(str::trim).unwrap_or(trimmed)
}

/// First fenced block's body and the surrounding prose
fn split_fenced_block(text: &str) -> Option<(String, String)> {
    let open = text.find("```")?;
    let after_open = &text[open + 3..];
    // Skip the info string (`python`, `py`, ...)
    let body_start = after_open.find('\n')? + 1;
    let body = &after_open[body_start..];
    let close = body.find("```")?;

    let code = body[..close].trim_end().to_string();
    let prose = format!("{} {}", &text[..open], &body[close + 3..]);
    Some((code, prose.trim().to_string()))
}

/// JSON reply shape; a reply without `code` is not a candidate
#[derive(Debug, Deserialize)]
struct ReplyJson {
    code: String,
    #[serde(default)]
    comment: String,
}

fn parse_json_candidate(text: &str) -> Option<Candidate> {
    let reply: ReplyJson = serde_json::from_str(text).ok()?;
    if reply.code.trim().is_empty() {
        return None;
    }
    Some(Candidate {
        code: reply.code,
        comment: reply.comment,
    })
}

/// Turn a model reply into a candidate
///
/// Accepts, in order: a JSON object with a non-empty `code` (optionally
/// fenced), a fenced code block with surrounding prose as the comment, a
/// JSON object embedded in prose, or the whole reply as code.
pub fn parse_reply(reply: &str) -> Candidate {
    if let Some(candidate) = parse_json_candidate(strip_json_fence(reply)) {
        return candidate;
    }

    if let Some((code, comment)) = split_fenced_block(reply) {
        // A fenced JSON answer after some prose
        if let Some(candidate) = parse_json_candidate(&code) {
            return candidate;
        }
        if !code.trim().is_empty() {
            return Candidate { code, comment };
        }
    }

    if let (Some(start), Some(end)) = (reply.find('{'), reply.rfind('}')) {
        if start < end {
            if let Some(candidate) = parse_json_candidate(&reply[start..=end]) {
                return candidate;
            }
        }
    }

    Candidate {
        code: reply.trim().to_string(),
        comment: String::new(),
    }
}
