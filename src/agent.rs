//! LLM agent for structured summarization.
//!
//! Builds a content-aware prompt, calls the chat endpoint with retry and
//! exponential backoff, and normalises the reply into a `ContentRecord`.
//! Replies that are not valid JSON go through the free-text parser instead.

use crate::config::LlmConfig;
use crate::content::RawContent;
use crate::extract::special_tags as find_special_tags;
use crate::fallback::parse_free_text;
use crate::llm::{ChatClient, ChatRequest, LlmError};
use crate::summary::{
    dedup_tags, domain_of, domain_tag, ellipsize, non_blank_or, sentinel, truncate_chars,
    union_tags, ContentRecord, RelatedLink, MAX_TAGS, NO_KEY_POINTS, NO_SUMMARY, UNTITLED,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Example value offered for `source` in the prompt; a reply echoing it is ignored
pub const SOURCE_PLACEHOLDER: &str = "source website name";

/// Body characters sent to the model
const PROMPT_CONTENT_LIMIT: usize = 10_000;

/// Substrings marking an acquisition title as a placeholder
const GENERIC_TITLES: &[&str] = &["Tweet", UNTITLED];

const TWITTER_INSTRUCTIONS: &str = "Additional instructions for Twitter/X posts:
1. Treat any text between <<highlight>> markers as an important key point
2. Use every #hashtag as a tag
3. Keep the summary concise, covering the post and its context
4. Key points should include the important quotes, figures and arguments of the post";

/// The LLM call failed and retrying did not help
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{source} (after {attempts} attempt(s))")]
pub struct SummarizeError {
    pub attempts: u32,
    #[source]
    pub source: LlmError,
}

pub struct Summarizer {
    client: Arc<dyn ChatClient>,
    model: String,
    temperature: f32,
    timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
}

impl Summarizer {
    pub fn new(client: Arc<dyn ChatClient>, config: &LlmConfig) -> Self {
        Self {
            client,
            model: config.model.clone(),
            temperature: config.temperature,
            timeout: config.timeout(),
            max_retries: config.max_retries.max(1),
            retry_delay: config.retry_delay(),
        }
    }

    /// Round trip against the configured endpoint with a tiny request
    pub async fn probe(&self) -> Result<(), LlmError> {
        self.client.probe(&self.model).await
    }

    /// Summarize `content`. Never fails: LLM errors become error-shaped records.
    pub async fn summarize(&self, content: &RawContent) -> ContentRecord {
        match self.try_summarize(content).await {
            Ok(record) => record,
            Err(e) => {
                error!(url = %content.url, error = %e, "summarization failed");
                self.error_record(content, &e).await
            }
        }
    }

    /// Summarize `content`, surfacing the final LLM error once retries are exhausted
    pub async fn try_summarize(&self, content: &RawContent) -> Result<ContentRecord, SummarizeError> {
        let request = ChatRequest::new(&self.model, build_prompt(content), self.timeout)
            .temperature(self.temperature)
            .json_output();
        let text = self.complete_with_retry(&request).await?;
        info!(url = %content.url, chars = text.chars().count(), "received LLM reply");

        let cleaned = strip_code_fences(&text);
        match parse_reply(&cleaned) {
            Some(reply) => Ok(normalize(reply, content)),
            None => {
                warn!(url = %content.url, "LLM reply is not valid JSON, parsing as free text");
                Ok(parse_free_text(&cleaned, &content.url))
            }
        }
    }

    async fn complete_with_retry(&self, request: &ChatRequest) -> Result<String, SummarizeError> {
        let mut delay = self.retry_delay;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.complete(request).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    warn!(
                        attempt,
                        max = self.max_retries,
                        delay_secs = delay.as_secs_f64(),
                        error = %e,
                        "LLM request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                }
                Err(e) => {
                    return Err(SummarizeError {
                        attempts: attempt,
                        source: e,
                    })
                }
            }
        }
    }

    /// A complete record describing why summarization failed
    pub async fn error_record(&self, content: &RawContent, err: &SummarizeError) -> ContentRecord {
        let source = non_blank_or(&content.source_label, &domain_of(&content.url));
        let (title, summary, key_points, tags) = match &err.source {
            LlmError::Timeout(_) => (
                "Processing timed out",
                format!(
                    "The LLM request timed out ({}s) on all {} attempt(s). This is usually a network problem or an overloaded API server. Try again later or raise DEEPSEEK_API_TIMEOUT.",
                    self.timeout.as_secs(),
                    err.attempts
                ),
                vec![
                    "LLM request timed out".to_string(),
                    format!("Tried {} time(s)", err.attempts),
                    "Possibly a network problem or high server load".to_string(),
                ],
                vec![sentinel::API_TIMEOUT.to_string(), sentinel::PROCESSING_ERROR.to_string()],
            ),
            LlmError::Connection(_) => {
                let probe = match self.probe().await {
                    Ok(()) => "API connection test: succeeded".to_string(),
                    Err(e) => format!("API connection test: failed ({})", e),
                };
                info!(result = %probe, "connectivity probe finished");
                (
                    "Connection failed",
                    format!(
                        "Could not connect to the LLM API server. This may be caused by network problems, firewall settings or a service outage. {}",
                        probe
                    ),
                    vec![
                        "Could not connect to the API server".to_string(),
                        probe,
                        "Check the network connection and firewall settings".to_string(),
                    ],
                    vec![
                        sentinel::CONNECTION_ERROR.to_string(),
                        sentinel::PROCESSING_ERROR.to_string(),
                    ],
                )
            }
            other => {
                let mut key_points = vec!["Key points could not be extracted".to_string()];
                key_points.extend(remediation_hints(other));
                (
                    "Processing failed",
                    format!("Error while processing the content ({}): {}", other.kind(), other),
                    key_points,
                    vec![sentinel::PROCESSING_ERROR.to_string(), other.kind().to_string()],
                )
            }
        };

        let mut tags = tags;
        union_tags(&mut tags, std::slice::from_ref(&source));
        ContentRecord {
            title: non_blank_or(&content.title, title),
            summary,
            key_points,
            tags,
            related_links: Vec::new(),
            source,
            original_url: content.url.clone(),
        }
    }
}

fn remediation_hints(err: &LlmError) -> Vec<String> {
    let hints: &[&str] = match err {
        LlmError::MalformedResponse(_) => &[
            "The API returned data in an unexpected format",
            "Check the status of the LLM service",
        ],
        LlmError::MissingApiKey | LlmError::Unauthorized(_) => &[
            "API authentication failed",
            "Check that DEEPSEEK_API_KEY is set correctly",
        ],
        LlmError::Api { status: 429, .. } => &[
            "The API is rate limiting requests",
            "Wait a moment before sending more links",
        ],
        _ => {
            return vec![
                format!("Error type: {}", err.kind()),
                "Check the logs for more details".to_string(),
            ]
        }
    };
    hints.iter().map(|h| h.to_string()).collect()
}

/// The single prompt sent for one piece of content
pub fn build_prompt(content: &RawContent) -> String {
    let social = content.kind.is_social();
    let (noun, body_noun) = if social { ("post", "Post") } else { ("web page", "Page") };
    let source_hint = if social {
        "(for posts this should be \"Twitter\" or \"X\")"
    } else {
        "(the website name)"
    };

    let mut context = Vec::new();
    if !content.special_tags.is_empty() {
        context.push(format!("Special tags: {}", content.special_tags.join(" ")));
    }
    if !content.platform_tags.is_empty() {
        context.push(format!("Hashtags: #{}", content.platform_tags.join(" #")));
    }
    if let Some(meta) = &content.platform_meta {
        if !meta.mentions.is_empty() {
            context.push(format!("Mentions: @{}", meta.mentions.join(" @")));
        }
        if let Some(date) = &meta.created_at {
            context.push(format!("Posted: {}", date));
        }
        context.push(format!("Acquired via: {}", meta.via));
    }

    let instructions = if social { TWITTER_INSTRUCTIONS } else { "" };

    format!(
        r#"Analyse the following {noun} in detail, extract the important information and return it as structured JSON.

{body_noun} title: {title}
URL: {url}
{context}

{body_noun} content:
{body}

Extract the following information and return it as strict JSON:
1. title: the main title or topic of the {noun} (at most 50 characters)
2. summary: a summary of the main content (200-300 characters)
3. key_points: a list of the key points (at least 3-5)
4. tags: 3-5 tags related to the {noun}
5. related_links: links mentioned in the {noun} with a description of each (if any)
6. source: the original source {source_hint}

{instructions}

Your reply must be valid JSON with no prefix or suffix text. Use this structure:
{{
  "title": "topic",
  "summary": "summary text",
  "key_points": ["point 1", "point 2", "point 3", "point 4", "point 5"],
  "tags": ["tag 1", "tag 2", "tag 3", "tag 4"],
  "related_links": [
    {{"url": "link 1", "description": "description of link 1"}},
    {{"url": "link 2", "description": "description of link 2"}}
  ],
  "source": "{placeholder}"
}}

If some information is missing, use a sensible default such as an empty array [] or placeholder text.
Make sure the JSON can be parsed directly by a JSON parser."#,
        noun = noun,
        body_noun = body_noun,
        title = content.title,
        url = content.url,
        context = context.join("\n"),
        body = truncate_chars(&content.body, PROMPT_CONTENT_LIMIT),
        source_hint = source_hint,
        instructions = instructions,
        placeholder = SOURCE_PLACEHOLDER,
    )
}

/// Strip markdown code fence wrappers from a model reply
pub fn strip_code_fences(text: &str) -> String {
    if let Some((_, rest)) = text.split_once("```json") {
        let inner = rest.split("```").next().unwrap_or(rest);
        return inner.trim().to_string();
    }
    let mut parts = text.split("```");
    if let (Some(_), Some(inner)) = (parts.next(), parts.next()) {
        return inner.trim().to_string();
    }
    text.trim().to_string()
}

/// Reply shape requested in the prompt; every field may be missing
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LlmReply {
    title: Option<String>,
    summary: Option<String>,
    #[serde(alias = "keyPoints")]
    key_points: Option<Vec<String>>,
    tags: Option<Vec<String>>,
    #[serde(alias = "relatedLinks")]
    related_links: Option<Vec<LinkEntry>>,
    source: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LinkEntry {
    Object {
        url: String,
        #[serde(default)]
        description: Option<String>,
    },
    Bare(String),
}

impl LinkEntry {
    fn into_link(self) -> Option<RelatedLink> {
        let (url, description) = match self {
            LinkEntry::Object { url, description } => (url, description.unwrap_or_default()),
            LinkEntry::Bare(url) => (url, String::new()),
        };
        let url = url.trim().to_string();
        (!url.is_empty()).then_some(RelatedLink { url, description })
    }
}

fn parse_reply(text: &str) -> Option<LlmReply> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    if !value.is_object() {
        return None;
    }
    serde_json::from_value(value).ok()
}

/// Apply the post-processing rules that every structured reply goes through
fn normalize(reply: LlmReply, content: &RawContent) -> ContentRecord {
    let summary = reply
        .summary
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let source = match reply.source.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() && s != SOURCE_PLACEHOLDER => s.to_string(),
        _ => non_blank_or(&content.source_label, &domain_of(&content.url)),
    };

    let title = match reply.title.as_deref().map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => backfill_title(content, summary.as_deref()),
    };

    let key_points: Vec<String> = reply
        .key_points
        .unwrap_or_default()
        .into_iter()
        .filter(|p| !p.trim().is_empty())
        .collect();
    let key_points = if key_points.is_empty() {
        vec![NO_KEY_POINTS.to_string()]
    } else {
        key_points
    };

    ContentRecord {
        title,
        summary: summary.unwrap_or_else(|| NO_SUMMARY.to_string()),
        key_points,
        tags: merge_tags(reply.tags.unwrap_or_default(), content),
        related_links: reply
            .related_links
            .unwrap_or_default()
            .into_iter()
            .filter_map(LinkEntry::into_link)
            .collect(),
        source,
        original_url: content.url.clone(),
    }
}

fn backfill_title(content: &RawContent, summary: Option<&str>) -> String {
    let generic = GENERIC_TITLES.iter().any(|g| content.title.contains(g));
    match summary {
        Some(summary) if generic && content.kind.is_social() => ellipsize(summary, 50),
        _ => non_blank_or(&content.title, UNTITLED),
    }
}

/// Special tags first, then platform hashtags, then a tag synthesised from the URL
fn merge_tags(model_tags: Vec<String>, content: &RawContent) -> Vec<String> {
    let mut tags = dedup_tags(model_tags);
    let special = if content.special_tags.is_empty() {
        find_special_tags(&content.body)
    } else {
        content.special_tags.clone()
    };
    union_tags(&mut tags, &special);

    if tags.is_empty() {
        tags = dedup_tags(&content.platform_tags);
    }
    if tags.is_empty() {
        tags.push(domain_tag(&content.url));
        if content.kind.is_social() {
            let platform = if domain_of(&content.url).contains("twitter.com") {
                "twitter"
            } else {
                "x"
            };
            union_tags(&mut tags, &[platform.to_string()]);
        }
    }
    tags.truncate(MAX_TAGS);
    tags
}
