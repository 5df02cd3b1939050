//! ContentRecord - the canonical output of the pipeline.
//!
//! Every record, success or failure, has all fields populated. Failure records
//! carry one of the sentinel tags so a caller can decide not to persist them.

use crate::content::{RawContent, UnusableMarker};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Downstream stores accept at most this many tags
pub const MAX_TAGS: usize = 10;

pub const UNTITLED: &str = "Untitled";
pub const NO_SUMMARY: &str = "No summary could be generated; please read the original.";
pub const NO_KEY_POINTS: &str =
    "No key points could be extracted; please read the original for details.";

/// Tags that mark a record as a failure rather than curated content
pub mod sentinel {
    pub const FETCH_FAILED: &str = "fetch failed";
    pub const CONTENT_MISSING: &str = "content missing";
    pub const API_TIMEOUT: &str = "api timeout";
    pub const CONNECTION_ERROR: &str = "connection error";
    pub const PROCESSING_ERROR: &str = "processing error";

    pub const ALL: &[&str] = &[
        FETCH_FAILED,
        CONTENT_MISSING,
        API_TIMEOUT,
        CONNECTION_ERROR,
        PROCESSING_ERROR,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedLink {
    pub url: String,
    pub description: String,
}

/// Structured summary of one processed URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub title: String,
    pub summary: String,
    pub key_points: Vec<String>,
    pub tags: Vec<String>,
    pub related_links: Vec<RelatedLink>,
    pub source: String,
    pub original_url: String,
}

impl ContentRecord {
    /// Record returned when no channel produced any content
    pub fn acquisition_failed(marker: &UnusableMarker) -> Self {
        Self {
            title: non_blank_or(&marker.title, UNTITLED),
            summary: format!(
                "The content could not be retrieved. {} Check that the link is valid and the acquisition channels are configured.",
                marker.reason
            ),
            key_points: vec![
                "Content could not be retrieved".to_string(),
                "Check that the URL is correct".to_string(),
                "Check that the API/scraper configuration is valid".to_string(),
            ],
            tags: vec![
                sentinel::FETCH_FAILED.to_string(),
                sentinel::CONTENT_MISSING.to_string(),
            ],
            related_links: Vec::new(),
            source: non_blank_or(&marker.source_label, &domain_of(&marker.url)),
            original_url: marker.url.clone(),
        }
    }

    /// Record returned when content was fetched but is too short to analyse
    pub fn content_too_short(content: &RawContent) -> Self {
        Self {
            title: non_blank_or(&content.title, UNTITLED),
            summary: format!(
                "Not enough content was retrieved to analyse ({} characters, at least {} required). The site may restrict access, require a login, or use an unusual format.",
                content.body_len(),
                content.kind.min_body_len()
            ),
            key_points: vec![
                "Content could not be retrieved".to_string(),
                "Check that the URL is correct".to_string(),
                "Try opening the page manually to see whether it loads".to_string(),
            ],
            tags: vec![
                sentinel::FETCH_FAILED.to_string(),
                sentinel::CONTENT_MISSING.to_string(),
            ],
            related_links: Vec::new(),
            source: non_blank_or(&content.source_label, &domain_of(&content.url)),
            original_url: content.url.clone(),
        }
    }

    /// Whether this record describes a failure instead of curated content
    pub fn is_failure(&self) -> bool {
        self.tags
            .iter()
            .any(|tag| sentinel::ALL.iter().any(|s| tag.eq_ignore_ascii_case(s)))
    }
}

/// Deduplicate case-insensitively, keeping the first spelling and order.
/// Blank entries are dropped and surrounding whitespace trimmed.
pub fn dedup_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if tag.is_empty() {
            continue;
        }
        if seen.insert(tag.to_lowercase()) {
            out.push(tag.to_string());
        }
    }
    out
}

/// Append `extra` to `tags`, skipping case-insensitive duplicates
pub fn union_tags(tags: &mut Vec<String>, extra: &[String]) {
    let merged = dedup_tags(tags.iter().chain(extra.iter()));
    *tags = merged;
}

/// Host of `url`, or the part between `//` and the next `/` if it does not parse
pub fn domain_of(url: &str) -> String {
    if let Ok(parsed) = url::Url::parse(url) {
        if let Some(host) = parsed.host_str() {
            return host.to_string();
        }
    }
    let without_scheme = url.split("//").last().unwrap_or(url);
    without_scheme
        .split('/')
        .next()
        .unwrap_or(without_scheme)
        .to_string()
}

/// Tag synthesised from a URL's domain: the label before the public suffix
/// (`news.example.com` -> `example`), or the whole host if it has one label
pub fn domain_tag(url: &str) -> String {
    let domain = domain_of(url);
    let labels: Vec<&str> = domain.split('.').filter(|l| !l.is_empty()).collect();
    match labels.len() {
        0 => domain,
        1 => labels[0].to_string(),
        n => labels[n - 2].to_string(),
    }
}

/// First `max` characters of `text`
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// `text` cut to `max` characters with "..." appended when it was longer
pub fn ellipsize(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        format!("{}...", truncate_chars(text, max))
    } else {
        text.to_string()
    }
}

pub(crate) fn non_blank_or(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.trim().to_string()
    }
}
