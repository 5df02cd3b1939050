//! Content extraction: HTML pages and tweet payloads into `RawContent`.
//!
//! Uses scraper for HTML parsing. Extraction is pure; the same input always
//! yields the same output.

use crate::content::{ContentKind, PlatformMeta, RawContent};
use crate::summary::{dedup_tags, domain_of, truncate_chars, UNTITLED};
use crate::twitter::{TweetFetch, TweetPayload, TweetTarget};
use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

lazy_static! {
    static ref SPECIAL_TAG: Regex =
        Regex::new(r"(?:^|[^\p{L}\p{N}_&/#$])([#$]\p{L}[\p{L}\p{N}_]*)").unwrap();
}

/// Platform hashtags kept per post
pub const MAX_PLATFORM_TAGS: usize = 8;
/// Mentions kept per post
pub const MAX_MENTIONS: usize = 5;
/// Special tags kept per body
pub const MAX_SPECIAL_TAGS: usize = 10;

/// Elements whose text never counts as content
const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "template", "nav", "footer", "iframe", "svg", "form",
    "button", "head",
];

/// Landmarks tried in order when looking for the main content region
const REGION_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role='main']",
    "[itemprop='articleBody']",
    "[class*='article']",
    "[id*='article']",
    "[class*='content']",
    "[id*='content']",
    "[class*='post']",
];

const BLOCK_ELEMENTS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "li", "blockquote", "pre",
];

/// Input to the extractor
#[derive(Debug, Clone)]
pub enum Document {
    Html(String),
    Tweet(TweetFetch),
}

#[derive(Debug, Clone)]
pub struct ContentExtractor {
    max_content_length: usize,
    /// Shorter blocks (bylines, buttons, captions) are dropped
    min_block_len: usize,
    /// A region yielding less text than this falls back to the whole document
    min_region_len: usize,
}

impl Default for ContentExtractor {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl ContentExtractor {
    pub fn new(max_content_length: usize) -> Self {
        Self {
            max_content_length,
            min_block_len: 20,
            min_region_len: 100,
        }
    }

    /// Extract a `RawContent` from a document fetched for `url`.
    /// For tweets `url` is the resolved post URL.
    pub fn extract(&self, document: &Document, url: &str) -> RawContent {
        match document {
            Document::Html(html) => self.extract_page(html, url),
            Document::Tweet(fetch) => self.extract_tweet(fetch, &TweetTarget::from_url(url)),
        }
    }

    pub fn extract_page(&self, html: &str, url: &str) -> RawContent {
        let document = Html::parse_document(html);
        let title = extract_title(&document).unwrap_or_else(|| UNTITLED.to_string());

        let region_text = self.region_text(&document);
        let text = if region_text.chars().count() >= self.min_region_len {
            region_text
        } else {
            let whole = whole_document_text(&document);
            if whole.chars().count() > region_text.chars().count() {
                whole
            } else {
                region_text
            }
        };
        let body = truncate_chars(&text, self.max_content_length);
        let special_tags = special_tags(&body);

        RawContent {
            kind: ContentKind::WebPage,
            title,
            body,
            url: url.to_string(),
            source_label: domain_of(url),
            platform_tags: Vec::new(),
            platform_meta: None,
            special_tags,
        }
    }

    pub fn extract_tweet(&self, fetch: &TweetFetch, target: &TweetTarget) -> RawContent {
        let fields = SocialFields::from_payload(&fetch.payload);
        let platform = target.platform().to_string();

        let platform_tags: Vec<String> = dedup_tags(
            fields
                .hashtags
                .iter()
                .map(|t| t.trim_start_matches('#').to_string()),
        )
        .into_iter()
        .take(MAX_PLATFORM_TAGS)
        .collect();
        let mentions: Vec<String> = dedup_tags(
            fields
                .mentions
                .iter()
                .map(|m| m.trim_start_matches('@').to_string()),
        )
        .into_iter()
        .take(MAX_MENTIONS)
        .collect();

        let title = match (&fields.author, &fields.handle) {
            (Some(author), _) => format!("Tweet by {}", author),
            (None, Some(handle)) => format!("Tweet by @{}", handle),
            (None, None) => "Tweet".to_string(),
        };
        let body = truncate_chars(fields.text.trim(), self.max_content_length);
        let special_tags = special_tags(&body);

        RawContent {
            kind: ContentKind::SocialPost,
            title,
            body,
            url: target.canonical_url(fields.handle.as_deref()),
            source_label: platform.clone(),
            platform_tags,
            platform_meta: Some(PlatformMeta {
                platform,
                author: fields.author,
                handle: fields.handle,
                created_at: fields.created_at,
                mentions,
                via: fetch.via,
            }),
            special_tags,
        }
    }

    /// Block text of the first landmark region that yields enough of it
    fn region_text(&self, document: &Html) -> String {
        let mut best = String::new();
        for css in REGION_SELECTORS {
            let Ok(selector) = Selector::parse(css) else {
                continue;
            };
            for region in document.select(&selector) {
                if has_skipped_ancestor(region) {
                    continue;
                }
                let text = self.block_text(region);
                if text.chars().count() >= self.min_region_len {
                    return text;
                }
                if text.chars().count() > best.chars().count() {
                    best = text;
                }
            }
        }
        best
    }

    /// Paragraph-level text blocks under `root`, separated by blank lines
    fn block_text(&self, root: ElementRef) -> String {
        let Ok(selector) = Selector::parse(&BLOCK_ELEMENTS.join(", ")) else {
            return String::new();
        };
        let mut blocks: Vec<String> = Vec::new();
        for element in root.select(&selector) {
            if has_skipped_ancestor(element) || has_block_ancestor(element, root) {
                continue;
            }
            let mut raw = String::new();
            collect_inline_text(element, &mut raw);
            let cleaned = collapse_whitespace(&raw);
            if cleaned.chars().count() >= self.min_block_len {
                blocks.push(cleaned);
            }
        }
        blocks.join("\n\n")
    }
}

/// Unified view over the three payload shapes
#[derive(Debug, Default)]
struct SocialFields {
    text: String,
    author: Option<String>,
    handle: Option<String>,
    created_at: Option<String>,
    hashtags: Vec<String>,
    mentions: Vec<String>,
}

impl SocialFields {
    fn from_payload(payload: &TweetPayload) -> Self {
        match payload {
            TweetPayload::V2(response) => {
                let Some(tweet) = &response.data else {
                    return Self::default();
                };
                let author = tweet
                    .author_id
                    .as_deref()
                    .and_then(|id| response.includes.users.iter().find(|u| u.id == id));
                let text = tweet
                    .note_tweet
                    .as_ref()
                    .map(|n| n.text.clone())
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| tweet.text.clone());
                let entities = tweet.entities.clone().unwrap_or_default();
                Self {
                    text,
                    author: author.and_then(|u| non_blank(u.name.as_deref())),
                    handle: author.and_then(|u| non_blank(u.username.as_deref())),
                    created_at: non_blank(tweet.created_at.as_deref()),
                    hashtags: entities.hashtags.into_iter().map(|h| h.tag).collect(),
                    mentions: entities.mentions.into_iter().map(|m| m.username).collect(),
                }
            }
            TweetPayload::V1(status) => {
                let entities = status.entities.clone().unwrap_or_default();
                let text = non_blank(status.full_text.as_deref())
                    .or_else(|| non_blank(status.text.as_deref()))
                    .unwrap_or_default();
                Self {
                    text,
                    author: status.user.as_ref().and_then(|u| non_blank(u.name.as_deref())),
                    handle: status
                        .user
                        .as_ref()
                        .and_then(|u| non_blank(u.screen_name.as_deref())),
                    created_at: non_blank(status.created_at.as_deref()),
                    hashtags: entities.hashtags.into_iter().map(|h| h.text).collect(),
                    mentions: entities
                        .user_mentions
                        .into_iter()
                        .map(|m| m.screen_name)
                        .collect(),
                }
            }
            TweetPayload::Scraper(payload) => {
                let user = payload.author.as_ref().or(payload.user.as_ref());
                let entities = payload.entities.clone().unwrap_or_default();
                let text = non_blank(payload.display_text.as_deref())
                    .or_else(|| non_blank(payload.text.as_deref()))
                    .unwrap_or_default();
                Self {
                    text,
                    author: user.and_then(|u| non_blank(u.name.as_deref())),
                    handle: user.and_then(|u| non_blank(u.screen_name.as_deref())),
                    created_at: non_blank(payload.created_at.as_deref()),
                    hashtags: entities
                        .hashtags
                        .iter()
                        .filter_map(|h| h.value())
                        .map(str::to_string)
                        .collect(),
                    mentions: entities
                        .user_mentions
                        .iter()
                        .filter_map(|m| m.value())
                        .map(str::to_string)
                        .collect(),
                }
            }
        }
    }
}

/// `#word` and `$word` tokens in `text`, deduplicated case-insensitively
pub fn special_tags(text: &str) -> Vec<String> {
    dedup_tags(
        SPECIAL_TAG
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str()),
    )
    .into_iter()
    .take(MAX_SPECIAL_TAGS)
    .collect()
}

/// Page title from `<title>`, the first `<h1>`, or `og:title`
fn extract_title(document: &Html) -> Option<String> {
    for css in ["title", "h1"] {
        if let Ok(selector) = Selector::parse(css) {
            if let Some(element) = document.select(&selector).next() {
                let title = collapse_whitespace(&element.text().collect::<String>());
                if !title.is_empty() {
                    return Some(title);
                }
            }
        }
    }

    let selector = Selector::parse("meta[property='og:title']").ok()?;
    document
        .select(&selector)
        .filter_map(|meta| meta.value().attr("content"))
        .map(collapse_whitespace)
        .find(|t| !t.is_empty())
}

/// Every visible text node of the document on its own line
fn whole_document_text(document: &Html) -> String {
    let mut lines = Vec::new();
    collect_text_lines(document.root_element(), &mut lines);
    lines.join("\n")
}

fn collect_text_lines(element: ElementRef, lines: &mut Vec<String>) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            if !is_skipped(child_element.value().name()) {
                collect_text_lines(child_element, lines);
            }
        } else if let Some(text) = child.value().as_text() {
            let cleaned = collapse_whitespace(text);
            if !cleaned.is_empty() {
                lines.push(cleaned);
            }
        }
    }
}

fn collect_inline_text(element: ElementRef, out: &mut String) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            let name = child_element.value().name();
            if name == "br" {
                out.push(' ');
            } else if !is_skipped(name) {
                collect_inline_text(child_element, out);
            }
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
        }
    }
}

fn has_skipped_ancestor(element: ElementRef) -> bool {
    element
        .ancestors()
        .filter_map(|node| node.value().as_element())
        .any(|e| is_skipped(e.name()))
}

/// Whether a block element sits inside another block below `root`
fn has_block_ancestor(element: ElementRef, root: ElementRef) -> bool {
    for node in element.ancestors() {
        if node.id() == root.id() {
            return false;
        }
        if let Some(e) = node.value().as_element() {
            if BLOCK_ELEMENTS.contains(&e.name()) {
                return true;
            }
        }
    }
    false
}

fn is_skipped(name: &str) -> bool {
    SKIPPED_ELEMENTS.contains(&name)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
