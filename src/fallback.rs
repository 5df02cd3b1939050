//! Best-effort recovery of a `ContentRecord` from free-form model output.
//!
//! Used when the LLM reply is not valid JSON. Fields are found with an
//! ordered list of patterns per field: quoted JSON keys first (for replies
//! that are almost-JSON), then `Label:` lines in English or Chinese. Every
//! field ends up non-empty; the parser never fails.

use crate::extract::special_tags;
use crate::summary::{
    dedup_tags, domain_of, domain_tag, truncate_chars, ContentRecord, RelatedLink, MAX_TAGS,
    NO_KEY_POINTS, NO_SUMMARY, UNTITLED,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Shorter input is not worth pattern matching
const MIN_TEXT_LEN: usize = 20;
/// Summaries recovered from loose lines are cut to this many characters
const MAX_SUMMARY_LEN: usize = 300;
/// Loose lines shorter than this are not used as a summary
const MIN_SUMMARY_LINE_LEN: usize = 40;

pub const INSUFFICIENT_TEXT: &str = "Not enough text to extract any information.";
/// Last-resort tag when neither the text nor the URL yields one
const FALLBACK_TAG: &str = "unsorted";
const UNKNOWN_SOURCE: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Summary,
    KeyPoints,
    Tags,
    RelatedLinks,
    Source,
}

impl Field {
    const ALL: [Field; 6] = [
        Field::Title,
        Field::Summary,
        Field::KeyPoints,
        Field::Tags,
        Field::RelatedLinks,
        Field::Source,
    ];

    /// Regex alternation of the natural-language labels
    fn labels(self) -> &'static str {
        match self {
            Field::Title => r"title|标题|主题",
            Field::Summary => r"summary|摘要|概要|总结",
            Field::KeyPoints => r"key[ _-]?points?|关键点|要点",
            Field::Tags => r"tags?|标签|关键词",
            Field::RelatedLinks => r"related[ _-]?links?|相关链接|链接",
            Field::Source => r"source|来源",
        }
    }

    fn json_keys(self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Summary => "summary",
            Field::KeyPoints => "key_points|keyPoints",
            Field::Tags => "tags",
            Field::RelatedLinks => "related_links|relatedLinks",
            Field::Source => "source",
        }
    }

    fn is_list(self) -> bool {
        matches!(self, Field::KeyPoints | Field::Tags | Field::RelatedLinks)
    }
}

lazy_static! {
    /// `Label: value` lines, tolerating bullets, numbering, bold markers,
    /// quotes and a parenthesised alias such as `主题(title):`
    static ref LABEL_LINES: Vec<(Field, Regex)> = Field::ALL
        .iter()
        .map(|field| {
            let pattern = format!(
                r#"(?i)^\s*(?:[-*>•]+\s*)?(?:\d+[.)、]\s*)?(?:\*\*|__)?["']?(?:{})["']?(?:\*\*|__)?\s*(?:\([^)]*\)|（[^）]*）)?\s*(?:\*\*|__)?\s*[:：]\s*(?:\*\*|__)?(.*)$"#,
                field.labels()
            );
            (*field, Regex::new(&pattern).unwrap())
        })
        .collect();

    /// `"key": "string"` or `"key": [ ... ]` anywhere in the text
    static ref JSON_KEYS: Vec<(Field, Regex)> = Field::ALL
        .iter()
        .map(|field| {
            let value = if field.is_list() {
                r"(\[.*?\])"
            } else {
                r#""((?:[^"\\]|\\.)*)""#
            };
            let pattern = format!(r#"(?s)"(?:{})"\s*:\s*{}"#, field.json_keys(), value);
            (*field, Regex::new(&pattern).unwrap())
        })
        .collect();

    static ref BULLET: Regex = Regex::new(r"^\s*(?:[-*•·+]|\d+[.)、])\s+(.+)$").unwrap();
    static ref URL: Regex = Regex::new(r#"https?://[^\s"'<>()\[\]{}，。、]+"#).unwrap();
    static ref HEADING: Regex = Regex::new(r"^\s*#{1,6}\s+(.+)$").unwrap();
}

/// Fields found in the text before defaults are applied
#[derive(Debug, Default)]
struct Recovered {
    title: Option<String>,
    summary: Option<String>,
    key_points: Vec<String>,
    tags: Vec<String>,
    related_links: Vec<RelatedLink>,
    source: Option<String>,
}

/// A labelled line plus the unlabelled lines after it
#[derive(Debug)]
struct Section<'a> {
    field: Field,
    inline: String,
    /// Bullet style of the label line itself
    marker: Option<Marker>,
    lines: Vec<&'a str>,
}

/// Leading bullet style of a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Symbol,
    Number,
}

impl Section<'_> {
    /// Inline value and following lines as one block
    fn joined(&self) -> String {
        std::iter::once(self.inline.as_str())
            .chain(self.lines.iter().copied())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Recover a record from free text. Never fails and never leaves a field empty.
pub fn parse_free_text(text: &str, url: &str) -> ContentRecord {
    let recovered = if text.trim().chars().count() < MIN_TEXT_LEN {
        warn!(chars = text.trim().chars().count(), "text too short to extract fields");
        Recovered {
            summary: Some(INSUFFICIENT_TEXT.to_string()),
            ..Default::default()
        }
    } else {
        recover_fields(text, url)
    };
    debug!(
        title = recovered.title.is_some(),
        summary = recovered.summary.is_some(),
        key_points = recovered.key_points.len(),
        tags = recovered.tags.len(),
        links = recovered.related_links.len(),
        "free-text fields recovered"
    );
    apply_defaults(recovered, text, url)
}

fn recover_fields(text: &str, url: &str) -> Recovered {
    let sections = split_sections(text);
    let section = |field: Field| sections.iter().find(|s| s.field == field);

    let scalar = |field: Field| {
        json_scalar(text, field)
            .or_else(|| section(field).and_then(|s| section_scalar(s, field)))
    };
    let list = |field: Field| {
        json_list(text, field)
            .or_else(|| section(field).map(section_list))
            .unwrap_or_default()
    };

    let mut related_links = json_links(text)
        .or_else(|| section(Field::RelatedLinks).map(section_links))
        .unwrap_or_default();
    related_links.extend(scan_bare_links(text));

    Recovered {
        title: scalar(Field::Title),
        summary: scalar(Field::Summary),
        key_points: list(Field::KeyPoints),
        tags: list(Field::Tags)
            .iter()
            .flat_map(|t| split_inline_tags(t))
            .collect(),
        related_links: dedup_links(related_links, url),
        source: scalar(Field::Source),
    }
}

fn apply_defaults(recovered: Recovered, text: &str, url: &str) -> ContentRecord {
    let title = recovered
        .title
        .or_else(|| first_heading(text))
        .unwrap_or_else(|| UNTITLED.to_string());

    let summary = recovered
        .summary
        .or_else(|| first_long_line(text))
        .unwrap_or_else(|| NO_SUMMARY.to_string());

    let key_points = if recovered.key_points.is_empty() {
        vec![NO_KEY_POINTS.to_string()]
    } else {
        recovered.key_points
    };

    let mut tags = dedup_tags(recovered.tags);
    if tags.is_empty() {
        tags = special_tags(text);
    }
    if tags.is_empty() {
        let tag = domain_tag(url);
        tags.push(if tag.trim().is_empty() {
            FALLBACK_TAG.to_string()
        } else {
            tag
        });
    }
    tags.truncate(MAX_TAGS);

    let source = recovered.source.unwrap_or_else(|| {
        let domain = domain_of(url);
        if domain.trim().is_empty() {
            UNKNOWN_SOURCE.to_string()
        } else {
            domain
        }
    });

    ContentRecord {
        title,
        summary,
        key_points,
        tags,
        related_links: recovered.related_links,
        source,
        original_url: url.to_string(),
    }
}

fn match_label(line: &str) -> Option<(Field, String)> {
    LABEL_LINES.iter().find_map(|(field, regex)| {
        regex
            .captures(line)
            .map(|caps| (*field, caps.get(1).map_or("", |m| m.as_str()).trim().to_string()))
    })
}

fn split_sections(text: &str) -> Vec<Section<'_>> {
    let mut sections: Vec<Section> = Vec::new();
    for line in text.lines() {
        let label = match_label(line).filter(|_| !continues_list(sections.last(), line));
        if let Some((field, inline)) = label {
            sections.push(Section {
                field,
                inline,
                marker: item_marker(line),
                lines: Vec::new(),
            });
        } else if let Some(current) = sections.last_mut() {
            current.lines.push(line);
        }
    }
    sections
}

/// Whether a labelled `line` is really an item of the open list section.
/// Items are bulleted differently from the list's own label line and share
/// the style of the items before them.
fn continues_list(section: Option<&Section>, line: &str) -> bool {
    let (Some(section), Some(marker)) = (section, item_marker(line)) else {
        return false;
    };
    if !section.field.is_list() || section.marker == Some(marker) {
        return false;
    }
    section
        .lines
        .iter()
        .find_map(|l| item_marker(l))
        .map_or(true, |first| first == marker)
}

fn item_marker(line: &str) -> Option<Marker> {
    let line = line.trim_start();
    let mut chars = line.chars();
    let first = chars.next()?;
    if "-*>•·+".contains(first) {
        // `**Tags**:` is bold text, not a bullet
        return chars.next().filter(|c| c.is_whitespace()).map(|_| Marker::Symbol);
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    match line[digits..].chars().next() {
        Some('.' | ')' | '、') if digits > 0 => Some(Marker::Number),
        _ => None,
    }
}

fn json_scalar(text: &str, field: Field) -> Option<String> {
    let (_, regex) = JSON_KEYS.iter().find(|(f, _)| *f == field)?;
    let raw = regex.captures(text)?.get(1)?.as_str();
    let value = serde_json::from_str::<String>(&format!("\"{}\"", raw))
        .unwrap_or_else(|_| raw.to_string());
    non_empty(&value)
}

fn json_array(text: &str, field: Field) -> Option<Vec<Value>> {
    let (_, regex) = JSON_KEYS.iter().find(|(f, _)| *f == field)?;
    let raw = regex.captures(text)?.get(1)?.as_str();
    serde_json::from_str(raw).ok()
}

fn json_list(text: &str, field: Field) -> Option<Vec<String>> {
    let items: Vec<String> = json_array(text, field)?
        .iter()
        .filter_map(value_text)
        .collect();
    (!items.is_empty()).then_some(items)
}

fn json_links(text: &str) -> Option<Vec<RelatedLink>> {
    let links: Vec<RelatedLink> = json_array(text, Field::RelatedLinks)?
        .iter()
        .filter_map(value_link)
        .collect();
    (!links.is_empty()).then_some(links)
}

fn section_scalar(section: &Section, field: Field) -> Option<String> {
    let inline = section.inline.trim();
    let mut lines = section.lines.iter().map(|l| l.trim()).peekable();
    if inline.is_empty() {
        while lines.next_if(|l| l.is_empty()).is_some() {}
    }
    let paragraph: Vec<&str> = lines.take_while(|l| !l.is_empty()).collect();

    match field {
        // a summary runs on to the first blank line
        Field::Summary => {
            let joined = std::iter::once(inline)
                .chain(paragraph)
                .filter(|l| !l.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            non_empty(&clean_item(&joined))
        }
        _ if !inline.is_empty() => non_empty(&clean_item(inline)),
        _ => paragraph.first().and_then(|l| non_empty(&clean_item(l))),
    }
}

fn section_list(section: &Section) -> Vec<String> {
    if let Some(items) = array_in(&section.joined()) {
        return items.iter().filter_map(value_text).collect();
    }

    let bullets: Vec<String> = section
        .lines
        .iter()
        .filter_map(|l| BULLET.captures(l))
        .filter_map(|caps| non_empty(&clean_item(caps.get(1)?.as_str())))
        .collect();
    if !bullets.is_empty() {
        return bullets;
    }

    if let Some(inline) = non_empty(&clean_item(&section.inline)) {
        return vec![inline];
    }
    section
        .lines
        .iter()
        .map(|l| clean_item(l))
        .skip_while(|l| l.is_empty())
        .take_while(|l| !l.is_empty())
        .collect()
}

fn section_links(section: &Section) -> Vec<RelatedLink> {
    if let Some(items) = array_in(&section.joined()) {
        return items.iter().filter_map(value_link).collect();
    }
    std::iter::once(section.inline.as_str())
        .chain(section.lines.iter().copied())
        .filter_map(|line| {
            let found = URL.find(line)?;
            Some(RelatedLink {
                url: trim_url(found.as_str()),
                description: describe(&line.replace(found.as_str(), "")),
            })
        })
        .collect()
}

/// Every URL in the text, described by the rest of its line or the line before
fn scan_bare_links(text: &str) -> Vec<RelatedLink> {
    let lines: Vec<&str> = text.lines().collect();
    let mut links = Vec::new();
    for (index, line) in lines.iter().enumerate() {
        for found in URL.find_iter(line) {
            let mut description = describe(&line.replace(found.as_str(), ""));
            if description.is_empty() {
                description = lines[..index]
                    .iter()
                    .rev()
                    .filter(|l| !l.trim().is_empty())
                    .find(|l| !URL.is_match(l))
                    .map(|l| describe(l))
                    .unwrap_or_default();
            }
            links.push(RelatedLink {
                url: trim_url(found.as_str()),
                description,
            });
        }
    }
    links
}

/// Drop duplicates and any link pointing back at the processed URL
fn dedup_links(links: Vec<RelatedLink>, original_url: &str) -> Vec<RelatedLink> {
    let original = original_url.trim().trim_end_matches('/');
    let mut seen = HashSet::new();
    links
        .into_iter()
        .filter(|link| {
            let key = link.url.trim_end_matches('/');
            !key.is_empty() && key != original && seen.insert(key.to_string())
        })
        .collect()
}

/// The JSON array between the first `[` and the last `]`
fn array_in(block: &str) -> Option<Vec<Value>> {
    let start = block.find('[')?;
    let end = block.rfind(']')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&block[start..=end]).ok()
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_empty(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_link(value: &Value) -> Option<RelatedLink> {
    match value {
        Value::String(s) => {
            let url = URL.find(s)?;
            Some(RelatedLink {
                url: trim_url(url.as_str()),
                description: describe(&s.replace(url.as_str(), "")),
            })
        }
        Value::Object(map) => {
            let url = map.get("url")?.as_str()?.trim();
            if url.is_empty() {
                return None;
            }
            Some(RelatedLink {
                url: url.to_string(),
                description: map
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .trim()
                    .to_string(),
            })
        }
        _ => None,
    }
}

/// Tags written inline, e.g. `Tags: rust, async、tokio`
fn split_inline_tags(tag: &str) -> Vec<String> {
    tag.split([',', '，', '、', ';', '；'])
        .filter_map(|t| non_empty(&clean_item(t)))
        .collect()
}

/// Strip bullets, quotes, trailing commas and markdown emphasis from one item
fn clean_item(item: &str) -> String {
    let item = BULLET
        .captures(item)
        .and_then(|caps| caps.get(1))
        .map_or(item, |m| m.as_str());
    item.trim()
        .trim_end_matches(',')
        .trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '*' || c == '`')
        .trim()
        .to_string()
}

/// A link description from the text around the URL
fn describe(text: &str) -> String {
    let text = match match_label(text) {
        Some((_, inline)) => inline,
        None => text.to_string(),
    };
    clean_item(&text)
        .trim_matches(|c: char| {
            c.is_whitespace() || matches!(c, '-' | '–' | ':' | '：' | '|' | '(' | ')' | '（' | '）' | '[' | ']')
        })
        .to_string()
}

fn trim_url(url: &str) -> String {
    url.trim_end_matches(['.', ',', ';', ':', '!', '?']).to_string()
}

fn first_heading(text: &str) -> Option<String> {
    text.lines()
        .filter_map(|l| HEADING.captures(l))
        .filter_map(|caps| non_empty(caps.get(1)?.as_str()))
        .next()
}

/// The first prose line long enough to stand in for a summary
fn first_long_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| l.chars().count() >= MIN_SUMMARY_LINE_LEN)
        .filter(|l| match_label(l).is_none() && !BULLET.is_match(l) && !HEADING.is_match(l))
        .filter(|l| !l.starts_with(['{', '[', '"']))
        .find(|l| URL.replace_all(l, "").trim().chars().count() >= MIN_SUMMARY_LINE_LEN)
        .map(|l| truncate_chars(l, MAX_SUMMARY_LEN))
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
