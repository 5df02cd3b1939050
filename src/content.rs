//! Acquisition output: what a channel produced for one URL before summarisation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum body length (in characters) for a social post to be worth summarising
pub const MIN_SOCIAL_BODY_LEN: usize = 10;
/// Minimum body length (in characters) for a generic page to be worth summarising
pub const MIN_PAGE_BODY_LEN: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentKind {
    SocialPost,
    WebPage,
}

impl ContentKind {
    pub fn min_body_len(self) -> usize {
        match self {
            ContentKind::SocialPost => MIN_SOCIAL_BODY_LEN,
            ContentKind::WebPage => MIN_PAGE_BODY_LEN,
        }
    }

    pub fn is_social(self) -> bool {
        matches!(self, ContentKind::SocialPost)
    }
}

/// The acquisition strategy that produced a piece of content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    OfficialApiV2,
    OfficialApiV1,
    ScraperService,
    RapidApi,
    WebPage,
}

impl Channel {
    pub fn name(self) -> &'static str {
        match self {
            Channel::OfficialApiV2 => "twitter_api_v2",
            Channel::OfficialApiV1 => "twitter_api_v1",
            Channel::ScraperService => "scraper_tech",
            Channel::RapidApi => "rapidapi",
            Channel::WebPage => "web",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Social-platform metadata gathered during acquisition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformMeta {
    /// "X" or "Twitter"
    pub platform: String,
    pub author: Option<String>,
    pub handle: Option<String>,
    pub created_at: Option<String>,
    pub mentions: Vec<String>,
    /// Provenance of the content
    pub via: Channel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawContent {
    pub kind: ContentKind,
    pub title: String,
    /// Plain text, already truncated
    pub body: String,
    /// Canonical URL; may differ from the one the user sent
    pub url: String,
    /// Host name or platform name
    pub source_label: String,
    /// Hashtags reported natively by the platform
    pub platform_tags: Vec<String>,
    pub platform_meta: Option<PlatformMeta>,
    /// `#word` / `$word` tokens found in the body
    pub special_tags: Vec<String>,
}

impl RawContent {
    pub fn body_len(&self) -> usize {
        self.body.chars().count()
    }

    /// Whether the body is long enough to be sent to the LLM
    pub fn is_usable(&self) -> bool {
        self.body_len() >= self.kind.min_body_len()
    }
}

/// Placeholder produced when no channel yielded content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnusableMarker {
    pub kind: ContentKind,
    pub title: String,
    /// Human-readable reason the acquisition failed
    pub reason: String,
    pub url: String,
    pub source_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Content(RawContent),
    Unusable(UnusableMarker),
}

impl FetchOutcome {
    pub fn content(&self) -> Option<&RawContent> {
        match self {
            FetchOutcome::Content(content) => Some(content),
            FetchOutcome::Unusable(_) => None,
        }
    }

    pub fn is_unusable(&self) -> bool {
        matches!(self, FetchOutcome::Unusable(_))
    }

    pub fn url(&self) -> &str {
        match self {
            FetchOutcome::Content(content) => &content.url,
            FetchOutcome::Unusable(marker) => &marker.url,
        }
    }
}
