//! Social-post acquisition channels for Twitter/X.
//!
//! Each channel answers with its own native payload type; turning those into a
//! `RawContent` is the extractor's job, so one channel's schema quirks never
//! leak into another.

use crate::config::{OfficialApiCredentials, RapidApiCredentials, ScraperServiceCredentials};
use crate::content::Channel;
use crate::http::{HttpClient, HttpError, HttpRequest, HttpResponse};
use crate::summary::domain_of;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

lazy_static! {
    static ref STATUS_PATH: Regex =
        Regex::new(r"(?i)(?:twitter\.com|x\.com|nitter\.[a-z0-9.-]+)/(?:i/web/|([A-Za-z0-9_]+)/)status(?:es)?/(\d+)")
            .unwrap();
}

const SHORT_LINK_HOST: &str = "t.co";

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("no tweet id could be extracted from the URL")]
    MissingId,
    #[error("no author handle could be extracted from the URL")]
    MissingHandle,
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("unexpected status {status}: {excerpt}")]
    Status { status: u16, excerpt: String },
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error(transparent)]
    Http(#[from] HttpError),
}

/// Whether `url` points at a microblogging post rather than a generic page
pub fn is_social_post(url: &str) -> bool {
    let host = domain_of(url).to_ascii_lowercase();
    let host = host
        .strip_prefix("www.")
        .or_else(|| host.strip_prefix("mobile."))
        .unwrap_or(&host);
    matches!(host, "twitter.com" | "x.com" | SHORT_LINK_HOST)
        || host.ends_with(".twitter.com")
        || host.starts_with("nitter.")
}

/// `(handle, id)` from a canonical `/{handle}/status/{id}` URL. The handle is
/// `None` for `/i/web/status/{id}` links.
pub fn parse_status_url(url: &str) -> Option<(Option<String>, String)> {
    let caps = STATUS_PATH.captures(url)?;
    let id = caps.get(2)?.as_str().to_string();
    let handle = caps
        .get(1)
        .map(|m| m.as_str())
        .filter(|h| !h.eq_ignore_ascii_case("i"))
        .map(str::to_string);
    Some((handle, id))
}

pub fn is_short_link(url: &str) -> bool {
    domain_of(url).eq_ignore_ascii_case(SHORT_LINK_HOST)
}

/// A social-post URL after short-link expansion and id parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TweetTarget {
    /// The URL the user sent
    pub original_url: String,
    /// The URL after redirects (same as `original_url` for canonical links)
    pub resolved_url: String,
    pub id: Option<String>,
    pub handle: Option<String>,
}

impl TweetTarget {
    /// Parse a target without any network access
    pub fn from_url(url: &str) -> Self {
        let (handle, id) = match parse_status_url(url) {
            Some((handle, id)) => (handle, Some(id)),
            None => (None, None),
        };
        Self {
            original_url: url.to_string(),
            resolved_url: url.to_string(),
            id,
            handle,
        }
    }

    /// Parse a target, expanding `t.co` short links with a redirect-following HEAD
    pub async fn resolve(http: &dyn HttpClient, url: &str, timeout: Duration) -> Self {
        let target = Self::from_url(url);
        if target.id.is_some() || !is_short_link(url) {
            return target;
        }
        match http.execute(HttpRequest::head(url, timeout)).await {
            Ok(response) => {
                let mut expanded = Self::from_url(&response.url);
                expanded.original_url = url.to_string();
                info!(short = url, expanded = %response.url, "expanded short link");
                expanded
            }
            Err(e) => {
                warn!(url, error = %e, "failed to expand short link");
                target
            }
        }
    }

    /// "X" for x.com links, "Twitter" otherwise
    pub fn platform(&self) -> &'static str {
        let host = domain_of(&self.resolved_url).to_ascii_lowercase();
        if host == "x.com" || host.ends_with(".x.com") {
            "X"
        } else {
            "Twitter"
        }
    }

    /// `https://{host}/{handle}/status/{id}` when both parts are known
    pub fn canonical_url(&self, handle: Option<&str>) -> String {
        let handle = handle.or(self.handle.as_deref());
        match (handle, self.id.as_deref()) {
            (Some(handle), Some(id)) => {
                let host = match self.platform() {
                    "X" => "x.com",
                    _ => "twitter.com",
                };
                format!("https://{}/{}/status/{}", host, handle, id)
            }
            _ => self.resolved_url.clone(),
        }
    }
}

// --- Native payloads ---

/// `GET /2/tweets/{id}` response
#[derive(Debug, Clone, Deserialize)]
pub struct V2Response {
    pub data: Option<V2Tweet>,
    #[serde(default)]
    pub includes: V2Includes,
}

#[derive(Debug, Clone, Deserialize)]
pub struct V2Tweet {
    pub id: String,
    #[serde(default)]
    pub text: String,
    pub author_id: Option<String>,
    pub created_at: Option<String>,
    pub entities: Option<V2Entities>,
    /// Long-form text for posts above the classic length limit
    pub note_tweet: Option<V2NoteTweet>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct V2NoteTweet {
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct V2Entities {
    #[serde(default)]
    pub hashtags: Vec<V2Hashtag>,
    #[serde(default)]
    pub mentions: Vec<V2Mention>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct V2Hashtag {
    pub tag: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct V2Mention {
    pub username: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct V2Includes {
    #[serde(default)]
    pub users: Vec<V2User>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct V2User {
    pub id: String,
    pub name: Option<String>,
    pub username: Option<String>,
}

/// `GET /1.1/statuses/show.json` response
#[derive(Debug, Clone, Deserialize)]
pub struct V1Status {
    pub id_str: Option<String>,
    pub full_text: Option<String>,
    pub text: Option<String>,
    pub created_at: Option<String>,
    pub user: Option<V1User>,
    pub entities: Option<V1Entities>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct V1User {
    pub name: Option<String>,
    pub screen_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct V1Entities {
    #[serde(default)]
    pub hashtags: Vec<V1Hashtag>,
    #[serde(default)]
    pub user_mentions: Vec<V1Mention>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct V1Hashtag {
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct V1Mention {
    pub screen_name: String,
}

/// Shape shared by the scraper service and the RapidAPI proxy
#[derive(Debug, Clone, Deserialize)]
pub struct ScraperPayload {
    pub display_text: Option<String>,
    pub text: Option<String>,
    pub author: Option<ScraperUser>,
    pub user: Option<ScraperUser>,
    pub created_at: Option<String>,
    pub entities: Option<ScraperEntities>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScraperUser {
    pub name: Option<String>,
    pub screen_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScraperEntities {
    #[serde(default)]
    pub hashtags: Vec<HashtagEntry>,
    #[serde(default)]
    pub user_mentions: Vec<MentionEntry>,
}

/// Hashtags arrive either as `{"text": ..}` / `{"tag": ..}` objects or bare strings
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum HashtagEntry {
    Plain(String),
    Object {
        text: Option<String>,
        tag: Option<String>,
    },
    Other(serde_json::Value),
}

impl HashtagEntry {
    pub fn value(&self) -> Option<&str> {
        match self {
            HashtagEntry::Plain(s) => Some(s),
            HashtagEntry::Object { text, tag } => text.as_deref().or(tag.as_deref()),
            HashtagEntry::Other(_) => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MentionEntry {
    Plain(String),
    Object { screen_name: Option<String> },
    Other(serde_json::Value),
}

impl MentionEntry {
    pub fn value(&self) -> Option<&str> {
        match self {
            MentionEntry::Plain(s) => Some(s),
            MentionEntry::Object { screen_name } => screen_name.as_deref(),
            MentionEntry::Other(_) => None,
        }
    }
}

/// A channel's answer in its native shape
#[derive(Debug, Clone)]
pub enum TweetPayload {
    V2(V2Response),
    V1(V1Status),
    Scraper(ScraperPayload),
}

/// A payload together with the channel that produced it
#[derive(Debug, Clone)]
pub struct TweetFetch {
    pub via: Channel,
    pub payload: TweetPayload,
}

// --- Channels ---

#[async_trait]
pub trait TweetChannel: Send + Sync {
    fn name(&self) -> &'static str;
    async fn fetch(&self, target: &TweetTarget) -> Result<TweetFetch, ChannelError>;
}

/// Official API; tries v2 first and falls back to v1.1
pub struct OfficialApiChannel {
    http: Arc<dyn HttpClient>,
    credentials: OfficialApiCredentials,
    timeout: Duration,
}

impl OfficialApiChannel {
    pub fn new(
        http: Arc<dyn HttpClient>,
        credentials: OfficialApiCredentials,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            credentials,
            timeout,
        }
    }

    async fn fetch_v2(&self, id: &str) -> Result<V2Response, ChannelError> {
        let url = format!(
            "{}/2/tweets/{}?expansions=author_id&tweet.fields=created_at,entities,note_tweet&user.fields=name,username",
            self.credentials.api_base, id
        );
        let request = HttpRequest::get(url, self.timeout).bearer(&self.credentials.bearer_token);
        let response = expect_success(self.http.execute(request).await?)?;
        let parsed: V2Response = parse_object(&response.body)?;
        match &parsed.data {
            Some(tweet) if !tweet.text.trim().is_empty() => Ok(parsed),
            _ => Err(ChannelError::Malformed("v2 response has no tweet data".into())),
        }
    }

    async fn fetch_v1(&self, id: &str) -> Result<V1Status, ChannelError> {
        let url = format!(
            "{}/1.1/statuses/show.json?id={}&tweet_mode=extended&include_entities=true",
            self.credentials.api_base, id
        );
        let request = HttpRequest::get(url, self.timeout).bearer(&self.credentials.bearer_token);
        let response = expect_success(self.http.execute(request).await?)?;
        parse_object(&response.body)
    }
}

#[async_trait]
impl TweetChannel for OfficialApiChannel {
    fn name(&self) -> &'static str {
        "official_api"
    }

    async fn fetch(&self, target: &TweetTarget) -> Result<TweetFetch, ChannelError> {
        let id = target.id.as_deref().ok_or(ChannelError::MissingId)?;
        match self.fetch_v2(id).await {
            Ok(response) => Ok(TweetFetch {
                via: Channel::OfficialApiV2,
                payload: TweetPayload::V2(response),
            }),
            Err(e) => {
                warn!(id, error = %e, "API v2 lookup failed, trying v1.1");
                let status = self.fetch_v1(id).await?;
                Ok(TweetFetch {
                    via: Channel::OfficialApiV1,
                    payload: TweetPayload::V1(status),
                })
            }
        }
    }
}

/// Third-party scraper service keyed by tweet id
pub struct ScraperServiceChannel {
    http: Arc<dyn HttpClient>,
    credentials: ScraperServiceCredentials,
    timeout: Duration,
}

impl ScraperServiceChannel {
    pub fn new(
        http: Arc<dyn HttpClient>,
        credentials: ScraperServiceCredentials,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            credentials,
            timeout,
        }
    }
}

#[async_trait]
impl TweetChannel for ScraperServiceChannel {
    fn name(&self) -> &'static str {
        "scraper_service"
    }

    async fn fetch(&self, target: &TweetTarget) -> Result<TweetFetch, ChannelError> {
        let id = target.id.as_deref().ok_or(ChannelError::MissingId)?;
        let url = url::Url::parse_with_params(&self.credentials.endpoint, &[("id", id)])
            .map_err(|e| ChannelError::InvalidEndpoint(e.to_string()))?;
        let request = HttpRequest::get(url.as_str(), self.timeout)
            .header("scraper-key", self.credentials.key.as_str());
        let response = expect_success(self.http.execute(request).await?)?;
        Ok(TweetFetch {
            via: Channel::ScraperService,
            payload: TweetPayload::Scraper(parse_object(&response.body)?),
        })
    }
}

/// RapidAPI tweet proxy; answers with the scraper service's payload shape
pub struct RapidApiChannel {
    http: Arc<dyn HttpClient>,
    credentials: RapidApiCredentials,
    timeout: Duration,
}

impl RapidApiChannel {
    pub fn new(
        http: Arc<dyn HttpClient>,
        credentials: RapidApiCredentials,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            credentials,
            timeout,
        }
    }
}

#[async_trait]
impl TweetChannel for RapidApiChannel {
    fn name(&self) -> &'static str {
        "rapidapi"
    }

    async fn fetch(&self, target: &TweetTarget) -> Result<TweetFetch, ChannelError> {
        let id = target.id.as_deref().ok_or(ChannelError::MissingId)?;
        if target.handle.is_none() {
            return Err(ChannelError::MissingHandle);
        }
        let endpoint = format!("https://{}/tweet.php", self.credentials.host);
        let url = url::Url::parse_with_params(&endpoint, &[("id", id)])
            .map_err(|e| ChannelError::InvalidEndpoint(e.to_string()))?;
        let request = HttpRequest::get(url.as_str(), self.timeout)
            .header("x-rapidapi-key", self.credentials.key.as_str())
            .header("x-rapidapi-host", self.credentials.host.as_str());
        let response = expect_success(self.http.execute(request).await?)?;
        Ok(TweetFetch {
            via: Channel::RapidApi,
            payload: TweetPayload::Scraper(parse_object(&response.body)?),
        })
    }
}

fn expect_success(response: HttpResponse) -> Result<HttpResponse, ChannelError> {
    if response.status == 200 {
        Ok(response)
    } else {
        Err(ChannelError::Status {
            status: response.status,
            excerpt: response.body.chars().take(200).collect(),
        })
    }
}

/// Parse a JSON body that must be an object
fn parse_object<T: DeserializeOwned>(body: &str) -> Result<T, ChannelError> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| ChannelError::Malformed(e.to_string()))?;
    if !value.is_object() {
        return Err(ChannelError::Malformed("payload is not a JSON object".into()));
    }
    serde_json::from_value(value).map_err(|e| ChannelError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_social_hosts() {
        assert!(is_social_post("https://x.com/rustlang/status/123"));
        assert!(is_social_post("https://twitter.com/rustlang/status/123"));
        assert!(is_social_post("https://mobile.twitter.com/rustlang/status/123"));
        assert!(is_social_post("https://t.co/AbC123"));
        assert!(is_social_post("https://nitter.net/rustlang/status/123"));
        assert!(!is_social_post("https://dropbox.com/s/abc"));
        assert!(!is_social_post("https://example.com/x.com/status/1"));
    }

    #[test]
    fn parses_status_paths() {
        assert_eq!(
            parse_status_url("https://x.com/rustlang/status/1790000000000000000?s=20"),
            Some((Some("rustlang".into()), "1790000000000000000".into()))
        );
        assert_eq!(
            parse_status_url("https://twitter.com/i/web/status/42"),
            Some((None, "42".into()))
        );
        assert_eq!(parse_status_url("https://x.com/rustlang"), None);
    }

    #[test]
    fn canonical_url_uses_platform_host() {
        let target = TweetTarget::from_url("https://x.com/i/web/status/42");
        assert_eq!(target.platform(), "X");
        assert_eq!(target.canonical_url(Some("rustlang")), "https://x.com/rustlang/status/42");
        assert_eq!(target.canonical_url(None), "https://x.com/i/web/status/42");

        let target = TweetTarget::from_url("https://twitter.com/a/status/7");
        assert_eq!(target.platform(), "Twitter");
        assert_eq!(target.canonical_url(None), "https://twitter.com/a/status/7");
    }

    #[test]
    fn non_object_payload_is_malformed() {
        let result: Result<ScraperPayload, _> = parse_object(r#"["text"]"#);
        assert!(matches!(result, Err(ChannelError::Malformed(_))));
    }

    #[test]
    fn hashtag_entries_accept_every_shape() {
        let entities: ScraperEntities = serde_json::from_str(
            r#"{"hashtags": [{"text": "AI"}, {"tag": "rust"}, "llm", 5], "user_mentions": [{"screen_name": "bob"}, "amy"]}"#,
        )
        .unwrap();
        let tags: Vec<_> = entities.hashtags.iter().filter_map(|h| h.value()).collect();
        assert_eq!(tags, vec!["AI", "rust", "llm"]);
        let mentions: Vec<_> = entities
            .user_mentions
            .iter()
            .filter_map(|m| m.value())
            .collect();
        assert_eq!(mentions, vec!["bob", "amy"]);
    }
}
