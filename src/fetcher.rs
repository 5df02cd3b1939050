//! Source acquisition with layered fallback.
//!
//! Social-post URLs go through the configured tweet channels in priority
//! order (official API, scraper service, RapidAPI) and stop at the first one
//! that yields a non-empty body. Every other URL is fetched as a web page.
//! Nothing here returns an error: failures degrade to the next channel or to
//! an `UnusableMarker`.

use crate::config::Config;
use crate::content::{ContentKind, FetchOutcome, UnusableMarker};
use crate::extract::ContentExtractor;
use crate::http::HttpClient;
use crate::scraper::PageScraper;
use crate::twitter::{
    is_social_post, OfficialApiChannel, RapidApiChannel, ScraperServiceChannel, TweetChannel,
    TweetTarget,
};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct SourceFetcher {
    http: Arc<dyn HttpClient>,
    channels: Vec<Box<dyn TweetChannel>>,
    pages: PageScraper,
    extractor: ContentExtractor,
    short_link_timeout: Duration,
}

impl SourceFetcher {
    /// Build a fetcher with one channel per configured credential set.
    /// Channels without credentials are left out entirely.
    pub fn from_config(config: &Config, http: Arc<dyn HttpClient>) -> Self {
        let fetch = &config.fetch;
        let social_timeout = Duration::from_secs(fetch.social_timeout_secs);
        let mut channels: Vec<Box<dyn TweetChannel>> = Vec::new();

        if let Some(credentials) = config.official_api() {
            channels.push(Box::new(OfficialApiChannel::new(
                http.clone(),
                credentials,
                social_timeout,
            )));
        }
        if let Some(credentials) = config.scraper_service() {
            channels.push(Box::new(ScraperServiceChannel::new(
                http.clone(),
                credentials,
                social_timeout,
            )));
        }
        if let Some(credentials) = config.rapidapi() {
            channels.push(Box::new(RapidApiChannel::new(
                http.clone(),
                credentials,
                social_timeout,
            )));
        }

        let extractor = ContentExtractor::new(fetch.max_content_length);
        let pages = PageScraper::new(
            http.clone(),
            extractor.clone(),
            Duration::from_secs(fetch.page_timeout_secs),
            fetch.user_agent.clone(),
        );

        Self::new(
            http,
            channels,
            pages,
            extractor,
            Duration::from_secs(fetch.short_link_timeout_secs),
        )
    }

    pub fn new(
        http: Arc<dyn HttpClient>,
        channels: Vec<Box<dyn TweetChannel>>,
        pages: PageScraper,
        extractor: ContentExtractor,
        short_link_timeout: Duration,
    ) -> Self {
        Self {
            http,
            channels,
            pages,
            extractor,
            short_link_timeout,
        }
    }

    /// Names of the active social channels, in the order they are tried
    pub fn channel_names(&self) -> Vec<&'static str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    pub async fn fetch(&self, url: &str) -> FetchOutcome {
        if is_social_post(url) {
            self.fetch_social(url).await
        } else {
            self.fetch_page(url).await
        }
    }

    pub async fn fetch_page(&self, url: &str) -> FetchOutcome {
        self.pages.fetch_page(url).await
    }

    /// Fetch several generic pages concurrently, keeping the input order
    pub async fn fetch_many(&self, urls: &[String]) -> Vec<FetchOutcome> {
        self.pages.fetch_many(urls).await
    }

    /// Fetch any mix of URLs concurrently, keeping the input order
    pub async fn fetch_all(&self, urls: &[String]) -> Vec<FetchOutcome> {
        join_all(urls.iter().map(|url| self.fetch(url))).await
    }

    pub async fn fetch_social(&self, url: &str) -> FetchOutcome {
        let target = TweetTarget::resolve(self.http.as_ref(), url, self.short_link_timeout).await;
        debug!(url, id = ?target.id, handle = ?target.handle, "resolved social post");
        if target.id.is_none() && !is_social_post(&target.resolved_url) {
            info!(url, expanded = %target.resolved_url, "short link points at a regular page");
            return self.fetch_page(&target.resolved_url).await;
        }

        for channel in &self.channels {
            match channel.fetch(&target).await {
                Ok(fetch) => {
                    let content = self.extractor.extract_tweet(&fetch, &target);
                    if content.body.trim().is_empty() {
                        warn!(channel = channel.name(), url, "channel returned an empty post");
                        continue;
                    }
                    info!(channel = channel.name(), via = %fetch.via, url, "social post acquired");
                    return FetchOutcome::Content(content);
                }
                Err(e) => {
                    warn!(channel = channel.name(), url, error = %e, "channel failed");
                }
            }
        }

        let reason = if self.channels.is_empty() {
            "No social-post acquisition channel is configured.".to_string()
        } else {
            format!(
                "None of the acquisition channels ({}) returned content.",
                self.channel_names().join(", ")
            )
        };
        warn!(url, "all social channels failed");
        FetchOutcome::Unusable(UnusableMarker {
            kind: ContentKind::SocialPost,
            title: "Fetch failed".to_string(),
            reason,
            url: target.resolved_url.clone(),
            source_label: target.platform().to_string(),
        })
    }
}
