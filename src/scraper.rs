//! Generic web page acquisition.
//!
//! Fetches a page over the shared HTTP client and hands the HTML to the
//! extractor. Failures never propagate as errors: they become an
//! `UnusableMarker` so the pipeline can still emit a record.

use crate::content::{ContentKind, FetchOutcome, UnusableMarker};
use crate::extract::ContentExtractor;
use crate::http::{HttpClient, HttpRequest};
use crate::summary::domain_of;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct PageScraper {
    http: Arc<dyn HttpClient>,
    extractor: ContentExtractor,
    timeout: Duration,
    user_agent: String,
}

impl PageScraper {
    pub fn new(
        http: Arc<dyn HttpClient>,
        extractor: ContentExtractor,
        timeout: Duration,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            http,
            extractor,
            timeout,
            user_agent: user_agent.into(),
        }
    }

    /// Fetch and extract content from a URL
    pub async fn fetch_page(&self, url: &str) -> FetchOutcome {
        let request =
            HttpRequest::get(url, self.timeout).header("User-Agent", self.user_agent.as_str());

        let response = match self.http.execute(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(url, error = %e, "page fetch failed");
                return unusable(url, format!("Could not fetch content: {}", e));
            }
        };

        if !response.is_success() {
            warn!(url, status = response.status, "page returned an error status");
            return unusable(url, format!("HTTP status {}", response.status));
        }

        let content = self.extractor.extract_page(&response.body, url);
        info!(url, title = %content.title, chars = content.body_len(), "page extracted");
        FetchOutcome::Content(content)
    }

    /// Fetch several pages concurrently; results keep the input order
    pub async fn fetch_many(&self, urls: &[String]) -> Vec<FetchOutcome> {
        join_all(urls.iter().map(|url| self.fetch_page(url))).await
    }
}

fn unusable(url: &str, reason: String) -> FetchOutcome {
    FetchOutcome::Unusable(UnusableMarker {
        kind: ContentKind::WebPage,
        title: "Fetch failed".to_string(),
        reason,
        url: url.to_string(),
        source_label: domain_of(url),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpError, HttpResponse};
    use async_trait::async_trait;

    /// Answers every request from a fixed table keyed by URL
    struct StaticHttp(Vec<(&'static str, Result<HttpResponse, HttpError>)>);

    #[async_trait]
    impl HttpClient for StaticHttp {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
            assert!(request
                .headers
                .iter()
                .any(|(name, _)| name.eq_ignore_ascii_case("user-agent")));
            self.0
                .iter()
                .find(|(url, _)| *url == request.url)
                .map(|(_, result)| result.clone())
                .unwrap_or_else(|| Err(HttpError::Connect("unknown host".into())))
        }
    }

    fn ok(url: &str, status: u16, body: &str) -> Result<HttpResponse, HttpError> {
        Ok(HttpResponse {
            status,
            url: url.to_string(),
            body: body.to_string(),
        })
    }

    fn scraper(http: StaticHttp) -> PageScraper {
        PageScraper::new(
            Arc::new(http),
            ContentExtractor::default(),
            Duration::from_secs(5),
            "test-agent",
        )
    }

    #[tokio::test]
    async fn error_status_becomes_unusable() {
        let scraper = scraper(StaticHttp(vec![(
            "https://example.com/gone",
            ok("https://example.com/gone", 404, "not found"),
        )]));
        match scraper.fetch_page("https://example.com/gone").await {
            FetchOutcome::Unusable(marker) => {
                assert_eq!(marker.reason, "HTTP status 404");
                assert_eq!(marker.source_label, "example.com");
            }
            other => panic!("expected unusable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn transport_error_becomes_unusable() {
        let scraper = scraper(StaticHttp(vec![]));
        let outcome = scraper.fetch_page("https://down.example/").await;
        let FetchOutcome::Unusable(marker) = outcome else {
            panic!("expected unusable");
        };
        assert!(marker.reason.starts_with("Could not fetch content:"));
    }

    #[tokio::test]
    async fn fetch_many_keeps_order() {
        let html = "<html><head><title>Page</title></head><body><p>Some text</p></body></html>";
        let scraper = scraper(StaticHttp(vec![
            ("https://a.example/", ok("https://a.example/", 200, html)),
            ("https://b.example/", ok("https://b.example/", 500, "")),
        ]));
        let urls = vec![
            "https://b.example/".to_string(),
            "https://a.example/".to_string(),
        ];
        let outcomes = scraper.fetch_many(&urls).await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].is_unusable());
        assert_eq!(outcomes[1].content().map(|c| c.title.as_str()), Some("Page"));
        assert_eq!(outcomes[1].url(), "https://a.example/");
    }
}
