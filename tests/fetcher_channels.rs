mod common;

use common::*;
use linkdigest::content::{Channel, ContentKind};
use linkdigest::http::HttpError;
use linkdigest::{FetchOutcome, SourceFetcher};
use std::sync::Arc;

const TWEET_URL: &str = "https://x.com/ferris/status/1790000000000000001";

fn fetcher(config: &linkdigest::Config, http: &Arc<MockHttp>) -> SourceFetcher {
    SourceFetcher::from_config(config, http.clone())
}

#[tokio::test]
async fn only_the_enabled_channel_is_called() {
    let mut config = bare_config();
    enable_scraper_service(&mut config);
    let http = Arc::new(
        MockHttp::new()
            .respond(SCRAPER_ENDPOINT, 200, SCRAPER_TWEET)
            .respond("https://api.twitter.com/", 200, TWEET_V2)
            .respond(&format!("https://{}/", RAPIDAPI_HOST), 200, SCRAPER_TWEET),
    );
    let fetcher = fetcher(&config, &http);
    assert_eq!(fetcher.channel_names(), vec!["scraper_service"]);

    let outcome = fetcher.fetch(TWEET_URL).await;
    let content = outcome.content().expect("scraper service should succeed");

    assert_eq!(http.calls_to("scraper.example"), 1);
    assert_eq!(http.calls_to("api.twitter.com"), 0);
    assert_eq!(http.calls_to(RAPIDAPI_HOST), 0);

    let request = &http.requests()[0];
    assert_eq!(request.url, format!("{}?id=1790000000000000001", SCRAPER_ENDPOINT));
    assert!(request
        .headers
        .contains(&("scraper-key".to_string(), "scraper-key".to_string())));

    assert_eq!(content.kind, ContentKind::SocialPost);
    assert!(content.body.starts_with("Benchmarks for the new async runtime are in: 2x"));
    assert_eq!(content.title, "Tweet by Ferris Crab");
    assert_eq!(content.platform_tags, vec!["Rust", "Performance"]);
    assert_eq!(content.special_tags, vec!["$AAPL", "#Rust", "#Performance"]);
    assert_eq!(
        content.platform_meta.as_ref().map(|m| m.via),
        Some(Channel::ScraperService)
    );
}

#[tokio::test]
async fn official_api_hashtags_become_platform_tags() {
    let mut config = bare_config();
    enable_official(&mut config);
    let http = Arc::new(MockHttp::new().respond("https://api.twitter.com/2/tweets/", 200, TWEET_V2));
    let fetcher = fetcher(&config, &http);

    let outcome = fetcher.fetch(TWEET_URL).await;
    let content = outcome.content().expect("official api should succeed");

    let lowered: Vec<String> = content.platform_tags.iter().map(|t| t.to_lowercase()).collect();
    assert_eq!(lowered, vec!["ai", "rust"]);
    assert_eq!(content.url, TWEET_URL);
    assert_eq!(content.source_label, "X");

    let meta = content.platform_meta.as_ref().unwrap();
    assert_eq!(meta.via, Channel::OfficialApiV2);
    assert_eq!(meta.mentions, vec!["rustlang"]);
    assert_eq!(meta.author.as_deref(), Some("Ferris Crab"));

    let request = &http.requests()[0];
    assert!(request
        .headers
        .contains(&("Authorization".to_string(), "Bearer bearer".to_string())));
    assert_eq!(http.calls_to("scraper.example"), 0);
    assert_eq!(http.calls_to(RAPIDAPI_HOST), 0);
}

#[tokio::test]
async fn official_api_falls_back_to_v1() {
    let mut config = bare_config();
    enable_official(&mut config);
    let v1 = r#"{
        "id_str": "1790000000000000001",
        "full_text": "The v1.1 endpoint still answers with the full text of the post",
        "user": {"name": "Ferris Crab", "screen_name": "ferris"},
        "entities": {"hashtags": [{"text": "legacy"}], "user_mentions": []}
    }"#;
    let http = Arc::new(
        MockHttp::new()
            .respond("https://api.twitter.com/2/", 200, r#"{"errors": [{"title": "Not Found Error"}]}"#)
            .respond("https://api.twitter.com/1.1/", 200, v1),
    );
    let outcome = fetcher(&config, &http).fetch(TWEET_URL).await;
    let content = outcome.content().expect("v1 fallback should succeed");

    assert_eq!(http.calls_to("api.twitter.com"), 2);
    assert_eq!(content.platform_tags, vec!["legacy"]);
    assert_eq!(
        content.platform_meta.as_ref().map(|m| m.via),
        Some(Channel::OfficialApiV1)
    );
}

#[tokio::test]
async fn every_channel_failing_yields_unusable_marker() {
    let mut config = bare_config();
    enable_official(&mut config);
    enable_scraper_service(&mut config);
    enable_rapidapi(&mut config);
    let http = Arc::new(
        MockHttp::new()
            .respond("https://api.twitter.com/2/", 500, "server error")
            .respond("https://api.twitter.com/1.1/", 404, "not found")
            .respond(SCRAPER_ENDPOINT, 200, r#"["not", "an", "object"]"#)
            .respond(&format!("https://{}/", RAPIDAPI_HOST), 200, r#"{"display_text": ""}"#),
    );
    let fetcher = fetcher(&config, &http);
    assert_eq!(
        fetcher.channel_names(),
        vec!["official_api", "scraper_service", "rapidapi"]
    );

    let outcome = fetcher.fetch(TWEET_URL).await;
    let FetchOutcome::Unusable(marker) = outcome else {
        panic!("expected an unusable marker");
    };
    assert_eq!(marker.title, "Fetch failed");
    assert_eq!(marker.source_label, "X");
    assert_eq!(marker.kind, ContentKind::SocialPost);

    assert_eq!(http.calls_to("api.twitter.com"), 2);
    assert_eq!(http.calls_to("scraper.example"), 1);
    assert_eq!(http.calls_to(RAPIDAPI_HOST), 1);
}

#[tokio::test]
async fn no_channels_configured_never_touches_the_network() {
    let http = Arc::new(MockHttp::new());
    let outcome = fetcher(&bare_config(), &http).fetch(TWEET_URL).await;
    assert!(outcome.is_unusable());
    assert_eq!(http.total_calls(), 0);
}

#[tokio::test]
async fn short_links_are_expanded_before_lookup() {
    let mut config = bare_config();
    enable_scraper_service(&mut config);
    let http = Arc::new(
        MockHttp::new()
            .redirect("https://t.co/", TWEET_URL)
            .respond(SCRAPER_ENDPOINT, 200, SCRAPER_TWEET),
    );
    let outcome = fetcher(&config, &http).fetch("https://t.co/AbC123").await;

    let content = outcome.content().expect("expanded link should be fetched");
    assert_eq!(content.url, TWEET_URL);
    assert_eq!(http.calls_to("t.co"), 1);
    assert!(http
        .requests()
        .iter()
        .any(|r| r.url.ends_with("?id=1790000000000000001")));
}

#[tokio::test]
async fn short_links_to_regular_pages_are_scraped() {
    let mut config = bare_config();
    enable_scraper_service(&mut config);
    let http = Arc::new(
        MockHttp::new()
            .redirect("https://t.co/", "https://example.com/article")
            .respond("https://example.com/article", 200, ARTICLE_HTML),
    );
    let outcome = fetcher(&config, &http).fetch("https://t.co/Zz9").await;

    let content = outcome.content().expect("expanded page should be scraped");
    assert_eq!(content.kind, ContentKind::WebPage);
    assert_eq!(content.title, "Example Article");
    assert_eq!(content.url, "https://example.com/article");
    assert_eq!(http.calls_to("t.co"), 1);
    assert_eq!(http.calls_to("example.com"), 1);
    assert_eq!(http.calls_to("scraper.example"), 0);
}

#[tokio::test]
async fn rapidapi_needs_a_handle() {
    let mut config = bare_config();
    enable_rapidapi(&mut config);
    let http = Arc::new(MockHttp::new().respond(
        &format!("https://{}/", RAPIDAPI_HOST),
        200,
        SCRAPER_TWEET,
    ));
    let fetcher = fetcher(&config, &http);

    let outcome = fetcher
        .fetch("https://x.com/i/web/status/1790000000000000001")
        .await;
    assert!(outcome.is_unusable());
    assert_eq!(http.calls_to(RAPIDAPI_HOST), 0);

    let outcome = fetcher.fetch(TWEET_URL).await;
    assert!(outcome.content().is_some());
    let request = &http.requests()[0];
    assert!(request
        .headers
        .contains(&("x-rapidapi-host".to_string(), RAPIDAPI_HOST.to_string())));
    assert_eq!(http.calls_to(RAPIDAPI_HOST), 1);
    assert_eq!(http.calls_to("api.twitter.com"), 0);
    assert_eq!(http.calls_to("scraper.example"), 0);
}

#[tokio::test]
async fn generic_pages_are_fetched_concurrently_in_order() {
    let http = Arc::new(
        MockHttp::new()
            .respond("https://example.com/article", 200, ARTICLE_HTML)
            .respond("https://example.com/missing", 404, "gone")
            .fail(
                "https://slow.example/",
                HttpError::Timeout("deadline elapsed".into()),
            ),
    );
    let fetcher = fetcher(&bare_config(), &http);
    let urls = vec![
        "https://slow.example/page".to_string(),
        "https://example.com/article".to_string(),
        "https://example.com/missing".to_string(),
    ];

    let outcomes = fetcher.fetch_many(&urls).await;
    assert_eq!(outcomes.len(), 3);

    let FetchOutcome::Unusable(timeout) = &outcomes[0] else {
        panic!("timeout should be unusable");
    };
    assert!(timeout.reason.contains("deadline elapsed"));

    let article = outcomes[1].content().expect("article should be extracted");
    assert_eq!(article.title, "Example Article");
    assert!(article.body.contains("Lorem ipsum"));
    assert!(!article.body.contains("Copyright"));

    let FetchOutcome::Unusable(missing) = &outcomes[2] else {
        panic!("404 should be unusable");
    };
    assert_eq!(missing.reason, "HTTP status 404");
}
