//! Test doubles shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use linkdigest::config::{Config, LlmConfig};
use linkdigest::http::{HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse};
use linkdigest::llm::{ChatClient, ChatRequest, LlmError};
use linkdigest::summary::domain_of;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::time::Instant;

pub const TWEET_V2: &str = include_str!("../fixtures/tweet_v2.json");
pub const SCRAPER_TWEET: &str = include_str!("../fixtures/scraper_tweet.json");
pub const ARTICLE_HTML: &str = include_str!("../fixtures/article.html");

pub const SCRAPER_ENDPOINT: &str = "https://scraper.example/api/tweet";
pub const RAPIDAPI_HOST: &str = "twitter-api45.p.rapidapi.com";

enum Reply {
    Respond { status: u16, body: String },
    Redirect { to: String },
    Fail(HttpError),
}

/// `HttpClient` answering from routes matched by URL prefix, first match wins
pub struct MockHttp {
    routes: Vec<(String, Reply)>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockHttp {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn respond(mut self, prefix: &str, status: u16, body: &str) -> Self {
        self.routes.push((
            prefix.to_string(),
            Reply::Respond {
                status,
                body: body.to_string(),
            },
        ));
        self
    }

    /// Answer with a 200 whose final URL is `to`, as after following redirects
    pub fn redirect(mut self, prefix: &str, to: &str) -> Self {
        self.routes.push((prefix.to_string(), Reply::Redirect { to: to.to_string() }));
        self
    }

    pub fn fail(mut self, prefix: &str, err: HttpError) -> Self {
        self.routes.push((prefix.to_string(), Reply::Fail(err)));
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests sent to `host`
    pub fn calls_to(&self, host: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| domain_of(&r.url) == host)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpClient for MockHttp {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let url = request.url.clone();
        let method = request.method;
        self.requests.lock().unwrap().push(request);

        let reply = self
            .routes
            .iter()
            .find(|(prefix, _)| url.starts_with(prefix.as_str()))
            .map(|(_, reply)| reply);
        match reply {
            Some(Reply::Respond { status, body }) => Ok(HttpResponse {
                status: *status,
                url,
                body: if method == HttpMethod::Head {
                    String::new()
                } else {
                    body.clone()
                },
            }),
            Some(Reply::Redirect { to }) => Ok(HttpResponse {
                status: 200,
                url: to.clone(),
                body: String::new(),
            }),
            Some(Reply::Fail(err)) => Err(err.clone()),
            None => Err(HttpError::Connect(format!("no route for {}", url))),
        }
    }
}

/// `ChatClient` replaying scripted results, then repeating a default one
pub struct MockChat {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    default: Result<String, LlmError>,
    probe_result: Result<(), LlmError>,
    attempts: Mutex<Vec<Instant>>,
    prompts: Mutex<Vec<String>>,
    probes: Mutex<usize>,
}

impl MockChat {
    pub fn always(result: Result<String, LlmError>) -> Self {
        Self::scripted(Vec::new(), result)
    }

    pub fn replying(text: &str) -> Self {
        Self::always(Ok(text.to_string()))
    }

    pub fn scripted(script: Vec<Result<String, LlmError>>, default: Result<String, LlmError>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            default,
            probe_result: Ok(()),
            attempts: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
            probes: Mutex::new(0),
        }
    }

    pub fn with_probe(mut self, result: Result<(), LlmError>) -> Self {
        self.probe_result = result;
        self
    }

    pub fn attempts(&self) -> Vec<Instant> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn probes(&self) -> usize {
        *self.probes.lock().unwrap()
    }
}

#[async_trait]
impl ChatClient for MockChat {
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
        self.attempts.lock().unwrap().push(Instant::now());
        self.prompts.lock().unwrap().push(request.prompt.clone());
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.default.clone())
    }

    async fn probe(&self, _model: &str) -> Result<(), LlmError> {
        *self.probes.lock().unwrap() += 1;
        self.probe_result.clone()
    }
}

pub fn llm_config() -> LlmConfig {
    LlmConfig {
        api_key: Some("sk-test".to_string()),
        ..LlmConfig::default()
    }
}

/// Config with no channel enabled
pub fn bare_config() -> Config {
    Config {
        llm: llm_config(),
        ..Config::default()
    }
}

pub fn enable_official(config: &mut Config) {
    config.twitter.enabled = true;
    config.twitter.bearer_token = Some("bearer".to_string());
}

pub fn enable_scraper_service(config: &mut Config) {
    config.scraper_service.endpoint = Some(SCRAPER_ENDPOINT.to_string());
    config.scraper_service.key = Some("scraper-key".to_string());
}

pub fn enable_rapidapi(config: &mut Config) {
    config.rapidapi.key = Some("rapid-key".to_string());
}

/// A structured reply with all six fields
pub fn structured_reply(tags: &[&str]) -> String {
    serde_json::json!({
        "title": "Example Article",
        "summary": "The article explains why structured digests make reading lists manageable.",
        "key_points": [
            "Digests keep the important facts",
            "Tags make links searchable",
            "Failures are reported, not hidden"
        ],
        "tags": tags,
        "related_links": [{"url": "https://docs.example.com/guide", "description": "Guide"}],
        "source": "source website name"
    })
    .to_string()
}
