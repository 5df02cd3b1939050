//! One URL in, one `ContentRecord` out.
//!
//! Acquisition failures and too-short content short-circuit with a failure
//! record before the LLM is ever called.

use crate::agent::Summarizer;
use crate::config::Config;
use crate::content::FetchOutcome;
use crate::fetcher::SourceFetcher;
use crate::http::{HttpClient, HttpError, ReqwestClient};
use crate::llm::{ChatClient, OpenAiCompatClient};
use crate::summary::ContentRecord;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{info, warn};

pub struct Pipeline {
    fetcher: SourceFetcher,
    summarizer: Summarizer,
}

impl Pipeline {
    pub fn new(fetcher: SourceFetcher, summarizer: Summarizer) -> Self {
        Self {
            fetcher,
            summarizer,
        }
    }

    /// Wire the production clients. One HTTP client, and so one connection
    /// pool, is shared by every channel and the LLM client.
    pub fn from_config(config: &Config) -> Result<Self, HttpError> {
        let http: Arc<dyn HttpClient> = Arc::new(ReqwestClient::new(&config.fetch.user_agent)?);
        let chat: Arc<dyn ChatClient> = Arc::new(OpenAiCompatClient::new(
            http.clone(),
            config.llm.endpoint.clone(),
            config.llm_api_key(),
        ));
        Ok(Self::new(
            SourceFetcher::from_config(config, http),
            Summarizer::new(chat, &config.llm),
        ))
    }

    pub fn fetcher(&self) -> &SourceFetcher {
        &self.fetcher
    }

    pub fn summarizer(&self) -> &Summarizer {
        &self.summarizer
    }

    /// Process one URL. Always returns a displayable record.
    pub async fn process(&self, url: &str) -> ContentRecord {
        info!(url, "processing link");
        let outcome = self.fetcher.fetch(url).await;
        self.process_outcome(outcome).await
    }

    /// Process several URLs. Acquisition runs concurrently, summarization
    /// runs one URL at a time; results keep the input order.
    pub async fn process_many(&self, urls: &[String]) -> Vec<ContentRecord> {
        let outcomes = join_all(urls.iter().map(|url| self.fetcher.fetch(url))).await;
        let mut records = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            records.push(self.process_outcome(outcome).await);
        }
        records
    }

    async fn process_outcome(&self, outcome: FetchOutcome) -> ContentRecord {
        match outcome {
            FetchOutcome::Unusable(marker) => {
                warn!(url = %marker.url, reason = %marker.reason, "acquisition failed");
                ContentRecord::acquisition_failed(&marker)
            }
            FetchOutcome::Content(content) if !content.is_usable() => {
                warn!(
                    url = %content.url,
                    chars = content.body_len(),
                    min = content.kind.min_body_len(),
                    "content too short to summarize"
                );
                ContentRecord::content_too_short(&content)
            }
            FetchOutcome::Content(content) => self.summarizer.summarize(&content).await,
        }
    }
}
