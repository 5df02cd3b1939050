//! # linkdigest
//!
//! Turns a link into a structured digest using an LLM.
//!
//! ## Features
//!
//! - **Layered acquisition**: Twitter/X posts go through the official API, a
//!   scraper service and a RapidAPI proxy in turn; other links are scraped
//! - **Structured output**: every URL yields a complete `ContentRecord`, even
//!   when acquisition or the LLM fails
//! - **Tolerant parsing**: replies that are not JSON are recovered heuristically
//! - **Local storage**: sled, deduplicated by URL

pub mod agent;
pub mod config;
pub mod content;
pub mod extract;
pub mod fallback;
pub mod fetcher;
pub mod http;
pub mod llm;
pub mod pipeline;
pub mod scraper;
pub mod storage;
pub mod summary;
pub mod twitter;

pub use agent::Summarizer;
pub use config::Config;
pub use content::{FetchOutcome, RawContent};
pub use fetcher::SourceFetcher;
pub use pipeline::Pipeline;
pub use storage::{StoreOutcome, Storage};
pub use summary::ContentRecord;
